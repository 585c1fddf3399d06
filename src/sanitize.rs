//! Pure clean-up of raw form input. Nothing here fails: bad input degrades to
//! a safe default (empty text, zero) instead.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{
    RawCalculation, RawMaterial, RawProjectDetails, RawValue, MAX_AUDITOR_LEN,
    MAX_CATEGORY_LEN, MAX_DESCRIPTION_LEN, MAX_NAME_LEN, MAX_PERIOD_LEN, MAX_SAFE_INTEGER,
    MAX_SOURCE_LEN, MAX_UNIT_LEN,
};

const MAX_FILE_NAME_BYTES: usize = 255;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("html tag regex must compile"));

/// Strip HTML tags, trim, and cap at `max_len` characters.
pub fn sanitize_text(text: &str, max_len: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let stripped = HTML_TAG.replace_all(text, "");
    let trimmed = stripped.trim();
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }
    let capped: String = trimmed.chars().take(max_len).collect();
    capped.trim_end().to_string()
}

/// [`sanitize_text`] with the general description cap.
pub fn sanitize_description(text: &str) -> String {
    sanitize_text(text, MAX_DESCRIPTION_LEN)
}

pub fn sanitize_material_name(name: &str) -> String {
    sanitize_text(name, MAX_NAME_LEN)
}

pub fn sanitize_category(category: &str) -> String {
    sanitize_text(category, MAX_CATEGORY_LEN)
}

/// Parse the leading float of `raw` and clamp it to `[min, max]`.
/// Unparseable input yields 0, not `min`.
pub fn sanitize_number(raw: &str, min: f64, max: f64) -> f64 {
    match leading_float(raw) {
        Some(n) => clamp(n, min, max),
        None => 0.0,
    }
}

/// Silent-default coercion for quantity fields: numbers and numeric strings
/// become a value in `[0, 2^53 - 1]`, anything else becomes 0.
pub fn parse_quantity(raw: &RawValue) -> f64 {
    match raw {
        RawValue::Number(n) if n.is_nan() => 0.0,
        RawValue::Number(n) => clamp(*n, 0.0, MAX_SAFE_INTEGER),
        RawValue::Text(s) => sanitize_number(s, 0.0, MAX_SAFE_INTEGER),
        RawValue::Flag(_) | RawValue::Other(_) => 0.0,
    }
}

fn clamp(n: f64, min: f64, max: f64) -> f64 {
    if n < min {
        min
    } else if n > max {
        max
    } else {
        n
    }
}

/// Lenient float prefix parse: leading whitespace is skipped and anything
/// after the longest numeric prefix is ignored ("12kg" -> 12).
fn leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        let negative = bytes.first() == Some(&b'-');
        return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY });
    }

    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }

    // Exponent only counts when digits follow it.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Make an uploaded file name safe to store: no `..`, only
/// `[a-zA-Z0-9._-]`, at most 255 bytes with the extension kept.
pub fn sanitize_file_name(file_name: &str) -> String {
    let without_traversal = file_name.replace("..", "");
    let mut sanitized: String = without_traversal
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Every char is ASCII by now, so byte and char lengths agree.
    if sanitized.len() > MAX_FILE_NAME_BYTES {
        sanitized = match sanitized.rsplit_once('.') {
            Some((stem, ext)) if ext.len() < MAX_FILE_NAME_BYTES - 5 => {
                let keep = MAX_FILE_NAME_BYTES - 5 - ext.len();
                let stem = stem[..keep.min(stem.len())].trim_end_matches('.');
                format!("{stem}.{ext}")
            }
            _ => sanitized[..MAX_FILE_NAME_BYTES].trim_end_matches('.').to_string(),
        };
    }
    sanitized
}

/// Quote a field for CSV export.
pub fn sanitize_csv_field(field: &str) -> String {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let escaped = trimmed.replace('"', "\"\"");
    if escaped.contains(',') || escaped.contains('\n') || escaped.contains('"') {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

/// Caps text values; values of any other type are left for validation.
fn sanitize_field(value: Option<RawValue>, max_len: usize) -> Option<RawValue> {
    value.map(|v| match v {
        RawValue::Text(s) => RawValue::Text(sanitize_text(&s, max_len)),
        other => other,
    })
}

fn trim_value(value: RawValue) -> RawValue {
    match value {
        RawValue::Text(s) => RawValue::Text(s.trim().to_string()),
        other => other,
    }
}

/// Keys are left as sent; validation trims them and reports collisions.
fn trim_values(map: BTreeMap<String, RawValue>) -> BTreeMap<String, RawValue> {
    map.into_iter().map(|(k, v)| (k, trim_value(v))).collect()
}

pub fn sanitize_material(raw: RawMaterial) -> RawMaterial {
    RawMaterial {
        id: raw.id.map(trim_value),
        name: sanitize_field(raw.name, MAX_NAME_LEN),
        quantity: raw.quantity.map(trim_value),
        unit: sanitize_field(raw.unit, MAX_UNIT_LEN),
        factor: raw.factor.map(trim_value),
        category: sanitize_field(raw.category, MAX_CATEGORY_LEN),
        source: sanitize_field(raw.source, MAX_SOURCE_LEN),
        is_custom: raw.is_custom,
    }
}

pub fn sanitize_project_details(raw: RawProjectDetails) -> RawProjectDetails {
    RawProjectDetails {
        name: sanitize_field(raw.name, MAX_NAME_LEN),
        location: raw.location.map(trim_value),
        period: sanitize_field(raw.period, MAX_PERIOD_LEN),
        auditor: sanitize_field(raw.auditor, MAX_AUDITOR_LEN),
    }
}

/// Apply the per-field text caps to a whole calculation document.
pub fn sanitize_calculation(raw: RawCalculation) -> RawCalculation {
    RawCalculation {
        project_details: sanitize_project_details(raw.project_details),
        materials: raw.materials.into_iter().map(sanitize_material).collect(),
        fuel_inputs: trim_values(raw.fuel_inputs),
        electricity_inputs: trim_values(raw.electricity_inputs),
        transport_inputs: trim_values(raw.transport_inputs),
        lifecycle: raw.lifecycle,
    }
}
