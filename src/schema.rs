//! Boundary validation: raw, untyped input in; typed values or field-level
//! issues out.
//!
//! Single objects (project details, each input map, a single material) are
//! all-or-nothing. The materials collection is lenient: bad rows are dropped
//! and recorded so one broken import row does not sink the calculation.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::sanitize::parse_quantity;
use crate::types::{
    CalculationInput, ElectricityInput, FuelInput, InputKey, Jurisdiction, LifecycleInputs,
    MaterialItem, ProjectDetails, QuantityMap, RawCalculation, RawMaterial, RawProjectDetails,
    RawValue, TransportInput, JURISDICTION_CODES, MAX_AUDITOR_LEN, MAX_BULK_QUANTITY,
    MAX_CATEGORY_LEN, MAX_FACTOR, MAX_NAME_LEN, MAX_PERIOD_LEN, MAX_SAFE_INTEGER, MAX_SOURCE_LEN,
    MAX_UNIT_LEN, MIN_BUILDING_AREA_M2,
};

// ASCII digits only: `parse_quantity` reads nothing else.
static NUMERIC_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]*\.?[0-9]*$").expect("numeric text regex must compile"));

/// One violated constraint, addressed by a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Ordered issues of a failed validation, ready to render next to the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// A material row dropped from the collection, with why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub index: usize,
    pub issues: Vec<ValidationIssue>,
}

// ---- Field constraint tables --------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Required,
    MinLen(usize, &'static str),
    MaxLen(usize, &'static str),
    Min(f64, &'static str),
    Max(f64, &'static str),
    OneOf(&'static [&'static str], &'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldConstraint {
    pub name: &'static str,
    pub kind: FieldKind,
    pub rules: &'static [Rule],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Missing,
    Text(&'a str),
    Number(f64),
    Flag(bool),
    /// Any other JSON value, by type name.
    Other(&'static str),
}

pub const MATERIAL_FIELDS: &[FieldConstraint] = &[
    FieldConstraint {
        name: "id",
        kind: FieldKind::Text,
        rules: &[Rule::Required, Rule::MinLen(1, "Material id is required")],
    },
    FieldConstraint {
        name: "name",
        kind: FieldKind::Text,
        rules: &[
            Rule::Required,
            Rule::MinLen(1, "Material name is required"),
            Rule::MaxLen(MAX_NAME_LEN, "Material name too long"),
        ],
    },
    FieldConstraint {
        name: "quantity",
        kind: FieldKind::Number,
        rules: &[
            Rule::Required,
            Rule::Min(0.0, "Quantity cannot be negative"),
            Rule::Max(MAX_BULK_QUANTITY, "Quantity too large"),
        ],
    },
    FieldConstraint {
        name: "unit",
        kind: FieldKind::Text,
        rules: &[
            Rule::Required,
            Rule::MinLen(1, "Unit is required"),
            Rule::MaxLen(MAX_UNIT_LEN, "Unit too long"),
        ],
    },
    FieldConstraint {
        name: "factor",
        kind: FieldKind::Number,
        rules: &[
            Rule::Required,
            Rule::Min(0.0, "Emission factor cannot be negative"),
            Rule::Max(MAX_FACTOR, "Emission factor too high"),
        ],
    },
    FieldConstraint {
        name: "category",
        kind: FieldKind::Text,
        rules: &[
            Rule::Required,
            Rule::MinLen(1, "Category is required"),
            Rule::MaxLen(MAX_CATEGORY_LEN, "Category too long"),
        ],
    },
    FieldConstraint {
        name: "source",
        kind: FieldKind::Text,
        rules: &[Rule::MaxLen(MAX_SOURCE_LEN, "Source too long")],
    },
    FieldConstraint {
        name: "isCustom",
        kind: FieldKind::Flag,
        rules: &[],
    },
];

pub const PROJECT_FIELDS: &[FieldConstraint] = &[
    FieldConstraint {
        name: "name",
        kind: FieldKind::Text,
        rules: &[Rule::MaxLen(MAX_NAME_LEN, "Project name too long")],
    },
    FieldConstraint {
        name: "location",
        kind: FieldKind::Text,
        rules: &[
            Rule::Required,
            Rule::OneOf(
                JURISDICTION_CODES,
                "Location must be one of NSW, VIC, QLD, SA, WA, TAS, NT, ACT",
            ),
        ],
    },
    FieldConstraint {
        name: "period",
        kind: FieldKind::Text,
        rules: &[Rule::MaxLen(MAX_PERIOD_LEN, "Reporting period too long")],
    },
    FieldConstraint {
        name: "auditor",
        kind: FieldKind::Text,
        rules: &[Rule::MaxLen(MAX_AUDITOR_LEN, "Auditor too long")],
    },
];

/// An entity checked against a constraint table before it becomes typed.
pub trait Schema: Sized {
    type Valid;

    const FIELDS: &'static [FieldConstraint];

    fn field(&self, name: &str) -> FieldValue<'_>;

    /// Only called once every field of [`Self::FIELDS`] has passed.
    fn build(self) -> Self::Valid;
}

fn value(raw: &Option<RawValue>) -> FieldValue<'_> {
    match raw {
        None => FieldValue::Missing,
        Some(RawValue::Text(s)) => FieldValue::Text(s),
        Some(RawValue::Number(n)) => FieldValue::Number(*n),
        Some(RawValue::Flag(b)) => FieldValue::Flag(*b),
        Some(other) => FieldValue::Other(other.type_name()),
    }
}

fn text_of(raw: Option<RawValue>) -> String {
    raw.and_then(RawValue::into_text).unwrap_or_default()
}

impl Schema for RawMaterial {
    type Valid = MaterialItem;

    const FIELDS: &'static [FieldConstraint] = MATERIAL_FIELDS;

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "id" => value(&self.id),
            "name" => value(&self.name),
            "quantity" => value(&self.quantity),
            "unit" => value(&self.unit),
            "factor" => value(&self.factor),
            "category" => value(&self.category),
            "source" => value(&self.source),
            "isCustom" => value(&self.is_custom),
            _ => FieldValue::Missing,
        }
    }

    fn build(self) -> MaterialItem {
        MaterialItem {
            quantity: self.quantity.as_ref().map_or(0.0, parse_quantity),
            factor: self.factor.as_ref().map_or(0.0, parse_quantity),
            is_custom: matches!(self.is_custom, Some(RawValue::Flag(true))),
            id: text_of(self.id),
            name: text_of(self.name),
            unit: text_of(self.unit),
            category: text_of(self.category),
            source: text_of(self.source),
        }
    }
}

impl Schema for RawProjectDetails {
    type Valid = ProjectDetails;

    const FIELDS: &'static [FieldConstraint] = PROJECT_FIELDS;

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "name" => value(&self.name),
            "location" => value(&self.location),
            "period" => value(&self.period),
            "auditor" => value(&self.auditor),
            _ => FieldValue::Missing,
        }
    }

    fn build(self) -> ProjectDetails {
        ProjectDetails {
            location: self
                .location
                .as_ref()
                .and_then(RawValue::as_text)
                .and_then(Jurisdiction::from_code)
                .unwrap_or_default(),
            name: self.name.and_then(RawValue::into_text),
            period: self.period.and_then(RawValue::into_text),
            auditor: self.auditor.and_then(RawValue::into_text),
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "string",
        FieldKind::Number => "number",
        FieldKind::Flag => "boolean",
    }
}

fn value_name(value: FieldValue<'_>) -> &'static str {
    match value {
        FieldValue::Missing => "undefined",
        FieldValue::Text(_) => "string",
        FieldValue::Number(_) => "number",
        FieldValue::Flag(_) => "boolean",
        FieldValue::Other(name) => name,
    }
}

/// First violated rule of one field, if any.
pub fn check_field(constraint: &FieldConstraint, value: FieldValue<'_>) -> Option<String> {
    let required = constraint.rules.contains(&Rule::Required);
    match (constraint.kind, value) {
        (_, FieldValue::Missing) => return required.then(|| "Required".to_string()),
        (FieldKind::Text, FieldValue::Text(_)) => {}
        (FieldKind::Number, FieldValue::Number(n)) if !n.is_finite() => {
            return Some("Must be a finite number".to_string());
        }
        (FieldKind::Number, FieldValue::Number(_)) => {}
        (FieldKind::Flag, FieldValue::Flag(_)) => {}
        (expected, found) => {
            return Some(format!(
                "Expected {}, received {}",
                kind_name(expected),
                value_name(found)
            ));
        }
    }

    for rule in constraint.rules {
        let violated = match (*rule, value) {
            (Rule::MinLen(min, msg), FieldValue::Text(s)) => {
                (s.chars().count() < min).then_some(msg)
            }
            (Rule::MaxLen(max, msg), FieldValue::Text(s)) => {
                (s.chars().count() > max).then_some(msg)
            }
            (Rule::Min(min, msg), FieldValue::Number(n)) => (n < min).then_some(msg),
            (Rule::Max(max, msg), FieldValue::Number(n)) => (n > max).then_some(msg),
            (Rule::OneOf(allowed, msg), FieldValue::Text(s)) => {
                (!allowed.iter().any(|a| *a == s)).then_some(msg)
            }
            _ => None,
        };
        if let Some(msg) = violated {
            return Some(msg.to_string());
        }
    }
    None
}

/// All-or-nothing validation of one object.
pub fn validate_object<S: Schema>(
    raw: S,
    path: &str,
) -> Result<S::Valid, Vec<ValidationIssue>> {
    let issues: Vec<ValidationIssue> = S::FIELDS
        .iter()
        .filter_map(|constraint| {
            check_field(constraint, raw.field(constraint.name))
                .map(|msg| ValidationIssue::new(join(path, constraint.name), msg))
        })
        .collect();
    if issues.is_empty() {
        Ok(raw.build())
    } else {
        Err(issues)
    }
}

pub fn validate_material(
    raw: RawMaterial,
    path: &str,
) -> Result<MaterialItem, Vec<ValidationIssue>> {
    validate_object(raw, path)
}

pub fn validate_project_details(
    raw: RawProjectDetails,
) -> Result<ProjectDetails, Vec<ValidationIssue>> {
    validate_object(raw, "projectDetails")
}

/// Lenient pass over a materials collection: every row is checked on its
/// own, failures are dropped and recorded by index. Only the row count can
/// fail the collection as a whole.
pub fn validate_materials(
    rows: Vec<RawMaterial>,
    config: &PipelineConfig,
) -> Result<(Vec<MaterialItem>, Vec<RejectedRow>), ValidationIssue> {
    if rows.len() > config.max_materials {
        return Err(ValidationIssue::new(
            "materials",
            format!("Too many materials (max {})", config.max_materials),
        ));
    }
    let reject_duplicate_ids = config.reject_duplicate_ids;
    let mut accepted = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (index, raw) in rows.into_iter().enumerate() {
        let path = format!("materials.{index}");
        match validate_material(raw, &path) {
            Ok(item) => {
                if reject_duplicate_ids && !seen_ids.insert(item.id.clone()) {
                    rejected.push(RejectedRow {
                        index,
                        issues: vec![ValidationIssue::new(
                            join(&path, "id"),
                            format!("Duplicate material id '{}'", item.id),
                        )],
                    });
                } else {
                    accepted.push(item);
                }
            }
            Err(issues) => rejected.push(RejectedRow { index, issues }),
        }
    }
    Ok((accepted, rejected))
}

/// All-or-nothing validation of one input map against the key vocabulary `K`.
/// Keys are trimmed here; two keys that trim to the same name are an issue.
pub fn validate_quantities<K: InputKey>(
    raw: &BTreeMap<String, RawValue>,
    section: &str,
) -> Result<QuantityMap<K>, Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let mut quantities = BTreeMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for (raw_key, value) in raw {
        let key = raw_key.trim();
        let path = join(section, key);
        if key.chars().count() > MAX_UNIT_LEN {
            issues.push(ValidationIssue::new(path, "Key too long"));
            continue;
        }
        if !seen.insert(key) {
            issues.push(ValidationIssue::new(path, format!("Duplicate key '{key}'")));
            continue;
        }
        let Some(kind) = K::from_key(key) else {
            issues.push(ValidationIssue::new(path, format!("Unrecognized key '{key}'")));
            continue;
        };
        let quantity = match value {
            RawValue::Number(n) if !n.is_finite() => {
                issues.push(ValidationIssue::new(path, "Must be a finite number"));
                continue;
            }
            RawValue::Number(n) => *n,
            RawValue::Text(s) if !NUMERIC_TEXT.is_match(s) => {
                issues.push(ValidationIssue::new(path, "Must be a valid number"));
                continue;
            }
            RawValue::Text(_) => parse_quantity(value),
            RawValue::Flag(_) | RawValue::Other(_) => {
                issues.push(ValidationIssue::new(
                    path,
                    format!("Expected number, received {}", value.type_name()),
                ));
                continue;
            }
        };
        if quantity < 0.0 {
            issues.push(ValidationIssue::new(path, "Quantity cannot be negative"));
        } else if quantity > K::MAX {
            issues.push(ValidationIssue::new(path, "Quantity too large"));
        } else {
            quantities.insert(kind, quantity);
        }
    }

    if issues.is_empty() {
        Ok(QuantityMap::from_map(quantities))
    } else {
        Err(issues)
    }
}

pub fn validate_fuel_inputs(
    raw: &BTreeMap<String, RawValue>,
) -> Result<FuelInput, Vec<ValidationIssue>> {
    validate_quantities(raw, "fuelInputs")
}

pub fn validate_electricity_inputs(
    raw: &BTreeMap<String, RawValue>,
) -> Result<ElectricityInput, Vec<ValidationIssue>> {
    validate_quantities(raw, "electricityInputs")
}

pub fn validate_transport_inputs(
    raw: &BTreeMap<String, RawValue>,
) -> Result<TransportInput, Vec<ValidationIssue>> {
    validate_quantities(raw, "transportInputs")
}

pub fn validate_lifecycle(
    raw: &LifecycleInputs,
) -> Result<LifecycleInputs, Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let mut check = |name: &str, value: f64| {
        let path = join("lifecycle", name);
        if !value.is_finite() {
            issues.push(ValidationIssue::new(path, "Must be a finite number"));
        } else if value < 0.0 {
            issues.push(ValidationIssue::new(path, "Emissions cannot be negative"));
        } else if value > MAX_SAFE_INTEGER {
            issues.push(ValidationIssue::new(path, "Emissions too large"));
        }
    };
    for (name, value) in raw.stage_values() {
        check(name, value);
    }
    if let Some(area) = raw.building_area_m2 {
        check("building_area_m2", area);
    }
    if raw
        .building_area_m2
        .is_some_and(|area| area > 0.0 && area < MIN_BUILDING_AREA_M2)
    {
        issues.push(ValidationIssue::new(
            "lifecycle.building_area_m2",
            "Building area must be 0 or at least 1 m²",
        ));
    }
    if issues.is_empty() {
        Ok(*raw)
    } else {
        Err(issues)
    }
}

/// A calculation whose single-object sections all passed, plus the material
/// rows the lenient collection pass dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedCalculation {
    pub input: CalculationInput,
    pub rejected: Vec<RejectedRow>,
}

fn collect<T>(
    result: Result<T, Vec<ValidationIssue>>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(mut found) => {
            issues.append(&mut found);
            None
        }
    }
}

/// Validate a whole calculation document. Issues from every section are
/// gathered before failing.
pub fn validate_calculation(
    raw: RawCalculation,
    config: &PipelineConfig,
) -> Result<ValidatedCalculation, ValidationErrors> {
    let mut issues = Vec::new();

    let project = collect(validate_project_details(raw.project_details), &mut issues);
    let materials = match validate_materials(raw.materials, config) {
        Ok(outcome) => Some(outcome),
        Err(issue) => {
            issues.push(issue);
            None
        }
    };
    let fuel = collect(validate_fuel_inputs(&raw.fuel_inputs), &mut issues);
    let electricity = collect(validate_electricity_inputs(&raw.electricity_inputs), &mut issues);
    let transport = collect(validate_transport_inputs(&raw.transport_inputs), &mut issues);
    let lifecycle = match raw.lifecycle.as_ref() {
        Some(l) => collect(validate_lifecycle(l), &mut issues).map(Some),
        None => Some(None),
    };

    match (project, materials, fuel, electricity, transport, lifecycle) {
        (
            Some(project),
            Some((materials, rejected)),
            Some(fuel),
            Some(electricity),
            Some(transport),
            Some(lifecycle),
        ) => Ok(ValidatedCalculation {
            input: CalculationInput {
                project,
                materials,
                fuel,
                electricity,
                transport,
                lifecycle,
            },
            rejected,
        }),
        _ => Err(ValidationErrors { issues }),
    }
}
