//! Non-fatal findings attached to a computed report. None of these change
//! whether a calculation succeeds; they flag lines a reviewer should look at.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{MaterialItem, Totals};
use crate::units::{parse_unit, EmissionUnit};

/// Above this total (kgCO2e, one million tonnes) a report is flagged.
pub const TOTAL_REVIEW_THRESHOLD_KG: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationWarning {
    /// Material id, or `totals`.
    pub subject: String,
    pub level: WarningLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl CalculationWarning {
    pub fn new(subject: impl Into<String>, level: WarningLevel, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            level,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for CalculationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Threshold {
    warn: f64,
    critical: f64,
    typical: &'static str,
}

const fn threshold(warn: f64, critical: f64, typical: &'static str) -> Threshold {
    Threshold {
        warn,
        critical,
        typical,
    }
}

/// Typical single-project quantities per canonical unit symbol.
fn general_threshold(symbol: &str) -> Option<Threshold> {
    let t = match symbol {
        "t" => threshold(100.0, 500.0, "1-50 tonnes"),
        "kg" => threshold(50_000.0, 200_000.0, "100-10,000 kg"),
        "m2" => threshold(10_000.0, 50_000.0, "100-5,000 m²"),
        "m3" => threshold(1_000.0, 5_000.0, "10-500 m³"),
        "L" => threshold(50_000.0, 200_000.0, "100-10,000 L"),
        "kL" => threshold(100.0, 500.0, "1-50 kL"),
        "m" => threshold(5_000.0, 20_000.0, "10-1,000 m"),
        "each" => threshold(1_000.0, 5_000.0, "1-200 units"),
        _ => return None,
    };
    Some(t)
}

/// Categories whose materials are routinely ordered in larger or smaller
/// amounts than the general table assumes.
fn category_threshold(category: &str, symbol: &str) -> Option<Threshold> {
    let t = match (category.to_ascii_lowercase().as_str(), symbol) {
        ("concrete", "m3") => threshold(2_000.0, 10_000.0, "50-1,000 m³"),
        ("steel", "t") => threshold(50.0, 200.0, "1-30 tonnes"),
        ("steel", "kg") => threshold(20_000.0, 100_000.0, "100-10,000 kg"),
        ("timber", "m3") => threshold(500.0, 2_000.0, "10-200 m³"),
        ("insulation", "m2") => threshold(5_000.0, 20_000.0, "100-2,000 m²"),
        ("insulation", "kg") => threshold(5_000.0, 20_000.0, "50-2,000 kg"),
        ("plasterboard", "m2") => threshold(5_000.0, 20_000.0, "100-2,000 m²"),
        _ => return None,
    };
    Some(t)
}

/// Flag a material quantity that is high for one project. Lines in an
/// unrecognised unit are not judged.
pub fn quantity_warning(item: &MaterialItem) -> Option<CalculationWarning> {
    if item.quantity <= 0.0 {
        return None;
    }
    let unit = parse_unit(&item.unit)?;
    let limits = category_threshold(&item.category, unit.symbol)
        .or_else(|| general_threshold(unit.symbol))?;

    if item.quantity >= limits.critical {
        Some(
            CalculationWarning::new(
                &item.id,
                WarningLevel::Critical,
                format!("Unusually high quantity: {} {}", item.quantity, item.unit),
            )
            .with_suggestion(format!(
                "Typical range for this material: {}. Please verify this is correct.",
                limits.typical
            )),
        )
    } else if item.quantity >= limits.warn {
        Some(
            CalculationWarning::new(
                &item.id,
                WarningLevel::Warning,
                format!("High quantity: {} {}", item.quantity, item.unit),
            )
            .with_suggestion(format!(
                "Typical range: {}. Double-check the value.",
                limits.typical
            )),
        )
    } else {
        None
    }
}

pub fn totals_warning(totals: &Totals) -> Option<CalculationWarning> {
    (totals.total > TOTAL_REVIEW_THRESHOLD_KG).then(|| {
        let tonnes = EmissionUnit::KgCo2e.convert(totals.total, EmissionUnit::TCo2e);
        CalculationWarning::new(
            "totals",
            WarningLevel::Warning,
            format!("Total emissions ({tonnes} tCO2e) seem unusually high"),
        )
        .with_suggestion("Please verify calculations.")
    })
}

/// Quantity warnings for every line, then the totals warning.
pub fn plausibility_warnings(materials: &[MaterialItem], totals: &Totals) -> Vec<CalculationWarning> {
    materials
        .iter()
        .filter_map(quantity_warning)
        .chain(totals_warning(totals))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(category: &str, quantity: f64, unit: &str) -> MaterialItem {
        MaterialItem {
            id: format!("{category}-line"),
            name: category.to_string(),
            quantity,
            unit: unit.to_string(),
            factor: 1.0,
            category: category.to_string(),
            source: String::new(),
            is_custom: true,
        }
    }

    #[test]
    fn test_typical_quantities_are_quiet() {
        assert_eq!(quantity_warning(&line("glass", 400.0, "kg")), None);
        assert_eq!(quantity_warning(&line("glass", 0.0, "kg")), None);
        assert_eq!(quantity_warning(&line("glass", 1e9, "bags")), None);
    }

    #[test]
    fn test_general_thresholds() {
        let warn = quantity_warning(&line("glass", 60_000.0, "kg")).unwrap();
        assert_eq!(warn.level, WarningLevel::Warning);
        assert_eq!(warn.message, "High quantity: 60000 kg");

        let critical = quantity_warning(&line("glass", 6_000.0, "m³")).unwrap();
        assert_eq!(critical.level, WarningLevel::Critical);
        assert_eq!(
            critical.suggestion.as_deref(),
            Some("Typical range for this material: 10-500 m³. Please verify this is correct.")
        );
    }

    #[test]
    fn test_category_overrides_win() {
        // 2,500 m3 is critical in general but only high for concrete.
        let concrete = quantity_warning(&line("concrete", 2_500.0, "m3")).unwrap();
        assert_eq!(concrete.level, WarningLevel::Warning);
        assert_eq!(quantity_warning(&line("Concrete", 1_500.0, "m3")), None);

        let steel = quantity_warning(&line("steel", 150_000.0, "kg")).unwrap();
        assert_eq!(steel.level, WarningLevel::Critical);
    }

    #[test]
    fn test_large_total_is_flagged() {
        let quiet = Totals::from_components(1.0, 2.0, 3.0, 4.0);
        assert!(plausibility_warnings(&[], &quiet).is_empty());

        let huge = Totals::from_components(0.0, 0.0, 2_000_000_000.0, 0.0);
        let warnings = plausibility_warnings(&[line("steel", 10.0, "kg")], &huge);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].subject, "totals");
        assert_eq!(
            warnings[0].to_string(),
            "totals: Total emissions (2000000 tCO2e) seem unusually high"
        );
    }
}
