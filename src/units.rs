//! Quantity units. Free-text units from the form are parsed into a small
//! vocabulary so a database-sourced line can be expressed in the unit its
//! record's factor is declared in. Emission outputs are kgCO2e; tCO2e is a
//! display unit.

use serde::{Deserialize, Serialize};

use crate::factors::FactorDataset;
use crate::types::MaterialItem;
use crate::warnings::{CalculationWarning, WarningLevel};

pub const KG_PER_TONNE: f64 = 1000.0;
/// Average light steel framing mass, for runs entered in linear metres.
pub const STEEL_FRAMING_KG_PER_METRE: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Length,
    Area,
    Volume,
    Mass,
    Count,
}

/// A recognised unit: canonical symbol and its size in the base unit of its
/// dimension (m, m2, m3, kg, each).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    pub symbol: &'static str,
    pub dimension: Dimension,
    pub to_base: f64,
}

const fn unit(symbol: &'static str, dimension: Dimension, to_base: f64) -> Unit {
    Unit {
        symbol,
        dimension,
        to_base,
    }
}

/// Lower-case, drop whitespace, superscript digits become plain digits.
pub fn normalize_unit(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            '²' => '2',
            '³' => '3',
            other => other,
        })
        .collect()
}

pub fn parse_unit(raw: &str) -> Option<Unit> {
    use Dimension::*;

    let parsed = match normalize_unit(raw).as_str() {
        "m" | "lm" | "metre" | "metres" | "meter" | "meters" | "linearmetre" | "linearmetres" => {
            unit("m", Length, 1.0)
        }
        "mm" => unit("mm", Length, 0.001),
        "cm" => unit("cm", Length, 0.01),
        "km" | "totalkm" => unit("km", Length, 1000.0),
        "m2" | "sqm" | "squaremetre" | "squaremetres" => unit("m2", Area, 1.0),
        "cm2" => unit("cm2", Area, 0.0001),
        "mm2" => unit("mm2", Area, 0.000_001),
        "m3" | "cum" | "cubicmetre" | "cubicmetres" => unit("m3", Volume, 1.0),
        "kl" => unit("kL", Volume, 1.0),
        "l" | "litre" | "litres" | "liter" | "liters" => unit("L", Volume, 0.001),
        "ml" => unit("mL", Volume, 0.000_001),
        "kg" | "kgs" | "kilogram" | "kilograms" => unit("kg", Mass, 1.0),
        "g" | "gram" | "grams" => unit("g", Mass, 0.001),
        "t" | "tonne" | "tonnes" | "ton" | "tons" => unit("t", Mass, KG_PER_TONNE),
        "each" | "ea" | "unit" | "units" | "no" | "no." | "item" | "items" => {
            unit("each", Count, 1.0)
        }
        _ => return None,
    };
    Some(parsed)
}

/// `quantity` in `from`, expressed in `to`. `None` across dimensions.
pub fn convert(quantity: f64, from: Unit, to: Unit) -> Option<f64> {
    (from.dimension == to.dimension).then(|| quantity * from.to_base / to.to_base)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmissionUnit {
    #[serde(rename = "kgCO2e")]
    KgCo2e,
    #[serde(rename = "tCO2e")]
    TCo2e,
}

impl EmissionUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            EmissionUnit::KgCo2e => "kgCO2e",
            EmissionUnit::TCo2e => "tCO2e",
        }
    }

    pub fn convert(self, value: f64, to: EmissionUnit) -> f64 {
        match (self, to) {
            (EmissionUnit::KgCo2e, EmissionUnit::TCo2e) => value / KG_PER_TONNE,
            (EmissionUnit::TCo2e, EmissionUnit::KgCo2e) => value * KG_PER_TONNE,
            _ => value,
        }
    }
}

fn is_steel_framing(name: &str) -> bool {
    let name = name.to_lowercase();
    ["steel", "rondo", "stud", "furring"]
        .iter()
        .any(|k| name.contains(k))
}

/// Express every database-sourced line in its record's declared unit so the
/// record factor applies. Lines in an unrecognised unit get an info warning;
/// lines that cannot be converted keep their quantity and get a warning.
pub fn normalize_units(
    items: &mut [MaterialItem],
    dataset: &FactorDataset,
) -> Vec<CalculationWarning> {
    let mut warnings = Vec::new();

    for item in items.iter_mut() {
        let Some(from) = parse_unit(&item.unit) else {
            warnings.push(CalculationWarning::new(
                &item.id,
                WarningLevel::Info,
                format!("Non-standard unit \"{}\"", item.unit),
            ));
            continue;
        };
        if item.is_custom {
            continue;
        }
        let Some(record) = dataset.by_id(&item.id) else {
            continue;
        };
        let Some(to) = parse_unit(&record.unit) else {
            continue;
        };
        if from.symbol == to.symbol {
            item.unit = record.unit.clone();
            continue;
        }

        let converted = match convert(item.quantity, from, to) {
            Some(quantity) => Some((
                quantity,
                format!(
                    "Converted {} {} to {} {}",
                    item.quantity, from.symbol, quantity, to.symbol
                ),
            )),
            None if from.dimension == Dimension::Length
                && to.dimension == Dimension::Mass
                && is_steel_framing(&item.name) =>
            {
                let metres = item.quantity * from.to_base;
                let quantity = metres * STEEL_FRAMING_KG_PER_METRE / to.to_base;
                Some((
                    quantity,
                    format!(
                        "Converted {metres} linear metres using {STEEL_FRAMING_KG_PER_METRE} kg/m"
                    ),
                ))
            }
            None => None,
        };

        match converted {
            Some((quantity, note)) => {
                item.quantity = quantity;
                item.unit = record.unit.clone();
                warnings.push(CalculationWarning::new(&item.id, WarningLevel::Info, note));
            }
            None => warnings.push(
                CalculationWarning::new(
                    &item.id,
                    WarningLevel::Warning,
                    format!(
                        "Unit mismatch (input: {}, dataset: {})",
                        item.unit, record.unit
                    ),
                )
                .with_suggestion("Manual review recommended."),
            ),
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> &'static FactorDataset {
        FactorDataset::embedded().unwrap()
    }

    fn database_line(id: &str, name: &str, quantity: f64, unit: &str) -> MaterialItem {
        MaterialItem {
            id: id.into(),
            name: name.into(),
            quantity,
            unit: unit.into(),
            factor: 0.0,
            category: "steel".into(),
            source: String::new(),
            is_custom: false,
        }
    }

    #[test]
    fn test_unit_spellings_share_a_symbol() {
        for raw in ["m³", "M3", "cubic metres", "m 3"] {
            assert_eq!(parse_unit(raw).map(|u| u.symbol), Some("m3"), "{raw}");
        }
        assert_eq!(parse_unit("Tonnes").map(|u| u.symbol), Some("t"));
        assert_eq!(parse_unit("Litres").map(|u| u.symbol), Some("L"));
        assert_eq!(parse_unit("bags"), None);
    }

    #[test]
    fn test_convert_within_dimension_only() {
        let kg = parse_unit("kg").unwrap();
        let t = parse_unit("t").unwrap();
        let m = parse_unit("m").unwrap();
        assert_eq!(convert(2.0, t, kg), Some(2000.0));
        assert_eq!(convert(2000.0, kg, t), Some(2.0));
        assert_eq!(convert(1.0, m, kg), None);
    }

    #[test]
    fn test_emission_units() {
        assert_eq!(EmissionUnit::KgCo2e.convert(1500.0, EmissionUnit::TCo2e), 1.5);
        assert_eq!(EmissionUnit::TCo2e.convert(1.5, EmissionUnit::KgCo2e), 1500.0);
        assert_eq!(EmissionUnit::TCo2e.symbol(), "tCO2e");
    }

    #[test]
    fn test_tonnes_are_converted_to_record_unit() {
        let mut items = vec![database_line("rebar-500e-12mm", "Rebar", 2.0, "tonnes")];
        let warnings = normalize_units(&mut items, dataset());
        assert_eq!(items[0].quantity, 2000.0);
        assert_eq!(items[0].unit, "kg");
        assert_eq!(warnings[0].level, WarningLevel::Info);
        assert_eq!(warnings[0].message, "Converted 2 t to 2000 kg");
    }

    #[test]
    fn test_steel_framing_length_becomes_mass() {
        let mut items = vec![database_line("structural-steel-ub", "Steel stud", 10.0, "lm")];
        normalize_units(&mut items, dataset());
        assert_eq!(items[0].quantity, 25.0);
        assert_eq!(items[0].unit, "kg");
    }

    #[test]
    fn test_incompatible_units_are_flagged_not_changed() {
        let mut items = vec![database_line("concrete-32mpa", "Concrete", 5000.0, "kg")];
        let warnings = normalize_units(&mut items, dataset());
        assert_eq!(items[0].quantity, 5000.0);
        assert_eq!(items[0].unit, "kg");
        assert_eq!(warnings[0].level, WarningLevel::Warning);
        assert_eq!(warnings[0].message, "Unit mismatch (input: kg, dataset: m3)");
    }

    #[test]
    fn test_custom_lines_are_only_checked_for_a_known_unit() {
        let mut custom = database_line("rebar-500e-12mm", "Rebar", 2.0, "t");
        custom.is_custom = true;
        let mut odd = custom.clone();
        odd.unit = "bags".into();
        let mut items = vec![custom, odd];
        let warnings = normalize_units(&mut items, dataset());
        assert_eq!(items[0].quantity, 2.0);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Non-standard unit \"bags\"");
    }
}
