use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_NOTES_LEN: usize = 5000;
pub const MAX_CATEGORY_LEN: usize = 100;
pub const MAX_UNIT_LEN: usize = 50;
pub const MAX_SOURCE_LEN: usize = 200;
pub const MAX_PERIOD_LEN: usize = 100;
pub const MAX_AUDITOR_LEN: usize = 100;

/// Upper bound for fuel quantities.
pub const MAX_QUANTITY: f64 = 1_000_000.0;
/// Upper bound for material, electricity and transport quantities.
pub const MAX_BULK_QUANTITY: f64 = 10_000_000.0;
pub const MAX_FACTOR: f64 = 100_000.0;
pub const MAX_MATERIALS: usize = 500;
/// 2^53 - 1, the largest integer an f64 represents exactly.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
/// Smallest non-zero floor area accepted for per-m² intensities.
pub const MIN_BUILDING_AREA_M2: f64 = 1.0;

// ---- Keys ------------------------------------------------------------------

/// Australian state or territory the project is reported under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Jurisdiction {
    #[default]
    Nsw,
    Vic,
    Qld,
    Sa,
    Wa,
    Tas,
    Nt,
    Act,
}

pub const JURISDICTION_CODES: &[&str] = &["NSW", "VIC", "QLD", "SA", "WA", "TAS", "NT", "ACT"];

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 8] = [
        Jurisdiction::Nsw,
        Jurisdiction::Vic,
        Jurisdiction::Qld,
        Jurisdiction::Sa,
        Jurisdiction::Wa,
        Jurisdiction::Tas,
        Jurisdiction::Nt,
        Jurisdiction::Act,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Jurisdiction::Nsw => "NSW",
            Jurisdiction::Vic => "VIC",
            Jurisdiction::Qld => "QLD",
            Jurisdiction::Sa => "SA",
            Jurisdiction::Wa => "WA",
            Jurisdiction::Tas => "TAS",
            Jurisdiction::Nt => "NT",
            Jurisdiction::Act => "ACT",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|j| j.code() == code)
    }
}

/// A fixed vocabulary of input-map keys with a shared quantity ceiling.
pub trait InputKey: Copy + Ord + 'static {
    /// Every recognized key, in presentation order.
    const ALL: &'static [Self];
    /// Largest accepted quantity for any key of this kind.
    const MAX: f64;

    fn key(self) -> &'static str;

    fn from_key(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.key() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelKind {
    DieselTransport,
    DieselStationary,
    Petrol,
    Lpg,
    NaturalGas,
}

impl InputKey for FuelKind {
    const ALL: &'static [Self] = &[
        FuelKind::DieselTransport,
        FuelKind::DieselStationary,
        FuelKind::Petrol,
        FuelKind::Lpg,
        FuelKind::NaturalGas,
    ];
    const MAX: f64 = MAX_QUANTITY;

    fn key(self) -> &'static str {
        match self {
            FuelKind::DieselTransport => "diesel_transport",
            FuelKind::DieselStationary => "diesel_stationary",
            FuelKind::Petrol => "petrol",
            FuelKind::Lpg => "lpg",
            FuelKind::NaturalGas => "natural_gas",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectricityKey {
    Kwh,
}

impl InputKey for ElectricityKey {
    const ALL: &'static [Self] = &[ElectricityKey::Kwh];
    const MAX: f64 = MAX_BULK_QUANTITY;

    fn key(self) -> &'static str {
        "kwh"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    CommuteCar,
    CommuteUte,
    WasteGeneral,
}

impl InputKey for TransportKind {
    const ALL: &'static [Self] = &[
        TransportKind::CommuteCar,
        TransportKind::CommuteUte,
        TransportKind::WasteGeneral,
    ];
    const MAX: f64 = MAX_BULK_QUANTITY;

    fn key(self) -> &'static str {
        match self {
            TransportKind::CommuteCar => "commute_car",
            TransportKind::CommuteUte => "commute_ute",
            TransportKind::WasteGeneral => "waste_general",
        }
    }
}

// ---- Raw boundary shapes -----------------------------------------------------

/// A scalar form value exactly as it arrived. Objects, arrays and nulls are
/// kept as `Other` so validation can report what was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawValue {
    /// JSON type name, as used in "Expected X, received Y" messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Flag(_) => "boolean",
            RawValue::Number(_) => "number",
            RawValue::Text(_) => "string",
            RawValue::Other(serde_json::Value::Null) => "null",
            RawValue::Other(serde_json::Value::Bool(_)) => "boolean",
            RawValue::Other(serde_json::Value::Number(_)) => "number",
            RawValue::Other(serde_json::Value::String(_)) => "string",
            RawValue::Other(serde_json::Value::Array(_)) => "array",
            RawValue::Other(serde_json::Value::Object(_)) => "object",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            RawValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Flag(value)
    }
}

/// One materials row before validation. Every field accepts any JSON value;
/// a wrongly typed field fails this row only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMaterial {
    pub id: Option<RawValue>,
    pub name: Option<RawValue>,
    pub quantity: Option<RawValue>,
    pub unit: Option<RawValue>,
    pub factor: Option<RawValue>,
    pub category: Option<RawValue>,
    pub source: Option<RawValue>,
    pub is_custom: Option<RawValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProjectDetails {
    pub name: Option<RawValue>,
    pub location: Option<RawValue>,
    pub period: Option<RawValue>,
    pub auditor: Option<RawValue>,
}

/// Untyped calculation document, exactly as posted by the calculator form or
/// a bulk-import parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCalculation {
    pub project_details: RawProjectDetails,
    pub materials: Vec<RawMaterial>,
    pub fuel_inputs: BTreeMap<String, RawValue>,
    pub electricity_inputs: BTreeMap<String, RawValue>,
    pub transport_inputs: BTreeMap<String, RawValue>,
    pub lifecycle: Option<LifecycleInputs>,
}

// ---- Validated shapes --------------------------------------------------------

/// One line of the materials schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialItem {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub factor: f64,
    pub category: String,
    pub source: String,
    /// User-entered rather than taken from the factor database.
    pub is_custom: bool,
}

impl MaterialItem {
    /// Emissions of this line: quantity x factor.
    pub fn contribution(&self) -> f64 {
        self.quantity * self.factor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetails {
    pub name: Option<String>,
    pub location: Jurisdiction,
    pub period: Option<String>,
    pub auditor: Option<String>,
}

/// Validated quantities keyed by a recognized input key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuantityMap<K: InputKey> {
    quantities: BTreeMap<K, f64>,
}

impl<K: InputKey> Default for QuantityMap<K> {
    fn default() -> Self {
        Self {
            quantities: BTreeMap::new(),
        }
    }
}

impl<K: InputKey> QuantityMap<K> {
    pub(crate) fn from_map(quantities: BTreeMap<K, f64>) -> Self {
        Self { quantities }
    }

    /// Quantity for `key`; absent keys read as 0.
    pub fn get(&self, key: K) -> f64 {
        self.quantities.get(&key).copied().unwrap_or(0.0)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, f64)> + '_ {
        self.quantities.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }
}

impl<K: InputKey> FromIterator<(K, f64)> for QuantityMap<K> {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

pub type FuelInput = QuantityMap<FuelKind>;
pub type ElectricityInput = QuantityMap<ElectricityKey>;
pub type TransportInput = QuantityMap<TransportKind>;

impl QuantityMap<ElectricityKey> {
    pub fn kwh(&self) -> f64 {
        self.get(ElectricityKey::Kwh)
    }
}

/// B1-B7 use-phase emissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsePhase {
    pub b1_use: f64,
    pub b2_maintenance: f64,
    pub b3_repair: f64,
    pub b4_replacement: f64,
    pub b5_refurbishment: f64,
    pub b6_operational_energy: f64,
    pub b7_operational_water: f64,
}

/// C1-C4 end-of-life emissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndOfLife {
    pub c1_deconstruction: f64,
    pub c2_transport: f64,
    pub c3_waste_processing: f64,
    pub c4_disposal: f64,
}

/// Module D credits, held as non-negative magnitudes and subtracted from the
/// whole-life total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleD {
    pub recycling_credits: f64,
    pub reuse_credits: f64,
    pub energy_recovery_credits: f64,
}

/// Lifecycle stages that are entered directly rather than derived from the
/// scope inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleInputs {
    pub a5_construction: f64,
    pub use_phase: UsePhase,
    pub end_of_life: EndOfLife,
    pub module_d: ModuleD,
    pub building_area_m2: Option<f64>,
}

impl LifecycleInputs {
    /// Every stage value with its field path, for validation.
    pub fn stage_values(&self) -> [(&'static str, f64); 15] {
        let u = &self.use_phase;
        let c = &self.end_of_life;
        let d = &self.module_d;
        [
            ("a5_construction", self.a5_construction),
            ("use_phase.b1_use", u.b1_use),
            ("use_phase.b2_maintenance", u.b2_maintenance),
            ("use_phase.b3_repair", u.b3_repair),
            ("use_phase.b4_replacement", u.b4_replacement),
            ("use_phase.b5_refurbishment", u.b5_refurbishment),
            ("use_phase.b6_operational_energy", u.b6_operational_energy),
            ("use_phase.b7_operational_water", u.b7_operational_water),
            ("end_of_life.c1_deconstruction", c.c1_deconstruction),
            ("end_of_life.c2_transport", c.c2_transport),
            ("end_of_life.c3_waste_processing", c.c3_waste_processing),
            ("end_of_life.c4_disposal", c.c4_disposal),
            ("module_d.recycling_credits", d.recycling_credits),
            ("module_d.reuse_credits", d.reuse_credits),
            ("module_d.energy_recovery_credits", d.energy_recovery_credits),
        ]
    }
}

/// Typed, already-validated calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationInput {
    pub project: ProjectDetails,
    pub materials: Vec<MaterialItem>,
    pub fuel: FuelInput,
    pub electricity: ElectricityInput,
    pub transport: TransportInput,
    pub lifecycle: Option<LifecycleInputs>,
}

// ---- Derived outputs ---------------------------------------------------------

/// Scope totals in kgCO2e.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub scope1: f64,
    pub scope2: f64,
    pub scope3_materials: f64,
    pub scope3_transport: f64,
    pub total: f64,
}

impl Totals {
    pub fn from_components(
        scope1: f64,
        scope2: f64,
        scope3_materials: f64,
        scope3_transport: f64,
    ) -> Self {
        Totals {
            scope1,
            scope2,
            scope3_materials,
            scope3_transport,
            total: scope1 + scope2 + scope3_materials + scope3_transport,
        }
    }

    pub fn scope3(&self) -> f64 {
        self.scope3_materials + self.scope3_transport
    }
}

/// EN 15978 stage totals for the whole building life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WholeLifeTotals {
    pub a1a3_product: f64,
    pub a4_transport: f64,
    pub a5_construction: f64,
    pub use_phase: UsePhase,
    pub end_of_life: EndOfLife,
    pub module_d: ModuleD,
    pub total_upfront: f64,
    pub total_embodied: f64,
    pub total_operational: f64,
    pub total_whole_life: f64,
    pub total_with_benefits: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity_upfront: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity_whole_life: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity_with_benefits: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Scope1,
    Scope2,
    Scope3Materials,
    Scope3Transport,
}

/// One contributing line of a scope total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub label: String,
    pub emissions: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeBreakdown {
    pub scope: Scope,
    pub entries: Vec<BreakdownEntry>,
}
