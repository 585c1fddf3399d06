//! Emission factor dataset and lookups.
//!
//! The dataset is a versioned, read-only JSON document. The embedded copy is
//! parsed once per process; alternative datasets can be loaded from disk.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DatasetError;
use crate::types::{FuelKind, InputKey, Jurisdiction, MaterialItem, TransportKind};

const EMBEDDED_JSON: &str = include_str!("../data/emission_factors.json");

static EMBEDDED: LazyLock<Result<FactorDataset, DatasetError>> =
    LazyLock::new(|| FactorDataset::from_json(EMBEDDED_JSON));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialCategory {
    Concrete,
    Cement,
    Steel,
    Aluminium,
    Timber,
    Glass,
    Insulation,
    Plasterboard,
    Brick,
    Roofing,
    Flooring,
    Paint,
    Adhesives,
    Waterproofing,
    Plastics,
    Mechanical,
    Electrical,
    Plumbing,
    Other,
}

impl MaterialCategory {
    pub fn key(self) -> &'static str {
        match self {
            MaterialCategory::Concrete => "concrete",
            MaterialCategory::Cement => "cement",
            MaterialCategory::Steel => "steel",
            MaterialCategory::Aluminium => "aluminium",
            MaterialCategory::Timber => "timber",
            MaterialCategory::Glass => "glass",
            MaterialCategory::Insulation => "insulation",
            MaterialCategory::Plasterboard => "plasterboard",
            MaterialCategory::Brick => "brick",
            MaterialCategory::Roofing => "roofing",
            MaterialCategory::Flooring => "flooring",
            MaterialCategory::Paint => "paint",
            MaterialCategory::Adhesives => "adhesives",
            MaterialCategory::Waterproofing => "waterproofing",
            MaterialCategory::Plastics => "plastics",
            MaterialCategory::Mechanical => "mechanical",
            MaterialCategory::Electrical => "electrical",
            MaterialCategory::Plumbing => "plumbing",
            MaterialCategory::Other => "other",
        }
    }

    /// Display label used for grouping and ordering.
    pub fn label(self) -> &'static str {
        match self {
            MaterialCategory::Concrete => "Concrete & Cement",
            MaterialCategory::Cement => "Cement",
            MaterialCategory::Steel => "Steel & Metals",
            MaterialCategory::Aluminium => "Aluminium",
            MaterialCategory::Timber => "Timber",
            MaterialCategory::Glass => "Glass",
            MaterialCategory::Insulation => "Insulation",
            MaterialCategory::Plasterboard => "Plasterboard & Linings",
            MaterialCategory::Brick => "Brick & Masonry",
            MaterialCategory::Roofing => "Roofing",
            MaterialCategory::Flooring => "Flooring",
            MaterialCategory::Paint => "Paint & Coatings",
            MaterialCategory::Adhesives => "Adhesives & Sealants",
            MaterialCategory::Waterproofing => "Waterproofing",
            MaterialCategory::Plastics => "Plastics & Polymers",
            MaterialCategory::Mechanical => "Mechanical Services",
            MaterialCategory::Electrical => "Electrical",
            MaterialCategory::Plumbing => "Plumbing",
            MaterialCategory::Other => "Other",
        }
    }
}

/// One material with its EN 15804 stage factors, in kgCO2e per declared unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorRecord {
    pub id: String,
    pub name: String,
    pub category: MaterialCategory,
    pub subcategory: String,
    pub unit: String,
    pub ef_a1a3: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_a4: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_a5: Option<f64>,
    pub ef_total: f64,
    pub data_source: String,
    pub data_quality_tier: String,
    pub region: String,
    #[serde(default)]
    pub suppliers: Vec<String>,
    pub year: u16,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_verified: bool,
}

impl FactorRecord {
    fn matches_term(&self, term_lower: &str) -> bool {
        self.name.to_lowercase().contains(term_lower)
            || self.subcategory.to_lowercase().contains(term_lower)
            || self.notes.to_lowercase().contains(term_lower)
            || self
                .suppliers
                .iter()
                .any(|s| s.to_lowercase().contains(term_lower))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFactor {
    pub name: String,
    pub factor: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridFactor {
    pub name: String,
    pub factor: f64,
}

#[derive(Debug, Deserialize)]
struct DatasetDocument {
    version: String,
    materials: Vec<FactorRecord>,
    fuels: BTreeMap<FuelKind, InputFactor>,
    transport: BTreeMap<TransportKind, InputFactor>,
    grid: BTreeMap<Jurisdiction, GridFactor>,
}

/// Read-only factor tables, materials pre-sorted by category label then name.
#[derive(Debug, Clone)]
pub struct FactorDataset {
    version: String,
    materials: Vec<FactorRecord>,
    by_id: HashMap<String, usize>,
    fuels: BTreeMap<FuelKind, InputFactor>,
    transport: BTreeMap<TransportKind, InputFactor>,
    grid: BTreeMap<Jurisdiction, GridFactor>,
}

/// Case-folded comparison with the raw string as tie-break, so the order is
/// total and stable across runs.
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn record_order(a: &FactorRecord, b: &FactorRecord) -> Ordering {
    collate(a.category.label(), b.category.label()).then_with(|| collate(&a.name, &b.name))
}

fn check_factor(what: &str, factor: f64) -> Result<(), DatasetError> {
    if factor.is_finite() && factor >= 0.0 {
        Ok(())
    } else {
        Err(DatasetError::Inconsistent(format!(
            "{what} has invalid factor {factor}"
        )))
    }
}

impl FactorDataset {
    /// The dataset bundled with the crate, parsed on first use.
    pub fn embedded() -> Result<&'static FactorDataset, DatasetError> {
        EMBEDDED.as_ref().map_err(Clone::clone)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| DatasetError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        let doc: DatasetDocument =
            serde_json::from_str(json).map_err(|e| DatasetError::Parse(e.to_string()))?;
        Self::from_document(doc)
    }

    fn from_document(doc: DatasetDocument) -> Result<Self, DatasetError> {
        for kind in FuelKind::ALL {
            let factor = doc.fuels.get(kind).ok_or_else(|| {
                DatasetError::Inconsistent(format!("missing fuel factor '{}'", kind.key()))
            })?;
            check_factor(kind.key(), factor.factor)?;
        }
        for kind in TransportKind::ALL {
            let factor = doc.transport.get(kind).ok_or_else(|| {
                DatasetError::Inconsistent(format!("missing transport factor '{}'", kind.key()))
            })?;
            check_factor(kind.key(), factor.factor)?;
        }
        for jurisdiction in Jurisdiction::ALL {
            let factor = doc.grid.get(&jurisdiction).ok_or_else(|| {
                DatasetError::Inconsistent(format!("missing grid factor '{}'", jurisdiction.code()))
            })?;
            check_factor(jurisdiction.code(), factor.factor)?;
        }

        let mut materials = doc.materials;
        for record in &materials {
            check_factor(&record.id, record.ef_total)?;
            check_factor(&record.id, record.ef_a1a3)?;
        }
        materials.sort_by(record_order);

        let mut by_id = HashMap::with_capacity(materials.len());
        for (index, record) in materials.iter().enumerate() {
            if by_id.insert(record.id.clone(), index).is_some() {
                return Err(DatasetError::Inconsistent(format!(
                    "duplicate material id '{}'",
                    record.id
                )));
            }
        }

        debug!(
            version = %doc.version,
            materials = materials.len(),
            "factor dataset loaded"
        );

        Ok(Self {
            version: doc.version,
            materials,
            by_id,
            fuels: doc.fuels,
            transport: doc.transport,
            grid: doc.grid,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// All materials in presentation order.
    pub fn materials(&self) -> &[FactorRecord] {
        &self.materials
    }

    pub fn by_id(&self, id: &str) -> Option<&FactorRecord> {
        self.by_id.get(id).map(|&i| &self.materials[i])
    }

    pub fn search(&self, query: FactorQuery) -> Matches<'_> {
        Matches {
            dataset: self,
            category: query.category,
            term: query
                .term
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty()),
        }
    }

    pub fn fuel(&self, kind: FuelKind) -> Option<&InputFactor> {
        self.fuels.get(&kind)
    }

    pub fn transport(&self, kind: TransportKind) -> Option<&InputFactor> {
        self.transport.get(&kind)
    }

    pub fn grid(&self, jurisdiction: Jurisdiction) -> Option<&GridFactor> {
        self.grid.get(&jurisdiction)
    }

    /// kgCO2e per unit of fuel. Loading guarantees every kind is present.
    pub fn fuel_factor(&self, kind: FuelKind) -> f64 {
        self.fuel(kind).map_or(0.0, |f| f.factor)
    }

    pub fn transport_factor(&self, kind: TransportKind) -> f64 {
        self.transport(kind).map_or(0.0, |f| f.factor)
    }

    /// kgCO2e per kWh for the jurisdiction's grid.
    pub fn grid_factor(&self, jurisdiction: Jurisdiction) -> f64 {
        self.grid(jurisdiction).map_or(0.0, |g| g.factor)
    }

    /// A database-sourced material line for `quantity` units of record `id`.
    pub fn resolve_material(&self, id: &str, quantity: f64) -> Option<MaterialItem> {
        self.by_id(id).map(|record| MaterialItem {
            id: record.id.clone(),
            name: record.name.clone(),
            quantity,
            unit: record.unit.clone(),
            factor: record.ef_total,
            category: record.category.key().to_string(),
            source: record.data_source.clone(),
            is_custom: false,
        })
    }

    /// Replace the factor of every non-custom line whose id is in the dataset
    /// with the record's total factor. Returns how many lines were resolved.
    pub fn apply_dataset_factors(&self, items: &mut [MaterialItem]) -> usize {
        let mut resolved = 0;
        for item in items.iter_mut().filter(|item| !item.is_custom) {
            if let Some(record) = self.by_id(&item.id) {
                item.factor = record.ef_total;
                resolved += 1;
            }
        }
        resolved
    }

    /// Categories present in the dataset, in label order.
    pub fn categories(&self) -> Vec<MaterialCategory> {
        let mut seen = Vec::new();
        for record in &self.materials {
            if !seen.contains(&record.category) {
                seen.push(record.category);
            }
        }
        seen
    }

    pub fn category_stats(&self) -> Vec<CategoryStats> {
        self.search(FactorQuery::default())
            .grouped()
            .into_iter()
            .map(|group| {
                let count = group.materials.len();
                let sum: f64 = group.materials.iter().map(|m| m.ef_total).sum();
                CategoryStats {
                    category: group.category,
                    label: group.label,
                    count,
                    avg_factor: round2(sum / count as f64),
                }
            })
            .collect()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactorQuery {
    pub category: Option<MaterialCategory>,
    pub term: Option<String>,
}

impl FactorQuery {
    pub fn term(term: impl Into<String>) -> Self {
        Self {
            category: None,
            term: Some(term.into()),
        }
    }

    pub fn category(category: MaterialCategory) -> Self {
        Self {
            category: Some(category),
            term: None,
        }
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }
}

/// Lazy search result. Cloning is cheap and every [`Matches::iter`] call
/// starts from the beginning.
#[derive(Debug, Clone)]
pub struct Matches<'a> {
    dataset: &'a FactorDataset,
    category: Option<MaterialCategory>,
    term: Option<String>,
}

impl<'a> Matches<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a FactorRecord> + '_ {
        self.dataset.materials.iter().filter(move |record| {
            self.category.map_or(true, |c| record.category == c)
                && self
                    .term
                    .as_deref()
                    .map_or(true, |t| record.matches_term(t))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Matches split per category, keeping the sequence order.
    pub fn grouped(&self) -> Vec<MaterialGroup<'a>> {
        let mut groups: Vec<MaterialGroup<'a>> = Vec::new();
        for record in self.iter() {
            match groups.last_mut() {
                Some(group) if group.category == record.category => group.materials.push(record),
                _ => groups.push(MaterialGroup {
                    category: record.category,
                    label: record.category.label(),
                    materials: vec![record],
                }),
            }
        }
        groups
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialGroup<'a> {
    pub category: MaterialCategory,
    pub label: &'static str,
    pub materials: Vec<&'a FactorRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: MaterialCategory,
    pub label: &'static str,
    pub count: usize,
    pub avg_factor: f64,
}
