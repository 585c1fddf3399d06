use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::factors::FactorDataset;
use crate::types::{
    BreakdownEntry, CalculationInput, InputKey, LifecycleInputs, Scope, ScopeBreakdown, Totals,
    WholeLifeTotals,
};

/// Everything derived from one validated calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub totals: Totals,
    pub breakdown: Vec<ScopeBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whole_life: Option<WholeLifeTotals>,
}

/// Compute scope totals, per-line breakdown and, when lifecycle inputs are
/// present, whole-life totals. Pure: the same input always yields
/// bit-identical output.
pub fn aggregate(input: &CalculationInput, dataset: &FactorDataset) -> Aggregation {
    let scope1_lines: Vec<(String, f64)> = input
        .fuel
        .iter()
        .map(|(kind, qty)| (kind.key().to_string(), qty * dataset.fuel_factor(kind)))
        .collect();

    let grid = dataset.grid_factor(input.project.location);
    let scope2_lines: Vec<(String, f64)> = input
        .electricity
        .iter()
        .map(|(key, kwh)| (key.key().to_string(), kwh * grid))
        .collect();

    let transport_lines: Vec<(String, f64)> = input
        .transport
        .iter()
        .map(|(kind, qty)| (kind.key().to_string(), qty * dataset.transport_factor(kind)))
        .collect();

    let scope1 = sum(&scope1_lines);
    let scope2 = sum(&scope2_lines);
    let scope3_materials = input
        .materials
        .iter()
        .fold(0.0, |acc, m| acc + m.contribution());
    let scope3_transport = sum(&transport_lines);

    let totals = Totals::from_components(scope1, scope2, scope3_materials, scope3_transport);

    let mut by_category: BTreeMap<&str, f64> = BTreeMap::new();
    for material in &input.materials {
        *by_category.entry(material.category.as_str()).or_default() += material.contribution();
    }
    let material_lines: Vec<(String, f64)> = by_category
        .into_iter()
        .map(|(category, emissions)| (category.to_string(), emissions))
        .collect();

    let breakdown = vec![
        scope_breakdown(Scope::Scope1, scope1_lines, totals.scope1),
        scope_breakdown(Scope::Scope2, scope2_lines, totals.scope2),
        scope_breakdown(Scope::Scope3Materials, material_lines, totals.scope3_materials),
        scope_breakdown(Scope::Scope3Transport, transport_lines, totals.scope3_transport),
    ];

    let whole_life = input
        .lifecycle
        .as_ref()
        .map(|lifecycle| whole_life_totals(&totals, lifecycle));

    Aggregation {
        totals,
        breakdown,
        whole_life,
    }
}

/// Left-to-right sum starting from +0.0, so empty inputs total +0.0.
fn sum(lines: &[(String, f64)]) -> f64 {
    lines.iter().fold(0.0, |acc, (_, emissions)| acc + emissions)
}

fn scope_breakdown(scope: Scope, lines: Vec<(String, f64)>, scope_total: f64) -> ScopeBreakdown {
    let mut entries: Vec<BreakdownEntry> = lines
        .into_iter()
        .map(|(label, emissions)| BreakdownEntry {
            label,
            emissions,
            percentage: if scope_total > 0.0 {
                emissions / scope_total * 100.0
            } else {
                0.0
            },
        })
        .collect();
    entries.sort_by(|a, b| {
        b.emissions
            .total_cmp(&a.emissions)
            .then_with(|| a.label.cmp(&b.label))
    });
    ScopeBreakdown { scope, entries }
}

/// EN 15978 stage roll-up. A1-A3 and A4 come from the scope totals, the
/// remaining stages from `lifecycle`. Module D is subtracted only from
/// `total_with_benefits`.
pub fn whole_life_totals(totals: &Totals, lifecycle: &LifecycleInputs) -> WholeLifeTotals {
    let u = &lifecycle.use_phase;
    let c = &lifecycle.end_of_life;
    let d = &lifecycle.module_d;

    let a1a3_product = totals.scope3_materials;
    let a4_transport = totals.scope3_transport;
    let a5_construction = lifecycle.a5_construction;

    let use_embodied =
        u.b1_use + u.b2_maintenance + u.b3_repair + u.b4_replacement + u.b5_refurbishment;
    let end_of_life = c.c1_deconstruction + c.c2_transport + c.c3_waste_processing + c.c4_disposal;
    let credits = d.recycling_credits + d.reuse_credits + d.energy_recovery_credits;

    let total_upfront = a1a3_product + a4_transport + a5_construction;
    let total_embodied = total_upfront + use_embodied + end_of_life;
    let total_operational = u.b6_operational_energy + u.b7_operational_water;
    let total_whole_life = total_embodied + total_operational;
    let total_with_benefits = total_whole_life - credits;

    let per_m2 = |value: f64| {
        lifecycle
            .building_area_m2
            .filter(|area| *area > 0.0)
            .map(|area| value / area)
    };

    WholeLifeTotals {
        a1a3_product,
        a4_transport,
        a5_construction,
        use_phase: *u,
        end_of_life: *c,
        module_d: *d,
        total_upfront,
        total_embodied,
        total_operational,
        total_whole_life,
        total_with_benefits,
        intensity_upfront: per_m2(total_upfront),
        intensity_whole_life: per_m2(total_whole_life),
        intensity_with_benefits: per_m2(total_with_benefits),
    }
}
