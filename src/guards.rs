use crate::error::GuardFailure;
use crate::types::{Totals, WholeLifeTotals};

/// TotalsGuard: last check before a result leaves the pipeline. Any failure
/// here is a defect upstream, never bad user input.
pub struct TotalsGuard;

fn finite_non_negative(field: &'static str, value: f64) -> Result<(), GuardFailure> {
    if !value.is_finite() {
        return Err(GuardFailure::NonFinite { field });
    }
    if value < 0.0 {
        return Err(GuardFailure::Negative { field, value });
    }
    Ok(())
}

fn sum_matches(field: &'static str, actual: f64, expected: f64) -> Result<(), GuardFailure> {
    if actual == expected {
        Ok(())
    } else {
        Err(GuardFailure::SumMismatch {
            field,
            expected,
            actual,
        })
    }
}

impl TotalsGuard {
    pub fn check(totals: &Totals) -> Result<(), GuardFailure> {
        finite_non_negative("scope1", totals.scope1)?;
        finite_non_negative("scope2", totals.scope2)?;
        finite_non_negative("scope3_materials", totals.scope3_materials)?;
        finite_non_negative("scope3_transport", totals.scope3_transport)?;
        finite_non_negative("total", totals.total)?;

        // Same addition order as Totals::from_components, so equality is exact.
        let expected =
            totals.scope1 + totals.scope2 + totals.scope3_materials + totals.scope3_transport;
        sum_matches("total", totals.total, expected)
    }

    /// Stage values must be finite and non-negative, and every aggregate must
    /// re-derive from its stages. `total_with_benefits` may go negative when
    /// Module D credits exceed the whole-life total.
    pub fn check_whole_life(wl: &WholeLifeTotals) -> Result<(), GuardFailure> {
        let u = &wl.use_phase;
        let c = &wl.end_of_life;
        let d = &wl.module_d;

        let stages: [(&'static str, f64); 17] = [
            ("a1a3_product", wl.a1a3_product),
            ("a4_transport", wl.a4_transport),
            ("a5_construction", wl.a5_construction),
            ("b1_use", u.b1_use),
            ("b2_maintenance", u.b2_maintenance),
            ("b3_repair", u.b3_repair),
            ("b4_replacement", u.b4_replacement),
            ("b5_refurbishment", u.b5_refurbishment),
            ("b6_operational_energy", u.b6_operational_energy),
            ("b7_operational_water", u.b7_operational_water),
            ("c1_deconstruction", c.c1_deconstruction),
            ("c2_transport", c.c2_transport),
            ("c3_waste_processing", c.c3_waste_processing),
            ("c4_disposal", c.c4_disposal),
            ("recycling_credits", d.recycling_credits),
            ("reuse_credits", d.reuse_credits),
            ("energy_recovery_credits", d.energy_recovery_credits),
        ];
        for (field, value) in stages {
            finite_non_negative(field, value)?;
        }

        let upfront = wl.a1a3_product + wl.a4_transport + wl.a5_construction;
        sum_matches("total_upfront", wl.total_upfront, upfront)?;

        let embodied = upfront
            + (u.b1_use + u.b2_maintenance + u.b3_repair + u.b4_replacement + u.b5_refurbishment)
            + (c.c1_deconstruction + c.c2_transport + c.c3_waste_processing + c.c4_disposal);
        sum_matches("total_embodied", wl.total_embodied, embodied)?;

        let operational = u.b6_operational_energy + u.b7_operational_water;
        sum_matches("total_operational", wl.total_operational, operational)?;

        let whole_life = embodied + operational;
        sum_matches("total_whole_life", wl.total_whole_life, whole_life)?;

        let credits = d.recycling_credits + d.reuse_credits + d.energy_recovery_credits;
        if !wl.total_with_benefits.is_finite() {
            return Err(GuardFailure::NonFinite {
                field: "total_with_benefits",
            });
        }
        sum_matches("total_with_benefits", wl.total_with_benefits, whole_life - credits)?;

        // Intensities may be negative with Module D credits, never infinite.
        let intensities = [
            ("intensity_upfront", wl.intensity_upfront),
            ("intensity_whole_life", wl.intensity_whole_life),
            ("intensity_with_benefits", wl.intensity_with_benefits),
        ];
        for (field, value) in intensities {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(GuardFailure::NonFinite { field });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::whole_life_totals;
    use crate::types::LifecycleInputs;

    #[test]
    fn test_consistent_totals_pass() {
        let t = Totals::from_components(1350.0, 660.0, 1900.0, 22.0);
        assert!(TotalsGuard::check(&t).is_ok());
        assert!(TotalsGuard::check(&Totals::default()).is_ok());
    }

    #[test]
    fn test_tampered_total_fails() {
        let mut t = Totals::from_components(1.0, 2.0, 3.0, 4.0);
        t.total += 0.5;
        assert!(matches!(
            TotalsGuard::check(&t),
            Err(GuardFailure::SumMismatch { field: "total", .. })
        ));
    }

    #[test]
    fn test_negative_and_non_finite_components_fail() {
        let t = Totals::from_components(-1.0, 0.0, 0.0, 0.0);
        assert_eq!(
            TotalsGuard::check(&t),
            Err(GuardFailure::Negative {
                field: "scope1",
                value: -1.0
            })
        );

        let t = Totals::from_components(0.0, f64::INFINITY, 0.0, 0.0);
        assert_eq!(
            TotalsGuard::check(&t),
            Err(GuardFailure::NonFinite { field: "scope2" })
        );
    }

    #[test]
    fn test_whole_life_rollup_passes() {
        let mut lifecycle = LifecycleInputs {
            a5_construction: 12.5,
            ..LifecycleInputs::default()
        };
        lifecycle.use_phase.b4_replacement = 8.0;
        lifecycle.use_phase.b7_operational_water = 3.0;
        lifecycle.module_d.reuse_credits = 5000.0;
        let wl = whole_life_totals(&Totals::from_components(0.0, 0.0, 100.0, 10.0), &lifecycle);
        assert!(wl.total_with_benefits < 0.0);
        assert!(TotalsGuard::check_whole_life(&wl).is_ok());
    }

    #[test]
    fn test_infinite_intensity_fails() {
        let lifecycle = LifecycleInputs {
            a5_construction: 10.0,
            building_area_m2: Some(1e-320),
            ..LifecycleInputs::default()
        };
        let wl = whole_life_totals(&Totals::default(), &lifecycle);
        assert_eq!(
            TotalsGuard::check_whole_life(&wl),
            Err(GuardFailure::NonFinite {
                field: "intensity_upfront"
            })
        );
    }

    #[test]
    fn test_whole_life_mismatch_fails() {
        let mut wl = whole_life_totals(&Totals::default(), &LifecycleInputs::default());
        wl.total_operational = 1.0;
        assert!(matches!(
            TotalsGuard::check_whole_life(&wl),
            Err(GuardFailure::SumMismatch {
                field: "total_operational",
                ..
            })
        ));
    }
}
