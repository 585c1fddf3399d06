use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::factors::FactorDataset;
use crate::guards::TotalsGuard;
use crate::sanitize::sanitize_calculation;
use crate::schema::{validate_calculation, RejectedRow, ValidationErrors, ValidationIssue};
use crate::types::{ProjectDetails, RawCalculation, ScopeBreakdown, Totals, WholeLifeTotals};
use crate::units::normalize_units;
use crate::warnings::{plausibility_warnings, CalculationWarning};

/// Per-invocation state, passed explicitly instead of living in globals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationContext {
    pub calculation_id: Uuid,
    pub requested_at: DateTime<Utc>,
}

impl CalculationContext {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(calculation_id: Uuid) -> Self {
        Self {
            calculation_id,
            requested_at: Utc::now(),
        }
    }
}

impl Default for CalculationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationReport {
    pub calculation_id: Uuid,
    pub requested_at: DateTime<Utc>,
    pub dataset_version: String,
    pub project: ProjectDetails,
    pub totals: Totals,
    pub breakdown: Vec<ScopeBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whole_life: Option<WholeLifeTotals>,
    /// Material rows dropped by the lenient collection pass.
    pub rejected: Vec<RejectedRow>,
    /// Unit conversions and implausible quantities. Never blocks a result.
    pub warnings: Vec<CalculationWarning>,
}

/// Result of one run. Field-level problems are an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Computed(CalculationReport),
    Invalid(ValidationErrors),
}

impl Outcome {
    pub fn report(&self) -> Option<&CalculationReport> {
        match self {
            Outcome::Computed(report) => Some(report),
            Outcome::Invalid(_) => None,
        }
    }

    pub fn errors(&self) -> Option<&ValidationErrors> {
        match self {
            Outcome::Computed(_) => None,
            Outcome::Invalid(errors) => Some(errors),
        }
    }
}

/// sanitize -> validate -> normalise units -> resolve -> aggregate -> guard.
///
/// Holds no mutable state; one instance can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct Pipeline<'d> {
    config: PipelineConfig,
    dataset: Cow<'d, FactorDataset>,
}

impl<'d> Pipeline<'d> {
    pub fn new(config: PipelineConfig, dataset: &'d FactorDataset) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            dataset: Cow::Borrowed(dataset),
        })
    }

    pub fn with_owned_dataset(
        config: PipelineConfig,
        dataset: FactorDataset,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            dataset: Cow::Owned(dataset),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn dataset(&self) -> &FactorDataset {
        &self.dataset
    }

    /// Untyped entry point. Malformed JSON is reported as a single issue at
    /// path `body`.
    pub fn run_json(&self, ctx: &CalculationContext, body: &str) -> Result<Outcome, PipelineError> {
        match serde_json::from_str::<RawCalculation>(body) {
            Ok(raw) => self.run(ctx, raw),
            Err(e) => {
                info!(
                    calculation_id = %ctx.calculation_id,
                    error = %e,
                    "calculation body is not valid JSON"
                );
                Ok(Outcome::Invalid(ValidationErrors {
                    issues: vec![ValidationIssue::new("body", format!("Invalid JSON: {e}"))],
                }))
            }
        }
    }

    pub fn run(
        &self,
        ctx: &CalculationContext,
        raw: RawCalculation,
    ) -> Result<Outcome, PipelineError> {
        let span = info_span!("calculation", calculation_id = %ctx.calculation_id);
        let _entered = span.enter();

        // 1. Sanitize and validate at the boundary.
        let clean = sanitize_calculation(raw);
        let validated = match validate_calculation(clean, &self.config) {
            Ok(validated) => validated,
            Err(errors) => {
                info!(issues = errors.len(), "calculation failed validation");
                return Ok(Outcome::Invalid(errors));
            }
        };
        for row in &validated.rejected {
            let reason = row
                .issues
                .first()
                .map(ToString::to_string)
                .unwrap_or_default();
            warn!(index = row.index, %reason, "material row rejected");
        }

        // 2. Database-sourced rows move to their record's unit and take its
        //    factor.
        let mut input = validated.input;
        let mut warnings = normalize_units(&mut input.materials, &self.dataset);
        let resolved = self.dataset.apply_dataset_factors(&mut input.materials);

        // 3. Aggregate.
        let aggregation = aggregate(&input, &self.dataset);

        // 4. Guard before anything leaves the pipeline.
        if let Err(failure) = TotalsGuard::check(&aggregation.totals) {
            error!(%failure, "totals guard rejected aggregation");
            return Err(failure.into());
        }
        if let Some(whole_life) = &aggregation.whole_life {
            if let Err(failure) = TotalsGuard::check_whole_life(whole_life) {
                error!(%failure, "whole-life guard rejected aggregation");
                return Err(failure.into());
            }
        }

        // 5. Plausibility review of what was computed.
        warnings.extend(plausibility_warnings(&input.materials, &aggregation.totals));
        for warning in &warnings {
            info!(
                subject = %warning.subject,
                level = ?warning.level,
                message = %warning.message,
                "calculation warning"
            );
        }

        debug!(
            materials = input.materials.len(),
            resolved,
            rejected = validated.rejected.len(),
            warnings = warnings.len(),
            total = aggregation.totals.total,
            "calculation computed"
        );

        Ok(Outcome::Computed(CalculationReport {
            calculation_id: ctx.calculation_id,
            requested_at: ctx.requested_at,
            dataset_version: self.dataset.version().to_string(),
            project: input.project,
            totals: aggregation.totals,
            breakdown: aggregation.breakdown,
            whole_life: aggregation.whole_life,
            rejected: validated.rejected,
            warnings,
        }))
    }
}

impl Pipeline<'static> {
    /// Pipeline over the dataset named by `config`, or the embedded one.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        let loaded = match &config.dataset_path {
            Some(path) => FactorDataset::from_path(path).map(Cow::Owned),
            None => FactorDataset::embedded().map(Cow::Borrowed),
        };
        let dataset = match loaded {
            Ok(dataset) => dataset,
            Err(e) => {
                error!(error = %e, "factor dataset unavailable");
                return Err(e.into());
            }
        };
        config.validate()?;
        Ok(Self { config, dataset })
    }
}
