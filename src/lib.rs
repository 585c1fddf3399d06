#![forbid(unsafe_code)]

//! Carbon emissions calculation core for Australian construction projects.
//!
//! Raw calculator input is sanitized, validated, resolved against a static
//! emission factor dataset, aggregated into scope 1/2/3 totals and checked by
//! a totals guard before it is returned.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod factors;
pub mod guards;
pub mod pipeline;
pub mod sanitize;
pub mod schema;
pub mod types;
pub mod units;
pub mod warnings;

pub use aggregate::{aggregate, whole_life_totals, Aggregation};
pub use config::PipelineConfig;
pub use error::{ConfigError, DatasetError, GuardFailure, PipelineError};
pub use factors::{FactorDataset, FactorQuery, FactorRecord, Matches, MaterialCategory};
pub use guards::TotalsGuard;
pub use pipeline::{CalculationContext, CalculationReport, Outcome, Pipeline};
pub use schema::{
    validate_calculation, RejectedRow, ValidatedCalculation, ValidationErrors, ValidationIssue,
};
pub use types::{
    CalculationInput, FuelKind, Jurisdiction, LifecycleInputs, MaterialItem, RawCalculation,
    RawMaterial, RawValue, Totals, TransportKind, WholeLifeTotals,
};
pub use units::{normalize_units, EmissionUnit, Unit};
pub use warnings::{CalculationWarning, WarningLevel};
