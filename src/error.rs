use thiserror::Error;

/// Post-aggregation consistency failure. Unreachable with correct inputs, so
/// it points at a pipeline defect rather than bad user data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardFailure {
    #[error("totals guard: {field} is not finite")]
    NonFinite { field: &'static str },
    #[error("totals guard: {field} is negative ({value})")]
    Negative { field: &'static str, value: f64 },
    #[error("totals guard: {field} = {actual} does not equal the sum of its parts ({expected})")]
    SumMismatch {
        field: &'static str,
        expected: f64,
        actual: f64,
    },
}

/// The factor dataset could not be read or is internally inconsistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("failed to read factor dataset {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("failed to parse factor dataset: {0}")]
    Parse(String),
    #[error("factor dataset is inconsistent: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    #[error("invalid configuration: {name}={value:?} is not {expected}")]
    Env {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Failures that abort a calculation. Field-level validation problems are
/// not errors; they are returned as data in [`crate::Outcome::Invalid`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Guard(#[from] GuardFailure),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
