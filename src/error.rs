use thiserror::Error;

/// Rejected caller-supplied parameters or configuration.
///
/// Numerical non-convergence and exhausted sampling budgets are not errors;
/// those produce best-effort answers instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("missing parameter #{index} ({name})")]
    Missing { index: usize, name: &'static str },

    #[error("parameter {name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("parameter {name} out of range: {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("playout policy {0} yields no win/loss signal for the bandit")]
    NoRewardSignal(&'static str),
}
