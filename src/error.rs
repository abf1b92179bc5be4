use thiserror::Error;

/// Errors reported by the zone model and its validation harness.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Signal {signal} has {found} samples, expected {expected}")]
    DimensionMismatch {
        signal: String,
        expected: usize,
        found: usize,
    },

    #[error("Energy balance did not resolve{}: {reason}", step_suffix(.step))]
    SolverDivergence { step: Option<usize>, reason: String },

    #[error("Unknown case {0:?}")]
    UnknownCase(String),

    #[error("Malformed reference file {path}: {reason}")]
    MalformedReferenceFile { path: String, reason: String },
}

fn step_suffix(step: &Option<usize>) -> String {
    match step {
        Some(step) => format!(" at step {step}"),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn divergence(step: Option<usize>, reason: impl Into<String>) -> Self {
        Error::SolverDivergence {
            step,
            reason: reason.into(),
        }
    }
}

/// Fail with `InvalidParameter` unless `value` is finite and strictly positive.
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(name, format!("must be positive, got {value}")))
    }
}

/// Fail with `InvalidParameter` unless `value` is finite and non-negative.
pub(crate) fn ensure_non_negative(name: &str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(
            name,
            format!("must be non-negative, got {value}"),
        ))
    }
}

/// Fail with `InvalidParameter` unless `value` lies within [0, 1].
pub(crate) fn ensure_fraction(name: &str, value: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid(
            name,
            format!("must be within [0, 1], got {value}"),
        ))
    }
}
