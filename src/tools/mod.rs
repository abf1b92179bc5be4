/// Offset between kelvin and degrees Celsius.
pub const CELSIUS_OFFSET: f64 = 273.15;

/// Reciprocal of the sum of reciprocals of >=2 arguments.
/// For thermal conductances this is the conductance of the arguments connected in series.
macro_rules! reciprocal_sum {
    ($head:expr, $( $tail:expr ),+) => {
        ($head.recip() $(+ $tail.recip())*).recip()
    }
}
pub(crate) use reciprocal_sum; // Make the macro visible

pub fn kelvin_to_celsius(value: f64) -> f64 {
    value - CELSIUS_OFFSET
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
