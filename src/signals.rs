//! Per-timestep boundary inputs and helpers for building them from daily patterns.

use crate::error::Error;

/// Boundary inputs of the zone, one sample per timestep, SI units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundarySignals {
    /// Outdoor air temperature (K), also the ventilation supply temperature
    pub outdoor_temperature: Vec<f64>,
    /// Equivalent outdoor temperature of the exterior wall (K)
    pub exterior_equivalent_temperature: Vec<f64>,
    /// Solar irradiance on the window (W/m²)
    pub window_irradiance: Vec<f64>,
    /// Solar irradiance on the exterior wall (W/m²)
    pub exterior_irradiance: Vec<f64>,
    /// Ventilation volume flow (m³/s)
    pub ventilation_flow: Vec<f64>,
    /// Convective internal gains (W)
    pub convective_gains: Vec<f64>,
    /// Radiative internal gains (W)
    pub radiative_gains: Vec<f64>,
    /// Air temperature imposed on the zone (K), read when the air temperature is prescribed
    pub air_temperature: Option<Vec<f64>>,
}

/// Boundary inputs of a single timestep.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct StepInputs {
    pub outdoor_temperature: f64,
    pub exterior_equivalent_temperature: f64,
    pub window_irradiance: f64,
    pub exterior_irradiance: f64,
    pub ventilation_flow: f64,
    pub convective_gains: f64,
    pub radiative_gains: f64,
    pub air_temperature: Option<f64>,
}

impl BoundarySignals {
    /// Every sequence holds `len` copies of the corresponding value in `inputs`.
    pub fn constant(len: usize, inputs: StepInputs) -> Self {
        BoundarySignals {
            outdoor_temperature: constant(len, inputs.outdoor_temperature),
            exterior_equivalent_temperature: constant(len, inputs.exterior_equivalent_temperature),
            window_irradiance: constant(len, inputs.window_irradiance),
            exterior_irradiance: constant(len, inputs.exterior_irradiance),
            ventilation_flow: constant(len, inputs.ventilation_flow),
            convective_gains: constant(len, inputs.convective_gains),
            radiative_gains: constant(len, inputs.radiative_gains),
            air_temperature: inputs.air_temperature.map(|t| constant(len, t)),
        }
    }

    fn named(&self) -> Vec<(&'static str, &[f64])> {
        let mut named = vec![
            ("outdoor_temperature", self.outdoor_temperature.as_slice()),
            (
                "exterior_equivalent_temperature",
                self.exterior_equivalent_temperature.as_slice(),
            ),
            ("window_irradiance", self.window_irradiance.as_slice()),
            ("exterior_irradiance", self.exterior_irradiance.as_slice()),
            ("ventilation_flow", self.ventilation_flow.as_slice()),
            ("convective_gains", self.convective_gains.as_slice()),
            ("radiative_gains", self.radiative_gains.as_slice()),
        ];
        if let Some(air_temperature) = &self.air_temperature {
            named.push(("air_temperature", air_temperature.as_slice()));
        }
        named
    }

    /// Number of timesteps, the length of the first sequence.
    pub fn len(&self) -> usize {
        self.outdoor_temperature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that all sequences share one non-zero length and hold usable values.
    pub fn validate(&self) -> Result<usize, Error> {
        let expected = self.len();
        for (name, values) in self.named() {
            if values.len() != expected {
                return Err(Error::DimensionMismatch {
                    signal: name.into(),
                    expected,
                    found: values.len(),
                });
            }
        }
        if expected == 0 {
            return Err(Error::invalid("signals", "horizon must have at least one step"));
        }

        for (name, values) in self.named() {
            let temperature = name.ends_with("temperature");
            let non_negative = name.ends_with("irradiance") || name == "ventilation_flow";
            for (step, value) in values.iter().enumerate() {
                let valid = value.is_finite()
                    && (!temperature || *value > 0.0)
                    && (!non_negative || *value >= 0.0);
                if !valid {
                    return Err(Error::invalid(
                        name,
                        format!("invalid sample {value} at step {step}"),
                    ));
                }
            }
        }
        Ok(expected)
    }

    /// Inputs of one step. Panics if `step` is out of range.
    pub fn at(&self, step: usize) -> StepInputs {
        StepInputs {
            outdoor_temperature: self.outdoor_temperature[step],
            exterior_equivalent_temperature: self.exterior_equivalent_temperature[step],
            window_irradiance: self.window_irradiance[step],
            exterior_irradiance: self.exterior_irradiance[step],
            ventilation_flow: self.ventilation_flow[step],
            convective_gains: self.convective_gains[step],
            radiative_gains: self.radiative_gains[step],
            air_temperature: self.air_temperature.as_ref().map(|t| t[step]),
        }
    }

    /// Signals of the steps from `start` to the end.
    pub fn tail(&self, start: usize) -> Self {
        let slice = |values: &Vec<f64>| values[start.min(values.len())..].to_vec();
        BoundarySignals {
            outdoor_temperature: slice(&self.outdoor_temperature),
            exterior_equivalent_temperature: slice(&self.exterior_equivalent_temperature),
            window_irradiance: slice(&self.window_irradiance),
            exterior_irradiance: slice(&self.exterior_irradiance),
            ventilation_flow: slice(&self.ventilation_flow),
            convective_gains: slice(&self.convective_gains),
            radiative_gains: slice(&self.radiative_gains),
            air_temperature: self.air_temperature.as_ref().map(slice),
        }
    }
}

pub fn constant(len: usize, value: f64) -> Vec<f64> {
    vec![value; len]
}

/// Concatenate `days` copies of a one-day pattern.
pub fn tile(pattern: &[f64], days: usize) -> Vec<f64> {
    pattern.repeat(days)
}

/// Repeat every sample `factor` times, e.g. hourly values onto a finer resolution.
pub fn repeat_each(samples: &[f64], factor: usize) -> Vec<f64> {
    samples
        .iter()
        .flat_map(|value| std::iter::repeat(*value).take(factor))
        .collect()
}

/// Multiply every value above `threshold` by `factor`, leave the rest untouched.
/// Used to emulate shading of strong irradiance.
pub fn scale_above(values: &[f64], threshold: f64, factor: f64) -> Vec<f64> {
    values
        .iter()
        .map(|value| {
            if *value > threshold {
                value * factor
            } else {
                *value
            }
        })
        .collect()
}

/// One day at `steps_per_day` resolution, `inside` from `start_hour` (inclusive) to
/// `end_hour` (exclusive) and `outside` otherwise.
pub fn daily_window(
    steps_per_day: usize,
    start_hour: usize,
    end_hour: usize,
    inside: f64,
    outside: f64,
) -> Vec<f64> {
    let first = start_hour * steps_per_day / 24;
    let last = end_hour * steps_per_day / 24;
    (0..steps_per_day)
        .map(|step| {
            if (first..last).contains(&step) {
                inside
            } else {
                outside
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::prop;
    use test_strategy::proptest;

    fn zero_inputs() -> StepInputs {
        StepInputs {
            outdoor_temperature: 295.15,
            exterior_equivalent_temperature: 295.15,
            ..Default::default()
        }
    }

    #[test]
    fn constant_signals_validate() {
        let signals = BoundarySignals::constant(10, zero_inputs());
        assert_eq!(signals.validate(), Ok(10));
        assert_eq!(signals.at(9), zero_inputs());
    }

    #[test]
    fn length_mismatch() {
        let mut signals = BoundarySignals::constant(10, zero_inputs());
        signals.radiative_gains.pop();
        assert_matches!(
            signals.validate(),
            Err(Error::DimensionMismatch { signal, expected: 10, found: 9 }) => {
                assert_eq!(signal, "radiative_gains");
            }
        );
    }

    #[test]
    fn empty_horizon() {
        let signals = BoundarySignals::constant(0, zero_inputs());
        assert_matches!(signals.validate(), Err(Error::InvalidParameter { .. }));
    }

    #[test]
    fn negative_ventilation() {
        let mut signals = BoundarySignals::constant(5, zero_inputs());
        signals.ventilation_flow[3] = -0.01;
        assert_matches!(
            signals.validate(),
            Err(Error::InvalidParameter { name, reason }) => {
                assert_eq!(name, "ventilation_flow");
                assert!(reason.contains("step 3"));
            }
        );
    }

    #[test]
    fn non_finite_gain() {
        let mut signals = BoundarySignals::constant(5, zero_inputs());
        signals.convective_gains[0] = f64::NAN;
        assert_matches!(signals.validate(), Err(Error::InvalidParameter { .. }));
    }

    #[test]
    fn zero_kelvin_outdoor() {
        let signals = BoundarySignals::constant(5, StepInputs::default());
        assert_matches!(
            signals.validate(),
            Err(Error::InvalidParameter { name, reason: _ }) => {
                assert_eq!(name, "outdoor_temperature")
            }
        );
    }

    #[test]
    fn negative_gains_allowed() {
        // Internal gains may be negative, e.g. a cooling source
        let mut signals = BoundarySignals::constant(5, zero_inputs());
        signals.convective_gains[1] = -50.0;
        assert_eq!(signals.validate(), Ok(5));
    }

    #[test]
    fn tail_of_signals() {
        let mut signals = BoundarySignals::constant(4, zero_inputs());
        signals.radiative_gains = vec![1.0, 2.0, 3.0, 4.0];
        signals.air_temperature = Some(vec![290.0, 291.0, 292.0, 293.0]);
        let tail = signals.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.radiative_gains, vec![3.0, 4.0]);
        assert_eq!(tail.air_temperature, Some(vec![292.0, 293.0]));
        assert_eq!(tail.validate(), Ok(2));
        assert_eq!(tail.at(1).air_temperature, Some(293.0));
    }

    #[test]
    fn air_temperature_is_optional() {
        let signals = BoundarySignals::constant(3, zero_inputs());
        assert_eq!(signals.air_temperature, None);
        assert_eq!(signals.at(2).air_temperature, None);
    }

    #[test]
    fn short_air_temperature() {
        let mut signals = BoundarySignals::constant(10, zero_inputs());
        signals.air_temperature = Some(vec![295.15; 2]);
        assert_matches!(
            signals.validate(),
            Err(Error::DimensionMismatch { signal, expected: 10, found: 2 }) => {
                assert_eq!(signal, "air_temperature");
            }
        );
    }

    #[test]
    fn air_temperature_in_celsius_rejected() {
        let inputs = StepInputs {
            air_temperature: Some(-3.0),
            ..zero_inputs()
        };
        let signals = BoundarySignals::constant(4, inputs);
        assert_matches!(
            signals.validate(),
            Err(Error::InvalidParameter { name, reason: _ }) => assert_eq!(name, "air_temperature")
        );
    }

    #[test]
    fn occupied_hours_pattern() {
        // 5 steps per hour, gains from 6:00 to 18:00
        let day = daily_window(120, 6, 18, 1000.0, 0.0);
        assert_eq!(day.len(), 120);
        assert_eq!(day[29], 0.0);
        assert_eq!(day[30], 1000.0);
        assert_eq!(day[89], 1000.0);
        assert_eq!(day[90], 0.0);
        assert_eq!(day.iter().filter(|v| **v > 0.0).count(), 60);
    }

    #[test]
    fn repeat_and_tile() {
        let hourly = [1.0, 2.0];
        let fine = repeat_each(&hourly, 3);
        assert_eq!(fine, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(tile(&fine, 2).len(), 12);
        assert_eq!(tile(&fine, 2)[6..], fine[..]);
    }

    #[test]
    fn shading_scale() {
        let shaded = scale_above(&[50.0, 100.0, 400.0], 100.0, 0.15);
        assert_eq!(shaded, vec![50.0, 100.0, 60.0]);
    }

    #[proptest]
    fn tiled_length(
        #[strategy(prop::collection::vec(-100f64..100f64, 1..50))] pattern: Vec<f64>,
        #[strategy(1usize..10)] days: usize,
        #[strategy(1usize..20)] factor: usize,
    ) {
        let series = tile(&repeat_each(&pattern, factor), days);
        assert_eq!(series.len(), pattern.len() * factor * days);
        assert_eq!(series[series.len() - 1], pattern[pattern.len() - 1]);
    }
}
