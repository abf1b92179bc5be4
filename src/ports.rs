use uom::si::{
    f64::{MassDensity, SpecificHeatCapacity, ThermodynamicTemperature},
    mass_density::kilogram_per_cubic_meter,
    specific_heat_capacity::joule_per_kilogram_kelvin,
    thermodynamic_temperature::kelvin,
};

use crate::error::{ensure_positive, Error};
use crate::signals::StepInputs;

/// How the zone air temperature is determined.
#[derive(Clone, Debug, PartialEq)]
pub enum AirControl {
    /// Air temperature follows from the energy balance, no heating or cooling.
    FreeFloating,
    /// Ideal heater/cooler holding the air at the setpoint.
    Setpoint(ThermodynamicTemperature),
    /// Air temperature taken from the `air_temperature` boundary signal.
    Prescribed,
}

impl AirControl {
    /// Air temperature imposed for a step with `inputs`, if any, in kelvin.
    /// A prescribed air temperature without a sample is an error.
    pub fn imposed_temperature(&self, inputs: &StepInputs) -> Result<Option<f64>, Error> {
        match self {
            AirControl::FreeFloating => Ok(None),
            AirControl::Setpoint(setpoint) => Ok(Some(setpoint.get::<kelvin>())),
            AirControl::Prescribed => inputs.air_temperature.map(Some).ok_or_else(|| {
                Error::invalid(
                    "air_temperature",
                    "prescribed air temperature needs an air temperature sample",
                )
            }),
        }
    }
}

/// Air properties and the control mode of the zone air node.
#[derive(Clone, Debug, PartialEq)]
pub struct PortConfiguration {
    pub air_density: MassDensity,
    pub air_specific_heat: SpecificHeatCapacity,
    pub control: AirControl,
}

impl PortConfiguration {
    /// Free floating zone with the given air properties.
    pub fn free_floating(
        air_density: MassDensity,
        air_specific_heat: SpecificHeatCapacity,
    ) -> Self {
        PortConfiguration {
            air_density,
            air_specific_heat,
            control: AirControl::FreeFloating,
        }
    }

    /// Build a configuration from the two control switches.
    /// At most one of them may be set. The heater/cooler needs a setpoint; the prescribed
    /// air temperature comes with the boundary signals.
    pub fn from_switches(
        air_density: MassDensity,
        air_specific_heat: SpecificHeatCapacity,
        heater_cooler: bool,
        set_air_temp: bool,
        setpoint: Option<ThermodynamicTemperature>,
    ) -> Result<Self, Error> {
        let control = match (heater_cooler, set_air_temp) {
            (true, true) => {
                return Err(Error::invalid(
                    "control",
                    "heater_cooler and set_air_temp are mutually exclusive",
                ))
            }
            (true, false) => AirControl::Setpoint(setpoint.ok_or_else(|| {
                Error::invalid("setpoint", "heater_cooler requires a setpoint")
            })?),
            (false, true) => AirControl::Prescribed,
            (false, false) => AirControl::FreeFloating,
        };
        let converted = PortConfiguration {
            air_density,
            air_specific_heat,
            control,
        };
        converted.validate()?;
        Ok(converted)
    }

    pub fn validate(&self) -> Result<(), Error> {
        ensure_positive(
            "air_density",
            self.air_density.get::<kilogram_per_cubic_meter>(),
        )?;
        ensure_positive(
            "air_specific_heat",
            self.air_specific_heat.get::<joule_per_kilogram_kelvin>(),
        )?;
        if let AirControl::Setpoint(setpoint) = &self.control {
            ensure_positive("setpoint", setpoint.get::<kelvin>())?;
        }
        Ok(())
    }
}

impl Default for PortConfiguration {
    /// Air at about 20 °C, free floating.
    fn default() -> Self {
        PortConfiguration::free_floating(
            MassDensity::new::<kilogram_per_cubic_meter>(1.19),
            SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(1007.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn density() -> MassDensity {
        MassDensity::new::<kilogram_per_cubic_meter>(1.19)
    }

    fn specific_heat() -> SpecificHeatCapacity {
        SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(1007.0)
    }

    fn inputs(air_temperature: Option<f64>) -> StepInputs {
        StepInputs {
            outdoor_temperature: 283.15,
            exterior_equivalent_temperature: 283.15,
            air_temperature,
            ..Default::default()
        }
    }

    #[test]
    fn both_switches_rejected() {
        let result = PortConfiguration::from_switches(
            density(),
            specific_heat(),
            true,
            true,
            Some(ThermodynamicTemperature::new::<kelvin>(295.15)),
        );
        assert_matches!(result, Err(Error::InvalidParameter { name, reason: _ }) => {
            assert_eq!(name, "control");
        });
    }

    #[test]
    fn no_switch_is_free_floating() {
        let ports =
            PortConfiguration::from_switches(density(), specific_heat(), false, false, None)
                .unwrap();
        assert_eq!(ports.control, AirControl::FreeFloating);
        assert_eq!(ports.control.imposed_temperature(&inputs(None)), Ok(None));
    }

    #[test]
    fn heater_cooler_needs_setpoint() {
        let result =
            PortConfiguration::from_switches(density(), specific_heat(), true, false, None);
        assert_matches!(result, Err(Error::InvalidParameter { .. }));
    }

    #[test]
    fn heater_cooler_uses_setpoint() {
        let ports = PortConfiguration::from_switches(
            density(),
            specific_heat(),
            true,
            false,
            Some(ThermodynamicTemperature::new::<kelvin>(293.15)),
        )
        .unwrap();
        assert_eq!(ports.control.imposed_temperature(&inputs(None)), Ok(Some(293.15)));
        // The setpoint wins over any air temperature signal
        assert_eq!(
            ports.control.imposed_temperature(&inputs(Some(300.0))),
            Ok(Some(293.15))
        );
    }

    #[test]
    fn prescribed_reads_air_temperature_signal() {
        let ports =
            PortConfiguration::from_switches(density(), specific_heat(), false, true, None)
                .unwrap();
        assert_eq!(ports.control, AirControl::Prescribed);
        assert_eq!(
            ports.control.imposed_temperature(&inputs(Some(291.0))),
            Ok(Some(291.0))
        );
    }

    #[test]
    fn prescribed_without_sample_is_an_error() {
        assert_matches!(
            AirControl::Prescribed.imposed_temperature(&inputs(None)),
            Err(Error::InvalidParameter { name, reason: _ }) => assert_eq!(name, "air_temperature")
        );
    }

    #[test]
    fn non_positive_density_rejected() {
        let ports = PortConfiguration::free_floating(
            MassDensity::new::<kilogram_per_cubic_meter>(0.0),
            specific_heat(),
        );
        assert_matches!(ports.validate(), Err(Error::InvalidParameter { name, reason: _ }) => {
            assert_eq!(name, "air_density");
        });
    }
}
