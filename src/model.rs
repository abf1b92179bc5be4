use std::collections::HashMap;
use std::fs;
use std::path::Path;

use uom::si::{
    area::square_meter,
    f64::{Area, HeatCapacity, HeatTransfer, Ratio, ThermalConductance, Volume},
    heat_capacity::joule_per_kelvin,
    heat_transfer::watt_per_square_meter_kelvin,
    ratio::ratio,
    thermal_conductance::watt_per_kelvin,
    volume::cubic_meter,
};

use crate::error::{ensure_fraction, ensure_non_negative, ensure_positive, Error};

#[cfg(test)]
use proptest::{
    arbitrary::Arbitrary,
    strategy::{BoxedStrategy, Strategy},
};

/// Parameter table shipped with the crate, VDI 6007 type rooms.
const BUILTIN_CASES: &str = include_str!("../cases.json5");

/// Static building physics of a single zone with two lumped thermal masses.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingParameters {
    pub air_volume: Volume,

    pub exterior_wall_area: Area,
    /// May be zero, in which case the zone has no window branch.
    pub window_area: Area,
    pub interior_wall_area: Area,

    /// Outer layer, between the equivalent outdoor temperature and the exterior mass
    pub exterior_wall_outer_conductance: ThermalConductance,
    /// Inner layer, between the exterior mass and its indoor surface
    pub exterior_wall_inner_conductance: ThermalConductance,
    pub interior_wall_conductance: ThermalConductance,
    pub window_conductance: ThermalConductance,

    pub exterior_heat_capacity: HeatCapacity,
    pub interior_heat_capacity: HeatCapacity,

    pub exterior_wall_convection: HeatTransfer,
    pub interior_wall_convection: HeatTransfer,
    pub window_convection: HeatTransfer,
    /// Long-wave exchange between indoor surfaces
    pub radiative_exchange: HeatTransfer,
    /// Combined convective and radiative coefficient on the outside of the exterior wall
    pub exterior_surface_heat_transfer: HeatTransfer,

    /// Solar energy transmittance of the glazing (g-value)
    pub window_transmittance: Ratio,
    /// Solar absorptance of the exterior wall's outer surface
    pub exterior_absorptance: Ratio,
    /// Part of the transmitted solar radiation that goes directly to the air
    pub solar_convective_fraction: Ratio,
}

impl BuildingParameters {
    /// Check the physical invariants of the parameter set.
    pub fn validate(&self) -> Result<(), Error> {
        ensure_positive("air_volume", self.air_volume.get::<cubic_meter>())?;

        ensure_positive(
            "exterior_wall_area",
            self.exterior_wall_area.get::<square_meter>(),
        )?;
        ensure_non_negative("window_area", self.window_area.get::<square_meter>())?;
        ensure_positive(
            "interior_wall_area",
            self.interior_wall_area.get::<square_meter>(),
        )?;

        for (name, conductance) in [
            (
                "exterior_wall_outer_conductance",
                self.exterior_wall_outer_conductance,
            ),
            (
                "exterior_wall_inner_conductance",
                self.exterior_wall_inner_conductance,
            ),
            ("interior_wall_conductance", self.interior_wall_conductance),
            ("window_conductance", self.window_conductance),
        ] {
            ensure_positive(name, conductance.get::<watt_per_kelvin>())?;
        }

        ensure_positive(
            "exterior_heat_capacity",
            self.exterior_heat_capacity.get::<joule_per_kelvin>(),
        )?;
        ensure_positive(
            "interior_heat_capacity",
            self.interior_heat_capacity.get::<joule_per_kelvin>(),
        )?;

        for (name, coefficient) in [
            ("exterior_wall_convection", self.exterior_wall_convection),
            ("interior_wall_convection", self.interior_wall_convection),
            ("window_convection", self.window_convection),
            ("radiative_exchange", self.radiative_exchange),
            (
                "exterior_surface_heat_transfer",
                self.exterior_surface_heat_transfer,
            ),
        ] {
            ensure_positive(name, coefficient.get::<watt_per_square_meter_kelvin>())?;
        }

        for (name, fraction) in [
            ("window_transmittance", self.window_transmittance),
            ("exterior_absorptance", self.exterior_absorptance),
            ("solar_convective_fraction", self.solar_convective_fraction),
        ] {
            ensure_fraction(name, fraction.get::<ratio>())?;
        }

        Ok(())
    }

    pub fn has_window(&self) -> bool {
        self.window_area.get::<square_meter>() > 0.0
    }
}

#[cfg(test)]
impl Arbitrary for BuildingParameters {
    type Parameters = ();
    type Strategy = BoxedStrategy<BuildingParameters>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (
            (10f64..500f64, 1f64..100f64, 0f64..20f64, 1f64..200f64),
            (1f64..100f64, 10f64..2000f64, 10f64..5000f64, 1f64..200f64),
            (1e5f64..5e7f64, 1e5f64..5e7f64),
            (1f64..5f64, 1f64..5f64, 1f64..5f64, 1f64..6f64, 10f64..30f64),
            (0f64..=1f64, 0f64..=1f64, 0f64..=1f64),
        )
            .prop_map(|(geometry, conductances, capacities, coefficients, ratios)| {
                let conductance = ThermalConductance::new::<watt_per_kelvin>;
                let per_area = HeatTransfer::new::<watt_per_square_meter_kelvin>;
                BuildingParameters {
                    air_volume: Volume::new::<cubic_meter>(geometry.0),
                    exterior_wall_area: Area::new::<square_meter>(geometry.1),
                    window_area: Area::new::<square_meter>(geometry.2),
                    interior_wall_area: Area::new::<square_meter>(geometry.3),
                    exterior_wall_outer_conductance: conductance(conductances.0),
                    exterior_wall_inner_conductance: conductance(conductances.1),
                    interior_wall_conductance: conductance(conductances.2),
                    window_conductance: conductance(conductances.3),
                    exterior_heat_capacity: HeatCapacity::new::<joule_per_kelvin>(capacities.0),
                    interior_heat_capacity: HeatCapacity::new::<joule_per_kelvin>(capacities.1),
                    exterior_wall_convection: per_area(coefficients.0),
                    interior_wall_convection: per_area(coefficients.1),
                    window_convection: per_area(coefficients.2),
                    radiative_exchange: per_area(coefficients.3),
                    exterior_surface_heat_transfer: per_area(coefficients.4),
                    window_transmittance: Ratio::new::<ratio>(ratios.0),
                    exterior_absorptance: Ratio::new::<ratio>(ratios.1),
                    solar_convective_fraction: Ratio::new::<ratio>(ratios.2),
                }
            })
            .boxed()
    }
}

/// Named reference cases, the parameter provider of the validation runs.
#[derive(Clone, Debug)]
pub struct ParameterTable {
    pub cases: HashMap<String, BuildingParameters>,
}

impl ParameterTable {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let string = fs::read_to_string(path)?;
        Self::from_json(&string)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let loaded: HashMap<String, as_loaded::BuildingParameters> = json5::from_str(json)?;
        let cases = loaded
            .into_iter()
            .map(|(name, parameters)| {
                let converted = BuildingParameters::try_from(parameters)
                    .map_err(|e| anyhow::anyhow!("Case {:?}: {}", name, e))?;
                Ok((name, converted))
            })
            .collect::<anyhow::Result<HashMap<_, _>>>()?;
        Ok(ParameterTable { cases })
    }

    /// Table of the cases distributed with the crate.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_json(BUILTIN_CASES)
    }

    pub fn get_parameters(&self, case_id: &str) -> Result<BuildingParameters, Error> {
        self.cases
            .get(case_id)
            .cloned()
            .ok_or_else(|| Error::UnknownCase(case_id.into()))
    }
}

impl TryFrom<as_loaded::BuildingParameters> for BuildingParameters {
    type Error = Error;
    fn try_from(value: as_loaded::BuildingParameters) -> Result<Self, Self::Error> {
        let converted = BuildingParameters {
            air_volume: value.air_volume,
            exterior_wall_area: value.exterior_wall_area,
            window_area: value.window_area,
            interior_wall_area: value.interior_wall_area,
            exterior_wall_outer_conductance: value.exterior_wall_outer_conductance,
            exterior_wall_inner_conductance: value.exterior_wall_inner_conductance,
            interior_wall_conductance: value.interior_wall_conductance,
            window_conductance: value.window_conductance,
            exterior_heat_capacity: value.exterior_heat_capacity,
            interior_heat_capacity: value.interior_heat_capacity,
            exterior_wall_convection: value.exterior_wall_convection,
            interior_wall_convection: value.interior_wall_convection,
            window_convection: value.window_convection,
            radiative_exchange: value.radiative_exchange,
            exterior_surface_heat_transfer: value.exterior_surface_heat_transfer,
            window_transmittance: value.window_transmittance,
            exterior_absorptance: value.exterior_absorptance,
            solar_convective_fraction: value.solar_convective_fraction,
        };
        converted.validate()?;
        Ok(converted)
    }
}

mod as_loaded {
    use serde::Deserialize;
    use uom::si::f64::{Area, HeatCapacity, HeatTransfer, Ratio, ThermalConductance, Volume};

    /// Values are in SI base units.
    #[derive(Clone, Debug, Deserialize, PartialEq)]
    pub struct BuildingParameters {
        pub air_volume: Volume,
        pub exterior_wall_area: Area,
        #[serde(default)]
        pub window_area: Area,
        pub interior_wall_area: Area,
        pub exterior_wall_outer_conductance: ThermalConductance,
        pub exterior_wall_inner_conductance: ThermalConductance,
        pub interior_wall_conductance: ThermalConductance,
        pub window_conductance: ThermalConductance,
        pub exterior_heat_capacity: HeatCapacity,
        pub interior_heat_capacity: HeatCapacity,
        pub exterior_wall_convection: HeatTransfer,
        pub interior_wall_convection: HeatTransfer,
        pub window_convection: HeatTransfer,
        pub radiative_exchange: HeatTransfer,
        pub exterior_surface_heat_transfer: HeatTransfer,
        #[serde(default)]
        pub window_transmittance: Ratio,
        #[serde(default)]
        pub exterior_absorptance: Ratio,
        #[serde(default)]
        pub solar_convective_fraction: Ratio,
    }
}
