//! Backward Euler integration of the two-mass zone network.

use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use uom::si::{
    area::square_meter,
    f64::{ThermodynamicTemperature, Time},
    heat_transfer::watt_per_square_meter_kelvin,
    mass_density::kilogram_per_cubic_meter,
    ratio::ratio,
    specific_heat_capacity::joule_per_kilogram_kelvin,
    thermodynamic_temperature::kelvin,
    time::second,
};

use crate::error::Error;
use crate::model::BuildingParameters;
use crate::ports::{AirControl, PortConfiguration};
use crate::rc_network::{air_heat_capacity, NodeKind, RcNetwork};
use crate::reduced::ReducedNetwork;
use crate::signals::{BoundarySignals, StepInputs};
use crate::solver::{LinearSolver, LuSolver};

const AIR: usize = 0;
const EXTERIOR_MASS: usize = 1;
const INTERIOR_MASS: usize = 2;

/// Temperatures of the capacitive nodes, in kelvin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ThermalState {
    pub air: f64,
    pub exterior_mass: f64,
    pub interior_mass: f64,
}

impl ThermalState {
    pub fn uniform(temperature: ThermodynamicTemperature) -> Self {
        let t = temperature.get::<kelvin>();
        ThermalState {
            air: t,
            exterior_mass: t,
            interior_mass: t,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("initial air temperature", self.air),
            ("initial exterior mass temperature", self.exterior_mass),
            ("initial interior mass temperature", self.interior_mass),
        ] {
            if !value.is_finite() {
                return Err(Error::invalid(name, format!("must be finite, got {value}")));
            }
        }
        Ok(())
    }

    fn to_vector(self) -> DVector<f64> {
        DVector::from_vec(vec![self.air, self.exterior_mass, self.interior_mass])
    }

    fn from_vector(vector: &DVector<f64>) -> Self {
        ThermalState {
            air: vector[AIR],
            exterior_mass: vector[EXTERIOR_MASS],
            interior_mass: vector[INTERIOR_MASS],
        }
    }
}

/// Result of a single timestep.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StepResult {
    pub state: ThermalState,
    /// Heat supplied to the air by the ideal heater/cooler (W), negative when cooling
    pub heating_cooling: f64,
    /// Heat flowing from the interior wall surface into the interior mass (W)
    pub interior_mass_heat_flow: f64,
    /// Heat flowing from the exterior wall indoor surface into the exterior mass (W)
    pub exterior_mass_heat_flow: f64,
}

/// Simulated time series, one sample per timestep, each taken at the end of its step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputSeries {
    pub air_temperature: Vec<f64>,
    pub heating_cooling: Vec<f64>,
    pub interior_mass_heat_flow: Vec<f64>,
    pub exterior_mass_heat_flow: Vec<f64>,
    pub states: Vec<ThermalState>,
}

impl OutputSeries {
    fn with_capacity(capacity: usize) -> Self {
        OutputSeries {
            air_temperature: Vec::with_capacity(capacity),
            heating_cooling: Vec::with_capacity(capacity),
            interior_mass_heat_flow: Vec::with_capacity(capacity),
            exterior_mass_heat_flow: Vec::with_capacity(capacity),
            states: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, result: StepResult) {
        self.air_temperature.push(result.state.air);
        self.heating_cooling.push(result.heating_cooling);
        self.interior_mass_heat_flow.push(result.interior_mass_heat_flow);
        self.exterior_mass_heat_flow.push(result.exterior_mass_heat_flow);
        self.states.push(result.state);
    }

    pub fn len(&self) -> usize {
        self.air_temperature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.air_temperature.is_empty()
    }
}

/// Heat injected into the network during one step, W.
#[derive(Clone, Debug)]
struct Injections {
    /// Directly at the state nodes
    states: DVector<f64>,
    /// At the surface nodes, in `ReducedNetwork::surfaces` order
    surfaces: DVector<f64>,
    /// Temperatures of the boundary nodes, K
    boundaries: DVector<f64>,
    /// Ventilation conductance to the air node, W/K
    ventilation: f64,
}

/// Parameters of a zone turned into the linear maps used at every timestep.
pub struct Simulator<S = LuSolver> {
    network: RcNetwork,
    reduced: ReducedNetwork,
    control: AirControl,
    solver: S,

    /// Volumetric heat capacity of the air, J/(m³ K)
    air_volumetric_capacity: f64,
    transmitted_solar_per_irradiance: f64,
    solar_convective_fraction: f64,
    absorbed_over_exterior_coefficient: f64,
}

impl Simulator<LuSolver> {
    pub fn new(params: &BuildingParameters, ports: &PortConfiguration) -> Result<Self, Error> {
        Self::with_solver(params, ports, LuSolver)
    }
}

impl<S: LinearSolver> Simulator<S> {
    pub fn with_solver(
        params: &BuildingParameters,
        ports: &PortConfiguration,
        solver: S,
    ) -> Result<Self, Error> {
        params.validate()?;
        ports.validate()?;

        let network = RcNetwork::new(params, air_heat_capacity(params, ports));
        let reduced = ReducedNetwork::new(&network)?;
        debug!(
            "Zone network with {} nodes reduced to {} states, eliminated surfaces {:?}",
            network.node_count(),
            reduced.capacities.len(),
            reduced.surfaces
        );

        Ok(Simulator {
            network,
            reduced,
            control: ports.control.clone(),
            solver,
            air_volumetric_capacity: ports.air_density.get::<kilogram_per_cubic_meter>()
                * ports.air_specific_heat.get::<joule_per_kilogram_kelvin>(),
            transmitted_solar_per_irradiance: params.window_transmittance.get::<ratio>()
                * params.window_area.get::<square_meter>(),
            solar_convective_fraction: params.solar_convective_fraction.get::<ratio>(),
            absorbed_over_exterior_coefficient: params.exterior_absorptance.get::<ratio>()
                / params
                    .exterior_surface_heat_transfer
                    .get::<watt_per_square_meter_kelvin>(),
        })
    }

    pub fn network(&self) -> &RcNetwork {
        &self.network
    }

    /// Run the whole horizon starting from `initial`.
    pub fn simulate(
        &self,
        signals: &BoundarySignals,
        initial: ThermalState,
        dt: Time,
    ) -> Result<OutputSeries, Error> {
        let steps = signals.validate()?;
        initial.validate()?;
        let dt = timestep_seconds(dt)?;
        if self.control == AirControl::Prescribed && signals.air_temperature.is_none() {
            return Err(Error::DimensionMismatch {
                signal: "air_temperature".into(),
                expected: steps,
                found: 0,
            });
        }

        info!("Simulating {} steps of {} s", steps, dt);

        let mut output = OutputSeries::with_capacity(steps);
        let mut state = initial;
        for step in 0..steps {
            let result = self.step_seconds(step, state, &signals.at(step), dt)?;
            output.push(result);
            state = result.state;
        }

        info!("Finished, final air temperature {:.3} K", state.air);
        Ok(output)
    }

    /// Advance one timestep from `prev`. `step` only labels errors.
    pub fn step(
        &self,
        step: usize,
        prev: ThermalState,
        inputs: &StepInputs,
        dt: Time,
    ) -> Result<StepResult, Error> {
        self.step_seconds(step, prev, inputs, timestep_seconds(dt)?)
    }

    fn step_seconds(
        &self,
        step: usize,
        prev: ThermalState,
        inputs: &StepInputs,
        dt: f64,
    ) -> Result<StepResult, Error> {
        let storage = self.reduced.capacities.map(|c| c / dt);
        let history = storage.component_mul(&prev.to_vector());
        self.solve_balance(step, &storage, &history, inputs)
            .map(|(state, heating_cooling, injections)| {
                let (interior, exterior) = self.mass_heat_flows(&state, &injections);
                StepResult {
                    state,
                    heating_cooling,
                    interior_mass_heat_flow: interior,
                    exterior_mass_heat_flow: exterior,
                }
            })
    }

    /// Fixed point for constant inputs, the limit of an infinitely long timestep.
    /// A prescribed air temperature is taken from `inputs`.
    /// Fails with `SolverDivergence` if the zone has no steady state, e.g. a sealed
    /// free floating zone whose walls are perfectly insulated.
    pub fn steady_state(&self, inputs: &StepInputs) -> Result<StepResult, Error> {
        let zero = DVector::zeros(self.reduced.capacities.len());
        let (state, heating_cooling, injections) = self.solve_balance(0, &zero, &zero, inputs)?;
        let (interior, exterior) = self.mass_heat_flows(&state, &injections);
        Ok(StepResult {
            state,
            heating_cooling,
            interior_mass_heat_flow: interior,
            exterior_mass_heat_flow: exterior,
        })
    }

    /// Assemble and solve
    /// `(C/dt + K + V) T = C/dt T_prev - B T_b + q + V T_out + Q_HC e_air`
    /// for either the air temperature or Q_HC, depending on the control mode.
    fn solve_balance(
        &self,
        step: usize,
        storage: &DVector<f64>,
        history: &DVector<f64>,
        inputs: &StepInputs,
    ) -> Result<(ThermalState, f64, Injections), Error> {
        let imposed = self.control.imposed_temperature(inputs)?;
        let injections = self.injections(inputs);

        let mut coefficients = DMatrix::from_diagonal(storage) + &self.reduced.state_coupling;
        coefficients[(AIR, AIR)] += injections.ventilation;

        let mut rhs = history - &self.reduced.boundary_coupling * &injections.boundaries
            + &injections.states
            + &self.reduced.surface_injection * &injections.surfaces;
        rhs[AIR] += injections.ventilation * inputs.outdoor_temperature;

        if let Some(air) = imposed {
            // Air temperature is known, Q_HC takes its column.
            for row in 0..rhs.len() {
                rhs[row] -= coefficients[(row, AIR)] * air;
                coefficients[(row, AIR)] = 0.0;
            }
            coefficients[(AIR, AIR)] = -1.0;
        }

        let mut solution = self
            .solver
            .solve(coefficients, rhs)
            .map_err(|e| match e {
                Error::SolverDivergence { step: None, reason } => Error::SolverDivergence {
                    step: Some(step),
                    reason,
                },
                other => other,
            })?;

        let heating_cooling = match imposed {
            Some(air) => {
                let q = solution[AIR];
                solution[AIR] = air;
                q
            }
            None => 0.0,
        };

        Ok((
            ThermalState::from_vector(&solution),
            heating_cooling,
            injections,
        ))
    }

    fn injections(&self, inputs: &StepInputs) -> Injections {
        let transmitted = self.transmitted_solar_per_irradiance * inputs.window_irradiance;
        let radiative =
            inputs.radiative_gains + transmitted * (1.0 - self.solar_convective_fraction);

        let mut states = DVector::zeros(self.reduced.capacities.len());
        states[AIR] = inputs.convective_gains + transmitted * self.solar_convective_fraction;

        let surfaces = DVector::from_iterator(
            self.reduced.surfaces.len(),
            self.reduced.surfaces.iter().map(|kind| {
                self.network
                    .radiative_shares
                    .iter()
                    .find(|(surface, _)| surface == kind)
                    .map(|(_, share)| share * radiative)
                    .unwrap_or_default()
            }),
        );

        let boundaries = DVector::from_iterator(
            NodeKind::BOUNDARIES.len(),
            NodeKind::BOUNDARIES.iter().map(|kind| match kind {
                NodeKind::ExteriorEquivalent => {
                    inputs.exterior_equivalent_temperature
                        + self.absorbed_over_exterior_coefficient * inputs.exterior_irradiance
                }
                _ => inputs.outdoor_temperature,
            }),
        );

        Injections {
            states,
            surfaces,
            boundaries,
            ventilation: inputs.ventilation_flow * self.air_volumetric_capacity,
        }
    }

    /// Heat flowing from the indoor surfaces into the interior and exterior masses.
    fn mass_heat_flows(&self, state: &ThermalState, injections: &Injections) -> (f64, f64) {
        let surfaces = self.reduced.surface_temperatures(
            &state.to_vector(),
            &injections.boundaries,
            &injections.surfaces,
        );
        let surface_temperature = |kind: NodeKind| {
            self.reduced
                .surfaces
                .iter()
                .position(|surface| *surface == kind)
                .map(|i| surfaces[i])
                .unwrap_or_default()
        };
        let interior = self
            .network
            .conductance_between(NodeKind::InteriorWallSurface, NodeKind::InteriorMass)
            .value
            * (surface_temperature(NodeKind::InteriorWallSurface) - state.interior_mass);
        let exterior = self
            .network
            .conductance_between(NodeKind::ExteriorWallSurface, NodeKind::ExteriorMass)
            .value
            * (surface_temperature(NodeKind::ExteriorWallSurface) - state.exterior_mass);
        (interior, exterior)
    }

    /// Energy balance residual of every non-boundary node of the full network for a step
    /// from `prev` to `next`, in W, indexed by graph node index (boundary entries are zero).
    /// A correct step has all residuals at zero up to rounding.
    pub fn balance_residuals(
        &self,
        prev: ThermalState,
        next: &StepResult,
        inputs: &StepInputs,
        dt: Time,
    ) -> Result<Vec<f64>, Error> {
        let dt = timestep_seconds(dt)?;
        let injections = self.injections(inputs);
        let temperatures = self.reduced.node_temperatures(
            &next.state.to_vector(),
            &injections.boundaries,
            &injections.surfaces,
        );
        let outflow = self.network.conductance_matrix() * &temperatures;

        let prev = prev.to_vector();
        let next_state = next.state.to_vector();
        let mut residuals = vec![0.0; temperatures.len()];
        for (position, kind) in NodeKind::STATES.iter().enumerate() {
            let Some(index) = self.network.index(*kind) else {
                continue;
            };
            let index = index.index();
            let mut gained = injections.states[position] - outflow[index];
            if position == AIR {
                gained += next.heating_cooling
                    + injections.ventilation * (inputs.outdoor_temperature - next_state[AIR]);
            }
            let stored =
                self.reduced.capacities[position] * (next_state[position] - prev[position]) / dt;
            residuals[index] = gained - stored;
        }
        for (position, kind) in self.reduced.surfaces.iter().enumerate() {
            if let Some(index) = self.network.index(*kind) {
                let index = index.index();
                residuals[index] = injections.surfaces[position] - outflow[index];
            }
        }
        Ok(residuals)
    }
}

fn timestep_seconds(dt: Time) -> Result<f64, Error> {
    let dt = dt.get::<second>();
    if dt.is_finite() && dt > 0.0 {
        Ok(dt)
    } else {
        Err(Error::invalid("dt", format!("must be positive, got {dt} s")))
    }
}

/// Simulate a zone over the horizon of `signals` with the LU back-end.
pub fn simulate(
    params: &BuildingParameters,
    signals: &BoundarySignals,
    ports: &PortConfiguration,
    initial: ThermalState,
    dt: Time,
) -> Result<OutputSeries, Error> {
    Simulator::new(params, ports)?.simulate(signals, initial, dt)
}
