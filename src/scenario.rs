use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;
use uom::si::{
    f64::{MassDensity, SpecificHeatCapacity, ThermodynamicTemperature, Time},
    time::second,
};

use crate::error::{ensure_positive, Error};
use crate::model::ParameterTable;
use crate::ports::{AirControl, PortConfiguration};
use crate::signals::{self, BoundarySignals};
use crate::simulation::{simulate, OutputSeries, ThermalState};

/// A validation run: which case to simulate, at which resolution and with which inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct Scenario {
    pub case: String,
    pub steps_per_hour: usize,
    pub days: usize,
    pub initial_temperature: ThermodynamicTemperature,
    pub ports: PortConfiguration,
    pub signals: BoundarySignals,
}

impl Scenario {
    /// Load a scenario. Relative CSV paths inside are resolved against the scenario's
    /// directory.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let string = fs::read_to_string(path)
            .with_context(|| format!("Reading scenario {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&string, base_dir)
            .with_context(|| format!("Loading scenario {}", path.display()))
    }

    pub fn from_json(json: &str, base_dir: &Path) -> anyhow::Result<Self> {
        let loaded: as_loaded::Scenario = json5::from_str(json)?;
        ensure_positive("steps_per_hour", loaded.steps_per_hour as f64)?;
        ensure_positive("days", loaded.days as f64)?;

        let resolution = Resolution {
            steps_per_hour: loaded.steps_per_hour,
            days: loaded.days,
            base_dir: base_dir.to_owned(),
        };

        let ports = PortConfiguration::from_switches(
            loaded.air_density,
            loaded.air_specific_heat,
            loaded.control.heater_cooler,
            loaded.control.set_air_temp,
            loaded.control.setpoint,
        )?;

        let inputs = &loaded.signals;
        if ports.control == AirControl::Prescribed && inputs.air_temperature.is_none() {
            return Err(Error::invalid(
                "air_temperature",
                "set_air_temp requires an air temperature signal",
            )
            .into());
        }
        let air_temperature = match &inputs.air_temperature {
            Some(profile) => Some(resolution.build(profile)?),
            None => None,
        };
        let signals = BoundarySignals {
            outdoor_temperature: resolution.build(&inputs.outdoor_temperature)?,
            exterior_equivalent_temperature: match &inputs.exterior_equivalent_temperature {
                Some(profile) => resolution.build(profile)?,
                None => resolution.build(&inputs.outdoor_temperature)?,
            },
            window_irradiance: resolution.build(&inputs.window_irradiance)?,
            exterior_irradiance: resolution.build(&inputs.exterior_irradiance)?,
            ventilation_flow: resolution.build(&inputs.ventilation_flow)?,
            convective_gains: resolution.build(&inputs.convective_gains)?,
            radiative_gains: resolution.build(&inputs.radiative_gains)?,
            air_temperature,
        };
        signals.validate()?;

        Ok(Scenario {
            case: loaded.case,
            steps_per_hour: loaded.steps_per_hour,
            days: loaded.days,
            initial_temperature: loaded.initial_temperature,
            ports,
            signals,
        })
    }

    pub fn steps(&self) -> usize {
        self.steps_per_hour * 24 * self.days
    }

    pub fn dt(&self) -> Time {
        Time::new::<second>(3600.0 / self.steps_per_hour as f64)
    }

    /// Simulate the scenario with parameters from `table`.
    pub fn run(&self, table: &ParameterTable) -> anyhow::Result<OutputSeries> {
        let params = table.get_parameters(&self.case)?;
        info!(
            "Running case {} for {} days at {} steps per hour",
            self.case, self.days, self.steps_per_hour
        );
        let output = simulate(
            &params,
            &self.signals,
            &self.ports,
            ThermalState::uniform(self.initial_temperature),
            self.dt(),
        )?;
        Ok(output)
    }
}

/// Time grid of a scenario, turns profiles into per-step sequences.
struct Resolution {
    steps_per_hour: usize,
    days: usize,
    base_dir: PathBuf,
}

impl Resolution {
    fn steps_per_day(&self) -> usize {
        self.steps_per_hour * 24
    }

    fn build(&self, profile: &Profile) -> Result<Vec<f64>, Error> {
        let day = self.one_day(profile)?;
        Ok(signals::tile(&day, self.days))
    }

    fn one_day(&self, profile: &Profile) -> Result<Vec<f64>, Error> {
        match profile {
            Profile::Constant { value } => Ok(signals::constant(self.steps_per_day(), *value)),
            Profile::Hourly { values } => self.hold_hourly(values, "hourly profile"),
            Profile::DailyWindow {
                start_hour,
                end_hour,
                inside,
                outside,
            } => {
                if start_hour > end_hour || *end_hour > 24 {
                    return Err(Error::invalid(
                        "daily_window",
                        format!("hours {start_hour}..{end_hour} outside of a day"),
                    ));
                }
                Ok(signals::daily_window(
                    self.steps_per_day(),
                    *start_hour,
                    *end_hour,
                    *inside,
                    *outside,
                ))
            }
            Profile::CsvColumn {
                path,
                column,
                delimiter,
                every,
                scale,
                offset,
            } => {
                let path = self.base_dir.join(path);
                let hourly = read_column(&path, *column, *delimiter, *every)?
                    .into_iter()
                    .map(|value| value * scale + offset)
                    .collect::<Vec<_>>();
                self.hold_hourly(&hourly, &path.display().to_string())
            }
            Profile::Shaded {
                threshold,
                factor,
                profile,
            } => Ok(signals::scale_above(
                &self.one_day(profile)?,
                *threshold,
                *factor,
            )),
        }
    }

    /// Hold each of the first 24 hourly samples for one hour.
    fn hold_hourly(&self, values: &[f64], source: &str) -> Result<Vec<f64>, Error> {
        if values.len() < 24 {
            return Err(Error::DimensionMismatch {
                signal: source.into(),
                expected: 24,
                found: values.len(),
            });
        }
        Ok(signals::repeat_each(&values[..24], self.steps_per_hour))
    }
}

/// Values of one column of a delimited file, taking every `every`-th row from the first.
fn read_column(
    path: &Path,
    column: usize,
    delimiter: char,
    every: usize,
) -> Result<Vec<f64>, Error> {
    let malformed = |reason: String| Error::MalformedReferenceFile {
        path: path.display().to_string(),
        reason,
    };
    if every == 0 {
        return Err(Error::invalid("every", "must be at least 1"));
    }
    let delimiter = u8::try_from(delimiter).map_err(|_| {
        Error::invalid("delimiter", format!("{delimiter:?} is not a single byte"))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| malformed(e.to_string()))?;

    reader
        .records()
        .enumerate()
        .step_by(every)
        .map(|(index, record)| {
            let record = record.map_err(|e| malformed(e.to_string()))?;
            // Comment lines are skipped by the reader, report the line in the file
            let line = record.position().map_or(index as u64 + 1, |p| p.line());
            let field = record
                .get(column)
                .ok_or_else(|| malformed(format!("line {line} has no column {column}")))?;
            field
                .parse::<f64>()
                .map_err(|e| malformed(format!("line {line}, column {column}: {field:?}: {e}")))
        })
        .collect()
}

/// Source of a daily pattern, in SI units after `scale`/`offset` are applied.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    Constant {
        value: f64,
    },
    /// 24 hourly values
    Hourly {
        values: Vec<f64>,
    },
    /// `inside` from `start_hour` to `end_hour`, `outside` otherwise
    DailyWindow {
        start_hour: usize,
        end_hour: usize,
        inside: f64,
        #[serde(default)]
        outside: f64,
    },
    /// Hourly samples from a column of a delimited file
    CsvColumn {
        path: PathBuf,
        column: usize,
        #[serde(default = "default_delimiter")]
        delimiter: char,
        /// Row stride, e.g. 2 for half-hourly files
        #[serde(default = "default_every")]
        every: usize,
        #[serde(default = "default_scale")]
        scale: f64,
        #[serde(default)]
        offset: f64,
    },
    /// Another profile with values above `threshold` multiplied by `factor`
    Shaded {
        threshold: f64,
        factor: f64,
        profile: Box<Profile>,
    },
}

impl Default for Profile {
    fn default() -> Self {
        Profile::Constant { value: 0.0 }
    }
}

fn default_delimiter() -> char {
    ','
}

fn default_every() -> usize {
    1
}

fn default_scale() -> f64 {
    1.0
}

fn default_air_density() -> MassDensity {
    PortConfiguration::default().air_density
}

fn default_air_specific_heat() -> SpecificHeatCapacity {
    PortConfiguration::default().air_specific_heat
}

mod as_loaded {
    use serde::Deserialize;
    use uom::si::f64::{MassDensity, SpecificHeatCapacity, ThermodynamicTemperature};

    use super::Profile;

    /// Values are in SI base units.
    #[derive(Clone, Debug, Deserialize, PartialEq)]
    pub struct Scenario {
        pub case: String,
        pub steps_per_hour: usize,
        pub days: usize,
        pub initial_temperature: ThermodynamicTemperature,
        #[serde(default = "super::default_air_density")]
        pub air_density: MassDensity,
        #[serde(default = "super::default_air_specific_heat")]
        pub air_specific_heat: SpecificHeatCapacity,
        #[serde(default)]
        pub control: Control,
        pub signals: Signals,
    }

    #[derive(Clone, Debug, Default, Deserialize, PartialEq)]
    pub struct Control {
        #[serde(default)]
        pub heater_cooler: bool,
        #[serde(default)]
        pub set_air_temp: bool,
        pub setpoint: Option<ThermodynamicTemperature>,
    }

    #[derive(Clone, Debug, Deserialize, PartialEq)]
    pub struct Signals {
        pub outdoor_temperature: Profile,
        /// Defaults to the outdoor temperature
        pub exterior_equivalent_temperature: Option<Profile>,
        #[serde(default)]
        pub window_irradiance: Profile,
        #[serde(default)]
        pub exterior_irradiance: Profile,
        #[serde(default)]
        pub ventilation_flow: Profile,
        #[serde(default)]
        pub convective_gains: Profile,
        #[serde(default)]
        pub radiative_gains: Profile,
        /// Only read when `set_air_temp` is on
        pub air_temperature: Option<Profile>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use uom::si::thermodynamic_temperature::kelvin;

    const CASE02: &str = include_str!("../scenarios/case02.json5");
    const CASE12: &str = include_str!("../scenarios/case12.json5");

    fn scenario(json: &str) -> anyhow::Result<Scenario> {
        Scenario::from_json(json, Path::new("."))
    }

    #[test]
    fn shipped_case02() {
        let scenario = scenario(CASE02).unwrap();
        assert_eq!(scenario.case, "vdi6007_case02");
        assert_eq!(scenario.steps(), 5 * 24 * 60);
        assert_eq!(scenario.signals.len(), scenario.steps());
        assert_eq!(scenario.dt(), Time::new::<second>(720.0));
        assert_eq!(scenario.ports.control, AirControl::FreeFloating);

        let gains = &scenario.signals.radiative_gains;
        assert_eq!(gains[29], 0.0);
        assert_eq!(gains[30], 1000.0);
        assert_eq!(gains[120 + 30], 1000.0);
        assert_eq!(gains[90], 0.0);
        assert!(scenario.signals.ventilation_flow.iter().all(|v| *v == 0.0));
        assert_eq!(scenario.signals.exterior_equivalent_temperature[0], 295.15);
    }

    #[test]
    fn heater_cooler_scenario() {
        let json = r#"{
            case: "vdi6007_case02",
            steps_per_hour: 1,
            days: 2,
            initial_temperature: 295.15,
            control: { heater_cooler: true, setpoint: 295.15 },
            signals: { outdoor_temperature: { kind: "constant", value: 250 } },
        }"#;
        let scenario = scenario(json).unwrap();
        assert_eq!(
            scenario.ports.control,
            AirControl::Setpoint(ThermodynamicTemperature::new::<kelvin>(295.15))
        );

        let output = scenario.run(&ParameterTable::builtin().unwrap()).unwrap();
        assert_eq!(output.len(), 48);
        assert!(output.heating_cooling.iter().all(|q| *q > 0.0));
    }

    #[test]
    fn both_switches_rejected() {
        let json = r#"{
            case: "vdi6007_case02",
            steps_per_hour: 1,
            days: 1,
            initial_temperature: 295.15,
            control: { heater_cooler: true, set_air_temp: true, setpoint: 295.15 },
            signals: {
                outdoor_temperature: { kind: "constant", value: 250 },
                air_temperature: { kind: "constant", value: 295.15 },
            },
        }"#;
        let error = scenario(json).unwrap_err();
        assert_matches!(
            error.downcast_ref::<Error>(),
            Some(Error::InvalidParameter { name, reason: _ }) => assert_eq!(name, "control")
        );
    }

    #[test]
    fn prescribed_air_temperature_scenario() {
        let json = r#"{
            case: "vdi6007_case02",
            steps_per_hour: 2,
            days: 2,
            initial_temperature: 290.15,
            control: { set_air_temp: true },
            signals: {
                outdoor_temperature: { kind: "constant", value: 270 },
                air_temperature: {
                    kind: "daily_window",
                    start_hour: 8,
                    end_hour: 18,
                    inside: 294.15,
                    outside: 290.15,
                },
            },
        }"#;
        let scenario = scenario(json).unwrap();
        assert_eq!(scenario.ports.control, AirControl::Prescribed);
        let prescribed = scenario.signals.air_temperature.clone().unwrap();
        assert_eq!(prescribed.len(), scenario.steps());

        let output = scenario.run(&ParameterTable::builtin().unwrap()).unwrap();
        for (air, target) in output.air_temperature.iter().zip(&prescribed) {
            assert!((air - target).abs() < 1e-9);
        }
        // Heat lost to the cold outdoors has to be supplied
        assert!(output.heating_cooling.iter().sum::<f64>() > 0.0);
    }

    #[test]
    fn prescribed_without_air_temperature_rejected() {
        let json = r#"{
            case: "vdi6007_case02",
            steps_per_hour: 1,
            days: 1,
            initial_temperature: 295.15,
            control: { set_air_temp: true },
            signals: { outdoor_temperature: { kind: "constant", value: 250 } },
        }"#;
        let error = scenario(json).unwrap_err();
        assert_matches!(
            error.downcast_ref::<Error>(),
            Some(Error::InvalidParameter { name, reason: _ }) => assert_eq!(name, "air_temperature")
        );
    }

    fn write_case12_inputs(dir: &Path) {
        let mut solar = fs::File::create(dir.join("case12_q_sol.csv")).unwrap();
        for hour in 0..48 {
            // Peaks at 400 W/m^2 at noon, the second day is never read
            let value = (400.0 - 40.0 * (hour as f64 - 12.0).abs()).max(0.0);
            writeln!(solar, "{}\t{}", hour * 3600, value).unwrap();
        }
        let mut outdoor = fs::File::create(dir.join("case12_t_amb.csv")).unwrap();
        for half_hour in 0..48 {
            // Odd rows hold the half hours and must not be read
            let value = if half_hour % 2 == 0 { 285.15 + (half_hour / 2) as f64 } else { 0.0 };
            writeln!(outdoor, "{},{}", half_hour * 1800, value).unwrap();
        }
    }

    #[test]
    fn shipped_case12() {
        let dir = tempfile::tempdir().unwrap();
        write_case12_inputs(dir.path());
        let path = dir.path().join("case12.json5");
        fs::write(&path, CASE12).unwrap();

        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.case, "vdi6007_case12");
        assert_eq!(scenario.steps(), 15 * 24 * 60);
        assert_eq!(scenario.signals.len(), scenario.steps());
        assert_eq!(scenario.ports.control, AirControl::FreeFloating);

        let signals = &scenario.signals;
        let hour = |h: usize| 15 * h;
        let last_day = 15 * 24 * 59;
        // Office hours 7:00 to 17:00
        for offset in [0, last_day] {
            let flow = &signals.ventilation_flow[offset..];
            assert!((flow[hour(7) - 1] * 3600.0 - 100.0).abs() < 1e-9);
            assert!((flow[hour(7)] * 3600.0 - 50.0).abs() < 1e-9);
            assert!((flow[hour(17) - 1] * 3600.0 - 50.0).abs() < 1e-9);
            assert!((flow[hour(17)] * 3600.0 - 100.0).abs() < 1e-9);

            let convective = &signals.convective_gains[offset..];
            let radiative = &signals.radiative_gains[offset..];
            assert_eq!(convective[hour(7) - 1], 0.0);
            assert_eq!(convective[hour(7)], 280.0);
            assert_eq!(radiative[hour(7)], 80.0);
            assert_eq!(convective[hour(17) - 1], 280.0);
            assert_eq!(radiative[hour(17) - 1], 80.0);
            assert_eq!(convective[hour(17)], 0.0);
            assert_eq!(radiative[hour(17)], 0.0);
        }

        // 80 at 4:00 stays, 400 at noon is shaded to 60
        assert_eq!(signals.window_irradiance[hour(4)], 80.0);
        assert!((signals.window_irradiance[hour(12) + 14] - 60.0).abs() < 1e-9);
        assert!(signals.window_irradiance.iter().all(|i| *i <= 100.0));

        // Even rows only, the equivalent temperature follows the outdoor temperature
        assert!((signals.outdoor_temperature[hour(5)] - 290.15).abs() < 1e-9);
        assert!(signals.outdoor_temperature.iter().all(|t| *t > 0.0));
        assert_eq!(signals.outdoor_temperature, signals.exterior_equivalent_temperature);
    }

    #[test]
    fn csv_errors_name_the_file_line() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{
            case: "vdi6007_case12",
            steps_per_hour: 1,
            days: 1,
            initial_temperature: 295.15,
            signals: {
                outdoor_temperature: { kind: "csv_column", path: "t.csv", column: 1, every: 2 },
            },
        }"#;
        let write = |bad_row: usize| {
            let mut file = fs::File::create(dir.path().join("t.csv")).unwrap();
            writeln!(file, "# time,temperature").unwrap();
            for row in 0..48 {
                let value = if row == bad_row { "warm" } else { "290" };
                writeln!(file, "{row},{value}").unwrap();
            }
        };

        // Row 7 is skipped by the stride
        write(7);
        assert!(Scenario::from_json(json, dir.path()).is_ok());

        // Row 6 is read, it sits on line 8 after the comment
        write(6);
        let error = Scenario::from_json(json, dir.path()).unwrap_err();
        assert_matches!(
            error.downcast_ref::<Error>(),
            Some(Error::MalformedReferenceFile { reason, .. }) => {
                assert!(reason.starts_with("line 8,"), "{reason}")
            }
        );
    }

    #[test]
    fn short_hourly_profile() {
        let json = r#"{
            case: "vdi6007_case02",
            steps_per_hour: 2,
            days: 1,
            initial_temperature: 295.15,
            signals: {
                outdoor_temperature: { kind: "hourly", values: [290, 291, 292] },
            },
        }"#;
        let error = scenario(json).unwrap_err();
        assert_matches!(
            error.downcast_ref::<Error>(),
            Some(Error::DimensionMismatch { expected: 24, found: 3, .. })
        );
    }

    #[test]
    fn shaded_csv_profile() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("solar.csv")).unwrap();
        writeln!(file, "# hour;irradiance").unwrap();
        for hour in 0..48 {
            // Half-hourly file, only even rows are whole hours
            let value = if hour % 2 == 0 { 10.0 * hour as f64 } else { -1.0 };
            writeln!(file, "{hour};{value}").unwrap();
        }
        drop(file);

        let json = r#"{
            case: "vdi6007_case12",
            steps_per_hour: 4,
            days: 3,
            initial_temperature: 295.15,
            signals: {
                outdoor_temperature: { kind: "constant", value: 285.15 },
                window_irradiance: {
                    kind: "shaded",
                    threshold: 100,
                    factor: 0.15,
                    profile: { kind: "csv_column", path: "solar.csv", column: 1, delimiter: ";", every: 2 },
                },
            },
        }"#;
        let scenario = Scenario::from_json(json, dir.path()).unwrap();
        let irradiance = &scenario.signals.window_irradiance;

        assert_eq!(irradiance.len(), 4 * 24 * 3);
        // row 10 holds hour 5: 100, not above the threshold
        assert_eq!(irradiance[4 * 5], 100.0);
        // row 12 holds hour 6: 120 shaded to 18
        assert!((irradiance[4 * 6 + 3] - 18.0).abs() < 1e-12);
        assert_eq!(irradiance[..96], irradiance[96..192]);
    }

    #[test]
    fn csv_offset_converts_celsius() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("t_amb.csv")).unwrap();
        for hour in 0..24 {
            writeln!(file, "{},{}", hour * 3600, 20 + hour % 3).unwrap();
        }
        drop(file);

        let json = r#"{
            case: "vdi6007_case12",
            steps_per_hour: 1,
            days: 1,
            initial_temperature: 295.15,
            signals: {
                outdoor_temperature: { kind: "csv_column", path: "t_amb.csv", column: 1, offset: 273.15 },
            },
        }"#;
        let scenario = Scenario::from_json(json, dir.path()).unwrap();
        assert!((scenario.signals.outdoor_temperature[1] - 294.15).abs() < 1e-9);
        assert_eq!(
            scenario.signals.outdoor_temperature,
            scenario.signals.exterior_equivalent_temperature
        );
    }

    #[test]
    fn unparsable_csv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.csv"), "0,warm\n").unwrap();
        let json = r#"{
            case: "vdi6007_case12",
            steps_per_hour: 1,
            days: 1,
            initial_temperature: 295.15,
            signals: { outdoor_temperature: { kind: "csv_column", path: "bad.csv", column: 1 } },
        }"#;
        let error = Scenario::from_json(json, dir.path()).unwrap_err();
        assert_matches!(
            error.downcast_ref::<Error>(),
            Some(Error::MalformedReferenceFile { .. })
        );
    }

    #[test]
    fn missing_scenario_file() {
        assert!(Scenario::load("no/such/scenario.json5").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{}", CASE02).unwrap();
        let scenario = Scenario::load(f.path()).unwrap();
        assert_eq!(scenario.days, 60);
    }
}
