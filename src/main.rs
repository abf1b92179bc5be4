use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use reduced_order_zone::{
    rc_network::{air_heat_capacity, RcNetwork},
    scenario::Scenario,
    tools::kelvin_to_celsius,
    validation::{compare, day_window, hourly_means, load_reference, REFERENCE_DAYS},
    ParameterTable, PortConfiguration,
};

#[derive(Parser)]
#[command(name = "reduced-order-zone")]
#[command(about = "Two-mass reduced-order zone model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a scenario and report the reference days
    Run {
        /// Scenario file (JSON5)
        scenario: PathBuf,

        /// Parameter table to use instead of the built-in cases
        #[arg(short, long)]
        cases: Option<PathBuf>,

        /// Reference results (CSV, hourly °C for days 1, 10 and 60)
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },
    /// Print the thermal network of a case in Graphviz DOT
    Dot {
        case: String,

        #[arg(short, long)]
        cases: Option<PathBuf>,
    },
}

fn parameter_table(path: Option<PathBuf>) -> anyhow::Result<ParameterTable> {
    match path {
        Some(path) => ParameterTable::load(&path)
            .with_context(|| format!("Loading parameter table {}", path.display())),
        None => ParameterTable::builtin(),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            cases,
            reference,
        } => {
            let table = parameter_table(cases)?;
            let scenario = Scenario::load(&scenario)?;
            let output = scenario.run(&table)?;
            info!("Simulated {} steps", output.len());

            match reference {
                Some(path) => {
                    let reference = load_reference(&path)?;
                    let days = compare(
                        &output.air_temperature,
                        scenario.steps_per_hour,
                        &reference,
                    )?;
                    for day in days {
                        println!("Max. deviation day {}: {:.4} K", day.day, day.max_deviation);
                    }
                }
                None => {
                    let hourly = hourly_means(&output.air_temperature, scenario.steps_per_hour);
                    for day in REFERENCE_DAYS {
                        let Some(values) = day_window(&hourly, day) else {
                            continue;
                        };
                        let celsius = values
                            .iter()
                            .map(|t| format!("{:.2}", kelvin_to_celsius(*t)))
                            .collect::<Vec<_>>();
                        println!("Day {}: {}", day, celsius.join(" "));
                    }
                }
            }
        }
        Commands::Dot { case, cases } => {
            let params = parameter_table(cases)?.get_parameters(&case)?;
            let ports = PortConfiguration::default();
            let network = RcNetwork::new(&params, air_heat_capacity(&params, &ports));
            println!("{}", network.to_dot());
        }
    }

    Ok(())
}
