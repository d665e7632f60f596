//! Demo driver for `smpl-core`.
//!
//! Builds a single-facility queueing model (Poisson-ish arrivals, a fixed
//! holding time), runs it to completion, and prints the simulation report.
//!
//! # Usage
//!
//! ```bash
//! smpl-cli --servers 2 --arrivals 20 --trace
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use smpl_core::{Outcome, Simulation};

#[derive(Parser)]
#[command(name = "smpl-cli")]
#[command(author = "smpl-core")]
#[command(version = "0.1.0")]
#[command(about = "Runs a small single-facility queueing model against smpl-core")]
struct Cli {
    /// Name recorded against the simulation model.
    #[arg(long, default_value = "demo")]
    model: String,

    /// Number of interchangeable servers in the demo facility.
    #[arg(long, default_value_t = 1)]
    servers: usize,

    /// Number of customer arrivals to simulate.
    #[arg(long, default_value_t = 10)]
    arrivals: u32,

    /// Mean inter-arrival time.
    #[arg(long, default_value_t = 2.0)]
    mean_interarrival: f64,

    /// Mean service time.
    #[arg(long, default_value_t = 1.5)]
    mean_service: f64,

    /// PRNG stream to draw from (1..=15).
    #[arg(long, default_value_t = 1)]
    stream: u32,

    /// Emit a trace line for every scheduler operation.
    #[arg(long)]
    trace: bool,
}

const EVENT_ARRIVE: i64 = 1;
const EVENT_DEPART: i64 = 2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut sim: Simulation<u32> = Simulation::new(cli.model)?;
    sim.trace(cli.trace);
    sim.rand().stream(cli.stream)?;

    let facility = sim.facility_new("server", cli.servers)?;

    let first_arrival = sim.rand().expntl(cli.mean_interarrival);
    sim.schedule(EVENT_ARRIVE, first_arrival, 0)?;
    let mut next_customer = 1u32;
    let mut remaining_arrivals = cli.arrivals;

    while let Some((event_code, customer)) = sim.cause() {
        match event_code {
            EVENT_ARRIVE => {
                if remaining_arrivals > 0 {
                    remaining_arrivals -= 1;
                    let delay = sim.rand().expntl(cli.mean_interarrival);
                    sim.schedule(EVENT_ARRIVE, delay, next_customer)?;
                    next_customer += 1;
                }
                if sim.request(facility, customer, 0)? == Outcome::Reserved {
                    let service = sim.rand().expntl(cli.mean_service);
                    sim.schedule(EVENT_DEPART, service, customer)?;
                }
            }
            EVENT_DEPART => {
                sim.release(facility, &customer)?;
            }
            other => {
                tracing::warn!(event_code = other, "unrecognized event code, ignoring");
            }
        }
    }

    print!("{}", sim.report());
    Ok(())
}
