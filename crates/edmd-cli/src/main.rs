//! edmd front-end: load a configuration, run the event loop, report, and
//! optionally write a snapshot.

use clap::Parser;
use edmd::{CollisionCorrelator, KineticEnergy, MomentumWatch, Simulation};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "edmd", version, about = "Event-driven molecular dynamics simulator")]
struct Args {
    /// Input configuration document.
    config: PathBuf,

    /// Write the final configuration snapshot here.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Stop after this many committed events.
    #[arg(long, value_name = "N")]
    events: Option<u64>,

    /// Stop once the simulation clock reaches this time.
    #[arg(long = "sim-time", value_name = "T")]
    sim_time: Option<f64>,

    /// Override the configuration's random seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Track kinetic energy and temperature.
    #[arg(long)]
    kenergy: bool,

    /// Histogram the free times between pair collisions.
    #[arg(long)]
    collision_correlator: bool,

    /// Watch total-momentum drift.
    #[arg(long)]
    momentum: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "fatal");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let xml = std::fs::read_to_string(&args.config)?;
    let mut loaded = edmd::load_str(&xml)?;

    if let Some(seed) = args.seed {
        loaded.model.seed = seed;
        for (i, system) in loaded.systems.iter_mut().enumerate() {
            system.reseed(seed.wrapping_add(i as u64));
        }
    }

    let mut sim = Simulation::new(loaded)?;
    if args.kenergy {
        sim.add_plugin(Box::new(KineticEnergy::new()));
    }
    if args.collision_correlator {
        sim.add_plugin(Box::new(CollisionCorrelator::new(0.1)));
    }
    if args.momentum {
        sim.add_plugin(Box::new(MomentumWatch::new()));
    }

    let reason = sim.run(args.events, args.sim_time)?;
    tracing::info!(
        ?reason,
        events = sim.event_count(),
        time = sim.time(),
        "simulation finished"
    );

    for (name, report) in sim.plugin_reports() {
        println!("{name}: {report}");
    }

    if let Some(out) = &args.out {
        std::fs::write(out, sim.snapshot()?)?;
    }
    Ok(())
}
