use anyhow::Result;
use clap::Parser;
use tickrelay_cli::args::load_config;
use tickrelay_cli::{Cli, Commands, Simulation, Summary};
use tickrelay_core::Phase;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "trace" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => {
            let config = args.relay_config()?;
            let summary = Simulation::new(args.clone(), config)?.run()?;
            print_summary(&summary);
        }
        Commands::Check { path } => {
            let config = load_config(path)?;
            println!("{} is valid", path.display());
            for phase in Phase::ALL {
                let settings = config.resolve(phase);
                println!("  {:<6} policy={:?} skip={:?}", phase, settings.policy, settings.skip);
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &Summary) {
    println!("Simulated {} frames, {} callbacks", summary.frames, summary.callbacks);
    println!(
        "  {:<6} {:>7} {:>9} {:>9} {:>9} {:>8} {:>8} {:>9}",
        "phase", "pumps", "invoked", "throttled", "failed", "evicted", "panicked", "remaining"
    );
    for phase in Phase::ALL {
        let (pumps, report, remaining) = summary.phase(phase);
        println!(
            "  {:<6} {:>7} {:>9} {:>9} {:>9} {:>8} {:>8} {:>9}",
            phase.name(),
            pumps,
            report.invoked,
            report.throttled,
            report.failed,
            report.evicted,
            report.panicked,
            remaining
        );
    }
}
