//! kiln - container image build planner
//!
//! Detects the language ecosystem of an application directory, plans the
//! image build and prints the plan (and optionally the lowered build IR).

mod cli;

use crate::cli::{Cli, Commands};
use clap::Parser;
use kiln_app::{App, Environ};
use kiln_errors::{ProviderError, Result};
use kiln_generate::RUNTIME_IMAGE;
use kiln_graph::BuildGraph;
use kiln_llb::State;
use std::path::Path;
use std::process;
use tracing::error;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(e) = run(&cli) {
        error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Plan {
            path,
            pretty,
            dump_ir,
        } => plan(path, *pretty, *dump_ir),
        Commands::Detect { path } => detect(path),
    }
}

fn plan(path: &Path, pretty: bool, dump_ir: bool) -> Result<()> {
    let app = App::scan(path)?;
    let env = Environ::from_env();

    let result = kiln_providers::generate_build_plan(&app, &env)?;

    for line in &result.logs {
        eprintln!("{line}");
    }

    let json = if pretty {
        serde_json::to_string_pretty(&result.plan)?
    } else {
        serde_json::to_string(&result.plan)?
    };
    println!("{json}");

    if dump_ir {
        let mut graph = BuildGraph::new(&result.plan, State::image(RUNTIME_IMAGE));
        let output = graph.generate()?;
        eprintln!();
        for line in output.state.dump() {
            eprintln!("{line}");
        }
    }

    Ok(())
}

fn detect(path: &Path) -> Result<()> {
    let app = App::scan(path)?;
    let env = Environ::from_env();

    match kiln_providers::detect_provider(&app, &env)? {
        Some(provider) => {
            println!("{provider}");
            Ok(())
        }
        None => Err(ProviderError::NoProviderDetected.into()),
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
