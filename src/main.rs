//! Spicy - DC circuit simulator
//!
//! Solves the DC operating point of a netlist, then runs its `.DC` sweeps.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info spicy circuit.cir --output-dir out/ --solver bicg --sparse
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use spicy_core::{
    analysis,
    circuit::Circuit,
    error::Result,
    netlist,
    solver::{SolverMethod, StorageMode},
    Session, SolverOptions,
};

/// DC operating point and sweep simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist
    #[arg(value_name = "NETLIST")]
    netlist: PathBuf,

    /// Directory for the result files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Solver, overriding the netlist's .OPTIONS
    #[arg(long)]
    solver: Option<SolverMethod>,

    /// Use compressed-column storage
    #[arg(long)]
    sparse: bool,

    /// Krylov relative tolerance
    #[arg(long)]
    itol: Option<f64>,

    /// Krylov iteration cap
    #[arg(long)]
    max_iterations: Option<usize>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let ast = netlist::parse_file(&args.netlist)?;
    let circuit = Circuit::from_ast(&ast)?;

    // Defaults, then .OPTIONS, then command-line flags
    let mut options = SolverOptions::from_netlist(&ast.options);
    if let Some(method) = args.solver {
        options = options.with_method(method);
    }
    if args.sparse {
        options = options.with_storage(StorageMode::Sparse);
    }
    if let Some(itol) = args.itol {
        options = options.with_tolerance(itol);
    }
    if let Some(max_iterations) = args.max_iterations {
        options = options.with_max_iterations(max_iterations);
    }
    tracing::info!(?options, "solver configuration");

    std::fs::create_dir_all(&args.output_dir)?;

    let mut session = Session::new(circuit, options)?;
    analysis::dump_operating_point(&mut session, &args.output_dir)?;
    let files = analysis::execute_commands(&mut session, &ast.commands, &args.output_dir)?;

    tracing::info!(solves = session.solve_count(), files = files.len(), "done");
    Ok(())
}
