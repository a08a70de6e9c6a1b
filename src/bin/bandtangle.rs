//! CLI for the bandtangle band classification engine.
//!
//! Reads `eigenvalues.npy`, `dp.npy`, and `neighbors.npy` from the working
//! directory, runs the clustering pipeline, and writes the output bundle
//! (`bandsfinal.npy`, `signalfinal.npy`, `correct_signalfinal.npy`,
//! `degeneratefinal.npy`, `final_score.npy`, `final.report`) next to it.

use std::path::PathBuf;

use clap::Parser;
use tracing::{Level, info};

use bandtangle::core::io::InputBundle;
use bandtangle::material::Material;
use bandtangle::solver::SolverOptions;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the input files; outputs are written here too.
    #[arg(short('d'), long, default_value = ".")]
    workdir: PathBuf,

    /// Number of k-points along the x direction.
    #[arg(long)]
    nkx: usize,

    /// Number of k-points along the y direction.
    #[arg(long)]
    nky: usize,

    /// Number of k-points along the z direction (only 1 is supported).
    #[arg(long, default_value = "1")]
    nkz: usize,

    /// Lowest band to cluster.
    #[arg(long, default_value = "0")]
    min_band: usize,

    /// Highest band to cluster; defaults to the last band in the input.
    #[arg(long)]
    max_band: Option<usize>,

    /// Overlap tolerance for the similarity-graph edges.
    #[arg(short('t'), long, default_value = "0.95")]
    tol: f64,

    /// Tolerance-relaxation step of the outer loop.
    #[arg(long, default_value = "0.1")]
    step: f64,

    /// Mixing tolerance at which the outer loop stops.
    #[arg(long, default_value = "0.0")]
    min_tol: f64,

    /// Error-mask density (fraction of the grid) that triggers dilation.
    #[arg(long, default_value = "0.05")]
    mask_density: f64,

    /// Seed for the degenerate-pair repair.
    #[arg(short('s'), long, default_value = "42")]
    seed: Option<u64>,

    /// Number of worker threads for the parallel phases.
    #[arg(short('n'), long, default_value = "1")]
    n_process: usize,

    /// JSON file with solver options, replacing the option flags above.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn solver_options(args: &Args) -> Result<SolverOptions, String> {
    if let Some(path) = &args.config {
        let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        return serde_json::from_str(&text).map_err(|e| e.to_string());
    }
    Ok(SolverOptions {
        min_band: args.min_band,
        max_band: args.max_band,
        tol: args.tol,
        step: args.step,
        min_tol: args.min_tol,
        seed: args.seed,
        mask_density: args.mask_density,
    })
}

fn main() -> Result<(), String> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.n_process)
        .build_global()
        .map_err(|e| e.to_string())?;

    let options = solver_options(&args)?;
    info!(
        "grid {}x{}x{}, bands {}..{}, tolerance {}, {} workers",
        args.nkx,
        args.nky,
        args.nkz,
        options.min_band,
        options
            .max_band
            .map_or_else(|| "last".to_string(), |b| b.to_string()),
        options.tol,
        args.n_process
    );

    let bundle =
        InputBundle::read(&args.workdir, args.nkx, args.nky).map_err(|e| e.to_string())?;
    info!("finished reading data: {} bands", bundle.nbnd());

    let mut material = Material::new(args.nkx, args.nky, bundle, options);

    info!("calculating vectors");
    material.make_vectors().map_err(|e| e.to_string())?;

    info!("calculating connections");
    material.make_connections().map_err(|e| e.to_string())?;

    info!("solving");
    let outcome = material.solve().map_err(|e| e.to_string())?;

    outcome.write(&args.workdir).map_err(|e| e.to_string())?;
    info!("clustering done");
    Ok(())
}
