use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    author = "Alexander Heilmeier <alexander.heilmeier@tum.de>",
    name = "RS-LB",
    about = "A lap-based race simulator written in Rust"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug output (per-lap progress and race events)
    #[clap(short, long)]
    pub debug: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs, every run uses its own seed (seed, seed + 1, ...)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the scenario file (circuits, teams, drivers and cars)
    #[clap(short, long)]
    pub parfile_path: PathBuf,

    /// Set path to a JSON file overriding the simulation constants
    #[clap(short, long)]
    pub constants_path: Option<PathBuf>,

    /// Override the seed of the scenario file
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Override the circuit of the scenario file
    #[clap(long)]
    pub circuit_id: Option<u32>,

    /// Set wall clock duration of a lap in milliseconds (single run only, 0 = as fast as possible)
    #[clap(short, long, default_value = "0")]
    pub lap_interval: u64,

    /// Write the timing sheet of the (first) race to a CSV file
    #[clap(long)]
    pub csv_path: Option<PathBuf>,

    /// Write a lap time plot of the (first) race to an SVG file
    #[clap(long)]
    pub plot_path: Option<PathBuf>,

    /// Write the final race status of the (first) race to a JSON file
    #[clap(long)]
    pub status_json: Option<PathBuf>,
}
