//! `demandgen` — synthesize daily mobility demand from OpenStreetMap.

mod args;
mod pipeline;

use clap::Parser;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = args::Args::parse();
    if let Err(e) = pipeline::run(&args) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
