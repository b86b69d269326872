//! # Redis Stack Connectivity Probe
//!
//! Purpose: Check from the command line that the configured Redis Stack
//! server is reachable and that plain keys, RediSearch and RedisJSON all work.
//!
//! Takes no arguments. Exits 0 only when every phase passes.

mod container;
mod probe;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    println!("Redis Stack Connection Test Script");
    println!("{}", "-".repeat(30));

    let config = probe::ProbeConfig::from_env();
    probe::exit_code(probe::run(&config))
}
