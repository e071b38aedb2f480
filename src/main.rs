//! modproxy - A caching Go module proxy
//!
//! modproxy provides:
//! - The GOPROXY protocol (list, latest, info, mod, zip) over HTTP
//! - Online resolution through the local go command
//! - Offline serving straight from the module cache
//! - Forwarding of selected modules to another proxy

use anyhow::Result;
use clap::Parser;

mod backends;
mod cache;
mod cli;
mod core;
mod ops;
mod server;

#[cfg(test)]
mod testutil;

fn main() -> Result<()> {
    // Check for unsupported platforms
    #[cfg(windows)]
    {
        eprintln!("Error: Windows is not supported. Please use WSL (not guaranteed to work).");
        std::process::exit(1);
    }

    let cli = cli::Cli::parse();
    cli::run(cli)
}
