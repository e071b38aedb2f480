//! CLI module - Command-line interface definitions and handlers

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::core::config::{ProxyConfig, DEFAULT_LISTEN};

/// modproxy - a caching Go module proxy backed by the go command.
#[derive(Parser, Debug)]
#[command(name = "modproxy")]
#[command(
    author,
    version,
    about,
    long_about = r#"modproxy answers the GOPROXY protocol for Go module clients.

Online, it resolves modules with the local go command and caches version
lists for a short freshness window. Offline, it serves only what the
module cache already holds.

Examples:
    modproxy serve --listen 127.0.0.1:8081
    modproxy serve --offline --cache-dir /srv/gocache
    modproxy serve --exclude 'corp.example.com/*' --proxy https://goproxy.corp.example.com
    modproxy doctor
"#
)]
pub struct Cli {
    /// Quiet mode (warnings and errors only).
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        long_help = "Only log warnings and errors. RUST_LOG, when set, takes precedence."
    )]
    pub quiet: bool,

    /// Verbose mode (debug logging).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Log at debug level, including every go command invocation.\n\
RUST_LOG, when set, takes precedence."
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the module proxy protocol over HTTP.
    #[command(
        long_about = "Serve the GOPROXY protocol until interrupted.\n\n\
Routes:\n\
  /<module>/@v/list\n\
  /<module>/@latest\n\
  /<module>/@v/<version>.info|.mod|.zip\n\
  /metrics\n\n\
On SIGINT or SIGTERM the server stops accepting connections and waits up to\n\
--shutdown-grace for in-flight requests.\n"
    )]
    Serve(ServeArgs),

    /// Check the go command and the cache directory.
    #[command(
        long_about = "Check that the go command runs, that a cache root can be determined and\n\
that it is writable. Exits nonzero when a required check fails.\n"
    )]
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "MODPROXY_LISTEN", default_value = DEFAULT_LISTEN, value_name = "ADDR")]
    pub listen: SocketAddr,

    #[command(flatten)]
    pub resolver: ResolverArgs,

    /// Serve only from the cache; never run the go command.
    #[arg(long, env = "MODPROXY_OFFLINE")]
    pub offline: bool,

    /// GOPRIVATE-style patterns (comma separated) sent to --proxy.
    #[arg(
        long,
        env = "MODPROXY_EXCLUDE",
        value_name = "PATTERN",
        long_help = "Comma-separated glob patterns in GOPRIVATE syntax. Requests whose module\n\
path matches are relayed to --proxy instead of being resolved locally. With --proxy\n\
and no pattern, every request is relayed. The pattern is also passed to the go\n\
command as GOPRIVATE."
    )]
    pub exclude: Option<String>,

    /// Next-hop module proxy for excluded modules.
    #[arg(long, env = "MODPROXY_PROXY", value_name = "URL")]
    pub proxy: Option<String>,

    /// Seconds a cached version list stays fresh.
    #[arg(long, env = "MODPROXY_LIST_EXPIRE", default_value_t = 300, value_name = "SECS")]
    pub list_expire: u64,

    /// Seconds shutdown waits for in-flight requests.
    #[arg(long, env = "MODPROXY_SHUTDOWN_GRACE", default_value_t = 10, value_name = "SECS")]
    pub shutdown_grace: u64,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    #[command(flatten)]
    pub resolver: ResolverArgs,

    /// Check for offline serving (the cache need not be writable).
    #[arg(long, env = "MODPROXY_OFFLINE")]
    pub offline: bool,
}

#[derive(Args, Debug)]
pub struct ResolverArgs {
    /// Cache base directory (defaults to the first GOPATH entry).
    #[arg(
        long,
        env = "MODPROXY_CACHE_DIR",
        value_name = "DIR",
        long_help = "Base directory of the cache. Module files are served from\n\
DIR/pkg/mod/cache/download and the go command uses DIR/pkg/mod as GOMODCACHE.\n\n\
Do not share it with the clients of this proxy."
    )]
    pub cache_dir: Option<PathBuf>,

    /// go command line (program plus leading arguments).
    #[arg(long, env = "MODPROXY_GO", default_value = "go", value_name = "CMD")]
    pub go: String,
}

impl ServeArgs {
    pub fn into_config(self) -> ProxyConfig {
        ProxyConfig {
            listen: self.listen,
            cache_dir: self.resolver.cache_dir,
            offline: self.offline,
            exclude: self.exclude,
            upstream: self.proxy,
            list_expire: Duration::from_secs(self.list_expire),
            shutdown_grace: Duration::from_secs(self.shutdown_grace),
            go: self.resolver.go,
        }
    }
}

impl DoctorArgs {
    pub fn into_config(self) -> ProxyConfig {
        ProxyConfig {
            cache_dir: self.resolver.cache_dir,
            offline: self.offline,
            go: self.resolver.go,
            ..Default::default()
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI command
pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.quiet);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    match cli.command {
        Commands::Serve(args) => runtime.block_on(crate::server::run(args.into_config())),
        Commands::Doctor(args) => {
            runtime.block_on(crate::backends::doctor::run_doctor(&args.into_config()))
        }
    }
}
