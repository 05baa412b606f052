//! ibhook - OCI hook granting InfiniBand devices
//!
//! Registered as a `prestart` (or `createRuntime`) hook; the runtime pipes
//! the container state to stdin.
//!
//! ## Usage
//!
//! ```sh
//! ibhook [--debug] [--device-root <path>] [--container-path <path>] prestart
//! ibhook poststart
//! ibhook poststop
//! ```
//!
//! Exit status is 0 on success and 1 when the grant fails. Usage errors exit
//! with 2.

use clap::{Parser, Subcommand};
use ibhook::{
    CONTAINER_PATH_ENV_VAR, DEVICE_ROOT_ENV_VAR, HookConfig, INFINIBAND_DEV_DIR, LOG_ENV_VAR,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

// =============================================================================
// CLI Parsing
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "ibhook", version, about = "Grant InfiniBand devices to OCI containers")]
struct Cli {
    /// Enable debug output.
    #[arg(long, global = true)]
    debug: bool,

    /// Host device directory (or single device) to grant.
    #[arg(long, env = DEVICE_ROOT_ENV_VAR, default_value = INFINIBAND_DEV_DIR, global = true)]
    device_root: PathBuf,

    /// Path the devices get inside the container (default: same as host).
    #[arg(long, env = CONTAINER_PATH_ENV_VAR, global = true)]
    container_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the prestart hook.
    Prestart,
    /// No-op.
    Poststart,
    /// No-op.
    Poststop,
}

// =============================================================================
// Main
// =============================================================================

/// Builds the log filter from `IBHOOK_LOG` (or `RUST_LOG`) directives.
/// `--debug` raises the default level to debug on top of them.
fn log_filter(debug: bool, directives: Option<&str>) -> EnvFilter {
    let filter = directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    if debug {
        filter.add_directive(LevelFilter::DEBUG.into())
    } else {
        filter
    }
}

fn init_logging(debug: bool) {
    let directives = std::env::var(LOG_ENV_VAR)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .ok();

    // The runtime captures hook stderr; stdout is left alone.
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(debug, directives.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Command::Prestart => {
            let config = HookConfig {
                device_root: cli.device_root,
                container_path: cli.container_path,
                ..HookConfig::default()
            };
            debug!("hook config: {:?}", config);

            match ibhook::prestart(std::io::stdin().lock(), &config) {
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("prestart failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Poststart | Command::Poststop => ExitCode::SUCCESS,
    }
}
