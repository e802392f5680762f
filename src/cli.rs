// Command-line flags and logging setup.
// The menu itself is interactive; flags only pick the settings file, override
// the tool binary and raise the log level.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Interactive menu around gallery-dl
#[derive(Parser, Debug)]
#[command(name = "gallery-dl-menu", version)]
pub struct Cli {
    /// Settings file (default: <config dir>/gallery-dl-menu/settings.json)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Download tool binary, overrides the settings file
    #[arg(long, value_name = "BIN")]
    pub tool: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Log to stderr so the menu on stdout stays readable. `RUST_LOG` still wins
/// for other targets.
pub fn init_logging(cli: &Cli) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("gallery_dl_menu={}", cli.log_level()).parse() {
        filter = filter.add_directive(directive);
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
