use std::path::PathBuf;

use clap::Parser;

/// Runs the collage scheduler until Ctrl-C.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(name = "collage-backend", version, about)]
pub struct CliArgs {
    /// Path to a YAML, TOML or JSON configuration file.
    #[arg(short, long, env = "COLLAGE_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// JSON array of processing requests to enqueue at startup.
    #[arg(short = 'e', long = "enqueue", value_name = "FILE")]
    pub enqueue_path: Option<PathBuf>,
}
