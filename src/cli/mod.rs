//! CLI interface for coildrive

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rotating magnetic field generator for 3-axis coil rigs
#[derive(Parser)]
#[command(name = "coildrive")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive the coils with the interactive control panel
    Run {
        /// Configuration file path
        #[arg(short, long, default_value = "coildrive.yaml")]
        config: PathBuf,
    },

    /// Render the drive signal offline to a WAV file
    Record {
        /// Configuration file path
        #[arg(short, long, default_value = "coildrive.yaml")]
        config: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },

    /// List available output devices
    Devices,

    /// Validate a configuration file
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "coildrive.yaml")]
        config: PathBuf,
    },

    /// Generate an example configuration file
    Init,
}
