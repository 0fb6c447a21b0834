//! frame-atlas CLI
//!
//! Command-line interface for the frame-atlas clustering system: build a
//! cluster map from a vector stream, classify new frames against it, embed
//! the map for inspection, and generate synthetic streams to practice on.
//!
//! # Usage
//!
//! ```bash
//! # Suggest an absorption radius, then cluster a stream
//! frame-atlas scan frames.txt
//! frame-atlas cluster 0.25 frames.txt --anchors --dcc
//!
//! # Classify new frames against the saved map
//! frame-atlas locate frames.clusterdat/anchors.txt \
//!     frames.clusterdat/dcc.txt new_frames.txt -k 3
//!
//! # Project the cluster map down to 2-D
//! frame-atlas embed frames.clusterdat/dcc.txt --seed 7
//!
//! # Make a synthetic practice stream
//! frame-atlas gen circle2d 12 frames.txt --repeat 50 --noise 0.05 --seed 1
//! ```

use clap::{Parser, Subcommand};

pub mod commands;

/// frame-atlas Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "frame-atlas")]
#[command(author, version, about = "Online clustering and search for high-dimensional frame streams")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster a vector stream into a map of anchors
    Cluster(commands::ClusterArgs),

    /// Find the nearest clusters for new frames against a saved map
    Locate(commands::LocateArgs),

    /// Embed a cluster distance matrix into a low-dimensional layout
    Embed(commands::EmbedArgs),

    /// Summarize consecutive-frame distances to pick an rlim
    Scan(commands::ScanArgs),

    /// Generate a synthetic vector stream
    Gen(commands::GenArgs),

    /// Display version information
    Version,
}
