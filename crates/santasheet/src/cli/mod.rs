//! Command-line interface for santasheet.
//!
//! This module provides the CLI structure for the `santa` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, EditCommand, ExportCommand, ImportCommand, ListCommand, ShareCommand,
    ShowCommand,
};

/// santa - Santa's Cheat Sheet
///
/// Keep a gift-preference sheet for yourself, and as an admin browse,
/// export, import, and share everyone's sheets.
#[derive(Debug, Parser)]
#[command(name = "santa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Login identifier (email) to sign in as
    #[arg(short, long, global = true, env = "SANTASHEET_USER", value_name = "LOGIN")]
    pub user: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show a sheet
    Show(ShowCommand),

    /// Create your sheet
    Create,

    /// Edit and save fields of your sheet
    Edit(EditCommand),

    /// List every sheet (admin)
    List(ListCommand),

    /// Export every sheet to a JSON file (admin)
    Export(ExportCommand),

    /// Import sheets from a JSON file (admin)
    Import(ImportCommand),

    /// Write a printable sheet and print an email link (admin)
    Share(ShareCommand),

    /// Print a line each time the sheet collection changes
    Watch,

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
