//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::error::{Error, Result};
use crate::sheet::Field;

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Sheet to show (admins only; defaults to the first sheet)
    #[arg(long)]
    pub id: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Edit command arguments.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Field assignment, e.g. `favoriteScents=Pine\nVanilla`; repeatable
    #[arg(short = 's', long = "set", value_name = "FIELD=VALUE", required = true, value_parser = parse_assignment)]
    pub assignments: Vec<(Field, String)>,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Directory to write the export into (defaults to `export.output_dir`)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// JSON file to import
    pub file: PathBuf,
}

/// Share command arguments.
#[derive(Debug, Args)]
pub struct ShareCommand {
    /// Sheet to share
    #[arg(long)]
    pub id: String,

    /// Directory to write the printable sheet into
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Parse `FIELD=VALUE`. A literal `\n` in the value becomes a line break,
/// so list fields can be set from one argument.
fn parse_assignment(s: &str) -> Result<(Field, String)> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| Error::UnknownField {
            name: s.to_string(),
        })?;
    let field: Field = name.trim().parse()?;
    Ok((field, value.replace("\\n", "\n")))
}
