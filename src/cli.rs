use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_INPUT: &str = "BNCC_EI_EF_110518_versaofinal_site.json";

#[derive(Parser, Debug)]
#[command(
    name = "bncc",
    version,
    about = "Rebuilds the BNCC curriculum tree from an extracted page dump"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Page dump produced by the document-access layer.
    #[arg(long, default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Competency reference texts keyed by area and component name.
    #[arg(long)]
    pub competencies: Option<PathBuf>,
}

impl Default for ExtractArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output_dir: PathBuf::from("."),
            competencies: None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}
