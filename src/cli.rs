use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "jpf-autodoc")]
#[command(about = "Extract configuration and type metadata from compiled JPF classes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Properties file with analysis defaults; falls back to JPF_AUTODOC_CONFIG.
    #[arg(long, value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Skip site.properties lookup.
    #[arg(long, global = true)]
    pub no_site: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Analyze class files, directories or jars.
    Analyze {
        #[arg(value_name = "TARGET", required = true)]
        targets: Vec<PathBuf>,

        #[arg(long, conflicts_with = "types_only")]
        config_only: bool,

        #[arg(long)]
        types_only: bool,

        #[arg(long)]
        validate: bool,

        #[arg(short = 't', long, value_name = "N")]
        threads: Option<usize>,

        #[arg(long)]
        sequential: bool,

        #[arg(long, value_name = "PATTERN")]
        include: Vec<String>,

        #[arg(long, value_name = "PATTERN")]
        exclude: Vec<String>,

        /// Wall-clock budget per source, in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        #[arg(short = 'v', long)]
        verbose: bool,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Also analyze the jpf-core jar named by site.properties.
        #[arg(long)]
        with_jpf_core: bool,
    },
    /// List the units that would be analyzed.
    Units {
        #[arg(value_name = "TARGET", required = true)]
        targets: Vec<PathBuf>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
