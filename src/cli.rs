use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "cisbench",
    version,
    about = "Local CIS benchmark rule extraction and remediation script tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Ingest(IngestArgs),
    Sections(SectionsArgs),
    Rules(RulesArgs),
    Show(ShowArgs),
    Script(ScriptArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Family {
    /// CIS Linux distribution benchmarks (3- and 4-level rule ids).
    CisLinux,
    /// Two-level guides with flat `1.1`-style rule ids.
    Flat,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = ".cache/cisbench")]
    pub cache_root: PathBuf,

    /// Source document: `.txt` is read directly, anything else goes
    /// through `pdftotext -layout`.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = Family::CisLinux)]
    pub family: Family,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SectionsArgs {
    #[arg(long, default_value = ".cache/cisbench")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RulesArgs {
    #[arg(long, default_value = ".cache/cisbench")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub section: String,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[arg(long, default_value = ".cache/cisbench")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub rule: String,
}

#[derive(Args, Debug, Clone)]
pub struct ScriptArgs {
    #[arg(long, default_value = ".cache/cisbench")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Full rule id, e.g. `7.1.13`. Mutually exclusive with `--all`.
    #[arg(long, conflicts_with = "all")]
    pub rule: Option<String>,

    /// Assemble one combined script covering every rule in the database.
    #[arg(long, default_value_t = false)]
    pub all: bool,

    #[arg(long, default_value = "ubuntu-22.04")]
    pub target_os: String,

    /// Family whose shebang variants bound the synthesized script.
    #[arg(long, value_enum, default_value_t = Family::CisLinux)]
    pub family: Family,

    /// External synthesis command; receives the prompt on stdin and must
    /// print the model output on stdout.
    #[arg(long)]
    pub synth_command: Option<String>,

    /// Write the script here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/cisbench")]
    pub cache_root: PathBuf,
}
