//! Root CLI structure for patchwright

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "patchwright")]
#[command(about = "Fetch, resolve, apply and sign application patches", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "PATCHWRIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the latest patch bundle or integrations into the cache
    Fetch(FetchArgs),

    /// List the patches of a bundle, optionally resolved for a target
    Patches(PatchesArgs),

    /// Run a full patch job: apply, merge, align, sign
    Patch(PatchArgs),

    /// Align an archive, or check its alignment
    Align(AlignArgs),

    /// Sign an archive with the manager's identity
    Sign(SignArgs),

    /// Verify the signature and alignment of an archive
    Verify(VerifyArgs),

    /// Show the effective configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
pub struct FetchArgs {
    /// Repository to fetch from, `owner/repo` (defaults to the configured patch source)
    #[arg(short, long)]
    pub source: Option<String>,

    /// Fetch from the configured integrations source instead
    #[arg(long, conflicts_with = "source")]
    pub integrations: bool,
}

#[derive(Args)]
pub struct PatchesArgs {
    /// Bundle file (`patches.json` or a zip containing it)
    pub bundle: PathBuf,

    /// Resolve against this package name
    #[arg(short, long, requires = "package_version")]
    pub package: Option<String>,

    /// Resolve against this package version
    #[arg(long = "package-version", requires = "package")]
    pub package_version: Option<String>,

    /// Show option declarations
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Args)]
pub struct PatchArgs {
    /// Package to patch
    pub input: PathBuf,

    /// Where to write the signed package
    #[arg(short, long)]
    pub output: PathBuf,

    /// Bundle file to load
    #[arg(short, long)]
    pub bundle: PathBuf,

    /// Patch ids to apply (repeatable)
    #[arg(short = 'i', long = "include")]
    pub include: Vec<String>,

    /// Select every patch supported by the target
    #[arg(long, requires = "package")]
    pub all: bool,

    /// Target package name
    #[arg(long, requires = "package_version")]
    pub package: Option<String>,

    /// Target package version
    #[arg(long = "package-version", requires = "package")]
    pub package_version: Option<String>,

    /// Option value as `patch-id.key=value` (repeatable)
    #[arg(long = "option", value_name = "ID.KEY=VALUE")]
    pub options: Vec<String>,

    /// Local integrations archive to merge
    #[arg(long, conflicts_with = "fetch_integrations")]
    pub integrations: Option<PathBuf>,

    /// Merge the latest integrations release from the configured source
    #[arg(long)]
    pub fetch_integrations: bool,
}

#[derive(Args)]
pub struct AlignArgs {
    /// Archive to align
    pub input: PathBuf,

    /// Aligned output (required unless --check)
    #[arg(required_unless_present = "check")]
    pub output: Option<PathBuf>,

    /// Only report misaligned entries
    #[arg(long)]
    pub check: bool,
}

#[derive(Args)]
pub struct SignArgs {
    /// Archive to sign
    pub input: PathBuf,

    /// Signed output
    pub output: PathBuf,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Archive to verify
    pub input: PathBuf,
}
