use std::path::PathBuf;

use clap::Parser;

/// CLI arguments for the unweave binary.
#[derive(Parser, Debug)]
#[command(
    name = "unweave",
    version,
    about = "Reconstruct ES modules from webpack and browserify bundles"
)]
pub struct CliArgs {
    /// Bundled JavaScript file to reconstruct.
    pub input: PathBuf,

    /// Directory the reconstructed modules are written to.
    #[arg(short = 'o', long = "out-dir", default_value = "unweave-out")]
    pub out_dir: PathBuf,

    /// Also write a bundle.json summary into the output directory.
    #[arg(long)]
    pub json: bool,

    /// List detected module ids without writing any files.
    #[arg(long)]
    pub list: bool,
}
