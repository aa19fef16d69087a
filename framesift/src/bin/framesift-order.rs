use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{self, Context};
use framesift::output_namer;
use framesift_common::{bin_common::init::init_eyre, utils::fsutils::all_files};

#[derive(Parser)]
#[command()]
/// Prints the files of some folders of extracted frames in chronological order, the same
/// way downstream tools order them.
struct Cli {
    /// Folders to list
    #[arg(required = true)]
    dirs: Vec<PathBuf>,
}

fn main() -> eyre::Result<()> {
    init_eyre()?;
    let cli = Cli::parse();

    let files: Vec<PathBuf> = all_files(&cli.dirs).wrap_err("failed to list the folders")?;
    let ordered =
        output_namer::chronological(files).wrap_err("failed to find the order of the files")?;

    for file in ordered {
        println!("{}", file.display());
    }

    Ok(())
}
