//! `sdvidlc` entry point.
//!
//! Runs the compiler front end over every IDL file named on the command
//! line. Errors are reported on stderr with their source location; the
//! process exits non-zero as soon as a unit fails.

mod cli;

use clap::Parser;
use log::{debug, info};
use sdvidl_front::Pipeline;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .format_timestamp(None)
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), sdvidl_base::CompileError> {
    let mut env = cli.to_environment()?;

    while let Some(file) = env.next_file() {
        info!("processing {}", file.display());
        let mut pipeline = Pipeline::from_file(&file, env.clone())?;
        pipeline.lexical_check()?;

        let meta = pipeline.take_meta();
        debug!(
            "{}: {} preprocessor meta entries, last token '{}'",
            file.display(),
            meta.len(),
            pipeline.last_valid_token().text()
        );
    }

    Ok(())
}
