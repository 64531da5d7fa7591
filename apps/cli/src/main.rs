//! localekit CLI — patch localization resource files and source text.
//!
//! Runs declarative patch plans against a web project: nested JSON keys in
//! per-language resource files, and anchored line edits in JSX/TSX sources.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
