//! Main entry point for the patchwright CLI

mod builtin;
mod cli;
mod commands;
mod config;
mod utils;

use anyhow::Result;
use clap::CommandFactory;
use clap::Parser;
use clap_complete::{Generator, generate};
use std::io;

use crate::cli::{Cli, Commands};
use crate::config::Config;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Parse command line arguments
    let cli = Cli::parse();

    // Set verbosity
    if cli.verbose > 0 {
        log::set_max_level(match cli.verbose {
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        });
    } else if cli.quiet {
        log::set_max_level(log::LevelFilter::Error);
    }

    if let Commands::Completions { shell } = cli.command {
        print_completions(shell, &mut Cli::command());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;

    // Execute command
    match cli.command {
        Commands::Fetch(args) => commands::fetch::execute(args, &config),
        Commands::Patches(args) => commands::patches::execute(args),
        Commands::Patch(args) => commands::patch::execute(args, &config),
        Commands::Align(args) => commands::archive::align(args),
        Commands::Sign(args) => commands::archive::sign(args, &config),
        Commands::Verify(args) => commands::archive::verify(args),
        Commands::Config => commands::config::show(&config, cli.config.as_deref()),
        Commands::Completions { .. } => Ok(()),
    }
}

fn print_completions<G: Generator>(generator: G, cmd: &mut clap::Command) {
    generate(
        generator,
        cmd,
        cmd.get_name().to_string(),
        &mut io::stdout(),
    );
}
