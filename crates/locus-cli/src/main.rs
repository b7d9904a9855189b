//! Locus CLI: the `locus` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands, ConfigCommands, JobsCommands, TaskCommands, TmCommands};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Guid {
            text,
            rid,
            sid,
            decoders,
            json,
        } => commands::guid::run(text, rid, sid, decoders, json),

        Commands::Flatten {
            text,
            format,
            decoders,
            json,
        } => commands::flatten::run(text, format, decoders, json),

        Commands::Tm { command } => match command {
            TmCommands::Stats { snapshot, json } => commands::tm::run_stats(snapshot, json),
            TmCommands::Lookup {
                snapshot,
                guid,
                text,
                decoders,
                json,
            } => commands::tm::run_lookup(commands::tm::LookupArgs {
                snapshot,
                guid,
                text,
                decoders,
                json,
            }),
        },

        Commands::Task { command } => match command {
            TaskCommands::Show {
                task_id,
                store,
                json,
            } => commands::task::run_show(task_id, store, json),
        },

        Commands::Jobs { command } => match command {
            JobsCommands::List {
                source,
                target,
                root,
                pending,
                json,
            } => commands::jobs::run_list(source, target, root, pending, json),
        },

        Commands::Config { command } => match command {
            ConfigCommands::Show { config, json } => commands::config::run_show(config, json),
        },
    }
}
