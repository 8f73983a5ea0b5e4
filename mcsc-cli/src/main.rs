mod app;
mod commands;
mod output;

use std::{process::ExitCode, time::Duration};

use anyhow::Context;
use clap::Parser;
use mcsc::channel::CancelToken;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<ExitCode> {
    // First Ctrl+C cancels a pending wait, a second one exits
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            eprintln!("\nCancelled.");
            std::process::exit(130);
        }
        handler_token.cancel();
    })
    .context("failed to set Ctrl+C handler")?;

    let cli = Cli::parse();

    // Show mcsc info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("mcsc", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Check { paths, timeout } => commands::check::run(
            paths,
            Duration::from_secs(*timeout),
            &cancel,
            &cli.global,
        ),
        Command::Patch {
            path,
            output,
            method,
            roots,
            hook_owner,
            hook_name,
            hook_descriptor,
        } => commands::patch::run(
            path,
            &commands::patch::PatchOptions {
                output,
                method,
                roots,
                hook_owner,
                hook_name,
                hook_descriptor,
            },
            &cli.global,
        ),
        Command::Disasm { path, method } => {
            commands::disasm::run(path, method.as_deref(), &cli.global)
        }
    }
}
