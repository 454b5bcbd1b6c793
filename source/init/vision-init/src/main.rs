// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host build of the boot orchestrator.
//!
//! Soft-reset cycles repeat until stdin closes; a fatal error blinks the
//! (logged) LED forever.

#![forbid(unsafe_code)]
#![deny(clippy::all)]

use std::cell::RefCell;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use log::LevelFilter;
use vision_init::{logging, sim, BootConfig};

#[derive(Parser, Debug)]
#[command(name = "vision-init", about = "Boot and soft-reset orchestrator, host simulation")]
struct Cli {
    /// Boot configuration file.
    #[arg(default_value = "boot.toml")]
    config: PathBuf,

    /// Directory holding boot.py and main.py.
    #[arg(default_value = ".")]
    script_dir: PathBuf,

    /// Maximum log level written to the UART log.
    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let config = match BootConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("vision-init: {err}");
            return ExitCode::FAILURE;
        }
    };

    let input = Box::new(io::BufReader::new(io::stdin()));
    let output = Rc::new(RefCell::new(io::stdout()));
    let (mut orchestrator, link_closed) = sim::build(config, cli.script_dir, input, output);
    while !link_closed.get() {
        if let Err(err) = orchestrator.run_cycle() {
            orchestrator.halt(err);
        }
    }
    ExitCode::SUCCESS
}
