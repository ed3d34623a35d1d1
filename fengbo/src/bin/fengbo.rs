// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use clap::Parser;
use std::path::PathBuf;
use std::process;

use fengbo::config::Config;
use fengbo::log::init_log;
use fengbo::server::Server;

#[derive(Debug, Parser)]
#[command(name = "fengbo", version, about = "MQTT 3.1.1 broker")]
struct Arguments {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    let arguments = Arguments::parse();

    let config = match &arguments.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Failed to load config from {path:?}: {err}");
                process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Err(err) = init_log(config.log()) {
        eprintln!("Failed to initialize logger: {err}");
        process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("Failed to create runtime: {err}");
            process::exit(1);
        }
    };

    let server = Server::new(config);
    if let Err(err) = runtime.block_on(server.run()) {
        log::error!("Broker terminated: {err}");
        process::exit(1);
    }
}
