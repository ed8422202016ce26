/* src/main.rs */

use devdrop::setup::config::Config;
use devdrop::setup::gen_conf::generate_default_config;
use devdrop::{cli, quic};
use env_logger::Env;
use std::env;
use std::process::ExitCode;

const DEFAULT_CONFIG: &str = "devdrop.toml";

#[tokio::main]
async fn main() -> ExitCode {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("! Failed to install default CryptoProvider");
        return ExitCode::FAILURE;
    }

    let args: Vec<String> = env::args().collect();
    println!("devdrop {}", env!("CARGO_PKG_VERSION"));

    if args.len() == 1 {
        return match generate_default_config(DEFAULT_CONFIG) {
            Ok(()) => {
                println!("> Default config and certificate generated. Use '-c {}' to run.", DEFAULT_CONFIG);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("! Failed to generate default config: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if args.len() < 3 || args[1] != "-c" {
        eprintln!("Usage: {} -c <config> [put|get <from> <to>]", args[0]);
        eprintln!("       {}            (generates {})", args[0], DEFAULT_CONFIG);
        return ExitCode::FAILURE;
    }

    let config = match Config::from_file(&args[2]) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("! {}", e);
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(config.setup.log_level.as_str()))
        .init();

    match config.setup.mode.as_str() {
        "server" => {
            if let Err(e) = quic::bootstrap::start_quic_server(config).await {
                eprintln!("\nserver: {}\n", e);
                return ExitCode::FAILURE;
            }
        }
        "client" => {
            if let Err(e) = cli::dispatch_command(&args[3..], &config).await {
                eprintln!("\nApplication Error: {}\n", e);
                return ExitCode::FAILURE;
            }
        }
        other => {
            eprintln!("! Unknown mode '{}', expected 'server' or 'client'.", other);
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
