//! `rustbdg <input.toml> [--debug]`
use Rustbdg::Parameters;
use Rustbdg::routines;
use log::{error, info};
use std::process::ExitCode;

const USAGE: &str = "usage: rustbdg <input.toml> [--debug]";

fn main() -> ExitCode {
    let mut input: Option<String> = None;
    let mut debug = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--debug" => debug = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return ExitCode::SUCCESS;
            }
            _ if input.is_none() => input = Some(arg),
            _ => {
                eprintln!("{}", USAGE);
                return ExitCode::FAILURE;
            }
        }
    }
    let Some(input) = input else {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    };

    // RUST_LOG 优先
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if debug { "debug" } else { "info" }),
    )
    .init();
    if debug {
        info!("Debug logging is enabled.");
    }

    let parameters = match Parameters::from_file(&input) {
        Ok(p) => p,
        Err(e) => {
            error!("Could not load {}: {}", input, e);
            return ExitCode::FAILURE;
        }
    };
    info!("Loaded parameters successfully.");
    match routines::run(&parameters) {
        Ok(()) => {
            info!("Calculation '{}' finished.", parameters.control.calculation);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
