use anna_gateway::config::GatewayConfig;
use anna_gateway::{AnnaClient, env_file};
use log::{error, info};
use std::path::PathBuf;

#[derive(Debug, PartialEq)]
enum Command {
    Status,
    Ping,
    SetPreset(String),
    SetTemperature(f64),
    SetSchema { name: String, active: bool },
}

#[derive(Debug)]
struct Cli {
    env_file: Option<PathBuf>,
    command: Command,
}

const USAGE: &str = "usage: anna-gateway [--env-file PATH] [status | ping | set-preset NAME | set-temperature VALUE | set-schema NAME on|off]";

fn parse_cli(args: impl IntoIterator<Item = String>) -> Result<Cli, String> {
    let mut env_file: Option<PathBuf> = None;
    let mut positional = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--env-file" || arg.starts_with("--env-file=") {
            if env_file.is_some() {
                return Err("`--env-file` provided more than once".to_string());
            }
            let value = match arg.strip_prefix("--env-file=") {
                Some(v) => v.to_string(),
                None => args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?,
            };
            if value.is_empty() {
                return Err("`--env-file` requires a path argument".to_string());
            }
            env_file = Some(PathBuf::from(value));
        } else if arg.starts_with("--") {
            return Err(format!("unrecognised argument: {}\n{}", arg, USAGE));
        } else {
            positional.push(arg);
        }
    }

    let command = match positional.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] | ["status"] => Command::Status,
        ["ping"] => Command::Ping,
        ["set-preset", name] => Command::SetPreset(name.to_string()),
        ["set-temperature", value] => Command::SetTemperature(
            value
                .parse::<f64>()
                .map_err(|_| format!("invalid temperature: {}", value))?,
        ),
        ["set-schema", name, state] => Command::SetSchema {
            name: name.to_string(),
            active: match *state {
                "on" | "true" => true,
                "off" | "false" => false,
                other => return Err(format!("schedule state must be on or off, got {}", other)),
            },
        },
        _ => return Err(USAGE.to_string()),
    };

    Ok(Cli { env_file, command })
}

/// Load the `--env-file` path, or `./.env` when present. Returns the file used and how many variables it set.
fn load_environment(explicit: Option<PathBuf>) -> Result<Option<(PathBuf, usize)>, String> {
    let path = match explicit {
        Some(path) if !path.is_file() => return Err(format!("env file not found: {}", path.display())),
        Some(path) => path,
        None => {
            let default_path = PathBuf::from(".env");
            if !default_path.is_file() {
                return Ok(None);
            }
            default_path
        }
    };
    let applied = env_file::load(&path)?;
    Ok(Some((path, applied)))
}

fn run(command: Command) -> Result<(), String> {
    let cfg = GatewayConfig::from_env()?;
    info!(
        "Config loaded (endpoint={}, user={}, legacy={}, timeout={}s)",
        cfg.endpoint(),
        cfg.username,
        cfg.legacy.map(|l| l.to_string()).unwrap_or_else(|| "probe".to_string()),
        cfg.timeout.as_secs()
    );

    if command == Command::Ping {
        let client = AnnaClient::new(&cfg, anna_gateway::Generation::from_legacy_flag(cfg.legacy.unwrap_or(false)));
        client.ping().map_err(|e| format!("ping failed: {}", e))?;
        println!("gateway at {} is reachable", client.endpoint());
        return Ok(());
    }

    let client = AnnaClient::connect(&cfg).map_err(|e| format!("connecting to gateway failed: {}", e))?;
    info!("Connected to {:?} gateway at {}", client.generation(), client.endpoint());

    match command {
        Command::Status => {
            let status = client.status().map_err(|e| format!("reading status failed: {}", e))?;
            let json = serde_json::to_string_pretty(&status).map_err(|e| format!("encoding status failed: {}", e))?;
            println!("{}", json);
        }
        Command::SetPreset(preset) => {
            let doc = client
                .domain_objects()
                .map_err(|e| format!("fetching domain objects failed: {}", e))?;
            client
                .set_preset(&doc, &preset)
                .map_err(|e| format!("set-preset {} failed: {}", preset, e))?;
        }
        Command::SetTemperature(value) => {
            let doc = client
                .domain_objects()
                .map_err(|e| format!("fetching domain objects failed: {}", e))?;
            client
                .set_temperature(&doc, value)
                .map_err(|e| format!("set-temperature {} failed: {}", value, e))?;
        }
        Command::SetSchema { name, active } => {
            let doc = client
                .domain_objects()
                .map_err(|e| format!("fetching domain objects failed: {}", e))?;
            client
                .set_schema_state(&doc, &name, active)
                .map_err(|e| format!("set-schema {} failed: {}", name, e))?;
        }
        Command::Ping => {}
    }

    Ok(())
}

fn main() {
    let cli = match parse_cli(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(2);
        }
    };

    let loaded_env = match load_environment(cli.env_file) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some((path, applied)) = loaded_env {
        info!("Loaded {} variable(s) from {}", applied, path.display());
    }

    info!(
        "anna-gateway {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli.command) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
