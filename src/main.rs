//! `ampl`: command-line front end for the compact GUID codec and AppConfig.
//!
//! # Usage
//!
//! ```text
//! ampl [--config <path>] <command>
//!
//! Commands:
//!   guid new                  print a fresh random id (compact + hyphenated)
//!   guid encode <uuid>        hyphenated uuid -> 22-char compact form
//!   guid decode <compact>     22-char compact form -> hyphenated uuid
//!   config get <key>          print a setting (aliases are followed)
//!   config set <key> <value>  write and save a setting
//!   config delete <key>       remove and save
//!   config list [prefix]      print `key = value` lines
//!
//! Flags:
//!   --config, -c <path>   settings file (default: $AMPL_CONFIG or ./ampl.toml)
//!   --help, -h            print this help
//! ```
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load settings
//!   3. Init logger at the configured level
//!   4. Open the configured store and run the command

use std::env;
use std::path::Path;
use std::process;

use tracing::debug;
use uuid::Uuid;

use ampl::appconfig::stores::memory::MemoryStore;
#[cfg(feature = "sqlite")]
use ampl::appconfig::stores::sqlite::SqliteStore;
use ampl::appconfig::{AppConfig, ConfigStore};
use ampl::settings::{self, Settings, StoreBackend};
use ampl::{AppError, CompactGuid, guid, logger};

struct Args {
    config: Option<String>,
    help: bool,
    command: Vec<String>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = parse_args(env::args().skip(1));
    if args.help || args.command.is_empty() {
        print_help();
        return Ok(());
    }

    let settings = match &args.config {
        Some(path) => settings::load_from(
            Path::new(path),
            env::var("AMPL_STORE_PATH").ok().as_deref(),
            env::var("AMPL_LOG_LEVEL").ok().as_deref(),
        )?,
        None => settings::load()?,
    };

    logger::init(&settings.log_level, false)?;
    debug!(
        backend = ?settings.store.backend,
        path = %settings.store.path.display(),
        aliases = settings.aliases.len(),
        "settings loaded"
    );

    let lines = match args.command[0].as_str() {
        "guid" => guid_command(&args.command[1..])?,
        "config" => {
            let cfg = AppConfig::with_configuration(
                open_store(&settings)?,
                settings.alias_configuration(),
            );
            config_command(&cfg, &args.command[1..])?
        }
        other => {
            return Err(AppError::Argument(format!(
                "unknown command: {other}\n  run 'ampl --help' for usage"
            )));
        }
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn parse_args(argv: impl Iterator<Item = String>) -> Args {
    let mut config = None;
    let mut help = false;
    let mut command = Vec::new();
    let mut iter = argv.peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" if command.is_empty() => config = iter.next(),
            "--help" | "-h" if command.is_empty() => help = true,
            "--" => {
                command.extend(iter);
                break;
            }
            _ => command.push(arg),
        }
    }

    Args { config, help, command }
}

fn print_help() {
    eprintln!("usage: ampl [--config <path>] <command>");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  guid new                  print a fresh random id");
    eprintln!("  guid encode <uuid>        hyphenated uuid -> compact form");
    eprintln!("  guid decode <compact>     compact form -> hyphenated uuid");
    eprintln!("  config get <key>          print a setting");
    eprintln!("  config set <key> <value>  write and save a setting");
    eprintln!("  config delete <key>       remove and save a setting");
    eprintln!("  config list [prefix]      list settings");
    eprintln!();
    eprintln!("flags:");
    eprintln!("  --config, -c <path>   settings file (default: $AMPL_CONFIG or ./ampl.toml)");
    eprintln!("  --help,   -h          print this help");
}

fn open_store(settings: &Settings) -> Result<Box<dyn ConfigStore>, AppError> {
    match settings.store.backend {
        StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => Ok(Box::new(SqliteStore::open(&settings.store.path)?)),
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => Err(AppError::Config(
            "store backend 'sqlite' requires the `sqlite` feature".into(),
        )),
    }
}

fn usage(text: &str) -> AppError {
    AppError::Argument(format!("usage: ampl {text}"))
}

fn guid_command(rest: &[String]) -> Result<Vec<String>, AppError> {
    match rest {
        [cmd] if cmd == "new" => {
            let g = CompactGuid::new_v4();
            Ok(vec![format!("{g}  {}", g.as_uuid().hyphenated())])
        }
        [cmd, value] if cmd == "encode" => {
            let id = Uuid::parse_str(value)
                .map_err(|e| AppError::Argument(format!("'{value}' is not a uuid: {e}")))?;
            Ok(vec![guid::encode(&id)])
        }
        [cmd, value] if cmd == "decode" => {
            Ok(vec![guid::decode(value)?.hyphenated().to_string()])
        }
        _ => Err(usage("guid (new | encode <uuid> | decode <compact>)")),
    }
}

fn config_command<S: ConfigStore>(
    cfg: &AppConfig<S>,
    rest: &[String],
) -> Result<Vec<String>, AppError> {
    match rest {
        [cmd, key] if cmd == "get" => match cfg.get::<String>(key)? {
            Some(value) => Ok(vec![value]),
            None => Err(AppError::Argument(format!("'{key}' is not set"))),
        },
        [cmd, key, value] if cmd == "set" => {
            cfg.set(key, value)?;
            cfg.save_changes()?;
            Ok(Vec::new())
        }
        [cmd, key] if cmd == "delete" => {
            let removed = cfg.delete(key)?;
            cfg.save_changes()?;
            let status = if removed { "deleted" } else { "not set" };
            Ok(vec![status.to_string()])
        }
        [cmd, prefix @ ..] if cmd == "list" && prefix.len() <= 1 => {
            let prefix = prefix.first().map(String::as_str).unwrap_or("");
            Ok(cfg
                .entries(prefix)?
                .into_iter()
                .map(|e| format!("{} = {}", e.key, e.value))
                .collect())
        }
        _ => Err(usage(
            "config (get <key> | set <key> <value> | delete <key> | list [prefix])",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ampl::appconfig::AliasConfiguration;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_args_splits_flags_and_command() {
        let a = parse_args(args(&["-c", "x.toml", "config", "get", "A"]).into_iter());
        assert_eq!(a.config.as_deref(), Some("x.toml"));
        assert!(!a.help);
        assert_eq!(a.command, ["config", "get", "A"]);
    }

    #[test]
    fn flags_after_command_are_values() {
        let a = parse_args(args(&["config", "set", "Flag", "-h"]).into_iter());
        assert!(!a.help);
        assert_eq!(a.command, ["config", "set", "Flag", "-h"]);
    }

    #[test]
    fn guid_encode_decode() {
        let nil = "00000000-0000-0000-0000-000000000000";
        let out = guid_command(&args(&["encode", nil])).unwrap();
        assert_eq!(out, ["AAAAAAAAAAAAAAAAAAAAAA"]);
        let back = guid_command(&args(&["decode", out[0].as_str()])).unwrap();
        assert_eq!(back, [nil]);
    }

    #[test]
    fn guid_bad_input() {
        assert!(matches!(
            guid_command(&args(&["encode", "nope"])),
            Err(AppError::Argument(_))
        ));
        assert!(matches!(
            guid_command(&args(&["decode", "nope"])),
            Err(AppError::Format(_))
        ));
        assert!(guid_command(&args(&["frobnicate"])).is_err());
    }

    #[test]
    fn config_commands_against_memory_store() {
        let cfg = AppConfig::with_configuration(
            MemoryStore::new(),
            AliasConfiguration::default().alias("Old.Port", "Net.Port"),
        );
        config_command(&cfg, &args(&["set", "Net.Port", "8080"])).unwrap();
        config_command(&cfg, &args(&["set", "Net.Host", "localhost"])).unwrap();

        assert_eq!(config_command(&cfg, &args(&["get", "Old.Port"])).unwrap(), ["8080"]);
        assert_eq!(
            config_command(&cfg, &args(&["list", "Net."])).unwrap(),
            ["Net.Host = localhost", "Net.Port = 8080"]
        );
        assert_eq!(
            config_command(&cfg, &args(&["delete", "Net.Host"])).unwrap(),
            ["deleted"]
        );
        assert!(config_command(&cfg, &args(&["get", "Net.Host"])).is_err());
        assert_eq!(config_command(&cfg, &args(&["list"])).unwrap().len(), 1);
    }

    #[test]
    fn open_store_honours_backend() {
        let mut s = Settings::default();
        s.store.backend = StoreBackend::Memory;
        let store = open_store(&s).unwrap();
        assert_eq!(store.store_type(), "memory");

        #[cfg(feature = "sqlite")]
        {
            let tmp = tempfile::TempDir::new().unwrap();
            s.store.backend = StoreBackend::Sqlite;
            s.store.path = tmp.path().join("cli").join("config.db");
            let store = open_store(&s).unwrap();
            assert_eq!(store.store_type(), "sqlite");
            assert!(s.store.path.exists());
        }
    }
}
