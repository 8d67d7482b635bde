//! `spraylog` - CLI for the spraying log service
//!
//! This binary serves the records API and offers a few maintenance commands.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use clap::Parser;

use spraylog::cli::{Cli, Command, ConfigCommand, InitCommand, ServeCommand};
use spraylog::{init_logging, Config, Storage};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, &serve_cmd),
        Command::Init(init_cmd) => handle_init(&config, &init_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_serve(mut config: Config, cmd: &ServeCommand) -> Result<(), Box<dyn std::error::Error>> {
    cmd.apply(&mut config);
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(spraylog::api::serve(&config))?;
    Ok(())
}

fn handle_init(config: &Config, cmd: &InitCommand) -> Result<(), Box<dyn std::error::Error>> {
    let path = cmd
        .database
        .clone()
        .unwrap_or_else(|| config.database_path().clone());

    let storage = Storage::open(&path)?;
    let count = storage.handle()?.count()?;
    println!("Database:      {}", storage.path().display());
    println!("Records:       {count}");
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Server]");
                println!("  Listen address:     {}", config.socket_addr());
                if config.server.cors_origins.is_empty() {
                    println!("  CORS origins:       any");
                } else {
                    println!(
                        "  CORS origins:       {}",
                        config.server.cors_origins.join(", ")
                    );
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
