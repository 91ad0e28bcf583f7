use std::{net::SocketAddr, path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use folio::{
    adapters,
    config::{EngineConfigValidator, loader::load_config, models::EngineConfig},
    core::Engine,
    tracing_setup,
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Start the engine (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // Determine the command to run
    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Init { config }) => ("init", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config), // Default to serve with config from args
    };

    match command {
        "validate" => {
            return validate_config_command(&config_path).await;
        }
        "init" => {
            return init_config_command(&config_path).await;
        }
        "serve" => {
            // Continue with normal server startup
        }
        _ => unreachable!(),
    }

    tracing_setup::init_tracing().map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Loading configuration from {config_path}");
    let config: EngineConfig = load_config(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    EngineConfigValidator::validate(&config)
        .map_err(|e| eyre!("Configuration is invalid:\n{e}"))?;

    let engine = Arc::new(
        Engine::from_config(&config)
            .await
            .context("Failed to assemble the engine")?,
    );
    {
        let report = engine.registry().modules();
        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            omitted = report.omitted.len(),
            "module registry loaded"
        );
    }

    // Create graceful shutdown manager
    let graceful_shutdown = Arc::new(GracefulShutdown::new());

    // Start signal handler for graceful shutdown
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;

    let app = adapters::app(engine);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Folio engine listening on {addr}");
    println!("Folio engine listening on {addr}");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("Server error")?;
        },
        shutdown_reason = graceful_shutdown.wait_for_shutdown_signal() => {
            tracing::info!("Shutdown signal received: {:?}", shutdown_reason);
            tracing::info!("Graceful shutdown completed");
        }
    }

    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    // First check if file exists and is readable
    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    // Try to parse the configuration
    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    // Validate the configuration
    match EngineConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Routes: {}", config.routes.len());
            println!("   • Stack: {}", config.stack.join(" → "));
            println!("   • Default Driver: {}", config.data.driver);
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Route templates read 'METHOD /path' (e.g. 'GET /{{dataType}}/{{id}}')");
            println!("   • Verify listen address format (e.g., '127.0.0.1:8080')");
            println!("   • Session durations use humantime units (e.g. '1h', '30m')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Folio engine configuration

# The address to listen on
listen_addr: "127.0.0.1:8080"

# Session store tuning
session:
  max_age: "1h"
  sweep_interval: "1d"
  key_size: 24

# Ordered route table; first match wins. {name} segments capture into the
# request context, presets override captures, and `method: skip` drops the
# request.
routes:
  - route: "GET /"
    preset:
      dataType: "Document"
      id: "home"
  - route: "GET /favicon.ico"
    preset:
      method: "skip"
  - route: "GET /{dataType}"
  - route: "GET /{dataType}/{id}"
  - route: "GET /{dataType}/{filter}/{id}"

# Data access defaults
data:
  driver: "Json"
  documents_root: "./documents"
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'folio serve --config {config_path}' to start the engine");
    Ok(())
}
