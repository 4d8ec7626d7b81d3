use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Parley text-channel handler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Register the text-channel handler and run the gateway until shutdown.
    Run {
        /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Gateway port (default from config or 15252)
        #[arg(long, short)]
        port: Option<u16>,

        /// Handler name to register under (default from config or PARLEY_HANDLER_NAME)
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("parley {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config, port, name }) => {
            if let Err(e) = run(config, port, name).await {
                log::error!("run failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::config::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, _path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    if let Some(n) = name {
        config.handler.name = n;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        config.gateway.port
    );
    lib::gateway::run_gateway(config).await
}
