use airline_nlu::config::{ConfigLoader, NluConfig};
use airline_nlu::http_server;
use airline_nlu::logging::init_logging;
use airline_nlu::service::NluService;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// Natural language understanding for airline reservation queries
#[derive(Parser, Debug)]
#[command(name = "airline-nlu")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turns airline questions into intents, slots and query descriptors")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Configuration file
        #[arg(short, long, env = "NLU_CONFIG")]
        config: Option<String>,
    },

    /// Interpret one utterance and print the result as JSON
    Interpret {
        /// The utterance
        text: String,

        /// Configuration file
        #[arg(short, long, env = "NLU_CONFIG")]
        config: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Write a commented sample configuration
    #[command(name = "sample-config")]
    SampleConfig {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&str>) -> Result<NluConfig> {
    ConfigLoader::new()
        .load_from_file(path)
        .load_from_env()
        .build()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config } => {
            let config = load_config(config.as_deref())?;
            let _guard = init_logging(&config.log_config())?;

            let service = NluService::from_config(&config)
                .await
                .context("Failed to build NLU service")?;
            info!(annotator = ?service.annotator(), "NLU service ready");

            http_server::serve(service, config.bind_addr()?).await?;
        }
        Command::Interpret {
            text,
            config,
            pretty,
        } => {
            let config = load_config(config.as_deref())?;
            let _guard = init_logging(&config.log_config())?;

            let service = NluService::from_config(&config).await?;
            let interpretation = service.process(Some(text.as_str())).await?;

            let output = if pretty {
                serde_json::to_string_pretty(&interpretation)?
            } else {
                serde_json::to_string(&interpretation)?
            };
            println!("{}", output);
        }
        Command::SampleConfig { output } => match output {
            Some(path) => {
                NluConfig::write_sample(&path)?;
                eprintln!("Sample configuration written to {}", path.display());
            }
            None => print!("{}", NluConfig::sample_toml()?),
        },
    }

    Ok(())
}
