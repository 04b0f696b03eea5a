#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use rootclaw::agent::{self, AgentOptions};
use rootclaw::config::{Config, LinkKind};
use rootclaw::{PacketKind, encode, pricing};
use tracing_subscriber::{EnvFilter, fmt};

/// `rootclaw` - talk to your drawing robot.
#[derive(Parser, Debug)]
#[command(name = "rootclaw")]
#[command(version)]
#[command(about = "Drive a drawing robot through a conversational assistant.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the assistant loop
    Agent {
        /// Single message mode (don't enter interactive mode)
        #[arg(short, long)]
        message: Option<String>,

        /// Model to use
        #[arg(long)]
        model: Option<String>,

        /// Temperature (0.0 - 2.0)
        #[arg(short, long)]
        temperature: Option<f64>,

        /// Robot link backend
        #[arg(long, value_enum)]
        link: Option<LinkKind>,

        /// Serial device path, used with --link serial
        #[arg(long)]
        port: Option<String>,
    },

    /// Print the 20-byte packet for a command as hex
    Encode {
        #[arg(value_enum)]
        kind: PacketKind,

        /// Distance (mm), angle (degrees) or frequency (Hz)
        #[arg(allow_negative_numbers = true)]
        value: Option<f64>,

        /// Note duration (ms)
        duration: Option<f64>,

        /// Sequence id to stamp into the packet
        #[arg(long, default_value_t = 0)]
        seq: u8,
    },

    /// List selectable models and their prices
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match cli.command {
        Commands::Encode {
            kind,
            value,
            duration,
            seq,
        } => {
            println!("{}", encode::build_packet(kind, value, duration, seq).to_hex());
            Ok(())
        }

        Commands::Models => {
            let default = Config::load_or_init()
                .map(|c| c.default_model)
                .unwrap_or_else(|_| rootclaw::config::DEFAULT_MODEL.to_string());
            println!("  ID              NAME           IN $/1M  OUT $/1M  NOTES");
            for model in pricing::MODEL_CATALOGUE {
                let marker = if model.id.eq_ignore_ascii_case(&default) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {:<15} {:<14} {:>7.2}  {:>8.2}  {}",
                    model.id,
                    model.display_name,
                    model.pricing.input_per_m,
                    model.pricing.output_per_m,
                    model.description
                );
            }
            Ok(())
        }

        Commands::Agent {
            message,
            model,
            temperature,
            link,
            port,
        } => {
            let config = Config::load_or_init()?;
            agent::run(
                config,
                AgentOptions {
                    message,
                    model,
                    temperature,
                    link,
                    serial_port: port,
                },
            )
            .await
        }
    }
}
