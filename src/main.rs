mod cli;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cli::{generate::generate_cmd, list::list_cmd, resolve_color_mode};
use mediaforge::color::configure_color;
use mediaforge::config::read_config;
use mediaforge::die;
use mediaforge::media::{Operation, ProviderChoice};
use mediaforge::providers::providers::ProviderIdentifier;
use mediaforge::utils::logging::init_logging;

#[derive(
    Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "mediaforge")]
#[command(
    about = "Generate images and videos through whichever provider is available",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, global = true, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Read the configuration from this file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a single piece of media
    Generate(GenerateArgs),
    /// List available models or providers
    List(ListArgs),
}

/// Output formats of a generation
#[derive(
    ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum OutcomeFormat {
    /// Human readable summary
    #[default]
    Text,
    /// The full outcome as JSON
    Json,
}

#[derive(Parser)]
pub(crate) struct GenerateArgs {
    /// What to describe in the media
    prompt: String,
    /// The kind of media to generate
    #[arg(short, long, default_value_t = Operation::Image)]
    operation: Operation,
    /// A provider name, or "auto" to select by priority
    #[arg(short, long, default_value_t = ProviderChoice::Auto)]
    provider: ProviderChoice,
    /// Use this model instead of the provider's default
    #[arg(short, long)]
    model: Option<String>,
    /// URL of the image to edit
    #[arg(short, long)]
    source_image: Option<String>,
    /// Write generated files into this directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// The account charged for the generation
    #[arg(long, default_value = "cli")]
    account: String,
    /// Credits held by the account, a number or "unlimited"
    #[arg(long, default_value = "unlimited")]
    balance: String,
    #[arg(short, long, default_value_t = OutcomeFormat::default())]
    format: OutcomeFormat,
}

/// Possible listings
#[derive(Subcommand)]
pub(crate) enum ListObject {
    /// Models of the available providers
    Models(ListModelArgs),
    /// Providers, whether available or not
    Providers,
}

/// Output formats
#[derive(
    ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Parser)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
    /// List the specified object
    #[command(subcommand)]
    object: ListObject,
}

#[derive(Parser, Default)]
pub(crate) struct ListModelArgs {
    /// Limit listing to the specified provider
    #[arg(short, long)]
    provider: Option<ProviderIdentifier>,
    /// Limit listing to the specified operation
    #[arg(short, long)]
    operation: Option<Operation>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let color = resolve_color_mode(cli.color);

    configure_color(color);
    init_logging(color);

    let config = match read_config(cli.config) {
        Ok(config) => config,
        Err(err) => die!("{}", err),
    };

    match &cli.command {
        Commands::Generate(args) => generate_cmd(&config, args).await,
        Commands::List(args) => list_cmd(&config, args),
    }
}
