use std::path::PathBuf;
use std::sync::Arc;

use mediaforge::color::{MaybePaint, HEADING, REFERENCE_TEXT, SUCCESS_INDICATOR};
use mediaforge::config::Config;
use mediaforge::dispatch::{Dispatcher, GenerationOutcome};
use mediaforge::media::GenerationRequest;
use mediaforge::metering::{Balance, InMemoryBalanceStore};
use mediaforge::persist::LocalDirectoryStorage;
use mediaforge::utils::errors::DEFAULT_EXIT_CODE;
use mediaforge::{die, error, warn};
use tokio_util::sync::CancellationToken;

use crate::{GenerateArgs, OutcomeFormat};

const DEFAULT_OUTPUT_DIR: &str = "mediaforge-output";

fn parse_balance(raw: &str) -> Option<Balance> {
    if raw.eq_ignore_ascii_case("unlimited") {
        return Some(Balance::Unlimited);
    }

    raw.parse().ok().map(Balance::Limited)
}

fn storage_for(config: &Config, args: &GenerateArgs) -> LocalDirectoryStorage {
    let directory = args
        .output_dir
        .clone()
        .or_else(|| config.storage.directory.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let storage = LocalDirectoryStorage::new(directory);

    match &config.storage.public_base_url {
        Some(base) => match storage.with_public_base_url(base) {
            Ok(storage) => storage,
            Err(err) => die!("invalid storage configuration: {}", err),
        },
        None => storage,
    }
}

fn print_text(outcome: &GenerationOutcome) {
    if let Some(warning) = &outcome.warning {
        warn!("{} ({})", warning.message, warning.kind);
    }

    if !outcome.success {
        error!(
            "{} ({})",
            outcome.message.as_deref().unwrap_or("generation failed"),
            outcome.code().unwrap_or("internal_error")
        );

        return;
    }

    let reference = outcome
        .media
        .as_ref()
        .and_then(|media| media.reference())
        .unwrap_or_default();

    println!(
        "{} {}",
        SUCCESS_INDICATOR.maybe_paint("generated:"),
        REFERENCE_TEXT.maybe_paint(reference)
    );

    if let (Some(provider), Some(model)) = (&outcome.provider, &outcome.model) {
        println!("{} {} ({})", HEADING.maybe_paint("model:"), model, provider);
    }

    println!("{} {}", HEADING.maybe_paint("cost:"), outcome.cost_charged);

    if let Some(balance) = &outcome.remaining_balance {
        println!("{} {}", HEADING.maybe_paint("remaining:"), balance);
    }
}

pub(crate) async fn generate_cmd(config: &Config, args: &GenerateArgs) {
    let balance = match parse_balance(&args.balance) {
        Some(balance) => balance,
        None => die!(
            "invalid balance \"{}\", expected a number or \"unlimited\"",
            args.balance
        ),
    };

    let balances = InMemoryBalanceStore::new().with_account(args.account.as_str(), balance);

    let storage = storage_for(config, args);

    let dispatcher = match Dispatcher::from_config(config, Arc::new(balances), Arc::new(storage)) {
        Ok(dispatcher) => dispatcher,
        Err(err) => die!("{}", err),
    };

    let mut request = GenerationRequest::new(args.prompt.as_str(), args.operation)
        .with_provider(args.provider);

    if let Some(model) = &args.model {
        request = request.with_model(model.as_str());
    }

    if let Some(source_image) = &args.source_image {
        request = request.with_source_image(source_image.as_str());
    }

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let outcome = dispatcher
        .dispatch_until(&args.account, &request, &cancel)
        .await;

    match args.format {
        OutcomeFormat::Json => match serde_json::to_string_pretty(&outcome) {
            Ok(output) => println!("{}", output),
            Err(err) => die!("failed to serialize the outcome: {}", err),
        },
        OutcomeFormat::Text => print_text(&outcome),
    }

    if !outcome.success {
        std::process::exit(DEFAULT_EXIT_CODE);
    }
}
