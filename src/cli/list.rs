use std::sync::Arc;

use table::{Align, IntoTable, Table};
mod table;

use mediaforge::{
    config::Config,
    die,
    dispatch::Dispatcher,
    media::Operation,
    metering::InMemoryBalanceStore,
    persist::LocalDirectoryStorage,
    providers::providers::ProviderIdentifier,
    registry::selector::ProviderDescriptor,
};

use crate::{ListArgs, ListModelArgs, ListObject, ListingFormat};

#[derive(serde::Serialize)]
struct ListedModel {
    model_id: String,
    operation: Operation,
    provider: ProviderIdentifier,
    cost: u64,
}

impl From<Vec<ListedModel>> for Table {
    fn from(value: Vec<ListedModel>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["MODEL", "OPERATION", "PROVIDER", "COST"]);
        tab.align(3, Align::Right);

        for model in value {
            tab.add_row(vec![
                model.model_id,
                model.operation.to_string(),
                model.provider.to_string(),
                model.cost.to_string(),
            ]);
        }

        tab
    }
}

#[derive(serde::Serialize)]
struct Provider {
    provider: ProviderIdentifier,
    available: bool,
    priority: u8,
    operations: Vec<Operation>,
}

impl From<&ProviderDescriptor> for Provider {
    fn from(value: &ProviderDescriptor) -> Self {
        Provider {
            provider: value.id,
            available: value.is_available,
            priority: value.priority,
            operations: value.operations.clone(),
        }
    }
}

impl From<Vec<Provider>> for Table {
    fn from(value: Vec<Provider>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["PROVIDER", "AVAILABLE", "PRIORITY", "OPERATIONS"]);
        tab.align(2, Align::Right);

        for provider in value {
            let operations: Vec<String> =
                provider.operations.iter().map(|op| op.to_string()).collect();

            tab.add_row(vec![
                provider.provider.to_string(),
                if provider.available {
                    "available".to_string()
                } else {
                    "unavailable".to_string()
                },
                provider.priority.to_string(),
                if operations.is_empty() {
                    "-".to_string()
                } else {
                    operations.join(",")
                },
            ]);
        }

        tab
    }
}

/// Listing never generates, so the dispatcher gets an empty balance store
/// and storage that is never written.
fn listing_dispatcher(config: &Config) -> Dispatcher {
    let storage = LocalDirectoryStorage::new(config.storage.directory.clone().unwrap_or_default());

    match Dispatcher::from_config(config, Arc::new(InMemoryBalanceStore::new()), Arc::new(storage))
    {
        Ok(dispatcher) => dispatcher,
        Err(err) => die!("{}", err),
    }
}

fn get_models(dispatcher: &Dispatcher, args: &ListModelArgs) -> Vec<ListedModel> {
    if let Some(id) = args.provider {
        let available = dispatcher
            .providers()
            .iter()
            .any(|d| d.id == id && d.is_available);

        if !available {
            die!("failed to list models: provider \"{}\" is not available", id);
        }
    }

    dispatcher
        .list_available_models()
        .into_iter()
        .filter(|(operation, _)| args.operation.map_or(true, |op| op == *operation))
        .flat_map(|(operation, models)| {
            models.into_iter().map(move |m| ListedModel {
                model_id: m.model_id,
                operation,
                provider: m.provider,
                cost: m.cost,
            })
        })
        .filter(|m| args.provider.map_or(true, |id| id == m.provider))
        .collect()
}

fn format_output<O: IntoTable + serde::Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => match serde_json::to_string_pretty(&object) {
            Ok(output) => println!("{}", output),
            Err(err) => die!("failed to serialize the listing: {}", err),
        },
        ListingFormat::Table => {
            let tab = object.into_table();

            print!("{}", tab);
        }
        ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}

pub(crate) fn list_cmd(config: &Config, args: &ListArgs) {
    let format = args.format;

    let dispatcher = listing_dispatcher(config);

    match &args.object {
        ListObject::Models(args) => {
            let models = get_models(&dispatcher, args);
            format_output(models, format);
        }
        ListObject::Providers => {
            let providers: Vec<Provider> =
                dispatcher.providers().iter().map(Provider::from).collect();
            format_output(providers, format);
        }
    }
}
