use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::outcome::{DispatchError, ErrorKind, GenerationOutcome, Warning};
use crate::config::{self, Config};
use crate::media::{GenerationRequest, Operation};
use crate::metering::{cost, Balance, BalanceError, BalanceStore, CostTable};
use crate::persist::{ObjectStorage, PersistenceBridge};
use crate::providers::{self, providers::ProviderIdentifier, GenerationInput};
use crate::registry::populate::{self, populated_selector};
use crate::registry::selector::{ProviderDescriptor, SelectionError, Selector};

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Populate(#[from] populate::Error),
    #[error("invalid cost table: {0}")]
    Cost(#[from] cost::Error),
}

/// Limits applied to every dispatch.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub max_prompt_length: usize,
    pub provider_timeout: Duration,
    pub storage_timeout: Duration,
}

impl From<&config::Dispatch> for DispatchSettings {
    fn from(value: &config::Dispatch) -> Self {
        DispatchSettings {
            max_prompt_length: value.max_prompt_length,
            provider_timeout: Duration::from_secs(value.provider_timeout_secs),
            storage_timeout: Duration::from_secs(value.storage_timeout_secs),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        DispatchSettings::from(&config::Dispatch::default())
    }
}

/// A model offered by an available provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelListing {
    pub model_id: String,
    pub cost: u64,
    pub provider: ProviderIdentifier,
}

impl From<SelectionError> for DispatchError {
    fn from(value: SelectionError) -> Self {
        match value {
            SelectionError::Invalid(err) => DispatchError::Validation(err),
            err @ (SelectionError::ProviderUnavailable(_) | SelectionError::NoProviderFor(_)) => {
                DispatchError::ProviderUnavailable(err.to_string())
            }
        }
    }
}

/// The front door of the crate. Turns a [`GenerationRequest`] into a
/// [`GenerationOutcome`] by validating, pricing, selecting a provider,
/// invoking it once, persisting the result and finally debiting the account.
///
/// The dispatcher never retries and never falls back to another provider after
/// a failure. The outcome carries the error class so the caller can decide.
pub struct Dispatcher {
    selector: Selector,
    costs: CostTable,
    balances: Arc<dyn BalanceStore>,
    bridge: PersistenceBridge,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        selector: Selector,
        costs: CostTable,
        balances: Arc<dyn BalanceStore>,
        storage: Arc<dyn ObjectStorage>,
        settings: DispatchSettings,
    ) -> Dispatcher {
        Dispatcher {
            selector,
            costs,
            balances,
            bridge: PersistenceBridge::new(storage, settings.storage_timeout),
            settings,
        }
    }

    /// Builds the provider table from the configuration and environment.
    pub fn from_config(
        config: &Config,
        balances: Arc<dyn BalanceStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Result<Dispatcher, Error> {
        let selector = populated_selector(config)?;
        let costs = CostTable::from_config(&config.metering)?;

        Ok(Dispatcher::new(
            selector,
            costs,
            balances,
            storage,
            DispatchSettings::from(&config.dispatch),
        ))
    }

    /// The provider table in selection order.
    pub fn providers(&self) -> &[ProviderDescriptor] {
        self.selector.descriptors()
    }

    /// Models of the available providers grouped by operation, each group in
    /// priority order.
    pub fn list_available_models(&self) -> BTreeMap<Operation, Vec<ModelListing>> {
        let mut listing: BTreeMap<Operation, Vec<ModelListing>> = BTreeMap::new();

        for pm in self.selector.available_models() {
            let operation = pm.model.operation;

            listing.entry(operation).or_default().push(ModelListing {
                cost: self.costs.cost(operation, &pm.model.id),
                model_id: pm.model.id,
                provider: pm.provider,
            });
        }

        listing
    }

    pub async fn dispatch(&self, account: &str, request: &GenerationRequest) -> GenerationOutcome {
        self.dispatch_until(account, request, &CancellationToken::new())
            .await
    }

    /// Like [`Dispatcher::dispatch`], abandoning the request when `cancel`
    /// fires before the provider answers. A cancelled request is neither
    /// persisted nor charged.
    pub async fn dispatch_until(
        &self,
        account: &str,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        let span = tracing::info_span!(
            "dispatch",
            account = %account,
            operation = %request.operation,
            provider = tracing::field::Empty,
            model = tracing::field::Empty,
        );

        self.run(account, request, cancel).instrument(span).await
    }

    async fn run(
        &self,
        account: &str,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        if let Err(err) = request.validate(self.settings.max_prompt_length) {
            return self.failure(DispatchError::from(err));
        }

        let selection = match self.selector.resolve(
            request.provider,
            request.operation,
            request.model_hint.as_deref(),
        ) {
            Ok(selection) => selection,
            Err(err) => return self.failure(err.into()),
        };

        let provider_id = selection.provider_id();
        let model = selection.model.as_str();

        tracing::Span::current().record("provider", tracing::field::display(provider_id));
        tracing::Span::current().record("model", tracing::field::display(model));

        let selected = |err: DispatchError| self.failure(err).with_selection(provider_id, model);

        let cost = self.costs.cost(request.operation, model);

        let balance = match self.balances.balance(account).await {
            Ok(balance) => balance,
            Err(err) => return selected(DispatchError::Internal(err.to_string())),
        };

        if let (false, Balance::Limited(credits)) = (balance.covers(cost), balance) {
            return selected(DispatchError::InsufficientCredits {
                cost,
                balance: credits,
            })
            .with_balance(balance);
        }

        if cancel.is_cancelled() {
            return selected(DispatchError::Cancelled);
        }

        let input = GenerationInput {
            prompt: &request.prompt,
            operation: request.operation,
            source_image: match request.operation {
                Operation::Edit => request.source_image.as_deref(),
                Operation::Image | Operation::Video => None,
            },
        };

        let call = tokio::time::timeout(
            self.settings.provider_timeout,
            selection.provider.generate(model, &input),
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return selected(DispatchError::Cancelled),
            result = call => result,
        };

        let media = match result {
            Ok(Ok(media)) => media,
            Ok(Err(err)) => return selected(err.into()),
            Err(_) => {
                let err = providers::Error::from_source(
                    providers::ErrorKind::TimedOut,
                    format!(
                        "no answer within {}s",
                        self.settings.provider_timeout.as_secs_f32()
                    )
                    .into(),
                );

                return selected(err.into());
            }
        };

        // The provider answered, but the caller has already left
        if cancel.is_cancelled() {
            return selected(DispatchError::Cancelled);
        }

        let persisted = match self.bridge.persist(media).await {
            Ok(persisted) => persisted,
            Err(disallowed) => {
                let err = providers::Error::from_source(
                    providers::ErrorKind::UnexpectedResponse,
                    Box::new(disallowed),
                );

                return selected(err.into());
            }
        };

        let remaining = if balance.is_unlimited() {
            Balance::Unlimited
        } else {
            match self.balances.debit(account, cost).await {
                Ok(remaining) => remaining,
                // Another request spent the credits in the meantime
                Err(BalanceError::Insufficient { balance, cost }) => {
                    return selected(DispatchError::InsufficientCredits { cost, balance })
                        .with_balance(Balance::Limited(balance))
                }
                Err(err) => return selected(DispatchError::Internal(err.to_string())),
            }
        };

        let warning = persisted.warning.map(|message| Warning {
            kind: ErrorKind::StorageUnavailable,
            message,
        });

        tracing::info!(cost, remaining = %remaining, kind = %persisted.media.kind(), "generation succeeded");

        GenerationOutcome::succeeded(
            persisted.media,
            provider_id,
            model.to_string(),
            cost,
            remaining,
            warning,
        )
    }

    fn failure(&self, err: DispatchError) -> GenerationOutcome {
        match err.kind() {
            ErrorKind::InternalError => tracing::error!(error = %err, "dispatch failed"),
            ErrorKind::ProviderError(class) => {
                tracing::warn!(error = %err, class = %class, "provider failed")
            }
            _ => tracing::info!(error = %err, code = err.kind().code(), "request rejected"),
        }

        GenerationOutcome::failed(&err)
    }
}
