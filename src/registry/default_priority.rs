use crate::providers::providers::ProviderIdentifier;

/// Lower values are preferred. The credential-free provider sits near the
/// bottom so that it is only chosen when nothing else can serve a request.
pub(crate) fn default_priority(provider_id: ProviderIdentifier) -> u8 {
    match provider_id {
        ProviderIdentifier::OpenAI => 10,
        ProviderIdentifier::Stability => 20,
        ProviderIdentifier::Replicate => 30,
        ProviderIdentifier::HuggingFace => 40,
        ProviderIdentifier::Pollinations => 250,
    }
}
