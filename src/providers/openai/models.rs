use lazy_static::lazy_static;

use crate::media::Operation;
use crate::providers::Model;

lazy_static! {
    // The images API has no route listing the image models, so this list needs
    // to be updated whenever models are added or retired.
    pub(super) static ref OPENAI_MODELS: [Model; 3] = [
        Model::new("dall-e-3", Operation::Image),
        Model::new("gpt-image-1", Operation::Image),
        Model::new("dall-e-2", Operation::Image),
    ];
}

/// `gpt-image-1` always answers with base64 and rejects `response_format`.
pub(super) fn accepts_response_format(model: &str) -> bool {
    model.starts_with("dall-e")
}

pub(super) fn default_size(model: &str) -> &'static str {
    match model {
        "dall-e-2" => "512x512",
        _ => "1024x1024",
    }
}
