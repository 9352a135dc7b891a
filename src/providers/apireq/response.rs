//! Helpers shared by the vendor APIs for building endpoints and reading
//! responses.

use reqwest::header::CONTENT_TYPE;
use reqwest::Response;

use super::Url;

/// Appends `segments` to the path of `base`. Each segment is percent-encoded,
/// so a segment may contain arbitrary text (e.g. a prompt).
pub(crate) fn endpoint<'s, I>(base: &Url, segments: I) -> Result<Url, url::ParseError>
where
    I: IntoIterator<Item = &'s str>,
{
    let mut url = base.clone();

    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

/// The media type of the response body without parameters, if declared.
pub(crate) fn content_type(res: &Response) -> Option<String> {
    let value = res.headers().get(CONTENT_TYPE)?.to_str().ok()?;

    let essence = value.split(';').next()?.trim().to_ascii_lowercase();

    if essence.is_empty() {
        None
    } else {
        Some(essence)
    }
}

/// Reads the body of an unsuccessful response for use in an error message.
/// Vendors are not consistent about error bodies, so this never fails.
pub(crate) async fn error_text(res: Response) -> String {
    let status = res.status();

    match res.text().await {
        Ok(text) if !text.trim().is_empty() => text,
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_segments() {
        let base = Url::parse("https://api.example.com/v2/").unwrap();

        let url = endpoint(&base, ["models", "owner", "name"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/models/owner/name");

        let base = Url::parse("https://api.example.com").unwrap();

        let url = endpoint(&base, ["prompt", "a red bicycle"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/prompt/a%20red%20bicycle");
    }

    #[test]
    fn test_endpoint_encodes_slashes_within_a_segment() {
        let base = Url::parse("https://api.example.com").unwrap();

        let url = endpoint(&base, ["prompt", "cats/dogs"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/prompt/cats%2Fdogs");
    }
}
