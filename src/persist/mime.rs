//! MIME type detection and the allow-list of storable media types

use thiserror::Error;

/// Media types which may be stored, with the extension used for their files.
const ALLOWED: [(&'static str, &'static str); 6] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
];

#[derive(Error, Debug, PartialEq, Eq)]
#[error("media of type \"{declared}\" (detected {}) may not be stored", .sniffed.unwrap_or("nothing"))]
pub struct Disallowed {
    pub declared: String,
    pub sniffed: Option<&'static str>,
}

/// Guess MIME by inspecting bytes (magic numbers)
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|k| k.mime_type())
}

/// The file extension of an allowed media type.
pub fn extension(mime_type: &str) -> Option<&'static str> {
    ALLOWED
        .iter()
        .find(|(allowed, _)| *allowed == mime_type)
        .map(|(_, ext)| *ext)
}

/// Decides the type bytes are stored under. The declared type is never
/// trusted: the bytes must be recognized as one of the allowed types.
pub fn resolve(bytes: &[u8], declared: &str) -> Result<&'static str, Disallowed> {
    let sniffed = sniff(bytes);

    sniffed
        .filter(|mime_type| extension(mime_type).is_some())
        .ok_or_else(|| Disallowed {
            declared: declared.to_string(),
            sniffed,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    const PDF: &[u8] = b"%PDF-1.7\n";

    #[test]
    fn test_extensions() {
        assert_eq!(extension("image/jpeg"), Some("jpg"));
        assert_eq!(extension("video/webm"), Some("webm"));
        assert_eq!(extension("application/pdf"), None);
    }

    #[test]
    fn test_sniffed_type_wins() {
        assert_eq!(sniff(PNG), Some("image/png"));

        // The vendor said jpeg but sent png
        assert_eq!(resolve(PNG, "image/jpeg"), Ok("image/png"));
        assert_eq!(resolve(JPEG, "application/octet-stream"), Ok("image/jpeg"));
    }

    #[test]
    fn test_unrecognized_bytes_are_rejected() {
        let text = b"upstream error: quota exhausted, try again later";

        assert_eq!(
            resolve(text, "image/png"),
            Err(Disallowed {
                declared: "image/png".to_string(),
                sniffed: None
            })
        );
        assert!(resolve(&[1, 2, 3], "image/webp").is_err());
    }

    #[test]
    fn test_disallowed_bytes_with_allowed_declaration_are_rejected() {
        assert_eq!(
            resolve(PDF, "image/png"),
            Err(Disallowed {
                declared: "image/png".to_string(),
                sniffed: Some("application/pdf")
            })
        );
    }

    #[test]
    fn test_disallowed_media_is_rejected() {
        assert_eq!(
            resolve(PDF, "application/pdf"),
            Err(Disallowed {
                declared: "application/pdf".to_string(),
                sniffed: Some("application/pdf")
            })
        );

        assert!(resolve(&[1, 2, 3], "text/html").is_err());
    }
}
