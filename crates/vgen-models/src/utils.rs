//! URL helpers shared across crates.

use url::Url;

/// Public host for objects addressed with the `gs://` scheme.
const GCS_PUBLIC_HOST: &str = "https://storage.googleapis.com";

/// Rewrite an internal storage URI into a publicly resolvable HTTPS URL.
///
/// `gs://bucket/videos/a.mp4` becomes
/// `https://storage.googleapis.com/bucket/videos/a.mp4`; anything else is
/// returned unchanged.
pub fn public_video_url(uri: &str) -> String {
    match uri.strip_prefix("gs://") {
        Some(rest) => format!("{}/{}", GCS_PUBLIC_HOST, rest),
        None => uri.to_string(),
    }
}

/// Errors from [`validate_media_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaUrlError {
    /// Not a parseable absolute URL
    Malformed(String),
    /// Scheme other than http/https
    UnsupportedScheme(String),
}

impl std::fmt::Display for MediaUrlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaUrlError::Malformed(url) => write!(f, "malformed URL: {}", url),
            MediaUrlError::UnsupportedScheme(scheme) => {
                write!(f, "unsupported URL scheme '{}', expected http or https", scheme)
            }
        }
    }
}

impl std::error::Error for MediaUrlError {}

/// Accept only absolute http(s) URLs for remote media.
pub fn validate_media_url(raw: &str) -> Result<Url, MediaUrlError> {
    let url = Url::parse(raw.trim()).map_err(|_| MediaUrlError::Malformed(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(MediaUrlError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_video_url_rewrites_gcs() {
        assert_eq!(
            public_video_url("gs://flowboard-media/videos/123/sample_0.mp4"),
            "https://storage.googleapis.com/flowboard-media/videos/123/sample_0.mp4"
        );
    }

    #[test]
    fn test_public_video_url_keeps_https() {
        let url = "https://cdn.example.com/v.mp4";
        assert_eq!(public_video_url(url), url);
    }

    #[test]
    fn test_validate_media_url() {
        assert!(validate_media_url("https://cdn.example.com/a.mp4").is_ok());
        assert!(validate_media_url("http://10.0.0.1:8080/a.mp4").is_ok());
        assert_eq!(
            validate_media_url("file:///etc/passwd"),
            Err(MediaUrlError::UnsupportedScheme("file".to_string()))
        );
        assert!(matches!(
            validate_media_url("not a url"),
            Err(MediaUrlError::Malformed(_))
        ));
    }
}
