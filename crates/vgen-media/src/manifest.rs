//! FFmpeg concat demuxer manifests.

use vgen_models::validate_media_url;

use crate::error::{MediaError, MediaResult};

/// An ordered list of remote inputs in concat demuxer syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatManifest {
    entries: Vec<String>,
}

impl ConcatManifest {
    /// Build a manifest, rejecting anything that is not an http(s) URL.
    pub fn from_urls<S: AsRef<str>>(urls: &[S]) -> MediaResult<Self> {
        let entries = urls
            .iter()
            .map(|raw| {
                let raw = raw.as_ref();
                validate_media_url(raw)
                    .map(|url| url.to_string())
                    .map_err(|e| MediaError::InvalidUrl(format!("{}: {}", raw, e)))
            })
            .collect::<MediaResult<Vec<_>>>()?;

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `file '<url>'` lines.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|url| format!("file '{}'\n", escape(url)))
            .collect()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.render().into_bytes()
    }
}

/// Close the quote, emit an escaped quote, reopen.
fn escape(value: &str) -> String {
    value.replace('\'', r"'\''")
}
