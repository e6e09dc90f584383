//! Resource locators
//!
//! Items are addressed by URL. Plain filesystem paths are converted to `file://`
//! URLs so backends only ever deal with one representation.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// URI-like reference to an audio resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(Url);

impl Locator {
    /// Parse an absolute URL (`file:///music/a.mp3`, `https://host/stream`)
    pub fn parse(input: &str) -> Result<Self> {
        Url::parse(input)
            .map(Self)
            .map_err(|e| CoreError::invalid_locator(format!("{input}: {e}")))
    }

    /// Build a `file://` locator from an absolute filesystem path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Url::from_file_path(path)
            .map(Self)
            .map_err(|()| CoreError::invalid_locator(format!("not an absolute path: {}", path.display())))
    }

    /// Accept either a URL or a filesystem path
    ///
    /// Relative paths are resolved against `base`.
    pub fn from_user_input(input: &str, base: &Path) -> Result<Self> {
        if let Ok(url) = Url::parse(input) {
            // Windows drive letters parse as a one-letter scheme
            if url.scheme().len() > 1 {
                return Ok(Self(url));
            }
        }
        let path = Path::new(input);
        if path.is_absolute() {
            Self::from_path(path)
        } else {
            Self::from_path(base.join(path))
        }
    }

    /// URL scheme (`file`, `http`, ...)
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// True for `file://` locators
    pub fn is_file(&self) -> bool {
        self.0.scheme() == "file"
    }

    /// Filesystem path for `file://` locators
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.is_file() {
            self.0.to_file_path().ok()
        } else {
            None
        }
    }

    /// Last path segment without its extension
    pub fn file_stem(&self) -> Option<String> {
        let segment = self.last_segment()?;
        let stem = match segment.rfind('.') {
            Some(0) | None => segment,
            Some(dot) => &segment[..dot],
        };
        Some(percent_decode(stem))
    }

    /// Lowercased extension of the last path segment
    pub fn extension(&self) -> Option<String> {
        let segment = self.last_segment()?;
        match segment.rfind('.') {
            Some(dot) if dot > 0 && dot + 1 < segment.len() => {
                Some(segment[dot + 1..].to_ascii_lowercase())
            }
            _ => None,
        }
    }

    /// The full URL as text
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Underlying URL
    pub fn url(&self) -> &Url {
        &self.0
    }

    fn last_segment(&self) -> Option<&str> {
        self.0
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_url() {
        let locator = Locator::parse("file:///music/Artist/Some%20Song.FLAC").unwrap();
        assert!(locator.is_file());
        assert_eq!(locator.extension().as_deref(), Some("flac"));
        assert_eq!(locator.file_stem().as_deref(), Some("Some Song"));
    }

    #[test]
    fn stream_url_without_extension() {
        let locator = Locator::parse("https://radio.example/live").unwrap();
        assert!(!locator.is_file());
        assert_eq!(locator.extension(), None);
        assert_eq!(locator.file_stem().as_deref(), Some("live"));
        assert_eq!(locator.to_file_path(), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Locator::parse("not a url"),
            Err(CoreError::InvalidLocator(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn user_input_paths_become_file_urls() {
        let base = Path::new("/home/me");
        let locator = Locator::from_user_input("music/a.mp3", base).unwrap();
        assert_eq!(locator.as_str(), "file:///home/me/music/a.mp3");
        assert_eq!(
            locator.to_file_path(),
            Some(PathBuf::from("/home/me/music/a.mp3"))
        );

        let url = Locator::from_user_input("http://host/x.ogg", base).unwrap();
        assert_eq!(url.scheme(), "http");
    }
}
