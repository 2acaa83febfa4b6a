// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use tracing::debug;

use super::error::DecodeError;

/// Retrieves the encoded bytes of a sample source.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, DecodeError>;
}

/// Fetches `http(s)://` URLs over the network, `file://` URLs and plain paths from
/// disk. Relative paths are resolved against the root, when one is set.
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
    root: Option<PathBuf>,
}

impl DefaultFetcher {
    pub fn new(root: Option<PathBuf>) -> DefaultFetcher {
        DefaultFetcher { root }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<u8>, DecodeError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            debug!(url = source, "Fetching sample over HTTP.");
            let response = ureq::get(source)
                .call()
                .map_err(|e| DecodeError::Fetch(source.to_string(), e.to_string()))?;
            let mut bytes = Vec::new();
            response.into_reader().read_to_end(&mut bytes)?;
            return Ok(bytes);
        }

        let path = self.resolve(source.strip_prefix("file://").unwrap_or(source));
        fs::read(&path).map_err(|e| DecodeError::Fetch(path.display().to_string(), e.to_string()))
    }
}

/// The lowercase extension of a source, used as a decoding hint.
pub fn extension(source: &str) -> Option<String> {
    let path = source
        .split(['?', '#'])
        .next()
        .unwrap_or(source);
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kick.wav"), b"kick").unwrap();

        let fetcher = DefaultFetcher::new(Some(dir.path().to_path_buf()));
        assert_eq!(fetcher.fetch("kick.wav").unwrap(), b"kick");

        let absolute = dir.path().join("kick.wav");
        let url = format!("file://{}", absolute.display());
        assert_eq!(fetcher.fetch(&url).unwrap(), b"kick");
    }

    #[test]
    fn test_fetch_missing() {
        let fetcher = DefaultFetcher::default();
        assert!(matches!(
            fetcher.fetch("/no/such/sample.wav"),
            Err(DecodeError::Fetch(_, _))
        ));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("Kick_808.WAV"), Some("wav".to_string()));
        assert_eq!(
            extension("https://host/samples/snare.flac?token=abc"),
            Some("flac".to_string())
        );
        assert_eq!(extension("noextension"), None);
    }
}
