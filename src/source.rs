use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::{MirrorError, Result};

/// Something that can produce the text content of a project file.
pub trait ContentSource {
    fn fetch(&self, path: &str) -> Result<String>;
}

impl<F> ContentSource for F
where
    F: Fn(&str) -> Result<String>,
{
    fn fetch(&self, path: &str) -> Result<String> {
        self(path)
    }
}

/// Reads files relative to a local project root.
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContentSource for FsSource {
    fn fetch(&self, path: &str) -> Result<String> {
        let full_path = self.root.join(path);
        log::debug!("Reading {:?}", full_path);

        let bytes = fs::read(&full_path)?;
        String::from_utf8(bytes).map_err(|e| {
            MirrorError::from(io::Error::new(io::ErrorKind::InvalidData, e))
        })
    }
}

/// Fetches files from `{base_url}/{path}` over HTTP.
pub struct HttpSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("source-mirror/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl ContentSource for HttpSource {
    fn fetch(&self, path: &str) -> Result<String> {
        let url = self.url_for(path);
        log::debug!("Fetching {}", url);

        let response = self.client.get(&url).send()?;

        if !response.status().is_success() {
            return Err(MirrorError::Status {
                url,
                status: response.status(),
            });
        }

        Ok(response.text()?)
    }
}

pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Picks an HTTP source for URLs and a directory source for everything else.
pub fn source_for(location: &str) -> Result<Box<dyn ContentSource>> {
    if is_url(location) {
        Ok(Box::new(HttpSource::new(location)?))
    } else {
        Ok(Box::new(FsSource::new(location)))
    }
}
