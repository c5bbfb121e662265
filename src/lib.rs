//! Mirror a list of project files from a content source into a local
//! directory tree, one file at a time.

pub mod app;
pub mod cli;
pub mod download;
pub mod error;
pub mod manifest;
pub mod source;

pub use download::{Downloader, FetchFailurePolicy, RunSummary};
pub use error::{MirrorError, Result};
pub use manifest::Manifest;
pub use source::{ContentSource, FsSource, HttpSource};
