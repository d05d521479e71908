use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Failed to download {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Invalid file set: {0}")]
    Validation(String),

    #[error("Invalid manifest: {0}\n\n\
             Hint: the modpack manifest must be a JSON document with \"files\" and \"targets\" arrays.\n\
             Check that the file was exported from the pack API or written by hand with the same layout.")]
    InvalidManifest(String),

    #[error("Modloader type '{0}' is not currently supported\n\n\
             Supported mod loaders: forge\n\
             A pack without a modloader target installs the vanilla server only.")]
    UnsupportedModLoader(String),

    #[error("Cannot create directory {}: {source}\n\n\
             Hint: check that the install path is writable and that the disk is not full.",
             path.display())]
    FatalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("Aborted: {failed} download(s) failed")]
    DownloadsFailed { failed: usize },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn fatal_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FatalIo {
            path: path.into(),
            source,
        }
    }
}
