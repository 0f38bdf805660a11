use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(code(quarry_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    #[diagnostic(
        code(quarry_dl::network),
        help("Check your internet connection or try again later")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(quarry_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error("Not found: {url}")]
    #[diagnostic(code(quarry_dl::not_found))]
    NotFound { url: String },

    #[error("Unsupported URL scheme `{scheme}`: {url}")]
    #[diagnostic(
        code(quarry_dl::unsupported_scheme),
        help("Only http://, https:// and file:// locations are supported")
    )]
    UnsupportedScheme { scheme: String, url: String },

    #[error("I/O error: {0}")]
    #[diagnostic(code(quarry_dl::io))]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether the failure means the resource does not exist, as opposed to
    /// the source being unreachable.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DownloadError::NotFound { .. } | DownloadError::HttpError { status: 404, .. }
        )
    }
}

impl From<ureq::Error> for DownloadError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
