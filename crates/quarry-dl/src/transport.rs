use std::{
    fs::File,
    io::{self, Read, Write},
};

use tracing::{debug, trace};
use ureq::{
    http::{
        header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED},
        HeaderMap, Response,
    },
    Agent, Body,
};
use url::Url;

use crate::{
    error::{DownloadError, Result},
    http_client::{apply_headers, ClientConfig},
};

/// Cache validators from a previous response, sent with conditional requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validators {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

#[derive(Debug)]
pub enum FetchResponse {
    /// The resource has not changed since the given validators were issued.
    NotModified,
    Content {
        body: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<String>,
    },
}

/// Moves bytes from a location into memory or a writer.
pub trait Transport: Send + Sync {
    /// Fetches a whole resource, conditionally if validators are present.
    fn get(&self, url: &Url, validators: &Validators) -> Result<FetchResponse>;

    /// Streams a resource into `out`, returning the number of bytes copied.
    ///
    /// Bytes may already have been written to `out` when an error is
    /// returned.
    fn download(&self, url: &Url, out: &mut dyn Write) -> Result<u64>;
}

pub struct HttpTransport {
    agent: Agent,
    headers: Option<HeaderMap>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            agent: config.build(),
            headers: config.headers.clone(),
        }
    }

    fn call(&self, url: &Url, validators: &Validators) -> Result<Response<Body>> {
        let mut req = apply_headers(self.agent.get(url.as_str()), &self.headers);
        if let Some(etag) = &validators.etag {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &validators.last_modified {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }

        trace!("GET {}", url);
        let resp = req.call()?;
        let status = resp.status().as_u16();
        match status {
            200..=299 | 304 => Ok(resp),
            404 | 410 => {
                Err(DownloadError::NotFound {
                    url: url.to_string(),
                })
            }
            _ => {
                Err(DownloadError::HttpError {
                    status,
                    url: url.to_string(),
                })
            }
        }
    }
}

fn header_value(resp: &Response<Body>, name: ureq::http::HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url, validators: &Validators) -> Result<FetchResponse> {
        let resp = self.call(url, validators)?;

        if resp.status().as_u16() == 304 {
            debug!("{} not modified", url);
            return Ok(FetchResponse::NotModified);
        }

        let etag = header_value(&resp, ETAG);
        let last_modified = header_value(&resp, LAST_MODIFIED);

        let mut body = Vec::new();
        resp.into_body().into_reader().read_to_end(&mut body)?;

        Ok(FetchResponse::Content {
            body,
            etag,
            last_modified,
        })
    }

    fn download(&self, url: &Url, out: &mut dyn Write) -> Result<u64> {
        let resp = self.call(url, &Validators::default())?;
        let mut reader = resp.into_body().into_reader();
        Ok(io::copy(&mut reader, out)?)
    }
}

/// Serves `file://` locations straight from the filesystem.
#[derive(Default, Clone)]
pub struct FileTransport;

impl FileTransport {
    fn open(&self, url: &Url) -> Result<File> {
        let path = url.to_file_path().map_err(|_| {
            DownloadError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
                url: url.to_string(),
            }
        })?;

        File::open(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                DownloadError::NotFound {
                    url: url.to_string(),
                }
            } else {
                DownloadError::Io(err)
            }
        })
    }
}

impl Transport for FileTransport {
    fn get(&self, url: &Url, _validators: &Validators) -> Result<FetchResponse> {
        let mut body = Vec::new();
        self.open(url)?.read_to_end(&mut body)?;
        Ok(FetchResponse::Content {
            body,
            etag: None,
            last_modified: None,
        })
    }

    fn download(&self, url: &Url, out: &mut dyn Write) -> Result<u64> {
        let mut file = self.open(url)?;
        Ok(io::copy(&mut file, out)?)
    }
}

/// Dispatches on the URL scheme to the HTTP or file transport.
pub struct DefaultTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl DefaultTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: HttpTransport::new(config),
            file: FileTransport,
        }
    }

    fn select(&self, url: &Url) -> Result<&dyn Transport> {
        match url.scheme() {
            "http" | "https" => Ok(&self.http),
            "file" => Ok(&self.file),
            scheme => {
                Err(DownloadError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                    url: url.to_string(),
                })
            }
        }
    }
}

impl Default for DefaultTransport {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl Transport for DefaultTransport {
    fn get(&self, url: &Url, validators: &Validators) -> Result<FetchResponse> {
        self.select(url)?.get(url, validators)
    }

    fn download(&self, url: &Url, out: &mut dyn Write) -> Result<u64> {
        self.select(url)?.download(url, out)
    }
}

/// Parses `input` as a URL.
pub fn parse_url(input: &str) -> Result<Url> {
    Url::parse(input).map_err(|source| {
        DownloadError::InvalidUrl {
            url: input.to_string(),
            source,
        }
    })
}
