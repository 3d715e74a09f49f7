//! Remote parser service client
//!
//! The parser service scrapes posts on our behalf. Three endpoints are used:
//!
//! - `POST /api/batch_parse_stream`: streamed progress events, then the result
//! - `POST /api/batch_parse`: the same result as a single JSON document
//! - `POST /api/download_zip`: a zip archive of one post's text and images
//!
//! Batch requests carry `{"urls": [...]}`.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::models::{Item, ParseFailure, ParsedNote};

/// Connection timeout for the parser service
const CONNECT_TIMEOUT: u64 = 10;

/// Errors that abort a request before or while the body is read
#[derive(Error, Debug)]
pub enum RequestError {
    /// No URLs were supplied
    #[error("No post links to parse")]
    EmptyBatch,

    /// Could not reach the parser service
    #[error("Failed to reach parser service: {0}")]
    Connect(#[source] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Parser service returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The connection failed while reading the body
    #[error("Parser response was interrupted: {0}")]
    Body(#[source] reqwest::Error),

    /// A single-document response could not be decoded
    #[error("Invalid parser response: {0}")]
    InvalidResponse(String),
}

/// Successful and failed URLs of one batch
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParseOutcome {
    #[serde(default)]
    pub notes: Vec<ParsedNote>,
    #[serde(default)]
    pub failed: Vec<ParseFailure>,
}

/// A downloaded archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    urls: &'a [String],
}

#[derive(Serialize)]
struct ArchiveRequest<'a> {
    note_data: ArchiveNote<'a>,
    selected_image_indices: Option<&'a [usize]>,
}

#[derive(Serialize)]
struct ArchiveNote<'a> {
    title: &'a str,
    content: &'a str,
    tags: &'a [String],
    images: &'a [String],
    origin_url: &'a str,
}

/// HTTP client for the parser service
#[derive(Debug, Clone)]
pub struct ParserClient {
    base_url: String,
    http: reqwest::Client,
}

impl ParserClient {
    /// Create a client for the service at `base_url`
    ///
    /// No overall request timeout is set: a batch stream stays open until the
    /// service finishes.
    pub fn new(base_url: &str) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .user_agent(concat!("postgrab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RequestError::Connect)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Result<Self, RequestError> {
        Self::new(&config.parser_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a streamed batch parse
    ///
    /// Resolves once the service has accepted the request; the returned
    /// stream yields raw body chunks for the decoder.
    pub async fn parse_stream(
        &self,
        urls: &[String],
    ) -> Result<impl Stream<Item = Result<Vec<u8>, RequestError>> + Unpin, RequestError> {
        let response = self.post_batch("/api/batch_parse_stream", urls).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(RequestError::Body)))
    }

    /// Run a batch parse and wait for the single JSON result
    pub async fn parse(&self, urls: &[String]) -> Result<ParseOutcome, RequestError> {
        let response = self.post_batch("/api/batch_parse", urls).await?;
        let body = response.bytes().await.map_err(RequestError::Body)?;
        serde_json::from_slice(&body).map_err(|e| RequestError::InvalidResponse(e.to_string()))
    }

    /// Download the archive for one item
    ///
    /// `image_indices` selects images by position; `None`, or a selection
    /// covering every image, asks for all of them.
    pub async fn download_archive(
        &self,
        item: &Item,
        image_indices: Option<&[usize]>,
    ) -> Result<Archive, RequestError> {
        let selected = image_indices.filter(|indices| indices.len() != item.images.len());
        let request = ArchiveRequest {
            note_data: ArchiveNote {
                title: &item.title,
                content: &item.content,
                tags: &item.tags,
                images: &item.images,
                origin_url: &item.url,
            },
            selected_image_indices: selected,
        };

        let url = format!("{}/api/download_zip", self.base_url);
        debug!("Requesting archive for {}", item.url);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(RequestError::Connect)?;
        let response = check_status(response).await?;

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| {
                let title = if item.title.is_empty() {
                    "xhs_note"
                } else {
                    item.title.as_str()
                };
                format!("{}.zip", title)
            });

        let bytes = response.bytes().await.map_err(RequestError::Body)?;
        Ok(Archive {
            filename: sanitize_filename(&filename),
            bytes: bytes.to_vec(),
        })
    }

    async fn post_batch(&self, path: &str, urls: &[String]) -> Result<Response, RequestError> {
        if urls.is_empty() {
            return Err(RequestError::EmptyBatch);
        }

        let url = format!("{}{}", self.base_url, path);
        debug!("POST {} ({} urls)", url, urls.len());
        let response = self
            .http
            .post(&url)
            .json(&BatchRequest { urls })
            .send()
            .await
            .map_err(RequestError::Connect)?;

        check_status(response).await
    }
}

/// Turn a non-success response into `RequestError::Status`
async fn check_status(response: Response) -> Result<Response, RequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(RequestError::Status {
        status,
        message: error_message(&text).unwrap_or_else(|| status.to_string()),
    })
}

/// Pull a readable message out of an error body
///
/// JSON bodies may carry `message` or `detail`; anything else is used as-is.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["message", "detail"] {
            if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
    }
    Some(body.to_string())
}

/// Extract the filename from a `Content-Disposition` header value
fn filename_from_disposition(value: &str) -> Option<String> {
    let (_, rest) = value.split_once("filename=")?;
    let name = rest.split(';').next()?.trim().trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Replace characters that are not allowed in file names
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect()
}
