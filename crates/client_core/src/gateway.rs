//! The single network-facing primitive. Every component routes its I/O through
//! [`RequestGateway`], which resolves endpoints against one configured base address
//! and turns any non-success status into [`ConsoleError::Server`] carrying the raw body.

use reqwest::{
    multipart::{Form, Part},
    Client, Method, Response,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ConsoleError, Result};

pub(crate) const HEALTH_ENDPOINT: &str = "health/ping";
pub(crate) const EVENTS_ENDPOINT: &str = "events/";
pub(crate) const GUESTS_ENDPOINT: &str = "guests/";
pub(crate) const GUEST_IMPORT_ENDPOINT: &str = "guests/import";
pub(crate) const CHECKIN_ENDPOINT: &str = "checkin/";

const UPLOAD_FIELD: &str = "file";
const DEFAULT_UPLOAD_MIME: &str = "application/octet-stream";

/// A file staged for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub mime_type: Option<String>,
    pub contents: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: None,
            contents: contents.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    fn into_form(self) -> Result<Form> {
        let mime_type = self
            .mime_type
            .unwrap_or_else(|| DEFAULT_UPLOAD_MIME.to_string());
        let part = Part::bytes(self.contents)
            .file_name(self.filename)
            .mime_str(&mime_type)
            .map_err(|_| ConsoleError::validation(format!("invalid mime type '{mime_type}'")))?;
        Ok(Form::new().part(UPLOAD_FIELD, part))
    }
}

#[derive(Debug)]
enum RequestBody {
    Empty,
    Json(serde_json::Value),
    File(UploadFile),
}

/// Method, query and body for one gateway call.
#[derive(Debug)]
pub struct CallOptions {
    method: Method,
    query: Vec<(&'static str, String)>,
    body: RequestBody,
}

impl CallOptions {
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    fn new(method: Method) -> Self {
        Self {
            method,
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|err| {
            ConsoleError::validation(format!("could not encode request body: {err}"))
        })?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn file(mut self, file: UploadFile) -> Self {
        self.body = RequestBody::File(file);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RequestGateway {
    http: Client,
    base_url: Url,
}

impl RequestGateway {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ConsoleError::validation(format!("invalid endpoint '{path}': {err}")))
    }

    /// Issues the request and decodes a JSON body.
    pub async fn call<T: DeserializeOwned>(&self, path: &str, options: CallOptions) -> Result<T> {
        let response = self.send(path, options).await?;
        let body = response.text().await.map_err(ConsoleError::Network)?;
        serde_json::from_str(&body).map_err(|err| {
            warn!(endpoint = path, error = %err, "response body did not decode");
            ConsoleError::Decode {
                endpoint: path.to_string(),
                reason: err.to_string(),
            }
        })
    }

    /// Issues the request and discards the body; only the status matters.
    pub async fn call_unit(&self, path: &str, options: CallOptions) -> Result<()> {
        self.send(path, options).await?;
        Ok(())
    }

    /// Issues the request and returns the body as opaque bytes.
    pub async fn call_bytes(&self, path: &str, options: CallOptions) -> Result<Vec<u8>> {
        let response = self.send(path, options).await?;
        let bytes = response.bytes().await.map_err(ConsoleError::Network)?;
        Ok(bytes.to_vec())
    }

    async fn send(&self, path: &str, options: CallOptions) -> Result<Response> {
        let url = self.endpoint(path)?;
        let CallOptions {
            method,
            query,
            body,
        } = options;

        debug!(%method, endpoint = path, "issuing request");
        let mut request = self.http.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(&query);
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::File(file) => request.multipart(file.into_form()?),
        };

        let response = request.send().await.map_err(|err| {
            warn!(%method, endpoint = path, error = %err, "request did not complete");
            ConsoleError::Network(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            warn!(%method, endpoint = path, status = status.as_u16(), "server rejected request");
            return Err(ConsoleError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

fn normalize_base_url(raw: &str) -> Result<Url> {
    let invalid = |reason: String| ConsoleError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("address cannot carry endpoint paths".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
