// Remote HTTP backend.
//
// Documents live behind a simple REST surface:
//   GET {base}/documents?path=<rel>  → 200 body is the document text
//   PUT {base}/documents?path=<rel>  → 2xx on success
//   HEAD behaves like GET for existence checks.
// 404 maps to `DocumentNotFound`; any other non-success status is a
// storage error.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use url::Url;

use crate::errors::OpError;
use crate::storage::DocumentStorage;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpStorage {
    client: Client,
    documents_url: Url,
    bearer_token: Option<String>,
}

impl HttpStorage {
    pub fn new(base_url: &str, bearer_token: Option<String>) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("invalid storage base URL `{base_url}`"))?;
        let documents_url = join_segment(&base, "documents")?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http storage client")?;
        Ok(Self { client, documents_url, bearer_token })
    }

    fn document_url(&self, path: &str) -> Url {
        let mut url = self.documents_url.clone();
        url.query_pairs_mut().append_pair("path", path);
        url
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn transport_error(path: &str, error: reqwest::Error) -> OpError {
        OpError::Storage(format!("http storage request for `{path}` failed: {error}"))
    }

    fn status_error(path: &str, status: StatusCode) -> OpError {
        if status == StatusCode::NOT_FOUND {
            OpError::DocumentNotFound { path: path.to_string() }
        } else {
            OpError::Storage(format!("http storage returned {status} for `{path}`"))
        }
    }
}

/// Join a path segment without clobbering any path already in the base URL.
fn join_segment(base: &Url, segment: &str) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("storage base URL cannot carry path segments"))?;
        segments.pop_if_empty();
        segments.push(segment);
    }
    Ok(url)
}

impl DocumentStorage for HttpStorage {
    fn load(&self, path: &str) -> Result<String, OpError> {
        let response = self
            .authorize(self.client.get(self.document_url(path)))
            .send()
            .map_err(|error| Self::transport_error(path, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(path, status));
        }
        response.text().map_err(|error| Self::transport_error(path, error))
    }

    fn save(&self, path: &str, content: &str) -> Result<(), OpError> {
        let response = self
            .authorize(self.client.put(self.document_url(path)))
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(content.to_string())
            .send()
            .map_err(|error| Self::transport_error(path, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(path, status));
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool, OpError> {
        let response = self
            .authorize(self.client.head(self.document_url(path)))
            .send()
            .map_err(|error| Self::transport_error(path, error))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::status_error(path, status));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_url_carries_path_query() {
        let storage = HttpStorage::new("https://docs.example.com/api", None)
            .expect("storage should initialize");
        let url = storage.document_url("reports/q3.txt");
        assert_eq!(url.as_str(), "https://docs.example.com/api/documents?path=reports%2Fq3.txt");
    }

    #[test]
    fn base_url_without_path_still_joins() {
        let storage =
            HttpStorage::new("http://localhost:8080", None).expect("storage should initialize");
        let url = storage.document_url("a.txt");
        assert_eq!(url.as_str(), "http://localhost:8080/documents?path=a.txt");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpStorage::new("not a url", None).is_err());
    }

    #[test]
    fn not_found_status_maps_to_document_not_found() {
        let error = HttpStorage::status_error("x.txt", StatusCode::NOT_FOUND);
        assert_eq!(error.code(), "DOCUMENT_NOT_FOUND");

        let error = HttpStorage::status_error("x.txt", StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.code(), "STORAGE_ERROR");
    }
}
