use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::{Client, Url};

use crate::application::ports::{DocumentFetcher, FetchError, FetchedDocument};

const FALLBACK_FILENAME: &str = "document";

/// Downloads submitted document URLs over HTTP(S).
///
/// Bodies are read chunk by chunk; once `max_document_bytes` is passed the
/// buffered data is dropped and the download stops, so an oversized document
/// is rejected by validation without being held in memory.
pub struct HttpDocumentFetcher {
    client: Client,
    max_document_bytes: u64,
}

impl HttpDocumentFetcher {
    pub fn new(request_timeout: Duration, max_document_bytes: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| FetchError::Unreachable {
                url: String::new(),
                reason: format!("http client: {e}"),
            })?;
        Ok(Self {
            client,
            max_document_bytes,
        })
    }
}

fn filename_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or(FALLBACK_FILENAME)
        .to_string()
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "{url}: only http and https are supported"
            )));
        }
        let filename = filename_for(&parsed);

        let unreachable = |e: reqwest::Error| FetchError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let mut response = self.client.get(parsed).send().await.map_err(unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut data = BytesMut::new();
        let mut size_bytes = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(unreachable)? {
            size_bytes += chunk.len() as u64;
            if size_bytes > self.max_document_bytes {
                tracing::info!(
                    size_bytes,
                    limit = self.max_document_bytes,
                    "Fetched document over limit, download stopped"
                );
                data.clear();
                break;
            }
            data.extend_from_slice(&chunk);
        }

        tracing::debug!(filename = %filename, size_bytes, "Document fetched");
        Ok(FetchedDocument {
            filename,
            data: data.freeze(),
            size_bytes,
        })
    }
}
