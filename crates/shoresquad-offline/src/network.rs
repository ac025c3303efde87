//! Network access for cache misses and precaching.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use shoresquad_core::{NetworkError, ReqwestErrorExt};
use thiserror::Error;

use crate::request::{CachedResponse, Request};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch of {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: NetworkError,
    },

    #[error("Network unavailable for {0}")]
    Offline(String),
}

/// Something that can perform a request and buffer the response.
///
/// Non-2xx statuses are returned as responses, not errors. Only failing to
/// get a response at all is an error.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<CachedResponse, FetchError>> + Send;
}

/// reqwest-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ShoreSquad/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                source: e.into_network_error(),
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<CachedResponse, FetchError>> + Send {
        let builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        let url = request.url.to_string();

        async move {
            let to_error = |e: reqwest::Error| FetchError::Network {
                url: url.clone(),
                source: e.into_network_error(),
            };

            let response = builder.send().await.map_err(to_error)?;

            let final_url = response.url().clone();
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.bytes().await.map_err(to_error)?.to_vec();

            tracing::debug!("Fetched {} -> {} ({} bytes)", url, status, body.len());

            Ok(CachedResponse {
                url: final_url,
                status,
                headers,
                body,
            })
        }
    }
}
