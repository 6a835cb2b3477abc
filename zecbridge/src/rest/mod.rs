use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BridgeError, Result};

/// Thin JSON-over-HTTP wrapper shared by the price API and Solana RPC clients.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// GET a JSON resource relative to the base URL.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).query(query).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Http {
                status,
                message: body,
            });
        }

        resp.json::<T>().await.map_err(BridgeError::Request)
    }

    /// POST a JSON body to the base URL itself (JSON-RPC style).
    ///
    /// The base URL is used verbatim so query strings such as `?api-key=` survive.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, body: &B) -> Result<T> {
        let resp = self
            .client
            .post(&self.base_url)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Http {
                status,
                message: body,
            });
        }

        resp.json::<T>().await.map_err(BridgeError::Request)
    }
}
