//! Network-modification server: individual modification records.

use reqwest::Client;
use serde_json::Value;

use crate::error::Result;

use super::api_url;

#[derive(Debug, Clone)]
pub struct ModificationClient {
    http: Client,
    service_url: String,
}

impl ModificationClient {
    pub fn new(http: Client, service_url: &str) -> Self {
        Self {
            http,
            service_url: service_url.to_string(),
        }
    }

    pub async fn network_modification(&self, modification_id: &str) -> Result<Value> {
        let modification = self
            .http
            .get(api_url(
                &self.service_url,
                &format!("network-modifications/{modification_id}"),
            ))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(modification)
    }
}
