//! Network-conversion server: importer parameters for a stored case.

use reqwest::Client;
use serde_json::Value;

use crate::error::Result;

use super::api_url;

#[derive(Debug, Clone)]
pub struct NetworkConversionClient {
    http: Client,
    service_url: String,
}

impl NetworkConversionClient {
    pub fn new(http: Client, service_url: &str) -> Self {
        Self {
            http,
            service_url: service_url.to_string(),
        }
    }

    /// Importer parameter descriptors (`parameters` array plus the detected
    /// case format).
    pub async fn import_parameters(&self, case_id: &str) -> Result<Value> {
        let parameters = self
            .http
            .get(api_url(
                &self.service_url,
                &format!("cases/{case_id}/import-parameters"),
            ))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(parameters)
    }
}
