//! Case server: stored network case files.

use reqwest::Client;

use crate::error::Result;

use super::api_url;

#[derive(Debug, Clone)]
pub struct CaseClient {
    http: Client,
    service_url: String,
}

impl CaseClient {
    pub fn new(http: Client, service_url: &str) -> Self {
        Self {
            http,
            service_url: service_url.to_string(),
        }
    }

    /// The endpoint answers a literal `true` or `false` body.
    pub async fn exists(&self, case_id: &str) -> Result<bool> {
        let body = self
            .http
            .get(api_url(&self.service_url, &format!("cases/{case_id}/exists")))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body.trim() == "true")
    }
}
