//! Actions server: contingency list contents.

use reqwest::Client;
use serde_json::Value;

use crate::error::Result;

use super::api_url;

#[derive(Debug, Clone)]
pub struct ActionsClient {
    http: Client,
    service_url: String,
}

impl ActionsClient {
    pub fn new(http: Client, service_url: &str) -> Self {
        Self {
            http,
            service_url: service_url.to_string(),
        }
    }

    /// Replaces the whole content of a form contingency list.
    pub async fn update_form_contingency_list(
        &self,
        list_id: &str,
        content: &Value,
    ) -> Result<()> {
        self.http
            .put(api_url(
                &self.service_url,
                &format!("form-contingency-lists/{list_id}"),
            ))
            .json(content)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
