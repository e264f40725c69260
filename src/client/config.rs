//! Config server: per-user, per-application UI parameters.

use reqwest::Client;
use tracing::info;

use crate::error::Result;

use super::{api_url, HEADER_USER_ID};

#[derive(Debug, Clone)]
pub struct ConfigClient {
    http: Client,
    service_url: String,
}

impl ConfigClient {
    pub fn new(http: Client, service_url: &str) -> Self {
        Self {
            http,
            service_url: service_url.to_string(),
        }
    }

    /// Sets one parameter of the study application for `user_id`.
    pub async fn set_study_parameter(
        &self,
        user_id: &str,
        name: &str,
        value: &str,
    ) -> Result<()> {
        info!("setting study parameter {name}={value} for {user_id}");
        self.http
            .put(api_url(
                &self.service_url,
                &format!("applications/study/parameters/{name}"),
            ))
            .query(&[("value", value)])
            .header(HEADER_USER_ID, user_id)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
