//! Explore server: the composite creation endpoints (study/case upload,
//! contingency lists, filters) and recursive deletion.

use std::ffi::OsStr;
use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::error::Result;

use super::{api_url, HEADER_USER_ID};

#[derive(Debug, Clone)]
pub struct ExploreClient {
    http: Client,
    service_url: String,
}

impl ExploreClient {
    pub fn new(http: Client, service_url: &str) -> Self {
        Self {
            http,
            service_url: service_url.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        api_url(&self.service_url, path)
    }

    /// Asynchronous: completion is observed via directory polling or the
    /// notification channel.
    pub async fn create_study_from_case(
        &self,
        study_name: &str,
        case_id: &str,
        description: &str,
        directory_id: &str,
        user_id: &str,
    ) -> Result<()> {
        info!("creating study '{study_name}' from case {case_id}");
        self.http
            .post(self.url(&format!("explore/studies/{study_name}/cases/{case_id}")))
            .query(&[
                ("duplicateCase", "true"),
                ("description", description),
                ("parentDirectoryUuid", directory_id),
            ])
            .header(HEADER_USER_ID, user_id)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn create_study_from_file(
        &self,
        study_name: &str,
        case_file: &Path,
        description: &str,
        directory_id: &str,
        user_id: &str,
    ) -> Result<()> {
        info!("creating study '{study_name}' from file {}", case_file.display());
        self.http
            .post(self.url(&format!("explore/studies/{study_name}")))
            .query(&[
                ("description", description),
                ("parentDirectoryUuid", directory_id),
            ])
            .header(HEADER_USER_ID, user_id)
            .multipart(case_file_form(case_file).await?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn create_case_from_file(
        &self,
        case_name: &str,
        case_file: &Path,
        description: &str,
        directory_id: &str,
        user_id: &str,
    ) -> Result<()> {
        info!("creating case '{case_name}' from file {}", case_file.display());
        self.http
            .post(self.url(&format!("explore/cases/{case_name}")))
            .query(&[
                ("description", description),
                ("parentDirectoryUuid", directory_id),
            ])
            .header(HEADER_USER_ID, user_id)
            .multipart(case_file_form(case_file).await?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Creates a form contingency list with a default all-lines body; steps
    /// replace the content afterwards through the actions server.
    pub async fn create_form_contingency_list(
        &self,
        list_name: &str,
        description: &str,
        directory_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let body = json!({
            "equipmentID": "*",
            "equipmentName": "*",
            "equipmentType": "LINE",
            "nominalVoltage": -1,
            "nominalVoltageOperator": "=",
        });
        self.http
            .post(self.url(&format!("explore/form-contingency-lists/{list_name}")))
            .query(&[
                ("description", description),
                ("parentDirectoryUuid", directory_id),
            ])
            .header(HEADER_USER_ID, user_id)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn copy_form_contingency_list_as_script(
        &self,
        list_id: &str,
        script_list_name: &str,
        directory_id: &str,
        user_id: &str,
    ) -> Result<()> {
        self.http
            .post(self.url(&format!(
                "explore/form-contingency-lists/{list_id}/new-script/{script_list_name}"
            )))
            .query(&[("parentDirectoryUuid", directory_id)])
            .header(HEADER_USER_ID, user_id)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `filter_type` is FORM or SCRIPT.
    pub async fn create_default_filter(
        &self,
        filter_name: &str,
        description: &str,
        directory_id: &str,
        user_id: &str,
        filter_type: &str,
    ) -> Result<()> {
        let equipment_type = if filter_type.eq_ignore_ascii_case("SCRIPT") {
            json!(null)
        } else {
            json!("LINE")
        };
        let body = json!({
            "transient": "true",
            "type": filter_type,
            "equipmentFilterForm": { "equipmentType": equipment_type },
        });
        self.http
            .post(self.url("explore/filters"))
            .query(&[
                ("name", filter_name),
                ("description", description),
                ("parentDirectoryUuid", directory_id),
            ])
            .header(HEADER_USER_ID, user_id)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Removes a single element or a whole directory, recursively.
    pub async fn remove_element(&self, element_id: &str, user_id: &str) -> Result<()> {
        self.http
            .delete(self.url(&format!("explore/elements/{element_id}")))
            .header(HEADER_USER_ID, user_id)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

async fn case_file_form(case_file: &Path) -> Result<Form> {
    let bytes = tokio::fs::read(case_file).await?;
    let file_name = case_file
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("case")
        .to_string();
    Ok(Form::new().part("caseFile", Part::bytes(bytes).file_name(file_name)))
}
