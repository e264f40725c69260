//! Directory server: the element tree (directories, studies, cases, lists,
//! filters) and its CRUD surface.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::Result;

use super::{api_url, HEADER_USER_ID};

/// One entry of a directory listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryElement {
    pub element_uuid: String,
    pub element_name: String,
    #[serde(rename = "type")]
    pub element_type: String,
}

#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: Client,
    service_url: String,
}

impl DirectoryClient {
    pub fn new(http: Client, service_url: &str) -> Self {
        Self {
            http,
            service_url: service_url.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        api_url(&self.service_url, path)
    }

    pub async fn root_directories(&self, user_id: &str) -> Result<Vec<DirectoryElement>> {
        let elements = self
            .http
            .get(self.url("root-directories"))
            .header(HEADER_USER_ID, user_id)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(elements)
    }

    /// UUID of the root directory with the given name, matched
    /// case-insensitively.
    pub async fn root_directory_id(
        &self,
        user_id: &str,
        directory_name: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .root_directories(user_id)
            .await?
            .into_iter()
            .find(|dir| dir.element_name.eq_ignore_ascii_case(directory_name))
            .map(|dir| dir.element_uuid))
    }

    pub async fn elements(&self, user_id: &str, directory_id: &str) -> Result<Vec<DirectoryElement>> {
        let elements = self
            .http
            .get(self.url(&format!("directories/{directory_id}/elements")))
            .header(HEADER_USER_ID, user_id)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("directory {directory_id} elements: {elements:?}");
        Ok(elements)
    }

    /// UUID of the element of a given type and name inside a directory.
    pub async fn element_id(
        &self,
        user_id: &str,
        directory_id: &str,
        element_type: &str,
        element_name: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .elements(user_id, directory_id)
            .await?
            .into_iter()
            .find(|elt| {
                elt.element_name.eq_ignore_ascii_case(element_name)
                    && elt.element_type.eq_ignore_ascii_case(element_type)
            })
            .map(|elt| elt.element_uuid))
    }

    pub async fn element_info(&self, element_id: &str) -> Result<Value> {
        let info = self
            .http
            .get(self.url(&format!("elements/{element_id}")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(info)
    }

    pub async fn create_root_directory(
        &self,
        directory_name: &str,
        owner: &str,
        description: &str,
    ) -> Result<Option<String>> {
        let body = json!({
            "elementName": directory_name,
            "owner": owner,
            "description": description,
        });
        let created: Value = self
            .http
            .post(self.url("root-directories"))
            .header(HEADER_USER_ID, owner)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(element_uuid_of(&created))
    }

    pub async fn create_directory(
        &self,
        directory_name: &str,
        parent_id: &str,
        owner: &str,
    ) -> Result<Option<String>> {
        let body = json!({
            "elementName": directory_name,
            "owner": owner,
            "type": "DIRECTORY",
            "elementUuid": null,
        });
        let created: Value = self
            .http
            .post(self.url(&format!("directories/{parent_id}/elements")))
            .header(HEADER_USER_ID, owner)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(element_uuid_of(&created))
    }

    pub async fn rename_element(&self, element_id: &str, new_name: &str, owner: &str) -> Result<()> {
        self.http
            .put(self.url(&format!("elements/{element_id}")))
            .header(HEADER_USER_ID, owner)
            .json(&json!({ "elementName": new_name }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Moves an element into another directory; returns the HTTP status so
    /// steps can assert expected rejections.
    pub async fn move_element(&self, element_id: &str, target_dir_id: &str, owner: &str) -> Result<u16> {
        info!("moving element {element_id} to {target_dir_id}");
        let response = self
            .http
            .put(self.url(&format!("elements/{element_id}")))
            .query(&[("newDirectory", target_dir_id)])
            .header(HEADER_USER_ID, owner)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    /// Removes a single element or a whole directory, recursively.
    pub async fn remove_element(&self, element_id: &str, user_id: &str) -> Result<()> {
        self.http
            .delete(self.url(&format!("elements/{element_id}")))
            .header(HEADER_USER_ID, user_id)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn element_uuid_of(created: &Value) -> Option<String> {
    created
        .get("elementUuid")
        .and_then(Value::as_str)
        .map(str::to_owned)
}
