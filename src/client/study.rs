//! Study server: the modification tree, network-map lookups, computations
//! (loadflow, security analysis) and network export.

use std::path::Path;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::Result;

use super::api_url;

#[derive(Debug, Clone)]
pub struct StudyClient {
    http: Client,
    service_url: String,
}

impl StudyClient {
    pub fn new(http: Client, service_url: &str) -> Self {
        Self {
            http,
            service_url: service_url.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        api_url(&self.service_url, path)
    }

    /// HEAD existence probe; transport errors count as absent.
    pub async fn exists_study(&self, study_id: &str) -> bool {
        match self.http.head(self.url(&format!("studies/{study_id}"))).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    pub async fn tree(&self, study_id: &str) -> Result<Value> {
        let tree = self
            .http
            .get(self.url(&format!("studies/{study_id}/tree")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tree)
    }

    pub async fn check_node_tree(&self, study_id: &str) -> bool {
        match self
            .http
            .head(self.url(&format!("studies/{study_id}/tree")))
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    /// Node of the tree whose `identifier_key` (`name` or `id`) matches.
    pub async fn node_by(
        &self,
        study_id: &str,
        identifier: &str,
        identifier_key: &str,
    ) -> Result<Option<Value>> {
        let tree = self.tree(study_id).await?;
        Ok(find_node_in_tree(&tree, identifier, identifier_key).cloned())
    }

    pub async fn node_id(&self, study_id: &str, node_name: &str) -> Result<Option<String>> {
        Ok(self
            .node_by(study_id, node_name, "name")
            .await?
            .and_then(|node| node.get("id").and_then(Value::as_str).map(str::to_owned)))
    }

    /// Root networks grouping a study's network variants.
    pub async fn root_network_ids(&self, study_id: &str) -> Result<Vec<String>> {
        let networks: Value = self
            .http
            .get(self.url(&format!("studies/{study_id}/root-networks")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(networks
            .as_array()
            .map(|array| {
                array
                    .iter()
                    .filter_map(|rn| rn.get("rootNetworkUuid").and_then(Value::as_str))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default())
    }

    pub async fn search_equipment(
        &self,
        study_id: &str,
        node_id: &str,
        user_input: &str,
        field_selector: &str,
        in_upstream_built_parent_node: bool,
        equipment_type: Option<&str>,
    ) -> Result<Value> {
        let mut query = vec![
            ("userInput".to_string(), user_input.to_string()),
            ("fieldSelector".to_string(), field_selector.to_string()),
            (
                "inUpstreamBuiltParentNode".to_string(),
                in_upstream_built_parent_node.to_string(),
            ),
        ];
        if let Some(equipment_type) = equipment_type {
            query.push(("equipmentType".to_string(), equipment_type.to_string()));
        }
        let found = self
            .http
            .get(self.url(&format!("studies/{study_id}/nodes/{node_id}/search")))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(found)
    }

    /// Single equipment fetched by id from the network map.
    pub async fn equipment_data(
        &self,
        study_id: &str,
        node_id: &str,
        equipment_collection: &str,
        equipment_id: &str,
        in_upstream_built_parent_node: bool,
    ) -> Result<Option<Value>> {
        let data: Value = self
            .http
            .get(self.url(&format!(
                "studies/{study_id}/nodes/{node_id}/network-map/{equipment_collection}/{equipment_id}"
            )))
            .query(&[(
                "inUpstreamBuiltParentNode",
                in_upstream_built_parent_node.to_string(),
            )])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(pick_equipment(&data, equipment_id))
    }

    /// Equipment fetched through its substation: the endpoint may return
    /// several elements, the wanted id is picked out of the list.
    pub async fn equipment_data_in_substation(
        &self,
        study_id: &str,
        node_id: &str,
        equipment_collection: &str,
        equipment_id: &str,
        substation_id: &str,
    ) -> Result<Option<Value>> {
        let data: Value = self
            .http
            .get(self.url(&format!(
                "studies/{study_id}/nodes/{node_id}/network-map/{equipment_collection}"
            )))
            .query(&[("substationId", substation_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(pick_equipment(&data, equipment_id))
    }

    pub async fn update_switch(
        &self,
        switch_id: &str,
        study_id: &str,
        node_id: &str,
        open: bool,
    ) -> Result<()> {
        info!("switch {switch_id} open={open}");
        self.http
            .put(self.url(&format!(
                "studies/{study_id}/nodes/{node_id}/network-modification/switches/{switch_id}"
            )))
            .query(&[("open", open.to_string())])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn set_loadflow_provider(&self, provider: &str, study_id: &str) -> Result<()> {
        self.http
            .post(self.url(&format!("studies/{study_id}/loadflow/provider")))
            .body(provider.to_string())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn run_loadflow(
        &self,
        study_id: &str,
        root_network_id: &str,
        node_id: &str,
    ) -> Result<()> {
        info!("running loadflow on study {study_id} node {node_id}");
        self.http
            .put(self.url(&format!(
                "studies/{study_id}/root-networks/{root_network_id}/nodes/{node_id}/loadflow/run"
            )))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Current loadflow status text (e.g. `CONVERGED`), empty when absent.
    pub async fn loadflow_status(
        &self,
        study_id: &str,
        root_network_id: &str,
        node_id: &str,
    ) -> Result<String> {
        let status = self
            .http
            .get(self.url(&format!(
                "studies/{study_id}/root-networks/{root_network_id}/nodes/{node_id}/loadflow/status"
            )))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!("loadflow status: '{status}'");
        Ok(status)
    }

    pub async fn run_security_analysis(
        &self,
        study_id: &str,
        node_id: &str,
        contingency_list_id: &str,
    ) -> Result<()> {
        info!("running security analysis on study {study_id} node {node_id}");
        self.http
            .post(self.url(&format!(
                "studies/{study_id}/nodes/{node_id}/security-analysis/run"
            )))
            .query(&[("contingencyListName", contingency_list_id)])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn security_analysis_status(&self, study_id: &str, node_id: &str) -> Result<String> {
        let status = self
            .http
            .get(self.url(&format!(
                "studies/{study_id}/nodes/{node_id}/security-analysis/status"
            )))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(status)
    }

    pub async fn security_analysis_result(&self, study_id: &str, node_id: &str) -> Result<Value> {
        let result = self
            .http
            .get(self.url(&format!(
                "studies/{study_id}/nodes/{node_id}/security-analysis/result"
            )))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(result)
    }

    /// Number of contingencies a list yields on a node, wrapped as
    /// `{"count": "<n>"}` for the data steps.
    pub async fn contingency_count(
        &self,
        study_id: &str,
        node_id: &str,
        contingency_list_id: &str,
    ) -> Result<Value> {
        let count = self
            .http
            .get(self.url(&format!(
                "studies/{study_id}/nodes/{node_id}/contingency-count"
            )))
            .query(&[("contingencyListName", contingency_list_id)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(json!({ "count": count }))
    }

    pub async fn delete_equipment(
        &self,
        study_id: &str,
        node_id: &str,
        equipment_type: &str,
        equipment_id: &str,
    ) -> Result<()> {
        self.http
            .delete(self.url(&format!(
                "studies/{study_id}/nodes/{node_id}/network-modification/equipments/type/{equipment_type}/id/{equipment_id}"
            )))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// POST creates the equipment modification, PUT updates it.
    pub async fn upsert_equipment(
        &self,
        study_id: &str,
        node_id: &str,
        equipment_collection: &str,
        payload: &str,
        creation: bool,
    ) -> Result<()> {
        let url = self.url(&format!(
            "studies/{study_id}/nodes/{node_id}/network-modification/{equipment_collection}"
        ));
        let request = if creation {
            self.http.post(url)
        } else {
            self.http.put(url)
        };
        request
            .body(payload.to_string())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Returns the HTTP status so steps can assert expected rejections
    /// (e.g. deleting the root node).
    pub async fn delete_node(&self, study_id: &str, node_id: &str) -> Result<u16> {
        let response = self
            .http
            .delete(self.url(&format!("studies/{study_id}/tree/nodes/{node_id}")))
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    /// `mode` is CHILD, AFTER or BEFORE, relative to `node_id`.
    pub async fn create_node(
        &self,
        study_id: &str,
        node_id: &str,
        new_node_name: &str,
        mode: &str,
    ) -> Result<()> {
        let body = json!({
            "buildStatus": "NOT_BUILT",
            "name": new_node_name,
            "type": "NETWORK_MODIFICATION",
        });
        self.http
            .post(self.url(&format!("studies/{study_id}/tree/nodes/{node_id}")))
            .query(&[("mode", mode)])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn export_formats(&self) -> Result<Value> {
        let formats = self
            .http
            .get(self.url("export-network-formats"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(formats)
    }

    /// Downloads the node's network in the given format into `out_path`.
    pub async fn export_network(
        &self,
        study_id: &str,
        node_id: &str,
        format: &str,
        out_path: &Path,
    ) -> Result<()> {
        info!("saving network export into {}", out_path.display());
        let bytes = self
            .http
            .get(self.url(&format!(
                "studies/{study_id}/nodes/{node_id}/export-network/{format}"
            )))
            .header(reqwest::header::ACCEPT, "application/octet-stream")
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        tokio::fs::write(out_path, &bytes).await?;
        Ok(())
    }
}

/// Depth-first lookup of a node whose `identifier_key` matches, children
/// included.
fn find_node_in_tree<'a>(node: &'a Value, identifier: &str, identifier_key: &str) -> Option<&'a Value> {
    if node
        .get(identifier_key)
        .and_then(Value::as_str)
        .is_some_and(|value| value.eq_ignore_ascii_case(identifier))
    {
        return Some(node);
    }
    node.get("children")?
        .as_array()?
        .iter()
        .find_map(|child| find_node_in_tree(child, identifier, identifier_key))
}

fn pick_equipment(data: &Value, equipment_id: &str) -> Option<Value> {
    let id_matches = |node: &Value| {
        node.get("id")
            .and_then(Value::as_str)
            .is_some_and(|id| id.eq_ignore_ascii_case(equipment_id))
    };
    match data {
        Value::Array(elements) => elements.iter().find(|elt| id_matches(elt)).cloned(),
        single if id_matches(single) => Some(single.clone()),
        _ => None,
    }
}
