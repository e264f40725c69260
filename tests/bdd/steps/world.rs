use std::path::PathBuf;
use std::time::Duration;

use cucumber::World;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use gridsuite_bdd_tests::client::ServiceClients;
use gridsuite_bdd_tests::context::{
    equipment_type_of, extension_key, Computation, TestContext, MAX_WAITING_TIME_IN_SEC,
};
use gridsuite_bdd_tests::env::EnvProperties;
use gridsuite_bdd_tests::notification::{
    self, directory_notification_url, matches_study_creation,
};
use gridsuite_bdd_tests::retry::{poll_until, poll_while_false};
use gridsuite_bdd_tests::util::{differing_attributes, read_file_head, resource_file_content};

/// Scenario state shared by all step definitions: the selected platform,
/// the service clients bound to it, and the alias tables.
#[derive(Debug, Default, World)]
#[world(init = Self::default)]
pub struct GridWorld {
    pub env: Option<EnvProperties>,
    pub clients: Option<ServiceClients>,
    pub ctx: TestContext,
}

impl GridWorld {
    pub fn platform(&self) -> &EnvProperties {
        self.env
            .as_ref()
            .expect("no platform selected, missing a 'using platform' step")
    }

    pub fn clients(&self) -> &ServiceClients {
        self.clients
            .as_ref()
            .expect("no platform selected, missing a 'using platform' step")
    }

    pub fn user_name(&self) -> String {
        self.platform().user_name().to_string()
    }

    /// Loads the platform properties; the `USING_PLATFORM` environment
    /// variable overrides the name written in the feature file.
    pub fn select_platform(&mut self, environment_name: &str) {
        let env_name = match std::env::var("USING_PLATFORM") {
            Ok(name) if !name.is_empty() => {
                info!("using platform from USING_PLATFORM = '{name}'");
                name
            }
            _ => {
                info!("using platform from feature = '{environment_name}'");
                environment_name.to_string()
            }
        };
        let env = EnvProperties::load(&env_name)
            .unwrap_or_else(|e| panic!("cannot load properties for env {env_name}: {e}"));
        let clients = ServiceClients::new(&env).expect("cannot build the service clients");
        self.env = Some(env);
        self.clients = Some(clients);
    }

    async fn check_or_create_root_directory(&mut self, directory_name: &str) -> String {
        let user = self.user_name();
        let existing = self
            .clients()
            .directory
            .root_directory_id(&user, directory_name)
            .await
            .expect("cannot list root directories");
        let dir_id = match existing {
            Some(id) => id,
            None => self
                .clients()
                .directory
                .create_root_directory(directory_name, &user, "")
                .await
                .expect("root directory creation failed")
                .unwrap_or_else(|| panic!("could not create root directory {directory_name}")),
        };
        self.ctx.set_directory(directory_name, &dir_id);
        dir_id
    }

    /// Allocates a `bddtmp_<uuid>` directory under the configured tmp root
    /// and marks it for removal at teardown.
    pub async fn create_tmp_directory_as(&mut self, alias: &str) {
        let user = self.user_name();
        let tmp_root = self.platform().tmp_root_dir().to_string();
        let root_dir_id = self.check_or_create_root_directory(&tmp_root).await;
        let dir_name = format!("bddtmp_{}", Uuid::new_v4());
        info!("creating scenario temporary dir '{dir_name}' in '{tmp_root}'");
        let dir_id = self
            .clients()
            .directory
            .create_directory(&dir_name, &root_dir_id, &user)
            .await
            .expect("directory creation failed")
            .unwrap_or_else(|| panic!("could not create directory {dir_name} in {tmp_root}"));
        self.ctx.set_directory(alias, &dir_id);
        self.ctx.set_tmp_root_dir_id(&dir_id);
    }

    /// Checks the presence (or absence) of an element inside a known
    /// directory; returns its uuid when present.
    pub async fn element_exists(
        &mut self,
        name: &str,
        element_type: &str,
        directory_name: &str,
        should_exist: bool,
    ) -> Option<String> {
        let dir_id = self.ctx.directory_id(directory_name).to_string();
        let user = self.user_name();
        let found = self
            .clients()
            .directory
            .element_id(&user, &dir_id, element_type, name)
            .await
            .expect("cannot list directory elements");
        if should_exist {
            assert!(
                found.is_some(),
                "cannot find {element_type} named {name} in directory {directory_name}"
            );
        } else {
            assert!(
                found.is_none(),
                "{element_type} named {name} already exists in directory {directory_name}"
            );
        }
        found
    }

    pub async fn get_element_from(
        &mut self,
        name: &str,
        element_type: &str,
        directory_name: &str,
    ) -> String {
        self.element_exists(name, element_type, directory_name, true)
            .await
            .unwrap()
    }

    /// Polls the directory until the element shows up, up to the standard
    /// creation wait.
    pub async fn wait_for_element_creation(
        &self,
        dir_id: &str,
        element_type: &str,
        element_name: &str,
    ) -> Option<String> {
        let user = self.user_name();
        let directory = &self.clients().directory;
        info!(
            "wait for '{element_name}' {element_type} element creation in directory (max: {} sec)",
            MAX_WAITING_TIME_IN_SEC
        );
        poll_until(MAX_WAITING_TIME_IN_SEC, || async {
            directory
                .element_id(&user, dir_id, element_type, element_name)
                .await
                .ok()
                .flatten()
        })
        .await
    }

    pub async fn wait_for_case_creation(&mut self, case_name: &str, directory_name: &str) {
        let dir_id = self.ctx.directory_id(directory_name).to_string();
        let case_id = self
            .wait_for_element_creation(&dir_id, "CASE", case_name)
            .await
            .unwrap_or_else(|| panic!("case not created in directory with name {case_name}"));
        let case = &self.clients().case;
        info!(
            "wait for '{case_name}' case creation completion (max: {} sec)",
            MAX_WAITING_TIME_IN_SEC
        );
        let confirmed = poll_while_false(MAX_WAITING_TIME_IN_SEC, || async {
            case.exists(&case_id).await.unwrap_or(false)
        })
        .await;
        assert!(confirmed, "case full creation not confirmed");
        self.ctx.set_case(case_name, &case_id);
    }

    /// Registers a study alias, resolving its root network on the way.
    pub async fn register_study(&mut self, alias: &str, study_id: &str) {
        let root_networks = self
            .clients()
            .study
            .root_network_ids(study_id)
            .await
            .expect("cannot list the study root networks");
        if let Some(first) = root_networks.first() {
            self.ctx.set_current_root_network(first);
        }
        self.ctx.set_study(alias, study_id);
    }

    pub async fn wait_for_study_creation(
        &mut self,
        study_name: &str,
        directory_name: &str,
        timeout: u64,
    ) {
        let dir_id = self.ctx.directory_id(directory_name).to_string();
        let study_id = self
            .wait_for_element_creation(&dir_id, "STUDY", study_name)
            .await
            .unwrap_or_else(|| panic!("study not created in directory with name {study_name}"));
        let study = &self.clients().study;
        info!("wait for '{study_name}' study creation completion (max: {timeout} sec)");
        let confirmed = poll_while_false(timeout, || async {
            study.exists_study(&study_id).await && study.check_node_tree(&study_id).await
        })
        .await;
        assert!(confirmed, "study full creation not confirmed");
        self.register_study(study_name, &study_id).await;
    }

    /// Fires the study creation request under a directory-channel
    /// subscription and waits for the creation notifications.
    pub async fn create_study_from_case_notified(
        &mut self,
        study_name: &str,
        directory_name: &str,
        case_name: &str,
    ) {
        let dir_id = self.ctx.directory_id(directory_name).to_string();
        let case_id = self.ctx.case_id(case_name).to_string();
        let env = self.platform().clone();
        let user = self.user_name();
        let expected = self.ctx.int_parameter("study_creation_notifications", 2) as usize;
        let channel = directory_notification_url(&env).expect("bad notification channel url");
        let explore = self.clients().explore.clone();

        let matched_study = study_name.to_string();
        let matched_dir = dir_id.clone();
        notification::execute_and_wait(
            &env,
            channel,
            move |message| matches_study_creation(message, &matched_study, &matched_dir),
            expected,
            Duration::from_secs(MAX_WAITING_TIME_IN_SEC),
            || async {
                explore
                    .create_study_from_case(
                        study_name,
                        &case_id,
                        "STEP create_study_in_directory_from_case",
                        &dir_id,
                        &user,
                    )
                    .await
            },
        )
        .await
        .expect("study creation notifications not received");
    }

    /// Polls the computation status until it matches, case-insensitively.
    pub async fn wait_for_status_matching(
        &self,
        expected_status: &str,
        node_alias: &str,
        computation: Computation,
        timeout: u64,
    ) -> bool {
        let node = self.ctx.node(node_alias).clone();
        let study = &self.clients().study;
        info!(
            "wait for {} completion with status '{expected_status}' (max: {timeout} sec)",
            computation.name()
        );
        match computation {
            Computation::LoadFlow => {
                let root_network = self
                    .ctx
                    .current_root_network()
                    .expect("no root network resolved for the current study")
                    .to_string();
                poll_while_false(timeout, || async {
                    study
                        .loadflow_status(&node.study_id, &root_network, &node.node_id)
                        .await
                        .map(|status| status.eq_ignore_ascii_case(expected_status))
                        .unwrap_or(false)
                })
                .await
            }
            Computation::SecurityAnalysis => {
                poll_while_false(timeout, || async {
                    study
                        .security_analysis_status(&node.study_id, &node.node_id)
                        .await
                        .map(|status| status.eq_ignore_ascii_case(expected_status))
                        .unwrap_or(false)
                })
                .await
            }
        }
    }

    pub async fn search_equipment_as(
        &mut self,
        equipment_collection: &str,
        user_input: &str,
        node_alias: &str,
        alias: &str,
        field_selector: &str,
    ) {
        let equipment_type = if equipment_collection.is_empty() {
            None
        } else {
            Some(equipment_type_of(equipment_collection))
        };
        let node = self.ctx.node(node_alias).clone();
        let found = self
            .clients()
            .study
            .search_equipment(
                &node.study_id,
                &node.node_id,
                user_input,
                field_selector,
                false,
                equipment_type,
            )
            .await
            .expect("equipment search failed");
        self.ctx.set_json_data(alias, found);
    }

    pub async fn upsert_equipment(
        &mut self,
        equipment_collection: &str,
        node_alias: &str,
        resource_file_name: &str,
        creation: bool,
    ) {
        equipment_type_of(equipment_collection);
        let payload = resource_file_content(resource_file_name).unwrap_or_else(|e| panic!("{e}"));
        let node = self.ctx.node(node_alias).clone();
        self.clients()
            .study
            .upsert_equipment(
                &node.study_id,
                &node.node_id,
                equipment_collection,
                &payload,
                creation,
            )
            .await
            .expect("equipment upsert failed");
    }

    pub async fn delete_node_expecting(&mut self, node_alias: &str, expected_code: u16) {
        let node = self.ctx.node(node_alias).clone();
        let status = self
            .clients()
            .study
            .delete_node(&node.study_id, &node.node_id)
            .await
            .expect("node deletion request failed");
        assert_eq!(status, expected_code, "unexpected status deleting node {node_alias}");
    }

    pub async fn create_node_from(&mut self, new_node_name: &str, node_alias: &str, mode: &str) {
        let node = self.ctx.node(node_alias).clone();
        self.clients()
            .study
            .create_node(&node.study_id, &node.node_id, new_node_name, mode)
            .await
            .expect("node creation failed");
    }

    pub async fn create_filter_in(
        &mut self,
        filter_name: &str,
        directory_name: &str,
        filter_type: &str,
    ) {
        let dir_id = self.ctx.directory_id(directory_name).to_string();
        let user = self.user_name();
        self.clients()
            .explore
            .create_default_filter(
                filter_name,
                "STEP create_filter_in_directory",
                &dir_id,
                &user,
                filter_type,
            )
            .await
            .expect("filter creation failed");
        let filter_id = self
            .wait_for_element_creation(&dir_id, "FILTER", filter_name)
            .await
            .unwrap_or_else(|| panic!("filter not created in directory with name {filter_name}"));
        self.ctx.set_filter(filter_name, &filter_id);
    }

    /// Creates a default list, waits for it, then replaces its content with
    /// the resource file, the `<ID>` placeholder substituted with the real
    /// uuid.
    pub async fn create_form_contingency_list(
        &mut self,
        element_name: &str,
        directory_name: &str,
        resource_file_name: &str,
    ) {
        let dir_id = self.ctx.directory_id(directory_name).to_string();
        let user = self.user_name();
        self.clients()
            .explore
            .create_form_contingency_list(element_name, "225kV spanish lines", &dir_id, &user)
            .await
            .expect("contingency list creation failed");
        let list_id = self
            .wait_for_element_creation(&dir_id, "CONTINGENCY_LIST", element_name)
            .await
            .unwrap_or_else(|| {
                panic!("contingency list not created in directory with name {element_name}")
            });

        let content = resource_file_content(resource_file_name).unwrap_or_else(|e| panic!("{e}"));
        let content = content.replace("\"<ID>\"", &format!("\"{list_id}\""));
        let content: Value =
            serde_json::from_str(&content).expect("contingency list resource is not valid json");
        self.clients()
            .actions
            .update_form_contingency_list(&list_id, &content)
            .await
            .expect("contingency list update failed");
        self.ctx.set_contingency_list(element_name, &list_id);
    }

    pub fn values_equality(
        &self,
        left_alias: &str,
        right_alias: &str,
        format: &str,
        attrs: &str,
        expect_equal: bool,
    ) {
        let left = self.ctx.json_data(left_alias);
        let right = self.ctx.json_data(right_alias);
        let differing = differing_attributes(left, right, format, attrs);
        if expect_equal {
            assert!(
                differing.is_empty(),
                "'{left_alias}' and '{right_alias}' differ on {differing:?}"
            );
        } else {
            assert!(
                !differing.is_empty(),
                "'{left_alias}' and '{right_alias}' are equal on every checked attribute"
            );
        }
    }

    /// Reshapes the raw security-analysis result into the `N` (pre
    /// contingency violations) and `N-K` (post contingency results with
    /// violations) arrays the comparison steps work on.
    pub async fn security_analysis_result_as(&mut self, node_alias: &str, alias: &str) {
        let node = self.ctx.node(node_alias).clone();
        let result = self
            .clients()
            .study
            .security_analysis_result(&node.study_id, &node.node_id)
            .await
            .expect("cannot retrieve security-analysis result");

        let n = result
            .pointer("/preContingencyResult/limitViolationsResult/limitViolations")
            .filter(|v| v.as_array().is_some_and(|a| !a.is_empty()))
            .cloned()
            .unwrap_or_else(|| json!([]));
        let nk: Vec<Value> = result
            .get("postContingencyResults")
            .and_then(Value::as_array)
            .map(|results| {
                results
                    .iter()
                    .filter(|one| {
                        one.pointer("/limitViolationsResult/limitViolations")
                            .and_then(Value::as_array)
                            .is_some_and(|a| !a.is_empty())
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let data = json!({ "N": n, "N-K": nk });
        info!("security-analysis result data '{data}'");
        self.ctx.set_json_data(alias, data);
    }

    /// Exports the node network into a unique file, checks it, removes it.
    pub async fn export_network(&mut self, format: &str, node_alias: &str, file_name: &str) {
        let formats = self
            .clients()
            .study
            .export_formats()
            .await
            .expect("cannot list export formats");
        assert!(
            formats.to_string().contains(format),
            "format must be in {formats}"
        );
        let node = self.ctx.node(node_alias).clone();
        let out_path = PathBuf::from(format!("{file_name}_{}", Uuid::new_v4()));

        let checks = self
            .clients()
            .study
            .export_network(&node.study_id, &node.node_id, format, &out_path)
            .await
            .and_then(|()| {
                assert!(out_path.is_file(), "no export file found in {}", out_path.display());
                if format.eq_ignore_ascii_case("XIIDM") {
                    let head = read_file_head(&out_path, Some(2))?;
                    assert!(!head.is_empty(), "no export content in {}", out_path.display());
                    assert!(
                        head.contains("<iidm:network"),
                        "no IIDM XML tag found in {}",
                        out_path.display()
                    );
                }
                Ok(())
            });
        let _ = std::fs::remove_file(&out_path);
        checks.unwrap_or_else(|e| panic!("network export failed: {e}"));
    }

    /// Finds the import parameter carrying the extension list of the case
    /// format and keeps it under an alias.
    pub async fn fetch_case_extensions(&mut self, case_type: &str, case_name: &str, alias: &str) {
        let case_id = self.ctx.case_id(case_name).to_string();
        let parameters = self
            .clients()
            .network_conversion
            .import_parameters(&case_id)
            .await
            .expect("cannot fetch case import parameters");
        let key = extension_key(case_type);
        let extensions = parameters
            .get("parameters")
            .and_then(Value::as_array)
            .and_then(|list| {
                list.iter()
                    .find(|p| p.get("name").and_then(Value::as_str) == Some(key))
            })
            .cloned()
            .unwrap_or_else(|| panic!("no extension parameter '{key}' for case {case_name}"));
        self.ctx.set_case_extensions(alias, extensions);
    }

    /// Teardown: removes the scenario temporary directory, when one was
    /// allocated.
    pub async fn cleanup(&mut self) {
        let Some(dir_id) = self.ctx.take_tmp_root_dir_id() else {
            return;
        };
        if self.env.is_none() {
            return;
        }
        info!("removing scenario temporary dir");
        let user = self.user_name();
        if let Err(error) = self.clients().explore.remove_element(&dir_id, &user).await {
            warn!("could not remove scenario temporary dir: {error}");
        }
    }
}
