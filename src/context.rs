//! Per-scenario mutable state: alias tables mapping the short names used in
//! Gherkin phrases to the UUIDs handed out by the platform, plus cached JSON
//! fragments.
//!
//! The context lives inside the cucumber world, is created at scenario start
//! and dropped at scenario end; mutation is single-threaded. The invariant
//! is "an alias must be registered before use": getters panic with a clear
//! message, which cucumber reports as the scenario failure.

use std::collections::HashMap;

use serde_json::Value;

/// Pseudo-alias always tracking the most recently registered element of
/// each kind.
pub const CURRENT_ELEMENT: &str = "current";

/// Upper bound for directory-element creation waits.
pub const MAX_WAITING_TIME_IN_SEC: u64 = 180;
/// Upper bound for computation (loadflow, security analysis) waits.
pub const MAX_COMPUTATION_WAITING_TIME_IN_SEC: u64 = 300;

pub const LOADFLOW_PROVIDERS: [&str; 1] = ["OpenLoadFlow"];

pub const JSON_DATA_TYPES: [&str; 3] = ["array", "object", "value"];

/// Case-extension property key per case format.
const EXTENSION_KEYS: [(&str, &str); 2] = [
    ("CGMES", ""),
    ("XIIDM", "iidm.import.xml.included.extensions"),
];

/// network-map collection name → equipment type used by the modification
/// and search APIs.
const EQUIPMENT_TYPES: [(&str, &str); 11] = [
    ("substations", "SUBSTATION"),
    ("voltage-levels", "VOLTAGE_LEVEL"),
    ("lines", "LINE"),
    ("2-windings-transformers", "TWO_WINDINGS_TRANSFORMER"),
    ("generators", "GENERATOR"),
    ("loads", "LOAD"),
    ("batteries", "BATTERY"),
    ("shunt-compensators", "SHUNT_COMPENSATOR"),
    ("static-var-compensators", "STATIC_VAR_COMPENSATOR"),
    ("dangling-lines", "DANGLING_LINE"),
    ("hvdc-lines", "HVDC_LINE"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Computation {
    LoadFlow,
    SecurityAnalysis,
}

impl Computation {
    pub fn name(self) -> &'static str {
        match self {
            Computation::LoadFlow => "loadflow",
            Computation::SecurityAnalysis => "security-analysis",
        }
    }
}

/// A node of a study's modification tree, with the study owning it.
#[derive(Debug, Clone)]
pub struct NodeRef {
    pub node_id: String,
    pub study_id: String,
}

#[derive(Debug, Default)]
pub struct TestContext {
    directories: HashMap<String, String>,
    studies: HashMap<String, String>,
    cases: HashMap<String, String>,
    nodes: HashMap<String, NodeRef>,
    contingency_lists: HashMap<String, String>,
    filters: HashMap<String, String>,
    root_networks: HashMap<String, String>,
    json_data: HashMap<String, Value>,
    case_extensions: HashMap<String, Value>,
    int_parameters: HashMap<String, i64>,
    // scenario temp dir to remove at teardown
    tmp_root_dir_id: Option<String>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }

    // --- lookups (panic on unknown alias, failing the scenario) ----------

    pub fn directory_id(&self, name: &str) -> &str {
        lookup(&self.directories, name, "directory")
    }

    pub fn study_id(&self, name: &str) -> &str {
        lookup(&self.studies, name, "study")
    }

    pub fn case_id(&self, name: &str) -> &str {
        lookup(&self.cases, name, "case")
    }

    pub fn contingency_list_id(&self, name: &str) -> &str {
        lookup(&self.contingency_lists, name, "contingency-list")
    }

    pub fn filter_id(&self, name: &str) -> &str {
        lookup(&self.filters, name, "filter")
    }

    pub fn node(&self, name: &str) -> &NodeRef {
        self.nodes
            .get(name)
            .unwrap_or_else(|| panic!("no node {name}"))
    }

    pub fn json_data(&self, alias: &str) -> &Value {
        self.json_data
            .get(alias)
            .unwrap_or_else(|| panic!("no json data {alias}"))
    }

    pub fn case_extensions(&self, alias: &str) -> &Value {
        self.case_extensions
            .get(alias)
            .unwrap_or_else(|| panic!("no case extension data {alias}"))
    }

    /// Root network of the current study, when one has been resolved.
    pub fn current_root_network(&self) -> Option<&str> {
        self.root_networks.get(CURRENT_ELEMENT).map(String::as_str)
    }

    pub fn int_parameter(&self, name: &str, default: i64) -> i64 {
        self.int_parameters.get(name).copied().unwrap_or(default)
    }

    // --- registration -----------------------------------------------------

    pub fn set_directory(&mut self, alias: &str, uuid: &str) {
        set_current(&mut self.directories, alias, uuid.to_string());
    }

    pub fn set_study(&mut self, alias: &str, uuid: &str) {
        set_current(&mut self.studies, alias, uuid.to_string());
    }

    pub fn set_case(&mut self, alias: &str, uuid: &str) {
        set_current(&mut self.cases, alias, uuid.to_string());
    }

    pub fn set_contingency_list(&mut self, alias: &str, uuid: &str) {
        set_current(&mut self.contingency_lists, alias, uuid.to_string());
    }

    pub fn set_filter(&mut self, alias: &str, uuid: &str) {
        set_current(&mut self.filters, alias, uuid.to_string());
    }

    pub fn set_node(&mut self, alias: &str, node_id: &str, study_id: &str) {
        let node = NodeRef {
            node_id: node_id.to_string(),
            study_id: study_id.to_string(),
        };
        self.nodes.insert(CURRENT_ELEMENT.to_string(), node.clone());
        self.nodes.insert(alias.to_string(), node);
    }

    pub fn set_current_root_network(&mut self, uuid: &str) {
        self.root_networks
            .insert(CURRENT_ELEMENT.to_string(), uuid.to_string());
    }

    pub fn set_json_data(&mut self, alias: &str, data: Value) {
        self.json_data.insert(alias.to_string(), data);
    }

    pub fn set_case_extensions(&mut self, alias: &str, data: Value) {
        self.case_extensions.insert(alias.to_string(), data);
    }

    pub fn set_int_parameter(&mut self, name: &str, value: i64) {
        self.int_parameters.insert(name.to_string(), value);
    }

    pub fn set_tmp_root_dir_id(&mut self, dir_id: &str) {
        self.tmp_root_dir_id = Some(dir_id.to_string());
    }

    /// Hands the scenario temp dir over for removal at teardown.
    pub fn take_tmp_root_dir_id(&mut self) -> Option<String> {
        self.tmp_root_dir_id.take()
    }
}

fn lookup<'a>(map: &'a HashMap<String, String>, name: &str, kind: &str) -> &'a str {
    map.get(name)
        .unwrap_or_else(|| panic!("no {kind} {name}"))
}

fn set_current(map: &mut HashMap<String, String>, alias: &str, uuid: String) {
    map.insert(CURRENT_ELEMENT.to_string(), uuid.clone());
    map.insert(alias.to_string(), uuid);
}

/// Import-parameter key carrying the extension list of a case format.
pub fn extension_key(case_type: &str) -> &'static str {
    EXTENSION_KEYS
        .iter()
        .find(|(format, _)| *format == case_type)
        .map(|(_, key)| *key)
        .unwrap_or_else(|| {
            let known: Vec<&str> = EXTENSION_KEYS.iter().map(|(f, _)| *f).collect();
            panic!("extension key must be in {known:?}")
        })
}

/// Validates a network-map collection name and returns the matching
/// equipment type used by the modification/search APIs.
pub fn equipment_type_of(equipment_collection: &str) -> &'static str {
    EQUIPMENT_TYPES
        .iter()
        .find(|(collection, _)| *collection == equipment_collection)
        .map(|(_, kind)| *kind)
        .unwrap_or_else(|| {
            let known: Vec<&str> = EQUIPMENT_TYPES.iter().map(|(c, _)| *c).collect();
            panic!("equipment type must be in {known:?}")
        })
}
