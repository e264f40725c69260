//! Data-file lookup and JSON extraction/comparison helpers used by the
//! step definitions.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{BddError, Result};

/// Resolves a data file under `$BDD_DATA_DIR/<sub_dir>`.
pub fn bdd_data_file(sub_dir: &str, file_name: &str) -> Result<PathBuf> {
    let data_dir = std::env::var("BDD_DATA_DIR")
        .map_err(|_| BddError::Config("cannot find system variable BDD_DATA_DIR".into()))?;
    if data_dir.is_empty() {
        return Err(BddError::Config("system variable BDD_DATA_DIR is empty".into()));
    }
    let dir = PathBuf::from(data_dir).join(sub_dir);
    if !dir.is_dir() {
        return Err(BddError::Config(format!(
            "cannot find subdir named {}",
            dir.display()
        )));
    }
    let file = dir.join(file_name);
    if !file.is_file() {
        return Err(BddError::Config(format!(
            "cannot find file named {}",
            file.display()
        )));
    }
    Ok(file)
}

/// Resolves a file under the crate `resources/` directory.
pub fn resource_file(resource_file_name: &str) -> Result<PathBuf> {
    let file = Path::new(crate::env::RESOURCES_DIR).join(resource_file_name);
    if !file.is_file() {
        return Err(BddError::Config(format!(
            "cannot find resource file named {}",
            file.display()
        )));
    }
    Ok(file)
}

pub fn resource_file_content(resource_file_name: &str) -> Result<String> {
    let path = resource_file(resource_file_name)?;
    let content = fs::read_to_string(&path)?;
    if content.is_empty() {
        return Err(BddError::Config(format!(
            "cannot read content from resource file named {}",
            path.display()
        )));
    }
    Ok(content)
}

/// Reads up to `nb_lines` lines of a file (all of it when `None`).
pub fn read_file_head(file_path: &Path, nb_lines: Option<usize>) -> Result<String> {
    let reader = BufReader::new(fs::File::open(file_path)?);
    let mut content = String::new();
    for (count, line) in reader.lines().enumerate() {
        if nb_lines.is_some_and(|max| count >= max) {
            break;
        }
        content.push_str(&line?);
        content.push('\n');
    }
    Ok(content)
}

/// Turns a dotted attribute path (`a.b.c`) into a JSON pointer (`/a/b/c`).
pub fn attr_pointer(attr: &str) -> String {
    format!("/{}", attr.replace('.', "/"))
}

/// Looks an attribute up in a JSON document, dotted paths descending.
pub fn lookup_value<'a>(root: &'a Value, attr: &str) -> Option<&'a Value> {
    root.pointer(&attr_pointer(attr))
}

/// Renders a JSON scalar either verbatim (`exact`) or as a decimal rounded
/// to the number of fraction digits of a `0.00`-style pattern.
pub fn format_scalar(value: &Value, format: &str) -> String {
    if format.eq_ignore_ascii_case("exact") {
        return match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    let decimals = format.split('.').nth(1).map_or(0, str::len);
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    };
    format!("{number:.decimals$}")
}

/// Compares two documents attribute by attribute. `attrs` is either `all`
/// (every top-level key of the first document) or a comma-separated list of
/// dotted paths. Returns the attributes whose rendered values differ.
pub fn differing_attributes(left: &Value, right: &Value, format: &str, attrs: &str) -> Vec<String> {
    let attr_list: Vec<String> = if attrs.eq_ignore_ascii_case("all") {
        left.as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    } else {
        attrs.split(',').map(|a| a.trim().to_string()).collect()
    };

    attr_list
        .into_iter()
        .filter(|attr| {
            let lhs = lookup_value(left, attr).map(|v| format_scalar(v, format));
            let rhs = lookup_value(right, attr).map(|v| format_scalar(v, format));
            lhs != rhs
        })
        .collect()
}

/// Checks an expected-values table against a document. The table follows
/// the `| keyname | keyvalue |` convention: a header row then one row per
/// dotted attribute path; a headerless table is refused. Returns one
/// message per mismatching row.
pub fn table_mismatches(root: &Value, rows: &[Vec<String>], format: &str) -> Vec<String> {
    assert!(
        rows.len() >= 2,
        "expected-values table needs a header row and at least one data row"
    );
    let mut mismatches = Vec::new();
    for row in rows.iter().skip(1) {
        let key = &row[0];
        let expected = &row[1];
        match lookup_value(root, key).map(|v| format_scalar(v, format)) {
            Some(actual) if &actual == expected => {}
            Some(actual) => mismatches.push(format!("{key}: expected '{expected}', got '{actual}'")),
            None => mismatches.push(format!("{key}: not found")),
        }
    }
    mismatches
}

// --- security-analysis result scanning -----------------------------------

fn text<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key).and_then(Value::as_str)
}

fn matches_violation(violation: &Value, subject_id: &str, side: Option<&str>, limit_type: &str) -> bool {
    text(violation, "subjectId").is_some_and(|s| s.eq_ignore_ascii_case(subject_id))
        && side.map_or(true, |side| {
            text(violation, "side").is_some_and(|s| s.eq_ignore_ascii_case(side))
        })
        && text(violation, "limitType").is_some_and(|t| t.eq_ignore_ascii_case(limit_type))
}

/// Attribute of the last matching entry of a pre-contingency (`N`)
/// violations array.
pub fn value_from_violations(
    violations: &Value,
    subject_id: &str,
    side: Option<&str>,
    limit_type: &str,
    attribute: &str,
) -> Option<String> {
    let mut result = None;
    for violation in violations.as_array()?.iter() {
        if matches_violation(violation, subject_id, side, limit_type)
            && violation.get(attribute).is_some()
        {
            result = Some(render(violation.get(attribute)?));
        }
    }
    result
}

/// Same lookup inside `subjectLimitViolations` entries, where the violation
/// body is nested under `limitViolation`.
pub fn value_from_contingency_violations(
    entries: &Value,
    subject_id: &str,
    side: Option<&str>,
    limit_type: &str,
    attribute: &str,
) -> Option<String> {
    let mut result = None;
    for entry in entries.as_array()?.iter() {
        let Some(limit_violation) = entry.get("limitViolation") else {
            continue;
        };
        if text(entry, "subjectId").is_some_and(|s| s.eq_ignore_ascii_case(subject_id))
            && side.map_or(true, |side| {
                text(limit_violation, "side").is_some_and(|s| s.eq_ignore_ascii_case(side))
            })
            && text(limit_violation, "limitType").is_some_and(|t| t.eq_ignore_ascii_case(limit_type))
            && limit_violation.get(attribute).is_some()
        {
            result = Some(render(limit_violation.get(attribute)?));
        }
    }
    result
}

/// Lookup keyed by contingency id, violation body under `limitViolation`.
pub fn value_from_limit_violation_contingencies(
    entries: &Value,
    contingency_id: &str,
    side: Option<&str>,
    limit_type: &str,
    attribute: &str,
) -> Option<String> {
    let mut result = None;
    for entry in entries.as_array()?.iter() {
        let (Some(limit_violation), Some(contingency)) =
            (entry.get("limitViolation"), entry.get("contingency"))
        else {
            continue;
        };
        if text(contingency, "contingencyId").is_some_and(|c| c.eq_ignore_ascii_case(contingency_id))
            && side.map_or(true, |side| {
                text(limit_violation, "side").is_some_and(|s| s.eq_ignore_ascii_case(side))
            })
            && text(limit_violation, "limitType").is_some_and(|t| t.eq_ignore_ascii_case(limit_type))
            && limit_violation.get(attribute).is_some()
        {
            result = Some(render(limit_violation.get(attribute)?));
        }
    }
    result
}

pub fn exists_in_violations(violations: &Value, subject_id: &str, side: &str, limit_type: &str) -> bool {
    violations
        .as_array()
        .is_some_and(|array| {
            array
                .iter()
                .any(|v| matches_violation(v, subject_id, Some(side), limit_type))
        })
}

/// `subjectLimitViolations` array of the post-contingency result matching a
/// contingency id.
pub fn contingency_violations<'a>(results: &'a Value, contingency_id: &str) -> Option<&'a Value> {
    results.as_array()?.iter().find_map(|entry| {
        let contingency = entry.get("contingency")?;
        (text(contingency, "contingencyId")?.eq_ignore_ascii_case(contingency_id))
            .then(|| entry.get("subjectLimitViolations"))
            .flatten()
            .filter(|v| v.is_array())
    })
}

/// `contingencies` array of the limit-violation entry matching a subject id.
pub fn limit_violation_contingencies<'a>(results: &'a Value, subject_id: &str) -> Option<&'a Value> {
    results.as_array()?.iter().find_map(|entry| {
        (text(entry, "subjectId")?.eq_ignore_ascii_case(subject_id))
            .then(|| entry.get("contingencies"))
            .flatten()
            .filter(|v| v.is_array())
    })
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
