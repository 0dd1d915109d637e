//! Template files used to simulate cluster loads.
//!
//! A template is a JSON document whose `addResources` array lists the
//! resources of one cluster. Uids in the template refer to `local-cluster`;
//! each simulated cluster gets its own copy with the name substituted.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::TEMPLATE_CLUSTER;
use crate::storage::{Properties, Record};

#[derive(Debug, Clone, Deserialize)]
struct TemplateResource {
    uid: String,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Clone, Deserialize)]
struct TemplateFile {
    #[serde(rename = "addResources", default)]
    add_resources: Vec<TemplateResource>,
}

/// Resources of one cluster, ready to be stamped out per cluster.
#[derive(Debug, Clone)]
pub struct Template {
    resources: Vec<TemplateResource>,
}

impl Template {
    /// Reads and parses a template file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Failed to parse template {}", path.display()))
    }

    /// Parses template JSON. Keys other than `addResources` are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let file: TemplateFile = serde_json::from_str(raw)?;
        Ok(Template {
            resources: file.add_resources,
        })
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Builds the records of one simulated cluster.
    pub fn records_for_cluster(&self, cluster: &str) -> Vec<Record> {
        self.resources
            .iter()
            .map(|resource| {
                let name = resource
                    .properties
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Record {
                    uid: resource.uid.replacen(TEMPLATE_CLUSTER, cluster, 1),
                    cluster: cluster.to_string(),
                    name,
                    properties: resource.properties.clone(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const TEMPLATE: &str = r#"{
        "addResources": [
            {"uid": "local-cluster/pod-1", "properties": {"kind": "Pod", "name": "web-0"}},
            {"uid": "local-cluster/ns-1", "properties": {"kind": "Namespace"}},
            {"uid": "global/node-1"},
            {"uid": "local-cluster/local-cluster-config"}
        ],
        "addEdges": []
    }"#;

    #[test]
    fn test_records_for_cluster_substitutes_name() {
        let template = Template::parse(TEMPLATE).expect("parse");
        assert_eq!(template.len(), 4);

        let records = template.records_for_cluster("cluster-7");
        assert_eq!(records[0].uid, "cluster-7/pod-1");
        assert_eq!(records[0].cluster, "cluster-7");
        assert_eq!(records[0].name, "web-0");
        assert_eq!(records[0].properties.get("kind"), Some(&json!("Pod")));

        assert_eq!(records[1].name, "");
        assert_eq!(records[2].uid, "global/node-1");
        assert!(records[2].properties.is_empty());
        // Only the cluster prefix is substituted
        assert_eq!(records[3].uid, "cluster-7/local-cluster-config");
    }

    #[test]
    fn test_missing_resources_is_empty_template() {
        let template = Template::parse("{}").expect("parse");
        assert!(template.is_empty());
        assert!(template.records_for_cluster("c0").is_empty());
    }

    #[test]
    fn test_malformed_template_is_an_error() {
        assert!(Template::parse(r#"{"addResources": [{"properties": {}}]}"#).is_err());
        assert!(Template::parse("not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(TEMPLATE.as_bytes()).expect("write");
        let template = Template::load(file.path()).expect("load");
        assert_eq!(template.len(), 4);

        let missing = Template::load(Path::new("/nonexistent/template.json"));
        let message = format!("{:#}", missing.unwrap_err());
        assert!(message.contains("Failed to read template"), "{}", message);
    }
}
