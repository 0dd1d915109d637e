// storage/models.rs
// Record model submitted to the pipeline

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Property bag of a record. Ordered so that encoding is deterministic.
pub type Properties = BTreeMap<String, serde_json::Value>;

/// One logical entity to persist.
///
/// `uid` addresses the row; submitting the same uid again updates it.
/// `name` is carried for producers and logs but is not a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub uid: String,
    pub cluster: String,
    pub name: String,
    pub properties: Properties,
}

impl Record {
    pub fn new(
        uid: impl Into<String>,
        cluster: impl Into<String>,
        name: impl Into<String>,
        properties: Properties,
    ) -> Self {
        Record {
            uid: uid.into(),
            cluster: cluster.into(),
            name: name.into(),
            properties,
        }
    }
}
