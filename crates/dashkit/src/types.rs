//! Core types for dashboard deployment

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::state::{ResourceKind, StateKey};

/// Normalized reference for one artifact group (one dashboard).
///
/// Derived from a two-level folder path as `"{category}_{subcategory}"`,
/// lower-cased. Every state key of the group is namespaced by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupRef(String);

impl GroupRef {
    /// Build a reference from the category and subcategory folder names.
    pub fn from_folders(category: &str, subcategory: &str) -> Self {
        Self(format!("{category}_{subcategory}").to_lowercase())
    }

    /// The reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// State key holding this group's dashboard id.
    pub fn dashboard_key(&self) -> StateKey {
        StateKey::new(self.0.clone(), ResourceKind::Dashboard)
    }
}

impl From<&str> for GroupRef {
    fn from(value: &str) -> Self {
        Self(value.to_lowercase())
    }
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned by the remote service.
///
/// Older state blobs may carry numeric ids, so both JSON strings and numbers
/// are accepted on decode; ids are always written back as strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wrap a remote id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One desired query, parsed from a definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefinition {
    /// Group the query belongs to.
    pub group: GroupRef,
    /// File name, unique within the group.
    pub name: String,
    /// Query text (after the optional text transform).
    pub query_text: String,
    /// Attributes from the `-- viz ` magic comment.
    pub viz_attrs: HashMap<String, String>,
    /// Attributes from the `-- widget ` magic comment.
    pub widget_attrs: HashMap<String, String>,
}

impl QueryDefinition {
    fn key(&self, kind: ResourceKind) -> StateKey {
        StateKey::new(format!("{}_{}", self.group, self.name), kind)
    }

    /// `"{group}_{name}:query_id"`
    pub fn query_key(&self) -> StateKey {
        self.key(ResourceKind::Query)
    }

    /// `"{group}_{name}:viz_id"`
    pub fn viz_key(&self) -> StateKey {
        self.key(ResourceKind::Visualization)
    }

    /// `"{group}_{name}:widget_id"`
    pub fn widget_key(&self) -> StateKey {
        self.key(ResourceKind::Widget)
    }

    /// Declared visualization type, if any.
    pub fn viz_type(&self) -> Option<&str> {
        self.viz_attrs.get("type").map(String::as_str)
    }

    /// Visualization attributes without the `type` field.
    pub fn viz_args(&self) -> HashMap<&str, &str> {
        self.viz_attrs
            .iter()
            .filter(|(k, _)| k.as_str() != "type")
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// All desired queries for one dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactGroup {
    /// Group reference.
    pub reference: GroupRef,
    /// Remote dashboard display name.
    pub dashboard_name: String,
    /// Queries in enumeration order.
    pub queries: Vec<QueryDefinition>,
}

impl ArtifactGroup {
    /// Every state key this group expects to own after a run.
    pub fn desired_keys(&self) -> Vec<StateKey> {
        let mut keys = Vec::with_capacity(1 + self.queries.len() * 3);
        keys.push(self.reference.dashboard_key());
        for query in &self.queries {
            keys.push(query.query_key());
            keys.push(query.viz_key());
            keys.push(query.widget_key());
        }
        keys
    }
}

/// Kinds of objects that carry access control lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Dashboards,
    Queries,
}

impl ObjectType {
    /// Path segment used by the permissions API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboards => "dashboards",
            Self::Queries => "queries",
        }
    }
}

/// Permission levels granted to the default principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    CanView,
    CanRun,
}

/// One access control entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    pub group_name: String,
    pub permission_level: PermissionLevel,
}

/// Compute endpoint to data source mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    #[serde(default)]
    pub warehouse_id: String,
}

/// Counts of remote changes made by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySummary {
    pub dashboards_created: usize,
    pub queries_created: usize,
    pub queries_updated: usize,
    pub visualizations_created: usize,
    pub visualizations_updated: usize,
    pub widgets_created: usize,
    pub widgets_cleared: usize,
    pub orphans_deleted: usize,
    pub orphans_failed: usize,
}

impl DeploySummary {
    /// Number of create calls issued.
    pub fn created(&self) -> usize {
        self.dashboards_created
            + self.queries_created
            + self.visualizations_created
            + self.widgets_created
    }

    /// Number of update calls issued.
    pub fn updated(&self) -> usize {
        self.queries_updated + self.visualizations_updated
    }
}

/// Outcome of a full reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    /// Dashboard id per group.
    pub dashboards: BTreeMap<GroupRef, ResourceId>,
    /// Change counters.
    pub summary: DeploySummary,
}
