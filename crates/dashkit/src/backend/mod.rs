//! Capability traits for the remote service, plus an in-memory fake.
//!
//! The reconciler never talks to a concrete client. It consumes two narrow
//! traits:
//!
//! - [`ResourceClient`]: create/update/delete/get for dashboards, queries,
//!   visualizations and widgets, permission grants, and the listing of
//!   compute endpoints and their data sources.
//! - [`Workspace`]: download/upload of the state blob and folder management.
//!
//! [`rest::RestBackend`] implements both over HTTP. [`MockBackend`] implements
//! both in memory and records every call, for tests:
//!
//! ```
//! use dashkit::backend::{Call, MockBackend, Workspace};
//!
//! let mock = MockBackend::new();
//! mock.mkdirs("/dashboards").unwrap();
//! assert!(mock.calls().contains(&Call::Mkdirs("/dashboards".to_string())));
//! ```

pub mod rest;

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{Error, Result};
use crate::types::{AccessControl, DataSource, ObjectType, ResourceId};
use crate::viz::VizSpec;
use crate::widget::WidgetOptions;

// ============================================================================
// Payloads
// ============================================================================

/// Identity objects run as. Everything is deployed to run as the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunAsRole {
    Viewer,
}

/// Body of a query create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewQuery<'a> {
    pub parent: &'a str,
    pub run_as_role: RunAsRole,
    pub data_source_id: &'a str,
    pub name: &'a str,
    pub query: &'a str,
}

/// Body of a query update call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryUpdate<'a> {
    pub data_source_id: &'a str,
    pub name: &'a str,
    pub query: &'a str,
}

/// Widget reference as listed on a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WidgetRef {
    pub id: ResourceId,
}

/// Dashboard as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Dashboard {
    pub id: ResourceId,
    #[serde(default)]
    pub widgets: Vec<WidgetRef>,
}

/// Query as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteQuery {
    pub id: ResourceId,
    #[serde(default)]
    pub name: String,
}

/// Compute endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Warehouse {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Workspace object metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectInfo {
    pub object_id: i64,
    #[serde(default)]
    pub path: String,
}

// ============================================================================
// Traits
// ============================================================================

/// Remote operations on dashboard resources.
pub trait ResourceClient {
    /// Create a dashboard under `parent`, returning its id.
    fn create_dashboard(
        &self,
        name: &str,
        run_as_role: RunAsRole,
        parent: &str,
    ) -> Result<ResourceId>;

    /// Fetch a dashboard with its widgets.
    fn get_dashboard(&self, id: &ResourceId) -> Result<Dashboard>;

    /// Create a query, returning its id.
    fn create_query(&self, query: &NewQuery<'_>) -> Result<ResourceId>;

    /// Update a query in place.
    fn update_query(&self, id: &ResourceId, update: &QueryUpdate<'_>) -> Result<()>;

    fn delete_query(&self, id: &ResourceId) -> Result<()>;

    /// Fetch a query; used as a liveness check.
    fn get_query(&self, id: &ResourceId) -> Result<RemoteQuery>;

    /// Create a visualization on a query, returning its id.
    fn create_visualization(&self, query_id: &ResourceId, spec: &VizSpec) -> Result<ResourceId>;

    fn update_visualization(&self, id: &ResourceId, spec: &VizSpec) -> Result<()>;

    fn delete_visualization(&self, id: &ResourceId) -> Result<()>;

    /// Attach a visualization to a dashboard, returning the widget id.
    fn create_widget(
        &self,
        dashboard_id: &ResourceId,
        options: &WidgetOptions,
        width: u32,
        visualization_id: &ResourceId,
    ) -> Result<ResourceId>;

    fn delete_widget(&self, id: &ResourceId) -> Result<()>;

    /// Replace the access control list of an object.
    fn set_permissions(
        &self,
        object_type: ObjectType,
        id: &ResourceId,
        acl: &[AccessControl],
    ) -> Result<()>;

    /// Data sources with the compute endpoint each one runs on.
    fn list_data_sources(&self) -> Result<Vec<DataSource>>;

    /// Available compute endpoints.
    fn list_warehouses(&self) -> Result<Vec<Warehouse>>;
}

/// Remote file storage for the state blob.
pub trait Workspace {
    /// Download a file; a missing file is a not-found error.
    fn download(&self, path: &str) -> Result<Vec<u8>>;

    fn upload(&self, path: &str, content: &[u8], overwrite: bool) -> Result<()>;

    /// Create a folder and its parents.
    fn mkdirs(&self, path: &str) -> Result<()>;

    fn get_status(&self, path: &str) -> Result<ObjectInfo>;
}

// ============================================================================
// In-memory fake
// ============================================================================

/// One recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Download(String),
    Upload(String),
    Mkdirs(String),
    GetStatus(String),
    CreateDashboard(String),
    GetDashboard(ResourceId),
    SetPermissions(ObjectType, ResourceId),
    CreateQuery(String),
    UpdateQuery(ResourceId),
    DeleteQuery(ResourceId),
    GetQuery(ResourceId),
    CreateVisualization(ResourceId),
    UpdateVisualization(ResourceId),
    DeleteVisualization(ResourceId),
    CreateWidget {
        dashboard: ResourceId,
        visualization: ResourceId,
        row: u32,
    },
    DeleteWidget(ResourceId),
    ListDataSources,
    ListWarehouses,
}

impl Call {
    /// Whether the call creates a remote object.
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Call::CreateDashboard(_)
                | Call::CreateQuery(_)
                | Call::CreateVisualization(_)
                | Call::CreateWidget { .. }
        )
    }

    /// Whether the call updates a remote object in place.
    pub fn is_update(&self) -> bool {
        matches!(self, Call::UpdateQuery(_) | Call::UpdateVisualization(_))
    }

    /// Whether the call deletes a remote object.
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            Call::DeleteQuery(_) | Call::DeleteVisualization(_) | Call::DeleteWidget(_)
        )
    }
}

/// Stored query in the fake service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredQuery {
    pub name: String,
    pub text: String,
    pub data_source_id: String,
}

/// Stored widget in the fake service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredWidget {
    pub dashboard: ResourceId,
    pub visualization: ResourceId,
    pub options: WidgetOptions,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<String, Vec<u8>>,
    folders: HashMap<String, i64>,
    dashboards: BTreeMap<ResourceId, String>,
    queries: BTreeMap<ResourceId, StoredQuery>,
    visualizations: BTreeMap<ResourceId, (ResourceId, VizSpec)>,
    widgets: BTreeMap<ResourceId, StoredWidget>,
    permissions: Vec<(ObjectType, ResourceId, Vec<AccessControl>)>,
    data_sources: Vec<DataSource>,
    warehouses: Vec<Warehouse>,
    download_error: Option<String>,
    failing: HashSet<&'static str>,
    next_id: u64,
    calls: Vec<Call>,
}

impl Inner {
    fn id(&mut self, prefix: &str) -> ResourceId {
        self.next_id += 1;
        ResourceId::new(format!("{prefix}-{}", self.next_id))
    }

    fn folder(&mut self, path: &str) -> i64 {
        let next = i64::try_from(self.folders.len()).unwrap_or(i64::MAX) + 100;
        *self.folders.entry(path.trim_end_matches('/').to_string()).or_insert(next)
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.failing.contains(operation) {
            return Err(Error::api(
                "INTERNAL_ERROR",
                format!("{operation} failed"),
                Some(500),
            ));
        }
        Ok(())
    }
}

/// In-memory implementation of both capability traits.
///
/// Starts with one warehouse (`wh-1`) served by data source `ds-1`.
#[derive(Debug)]
pub struct MockBackend {
    inner: RefCell<Inner>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a fake service with one warehouse.
    #[must_use]
    pub fn new() -> Self {
        let inner = Inner {
            data_sources: vec![DataSource {
                id: "ds-1".to_string(),
                warehouse_id: "wh-1".to_string(),
            }],
            warehouses: vec![Warehouse {
                id: "wh-1".to_string(),
                name: "Starter Warehouse".to_string(),
            }],
            ..Inner::default()
        };
        Self {
            inner: RefCell::new(inner),
        }
    }

    /// Create a fake service with no warehouses at all.
    #[must_use]
    pub fn without_warehouses() -> Self {
        let mock = Self::new();
        {
            let mut inner = mock.inner.borrow_mut();
            inner.data_sources.clear();
            inner.warehouses.clear();
        }
        mock
    }

    /// Register an additional warehouse and its data source.
    pub fn add_warehouse(&self, warehouse_id: &str, data_source_id: &str) {
        let mut inner = self.inner.borrow_mut();
        inner.warehouses.push(Warehouse {
            id: warehouse_id.to_string(),
            name: warehouse_id.to_string(),
        });
        inner.data_sources.push(DataSource {
            id: data_source_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
        });
    }

    /// Store a file (and its folder) without recording a call.
    pub fn put_file(&self, path: &str, content: &[u8]) {
        let mut inner = self.inner.borrow_mut();
        if let Some((folder, _)) = path.rsplit_once('/') {
            inner.folder(folder);
        }
        inner.files.insert(path.to_string(), content.to_vec());
    }

    /// Contents of a stored file.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.borrow().files.get(path).cloned()
    }

    /// Make every download fail with the given error code.
    pub fn fail_downloads(&self, error_code: &str) {
        self.inner.borrow_mut().download_error = Some(error_code.to_string());
    }

    /// Make every call of one operation fail (e.g. `"create_widget"`).
    pub fn fail_operation(&self, operation: &'static str) {
        self.inner.borrow_mut().failing.insert(operation);
    }

    /// Create a query directly, without recording a call.
    pub fn seed_query(&self, name: &str) -> ResourceId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.id("query");
        inner.queries.insert(
            id.clone(),
            StoredQuery {
                name: name.to_string(),
                text: String::new(),
                data_source_id: "ds-1".to_string(),
            },
        );
        id
    }

    /// Remove a query behind the reconciler's back, along with its
    /// visualizations, the way the service does.
    pub fn drop_query(&self, id: &ResourceId) {
        let mut inner = self.inner.borrow_mut();
        inner.queries.remove(id);
        inner.visualizations.retain(|_, (query_id, _)| query_id != id);
    }

    /// Every call recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.inner.borrow().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    pub fn query(&self, id: &ResourceId) -> Option<StoredQuery> {
        self.inner.borrow().queries.get(id).cloned()
    }

    /// Query and spec of a stored visualization.
    pub fn visualization(&self, id: &ResourceId) -> Option<(ResourceId, VizSpec)> {
        self.inner.borrow().visualizations.get(id).cloned()
    }

    pub fn widget(&self, id: &ResourceId) -> Option<StoredWidget> {
        self.inner.borrow().widgets.get(id).cloned()
    }

    /// Number of live objects per kind: (dashboards, queries, visualizations, widgets).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let inner = self.inner.borrow();
        (
            inner.dashboards.len(),
            inner.queries.len(),
            inner.visualizations.len(),
            inner.widgets.len(),
        )
    }

    /// Grants recorded for an object.
    pub fn permissions(&self, id: &ResourceId) -> Vec<AccessControl> {
        self.inner
            .borrow()
            .permissions
            .iter()
            .filter(|(_, object, _)| object == id)
            .flat_map(|(_, _, acl)| acl.clone())
            .collect()
    }

    fn record(&self, call: Call) {
        self.inner.borrow_mut().calls.push(call);
    }
}

impl ResourceClient for MockBackend {
    fn create_dashboard(
        &self,
        name: &str,
        _run_as_role: RunAsRole,
        _parent: &str,
    ) -> Result<ResourceId> {
        self.record(Call::CreateDashboard(name.to_string()));
        let mut inner = self.inner.borrow_mut();
        inner.check("create_dashboard")?;
        let id = inner.id("dash");
        inner.dashboards.insert(id.clone(), name.to_string());
        Ok(id)
    }

    fn get_dashboard(&self, id: &ResourceId) -> Result<Dashboard> {
        self.record(Call::GetDashboard(id.clone()));
        let inner = self.inner.borrow();
        if !inner.dashboards.contains_key(id) {
            return Err(Error::not_found(format!("dashboard {id}")));
        }
        let widgets = inner
            .widgets
            .iter()
            .filter(|(_, w)| &w.dashboard == id)
            .map(|(wid, _)| WidgetRef { id: wid.clone() })
            .collect();
        Ok(Dashboard {
            id: id.clone(),
            widgets,
        })
    }

    fn create_query(&self, query: &NewQuery<'_>) -> Result<ResourceId> {
        self.record(Call::CreateQuery(query.name.to_string()));
        let mut inner = self.inner.borrow_mut();
        inner.check("create_query")?;
        let id = inner.id("query");
        inner.queries.insert(
            id.clone(),
            StoredQuery {
                name: query.name.to_string(),
                text: query.query.to_string(),
                data_source_id: query.data_source_id.to_string(),
            },
        );
        Ok(id)
    }

    fn update_query(&self, id: &ResourceId, update: &QueryUpdate<'_>) -> Result<()> {
        self.record(Call::UpdateQuery(id.clone()));
        let mut inner = self.inner.borrow_mut();
        inner.check("update_query")?;
        let stored = inner
            .queries
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("query {id}")))?;
        stored.name = update.name.to_string();
        stored.text = update.query.to_string();
        stored.data_source_id = update.data_source_id.to_string();
        Ok(())
    }

    fn delete_query(&self, id: &ResourceId) -> Result<()> {
        self.record(Call::DeleteQuery(id.clone()));
        self.inner
            .borrow_mut()
            .queries
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("query {id}")))
    }

    fn get_query(&self, id: &ResourceId) -> Result<RemoteQuery> {
        self.record(Call::GetQuery(id.clone()));
        self.inner
            .borrow()
            .queries
            .get(id)
            .map(|q| RemoteQuery {
                id: id.clone(),
                name: q.name.clone(),
            })
            .ok_or_else(|| Error::not_found(format!("query {id}")))
    }

    fn create_visualization(&self, query_id: &ResourceId, spec: &VizSpec) -> Result<ResourceId> {
        self.record(Call::CreateVisualization(query_id.clone()));
        let mut inner = self.inner.borrow_mut();
        inner.check("create_visualization")?;
        if !inner.queries.contains_key(query_id) {
            return Err(Error::not_found(format!("query {query_id}")));
        }
        let id = inner.id("viz");
        inner
            .visualizations
            .insert(id.clone(), (query_id.clone(), spec.clone()));
        Ok(id)
    }

    fn update_visualization(&self, id: &ResourceId, spec: &VizSpec) -> Result<()> {
        self.record(Call::UpdateVisualization(id.clone()));
        let mut inner = self.inner.borrow_mut();
        inner.check("update_visualization")?;
        let stored = inner
            .visualizations
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("visualization {id}")))?;
        stored.1 = spec.clone();
        Ok(())
    }

    fn delete_visualization(&self, id: &ResourceId) -> Result<()> {
        self.record(Call::DeleteVisualization(id.clone()));
        self.inner
            .borrow_mut()
            .visualizations
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("visualization {id}")))
    }

    fn create_widget(
        &self,
        dashboard_id: &ResourceId,
        options: &WidgetOptions,
        _width: u32,
        visualization_id: &ResourceId,
    ) -> Result<ResourceId> {
        self.record(Call::CreateWidget {
            dashboard: dashboard_id.clone(),
            visualization: visualization_id.clone(),
            row: options.position.row,
        });
        let mut inner = self.inner.borrow_mut();
        inner.check("create_widget")?;
        if !inner.dashboards.contains_key(dashboard_id) {
            return Err(Error::not_found(format!("dashboard {dashboard_id}")));
        }
        if !inner.visualizations.contains_key(visualization_id) {
            return Err(Error::not_found(format!("visualization {visualization_id}")));
        }
        let id = inner.id("widget");
        inner.widgets.insert(
            id.clone(),
            StoredWidget {
                dashboard: dashboard_id.clone(),
                visualization: visualization_id.clone(),
                options: options.clone(),
            },
        );
        Ok(id)
    }

    fn delete_widget(&self, id: &ResourceId) -> Result<()> {
        self.record(Call::DeleteWidget(id.clone()));
        self.inner
            .borrow_mut()
            .widgets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("widget {id}")))
    }

    fn set_permissions(
        &self,
        object_type: ObjectType,
        id: &ResourceId,
        acl: &[AccessControl],
    ) -> Result<()> {
        self.record(Call::SetPermissions(object_type, id.clone()));
        let mut inner = self.inner.borrow_mut();
        inner.check("set_permissions")?;
        inner.permissions.push((object_type, id.clone(), acl.to_vec()));
        Ok(())
    }

    fn list_data_sources(&self) -> Result<Vec<DataSource>> {
        self.record(Call::ListDataSources);
        Ok(self.inner.borrow().data_sources.clone())
    }

    fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        self.record(Call::ListWarehouses);
        Ok(self.inner.borrow().warehouses.clone())
    }
}

impl Workspace for MockBackend {
    fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.record(Call::Download(path.to_string()));
        let inner = self.inner.borrow();
        if let Some(code) = &inner.download_error {
            return Err(Error::api(
                code.clone(),
                format!("cannot download {path}"),
                Some(500),
            ));
        }
        inner
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Path ({path})")))
    }

    fn upload(&self, path: &str, content: &[u8], overwrite: bool) -> Result<()> {
        self.record(Call::Upload(path.to_string()));
        let mut inner = self.inner.borrow_mut();
        inner.check("upload")?;
        if !overwrite && inner.files.contains_key(path) {
            return Err(Error::api(
                "RESOURCE_ALREADY_EXISTS",
                format!("{path} already exists"),
                Some(400),
            ));
        }
        inner.files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    fn mkdirs(&self, path: &str) -> Result<()> {
        self.record(Call::Mkdirs(path.to_string()));
        self.inner.borrow_mut().folder(path);
        Ok(())
    }

    fn get_status(&self, path: &str) -> Result<ObjectInfo> {
        self.record(Call::GetStatus(path.to_string()));
        let inner = self.inner.borrow();
        let key = path.trim_end_matches('/');
        inner
            .folders
            .get(key)
            .map(|object_id| ObjectInfo {
                object_id: *object_id,
                path: key.to_string(),
            })
            .ok_or_else(|| Error::not_found(format!("Path ({path})")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_ids_are_unique() {
        let mock = MockBackend::new();
        let a = mock.create_dashboard("A", RunAsRole::Viewer, "folders/1").unwrap();
        let b = mock.create_dashboard("B", RunAsRole::Viewer, "folders/1").unwrap();
        assert_ne!(a, b);
        assert_eq!(mock.counts().0, 2);
    }

    #[test]
    fn test_mock_get_status_requires_folder() {
        let mock = MockBackend::new();
        assert!(mock.get_status("/x").unwrap_err().is_not_found());
        mock.mkdirs("/x").unwrap();
        assert!(mock.get_status("/x").is_ok());
    }

    #[test]
    fn test_mock_download_missing_is_not_found() {
        let mock = MockBackend::new();
        assert!(mock.download("/x/state.json").unwrap_err().is_not_found());
        mock.put_file("/x/state.json", b"{}");
        assert_eq!(mock.download("/x/state.json").unwrap(), b"{}");
    }

    #[test]
    fn test_mock_failing_operation() {
        let mock = MockBackend::new();
        mock.fail_operation("create_dashboard");
        let err = mock
            .create_dashboard("A", RunAsRole::Viewer, "folders/1")
            .unwrap_err();
        assert_eq!(err.error_code(), Some("INTERNAL_ERROR"));
    }

    #[test]
    fn test_mock_drop_query_cascades() {
        let mock = MockBackend::new();
        let query = mock.seed_query("q");
        let definition = crate::types::QueryDefinition {
            group: crate::types::GroupRef::from("a_main"),
            name: "00_n.sql".to_string(),
            query_text: "SELECT 1 AS n".to_string(),
            viz_attrs: [("type", "counter"), ("name", "Count"), ("value_column", "n")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            widget_attrs: HashMap::new(),
        };
        let spec = crate::viz::build(&definition).unwrap();
        let viz = mock.create_visualization(&query, &spec).unwrap();
        assert_eq!(mock.visualization(&viz), Some((query.clone(), spec)));

        mock.drop_query(&query);
        assert!(mock.get_query(&query).unwrap_err().is_not_found());
        assert_eq!(mock.visualization(&viz), None);
    }

    #[test]
    fn test_call_classification() {
        assert!(Call::CreateQuery("q".to_string()).is_create());
        assert!(Call::UpdateVisualization(ResourceId::new("v")).is_update());
        assert!(Call::DeleteWidget(ResourceId::new("w")).is_delete());
        assert!(!Call::GetQuery(ResourceId::new("q")).is_create());
    }
}
