//! HTTP backend for the SQL dashboards and workspace APIs.
//!
//! Blocking, one request per call, bearer-token authentication. Non-2xx
//! responses are decoded into [`Error::Api`] so that "not found" can be told
//! apart from other failures.

use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ureq::Body;
use ureq::http::Response;

use crate::backend::{
    Dashboard, NewQuery, ObjectInfo, QueryUpdate, RemoteQuery, ResourceClient, RunAsRole,
    Warehouse, Workspace,
};
use crate::error::{Error, Result};
use crate::types::{AccessControl, DataSource, ObjectType, ResourceId};
use crate::viz::VizSpec;
use crate::widget::WidgetOptions;

const SQL_API: &str = "/api/2.0/preview/sql";
const WORKSPACE_API: &str = "/api/2.0/workspace";
const WAREHOUSES_API: &str = "/api/2.0/sql/warehouses";

/// Backend talking to a remote workspace over HTTPS.
pub struct RestBackend {
    agent: ureq::Agent,
    host: String,
    authorization: String,
}

impl RestBackend {
    /// Create a backend for `host` authenticated with a bearer token.
    pub fn new(host: impl Into<String>, token: &str) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            host: host.into().trim_end_matches('/').to_string(),
            authorization: format!("Bearer {token}"),
        }
    }

    /// Workspace host, without a trailing slash.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        log::trace!("GET {path}");
        let mut request = self
            .agent
            .get(&self.url(path))
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", "sqldash");
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let mut response = check(request.call()?)?;
        Ok(response.body_mut().read_json()?)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let mut response = self.send_post(path, body)?;
        Ok(response.body_mut().read_json()?)
    }

    fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        self.send_post(path, body).map(|_| ())
    }

    fn send_post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response<Body>> {
        log::trace!("POST {path}");
        let response = self
            .agent
            .post(&self.url(path))
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", "sqldash")
            .send_json(body)?;
        check(response)
    }

    fn delete(&self, path: &str) -> Result<()> {
        log::trace!("DELETE {path}");
        let response = self
            .agent
            .delete(&self.url(path))
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", "sqldash")
            .call()?;
        check(response).map(|_| ())
    }
}

/// Turn a non-2xx response into an error.
fn check(mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    let text = response.body_mut().read_to_string().unwrap_or_default();
    Err(match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) => Error::api(body.error_code, body.message, Some(code)),
        Err(_) => Error::Http {
            message: format!("HTTP {code}: {}", text.trim()),
            status: Some(code),
        },
    })
}

impl ResourceClient for RestBackend {
    fn create_dashboard(
        &self,
        name: &str,
        run_as_role: RunAsRole,
        parent: &str,
    ) -> Result<ResourceId> {
        let created: Created = self.post(
            &format!("{SQL_API}/dashboards"),
            &NewDashboard {
                name,
                run_as_role,
                parent,
            },
        )?;
        Ok(created.id)
    }

    fn get_dashboard(&self, id: &ResourceId) -> Result<Dashboard> {
        self.get(&format!("{SQL_API}/dashboards/{id}"), &[])
    }

    fn create_query(&self, query: &NewQuery<'_>) -> Result<ResourceId> {
        let created: Created = self.post(&format!("{SQL_API}/queries"), query)?;
        Ok(created.id)
    }

    fn update_query(&self, id: &ResourceId, update: &QueryUpdate<'_>) -> Result<()> {
        self.post_unit(&format!("{SQL_API}/queries/{id}"), update)
    }

    fn delete_query(&self, id: &ResourceId) -> Result<()> {
        self.delete(&format!("{SQL_API}/queries/{id}"))
    }

    fn get_query(&self, id: &ResourceId) -> Result<RemoteQuery> {
        self.get(&format!("{SQL_API}/queries/{id}"), &[])
    }

    fn create_visualization(&self, query_id: &ResourceId, spec: &VizSpec) -> Result<ResourceId> {
        let created: Created = self.post(
            &format!("{SQL_API}/visualizations"),
            &NewVisualization { query_id, spec },
        )?;
        Ok(created.id)
    }

    fn update_visualization(&self, id: &ResourceId, spec: &VizSpec) -> Result<()> {
        self.post_unit(&format!("{SQL_API}/visualizations/{id}"), spec)
    }

    fn delete_visualization(&self, id: &ResourceId) -> Result<()> {
        self.delete(&format!("{SQL_API}/visualizations/{id}"))
    }

    fn create_widget(
        &self,
        dashboard_id: &ResourceId,
        options: &WidgetOptions,
        width: u32,
        visualization_id: &ResourceId,
    ) -> Result<ResourceId> {
        let created: Created = self.post(
            &format!("{SQL_API}/widgets"),
            &NewWidget {
                dashboard_id,
                options,
                width,
                visualization_id,
            },
        )?;
        Ok(created.id)
    }

    fn delete_widget(&self, id: &ResourceId) -> Result<()> {
        self.delete(&format!("{SQL_API}/widgets/{id}"))
    }

    fn set_permissions(
        &self,
        object_type: ObjectType,
        id: &ResourceId,
        acl: &[AccessControl],
    ) -> Result<()> {
        self.post_unit(
            &format!("{SQL_API}/permissions/{}/{id}", object_type.as_str()),
            &SetPermissions {
                access_control_list: acl,
            },
        )
    }

    fn list_data_sources(&self) -> Result<Vec<DataSource>> {
        self.get(&format!("{SQL_API}/data_sources"), &[])
    }

    fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        let list: WarehouseList = self.get(WAREHOUSES_API, &[])?;
        Ok(list.warehouses)
    }
}

impl Workspace for RestBackend {
    fn download(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(&self.url(&format!("{WORKSPACE_API}/export")))
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", "sqldash")
            .query("path", path)
            .query("direct_download", "true")
            .call()?;
        let mut response = check(response)?;
        Ok(response.body_mut().read_to_vec()?)
    }

    fn upload(&self, path: &str, content: &[u8], overwrite: bool) -> Result<()> {
        self.post_unit(
            &format!("{WORKSPACE_API}/import"),
            &Import {
                path,
                format: "AUTO",
                overwrite,
                content: base64::engine::general_purpose::STANDARD.encode(content),
            },
        )
    }

    fn mkdirs(&self, path: &str) -> Result<()> {
        self.post_unit(&format!("{WORKSPACE_API}/mkdirs"), &PathBody { path })
    }

    fn get_status(&self, path: &str) -> Result<ObjectInfo> {
        self.get(&format!("{WORKSPACE_API}/get-status"), &[("path", path)])
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: ResourceId,
}

#[derive(Debug, Deserialize)]
struct WarehouseList {
    #[serde(default)]
    warehouses: Vec<Warehouse>,
}

#[derive(Debug, Serialize)]
struct NewDashboard<'a> {
    name: &'a str,
    run_as_role: RunAsRole,
    parent: &'a str,
}

#[derive(Debug, Serialize)]
struct NewVisualization<'a> {
    query_id: &'a ResourceId,
    #[serde(flatten)]
    spec: &'a VizSpec,
}

#[derive(Debug, Serialize)]
struct NewWidget<'a> {
    dashboard_id: &'a ResourceId,
    options: &'a WidgetOptions,
    width: u32,
    visualization_id: &'a ResourceId,
}

#[derive(Debug, Serialize)]
struct SetPermissions<'a> {
    access_control_list: &'a [AccessControl],
}

#[derive(Debug, Serialize)]
struct Import<'a> {
    path: &'a str,
    format: &'static str,
    overwrite: bool,
    content: String,
}

#[derive(Debug, Serialize)]
struct PathBody<'a> {
    path: &'a str,
}
