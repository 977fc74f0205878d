//! Converges remote dashboards to the definitions on disk.
//!
//! A run has two phases:
//!
//! 1. **Plan** - every visualization and widget layout is built from its
//!    magic comments. Nothing remote is touched, so an authoring mistake
//!    anywhere aborts the run before the first call.
//! 2. **Apply** - state is loaded once, every group is installed in order
//!    (dashboard, then per query: query, visualization, widget) and state is
//!    saved once, deleting whatever the run did not claim.
//!
//! Runs are sequential and unlocked. Two runs against the same remote folder
//! at the same time race on the state blob; callers must prevent that.

use std::collections::HashSet;

use crate::backend::{NewQuery, QueryUpdate, ResourceClient, RunAsRole, Workspace};
use crate::error::{Error, Result};
use crate::state::{ResourceKind, State, StateKey, StateStore};
use crate::types::{
    AccessControl, ArtifactGroup, DeployReport, DeploySummary, GroupRef, ObjectType,
    PermissionLevel, QueryDefinition, ResourceId,
};
use crate::viz::{self, VizSpec};
use crate::widget::{PositionAllocator, WIDGET_WIDTH, WidgetOptions};

/// Principal granted access to everything deployed.
pub const DEFAULT_PRINCIPAL: &str = "users";

/// Where and how a run deploys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Workspace host, used for links.
    pub host: String,
    /// Remote folder holding the state blob and the deployed objects.
    pub remote_folder: String,
    /// Compute endpoint to run queries on; the first listed one if unset.
    pub warehouse_id: Option<String>,
    /// Group granted view/run access.
    pub principal: String,
}

impl Settings {
    pub fn new(host: impl Into<String>, remote_folder: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            remote_folder: remote_folder.into(),
            warehouse_id: None,
            principal: DEFAULT_PRINCIPAL.to_string(),
        }
    }

    #[must_use]
    pub fn with_warehouse(mut self, warehouse_id: Option<String>) -> Self {
        self.warehouse_id = warehouse_id;
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = principal.into();
        self
    }
}

/// A query with its visualization and widget resolved.
struct PlannedQuery<'g> {
    query: &'g QueryDefinition,
    viz: VizSpec,
    widget: WidgetOptions,
}

struct PlannedGroup<'g> {
    group: &'g ArtifactGroup,
    queries: Vec<PlannedQuery<'g>>,
}

fn plan_query(
    query: &QueryDefinition,
    positions: &mut PositionAllocator,
) -> Result<(VizSpec, WidgetOptions)> {
    let viz = viz::build(query).map_err(|e| e.in_query(query.group.as_str(), &query.name))?;
    let widget = positions
        .layout(query)
        .map_err(|e| e.in_query(query.group.as_str(), &query.name))?;
    Ok((viz, widget))
}

/// Resolve every definition, failing on the first error.
fn plan(groups: &[ArtifactGroup]) -> Result<Vec<PlannedGroup<'_>>> {
    let mut positions = PositionAllocator::new();
    groups
        .iter()
        .map(|group| {
            let queries = group
                .queries
                .iter()
                .map(|query| {
                    let (viz, widget) = plan_query(query, &mut positions)?;
                    Ok(PlannedQuery { query, viz, widget })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(PlannedGroup { group, queries })
        })
        .collect()
}

/// Check every definition without remote calls; stops at the first error.
pub fn validate(groups: &[ArtifactGroup]) -> Result<()> {
    plan(groups).map(|_| ())
}

/// Check every definition without remote calls, reporting all errors.
pub fn validate_all(groups: &[ArtifactGroup]) -> Result<()> {
    let mut positions = PositionAllocator::new();
    let errors: Vec<Error> = groups
        .iter()
        .flat_map(|group| group.queries.iter())
        .filter_map(|query| plan_query(query, &mut positions).err())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

/// Applies artifact groups to a remote service.
pub struct Reconciler<'a> {
    client: &'a dyn ResourceClient,
    workspace: &'a dyn Workspace,
    settings: Settings,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        client: &'a dyn ResourceClient,
        workspace: &'a dyn Workspace,
        settings: Settings,
    ) -> Self {
        Self {
            client,
            workspace,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn store(&self) -> StateStore<'a> {
        StateStore::new(self.workspace, self.client, self.settings.remote_folder.clone())
    }

    /// Run one full reconciliation.
    ///
    /// Any definition error aborts before the first remote call. Any remote
    /// failure while installing aborts the run without saving state.
    pub fn reconcile(&self, groups: &[ArtifactGroup]) -> Result<DeployReport> {
        let plan = plan(groups)?;
        let data_source_id = self.data_source()?;

        let store = self.store();
        let mut state = store.load()?;
        let parent = store.parent()?;

        let mut run = Run {
            client: self.client,
            principal: &self.settings.principal,
            parent: &parent,
            data_source_id: &data_source_id,
            state: &mut state,
            report: DeployReport::default(),
        };
        let mut desired: HashSet<StateKey> = HashSet::new();
        for planned in &plan {
            run.install(planned)?;
            desired.extend(planned.group.desired_keys());
        }
        let mut report = run.report;

        let cleanup = store.save(&desired, state)?;
        report.summary.orphans_deleted = cleanup.deleted.len();
        report.summary.orphans_failed = cleanup.failed.len();
        log::info!(
            "Deployed {} dashboards ({} created, {} updated)",
            report.dashboards.len(),
            report.summary.created(),
            report.summary.updated()
        );
        Ok(report)
    }

    /// Data source backing the configured (or first) warehouse.
    fn data_source(&self) -> Result<String> {
        let warehouse_id = match &self.settings.warehouse_id {
            Some(id) => id.clone(),
            None => self
                .client
                .list_warehouses()?
                .into_iter()
                .next()
                .map(|w| w.id)
                .ok_or(Error::NoWarehouse)?,
        };
        self.client
            .list_data_sources()?
            .into_iter()
            .find(|ds| ds.warehouse_id == warehouse_id)
            .map(|ds| {
                log::debug!("Using data source {} on warehouse {}", ds.id, warehouse_id);
                ds.id
            })
            .ok_or(Error::UnknownDataSource(warehouse_id))
    }

    /// Web link of a dashboard.
    pub fn dashboard_link(&self, id: &ResourceId) -> String {
        format!("{}/sql/dashboards/{}", self.settings.host, id)
    }

    /// Current persisted state, without liveness checks or side effects.
    pub fn read_state(&self) -> Result<State> {
        Ok(self.store().read()?.unwrap_or_default())
    }

    /// Link of every dashboard recorded in state.
    pub fn links(&self) -> Result<Vec<(GroupRef, String)>> {
        let state = self.read_state()?;
        Ok(state
            .of_kind(ResourceKind::Dashboard)
            .map(|(key, id)| (GroupRef::from(key.reference()), self.dashboard_link(id)))
            .collect())
    }
}

/// Mutable context of one apply phase.
struct Run<'r> {
    client: &'r dyn ResourceClient,
    principal: &'r str,
    parent: &'r str,
    data_source_id: &'r str,
    state: &'r mut State,
    report: DeployReport,
}

impl Run<'_> {
    fn summary(&mut self) -> &mut DeploySummary {
        &mut self.report.summary
    }

    fn grant(
        &self,
        object_type: ObjectType,
        id: &ResourceId,
        level: PermissionLevel,
    ) -> Result<()> {
        self.client.set_permissions(
            object_type,
            id,
            &[AccessControl {
                group_name: self.principal.to_string(),
                permission_level: level,
            }],
        )
    }

    fn install(&mut self, planned: &PlannedGroup<'_>) -> Result<()> {
        let group = planned.group;
        log::info!("Installing '{}' dashboard", group.dashboard_name);
        let dashboard_id = self.install_dashboard(group)?;
        for item in &planned.queries {
            let query_id = self.install_query(group, item.query)?;
            let viz_id = self.install_viz(item, &query_id)?;
            self.install_widget(item, &dashboard_id, &viz_id)?;
        }
        self.report
            .dashboards
            .insert(group.reference.clone(), dashboard_id);
        Ok(())
    }

    fn install_dashboard(&mut self, group: &ArtifactGroup) -> Result<ResourceId> {
        let key = group.reference.dashboard_key();
        if let Some(id) = self.state.get(&key).cloned() {
            let dashboard = self.client.get_dashboard(&id)?;
            for widget in &dashboard.widgets {
                log::debug!("Clearing widget {} from dashboard {}", widget.id, id);
                self.client.delete_widget(&widget.id)?;
            }
            self.summary().widgets_cleared += dashboard.widgets.len();
            return Ok(id);
        }

        let id = self
            .client
            .create_dashboard(&group.dashboard_name, RunAsRole::Viewer, self.parent)?;
        self.grant(ObjectType::Dashboards, &id, PermissionLevel::CanView)?;
        self.state.insert(key, id.clone());
        self.summary().dashboards_created += 1;
        Ok(id)
    }

    fn install_query(
        &mut self,
        group: &ArtifactGroup,
        query: &QueryDefinition,
    ) -> Result<ResourceId> {
        let key = query.query_key();
        let name = format!("{} - {}", group.dashboard_name, query.name);
        if let Some(id) = self.state.get(&key).cloned() {
            self.client.update_query(
                &id,
                &QueryUpdate {
                    data_source_id: self.data_source_id,
                    name: &name,
                    query: &query.query_text,
                },
            )?;
            self.summary().queries_updated += 1;
            return Ok(id);
        }

        let id = self.client.create_query(&NewQuery {
            parent: self.parent,
            run_as_role: RunAsRole::Viewer,
            data_source_id: self.data_source_id,
            name: &name,
            query: &query.query_text,
        })?;
        self.grant(ObjectType::Queries, &id, PermissionLevel::CanRun)?;
        self.state.insert(key, id.clone());
        self.summary().queries_created += 1;
        Ok(id)
    }

    fn install_viz(
        &mut self,
        item: &PlannedQuery<'_>,
        query_id: &ResourceId,
    ) -> Result<ResourceId> {
        let key = item.query.viz_key();
        if let Some(id) = self.state.get(&key).cloned() {
            self.client.update_visualization(&id, &item.viz)?;
            self.summary().visualizations_updated += 1;
            return Ok(id);
        }

        let id = self.client.create_visualization(query_id, &item.viz)?;
        self.state.insert(key, id.clone());
        self.summary().visualizations_created += 1;
        Ok(id)
    }

    fn install_widget(
        &mut self,
        item: &PlannedQuery<'_>,
        dashboard_id: &ResourceId,
        viz_id: &ResourceId,
    ) -> Result<()> {
        let id = self
            .client
            .create_widget(dashboard_id, &item.widget, WIDGET_WIDTH, viz_id)?;
        self.state.insert(item.query.widget_key(), id);
        self.summary().widgets_created += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Call, MockBackend};
    use crate::viz::{VizKind, VizOptions};
    use std::collections::HashMap;

    const FOLDER: &str = "/Users/me/.sqldash/dashboards";
    const HOST: &str = "https://example.cloud.databricks.com";

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn query(group: &GroupRef, name: &str, viz_type: &str) -> QueryDefinition {
        QueryDefinition {
            group: group.clone(),
            name: name.to_string(),
            query_text: format!("SELECT '{name}'"),
            viz_attrs: attrs(&[("type", viz_type), ("name", name), ("columns", "a,b")]),
            widget_attrs: attrs(&[("title", name)]),
        }
    }

    fn group(reference: &str, names: &[&str]) -> ArtifactGroup {
        let reference = GroupRef::from(reference);
        ArtifactGroup {
            dashboard_name: format!("[TEST] {reference}"),
            queries: names.iter().map(|n| query(&reference, n, "table")).collect(),
            reference,
        }
    }

    fn settings() -> Settings {
        Settings::new(HOST, FOLDER)
    }

    fn saved_state(mock: &MockBackend) -> State {
        State::from_slice(&mock.file(&format!("{FOLDER}/state.json")).unwrap()).unwrap()
    }

    fn key(s: &str) -> StateKey {
        s.parse().unwrap()
    }

    fn two_groups() -> Vec<ArtifactGroup> {
        vec![
            group("a_main", &["00_x.sql", "01_y.sql"]),
            group("b_main", &["00_z.sql"]),
        ]
    }

    fn entry(mock: &MockBackend, k: &str) -> ResourceId {
        saved_state(mock).get(&key(k)).cloned().unwrap()
    }

    #[test]
    fn test_fresh_install() {
        let mock = MockBackend::new();

        let report = Reconciler::new(&mock, &mock, settings())
            .reconcile(&two_groups())
            .unwrap();

        assert_eq!(mock.counts(), (2, 3, 3, 3));
        assert_eq!(report.dashboards.len(), 2);
        assert_eq!(report.summary.created(), 2 + 3 + 3 + 3);
        assert_eq!(report.summary.updated(), 0);

        let state = saved_state(&mock);
        assert_eq!(state.len(), 2 + 3 * 3);
        assert!(state.contains(&key("a_main_01_y.sql:widget_id")));

        let calls = mock.calls();
        assert_eq!(
            &calls[..5],
            &[
                Call::ListWarehouses,
                Call::ListDataSources,
                Call::Download(format!("{FOLDER}/state.json")),
                Call::Mkdirs(FOLDER.to_string()),
                Call::GetStatus(FOLDER.to_string()),
            ]
        );
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::Upload(_))).count(), 1);

        let created: Vec<&str> = calls
            .iter()
            .filter_map(|c| match c {
                Call::CreateQuery(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            created,
            vec![
                "[TEST] a_main - 00_x.sql",
                "[TEST] a_main - 01_y.sql",
                "[TEST] b_main - 00_z.sql",
            ]
        );
    }

    #[test]
    fn test_names_grants_and_data_source() {
        let mock = MockBackend::new();
        let groups = vec![group("a_main", &["00_x.sql"])];
        let report = Reconciler::new(&mock, &mock, settings()).reconcile(&groups).unwrap();

        let dashboard = &report.dashboards[&GroupRef::from("a_main")];
        let grants = mock.permissions(dashboard);
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].group_name, "users");
        assert_eq!(grants[0].permission_level, PermissionLevel::CanView);

        let state = saved_state(&mock);
        let query_id = state.get(&key("a_main_00_x.sql:query_id")).unwrap();
        let stored = mock.query(query_id).unwrap();
        assert_eq!(stored.name, "[TEST] a_main - 00_x.sql");
        assert_eq!(stored.data_source_id, "ds-1");
        assert_eq!(mock.permissions(query_id)[0].permission_level, PermissionLevel::CanRun);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let mock = MockBackend::new();
        let groups = two_groups();
        Reconciler::new(&mock, &mock, settings()).reconcile(&groups).unwrap();
        let before = saved_state(&mock);
        mock.clear_calls();

        let report = Reconciler::new(&mock, &mock, settings()).reconcile(&groups).unwrap();

        let calls = mock.calls();
        let creates: Vec<&Call> = calls.iter().filter(|c| c.is_create()).collect();
        assert_eq!(creates.len(), 3);
        assert!(creates.iter().all(|c| matches!(c, Call::CreateWidget { .. })));
        assert_eq!(calls.iter().filter(|c| c.is_update()).count(), 6);
        assert_eq!(report.summary.widgets_cleared, 3);
        assert_eq!(report.summary.orphans_deleted, 0);
        assert_eq!(mock.counts(), (2, 3, 3, 3));

        let after = saved_state(&mock);
        for kind in [ResourceKind::Dashboard, ResourceKind::Query, ResourceKind::Visualization] {
            let a: Vec<_> = before.of_kind(kind).collect();
            let b: Vec<_> = after.of_kind(kind).collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_removed_query_is_cleaned_up() {
        let mock = MockBackend::new();
        Reconciler::new(&mock, &mock, settings())
            .reconcile(&[group("a_main", &["00_x.sql", "01_y.sql"])])
            .unwrap();

        let report = Reconciler::new(&mock, &mock, settings())
            .reconcile(&[group("a_main", &["00_x.sql"])])
            .unwrap();

        assert_eq!(mock.counts(), (1, 1, 1, 1));
        // The widget went away with the dashboard clear, so its delete fails.
        assert_eq!(report.summary.orphans_deleted, 2);
        assert_eq!(report.summary.orphans_failed, 1);

        let state = saved_state(&mock);
        assert_eq!(state.len(), 4);
        assert!(!state.contains(&key("a_main_01_y.sql:query_id")));
    }

    #[test]
    fn test_removed_group_forgets_dashboard() {
        let mock = MockBackend::new();
        Reconciler::new(&mock, &mock, settings())
            .reconcile(&[
                group("a_main", &["00_x.sql"]),
                group("b_main", &["00_z.sql"]),
            ])
            .unwrap();

        Reconciler::new(&mock, &mock, settings())
            .reconcile(&[group("a_main", &["00_x.sql"])])
            .unwrap();

        let (dashboards, queries, _, _) = mock.counts();
        assert_eq!(dashboards, 2);
        assert_eq!(queries, 1);
        assert!(!saved_state(&mock).contains(&key("b_main:dashboard_id")));
    }

    #[test]
    fn test_corrupt_state_reinstalls() {
        let mock = MockBackend::new();
        mock.put_file(&format!("{FOLDER}/state.json"), b"\x00garbage");

        Reconciler::new(&mock, &mock, settings())
            .reconcile(&[group("a_main", &["00_x.sql"])])
            .unwrap();

        let calls = mock.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::Mkdirs(_))));
        assert_eq!(calls.iter().filter(|c| c.is_create()).count(), 4);
        assert_eq!(saved_state(&mock).len(), 4);
    }

    #[test]
    fn test_unknown_viz_makes_no_calls() {
        let mock = MockBackend::new();
        let mut g = group("a_main", &["00_x.sql"]);
        g.queries.push(query(&g.reference, "01_pie.sql", "pie"));

        let err = Reconciler::new(&mock, &mock, settings()).reconcile(&[g]).unwrap_err();

        assert!(err.is_definition());
        assert!(err.to_string().contains("a_main/01_pie.sql"));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_rows_continue_across_groups() {
        let mock = MockBackend::new();
        Reconciler::new(&mock, &mock, settings())
            .reconcile(&two_groups())
            .unwrap();

        let rows: Vec<u32> = mock
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::CreateWidget { row, .. } => Some(*row),
                _ => None,
            })
            .collect();
        assert_eq!(rows, vec![1, 2, 3]);
    }

    #[test]
    fn test_failure_aborts_without_saving() {
        let mock = MockBackend::new();
        mock.fail_operation("create_widget");

        let err = Reconciler::new(&mock, &mock, settings())
            .reconcile(&[group("a_main", &["00_x.sql"])])
            .unwrap_err();

        assert_eq!(err.error_code(), Some("INTERNAL_ERROR"));
        assert!(!mock.calls().iter().any(|c| matches!(c, Call::Upload(_))));
        assert!(mock.file(&format!("{FOLDER}/state.json")).is_none());
    }

    #[test]
    fn test_dead_query_is_recreated() {
        let mock = MockBackend::new();
        let groups = vec![group("a_main", &["00_x.sql"])];
        Reconciler::new(&mock, &mock, settings()).reconcile(&groups).unwrap();
        let old_query = entry(&mock, "a_main_00_x.sql:query_id");
        let old_viz = entry(&mock, "a_main_00_x.sql:viz_id");
        mock.drop_query(&old_query);
        mock.clear_calls();

        Reconciler::new(&mock, &mock, settings()).reconcile(&groups).unwrap();

        let new_query = entry(&mock, "a_main_00_x.sql:query_id");
        let new_viz = entry(&mock, "a_main_00_x.sql:viz_id");
        assert_ne!(new_query, old_query);
        assert_ne!(new_viz, old_viz);

        let calls = mock.calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::CreateQuery(_))).count(), 1);
        assert!(calls.contains(&Call::CreateVisualization(new_query.clone())));
        assert!(!calls.iter().any(|c| matches!(c, Call::UpdateVisualization(_))));

        let (viz_query, _) = mock.visualization(&new_viz).unwrap();
        assert_eq!(viz_query, new_query);
        let widget = mock.widget(&entry(&mock, "a_main_00_x.sql:widget_id")).unwrap();
        assert_eq!(widget.visualization, new_viz);
        assert_eq!(mock.counts(), (1, 1, 1, 1));
    }

    #[test]
    fn test_counter_and_widget_options_reach_service() {
        let mock = MockBackend::new();
        let r = GroupRef::from("a_main");
        let mut counter = query(&r, "00_count.sql", "counter");
        counter.viz_attrs = attrs(&[
            ("type", "counter"),
            ("name", "Tables"),
            ("value_column", "count"),
            ("counter_label", "Tables"),
        ]);
        counter.widget_attrs = attrs(&[
            ("title", "Table count"),
            ("col", "2"),
            ("size_x", "1"),
            ("size_y", "4"),
        ]);
        let groups = vec![ArtifactGroup {
            reference: r.clone(),
            dashboard_name: "[TEST] a_main".to_string(),
            queries: vec![counter],
        }];

        let report = Reconciler::new(&mock, &mock, settings()).reconcile(&groups).unwrap();

        let query_id = entry(&mock, "a_main_00_count.sql:query_id");
        let viz_id = entry(&mock, "a_main_00_count.sql:viz_id");
        let (viz_query, spec) = mock.visualization(&viz_id).unwrap();
        assert_eq!(viz_query, query_id);
        assert_eq!(spec.kind, VizKind::Counter);
        assert_eq!(spec.name, "Tables");
        assert_eq!(serde_json::to_value(&spec).unwrap()["type"], "COUNTER");
        let VizOptions::Counter(options) = &spec.options else {
            panic!("expected counter options");
        };
        assert_eq!(options.counter_col_name, "count");
        assert_eq!(options.counter_label.as_deref(), Some("Tables"));

        let widget = mock.widget(&entry(&mock, "a_main_00_count.sql:widget_id")).unwrap();
        assert_eq!(widget.dashboard, report.dashboards[&r]);
        assert_eq!(widget.visualization, viz_id);
        assert_eq!(widget.options.title, "Table count");
        assert_eq!(widget.options.position.col, 2);
        assert_eq!(widget.options.position.row, 1);
        assert_eq!(widget.options.position.size_x, 1);
        assert_eq!(widget.options.position.size_y, 4);
    }

    #[test]
    fn test_update_sends_rebuilt_spec() {
        let mock = MockBackend::new();
        let mut groups = vec![group("a_main", &["00_x.sql"])];
        Reconciler::new(&mock, &mock, settings()).reconcile(&groups).unwrap();
        let viz_id = entry(&mock, "a_main_00_x.sql:viz_id");
        mock.clear_calls();

        let definition = &mut groups[0].queries[0];
        definition
            .viz_attrs
            .insert("name".to_string(), "Renamed".to_string());
        definition
            .viz_attrs
            .insert("columns".to_string(), "a,b,c".to_string());
        Reconciler::new(&mock, &mock, settings()).reconcile(&groups).unwrap();

        assert!(mock.calls().contains(&Call::UpdateVisualization(viz_id.clone())));
        let (_, spec) = mock.visualization(&viz_id).unwrap();
        assert_eq!(spec.name, "Renamed");
        let VizOptions::Table(options) = &spec.options else {
            panic!("expected table options");
        };
        let columns: Vec<&str> = options.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_warehouse() {
        let mock = MockBackend::without_warehouses();
        let err = Reconciler::new(&mock, &mock, settings())
            .reconcile(&[group("a_main", &["00_x.sql"])])
            .unwrap_err();
        assert!(matches!(err, Error::NoWarehouse));
        assert!(!mock.calls().iter().any(Call::is_create));
    }

    #[test]
    fn test_configured_warehouse() {
        let mock = MockBackend::new();
        mock.add_warehouse("wh-2", "ds-2");
        let settings = settings().with_warehouse(Some("wh-2".to_string()));
        Reconciler::new(&mock, &mock, settings)
            .reconcile(&[group("a_main", &["00_x.sql"])])
            .unwrap();

        let id = saved_state(&mock)
            .get(&key("a_main_00_x.sql:query_id"))
            .cloned()
            .unwrap();
        assert_eq!(mock.query(&id).unwrap().data_source_id, "ds-2");
        assert!(!mock.calls().contains(&Call::ListWarehouses));
    }

    #[test]
    fn test_unknown_warehouse() {
        let mock = MockBackend::new();
        let settings = settings().with_warehouse(Some("nope".to_string()));
        let err = Reconciler::new(&mock, &mock, settings)
            .reconcile(&[group("a_main", &["00_x.sql"])])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownDataSource(ref id) if id == "nope"));
    }

    #[test]
    fn test_validate_all_aggregates() {
        let r = GroupRef::from("a_main");
        let mut bad_widget = query(&r, "02_w.sql", "table");
        bad_widget.widget_attrs.insert("row".to_string(), "top".to_string());
        let groups = vec![ArtifactGroup {
            reference: r.clone(),
            dashboard_name: "A".to_string(),
            queries: vec![
                query(&r, "00_ok.sql", "table"),
                query(&r, "01_pie.sql", "pie"),
                bad_widget,
            ],
        }];

        let Err(Error::Validation(errors)) = validate_all(&groups) else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, Error::Definition { .. })));
        assert!(validate(&groups).is_err());
        assert!(validate_all(&[group("a_main", &["00_ok.sql"])]).is_ok());
    }

    #[test]
    fn test_links() {
        let mock = MockBackend::new();
        let reconciler = Reconciler::new(&mock, &mock, Settings::new(format!("{HOST}/"), FOLDER));
        let report = reconciler.reconcile(&[group("a_main", &["00_x.sql"])]).unwrap();
        let id = &report.dashboards[&GroupRef::from("a_main")];

        assert_eq!(reconciler.dashboard_link(id), format!("{HOST}/sql/dashboards/{id}"));
        let links = reconciler.links().unwrap();
        assert_eq!(links, vec![(GroupRef::from("a_main"), format!("{HOST}/sql/dashboards/{id}"))]);
    }
}
