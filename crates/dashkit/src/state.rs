//! Persisted mapping from logical references to remote resource ids.
//!
//! The whole state of an installation is one JSON object stored next to the
//! deployed dashboards:
//!
//! ```json
//! {
//!   "assessment_main:dashboard_id": "1f0b...",
//!   "assessment_main_00_count.sql:query_id": "9a2c...",
//!   "assessment_main_00_count.sql:viz_id": "77e1...",
//!   "assessment_main_00_count.sql:widget_id": "b3d4..."
//! }
//! ```
//!
//! Keys follow the `ref:kind` grammar parsed by [`StateKey`]. The store is
//! loaded once per run and written back once at the end; there is no locking,
//! so callers must make sure only one run targets a remote folder at a time.

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::backend::{ResourceClient, Workspace};
use crate::error::{Error, Result};
use crate::types::ResourceId;

/// File name of the state blob inside the remote folder.
pub const STATE_FILE: &str = "state.json";

// ============================================================================
// Keys
// ============================================================================

/// Kind of remote object a state entry points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Dashboard,
    Query,
    Visualization,
    Widget,
}

impl ResourceKind {
    /// All kinds, in dependency order.
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Dashboard,
        ResourceKind::Query,
        ResourceKind::Visualization,
        ResourceKind::Widget,
    ];

    /// Key suffix used in the state blob.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard_id",
            Self::Query => "query_id",
            Self::Visualization => "viz_id",
            Self::Widget => "widget_id",
        }
    }

    /// Order in which orphans are removed: dependents first.
    fn cleanup_rank(self) -> u8 {
        match self {
            Self::Widget => 0,
            Self::Visualization => 1,
            Self::Query => 2,
            Self::Dashboard => 3,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.suffix() == s)
            .ok_or_else(|| Error::InvalidStateKey(format!("unknown kind `{s}`")))
    }
}

/// Key of one state entry: `"{reference}:{kind}"`.
///
/// The kind suffix never contains `:`, so splitting on the last separator
/// always recovers the original pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateKey {
    reference: String,
    kind: ResourceKind,
}

impl StateKey {
    /// Derive the key for a reference and kind.
    pub fn new(reference: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            reference: reference.into(),
            kind,
        }
    }

    /// Logical reference part.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Kind part.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.reference, self.kind)
    }
}

impl FromStr for StateKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (reference, kind) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidStateKey(s.to_string()))?;
        if reference.is_empty() {
            return Err(Error::InvalidStateKey(s.to_string()));
        }
        let kind = kind
            .parse()
            .map_err(|_| Error::InvalidStateKey(s.to_string()))?;
        Ok(Self::new(reference, kind))
    }
}

impl Serialize for StateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// State
// ============================================================================

/// All entries of one installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct State {
    entries: BTreeMap<StateKey, ResourceId>,
}

impl State {
    /// Decode a state blob.
    ///
    /// Entries whose key does not follow the `ref:kind` grammar are skipped
    /// with a warning; anything else that fails to decode is an error.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: BTreeMap<String, ResourceId> = serde_json::from_slice(bytes)?;
        let mut entries = BTreeMap::new();
        for (key, id) in raw {
            match key.parse::<StateKey>() {
                Ok(parsed) => {
                    entries.insert(parsed, id);
                }
                Err(e) => log::warn!("Skipping state entry: {}", e),
            }
        }
        Ok(Self { entries })
    }

    /// Encode as pretty-printed JSON.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn get(&self, key: &StateKey) -> Option<&ResourceId> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &StateKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: StateKey, id: ResourceId) -> Option<ResourceId> {
        self.entries.insert(key, id)
    }

    pub fn remove(&mut self, key: &StateKey) -> Option<ResourceId> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &ResourceId)> {
        self.entries.iter()
    }

    /// Entries of a single kind.
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = (&StateKey, &ResourceId)> {
        self.entries.iter().filter(move |(k, _)| k.kind() == kind)
    }
}

impl FromIterator<(StateKey, ResourceId)> for State {
    fn from_iter<I: IntoIterator<Item = (StateKey, ResourceId)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// What happened to the entries dropped by [`StateStore::save`].
#[derive(Debug, Default)]
pub struct Cleanup {
    /// Orphans deleted remotely.
    pub deleted: Vec<(StateKey, ResourceId)>,
    /// Orphans whose remote deletion failed (dropped from state anyway).
    pub failed: Vec<(StateKey, ResourceId, Error)>,
    /// Orphans of a kind that is never deleted remotely.
    pub forgotten: Vec<(StateKey, ResourceId)>,
}

/// Loads and saves the state blob in a remote folder.
pub struct StateStore<'a> {
    workspace: &'a dyn Workspace,
    client: &'a dyn ResourceClient,
    folder: String,
}

impl<'a> StateStore<'a> {
    pub fn new(
        workspace: &'a dyn Workspace,
        client: &'a dyn ResourceClient,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            workspace,
            client,
            folder: folder.into(),
        }
    }

    /// Remote path of the state blob.
    pub fn path(&self) -> String {
        format!("{}/{}", self.folder.trim_end_matches('/'), STATE_FILE)
    }

    /// Parent reference (`folders/{object_id}`) for created objects.
    pub fn parent(&self) -> Result<String> {
        let info = self.workspace.get_status(&self.folder)?;
        Ok(format!("folders/{}", info.object_id))
    }

    /// Load state without touching remote resources.
    ///
    /// A missing blob yields empty state; a corrupt blob is logged and also
    /// yields empty state. Other remote failures are returned.
    pub fn read(&self) -> Result<Option<State>> {
        let path = self.path();
        match self.workspace.download(&path) {
            Ok(bytes) => match State::from_slice(&bytes) {
                Ok(state) => {
                    log::debug!("Loaded {} state entries from {}", state.len(), path);
                    Ok(Some(state))
                }
                Err(e) => {
                    log::warn!("JSON state file corrupt: {}: {}", path, e);
                    Ok(Some(State::default()))
                }
            },
            Err(e) if e.is_not_found() => {
                log::debug!("State file does not exist: {}", path);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Load state for a reconciliation run.
    ///
    /// On a fresh install the remote folder is created. Query entries whose
    /// remote object can no longer be fetched are dropped together with the
    /// visualization entry of the same reference, so both are created again.
    /// A visualization belongs to its query and is gone with it.
    pub fn load(&self) -> Result<State> {
        let Some(mut state) = self.read()? else {
            log::info!("No state found, creating {}", self.folder);
            self.workspace.mkdirs(&self.folder)?;
            return Ok(State::default());
        };

        let stale: Vec<StateKey> = state
            .of_kind(ResourceKind::Query)
            .filter(|(_, id)| self.client.get_query(id).is_err())
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            log::info!("Query {} no longer exists remotely, dropping from state", key);
            state.remove(&key);
            state.remove(&StateKey::new(key.reference(), ResourceKind::Visualization));
        }

        Ok(state)
    }

    /// Persist `current`, deleting every entry whose key is not desired.
    ///
    /// Orphan deletion is best-effort: failures are logged and the entry is
    /// dropped regardless. Dashboards are never deleted remotely.
    pub fn save(&self, desired: &HashSet<StateKey>, current: State) -> Result<Cleanup> {
        let mut kept = State::default();
        let mut orphans = Vec::new();
        for (key, id) in current.entries {
            if desired.contains(&key) {
                kept.insert(key, id);
            } else {
                orphans.push((key, id));
            }
        }
        orphans.sort_by_key(|(key, _)| (key.kind().cleanup_rank(), key.reference().to_string()));

        let mut cleanup = Cleanup::default();
        for (key, id) in orphans {
            let result = match key.kind() {
                ResourceKind::Query => self.client.delete_query(&id),
                ResourceKind::Visualization => self.client.delete_visualization(&id),
                ResourceKind::Widget => self.client.delete_widget(&id),
                ResourceKind::Dashboard => {
                    log::info!("Forgetting dashboard {} ({})", key.reference(), id);
                    cleanup.forgotten.push((key, id));
                    continue;
                }
            };
            match result {
                Ok(()) => {
                    log::info!("Deleted orphaned {}-{}", key.kind(), id);
                    cleanup.deleted.push((key, id));
                }
                Err(e) => {
                    log::info!(
                        "Failed to delete {}-{} --- {}",
                        key.kind(),
                        id,
                        e.error_code().unwrap_or("UNKNOWN")
                    );
                    cleanup.failed.push((key, id, e));
                }
            }
        }

        let path = self.path();
        self.workspace.upload(&path, &kept.to_vec()?, true)?;
        log::debug!("Saved {} state entries to {}", kept.len(), path);
        Ok(cleanup)
    }
}
