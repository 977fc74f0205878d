//! # Dashkit
//!
//! Declarative deployment of SQL dashboards.
//!
//! Definitions live on disk as a two-level folder tree of `.sql` files. Each
//! second-level folder is one dashboard; each file is one query with its
//! visualization and widget described by magic comments. A run converges the
//! remote service to those definitions and records every remote id in a
//! single state blob stored next to the deployed objects, so repeated runs
//! update in place and anything no longer defined is deleted.
//!
//! ## Core Concepts
//!
//! - **ArtifactGroup**: one dashboard and its queries, loaded by [`loader`]
//! - **State**: `"{ref}:{kind}" -> id` mapping persisted by [`StateStore`]
//! - **Reconciler**: plans every definition, then installs groups in order
//!   and garbage-collects orphans once at the end
//!
//! ## Example
//!
//! ```
//! use dashkit::backend::MockBackend;
//! use dashkit::{ArtifactGroup, GroupRef, Reconciler, Settings};
//!
//! let backend = MockBackend::new();
//! let settings = Settings::new("https://example.cloud.databricks.com", "/Shared/dashboards");
//! let groups = vec![ArtifactGroup {
//!     reference: GroupRef::from_folders("assessment", "main"),
//!     dashboard_name: "Assessment (Main)".to_string(),
//!     queries: Vec::new(),
//! }];
//!
//! let report = Reconciler::new(&backend, &backend, settings).reconcile(&groups)?;
//! assert_eq!(report.summary.dashboards_created, 1);
//! # Ok::<(), dashkit::Error>(())
//! ```
//!
//! ## Capability Traits
//!
//! The reconciler only sees two traits:
//!
//! - [`ResourceClient`]: dashboards, queries, visualizations, widgets,
//!   permissions and compute endpoints
//! - [`Workspace`]: state blob storage
//!
//! [`backend::rest::RestBackend`] implements both over HTTP and
//! [`backend::MockBackend`] implements both in memory.
//!
//! ## Concurrency
//!
//! Runs are single-threaded and take no lock on the state blob. Only one run
//! may target a given remote folder at a time.

pub mod backend;
pub mod error;
pub mod loader;
pub mod reconciler;
pub mod state;
pub mod types;
pub mod viz;
pub mod widget;

// Re-export main types at crate root
pub use backend::{ResourceClient, Workspace};
pub use error::{Error, ErrorCategory, Result};
pub use loader::{LoaderOptions, load_groups};
pub use reconciler::{Reconciler, Settings, validate, validate_all};
pub use state::{ResourceKind, State, StateKey, StateStore};
pub use types::{
    ArtifactGroup, DeployReport, DeploySummary, GroupRef, QueryDefinition, ResourceId,
};
pub use viz::{VizKind, VizSpec};
pub use widget::{PositionAllocator, WidgetOptions};
