//! Cloud Run service reconciliation for cloudstep.
//!
//! # Deploy flow
//!
//! ```text
//! cloudrun-deploy
//!   1. Lookup   ── GET services/{name}       (404 selects the create branch)
//!   2. Build    ── build_new(project, options)      when missing
//!      Merge    ── merge(existing, options)         when present
//!   3. Write    ── POST services | PUT services/{name}
//!   4. Poll     ── GET services/{name} every tick until Ready / Failed / timeout
//! ```
//!
//! Nothing is retried. A failed run is repeated as a whole; the merge is
//! idempotent for the same options.

pub mod annotations;
pub mod api;
pub mod build;
pub mod executor;
pub mod gcloud;
pub mod merge;
pub mod model;
pub mod poll;
pub mod reconciler;
mod secrets;

pub use api::{ApiError, RunApiClient, ServiceApi};
pub use build::build_new;
pub use executor::{GcloudExecutor, RealExecutor};
pub use gcloud::GcloudError;
pub use merge::merge;
pub use model::ServiceDefinition;
pub use poll::{PollError, PollSettings, Readiness, ReadyReport, readiness};
pub use reconciler::{Deployed, ReconcileError, Reconciler};
