use crate::api::{ApiError, ServiceApi};
use crate::build::build_new;
use crate::merge::merge;
use crate::model::ServiceDefinition;
use crate::poll::{self, PollError, PollSettings, ReadyReport};
use cloudstep_core::DeployOptions;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Converges one Cloud Run service onto a set of [`DeployOptions`].
///
/// Create-vs-update is decided from scratch on every call, so re-running a
/// failed invocation is safe.
pub struct Reconciler<A: ServiceApi> {
    api: A,
    project_id: String,
    cancel: CancellationToken,
}

/// Which write the reconciler issued, with the server's response.
#[derive(Debug, Clone, PartialEq)]
pub enum Deployed {
    Created(ServiceDefinition),
    Updated(ServiceDefinition),
}

impl Deployed {
    pub fn service(&self) -> &ServiceDefinition {
        match self {
            Self::Created(s) | Self::Updated(s) => s,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

impl<A: ServiceApi> Reconciler<A> {
    pub fn new(api: A, project_id: &str) -> Self {
        Self {
            api,
            project_id: project_id.to_owned(),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight calls and the readiness wait when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Look the service up. `None` means it does not exist yet.
    pub async fn lookup(&self, name: &str) -> Result<Option<ServiceDefinition>, ReconcileError> {
        match self.until_cancelled(name, self.api.get_service(name)).await? {
            Ok(service) => Ok(Some(service)),
            Err(ApiError::NotFound { .. }) => Ok(None),
            Err(e) => Err(ReconcileError::Lookup {
                service: name.to_owned(),
                source: e,
            }),
        }
    }

    /// Create the service, or merge the options into the existing one and replace it.
    pub async fn create_or_update(
        &self,
        options: &DeployOptions,
    ) -> Result<Deployed, ReconcileError> {
        let name = options.service.as_str();

        match self.lookup(name).await? {
            None => {
                tracing::info!(service = name, project = %self.project_id, "service not found, creating");
                let service = build_new(&self.project_id, options);
                let created = self
                    .until_cancelled(name, self.api.create_service(&service))
                    .await?
                    .map_err(|e| ReconcileError::Create {
                        service: name.to_owned(),
                        source: e,
                    })?;
                Ok(Deployed::Created(created))
            }
            Some(existing) => {
                tracing::info!(service = name, project = %self.project_id, "service exists, updating");
                let service = merge(&existing, options);
                let replaced = self
                    .until_cancelled(name, self.api.replace_service(&service))
                    .await?
                    .map_err(|e| ReconcileError::Replace {
                        service: name.to_owned(),
                        source: e,
                    })?;
                Ok(Deployed::Updated(replaced))
            }
        }
    }

    /// Block until the latest revision of `name` is ready or has failed.
    pub async fn poll_until_ready(
        &self,
        name: &str,
        settings: PollSettings,
    ) -> Result<ReadyReport, PollError> {
        tracing::info!(service = name, timeout = ?settings.timeout, "waiting for service to become ready");
        poll::poll_until_ready(&self.api, name, settings, &self.cancel).await
    }

    async fn until_cancelled<T>(
        &self,
        name: &str,
        call: impl Future<Output = T>,
    ) -> Result<T, ReconcileError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ReconcileError::Cancelled { service: name.to_owned() }),
            out = call => Ok(out),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to look up service '{service}'")]
    Lookup { service: String, source: ApiError },

    #[error("failed to create service '{service}'")]
    Create { service: String, source: ApiError },

    #[error("failed to replace service '{service}'")]
    Replace { service: String, source: ApiError },

    #[error("cancelled while deploying service '{service}'")]
    Cancelled { service: String },
}
