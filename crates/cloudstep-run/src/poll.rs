use crate::annotations;
use crate::api::{ApiError, ServiceApi};
use crate::model::{READY_CONDITION, ServiceDefinition};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Where a rollout stands after one look at the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed { message: String },
}

/// Evaluate the rollout state of a fetched service.
///
/// The `Ready` condition is only trusted once the server has observed the
/// latest generation of the service.
pub fn readiness(service: &ServiceDefinition) -> Readiness {
    let Some(status) = &service.status else {
        return Readiness::Pending;
    };
    if let Some(generation) = service.metadata.generation {
        if status.observed_generation != Some(generation) {
            return Readiness::Pending;
        }
    }
    match service.condition(READY_CONDITION) {
        Some(c) if c.status == "True" => Readiness::Ready,
        Some(c) if c.status == "False" => Readiness::Failed {
            message: c
                .message
                .clone()
                .or_else(|| c.reason.clone())
                .unwrap_or_else(|| "no reason reported".to_owned()),
        },
        _ => Readiness::Pending,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            interval: Duration::from_secs(1),
        }
    }
}

/// What the service serves once it is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyReport {
    pub revision: String,
    /// Share of traffic on `revision`. Zero without a default URL.
    pub traffic_percent: u32,
    pub url: Option<String>,
}

pub fn ready_report(service: &ServiceDefinition) -> ReadyReport {
    let status = service.status.clone().unwrap_or_default();
    let revision = status
        .latest_ready_revision_name
        .clone()
        .or_else(|| status.latest_created_revision_name.clone())
        .unwrap_or_default();

    let url = status
        .url
        .filter(|u| !u.is_empty())
        .filter(|_| !annotations::default_url_disabled(service.annotations()));

    let traffic_percent = if url.is_none() {
        0
    } else {
        let on_revision: u32 = status
            .traffic
            .iter()
            .filter(|t| t.revision_name.as_deref() == Some(revision.as_str()))
            .filter_map(|t| t.percent)
            .sum();
        if on_revision > 0 {
            on_revision
        } else {
            status
                .traffic
                .iter()
                .filter(|t| t.latest_revision == Some(true))
                .filter_map(|t| t.percent)
                .sum()
        }
    };

    ReadyReport {
        revision,
        traffic_percent,
        url,
    }
}

/// Fetch `name` on every tick until it is ready, failed, out of time, or cancelled.
///
/// The deadline also bounds a fetch that is still in flight.
pub(crate) async fn poll_until_ready<A: ServiceApi>(
    api: &A,
    name: &str,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<ReadyReport, PollError> {
    let deadline = Instant::now() + settings.timeout;
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled { service: name.to_owned() }),
            _ = tokio::time::sleep_until(deadline) => {
                return Err(PollError::Timeout {
                    service: name.to_owned(),
                    timeout: settings.timeout,
                });
            }
            _ = ticker.tick() => {}
        }
        tick += 1;

        let service = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled { service: name.to_owned() }),
            _ = tokio::time::sleep_until(deadline) => {
                return Err(PollError::Timeout {
                    service: name.to_owned(),
                    timeout: settings.timeout,
                });
            }
            fetched = api.get_service(name) => fetched.map_err(|e| PollError::Fetch {
                service: name.to_owned(),
                source: e,
            })?,
        };

        match readiness(&service) {
            Readiness::Ready => {
                tracing::debug!(service = name, tick, "service ready");
                return Ok(ready_report(&service));
            }
            Readiness::Failed { message } => {
                let revision = service
                    .status
                    .as_ref()
                    .and_then(|s| s.latest_created_revision_name.clone())
                    .unwrap_or_default();
                return Err(PollError::Failed {
                    service: name.to_owned(),
                    revision,
                    message,
                });
            }
            Readiness::Pending => tracing::debug!(service = name, tick, "service not ready yet"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("service '{service}' revision '{revision}' failed to become ready: {message}")]
    Failed {
        service: String,
        revision: String,
        message: String,
    },

    #[error("timed out after {timeout:?} waiting for service '{service}' to become ready")]
    Timeout { service: String, timeout: Duration },

    #[error("cancelled while waiting for service '{service}'")]
    Cancelled { service: String },

    #[error("failed to fetch service '{service}' while waiting for readiness")]
    Fetch { service: String, source: ApiError },
}
