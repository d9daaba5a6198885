//! Reachability probes

pub mod api;
pub mod query;
pub mod tcp;

use async_trait::async_trait;
use tracing::warn;

use crate::config::ProbeConfig;
use crate::error::{Result, WatchError};
use crate::models::{RecordKind, Status, Target};

pub use api::ApiProbe;
pub use query::{CapacityPolicy, QueryProbe, SrvResolver, SystemSrvResolver};
pub use tcp::TcpProbe;

/// Raw observation before the fault policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Online,
    Offline,
    Error(String),
}

/// What to do with a [`ProbeOutcome::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Fail the run.
    Propagate,
    /// Log the error and report the target as offline.
    AssumeOffline,
}

impl FaultPolicy {
    pub fn resolve(self, probe: &str, target: &Target, outcome: ProbeOutcome) -> Result<Status> {
        match outcome {
            ProbeOutcome::Online => Ok(Status::Online),
            ProbeOutcome::Offline => Ok(Status::Offline),
            ProbeOutcome::Error(detail) => match self {
                FaultPolicy::Propagate => Err(WatchError::Probe(format!(
                    "{} probe of {}: {}",
                    probe, target, detail
                ))),
                FaultPolicy::AssumeOffline => {
                    warn!("{} probe of {} failed, assuming offline: {}", probe, target, detail);
                    Ok(Status::Offline)
                }
            },
        }
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    /// Short name used in logs (e.g. "tcp")
    fn name(&self) -> &str;

    /// Shape of the record this probe variant persists
    fn record_kind(&self) -> RecordKind;

    fn fault_policy(&self) -> FaultPolicy;

    async fn probe(&self, target: &Target) -> ProbeOutcome;
}

/// Run the probe and fold its outcome through its fault policy.
pub async fn observe(probe: &dyn Probe, target: &Target) -> Result<Status> {
    let outcome = probe.probe(target).await;
    probe.fault_policy().resolve(probe.name(), target, outcome)
}

pub fn build(config: &ProbeConfig) -> Result<Box<dyn Probe>> {
    let probe: Box<dyn Probe> = match config {
        ProbeConfig::Api { base_url } => Box::new(ApiProbe::new(base_url)?),
        ProbeConfig::Query {
            timeout_ms,
            capacity,
        } => Box::new(QueryProbe::new(*timeout_ms, *capacity)),
        ProbeConfig::TcpPort { timeout_ms } => Box::new(TcpProbe::new(*timeout_ms)),
    };
    Ok(probe)
}
