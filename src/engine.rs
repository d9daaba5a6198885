use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::models::{RecordKind, Status, StatusRecord, Target};
use crate::notifier::{compose_message, Notification, Notifier, WebhookNotifier};
use crate::probe::{self, Probe};
use crate::store::{self, JsonFileStore, StatusStore};

/// Result of one check cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Unchanged(Status),
    Changed {
        previous: Status,
        current: Status,
        webhook_status: u16,
    },
}

pub struct Monitor {
    target: Target,
    probe: Box<dyn Probe>,
    store: Box<dyn StatusStore>,
    notifier: Box<dyn Notifier>,
}

impl Monitor {
    pub fn new(
        target: Target,
        probe: Box<dyn Probe>,
        store: Box<dyn StatusStore>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            target,
            probe,
            store,
            notifier,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        Ok(Self::new(
            config.target.clone(),
            probe::build(&config.probe)?,
            Box::new(JsonFileStore::new(&config.state_path)),
            Box::new(WebhookNotifier::new(&config.webhook_url)),
        ))
    }

    pub async fn check(&self) -> Result<CheckOutcome> {
        self.check_at(Utc::now()).await
    }

    /// Probe, compare with the stored status, and on a change persist the new
    /// record before notifying.
    pub async fn check_at(&self, now: DateTime<Utc>) -> Result<CheckOutcome> {
        let kind = self.probe.record_kind();

        let current = probe::observe(self.probe.as_ref(), &self.target).await?;
        info!("Current status: {}", current);

        let last = store::read(self.store.as_ref(), &self.target, kind, now)?;
        info!("Last status: {}", last.status());

        if current == last.status() {
            return Ok(CheckOutcome::Unchanged(current));
        }

        info!("Status changed, sending webhook...");
        let record = StatusRecord::observed(kind, current, now);
        store::write(self.store.as_ref(), &self.target, &record)?;

        let offline_for = match kind {
            RecordKind::Timestamped => last.time().map(|since| now - since),
            RecordKind::Simple => None,
        };
        let message = compose_message(&self.target, current, offline_for);
        let webhook_status = self.notifier.notify(&Notification::new(message)).await?;

        Ok(CheckOutcome::Changed {
            previous: last.status(),
            current,
            webhook_status,
        })
    }
}
