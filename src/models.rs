use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Online,
    Offline,
}

impl Status {
    pub fn is_online(self) -> bool {
        self == Status::Online
    }
}

impl From<bool> for Status {
    fn from(online: bool) -> Self {
        if online { Status::Online } else { Status::Offline }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Online => write!(f, "online"),
            Status::Offline => write!(f, "offline"),
        }
    }
}

/// The monitored endpoint, fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Hostname (optionally `host:port`) used verbatim as the store key.
    Host(String),
    /// Raw socket address, keyed as `ip:port`.
    Endpoint { ip: String, port: u16 },
}

impl Target {
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Host(address) => write!(f, "{}", address),
            Target::Endpoint { ip, port } => write!(f, "{}:{}", ip, port),
        }
    }
}

/// Shape of the record a probe variant persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Simple,
    Timestamped,
}

/// Last known observation for one target as it sits in the state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusRecord {
    Simple(bool),
    Timestamped { online: bool, time: DateTime<Utc> },
}

impl StatusRecord {
    /// Record assumed for a target with no history.
    pub fn initial(kind: RecordKind, now: DateTime<Utc>) -> Self {
        Self::observed(kind, Status::Offline, now)
    }

    pub fn observed(kind: RecordKind, status: Status, now: DateTime<Utc>) -> Self {
        match kind {
            RecordKind::Simple => StatusRecord::Simple(status.is_online()),
            RecordKind::Timestamped => StatusRecord::Timestamped {
                online: status.is_online(),
                time: now,
            },
        }
    }

    pub fn status(&self) -> Status {
        match self {
            StatusRecord::Simple(online) => Status::from(*online),
            StatusRecord::Timestamped { online, .. } => Status::from(*online),
        }
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self {
            StatusRecord::Simple(_) => None,
            StatusRecord::Timestamped { time, .. } => Some(*time),
        }
    }
}
