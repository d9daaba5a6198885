//! Last-known status persistence. Writes touch only their own key.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Result, WatchError};
use crate::models::{RecordKind, StatusRecord, Target};

pub const DEFAULT_STATE_FILE: &str = "server_status.json";

/// Key-value view of the persisted statuses.
#[cfg_attr(test, mockall::automock)]
pub trait StatusStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StatusRecord>>;

    fn set(&self, key: &str, record: &StatusRecord) -> Result<()>;
}

/// Last record for `target`, or the offline default when it has never been seen.
pub fn read(
    store: &dyn StatusStore,
    target: &Target,
    kind: RecordKind,
    now: DateTime<Utc>,
) -> Result<StatusRecord> {
    let record = store.get(&target.key())?;
    Ok(record.unwrap_or_else(|| StatusRecord::initial(kind, now)))
}

pub fn write(store: &dyn StatusStore, target: &Target, record: &StatusRecord) -> Result<()> {
    store.set(&target.key(), record)
}

/// Store backed by a pretty-printed JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Whole document, or `None` when the file does not exist yet.
    fn load(&self) -> Result<Option<Map<String, Value>>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WatchError::store(&self.path, e)),
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(other) => Err(WatchError::store(
                &self.path,
                format!("expected a JSON object, found {}", json_type(&other)),
            )),
            Err(e) => Err(WatchError::store(&self.path, e)),
        }
    }

    /// Creates `{}` unless another process got there first.
    fn create_empty(&self) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path);

        match file {
            Ok(mut file) => {
                file.write_all(&render(&Map::new())?)
                    .map_err(|e| WatchError::store(&self.path, e))?;
                info!("Created empty state file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(WatchError::store(&self.path, e)),
        }
    }

    fn persist(&self, document: &Map<String, Value>) -> Result<()> {
        let mut tmp_name = OsString::from(self.path.as_os_str());
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, render(document)?).map_err(|e| WatchError::store(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| WatchError::store(&self.path, e))?;
        Ok(())
    }
}

impl StatusStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<StatusRecord>> {
        let Some(document) = self.load()? else {
            self.create_empty()?;
            return Ok(None);
        };

        match document.get(key) {
            Some(value) => {
                let record = serde_json::from_value(value.clone()).map_err(|e| {
                    WatchError::store(&self.path, format!("record for {:?} is malformed: {}", key, e))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, record: &StatusRecord) -> Result<()> {
        let mut document = self.load()?.unwrap_or_default();
        document.insert(key.to_string(), serde_json::to_value(record)?);
        self.persist(&document)?;
        debug!("Saved {} entries to {}", document.len(), self.path.display());
        Ok(())
    }
}

fn render(document: &Map<String, Value>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
