//! Minecraft Java edition status query ("server list ping")
//!
//! Every packet is `VarInt length | VarInt packet id | payload`.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::{FaultPolicy, Probe, ProbeOutcome};
use crate::models::{RecordKind, Target};

pub const DEFAULT_QUERY_PORT: u16 = 25565;

const PROTOCOL_VERSION: i32 = 47;
const NEXT_STATE_STATUS: i32 = 1;
const MAX_PACKET_LEN: i32 = 1 << 21;

pub fn default_timeout() -> u64 {
    3000
}

pub fn default_srv_timeout() -> u64 {
    1000
}

/// How a reported player capacity of zero is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityPolicy {
    /// A server advertising zero max players is treated as offline.
    ZeroIsOffline,
    /// Any well-formed status response counts as online.
    Ignore,
}

#[derive(Debug, thiserror::Error)]
enum QueryError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid status document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bad address {0:?}")]
    Address(String),
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    version: Option<Version>,
    players: Players,
}

#[derive(Debug, Deserialize)]
struct Version {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Players {
    max: i64,
    #[serde(default)]
    online: i64,
}

/// Source of `_minecraft._tcp` SRV answers.
#[async_trait]
pub trait SrvResolver: Send + Sync {
    /// First `(host, port)` answer for `name`, if any.
    async fn lookup(&self, name: &str) -> Option<(String, u16)>;
}

/// Resolver configured from the host's own resolver settings, the same ones
/// the connect step uses.
#[derive(Debug, Default)]
pub struct SystemSrvResolver;

#[async_trait]
impl SrvResolver for SystemSrvResolver {
    async fn lookup(&self, name: &str) -> Option<(String, u16)> {
        let resolver = match TokioResolver::builder_tokio() {
            Ok(builder) => builder.build(),
            Err(e) => {
                debug!("System resolver unavailable: {}", e);
                return None;
            }
        };

        match resolver.srv_lookup(name).await {
            Ok(lookup) => lookup.iter().next().map(|srv| {
                let target = srv.target().to_utf8();
                (target.trim_end_matches('.').to_string(), srv.port())
            }),
            Err(e) => {
                debug!("No SRV record {}: {}", name, e);
                None
            }
        }
    }
}

pub struct QueryProbe {
    timeout: Duration,
    srv_timeout: Duration,
    capacity: CapacityPolicy,
    srv: Arc<dyn SrvResolver>,
}

impl QueryProbe {
    pub fn new(timeout_ms: u64, capacity: CapacityPolicy) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            srv_timeout: Duration::from_millis(default_srv_timeout()),
            capacity,
            srv: Arc::new(SystemSrvResolver),
        }
    }

    pub fn with_srv_resolver(mut self, srv: Arc<dyn SrvResolver>, timeout_ms: u64) -> Self {
        self.srv = srv;
        self.srv_timeout = Duration::from_millis(timeout_ms);
        self
    }

    /// Connect host and port. The SRV record is only consulted when the
    /// address names neither a port nor an IP literal; a missing, failed or
    /// slow lookup falls back to the default port.
    async fn locate(&self, address: &str) -> Result<(String, u16), QueryError> {
        let (host, port) = split_address(address)?;
        if let Some(port) = port {
            return Ok((host, port));
        }
        if host.parse::<IpAddr>().is_ok() {
            return Ok((host, DEFAULT_QUERY_PORT));
        }

        let srv_name = format!("_minecraft._tcp.{}.", host);
        match tokio::time::timeout(self.srv_timeout, self.srv.lookup(&srv_name)).await {
            Ok(Some((target, port))) => {
                debug!("SRV {} -> {}:{}", srv_name, target, port);
                Ok((target, port))
            }
            Ok(None) => Ok((host, DEFAULT_QUERY_PORT)),
            Err(_) => {
                debug!("SRV lookup for {} timed out after {:?}", host, self.srv_timeout);
                Ok((host, DEFAULT_QUERY_PORT))
            }
        }
    }
}

async fn query(host: &str, port: u16) -> Result<StatusResponse, QueryError> {
    debug!("Querying {}:{}", host, port);

    let mut stream = TcpStream::connect((host, port)).await?;
    stream.write_all(&handshake_packet(host, port)).await?;
    stream.write_all(&packet(0x00, &[])).await?;
    stream.flush().await?;

    let json = read_status_packet(&mut stream).await?;
    Ok(serde_json::from_str(&json)?)
}

#[async_trait]
impl Probe for QueryProbe {
    fn name(&self) -> &str {
        "query"
    }

    fn record_kind(&self) -> RecordKind {
        RecordKind::Timestamped
    }

    fn fault_policy(&self) -> FaultPolicy {
        FaultPolicy::AssumeOffline
    }

    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let address = target.to_string();
        let (host, port) = match self.locate(&address).await {
            Ok(located) => located,
            Err(e) => return ProbeOutcome::Error(e.to_string()),
        };

        let status = match tokio::time::timeout(self.timeout, query(&host, port)).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return ProbeOutcome::Error(e.to_string()),
            Err(_) => return ProbeOutcome::Error(format!("timed out after {:?}", self.timeout)),
        };

        debug!(
            "{} reports {}/{} players ({})",
            address,
            status.players.online,
            status.players.max,
            status.version.as_ref().map_or("unknown version", |v| v.name.as_str())
        );

        match (self.capacity, status.players.max) {
            (CapacityPolicy::ZeroIsOffline, 0) => ProbeOutcome::Offline,
            _ => ProbeOutcome::Online,
        }
    }
}

/// Split `host`, `host:port` or `[v6]:port`.
fn split_address(address: &str) -> Result<(String, Option<u16>), QueryError> {
    let bad = || QueryError::Address(address.to_string());

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(bad)?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host.to_string(), Some(port.parse().map_err(|_| bad())?))),
            None if tail.is_empty() => Ok((host.to_string(), None)),
            None => Err(bad()),
        };
    }

    if address.parse::<IpAddr>().is_ok() {
        return Ok((address.to_string(), None));
    }

    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            Ok((host.to_string(), Some(port.parse().map_err(|_| bad())?)))
        }
        Some(_) => Err(bad()),
        None if address.is_empty() => Err(bad()),
        None => Ok((address.to_string(), None)),
    }
}

fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

fn packet(id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 1);
    write_varint(&mut body, id);
    body.extend_from_slice(payload);

    let mut framed = Vec::with_capacity(body.len() + 5);
    write_varint(&mut framed, body.len() as i32);
    framed.extend_from_slice(&body);
    framed
}

fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    write_varint(&mut payload, PROTOCOL_VERSION);
    write_string(&mut payload, host);
    payload.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut payload, NEXT_STATE_STATUS);
    packet(0x00, &payload)
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, QueryError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = reader.read_u8().await?;
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(QueryError::Protocol("VarInt longer than 5 bytes".into()))
}

fn take_varint(buf: &mut &[u8]) -> Result<i32, QueryError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let (&byte, rest) = buf
            .split_first()
            .ok_or_else(|| QueryError::Protocol("truncated VarInt".into()))?;
        *buf = rest;
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(QueryError::Protocol("VarInt longer than 5 bytes".into()))
}

async fn read_status_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, QueryError> {
    let len = read_varint(reader).await?;
    if !(1..=MAX_PACKET_LEN).contains(&len) {
        return Err(QueryError::Protocol(format!("invalid packet length {}", len)));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;

    let mut cursor = body.as_slice();
    let id = take_varint(&mut cursor)?;
    if id != 0x00 {
        return Err(QueryError::Protocol(format!("unexpected packet id {:#04x}", id)));
    }

    let str_len = take_varint(&mut cursor)?;
    if str_len < 0 || str_len as usize > cursor.len() {
        return Err(QueryError::Protocol(format!("invalid string length {}", str_len)));
    }
    let json = std::str::from_utf8(&cursor[..str_len as usize])
        .map_err(|e| QueryError::Protocol(format!("status is not UTF-8: {}", e)))?;
    Ok(json.to_string())
}
