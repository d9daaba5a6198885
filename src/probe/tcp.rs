use std::future::Future;
use std::io::{self, ErrorKind};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use super::{FaultPolicy, Probe, ProbeOutcome};
use crate::models::{RecordKind, Target};

pub fn default_timeout() -> u64 {
    2000
}

/// Plain TCP connect. An open port counts as online; no bytes are exchanged.
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn name(&self) -> &str {
        "tcp"
    }

    fn record_kind(&self) -> RecordKind {
        RecordKind::Simple
    }

    fn fault_policy(&self) -> FaultPolicy {
        FaultPolicy::AssumeOffline
    }

    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let Target::Endpoint { ip, port } = target else {
            return ProbeOutcome::Error(format!("{} is not an ip:port endpoint", target));
        };

        self.settle(target, TcpStream::connect((ip.as_str(), *port)))
            .await
    }
}

impl TcpProbe {
    /// Race `connect` against the timeout. Refusals and timeouts are a plain
    /// "offline"; anything else is reported as an error.
    async fn settle<S, F>(&self, target: &Target, connect: F) -> ProbeOutcome
    where
        F: Future<Output = io::Result<S>>,
    {
        let start = std::time::Instant::now();
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => {
                debug!(
                    "TCP handshake with {} succeeded in {:.1}ms",
                    target,
                    start.elapsed().as_secs_f64() * 1000.0
                );
                ProbeOutcome::Online
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!("Connection refused by {}", target);
                ProbeOutcome::Offline
            }
            Ok(Err(e)) => ProbeOutcome::Error(format!("connect to {} failed: {}", target, e)),
            Err(_) => {
                debug!("Port timeout after {:?} on {}", self.timeout, target);
                ProbeOutcome::Offline
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::net::TcpListener;

    fn endpoint(port: u16) -> Target {
        Target::Endpoint {
            ip: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn accepting_listener_is_online() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let outcome = TcpProbe::new(default_timeout()).probe(&endpoint(port)).await;
        assert_eq!(outcome, ProbeOutcome::Online);
    }

    #[tokio::test]
    async fn closed_port_is_offline_without_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let start = Instant::now();
        let outcome = TcpProbe::new(default_timeout()).probe(&endpoint(port)).await;

        assert_eq!(outcome, ProbeOutcome::Offline);
        assert!(start.elapsed() < Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn stalled_connect_is_offline_after_timeout() {
        let tcp = TcpProbe::new(150);

        let start = Instant::now();
        let outcome = tcp
            .settle(&endpoint(27015), std::future::pending::<io::Result<TcpStream>>())
            .await;

        assert_eq!(outcome, ProbeOutcome::Offline);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(150), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    }

    #[tokio::test]
    async fn unexpected_connect_error_is_reported() {
        let outcome = TcpProbe::new(default_timeout())
            .settle(&endpoint(27015), async {
                Err::<TcpStream, _>(io::Error::from(ErrorKind::PermissionDenied))
            })
            .await;

        match outcome {
            ProbeOutcome::Error(detail) => {
                assert!(detail.starts_with("connect to 127.0.0.1:27015 failed:"), "{detail}")
            }
            other => panic!("expected ProbeOutcome::Error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn host_target_is_rejected() {
        let outcome = TcpProbe::new(default_timeout())
            .probe(&Target::Host("mc.example.org".to_string()))
            .await;
        assert!(matches!(outcome, ProbeOutcome::Error(_)), "{outcome:?}");
    }
}
