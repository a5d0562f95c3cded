// src/exec/health.rs

//! Liveness probes for launched programs.
//!
//! A probe is a single attempt with no retries; the retry cadence and the
//! overall window belong to [`Program::run`](crate::exec::Program::run).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::ACCEPT;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Upper bound for a single HTTP request or TCP dial.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// How a program proves it is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthCheck {
    /// No endpoint configured: healthy once the process exists.
    Immediate,
    /// Full URL for a GET request.
    Http(String),
    /// `host:port` to dial.
    Tcp(String),
}

impl FromStr for HealthCheck {
    type Err = String;

    fn from_str(endpoint: &str) -> Result<Self, Self::Err> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Ok(HealthCheck::Immediate);
        }

        let (scheme, rest) = endpoint.split_once("://").ok_or_else(|| {
            format!("health check '{endpoint}' must look like scheme://host:port")
        })?;
        let scheme = scheme.to_lowercase();

        if scheme.contains("http") {
            Ok(HealthCheck::Http(endpoint.to_string()))
        } else if scheme.contains("tcp") {
            if rest.is_empty() {
                return Err(format!("health check '{endpoint}' is missing host:port"));
            }
            Ok(HealthCheck::Tcp(rest.to_string()))
        } else {
            Err(format!(
                "unsupported health check scheme '{scheme}' (expected http or tcp)"
            ))
        }
    }
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthCheck::Immediate => write!(f, "immediate"),
            HealthCheck::Http(url) => write!(f, "{url}"),
            HealthCheck::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Runs probes. Holds the HTTP client so connections can be reused across
/// polls.
#[derive(Debug, Clone)]
pub struct HealthProber {
    http: reqwest::Client,
}

impl HealthProber {
    pub fn new() -> crate::errors::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(anyhow::Error::from)?;
        Ok(Self { http })
    }

    /// One probe attempt.
    pub async fn is_alive(&self, check: &HealthCheck) -> bool {
        match check {
            HealthCheck::Immediate => true,
            HealthCheck::Http(url) => http_alive(&self.http, url).await,
            HealthCheck::Tcp(addr) => tcp_alive(addr).await,
        }
    }
}

/// Any HTTP response, whatever its status, counts as alive. Only transport
/// errors (refused, reset, timed out) count as down.
pub async fn http_alive(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).header(ACCEPT, "application/file").send().await {
        Ok(resp) => {
            trace!(%url, status = %resp.status(), "http probe answered");
            true
        }
        Err(e) => {
            trace!(%url, error = %e, "http probe failed");
            false
        }
    }
}

/// Alive iff a TCP connection to `addr` can be opened. The connection is
/// dropped right away.
pub async fn tcp_alive(addr: &str) -> bool {
    match timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            trace!(%addr, error = %e, "tcp probe failed");
            false
        }
        Err(_) => {
            trace!(%addr, "tcp probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_endpoints() {
        assert_eq!("".parse::<HealthCheck>(), Ok(HealthCheck::Immediate));
        assert_eq!(
            "http://localhost:9999/health".parse::<HealthCheck>(),
            Ok(HealthCheck::Http("http://localhost:9999/health".into()))
        );
        assert_eq!(
            "https://example.com".parse::<HealthCheck>(),
            Ok(HealthCheck::Http("https://example.com".into()))
        );
        assert_eq!(
            "tcp://127.0.0.1:5432".parse::<HealthCheck>(),
            Ok(HealthCheck::Tcp("127.0.0.1:5432".into()))
        );
    }

    #[test]
    fn rejects_unknown_or_malformed_endpoints() {
        assert!("localhost:80".parse::<HealthCheck>().is_err());
        assert!("udp://localhost:53".parse::<HealthCheck>().is_err());
        assert!("tcp://".parse::<HealthCheck>().is_err());
    }

    #[tokio::test]
    async fn immediate_is_always_alive() {
        let prober = HealthProber::new().unwrap();
        assert!(prober.is_alive(&HealthCheck::Immediate).await);
    }

    #[tokio::test]
    async fn tcp_probe_follows_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(tcp_alive(&addr).await);

        drop(listener);
        assert!(!tcp_alive(&addr).await);
    }
}
