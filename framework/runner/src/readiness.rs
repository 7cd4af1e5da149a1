//! Waiting for the server under test to accept TCP connections.

use std::future::Future;
use std::time::Duration;

use perf_harness_core::prelude::{PerfError, PerfResult};
use tokio::net::TcpStream;

/// Budget for the readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// The port the server listens on once it is ready.
    pub port: u16,
    /// How many connection attempts are made before giving up.
    pub max_attempts: usize,
    /// How long to sleep between two failed attempts.
    pub interval: Duration,
}

impl Default for ReadinessConfig {
    /// A five minute startup budget for the server on port 8082.
    fn default() -> Self {
        Self {
            port: 8082,
            max_attempts: 300,
            interval: Duration::from_secs(1),
        }
    }
}

/// A single readiness check.
pub trait Probe {
    /// Returns true once the target is ready.
    fn probe(&mut self) -> impl Future<Output = bool>;
}

/// Readiness is signalled solely by TCP acceptance on `localhost:<port>`.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    port: u16,
}

impl TcpProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl Probe for TcpProbe {
    async fn probe(&mut self) -> bool {
        match TcpStream::connect(("localhost", self.port)).await {
            Ok(stream) => {
                // The probe connection is closed straight away, only acceptance matters.
                drop(stream);
                true
            }
            Err(e) => {
                log::trace!("Port {} not ready yet: {e}", self.port);
                false
            }
        }
    }
}

/// Block until `localhost:<port>` accepts a connection.
///
/// Returns the number of attempts that were needed.
pub async fn wait_for_port(config: &ReadinessConfig) -> PerfResult<usize> {
    wait_until_ready(&mut TcpProbe::new(config.port), config).await
}

/// Run `probe` until it succeeds, at most [ReadinessConfig::max_attempts] times, sleeping
/// [ReadinessConfig::interval] between failed attempts.
///
/// Success on attempt `K` means `K` probes and `K - 1` sleeps. No sleep follows the final failed
/// attempt.
pub async fn wait_until_ready<P: Probe>(probe: &mut P, config: &ReadinessConfig) -> PerfResult<usize> {
    for attempt in 1..=config.max_attempts {
        if probe.probe().await {
            log::debug!(
                "Port {} ready after {attempt} attempt(s)",
                config.port
            );
            return Ok(attempt);
        }

        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval).await;
        }
    }

    Err(PerfError::Timeout {
        port: config.port,
        attempts: config.max_attempts,
    })
}
