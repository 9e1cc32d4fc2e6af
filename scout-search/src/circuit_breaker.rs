//! Per-host cool-down driven by repeated HTTP 429 responses.
//!
//! Every host has its own circuit. Consecutive rate-limit responses trip
//! it open; while open, requests to that host fail fast without touching
//! the network. After the cool-down window one probe is let through.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N × 429     ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├─────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘              └────────┘             └────┬─────┘
//!     │                        ▲                      │
//!     │  success               │  429                 │
//!     └────────────────────────┴──────────────────────┘
//! ```
//!
//! The breaker is owned by a run's transport, never process-global.

use crate::config::CooldownConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Circuit state for a single host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    /// Rate limited; requests are refused until the cool-down elapses.
    Open,
    /// Cool-down elapsed; one probe request decides the next state.
    HalfOpen,
}

#[derive(Debug, Clone)]
struct HostHealth {
    state: CircuitState,
    consecutive_rate_limits: u32,
    opened_at: Option<Instant>,
}

impl Default for HostHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_rate_limits: 0,
            opened_at: None,
        }
    }
}

/// Shared per-host breaker. Interior mutability lets every task of a run
/// consult the same instance through an `Arc`.
#[derive(Debug)]
pub struct HostCooldown {
    config: CooldownConfig,
    hosts: Mutex<HashMap<String, HostHealth>>,
}

impl HostCooldown {
    pub fn new(config: CooldownConfig) -> Self {
        Self {
            config,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn with_host<R>(&self, host: &str, f: impl FnOnce(&mut HostHealth) -> R) -> R {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        f(hosts.entry(host.to_owned()).or_default())
    }

    /// Any non-429 answer closes the circuit.
    pub fn record_success(&self, host: &str) {
        self.with_host(host, |health| {
            health.state = CircuitState::Closed;
            health.consecutive_rate_limits = 0;
            health.opened_at = None;
        });
    }

    /// Count a 429. Returns `true` when this response opened the circuit.
    pub fn record_rate_limited(&self, host: &str) -> bool {
        let threshold = self.config.rate_limit_threshold;
        self.with_host(host, |health| {
            health.consecutive_rate_limits += 1;
            let should_open = health.state == CircuitState::HalfOpen
                || health.consecutive_rate_limits >= threshold;
            if should_open && health.state != CircuitState::Open {
                health.state = CircuitState::Open;
                health.opened_at = Some(Instant::now());
                return true;
            }
            false
        })
    }

    /// Whether a request to `host` may be sent now.
    pub fn should_attempt(&self, host: &str) -> bool {
        let cooldown_secs = self.config.cooldown_secs;
        self.with_host(host, |health| match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = health
                    .opened_at
                    .is_none_or(|t| t.elapsed().as_secs() >= cooldown_secs);
                if elapsed {
                    health.state = CircuitState::HalfOpen;
                }
                elapsed
            }
        })
    }

    pub fn host_status(&self, host: &str) -> CircuitState {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.get(host).map_or(CircuitState::Closed, |h| h.state)
    }

    /// Hosts currently refusing requests.
    pub fn open_hosts(&self) -> Vec<String> {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        let mut open: Vec<String> = hosts
            .iter()
            .filter(|(_, h)| h.state == CircuitState::Open)
            .map(|(host, _)| host.clone())
            .collect();
        open.sort();
        open
    }
}
