//! Loop Monitor - detects a wedged control thread
//!
//! The control loop records a heartbeat at the end of every cycle. A driver call
//! that never returns stops the heartbeat, and [`LoopMonitor::check`] reports
//! how stale it is instead of "alive".
//!
//! **App Start Relative Time Pattern**:
//! - Uses monotonic time anchored to application start
//! - Unaffected by system clock changes (NTP, manual adjustments)
//! - Safe to store in AtomicU64 for lock-free access

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global anchor point for monotonic time
static APP_START: OnceLock<Instant> = OnceLock::new();

/// Monotonic time as microseconds since app start
fn get_monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Result of a liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Last cycle completed within the ping life
    Alive,
    /// No completed cycle for this long
    Stalled(Duration),
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        matches!(self, Liveness::Alive)
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Liveness::Alive => f.write_str("ping"),
            Liveness::Stalled(age) => write!(
                f,
                "Last control thread time check was {:.3} s ago",
                age.as_secs_f64()
            ),
        }
    }
}

/// Control loop heartbeat
pub struct LoopMonitor {
    last_cycle: AtomicU64,
    ping_life: Duration,
}

impl LoopMonitor {
    /// Create a monitor; the heartbeat starts at "now"
    pub fn new(ping_life: Duration) -> Self {
        Self {
            last_cycle: AtomicU64::new(get_monotonic_micros()),
            ping_life,
        }
    }

    /// Record a completed cycle (control thread only)
    pub fn beat(&self) {
        self.last_cycle.store(get_monotonic_micros(), Ordering::Relaxed);
    }

    /// Time since the last completed cycle
    pub fn since_last_beat(&self) -> Duration {
        let last = self.last_cycle.load(Ordering::Relaxed);
        let now = get_monotonic_micros();
        Duration::from_micros(now.saturating_sub(last))
    }

    pub fn ping_life(&self) -> Duration {
        self.ping_life
    }

    pub fn check(&self) -> Liveness {
        let age = self.since_last_beat();
        if age > self.ping_life {
            Liveness::Stalled(age)
        } else {
            Liveness::Alive
        }
    }
}

/// Daemon status summary returned by `get_status`
#[derive(Debug, Clone, PartialEq)]
pub enum DaemonStatus {
    Running,
    /// Some units are in `bad_hardware`
    HardwareError(Vec<String>),
    /// Control loop is stale
    PingError(Duration),
    /// Shut down
    Stopped,
}

impl fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonStatus::Running => f.write_str("running"),
            DaemonStatus::HardwareError(units) => write!(f, "hardware_error:{}", units.join(",")),
            DaemonStatus::PingError(age) => write!(f, "ping_error:{:.1}s", age.as_secs_f64()),
            DaemonStatus::Stopped => f.write_str("running_error"),
        }
    }
}
