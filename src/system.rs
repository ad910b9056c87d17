//! # Host metrics reported by `status()`.
//!
//! Process uptime plus a small sample of host information from `sysinfo`.

use std::time::{Duration, Instant};

use serde::Serialize;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Process and host metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub uptime_secs: u64,
    /// Human-readable uptime, e.g. `"2h 5m"`.
    pub uptime: String,
    pub pid: u32,
    pub platform: &'static str,
    pub arch: &'static str,
    pub cpus: usize,
    pub total_memory_bytes: u64,
    pub used_memory_bytes: u64,
    /// 1, 5 and 15 minute load averages (zero where unsupported).
    pub load_average: [f64; 3],
}

impl SystemMetrics {
    /// Samples the host now; uptime is measured from `since`.
    pub fn collect(since: Instant) -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        let load = System::load_average();
        let uptime = since.elapsed();

        Self {
            uptime_secs: uptime.as_secs(),
            uptime: format_uptime(uptime),
            pid: std::process::id(),
            platform: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
            total_memory_bytes: sys.total_memory(),
            used_memory_bytes: sys.used_memory(),
            load_average: [load.one, load.five, load.fifteen],
        }
    }
}

/// `"{h}h {m}m"`, with days folded into hours.
pub fn format_uptime(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}
