//! # LogWriter: events to `tracing`
//!
//! Mirrors the activity log into the process log at the matching level, so
//! operators tailing stdout see what dashboard observers see.
//!
//! ## Example output
//! ```text
//! INFO  servicevisor: [log] id=4 Restarting whatsapp
//! WARN  servicevisor: [log] id=5 whatsapp restart failed: session expired
//! DEBUG servicevisor: [status] services=4 running=3 seq=18
//! INFO  servicevisor: [logs-cleared]
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::error::DeliveryError;
use crate::events::{Event, EventKind};
use crate::state::LogLevel;
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) -> Result<(), DeliveryError> {
        match &e.kind {
            EventKind::LogAppend(entry) => match entry.level {
                LogLevel::Info | LogLevel::Success => {
                    info!(target: "servicevisor", "[log] id={} {}", entry.id, entry.message)
                }
                LogLevel::Warning => {
                    warn!(target: "servicevisor", "[log] id={} {}", entry.id, entry.message)
                }
                LogLevel::Error => {
                    error!(target: "servicevisor", "[log] id={} {}", entry.id, entry.message)
                }
            },
            EventKind::StatusUpdate(snapshot) => {
                let running = snapshot
                    .services
                    .values()
                    .filter(|r| r.status.is_running())
                    .count();
                debug!(
                    target: "servicevisor",
                    "[status] services={} running={} seq={}",
                    snapshot.len(),
                    running,
                    e.seq
                );
            }
            EventKind::LogsCleared => {
                info!(target: "servicevisor", "[logs-cleared]");
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
