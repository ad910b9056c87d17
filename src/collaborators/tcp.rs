//! # TCP endpoint collaborator.
//!
//! Healthy while `host:port` accepts connections. `stop()` marks the
//! endpoint as paused so probes report it stopped until the next `start()`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::collaborators::{Collaborator, Health};
use crate::error::CollaboratorError;

pub struct TcpEndpoint {
    name: String,
    addr: String,
    paused: AtomicBool,
}

impl TcpEndpoint {
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            paused: AtomicBool::new(false),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<(), CollaboratorError> {
        let stream = TcpStream::connect(&self.addr).await?;
        debug!(service = %self.name, peer = ?stream.peer_addr().ok(), "tcp probe connected");
        Ok(())
    }
}

#[async_trait]
impl Collaborator for TcpEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Health {
        if self.paused.load(Ordering::Acquire) {
            return Health::unhealthy(format!("{} paused", self.addr));
        }
        match self.connect().await {
            Ok(()) => Health::healthy(format!("accepting connections on {}", self.addr)),
            Err(err) => Health::unhealthy(format!("{}: {err}", self.addr)),
        }
    }

    async fn start(&self) -> Result<(), CollaboratorError> {
        self.paused.store(false, Ordering::Release);
        self.connect().await
    }

    async fn stop(&self) -> Result<(), CollaboratorError> {
        self.paused.store(true, Ordering::Release);
        Ok(())
    }
}
