//! # Endpoint specifications.
//!
//! ```text
//! database=tcp://127.0.0.1:27017
//! whatsapp=http://127.0.0.1:3001/health
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::collaborators::{CollaboratorRef, HttpEndpoint, TcpEndpoint};
use crate::error::EndpointError;

/// A named endpoint to supervise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSpec {
    Tcp { name: String, addr: String },
    Http { name: String, url: String },
}

impl EndpointSpec {
    pub fn name(&self) -> &str {
        match self {
            EndpointSpec::Tcp { name, .. } | EndpointSpec::Http { name, .. } => name,
        }
    }

    /// Builds the collaborator for this endpoint.
    pub fn into_collaborator(self) -> CollaboratorRef {
        match self {
            EndpointSpec::Tcp { name, addr } => Arc::new(TcpEndpoint::new(name, addr)),
            EndpointSpec::Http { name, url } => Arc::new(HttpEndpoint::new(name, url)),
        }
    }
}

impl FromStr for EndpointSpec {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, target) = s
            .split_once('=')
            .ok_or_else(|| EndpointError::Malformed { input: s.to_string() })?;
        let name = name.trim();
        let target = target.trim();
        if name.is_empty() {
            return Err(EndpointError::Malformed { input: s.to_string() });
        }

        if let Some(addr) = target.strip_prefix("tcp://") {
            if addr.is_empty() {
                return Err(EndpointError::Malformed { input: s.to_string() });
            }
            return Ok(EndpointSpec::Tcp {
                name: name.to_string(),
                addr: addr.to_string(),
            });
        }
        if target.starts_with("http://") || target.starts_with("https://") {
            return Ok(EndpointSpec::Http {
                name: name.to_string(),
                url: target.to_string(),
            });
        }
        Err(EndpointError::UnsupportedScheme {
            input: target.to_string(),
        })
    }
}

impl fmt::Display for EndpointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointSpec::Tcp { name, addr } => write!(f, "{name}=tcp://{addr}"),
            EndpointSpec::Http { name, url } => write!(f, "{name}={url}"),
        }
    }
}
