//! Supervised collaborators.
//!
//! - [`Collaborator`] the probe / start / stop contract
//! - [`TcpEndpoint`] healthy while a TCP port accepts connections
//! - [`HttpEndpoint`] healthy while a URL answers 2xx
//! - [`EndpointSpec`] `name=tcp://host:port` / `name=http://...` parsed from CLI or env

mod collaborator;
mod endpoint;
mod http;
mod tcp;

pub use collaborator::{Collaborator, CollaboratorRef, Health};
pub use endpoint::EndpointSpec;
pub use http::HttpEndpoint;
pub use tcp::TcpEndpoint;
