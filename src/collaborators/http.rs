//! # HTTP endpoint collaborator.
//!
//! Healthy while `GET url` answers with a 2xx status. The self-test reports
//! the status line and round-trip time.

use std::time::Instant;

use async_trait::async_trait;

use crate::collaborators::{Collaborator, Health};
use crate::error::CollaboratorError;

pub struct HttpEndpoint {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_client(name, url, reqwest::Client::new())
    }

    pub fn with_client(name: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn get(&self) -> Result<reqwest::StatusCode, CollaboratorError> {
        let resp = self.client.get(&self.url).send().await?;
        Ok(resp.status())
    }
}

#[async_trait]
impl Collaborator for HttpEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Health {
        match self.get().await {
            Ok(status) if status.is_success() => Health::healthy(format!("HTTP {status}")),
            Ok(status) => Health::unhealthy(format!("HTTP {status} from {}", self.url)),
            Err(err) => Health::unhealthy(err.to_string()),
        }
    }

    async fn start(&self) -> Result<(), CollaboratorError> {
        match self.get().await? {
            status if status.is_success() => Ok(()),
            status => Err(CollaboratorError::new(format!("HTTP {status} from {}", self.url))),
        }
    }

    async fn stop(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn self_test(&self) -> Option<Result<String, CollaboratorError>> {
        let started = Instant::now();
        let result = self.get().await.and_then(|status| {
            if status.is_success() {
                Ok(format!("HTTP {status} in {}ms", started.elapsed().as_millis()))
            } else {
                Err(CollaboratorError::new(format!("HTTP {status}")))
            }
        });
        Some(result)
    }
}
