use std::collections::HashSet;
use std::sync::Arc;

use crate::collaborators::CollaboratorRef;
use crate::config::Config;
use crate::error::BuildError;
use crate::state::{LogBuffer, Registry};
use crate::subscribers::{Broadcaster, Subscribe};

use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    collaborators: Vec<CollaboratorRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            collaborators: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Adds a collaborator. Registration order is the order of
    /// `start_all` / `stop_all`.
    pub fn with_collaborator(mut self, collaborator: CollaboratorRef) -> Self {
        self.collaborators.push(collaborator);
        self
    }

    pub fn with_collaborators(mut self, collaborators: impl IntoIterator<Item = CollaboratorRef>) -> Self {
        self.collaborators.extend(collaborators);
        self
    }

    /// Sets in-process event subscribers.
    ///
    /// Each one is driven by a dedicated worker with its own bounded mailbox.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor.
    ///
    /// Attaches subscribers (spawning their workers, so this must be called
    /// inside a Tokio runtime when any are set) and registers every
    /// collaborator as `Unknown`.
    pub fn build(self) -> Result<Arc<Supervisor>, BuildError> {
        if self.collaborators.is_empty() {
            return Err(BuildError::NoCollaborators);
        }
        let mut seen = HashSet::new();
        for c in &self.collaborators {
            if !seen.insert(c.name()) {
                return Err(BuildError::DuplicateService {
                    name: c.name().to_string(),
                });
            }
        }

        let broadcaster = Broadcaster::new(self.cfg.subscriber_capacity);
        for sink in self.subscribers {
            drop(broadcaster.attach(sink));
        }

        let registry = Arc::new(Registry::new(broadcaster.clone()));
        let logs = Arc::new(LogBuffer::new(self.cfg.log_capacity, broadcaster.clone()));
        for c in &self.collaborators {
            registry.register(c.name());
        }

        Ok(Arc::new(Supervisor::new_internal(
            self.cfg,
            broadcaster,
            registry,
            logs,
            self.collaborators,
        )))
    }
}
