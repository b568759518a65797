//! The set of supervisors, one per configured server.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use olb_core::{ServerConfig, ServerSnapshot};

use crate::supervisor::{Supervisor, SupervisorContext};

/// Read-only access to supervisor snapshots.
pub trait SnapshotSource: Send + Sync {
    /// Every server, ordered by id.
    fn snapshots(&self) -> Vec<ServerSnapshot>;

    fn snapshot(&self, server_id: &str) -> Option<ServerSnapshot>;
}

#[derive(Debug)]
pub struct SupervisorRegistry {
    ctx: SupervisorContext,
    supervisors: RwLock<HashMap<String, Arc<Supervisor>>>,
}

impl SupervisorRegistry {
    pub fn new(ctx: SupervisorContext) -> Self {
        Self {
            ctx,
            supervisors: RwLock::new(HashMap::new()),
        }
    }

    pub const fn context(&self) -> &SupervisorContext {
        &self.ctx
    }

    pub fn get(&self, server_id: &str) -> Option<Arc<Supervisor>> {
        self.supervisors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(server_id)
            .cloned()
    }

    /// Supervisor for `config.id`, created if missing. An existing
    /// supervisor gets the new config for its next launch.
    pub fn upsert(&self, config: ServerConfig) -> Arc<Supervisor> {
        let mut supervisors = self
            .supervisors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = supervisors.get(&config.id) {
            existing.set_config(config);
            return Arc::clone(existing);
        }
        let supervisor = Supervisor::new(config, self.ctx.clone());
        supervisors.insert(supervisor.id().to_string(), Arc::clone(&supervisor));
        supervisor
    }

    /// Put back a supervisor taken out with [`SupervisorRegistry::remove`].
    pub fn insert(&self, supervisor: Arc<Supervisor>) {
        self.supervisors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(supervisor.id().to_string(), supervisor);
    }

    pub fn remove(&self, server_id: &str) -> Option<Arc<Supervisor>> {
        self.supervisors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(server_id)
    }

    /// All supervisors, ordered by id.
    pub fn all(&self) -> Vec<Arc<Supervisor>> {
        let mut all: Vec<_> = self
            .supervisors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    pub fn len(&self) -> usize {
        self.supervisors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotSource for SupervisorRegistry {
    fn snapshots(&self) -> Vec<ServerSnapshot> {
        self.all().iter().map(|s| s.snapshot()).collect()
    }

    fn snapshot(&self, server_id: &str) -> Option<ServerSnapshot> {
        self.get(server_id).map(|s| s.snapshot())
    }
}
