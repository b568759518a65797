//! Versioned catalog of every tool the running servers expose.
//!
//! Readers take an `Arc<CatalogSnapshot>` and never observe a half-applied
//! update. Writers build the next snapshot from the current one and swap it
//! in under a short write lock.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use olb_core::{ToolCategory, ToolEntry};

/// Immutable catalog contents at one version.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    version: u64,
    tools: BTreeMap<String, ToolEntry>,
}

impl CatalogSnapshot {
    pub const fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolEntry> {
        self.tools.values()
    }

    pub fn by_server<'a>(&'a self, server_id: &'a str) -> impl Iterator<Item = &'a ToolEntry> {
        self.tools.values().filter(move |t| t.server_id == server_id)
    }

    pub fn by_category(&self, category: ToolCategory) -> impl Iterator<Item = &ToolEntry> {
        self.tools.values().filter(move |t| t.category == category)
    }

    pub fn count_for(&self, server_id: &str) -> usize {
        self.by_server(server_id).count()
    }
}

/// A name previously owned by another server that an update took over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub tool: String,
    pub previous_server_id: String,
}

/// Outcome of one catalog write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogUpdate {
    pub version: u64,
    /// Entries the server owns after the update.
    pub tool_count: usize,
    pub collisions: Vec<Collision>,
}

#[derive(Debug, Default)]
pub struct ToolCatalog {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }

    /// Replace everything `server_id` owns with `entries`.
    ///
    /// A name already owned by a different server is taken over (last
    /// writer wins) and reported as a collision.
    pub fn replace_server(&self, server_id: &str, entries: Vec<ToolEntry>) -> CatalogUpdate {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut tools = current.tools.clone();
        tools.retain(|_, entry| entry.server_id != server_id);

        let mut collisions = Vec::new();
        for entry in entries {
            debug_assert_eq!(entry.server_id, server_id);
            if let Some(previous) = tools.insert(entry.name.clone(), entry) {
                if previous.server_id != server_id {
                    collisions.push(Collision {
                        tool: previous.name,
                        previous_server_id: previous.server_id,
                    });
                }
            }
        }
        let tool_count = tools.values().filter(|t| t.server_id == server_id).count();

        let version = current.version + 1;
        *current = Arc::new(CatalogSnapshot { version, tools });
        CatalogUpdate {
            version,
            tool_count,
            collisions,
        }
    }

    /// Drop every entry `server_id` owns. `None` when it owned nothing.
    pub fn remove_server(&self, server_id: &str) -> Option<CatalogUpdate> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.count_for(server_id) == 0 {
            return None;
        }
        let mut tools = current.tools.clone();
        tools.retain(|_, entry| entry.server_id != server_id);

        let version = current.version + 1;
        *current = Arc::new(CatalogSnapshot { version, tools });
        Some(CatalogUpdate {
            version,
            tool_count: 0,
            collisions: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(server: &str, name: &str) -> ToolEntry {
        ToolEntry {
            name: name.to_string(),
            remote_name: name.to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
            category: ToolCategory::General,
            server_id: server.to_string(),
            actions: None,
        }
    }

    #[test]
    fn test_replace_bumps_version_and_swaps_atomically() {
        let catalog = ToolCatalog::new();
        let before = catalog.snapshot();
        assert_eq!(before.version(), 0);

        let update = catalog.replace_server("a", vec![tool("a", "echo"), tool("a", "ping")]);
        assert_eq!(update.version, 1);
        assert_eq!(update.tool_count, 2);

        // Old readers keep their view.
        assert!(before.is_empty());
        let after = catalog.snapshot();
        assert_eq!(after.len(), 2);

        catalog.replace_server("a", vec![tool("a", "echo")]);
        let latest = catalog.snapshot();
        assert_eq!(latest.version(), 2);
        assert!(latest.get("ping").is_none());
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_collision_last_writer_wins() {
        let catalog = ToolCatalog::new();
        catalog.replace_server("a", vec![tool("a", "echo"), tool("a", "only_a")]);
        let update = catalog.replace_server("b", vec![tool("b", "echo")]);

        assert_eq!(
            update.collisions,
            vec![Collision {
                tool: "echo".into(),
                previous_server_id: "a".into()
            }]
        );
        assert_eq!(update.tool_count, 1);
        let snapshot = catalog.snapshot();
        assert_eq!(snapshot.get("echo").unwrap().server_id, "b");
        assert_eq!(snapshot.count_for("a"), 1);
    }

    #[test]
    fn test_remove_server() {
        let catalog = ToolCatalog::new();
        catalog.replace_server("a", vec![tool("a", "echo")]);
        catalog.replace_server("b", vec![tool("b", "other")]);

        let update = catalog.remove_server("a").unwrap();
        assert_eq!(update.version, 3);
        assert!(catalog.snapshot().get("echo").is_none());
        assert!(catalog.snapshot().get("other").is_some());

        assert!(catalog.remove_server("a").is_none());
        assert_eq!(catalog.version(), 3);
    }

    #[test]
    fn test_filters() {
        let catalog = ToolCatalog::new();
        let mut word = tool("a", "word_insert");
        word.category = ToolCategory::Word;
        catalog.replace_server("a", vec![word, tool("a", "echo")]);
        let snapshot = catalog.snapshot();
        assert_eq!(snapshot.by_category(ToolCategory::Word).count(), 1);
        assert_eq!(snapshot.by_server("a").count(), 2);
        assert_eq!(snapshot.by_server("zzz").count(), 0);
    }
}
