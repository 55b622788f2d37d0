//! # Artifact catalog: which owner may run which bot.
//!
//! The supervisor consumes the catalog as a collaborator: before any
//! registry call it asks whether the caller's owner identity actually owns
//! the artifact path. The [`Catalog`] trait is the seam; [`MemoryCatalog`]
//! is the in-process implementation used by the server layer and tests.
//!
//! ## Rules
//! - A path is unique per owner; the same filename under two owners is two
//!   distinct artifacts.
//! - `owns` failing while `known` succeeds maps to `Forbidden`; a path no
//!   owner has maps to `NotFound`.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Owner → artifact paths seam consumed by the supervisor façade.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    /// Registers an artifact path under an owner.
    async fn add(&self, owner: &str, path: &str);

    /// True if `owner` owns `path`.
    async fn owns(&self, owner: &str, path: &str) -> bool;

    /// True if any owner owns `path` (distinguishes forbidden from unknown).
    async fn known(&self, path: &str) -> bool;

    /// Sorted list of the owner's artifact paths.
    async fn list(&self, owner: &str) -> Vec<String>;
}

/// In-memory catalog keyed by owner, values sorted by path.
#[derive(Default)]
pub struct MemoryCatalog {
    bots: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn add(&self, owner: &str, path: &str) {
        let mut bots = self.bots.write().await;
        bots.entry(owner.to_string())
            .or_default()
            .insert(path.to_string());
    }

    async fn owns(&self, owner: &str, path: &str) -> bool {
        let bots = self.bots.read().await;
        bots.get(owner).is_some_and(|set| set.contains(path))
    }

    async fn known(&self, path: &str) -> bool {
        let bots = self.bots.read().await;
        bots.values().any(|set| set.contains(path))
    }

    async fn list(&self, owner: &str) -> Vec<String> {
        let bots = self.bots.read().await;
        bots.get(owner)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ownership_is_per_owner() {
        let cat = MemoryCatalog::new();
        cat.add("alice", "/bots/alice/ping.sh").await;

        assert!(cat.owns("alice", "/bots/alice/ping.sh").await);
        assert!(!cat.owns("bob", "/bots/alice/ping.sh").await);
        assert!(cat.known("/bots/alice/ping.sh").await);
        assert!(!cat.known("/bots/alice/other.sh").await);
    }

    #[tokio::test]
    async fn listing_is_sorted_and_deduplicated() {
        let cat = MemoryCatalog::new();
        cat.add("alice", "/bots/alice/b.sh").await;
        cat.add("alice", "/bots/alice/a.sh").await;
        cat.add("alice", "/bots/alice/a.sh").await;

        assert_eq!(
            cat.list("alice").await,
            vec!["/bots/alice/a.sh".to_string(), "/bots/alice/b.sh".to_string()]
        );
        assert!(cat.list("bob").await.is_empty());
    }
}
