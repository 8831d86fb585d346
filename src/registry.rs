use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, RwLock,
};

use eyre::{eyre, Result};
use rusqlite::Connection;
use tracing::debug;

use crate::{db, models::SniperBot};

/// Read-only snapshot of the tracked sniper bots.
///
/// The snapshot is reloaded as a whole on first use and after every
/// `invalidate()`; readers never see a partially refreshed set.
#[derive(Debug)]
pub struct SniperRegistry {
    snapshot: RwLock<Arc<Vec<SniperBot>>>,
    dirty: AtomicBool,
    version: AtomicU64,
}

impl Default for SniperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SniperRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Vec::new())),
            dirty: AtomicBool::new(true),
            version: AtomicU64::new(0),
        }
    }

    /// Mark the snapshot stale; the next lookup reloads it.
    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of invalidations so far
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Current snapshot, reloading from `conn` when stale
    pub fn get(&self, conn: &Connection) -> Result<Arc<Vec<SniperBot>>> {
        if self.dirty.swap(false, Ordering::SeqCst) {
            let bots = match db::list_sniper_bots(conn) {
                Ok(bots) => bots,
                Err(e) => {
                    self.dirty.store(true, Ordering::SeqCst);
                    return Err(e);
                }
            };
            debug!("Sniper registry refreshed with {} bots", bots.len());
            let fresh = Arc::new(bots);
            *self
                .snapshot
                .write()
                .map_err(|_| eyre!("sniper registry lock poisoned"))? = Arc::clone(&fresh);
            return Ok(fresh);
        }

        let snapshot = self
            .snapshot
            .read()
            .map_err(|_| eyre!("sniper registry lock poisoned"))?;
        Ok(Arc::clone(&snapshot))
    }

    /// Tracked bot whose address equals `spender`, ignoring case
    pub fn lookup(&self, conn: &Connection, spender: &str) -> Result<Option<SniperBot>> {
        let bots = self.get(conn)?;
        Ok(bots
            .iter()
            .find(|bot| bot.address.eq_ignore_ascii_case(spender))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, test_conn};

    #[test]
    fn lookup_is_case_insensitive() {
        let conn = test_conn();
        db::insert_sniper_bot(&conn, "banana", "0xC465cc50b7d5a29b9308968f870a4b242a8e1873").unwrap();
        let registry = SniperRegistry::new();

        let hit = registry
            .lookup(&conn, "0xC465CC50B7D5A29B9308968F870A4B242A8E1873")
            .unwrap();
        assert_eq!(hit.map(|b| b.name), Some("banana".to_string()));
        assert!(registry.lookup(&conn, "0x0000000000000000000000000000000000000001").unwrap().is_none());
    }

    #[test]
    fn snapshot_is_stale_until_invalidated() {
        let conn = test_conn();
        let registry = SniperRegistry::new();
        assert!(registry.get(&conn).unwrap().is_empty());

        db::insert_sniper_bot(&conn, "maestro", "0xaa").unwrap();
        assert!(registry.lookup(&conn, "0xaa").unwrap().is_none());

        registry.invalidate();
        assert_eq!(registry.version(), 1);
        assert!(registry.lookup(&conn, "0xAA").unwrap().is_some());
    }

    #[test]
    fn old_snapshots_stay_valid_after_refresh() {
        let conn = test_conn();
        db::insert_sniper_bot(&conn, "banana", "0xb1").unwrap();
        let registry = SniperRegistry::new();
        let before = registry.get(&conn).unwrap();

        db::insert_sniper_bot(&conn, "maestro", "0xb2").unwrap();
        registry.invalidate();
        let after = registry.get(&conn).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
    }
}
