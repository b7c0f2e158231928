//! Persisted team-mapping snapshot and its in-process holder.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::errors::{SettingsError, SettingsResult};
use crate::models::TeamSnapshot;

/// Write `snapshot` to `path`, replacing any previous document.
///
/// The JSON is written to a sibling temp file and renamed into place so a
/// concurrent reader sees either the old or the new document.
pub fn write_snapshot(path: &Path, snapshot: &TeamSnapshot) -> SettingsResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut encoded = serde_json::to_string_pretty(snapshot)?;
    encoded.push('\n');

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            SettingsError::Snapshot(format!("invalid snapshot path {}", path.display()))
        })?;
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&tmp_path, encoded)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read_snapshot(path: &Path) -> SettingsResult<TeamSnapshot> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SettingsError::Snapshot(format!("cannot read {}: {e}", path.display()))
    })?;
    let snapshot: TeamSnapshot = serde_json::from_str(&content)?;
    Ok(snapshot)
}

/// The process-wide snapshot. Readers get a cheap `Arc` to an immutable
/// value; refreshes swap in a whole new value.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<TeamSnapshot>>,
}

impl SnapshotStore {
    pub fn new(snapshot: TeamSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Load `path`, or start empty (every setting `"Unknown"`) when it is
    /// missing or unreadable.
    pub fn load_or_empty(path: &Path) -> Self {
        match read_snapshot(path) {
            Ok(snapshot) => {
                info!(
                    "Loaded team mapping snapshot {} with {} settings",
                    path.display(),
                    snapshot.mapping.len()
                );
                Self::new(snapshot)
            }
            Err(e) => {
                warn!("Starting with an empty team mapping: {e}");
                Self::default()
            }
        }
    }

    pub fn current(&self) -> Arc<TeamSnapshot> {
        Arc::clone(&*self.current.read())
    }

    /// Install `snapshot`, returning the one it replaced.
    pub fn replace(&self, snapshot: TeamSnapshot) -> Arc<TeamSnapshot> {
        let next = Arc::new(snapshot);
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Re-read `path` and install it. On failure the current snapshot stays.
    pub fn reload(&self, path: &Path) -> SettingsResult<Arc<TeamSnapshot>> {
        let snapshot = read_snapshot(path)?;
        self.replace(snapshot);
        Ok(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNKNOWN_TEAM;

    fn sample(team: &str) -> TeamSnapshot {
        let mut snapshot = TeamSnapshot::default();
        snapshot.summary.total_settings = 1;
        snapshot
            .mapping
            .insert("foo_flag_v2".to_string(), team.to_string());
        snapshot
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("team_mapping.json");
        write_snapshot(&path, &sample("Payments")).unwrap();
        let loaded = read_snapshot(&path).unwrap();
        assert_eq!(loaded, sample("Payments"));
        assert!(!dir.path().join("out").join(".team_mapping.json.tmp").exists());
    }

    #[test]
    fn test_document_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("team_mapping.json");
        write_snapshot(&path, &sample("Payments")).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["mapping"]["foo_flag_v2"], "Payments");
        assert_eq!(value["summary"]["total_settings"], 1);
    }

    #[test]
    fn test_load_or_empty_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::load_or_empty(&dir.path().join("missing.json"));
        assert!(store.current().mapping.is_empty());
        assert_eq!(store.current().team_for("anything"), UNKNOWN_TEAM);
    }

    #[test]
    fn test_load_or_empty_on_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("team_mapping.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SnapshotStore::load_or_empty(&path);
        assert!(store.current().mapping.is_empty());
    }

    #[test]
    fn test_replace_keeps_old_readers_consistent() {
        let store = SnapshotStore::new(sample("Payments"));
        let before = store.current();
        let previous = store.replace(sample("Search"));
        assert_eq!(previous.team_for("foo_flag_v2"), "Payments");
        assert_eq!(before.team_for("foo_flag_v2"), "Payments");
        assert_eq!(store.current().team_for("foo_flag_v2"), "Search");
    }

    #[test]
    fn test_failed_reload_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(sample("Payments"));
        assert!(store.reload(&dir.path().join("missing.json")).is_err());
        assert_eq!(store.current().team_for("foo_flag_v2"), "Payments");
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let store = Arc::new(SnapshotStore::new(sample("A")));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = store.current();
                        let team = snap.team_for("foo_flag_v2");
                        assert!(team == "A" || team == "B");
                        assert_eq!(snap.summary.total_settings, 1);
                    }
                })
            })
            .collect();
        for i in 0..200 {
            store.replace(sample(if i % 2 == 0 { "B" } else { "A" }));
        }
        for r in readers {
            r.join().unwrap();
        }
    }
}
