use crate::application::store::{SetAllInput, TaskStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::snapshot_repository::{SnapshotRepository, SqliteSnapshotRepository};
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub database_path: PathBuf,
    pub store: Arc<TaskStore>,
}

/// Prepares the on-disk workspace and returns a store seeded from the
/// persisted snapshot. A missing or unreadable snapshot starts the session
/// from defaults (the four built-in blocks, empty collections); it never
/// blocks startup.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let state_dir = workspace_root.join("state");
    let database_path = state_dir.join("calm-control.sqlite");

    fs::create_dir_all(&state_dir)?;
    initialize_database(&database_path)?;

    let repository = Arc::new(SqliteSnapshotRepository::new(&database_path));
    let store = Arc::new(TaskStore::new(repository.clone()));

    match repository.load() {
        Ok(Some(snapshot)) => {
            store.set_all(SetAllInput::from(snapshot));
        }
        Ok(None) => {}
        Err(error) => {
            warn!("persisted snapshot unreadable, starting from defaults: {error}");
        }
    }

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        database_path,
        store,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::store::NewItem;
    use crate::domain::models::TODAY_BLOCK;
    use rusqlite::Connection;
    use tempfile::TempDir;

    #[test]
    fn first_run_starts_from_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let result = bootstrap_workspace(dir.path()).expect("bootstrap");

        assert!(result.database_path.exists());
        let snapshot = result.store.snapshot();
        assert_eq!(snapshot.blocks.len(), 4);
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.today_limit, 5);
    }

    #[test]
    fn restart_restores_the_persisted_board() {
        let dir = TempDir::new().expect("temp dir");
        {
            let result = bootstrap_workspace(dir.path()).expect("first bootstrap");
            result.store.add_item(NewItem {
                title: "carried over".to_string(),
                description: None,
                area: TODAY_BLOCK.to_string(),
            });
        }

        let result = bootstrap_workspace(dir.path()).expect("second bootstrap");
        let snapshot = result.store.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].title, "carried over");
        assert_eq!(snapshot.items[0].area, TODAY_BLOCK);
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_defaults() {
        let dir = TempDir::new().expect("temp dir");
        {
            let result = bootstrap_workspace(dir.path()).expect("first bootstrap");
            result.store.add_item(NewItem {
                title: "soon lost".to_string(),
                description: None,
                area: TODAY_BLOCK.to_string(),
            });
        }

        let database_path = dir.path().join("state").join("calm-control.sqlite");
        let connection = Connection::open(&database_path).expect("open db");
        connection
            .execute("UPDATE board_snapshot SET payload = 'not json' WHERE id = 1", [])
            .expect("corrupt payload");
        drop(connection);

        let result = bootstrap_workspace(dir.path()).expect("bootstrap after corruption");
        let snapshot = result.store.snapshot();
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.blocks.len(), 4);
    }
}
