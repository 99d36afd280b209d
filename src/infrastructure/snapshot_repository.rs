use crate::domain::models::BoardSnapshot;
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// On-device persistence of the full board as one keyed blob, rewritten on
/// every state change and read once at startup.
pub trait SnapshotRepository: Send + Sync {
    fn load(&self) -> Result<Option<BoardSnapshot>, InfraError>;
    fn save(&self, snapshot: &BoardSnapshot) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSnapshotRepository {
    db_path: PathBuf,
}

impl SqliteSnapshotRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl SnapshotRepository for SqliteSnapshotRepository {
    fn load(&self) -> Result<Option<BoardSnapshot>, InfraError> {
        let connection = self.connect()?;
        let payload: Option<String> = connection
            .query_row("SELECT payload FROM board_snapshot WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let snapshot: BoardSnapshot = serde_json::from_str(&payload)?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &BoardSnapshot) -> Result<(), InfraError> {
        let payload = serde_json::to_string(snapshot)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO board_snapshot (id, payload, saved_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
               payload = excluded.payload,
               saved_at = excluded.saved_at",
            params![payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    snapshot: Mutex<Option<BoardSnapshot>>,
}

impl SnapshotRepository for InMemorySnapshotRepository {
    fn load(&self) -> Result<Option<BoardSnapshot>, InfraError> {
        let snapshot = self
            .snapshot
            .lock()
            .map_err(|error| InfraError::InvalidState(format!("snapshot lock poisoned: {error}")))?;
        Ok(snapshot.clone())
    }

    fn save(&self, snapshot: &BoardSnapshot) -> Result<(), InfraError> {
        let mut slot = self
            .snapshot
            .lock()
            .map_err(|error| InfraError::InvalidState(format!("snapshot lock poisoned: {error}")))?;
        *slot = Some(snapshot.clone());
        Ok(())
    }
}

/// Test double that fails every write, for exercising the swallowed
/// persistence-failure path.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FailingSnapshotRepository;

#[cfg(test)]
impl SnapshotRepository for FailingSnapshotRepository {
    fn load(&self) -> Result<Option<BoardSnapshot>, InfraError> {
        Ok(None)
    }

    fn save(&self, _snapshot: &BoardSnapshot) -> Result<(), InfraError> {
        Err(InfraError::InvalidState("storage unavailable".to_string()))
    }
}
