use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a block (column). Built-in ids are fixed strings; custom
/// blocks get generated ids.
pub type BlockId = String;

pub const BACKLOG_BLOCK: &str = "backlog";
pub const TODAY_BLOCK: &str = "today";
pub const IMPORTANT_BLOCK: &str = "important";
pub const LOG_BLOCK: &str = "log";

pub const DEFAULT_TODAY_LIMIT: u32 = 5;
pub const DEFAULT_BLOCK_COLOR: &str = "rgb(59,130,246)";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub title: String,
    pub color: String,
    pub built_in: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub area: BlockId,
    pub title: String,
    pub description: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub is_done: bool,
    pub done_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub id: String,
    /// Local calendar day, "YYYY-MM-DD".
    pub date: String,
    /// Destination block; never the log block.
    pub area: BlockId,
    pub title: String,
    pub description: String,
    pub created_at: i64,
    /// Set exactly once when the reminder materializes into an item.
    pub delivered_at: Option<i64>,
}

/// The full board at one instant: the unit of persistence and sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub blocks: Vec<Block>,
    pub items: Vec<Item>,
    pub reminders: Vec<Reminder>,
    pub today_limit: u32,
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self {
            blocks: builtin_blocks(),
            items: Vec::new(),
            reminders: Vec::new(),
            today_limit: DEFAULT_TODAY_LIMIT,
        }
    }
}

/// The four permanent blocks, in canonical order.
pub fn builtin_blocks() -> Vec<Block> {
    vec![
        Block {
            id: BACKLOG_BLOCK.to_string(),
            title: "Background".to_string(),
            color: "rgb(249,115,22)".to_string(),
            built_in: true,
        },
        Block {
            id: TODAY_BLOCK.to_string(),
            title: "Today".to_string(),
            color: "rgb(59,130,246)".to_string(),
            built_in: true,
        },
        Block {
            id: IMPORTANT_BLOCK.to_string(),
            title: "Important".to_string(),
            color: "rgb(239,68,68)".to_string(),
            built_in: true,
        },
        Block {
            id: LOG_BLOCK.to_string(),
            title: "Log".to_string(),
            color: "rgb(34,197,94)".to_string(),
            built_in: true,
        },
    ]
}

pub fn is_builtin_id(id: &str) -> bool {
    matches!(id, BACKLOG_BLOCK | TODAY_BLOCK | IMPORTANT_BLOCK | LOG_BLOCK)
}

/// Only these built-ins may be renamed; the log block is immutable.
pub fn is_renamable_builtin(id: &str) -> bool {
    matches!(id, BACKLOG_BLOCK | TODAY_BLOCK | IMPORTANT_BLOCK)
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", chrono::Utc::now().timestamp_micros())
}

/// "YYYY-MM-DD" key for the local calendar day. Day keys compare
/// lexicographically in date order, which reminder delivery relies on.
pub fn local_day_key(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn builtin_blocks_cover_the_four_fixed_ids() {
        let blocks = builtin_blocks();
        let ids: Vec<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec![BACKLOG_BLOCK, TODAY_BLOCK, IMPORTANT_BLOCK, LOG_BLOCK]);
        assert!(blocks.iter().all(|b| b.built_in));
    }

    #[test]
    fn log_block_is_builtin_but_not_renamable() {
        assert!(is_builtin_id(LOG_BLOCK));
        assert!(!is_renamable_builtin(LOG_BLOCK));
        assert!(is_renamable_builtin(TODAY_BLOCK));
        assert!(!is_renamable_builtin("custom-1"));
    }

    #[test]
    fn next_id_is_unique_and_prefixed() {
        let first = next_id("item");
        let second = next_id("item");
        assert_ne!(first, second);
        assert!(first.starts_with("item-"));
    }

    #[test]
    fn local_day_key_pads_month_and_day() {
        let day = Local.with_ymd_and_hms(2025, 3, 7, 23, 59, 0).unwrap();
        assert_eq!(local_day_key(day), "2025-03-07");
    }

    #[test]
    fn default_snapshot_has_builtins_and_limit() {
        let snapshot = BoardSnapshot::default();
        assert_eq!(snapshot.blocks.len(), 4);
        assert!(snapshot.items.is_empty());
        assert!(snapshot.reminders.is_empty());
        assert_eq!(snapshot.today_limit, DEFAULT_TODAY_LIMIT);
    }
}
