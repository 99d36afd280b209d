use crate::domain::models::{Block, Item, Reminder, BACKLOG_BLOCK, DEFAULT_BLOCK_COLOR, TODAY_BLOCK};
use serde::{Deserialize, Serialize};

/// Remote row shapes for the three per-user tables. Deserialization is
/// tolerant: every payload field defaults when missing, and historical
/// camelCase spellings are accepted as aliases. Serialization always emits
/// the canonical snake_case columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockRow {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, alias = "builtin", alias = "builtIn")]
    pub built_in: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemRow {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "createdAt")]
    pub created_at: i64,
    #[serde(default, alias = "isDone")]
    pub is_done: bool,
    #[serde(default, alias = "doneAt")]
    pub done_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderRow {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "createdAt")]
    pub created_at: i64,
    #[serde(default, alias = "deliveredAt")]
    pub delivered_at: Option<i64>,
}

pub fn block_from_row(row: BlockRow) -> Block {
    Block {
        id: row.id,
        title: row.title,
        color: if row.color.is_empty() {
            DEFAULT_BLOCK_COLOR.to_string()
        } else {
            row.color
        },
        built_in: row.built_in,
    }
}

pub fn item_from_row(row: ItemRow, now_ms: i64) -> Item {
    Item {
        id: row.id,
        area: if row.area.is_empty() {
            BACKLOG_BLOCK.to_string()
        } else {
            row.area
        },
        title: row.title,
        description: row.description,
        created_at: if row.created_at > 0 { row.created_at } else { now_ms },
        is_done: row.is_done,
        done_at: row.done_at,
    }
}

pub fn reminder_from_row(row: ReminderRow, now_ms: i64) -> Reminder {
    Reminder {
        id: row.id,
        date: row.date,
        area: if row.area.is_empty() {
            TODAY_BLOCK.to_string()
        } else {
            row.area
        },
        title: row.title,
        description: row.description,
        created_at: if row.created_at > 0 { row.created_at } else { now_ms },
        delivered_at: row.delivered_at,
    }
}

pub fn block_to_row(block: &Block, user_id: &str) -> BlockRow {
    BlockRow {
        id: block.id.clone(),
        user_id: user_id.to_string(),
        title: block.title.clone(),
        color: block.color.clone(),
        built_in: block.built_in,
    }
}

pub fn item_to_row(item: &Item, user_id: &str) -> ItemRow {
    ItemRow {
        id: item.id.clone(),
        user_id: user_id.to_string(),
        area: item.area.clone(),
        title: item.title.clone(),
        description: item.description.clone(),
        created_at: item.created_at,
        is_done: item.is_done,
        done_at: item.done_at,
    }
}

pub fn reminder_to_row(reminder: &Reminder, user_id: &str) -> ReminderRow {
    ReminderRow {
        id: reminder.id.clone(),
        user_id: user_id.to_string(),
        date: reminder.date.clone(),
        area: reminder.area.clone(),
        title: reminder.title.clone(),
        description: reminder.description.clone(),
        created_at: reminder.created_at,
        delivered_at: reminder.delivered_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_remote_fields_fall_back_to_defaults() {
        let row: ItemRow = serde_json::from_str(r#"{"id":"i1"}"#).expect("sparse row parses");
        let item = item_from_row(row, 500);
        assert_eq!(item.area, BACKLOG_BLOCK);
        assert_eq!(item.created_at, 500);
        assert!(!item.is_done);
        assert_eq!(item.done_at, None);
    }

    #[test]
    fn legacy_camel_case_columns_are_accepted() {
        let row: ItemRow = serde_json::from_str(
            r#"{"id":"i1","area":"today","title":"t","createdAt":77,"isDone":true,"doneAt":88}"#,
        )
        .expect("legacy row parses");
        let item = item_from_row(row, 0);
        assert_eq!(item.created_at, 77);
        assert!(item.is_done);
        assert_eq!(item.done_at, Some(88));

        let row: BlockRow =
            serde_json::from_str(r#"{"id":"log","builtin":true}"#).expect("legacy block parses");
        assert!(row.built_in);
    }

    #[test]
    fn reminder_row_defaults_area_to_today() {
        let row: ReminderRow =
            serde_json::from_str(r#"{"id":"r1","date":"2025-01-01","title":"t"}"#).expect("parses");
        assert_eq!(reminder_from_row(row, 1).area, TODAY_BLOCK);
    }

    #[test]
    fn serialized_rows_use_canonical_columns() {
        let row = item_to_row(
            &Item {
                id: "i1".to_string(),
                area: "today".to_string(),
                title: "t".to_string(),
                description: String::new(),
                created_at: 9,
                is_done: false,
                done_at: None,
            },
            "user-1",
        );
        let json = serde_json::to_value(&row).expect("serialize");
        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["created_at"], 9);
        assert!(json.get("createdAt").is_none());
    }
}
