use crate::domain::models::{
    builtin_blocks, Block, Item, Reminder, BACKLOG_BLOCK, DEFAULT_BLOCK_COLOR, LOG_BLOCK,
    TODAY_BLOCK,
};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// Restores the store's block invariants on any bulk-ingested collection:
/// the four built-in ids always exist, built-in status cannot be unset by
/// corrupted data, titles fall back to the id, and built-ins sort first
/// (stable within each group).
pub fn normalize_blocks(incoming: &[Block]) -> Vec<Block> {
    let mut ordered: Vec<Block> = Vec::with_capacity(incoming.len() + 4);
    let mut index_by_id: HashMap<String, usize> = HashMap::new();

    for block in incoming {
        match index_by_id.get(&block.id) {
            // Duplicate id: last write wins, position of the first is kept.
            Some(&position) => ordered[position] = block.clone(),
            None => {
                index_by_id.insert(block.id.clone(), ordered.len());
                ordered.push(block.clone());
            }
        }
    }

    for default in builtin_blocks() {
        match index_by_id.get(&default.id) {
            Some(&position) => ordered[position].built_in = true,
            None => {
                index_by_id.insert(default.id.clone(), ordered.len());
                ordered.push(default);
            }
        }
    }

    let mut out: Vec<Block> = ordered
        .into_iter()
        .map(|block| {
            let title = block.title.trim().to_string();
            let color = block.color.trim().to_string();
            Block {
                title: if title.is_empty() { block.id.clone() } else { title },
                color: if color.is_empty() {
                    DEFAULT_BLOCK_COLOR.to_string()
                } else {
                    color
                },
                ..block
            }
        })
        .collect();

    out.sort_by_key(|block| !block.built_in);
    out
}

/// Repairs items against the (already normalized) block set: unknown areas
/// fall back to the backlog, blank titles are dropped, and non-positive
/// `created_at` values are replaced with `now_ms`. Output is newest-first.
pub fn normalize_items(incoming: &[Item], blocks: &[Block], now_ms: i64) -> Vec<Item> {
    let block_ids: HashSet<&str> = blocks.iter().map(|b| b.id.as_str()).collect();

    let mut out: Vec<Item> = incoming
        .iter()
        .map(|item| {
            let area = if block_ids.contains(item.area.as_str()) {
                item.area.clone()
            } else {
                BACKLOG_BLOCK.to_string()
            };
            Item {
                id: item.id.clone(),
                area,
                title: item.title.trim().to_string(),
                description: item.description.trim().to_string(),
                created_at: if item.created_at > 0 { item.created_at } else { now_ms },
                is_done: item.is_done,
                done_at: item.done_at,
            }
        })
        .filter(|item| !item.title.is_empty())
        .collect();

    out.sort_by_key(|item| Reverse(item.created_at));
    out
}

/// Same repair shape as items, except the log block is never a valid
/// destination (repaired to today) and blank dates are dropped.
pub fn normalize_reminders(incoming: &[Reminder], blocks: &[Block], now_ms: i64) -> Vec<Reminder> {
    let block_ids: HashSet<&str> = blocks
        .iter()
        .map(|b| b.id.as_str())
        .filter(|id| *id != LOG_BLOCK)
        .collect();

    let mut out: Vec<Reminder> = incoming
        .iter()
        .map(|reminder| {
            let area = if block_ids.contains(reminder.area.as_str()) {
                reminder.area.clone()
            } else {
                TODAY_BLOCK.to_string()
            };
            Reminder {
                id: reminder.id.clone(),
                date: reminder.date.trim().to_string(),
                area,
                title: reminder.title.trim().to_string(),
                description: reminder.description.trim().to_string(),
                created_at: if reminder.created_at > 0 {
                    reminder.created_at
                } else {
                    now_ms
                },
                delivered_at: reminder.delivered_at,
            }
        })
        .filter(|reminder| !reminder.title.is_empty() && !reminder.date.is_empty())
        .collect();

    out.sort_by_key(|reminder| Reverse(reminder.created_at));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::IMPORTANT_BLOCK;
    use proptest::prelude::*;

    fn block(id: &str, title: &str, built_in: bool) -> Block {
        Block {
            id: id.to_string(),
            title: title.to_string(),
            color: "rgb(1,2,3)".to_string(),
            built_in,
        }
    }

    fn item(id: &str, area: &str, title: &str, created_at: i64) -> Item {
        Item {
            id: id.to_string(),
            area: area.to_string(),
            title: title.to_string(),
            description: String::new(),
            created_at,
            is_done: false,
            done_at: None,
        }
    }

    fn reminder(id: &str, date: &str, area: &str, title: &str) -> Reminder {
        Reminder {
            id: id.to_string(),
            date: date.to_string(),
            area: area.to_string(),
            title: title.to_string(),
            description: String::new(),
            created_at: 100,
            delivered_at: None,
        }
    }

    #[test]
    fn missing_builtins_are_restored() {
        let out = normalize_blocks(&[block("custom-1", "Custom", false)]);
        let ids: HashSet<&str> = out.iter().map(|b| b.id.as_str()).collect();
        for required in [BACKLOG_BLOCK, TODAY_BLOCK, IMPORTANT_BLOCK, LOG_BLOCK] {
            assert!(ids.contains(required), "missing built-in {required}");
        }
    }

    #[test]
    fn corrupted_builtin_flag_is_forced_back() {
        let out = normalize_blocks(&[block(LOG_BLOCK, "Log", false)]);
        let log = out.iter().find(|b| b.id == LOG_BLOCK).unwrap();
        assert!(log.built_in);
        // Loaded fields other than the flag are kept.
        assert_eq!(log.color, "rgb(1,2,3)");
    }

    #[test]
    fn blank_title_falls_back_to_id() {
        let out = normalize_blocks(&[block("custom-1", "   ", false)]);
        let custom = out.iter().find(|b| b.id == "custom-1").unwrap();
        assert_eq!(custom.title, "custom-1");
    }

    #[test]
    fn builtins_sort_first_preserving_relative_order() {
        let out = normalize_blocks(&[
            block("custom-b", "B", false),
            block(TODAY_BLOCK, "Today", true),
            block("custom-a", "A", false),
            block(BACKLOG_BLOCK, "Background", true),
        ]);
        let ids: Vec<&str> = out.iter().map(|b| b.id.as_str()).collect();
        // Input built-ins first in input order, then restored built-ins,
        // then customs in input order.
        assert_eq!(
            ids,
            vec![TODAY_BLOCK, BACKLOG_BLOCK, IMPORTANT_BLOCK, LOG_BLOCK, "custom-b", "custom-a"]
        );
    }

    #[test]
    fn dangling_item_area_is_repaired_to_backlog() {
        let blocks = normalize_blocks(&[]);
        let out = normalize_items(&[item("i1", "deleted-block-id", "keep me", 10)], &blocks, 99);
        assert_eq!(out[0].area, BACKLOG_BLOCK);
    }

    #[test]
    fn blank_item_titles_are_dropped() {
        let blocks = normalize_blocks(&[]);
        let out = normalize_items(
            &[item("i1", TODAY_BLOCK, "  ", 10), item("i2", TODAY_BLOCK, "ok", 5)],
            &blocks,
            99,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "i2");
    }

    #[test]
    fn invalid_created_at_defaults_to_now() {
        let blocks = normalize_blocks(&[]);
        let out = normalize_items(&[item("i1", TODAY_BLOCK, "t", 0)], &blocks, 4242);
        assert_eq!(out[0].created_at, 4242);
    }

    #[test]
    fn log_is_never_a_valid_reminder_area() {
        let blocks = normalize_blocks(&[]);
        let out = normalize_reminders(&[reminder("r1", "2025-01-01", LOG_BLOCK, "t")], &blocks, 99);
        assert_eq!(out[0].area, TODAY_BLOCK);
    }

    #[test]
    fn reminders_without_a_date_are_dropped() {
        let blocks = normalize_blocks(&[]);
        let out = normalize_reminders(
            &[
                reminder("r1", "", TODAY_BLOCK, "no date"),
                reminder("r2", "2025-01-01", TODAY_BLOCK, "kept"),
            ],
            &blocks,
            99,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "r2");
    }

    fn arbitrary_item() -> impl Strategy<Value = Item> {
        (
            "[a-z0-9]{1,8}",
            prop_oneof![
                Just(TODAY_BLOCK.to_string()),
                Just(BACKLOG_BLOCK.to_string()),
                "[a-z]{1,6}"
            ],
            "[ a-z]{0,12}",
            -5i64..1_000_000,
            any::<bool>(),
        )
            .prop_map(|(id, area, title, created_at, is_done)| Item {
                id,
                area,
                title,
                description: String::new(),
                created_at,
                is_done,
                done_at: None,
            })
    }

    proptest! {
        // Normalization is idempotent: a second pass changes nothing.
        #[test]
        fn normalize_items_is_idempotent(items in prop::collection::vec(arbitrary_item(), 0..24)) {
            let blocks = normalize_blocks(&[]);
            let once = normalize_items(&items, &blocks, 7_777);
            let twice = normalize_items(&once, &blocks, 9_999);
            prop_assert_eq!(once, twice);
        }
    }
}
