use crate::domain::models::{Block, Item, TODAY_BLOCK};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoardStatus {
    /// No items anywhere.
    Empty,
    Ok,
    /// Undone items in the today block exceed the configured limit.
    Warn,
}

/// Read-only projection of the raw collections. Cache, not state: it is
/// rebuilt in full after every mutation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedView {
    pub blocks: Vec<Block>,
    pub block_by_id: HashMap<String, Block>,
    pub items_by_area: HashMap<String, Vec<Item>>,
    pub status: BoardStatus,
    pub today_limit: u32,
}

/// Pure recomputation of the derived view. Duplicate block ids resolve
/// last-write-wins in `block_by_id`; each area group is ordered newest
/// `created_at` first with a stable tie-break.
pub fn recompute(blocks: &[Block], items: &[Item], today_limit: u32) -> DerivedView {
    let mut block_by_id = HashMap::new();
    for block in blocks {
        block_by_id.insert(block.id.clone(), block.clone());
    }

    // Every block gets a group, empty or not, so lookups by block id
    // always hit.
    let mut items_by_area: HashMap<String, Vec<Item>> = blocks
        .iter()
        .map(|block| (block.id.clone(), Vec::new()))
        .collect();
    for item in items {
        items_by_area
            .entry(item.area.clone())
            .or_default()
            .push(item.clone());
    }
    for group in items_by_area.values_mut() {
        group.sort_by_key(|item| Reverse(item.created_at));
    }

    let today_count = items_by_area
        .get(TODAY_BLOCK)
        .map(|group| group.iter().filter(|item| !item.is_done).count())
        .unwrap_or(0);

    let status = if items.is_empty() {
        BoardStatus::Empty
    } else if today_count <= today_limit as usize {
        BoardStatus::Ok
    } else {
        BoardStatus::Warn
    };

    DerivedView {
        blocks: blocks.to_vec(),
        block_by_id,
        items_by_area,
        status,
        today_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{builtin_blocks, BACKLOG_BLOCK};

    fn item(id: &str, area: &str, created_at: i64, is_done: bool) -> Item {
        Item {
            id: id.to_string(),
            area: area.to_string(),
            title: format!("task {id}"),
            description: String::new(),
            created_at,
            is_done,
            done_at: if is_done { Some(created_at) } else { None },
        }
    }

    #[test]
    fn recompute_is_pure() {
        let blocks = builtin_blocks();
        let items = vec![
            item("a", TODAY_BLOCK, 10, false),
            item("b", BACKLOG_BLOCK, 20, false),
        ];
        let first = recompute(&blocks, &items, 5);
        let second = recompute(&blocks, &items, 5);
        assert_eq!(first, second);
    }

    #[test]
    fn groups_are_sorted_newest_first_with_stable_ties() {
        let blocks = builtin_blocks();
        let items = vec![
            item("old", TODAY_BLOCK, 1, false),
            item("tie-first", TODAY_BLOCK, 5, false),
            item("tie-second", TODAY_BLOCK, 5, false),
            item("new", TODAY_BLOCK, 9, false),
        ];
        let derived = recompute(&blocks, &items, 5);
        let ids: Vec<&str> = derived.items_by_area[TODAY_BLOCK]
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["new", "tie-first", "tie-second", "old"]);
        assert!(derived.items_by_area[BACKLOG_BLOCK].is_empty());
    }

    #[test]
    fn duplicate_block_ids_resolve_last_write_wins() {
        let mut blocks = builtin_blocks();
        let mut shadow = blocks[0].clone();
        shadow.title = "Shadow".to_string();
        blocks.push(shadow);
        let derived = recompute(&blocks, &[], 5);
        assert_eq!(derived.block_by_id[BACKLOG_BLOCK].title, "Shadow");
    }

    #[test]
    fn status_tracks_today_limit() {
        let blocks = builtin_blocks();
        assert_eq!(recompute(&blocks, &[], 5).status, BoardStatus::Empty);

        let at_limit: Vec<Item> = (0..5)
            .map(|n| item(&format!("i{n}"), TODAY_BLOCK, n, false))
            .collect();
        assert_eq!(recompute(&blocks, &at_limit, 5).status, BoardStatus::Ok);

        let over_limit: Vec<Item> = (0..6)
            .map(|n| item(&format!("i{n}"), TODAY_BLOCK, n, false))
            .collect();
        assert_eq!(recompute(&blocks, &over_limit, 5).status, BoardStatus::Warn);
    }

    #[test]
    fn done_items_do_not_count_toward_the_limit() {
        let blocks = builtin_blocks();
        let mut items: Vec<Item> = (0..6)
            .map(|n| item(&format!("i{n}"), TODAY_BLOCK, n, false))
            .collect();
        items[0].is_done = true;
        assert_eq!(recompute(&blocks, &items, 5).status, BoardStatus::Ok);
    }
}
