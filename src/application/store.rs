use crate::application::delivery::deliver_due;
use crate::domain::derived::{recompute, DerivedView};
use crate::domain::models::{
    local_day_key, next_id, Block, BlockId, BoardSnapshot, Item, Reminder, is_renamable_builtin,
    BACKLOG_BLOCK, LOG_BLOCK, TODAY_BLOCK,
};
use crate::domain::normalize::{normalize_blocks, normalize_items, normalize_reminders};
use crate::infrastructure::snapshot_repository::SnapshotRepository;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::warn;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub title: String,
    pub description: Option<String>,
    pub area: BlockId,
}

#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewBlock {
    pub title: String,
    pub color: String,
}

#[derive(Debug, Clone, Default)]
pub struct BlockEdit {
    pub title: String,
    pub color: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewReminder {
    pub date: String,
    pub area: BlockId,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReminderPatch {
    pub date: Option<String>,
    pub area: Option<BlockId>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Input for the bulk-replace entry point. The sync engine and startup
/// loader both funnel through this.
#[derive(Debug, Clone, Default)]
pub struct SetAllInput {
    pub blocks: Vec<Block>,
    pub items: Vec<Item>,
    pub reminders: Vec<Reminder>,
    pub today_limit: Option<u32>,
}

impl From<BoardSnapshot> for SetAllInput {
    fn from(snapshot: BoardSnapshot) -> Self {
        Self {
            blocks: snapshot.blocks,
            items: snapshot.items,
            reminders: snapshot.reminders,
            today_limit: Some(snapshot.today_limit),
        }
    }
}

struct BoardState {
    snapshot: BoardSnapshot,
    derived: DerivedView,
}

/// The single source of truth for the running process. Owns the raw
/// collections and their derived view; every action is synchronous and
/// total — invalid input (blank title, unknown id) is a silent no-op, never
/// an error. Effective mutations recompute the derived view, bump the
/// revision counter, persist best-effort, and notify watchers.
pub struct TaskStore {
    state: Mutex<BoardState>,
    snapshot_repository: Arc<dyn SnapshotRepository>,
    now_provider: NowProvider,
    revision: AtomicU64,
    change_tx: watch::Sender<u64>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore").finish_non_exhaustive()
    }
}

impl TaskStore {
    pub fn new(snapshot_repository: Arc<dyn SnapshotRepository>) -> Self {
        let snapshot = BoardSnapshot::default();
        let derived = recompute(&snapshot.blocks, &snapshot.items, snapshot.today_limit);
        let (change_tx, _) = watch::channel(0);

        Self {
            state: Mutex::new(BoardState { snapshot, derived }),
            snapshot_repository,
            now_provider: Arc::new(Local::now),
            revision: AtomicU64::new(0),
            change_tx,
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn now_ms(&self) -> i64 {
        (self.now_provider)().timestamp_millis()
    }

    pub fn today_key(&self) -> String {
        local_day_key((self.now_provider)())
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Watch channel carrying the revision; receivers see the value at
    /// subscription time as already seen.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.change_tx.subscribe()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        match self.state.lock() {
            Ok(state) => state.snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().snapshot.clone(),
        }
    }

    pub fn derived(&self) -> DerivedView {
        match self.state.lock() {
            Ok(state) => state.derived.clone(),
            Err(poisoned) => poisoned.into_inner().derived.clone(),
        }
    }

    /// Runs one atomic action. The closure reports whether it changed the
    /// snapshot; only then do recompute, revision bump, persistence, and
    /// watcher notification happen.
    fn mutate<F>(&self, action: F) -> bool
    where
        F: FnOnce(&mut BoardSnapshot) -> bool,
    {
        let Ok(mut state) = self.state.lock() else {
            warn!("store lock poisoned; dropping action");
            return false;
        };

        if !action(&mut state.snapshot) {
            return false;
        }

        state.derived = recompute(
            &state.snapshot.blocks,
            &state.snapshot.items,
            state.snapshot.today_limit,
        );

        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;

        // Best effort: a full storage keeps the session in-memory-only.
        if let Err(error) = self.snapshot_repository.save(&state.snapshot) {
            warn!("snapshot persistence failed, continuing in memory: {error}");
        }

        drop(state);
        self.change_tx.send_replace(revision);
        true
    }

    pub fn add_item(&self, input: NewItem) {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return;
        }
        let now_ms = self.now_ms();

        self.mutate(|snapshot| {
            let item = Item {
                id: next_id("item"),
                area: input.area.clone(),
                title,
                description: input.description.as_deref().unwrap_or("").trim().to_string(),
                created_at: now_ms,
                is_done: false,
                done_at: None,
            };
            snapshot.items.insert(0, item);
            true
        });
    }

    pub fn edit_item(&self, id: &str, patch: ItemPatch) {
        let title = patch
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToOwned::to_owned);

        self.mutate(|snapshot| {
            let Some(item) = snapshot.items.iter_mut().find(|item| item.id == id) else {
                return false;
            };
            if let Some(title) = title {
                item.title = title;
            }
            if let Some(description) = patch.description {
                item.description = description.trim().to_string();
            }
            true
        });
    }

    pub fn remove_item(&self, id: &str) {
        self.mutate(|snapshot| {
            let before = snapshot.items.len();
            snapshot.items.retain(|item| item.id != id);
            snapshot.items.len() != before
        });
    }

    /// Flips completion. Becoming done relocates the item to the log block
    /// and stamps `done_at`; becoming undone returns it to today and clears
    /// the stamp. There is no undone-but-in-log state.
    pub fn toggle_done(&self, id: &str) {
        let now_ms = self.now_ms();

        self.mutate(|snapshot| {
            let Some(item) = snapshot.items.iter_mut().find(|item| item.id == id) else {
                return false;
            };
            if item.is_done {
                item.is_done = false;
                item.done_at = None;
                item.area = TODAY_BLOCK.to_string();
            } else {
                item.is_done = true;
                item.done_at = Some(now_ms);
                item.area = LOG_BLOCK.to_string();
            }
            true
        });
    }

    /// Reassigns the item's block. Moving into the log marks it done;
    /// moving out of the log reactivates it; any other move only changes
    /// the area.
    pub fn drop_item_to_area(&self, id: &str, area: &str) {
        let now_ms = self.now_ms();
        let area = area.to_string();

        self.mutate(|snapshot| {
            let Some(item) = snapshot.items.iter_mut().find(|item| item.id == id) else {
                return false;
            };
            if area == LOG_BLOCK {
                item.area = area;
                item.is_done = true;
                item.done_at = Some(now_ms);
            } else if item.area == LOG_BLOCK {
                item.area = area;
                item.is_done = false;
                item.done_at = None;
            } else {
                item.area = area;
            }
            true
        });
    }

    pub fn add_block(&self, input: NewBlock) {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return;
        }

        self.mutate(|snapshot| {
            snapshot.blocks.push(Block {
                id: next_id("block"),
                title,
                color: input.color.clone(),
                built_in: false,
            });
            true
        });
    }

    pub fn rename_block(&self, id: &str, edit: BlockEdit) {
        if id == LOG_BLOCK {
            return;
        }
        let title = edit.title.trim().to_string();
        if title.is_empty() {
            return;
        }

        self.mutate(|snapshot| {
            let Some(block) = snapshot.blocks.iter_mut().find(|block| block.id == id) else {
                return false;
            };
            if block.built_in && !is_renamable_builtin(id) {
                return false;
            }
            block.title = title;
            block.color = edit.color.clone();
            true
        });
    }

    /// Removes a custom block; its items are reassigned to the backlog, not
    /// deleted. Built-in blocks are never removable.
    pub fn remove_block(&self, id: &str) {
        self.mutate(|snapshot| {
            let Some(block) = snapshot.blocks.iter().find(|block| block.id == id) else {
                return false;
            };
            if block.built_in {
                return false;
            }
            for item in snapshot.items.iter_mut() {
                if item.area == id {
                    item.area = BACKLOG_BLOCK.to_string();
                }
            }
            snapshot.blocks.retain(|block| block.id != id);
            true
        });
    }

    pub fn add_reminder(&self, input: NewReminder) {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return;
        }
        let now_ms = self.now_ms();
        // The log block is never a reminder destination.
        let area = if input.area == LOG_BLOCK {
            TODAY_BLOCK.to_string()
        } else {
            input.area.clone()
        };

        self.mutate(|snapshot| {
            snapshot.reminders.insert(
                0,
                Reminder {
                    id: next_id("rem"),
                    date: input.date.clone(),
                    area,
                    title,
                    description: input.description.as_deref().unwrap_or("").trim().to_string(),
                    created_at: now_ms,
                    delivered_at: None,
                },
            );
            true
        });
    }

    pub fn edit_reminder(&self, id: &str, patch: ReminderPatch) {
        let title = patch
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToOwned::to_owned);
        let date = patch
            .date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(ToOwned::to_owned);
        let area = patch.area.filter(|area| area.as_str() != LOG_BLOCK);

        self.mutate(|snapshot| {
            let Some(reminder) = snapshot.reminders.iter_mut().find(|r| r.id == id) else {
                return false;
            };
            if let Some(title) = title {
                reminder.title = title;
            }
            if let Some(date) = date {
                reminder.date = date;
            }
            if let Some(area) = area {
                reminder.area = area;
            }
            if let Some(description) = patch.description {
                reminder.description = description.trim().to_string();
            }
            true
        });
    }

    pub fn remove_reminder(&self, id: &str) {
        self.mutate(|snapshot| {
            let before = snapshot.reminders.len();
            snapshot.reminders.retain(|reminder| reminder.id != id);
            snapshot.reminders.len() != before
        });
    }

    /// Scans reminders and promotes due ones into items, at most once per
    /// reminder. Safe to call arbitrarily often: process start, visibility
    /// regain, polling. Returns the number of items materialized.
    pub fn deliver_due_reminders(&self) -> usize {
        let today_key = self.today_key();
        let now_ms = self.now_ms();
        let mut delivered = 0;

        self.mutate(|snapshot| {
            let created = deliver_due(&mut snapshot.reminders, &today_key, now_ms);
            if created.is_empty() {
                return false;
            }
            delivered = created.len();
            // New items go to the head, like freshly added ones.
            for item in created.into_iter().rev() {
                snapshot.items.insert(0, item);
            }
            true
        });

        delivered
    }

    /// Bulk replace: the single entry point for installing a pulled or
    /// loaded snapshot. All three collections are re-normalized together so
    /// item/reminder repair sees the *new* block set.
    pub fn set_all(&self, input: SetAllInput) {
        let now_ms = self.now_ms();

        self.mutate(|snapshot| {
            let blocks = normalize_blocks(&input.blocks);
            let items = normalize_items(&input.items, &blocks, now_ms);
            let reminders = normalize_reminders(&input.reminders, &blocks, now_ms);

            snapshot.blocks = blocks;
            snapshot.items = items;
            snapshot.reminders = reminders;
            if let Some(limit) = input.today_limit {
                snapshot.today_limit = limit;
            }
            true
        });
    }

    pub fn set_today_limit(&self, limit: u32) {
        self.mutate(|snapshot| {
            if snapshot.today_limit == limit {
                return false;
            }
            snapshot.today_limit = limit;
            true
        });
    }
}
