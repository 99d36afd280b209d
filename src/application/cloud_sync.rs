use crate::application::debounce::Debouncer;
use crate::application::store::{SetAllInput, TaskStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::remote_store::{CloudSession, RemoteStore};
use crate::infrastructure::row_mapper::{
    block_from_row, block_to_row, item_from_row, item_to_row, reminder_from_row, reminder_to_row,
};
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Quiet period before a state change is pushed; rapid successive edits
/// within the window coalesce into one round-trip.
pub const PUSH_QUIET_PERIOD: Duration = Duration::from_millis(600);

const NEVER_PUSHED: u64 = u64::MAX;

/// Synchronizes the local store with the per-user remote row sets: one pull
/// at session start, then a debounced push of the full snapshot after every
/// local change. Reconciliation is last-write-wins at snapshot granularity —
/// no field merge, no conflict detection.
///
/// Pushes are single-flight: an in-flight push blocks the next one, which
/// then reads the newest snapshot, so a slow push can never overwrite a
/// newer one.
pub struct CloudSyncService<R: RemoteStore> {
    remote: Arc<R>,
    store: Arc<TaskStore>,
    debouncer: Debouncer,
    push_flight: tokio::sync::Mutex<()>,
    last_pushed_revision: AtomicU64,
}

impl<R: RemoteStore + 'static> CloudSyncService<R> {
    pub fn new(remote: Arc<R>, store: Arc<TaskStore>) -> Self {
        Self {
            remote,
            store,
            debouncer: Debouncer::new(PUSH_QUIET_PERIOD),
            push_flight: tokio::sync::Mutex::new(()),
            last_pushed_revision: AtomicU64::new(NEVER_PUSHED),
        }
    }

    pub fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.debouncer = Debouncer::new(quiet);
        self
    }

    /// Fetches the remote snapshot and installs it through the store's bulk
    /// entry point. Mapping tolerates sparse rows; ordering matches what
    /// the store would produce anyway.
    pub async fn pull(&self, session: &CloudSession) -> Result<(), InfraError> {
        let response = self.remote.pull(session).await?;
        let now_ms = self.store.now_ms();

        let mut blocks: Vec<_> = response.blocks.into_iter().map(block_from_row).collect();
        let mut items: Vec<_> = response
            .items
            .into_iter()
            .map(|row| item_from_row(row, now_ms))
            .collect();
        let mut reminders: Vec<_> = response
            .reminders
            .into_iter()
            .map(|row| reminder_from_row(row, now_ms))
            .collect();

        blocks.sort_by_key(|block| !block.built_in);
        items.sort_by_key(|item| Reverse(item.created_at));
        reminders.sort_by_key(|reminder| Reverse(reminder.created_at));

        debug!(
            blocks = blocks.len(),
            items = items.len(),
            reminders = reminders.len(),
            "installing pulled snapshot"
        );

        self.store.set_all(SetAllInput {
            blocks,
            items,
            reminders,
            today_limit: None,
        });
        Ok(())
    }

    /// Pull once (failure is non-fatal; the app continues with local
    /// state), then push after every store change until the store goes
    /// away. Spawn this on the session's runtime.
    pub async fn run(self: Arc<Self>, session: CloudSession) {
        if let Err(error) = self.pull(&session).await {
            warn!("cloud pull failed, continuing with local state: {error}");
        }

        let mut changes = self.store.subscribe();
        loop {
            if changes.changed().await.is_err() {
                break;
            }
            let service = Arc::clone(&self);
            let session = session.clone();
            self.debouncer.schedule(async move {
                if let Err(error) = service.push_now(&session).await {
                    // The revision stays unpushed, so the next local
                    // mutation retries naturally.
                    warn!("cloud push failed: {error}");
                }
            });
        }
    }

    /// Pushes the current snapshot immediately: upsert all three row sets,
    /// then trim remote rows absent from the local id sets so the remote
    /// exactly mirrors local state. An empty local collection clears all of
    /// the user's rows for that table.
    pub async fn push_now(&self, session: &CloudSession) -> Result<(), InfraError> {
        let _flight = self.push_flight.lock().await;

        let revision = self.store.revision();
        if revision == self.last_pushed_revision.load(Ordering::Acquire) {
            return Ok(());
        }
        let snapshot = self.store.snapshot();

        let block_rows: Vec<_> = snapshot
            .blocks
            .iter()
            .map(|block| block_to_row(block, &session.user_id))
            .collect();
        let item_rows: Vec<_> = snapshot
            .items
            .iter()
            .map(|item| item_to_row(item, &session.user_id))
            .collect();
        let reminder_rows: Vec<_> = snapshot
            .reminders
            .iter()
            .map(|reminder| reminder_to_row(reminder, &session.user_id))
            .collect();

        self.remote.upsert_blocks(session, &block_rows).await?;
        self.remote.upsert_items(session, &item_rows).await?;
        self.remote.upsert_reminders(session, &reminder_rows).await?;

        let block_ids: Vec<String> = snapshot.blocks.iter().map(|b| b.id.clone()).collect();
        let item_ids: Vec<String> = snapshot.items.iter().map(|i| i.id.clone()).collect();
        let reminder_ids: Vec<String> = snapshot.reminders.iter().map(|r| r.id.clone()).collect();

        self.remote.delete_blocks_except(session, &block_ids).await?;
        self.remote.delete_items_except(session, &item_ids).await?;
        self.remote
            .delete_reminders_except(session, &reminder_ids)
            .await?;

        self.last_pushed_revision.store(revision, Ordering::Release);
        debug!(revision, "pushed snapshot to remote");
        Ok(())
    }

    pub fn stop(&self) {
        self.debouncer.cancel();
    }
}
