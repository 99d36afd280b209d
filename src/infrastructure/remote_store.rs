use crate::infrastructure::error::InfraError;
use crate::infrastructure::row_mapper::{BlockRow, ItemRow, ReminderRow};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

pub const BLOCKS_TABLE: &str = "blocks";
pub const ITEMS_TABLE: &str = "items";
pub const REMINDERS_TABLE: &str = "reminders";

/// Authenticated scope for every remote operation. Acquisition and renewal
/// of the session happen outside this crate.
#[derive(Debug, Clone)]
pub struct CloudSession {
    pub user_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Default)]
pub struct RemotePullResponse {
    pub blocks: Vec<BlockRow>,
    pub items: Vec<ItemRow>,
    pub reminders: Vec<ReminderRow>,
}

/// Per-user row storage for the three board tables. Supports bulk
/// upsert-by-id and delete-by-exclusion-list; the `*_except` operations
/// with an empty keep list delete all of the user's rows.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn pull(&self, session: &CloudSession) -> Result<RemotePullResponse, InfraError>;

    async fn upsert_blocks(
        &self,
        session: &CloudSession,
        rows: &[BlockRow],
    ) -> Result<(), InfraError>;

    async fn upsert_items(&self, session: &CloudSession, rows: &[ItemRow])
        -> Result<(), InfraError>;

    async fn upsert_reminders(
        &self,
        session: &CloudSession,
        rows: &[ReminderRow],
    ) -> Result<(), InfraError>;

    async fn delete_blocks_except(
        &self,
        session: &CloudSession,
        keep_ids: &[String],
    ) -> Result<(), InfraError>;

    async fn delete_items_except(
        &self,
        session: &CloudSession,
        keep_ids: &[String],
    ) -> Result<(), InfraError>;

    async fn delete_reminders_except(
        &self,
        session: &CloudSession,
        keep_ids: &[String],
    ) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project base URL, e.g. "https://xyz.supabase.co".
    pub base_url: String,
    /// The project's anon/service API key; sent alongside the user token.
    pub api_key: String,
}

/// PostgREST-backed implementation against a hosted Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseRemoteStore {
    client: Client,
    config: SupabaseConfig,
}

impl SupabaseRemoteStore {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Remote(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn ensure_session(session: &CloudSession) -> Result<(), InfraError> {
        Self::ensure_non_empty(&session.user_id, "session user id")?;
        Self::ensure_non_empty(&session.access_token, "session access token")
    }

    fn remote_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("postgrest error: http {}", status.as_u16())
        } else {
            format!("postgrest error: http {}; body={body}", status.as_u16())
        };
        InfraError::Remote(message)
    }

    fn table_endpoint(&self, table: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|error| InfraError::Remote(format!("invalid supabase base url: {error}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Remote("supabase base URL cannot be a base".to_string()))?;
            segments.push("rest");
            segments.push("v1");
            segments.push(table);
        }
        Ok(url)
    }

    /// PostgREST `in` list: `("a","b")` with embedded quotes escaped.
    fn quoted_id_list(ids: &[String]) -> String {
        let escaped: Vec<String> = ids
            .iter()
            .map(|id| format!("\"{}\"", id.replace('"', "\\\"")))
            .collect();
        format!("({})", escaped.join(","))
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        session: &CloudSession,
        table: &str,
    ) -> Result<Vec<T>, InfraError> {
        let mut endpoint = self.table_endpoint(table)?;
        endpoint
            .query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("user_id", &format!("eq.{}", session.user_id));

        let response = self
            .client
            .get(endpoint)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|error| {
                InfraError::Remote(format!("network error while reading {table}: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Remote(format!("failed reading {table} response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::remote_http_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            InfraError::Remote(format!("invalid {table} payload: {error}; body={body}"))
        })
    }

    async fn upsert_rows<T: Serialize + Sync>(
        &self,
        session: &CloudSession,
        table: &str,
        rows: &[T],
    ) -> Result<(), InfraError> {
        Self::ensure_session(session)?;
        if rows.is_empty() {
            return Ok(());
        }

        let mut endpoint = self.table_endpoint(table)?;
        endpoint.query_pairs_mut().append_pair("on_conflict", "id");

        let response = self
            .client
            .post(endpoint)
            .header("apikey", &self.config.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .bearer_auth(&session.access_token)
            .json(rows)
            .send()
            .await
            .map_err(|error| {
                InfraError::Remote(format!("network error while upserting {table}: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Remote(format!("failed reading {table} upsert response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::remote_http_error(status, &body));
        }
        Ok(())
    }

    async fn delete_except(
        &self,
        session: &CloudSession,
        table: &str,
        keep_ids: &[String],
    ) -> Result<(), InfraError> {
        Self::ensure_session(session)?;

        let mut endpoint = self.table_endpoint(table)?;
        {
            let mut pairs = endpoint.query_pairs_mut();
            pairs.append_pair("user_id", &format!("eq.{}", session.user_id));
            // An empty exclusion filter would mean "delete nothing"; the
            // empty local set must instead clear all of the user's rows.
            if !keep_ids.is_empty() {
                pairs.append_pair("id", &format!("not.in.{}", Self::quoted_id_list(keep_ids)));
            }
        }

        let response = self
            .client
            .delete(endpoint)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|error| {
                InfraError::Remote(format!("network error while trimming {table}: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Remote(format!("failed reading {table} delete response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::remote_http_error(status, &body));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SupabaseRemoteStore {
    async fn pull(&self, session: &CloudSession) -> Result<RemotePullResponse, InfraError> {
        Self::ensure_session(session)?;

        let blocks = self.fetch_rows(session, BLOCKS_TABLE).await?;
        let items = self.fetch_rows(session, ITEMS_TABLE).await?;
        let reminders = self.fetch_rows(session, REMINDERS_TABLE).await?;

        Ok(RemotePullResponse {
            blocks,
            items,
            reminders,
        })
    }

    async fn upsert_blocks(
        &self,
        session: &CloudSession,
        rows: &[BlockRow],
    ) -> Result<(), InfraError> {
        self.upsert_rows(session, BLOCKS_TABLE, rows).await
    }

    async fn upsert_items(
        &self,
        session: &CloudSession,
        rows: &[ItemRow],
    ) -> Result<(), InfraError> {
        self.upsert_rows(session, ITEMS_TABLE, rows).await
    }

    async fn upsert_reminders(
        &self,
        session: &CloudSession,
        rows: &[ReminderRow],
    ) -> Result<(), InfraError> {
        self.upsert_rows(session, REMINDERS_TABLE, rows).await
    }

    async fn delete_blocks_except(
        &self,
        session: &CloudSession,
        keep_ids: &[String],
    ) -> Result<(), InfraError> {
        self.delete_except(session, BLOCKS_TABLE, keep_ids).await
    }

    async fn delete_items_except(
        &self,
        session: &CloudSession,
        keep_ids: &[String],
    ) -> Result<(), InfraError> {
        self.delete_except(session, ITEMS_TABLE, keep_ids).await
    }

    async fn delete_reminders_except(
        &self,
        session: &CloudSession,
        keep_ids: &[String],
    ) -> Result<(), InfraError> {
        self.delete_except(session, REMINDERS_TABLE, keep_ids).await
    }
}

#[derive(Debug, Default)]
struct InMemoryTables {
    blocks: HashMap<String, BlockRow>,
    items: HashMap<String, ItemRow>,
    reminders: HashMap<String, ReminderRow>,
}

/// In-process `RemoteStore` with the same per-user scoping and
/// delete-by-exclusion semantics as the hosted store.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    tables: Mutex<InMemoryTables>,
}

impl InMemoryRemoteStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryTables>, InfraError> {
        self.tables
            .lock()
            .map_err(|error| InfraError::InvalidState(format!("remote tables lock poisoned: {error}")))
    }

    pub fn block_ids(&self, user_id: &str) -> Vec<String> {
        let tables = self.tables.lock().expect("remote tables lock");
        let mut ids: Vec<String> = tables
            .blocks
            .values()
            .filter(|row| row.user_id == user_id)
            .map(|row| row.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn item_ids(&self, user_id: &str) -> Vec<String> {
        let tables = self.tables.lock().expect("remote tables lock");
        let mut ids: Vec<String> = tables
            .items
            .values()
            .filter(|row| row.user_id == user_id)
            .map(|row| row.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn reminder_ids(&self, user_id: &str) -> Vec<String> {
        let tables = self.tables.lock().expect("remote tables lock");
        let mut ids: Vec<String> = tables
            .reminders
            .values()
            .filter(|row| row.user_id == user_id)
            .map(|row| row.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn seed_blocks(&self, rows: Vec<BlockRow>) {
        let mut tables = self.tables.lock().expect("remote tables lock");
        for row in rows {
            tables.blocks.insert(row.id.clone(), row);
        }
    }

    pub fn seed_items(&self, rows: Vec<ItemRow>) {
        let mut tables = self.tables.lock().expect("remote tables lock");
        for row in rows {
            tables.items.insert(row.id.clone(), row);
        }
    }

    pub fn seed_reminders(&self, rows: Vec<ReminderRow>) {
        let mut tables = self.tables.lock().expect("remote tables lock");
        for row in rows {
            tables.reminders.insert(row.id.clone(), row);
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn pull(&self, session: &CloudSession) -> Result<RemotePullResponse, InfraError> {
        let tables = self.lock()?;
        Ok(RemotePullResponse {
            blocks: tables
                .blocks
                .values()
                .filter(|row| row.user_id == session.user_id)
                .cloned()
                .collect(),
            items: tables
                .items
                .values()
                .filter(|row| row.user_id == session.user_id)
                .cloned()
                .collect(),
            reminders: tables
                .reminders
                .values()
                .filter(|row| row.user_id == session.user_id)
                .cloned()
                .collect(),
        })
    }

    async fn upsert_blocks(
        &self,
        _session: &CloudSession,
        rows: &[BlockRow],
    ) -> Result<(), InfraError> {
        let mut tables = self.lock()?;
        for row in rows {
            tables.blocks.insert(row.id.clone(), row.clone());
        }
        Ok(())
    }

    async fn upsert_items(
        &self,
        _session: &CloudSession,
        rows: &[ItemRow],
    ) -> Result<(), InfraError> {
        let mut tables = self.lock()?;
        for row in rows {
            tables.items.insert(row.id.clone(), row.clone());
        }
        Ok(())
    }

    async fn upsert_reminders(
        &self,
        _session: &CloudSession,
        rows: &[ReminderRow],
    ) -> Result<(), InfraError> {
        let mut tables = self.lock()?;
        for row in rows {
            tables.reminders.insert(row.id.clone(), row.clone());
        }
        Ok(())
    }

    async fn delete_blocks_except(
        &self,
        session: &CloudSession,
        keep_ids: &[String],
    ) -> Result<(), InfraError> {
        let mut tables = self.lock()?;
        tables
            .blocks
            .retain(|id, row| row.user_id != session.user_id || keep_ids.contains(id));
        Ok(())
    }

    async fn delete_items_except(
        &self,
        session: &CloudSession,
        keep_ids: &[String],
    ) -> Result<(), InfraError> {
        let mut tables = self.lock()?;
        tables
            .items
            .retain(|id, row| row.user_id != session.user_id || keep_ids.contains(id));
        Ok(())
    }

    async fn delete_reminders_except(
        &self,
        session: &CloudSession,
        keep_ids: &[String],
    ) -> Result<(), InfraError> {
        let mut tables = self.lock()?;
        tables
            .reminders
            .retain(|id, row| row.user_id != session.user_id || keep_ids.contains(id));
        Ok(())
    }
}
