//! # Synchronous Client API
//!
//! Purpose: Expose a compact, blocking API over one Redis Stack connection:
//! health checks, plain keys, search indexes over hash records, and JSON
//! documents.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `StackClient` hides connection setup and reply
//!    decoding.
//! 2. **Lazy Handle**: the connection is opened on first use and owned by
//!    exactly one client; `&mut self` receivers rule out shared use.
//! 3. **Explicit Lifecycle**: `close` drops the handle; the next call opens a
//!    fresh one. `scoped` ties that to a lexical block.
//! 4. **Thin Errors**: only `ping` and `drop_search_index` recover from
//!    failures; everything else surfaces the native error.

use std::ops::{Deref, DerefMut};

use redis::{Connection, ConnectionLike, Value};
use serde::Serialize;
use tracing::{debug, warn};

use stackkv_common::ConnectionSettings;

use crate::error::{is_connection_failure, is_unknown_index, StoreError, StoreResult};
use crate::reply::{self, ModuleInfo, SearchResults, ServerInfo};
use crate::schema::{create_index_args, FieldValue, SchemaField, SearchQuery};

/// Outcome of [`StackClient::drop_search_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// The index existed and was removed.
    Dropped,
    /// There was no index by that name.
    Missing,
}

/// Builds the `redis` connection parameters for `settings`.
pub fn connection_info(settings: &ConnectionSettings) -> redis::ConnectionInfo {
    redis::ConnectionInfo {
        addr: redis::ConnectionAddr::Tcp(settings.host().to_string(), settings.port()),
        redis: redis::RedisConnectionInfo {
            password: settings.password().map(str::to_string),
            ..Default::default()
        },
    }
}

/// Synchronous Redis Stack client holding at most one live connection.
pub struct StackClient {
    settings: ConnectionSettings,
    connection: Option<Connection>,
}

impl StackClient {
    /// Creates a client. No connection is made until the first command.
    pub fn new(settings: ConnectionSettings) -> Self {
        StackClient {
            settings,
            connection: None,
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Whether a connection handle is currently held.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns the live connection, opening one if none is held or the held
    /// one has been closed by the transport.
    pub fn connection(&mut self) -> StoreResult<&mut Connection> {
        let connection = match self.connection.take() {
            Some(conn) if conn.is_open() => conn,
            Some(_) => {
                debug!(server = %self.settings, "discarding closed connection");
                self.open()?
            }
            None => self.open()?,
        };
        Ok(self.connection.insert(connection))
    }

    fn open(&self) -> StoreResult<Connection> {
        let client = redis::Client::open(connection_info(&self.settings))?;
        let connection = client.get_connection()?;
        debug!(server = %self.settings, "opened connection");
        Ok(connection)
    }

    /// Releases the connection handle, if any.
    pub fn close(&mut self) {
        if self.connection.take().is_some() {
            debug!(server = %self.settings, "closed connection");
        }
    }

    /// Borrows the client for a block; the connection is closed when the
    /// returned guard is dropped, including on early return or unwind.
    pub fn scoped(&mut self) -> ScopedClient<'_> {
        ScopedClient { client: self }
    }

    /// Checks that the server answers.
    ///
    /// Transport failures are reported as `Ok(false)` and the handle is
    /// discarded so the next call reconnects.
    pub fn ping(&mut self) -> StoreResult<bool> {
        let result = self
            .connection()
            .and_then(|conn| Ok(redis::cmd("PING").query::<String>(conn)?));
        match result {
            Ok(reply) => Ok(reply.eq_ignore_ascii_case("PONG")),
            Err(StoreError::Redis(err)) if is_connection_failure(&err) => {
                warn!(server = %self.settings, error = %err, "ping failed");
                self.close();
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Server status and metadata from `INFO`.
    pub fn get_info(&mut self) -> StoreResult<ServerInfo> {
        let raw: String = redis::cmd("INFO").query(self.connection()?)?;
        Ok(reply::parse_info(&raw))
    }

    /// Server version, or `"unknown"` when `INFO` does not report one.
    pub fn get_version(&mut self) -> StoreResult<String> {
        let mut info = self.get_info()?;
        Ok(info
            .remove("redis_version")
            .unwrap_or_else(|| "unknown".to_string()))
    }

    pub fn list_modules(&mut self) -> StoreResult<Vec<ModuleInfo>> {
        let raw: Value = redis::cmd("MODULE").arg("LIST").query(self.connection()?)?;
        reply::parse_module_list(&raw)
    }

    /// True if a loaded module's name matches `name` exactly.
    pub fn has_module(&mut self, name: &str) -> StoreResult<bool> {
        Ok(self.list_modules()?.iter().any(|module| module.name == name))
    }

    pub fn set_key(&mut self, key: &str, value: &str) -> StoreResult<bool> {
        let raw: Value = redis::cmd("SET").arg(key).arg(value).query(self.connection()?)?;
        Ok(reply::is_ok(&raw))
    }

    /// Returns `None` when the key does not exist.
    pub fn get_key(&mut self, key: &str) -> StoreResult<Option<String>> {
        Ok(redis::cmd("GET").arg(key).query(self.connection()?)?)
    }

    /// Deletes keys and returns how many of them existed.
    pub fn delete_keys<K: AsRef<str>>(&mut self, keys: &[K]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key.as_ref());
        }
        Ok(cmd.query(self.connection()?)?)
    }

    /// Creates a full-text index over hash records whose key starts with
    /// `prefix`. Fails with the server's error if the index already exists.
    pub fn create_search_index(
        &mut self,
        name: &str,
        prefix: &str,
        schema: &[SchemaField],
    ) -> StoreResult<()> {
        redis::cmd("FT.CREATE")
            .arg(create_index_args(name, prefix, schema))
            .query::<()>(self.connection()?)?;
        debug!(index = name, prefix, fields = schema.len(), "created search index");
        Ok(())
    }

    /// Drops an index. A missing index is not an error.
    pub fn drop_search_index(&mut self, name: &str) -> StoreResult<DropOutcome> {
        let result = redis::cmd("FT.DROPINDEX")
            .arg(name)
            .query::<()>(self.connection()?);
        match result {
            Ok(()) => {
                debug!(index = name, "dropped search index");
                Ok(DropOutcome::Dropped)
            }
            Err(err) if is_unknown_index(&err) => {
                debug!(index = name, "search index already absent");
                Ok(DropOutcome::Missing)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Writes a hash record. Returns true when at least one new field was
    /// created.
    pub fn add_document<F: AsRef<str>>(
        &mut self,
        key: &str,
        fields: &[(F, FieldValue)],
    ) -> StoreResult<bool> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field.as_ref()).arg(value.to_string());
        }
        let added: u64 = cmd.query(self.connection()?)?;
        Ok(added > 0)
    }

    /// Runs a scored full-text query with the server's default paging.
    pub fn search(&mut self, index: &str, query: &str) -> StoreResult<SearchResults> {
        self.search_with(index, &SearchQuery::new(query).with_scores())
    }

    pub fn search_with(&mut self, index: &str, query: &SearchQuery) -> StoreResult<SearchResults> {
        let raw: Value = redis::cmd("FT.SEARCH")
            .arg(query.to_args(index))
            .query(self.connection()?)?;
        reply::parse_search(&raw, query.scores_requested())
    }

    /// Writes `value` at `path` inside the JSON document stored at `key`.
    pub fn set_json_value<T>(&mut self, key: &str, path: &str, value: &T) -> StoreResult<bool>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(value)?;
        let raw: Value = redis::cmd("JSON.SET")
            .arg(key)
            .arg(path)
            .arg(payload)
            .query(self.connection()?)?;
        Ok(reply::is_ok(&raw))
    }

    /// Reads the JSON document at `key`, or the nodes matched by `path`.
    ///
    /// Path reads come back exactly as the server returns them: a `$` path
    /// yields an array with one element per matched node, so
    /// `$.profile.age` reads as `[30]`.
    pub fn get_json_value(
        &mut self,
        key: &str,
        path: Option<&str>,
    ) -> StoreResult<Option<serde_json::Value>> {
        let mut cmd = redis::cmd("JSON.GET");
        cmd.arg(key);
        if let Some(path) = path {
            cmd.arg(path);
        }
        let raw: Option<String> = cmd.query(self.connection()?)?;
        raw.map(|text| serde_json::from_str(&text))
            .transpose()
            .map_err(StoreError::from)
    }
}

impl Drop for StackClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// RAII guard returned by [`StackClient::scoped`].
///
/// Dereferences to the client and closes its connection on drop.
pub struct ScopedClient<'a> {
    client: &'a mut StackClient,
}

impl Deref for ScopedClient<'_> {
    type Target = StackClient;

    fn deref(&self) -> &StackClient {
        &*self.client
    }
}

impl DerefMut for ScopedClient<'_> {
    fn deref_mut(&mut self) -> &mut StackClient {
        &mut *self.client
    }
}

impl Drop for ScopedClient<'_> {
    fn drop(&mut self) {
        self.client.close();
    }
}

#[cfg(test)]
mod tests {
    use stackkv_common::SettingsOverrides;

    use super::*;

    fn settings(password: Option<&str>) -> ConnectionSettings {
        let overrides = SettingsOverrides {
            host: Some("cache.internal".into()),
            port: Some(6390),
            password: password.map(str::to_string),
        };
        ConnectionSettings::resolve(overrides, |_: &str| None).unwrap()
    }

    #[test]
    fn connection_info_carries_settings() {
        let info = connection_info(&settings(Some("secret")));
        match &info.addr {
            redis::ConnectionAddr::Tcp(host, port) => {
                assert_eq!(host, "cache.internal");
                assert_eq!(*port, 6390);
            }
            other => panic!("unexpected address {other:?}"),
        }
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
        assert_eq!(info.redis.db, 0);
    }

    #[test]
    fn new_client_is_lazy() {
        let client = StackClient::new(settings(None));
        assert!(!client.is_connected());
        assert_eq!(client.settings().port(), 6390);
    }

    #[test]
    fn close_without_connection_is_noop() {
        let mut client = StackClient::new(settings(None));
        client.close();
        {
            let scoped = client.scoped();
            assert!(!scoped.is_connected());
        }
        assert!(!client.is_connected());
    }
}
