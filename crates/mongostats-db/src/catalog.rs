//! User and role listing, negotiated once per connection from the server
//! version. Servers before 2.6 have no `usersInfo`/`rolesInfo` commands.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Database;

use mongostats_core::error::{ProbeError, ProbeResult};
use mongostats_core::value::ProbeValue;

use crate::convert::{bson_to_value, document_to_value, probe_error};

/// Returned by servers whose user data still uses the 2.4 schema.
const AUTH_SCHEMA_INCOMPATIBLE: i32 = 69;

#[async_trait]
pub trait UserCatalog: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_users(&self, db: &Database) -> ProbeResult<ProbeValue>;

    async fn list_roles(&self, db: &Database) -> ProbeResult<ProbeValue>;
}

/// `usersInfo` / `rolesInfo`, available from 2.6.
pub struct CommandCatalog;

/// Reads `system.users` directly; there are no custom roles.
pub struct LegacyCatalog;

async fn read_system_users(db: &Database) -> ProbeResult<ProbeValue> {
    let users: Vec<Document> = db
        .collection::<Document>("system.users")
        .find(doc! {})
        .await
        .map_err(|e| probe_error(&e))?
        .try_collect()
        .await
        .map_err(|e| probe_error(&e))?;
    Ok(ProbeValue::Array(
        users.into_iter().map(document_to_value).collect(),
    ))
}

fn reply_array(mut reply: Document, key: &str) -> ProbeValue {
    match reply.remove(key) {
        Some(items @ Bson::Array(_)) => bson_to_value(items),
        _ => ProbeValue::Array(Vec::new()),
    }
}

/// Whether a failed `usersInfo` means "old user schema, read the collection".
fn needs_legacy_users(err: &ProbeError) -> bool {
    err.code == Some(AUTH_SCHEMA_INCOMPATIBLE)
        || (err.code.is_none() && err.message == "no such cmd: usersInfo")
}

#[async_trait]
impl UserCatalog for CommandCatalog {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn list_users(&self, db: &Database) -> ProbeResult<ProbeValue> {
        match db.run_command(doc! { "usersInfo": 1 }).await {
            Ok(reply) => Ok(reply_array(reply, "users")),
            Err(e) => {
                let err = probe_error(&e);
                if needs_legacy_users(&err) {
                    tracing::debug!(database = %db.name(), "usersInfo unsupported, reading system.users");
                    read_system_users(db).await
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn list_roles(&self, db: &Database) -> ProbeResult<ProbeValue> {
        let reply = db
            .run_command(doc! { "rolesInfo": 1, "showPrivileges": false, "showBuiltinRoles": false })
            .await
            .map_err(|e| probe_error(&e))?;
        Ok(reply_array(reply, "roles"))
    }
}

#[async_trait]
impl UserCatalog for LegacyCatalog {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn list_users(&self, db: &Database) -> ProbeResult<ProbeValue> {
        read_system_users(db).await
    }

    async fn list_roles(&self, _db: &Database) -> ProbeResult<ProbeValue> {
        Ok(ProbeValue::from("No custom roles"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: i64,
    pub minor: i64,
    pub patch: i64,
}

impl ServerVersion {
    pub const fn new(major: i64, minor: i64, patch: i64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Read from a `buildInfo` reply: `versionArray` first, then `version`.
    pub fn from_build_info(build_info: &Document) -> Option<Self> {
        if let Ok(parts) = build_info.get_array("versionArray") {
            let nums: Vec<i64> = parts
                .iter()
                .filter_map(|p| match p {
                    Bson::Int32(n) => Some(i64::from(*n)),
                    Bson::Int64(n) => Some(*n),
                    Bson::Double(d) => Some(*d as i64),
                    _ => None,
                })
                .collect();
            if nums.len() >= 2 {
                return Some(Self::new(nums[0], nums[1], nums.get(2).copied().unwrap_or(0)));
            }
        }

        let version = build_info.get_str("version").ok()?;
        let mut parts = version
            .split(['.', '-'])
            .map(|p| p.parse::<i64>().ok());
        let major = parts.next()??;
        let minor = parts.next()??;
        let patch = parts.next().flatten().unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }

    pub fn supports_user_commands(&self) -> bool {
        *self >= Self::new(2, 6, 0)
    }
}

/// Pick the catalog for a server. Unknown versions get the command catalog,
/// which still falls back to `system.users` when the server refuses.
pub fn select_catalog(version: Option<ServerVersion>) -> Box<dyn UserCatalog> {
    match version {
        Some(v) if !v.supports_user_commands() => Box::new(LegacyCatalog),
        _ => Box::new(CommandCatalog),
    }
}
