//! Redis-backed store shared by several nodes.
//!
//! Each code maps to one hash at `key_prefix + code` holding `total`,
//! `created_at` (RFC 3339) and one `f:<index>` field per fragment. Writes
//! run as Lua scripts, so validating the total and inserting a fragment is
//! atomic on the server. Expiry is Redis' own key TTL, set when the hash is
//! created.

use std::{collections::HashMap, fmt, time::Duration};

use chrono::{DateTime, Utc};
use redis::{Client, Connection, Script};

use super::{AssemblyRecord, AssemblyStatus, TruthStore};
use crate::{Result, TruthError, metrics::IngestOutcome};

/// Default key namespace.
pub const DEFAULT_KEY_PREFIX: &str = "truth:qr:";

const CREATE_OR_GET: &str = r"
local existing = redis.call('HGET', KEYS[1], 'total')
if existing then
  if existing ~= ARGV[1] then
    return {'total_conflict', existing}
  end
  return {'ok'}
end
redis.call('HSET', KEYS[1], 'total', ARGV[1], 'created_at', ARGV[3])
if tonumber(ARGV[2]) > 0 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return {'created'}
";

const PUT_FRAGMENT: &str = r"
local total = redis.call('HGET', KEYS[1], 'total')
if not total then
  return {'missing_record'}
end
local index = tonumber(ARGV[1])
if index < 1 or index > tonumber(total) then
  return {'out_of_range', total}
end
local field = 'f:' .. ARGV[1]
local prior = redis.call('HGET', KEYS[1], field)
if prior then
  if prior == ARGV[2] then
    return {'duplicate'}
  end
  return {'fragment_conflict'}
end
redis.call('HSET', KEYS[1], field, ARGV[2])
return {'accepted'}
";

const INGEST: &str = r"
local existing = redis.call('HGET', KEYS[1], 'total')
if existing then
  if existing ~= ARGV[1] then
    return {'total_conflict', existing}
  end
else
  redis.call('HSET', KEYS[1], 'total', ARGV[1], 'created_at', ARGV[5])
  if tonumber(ARGV[4]) > 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[4])
  end
end
local index = tonumber(ARGV[2])
if index < 1 or index > tonumber(ARGV[1]) then
  return {'out_of_range', ARGV[1]}
end
local field = 'f:' .. ARGV[2]
local prior = redis.call('HGET', KEYS[1], field)
if prior then
  if prior == ARGV[3] then
    return {'duplicate'}
  end
  return {'fragment_conflict'}
end
redis.call('HSET', KEYS[1], field, ARGV[3])
return {'accepted'}
";

/// Store keeping partial assemblies in Redis hashes.
pub struct RedisStore {
    client: Client,
    key_prefix: String,
    ttl_secs: u64,
    create_or_get: Script,
    put_fragment: Script,
    ingest: Script,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("key_prefix", &self.key_prefix)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect lazily to `url`.
    ///
    /// `ttl` of `None` or zero keeps records until they are forgotten.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Backend`] when `url` is not a valid Redis URL.
    pub fn open(url: &str, key_prefix: impl Into<String>, ttl: Option<Duration>) -> Result<Self> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
            ttl_secs: ttl.map_or(0, expiry_secs),
            create_or_get: Script::new(CREATE_OR_GET),
            put_fragment: Script::new(PUT_FRAGMENT),
            ingest: Script::new(INGEST),
        })
    }

    /// Hash key used for `code`.
    #[must_use]
    pub fn key(&self, code: &str) -> String { format!("{}{code}", self.key_prefix) }

    fn connection(&self) -> Result<Connection> { Ok(self.client.get_connection()?) }

    fn read(&self, code: &str, conn: &mut Connection) -> Result<Option<AssemblyRecord>> {
        let fields: HashMap<String, String> =
            redis::cmd("HGETALL").arg(self.key(code)).query(conn)?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_record(code, &fields).map(Some)
    }
}

impl TruthStore for RedisStore {
    fn get(&self, code: &str) -> Result<Option<AssemblyRecord>> {
        let mut conn = self.connection()?;
        self.read(code, &mut conn)
    }

    fn create_or_get(&self, code: &str, total: u32) -> Result<AssemblyRecord> {
        let mut conn = self.connection()?;
        let reply: Vec<String> = self
            .create_or_get
            .key(self.key(code))
            .arg(total)
            .arg(self.ttl_secs)
            .arg(Utc::now().to_rfc3339())
            .invoke(&mut conn)?;
        match reply.first().map(String::as_str) {
            Some("created") => log::debug!("created assembly record for {code} expecting {total} fragment(s)"),
            Some("ok") => {}
            _ => return Err(script_error(code, total, &reply)),
        }
        self.read(code, &mut conn)?
            .ok_or_else(|| TruthError::MissingRecord {
                code: code.to_owned(),
            })
    }

    fn put_fragment(&self, code: &str, index: u32, fragment: &str) -> Result<IngestOutcome> {
        let mut conn = self.connection()?;
        let reply: Vec<String> = self
            .put_fragment
            .key(self.key(code))
            .arg(index)
            .arg(fragment)
            .invoke(&mut conn)?;
        outcome(code, index, &reply)
    }

    fn forget(&self, code: &str) -> Result<()> {
        let mut conn = self.connection()?;
        redis::cmd("DEL")
            .arg(self.key(code))
            .query::<()>(&mut conn)?;
        log::debug!("forgot assembly record for {code}");
        Ok(())
    }

    /// Redis expires keys by itself; nothing is left to purge.
    fn purge_expired(&self) -> Result<usize> { Ok(0) }

    fn ingest(
        &self,
        code: &str,
        index: u32,
        total: u32,
        fragment: &str,
    ) -> Result<(IngestOutcome, AssemblyStatus)> {
        let mut conn = self.connection()?;
        let reply: Vec<String> = self
            .ingest
            .key(self.key(code))
            .arg(total)
            .arg(index)
            .arg(fragment)
            .arg(self.ttl_secs)
            .arg(Utc::now().to_rfc3339())
            .invoke(&mut conn)?;
        let outcome = match reply.first().map(String::as_str) {
            Some("total_conflict") => return Err(script_error(code, total, &reply)),
            _ => outcome(code, index, &reply)?,
        };
        let status = self
            .read(code, &mut conn)?
            .map(|record| record.status(code))
            .ok_or_else(|| TruthError::MissingRecord {
                code: code.to_owned(),
            })?;
        Ok((outcome, status))
    }
}

/// Whole seconds for `EXPIRE`, rounded up so a sub-second TTL still expires.
fn expiry_secs(ttl: Duration) -> u64 { ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0) }

fn outcome(code: &str, index: u32, reply: &[String]) -> Result<IngestOutcome> {
    match reply.first().map(String::as_str) {
        Some("accepted") => Ok(IngestOutcome::Accepted),
        Some("duplicate") => Ok(IngestOutcome::Duplicate),
        Some("missing_record") => Err(TruthError::MissingRecord {
            code: code.to_owned(),
        }),
        Some("fragment_conflict") => Err(TruthError::FragmentConflict {
            code: code.to_owned(),
            index,
        }),
        Some("out_of_range") => Err(TruthError::InvalidIndexTotal {
            index: u64::from(index),
            total: reply
                .get(1)
                .and_then(|total| total.parse().ok())
                .unwrap_or_default(),
        }),
        _ => Err(TruthError::Backend(format!(
            "unexpected script reply {reply:?}"
        ))),
    }
}

fn script_error(code: &str, total: u32, reply: &[String]) -> TruthError {
    match (reply.first().map(String::as_str), reply.get(1)) {
        (Some("total_conflict"), Some(existing)) => match existing.parse() {
            Ok(expected) => TruthError::TotalConflict {
                code: code.to_owned(),
                expected,
                found: total,
            },
            Err(_) => TruthError::Backend(format!("corrupt total {existing:?} for {code}")),
        },
        _ => TruthError::Backend(format!("unexpected script reply {reply:?}")),
    }
}

fn decode_record(code: &str, fields: &HashMap<String, String>) -> Result<AssemblyRecord> {
    let corrupt = |what: &str| TruthError::Backend(format!("corrupt {what} for {code}"));
    let total = fields
        .get("total")
        .and_then(|total| total.parse::<u32>().ok())
        .ok_or_else(|| corrupt("total"))?;
    let created_at = fields
        .get("created_at")
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| corrupt("created_at"))?;

    let mut record = AssemblyRecord::new(total, created_at);
    for (field, fragment) in fields {
        let Some(index) = field.strip_prefix("f:") else {
            continue;
        };
        let index = index.parse::<u32>().map_err(|_| corrupt(field))?;
        record.fragments.insert(index, fragment.clone());
    }
    Ok(record)
}
