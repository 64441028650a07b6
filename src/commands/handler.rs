//! Command Handler Module
//!
//! Turns a tokenized command line into a call on the [`Store`] and wraps the
//! outcome in a [`Reply`].
//!
//! ## Supported Commands
//!
//! ### Scalars
//! - `GET key`, `SET key value`
//! - `INCR key`, `INCRBY key amount`, `DECR key`, `DECRBY key amount`
//!
//! ### Keys
//! - `DELETE key [key ...]`, `EXISTS key [key ...]`, `TYPE key`
//! - `EXPIRE key seconds` (fractional seconds allowed), `PERSIST key`
//! - `TTL key`, `PTTL key`
//! - `KEYS pattern`, `SCAN cursor [MATCH pattern]`, `FLUSHDB`
//!
//! ### Lists
//! - `RPUSH key value [value ...]`, `LPUSH key value [value ...]`
//! - `RPOP key`, `LPOP key`, `LLEN key`, `LINDEX key index`
//! - `LSET key index value`, `LRANGE key start end`, `LTRIM key start end`
//! - `LREM key count value`, `LINSERT key BEFORE|AFTER pivot value`
//!
//! ### Hashes
//! - `HSET key field value [field value ...]`, `HGET key field`
//! - `HDEL key field [field ...]`, `HKEYS key`, `HVALUES key`, `HGETALL key`
//! - `HMSET key field value [field value ...]`, `HMGET key field [field ...]`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │   lookup    │───>│ arity check │───>│   handler   │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                             Store           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The table is built once, in [`CommandHandler::new`], from
//! [`Command::ALL`]; nothing is registered at runtime.

use crate::error::{Error, Result};
use crate::protocol::Reply;
use crate::store::{Command, InsertPosition, Store};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A command implementation: arguments exclude the command name.
type Handler = fn(&Store, &[Bytes]) -> Result<Reply>;

/// Accepted argument counts, not counting the command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// A key followed by one or more field/value pairs
    KeyAndPairs,
}

impl Arity {
    fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::KeyAndPairs => count >= 3 && count % 2 == 1,
        }
    }
}

#[derive(Clone, Copy)]
struct Entry {
    command: Command,
    arity: Arity,
    handler: Handler,
}

/// Executes command lines against a shared [`Store`].
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
    table: HashMap<&'static str, Entry>,
}

impl CommandHandler {
    /// Creates a command handler over `store`.
    pub fn new(store: Arc<Store>) -> Self {
        let table = Command::ALL
            .into_iter()
            .map(|command| {
                let (arity, handler) = entry_for(command);
                (
                    command.name(),
                    Entry {
                        command,
                        arity,
                        handler,
                    },
                )
            })
            .collect();
        Self { store, table }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Names of every command in the table, sorted.
    pub fn command_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.table.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Executes a command and returns the reply.
    ///
    /// # Arguments
    ///
    /// * `args` - The command name followed by its arguments
    ///
    /// Store errors are turned into error replies; this never fails.
    pub fn execute(&self, args: &[Bytes]) -> Reply {
        let Some((name, rest)) = args.split_first() else {
            return Reply::error("ERR empty command");
        };

        let name = match std::str::from_utf8(name) {
            Ok(name) => name.to_ascii_uppercase(),
            Err(_) => return Reply::error("ERR invalid command name"),
        };

        let Some(entry) = self.table.get(name.as_str()) else {
            return Reply::error(format!("ERR unknown command '{}'", name));
        };

        if !entry.arity.accepts(rest.len()) {
            return Reply::error(format!(
                "ERR wrong number of arguments for '{}' command",
                entry.command.name()
            ));
        }

        match (entry.handler)(&self.store, rest) {
            Ok(reply) => reply,
            Err(e) => error_reply(e),
        }
    }
}

/// Maps a store error to an error reply. Type conflicts keep their own
/// `WRONGTYPE` code, everything else is reported as `ERR`.
fn error_reply(err: Error) -> Reply {
    match err {
        Error::TypeConflict { .. } => Reply::error(err.to_string()),
        other => Reply::error(format!("ERR {}", other)),
    }
}

fn entry_for(command: Command) -> (Arity, Handler) {
    use Arity::*;
    match command {
        Command::Get => (Exact(1), cmd_get),
        Command::Set => (Exact(2), cmd_set),
        Command::Delete => (AtLeast(1), cmd_delete),
        Command::Exists => (AtLeast(1), cmd_exists),
        Command::Type => (Exact(1), cmd_type),
        Command::Incr => (Exact(1), cmd_incr),
        Command::IncrBy => (Exact(2), cmd_incrby),
        Command::Decr => (Exact(1), cmd_decr),
        Command::DecrBy => (Exact(2), cmd_decrby),
        Command::Expire => (Exact(2), cmd_expire),
        Command::Persist => (Exact(1), cmd_persist),
        Command::Ttl => (Exact(1), cmd_ttl),
        Command::Pttl => (Exact(1), cmd_pttl),
        Command::RPush => (AtLeast(2), cmd_rpush),
        Command::LPush => (AtLeast(2), cmd_lpush),
        Command::RPop => (Exact(1), cmd_rpop),
        Command::LPop => (Exact(1), cmd_lpop),
        Command::LLen => (Exact(1), cmd_llen),
        Command::LIndex => (Exact(2), cmd_lindex),
        Command::LSet => (Exact(3), cmd_lset),
        Command::LRange => (Exact(3), cmd_lrange),
        Command::LTrim => (Exact(3), cmd_ltrim),
        Command::LRem => (Exact(3), cmd_lrem),
        Command::LInsert => (Exact(4), cmd_linsert),
        Command::HSet => (KeyAndPairs, cmd_hset),
        Command::HGet => (Exact(2), cmd_hget),
        Command::HDel => (AtLeast(2), cmd_hdel),
        Command::HKeys => (Exact(1), cmd_hkeys),
        Command::HValues => (Exact(1), cmd_hvalues),
        Command::HGetAll => (Exact(1), cmd_hgetall),
        Command::HMSet => (KeyAndPairs, cmd_hmset),
        Command::HMGet => (AtLeast(2), cmd_hmget),
        Command::Keys => (Exact(1), cmd_keys),
        Command::Scan => (AtLeast(1), cmd_scan),
        Command::FlushDb => (Exact(0), cmd_flushdb),
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Extracts a UTF-8 string argument.
fn text(arg: &Bytes) -> Result<&str> {
    std::str::from_utf8(arg).map_err(|_| Error::validation("argument is not valid UTF-8"))
}

/// Extracts an integer argument.
fn integer(arg: &Bytes) -> Result<i64> {
    text(arg)?
        .parse()
        .map_err(|_| Error::validation("value is not an integer or out of range"))
}

fn pairs(args: &[Bytes]) -> Vec<(Bytes, Bytes)> {
    args.chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

fn flag(set: bool) -> Reply {
    Reply::integer(set as i64)
}

// ============================================================================
// Scalar commands
// ============================================================================

fn cmd_get(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::from_value(store.get(text(&args[0])?)?))
}

fn cmd_set(store: &Store, args: &[Bytes]) -> Result<Reply> {
    store.set(text(&args[0])?, &args[1])?;
    Ok(Reply::ok())
}

fn cmd_incr(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::integer(store.incr(text(&args[0])?)?))
}

fn cmd_incrby(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::integer(store.incrby(text(&args[0])?, integer(&args[1])?)?))
}

fn cmd_decr(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::integer(store.decr(text(&args[0])?)?))
}

fn cmd_decrby(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::integer(store.decrby(text(&args[0])?, integer(&args[1])?)?))
}

// ============================================================================
// Key commands
// ============================================================================

/// DELETE key [key ...]
fn cmd_delete(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let mut deleted = 0;
    for key in args {
        deleted += store.delete(text(key)?)? as i64;
    }
    Ok(Reply::integer(deleted))
}

/// EXISTS key [key ...]
fn cmd_exists(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let mut count = 0;
    for key in args {
        count += store.exists(text(key)?)? as i64;
    }
    Ok(Reply::integer(count))
}

fn cmd_type(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::status(store.type_of(text(&args[0])?)?))
}

/// EXPIRE key seconds
fn cmd_expire(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let seconds: f64 = text(&args[1])?
        .parse()
        .map_err(|_| Error::validation("invalid expire time"))?;
    let ttl = Duration::try_from_secs_f64(seconds)
        .map_err(|_| Error::validation("invalid expire time"))?;
    Ok(flag(store.expire(text(&args[0])?, ttl)?))
}

fn cmd_persist(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(flag(store.persist(text(&args[0])?)?))
}

fn cmd_ttl(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::integer(store.ttl(text(&args[0])?)?))
}

fn cmd_pttl(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::integer(store.pttl(text(&args[0])?)?))
}

fn cmd_keys(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::strings(store.keys(text(&args[0])?)?))
}

/// SCAN cursor [MATCH pattern]
fn cmd_scan(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let cursor: u64 = text(&args[0])?
        .parse()
        .map_err(|_| Error::validation("invalid cursor"))?;

    let pattern = match &args[1..] {
        [] => "*",
        [option, pattern] if option.eq_ignore_ascii_case(b"MATCH") => text(pattern)?,
        _ => return Err(Error::validation("syntax error")),
    };

    let (next, keys) = store.scan(cursor, pattern)?;
    Ok(Reply::array(vec![
        Reply::bulk(next.to_string()),
        Reply::strings(keys),
    ]))
}

fn cmd_flushdb(store: &Store, _args: &[Bytes]) -> Result<Reply> {
    store.flushdb()?;
    Ok(Reply::ok())
}

// ============================================================================
// List commands
// ============================================================================

/// RPUSH key value [value ...]; replies with the new length.
fn cmd_rpush(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let key = text(&args[0])?;
    for value in &args[1..] {
        store.rpush(key, value)?;
    }
    Ok(Reply::integer(store.llen(key)? as i64))
}

/// LPUSH key value [value ...]; replies with the new length.
fn cmd_lpush(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let key = text(&args[0])?;
    for value in &args[1..] {
        store.lpush(key, value)?;
    }
    Ok(Reply::integer(store.llen(key)? as i64))
}

fn cmd_rpop(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::from_value(store.rpop(text(&args[0])?)?))
}

fn cmd_lpop(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::from_value(store.lpop(text(&args[0])?)?))
}

fn cmd_llen(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::integer(store.llen(text(&args[0])?)? as i64))
}

fn cmd_lindex(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::from_value(
        store.lindex(text(&args[0])?, integer(&args[1])?)?,
    ))
}

fn cmd_lset(store: &Store, args: &[Bytes]) -> Result<Reply> {
    if store.lset(text(&args[0])?, integer(&args[1])?, &args[2])? {
        Ok(Reply::ok())
    } else {
        Ok(Reply::error("ERR index out of range"))
    }
}

fn cmd_lrange(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::values(store.lrange(
        text(&args[0])?,
        integer(&args[1])?,
        integer(&args[2])?,
    )?))
}

fn cmd_ltrim(store: &Store, args: &[Bytes]) -> Result<Reply> {
    store.ltrim(text(&args[0])?, integer(&args[1])?, integer(&args[2])?)?;
    Ok(Reply::ok())
}

fn cmd_lrem(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let removed = store.lrem(text(&args[0])?, integer(&args[1])?, &args[2])?;
    Ok(Reply::integer(removed as i64))
}

/// LINSERT key BEFORE|AFTER pivot value
fn cmd_linsert(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let position: InsertPosition = text(&args[1])?.parse()?;
    Ok(Reply::integer(store.linsert(
        text(&args[0])?,
        position,
        &args[2],
        &args[3],
    )?))
}

// ============================================================================
// Hash commands
// ============================================================================

/// HSET key field value [field value ...]; replies with the number of new fields.
fn cmd_hset(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let key = text(&args[0])?;
    let mut added = 0;
    for (field, value) in pairs(&args[1..]) {
        added += store.hset(key, field, value)?;
    }
    Ok(Reply::integer(added))
}

fn cmd_hget(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::from_value(store.hget(text(&args[0])?, &args[1])?))
}

/// HDEL key field [field ...]
fn cmd_hdel(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let key = text(&args[0])?;
    let mut removed = 0;
    for field in &args[1..] {
        removed += store.hdel(key, field)?;
    }
    Ok(Reply::integer(removed))
}

fn cmd_hkeys(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::values(store.hkeys(text(&args[0])?)?))
}

fn cmd_hvalues(store: &Store, args: &[Bytes]) -> Result<Reply> {
    Ok(Reply::values(store.hvalues(text(&args[0])?)?))
}

/// HGETALL key; replies with a flat field, value, field, value ... array.
fn cmd_hgetall(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let flat = store
        .hgetall(text(&args[0])?)?
        .into_iter()
        .flat_map(|(field, value)| {
            [
                Reply::Bulk(field.into_bytes()),
                Reply::Bulk(value.into_bytes()),
            ]
        })
        .collect();
    Ok(Reply::array(flat))
}

fn cmd_hmset(store: &Store, args: &[Bytes]) -> Result<Reply> {
    store.hmset(text(&args[0])?, &pairs(&args[1..]))?;
    Ok(Reply::ok())
}

fn cmd_hmget(store: &Store, args: &[Bytes]) -> Result<Reply> {
    let values = store.hmget(text(&args[0])?, &args[1..])?;
    Ok(Reply::array(values.into_iter().map(Reply::from_value).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use tempfile::TempDir;

    fn create_handler() -> (TempDir, CommandHandler) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(StoreConfig::new(dir.path()).with_spread_factor(1)).unwrap();
        (dir, CommandHandler::new(Arc::new(store)))
    }

    fn make_command(args: &[&str]) -> Vec<Bytes> {
        args.iter()
            .map(|s| Bytes::from(s.to_string()))
            .collect()
    }

    fn run(handler: &CommandHandler, args: &[&str]) -> Reply {
        handler.execute(&make_command(args))
    }

    #[test]
    fn test_table_covers_every_command() {
        let (_dir, handler) = create_handler();
        assert_eq!(handler.command_names().len(), Command::ALL.len());
        assert!(handler.command_names().contains(&"LINSERT"));
    }

    #[test]
    fn test_set_get() {
        let (_dir, handler) = create_handler();

        assert_eq!(run(&handler, &["SET", "name", "Ariz"]), Reply::ok());
        assert_eq!(run(&handler, &["get", "name"]), Reply::bulk("Ariz"));
        assert_eq!(run(&handler, &["GET", "nonexistent"]), Reply::nil());
    }

    #[test]
    fn test_delete_and_exists() {
        let (_dir, handler) = create_handler();

        run(&handler, &["SET", "a", "1"]);
        run(&handler, &["RPUSH", "b", "x"]);
        assert_eq!(run(&handler, &["EXISTS", "a", "b", "c"]), Reply::integer(2));
        assert_eq!(run(&handler, &["DELETE", "a", "b", "c"]), Reply::integer(2));
        assert_eq!(run(&handler, &["EXISTS", "a", "b"]), Reply::integer(0));
    }

    #[test]
    fn test_incr_decr() {
        let (_dir, handler) = create_handler();

        assert_eq!(run(&handler, &["INCR", "counter"]), Reply::integer(1));
        assert_eq!(run(&handler, &["INCRBY", "counter", "10"]), Reply::integer(11));
        assert_eq!(run(&handler, &["DECR", "counter"]), Reply::integer(10));
        assert_eq!(run(&handler, &["DECRBY", "counter", "4"]), Reply::integer(6));

        run(&handler, &["SET", "text", "ab"]);
        assert!(run(&handler, &["INCR", "text"]).is_error());
        assert!(run(&handler, &["INCRBY", "counter", "ten"]).is_error());
    }

    #[test]
    fn test_lists() {
        let (_dir, handler) = create_handler();

        assert_eq!(run(&handler, &["RPUSH", "l", "b", "c"]), Reply::integer(2));
        assert_eq!(run(&handler, &["LPUSH", "l", "a"]), Reply::integer(3));
        assert_eq!(
            run(&handler, &["LRANGE", "l", "0", "-1"]),
            Reply::array(vec![Reply::bulk("a"), Reply::bulk("b"), Reply::bulk("c")])
        );
        assert_eq!(
            run(&handler, &["LINSERT", "l", "AFTER", "a", "a2"]),
            Reply::integer(4)
        );
        assert_eq!(
            run(&handler, &["LINSERT", "l", "BEFORE", "zz", "x"]),
            Reply::integer(-1)
        );
        assert!(run(&handler, &["LINSERT", "l", "AROUND", "a", "x"]).is_error());
        assert_eq!(run(&handler, &["LINDEX", "l", "1"]), Reply::bulk("a2"));
        assert_eq!(run(&handler, &["LSET", "l", "0", "A"]), Reply::ok());
        assert!(run(&handler, &["LSET", "l", "99", "A"]).is_error());
        assert_eq!(run(&handler, &["LREM", "l", "0", "c"]), Reply::integer(1));
        assert_eq!(run(&handler, &["RPOP", "l"]), Reply::bulk("b"));
        assert_eq!(run(&handler, &["LPOP", "l"]), Reply::bulk("A"));
        assert_eq!(run(&handler, &["LLEN", "l"]), Reply::integer(1));
        assert_eq!(run(&handler, &["LTRIM", "l", "1", "0"]), Reply::ok());
        assert_eq!(run(&handler, &["LLEN", "l"]), Reply::integer(0));
    }

    #[test]
    fn test_hashes() {
        let (_dir, handler) = create_handler();

        assert_eq!(
            run(&handler, &["HSET", "h", "f1", "v1", "f2", "v2"]),
            Reply::integer(2)
        );
        assert_eq!(run(&handler, &["HSET", "h", "f1", "v1b"]), Reply::integer(0));
        assert_eq!(run(&handler, &["HGET", "h", "f1"]), Reply::bulk("v1b"));
        assert_eq!(
            run(&handler, &["HGETALL", "h"]),
            Reply::array(vec![
                Reply::bulk("f1"),
                Reply::bulk("v1b"),
                Reply::bulk("f2"),
                Reply::bulk("v2"),
            ])
        );
        assert_eq!(run(&handler, &["HMSET", "h", "f3", "v3"]), Reply::ok());
        assert_eq!(
            run(&handler, &["HMGET", "h", "f3", "nope"]),
            Reply::array(vec![Reply::bulk("v3"), Reply::nil()])
        );
        assert_eq!(run(&handler, &["HDEL", "h", "f1", "f2", "nope"]), Reply::integer(2));
        assert_eq!(
            run(&handler, &["HKEYS", "h"]),
            Reply::array(vec![Reply::bulk("f3")])
        );
        assert_eq!(
            run(&handler, &["HVALUES", "h"]),
            Reply::array(vec![Reply::bulk("v3")])
        );
    }

    #[test]
    fn test_expiry_commands() {
        let (_dir, handler) = create_handler();

        run(&handler, &["SET", "k", "v"]);
        assert_eq!(run(&handler, &["TTL", "k"]), Reply::integer(-1));
        assert_eq!(run(&handler, &["EXPIRE", "k", "100"]), Reply::integer(1));
        assert_eq!(run(&handler, &["TTL", "k"]), Reply::integer(100));
        assert!(run(&handler, &["PTTL", "k"]).as_integer().unwrap() > 99_000);
        assert_eq!(run(&handler, &["PERSIST", "k"]), Reply::integer(1));
        assert_eq!(run(&handler, &["PERSIST", "k"]), Reply::integer(0));
        assert_eq!(run(&handler, &["TTL", "missing"]), Reply::integer(-2));
        assert_eq!(run(&handler, &["EXPIRE", "missing", "1"]), Reply::integer(0));
        assert!(run(&handler, &["EXPIRE", "k", "-1"]).is_error());
    }

    #[test]
    fn test_keys_scan_flushdb() {
        let (_dir, handler) = create_handler();

        run(&handler, &["SET", "user:1", "a"]);
        run(&handler, &["HSET", "user:2", "f", "v"]);
        run(&handler, &["SET", "other", "b"]);

        let keys = run(&handler, &["KEYS", "user:*"]);
        assert_eq!(keys.as_array().unwrap().len(), 2);

        let scan = run(&handler, &["SCAN", "0", "MATCH", "other"]);
        assert_eq!(
            scan,
            Reply::array(vec![
                Reply::bulk("0"),
                Reply::array(vec![Reply::bulk("other")])
            ])
        );
        let page = run(&handler, &["SCAN", "5"]);
        assert_eq!(page.as_array().unwrap()[1], Reply::array(vec![]));
        assert!(run(&handler, &["SCAN", "0", "COUNT", "10"]).is_error());

        assert_eq!(run(&handler, &["FLUSHDB"]), Reply::ok());
        assert_eq!(run(&handler, &["KEYS", "*"]), Reply::array(vec![]));
    }

    #[test]
    fn test_type_and_wrongtype() {
        let (_dir, handler) = create_handler();

        run(&handler, &["SET", "s", "v"]);
        assert_eq!(run(&handler, &["TYPE", "s"]), Reply::status("string"));
        assert_eq!(run(&handler, &["TYPE", "nothing"]), Reply::status("none"));

        let reply = run(&handler, &["HSET", "s", "f", "v"]);
        assert!(reply.as_str().unwrap().starts_with("WRONGTYPE"));
    }

    #[test]
    fn test_arity_and_unknown() {
        let (_dir, handler) = create_handler();

        assert_eq!(
            run(&handler, &["GET"]),
            Reply::error("ERR wrong number of arguments for 'GET' command")
        );
        assert!(run(&handler, &["HSET", "h", "f"]).is_error());
        assert!(run(&handler, &["FLUSHDB", "now"]).is_error());
        assert_eq!(
            run(&handler, &["UNKNOWNCMD"]),
            Reply::error("ERR unknown command 'UNKNOWNCMD'")
        );
        assert_eq!(handler.execute(&[]), Reply::error("ERR empty command"));
    }

    #[test]
    fn test_invalid_key_reported() {
        let (_dir, handler) = create_handler();

        let bad = format!("a{}b", crate::keyspace::SEP);
        let reply = run(&handler, &["SET", &bad, "v"]);
        assert!(reply.as_str().unwrap().starts_with("ERR validation error"));
    }
}
