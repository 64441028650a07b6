//! Lists as ranges of numbered slots.
//!
//! Element `i` of list `K` is not stored at index `i`. Slots are allocated
//! outward from [`LIST_MID_INDEX`](crate::keyspace::LIST_MID_INDEX): `RPUSH`
//! takes `max + 1`, `LPUSH` takes `min - 1`. Pops and removals leave holes, so
//! slot numbers are ordered but not dense:
//!
//! ```text
//!   lpush c, lpush b, rpush d, lrem d
//!
//!   slot     999998  999999  1000000
//!   value      b       c       (d removed)
//!   position   0       1
//! ```
//!
//! Positional commands (`LINDEX`, `LSET`, `LRANGE`, `LTRIM`) therefore walk
//! the slots in order and count positions as they go.

use crate::error::Result;
use crate::keyspace::{self, list_prefix, list_slot_index, list_slot_key};
use crate::storage::{Direction, OrderedStore, WriteBatch};
use std::ops::ControlFlow;

/// Slots shifted per write batch by `LINSERT`.
const SHIFT_BATCH: usize = 64;

/// Where `LINSERT` puts the new element relative to the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Before,
    After,
}

impl std::str::FromStr for InsertPosition {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("before") {
            Ok(InsertPosition::Before)
        } else if s.eq_ignore_ascii_case("after") {
            Ok(InsertPosition::After)
        } else {
            Err(crate::error::Error::validation(format!(
                "insert position must be BEFORE or AFTER, got `{}`",
                s
            )))
        }
    }
}

/// Slot index at one end of the list.
fn edge_index(db: &dyn OrderedStore, prefix: &[u8], direction: Direction) -> Result<Option<u64>> {
    Ok(db
        .first_in_prefix(prefix, direction)?
        .and_then(|(slot, _)| list_slot_index(prefix, &slot)))
}

pub fn rpush(db: &dyn OrderedStore, key: &str, value: &[u8]) -> Result<()> {
    let prefix = list_prefix(key);
    let index = keyspace::next_right_index(edge_index(db, &prefix, Direction::Descending)?)?;
    db.put(&list_slot_key(&prefix, index), value)
}

pub fn lpush(db: &dyn OrderedStore, key: &str, value: &[u8]) -> Result<()> {
    let prefix = list_prefix(key);
    let index = keyspace::next_left_index(edge_index(db, &prefix, Direction::Ascending)?)?;
    db.put(&list_slot_key(&prefix, index), value)
}

fn pop(db: &dyn OrderedStore, key: &str, direction: Direction) -> Result<Option<Vec<u8>>> {
    match db.first_in_prefix(&list_prefix(key), direction)? {
        Some((slot, value)) => {
            db.delete(&slot)?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub fn rpop(db: &dyn OrderedStore, key: &str) -> Result<Option<Vec<u8>>> {
    pop(db, key, Direction::Descending)
}

pub fn lpop(db: &dyn OrderedStore, key: &str) -> Result<Option<Vec<u8>>> {
    pop(db, key, Direction::Ascending)
}

pub fn llen(db: &dyn OrderedStore, key: &str) -> Result<u64> {
    let mut len = 0;
    db.scan_prefix(&list_prefix(key), Direction::Ascending, &mut |_, _| {
        len += 1;
        ControlFlow::Continue(())
    })?;
    Ok(len)
}

/// Position addressed by `index` in a list of `len` elements. Negative
/// indices count from the end; non-negative ones are taken as given and may
/// point past the end.
fn resolve(index: i64, len: u64) -> u64 {
    if index < 0 {
        keyspace::normalize_index(index, len)
    } else {
        index as u64
    }
}

/// Slot key and value at `position`, walking the slots in order.
fn slot_at(db: &dyn OrderedStore, prefix: &[u8], position: u64) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    let mut seen = 0;
    let mut found = None;
    db.scan_prefix(prefix, Direction::Ascending, &mut |slot, value| {
        if seen == position {
            found = Some((slot.to_vec(), value.to_vec()));
            return ControlFlow::Break(());
        }
        seen += 1;
        ControlFlow::Continue(())
    })?;
    Ok(found)
}

/// Slot at `index`, or `None` when the list is empty or the index is past
/// the end.
fn slot_for_index(db: &dyn OrderedStore, prefix: &[u8], key: &str, index: i64) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    let position = if index < 0 {
        let len = llen(db, key)?;
        if len == 0 {
            return Ok(None);
        }
        resolve(index, len)
    } else {
        index as u64
    };
    slot_at(db, prefix, position)
}

pub fn lindex(db: &dyn OrderedStore, key: &str, index: i64) -> Result<Option<Vec<u8>>> {
    let prefix = list_prefix(key);
    Ok(slot_for_index(db, &prefix, key, index)?.map(|(_, value)| value))
}

/// Overwrites the element at `index`; `false` when there is none.
pub fn lset(db: &dyn OrderedStore, key: &str, index: i64, value: &[u8]) -> Result<bool> {
    let prefix = list_prefix(key);
    match slot_for_index(db, &prefix, key, index)? {
        Some((slot, _)) => {
            db.put(&slot, value)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Resolved inclusive `[start, end]` positions, or `None` when nothing can
/// fall inside them.
fn resolve_range(len: u64, start: i64, end: i64) -> Option<(u64, u64)> {
    if len == 0 {
        return None;
    }
    let (start, end) = (resolve(start, len), resolve(end, len));
    (start <= end).then_some((start, end))
}

pub fn lrange(db: &dyn OrderedStore, key: &str, start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
    let prefix = list_prefix(key);
    let Some((start, end)) = resolve_range(llen(db, key)?, start, end) else {
        return Ok(Vec::new());
    };

    let mut values = Vec::new();
    let mut position = 0;
    db.scan_prefix(&prefix, Direction::Ascending, &mut |_, value| {
        if position > end {
            return ControlFlow::Break(());
        }
        if position >= start {
            values.push(value.to_vec());
        }
        position += 1;
        ControlFlow::Continue(())
    })?;
    Ok(values)
}

/// Deletes every element outside `[start, end]`; the whole list when the
/// range is empty.
pub fn ltrim(db: &dyn OrderedStore, key: &str, start: i64, end: i64) -> Result<()> {
    let prefix = list_prefix(key);
    let len = llen(db, key)?;
    if len == 0 {
        return Ok(());
    }
    let bounds = resolve_range(len, start, end);

    let mut batch = WriteBatch::new();
    let mut position = 0;
    db.scan_prefix(&prefix, Direction::Ascending, &mut |slot, _| {
        let keep = matches!(bounds, Some((start, end)) if (start..=end).contains(&position));
        if !keep {
            batch.delete(slot);
        }
        position += 1;
        ControlFlow::Continue(())
    })?;
    db.write(batch)
}

/// Removes up to `|count|` elements equal to `value` (all when `count == 0`),
/// from the tail when `count` is negative. Returns how many went.
pub fn lrem(db: &dyn OrderedStore, key: &str, count: i64, value: &[u8]) -> Result<u64> {
    let direction = if count < 0 {
        Direction::Descending
    } else {
        Direction::Ascending
    };
    let limit = match count {
        0 => u64::MAX,
        n => n.unsigned_abs(),
    };

    let mut batch = WriteBatch::new();
    let mut removed = 0;
    db.scan_prefix(&list_prefix(key), direction, &mut |slot, current| {
        if current == value {
            batch.delete(slot);
            removed += 1;
            if removed == limit {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    })?;
    db.write(batch)?;
    Ok(removed)
}

/// Inserts `value` before or after the first element equal to `pivot`.
///
/// Slot keys never move. Instead the values from the insertion point to the
/// tail each shift one slot towards the tail, into a fresh slot allocated
/// like an `RPUSH`. Shifting happens in batches of [`SHIFT_BATCH`] slots.
///
/// Returns the new length, `0` when the list is missing and `-1` when the
/// pivot is not found.
pub fn linsert(
    db: &dyn OrderedStore,
    key: &str,
    position: InsertPosition,
    pivot: &[u8],
    value: &[u8],
) -> Result<i64> {
    let prefix = list_prefix(key);

    // One pass: length, plus the slot the new value lands in.
    let mut len: u64 = 0;
    let mut target: Option<(u64, Option<Vec<u8>>)> = None;
    db.scan_prefix(&prefix, Direction::Ascending, &mut |slot, current| {
        if target.is_none() {
            if current == pivot {
                target = Some(match position {
                    InsertPosition::Before => (len, Some(slot.to_vec())),
                    InsertPosition::After => (len + 1, None),
                });
            }
        } else if let Some((at, landing)) = target.as_mut() {
            if landing.is_none() && *at == len {
                *landing = Some(slot.to_vec());
            }
        }
        len += 1;
        ControlFlow::Continue(())
    })?;

    if len == 0 {
        return Ok(0);
    }
    let Some((_, landing)) = target else {
        return Ok(-1);
    };

    let Some((last_slot, last_value)) = db.first_in_prefix(&prefix, Direction::Descending)? else {
        return Ok(0);
    };
    let tail = list_slot_key(
        &prefix,
        keyspace::next_right_index(list_slot_index(&prefix, &last_slot))?,
    );

    let Some(landing) = landing else {
        // Inserting after the last element is a plain append
        db.put(&tail, value)?;
        return Ok(len as i64 + 1);
    };

    db.put(&tail, &last_value)?;
    shift_values(db, &landing, &tail, value)?;
    Ok(len as i64 + 1)
}

/// Walks the slots in `[from, to)`, writing `carry` into each and carrying
/// the displaced value into the next one.
fn shift_values(db: &dyn OrderedStore, from: &[u8], to: &[u8], value: &[u8]) -> Result<()> {
    let mut carry = value.to_vec();
    let mut cursor = from.to_vec();
    let mut first = true;

    loop {
        let mut chunk = Vec::with_capacity(SHIFT_BATCH);
        db.scan(&cursor, Some(to), Direction::Ascending, &mut |slot, current| {
            if !first && slot == cursor.as_slice() {
                return ControlFlow::Continue(());
            }
            chunk.push((slot.to_vec(), current.to_vec()));
            if chunk.len() == SHIFT_BATCH {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        let Some((last, _)) = chunk.last() else {
            return Ok(());
        };
        cursor = last.clone();
        first = false;

        let full = chunk.len() == SHIFT_BATCH;
        let mut batch = WriteBatch::new();
        for (slot, current) in chunk {
            batch.put(slot, std::mem::replace(&mut carry, current));
        }
        db.write(batch)?;

        if !full {
            return Ok(());
        }
    }
}
