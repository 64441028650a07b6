//! The ordered key-value interface every shard is accessed through.
//!
//! The data-type engines only need four primitives: point get, point put,
//! point delete and a range scan in either direction. Multi-key mutations are
//! grouped into a [`WriteBatch`] so a backend can apply them atomically.

use crate::error::Result;
use std::ops::ControlFlow;

/// Iteration order of a range scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Mutations applied together in one backend transaction.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Visitor called for every entry of a scan; return `Break` to stop early.
pub type Visitor<'a> = dyn FnMut(&[u8], &[u8]) -> ControlFlow<()> + 'a;

/// A sorted, durable byte-key/byte-value store.
pub trait OrderedStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes `key`, returning whether it existed.
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// Visits every key in `[from, to)` (or `[from, ∞)` when `to` is `None`)
    /// in the given direction.
    fn scan(
        &self,
        from: &[u8],
        to: Option<&[u8]>,
        direction: Direction,
        visit: &mut Visitor<'_>,
    ) -> Result<()>;

    /// Applies every mutation of `batch` atomically.
    fn write(&self, batch: WriteBatch) -> Result<()>;

    /// Visits every key starting with `prefix`.
    fn scan_prefix(&self, prefix: &[u8], direction: Direction, visit: &mut Visitor<'_>) -> Result<()> {
        let end = prefix_end(prefix);
        self.scan(prefix, end.as_deref(), direction, visit)
    }

    /// First entry under `prefix` in the given direction.
    fn first_in_prefix(
        &self,
        prefix: &[u8],
        direction: Direction,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let mut first = None;
        self.scan_prefix(prefix, direction, &mut |key, value| {
            first = Some((key.to_vec(), value.to_vec()));
            ControlFlow::Break(())
        })?;
        Ok(first)
    }
}

/// Smallest key greater than every key starting with `prefix`, or `None`
/// when no such bound exists (empty or all-`0xff` prefix).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(b"abc"), Some(b"abd".to_vec()));
        assert_eq!(prefix_end(&[b'a', 0xff]), Some(vec![b'b']));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
        assert_eq!(prefix_end(b""), None);
    }

    #[test]
    fn test_write_batch() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.put("k", "v");
        batch.delete("gone");
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.into_ops(),
            vec![
                BatchOp::Put(b"k".to_vec(), b"v".to_vec()),
                BatchOp::Delete(b"gone".to_vec()),
            ]
        );
    }
}
