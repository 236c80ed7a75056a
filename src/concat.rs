//! Concat spines — singly-linked structures concatenating per-shard
//! downstream fragments into a single logical stream or vector
//!.
//!
//! A spine is non-empty and contains exactly one entry per shard, with
//! shard indices `0, 1, ..., N-1` in strictly increasing order (spec.md
//! §3.2 invariant 1, §8.1).

use std::fmt;

use crate::ast::{LogSelectorExpr, SampleExpr};
use crate::downstream::{DownstreamLogSelectorExpr, DownstreamSampleExpr};

/// A spine of per-shard log-selector fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatLogSelectorExpr {
    pub head: DownstreamLogSelectorExpr,
    pub next: Option<Box<ConcatLogSelectorExpr>>,
}

impl ConcatLogSelectorExpr {
    /// Build a spine from per-shard downstream fragments in shard order.
    /// Panics if `heads` is empty — a spine is never empty (spec.md §3.2
    /// invariant 1); the mapper only ever calls this with `N >= 2`
    /// fragments already validated by [`crate::shard_mapper::ShardMapper::new`].
    pub fn from_heads(mut heads: Vec<DownstreamLogSelectorExpr>) -> Self {
        assert!(!heads.is_empty(), "concat spine must have at least one shard");
        let last = heads.pop().expect("non-empty");
        let mut spine = ConcatLogSelectorExpr {
            head: last,
            next: None,
        };
        while let Some(head) = heads.pop() {
            spine = ConcatLogSelectorExpr {
                head,
                next: Some(Box::new(spine)),
            };
        }
        spine
    }

    /// Number of entries in this spine.
    pub fn len(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |n| n.len())
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ConcatLogSelectorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if let Some(next) = &self.next {
            write!(f, " ++ {next}")?;
        }
        Ok(())
    }
}

impl From<ConcatLogSelectorExpr> for LogSelectorExpr {
    fn from(c: ConcatLogSelectorExpr) -> Self {
        LogSelectorExpr::Concat(Box::new(c))
    }
}

/// A spine of per-shard sample-expression fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatSampleExpr {
    pub head: DownstreamSampleExpr,
    pub next: Option<Box<ConcatSampleExpr>>,
}

impl ConcatSampleExpr {
    /// Build a spine from per-shard downstream fragments in shard order.
    /// Panics if `heads` is empty, mirroring [`ConcatLogSelectorExpr::from_heads`].
    pub fn from_heads(mut heads: Vec<DownstreamSampleExpr>) -> Self {
        assert!(!heads.is_empty(), "concat spine must have at least one shard");
        let last = heads.pop().expect("non-empty");
        let mut spine = ConcatSampleExpr {
            head: last,
            next: None,
        };
        while let Some(head) = heads.pop() {
            spine = ConcatSampleExpr {
                head,
                next: Some(Box::new(spine)),
            };
        }
        spine
    }

    pub fn len(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |n| n.len())
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ConcatSampleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if let Some(next) = &self.next {
            write!(f, " ++ {next}")?;
        }
        Ok(())
    }
}

impl From<ConcatSampleExpr> for SampleExpr {
    fn from(c: ConcatSampleExpr) -> Self {
        SampleExpr::Concat(Box::new(c))
    }
}
