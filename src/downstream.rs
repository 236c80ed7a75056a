//! Downstream wrappers — AST subtrees annotated with a shard identifier,
//! intended for remote execution on that shard.
//!
//! Produced only by the [`crate::shard_mapper`]. A `Downstream*` wrapper
//! never appears inside another `Downstream*` (no nesting of shard scopes,
//! invariant 2).

use std::fmt;

use crate::ast::{LogSelectorExpr, SampleExpr};
use crate::shard::ShardAnnotation;

/// A log-selector fragment annotated for execution on one shard.
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamLogSelectorExpr {
    pub shard: ShardAnnotation,
    pub inner: LogSelectorExpr,
}

impl fmt::Display for DownstreamLogSelectorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "downstream<{}, {}>", self.inner, self.shard)
    }
}

impl From<DownstreamLogSelectorExpr> for LogSelectorExpr {
    fn from(d: DownstreamLogSelectorExpr) -> Self {
        LogSelectorExpr::Downstream(Box::new(d))
    }
}

/// A sample-expression fragment annotated for execution on one shard.
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamSampleExpr {
    pub shard: ShardAnnotation,
    pub inner: SampleExpr,
}

impl fmt::Display for DownstreamSampleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "downstream<{}, {}>", self.inner, self.shard)
    }
}

impl From<DownstreamSampleExpr> for SampleExpr {
    fn from(d: DownstreamSampleExpr) -> Self {
        SampleExpr::Downstream(Box::new(d))
    }
}
