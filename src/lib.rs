//! # LQL Shard Mapper
//!
//! A standalone rewrite engine for a log-query language (LQL): given a
//! parsed query AST and a shard count `N`, it produces a new AST that
//! fans the query out across `N` horizontal shards while preserving query
//! semantics — including across aggregation boundaries, where naive
//! sharding would silently return wrong answers for non-distributive
//! operators such as `topk`, `max`, or `avg`.
//!
//! ## Pipeline
//!
//! ```text
//! LQL source text
//!     ↓
//! [Parser]            (out of scope for this crate) → LogSelectorExpr / SampleExpr
//!     ↓
//! [ShardMapper::map]   → sharded AST (this crate)
//!     ↓
//! Executor            (out of scope for this crate): runs each Downstream
//!                      fragment on its shard, concatenating log streams or
//!                      combining vector fragments per the aggregator the
//!                      mapper inserted
//! ```
//!
//! ## Usage
//!
//! ```
//! use shard_mapper::{LogSelectorExpr, MatchOp, Matcher, ShardMapper};
//!
//! let mapper = ShardMapper::new(4).expect("shards >= 2");
//! let query = LogSelectorExpr::matchers(vec![Matcher::new("app", MatchOp::Equal, "checkout")]);
//! let sharded = mapper.map_log_selector(query);
//! println!("{sharded}");
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `ast` | LQL AST: label matchers, line filters, range and vector aggregations |
//! | `shard` | `ShardAnnotation` — the `shard=k_of_N` tag attached to downstream fragments |
//! | `downstream` | Per-shard AST wrappers produced by the mapper |
//! | `concat` | Linked-list spines concatenating per-shard fragments |
//! | `shard_mapper` | The rewrite driver implementing Rules V1-V4 |
//! | `error` | Error types for mapper and shard-annotation construction |
//! | `config` | Hierarchical configuration (shard count, logging) |

pub mod ast;
pub mod shard;

// Downstream and concat wrappers are variants of `ast::LogSelectorExpr` /
// `ast::SampleExpr` (see their `From` impls there); each still gets its own
// module to mirror the mapper's layering.
pub mod concat;
pub mod downstream;

pub mod error;
pub mod shard_mapper;

// Configuration system
pub mod config;

// Re-export AST types for convenience
pub use crate::ast::{
    BinOp, Grouping, LogRange, LogSelectorExpr, MatchOp, Matcher, RangeAggregationOp, SampleExpr,
    VectorAggregationOp,
};

// Re-export per-shard wrapper and spine types
pub use crate::concat::{ConcatLogSelectorExpr, ConcatSampleExpr};
pub use crate::downstream::{DownstreamLogSelectorExpr, DownstreamSampleExpr};
pub use crate::shard::ShardAnnotation;

// Re-export the rewrite driver and its entry-point types
pub use crate::shard_mapper::{Expr, ShardMapper};

// Re-export error and config types
pub use crate::config::Config;
pub use crate::error::{ShardMapperError, ShardMapperResult};
