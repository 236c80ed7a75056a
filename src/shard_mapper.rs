//! # Shard Mapper
//!
//! The rewrite driver: a recursive, structurally-dispatched transform over
//! the LQL AST producing a sharded AST.
//!
//! ```text
//! parsed AST -> [ShardMapper::map] -> sharded AST -> (external) executor
//! ```
//!
//! The mapper is a pure, single-threaded, synchronous transform: it does
//! not mutate its input and allocates an entirely new tree, deep-cloning
//! any subtree that is reused across shards so that each shard's copy is
//! independent.

use crate::ast::{BinOp, LogSelectorExpr, SampleExpr, VectorAggregationOp};
use crate::downstream::{DownstreamLogSelectorExpr, DownstreamSampleExpr};
use crate::concat::{ConcatLogSelectorExpr, ConcatSampleExpr};
use crate::error::{ShardMapperError, ShardMapperResult};
use crate::shard::ShardAnnotation;

/// Either of the two top-level LQL expression categories.
/// [`ShardMapper::map`] dispatches on this to route to
/// [`ShardMapper::map_log_selector`] or [`ShardMapper::map_sample`],
/// mirroring public `Map` operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Log(LogSelectorExpr),
    Sample(SampleExpr),
}

impl From<LogSelectorExpr> for Expr {
    fn from(e: LogSelectorExpr) -> Self {
        Expr::Log(e)
    }
}

impl From<SampleExpr> for Expr {
    fn from(e: SampleExpr) -> Self {
        Expr::Sample(e)
    }
}

/// Rewrites parsed LQL expressions into sharded expressions for `shards`
/// horizontal partitions.
#[derive(Debug, Clone, Copy)]
pub struct ShardMapper {
    shards: u32,
}

impl ShardMapper {
    /// Construct a mapper for `shards` horizontal partitions.
    ///
    /// Rejects `shards < 2`: a single shard is a degenerate no-op that
    /// should not be requested, and zero shards is nonsensical.
    pub fn new(shards: u32) -> ShardMapperResult<Self> {
        if shards < 2 {
            return Err(ShardMapperError::InvalidShardCount(shards));
        }
        tracing::debug!(shards, "constructed shard mapper");
        Ok(ShardMapper { shards })
    }

    /// Number of horizontal partitions this mapper shards across.
    pub fn shards(&self) -> u32 {
        self.shards
    }

    /// Rewrite `expr`, dispatching on its category.
    pub fn map(&self, expr: Expr) -> Expr {
        match expr {
            Expr::Log(e) => Expr::Log(self.map_log_selector(e)),
            Expr::Sample(e) => Expr::Sample(self.map_sample(e)),
        }
    }

    /// Fan out a log-selector expression across every shard. Log-selector
    /// expressions are pure streams: every line is
    /// independent and horizontally shardable without algebraic rewriting,
    /// so `Matchers` and `Filter` subtrees are handled identically — the
    /// whole fragment is cloned to each shard and concatenated.
    pub fn map_log_selector(&self, expr: LogSelectorExpr) -> LogSelectorExpr {
        tracing::trace!(expr = %expr, "fanning out log selector across shards");
        self.fan_out_log_selector(&expr)
    }

    /// Rewrite a sample expression, dispatching on the
    /// outermost node:
    ///
    /// - `Literal` is returned as-is (no data, no sharding).
    /// - `BinOp` recurses into both sides.
    /// - `RangeAggregation` fans the whole node out across shards — every
    ///   series belongs to exactly one shard.
    /// - `VectorAggregation` applies the V1-V4 rewrite rules.
    pub fn map_sample(&self, expr: SampleExpr) -> SampleExpr {
        self.map_sample_ctx(expr, false)
    }

    /// `nested` tracks whether the immediately enclosing caller is itself
    /// a vector aggregation that chose not to shard (Rule V4). Threaded
    /// explicitly rather than inferred from shape, because the V4 guard
    /// is a property of the *path taken to reach this node*, not of the
    /// node's own children — see `map_vector_aggregation`. A node beneath
    /// a declining ancestor does not automatically decline itself: it
    /// re-evaluates from its own immediate child, and only honors the
    /// inherited decline when it is *also* a global (groupingless)
    /// reduction — see `map_vector_aggregation` for why.
    fn map_sample_ctx(&self, expr: SampleExpr, nested: bool) -> SampleExpr {
        match expr {
            SampleExpr::Literal(v) => SampleExpr::Literal(v),
            SampleExpr::BinOp { op, lhs, rhs } => SampleExpr::BinOp {
                op,
                lhs: Box::new(self.map_sample(*lhs)),
                rhs: Box::new(self.map_sample(*rhs)),
            },
            SampleExpr::RangeAggregation { .. } => {
                tracing::trace!("fanning out range aggregation across shards");
                self.fan_out_sample(&expr)
            }
            SampleExpr::VectorAggregation {
                op,
                grouping,
                inner,
                params,
            } => self.map_vector_aggregation(op, grouping, *inner, params, nested),
            // Already-sharded nodes reaching `map_sample` would violate
            // "no nesting of shard scopes" — a well-formed parser never
            // produces them, so they pass through unchanged rather than
            // being sharded again.
            SampleExpr::Downstream(_) | SampleExpr::Concat(_) => expr,
        }
    }

    /// Apply Rules V1-V4 to a single vector aggregation
    /// node. `inner` is the aggregation's input, already unpacked from its
    /// `Box` by the caller; `nested` is `true` when an enclosing vector
    /// aggregation already decided to keep itself unsharded and recurse.
    ///
    /// Rule V1 (`count`, `avg`) ignores `nested` and always decomposes: it
    /// swaps in a different combiner rather than re-applying itself, so it
    /// never double-combines regardless of what encloses it.
    ///
    /// Rule V2 (`sum`/`min`/`max`) declines to shard itself — keeping the
    /// outer aggregator intact and recursing into its input instead — when
    /// either its own immediate input is itself a vector aggregation, or an
    /// enclosing aggregation already declined *and this aggregation has no
    /// grouping of its own* (`by`/`without` with an empty label set, i.e. a
    /// global reduce). A grouped aggregation (`sum by (cluster) (...)`) is
    /// still a genuine, independently-combinable partial reduction even
    /// when nested beneath a declining ancestor, so it re-evaluates fresh
    /// from its own child rather than inheriting the decline: its per-shard
    /// fragments can be correctly recombined by reapplying the same
    /// grouped operator at the top, exactly as if it were the outermost
    /// aggregation. Only a *global* aggregation chained directly beneath
    /// another declined aggregation is treated as part of the same
    /// undecomposed reduction, since collapsing to one series twice in a
    /// row introduces no shardable boundary of its own.
    ///
    /// Hence `sum(max(rate(...)))` leaves both `sum` and `max` unsharded
    /// (only `rate` fans out, since `max`'s empty grouping inherits `sum`'s
    /// decline), while `max(sum by (cluster) (rate(...)))` leaves `max`
    /// unsharded but still shards the grouped `sum` beneath it (its
    /// `by (cluster)` grouping is non-empty, so it ignores the inherited
    /// decline), and `max(count(rate(...)))` leaves `max` unsharded but
    /// still decomposes `count` underneath it (Rule V1 always decomposes,
    /// irrespective of `nested`).
    fn map_vector_aggregation(
        &self,
        op: VectorAggregationOp,
        grouping: crate::ast::Grouping,
        inner: SampleExpr,
        params: Option<i64>,
        nested: bool,
    ) -> SampleExpr {
        if op.is_count() {
            // Rule V1 (count): count(inner) -> sum_g(Concat_k Downstream(count_g(clone(inner))))
            let per_shard = SampleExpr::vector_aggregation(
                VectorAggregationOp::Count,
                grouping.clone(),
                inner,
                None,
            );
            let fanned = self.fan_out_sample(&per_shard);
            return SampleExpr::vector_aggregation(VectorAggregationOp::Sum, grouping, fanned, None);
        }

        if op.is_avg() {
            // Rule V1 (avg): avg(inner) -> sum_g(shardedSums) / sum_g(shardedCounts)
            let sums_per_shard = SampleExpr::vector_aggregation(
                VectorAggregationOp::Sum,
                grouping.clone(),
                inner.clone(),
                None,
            );
            let counts_per_shard = SampleExpr::vector_aggregation(
                VectorAggregationOp::Count,
                grouping.clone(),
                inner,
                None,
            );
            let fanned_sums = self.fan_out_sample(&sums_per_shard);
            let fanned_counts = self.fan_out_sample(&counts_per_shard);
            let summed =
                SampleExpr::vector_aggregation(VectorAggregationOp::Sum, grouping.clone(), fanned_sums, None);
            let counted =
                SampleExpr::vector_aggregation(VectorAggregationOp::Sum, grouping, fanned_counts, None);
            return SampleExpr::bin_op(BinOp::Div, summed, counted);
        }

        if op.is_distributive() {
            let inner_is_vector_agg = matches!(inner, SampleExpr::VectorAggregation { .. });
            let is_global = grouping == crate::ast::Grouping::default();
            let declines = inner_is_vector_agg || (nested && is_global);

            if !declines {
                // Rule V2 (sum/min/max): push the aggregation into each
                // shard and re-apply at the top. Applies both to an
                // un-nested aggregation and to a *grouped* aggregation
                // nested beneath a declining ancestor (see doc comment).
                let per_shard = SampleExpr::vector_aggregation(op, grouping.clone(), inner, params);
                let fanned = self.fan_out_sample(&per_shard);
                return SampleExpr::vector_aggregation(op, grouping, fanned, params);
            }

            // Declined: keep the outer aggregator intact, recurse into the
            // input, and propagate the decline so a further global V2
            // aggregation directly beneath this one also declines.
            let mapped_inner = self.map_sample_ctx(inner, true);
            return SampleExpr::vector_aggregation(op, grouping, mapped_inner, params);
        }

        // Rule V3 (topk/bottomk/stddev/stdvar/quantile): never shards
        // itself; keep the outer aggregator intact and recurse into the
        // input, propagating `nested = true` so a V2 aggregation directly
        // beneath this one applies the same decline rule as above.
        let mapped_inner = self.map_sample_ctx(inner, true);
        SampleExpr::vector_aggregation(op, grouping, mapped_inner, params)
    }

    /// Build `Concat_k=0..N-1 Downstream(shard=k, clone(template))` for a
    /// log-selector template.
    fn fan_out_log_selector(&self, template: &LogSelectorExpr) -> LogSelectorExpr {
        let heads: Vec<DownstreamLogSelectorExpr> = (0..self.shards)
            .map(|k| DownstreamLogSelectorExpr {
                shard: ShardAnnotation::new(k, self.shards).expect("k < shards by construction"),
                inner: template.clone(),
            })
            .collect();
        ConcatLogSelectorExpr::from_heads(heads).into()
    }

    /// Build `Concat_k=0..N-1 Downstream(shard=k, clone(template))` for a
    /// sample-expression template.
    fn fan_out_sample(&self, template: &SampleExpr) -> SampleExpr {
        let heads: Vec<DownstreamSampleExpr> = (0..self.shards)
            .map(|k| DownstreamSampleExpr {
                shard: ShardAnnotation::new(k, self.shards).expect("k < shards by construction"),
                inner: template.clone(),
            })
            .collect();
        ConcatSampleExpr::from_heads(heads).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Grouping, MatchOp, Matcher, RangeAggregationOp};
    use std::time::Duration;

    fn foo_bar() -> LogSelectorExpr {
        LogSelectorExpr::matchers(vec![Matcher::new("foo", MatchOp::Equal, "bar")])
    }

    fn rate_5m() -> SampleExpr {
        SampleExpr::range_aggregation(RangeAggregationOp::Rate, foo_bar(), Duration::from_secs(300))
    }

    #[test]
    fn rejects_shard_counts_below_two() {
        assert!(ShardMapper::new(0).is_err());
        assert!(ShardMapper::new(1).is_err());
        assert!(ShardMapper::new(2).is_ok());
    }

    // S1 — pure selector.
    #[test]
    fn s1_pure_selector_fans_out() {
        let m = ShardMapper::new(2).unwrap();
        let mapped = m.map_log_selector(foo_bar());
        assert_eq!(
            mapped.to_string(),
            r#"downstream<{foo="bar"}, shard=0_of_2> ++ downstream<{foo="bar"}, shard=1_of_2>"#
        );
    }

    // S2 — filtered selector.
    #[test]
    fn s2_filtered_selector_fans_out_whole_fragment() {
        let m = ShardMapper::new(2).unwrap();
        let filtered = foo_bar().filter(MatchOp::Equal, "error");
        let mapped = m.map_log_selector(filtered);
        assert_eq!(
            mapped.to_string(),
            r#"downstream<{foo="bar"} |= "error", shard=0_of_2> ++ downstream<{foo="bar"} |= "error", shard=1_of_2>"#
        );
    }

    // S3 — range aggregation fan-out.
    #[test]
    fn s3_range_aggregation_fans_out() {
        let m = ShardMapper::new(2).unwrap();
        let mapped = m.map_sample(rate_5m());
        assert_eq!(
            mapped.to_string(),
            r#"downstream<rate({foo="bar"}[5m]), shard=0_of_2> ++ downstream<rate({foo="bar"}[5m]), shard=1_of_2>"#
        );
    }

    // S4 — distributive vector aggregation (sum).
    #[test]
    fn s4_sum_pushes_down_and_reapplies() {
        let m = ShardMapper::new(2).unwrap();
        let query = SampleExpr::vector_aggregation(VectorAggregationOp::Sum, Grouping::default(), rate_5m(), None);
        let mapped = m.map_sample(query);
        assert_eq!(
            mapped.to_string(),
            r#"sum(downstream<sum(rate({foo="bar"}[5m])), shard=0_of_2> ++ downstream<sum(rate({foo="bar"}[5m])), shard=1_of_2>)"#
        );
    }

    // S5 — non-distributive (topk): no per-shard topk inserted.
    #[test]
    fn s5_topk_keeps_single_outer_aggregator() {
        let m = ShardMapper::new(2).unwrap();
        let query = SampleExpr::vector_aggregation(
            VectorAggregationOp::TopK,
            Grouping::default(),
            rate_5m(),
            Some(3),
        );
        let mapped = m.map_sample(query);
        assert_eq!(
            mapped.to_string(),
            r#"topk(3, downstream<rate({foo="bar"}[5m]), shard=0_of_2> ++ downstream<rate({foo="bar"}[5m]), shard=1_of_2>)"#
        );
    }

    // S6 — count decomposition: outer sum, per-shard count.
    #[test]
    fn s6_count_decomposes_into_sum_of_counts() {
        let m = ShardMapper::new(2).unwrap();
        let query = SampleExpr::vector_aggregation(VectorAggregationOp::Count, Grouping::default(), rate_5m(), None);
        let mapped = m.map_sample(query);
        assert_eq!(
            mapped.to_string(),
            r#"sum(downstream<count(rate({foo="bar"}[5m])), shard=0_of_2> ++ downstream<count(rate({foo="bar"}[5m])), shard=1_of_2>)"#
        );
    }

    // S7 — average decomposition: sum(sums) / sum(counts).
    #[test]
    fn s7_avg_decomposes_into_division() {
        let m = ShardMapper::new(2).unwrap();
        let query = SampleExpr::vector_aggregation(VectorAggregationOp::Avg, Grouping::default(), rate_5m(), None);
        let mapped = m.map_sample(query);
        match &mapped {
            SampleExpr::BinOp { op: BinOp::Div, lhs, rhs } => {
                assert!(matches!(
                    **lhs,
                    SampleExpr::VectorAggregation { op: VectorAggregationOp::Sum, .. }
                ));
                assert!(matches!(
                    **rhs,
                    SampleExpr::VectorAggregation { op: VectorAggregationOp::Sum, .. }
                ));
                assert!(lhs.to_string().contains("sum(rate"));
                assert!(rhs.to_string().contains("count(rate"));
            }
            other => panic!("expected top-level division, got {other}"),
        }
    }

    // S8 — nested aggregation guard: sum(max(rate)) shards only the rate.
    #[test]
    fn s8_sum_of_max_does_not_shard_either_aggregator() {
        let m = ShardMapper::new(2).unwrap();
        let inner_max =
            SampleExpr::vector_aggregation(VectorAggregationOp::Max, Grouping::default(), rate_5m(), None);
        let query = SampleExpr::vector_aggregation(VectorAggregationOp::Sum, Grouping::default(), inner_max, None);
        let mapped = m.map_sample(query);
        assert_eq!(
            mapped.to_string(),
            r#"sum(max(downstream<rate({foo="bar"}[5m]), shard=0_of_2> ++ downstream<rate({foo="bar"}[5m]), shard=1_of_2>))"#
        );
        // Neither `sum` nor `max` is replicated per shard; only the `rate`
        // leaf is, and each aggregator wraps the single shared concat spine.
        match &mapped {
            SampleExpr::VectorAggregation { op: VectorAggregationOp::Sum, inner, .. } => match &**inner {
                SampleExpr::VectorAggregation { op: VectorAggregationOp::Max, inner, .. } => {
                    assert!(matches!(**inner, SampleExpr::Concat(_)));
                }
                other => panic!("expected max directly under sum, got {other}"),
            },
            other => panic!("expected sum at top, got {other}"),
        }
    }

    // max(count(rate)) - max stays outer; count decomposes underneath.
    #[test]
    fn max_of_count_shards_only_the_count() {
        let m = ShardMapper::new(2).unwrap();
        let inner_count =
            SampleExpr::vector_aggregation(VectorAggregationOp::Count, Grouping::default(), rate_5m(), None);
        let query = SampleExpr::vector_aggregation(VectorAggregationOp::Max, Grouping::default(), inner_count, None);
        let mapped = m.map_sample(query);
        assert_eq!(
            mapped.to_string(),
            r#"max(sum(downstream<count(rate({foo="bar"}[5m])), shard=0_of_2> ++ downstream<count(rate({foo="bar"}[5m])), shard=1_of_2>))"#
        );
    }

    // max(sum by (cluster) (rate(...))) / count(rate(...)) - max stays
    // outer, but the grouped `sum` beneath it still shards: an inherited
    // decline only blocks a *global* (groupingless) aggregation, not a
    // grouped one.
    #[test]
    fn max_of_grouped_sum_still_shards_the_grouped_sum() {
        let m = ShardMapper::new(2).unwrap();
        let inner_sum = SampleExpr::vector_aggregation(
            VectorAggregationOp::Sum,
            Grouping::by(vec!["cluster".to_string()]),
            rate_5m(),
            None,
        );
        let query = SampleExpr::vector_aggregation(VectorAggregationOp::Max, Grouping::default(), inner_sum, None);
        let mapped = m.map_sample(query);
        assert_eq!(
            mapped.to_string(),
            r#"max(sum by (cluster)(downstream<sum by (cluster)(rate({foo="bar"}[5m])), shard=0_of_2> ++ downstream<sum by (cluster)(rate({foo="bar"}[5m])), shard=1_of_2>))"#
        );
        match &mapped {
            SampleExpr::VectorAggregation { op: VectorAggregationOp::Max, inner, .. } => match &**inner {
                SampleExpr::VectorAggregation { op: VectorAggregationOp::Sum, grouping, inner, .. } => {
                    assert_eq!(grouping.labels, vec!["cluster".to_string()]);
                    assert!(matches!(**inner, SampleExpr::Concat(_)));
                }
                other => panic!("expected grouped sum directly under max, got {other}"),
            },
            other => panic!("expected max at top, got {other}"),
        }
    }

    // S9 — grouping preserved through BinOp recursion.
    #[test]
    fn s9_grouping_preserved_under_binop() {
        let m = ShardMapper::new(2).unwrap();
        let sum_by_cluster = SampleExpr::vector_aggregation(
            VectorAggregationOp::Sum,
            Grouping::by(vec!["cluster".to_string()]),
            rate_5m(),
            None,
        );
        let query = SampleExpr::bin_op(BinOp::Add, SampleExpr::Literal(1.0), sum_by_cluster);
        let mapped = m.map_sample(query);
        let s = mapped.to_string();
        assert!(s.contains("sum by (cluster)"));
        assert!(s.contains("downstream<sum by (cluster)"));
    }

    #[test]
    fn category_is_preserved() {
        let m = ShardMapper::new(3).unwrap();
        match m.map(Expr::Log(foo_bar())) {
            Expr::Log(_) => {}
            Expr::Sample(_) => panic!("category changed from log to sample"),
        }
        match m.map(Expr::Sample(rate_5m())) {
            Expr::Sample(_) => {}
            Expr::Log(_) => panic!("category changed from sample to log"),
        }
    }

    #[test]
    fn determinism_two_runs_equal() {
        let m = ShardMapper::new(4).unwrap();
        let a = m.map_sample(rate_5m());
        let b = m.map_sample(rate_5m());
        assert_eq!(a, b);
    }

    #[test]
    fn count_by_grouping_preserves_grouping_on_both_layers() {
        let m = ShardMapper::new(2).unwrap();
        let query = SampleExpr::vector_aggregation(
            VectorAggregationOp::Count,
            Grouping::by(vec!["cluster".to_string()]),
            rate_5m(),
            None,
        );
        let mapped = m.map_sample(query);
        match mapped {
            SampleExpr::VectorAggregation { op: VectorAggregationOp::Sum, grouping, inner, .. } => {
                assert_eq!(grouping.labels, vec!["cluster".to_string()]);
                match *inner {
                    SampleExpr::Concat(spine) => {
                        assert_eq!(spine.head.inner.to_string(), "count by (cluster)(rate({foo=\"bar\"}[5m]))");
                    }
                    other => panic!("expected concat spine, got {other}"),
                }
            }
            other => panic!("expected outer sum, got {other}"),
        }
    }
}
