//! # LQL AST - Abstract Syntax Tree Types
//!
//! Abstract Syntax Tree types for the log-query language (LQL) consumed by
//! the shard mapper. These types are produced upstream by a parser (out of
//! scope for this crate) and consumed by the [`crate::shard_mapper`].
//!
//! ## Builders
//!
//! For programmatic construction of AST nodes (useful in tests and by
//! callers that assemble queries without a parser), see the [`builders`]
//! module.

use std::fmt;
use std::time::Duration;

pub mod builders;

// ============================================================================
// Shared operator types
// ============================================================================

/// Matcher / filter operator, shared between label matchers and line filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOp {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `=~`
    Regexp,
    /// `!~`
    NotRegexp,
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchOp::Equal => write!(f, "="),
            MatchOp::NotEqual => write!(f, "!="),
            MatchOp::Regexp => write!(f, "=~"),
            MatchOp::NotRegexp => write!(f, "!~"),
        }
    }
}

impl MatchOp {
    /// The pipe-filter spelling of this operator (e.g. `|=` for `Equal`).
    fn filter_symbol(self) -> &'static str {
        match self {
            MatchOp::Equal => "|=",
            MatchOp::NotEqual => "!=",
            MatchOp::Regexp => "|~",
            MatchOp::NotRegexp => "!~",
        }
    }
}

/// A single label matcher, e.g. `foo="bar"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    pub name: String,
    pub op: MatchOp,
    pub value: String,
}

impl Matcher {
    pub fn new(name: impl Into<String>, op: MatchOp, value: impl Into<String>) -> Self {
        Matcher {
            name: name.into(),
            op,
            value: value.into(),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}\"{}\"", self.name, self.op, self.value)
    }
}

/// Binary operators over sample expressions: arithmetic, comparison and set
/// operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    Unless,
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "^",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Unless => "unless",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Lte => "<=",
            BinOp::Gte => ">=",
        };
        write!(f, "{s}")
    }
}

/// Range-vector aggregation operators. All are
/// distributive over shards: every series belongs to exactly one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeAggregationOp {
    Rate,
    CountOverTime,
    BytesRate,
    BytesOverTime,
    AvgOverTime,
    SumOverTime,
    MinOverTime,
    MaxOverTime,
    StdvarOverTime,
    StddevOverTime,
    QuantileOverTime,
    FirstOverTime,
    LastOverTime,
    AbsentOverTime,
}

impl fmt::Display for RangeAggregationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RangeAggregationOp::Rate => "rate",
            RangeAggregationOp::CountOverTime => "count_over_time",
            RangeAggregationOp::BytesRate => "bytes_rate",
            RangeAggregationOp::BytesOverTime => "bytes_over_time",
            RangeAggregationOp::AvgOverTime => "avg_over_time",
            RangeAggregationOp::SumOverTime => "sum_over_time",
            RangeAggregationOp::MinOverTime => "min_over_time",
            RangeAggregationOp::MaxOverTime => "max_over_time",
            RangeAggregationOp::StdvarOverTime => "stdvar_over_time",
            RangeAggregationOp::StddevOverTime => "stddev_over_time",
            RangeAggregationOp::QuantileOverTime => "quantile_over_time",
            RangeAggregationOp::FirstOverTime => "first_over_time",
            RangeAggregationOp::LastOverTime => "last_over_time",
            RangeAggregationOp::AbsentOverTime => "absent_over_time",
        };
        write!(f, "{s}")
    }
}

/// Vector aggregation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorAggregationOp {
    Sum,
    Min,
    Max,
    Avg,
    Count,
    TopK,
    BottomK,
    Stddev,
    Stdvar,
    Quantile,
}

impl VectorAggregationOp {
    /// Rule V1/V2 distributivity: these operators can be pushed into each
    /// shard and re-applied at the top unchanged,
    /// or algebraically decomposed into a different combiner (Rule V1).
    /// Everything else defaults to Rule V3 (non-distributive).
    pub(crate) fn is_count(self) -> bool {
        matches!(self, VectorAggregationOp::Count)
    }

    pub(crate) fn is_avg(self) -> bool {
        matches!(self, VectorAggregationOp::Avg)
    }

    pub(crate) fn is_distributive(self) -> bool {
        matches!(
            self,
            VectorAggregationOp::Sum | VectorAggregationOp::Min | VectorAggregationOp::Max
        )
    }
}

impl fmt::Display for VectorAggregationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VectorAggregationOp::Sum => "sum",
            VectorAggregationOp::Min => "min",
            VectorAggregationOp::Max => "max",
            VectorAggregationOp::Avg => "avg",
            VectorAggregationOp::Count => "count",
            VectorAggregationOp::TopK => "topk",
            VectorAggregationOp::BottomK => "bottomk",
            VectorAggregationOp::Stddev => "stddev",
            VectorAggregationOp::Stdvar => "stdvar",
            VectorAggregationOp::Quantile => "quantile",
        };
        write!(f, "{s}")
    }
}

/// `by(labels)` / `without(labels)` clause attached to a vector aggregation.
///
/// An absent grouping in source syntax is canonicalized by the parser (out
/// of scope here) to `Grouping::default()` — empty labels, `without = false`
/// — so equality comparison between mapped trees stays stable (spec.md
/// §3.1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Grouping {
    pub without: bool,
    pub labels: Vec<String>,
}

impl Grouping {
    pub fn by(labels: Vec<String>) -> Self {
        Grouping {
            without: false,
            labels,
        }
    }

    pub fn without(labels: Vec<String>) -> Self {
        Grouping {
            without: true,
            labels,
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return Ok(());
        }
        let keyword = if self.without { "without" } else { "by" };
        write!(f, " {keyword} ({})", self.labels.join(", "))
    }
}

// ============================================================================
// LogSelectorExpr - produces a lazy stream of log lines
// ============================================================================

/// Produces a lazy stream of log lines.
///
/// The `Downstream`/`Concat` variants are produced only by
/// the [`crate::shard_mapper`] — a well-formed query parsed from source
/// text never contains them, and a `Downstream` never contains another
/// `Downstream`.
#[derive(Debug, Clone, PartialEq)]
pub enum LogSelectorExpr {
    /// A non-empty set of label matchers, e.g. `{foo="bar"}`.
    Matchers(Vec<Matcher>),
    /// A line-content predicate applied to an inner log selector.
    Filter {
        inner: Box<LogSelectorExpr>,
        op: MatchOp,
        pattern: String,
    },
    /// A fragment annotated for execution on one shard.
    Downstream(Box<crate::downstream::DownstreamLogSelectorExpr>),
    /// A spine concatenating per-shard downstream fragments.
    Concat(Box<crate::concat::ConcatLogSelectorExpr>),
}

impl LogSelectorExpr {
    pub fn matchers(ms: Vec<Matcher>) -> Self {
        LogSelectorExpr::Matchers(ms)
    }

    pub fn filter(self, op: MatchOp, pattern: impl Into<String>) -> Self {
        LogSelectorExpr::Filter {
            inner: Box::new(self),
            op,
            pattern: pattern.into(),
        }
    }
}

impl fmt::Display for LogSelectorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSelectorExpr::Matchers(ms) => {
                write!(f, "{{")?;
                for (i, m) in ms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, "}}")
            }
            LogSelectorExpr::Filter { inner, op, pattern } => {
                write!(f, "{inner} {} \"{pattern}\"", op.filter_symbol())
            }
            LogSelectorExpr::Downstream(d) => write!(f, "{d}"),
            LogSelectorExpr::Concat(c) => write!(f, "{c}"),
        }
    }
}

// ============================================================================
// SampleExpr - produces a numeric vector indexed by label sets
// ============================================================================

/// Windows a log stream into a range over `interval`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRange {
    pub inner: LogSelectorExpr,
    pub interval: Duration,
}

impl fmt::Display for LogRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.inner, format_duration(self.interval))
    }
}

/// Produces a numeric vector indexed by label sets.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleExpr {
    /// Reduces each range to a scalar per series.
    RangeAggregation {
        op: RangeAggregationOp,
        range: LogRange,
    },
    /// Reduces over series with optional grouping; `params` carries `k` for
    /// `topk`/`bottomk`.
    VectorAggregation {
        op: VectorAggregationOp,
        grouping: Grouping,
        inner: Box<SampleExpr>,
        params: Option<i64>,
    },
    BinOp {
        op: BinOp,
        lhs: Box<SampleExpr>,
        rhs: Box<SampleExpr>,
    },
    Literal(f64),
    /// A fragment annotated for execution on one shard.
    Downstream(Box<crate::downstream::DownstreamSampleExpr>),
    /// A spine concatenating per-shard downstream fragments.
    Concat(Box<crate::concat::ConcatSampleExpr>),
}

impl SampleExpr {
    pub fn range_aggregation(op: RangeAggregationOp, inner: LogSelectorExpr, interval: Duration) -> Self {
        SampleExpr::RangeAggregation {
            op,
            range: LogRange { inner, interval },
        }
    }

    pub fn vector_aggregation(
        op: VectorAggregationOp,
        grouping: Grouping,
        inner: SampleExpr,
        params: Option<i64>,
    ) -> Self {
        SampleExpr::VectorAggregation {
            op,
            grouping,
            inner: Box::new(inner),
            params,
        }
    }

    pub fn bin_op(op: BinOp, lhs: SampleExpr, rhs: SampleExpr) -> Self {
        SampleExpr::BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

impl fmt::Display for SampleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleExpr::RangeAggregation { op, range } => write!(f, "{op}({range})"),
            SampleExpr::VectorAggregation {
                op,
                grouping,
                inner,
                params,
            } => {
                write!(f, "{op}{grouping}(")?;
                if let Some(p) = params {
                    write!(f, "{p}, ")?;
                }
                write!(f, "{inner})")
            }
            SampleExpr::BinOp { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            SampleExpr::Literal(v) => write!(f, "{v}"),
            SampleExpr::Downstream(d) => write!(f, "{d}"),
            SampleExpr::Concat(c) => write!(f, "{c}"),
        }
    }
}

pub(crate) fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return format!("{}ms", d.as_millis());
    }
    if secs % 3600 == 0 {
        return format!("{}h", secs / 3600);
    }
    if secs % 60 == 0 {
        return format!("{}m", secs / 60);
    }
    format!("{secs}s")
}
