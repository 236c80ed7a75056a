//! Shard mapper error types.

use thiserror::Error;

/// Errors surfaced by shard annotation construction and mapper
/// construction. Mapping itself (`ShardMapper::map`) cannot
/// fail on a well-formed AST — there is no variant for it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardMapperError {
    /// `NewShardMapper` was asked for fewer than 2 shards (spec.md §4.3:
    /// `N = 1` is a degenerate no-op and `N = 0` is nonsensical, so both
    /// are rejected).
    #[error("invalid shard count: {0} (must be >= 2)")]
    InvalidShardCount(u32),

    /// A `ShardAnnotation` was constructed with `shard >= of` or `of == 0`.
    #[error("invalid shard annotation: shard {shard} of {of} (require shard < of and of >= 1)")]
    InvalidShardAnnotation { shard: u32, of: u32 },
}

/// Result type for shard-mapper operations.
pub type ShardMapperResult<T> = Result<T, ShardMapperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_shard_count_message() {
        let err = ShardMapperError::InvalidShardCount(1);
        assert_eq!(err.to_string(), "invalid shard count: 1 (must be >= 2)");
    }

    #[test]
    fn invalid_shard_annotation_message() {
        let err = ShardMapperError::InvalidShardAnnotation { shard: 2, of: 2 };
        assert_eq!(
            err.to_string(),
            "invalid shard annotation: shard 2 of 2 (require shard < of and of >= 1)"
        );
    }
}
