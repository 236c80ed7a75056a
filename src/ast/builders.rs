//! Fluent builders for LQL AST nodes.
//!
//! Convenience constructors for tests and for callers that assemble query
//! trees directly rather than through a parser.

use super::{LogSelectorExpr, MatchOp, Matcher};

/// Fluent builder for a `{name="value", ...}` matcher set.
#[derive(Debug, Default)]
pub struct MatchersBuilder {
    matchers: Vec<Matcher>,
}

impl MatchersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matcher(mut self, name: impl Into<String>, op: MatchOp, value: impl Into<String>) -> Self {
        self.matchers.push(Matcher::new(name, op, value));
        self
    }

    pub fn eq(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.matcher(name, MatchOp::Equal, value)
    }

    pub fn build(self) -> LogSelectorExpr {
        LogSelectorExpr::Matchers(self.matchers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_single_matcher_selector() {
        let expr = MatchersBuilder::new().eq("foo", "bar").build();
        assert_eq!(expr.to_string(), r#"{foo="bar"}"#);
    }
}
