//! Per-stage relay: pass every upstream fragment through unchanged, then
//! append exactly one fragment describing this stage's own operation.

use std::collections::HashSet;
use std::io::Write;

use tracing::debug;

use crate::chain::is_hoisted_line;
use crate::error::Result;
use crate::fragment::{DEFAULT_SOURCE, Fragment};
use crate::protocol::write_fragments;

/// Upstream state a stage needs in order to describe itself.
#[derive(Debug, Clone)]
pub struct Forwarder {
    upstream: Vec<Fragment>,
    origin_command: String,
}

impl Forwarder {
    pub fn new(upstream: Vec<Fragment>, origin_command: impl Into<String>) -> Self {
        Self {
            upstream,
            origin_command: origin_command.into(),
        }
    }

    pub fn upstream(&self) -> &[Fragment] {
        &self.upstream
    }

    pub fn origin_command(&self) -> &str {
        &self.origin_command
    }

    /// Name this stage consumes: the most recent output bound upstream, or
    /// the default source symbol when nothing is bound yet.
    pub fn input_name(&self) -> &str {
        self.upstream
            .iter()
            .rev()
            .map(Fragment::output_name)
            .find(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SOURCE)
    }

    /// Allocate an output name based on `base` that no upstream fragment
    /// has bound yet: `base`, then `base1`, `base2`, ...
    pub fn output_name(&self, base: &str) -> String {
        let taken: HashSet<&str> = self
            .upstream
            .iter()
            .map(Fragment::output_name)
            .filter(|name| !name.is_empty())
            .collect();

        if !taken.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }

    /// Sequence number for the next hoisted package-level declaration, so
    /// declarations from different stages never share a name.
    pub fn next_hoist_index(&self) -> usize {
        let existing = self
            .upstream
            .iter()
            .flat_map(|f| f.body().lines())
            .filter(|line| is_hoisted_line(line))
            .count();
        existing + 1
    }

    /// The full downstream sequence: upstream unchanged, then `fragment`.
    pub fn finish(self, fragment: Fragment) -> Vec<Fragment> {
        let mut out = self.upstream;
        out.push(fragment);
        out
    }

    /// Relay upstream and append `fragment` on `writer`.
    pub fn emit<W: Write>(self, writer: W, fragment: Fragment) -> Result<()> {
        debug!(
            relayed = self.upstream.len(),
            kind = fragment.kind().name(),
            output = fragment.output_name(),
            "emitting fragment"
        );
        let sequence = self.finish(fragment);
        write_fragments(writer, &sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::read_fragments;
    use std::io::Cursor;

    fn upstream() -> Vec<Fragment> {
        vec![
            Fragment::initial("records", "records := source()", vec![], "pipegen read-csv"),
            Fragment::transform(
                "filtered",
                "records",
                "filtered := whereOp(records)",
                vec![],
                "pipegen where",
            ),
        ]
    }

    #[test]
    fn test_first_stage_consumes_default_source() {
        let fwd = Forwarder::new(vec![], "pipegen limit 5");
        assert_eq!(fwd.input_name(), DEFAULT_SOURCE);
        assert_eq!(fwd.output_name("records"), "records");
    }

    #[test]
    fn test_input_is_last_bound_output() {
        let fwd = Forwarder::new(upstream(), "");
        assert_eq!(fwd.input_name(), "filtered");
    }

    #[test]
    fn test_terminal_upstream_is_skipped_for_input() {
        let mut frags = upstream();
        frags.push(Fragment::terminal("filtered", "show(filtered)", vec![], ""));
        let fwd = Forwarder::new(frags, "");
        assert_eq!(fwd.input_name(), "filtered");
    }

    #[test]
    fn test_output_names_are_unique() {
        let mut frags = upstream();
        frags.push(Fragment::transform("filtered1", "filtered", "", vec![], ""));
        let fwd = Forwarder::new(frags, "");
        assert_eq!(fwd.output_name("sorted"), "sorted");
        assert_eq!(fwd.output_name("filtered"), "filtered2");
    }

    #[test]
    fn test_hoist_index_counts_upstream_declarations() {
        let mut frags = upstream();
        frags.push(Fragment::transform(
            "filtered1",
            "filtered",
            "var exprFilter1 = runtime.MustCompileExprFilter(\"age > 1\")\nfiltered1 := ssql.Where(exprFilter1)(filtered)",
            vec![],
            "",
        ));
        assert_eq!(Forwarder::new(upstream(), "").next_hoist_index(), 1);
        assert_eq!(Forwarder::new(frags, "").next_hoist_index(), 2);
    }

    #[test]
    fn test_emit_relays_then_appends_one() {
        let fwd = Forwarder::new(upstream(), "pipegen sort age");
        let own = Fragment::transform(
            "sorted",
            fwd.input_name(),
            "sorted := sortOp(filtered)",
            vec![],
            fwd.origin_command(),
        );

        let mut buf = Vec::new();
        fwd.emit(&mut buf, own.clone()).unwrap();

        let emitted = read_fragments(Cursor::new(buf)).unwrap();
        assert_eq!(emitted.len(), upstream().len() + 1);
        assert_eq!(&emitted[..2], &upstream()[..]);
        assert_eq!(emitted[2], own);
    }
}
