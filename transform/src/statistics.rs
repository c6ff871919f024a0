use core::fmt::{self, Write};

use compact_str::CompactString;
use smallvec::SmallVec;

/// A named counter reported by the pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassStatistic {
    pub name: CompactString,
    pub description: CompactString,
    pub value: usize,
}

impl PassStatistic {
    pub fn new(name: &str, description: &str, value: usize) -> Self {
        Self {
            name: CompactString::new(name),
            description: CompactString::new(description),
            value,
        }
    }
}

/// What a run of the pass changed
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Statistics {
    /// Conditional branches found to always go one way
    pub branches_rewritten: usize,
    /// Ordinary statements, and branch conditions, replaced with cheaper forms
    pub statements_simplified: usize,
    /// Control flow edges removed when the deferred edits were applied
    pub edges_removed: usize,
    /// Switches whose cases or default were narrowed
    pub switches_updated: usize,
    /// Range assertions replaced with plain copies once propagation finished
    pub assertions_removed: usize,
}

impl Statistics {
    /// Returns true if the run changed nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Accumulate the counters of another run into these
    pub fn merge(&mut self, other: &Self) {
        self.branches_rewritten += other.branches_rewritten;
        self.statements_simplified += other.statements_simplified;
        self.edges_removed += other.edges_removed;
        self.switches_updated += other.switches_updated;
        self.assertions_removed += other.assertions_removed;
    }

    pub fn entries(&self) -> [PassStatistic; 5] {
        [
            PassStatistic::new(
                "assertions-removed",
                "range assertions replaced with copies",
                self.assertions_removed,
            ),
            PassStatistic::new(
                "branches-rewritten",
                "conditional branches with a known outcome",
                self.branches_rewritten,
            ),
            PassStatistic::new("edges-removed", "unexecutable edges removed", self.edges_removed),
            PassStatistic::new(
                "statements-simplified",
                "statements replaced with cheaper forms",
                self.statements_simplified,
            ),
            PassStatistic::new(
                "switches-updated",
                "switches with unreachable destinations removed",
                self.switches_updated,
            ),
        ]
    }

    /// Print these statistics under the heading `pass`, with each entry indented by `indent`
    pub fn print(&self, out: &mut dyn fmt::Write, indent: usize, pass: &str) -> fmt::Result {
        struct Rendered {
            name: CompactString,
            description: CompactString,
            value: CompactString,
        }

        writeln!(out, "{pass}")?;

        let mut largest_name = 0usize;
        let mut largest_value = 0usize;
        let mut rendered = SmallVec::<[Rendered; 5]>::default();
        for stat in self.entries() {
            let mut value = CompactString::default();
            write!(&mut value, "{}", stat.value)?;
            largest_name = core::cmp::max(largest_name, stat.name.len());
            largest_value = core::cmp::max(largest_value, value.len());
            rendered.push(Rendered {
                name: stat.name,
                description: stat.description,
                value,
            });
        }
        rendered.sort_by(|a, b| a.name.cmp(&b.name));

        for stat in rendered {
            write!(out, "{: <1$} (S) ", "", indent)?;
            write!(out, "{: <1$} ", &stat.value, largest_value)?;
            write!(out, "{: <1$}", &stat.name, largest_name)?;
            if stat.description.is_empty() {
                out.write_char('\n')?;
            } else {
                writeln!(out, " - {}", &stat.description)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print(f, 2, crate::ValueRangePropagation::NAME)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn merge_accumulates_every_counter() {
        let mut total = Statistics {
            branches_rewritten: 1,
            edges_removed: 1,
            ..Default::default()
        };
        total.merge(&Statistics {
            branches_rewritten: 2,
            statements_simplified: 3,
            edges_removed: 2,
            switches_updated: 1,
            assertions_removed: 4,
        });
        assert_eq!(
            total,
            Statistics {
                branches_rewritten: 3,
                statements_simplified: 3,
                edges_removed: 3,
                switches_updated: 1,
                assertions_removed: 4,
            }
        );
        assert!(!total.is_empty());
        assert!(Statistics::default().is_empty());
    }

    #[test]
    fn printed_sorted_and_aligned() -> fmt::Result {
        let stats = Statistics {
            branches_rewritten: 12,
            edges_removed: 3,
            ..Default::default()
        };
        let mut out = String::new();
        stats.print(&mut out, 2, "vrp")?;
        let expected = "\
vrp
   (S) 0  assertions-removed    - range assertions replaced with copies
   (S) 12 branches-rewritten    - conditional branches with a known outcome
   (S) 3  edges-removed         - unexecutable edges removed
   (S) 0  statements-simplified - statements replaced with cheaper forms
   (S) 0  switches-updated      - switches with unreachable destinations removed
";
        assert_eq!(out, expected);
        Ok(())
    }
}
