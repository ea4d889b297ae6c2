//! Depth-indented tracing for top-down and bottom-up evaluation, layered over
//! the `log` facade: tracing can be turned on for every table or a specific
//! one, and each trace line is indented by the current depth.

use ahash::HashSet;

#[derive(Default)]
pub struct Tracer {
    tables: HashSet<String>,
    trace_all: bool,
}

impl Tracer {
    pub fn new() -> Self {
        Tracer {
            tables: HashSet::default(),
            trace_all: false,
        }
    }

    pub fn trace_all(&mut self) {
        self.trace_all = true;
    }

    pub fn trace_table(&mut self, table: impl Into<String>) {
        self.tables.insert(table.into());
    }

    fn is_traced(&self, table: &str) -> bool {
        self.trace_all || self.tables.contains(table)
    }

    /// Emits `message` at `log::Level::Debug`, indented by `depth`, if
    /// `table` is currently traced.
    pub fn log(&self, table: &str, depth: usize, message: impl std::fmt::Display) {
        if self.is_traced(table) {
            log::debug!("{}{}", "| ".repeat(depth), message);
        }
    }
}
