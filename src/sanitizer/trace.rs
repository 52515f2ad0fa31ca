//! Removal of engine frames from reported backtraces.

/// Frames from the engine's own dispatch machinery.
const ENGINE_MARKERS: &[&str] = &[
    concat!(env!("CARGO_CRATE_NAME"), "::sanitizer::"),
    concat!(env!("CARGO_CRATE_NAME"), "::subscriptions::"),
];

/// Frames from the panic and backtrace runtime.
const RUNTIME_MARKERS: &[&str] = &[
    "std::backtrace",
    "std::panicking::",
    "std::panic::",
    "core::panicking::",
    "core::panic::unwind_safe::",
    "core::ops::function::",
    "std::sys::backtrace::",
    "std::sys_common::backtrace::",
    "rust_begin_unwind",
    "__rust_",
];

/// Strips frames whose symbol contains any of a set of markers.
#[derive(Clone, Debug)]
pub struct TraceFilter {
    markers: Vec<String>,
}

impl TraceFilter {
    /// Filter with no markers; keeps every frame.
    pub fn empty() -> Self {
        Self {
            markers: Vec::new(),
        }
    }

    /// Add a symbol fragment to hide.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// Symbol fragments currently hidden.
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Whether a frame symbol belongs to hidden machinery.
    pub fn is_internal(&self, symbol: &str) -> bool {
        self.markers.iter().any(|m| symbol.contains(m.as_str()))
    }

    /// Rewrite a rendered backtrace without the hidden frames.
    ///
    /// Frames follow the standard layout: a `N: symbol` header line and any
    /// indented `at file:line` lines below it. Kept frames are renumbered from
    /// zero.
    pub fn strip(&self, rendered: &str) -> String {
        let mut out = String::with_capacity(rendered.len());
        let mut index = 0usize;
        let mut keeping = true;

        for line in rendered.lines() {
            match frame_symbol(line) {
                Some(symbol) => {
                    keeping = !self.is_internal(symbol);
                    if keeping {
                        out.push_str(&format!("{index:>4}: {symbol}\n"));
                        index += 1;
                    }
                }
                None => {
                    if keeping {
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
        }

        out
    }
}

impl Default for TraceFilter {
    fn default() -> Self {
        Self {
            markers: ENGINE_MARKERS
                .iter()
                .chain(RUNTIME_MARKERS)
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

/// Symbol of a frame header line such as `  12: foo::bar`.
fn frame_symbol(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let (number, rest) = trimmed.split_once(':')?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(rest.trim())
}
