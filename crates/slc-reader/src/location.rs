use std::fmt;

/// The location of a token or error within the source text.
///
/// Command-line arguments (the `--exec`/`-o` invocation itself, not the
/// source file) are reported as line 0; source file lines start from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// 1-based line number, or 0 for a location outside any source file.
    pub line: usize,
}

impl Location {
    /// The location used for command-line-level diagnostics.
    pub const COMMAND_LINE: Location = Location { line: 0 };

    /// A new location at the given source line.
    pub fn new(line: usize) -> Self {
        Location { line }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "command line")
        } else {
            write!(f, "line {}", self.line)
        }
    }
}
