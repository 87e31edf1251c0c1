//! Source text plus the line index needed to turn byte offsets into
//! human-facing `(line, column)` locations.

use std::sync::Arc;

/// A 1-based line/column location, measured in Unicode code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An immutable source string with a precomputed line-start index.
///
/// Offsets handed to [`Source::location`] are byte offsets into the
/// original string; the line/column reported back are code-point counts,
/// matching the CEL spec's definition of source positions.
#[derive(Debug, Clone)]
pub struct Source {
    text: Arc<str>,
    line_starts: Arc<[usize]>,
}

impl Source {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0usize];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Source {
            text,
            line_starts: line_starts.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Resolves a byte offset into the source to a 1-based line/column.
    /// Columns are counted in Unicode code points from the start of the line.
    pub fn location(&self, offset: u32) -> Location {
        let offset = offset as usize;
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        let column = self.text[line_start..offset.min(self.text.len())]
            .chars()
            .count()
            + 1;
        Location {
            line: (line_idx + 1) as u32,
            column: column as u32,
        }
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Source::new(s)
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Source::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_first_column() {
        let src = Source::new("abc");
        assert_eq!(src.location(0), Location { line: 1, column: 1 });
    }

    #[test]
    fn tracks_newlines() {
        let src = Source::new("ab\ncd\nef");
        assert_eq!(src.location(3), Location { line: 2, column: 1 });
        assert_eq!(src.location(5), Location { line: 2, column: 3 });
        assert_eq!(src.location(6), Location { line: 3, column: 1 });
    }

    #[test]
    fn counts_code_points_not_bytes() {
        // "é" is 2 bytes (UTF-8) but one code point.
        let src = Source::new("é x");
        assert_eq!(src.location(2), Location { line: 1, column: 2 });
    }
}
