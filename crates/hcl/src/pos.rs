use std::fmt;

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

/// A single position in a source file.
///
/// `line` and `column` are 1-based; columns count grapheme clusters, so a
/// multi-byte character (or a combining sequence) occupies one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

impl Pos {
    pub const INITIAL: Pos = Pos {
        line: 1,
        column: 1,
        byte: 0,
    };

    /// The position reached after consuming `bytes` starting at `self`.
    ///
    /// Each invalid UTF-8 byte counts as one column.
    pub fn advance(self, bytes: &[u8]) -> Pos {
        let mut pos = self;
        for chunk in bytes.utf8_chunks() {
            for grapheme in chunk.valid().graphemes(true) {
                pos.byte += grapheme.len();
                if grapheme.ends_with('\n') {
                    pos.line += 1;
                    pos.column = 1;
                } else {
                    pos.column += 1;
                }
            }
            pos.byte += chunk.invalid().len();
            pos.column += chunk.invalid().len();
        }
        pos
    }
}

impl Default for Pos {
    fn default() -> Self {
        Pos::INITIAL
    }
}

/// A span of source between two positions. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Range {
    pub filename: String,
    pub start: Pos,
    pub end: Pos,
}

impl Range {
    pub fn new(filename: impl Into<String>, start: Pos, end: Pos) -> Self {
        Self {
            filename: filename.into(),
            start,
            end,
        }
    }

    /// A zero-width range at `pos`.
    pub fn point(filename: impl Into<String>, pos: Pos) -> Self {
        Self::new(filename, pos, pos)
    }

    /// A zero-width range at the start of this one.
    pub fn start_point(&self) -> Range {
        Range::point(self.filename.clone(), self.start)
    }

    /// A zero-width range at the end of this one.
    pub fn end_point(&self) -> Range {
        Range::point(self.filename.clone(), self.end)
    }

    pub fn empty(&self) -> bool {
        self.start.byte == self.end.byte
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start.byte <= offset && offset < self.end.byte
    }

    pub fn contains_pos(&self, pos: Pos) -> bool {
        self.contains_offset(pos.byte)
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        if self.filename != other.filename {
            return false;
        }
        if self.empty() || other.empty() {
            return false;
        }
        self.start.byte < other.end.byte && other.start.byte < self.end.byte
    }

    /// The intersection of two ranges. When they do not overlap the result
    /// is an empty range at the start of `self`.
    pub fn overlap(&self, other: &Range) -> Range {
        if !self.overlaps(other) {
            return self.start_point();
        }
        let start = if self.start.byte > other.start.byte {
            self.start
        } else {
            other.start
        };
        let end = if self.end.byte < other.end.byte {
            self.end
        } else {
            other.end
        };
        Range::new(self.filename.clone(), start, end)
    }

    /// Splits `self` into the parts before, inside and after `other`.
    pub fn partition_around(&self, other: &Range) -> (Range, Range, Range) {
        let overlap = self.overlap(other);
        let before = if self.start.byte < overlap.start.byte {
            Range::new(self.filename.clone(), self.start, overlap.start)
        } else {
            overlap.start_point()
        };
        let after = if self.end.byte > overlap.end.byte {
            Range::new(self.filename.clone(), overlap.end, self.end)
        } else {
            overlap.end_point()
        };
        (before, overlap, after)
    }

    /// The bytes of `src` covered by this range, clamped to the buffer.
    pub fn slice_bytes<'a>(&self, src: &'a [u8]) -> &'a [u8] {
        let start = self.start.byte.min(src.len());
        let end = self.end.byte.clamp(start, src.len());
        &src[start..end]
    }
}

/// The range from the start of `start` to the end of `end`.
///
/// The arguments are expected in source order; see [`range_over`] for an
/// order-independent union.
pub fn range_between(start: &Range, end: &Range) -> Range {
    Range::new(start.filename.clone(), start.start, end.end)
}

/// The smallest range enclosing both `a` and `b`, in any order.
pub fn range_over(a: &Range, b: &Range) -> Range {
    let start = if a.start.byte <= b.start.byte {
        a.start
    } else {
        b.start
    };
    let end = if a.end.byte >= b.end.byte { a.end } else { b.end };
    Range::new(a.filename.clone(), start, end)
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(
                f,
                "{}:{},{}-{}",
                self.filename, self.start.line, self.start.column, self.end.column
            )
        } else {
            write!(
                f,
                "{}:{},{}-{},{}",
                self.filename, self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

/// Splits `src` into one range per line, excluding line terminators.
pub fn line_ranges(src: &[u8], filename: &str) -> Vec<Range> {
    let mut ranges = Vec::new();
    let mut pos = Pos::INITIAL;
    let mut line_start = 0usize;
    let mut i = 0usize;
    while i <= src.len() {
        let at_end = i == src.len();
        if at_end || src[i] == b'\n' {
            let mut content_end = i;
            if content_end > line_start && src[content_end - 1] == b'\r' {
                content_end -= 1;
            }
            let start = pos;
            let end = start.advance(&src[line_start..content_end]);
            ranges.push(Range::new(filename, start, end));
            if at_end {
                break;
            }
            pos = Pos {
                line: start.line + 1,
                column: 1,
                byte: i + 1,
            };
            line_start = i + 1;
        }
        i += 1;
    }
    if ranges.len() > 1 && src.ends_with(b"\n") {
        ranges.pop();
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: usize, end: usize) -> Range {
        Range::new(
            "test",
            Pos {
                line: 1,
                column: start + 1,
                byte: start,
            },
            Pos {
                line: 1,
                column: end + 1,
                byte: end,
            },
        )
    }

    #[test]
    fn advance_counts_graphemes() {
        let pos = Pos::INITIAL.advance("héllo\nx".as_bytes());
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 2);
        assert_eq!(pos.byte, 8);
    }

    #[test]
    fn advance_treats_combining_sequence_as_one_column() {
        let pos = Pos::INITIAL.advance("e\u{301}".as_bytes());
        assert_eq!(pos.column, 2);
        assert_eq!(pos.byte, 3);
    }

    #[test]
    fn overlap_and_partition() {
        let outer = range(0, 10);
        let inner = range(3, 5);
        assert!(outer.overlaps(&inner));
        assert_eq!(outer.overlap(&inner), inner);
        let (before, middle, after) = outer.partition_around(&inner);
        assert_eq!(before, range(0, 3));
        assert_eq!(middle, range(3, 5));
        assert_eq!(after, range(5, 10));
    }

    #[test]
    fn disjoint_ranges_do_not_overlap() {
        let a = range(0, 2);
        let b = range(2, 4);
        assert!(!a.overlaps(&b));
        assert!(a.overlap(&b).empty());
    }

    #[test]
    fn between_and_over() {
        let a = range(2, 4);
        let b = range(6, 9);
        assert_eq!(range_between(&a, &b), range(2, 9));
        assert_eq!(range_over(&b, &a), range(2, 9));
    }

    #[test]
    fn contains_offset_is_end_exclusive() {
        let r = range(1, 3);
        assert!(r.contains_offset(1));
        assert!(r.contains_offset(2));
        assert!(!r.contains_offset(3));
    }

    #[test]
    fn splits_lines() {
        let lines = line_ranges(b"ab\r\ncd\n", "f");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].end.byte, 2);
        assert_eq!(lines[1].start.byte, 4);
        assert_eq!(lines[1].start.line, 2);
    }

    #[test]
    fn display_forms() {
        assert_eq!(range(0, 3).to_string(), "test:1,1-4");
    }
}
