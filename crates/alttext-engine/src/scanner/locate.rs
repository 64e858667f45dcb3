//! Byte offset to line mapping, and the textual fallback search.
use std::ops::Range;

use crate::text::percent_decode;

/// Line starts of a document. Lines end at `\n`; a trailing `\r` belongs to
/// the line break, not the line body.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut starts: Vec<usize> = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        // a final newline terminates the last line, it does not open another
        if starts.last() == Some(&source.len()) {
            starts.pop();
        }
        Self { source, starts }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// 1-based line holding `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset).max(1)
    }

    /// Byte range of line `line` (1-based) without its line break.
    pub fn line_range(&self, line: usize) -> Range<usize> {
        let start = self.starts[line - 1];
        let mut end = self
            .starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.source.len());
        if end > start && self.source.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        start..end
    }

    /// Byte range from the start of `first` to the end of `last`'s body.
    pub fn lines_range(&self, first: usize, last: usize) -> Range<usize> {
        self.line_range(first).start..self.line_range(last).end
    }

    pub fn body(&self, line: usize) -> &'a str {
        &self.source[self.line_range(line)]
    }

    pub fn bodies(&self) -> Vec<&'a str> {
        (1..=self.line_count()).map(|line| self.body(line)).collect()
    }
}

/// First line containing the search key, trying in turn the literal key, its
/// percent-decoded form and, for a `(...)` key, the bare inner text and its
/// decoded form.
pub fn locate_line(index: &LineIndex<'_>, key: &str) -> Option<usize> {
    let mut candidates = vec![key.to_string(), percent_decode(key)];
    if let Some(inner) = key.strip_prefix('(').and_then(|k| k.strip_suffix(')')) {
        candidates.push(inner.to_string());
        candidates.push(percent_decode(inner));
    }

    let mut tried: Vec<&str> = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        if candidate.is_empty() || tried.contains(&candidate.as_str()) {
            continue;
        }
        tried.push(candidate);
        if let Some(line) = (1..=index.line_count()).find(|&line| index.body(line).contains(candidate.as_str())) {
            return Some(line);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_to_lines() {
        let source = "one\ntwo\r\nthree";
        let index = LineIndex::new(source);
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(3), 1);
        assert_eq!(index.line_of(4), 2);
        assert_eq!(index.line_of(9), 3);
        assert_eq!(index.body(2), "two");
        assert_eq!(index.body(3), "three");
        assert_eq!(&source[index.lines_range(1, 2)], "one\ntwo");
    }

    #[test]
    fn trailing_newline_is_not_a_line() {
        assert_eq!(LineIndex::new("a\nb\n").line_count(), 2);
        assert_eq!(LineIndex::new("a\nb\n\n").line_count(), 3);
        assert_eq!(LineIndex::new("").line_count(), 0);
    }

    #[test]
    fn fallback_search_order() {
        let source = "intro\n![x](caf%C3%A9.png)\n![y](café.png)\n";
        let index = LineIndex::new(source);
        assert_eq!(locate_line(&index, "(caf%C3%A9.png)"), Some(2));
        assert_eq!(locate_line(&index, "(café.png)"), Some(3));

        let source = "text\n<img src=\"caf%C3%A9.png\">\n";
        let index = LineIndex::new(source);
        assert_eq!(locate_line(&index, "(caf%C3%A9.png)"), Some(2));

        let source = "text\n<img src=\"café.png\">\n";
        let index = LineIndex::new(source);
        assert_eq!(locate_line(&index, "(caf%C3%A9.png)"), Some(2));
    }

    #[test]
    fn missing_key() {
        let index = LineIndex::new("nothing here\n");
        assert_eq!(locate_line(&index, "(gone.png)"), None);
    }
}
