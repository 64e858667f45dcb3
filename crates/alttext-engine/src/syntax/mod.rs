//! Recognizers for the three asset-embedding syntaxes.
//!
//! Each recognizer looks for the construct referencing one asset path inside
//! a piece of text and returns the byte-range edits that would install new
//! accessibility text, plus the value being replaced. Recognizers never
//! touch bytes outside the alt / label they rewrite (HTML `<img>` also
//! normalises its closing to `/>`).
pub mod html;
pub mod markdown;
pub mod tag;
pub mod wikilink;

use std::fmt;
use std::ops::Range;

/// The syntax families, in the order the patcher tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Markdown,
    Wikilink,
    HtmlImage,
    HtmlVideo,
}

impl Format {
    pub const ORDER: [Format; 4] = [
        Format::Markdown,
        Format::Wikilink,
        Format::HtmlImage,
        Format::HtmlVideo,
    ];

    /// HTML tags and markdown image alts may run over several source
    /// lines; wikilinks may not.
    pub fn spans_lines(self) -> bool {
        !matches!(self, Format::Wikilink)
    }

    /// Find the construct for `asset` in `text` and prepare edits installing
    /// `alt`. `alt` must already have its line breaks collapsed; escaping for
    /// the format's context happens here.
    pub fn attempt(self, text: &str, asset: &str, alt: &str, scope: Scope) -> Attempt {
        match self {
            Format::Markdown => markdown::rewrite(text, asset, alt, scope),
            Format::Wikilink => wikilink::rewrite(text, asset, alt, scope),
            Format::HtmlImage => html::rewrite_img(text, asset, alt, scope),
            Format::HtmlVideo => html::rewrite_video(text, asset, alt, scope),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Markdown => "markdown image",
            Format::Wikilink => "wikilink",
            Format::HtmlImage => "html <img>",
            Format::HtmlVideo => "html <video>",
        })
    }
}

/// How many matching constructs a recognizer rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    First,
    All,
}

/// Replace `range` of the original text with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl Edit {
    pub fn replace(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }

    pub(crate) fn shifted(mut self, offset: usize) -> Self {
        self.range = self.range.start + offset..self.range.end + offset;
        self
    }

    /// Whether two edits touch the same bytes. An insertion conflicts with a
    /// replacement only when it lands strictly inside it.
    pub fn overlaps(&self, other: &Edit) -> bool {
        let (a, b) = (&self.range, &other.range);
        if a.is_empty() && b.is_empty() {
            return a.start == b.start;
        }
        if a.is_empty() {
            return a.start > b.start && a.start < b.end;
        }
        if b.is_empty() {
            return b.start > a.start && b.start < a.end;
        }
        a.start < b.end && b.start < a.end
    }
}

/// Edits for the matched construct(s) and the accessibility text they replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub edits: Vec<Edit>,
    /// Text of the first matched construct before the rewrite; `None` when
    /// absent or empty.
    pub previous: Option<String>,
    /// Number of constructs matched.
    pub occurrences: usize,
}

impl Rewrite {
    pub(crate) fn new() -> Self {
        Self {
            edits: Vec::new(),
            previous: None,
            occurrences: 0,
        }
    }

    pub(crate) fn record(&mut self, previous: Option<String>, edits: impl IntoIterator<Item = Edit>) {
        if self.occurrences == 0 {
            self.previous = previous.filter(|p| !p.is_empty());
        }
        self.occurrences += 1;
        self.edits.extend(edits);
    }

    pub(crate) fn into_attempt(self, rejected: bool) -> Attempt {
        if self.occurrences > 0 {
            Attempt::Rewritten(self)
        } else if rejected {
            Attempt::Rejected
        } else {
            Attempt::NoMatch
        }
    }

    /// Apply the edits to the text they were computed against.
    pub fn apply(&self, text: &str) -> String {
        apply_edits(text, &self.edits)
    }
}

/// Result of running one recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Rewritten(Rewrite),
    NoMatch,
    /// Something tag-like was present but could not be read as HTML.
    Rejected,
}

/// Apply non-overlapping edits to `text`. Edits may be given in any order.
pub fn apply_edits(text: &str, edits: &[Edit]) -> String {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by_key(|e| (e.range.start, e.range.end));
    let mut out = String::with_capacity(text.len() + 64);
    let mut last = 0;
    for edit in ordered {
        out.push_str(&text[last..edit.range.start]);
        out.push_str(&edit.replacement);
        last = edit.range.end;
    }
    out.push_str(&text[last..]);
    out
}
