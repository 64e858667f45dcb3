//! A small, position-preserving reader for HTML start tags.
//!
//! Unlike a DOM parser it reports the byte span of every attribute so that a
//! single attribute can be replaced without re-serialising the tag. Anything
//! that starts like the requested tag but cannot be read as one (unterminated
//! quote, stray `<` inside the tag, no closing `>`) is reported as rejected.
use std::ops::Range;

use crate::text::unescape_html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lower-cased attribute name.
    pub name: String,
    /// Span of the whole attribute, name through closing quote.
    pub span: Range<usize>,
    /// Raw value as written, without quotes.
    pub value: Option<String>,
}

impl Attribute {
    /// Value with the common entities decoded.
    pub fn decoded_value(&self) -> Option<String> {
        self.value.as_deref().map(unescape_html)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Span from `<` through the closing `>`.
    pub span: Range<usize>,
    pub attributes: Vec<Attribute>,
    /// Offset just after the last attribute (or the tag name).
    pub attributes_end: usize,
    /// Span of the closing `>` or `/>`.
    pub close: Range<usize>,
    pub self_closing: bool,
}

impl StartTag {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Outcome of reading one candidate tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRead {
    Tag(StartTag),
    Rejected { at: usize },
}

/// Read every `<name ...>` start tag in `text` (name matched ASCII
/// case-insensitively), in order.
pub fn start_tags(text: &str, name: &str) -> Vec<TagRead> {
    let lower = text.to_ascii_lowercase();
    let needle = format!("<{}", name.to_ascii_lowercase());
    let mut reads = Vec::new();
    let mut idx = 0;

    while let Some(rel) = lower[idx..].find(&needle) {
        let start = idx + rel;
        let name_end = start + needle.len();
        idx = name_end;

        // `<videos>` or `<image>` are different tags
        match text.as_bytes().get(name_end) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => {}
            None => {
                reads.push(TagRead::Rejected { at: start });
                continue;
            }
            Some(_) => continue,
        }

        match read_tag(text, start, name_end) {
            Some(tag) => {
                idx = tag.span.end;
                reads.push(TagRead::Tag(tag));
            }
            None => reads.push(TagRead::Rejected { at: start }),
        }
    }

    reads
}

fn read_tag(text: &str, start: usize, name_end: usize) -> Option<StartTag> {
    let bytes = text.as_bytes();
    let mut pos = name_end;
    let mut attributes = Vec::new();
    let mut attributes_end = name_end;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let b = *bytes.get(pos)?;
        match b {
            b'>' => {
                return Some(StartTag {
                    span: start..pos + 1,
                    attributes,
                    attributes_end,
                    close: pos..pos + 1,
                    self_closing: false,
                });
            }
            b'/' if bytes.get(pos + 1) == Some(&b'>') => {
                return Some(StartTag {
                    span: start..pos + 2,
                    attributes,
                    attributes_end,
                    close: pos..pos + 2,
                    self_closing: true,
                });
            }
            b'/' => pos += 1,
            b'<' | b'"' | b'\'' | b'=' => return None,
            _ => {
                let attr = read_attribute(text, pos)?;
                pos = attr.span.end;
                attributes_end = pos;
                attributes.push(attr);
            }
        }
    }
}

fn read_attribute(text: &str, start: usize) -> Option<Attribute> {
    let bytes = text.as_bytes();
    let mut pos = start;
    while pos < bytes.len()
        && !bytes[pos].is_ascii_whitespace()
        && !matches!(bytes[pos], b'=' | b'>' | b'/' | b'<' | b'"' | b'\'')
    {
        pos += 1;
    }
    let name = text[start..pos].to_ascii_lowercase();
    if matches!(bytes.get(pos), Some(b'<' | b'"' | b'\'')) {
        return None;
    }

    let mut look = pos;
    while look < bytes.len() && bytes[look].is_ascii_whitespace() {
        look += 1;
    }
    if bytes.get(look) != Some(&b'=') {
        return Some(Attribute {
            name,
            span: start..pos,
            value: None,
        });
    }

    look += 1;
    while look < bytes.len() && bytes[look].is_ascii_whitespace() {
        look += 1;
    }
    let (value, end) = match *bytes.get(look)? {
        quote @ (b'"' | b'\'') => {
            let close = text[look + 1..].find(quote as char)? + look + 1;
            (&text[look + 1..close], close + 1)
        }
        _ => {
            let mut end = look;
            while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b'>' {
                if matches!(bytes[end], b'<' | b'"' | b'\'' | b'`') {
                    return None;
                }
                end += 1;
            }
            if end == look {
                return None;
            }
            (&text[look..end], end)
        }
    };

    Some(Attribute {
        name,
        span: start..end,
        value: Some(value.to_string()),
    })
}
