//! Wikilink embeds: `![[path]]` and `![[path|alt]]`.
use regex::Regex;

use super::{Attempt, Edit, Rewrite, Scope};
use crate::text::escape_markdown;

/// Extensions that make a wikilink embed an asset rather than a page link.
pub const ASSET_EXTENSIONS: &[&str] = &[
    ".avif", ".bmp", ".gif", ".ico", ".jpeg", ".jpg", ".mp4", ".mov", ".png", ".svg", ".webm", ".webp",
];

/// One `![[...]]` span found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikilinkEmbed<'a> {
    pub src: &'a str,
    pub alt: Option<&'a str>,
    /// Byte offset of the leading `!`.
    pub offset: usize,
    /// Byte offset just past the closing `]]`.
    pub end: usize,
}

impl WikilinkEmbed<'_> {
    pub fn has_asset_extension(&self) -> bool {
        let lower = self.src.to_lowercase();
        ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    }
}

/// Iterate over every `![[...]]` in `content`, in order.
///
/// The closing `]]` is the first one whose `]` is not backslash-escaped.
/// Empty embeds and embeds with an empty path are skipped.
pub fn embeds(content: &str) -> Vec<WikilinkEmbed<'_>> {
    let mut found = Vec::new();
    let mut idx = 0;
    while let Some(rel) = content[idx..].find("![[") {
        let start = idx + rel;
        let inner_start = start + 3;
        let Some(inner_end) = closing_brackets(content, inner_start) else {
            break;
        };
        idx = inner_end + 2;

        let inner = &content[inner_start..inner_end];
        let (src, alt) = match inner.split_once('|') {
            Some((src, alt)) => (src, Some(alt.trim()).filter(|a| !a.is_empty())),
            None => (inner, None),
        };
        let src = src.trim();
        if src.is_empty() {
            continue;
        }
        found.push(WikilinkEmbed {
            src,
            alt,
            offset: start,
            end: inner_end + 2,
        });
    }
    found
}

fn closing_brackets(content: &str, from: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut i = from;
    while i + 1 < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b']' if bytes[i + 1] == b']' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn embed_pattern(asset: &str) -> Regex {
    let pattern = format!(
        r"!\[\[[ \t]*{}(?P<tail>[ \t]*(?:\|(?P<alt>(?:\\.|[^\\\]])*))?)\]\]",
        regex::escape(asset)
    );
    Regex::new(&pattern).expect("escaped asset path yields a valid regex")
}

/// Rewrite to `![[path|alt]]`, adding the pipe form when there was none.
pub fn rewrite(text: &str, asset: &str, alt: &str, scope: Scope) -> Attempt {
    let re = embed_pattern(asset);
    let replacement = format!("|{}", escape_markdown(alt));
    let mut rewrite = Rewrite::new();

    for caps in re.captures_iter(text) {
        let Some(tail) = caps.name("tail") else {
            continue;
        };
        let previous = caps.name("alt").map(|m| m.as_str().trim().to_string());
        rewrite.record(previous, [Edit::replace(tail.range(), replacement.clone())]);
        if scope == Scope::First {
            break;
        }
    }

    rewrite.into_attempt(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(line: &str, asset: &str, alt: &str) -> (String, Option<String>) {
        match rewrite(line, asset, alt, Scope::First) {
            Attempt::Rewritten(rw) => (rw.apply(line), rw.previous),
            other => panic!("expected a rewrite, got {other:?}"),
        }
    }

    #[test]
    fn adds_alt_when_missing() {
        let (line, old) = apply("This is ![[path/to/image.png]] in text", "path/to/image.png", "new alt text");
        assert_eq!(line, "This is ![[path/to/image.png|new alt text]] in text");
        assert_eq!(old, None);
    }

    #[test]
    fn replaces_existing_alt() {
        let (line, old) = apply("This is ![[path/to/image.png|old alt]] in text", "path/to/image.png", "new alt text");
        assert_eq!(line, "This is ![[path/to/image.png|new alt text]] in text");
        assert_eq!(old.as_deref(), Some("old alt"));
    }

    #[test]
    fn full_url_path() {
        let url = "https://assets.example.com/static/images/posts/distillation-20250612141417.avif";
        let (line, old) = apply(&format!("![[{url}]]"), url, "new alt text");
        assert_eq!(line, format!("![[{url}|new alt text]]"));
        assert_eq!(old, None);
    }

    #[test]
    fn special_characters_in_path() {
        let (line, _) = apply("Image: ![[path/to/image (1).png]] here", "path/to/image (1).png", "new alt");
        assert_eq!(line, "Image: ![[path/to/image (1).png|new alt]] here");
    }

    #[test]
    fn markdown_image_is_not_a_wikilink() {
        assert_eq!(
            rewrite("This is ![markdown](image.png) not wikilink", "image.png", "x", Scope::First),
            Attempt::NoMatch
        );
    }

    #[test]
    fn escaped_brackets_round_trip_through_the_scanner() {
        let (line, _) = apply("![[a.png]]", "a.png", "list[0] costs $5");
        assert_eq!(line, r"![[a.png|list\[0\] costs \$5]]");
        let found = embeds(&line);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].src, "a.png");
        assert_eq!(found[0].alt, Some(r"list\[0\] costs \$5"));
    }

    #[test]
    fn embeds_in_text() {
        let found = embeds("![[image.png]] and [[not an image]] and ![[photo.jpg|alt]]");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].src, "image.png");
        assert_eq!(found[0].alt, None);
        assert_eq!(found[0].offset, 0);
        assert_eq!(found[0].end, "![[image.png]]".len());
        assert_eq!(found[1].src, "photo.jpg");
        assert_eq!(found[1].alt, Some("alt"));
    }

    #[test]
    fn empty_embeds_are_skipped() {
        assert!(embeds("![[]] and ![[|alt text]]").is_empty());
        assert!(embeds("![[unterminated.png").is_empty());
    }

    #[test]
    fn extension_allow_list() {
        let found = embeds("![[Diagram.PNG]] ![[Some Note]] ![[clip.webm|x]]");
        let assets: Vec<_> = found.iter().filter(|e| e.has_asset_extension()).map(|e| e.src).collect();
        assert_eq!(assets, vec!["Diagram.PNG", "clip.webm"]);
    }
}
