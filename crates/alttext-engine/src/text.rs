//! Accessibility-text rules and the escaping applied before text is written
//! into a document.
use std::sync::LazyLock;

use regex::Regex;

/// Separator that replaces every run of line breaks in inserted text.
pub const LINE_BREAK_SEPARATOR: &str = " ... ";

const PLACEHOLDER_ALTS: &[&str] = &["img", "image", "photo", "placeholder", "screenshot", "picture"];

const PLACEHOLDER_VIDEO_LABELS: &[&str] = &["video", "movie", "clip", "media", "content", "placeholder"];

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*[\r\n]+[ \t]*").expect("valid regex"));

/// Whether image alt text is present and not a placeholder word.
pub fn is_alt_meaningful(alt: Option<&str>) -> bool {
    is_meaningful(alt, PLACEHOLDER_ALTS)
}

/// Whether a video label (`aria-label`, `title`, `aria-describedby`) is meaningful.
pub fn is_video_label_meaningful(label: Option<&str>) -> bool {
    is_meaningful(label, PLACEHOLDER_VIDEO_LABELS)
}

fn is_meaningful(value: Option<&str>, placeholders: &[&str]) -> bool {
    let Some(value) = value else {
        return false;
    };
    let folded = value.trim().to_lowercase();
    !folded.is_empty() && !placeholders.contains(&folded.as_str())
}

/// Collapse every run of `\n`, `\r\n` or `\r` into [`LINE_BREAK_SEPARATOR`].
///
/// Horizontal whitespace touching a break is absorbed. A break at either end
/// becomes a bare `...` on that side.
///
/// - `"Line 1\nLine 2"` → `"Line 1 ... Line 2"`
/// - `"\nLine"` → `"... Line"`
pub fn collapse_line_breaks(text: &str) -> String {
    if !text.contains(['\n', '\r']) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 8);
    let mut last = 0;
    for m in LINE_BREAKS.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        let mut separator = LINE_BREAK_SEPARATOR;
        if m.start() == 0 {
            separator = separator.trim_start();
        }
        if m.end() == text.len() {
            separator = separator.trim_end();
        }
        out.push_str(separator);
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Escape text for the alt brackets of `![...](...)` and for wikilink alts.
///
/// Backslash is doubled first so the escapes added for `$`, `[` and `]`
/// are not themselves re-escaped.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '$' => out.push_str("\\$"),
            '[' => out.push_str("\\["),
            ']' => out.push_str("\\]"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape text for a double-quoted HTML attribute value.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Decode the handful of entities produced by [`escape_html`] plus `&#39;`.
pub fn unescape_html(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Decode `%XX` sequences. Returns the input unchanged when the decoded
/// bytes are not valid UTF-8.
pub fn percent_decode(text: &str) -> String {
    if !text.contains('%') {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2]));
            if let (Some(hi), Some(lo)) = hex {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_meaningfulness() {
        assert!(!is_alt_meaningful(None));
        assert!(!is_alt_meaningful(Some("")));
        assert!(!is_alt_meaningful(Some("   ")));
        assert!(!is_alt_meaningful(Some("Image")));
        assert!(!is_alt_meaningful(Some(" screenshot ")));
        assert!(is_alt_meaningful(Some("A cat on a mat")));
        assert!(is_alt_meaningful(Some("日本語の説明")));
        assert!(is_alt_meaningful(Some(&"A".repeat(10_000))));
        // placeholder sets differ between images and videos
        assert!(is_alt_meaningful(Some("video")));
    }

    #[test]
    fn video_label_meaningfulness() {
        assert!(!is_video_label_meaningful(None));
        assert!(!is_video_label_meaningful(Some("Clip")));
        assert!(!is_video_label_meaningful(Some("content")));
        assert!(is_video_label_meaningful(Some("Robot arm stacking blocks")));
        assert!(is_video_label_meaningful(Some("image")));
    }

    #[test]
    fn collapses_breaks() {
        assert_eq!(
            collapse_line_breaks("First line\nSecond line\nThird line"),
            "First line ... Second line ... Third line"
        );
        assert_eq!(collapse_line_breaks("a\r\n\r\nb\rc"), "a ... b ... c");
        assert_eq!(collapse_line_breaks("a \n b"), "a ... b");
        assert_eq!(collapse_line_breaks("\nlead"), "... lead");
        assert_eq!(collapse_line_breaks("trail\n"), "trail ...");
        assert_eq!(collapse_line_breaks("no breaks"), "no breaks");
    }

    #[test]
    fn markdown_escaping() {
        assert_eq!(
            escape_markdown(r"A diagram (version 1.0) showing $variable\in set {A, B, C}"),
            r"A diagram (version 1.0) showing \$variable\\in set {A, B, C}"
        );
        assert_eq!(escape_markdown("see [1]"), r"see \[1\]");
        assert_eq!(escape_markdown("$100"), r"\$100");
    }

    #[test]
    fn html_escaping() {
        assert_eq!(escape_html(r#"A < B > C & D "E""#), "A &lt; B &gt; C &amp; D &quot;E&quot;");
        assert_eq!(escape_html("&lt;"), "&amp;lt;");
        assert_eq!(unescape_html(&escape_html(r#"a&b<"c">"#)), r#"a&b<"c">"#);
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("%E7%94%BB%E5%83%8F.png"), "画像.png");
        assert_eq!(percent_decode("my%20file.png"), "my file.png");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("bad%zzseq"), "bad%zzseq");
        assert_eq!(percent_decode("%FF"), "%FF");
    }
}
