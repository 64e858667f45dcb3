//! Native markdown image syntax: `![alt](path)`.
//!
//! The destination may be angle-bracketed, may carry a title, and may have a
//! single stray space before the closing paren. The alt may span lines and
//! may hold escaped brackets or one level of balanced ones. Only the alt
//! between the brackets is rewritten; the `](...)` tail is reproduced byte
//! for byte.
use regex::Regex;

use super::{Attempt, Edit, Rewrite, Scope};
use crate::text::escape_markdown;

fn image_pattern(asset: &str) -> Regex {
    let path = regex::escape(asset);
    let pattern = format!(
        r#"!\[(?P<alt>(?:\\.|[^\\\[\]]|\[(?:\\.|[^\\\[\]])*\])*)\]\((?:<{path}>|{path})(?:[ \t]+(?:"[^"\n]*"|'[^'\n]*'))? ?\)"#
    );
    Regex::new(&pattern).expect("escaped asset path yields a valid regex")
}

pub fn rewrite(text: &str, asset: &str, alt: &str, scope: Scope) -> Attempt {
    let re = image_pattern(asset);
    let escaped = escape_markdown(alt);
    let mut rewrite = Rewrite::new();

    for caps in re.captures_iter(text) {
        let Some(old) = caps.name("alt") else {
            continue;
        };
        rewrite.record(
            Some(old.as_str().to_string()),
            [Edit::replace(old.range(), escaped.clone())],
        );
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
    fn replaces_existing_alt() {
        let (line, old) = apply(
            "This is ![old alt](path/to/image.png) in text",
            "path/to/image.png",
            "new alt text",
        );
        assert_eq!(line, "This is ![new alt text](path/to/image.png) in text");
        assert_eq!(old.as_deref(), Some("old alt"));
    }

    #[test]
    fn fills_empty_alt() {
        let (line, old) = apply("This is ![](path/to/image.png) in text", "path/to/image.png", "new alt text");
        assert_eq!(line, "This is ![new alt text](path/to/image.png) in text");
        assert_eq!(old, None);
    }

    #[test]
    fn tolerates_trailing_space_and_keeps_it() {
        let (line, _) = apply("![](image.png )", "image.png", "alt");
        assert_eq!(line, "![alt](image.png )");
    }

    #[test]
    fn keeps_title_and_angle_brackets() {
        let (line, _) = apply(r#"![x](<my image.png> "Title")"#, "my image.png", "alt");
        assert_eq!(line, r#"![alt](<my image.png> "Title")"#);
    }

    #[test]
    fn regex_special_characters_in_path() {
        let (line, old) = apply("![old](path/image (1).png)", "path/image (1).png", "new alt");
        assert_eq!(line, "![new alt](path/image (1).png)");
        assert_eq!(old.as_deref(), Some("old"));
    }

    #[test]
    fn escapes_replacement_metacharacters() {
        let (line, _) = apply(
            "![](test.png)",
            "test.png",
            r"A diagram (version 1.0) showing $variable\in set {A, B, C}",
        );
        assert_eq!(
            line,
            r"![A diagram (version 1.0) showing \$variable\\in set {A, B, C}](test.png)"
        );
        let (line, _) = apply("![](image.png)", "image.png", "$100 worth of items");
        assert!(line.contains(r"\$100 worth of items"));
        let (line, _) = apply("![](image.png)", "image.png", r"x\in A");
        assert!(line.contains(r"x\\in A"));
    }

    #[test]
    fn brackets_in_text_stay_inside_alt() {
        let (line, _) = apply("![](a.png)", "a.png", "array[0]");
        assert_eq!(line, r"![array\[0\]](a.png)");
        // the rewritten construct is still recognised
        let (again, old) = apply(&line, "a.png", "second");
        assert_eq!(again, "![second](a.png)");
        assert_eq!(old.as_deref(), Some(r"array\[0\]"));
    }

    #[test]
    fn balanced_brackets_and_line_breaks_in_alt() {
        let (line, old) = apply("![a [b] c](x.png)", "x.png", "n");
        assert_eq!(line, "![n](x.png)");
        assert_eq!(old.as_deref(), Some("a [b] c"));

        let (text, old) = apply("![two\nlines](x.png)", "x.png", "one");
        assert_eq!(text, "![one](x.png)");
        assert_eq!(old.as_deref(), Some("two\nlines"));
    }

    #[test]
    fn unclosed_bracket_does_not_swallow_the_next_image() {
        let text = "![open\nnext ![](a.png)";
        let Attempt::Rewritten(rw) = rewrite(text, "a.png", "x", Scope::First) else {
            panic!("expected match");
        };
        assert_eq!(rw.apply(text), "![open\nnext ![x](a.png)");
    }

    #[test]
    fn unicode_alt() {
        let (line, _) = apply("![](image.png)", "image.png", "日本語の代替テキスト");
        assert_eq!(line, "![日本語の代替テキスト](image.png)");
    }

    #[test]
    fn empty_alt_application() {
        let (line, old) = apply("![old](image.png)", "image.png", "");
        assert_eq!(line, "![](image.png)");
        assert_eq!(old.as_deref(), Some("old"));
    }

    #[test]
    fn other_paths_do_not_match() {
        assert_eq!(rewrite("![a](other.png)", "image.png", "x", Scope::First), Attempt::NoMatch);
        assert_eq!(rewrite("![a](image.png.bak)", "image.png", "x", Scope::First), Attempt::NoMatch);
        assert_eq!(rewrite("![[image.png]]", "image.png", "x", Scope::First), Attempt::NoMatch);
    }

    #[test]
    fn first_scope_touches_one_occurrence() {
        let line = "![a](x.png) and ![b](x.png)";
        let Attempt::Rewritten(first) = rewrite(line, "x.png", "n", Scope::First) else {
            panic!("expected match");
        };
        assert_eq!(first.apply(line), "![n](x.png) and ![b](x.png)");
        let Attempt::Rewritten(all) = rewrite(line, "x.png", "n", Scope::All) else {
            panic!("expected match");
        };
        assert_eq!(all.occurrences, 2);
        assert_eq!(all.apply(line), "![n](x.png) and ![n](x.png)");
    }
}
