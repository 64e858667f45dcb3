//! Inline HTML `<img>` and `<video>` tags.
use super::tag::{start_tags, StartTag, TagRead};
use super::{Attempt, Edit, Rewrite, Scope};
use crate::text::escape_html;

fn src_matches(tag: &StartTag, asset: &str) -> bool {
    tag.attribute("src").is_some_and(|src| {
        src.value.as_deref() == Some(asset) || src.decoded_value().as_deref() == Some(asset)
    })
}

/// A missing, bare or empty `src` leaves a video to its `<source>` children.
fn has_src(tag: &StartTag) -> bool {
    tag.attribute("src")
        .and_then(|src| src.value.as_deref())
        .is_some_and(|value| !value.is_empty())
}

/// Set `alt` on the `<img>` whose `src` is `asset`.
///
/// An existing `alt` is replaced in place; otherwise `alt="..."` is inserted
/// immediately before `src`. A bare `>` closing becomes `/>`.
pub fn rewrite_img(text: &str, asset: &str, alt: &str, scope: Scope) -> Attempt {
    let attribute = format!("alt=\"{}\"", escape_html(alt));
    let mut rewrite = Rewrite::new();
    let mut rejected = false;

    for read in start_tags(text, "img") {
        let tag = match read {
            TagRead::Tag(tag) => tag,
            TagRead::Rejected { .. } => {
                rejected = true;
                continue;
            }
        };
        if !src_matches(&tag, asset) {
            continue;
        }

        let mut edits = Vec::with_capacity(2);
        let previous = match (tag.attribute("alt"), tag.attribute("src")) {
            (Some(existing), _) => {
                edits.push(Edit::replace(existing.span.clone(), attribute.clone()));
                existing.decoded_value()
            }
            (None, Some(src)) => {
                edits.push(Edit::insert(src.span.start, format!("{attribute} ")));
                None
            }
            (None, None) => continue,
        };
        if !tag.self_closing {
            edits.push(Edit::replace(tag.close.clone(), "/>"));
        }
        rewrite.record(previous, edits);

        if scope == Scope::First {
            break;
        }
    }

    rewrite.into_attempt(rejected)
}

/// Set `aria-label` on the `<video>` whose `src`, or first `<source>` child's
/// `src`, is `asset`. All other attributes are left alone.
pub fn rewrite_video(text: &str, asset: &str, label: &str, scope: Scope) -> Attempt {
    let attribute = format!("aria-label=\"{}\"", escape_html(label));
    let mut rewrite = Rewrite::new();
    let mut rejected = false;

    for read in start_tags(text, "video") {
        let tag = match read {
            TagRead::Tag(tag) => tag,
            TagRead::Rejected { .. } => {
                rejected = true;
                continue;
            }
        };
        let matched = if has_src(&tag) {
            src_matches(&tag, asset)
        } else {
            first_source(text, &tag).is_some_and(|source| src_matches(&source, asset))
        };
        if !matched {
            continue;
        }

        match tag.attribute("aria-label") {
            Some(existing) => rewrite.record(
                existing.decoded_value(),
                [Edit::replace(existing.span.clone(), attribute.clone())],
            ),
            None => rewrite.record(None, [Edit::insert(tag.attributes_end, format!(" {attribute}"))]),
        }

        if scope == Scope::First {
            break;
        }
    }

    rewrite.into_attempt(rejected)
}

/// First `<source>` between the video's start tag and its `</video>`
/// (or the end of the text). Spans are relative to `text`.
fn first_source(text: &str, video: &StartTag) -> Option<StartTag> {
    let body_start = video.span.end;
    let body = &text[body_start..];
    let body_end = body
        .to_ascii_lowercase()
        .find("</video")
        .unwrap_or(body.len());

    start_tags(&body[..body_end], "source")
        .into_iter()
        .find_map(|read| match read {
            TagRead::Tag(tag) => Some(tag),
            _ => None,
        })
}
