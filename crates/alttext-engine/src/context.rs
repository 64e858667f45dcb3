//! Paragraph window around a source line, for reviewer context only.
use std::ops::Range;

/// Paragraphs are maximal runs of non-blank lines.
fn paragraphs<S: AsRef<str>>(lines: &[S]) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    let mut start = None;
    for (idx, line) in lines.iter().enumerate() {
        match (line.as_ref().trim().is_empty(), start) {
            (false, None) => start = Some(idx),
            (true, Some(s)) => {
                found.push(s..idx);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        found.push(s..lines.len());
    }
    found
}

/// Text of the paragraph holding `target` (0-based) plus up to `max_before`
/// paragraphs before it and `max_after` after it, separated by blank lines.
///
/// When `target` is blank the next paragraph is used, or the previous one
/// if nothing follows. Returns an empty string when there is no text at all.
pub fn paragraph_context<S: AsRef<str>>(
    lines: &[S],
    target: usize,
    max_before: usize,
    max_after: usize,
) -> String {
    let paras = paragraphs(lines);
    if paras.is_empty() {
        return String::new();
    }

    let current = paras
        .iter()
        .position(|p| p.contains(&target))
        .or_else(|| paras.iter().position(|p| p.start > target))
        .unwrap_or(paras.len() - 1);

    let first = current.saturating_sub(max_before);
    let last = (current + max_after).min(paras.len() - 1);

    paras[first..=last]
        .iter()
        .map(|p| {
            lines[p.clone()]
                .iter()
                .map(|l| l.as_ref().trim_end())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
