//! Applies reviewed accessibility text back into documents.
//!
//! [`patch_source`] is pure: it takes document text and returns the patched
//! text. [`apply_resolutions`] does the file handling around it, one read and
//! at most one write per document.
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::PatchError;
use crate::model::{AppliedChange, ApplyFailure, ApplyReport, LineTarget, Resolution};
use crate::queue::partition_resolutions;
use crate::scanner::locate::LineIndex;
use crate::syntax::{apply_edits, Attempt, Edit, Format, Scope};
use crate::text::collapse_line_breaks;

/// How far a targeted rewrite may look past its line for the rest of a
/// tag, an image alt or `</video>`.
const MAX_TAG_LINES: usize = 32;

/// A successful rewrite of one document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub content: String,
    /// Text of the first rewritten construct before the change.
    pub previous: Option<String>,
    /// Format of the first rewritten construct.
    pub format: Format,
    /// Line acted on; `None` in whole-file mode.
    pub line: Option<usize>,
    pub occurrences: usize,
    /// The inserted text, after line-break collapsing and before escaping.
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Report what would change without writing any file.
    pub dry_run: bool,
}

/// Install `text` as the accessibility text of `asset` in `source`.
///
/// With a targeted line only that line is considered (HTML tags may continue
/// onto following lines); formats are tried in [`Format::ORDER`] and the
/// first match wins. With [`LineTarget::AnyOccurrence`] every occurrence in
/// every format is rewritten.
pub fn patch_source(source: &str, asset: &str, text: &str, target: LineTarget) -> Result<Patch, PatchError> {
    let text = collapse_line_breaks(text);
    match target {
        LineTarget::Targeted(line) => patch_line(source, asset, &text, line.get()),
        LineTarget::AnyOccurrence => patch_everywhere(source, asset, &text),
    }
}

fn patch_line(source: &str, asset: &str, text: &str, line: usize) -> Result<Patch, PatchError> {
    let index = LineIndex::new(source);
    if line > index.line_count() {
        return Err(PatchError::OutOfRange {
            line,
            line_count: index.line_count(),
        });
    }

    let line_end = index.line_range(line).end;
    let mut rejected = false;
    for format in Format::ORDER {
        let region = if format.spans_lines() {
            tag_window(&index, source, line, format)
        } else {
            index.line_range(line)
        };
        match format.attempt(&source[region.clone()], asset, text, Scope::First) {
            Attempt::Rewritten(rewrite) => {
                let edits: Vec<Edit> = rewrite
                    .edits
                    .into_iter()
                    .map(|edit| edit.shifted(region.start))
                    .collect();
                // an image opened further down belongs to its own line
                if format == Format::Markdown && edits.iter().any(|edit| edit.range.start > line_end) {
                    continue;
                }
                debug!(asset, line, %format, "rewrote construct");
                return Ok(Patch {
                    content: apply_edits(source, &edits),
                    previous: rewrite.previous,
                    format,
                    line: Some(line),
                    occurrences: rewrite.occurrences,
                    text: text.to_string(),
                });
            }
            Attempt::Rejected => rejected = true,
            Attempt::NoMatch => {}
        }
    }

    Err(if rejected {
        PatchError::Rejected
    } else {
        PatchError::NoMatch
    })
}

/// Lines `line..=end` where `end` is the first line at which the format's
/// last opening construct is terminated (for video, once the element is
/// closed), bounded by [`MAX_TAG_LINES`].
fn tag_window(index: &LineIndex<'_>, source: &str, line: usize, format: Format) -> Range<usize> {
    let last = index.line_count().min(line + MAX_TAG_LINES - 1);
    let mut end = line;
    loop {
        let region = index.lines_range(line, end);
        if end >= last || !is_open(&source[region.clone()], format) {
            return region;
        }
        end += 1;
    }
}

fn is_open(text: &str, format: Format) -> bool {
    let lower = text.to_ascii_lowercase();
    let opening = match format {
        Format::HtmlImage => "<img",
        Format::HtmlVideo => "<video",
        Format::Markdown => return image_is_open(text),
        Format::Wikilink => return false,
    };
    let Some(start) = lower.rfind(opening) else {
        return false;
    };
    let rest = &lower[start..];
    !rest.contains('>') || (format == Format::HtmlVideo && !rest.contains("</video"))
}

/// Whether the last `![` (not a wikilink `![[`) has yet to reach `](...)`.
fn image_is_open(text: &str) -> bool {
    let Some(start) = text
        .match_indices("![")
        .map(|(at, _)| at)
        .filter(|&at| !text[at + 2..].starts_with('['))
        .last()
    else {
        return false;
    };
    let rest = &text[start..];
    match rest.find("](") {
        Some(close) => !rest[close..].contains(')'),
        None => true,
    }
}

fn patch_everywhere(source: &str, asset: &str, text: &str) -> Result<Patch, PatchError> {
    let mut accepted: Vec<Edit> = Vec::new();
    let mut first: Option<(Format, Option<String>)> = None;
    let mut occurrences = 0;
    let mut rejected = false;

    for format in Format::ORDER {
        match format.attempt(source, asset, text, Scope::All) {
            Attempt::Rewritten(rewrite) => {
                let fresh: Vec<Edit> = rewrite
                    .edits
                    .into_iter()
                    .filter(|edit| !accepted.iter().any(|taken| taken.overlaps(edit)))
                    .collect();
                if fresh.is_empty() {
                    continue;
                }
                accepted.extend(fresh);
                occurrences += rewrite.occurrences;
                if first.is_none() {
                    first = Some((format, rewrite.previous));
                }
            }
            Attempt::Rejected => rejected = true,
            Attempt::NoMatch => {}
        }
    }

    match first {
        Some((format, previous)) => {
            debug!(asset, occurrences, "rewrote every occurrence");
            Ok(Patch {
                content: apply_edits(source, &accepted),
                previous,
                format,
                line: None,
                occurrences,
                text: text.to_string(),
            })
        }
        None if rejected => Err(PatchError::Rejected),
        None => Err(PatchError::NoMatch),
    }
}

/// Records for one document are applied bottom-up so an edit never moves a
/// line that is still waiting; whole-file records go last.
fn apply_order(a: &Resolution, b: &Resolution) -> Ordering {
    let by_line = match (a.target.line(), b.target.line()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_line
        .then_with(|| a.asset_path.cmp(&b.asset_path))
        .then_with(|| a.usable_text().cmp(&b.usable_text()))
}

/// Apply every usable resolution, grouped by document.
///
/// Per-record and per-document failures are collected in the report; the
/// batch always runs to completion.
pub fn apply_resolutions(resolutions: &[Resolution], options: &ApplyOptions) -> ApplyReport {
    let (usable, skipped) = partition_resolutions(resolutions);
    let mut report = ApplyReport {
        skipped,
        dry_run: options.dry_run,
        ..ApplyReport::default()
    };

    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&Resolution>> = HashMap::new();
    for res in usable {
        let key = res.document_path.as_str();
        groups
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(res);
    }

    for document in order {
        let Some(mut records) = groups.remove(document) else {
            continue;
        };
        records.sort_by(|a, b| apply_order(a, b));
        apply_document(Path::new(document), &records, options, &mut report);
    }

    info!(
        applied = report.applied.len(),
        failed = report.failures.len(),
        skipped = report.skipped.len(),
        dry_run = options.dry_run,
        "apply complete"
    );
    report
}

fn apply_document(path: &Path, records: &[&Resolution], options: &ApplyOptions, report: &mut ApplyReport) {
    let fail_all = |report: &mut ApplyReport, error: PatchError| {
        for res in records {
            report.failures.push(failure(res, error.clone()));
        }
    };

    if !path.exists() {
        warn!(document = %path.display(), "file not found, skipping its records");
        fail_all(report, PatchError::MissingFile(path.to_path_buf()));
        return;
    }
    let original = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(document = %path.display(), error = %e, "could not read document");
            fail_all(report, PatchError::Io(e.to_string()));
            return;
        }
    };

    let mut content = original.clone();
    let mut applied = Vec::new();
    for res in records {
        let Some(text) = res.usable_text() else {
            continue;
        };
        match patch_source(&content, &res.asset_path, text, res.target) {
            Ok(patch) => {
                content = patch.content;
                applied.push(AppliedChange {
                    document_path: res.document_path.clone(),
                    asset_path: res.asset_path.clone(),
                    target: res.target,
                    previous: patch.previous,
                    new_text: patch.text,
                    occurrences: patch.occurrences,
                });
            }
            Err(error) => {
                warn!(
                    document = %path.display(),
                    asset = %res.asset_path,
                    target = %res.target,
                    error = %error,
                    "could not apply"
                );
                report.failures.push(failure(res, error));
            }
        }
    }

    if !options.dry_run && content != original {
        if let Err(e) = fs::write(path, &content) {
            warn!(document = %path.display(), error = %e, "could not write document");
            let error = PatchError::Io(e.to_string());
            report.failures.extend(applied.into_iter().map(|change| ApplyFailure {
                document_path: change.document_path,
                asset_path: change.asset_path,
                target: change.target,
                error: error.clone(),
            }));
            return;
        }
        debug!(document = %path.display(), changes = applied.len(), "wrote document");
    }
    report.applied.extend(applied);
}

fn failure(res: &Resolution, error: PatchError) -> ApplyFailure {
    ApplyFailure {
        document_path: res.document_path.clone(),
        asset_path: res.asset_path.clone(),
        target: res.target,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssetDeficiency;
    use std::num::NonZeroUsize;
    use tempfile::TempDir;

    fn at(line: usize) -> LineTarget {
        LineTarget::Targeted(NonZeroUsize::new(line).unwrap())
    }

    fn patched(source: &str, asset: &str, text: &str, target: LineTarget) -> Patch {
        patch_source(source, asset, text, target).unwrap()
    }

    fn resolution(doc: &Path, asset: &str, line: Option<i64>, text: &str) -> Resolution {
        let item = AssetDeficiency::new(doc.to_string_lossy(), asset, line.unwrap_or(1), "").unwrap();
        let mut res = Resolution::from_deficiency(&item, "suggested", "test-model", Some(text.to_string()));
        if line.is_none() {
            res.target = LineTarget::AnyOccurrence;
        }
        res
    }

    #[test]
    fn targeted_markdown_line() {
        let source = "# Title\n\nThis is ![old alt](path/to/image.png) in text\n";
        let patch = patched(source, "path/to/image.png", "new alt text", at(3));
        assert_eq!(patch.content, "# Title\n\nThis is ![new alt text](path/to/image.png) in text\n");
        assert_eq!(patch.previous.as_deref(), Some("old alt"));
        assert_eq!(patch.format, Format::Markdown);
        assert_eq!(patch.line, Some(3));
    }

    #[test]
    fn only_the_target_line_changes() {
        let source = "![](a.png)\n![](a.png)\n";
        let patch = patched(source, "a.png", "second", at(2));
        assert_eq!(patch.content, "![](a.png)\n![second](a.png)\n");
    }

    #[test]
    fn multiline_text_is_collapsed() {
        let patch = patched("![](image.png)", "image.png", "First line\nSecond line\nThird line", at(1));
        assert_eq!(patch.content, "![First line ... Second line ... Third line](image.png)");
        assert_eq!(patch.text, "First line ... Second line ... Third line");
    }

    #[test]
    fn html_img_and_wikilink() {
        let patch = patched("<img src=\"path/to/image.png\">", "path/to/image.png", "new alt text", at(1));
        assert_eq!(patch.content, "<img alt=\"new alt text\" src=\"path/to/image.png\"/>");
        assert_eq!(patch.previous, None);

        let patch = patched("This is ![[path/to/image.png]] in text", "path/to/image.png", "new alt text", at(1));
        assert_eq!(patch.content, "This is ![[path/to/image.png|new alt text]] in text");
        assert_eq!(patch.format, Format::Wikilink);
    }

    #[test]
    fn multiline_video_tag() {
        let source = "Intro\n\n<video\n  controls\n  class=\"wide\">\n  <source src=\"clip.mp4\">\n</video>\n\n<video src=\"other.mp4\"></video>\n";
        let patch = patched(source, "clip.mp4", "A robot", at(3));
        assert_eq!(
            patch.content,
            "Intro\n\n<video\n  controls\n  class=\"wide\" aria-label=\"A robot\">\n  <source src=\"clip.mp4\">\n</video>\n\n<video src=\"other.mp4\"></video>\n"
        );
    }

    #[test]
    fn multiline_img_tag() {
        let source = "<img\n  class=\"hero\"\n  src=\"hero.png\"\n>\n";
        let patch = patched(source, "hero.png", "Hero", at(1));
        assert_eq!(patch.content, "<img\n  class=\"hero\"\n  alt=\"Hero\" src=\"hero.png\"\n/>\n");
    }

    #[test]
    fn image_alt_over_two_lines() {
        let source = "Intro\n\n![placeholder\n](wide.png)\n\nAfter\n";
        let patch = patched(source, "wide.png", "A wide shot", at(3));
        assert_eq!(patch.content, "Intro\n\n![A wide shot](wide.png)\n\nAfter\n");
        assert_eq!(patch.previous.as_deref(), Some("placeholder\n"));
    }

    #[test]
    fn markdown_window_keeps_to_its_own_image() {
        let source = "![open bracket only\nnext ![](a.png)\n";
        assert_eq!(patch_source(source, "a.png", "x", at(1)), Err(PatchError::NoMatch));
        let patch = patched(source, "a.png", "x", at(2));
        assert_eq!(patch.content, "![open bracket only\nnext ![x](a.png)\n");
    }

    #[test]
    fn window_does_not_reach_the_next_tag() {
        let source = "<img src=\"a.png\">\n<img src=\"b.png\">\n";
        assert_eq!(patch_source(source, "b.png", "x", at(1)), Err(PatchError::NoMatch));
    }

    #[test]
    fn local_failures() {
        let source = "line one\nline two\n";
        assert_eq!(
            patch_source(source, "a.png", "x", at(3)),
            Err(PatchError::OutOfRange { line: 3, line_count: 2 })
        );
        assert_eq!(patch_source(source, "a.png", "x", at(1)), Err(PatchError::NoMatch));
        assert_eq!(
            patch_source("re = /<img src=\"[^\"]*/g;", "a.png", "x", at(1)),
            Err(PatchError::Rejected)
        );
        assert_eq!(
            patch_source(source, "a.png", "x", LineTarget::AnyOccurrence),
            Err(PatchError::NoMatch)
        );
    }

    #[test]
    fn whole_file_mode_rewrites_every_format() {
        let source = "![](x.png)\n\ntext ![[x.png]]\n\n<img src=\"x.png\">\n\n![old](x.png) again\n";
        let patch = patched(source, "x.png", "An x", LineTarget::AnyOccurrence);
        assert_eq!(
            patch.content,
            "![An x](x.png)\n\ntext ![[x.png|An x]]\n\n<img alt=\"An x\" src=\"x.png\"/>\n\n![An x](x.png) again\n"
        );
        assert_eq!(patch.occurrences, 4);
        assert_eq!(patch.line, None);
        assert_eq!(patch.previous, None);
    }

    #[test]
    fn trailing_newline_is_preserved() {
        for source in ["![](a.png)", "![](a.png)\n", "![](a.png)\r\n"] {
            let patch = patched(source, "a.png", "alt\n", at(1));
            assert_eq!(patch.content.ends_with('\n'), source.ends_with('\n'));
            assert_eq!(patch.content.ends_with("\r\n"), source.ends_with("\r\n"));
        }
    }

    #[test]
    fn apply_writes_each_file_once_bottom_up() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("doc.md");
        fs::write(&doc, "![](a.png)\n\n<img src=\"b.png\">\n\n![[c.png]]").unwrap();

        let records = vec![
            resolution(&doc, "a.png", Some(1), "Alpha"),
            resolution(&doc, "c.png", Some(5), "Gamma"),
            resolution(&doc, "b.png", Some(3), "Beta\nline"),
        ];
        let report = apply_resolutions(&records, &ApplyOptions::default());
        assert_eq!(report.applied_count(), 3);
        assert!(report.failures.is_empty());
        let lines: Vec<_> = report.applied.iter().map(|c| c.target.line()).collect();
        assert_eq!(lines, vec![Some(5), Some(3), Some(1)]);
        assert_eq!(
            fs::read_to_string(&doc).unwrap(),
            "![Alpha](a.png)\n\n<img alt=\"Beta ... line\" src=\"b.png\"/>\n\n![[c.png|Gamma]]"
        );
    }

    #[test]
    fn dry_run_leaves_files_alone() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("doc.md");
        fs::write(&doc, "![](a.png)\n").unwrap();

        let records = vec![resolution(&doc, "a.png", Some(1), "Alpha")];
        let report = apply_resolutions(&records, &ApplyOptions { dry_run: true });
        assert!(report.dry_run);
        assert_eq!(report.applied_count(), 1);
        assert_eq!(fs::read_to_string(&doc).unwrap(), "![](a.png)\n");
    }

    #[test]
    fn failures_are_local() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("doc.md");
        fs::write(&doc, "![](a.png)\n").unwrap();
        let missing = tmp.path().join("missing.md");

        let mut blank = resolution(&doc, "z.png", Some(1), "");
        blank.final_text = None;
        let records = vec![
            resolution(&missing, "a.png", Some(1), "x"),
            resolution(&missing, "b.png", Some(1), "y"),
            resolution(&doc, "a.png", Some(9), "far"),
            resolution(&doc, "nope.png", Some(1), "none"),
            resolution(&doc, "a.png", Some(1), "Alpha"),
            blank,
        ];
        let report = apply_resolutions(&records, &ApplyOptions::default());

        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].asset_basename, "z.png");
        let errors: Vec<_> = report.failures.iter().map(|f| f.error.clone()).collect();
        assert_eq!(
            errors,
            vec![
                PatchError::MissingFile(missing.clone()),
                PatchError::MissingFile(missing.clone()),
                PatchError::OutOfRange { line: 9, line_count: 1 },
                PatchError::NoMatch,
            ]
        );
        assert_eq!(fs::read_to_string(&doc).unwrap(), "![Alpha](a.png)\n");
    }

    #[test]
    fn unchanged_file_is_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let doc = tmp.path().join("doc.md");
        fs::write(&doc, "nothing\n").unwrap();
        let records = vec![resolution(&doc, "a.png", Some(1), "x")];
        let report = apply_resolutions(&records, &ApplyOptions::default());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(fs::read_to_string(&doc).unwrap(), "nothing\n");
    }
}
