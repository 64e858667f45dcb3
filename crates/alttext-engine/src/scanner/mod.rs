//! Corpus scanner: finds asset embeds whose accessibility text is missing or
//! a placeholder and anchors each one to a source line.
pub mod extract;
pub mod locate;
pub mod tokens;

use std::collections::HashSet;
use std::fs;
use std::ops::Range;
use std::path::Path;

use tracing::{debug, info, warn};

use self::extract::{extract_media, HtmlMedia};
use self::locate::{locate_line, LineIndex};
use self::tokens::{media_tokens, HtmlLayer, MediaToken};
use crate::context::paragraph_context;
use crate::discovery::discover_files;
use crate::error::EngineError;
use crate::model::AssetDeficiency;
use crate::syntax::wikilink::embeds;
use crate::text::{escape_html, is_alt_meaningful};

/// Extensions of the documents the scanner reads.
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md"];

/// Paragraphs of context kept on each side of a construct.
const CONTEXT_PARAGRAPHS: usize = 2;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Skip hidden entries and `node_modules` while walking.
    pub respect_ignore: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            respect_ignore: true,
        }
    }
}

/// Scan every markdown document under `root`.
///
/// Documents that cannot be read or whose constructs cannot be located are
/// logged and skipped. Records come out in discovery order, then document
/// order.
pub fn build_queue(root: &Path, options: &ScanOptions) -> Result<Vec<AssetDeficiency>, EngineError> {
    let files = discover_files(root, MARKDOWN_EXTENSIONS, options.respect_ignore)?;
    let mut queue = Vec::new();
    for file in &files {
        match scan_file(file) {
            Ok(items) => queue.extend(items),
            Err(e) => warn!(document = %file.display(), error = %e, "skipping document"),
        }
    }
    info!(documents = files.len(), assets = queue.len(), "scan complete");
    Ok(queue)
}

pub fn scan_file(path: &Path) -> Result<Vec<AssetDeficiency>, EngineError> {
    let source = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    scan_document(path, &source)
}

/// Scan one document held in memory. `path` is only recorded, never read.
pub fn scan_document(path: &Path, source: &str) -> Result<Vec<AssetDeficiency>, EngineError> {
    let mut scan = DocumentScan::new(path, source);
    for token in media_tokens(source) {
        match token {
            MediaToken::NativeImage { src, alt, span } => scan.native_image(&src, alt.as_deref(), span)?,
            MediaToken::RawHtml {
                fragment,
                offset,
                layer,
            } => scan.raw_html(&fragment, offset, layer)?,
            MediaToken::Wikilink { text, offset, html } => scan.wikilinks(text, offset, &html)?,
        }
    }
    debug!(document = %path.display(), assets = scan.found.len(), "scanned document");
    Ok(scan.found)
}

struct DocumentScan<'a> {
    document: String,
    source: &'a str,
    index: LineIndex<'a>,
    lines: Vec<&'a str>,
    /// Videos reported from an enclosing container; their fragment-level
    /// sightings are duplicates.
    seen_videos: HashSet<String>,
    found: Vec<AssetDeficiency>,
}

impl<'a> DocumentScan<'a> {
    fn new(path: &Path, source: &'a str) -> Self {
        let index = LineIndex::new(source);
        let lines = index.bodies();
        Self {
            document: path.to_string_lossy().into_owned(),
            source,
            index,
            lines,
            seen_videos: HashSet::new(),
            found: Vec::new(),
        }
    }

    fn native_image(&mut self, src: &str, alt: Option<&str>, span: Range<usize>) -> Result<(), EngineError> {
        if src.is_empty() || is_alt_meaningful(alt) {
            return Ok(());
        }
        // the patcher matches the destination as written
        if !self.source[span.clone()].contains(src) {
            warn!(
                document = %self.document,
                asset = src,
                line = self.index.line_of(span.start),
                "image destination is a reference or escaped, skipping"
            );
            return Ok(());
        }
        let line = self.index.line_of(span.start);
        self.push(src, line)
    }

    fn raw_html(&mut self, fragment: &str, offset: usize, layer: HtmlLayer) -> Result<(), EngineError> {
        let mut cursor = 0;
        for media in extract_media(fragment, layer) {
            if !media.needs_text() {
                continue;
            }
            if media.is_video() {
                let src = media.src().to_string();
                match layer {
                    HtmlLayer::Enclosing => {
                        self.seen_videos.insert(src);
                    }
                    HtmlLayer::Fragment if self.seen_videos.contains(&src) => {
                        debug!(asset = %src, "video already reported by its container");
                        continue;
                    }
                    HtmlLayer::Fragment => {}
                }
            }
            let line = self.html_line(fragment, offset, &media, &mut cursor)?;
            self.push(media.src(), line)?;
        }
        Ok(())
    }

    /// Line of the `<img` / `<video` opening that owns the element's `src`.
    /// `cursor` advances through the fragment so repeated sources map to
    /// successive tags.
    fn html_line(
        &self,
        fragment: &str,
        offset: usize,
        media: &HtmlMedia,
        cursor: &mut usize,
    ) -> Result<usize, EngineError> {
        let src = media.src();
        let escaped = escape_html(src);
        let found = [src, escaped.as_str()].into_iter().find_map(|needle| {
            let pos = find_from(fragment, needle, *cursor).or_else(|| fragment.find(needle))?;
            Some((pos, needle.len()))
        });

        let Some((pos, len)) = found else {
            return self.fallback_line(src, src);
        };
        *cursor = pos + len;
        let opening = if media.is_video() { "<video" } else { "<img" };
        let tag = fragment[..pos].to_ascii_lowercase().rfind(opening).unwrap_or(pos);
        Ok(self.index.line_of(offset + tag))
    }

    fn wikilinks(&mut self, text: &str, offset: usize, html: &[Range<usize>]) -> Result<(), EngineError> {
        for embed in embeds(text) {
            let start = offset + embed.offset;
            if html.iter().any(|tag| tag.contains(&start)) {
                debug!(asset = embed.src, "embed inside an html tag, ignoring");
                continue;
            }
            if !embed.has_asset_extension() || is_alt_meaningful(embed.alt) {
                continue;
            }
            let line = self.index.line_of(start);
            self.push(embed.src, line)?;
        }
        Ok(())
    }

    fn fallback_line(&self, key: &str, asset: &str) -> Result<usize, EngineError> {
        locate_line(&self.index, key).ok_or_else(|| EngineError::Locate {
            document: self.document.clone(),
            asset: asset.to_string(),
        })
    }

    fn push(&mut self, asset: &str, line: usize) -> Result<(), EngineError> {
        let context = paragraph_context(&self.lines, line - 1, CONTEXT_PARAGRAPHS, CONTEXT_PARAGRAPHS);
        let item = AssetDeficiency::new(self.document.as_str(), asset, line as i64, context)?;
        debug!(document = %self.document, asset, line, "asset lacks meaningful text");
        self.found.push(item);
        Ok(())
    }
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack.get(from..)?.find(needle).map(|rel| rel + from)
}
