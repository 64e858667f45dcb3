//! Normalising pre-pass over the pulldown-cmark event stream.
//!
//! The scanner only cares about three kinds of construct, so the tokenizer's
//! events are folded into [`MediaToken`] here and nothing downstream matches
//! on pulldown-cmark types.
use std::borrow::Cow;
use std::ops::Range;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::syntax::wikilink::embeds;

/// Which layer of the document a raw HTML fragment was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlLayer {
    /// One inline HTML tag or one whole HTML block.
    Fragment,
    /// The full source of a paragraph-like container holding `<video`.
    /// Inline HTML is split tag by tag, so this is the only layer where a
    /// `<video>` and its `<source>` children are seen together.
    Enclosing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaToken<'a> {
    NativeImage {
        src: String,
        alt: Option<String>,
        /// Source span of the whole `![...](...)`.
        span: Range<usize>,
    },
    RawHtml {
        fragment: Cow<'a, str>,
        /// Byte offset of the fragment in the document.
        offset: usize,
        layer: HtmlLayer,
    },
    /// A run of plain source text containing `![[`.
    Wikilink {
        text: &'a str,
        offset: usize,
        /// Inline HTML tags inside the run, as document ranges. An embed
        /// starting inside one is attribute text, not an embed.
        html: Vec<Range<usize>>,
    },
}

/// Fold the document into media tokens, in document order. A container's
/// enclosing HTML token precedes the tokens found inside it.
pub fn media_tokens(source: &str) -> Vec<MediaToken<'_>> {
    let mut walker = Walker::new(source);
    for (event, range) in Parser::new_ext(source, Options::empty()).into_offset_iter() {
        walker.visit(event, range);
    }
    walker.finish()
}

struct Frame<'a> {
    range: Range<usize>,
    tokens: Vec<MediaToken<'a>>,
    /// Code spans, images, wikilink embeds and nested containers, blanked
    /// out of the enclosing layer.
    blanks: Vec<Range<usize>>,
}

struct ImageState {
    src: String,
    span: Range<usize>,
    alt: String,
    depth: usize,
}

struct Walker<'a> {
    source: &'a str,
    out: Vec<MediaToken<'a>>,
    frames: Vec<Frame<'a>>,
    image: Option<ImageState>,
    html_block: Option<Range<usize>>,
    in_code_block: bool,
    run: Option<Range<usize>>,
    run_html: Vec<Range<usize>>,
}

impl<'a> Walker<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            out: Vec::new(),
            frames: Vec::new(),
            image: None,
            html_block: None,
            in_code_block: false,
            run: None,
            run_html: Vec::new(),
        }
    }

    fn visit(&mut self, event: Event<'_>, range: Range<usize>) {
        if self.image.is_some() {
            self.visit_alt(event);
            return;
        }

        match event {
            Event::Start(Tag::Image { dest_url, .. }) => {
                self.flush_run();
                self.image = Some(ImageState {
                    src: dest_url.to_string(),
                    span: range,
                    alt: String::new(),
                    depth: 0,
                });
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.flush_run();
                self.in_code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => self.in_code_block = false,
            Event::Start(Tag::HtmlBlock) => {
                self.flush_run();
                self.html_block = Some(range);
            }
            Event::Html(_) => {
                if let Some(block) = self.html_block.as_mut() {
                    *block = block.start.min(range.start)..block.end.max(range.end);
                }
            }
            Event::End(TagEnd::HtmlBlock) => {
                if let Some(block) = self.html_block.take() {
                    let source = self.source;
                    self.emit(MediaToken::RawHtml {
                        fragment: Cow::Borrowed(&source[block.clone()]),
                        offset: block.start,
                        layer: HtmlLayer::Fragment,
                    });
                }
            }
            // inline tags (even inside a wikilink alt) do not interrupt a run
            Event::InlineHtml(_) => {
                if self.run.is_some() {
                    self.run_html.push(range.clone());
                }
                let source = self.source;
                self.emit(MediaToken::RawHtml {
                    fragment: Cow::Borrowed(&source[range.clone()]),
                    offset: range.start,
                    layer: HtmlLayer::Fragment,
                });
            }
            Event::Code(_) => {
                self.flush_run();
                if let Some(frame) = self.frames.last_mut() {
                    frame.blanks.push(range);
                }
            }
            Event::Text(_) | Event::SoftBreak | Event::HardBreak => {
                if !self.in_code_block {
                    self.extend_run(range);
                }
            }
            // emphasis markers do not interrupt a wikilink run
            Event::Start(Tag::Emphasis | Tag::Strong | Tag::Strikethrough)
            | Event::End(TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough) => {}
            Event::Start(tag) if is_container(&tag) => {
                self.flush_run();
                self.frames.push(Frame {
                    range,
                    tokens: Vec::new(),
                    blanks: Vec::new(),
                });
            }
            Event::End(end) if is_container_end(&end) => {
                self.flush_run();
                self.close_frame();
            }
            _ => self.flush_run(),
        }
    }

    fn visit_alt(&mut self, event: Event<'_>) {
        let Some(image) = self.image.as_mut() else {
            return;
        };
        match event {
            Event::Start(Tag::Image { .. }) => image.depth += 1,
            Event::End(TagEnd::Image) if image.depth > 0 => image.depth -= 1,
            Event::End(TagEnd::Image) => self.finish_image(),
            Event::Text(text) | Event::Code(text) => image.alt.push_str(&text),
            Event::SoftBreak | Event::HardBreak => image.alt.push(' '),
            _ => {}
        }
    }

    fn finish_image(&mut self) {
        if let Some(done) = self.image.take() {
            // alt text is never HTML
            if let Some(frame) = self.frames.last_mut() {
                frame.blanks.push(done.span.clone());
            }
            self.emit(MediaToken::NativeImage {
                src: done.src,
                alt: Some(done.alt).filter(|alt| !alt.is_empty()),
                span: done.span,
            });
        }
    }

    fn emit(&mut self, token: MediaToken<'a>) {
        match self.frames.last_mut() {
            Some(frame) => frame.tokens.push(token),
            None => self.out.push(token),
        }
    }

    fn extend_run(&mut self, range: Range<usize>) {
        self.run = Some(match self.run.take() {
            Some(run) => run.start.min(range.start)..run.end.max(range.end),
            None => range,
        });
    }

    fn flush_run(&mut self) {
        let html = std::mem::take(&mut self.run_html);
        let Some(run) = self.run.take() else {
            return;
        };
        let source = self.source;
        let text = &source[run.clone()];
        if !text.contains("![[") {
            return;
        }

        // tags inside an embed's alt are part of its text
        for embed in embeds(text) {
            let start = run.start + embed.offset;
            if !html.iter().any(|tag| tag.contains(&start)) {
                self.suppress_html(start..run.start + embed.end);
            }
        }
        self.emit(MediaToken::Wikilink {
            text,
            offset: run.start,
            html,
        });
    }

    /// Drop the fragments already taken from `range` and blank it out of the
    /// enclosing layer.
    fn suppress_html(&mut self, range: Range<usize>) {
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        frame.tokens.retain(|token| match token {
            MediaToken::RawHtml {
                offset,
                layer: HtmlLayer::Fragment,
                ..
            } => !range.contains(offset),
            _ => true,
        });
        frame.blanks.push(range);
    }

    fn close_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let mut tokens = Vec::with_capacity(frame.tokens.len() + 1);
        if let Some(enclosing) = self.enclosing(&frame) {
            tokens.push(enclosing);
        }
        tokens.extend(frame.tokens);

        match self.frames.last_mut() {
            Some(parent) => {
                parent.blanks.push(frame.range);
                parent.tokens.extend(tokens);
            }
            None => self.out.extend(tokens),
        }
    }

    fn enclosing(&self, frame: &Frame<'a>) -> Option<MediaToken<'a>> {
        let text = &self.source[frame.range.clone()];
        if !contains_video(text) {
            return None;
        }

        let mut bytes = text.as_bytes().to_vec();
        for blank in &frame.blanks {
            let start = blank.start.saturating_sub(frame.range.start).min(bytes.len());
            let end = blank.end.saturating_sub(frame.range.start).min(bytes.len());
            bytes[start..end].fill(b' ');
        }
        let fragment = String::from_utf8(bytes).ok()?;
        if !contains_video(&fragment) {
            return None;
        }

        Some(MediaToken::RawHtml {
            fragment: Cow::Owned(fragment),
            offset: frame.range.start,
            layer: HtmlLayer::Enclosing,
        })
    }

    fn finish(mut self) -> Vec<MediaToken<'a>> {
        self.flush_run();
        while !self.frames.is_empty() {
            self.close_frame();
        }
        self.out
    }
}

fn is_container(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::Paragraph | Tag::Heading { .. } | Tag::Item | Tag::TableCell
    )
}

fn is_container_end(end: &TagEnd) -> bool {
    matches!(
        end,
        TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::TableCell
    )
}

fn contains_video(text: &str) -> bool {
    text.to_ascii_lowercase().contains("<video")
}
