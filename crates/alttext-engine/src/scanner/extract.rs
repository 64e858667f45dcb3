//! Media extraction from raw HTML fragments.
//!
//! Fragments go through scraper's lenient HTML5 parser, which never fails:
//! content that only resembles a tag (a regex literal, a comparison) simply
//! yields no elements.
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::tokens::HtmlLayer;
use crate::text::{is_alt_meaningful, is_video_label_meaningful};

static MEDIA: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img, video").expect("valid selector"));
static SOURCE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("source").expect("valid selector"));

/// The attributes that can label a `<video>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoLabels {
    pub aria_label: Option<String>,
    pub title: Option<String>,
    pub aria_describedby: Option<String>,
}

impl VideoLabels {
    /// A video is labelled when any one of its label attributes is meaningful.
    pub fn is_meaningful(&self) -> bool {
        [&self.aria_label, &self.title, &self.aria_describedby]
            .into_iter()
            .any(|label| is_video_label_meaningful(label.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlMedia {
    Image { src: String, alt: Option<String> },
    Video { src: String, labels: VideoLabels },
}

impl HtmlMedia {
    pub fn src(&self) -> &str {
        match self {
            Self::Image { src, .. } | Self::Video { src, .. } => src,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video { .. })
    }

    /// Whether this element should be queued.
    ///
    /// An explicit blank `alt` marks an image as decorative, which is not the
    /// same as a missing `alt`.
    pub fn needs_text(&self) -> bool {
        match self {
            Self::Image { alt: Some(alt), .. } if alt.trim().is_empty() => false,
            Self::Image { alt, .. } => !is_alt_meaningful(alt.as_deref()),
            Self::Video { labels, .. } => !labels.is_meaningful(),
        }
    }
}

/// Every `<img>` and `<video>` with a non-empty source, in document order.
///
/// The enclosing layer only contributes videos; its images are already
/// reported through their own fragments.
pub fn extract_media(fragment: &str, layer: HtmlLayer) -> Vec<HtmlMedia> {
    let document = Html::parse_fragment(fragment);
    document
        .select(&MEDIA)
        .filter_map(|el| match el.value().name() {
            "img" if layer == HtmlLayer::Fragment => {
                let src = non_empty(el.value().attr("src"))?;
                Some(HtmlMedia::Image {
                    src,
                    alt: el.value().attr("alt").map(str::to_string),
                })
            }
            "video" => Some(HtmlMedia::Video {
                src: video_src(&el)?,
                labels: VideoLabels {
                    aria_label: non_empty(el.value().attr("aria-label")),
                    title: non_empty(el.value().attr("title")),
                    aria_describedby: non_empty(el.value().attr("aria-describedby")),
                },
            }),
            _ => None,
        })
        .collect()
}

fn video_src(video: &ElementRef<'_>) -> Option<String> {
    non_empty(video.value().attr("src")).or_else(|| {
        video
            .select(&SOURCE)
            .next()
            .and_then(|source| non_empty(source.value().attr("src")))
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
