use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, PatchError};

/// One asset occurrence whose accessibility text is missing or a placeholder.
///
/// Emitted by the scanner; serialised as one entry of the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDeficiency")]
pub struct AssetDeficiency {
    /// Markdown document containing the asset.
    #[serde(rename = "markdown_file")]
    pub document_path: String,
    /// Asset reference as written in the document (relative path or URL).
    pub asset_path: String,
    /// 1-based source line of the construct. Always >= 1.
    pub line_number: usize,
    /// Surrounding paragraph text, for reviewers only.
    pub context_snippet: String,
}

#[derive(Deserialize)]
struct RawDeficiency {
    markdown_file: String,
    asset_path: String,
    line_number: i64,
    context_snippet: String,
}

impl TryFrom<RawDeficiency> for AssetDeficiency {
    type Error = EngineError;

    fn try_from(raw: RawDeficiency) -> Result<Self, Self::Error> {
        Self::new(
            raw.markdown_file,
            raw.asset_path,
            raw.line_number,
            raw.context_snippet,
        )
    }
}

impl AssetDeficiency {
    /// Build a record, rejecting line numbers below 1.
    pub fn new(
        document_path: impl Into<String>,
        asset_path: impl Into<String>,
        line_number: i64,
        context_snippet: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let line_number = positive_line(line_number)?;
        Ok(Self {
            document_path: document_path.into(),
            asset_path: asset_path.into(),
            line_number: line_number.get(),
            context_snippet: context_snippet.into(),
        })
    }
}

fn positive_line(line: i64) -> Result<NonZeroUsize, EngineError> {
    usize::try_from(line)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or(EngineError::InvalidLine(line))
}

/// Where a resolution should be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineTarget {
    /// Only the given 1-based line.
    Targeted(NonZeroUsize),
    /// Every occurrence of the asset anywhere in the document.
    AnyOccurrence,
}

impl LineTarget {
    pub fn line(self) -> Option<usize> {
        match self {
            Self::Targeted(line) => Some(line.get()),
            Self::AnyOccurrence => None,
        }
    }
}

impl fmt::Display for LineTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Targeted(line) => write!(f, "line {line}"),
            Self::AnyOccurrence => f.write_str("all occurrences"),
        }
    }
}

/// A deficiency record augmented with a reviewed value ("caption").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawResolution", into = "RawResolution")]
pub struct Resolution {
    pub document_path: String,
    pub asset_path: String,
    pub suggested_text: String,
    pub source_model: String,
    pub context_snippet: String,
    pub target: LineTarget,
    /// Approved value. `None` or whitespace-only means the record is unusable.
    pub final_text: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct RawResolution {
    markdown_file: String,
    asset_path: String,
    suggested_alt: String,
    model: String,
    context_snippet: String,
    #[serde(default)]
    line_number: Option<i64>,
    #[serde(default)]
    final_alt: Option<String>,
}

impl TryFrom<RawResolution> for Resolution {
    type Error = EngineError;

    fn try_from(raw: RawResolution) -> Result<Self, Self::Error> {
        let target = match raw.line_number {
            Some(line) => LineTarget::Targeted(positive_line(line)?),
            None => LineTarget::AnyOccurrence,
        };
        Ok(Self {
            document_path: raw.markdown_file,
            asset_path: raw.asset_path,
            suggested_text: raw.suggested_alt,
            source_model: raw.model,
            context_snippet: raw.context_snippet,
            target,
            final_text: raw.final_alt,
        })
    }
}

impl From<Resolution> for RawResolution {
    fn from(res: Resolution) -> Self {
        Self {
            markdown_file: res.document_path,
            asset_path: res.asset_path,
            suggested_alt: res.suggested_text,
            model: res.source_model,
            context_snippet: res.context_snippet,
            line_number: res.target.line().map(|line| line as i64),
            final_alt: res.final_text,
        }
    }
}

impl Resolution {
    /// Attach reviewed text to a scan record, targeting the scanned line.
    pub fn from_deficiency(
        item: &AssetDeficiency,
        suggested_text: impl Into<String>,
        source_model: impl Into<String>,
        final_text: Option<String>,
    ) -> Self {
        let target = NonZeroUsize::new(item.line_number)
            .map(LineTarget::Targeted)
            .unwrap_or(LineTarget::AnyOccurrence);
        Self {
            document_path: item.document_path.clone(),
            asset_path: item.asset_path.clone(),
            suggested_text: suggested_text.into(),
            source_model: source_model.into(),
            context_snippet: item.context_snippet.clone(),
            target,
            final_text,
        }
    }

    /// The approved text when it is present and not blank.
    pub fn usable_text(&self) -> Option<&str> {
        self.final_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// Final path component of the asset, used in the skip list.
    pub fn asset_basename(&self) -> String {
        Path::new(&self.asset_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.asset_path.clone())
    }
}

/// A resolution without usable text, keyed by document and asset basename.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkippedEntry {
    pub document_path: String,
    pub asset_basename: String,
}

/// One successfully applied (or, in dry run, applicable) resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub document_path: String,
    pub asset_path: String,
    pub target: LineTarget,
    pub previous: Option<String>,
    pub new_text: String,
    pub occurrences: usize,
}

/// One resolution that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    pub document_path: String,
    pub asset_path: String,
    pub target: LineTarget,
    pub error: PatchError,
}

/// Outcome of applying a batch of resolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<AppliedChange>,
    pub failures: Vec<ApplyFailure>,
    /// Records without usable text, sorted and deduplicated.
    pub skipped: Vec<SkippedEntry>,
    pub dry_run: bool,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}
