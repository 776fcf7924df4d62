// Feature paths
// Splits slash-delimited feature paths into root / prefix / field

use serde::{Deserialize, Serialize};

/// A parsed feature path such as `"group/voice/pitch"`.
///
/// Parsing is total and permissive: empty segments (leading, trailing or
/// doubled slashes) are dropped and nothing else is rejected. A path needs at
/// least two segments to address a field inside a bucket; shorter paths parse
/// to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeaturePath {
    /// First segment, scopes timing-array borrowing between buckets
    pub root: String,

    /// Every segment except the last, joined with `/`
    pub prefix: String,

    /// Last segment, names the scalar array (`pitch`, `time`, ...)
    pub field: String,
}

impl FeaturePath {
    pub fn parse(raw: &str) -> Option<Self> {
        Self::from_segments(&split_segments(raw))
    }

    /// Build from already-split, non-empty segments
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Option<Self> {
        let (field, prefix) = segments.split_last()?;
        let root = prefix.first()?;

        Some(FeaturePath {
            root: root.as_ref().to_string(),
            prefix: prefix.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join("/"),
            field: field.as_ref().to_string(),
        })
    }
}

/// Split a raw path on `/`, dropping empty segments
pub fn split_segments(raw: &str) -> Vec<String> {
    raw.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
