// crates/clipdrop-core/src/formats.rs
//
// Clipboard format tags. Numeric values match the platform clipboard IDs the
// host editor reports, so handlers can be written against plain numbers.

use std::collections::BTreeSet;
use std::fmt;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatTag(pub u32);

impl FormatTag {
    pub const TEXT:      FormatTag = FormatTag(1);
    pub const BITMAP:    FormatTag = FormatTag(2);
    pub const FILE_DROP: FormatTag = FormatTag(15);

    pub fn name(self) -> &'static str {
        match self {
            FormatTag::TEXT      => "text",
            FormatTag::BITMAP    => "bitmap",
            FormatTag::FILE_DROP => "file-drop",
            _                    => "other",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

/// The format tags present on the clipboard, captured once per session.
pub type FormatSet = BTreeSet<FormatTag>;

pub fn format_set<I: IntoIterator<Item = u32>>(tags: I) -> FormatSet {
    tags.into_iter().map(FormatTag).collect()
}

/// True if any tag in `accepted` is present in `available`.
pub fn intersects(available: &FormatSet, accepted: &[FormatTag]) -> bool {
    accepted.iter().any(|t| available.contains(t))
}
