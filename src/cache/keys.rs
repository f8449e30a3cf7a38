//! Backing-store key layout.
//!
//! Every view owns the keys under `{prefix}:{view}:`; nothing else writes there.

use std::fmt;

/// Identifies one ranked view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Latest,
    Hottest,
}

impl ViewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewKind::Latest => "latest",
            ViewKind::Hottest => "hottest",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field of the meta hash holding the token of the current generation.
pub const GENERATION_FIELD: &str = "generation";

/// Resolved key names for one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewKeys {
    view: ViewKind,
    entries: String,
    index: String,
    members: String,
    meta: String,
    rank_prefix: String,
}

impl ViewKeys {
    pub fn new(prefix: &str, view: ViewKind) -> Self {
        let base = format!("{prefix}:{}", view.as_str());
        Self {
            view,
            entries: format!("{base}:entries"),
            index: format!("{base}:index"),
            members: format!("{base}:members"),
            meta: format!("{base}:meta"),
            rank_prefix: format!("{base}:rank:"),
        }
    }

    pub fn view(&self) -> ViewKind {
        self.view
    }

    /// Hash: position → serialized entry.
    pub fn entries(&self) -> &str {
        &self.entries
    }

    /// Hash: post id → position.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Set of post ids currently in the view.
    pub fn members(&self) -> &str {
        &self.members
    }

    /// Hash holding [`GENERATION_FIELD`].
    pub fn meta(&self) -> &str {
        &self.meta
    }

    /// Flat field hash for one rank (1-based).
    pub fn rank(&self, rank: usize) -> String {
        format!("{}{rank}", self.rank_prefix)
    }
}

/// Hash field for a 1-based position.
pub fn position_field(position: usize) -> String {
    position.to_string()
}
