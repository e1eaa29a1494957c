//! Modification tags: the logical clock attached to store records.

use serde::{Deserialize, Serialize};

/// Logical clock attached to desired and actual records.
///
/// Within one epoch a higher index is newer. A tag from a different epoch
/// always wins, since a new epoch means the record was recreated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ModificationTag {
    #[serde(default)]
    pub epoch: String,
    #[serde(default)]
    pub index: u32,
}

impl ModificationTag {
    pub fn new(epoch: impl Into<String>, index: u32) -> Self {
        Self {
            epoch: epoch.into(),
            index,
        }
    }

    /// Returns true if `incoming` should replace state stamped with `current`.
    ///
    /// A missing tag, or one with an empty epoch, never blocks an update.
    pub fn succeeded_by(current: Option<&Self>, incoming: Option<&Self>) -> bool {
        let (Some(current), Some(incoming)) = (current, incoming) else {
            return true;
        };

        if current.epoch.is_empty() || incoming.epoch.is_empty() {
            return true;
        }

        if current.epoch != incoming.epoch {
            return true;
        }

        current.index < incoming.index
    }

    /// Returns true if both tags are absent, or both are present and identical.
    pub fn equal(a: Option<&Self>, b: Option<&Self>) -> bool {
        a == b
    }

    /// Returns true if `incoming` is the same tag as `current` or newer.
    pub fn equal_or_succeeded_by(current: Option<&Self>, incoming: Option<&Self>) -> bool {
        Self::equal(current, incoming) || Self::succeeded_by(current, incoming)
    }
}

impl std::fmt::Display for ModificationTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.epoch, self.index)
    }
}
