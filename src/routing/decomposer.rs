//! Compound request detection and splitting.
//!
//! A request is compound when it contains a sequencing marker such as
//! "and then" or "finally". Compound requests are split into ordered
//! fragments, each of which becomes its own task; everything else passes
//! through as a single fragment.

use regex::Regex;
use std::sync::LazyLock;

/// Markers whose presence makes a request compound.
///
/// Note that " before " and " first " signal sequencing but are not safe
/// split points (the fragments would invert the intended order), so they
/// appear here and not in the split pattern.
const SEQUENCE_MARKERS: &[&str] = &[
    " and then ",
    " after ",
    " before ",
    " first ",
    " next ",
    " finally ",
    " step 1",
    " step 2",
    " then ",
    " afterwards ",
    " subsequently ",
];

/// Split pattern for compound requests. Longer alternatives come first
/// so "and then" and "afterwards" win over their substrings.
static SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\band then\b|\bafterwards\b|\bsubsequently\b|\bafter\b|\bfinally\b|\bnext\b|\bthen\b|\bstep \d+\b")
        .unwrap()
});

/// Splits compound requests into ordered sub-requests.
pub struct Decomposer;

impl Decomposer {
    pub fn new() -> Self {
        Self
    }

    /// Check whether the text contains a sequencing marker.
    pub fn is_compound(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        SEQUENCE_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    }

    /// Split the text into ordered, trimmed, non-empty fragments.
    ///
    /// Non-compound text comes back as a single fragment containing the
    /// original text. If splitting a compound request collapses to one or
    /// zero usable fragments, the original text is returned unchanged, so
    /// non-empty input never yields zero fragments.
    pub fn decompose(&self, text: &str) -> Vec<String> {
        if !self.is_compound(text) {
            return vec![text.to_string()];
        }

        let fragments: Vec<String> = SPLIT_RE
            .split(text)
            .map(str::trim)
            .filter(|fragment| !fragment.is_empty())
            .map(String::from)
            .collect();

        if fragments.len() <= 1 {
            vec![text.to_string()]
        } else {
            fragments
        }
    }
}

impl Default for Decomposer {
    fn default() -> Self {
        Self::new()
    }
}
