#![forbid(unsafe_code)]

//! Guessing which element the editor considers selected.
//!
//! The editor exposes no selection API and its markup is not a stable
//! contract, so several selector heuristics are unioned. Nested decoration
//! (handles, outlines) often matches too; ranking by rendered area prefers
//! the outer wrapper.

use crate::host::DomHost;

/// Default "is selected" markers, in priority order.
pub const DEFAULT_SELECTED_MARKERS: [&str; 7] = [
    "[aria-selected='true']",
    "[data-selected='true']",
    "[data-testid*='selected']",
    "[class*='selected']",
    "[class*='Selected']",
    "[class*='selection']",
    "[class*='Selection']",
];

/// Ordered selector heuristics for the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionLocator {
    selectors: Vec<String>,
}

impl Default for SelectionLocator {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTED_MARKERS.iter().map(|s| (*s).to_owned()))
    }
}

impl SelectionLocator {
    /// Build a locator from selectors in priority order.
    pub fn new(selectors: impl IntoIterator<Item = String>) -> Self {
        Self {
            selectors: selectors.into_iter().collect(),
        }
    }

    /// Selectors in priority order.
    #[must_use]
    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    /// Visible matches of every selector, deduplicated in first-seen order.
    pub fn candidates<H: DomHost>(&self, host: &H) -> Vec<H::Element> {
        let mut unique: Vec<H::Element> = Vec::new();
        for selector in &self.selectors {
            for element in host.query_all(selector) {
                if !unique.contains(&element) {
                    unique.push(element);
                }
            }
        }
        unique.retain(|element| host.bounding_rect(element).is_visible());
        unique
    }

    /// The largest visible candidate. Ties keep the earliest candidate.
    pub fn locate<H: DomHost>(&self, host: &H) -> Option<H::Element> {
        let mut best: Option<(H::Element, f64)> = None;
        for element in self.candidates(host) {
            let area = host.bounding_rect(&element).area();
            match &best {
                Some((_, best_area)) if area <= *best_area => {}
                _ => best = Some((element, area)),
            }
        }
        let picked = best.map(|(element, _)| element);
        tracing::trace!(found = picked.is_some(), "selection located");
        picked
    }
}
