#![forbid(unsafe_code)]

//! Identity-plus-geometry snapshots of elements.
//!
//! The editor's framework destroys and recreates nodes freely, so node
//! identity alone cannot tell "the copied element" from "the pasted one".
//! A signature pairs a best-effort identity key with the rect at capture
//! time. The key comes from an [`IdentityChain`]: the first source that
//! yields a non-empty value wins, and rounded geometry is the last resort.

use serde::{Deserialize, Serialize};

use crate::geometry::ElementRect;
use crate::host::DomHost;

/// One place an identity key may come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// A named attribute, e.g. `data-id`.
    Attribute(String),
    /// The element's DOM id.
    DomId,
}

impl IdentitySource {
    fn resolve<H: DomHost>(&self, host: &H, element: &H::Element) -> Option<String> {
        let value = match self {
            Self::Attribute(name) => host.attribute(element, name),
            Self::DomId => host.element_id(element),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Ordered identity sources, falling back to a geometry key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityChain {
    sources: Vec<IdentitySource>,
}

impl Default for IdentityChain {
    fn default() -> Self {
        Self::new(vec![
            IdentitySource::Attribute("data-id".to_owned()),
            IdentitySource::Attribute("data-testid".to_owned()),
            IdentitySource::DomId,
        ])
    }
}

impl IdentityChain {
    /// Build a chain from sources in priority order.
    #[must_use]
    pub fn new(sources: Vec<IdentitySource>) -> Self {
        Self { sources }
    }

    /// Sources in priority order.
    #[must_use]
    pub fn sources(&self) -> &[IdentitySource] {
        &self.sources
    }

    /// Resolve the identity key for an element whose rect is already known.
    pub fn key_for<H: DomHost>(&self, host: &H, element: &H::Element, rect: &ElementRect) -> String {
        self.sources
            .iter()
            .find_map(|source| source.resolve(host, element))
            .unwrap_or_else(|| geometry_key(rect))
    }
}

/// Key synthesized from rounded geometry: `left:top:width:height`.
#[must_use]
pub fn geometry_key(rect: &ElementRect) -> String {
    format!(
        "{}:{}:{}:{}",
        round_half_up(rect.left),
        round_half_up(rect.top),
        round_half_up(rect.width),
        round_half_up(rect.height)
    )
}

// Browser rounding: halves go toward positive infinity (-2.5 -> -2).
fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// An element's identity and geometry at one moment.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSignature<E> {
    /// Best-effort identity that survives re-renders.
    pub identity_key: String,
    /// Bounding box when the signature was taken.
    pub rect: ElementRect,
    /// Handle to the node the signature was taken from.
    pub element: E,
}

/// Snapshot an element. Returns `None` when there is no element.
///
/// Geometry is read from the host on every call; signatures must be rebuilt
/// whenever a fresh position is needed.
pub fn build_signature<H: DomHost>(
    host: &H,
    chain: &IdentityChain,
    element: Option<&H::Element>,
) -> Option<ElementSignature<H::Element>> {
    let element = element?;
    let rect = host.bounding_rect(element);
    Some(ElementSignature {
        identity_key: chain.key_for(host, element, &rect),
        rect,
        element: element.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::FakeDocument;

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn absent_element_has_no_signature() {
        let doc = FakeDocument::new();
        assert_eq!(build_signature(&doc, &IdentityChain::default(), None), None);
    }

    #[test]
    fn explicit_identifiers_win_in_order() {
        let doc = FakeDocument::new();
        let el = doc.insert(ElementRect::new(1.0, 2.0, 3.0, 4.0));
        doc.set_attribute(el, "id", "dom-7");
        doc.set_attribute(el, "data-testid", "shape");
        doc.set_attribute(el, "data-id", "LBx9");
        let chain = IdentityChain::default();

        let sig = build_signature(&doc, &chain, Some(&el)).unwrap();
        assert_eq!(sig.identity_key, "LBx9");

        doc.remove_attribute(el, "data-id");
        let sig = build_signature(&doc, &chain, Some(&el)).unwrap();
        assert_eq!(sig.identity_key, "shape");

        doc.remove_attribute(el, "data-testid");
        let sig = build_signature(&doc, &chain, Some(&el)).unwrap();
        assert_eq!(sig.identity_key, "dom-7");
    }

    #[test]
    fn empty_values_fall_through() {
        let doc = FakeDocument::new();
        let el = doc.insert(ElementRect::new(10.4, 20.5, 30.0, 40.6));
        doc.set_attribute(el, "data-id", "");
        doc.set_attribute(el, "id", "");

        let sig = build_signature(&doc, &IdentityChain::default(), Some(&el)).unwrap();
        assert_eq!(sig.identity_key, "10:21:30:41");
        assert_eq!(sig.rect, ElementRect::new(10.4, 20.5, 30.0, 40.6));
        assert_eq!(sig.element, el);
    }

    #[test]
    fn negative_halves_round_toward_positive_infinity() {
        let rect = ElementRect::new(-2.5, -0.5, 0.5, 1.49);
        assert_eq!(geometry_key(&rect), "-2:0:1:1");
    }

    #[test]
    fn signatures_read_geometry_fresh() {
        let doc = FakeDocument::new();
        let el = doc.insert(ElementRect::new(0.0, 0.0, 10.0, 10.0));
        doc.set_attribute(el, "data-id", "a");
        let chain = IdentityChain::default();

        let before = build_signature(&doc, &chain, Some(&el)).unwrap();
        doc.set_rect(el, ElementRect::new(5.0, 5.0, 10.0, 10.0));
        let after = build_signature(&doc, &chain, Some(&el)).unwrap();

        assert_eq!(before.identity_key, after.identity_key);
        assert_eq!(after.rect.left, 5.0);
    }

    #[test]
    fn custom_chain() {
        let doc = FakeDocument::new();
        let el = doc.insert(ElementRect::new(0.0, 0.0, 1.0, 1.0));
        doc.set_attribute(el, "data-id", "ignored");
        doc.set_attribute(el, "data-node", "n1");
        let chain = IdentityChain::new(vec![IdentitySource::Attribute("data-node".into())]);

        let sig = build_signature(&doc, &chain, Some(&el)).unwrap();
        assert_eq!(sig.identity_key, "n1");
    }

    proptest! {
        #[test]
        fn geometry_key_ignores_subpixel_jitter(
            left in -2000i32..2000,
            top in -2000i32..2000,
            jitter in -0.49f64..0.49,
        ) {
            let base = ElementRect::new(f64::from(left), f64::from(top), 80.0, 60.0);
            let jittered = base.translated(jitter, jitter);
            prop_assert_eq!(geometry_key(&base), geometry_key(&jittered));
        }
    }
}
