#![forbid(unsafe_code)]

//! The document seam.
//!
//! Everything the heuristics need from the page goes through [`DomHost`], so
//! the same locator, codec, and controller run against `web-sys` in the
//! browser and against [`crate::sim::FakeDocument`] in tests.

use core::fmt::Debug;

use crate::error::HostError;
use crate::geometry::ElementRect;

/// Read/write access to the live document.
///
/// Implementations must read geometry and styles fresh on every call. The
/// host page re-renders on its own schedule and any cached value is stale by
/// the next tick.
pub trait DomHost {
    /// A non-owning handle to a live element. Equality is node identity.
    type Element: Clone + PartialEq + Debug;

    /// All elements matching a CSS selector, in document order.
    ///
    /// Only elements that can carry an inline style are returned.
    fn query_all(&self, selector: &str) -> Vec<Self::Element>;

    /// Current viewport-relative bounding box.
    fn bounding_rect(&self, element: &Self::Element) -> ElementRect;

    /// Attribute value, if present.
    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    /// The element's DOM id. An empty id is reported as `None`.
    fn element_id(&self, element: &Self::Element) -> Option<String>;

    /// The fully resolved `transform` value, including stylesheet rules.
    fn computed_transform(&self, element: &Self::Element) -> Option<String>;

    /// Overwrite the element's inline `transform` style.
    fn set_inline_transform(&self, element: &Self::Element, value: &str) -> Result<(), HostError>;
}
