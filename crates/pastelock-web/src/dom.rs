#![forbid(unsafe_code)]

//! [`DomHost`] over the live document.

use pastelock_core::{DomHost, ElementRect, HostError};
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement, Window};

/// The page's document, as seen by the alignment core.
#[derive(Debug, Clone)]
pub struct WebDocument {
    window: Window,
    document: Document,
}

impl WebDocument {
    /// Bind to the window's document, if it has one.
    #[must_use]
    pub fn from_window(window: Window) -> Option<Self> {
        let document = window.document()?;
        Some(Self { window, document })
    }

    pub(crate) fn document(&self) -> &Document {
        &self.document
    }
}

impl DomHost for WebDocument {
    type Element = HtmlElement;

    fn query_all(&self, selector: &str) -> Vec<HtmlElement> {
        let Ok(list) = self.document.query_selector_all(selector) else {
            tracing::trace!(selector, "selector rejected by the document");
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<HtmlElement>().ok())
            .collect()
    }

    fn bounding_rect(&self, element: &HtmlElement) -> ElementRect {
        let rect = element.get_bounding_client_rect();
        ElementRect::new(rect.x(), rect.y(), rect.width(), rect.height())
    }

    fn attribute(&self, element: &HtmlElement, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn element_id(&self, element: &HtmlElement) -> Option<String> {
        Some(element.id()).filter(|id| !id.is_empty())
    }

    fn computed_transform(&self, element: &HtmlElement) -> Option<String> {
        self.window
            .get_computed_style(element)
            .ok()
            .flatten()
            .and_then(|style| style.get_property_value("transform").ok())
    }

    fn set_inline_transform(&self, element: &HtmlElement, value: &str) -> Result<(), HostError> {
        if !element.is_connected() {
            return Err(HostError::Detached);
        }
        element
            .style()
            .set_property("transform", value)
            .map_err(|err| HostError::StyleWrite(format!("{err:?}")))
    }
}
