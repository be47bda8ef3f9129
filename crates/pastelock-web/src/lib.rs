#![forbid(unsafe_code)]

//! `pastelock-web` is the script a browser extension injects into the editor.
//!
//! It binds [`pastelock_core`] to the live page:
//! - a `web-sys` [`DomHost`](pastelock_core::DomHost) over the document,
//! - capture-phase `keydown`/`copy`/`paste` listeners and a subtree
//!   `MutationObserver`,
//! - `setTimeout`/`setInterval` for the controller's timer commands.
//!
//! On non-wasm targets only the platform-independent pieces build, which keeps
//! them testable natively.

pub mod console_sink;

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use dom::WebDocument;
#[cfg(target_arch = "wasm32")]
pub use wasm::{configure, reset, start};
