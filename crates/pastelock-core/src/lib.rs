#![forbid(unsafe_code)]

//! `pastelock-core` keeps pasted canvas elements where their source was.
//!
//! Design goals:
//! - **Host-driven I/O**: the embedding environment reports clipboard gestures
//!   and document mutations, and exposes the document through [`DomHost`].
//! - **Deterministic time**: the controller never owns a timer. It emits
//!   [`TimerCommand`]s and the host reports back when a timer fires.
//! - **Fail-soft**: every failure path degrades to a no-op and a `tracing`
//!   event. The host page must behave exactly as if nothing were installed.
//!
//! The crate does not bind to `wasm-bindgen`. `pastelock-web` wraps it for
//! browsers, and the `sim` module (feature `test-helpers`) drives it with an
//! in-memory document and virtual time.

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod host;
pub mod locator;
pub mod signature;
pub mod transform;

#[cfg(any(test, feature = "test-helpers"))]
pub mod sim;

pub use bridge::{ActivationPolicy, ClipboardIntent, EventBridge, HostSignal, KeyChord, Modifiers};
pub use config::{AlignConfig, PasteLockConfig};
pub use controller::{
    AlignController, AlignOutcome, ControllerState, ControllerStep, TimerCommand, TimerId,
};
pub use error::{ConfigError, HostError};
pub use geometry::ElementRect;
pub use host::DomHost;
pub use locator::SelectionLocator;
pub use signature::{ElementSignature, IdentityChain, IdentitySource, build_signature};
pub use transform::{LinearPart, TransformDescriptor, move_by_delta};
