#![forbid(unsafe_code)]

//! Page runtime: listeners, mutation observer, and timer execution.
//!
//! The core never touches the clock. Every [`ControllerStep`] it returns is
//! executed here by mapping [`TimerCommand`]s onto `setTimeout` and
//! `setInterval`. Callbacks hold a weak handle to the runtime; the runtime
//! itself lives in a thread-local for the lifetime of the page.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use pastelock_core::bridge::OBSERVED_ATTRIBUTES;
use pastelock_core::{
    ControllerStep, EventBridge, HostError, HostSignal, KeyChord, Modifiers, PasteLockConfig,
    TimerCommand, TimerId,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Event, EventTarget, HtmlElement, KeyboardEvent, MutationObserver, MutationObserverInit, Window};

use crate::console_sink::{ConsoleSink, LOG_PREFIX};
use crate::dom::WebDocument;

/// Flip to route `tracing` output to the browser console.
const DIAGNOSTICS: bool = false;

thread_local! {
    static RUNTIME: RefCell<Option<Rc<Runtime>>> = const { RefCell::new(None) };
}

struct ArmedTimer {
    handle: i32,
    repeating: bool,
    callback: Closure<dyn FnMut()>,
}

struct Runtime {
    window: Window,
    host: WebDocument,
    bridge: RefCell<EventBridge<HtmlElement>>,
    timers: RefCell<HashMap<TimerId, ArmedTimer>>,
    /// Callbacks that may still be on the stack; dropped on the next entry.
    retired: RefCell<Vec<Closure<dyn FnMut()>>>,
    // Held so the observer outlives `install`.
    _observer: RefCell<Option<MutationObserver>>,
}

impl Runtime {
    fn new(window: Window, host: WebDocument, config: &PasteLockConfig) -> Self {
        Self {
            window,
            host,
            bridge: RefCell::new(EventBridge::new(config)),
            timers: RefCell::new(HashMap::new()),
            retired: RefCell::new(Vec::new()),
            _observer: RefCell::new(None),
        }
    }

    fn sweep_retired(&self) {
        if let Ok(mut retired) = self.retired.try_borrow_mut() {
            retired.clear();
        }
    }

    fn dispatch(self: &Rc<Self>, signal: &HostSignal) {
        self.sweep_retired();
        let step = match self.bridge.try_borrow_mut() {
            Ok(mut bridge) => bridge.dispatch(&self.host, signal),
            Err(_) => {
                tracing::trace!(?signal, "re-entrant signal dropped");
                return;
            }
        };
        self.execute(step);
    }

    fn fire(self: &Rc<Self>, id: TimerId) {
        self.sweep_retired();
        let finished = {
            let mut timers = self.timers.borrow_mut();
            match timers.get(&id) {
                Some(timer) if !timer.repeating => timers.remove(&id),
                _ => None,
            }
        };
        if let Some(timer) = finished {
            self.retired.borrow_mut().push(timer.callback);
        }

        let step = match self.bridge.try_borrow_mut() {
            Ok(mut bridge) => bridge.on_timer(&self.host, id),
            Err(_) => return,
        };
        self.execute(step);
    }

    fn reconfigure(&self, config: &PasteLockConfig) {
        match self.bridge.try_borrow_mut() {
            Ok(mut bridge) => bridge.controller_mut().reconfigure(config),
            Err(_) => tracing::warn!("configuration skipped while a signal was in flight"),
        }
    }

    fn execute(self: &Rc<Self>, step: ControllerStep) {
        for command in step.commands {
            match command {
                TimerCommand::Once { id, delay } => self.arm(id, delay, false),
                TimerCommand::Repeat { id, interval } => self.arm(id, interval, true),
                TimerCommand::Cancel { id } => self.disarm(id),
            }
        }
        if let Some(outcome) = step.outcome {
            tracing::debug!(?outcome, "cycle outcome");
        }
    }

    fn arm(self: &Rc<Self>, id: TimerId, delay: Duration, repeating: bool) {
        let weak: Weak<Self> = Rc::downgrade(self);
        let callback = Closure::<dyn FnMut()>::new(move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.fire(id);
            }
        });
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let function = callback.as_ref().unchecked_ref();
        let armed = if repeating {
            self.window
                .set_interval_with_callback_and_timeout_and_arguments_0(function, millis)
        } else {
            self.window
                .set_timeout_with_callback_and_timeout_and_arguments_0(function, millis)
        };
        match armed {
            Ok(handle) => {
                let timer = ArmedTimer {
                    handle,
                    repeating,
                    callback,
                };
                if let Some(previous) = self.timers.borrow_mut().insert(id, timer) {
                    self.clear(&previous);
                    self.retired.borrow_mut().push(previous.callback);
                }
            }
            Err(err) => tracing::warn!(timer = id.get(), ?err, "failed to arm timer"),
        }
    }

    fn disarm(&self, id: TimerId) {
        let removed = self.timers.borrow_mut().remove(&id);
        if let Some(timer) = removed {
            self.clear(&timer);
            self.retired.borrow_mut().push(timer.callback);
        }
    }

    fn clear(&self, timer: &ArmedTimer) {
        if timer.repeating {
            self.window.clear_interval_with_handle(timer.handle);
        } else {
            self.window.clear_timeout_with_handle(timer.handle);
        }
    }
}

fn chord_from(event: &KeyboardEvent) -> KeyChord {
    KeyChord::new(
        event.key(),
        Modifiers::from_dom(
            event.shift_key(),
            event.alt_key(),
            event.ctrl_key(),
            event.meta_key(),
        ),
    )
}

fn keydown_signal(event: &Event) -> Option<HostSignal> {
    event
        .dyn_ref::<KeyboardEvent>()
        .map(|key| HostSignal::KeyDown(chord_from(key)))
}

fn listen(
    runtime: &Rc<Runtime>,
    target: &EventTarget,
    kind: &str,
    capture: bool,
    to_signal: fn(&Event) -> Option<HostSignal>,
) -> Result<(), HostError> {
    let weak = Rc::downgrade(runtime);
    let callback = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
        let Some(signal) = to_signal(&event) else {
            return;
        };
        if let Some(runtime) = weak.upgrade() {
            runtime.dispatch(&signal);
        }
    });
    target
        .add_event_listener_with_callback_and_bool(kind, callback.as_ref().unchecked_ref(), capture)
        .map_err(|err| HostError::Registration(format!("{kind}: {err:?}")))?;
    callback.forget();
    Ok(())
}

fn observe_mutations(runtime: &Rc<Runtime>) -> Result<(), HostError> {
    let root = runtime
        .host
        .document()
        .document_element()
        .ok_or(HostError::Unavailable("documentElement"))?;

    let weak = Rc::downgrade(runtime);
    let callback = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |_records: JsValue, _observer: JsValue| {
        if let Some(runtime) = weak.upgrade() {
            runtime.dispatch(&HostSignal::Mutation);
        }
    });
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
        .map_err(|err| HostError::Registration(format!("MutationObserver: {err:?}")))?;

    let filter = js_sys::Array::new();
    for name in OBSERVED_ATTRIBUTES {
        filter.push(&JsValue::from_str(name));
    }
    let options = MutationObserverInit::new();
    options.set_child_list(true);
    options.set_subtree(true);
    options.set_attributes(true);
    options.set_attribute_filter(&filter);

    observer
        .observe_with_options(&root, &options)
        .map_err(|err| HostError::Registration(format!("observe: {err:?}")))?;
    callback.forget();
    *runtime._observer.borrow_mut() = Some(observer);
    Ok(())
}

fn install_diagnostics() {
    let _ = tracing_subscriber::fmt()
        .with_writer(|| {
            ConsoleSink::new(LOG_PREFIX, |line: &str| {
                web_sys::console::log_1(&JsValue::from_str(line));
            })
        })
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .without_time()
        .try_init();
}

fn install(config: &PasteLockConfig) -> Result<bool, HostError> {
    let window = web_sys::window().ok_or(HostError::Unavailable("window"))?;
    let hostname = window
        .location()
        .hostname()
        .map_err(|_| HostError::Unavailable("location.hostname"))?;
    if !config.activation.allows(&hostname) {
        tracing::debug!(%hostname, "host not allowed; staying inactive");
        return Ok(false);
    }

    let host = WebDocument::from_window(window.clone()).ok_or(HostError::Unavailable("document"))?;
    let document = host.document().clone();
    let runtime = Rc::new(Runtime::new(window.clone(), host, config));

    listen(&runtime, &document, "keydown", true, keydown_signal)?;
    listen(&runtime, &document, "copy", true, |_| Some(HostSignal::Copy))?;
    listen(&runtime, &document, "paste", true, |_| Some(HostSignal::Paste))?;
    listen(&runtime, &window, "popstate", false, |_| {
        Some(HostSignal::Navigation)
    })?;
    observe_mutations(&runtime)?;

    RUNTIME.with(|slot| *slot.borrow_mut() = Some(runtime));
    tracing::debug!("extension initialized");
    Ok(true)
}

fn current() -> Option<Rc<Runtime>> {
    RUNTIME.with(|slot| slot.borrow().clone())
}

/// Entry point run when the module is instantiated.
#[wasm_bindgen(start)]
pub fn start() {
    if DIAGNOSTICS {
        install_diagnostics();
    }
    if current().is_some() {
        return;
    }
    if let Err(err) = install(&PasteLockConfig::default()) {
        tracing::warn!(%err, "failed to install listeners");
    }
}

/// Replace the tunables from a JSON document.
///
/// Omitted keys keep their defaults. Invalid documents leave the running
/// configuration untouched and surface as a thrown error.
#[wasm_bindgen]
pub fn configure(json: &str) -> Result<(), JsValue> {
    let config = PasteLockConfig::from_json_str(json).map_err(|err| JsValue::from_str(&err.to_string()))?;
    if let Some(runtime) = current() {
        runtime.reconfigure(&config);
    }
    Ok(())
}

/// Drop the captured source and any pending cycle.
#[wasm_bindgen]
pub fn reset() {
    if let Some(runtime) = current() {
        runtime.dispatch(&HostSignal::Navigation);
    }
}
