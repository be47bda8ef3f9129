#![forbid(unsafe_code)]

//! Copy capture and paste alignment.
//!
//! The controller is a small state machine over [`ControllerState`]:
//!
//! - **Idle** → copy gesture: snapshot the selection into `copied`.
//! - **Idle** → paste gesture: set `paste_pending`, arm a short settle timer.
//! - **Settling** → settle timer: start a repeating poll timer.
//! - **Polling** → poll timer or document mutation: look for the pasted
//!   element. Once found it is either already in place or gets exactly one
//!   corrective move, and the cycle ends. Running out of attempts also ends
//!   the cycle, without touching the page.
//!
//! Timers are owned by the host. Every entry point returns the
//! [`TimerCommand`]s the host must execute, and the host calls
//! [`AlignController::on_timer`] when one fires. Timers from finished or
//! superseded cycles are ignored, so late or duplicate callbacks are harmless.

use core::fmt::Debug;
use core::time::Duration;

use crate::config::{AlignConfig, PasteLockConfig};
use crate::host::DomHost;
use crate::locator::SelectionLocator;
use crate::signature::{ElementSignature, IdentityChain, build_signature};
use crate::transform::move_by_delta;

/// Opaque handle for a host timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Rebuild an id from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id, for host-side bookkeeping.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Timer work the host must perform on the controller's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Fire `id` once after `delay`.
    Once { id: TimerId, delay: Duration },
    /// Fire `id` every `interval` until cancelled.
    Repeat { id: TimerId, interval: Duration },
    /// Stop `id`. Unknown or already-fired ids are fine.
    Cancel { id: TimerId },
}

/// How an alignment cycle ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignOutcome {
    /// The pasted element was moved by `(dx, dy)`.
    Corrected { dx: f64, dy: f64 },
    /// The pasted element was already within tolerance of the source.
    AlreadyAligned { dx: f64, dy: f64 },
    /// No pasted element showed up within the attempt budget.
    Exhausted { attempts: u32 },
    /// Nothing was copied, so there is no position to restore.
    NoCapture,
    /// A target was found but the move was refused.
    MoveRejected { dx: f64, dy: f64 },
}

/// Result of one controller entry point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerStep {
    /// Timer work for the host, in order.
    pub commands: Vec<TimerCommand>,
    /// Set when this step ended an alignment cycle.
    pub outcome: Option<AlignOutcome>,
}

impl ControllerStep {
    fn commands(commands: Vec<TimerCommand>) -> Self {
        Self {
            commands,
            outcome: None,
        }
    }
}

/// Session state. One instance per loaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState<E> {
    /// The most recent copy source.
    pub copied: Option<ElementSignature<E>>,
    /// True from a paste gesture until its cycle ends.
    pub paste_pending: bool,
    /// Most recently observed selection. Diagnostic only.
    pub last_known_selection: Option<ElementSignature<E>>,
}

impl<E> Default for ControllerState<E> {
    fn default() -> Self {
        Self {
            copied: None,
            paste_pending: false,
            last_known_selection: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CyclePhase {
    Settling { timer: TimerId },
    Polling { timer: TimerId, attempts: u32 },
}

impl CyclePhase {
    const fn timer(self) -> TimerId {
        match self {
            Self::Settling { timer } | Self::Polling { timer, .. } => timer,
        }
    }
}

/// Capture/align state machine.
#[derive(Debug, Clone)]
pub struct AlignController<E> {
    config: AlignConfig,
    locator: SelectionLocator,
    identity: IdentityChain,
    state: ControllerState<E>,
    cycle: Option<CyclePhase>,
    next_timer: u64,
}

impl<E: Clone + PartialEq + Debug> AlignController<E> {
    /// Build a controller from the full configuration.
    #[must_use]
    pub fn new(config: &PasteLockConfig) -> Self {
        Self::with_parts(
            config.align.clone(),
            config.locator(),
            config.identity_chain(),
        )
    }

    /// Build a controller from explicit parts.
    #[must_use]
    pub fn with_parts(config: AlignConfig, locator: SelectionLocator, identity: IdentityChain) -> Self {
        Self {
            config,
            locator,
            identity,
            state: ControllerState::default(),
            cycle: None,
            next_timer: 1,
        }
    }

    /// Swap tunables. Session state and any running cycle are kept.
    pub fn reconfigure(&mut self, config: &PasteLockConfig) {
        self.config = config.align.clone();
        self.locator = config.locator();
        self.identity = config.identity_chain();
    }

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> &ControllerState<E> {
        &self.state
    }

    /// Alignment tunables.
    #[must_use]
    pub const fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Whether a poll timer is running.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        matches!(self.cycle, Some(CyclePhase::Polling { .. }))
    }

    /// Snapshot the current selection as the copy source.
    ///
    /// With nothing selected the previous capture is dropped, so a later
    /// paste will not align against an unrelated element.
    pub fn capture<H: DomHost<Element = E>>(&mut self, host: &H) -> ControllerStep {
        let selected = self.locator.locate(host);
        match build_signature(host, &self.identity, selected.as_ref()) {
            Some(signature) => {
                tracing::debug!(
                    key = %signature.identity_key,
                    left = signature.rect.left,
                    top = signature.rect.top,
                    "captured copy source"
                );
                self.state.last_known_selection = Some(signature.clone());
                self.state.copied = Some(signature);
            }
            None => {
                tracing::debug!("copy without a visible selection");
                self.state.copied = None;
            }
        }
        ControllerStep::default()
    }

    /// Refresh `last_known_selection` from the document.
    pub fn observe_selection<H: DomHost<Element = E>>(&mut self, host: &H) {
        let selected = self.locator.locate(host);
        if let Some(signature) = build_signature(host, &self.identity, selected.as_ref()) {
            self.state.last_known_selection = Some(signature);
        }
    }

    /// Start an alignment cycle for a paste gesture.
    ///
    /// A cycle already in flight is superseded: its timer is cancelled and
    /// its callbacks become no-ops.
    pub fn begin_paste(&mut self) -> ControllerStep {
        let mut commands = self.cancel_cycle();
        let timer = self.alloc_timer();
        self.state.paste_pending = true;
        self.cycle = Some(CyclePhase::Settling { timer });
        commands.push(TimerCommand::Once {
            id: timer,
            delay: self.config.paste_settle(),
        });
        tracing::debug!(timer = timer.get(), "paste pending");
        ControllerStep::commands(commands)
    }

    /// A host timer fired.
    pub fn on_timer<H: DomHost<Element = E>>(&mut self, host: &H, id: TimerId) -> ControllerStep {
        match self.cycle {
            Some(CyclePhase::Settling { timer }) if timer == id => {
                if self.state.copied.is_none() {
                    return self.finish(AlignOutcome::NoCapture);
                }
                let poll = self.alloc_timer();
                self.cycle = Some(CyclePhase::Polling {
                    timer: poll,
                    attempts: 0,
                });
                ControllerStep::commands(vec![TimerCommand::Repeat {
                    id: poll,
                    interval: self.config.poll_interval(),
                }])
            }
            Some(CyclePhase::Polling { timer, .. }) if timer == id => self.attempt(host, true),
            _ => {
                tracing::trace!(timer = id.get(), "ignoring stale timer");
                ControllerStep::default()
            }
        }
    }

    /// The document mutated.
    ///
    /// While a paste is pending this runs one extra attempt right away, so
    /// alignment follows the editor's own rendering instead of waiting for
    /// the next poll. Extra attempts do not consume the budget.
    pub fn on_mutation<H: DomHost<Element = E>>(&mut self, host: &H) -> ControllerStep {
        self.observe_selection(host);
        if self.state.paste_pending && self.cycle.is_some() {
            self.attempt(host, false)
        } else {
            ControllerStep::default()
        }
    }

    /// The selection that looks like a freshly pasted element, if any.
    ///
    /// Side-effect free and safe to call any number of times. A selection is
    /// the pasted target when nothing was copied, when its identity key
    /// differs from the copy source, or when it sits more than
    /// `move_threshold_px` away from it.
    pub fn evaluate<H: DomHost<Element = E>>(&self, host: &H) -> Option<ElementSignature<E>> {
        let selected = self.locator.locate(host);
        let current = build_signature(host, &self.identity, selected.as_ref())?;
        let Some(copied) = &self.state.copied else {
            return Some(current);
        };
        if current.identity_key != copied.identity_key {
            return Some(current);
        }
        if copied.rect.manhattan_distance(&current.rect) > self.config.move_threshold_px {
            return Some(current);
        }
        None
    }

    /// Forget everything and stop any running cycle.
    pub fn reset(&mut self) -> ControllerStep {
        let commands = self.cancel_cycle();
        self.state = ControllerState::default();
        tracing::debug!("controller reset");
        ControllerStep::commands(commands)
    }

    fn attempt<H: DomHost<Element = E>>(&mut self, host: &H, counted: bool) -> ControllerStep {
        let Some(source) = self.state.copied.as_ref().map(|copied| copied.rect) else {
            return self.finish(AlignOutcome::NoCapture);
        };

        let attempts = match &mut self.cycle {
            Some(CyclePhase::Polling { attempts, .. }) if counted => {
                *attempts += 1;
                *attempts
            }
            _ => 0,
        };

        let Some(target) = self.evaluate(host) else {
            tracing::trace!(attempts, counted, "no pasted target yet");
            if counted && attempts >= self.config.max_attempts {
                return self.finish(AlignOutcome::Exhausted { attempts });
            }
            return ControllerStep::default();
        };

        let dx = source.left - target.rect.left;
        let dy = source.top - target.rect.top;
        let tolerance = self.config.aligned_tolerance_px;
        if dx.abs() < tolerance && dy.abs() < tolerance {
            return self.finish(AlignOutcome::AlreadyAligned { dx, dy });
        }

        if move_by_delta(host, Some(&target.element), dx, dy) {
            if self.config.clear_capture_after_paste {
                self.state.copied = None;
            }
            self.finish(AlignOutcome::Corrected { dx, dy })
        } else {
            self.finish(AlignOutcome::MoveRejected { dx, dy })
        }
    }

    fn finish(&mut self, outcome: AlignOutcome) -> ControllerStep {
        let commands = self.cancel_cycle();
        tracing::debug!(?outcome, "alignment cycle finished");
        ControllerStep {
            commands,
            outcome: Some(outcome),
        }
    }

    fn cancel_cycle(&mut self) -> Vec<TimerCommand> {
        self.state.paste_pending = false;
        self.cycle
            .take()
            .map(|phase| TimerCommand::Cancel { id: phase.timer() })
            .into_iter()
            .collect()
    }

    fn alloc_timer(&mut self) -> TimerId {
        let id = TimerId(self.next_timer);
        self.next_timer = self.next_timer.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ElementRect;
    use crate::sim::{FakeDocument, FakeElement};

    use pretty_assertions::assert_eq;

    fn controller() -> AlignController<FakeElement> {
        AlignController::new(&PasteLockConfig::default())
    }

    fn selected(doc: &FakeDocument, rect: ElementRect, id: &str) -> FakeElement {
        let el = doc.insert(rect);
        doc.set_attribute(el, "aria-selected", "true");
        doc.set_attribute(el, "data-id", id);
        el
    }

    fn settle_timer(step: &ControllerStep) -> TimerId {
        match step.commands.last() {
            Some(TimerCommand::Once { id, .. }) => *id,
            other => panic!("expected settle timer, got {other:?}"),
        }
    }

    #[test]
    fn capture_records_selection_without_pending() {
        let doc = FakeDocument::new();
        let el = selected(&doc, ElementRect::new(10.0, 20.0, 30.0, 40.0), "a");
        let mut ctl = controller();

        let step = ctl.capture(&doc);

        assert_eq!(step, ControllerStep::default());
        let copied = ctl.state().copied.as_ref().unwrap();
        assert_eq!(copied.element, el);
        assert_eq!(copied.identity_key, "a");
        assert_eq!(ctl.state().last_known_selection, ctl.state().copied);
        assert!(!ctl.state().paste_pending);
    }

    #[test]
    fn capture_without_selection_clears_previous_capture() {
        let doc = FakeDocument::new();
        let el = selected(&doc, ElementRect::new(0.0, 0.0, 10.0, 10.0), "a");
        let mut ctl = controller();
        ctl.capture(&doc);

        doc.remove_attribute(el, "aria-selected");
        ctl.capture(&doc);

        assert_eq!(ctl.state().copied, None);
        assert!(ctl.state().last_known_selection.is_some());
    }

    #[test]
    fn paste_arms_settle_then_poll() {
        let doc = FakeDocument::new();
        selected(&doc, ElementRect::new(0.0, 0.0, 10.0, 10.0), "a");
        let mut ctl = controller();
        ctl.capture(&doc);

        let step = ctl.begin_paste();
        let settle = settle_timer(&step);
        assert_eq!(
            step.commands,
            vec![TimerCommand::Once {
                id: settle,
                delay: Duration::from_millis(20)
            }]
        );
        assert!(ctl.state().paste_pending);

        let step = ctl.on_timer(&doc, settle);
        assert!(matches!(
            step.commands.as_slice(),
            [TimerCommand::Repeat { interval, .. }] if *interval == Duration::from_millis(60)
        ));
        assert!(ctl.is_polling());
    }

    #[test]
    fn second_paste_supersedes_first_cycle() {
        let doc = FakeDocument::new();
        selected(&doc, ElementRect::new(0.0, 0.0, 10.0, 10.0), "a");
        let mut ctl = controller();
        ctl.capture(&doc);

        let first = settle_timer(&ctl.begin_paste());
        let step = ctl.begin_paste();
        let second = settle_timer(&step);

        assert_eq!(step.commands[0], TimerCommand::Cancel { id: first });
        assert_eq!(ctl.on_timer(&doc, first), ControllerStep::default());
        assert_ne!(ctl.on_timer(&doc, second), ControllerStep::default());
    }

    #[test]
    fn paste_without_capture_ends_at_settle() {
        let doc = FakeDocument::new();
        selected(&doc, ElementRect::new(0.0, 0.0, 10.0, 10.0), "a");
        let mut ctl = controller();

        let settle = settle_timer(&ctl.begin_paste());
        let step = ctl.on_timer(&doc, settle);

        assert_eq!(step.outcome, Some(AlignOutcome::NoCapture));
        assert!(!ctl.state().paste_pending);
        assert!(doc.writes().is_empty());
    }

    #[test]
    fn evaluate_distinguishes_pasted_selection() {
        let doc = FakeDocument::new();
        let source = selected(&doc, ElementRect::new(100.0, 100.0, 50.0, 50.0), "a");
        let mut ctl = controller();
        assert!(ctl.evaluate(&doc).is_some(), "no capture: any selection");

        ctl.capture(&doc);
        assert_eq!(ctl.evaluate(&doc), None, "same key, same place");

        doc.set_rect(source, ElementRect::new(101.0, 101.0, 50.0, 50.0));
        assert_eq!(ctl.evaluate(&doc), None, "within move threshold");

        doc.set_rect(source, ElementRect::new(102.0, 101.0, 50.0, 50.0));
        assert!(ctl.evaluate(&doc).is_some(), "moved past threshold");

        doc.set_rect(source, ElementRect::new(100.0, 100.0, 50.0, 50.0));
        doc.set_attribute(source, "data-id", "b");
        assert!(ctl.evaluate(&doc).is_some(), "different identity");
    }

    #[test]
    fn mutation_while_pending_corrects_immediately() {
        let doc = FakeDocument::new();
        let source = selected(&doc, ElementRect::new(100.0, 100.0, 50.0, 50.0), "a");
        let mut ctl = controller();
        ctl.capture(&doc);
        let settle = settle_timer(&ctl.begin_paste());

        doc.remove_attribute(source, "aria-selected");
        let pasted = selected(&doc, ElementRect::new(130.0, 90.0, 50.0, 50.0), "b");
        let step = ctl.on_mutation(&doc);

        assert_eq!(
            step.outcome,
            Some(AlignOutcome::Corrected {
                dx: -30.0,
                dy: 10.0
            })
        );
        assert_eq!(step.commands, vec![TimerCommand::Cancel { id: settle }]);
        assert_eq!(
            doc.inline_transform(pasted).as_deref(),
            Some("translate(-30px, 10px)")
        );
        assert!(!ctl.state().paste_pending);
        assert_eq!(ctl.state().last_known_selection.as_ref().unwrap().element, pasted);
    }

    #[test]
    fn mutation_when_idle_only_refreshes_selection() {
        let doc = FakeDocument::new();
        let el = selected(&doc, ElementRect::new(0.0, 0.0, 10.0, 10.0), "a");
        let mut ctl = controller();

        assert_eq!(ctl.on_mutation(&doc), ControllerStep::default());
        assert_eq!(ctl.state().last_known_selection.as_ref().unwrap().element, el);
        assert_eq!(ctl.state().copied, None);
    }

    #[test]
    fn clear_capture_after_paste_forgets_source() {
        let doc = FakeDocument::new();
        let source = selected(&doc, ElementRect::new(0.0, 0.0, 10.0, 10.0), "a");
        let mut config = PasteLockConfig::default();
        config.align.clear_capture_after_paste = true;
        let mut ctl = AlignController::new(&config);
        ctl.capture(&doc);
        ctl.begin_paste();

        doc.set_attribute(source, "data-id", "b");
        doc.set_rect(source, ElementRect::new(40.0, 0.0, 10.0, 10.0));
        let step = ctl.on_mutation(&doc);

        assert!(matches!(step.outcome, Some(AlignOutcome::Corrected { .. })));
        assert_eq!(ctl.state().copied, None);
    }

    #[test]
    fn rejected_write_is_reported() {
        let doc = FakeDocument::new();
        let source = selected(&doc, ElementRect::new(0.0, 0.0, 10.0, 10.0), "a");
        let mut ctl = controller();
        ctl.capture(&doc);
        ctl.begin_paste();
        doc.reject_style_writes(true);

        doc.set_rect(source, ElementRect::new(0.0, 25.0, 10.0, 10.0));
        let step = ctl.on_mutation(&doc);

        assert_eq!(
            step.outcome,
            Some(AlignOutcome::MoveRejected { dx: 0.0, dy: -25.0 })
        );
        assert!(!ctl.state().paste_pending);
    }

    #[test]
    fn reset_cancels_and_clears() {
        let doc = FakeDocument::new();
        selected(&doc, ElementRect::new(0.0, 0.0, 10.0, 10.0), "a");
        let mut ctl = controller();
        ctl.capture(&doc);
        let settle = settle_timer(&ctl.begin_paste());

        let step = ctl.reset();

        assert_eq!(step.commands, vec![TimerCommand::Cancel { id: settle }]);
        assert_eq!(ctl.state(), &ControllerState::default());
        assert_eq!(ctl.on_timer(&doc, settle), ControllerStep::default());
    }
}
