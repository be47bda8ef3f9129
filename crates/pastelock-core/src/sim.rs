#![forbid(unsafe_code)]

//! Deterministic simulation: an in-memory document and virtual timers.
//!
//! [`FakeDocument`] understands the attribute selectors the locator uses
//! (`[name='value']` and `[name*='value']`). [`VirtualTimers`] executes
//! [`TimerCommand`]s against a host-advanced clock, and [`SimSession`] wires
//! both to an [`EventBridge`] the way the browser runtime does.

use core::cell::RefCell;
use core::time::Duration;

use crate::bridge::{EventBridge, HostSignal};
use crate::config::PasteLockConfig;
use crate::controller::{AlignOutcome, ControllerState, ControllerStep, TimerCommand, TimerId};
use crate::error::HostError;
use crate::geometry::ElementRect;
use crate::host::DomHost;

/// Handle to a node in a [`FakeDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FakeElement(usize);

/// One recorded inline transform write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleWrite {
    pub element: FakeElement,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
struct FakeNode {
    attributes: Vec<(String, String)>,
    rect: ElementRect,
    stylesheet_transform: Option<String>,
    inline_transform: Option<String>,
    attached: bool,
}

impl FakeNode {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct Inner {
    nodes: Vec<FakeNode>,
    writes: Vec<StyleWrite>,
    reject_writes: bool,
}

/// In-memory document. Node order is document order.
#[derive(Debug, Default)]
pub struct FakeDocument {
    inner: RefCell<Inner>,
}

impl FakeDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attached node with the given geometry.
    pub fn insert(&self, rect: ElementRect) -> FakeElement {
        let mut inner = self.inner.borrow_mut();
        inner.nodes.push(FakeNode {
            rect,
            attached: true,
            ..FakeNode::default()
        });
        FakeElement(inner.nodes.len() - 1)
    }

    pub fn set_attribute(&self, element: FakeElement, name: &str, value: &str) {
        self.with_node(element, |node| {
            match node.attributes.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value.to_owned(),
                None => node.attributes.push((name.to_owned(), value.to_owned())),
            }
        });
    }

    pub fn remove_attribute(&self, element: FakeElement, name: &str) {
        self.with_node(element, |node| node.attributes.retain(|(n, _)| n != name));
    }

    pub fn set_rect(&self, element: FakeElement, rect: ElementRect) {
        self.with_node(element, |node| node.rect = rect);
    }

    /// Transform applied by a stylesheet rule, visible only via computed style.
    pub fn set_stylesheet_transform(&self, element: FakeElement, value: Option<&str>) {
        self.with_node(element, |node| {
            node.stylesheet_transform = value.map(str::to_owned);
        });
    }

    /// Remove a node from the document. Its handle stays valid but inert.
    pub fn detach(&self, element: FakeElement) {
        self.with_node(element, |node| node.attached = false);
    }

    /// Make every subsequent inline style write fail.
    pub fn reject_style_writes(&self, reject: bool) {
        self.inner.borrow_mut().reject_writes = reject;
    }

    /// Current inline transform of a node.
    #[must_use]
    pub fn inline_transform(&self, element: FakeElement) -> Option<String> {
        self.inner
            .borrow()
            .nodes
            .get(element.0)
            .and_then(|node| node.inline_transform.clone())
    }

    /// Every successful inline transform write, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<StyleWrite> {
        self.inner.borrow().writes.clone()
    }

    fn with_node(&self, element: FakeElement, f: impl FnOnce(&mut FakeNode)) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(element.0) {
            f(node);
        }
    }
}

/// Attribute selector forms the fake document can evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttributeSelector<'a> {
    Equals { name: &'a str, value: &'a str },
    Contains { name: &'a str, value: &'a str },
}

impl<'a> AttributeSelector<'a> {
    fn parse(selector: &'a str) -> Option<Self> {
        let body = selector.trim().strip_prefix('[')?.strip_suffix(']')?;
        let (name, value, contains) = match body.split_once("*=") {
            Some((name, value)) => (name, value, true),
            None => {
                let (name, value) = body.split_once('=')?;
                (name, value, false)
            }
        };
        let value = value
            .trim()
            .trim_matches(|c| c == '\'' || c == '"');
        let name = name.trim();
        Some(if contains {
            Self::Contains { name, value }
        } else {
            Self::Equals { name, value }
        })
    }

    fn matches(&self, node: &FakeNode) -> bool {
        match *self {
            Self::Equals { name, value } => node.attribute(name) == Some(value),
            Self::Contains { name, value } => {
                node.attribute(name).is_some_and(|v| v.contains(value))
            }
        }
    }
}

impl DomHost for FakeDocument {
    type Element = FakeElement;

    fn query_all(&self, selector: &str) -> Vec<FakeElement> {
        let Some(selector) = AttributeSelector::parse(selector) else {
            return Vec::new();
        };
        self.inner
            .borrow()
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.attached && selector.matches(node))
            .map(|(idx, _)| FakeElement(idx))
            .collect()
    }

    fn bounding_rect(&self, element: &FakeElement) -> ElementRect {
        self.inner
            .borrow()
            .nodes
            .get(element.0)
            .filter(|node| node.attached)
            .map(|node| node.rect)
            .unwrap_or_default()
    }

    fn attribute(&self, element: &FakeElement, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .nodes
            .get(element.0)
            .and_then(|node| node.attribute(name).map(str::to_owned))
    }

    fn element_id(&self, element: &FakeElement) -> Option<String> {
        self.attribute(element, "id").filter(|id| !id.is_empty())
    }

    fn computed_transform(&self, element: &FakeElement) -> Option<String> {
        let inner = self.inner.borrow();
        let node = inner.nodes.get(element.0)?;
        Some(
            node.inline_transform
                .clone()
                .or_else(|| node.stylesheet_transform.clone())
                .unwrap_or_else(|| "none".to_owned()),
        )
    }

    fn set_inline_transform(&self, element: &FakeElement, value: &str) -> Result<(), HostError> {
        let mut inner = self.inner.borrow_mut();
        if inner.reject_writes {
            return Err(HostError::StyleWrite("writes disabled".to_owned()));
        }
        let node = inner
            .nodes
            .get_mut(element.0)
            .filter(|node| node.attached)
            .ok_or(HostError::Detached)?;
        node.inline_transform = Some(value.to_owned());
        inner.writes.push(StyleWrite {
            element: *element,
            value: value.to_owned(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    id: TimerId,
    due: Duration,
    interval: Option<Duration>,
    seq: u64,
}

/// Virtual timer queue driven by explicit clock advances.
#[derive(Debug, Default, Clone)]
pub struct VirtualTimers {
    now: Duration,
    entries: Vec<TimerEntry>,
    next_seq: u64,
}

impl VirtualTimers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Number of armed timers.
    #[must_use]
    pub fn armed(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_armed(&self, id: TimerId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Execute controller timer commands.
    pub fn apply(&mut self, commands: &[TimerCommand]) {
        for command in commands {
            match *command {
                TimerCommand::Once { id, delay } => self.arm(id, delay, None),
                TimerCommand::Repeat { id, interval } => self.arm(id, interval, Some(interval)),
                TimerCommand::Cancel { id } => self.entries.retain(|entry| entry.id != id),
            }
        }
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its due time. Repeating timers are re-armed. Ties fire in arm order.
    pub fn pop_due(&mut self, until: Duration) -> Option<TimerId> {
        let (idx, entry) = self
            .entries
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, entry)| entry.due <= until)
            .min_by_key(|(_, entry)| (entry.due, entry.seq))?;
        self.now = self.now.max(entry.due);
        match entry.interval {
            Some(interval) => {
                let seq = self.bump_seq();
                self.entries[idx].due = entry.due.saturating_add(interval.max(Duration::from_millis(1)));
                self.entries[idx].seq = seq;
            }
            None => {
                self.entries.remove(idx);
            }
        }
        Some(entry.id)
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    fn arm(&mut self, id: TimerId, delay: Duration, interval: Option<Duration>) {
        self.entries.retain(|entry| entry.id != id);
        let seq = self.bump_seq();
        self.entries.push(TimerEntry {
            id,
            due: self.now.saturating_add(delay),
            interval,
            seq,
        });
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// A fake page with the bridge installed, driven through virtual time.
#[derive(Debug)]
pub struct SimSession {
    pub document: FakeDocument,
    bridge: EventBridge<FakeElement>,
    timers: VirtualTimers,
    outcomes: Vec<AlignOutcome>,
    timer_fires: usize,
}

impl SimSession {
    #[must_use]
    pub fn new(config: &PasteLockConfig) -> Self {
        Self {
            document: FakeDocument::new(),
            bridge: EventBridge::new(config),
            timers: VirtualTimers::new(),
            outcomes: Vec::new(),
            timer_fires: 0,
        }
    }

    /// Deliver a signal at the current virtual time.
    pub fn signal(&mut self, signal: HostSignal) -> Option<AlignOutcome> {
        let step = self.bridge.dispatch(&self.document, &signal);
        self.absorb(step)
    }

    /// Advance virtual time by `dt`, firing timers in due order.
    pub fn advance(&mut self, dt: Duration) -> Vec<AlignOutcome> {
        let until = self.timers.now().saturating_add(dt);
        let mut fired = Vec::new();
        while let Some(id) = self.timers.pop_due(until) {
            self.timer_fires += 1;
            let step = self.bridge.on_timer(&self.document, id);
            fired.extend(self.absorb(step));
        }
        self.timers.set_now(until);
        fired
    }

    /// Virtual time elapsed since the session started.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Session state of the controller.
    #[must_use]
    pub fn state(&self) -> &ControllerState<FakeElement> {
        self.bridge.controller().state()
    }

    /// Every cycle outcome so far.
    #[must_use]
    pub fn outcomes(&self) -> &[AlignOutcome] {
        &self.outcomes
    }

    /// Timers still armed.
    #[must_use]
    pub fn armed_timers(&self) -> usize {
        self.timers.armed()
    }

    /// How many timer callbacks have been delivered.
    #[must_use]
    pub const fn timer_fires(&self) -> usize {
        self.timer_fires
    }

    fn absorb(&mut self, step: ControllerStep) -> Option<AlignOutcome> {
        self.timers.apply(&step.commands);
        if let Some(outcome) = step.outcome {
            self.outcomes.push(outcome);
        }
        step.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn selector_parsing() {
        assert_eq!(
            AttributeSelector::parse("[aria-selected='true']"),
            Some(AttributeSelector::Equals {
                name: "aria-selected",
                value: "true"
            })
        );
        assert_eq!(
            AttributeSelector::parse("[class*=\"Selection\"]"),
            Some(AttributeSelector::Contains {
                name: "class",
                value: "Selection"
            })
        );
        assert_eq!(AttributeSelector::parse("div.selected"), None);
    }

    #[test]
    fn detached_nodes_do_not_match_and_reject_writes() {
        let doc = FakeDocument::new();
        let el = doc.insert(ElementRect::new(0.0, 0.0, 1.0, 1.0));
        doc.set_attribute(el, "class", "selected");
        doc.detach(el);

        assert!(doc.query_all("[class*='selected']").is_empty());
        assert_eq!(
            doc.set_inline_transform(&el, "none"),
            Err(HostError::Detached)
        );
    }

    #[test]
    fn virtual_timers_fire_in_due_order() {
        let mut timers = VirtualTimers::new();
        let (a, b) = (TimerId::from_raw(1), TimerId::from_raw(2));
        timers.apply(&[
            TimerCommand::Repeat {
                id: a,
                interval: Duration::from_millis(60),
            },
            TimerCommand::Once {
                id: b,
                delay: Duration::from_millis(60),
            },
        ]);

        let until = Duration::from_millis(130);
        assert_eq!(timers.pop_due(until), Some(a));
        assert_eq!(timers.pop_due(until), Some(b));
        assert_eq!(timers.pop_due(until), Some(a));
        assert_eq!(timers.pop_due(until), None);
        assert_eq!(timers.now(), Duration::from_millis(120));

        timers.apply(&[TimerCommand::Cancel { id: a }]);
        assert_eq!(timers.armed(), 0);
    }
}
