//! Shift-level routing
//!
//! A [`Shifter`] multiplexes each physical control onto one handler per shift
//! level. Modifier buttons bound through [`Shifter::hold_for`] move the active
//! level; controls bound through [`Shifter::route`] dispatch to whatever the
//! active level maps them to. Feedback follows the active level through the
//! shifter's [`FeedbackRouter`].
//!
//! Shifters share no state with each other: a mapping may run several
//! independent modifier groups side by side.

mod levels;
mod state;
mod switch;


pub use levels::{LevelId, ShiftLevels};
pub use state::ShifterState;
pub use switch::ControlSwitch;

use crate::error::MappingError;
use crate::event::{ControlAddr, ControlEvent, Handler};
use crate::feedback::{FeedbackRoute, FeedbackRouter, FeedbackSink};
use crate::host::SharedHost;
use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// Handlers of one physical control, keyed by level
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: HashMap<LevelId, Handler>,
    /// Feedback output refreshed after each routed event
    output: Option<ControlAddr>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from level names
    pub fn from_named<'a, I>(levels: &ShiftLevels, routes: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = (&'a str, Handler)>,
    {
        let mut table = Self::new();
        for (name, handler) in routes {
            table.insert(levels.id(name)?, handler);
        }
        Ok(table)
    }

    pub fn insert(&mut self, level: LevelId, handler: Handler) {
        self.routes.insert(level, handler);
    }

    /// Refresh `output` instead of the input address after routing
    pub fn with_output(mut self, output: ControlAddr) -> Self {
        self.output = Some(output);
        self
    }

    pub fn get(&self, level: LevelId) -> Option<&Handler> {
        self.routes.get(&level)
    }
}

struct ShifterInner {
    name: String,
    levels: ShiftLevels,
    state: RefCell<ShifterState>,
    feedback: Rc<FeedbackRouter>,
}

/// One modifier group with its own active level and feedback
#[derive(Clone)]
pub struct Shifter {
    inner: Rc<ShifterInner>,
}

impl Shifter {
    pub fn new(
        name: impl Into<String>,
        levels: ShiftLevels,
        host: SharedHost,
        sink: Rc<dyn FeedbackSink>,
    ) -> Self {
        Self {
            inner: Rc::new(ShifterInner {
                name: name.into(),
                levels,
                state: RefCell::new(ShifterState::new()),
                feedback: FeedbackRouter::new(host, sink),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn levels(&self) -> &ShiftLevels {
        &self.inner.levels
    }

    pub fn current_level(&self) -> LevelId {
        self.inner.state.borrow().current()
    }

    pub fn current_level_name(&self) -> &str {
        self.inner
            .levels
            .name(self.current_level())
            .unwrap_or_default()
    }

    /// Handler for a modifier button selecting `level` while held
    pub fn hold_for(&self, level: &str) -> Result<Handler, MappingError> {
        let level = self.inner.levels.id(level)?;
        let shifter = self.clone();
        Ok(Rc::new(move |event: &ControlEvent| {
            shifter.apply_modifier(level, event.is_press())
        }))
    }

    /// Modifier handler for the default `off`/`on` levels
    pub fn hold(&self) -> Result<Handler, MappingError> {
        self.hold_for("on")
    }

    /// Press or release a modifier, refreshing feedback on a level change
    pub fn apply_modifier(&self, level: LevelId, pressed: bool) -> Result<()> {
        let (before, after) = {
            let mut state = self.inner.state.borrow_mut();
            let before = state.current();
            let after = if pressed {
                state.press(level)
            } else {
                state.release(level)
            };
            (before, after)
        };
        if before == after {
            return Ok(());
        }

        debug!(
            "⇧ {}: level {} → {}",
            self.name(),
            self.inner.levels.name(before).unwrap_or_default(),
            self.inner.levels.name(after).unwrap_or_default()
        );
        self.inner.feedback.switch_to(after)
    }

    /// Dispatch events by the active level
    ///
    /// Levels missing from the table drop the event. After a routed event the
    /// feedback shown on the control, for the level before and after the call,
    /// is re-delivered.
    pub fn route(&self, table: RouteTable) -> Handler {
        let shifter = self.clone();
        Rc::new(move |event: &ControlEvent| {
            let before = shifter.current_level();
            let Some(handler) = table.get(before) else {
                trace!(
                    "{}: no route for ch:{} #{} at level {}",
                    shifter.name(),
                    event.channel + 1,
                    event.control,
                    shifter.inner.levels.name(before).unwrap_or_default()
                );
                return Ok(());
            };
            handler(event)?;

            let Some(output) = table.output.or_else(|| ControlAddr::of_event(event)) else {
                return Ok(());
            };
            let feedback = &shifter.inner.feedback;
            feedback.retrigger(output, before)?;
            let after = shifter.current_level();
            if after != before {
                feedback.retrigger(output, after)?;
            }
            Ok(())
        })
    }

    /// Show `route` on `output` while `level` is active
    pub fn connect(&self, output: ControlAddr, level: &str, route: FeedbackRoute) -> Result<()> {
        let level = self.inner.levels.id(level)?;
        self.inner.feedback.connect(output, level, route)
    }

    /// Re-deliver all feedback of the active level
    pub fn refresh(&self) -> Result<()> {
        self.inner.feedback.refresh()
    }
}
