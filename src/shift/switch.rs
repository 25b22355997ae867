//! Routing by host state

use crate::control::{ControlRef, GroupTarget, SCRATCH_ENABLE_KEY};
use crate::error::MappingError;
use crate::event::{ControlEvent, Handler};
use crate::host::SharedHost;
use anyhow::Result;
use std::rc::Rc;
use tracing::trace;

/// Forwards each event to one of two handlers depending on a boolean control
///
/// For `scratch_enable` the state is the deck's scratch session rather than a
/// stored value.
pub struct ControlSwitch {
    host: SharedHost,
    key: String,
    target: GroupTarget,
}

impl ControlSwitch {
    pub fn new(host: SharedHost, key: impl Into<String>, target: GroupTarget) -> Self {
        Self {
            host,
            key: key.into(),
            target,
        }
    }

    /// Current state of the switching control for an event
    pub fn is_on(&self, event: &ControlEvent) -> Result<bool> {
        let group = self.target.resolve(event.group)?;
        if self.key == SCRATCH_ENABLE_KEY {
            let deck = group.deck().ok_or_else(|| MappingError::NoDeck {
                group: group.to_string(),
                target: self.key.clone(),
            })?;
            return self.host.is_scratching(deck);
        }
        Ok(self.host.get_value(&ControlRef::new(group, self.key.as_str()))? != 0.0)
    }

    pub fn into_handler(self, on: Handler, off: Handler) -> Handler {
        Rc::new(move |event: &ControlEvent| {
            if self.is_on(event)? {
                trace!("{} on", self.key);
                on(event)
            } else {
                trace!("{} off", self.key);
                off(event)
            }
        })
    }
}
