//! Button press handlers
//!
//! Each constructor returns a [`Handler`] acting on one host control. Handlers
//! ignore the edge they do not act on.

use crate::control::{ControlRef, GroupTarget, SCRATCH_ENABLE_KEY, SLIP_KEY};
use crate::error::MappingError;
use crate::event::{ControlEvent, Handler};
use crate::host::{ScratchParams, SharedHost};
use anyhow::Result;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Factory for button handlers sharing one host
#[derive(Clone)]
pub struct ButtonActions {
    host: SharedHost,
}

impl ButtonActions {
    pub fn new(host: SharedHost) -> Self {
        Self { host }
    }

    /// True while pressed, false once released
    ///
    /// `scratch_enable` instead runs a scratch session with slip mode for as
    /// long as the button is held.
    pub fn hold(&self, key: &str, target: GroupTarget) -> Handler {
        let host = self.host.clone();
        if key == SCRATCH_ENABLE_KEY {
            return Rc::new(move |event: &ControlEvent| {
                let group = target.resolve(event.group)?;
                let deck = group.deck().ok_or_else(|| MappingError::NoDeck {
                    group: group.to_string(),
                    target: SCRATCH_ENABLE_KEY.to_string(),
                })?;
                let slip = ControlRef::new(group, SLIP_KEY);
                if event.is_press() {
                    debug!("Scratch session on deck {}", deck);
                    host.set_value(&slip, 1.0)?;
                    host.scratch_enable(deck, ScratchParams::default())
                } else {
                    debug!("Scratch session off deck {}", deck);
                    host.scratch_disable(deck)?;
                    host.set_value(&slip, 0.0)
                }
            });
        }

        let key = key.to_string();
        Rc::new(move |event: &ControlEvent| {
            let control = resolve(&target, event, &key)?;
            host.set_value(&control, if event.is_press() { 1.0 } else { 0.0 })
        })
    }

    /// Flip a boolean control on press
    pub fn toggle(&self, key: &str, target: GroupTarget) -> Handler {
        let host = self.host.clone();
        let key = key.to_string();
        Rc::new(move |event: &ControlEvent| {
            if !event.is_press() {
                return Ok(());
            }
            let control = resolve(&target, event, &key)?;
            let current = host.get_value(&control)?;
            debug!("Toggling {} (was {})", control, current);
            host.set_value(&control, if current != 0.0 { 0.0 } else { 1.0 })
        })
    }

    /// Write a fixed value on press
    pub fn set(&self, key: &str, value: f64, target: GroupTarget) -> Handler {
        let host = self.host.clone();
        let key = key.to_string();
        Rc::new(move |event: &ControlEvent| {
            if !event.is_press() {
                return Ok(());
            }
            host.set_value(&resolve(&target, event, &key)?, value)
        })
    }

    /// Restore a set of parameters together on release
    pub fn reset_group(&self, values: BTreeMap<String, f64>, target: GroupTarget) -> Handler {
        let host = self.host.clone();
        Rc::new(move |event: &ControlEvent| {
            if event.is_press() {
                return Ok(());
            }
            let group = target.resolve(event.group)?;
            for (key, value) in &values {
                let control = ControlRef::new(group, key.as_str());
                debug!("Resetting {} to {}", control, value);
                host.set_parameter(&control, *value)?;
            }
            Ok(())
        })
    }
}

fn resolve(target: &GroupTarget, event: &ControlEvent, key: &str) -> Result<ControlRef> {
    Ok(ControlRef::new(target.resolve(event.group)?, key))
}
