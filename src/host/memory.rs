//! In-memory host engine
//!
//! `MemoryHost` keeps every control in a map, fires change callbacks
//! synchronously and journals each call. The binary uses it as a loopback
//! engine when no mixing engine is attached; tests use the journal to observe
//! exactly what a handler did.

use super::{ChangeCallback, ControlHost, ScratchEngine, ScratchParams};
use crate::control::ControlRef;
use anyhow::Result;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// One recorded host call
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    SetValue(ControlRef, f64),
    SetParameter(ControlRef, f64),
    Trigger(ControlRef),
    ScratchTick { deck: u8, delta: f64 },
    ScratchEnable { deck: u8, params: ScratchParams },
    ScratchDisable { deck: u8 },
}

/// Stored control with its native range
#[derive(Debug, Clone, Copy)]
struct Slot {
    value: f64,
    minimum: f64,
    maximum: f64,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            value: 0.0,
            minimum: 0.0,
            maximum: 1.0,
        }
    }
}

impl Slot {
    fn parameter(&self) -> f64 {
        (self.value - self.minimum) / (self.maximum - self.minimum)
    }
}

/// Loopback host engine
#[derive(Default)]
pub struct MemoryHost {
    controls: RefCell<HashMap<ControlRef, Slot>>,
    subscribers: RefCell<HashMap<ControlRef, Vec<ChangeCallback>>>,
    scratching: RefCell<HashSet<u8>>,
    journal: RefCell<Vec<HostCall>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a control with its native range and initial value
    ///
    /// Undeclared controls behave as 0..1 controls starting at 0.
    pub fn define(&self, control: ControlRef, minimum: f64, maximum: f64, value: f64) {
        self.controls.borrow_mut().insert(
            control,
            Slot {
                value,
                minimum,
                maximum,
            },
        );
    }

    /// Current native value, without journaling
    pub fn value(&self, control: &ControlRef) -> f64 {
        self.slot(control).value
    }

    /// Current normalized value, without journaling
    pub fn parameter(&self, control: &ControlRef) -> f64 {
        self.slot(control).parameter()
    }

    /// Number of change subscriptions on a control
    pub fn subscriptions(&self, control: &ControlRef) -> usize {
        self.subscribers.borrow().get(control).map_or(0, Vec::len)
    }

    /// Recorded calls since the last take
    pub fn take_calls(&self) -> Vec<HostCall> {
        std::mem::take(&mut *self.journal.borrow_mut())
    }

    fn slot(&self, control: &ControlRef) -> Slot {
        self.controls.borrow().get(control).copied().unwrap_or_default()
    }

    fn store(&self, control: &ControlRef, value: f64) {
        self.controls
            .borrow_mut()
            .entry(control.clone())
            .or_default()
            .value = value;
    }

    fn record(&self, call: HostCall) {
        self.journal.borrow_mut().push(call);
    }

    /// Deliver the current value to every subscriber
    ///
    /// Callbacks are cloned out first so they may freely call back into the host.
    fn notify(&self, control: &ControlRef) -> Result<()> {
        let callbacks = self
            .subscribers
            .borrow()
            .get(control)
            .cloned()
            .unwrap_or_default();
        if callbacks.is_empty() {
            return Ok(());
        }

        let value = self.value(control);
        trace!("Notifying {} subscriber(s) of {} = {}", callbacks.len(), control, value);
        for callback in callbacks {
            callback(value)?;
        }
        Ok(())
    }
}

impl ControlHost for MemoryHost {
    fn get_value(&self, control: &ControlRef) -> Result<f64> {
        Ok(self.value(control))
    }

    fn set_value(&self, control: &ControlRef, value: f64) -> Result<()> {
        debug!("Host ← {} = {}", control, value);
        self.store(control, value);
        self.record(HostCall::SetValue(control.clone(), value));
        self.notify(control)
    }

    fn get_parameter(&self, control: &ControlRef) -> Result<f64> {
        Ok(self.parameter(control))
    }

    fn set_parameter(&self, control: &ControlRef, value: f64) -> Result<()> {
        debug!("Host ← {} = {} (parameter)", control, value);
        let slot = self.slot(control);
        let native = slot.minimum + value.clamp(0.0, 1.0) * (slot.maximum - slot.minimum);
        self.store(control, native);
        self.record(HostCall::SetParameter(control.clone(), value));
        self.notify(control)
    }

    fn connect(&self, control: &ControlRef, callback: ChangeCallback) -> Result<()> {
        self.subscribers
            .borrow_mut()
            .entry(control.clone())
            .or_default()
            .push(callback);
        Ok(())
    }

    fn trigger(&self, control: &ControlRef) -> Result<()> {
        self.record(HostCall::Trigger(control.clone()));
        self.notify(control)
    }
}

impl ScratchEngine for MemoryHost {
    fn scratch_tick(&self, deck: u8, delta: f64) -> Result<()> {
        debug!("Host ← scratch tick deck {} delta {}", deck, delta);
        self.record(HostCall::ScratchTick { deck, delta });
        Ok(())
    }

    fn scratch_enable(&self, deck: u8, params: ScratchParams) -> Result<()> {
        debug!("Host ← scratch enable deck {} {:?}", deck, params);
        self.scratching.borrow_mut().insert(deck);
        self.record(HostCall::ScratchEnable { deck, params });
        Ok(())
    }

    fn scratch_disable(&self, deck: u8) -> Result<()> {
        debug!("Host ← scratch disable deck {}", deck);
        self.scratching.borrow_mut().remove(&deck);
        self.record(HostCall::ScratchDisable { deck });
        Ok(())
    }

    fn is_scratching(&self, deck: u8) -> Result<bool> {
        Ok(self.scratching.borrow().contains(&deck))
    }
}
