//! Host engine interface
//!
//! The mapping core never owns parameter state. It talks to the mixing engine
//! through [`ControlHost`] (parameter store and change notifications) and
//! [`ScratchEngine`] (scratch DSP primitives). All methods take `&self`:
//! implementations use interior mutability and must release any internal
//! borrow before invoking change callbacks, because a callback may write back
//! into the host.

pub mod memory;

pub use memory::{HostCall, MemoryHost};

use crate::control::ControlRef;
use anyhow::Result;
use std::rc::Rc;

/// Callback fired with the new value whenever a subscribed control changes
pub type ChangeCallback = Rc<dyn Fn(f64) -> Result<()>>;

/// Parameter store of the host engine
pub trait ControlHost {
    /// Read a control in its native units
    fn get_value(&self, control: &ControlRef) -> Result<f64>;

    /// Write a control in its native units
    fn set_value(&self, control: &ControlRef, value: f64) -> Result<()>;

    /// Read a control on its normalized 0..1 scale
    fn get_parameter(&self, control: &ControlRef) -> Result<f64>;

    /// Write a control on its normalized 0..1 scale
    fn set_parameter(&self, control: &ControlRef, value: f64) -> Result<()>;

    /// Subscribe to changes of a control, whatever caused them
    fn connect(&self, control: &ControlRef, callback: ChangeCallback) -> Result<()>;

    /// Re-deliver the current value of a control to its subscribers
    fn trigger(&self, control: &ControlRef) -> Result<()>;

    /// Issue an edge-triggered command: write true, then false
    fn pulse(&self, control: &ControlRef) -> Result<()> {
        self.set_value(control, 1.0)?;
        self.set_value(control, 0.0)
    }
}

/// Scratch session parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScratchParams {
    /// Ticks per revolution of the virtual platter
    pub intersect: u32,
    pub rpm: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl Default for ScratchParams {
    fn default() -> Self {
        let alpha = 0.01;
        Self {
            intersect: 64,
            rpm: 33.0 + 1.0 / 3.0,
            alpha,
            beta: alpha / 16.0,
        }
    }
}

/// Scratch DSP primitives, addressed by deck number
pub trait ScratchEngine {
    fn scratch_tick(&self, deck: u8, delta: f64) -> Result<()>;
    fn scratch_enable(&self, deck: u8, params: ScratchParams) -> Result<()>;
    fn scratch_disable(&self, deck: u8) -> Result<()>;
    fn is_scratching(&self, deck: u8) -> Result<bool>;
}

/// Everything the mapping needs from the host
pub trait Host: ControlHost + ScratchEngine {}

impl<T: ControlHost + ScratchEngine> Host for T {}

/// Host handle shared by every handler of a mapping
pub type SharedHost = Rc<dyn Host>;
