//! Shift-routed MIDI controller mapping
//!
//! Translates relative encoders and buttons of a control surface into commands
//! for a DJ mixing engine, and reflects engine state back as surface LEDs. One
//! physical control can do something different in every shift level; which
//! level is active depends on the modifier buttons currently held.

pub mod buttons;
pub mod config;
pub mod control;
pub mod controller;
pub mod encoder;
pub mod error;
pub mod event;
pub mod feedback;
pub mod host;
pub mod midi;
pub mod shift;
pub mod transport;

pub use config::MappingConfig;
pub use control::{ControlRef, Group, GroupTarget};
pub use controller::Controller;
pub use error::MappingError;
pub use event::{ControlAddr, ControlEvent, Handler};
pub use feedback::{ConsoleSink, FeedbackRouter, FeedbackSink};
pub use host::{ControlHost, Host, MemoryHost, ScratchEngine, SharedHost};
pub use shift::{LevelId, RouteTable, ShiftLevels, Shifter};
