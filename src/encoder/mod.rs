//! Relative encoder decoding
//!
//! Encoders run in "Rel2" mode: a raw value above 64 is one clockwise tick,
//! anything else one counter-clockwise tick. [`EncoderDecoder`] turns ticks into
//! bounded, speed-scaled changes of one host control.

pub mod accel;
pub mod config;

pub use accel::{AccelState, ACCEL_WINDOW};
pub use config::{EncoderConfig, EncoderOverrides, EncoderTable, EncoderTableConfig};

use crate::control::{ControlRef, Group, GroupTarget, SCRATCH_KEY};
use crate::error::MappingError;
use crate::event::{ControlEvent, Handler};
use crate::host::SharedHost;
use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use tracing::debug;

/// Raw values above this are clockwise ticks
pub const CLOCKWISE_THRESHOLD: u8 = 64;

/// Centre detent of normalized controls
const MIDDLE: f64 = 0.5;

/// Decoder bound to one encoder key, owning its own acceleration state
pub struct EncoderDecoder {
    key: String,
    target: GroupTarget,
    config: EncoderConfig,
    accel: RefCell<AccelState>,
    host: SharedHost,
}

impl EncoderDecoder {
    pub fn new(
        key: impl Into<String>,
        target: GroupTarget,
        table: &EncoderTable,
        host: SharedHost,
    ) -> Result<Self, MappingError> {
        let key = key.into();
        let config = table.lookup(&key, &target)?;
        Ok(Self::with_config(key, target, config, host))
    }

    pub fn with_config(key: impl Into<String>, target: GroupTarget, config: EncoderConfig, host: SharedHost) -> Self {
        Self {
            key: key.into(),
            target,
            config,
            accel: RefCell::new(AccelState::new()),
            host,
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Apply one tick that arrived on `group` at `now`
    pub fn handle(&self, raw: u8, group: Group, now: Instant) -> Result<()> {
        let cfg = &self.config;
        let multiplier = self
            .accel
            .borrow_mut()
            .tick(now, cfg.acceleration, cfg.acceleration_limit);
        let delta = if raw > CLOCKWISE_THRESHOLD { cfg.step } else { -cfg.step };
        let control = ControlRef::new(self.target.resolve(group)?, self.key.as_str());

        if self.key == SCRATCH_KEY {
            let deck = control.group.deck().ok_or_else(|| MappingError::NoDeck {
                group: control.group.to_string(),
                target: SCRATCH_KEY.to_string(),
            })?;
            debug!("Scratch deck {}: {}", deck, delta * multiplier);
            self.host.scratch_tick(deck, delta * multiplier)?;
        } else if let Some(command) = cfg.up.as_ref().filter(|_| delta > 0.0) {
            self.pulse(&control.group, command, multiplier)?;
        } else if let Some(command) = cfg.down.as_ref().filter(|_| delta < 0.0) {
            self.pulse(&control.group, command, multiplier)?;
        } else if !cfg.is_normalized() {
            let value = (self.host.get_value(&control)? + delta * multiplier)
                .clamp(cfg.minimum, cfg.maximum);
            debug!("Writing value {} = {} (accel {})", control, value, multiplier);
            self.host.set_value(&control, value)?;
        } else {
            let old = self.host.get_parameter(&control)?;
            let mut value = old + delta * multiplier;
            if cfg.stop_at_middle
                && ((old < MIDDLE && value > MIDDLE) || (old > MIDDLE && value < MIDDLE))
            {
                value = MIDDLE;
                self.accel.borrow_mut().park();
            }
            let value = value.clamp(0.0, 1.0);
            debug!("Writing parameter {} = {} (accel {})", control, value, multiplier);
            self.host.set_parameter(&control, value)?;
        }

        if cfg.reset {
            self.host.set_parameter(&control, 0.0)?;
        }
        Ok(())
    }

    fn pulse(&self, group: &Group, command: &str, multiplier: f64) -> Result<()> {
        let count = self.accel.borrow_mut().pulses(multiplier);
        let control = ControlRef::new(*group, command);
        debug!("Pulsing {} x{}", control, count);
        for _ in 0..count {
            self.host.pulse(&control)?;
        }
        Ok(())
    }

    /// Wrap into an event handler
    pub fn into_handler(self) -> Handler {
        let decoder = Rc::new(self);
        Rc::new(move |event: &ControlEvent| decoder.handle(event.value, event.group, event.at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCall, MemoryHost};
    use std::time::Duration;

    const CW: u8 = 65;
    const CCW: u8 = 63;

    fn setup(key: &str, config: EncoderConfig) -> (Rc<MemoryHost>, EncoderDecoder) {
        let host = Rc::new(MemoryHost::new());
        let decoder = EncoderDecoder::with_config(key, GroupTarget::Same, config, host.clone());
        (host, decoder)
    }

    fn control(key: &str) -> ControlRef {
        ControlRef::new(Group::Channel(1), key)
    }

    /// Issues ticks spaced far enough apart to never accelerate
    struct SlowHand {
        now: Instant,
    }

    impl SlowHand {
        fn new() -> Self {
            Self { now: Instant::now() }
        }

        fn turn(&mut self, decoder: &EncoderDecoder, raw: u8, count: u64) {
            for _ in 0..count {
                self.now += Duration::from_millis(200);
                decoder.handle(raw, Group::Channel(1), self.now).unwrap();
            }
        }
    }

    #[test]
    fn test_direction_threshold() {
        let config = EncoderConfig {
            minimum: -1.0,
            maximum: 1.0,
            step: 0.25,
            ..Default::default()
        };
        let (host, decoder) = setup("rate", config);
        let mut hand = SlowHand::new();

        hand.turn(&decoder, 64, 1);
        assert_eq!(host.value(&control("rate")), -0.25);
        hand.turn(&decoder, 1, 1);
        assert_eq!(host.value(&control("rate")), -0.5);
        hand.turn(&decoder, 127, 3);
        assert_eq!(host.value(&control("rate")), 0.25);
    }

    #[test]
    fn test_absolute_value_clamped_to_maximum() {
        let config = EncoderConfig {
            minimum: -1.0,
            maximum: 1.0,
            step: 0.1,
            acceleration: 1.0,
            ..Default::default()
        };
        let (host, decoder) = setup("rate", config);
        host.define(control("rate"), -1.0, 1.0, 0.95);

        let t0 = Instant::now();
        for i in 0..10 {
            decoder
                .handle(CW, Group::Channel(1), t0 + Duration::from_millis(10 * i))
                .unwrap();
        }
        assert_eq!(host.value(&control("rate")), 1.0);
    }

    #[test]
    fn test_zero_step_never_changes_value() {
        for (key, config) in [
            ("volume", EncoderConfig { step: 0.0, ..Default::default() }),
            (
                "rate",
                EncoderConfig {
                    minimum: -1.0,
                    step: 0.0,
                    ..Default::default()
                },
            ),
        ] {
            let (host, decoder) = setup(key, config);
            host.define(control(key), 0.0, 1.0, 0.3);
            let t0 = Instant::now();
            for i in 0..10 {
                let raw = if i % 2 == 0 { CW } else { CCW };
                decoder
                    .handle(raw, Group::Channel(1), t0 + Duration::from_millis(5 * i))
                    .unwrap();
            }
            assert_eq!(host.value(&control(key)), 0.3);
        }
    }

    #[test]
    fn test_normalized_parameter_path() {
        let (host, decoder) = setup("pregain_norm", EncoderConfig::default());
        let mut hand = SlowHand::new();
        host.define(control("pregain_norm"), 0.0, 4.0, 1.0);

        hand.turn(&decoder, CW, 1);
        assert_eq!(
            host.take_calls(),
            vec![HostCall::SetParameter(control("pregain_norm"), 0.26)]
        );
        assert!((host.value(&control("pregain_norm")) - 1.04).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_parameter_clamped_to_unit() {
        let (host, decoder) = setup("volume", EncoderConfig::default());
        let mut hand = SlowHand::new();
        host.define(control("volume"), 0.0, 1.0, 0.005);
        hand.turn(&decoder, CCW, 2);
        assert_eq!(host.value(&control("volume")), 0.0);
    }

    #[test]
    fn test_rapid_ticks_accelerate() {
        let config = EncoderConfig {
            minimum: -10.0,
            maximum: 10.0,
            step: 1.0,
            acceleration: 2.0,
            acceleration_limit: 10.0,
            ..Default::default()
        };
        let (host, decoder) = setup("jog", config);
        let t0 = Instant::now();
        decoder.handle(CW, Group::Channel(1), t0).unwrap();
        assert_eq!(host.value(&control("jog")), 1.0);
        decoder
            .handle(CW, Group::Channel(1), t0 + Duration::from_millis(50))
            .unwrap();
        assert_eq!(host.value(&control("jog")), 3.0);
    }

    #[test]
    fn test_stop_at_middle_lands_on_detent_and_holds_one_tick() {
        let config = EncoderConfig {
            step: 0.1,
            acceleration: 1.0,
            stop_at_middle: true,
            ..Default::default()
        };
        let (host, decoder) = setup("super1", config);
        host.define(control("super1"), 0.0, 1.0, 0.45);

        let t0 = Instant::now();
        decoder.handle(CW, Group::Channel(1), t0).unwrap();
        assert_eq!(host.parameter(&control("super1")), 0.5);

        decoder
            .handle(CW, Group::Channel(1), t0 + Duration::from_millis(30))
            .unwrap();
        assert_eq!(host.parameter(&control("super1")), 0.5);

        decoder
            .handle(CW, Group::Channel(1), t0 + Duration::from_millis(60))
            .unwrap();
        assert!(host.parameter(&control("super1")) > 0.5);
    }

    #[test]
    fn test_stop_at_middle_from_above() {
        let config = EncoderConfig {
            step: 0.1,
            stop_at_middle: true,
            ..Default::default()
        };
        let (host, decoder) = setup("super1", config);
        let mut hand = SlowHand::new();
        host.define(control("super1"), 0.0, 1.0, 0.55);
        hand.turn(&decoder, CCW, 1);
        assert_eq!(host.parameter(&control("super1")), 0.5);
        hand.turn(&decoder, CCW, 1);
        assert!(host.parameter(&control("super1")) < 0.5);
    }

    #[test]
    fn test_up_down_pulse_commands() {
        let config = EncoderConfig {
            step: 1.0,
            acceleration: 0.0,
            up: Some("loop_double".to_string()),
            down: Some("loop_halve".to_string()),
            ..Default::default()
        };
        let (host, decoder) = setup("loop_factor2", config);
        let mut hand = SlowHand::new();

        hand.turn(&decoder, CW, 1);
        assert_eq!(
            host.take_calls(),
            vec![
                HostCall::SetValue(control("loop_double"), 1.0),
                HostCall::SetValue(control("loop_double"), 0.0),
            ]
        );

        hand.turn(&decoder, CCW, 1);
        assert_eq!(
            host.take_calls(),
            vec![
                HostCall::SetValue(control("loop_halve"), 1.0),
                HostCall::SetValue(control("loop_halve"), 0.0),
            ]
        );
        assert_eq!(host.value(&control("loop_factor2")), 0.0);
    }

    #[test]
    fn test_pulse_count_follows_acceleration() {
        let config = EncoderConfig {
            acceleration: 2.0,
            up: Some("beats_translate_later".to_string()),
            ..Default::default()
        };
        let (host, decoder) = setup("beats_translate", config);
        let t0 = Instant::now();
        decoder.handle(CW, Group::Channel(1), t0).unwrap();
        host.take_calls();
        decoder
            .handle(CW, Group::Channel(1), t0 + Duration::from_millis(20))
            .unwrap();
        assert_eq!(host.take_calls().len(), 4);
    }

    #[test]
    fn test_down_only_command_falls_back_to_write_on_up() {
        let config = EncoderConfig {
            down: Some("beats_translate_earlier".to_string()),
            ..Default::default()
        };
        let (host, decoder) = setup("beats", config);
        let mut hand = SlowHand::new();
        hand.turn(&decoder, CW, 1);
        assert_eq!(
            host.take_calls(),
            vec![HostCall::SetParameter(control("beats"), 0.01)]
        );
    }

    #[test]
    fn test_scratch_ticks_bypass_parameter_store() {
        let config = EncoderConfig {
            step: 1.0,
            acceleration: 2.0,
            acceleration_limit: 4.0,
            ..Default::default()
        };
        let host = Rc::new(MemoryHost::new());
        let decoder = EncoderDecoder::with_config(SCRATCH_KEY, GroupTarget::Same, config, host.clone());
        let t0 = Instant::now();
        decoder.handle(CCW, Group::Channel(2), t0).unwrap();
        decoder
            .handle(CCW, Group::Channel(2), t0 + Duration::from_millis(10))
            .unwrap();
        assert_eq!(
            host.take_calls(),
            vec![
                HostCall::ScratchTick { deck: 2, delta: -1.0 },
                HostCall::ScratchTick { deck: 2, delta: -2.0 },
            ]
        );
    }

    #[test]
    fn test_scratch_without_deck_is_an_error() {
        let host = Rc::new(MemoryHost::new());
        let decoder =
            EncoderDecoder::with_config(SCRATCH_KEY, GroupTarget::Same, EncoderConfig::default(), host);
        assert!(decoder.handle(CW, Group::Master, Instant::now()).is_err());
    }

    #[test]
    fn test_reset_after_apply() {
        let config = EncoderConfig {
            minimum: -25.0,
            maximum: 25.0,
            step: 1.0,
            reset: true,
            ..Default::default()
        };
        let host = Rc::new(MemoryHost::new());
        let decoder = EncoderDecoder::with_config(
            "SelectTrackKnob",
            GroupTarget::Fixed(Group::Playlist),
            config,
            host.clone(),
        );
        host.define(ControlRef::new(Group::Playlist, "SelectTrackKnob"), -25.0, 25.0, 0.0);

        decoder.handle(CW, Group::Channel(1), Instant::now()).unwrap();
        let knob = ControlRef::new(Group::Playlist, "SelectTrackKnob");
        assert_eq!(
            host.take_calls(),
            vec![
                HostCall::SetValue(knob.clone(), 1.0),
                HostCall::SetParameter(knob.clone(), 0.0),
            ]
        );
    }

    #[test]
    fn test_group_target_applied_to_event_group() {
        let table = EncoderTable::builtin();
        let host = Rc::new(MemoryHost::new());
        let decoder = EncoderDecoder::new("parameter3", GroupTarget::Equalizer, &table, host.clone()).unwrap();
        assert!(decoder.config().stop_at_middle);

        decoder.handle(CW, Group::Channel(3), Instant::now()).unwrap();
        let high = ControlRef::new(Group::EqualizerRack { deck: 3 }, "parameter3");
        assert_eq!(host.take_calls(), vec![HostCall::SetParameter(high, 0.01)]);
    }
}
