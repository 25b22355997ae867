//! Tests for Controller module

use super::*;
use crate::feedback::RecordingSink;
use crate::host::{ControlHost, HostCall, MemoryHost};

const DECK_MAPPING: &str = r#"
name: Test
levels: [o, a]
modifiers:
  - { level: a, input: { type: note, note: 48 } }
controls:
  - name: push_encoder
    group: "[Channel1]"
    input: { type: cc, cc: 39 }
    routes:
      o: { action: encoder, key: jog }
      a: { action: encoder, key: rate }
    feedback:
      a: { sources: [ { key: rate, range: [-1, 1] } ] }
  - name: fx_mix
    group: "[Channel1]"
    input: { type: cc, cc: 16 }
    action: { action: encoder, key: mix, group: effect_unit }
  - name: play
    group: "[Channel1]"
    input: { type: note, note: 10 }
    routes: { o: { action: toggle, key: play } }
    feedback:
      o: { sources: [ { key: play } ] }
  - name: broken
    group: "[Master]"
    input: { type: note, note: 11 }
    action: { action: hold, key: scratch_enable }
startup:
  - { action: set, group: "[EffectRack1_EffectUnit1]", key: "group_[Channel1]_enable", value: 1 }
  - { action: select_effect, group: "[EffectRack1_EffectUnit1_Effect1]", index: 2 }
"#;

struct Rig {
    host: Rc<MemoryHost>,
    sink: Rc<RecordingSink>,
    controller: Controller,
}

fn make_rig(yaml: &str) -> Rig {
    let config = MappingConfig::from_yaml_str(yaml).unwrap();
    let host = Rc::new(MemoryHost::new());
    let sink = Rc::new(RecordingSink::default());
    let controller = Controller::build(&config, host.clone(), sink.clone()).unwrap();
    Rig {
        host,
        sink,
        controller,
    }
}

fn rate() -> ControlRef {
    ControlRef::new(Group::Channel(1), "rate")
}

#[test]
fn test_shifted_rate_encoder_end_to_end() {
    let rig = make_rig(DECK_MAPPING);
    rig.host.define(rate(), -1.0, 1.0, 0.25);
    let now = Instant::now();

    assert!(rig.controller.handle_midi(&[0x90, 48, 127], now).unwrap());
    assert_eq!(rig.controller.current_level(), "a");
    rig.host.take_calls();
    rig.sink.take();

    assert!(rig.controller.handle_midi(&[0xB0, 39, 80], now).unwrap());
    assert_eq!(
        rig.host.take_calls(),
        vec![
            HostCall::SetValue(rate(), 0.25 + 0.001),
            HostCall::Trigger(rate()),
        ]
    );
    let feedback = MidiMessage::ControlChange {
        channel: 0,
        cc: 39,
        value: 79,
    };
    // Once for the write, once for the retrigger after routing
    assert_eq!(rig.sink.take(), vec![feedback, feedback]);

    assert!(rig.controller.handle_midi(&[0x90, 48, 0], now).unwrap());
    assert_eq!(rig.controller.current_level(), "o");
}

#[test]
fn test_modifier_press_shows_level_feedback() {
    let rig = make_rig(DECK_MAPPING);
    rig.host.define(rate(), -1.0, 1.0, 0.0);

    rig.controller.handle_midi(&[0x90, 48, 127], Instant::now()).unwrap();
    assert_eq!(
        rig.sink.take(),
        vec![MidiMessage::ControlChange {
            channel: 0,
            cc: 39,
            value: 64
        }]
    );
}

#[test]
fn test_unshifted_action_ignores_level() {
    let rig = make_rig(DECK_MAPPING);
    let mix = ControlRef::new(Group::EffectUnit { unit: 1 }, "mix");
    let start = Instant::now();

    rig.controller.handle_midi(&[0xB0, 16, 65], start).unwrap();
    rig.controller.handle_midi(&[0x90, 48, 127], start).unwrap();
    rig.controller
        .handle_midi(&[0xB0, 16, 65], start + std::time::Duration::from_millis(500))
        .unwrap();

    assert!((rig.host.parameter(&mix) - 0.02).abs() < 1e-12);
}

#[test]
fn test_unbound_and_invalid_messages_are_ignored() {
    let rig = make_rig(DECK_MAPPING);
    let now = Instant::now();
    assert!(!rig.controller.handle_midi(&[0xB0, 99, 65], now).unwrap());
    assert!(!rig.controller.handle_midi(&[0xB1, 39, 65], now).unwrap());
    assert!(!rig.controller.handle_midi(&[0xF0, 0x7E, 0xF7], now).unwrap());
    assert!(!rig.controller.handle_midi(&[0x90], now).unwrap());
    assert!(rig.host.take_calls().is_empty());
}

#[test]
fn test_unrouted_level_drops_event() {
    let rig = make_rig(DECK_MAPPING);
    let play = ControlRef::new(Group::Channel(1), "play");
    let now = Instant::now();

    rig.controller.handle_midi(&[0x90, 48, 127], now).unwrap();
    rig.host.take_calls();
    assert!(rig.controller.handle_midi(&[0x90, 10, 127], now).unwrap());
    assert!(rig.host.take_calls().is_empty());
    assert_eq!(rig.host.value(&play), 0.0);
}

#[test]
fn test_start_runs_startup_and_shows_rest_level() {
    let rig = make_rig(DECK_MAPPING);
    let unit = Group::EffectUnit { unit: 1 };
    let slot = Group::EffectSlot { unit: 1, slot: 1 };
    let play = ControlRef::new(Group::Channel(1), "play");

    rig.controller.start().unwrap();

    let clear = ControlRef::new(slot, "clear");
    let next = ControlRef::new(slot, "next_effect");
    assert_eq!(
        rig.host.take_calls(),
        vec![
            HostCall::SetValue(ControlRef::new(unit, "group_[Channel1]_enable"), 1.0),
            HostCall::SetValue(clear.clone(), 1.0),
            HostCall::SetValue(clear, 0.0),
            HostCall::SetValue(next.clone(), 1.0),
            HostCall::SetValue(next.clone(), 0.0),
            HostCall::SetValue(next.clone(), 1.0),
            HostCall::SetValue(next, 0.0),
            HostCall::Trigger(play),
        ]
    );
    assert_eq!(
        rig.sink.take(),
        vec![MidiMessage::NoteOn {
            channel: 0,
            note: 10,
            velocity: 0
        }]
    );
}

#[test]
fn test_toggle_feedback_follows_host() {
    let rig = make_rig(DECK_MAPPING);
    let now = Instant::now();

    rig.controller.handle_midi(&[0x90, 10, 127], now).unwrap();
    rig.controller.handle_midi(&[0x90, 10, 0], now).unwrap();

    let on = MidiMessage::NoteOn {
        channel: 0,
        note: 10,
        velocity: 127,
    };
    // Write notification, then retrigger after press and after release
    assert_eq!(rig.sink.take(), vec![on, on, on]);
}

#[test]
fn test_handler_errors_propagate() {
    let rig = make_rig(DECK_MAPPING);
    let err = rig
        .controller
        .handle_midi(&[0x90, 11, 127], Instant::now())
        .unwrap_err();
    let chain = format!("{:#}", err);
    assert!(chain.contains("Input 'broken' failed"), "{}", chain);
    assert!(chain.contains("has no deck"), "{}", chain);
}

#[test]
fn test_bundled_mapping_drives_every_deck() {
    let rig = make_rig(include_str!("../../mappings/bcr2000.yaml"));
    assert_eq!(rig.controller.name(), "BCR2000");
    assert_eq!(rig.controller.input_count(), 58);
    rig.controller.start().unwrap();

    let now = Instant::now();
    for deck in 1..=4u8 {
        let volume = ControlRef::new(Group::Channel(deck), "volume");
        let cc = 2 * (deck - 1);
        rig.controller.handle_midi(&[0xB0, cc, 65], now).unwrap();
        assert!((rig.host.parameter(&volume) - 0.01).abs() < 1e-12, "deck {}", deck);
    }

    // Level b: the push encoder of deck 3 scrubs the play position
    rig.controller.handle_midi(&[0x90, 49, 127], now).unwrap();
    assert_eq!(rig.controller.current_level(), "b");
    rig.controller.handle_midi(&[0xB0, 43, 65], now).unwrap();
    let position = ControlRef::new(Group::Channel(3), "playposition");
    assert!((rig.host.parameter(&position) - 0.00003).abs() < 1e-12);
}

#[test]
fn test_bundled_push_encoder_scratches_while_held() {
    let rig = make_rig(include_str!("../../mappings/bcr2000.yaml"));
    let now = Instant::now();

    rig.controller.handle_midi(&[0x90, 32, 127], now).unwrap();
    rig.host.take_calls();
    rig.controller.handle_midi(&[0xB0, 39, 63], now).unwrap();
    assert!(rig
        .host
        .take_calls()
        .contains(&HostCall::ScratchTick { deck: 1, delta: -1.0 }));

    rig.controller.handle_midi(&[0x90, 32, 0], now).unwrap();
    rig.host.take_calls();
    rig.controller.handle_midi(&[0xB0, 39, 63], now).unwrap();
    let jog = ControlRef::new(Group::Channel(1), "jog");
    assert!(rig.host.take_calls().contains(&HostCall::SetValue(jog, -0.1)));
}
