//! Host control addressing
//!
//! A [`ControlRef`] names one host parameter as a (group, key) pair. Groups are
//! typed so that related targets (a deck's equalizer, its effect unit, ...) are
//! derived structurally by [`GroupTarget`] instead of by rewriting strings.

use crate::error::MappingError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Synthetic encoder key driving the host's scratch engine
pub const SCRATCH_KEY: &str = "scratch";

/// Synthetic button key toggling a scratch session
pub const SCRATCH_ENABLE_KEY: &str = "scratch_enable";

/// Slip mode flag set for the duration of a scratch session
pub const SLIP_KEY: &str = "slip_enabled";

/// Logical target of a host control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum Group {
    /// `[ChannelN]`
    Channel(u8),
    /// `[PreviewDeckN]`
    PreviewDeck(u8),
    /// `[SamplerN]`
    Sampler(u8),
    /// `[Master]`
    Master,
    /// `[Playlist]`
    Playlist,
    /// `[EqualizerRack1_[ChannelN]_Effect1]`
    EqualizerRack { deck: u8 },
    /// `[QuickEffectRack1_[ChannelN]]`
    QuickEffectRack { deck: u8 },
    /// `[EffectRack1_EffectUnitN]`
    EffectUnit { unit: u8 },
    /// `[EffectRack1_EffectUnitN_EffectM]`
    EffectSlot { unit: u8, slot: u8 },
}

impl Group {
    /// Deck number this group belongs to, if any
    pub fn deck(&self) -> Option<u8> {
        match *self {
            Group::Channel(deck)
            | Group::EqualizerRack { deck }
            | Group::QuickEffectRack { deck } => Some(deck),
            _ => None,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Group::Channel(n) => write!(f, "[Channel{}]", n),
            Group::PreviewDeck(n) => write!(f, "[PreviewDeck{}]", n),
            Group::Sampler(n) => write!(f, "[Sampler{}]", n),
            Group::Master => write!(f, "[Master]"),
            Group::Playlist => write!(f, "[Playlist]"),
            Group::EqualizerRack { deck } => write!(f, "[EqualizerRack1_[Channel{}]_Effect1]", deck),
            Group::QuickEffectRack { deck } => write!(f, "[QuickEffectRack1_[Channel{}]]", deck),
            Group::EffectUnit { unit } => write!(f, "[EffectRack1_EffectUnit{}]", unit),
            Group::EffectSlot { unit, slot } => {
                write!(f, "[EffectRack1_EffectUnit{}_Effect{}]", unit, slot)
            }
        }
    }
}

/// Parse a 1-based index such as the `3` in `Channel3`
fn parse_index(s: &str) -> Option<u8> {
    s.parse::<u8>().ok().filter(|n| *n > 0)
}

impl FromStr for Group {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MappingError::InvalidGroup(s.to_string());
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(invalid)?;

        let channel_deck = |nested: &str| match nested.parse::<Group>() {
            Ok(Group::Channel(deck)) => Ok(deck),
            _ => Err(invalid()),
        };

        match inner {
            "Master" => return Ok(Group::Master),
            "Playlist" => return Ok(Group::Playlist),
            _ => {}
        }

        if let Some(rest) = inner.strip_prefix("EqualizerRack1_") {
            let nested = rest.strip_suffix("_Effect1").ok_or_else(invalid)?;
            return Ok(Group::EqualizerRack { deck: channel_deck(nested)? });
        }
        if let Some(nested) = inner.strip_prefix("QuickEffectRack1_") {
            return Ok(Group::QuickEffectRack { deck: channel_deck(nested)? });
        }
        if let Some(rest) = inner.strip_prefix("EffectRack1_EffectUnit") {
            return match rest.split_once("_Effect") {
                Some((unit, slot)) => Ok(Group::EffectSlot {
                    unit: parse_index(unit).ok_or_else(invalid)?,
                    slot: parse_index(slot).ok_or_else(invalid)?,
                }),
                None => Ok(Group::EffectUnit {
                    unit: parse_index(rest).ok_or_else(invalid)?,
                }),
            };
        }

        let numbered: [(&str, fn(u8) -> Group); 3] = [
            ("PreviewDeck", Group::PreviewDeck),
            ("Channel", Group::Channel),
            ("Sampler", Group::Sampler),
        ];
        for (prefix, make) in numbered {
            if let Some(index) = inner.strip_prefix(prefix) {
                return parse_index(index).map(make).ok_or_else(invalid);
            }
        }

        Err(invalid())
    }
}

impl TryFrom<String> for Group {
    type Error = MappingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Derivation of a related group from the group an event arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum GroupTarget {
    /// The event's own group
    #[default]
    Same,
    /// Always the given group, whatever the event's group
    Fixed(Group),
    /// The deck's equalizer rack
    Equalizer,
    /// The deck's quick effect (filter) rack
    QuickEffect,
    /// The effect unit assigned to the deck (unit N for deck N)
    EffectUnit,
    /// Effect slot N of the deck's effect unit
    EffectSlot(u8),
}

impl GroupTarget {
    /// Resolve the target against the group of an incoming event
    pub fn resolve(&self, group: Group) -> Result<Group, MappingError> {
        let deck = || {
            group.deck().ok_or_else(|| MappingError::NoDeck {
                group: group.to_string(),
                target: self.to_string(),
            })
        };

        Ok(match *self {
            GroupTarget::Same => group,
            GroupTarget::Fixed(fixed) => fixed,
            GroupTarget::Equalizer => Group::EqualizerRack { deck: deck()? },
            GroupTarget::QuickEffect => Group::QuickEffectRack { deck: deck()? },
            GroupTarget::EffectUnit => Group::EffectUnit { unit: deck()? },
            GroupTarget::EffectSlot(slot) => Group::EffectSlot { unit: deck()?, slot },
        })
    }
}

impl fmt::Display for GroupTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupTarget::Same => write!(f, "same"),
            GroupTarget::Fixed(group) => write!(f, "{}", group),
            GroupTarget::Equalizer => write!(f, "equalizer"),
            GroupTarget::QuickEffect => write!(f, "quick_effect"),
            GroupTarget::EffectUnit => write!(f, "effect_unit"),
            GroupTarget::EffectSlot(slot) => write!(f, "effect{}", slot),
        }
    }
}

impl FromStr for GroupTarget {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('[') {
            return Ok(GroupTarget::Fixed(s.parse()?));
        }
        match s {
            "same" => Ok(GroupTarget::Same),
            "equalizer" | "eq" => Ok(GroupTarget::Equalizer),
            "quick_effect" | "filter" => Ok(GroupTarget::QuickEffect),
            "effect_unit" | "fx_chain" => Ok(GroupTarget::EffectUnit),
            other => other
                .strip_prefix("effect")
                .and_then(parse_index)
                .map(GroupTarget::EffectSlot)
                .ok_or_else(|| MappingError::InvalidGroupTarget(s.to_string())),
        }
    }
}

impl TryFrom<String> for GroupTarget {
    type Error = MappingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One host-controllable parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlRef {
    pub group: Group,
    pub key: String,
}

impl ControlRef {
    pub fn new(group: Group, key: impl Into<String>) -> Self {
        Self {
            group,
            key: key.into(),
        }
    }
}

impl fmt::Display for ControlRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_round_trips_through_host_strings() {
        for s in [
            "[Channel1]",
            "[PreviewDeck1]",
            "[Sampler4]",
            "[Master]",
            "[Playlist]",
            "[EqualizerRack1_[Channel2]_Effect1]",
            "[QuickEffectRack1_[Channel3]]",
            "[EffectRack1_EffectUnit4]",
            "[EffectRack1_EffectUnit2_Effect3]",
        ] {
            let group: Group = s.parse().unwrap();
            assert_eq!(group.to_string(), s);
        }
    }

    #[test]
    fn test_invalid_groups_are_rejected() {
        for s in ["Channel1", "[Channel0]", "[Channel]", "[Deck1]", "[EqualizerRack1_[Master]_Effect1]"] {
            assert!(s.parse::<Group>().is_err(), "{} should not parse", s);
        }
    }

    #[test]
    fn test_deck_of_group() {
        assert_eq!(Group::Channel(3).deck(), Some(3));
        assert_eq!(Group::EqualizerRack { deck: 2 }.deck(), Some(2));
        assert_eq!(Group::Master.deck(), None);
        assert_eq!(Group::EffectUnit { unit: 1 }.deck(), None);
    }

    #[test]
    fn test_group_target_resolution() {
        let deck2 = Group::Channel(2);
        assert_eq!(GroupTarget::Same.resolve(deck2).unwrap(), deck2);
        assert_eq!(
            GroupTarget::Equalizer.resolve(deck2).unwrap(),
            Group::EqualizerRack { deck: 2 }
        );
        assert_eq!(
            GroupTarget::QuickEffect.resolve(deck2).unwrap(),
            Group::QuickEffectRack { deck: 2 }
        );
        assert_eq!(
            GroupTarget::EffectUnit.resolve(deck2).unwrap(),
            Group::EffectUnit { unit: 2 }
        );
        assert_eq!(
            GroupTarget::EffectSlot(3).resolve(deck2).unwrap(),
            Group::EffectSlot { unit: 2, slot: 3 }
        );
        assert_eq!(
            GroupTarget::Fixed(Group::Master).resolve(deck2).unwrap(),
            Group::Master
        );
    }

    #[test]
    fn test_group_target_without_deck_fails() {
        let err = GroupTarget::Equalizer.resolve(Group::Master).unwrap_err();
        assert!(matches!(err, MappingError::NoDeck { .. }));
    }

    #[test]
    fn test_group_target_parsing() {
        assert_eq!("eq".parse::<GroupTarget>().unwrap(), GroupTarget::Equalizer);
        assert_eq!("effect2".parse::<GroupTarget>().unwrap(), GroupTarget::EffectSlot(2));
        assert_eq!(
            "[PreviewDeck1]".parse::<GroupTarget>().unwrap(),
            GroupTarget::Fixed(Group::PreviewDeck(1))
        );
        assert!("effect0".parse::<GroupTarget>().is_err());
        assert!("somewhere".parse::<GroupTarget>().is_err());
    }
}
