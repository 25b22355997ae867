//! Named shift levels

use crate::error::MappingError;
use std::fmt;

/// Index of a shift level; level 0 is the rest level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LevelId(pub usize);

impl LevelId {
    /// Level active while no modifier is held
    pub const REST: LevelId = LevelId(0);
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered, fixed set of level names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftLevels {
    names: Vec<String>,
}

impl ShiftLevels {
    /// Build a level set; the first name is the rest level
    pub fn new<I, S>(names: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(MappingError::NoLevels);
        }
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(MappingError::InvalidLevel(name.clone()));
            }
            if names[..i].contains(name) {
                return Err(MappingError::DuplicateLevel(name.clone()));
            }
        }
        Ok(Self { names })
    }

    /// The two-level `off`/`on` set used by single-modifier mappings
    pub fn on_off() -> Self {
        Self {
            names: vec!["off".to_string(), "on".to_string()],
        }
    }

    pub fn id(&self, name: &str) -> Result<LevelId, MappingError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(LevelId)
            .ok_or_else(|| MappingError::UnknownLevel(name.to_string()))
    }

    pub fn name(&self, id: LevelId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LevelId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (LevelId(i), name.as_str()))
    }
}

impl Default for ShiftLevels {
    fn default() -> Self {
        Self::on_off()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_declaration_order() {
        let levels = ShiftLevels::new(["o", "a", "b"]).unwrap();
        assert_eq!(levels.id("o").unwrap(), LevelId::REST);
        assert_eq!(levels.id("b").unwrap(), LevelId(2));
        assert_eq!(levels.name(LevelId(1)), Some("a"));
        assert_eq!(levels.len(), 3);
    }

    #[test]
    fn test_rejects_bad_level_sets() {
        assert_eq!(
            ShiftLevels::new(Vec::<String>::new()),
            Err(MappingError::NoLevels)
        );
        assert_eq!(
            ShiftLevels::new(["o", "a", "o"]),
            Err(MappingError::DuplicateLevel("o".into()))
        );
        assert_eq!(
            ShiftLevels::new(["o", " "]),
            Err(MappingError::InvalidLevel(" ".into()))
        );
    }

    #[test]
    fn test_unknown_level_name() {
        let levels = ShiftLevels::on_off();
        assert_eq!(levels.id("on").unwrap(), LevelId(1));
        assert_eq!(levels.id("a"), Err(MappingError::UnknownLevel("a".into())));
    }
}
