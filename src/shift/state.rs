//! Held-modifier stack

use super::levels::LevelId;

/// Current level and the modifiers held to reach it
///
/// `current` is always the most recently pressed level still held, or
/// [`LevelId::REST`] when nothing is held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShifterState {
    current: LevelId,
    held: Vec<LevelId>,
}

impl ShifterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> LevelId {
        self.current
    }

    pub fn held(&self) -> &[LevelId] {
        &self.held
    }

    /// Modifier pressed; returns the new current level
    pub fn press(&mut self, level: LevelId) -> LevelId {
        self.held.retain(|held| *held != level);
        self.held.push(level);
        self.current = level;
        self.current
    }

    /// Modifier released; returns the new current level
    ///
    /// Releasing a level that is not held changes nothing.
    pub fn release(&mut self, level: LevelId) -> LevelId {
        let Some(pos) = self.held.iter().position(|held| *held == level) else {
            return self.current;
        };
        self.held.remove(pos);
        self.current = self.held.last().copied().unwrap_or(LevelId::REST);
        self.current
    }
}
