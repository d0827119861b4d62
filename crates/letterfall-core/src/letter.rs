//! The Letter entity.

use bevy::math::Vec3;
use rapier3d::prelude::RigidBodyHandle;
use serde::{Deserialize, Serialize};

use crate::glyph::MaterialState;
use crate::scene::VisualId;

/// Monotonically increasing letter identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LetterId(pub u64);

impl std::fmt::Display for LetterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Lifecycle of a letter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterState {
    /// Spawned, not yet stepped.
    #[default]
    Pending,
    Active,
    /// Settled under gravity.
    Resting,
    /// Fell out of bounds and was removed.
    Expired,
}

/// One typed character: a physics body paired with a visual.
///
/// Both handles are owned exclusively by this letter. Neither the body nor the
/// visual points back at it; lookups go through the registry.
#[derive(Debug, Clone)]
pub struct Letter {
    pub id: LetterId,
    pub glyph: char,
    pub word_index: usize,
    pub char_index: usize,
    pub state: LetterState,
    pub material: MaterialState,
    origin: Vec3,
    body: RigidBodyHandle,
    visual: VisualId,
}

impl Letter {
    pub(crate) fn new(
        id: LetterId,
        glyph: char,
        (word_index, char_index): (usize, usize),
        origin: Vec3,
        body: RigidBodyHandle,
        visual: VisualId,
    ) -> Self {
        Self {
            id,
            glyph,
            word_index,
            char_index,
            state: LetterState::Pending,
            material: MaterialState::Pending,
            origin,
            body,
            visual,
        }
    }

    /// Spawn position, fixed for the letter's lifetime.
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn visual(&self) -> VisualId {
        self.visual
    }

    pub fn key(&self) -> (usize, usize) {
        (self.word_index, self.char_index)
    }
}

/// Counters exposed to the host UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterStats {
    /// Letters currently managed (not expired).
    pub letters: usize,
    /// Letters resting on the ground.
    pub resting: usize,
    /// Letters expired so far.
    pub expired: u64,
    /// Spawn requests waiting on the font.
    pub pending_spawns: usize,
    /// Entries in the glyph cache.
    pub cached_glyphs: usize,
}
