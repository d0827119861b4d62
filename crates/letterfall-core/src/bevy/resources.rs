//! ECS resources for letterfall.

use std::collections::VecDeque;
use std::sync::Arc;

use bevy::prelude::*;
use parking_lot::Mutex;

use crate::impulse::ImpulseKind;
use crate::interaction::Affordance;
use crate::letter::LetterStats;
use crate::render_loop::RenderLoop;

/// The render loop, owned by the ECS world.
#[derive(Resource, Debug)]
pub struct LetterfallRes {
    pub render_loop: RenderLoop,
}

impl LetterfallRes {
    pub fn new(render_loop: RenderLoop) -> Self {
        Self { render_loop }
    }
}

/// Input the host feeds into the app.
#[derive(Debug, Clone, PartialEq)]
pub enum TypingCommand {
    /// Completed words plus the word being typed.
    SyncText { history: Vec<String>, current: String },
    /// What the user has typed of the current word.
    Input(String),
    Impulse(ImpulseKind),
    Reset,
}

/// Queue of [`TypingCommand`]s shared with the host.
#[derive(Resource, Clone, Debug, Default)]
pub struct TypingFeed {
    inner: Arc<Mutex<VecDeque<TypingCommand>>>,
}

impl TypingFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: TypingCommand) {
        self.inner.lock().push_back(command);
    }

    pub fn drain(&self) -> Vec<TypingCommand> {
        self.inner.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Latest counters, readable from outside the app.
#[derive(Resource, Clone, Debug, Default)]
pub struct StatsStore {
    inner: Arc<Mutex<LetterStats>>,
}

impl StatsStore {
    pub fn get(&self) -> LetterStats {
        *self.inner.lock()
    }

    pub fn set(&self, stats: LetterStats) {
        *self.inner.lock() = stats;
    }
}

/// Cursor shape requested by the interaction controller.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerAffordance(pub Affordance);
