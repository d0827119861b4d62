//! ECS messages for letterfall.

use bevy::prelude::*;

use crate::impulse::ImpulseKind;
use crate::interaction::PointerInput;
use crate::letter::{LetterId, LetterStats};

/// Request to publish a typing impulse.
#[derive(Message, Debug, Clone, Copy)]
pub struct TypingImpulseEvent(pub ImpulseKind);

/// Request to put every letter back at its spawn position.
#[derive(Message, Debug, Clone, Default)]
pub struct ResetLettersEvent;

/// Wheel zoom in wheel units; positive zooms in.
#[derive(Message, Debug, Clone, Copy)]
pub struct ZoomEvent(pub f32);

/// Pointer activity over the viewport.
#[derive(Message, Debug, Clone, Copy)]
pub enum PointerEvent {
    Moved(PointerInput),
    Pressed(PointerInput),
    Released(PointerInput),
}

/// Fired after a frame expired one or more letters.
#[derive(Message, Debug, Clone)]
pub struct LettersExpiredEvent {
    pub ids: Vec<LetterId>,
    pub stats: LetterStats,
}
