//! Client systems: keyboard to typing session, session to core feed, and
//! window chrome that follows the core state.

use bevy::input::ButtonState;
use bevy::input::keyboard::{Key, KeyboardInput};
use bevy::prelude::*;
use bevy::window::{CursorIcon, PrimaryWindow, SystemCursorIcon};
use letterfall_core::bevy::{PointerAffordance, StatsStore, TypingCommand, TypingFeed};
use letterfall_core::interaction::Affordance;

use crate::typing::TypingSession;

#[derive(Resource)]
pub struct SessionRes(pub TypingSession);

fn sync_command(session: &TypingSession) -> TypingCommand {
    TypingCommand::SyncText {
        history: session.history().to_vec(),
        current: session.current().to_string(),
    }
}

pub fn push_first_word(session: Res<SessionRes>, feed: Res<TypingFeed>) {
    tracing::info!("[client] first word: {}", session.0.current());
    feed.push(sync_command(&session.0));
}

pub fn handle_keyboard(
    mut keys: MessageReader<KeyboardInput>,
    mut session: ResMut<SessionRes>,
    feed: Res<TypingFeed>,
) {
    let mut input_changed = false;
    for event in keys.read() {
        if event.state != ButtonState::Pressed {
            continue;
        }
        match &event.logical_key {
            Key::Character(text) => {
                for c in text.chars() {
                    if let Some(impulse) = session.0.type_char(c) {
                        feed.push(TypingCommand::Impulse(impulse));
                        input_changed = true;
                    }
                }
            }
            Key::Backspace => input_changed |= session.0.backspace(),
            Key::Escape => {
                tracing::info!("[client] reset requested");
                feed.push(TypingCommand::Reset);
            }
            _ => {}
        }
    }
    if input_changed {
        feed.push(TypingCommand::Input(session.0.input().to_string()));
    }
}

pub fn advance_session(time: Res<Time>, mut session: ResMut<SessionRes>, feed: Res<TypingFeed>) {
    let Some(completion) = session.0.tick(time.elapsed()) else {
        return;
    };
    tracing::info!(
        "[client] completed '{}' ({} words), next: {}",
        completion.word,
        session.0.history().len(),
        session.0.current()
    );
    feed.push(sync_command(&session.0));
    feed.push(TypingCommand::Input(String::new()));
    feed.push(TypingCommand::Impulse(completion.impulse));
}

pub fn update_window_title(
    stats: Res<StatsStore>,
    session: Res<SessionRes>,
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
    mut last: Local<String>,
) {
    let Ok(mut window) = windows.single_mut() else {
        return;
    };
    let stats = stats.get();
    let title = format!(
        "letterfall | {} [{}] | resting {} | expired {} | glyphs {}",
        session.0.current(),
        session.0.input(),
        stats.resting,
        stats.expired,
        stats.cached_glyphs
    );
    if *last != title {
        window.title.clone_from(&title);
        *last = title;
    }
}

pub fn update_cursor_icon(
    mut commands: Commands,
    affordance: Res<PointerAffordance>,
    windows: Query<Entity, With<PrimaryWindow>>,
) {
    if !affordance.is_changed() {
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };
    let icon = match affordance.0 {
        Affordance::Grab => SystemCursorIcon::Grab,
        Affordance::Grabbing => SystemCursorIcon::Grabbing,
        Affordance::Pointer => SystemCursorIcon::Pointer,
    };
    commands.entity(window).insert(CursorIcon::from(icon));
}
