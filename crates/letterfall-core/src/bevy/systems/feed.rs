//! Systems forwarding host input into the render loop.

use bevy::prelude::*;

use crate::bevy::{
    LetterfallRes, PointerAffordance, PointerEvent, ResetLettersEvent, TypingCommand, TypingFeed,
    TypingImpulseEvent, ZoomEvent,
};

/// Drains the typing feed. Text and input apply immediately; impulses and
/// resets are re-emitted as messages.
pub fn process_typing_commands(
    feed: Res<TypingFeed>,
    mut res: ResMut<LetterfallRes>,
    mut impulses: MessageWriter<TypingImpulseEvent>,
    mut resets: MessageWriter<ResetLettersEvent>,
) {
    for command in feed.drain() {
        match command {
            TypingCommand::SyncText { history, current } => {
                match res.render_loop.sync_text(history.as_slice(), &current) {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("[letterfall] requested {} letters", n),
                    Err(e) => tracing::warn!("[letterfall] text sync failed: {}", e),
                }
            }
            TypingCommand::Input(input) => res.render_loop.apply_input(&input),
            TypingCommand::Impulse(kind) => {
                impulses.write(TypingImpulseEvent(kind));
            }
            TypingCommand::Reset => {
                resets.write(ResetLettersEvent);
            }
        }
    }
}

pub fn handle_impulse_events(
    mut events: MessageReader<TypingImpulseEvent>,
    mut res: ResMut<LetterfallRes>,
) {
    for TypingImpulseEvent(kind) in events.read() {
        res.render_loop.publish_impulse(*kind);
    }
}

pub fn handle_reset_events(mut events: MessageReader<ResetLettersEvent>, mut res: ResMut<LetterfallRes>) {
    // Several resets in one frame are one reset.
    if events.read().count() > 0 {
        res.render_loop.reset();
    }
}

pub fn handle_zoom_events(mut events: MessageReader<ZoomEvent>, mut res: ResMut<LetterfallRes>) {
    let wheel: f32 = events.read().map(|ZoomEvent(units)| *units).sum();
    res.render_loop.zoom(wheel);
}

pub fn handle_pointer_events(
    mut events: MessageReader<PointerEvent>,
    mut res: ResMut<LetterfallRes>,
    mut affordance: ResMut<PointerAffordance>,
) {
    for event in events.read() {
        let next = match *event {
            PointerEvent::Moved(pointer) => res.render_loop.pointer_move(pointer),
            PointerEvent::Pressed(pointer) => {
                res.render_loop.pointer_down(pointer);
                res.render_loop.affordance()
            }
            PointerEvent::Released(pointer) => res.render_loop.pointer_up(pointer),
        };
        if affordance.0 != next {
            affordance.0 = next;
        }
    }
}
