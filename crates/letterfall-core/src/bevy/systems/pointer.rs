//! Window input translated into letterfall messages.

use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::bevy::{FrameSlot, PointerEvent, ZoomEvent};
use crate::interaction::PointerInput;

/// Pixels of trackpad scroll per wheel line.
const PIXELS_PER_LINE: f32 = 100.0;

/// Tracks the primary window cursor and left button.
pub fn forward_window_pointer(
    windows: Query<&Window, With<PrimaryWindow>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    slot: Res<FrameSlot>,
    mut last_position: Local<Option<Vec2>>,
    mut pointer_events: MessageWriter<PointerEvent>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let viewport = Vec2::new(window.width(), window.height());
    if viewport.y > 0.0 {
        slot.set_aspect(viewport.x / viewport.y);
    }

    // Releasing outside the window still ends a drag.
    let position = window.cursor_position().or(*last_position);
    let Some(position) = position else {
        return;
    };
    let pointer = PointerInput::new(position, viewport);

    if *last_position != Some(position) {
        pointer_events.write(PointerEvent::Moved(pointer));
        *last_position = Some(position);
    }
    if mouse_button.just_pressed(MouseButton::Left) {
        pointer_events.write(PointerEvent::Pressed(pointer));
    }
    if mouse_button.just_released(MouseButton::Left) {
        pointer_events.write(PointerEvent::Released(pointer));
    }
}

pub fn forward_mouse_wheel(mut wheel: MessageReader<MouseWheel>, mut zoom: MessageWriter<ZoomEvent>) {
    for event in wheel.read() {
        let units = match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / PIXELS_PER_LINE,
        };
        zoom.write(ZoomEvent(units));
    }
}
