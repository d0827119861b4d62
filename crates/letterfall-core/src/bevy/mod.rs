//! Bevy integration for letterfall.
//!
//! The render loop lives in an ECS resource and runs one frame per fixed
//! step. Host input arrives through the [`TypingFeed`] queue or as messages,
//! and the render plugin mirrors presented frames onto mesh entities.

pub mod components;
pub mod events;
pub mod plugin;
pub mod resources;
pub mod surface;
pub mod systems;

#[cfg(test)]
pub(crate) mod test_utils;

pub use components::*;
pub use events::*;
pub use plugin::{LetterfallHeadlessPlugin, LetterfallRenderPlugin, LetterfallSet};
pub use resources::*;
pub use surface::{FrameSlot, FrameSlotSurface};
