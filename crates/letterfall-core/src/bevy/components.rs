//! ECS components for letterfall.

use bevy::prelude::*;

use crate::scene::VisualId;

/// Marker for the main camera.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct MainCamera;

/// Mesh entity mirroring one scene visual.
#[derive(Component, Debug, Clone, Copy)]
pub struct LetterVisual(pub VisualId);

/// Marker for the ground slab.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct GroundPlane;

/// Marker for lights spawned from the scene config.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct SceneLight;
