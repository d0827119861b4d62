//! Pointer interaction: hit-testing letters and telling letter presses apart
//! from camera drags.

use bevy::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::pixel_to_ndc;
use crate::letter::LetterId;
use crate::registry::{EntityRegistry, Stage};
use crate::scene::{RayHit, SceneManager};

/// Cursor shape the host should show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affordance {
    /// Over empty space; dragging would orbit the camera.
    #[default]
    Grab,
    /// Orbiting the camera.
    Grabbing,
    /// Over a letter.
    Pointer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InteractionState {
    #[default]
    Idle,
    Hovering(LetterId),
    DraggingCamera,
    PressingEntity(LetterId),
}

/// Pointer position in pixels (origin top-left) within a viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub position: Vec2,
    pub viewport: Vec2,
}

impl PointerInput {
    pub fn new(position: Vec2, viewport: Vec2) -> Self {
        Self { position, viewport }
    }
}

/// Four-state pointer controller.
///
/// A press on a letter suspends orbit input for the rest of the tick so the
/// same gesture cannot also start a camera drag; [`Self::on_tick`] lifts the
/// suspension before the next physics step.
#[derive(Debug, Default)]
pub struct InteractionController {
    state: InteractionState,
    affordance: Affordance,
    press_strength: f32,
    orbit_suspended: bool,
}

impl InteractionController {
    pub fn new(press_strength: f32) -> Self {
        Self {
            press_strength,
            ..Self::default()
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn affordance(&self) -> Affordance {
        self.affordance
    }

    pub fn pointer_move(
        &mut self,
        scene: &mut SceneManager,
        registry: &EntityRegistry,
        pointer: PointerInput,
    ) -> Affordance {
        match self.state {
            InteractionState::DraggingCamera => {
                scene.rig_mut().drag_to(pointer.position);
                self.affordance = Affordance::Grabbing;
            }
            InteractionState::PressingEntity(_) => {
                self.affordance = Affordance::Pointer;
            }
            InteractionState::Idle | InteractionState::Hovering(_) => {
                self.refresh_hover(scene, registry, pointer);
            }
        }
        self.affordance
    }

    pub fn pointer_down(
        &mut self,
        stage: &mut Stage,
        registry: &EntityRegistry,
        pointer: PointerInput,
    ) -> InteractionState {
        match pick(&stage.scene, registry, pointer) {
            Some((id, hit)) => {
                stage.scene.rig_mut().set_enabled(false);
                self.orbit_suspended = true;

                if let Some(letter) = registry.get(id) {
                    stage.physics.apply_impulse(
                        letter.body(),
                        Vec3::new(0.0, 0.0, -self.press_strength),
                        hit.local_point,
                    );
                }
                tracing::debug!("[interaction] pressed {}", id);
                self.state = InteractionState::PressingEntity(id);
                self.affordance = Affordance::Pointer;
            }
            None => {
                if stage.scene.rig_mut().begin_drag(pointer.position) {
                    self.state = InteractionState::DraggingCamera;
                    self.affordance = Affordance::Grabbing;
                }
            }
        }
        self.state
    }

    pub fn pointer_up(
        &mut self,
        scene: &mut SceneManager,
        registry: &EntityRegistry,
        pointer: PointerInput,
    ) -> Affordance {
        if self.state == InteractionState::DraggingCamera {
            scene.rig_mut().end_drag();
        }
        scene.rig_mut().set_enabled(true);
        self.orbit_suspended = false;
        self.state = InteractionState::Idle;
        self.refresh_hover(scene, registry, pointer);
        self.affordance
    }

    /// Re-enables orbit input suspended by a press.
    pub fn on_tick(&mut self, scene: &mut SceneManager) {
        if self.orbit_suspended {
            scene.rig_mut().set_enabled(true);
            self.orbit_suspended = false;
        }
    }

    /// Forgets hover and press state, e.g. after the letters were reset.
    pub fn clear(&mut self, scene: &mut SceneManager) {
        if self.state == InteractionState::DraggingCamera {
            scene.rig_mut().end_drag();
        }
        self.on_tick(scene);
        self.state = InteractionState::Idle;
        self.affordance = Affordance::Grab;
    }

    /// Drops a hover or press on a letter that no longer exists.
    pub fn forget(&mut self, id: LetterId) {
        if matches!(
            self.state,
            InteractionState::Hovering(h) | InteractionState::PressingEntity(h) if h == id
        ) {
            self.state = InteractionState::Idle;
            self.affordance = Affordance::Grab;
        }
    }

    fn refresh_hover(&mut self, scene: &SceneManager, registry: &EntityRegistry, pointer: PointerInput) {
        match pick(scene, registry, pointer) {
            Some((id, _)) => {
                self.state = InteractionState::Hovering(id);
                self.affordance = Affordance::Pointer;
            }
            None => {
                self.state = InteractionState::Idle;
                self.affordance = Affordance::Grab;
            }
        }
    }
}

fn pick(
    scene: &SceneManager,
    registry: &EntityRegistry,
    pointer: PointerInput,
) -> Option<(LetterId, RayHit)> {
    let aspect = if pointer.viewport.y > 0.0 {
        pointer.viewport.x / pointer.viewport.y
    } else {
        scene.aspect()
    };
    let ray = scene
        .rig()
        .ray_from_ndc(pixel_to_ndc(pointer.position, pointer.viewport), aspect);
    let hit = scene.raycast(&ray)?;
    let letter = registry.by_visual(hit.visual)?;
    Some((letter.id, hit))
}
