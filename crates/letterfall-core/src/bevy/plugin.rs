//! Bevy plugins for letterfall.
//!
//! Provides:
//! - `LetterfallHeadlessPlugin`: render loop, typing feed and pointer handling without window or GPU
//! - `LetterfallRenderPlugin`: headless plugin plus camera, lights, meshes and window input

use bevy::prelude::*;

use crate::bevy::events::*;
use crate::bevy::resources::*;
use crate::bevy::surface::FrameSlot;
use crate::bevy::systems;
use crate::config::LetterfallConfig;
use crate::font::{BlockGlyphs, Deferred, SharedGlyphSource};
use crate::render_loop::RenderLoop;

// ============================================================================
// Headless Plugin
// ============================================================================

/// Logic-only plugin. Works with `MinimalPlugins`.
///
/// Without a `font`, letters use the built-in block glyphs.
#[derive(Default)]
pub struct LetterfallHeadlessPlugin {
    pub config: LetterfallConfig,
    pub font: Option<Deferred<SharedGlyphSource>>,
    pub feed: Option<TypingFeed>,
    pub stats: Option<StatsStore>,
}

impl Plugin for LetterfallHeadlessPlugin {
    fn build(&self, app: &mut App) {
        // ====================================================================
        // Render loop
        // ====================================================================
        let slot = FrameSlot::default();
        let font = self
            .font
            .clone()
            .unwrap_or_else(|| Deferred::ready(BlockGlyphs::shared()));
        let render_loop = RenderLoop::new(self.config.clone(), Box::new(slot.surface()), font);

        app.insert_resource(Time::<Fixed>::from_seconds(f64::from(self.config.physics.dt)));

        // ====================================================================
        // Resources
        // ====================================================================
        app.insert_resource(LetterfallRes::new(render_loop))
            .insert_resource(slot)
            .insert_resource(self.feed.clone().unwrap_or_default())
            .insert_resource(self.stats.clone().unwrap_or_default())
            .init_resource::<PointerAffordance>();

        // ====================================================================
        // Messages
        // ====================================================================
        app.add_message::<TypingImpulseEvent>()
            .add_message::<ResetLettersEvent>()
            .add_message::<ZoomEvent>()
            .add_message::<PointerEvent>()
            .add_message::<LettersExpiredEvent>();

        // ====================================================================
        // Systems
        // ====================================================================
        app.add_systems(Startup, systems::start_render_loop);

        app.add_systems(
            Update,
            (
                systems::process_typing_commands,
                systems::handle_impulse_events,
                systems::handle_reset_events,
                systems::handle_zoom_events,
                systems::handle_pointer_events,
            )
                .chain()
                .in_set(LetterfallSet::Input),
        );

        app.add_systems(FixedUpdate, systems::advance_frame);
        app.add_systems(PostUpdate, systems::publish_stats);
        app.add_systems(Last, systems::teardown_on_exit);
    }
}

/// Ordering anchor for systems that feed input into the render loop.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum LetterfallSet {
    Input,
}

// ============================================================================
// Render Plugin
// ============================================================================

/// Headless plugin plus systems that need a window, meshes and materials.
#[derive(Default)]
pub struct LetterfallRenderPlugin {
    pub config: LetterfallConfig,
    pub font: Option<Deferred<SharedGlyphSource>>,
    pub feed: Option<TypingFeed>,
    pub stats: Option<StatsStore>,
}

impl LetterfallRenderPlugin {
    pub fn new(config: LetterfallConfig, font: Deferred<SharedGlyphSource>, feed: TypingFeed) -> Self {
        Self {
            config,
            font: Some(font),
            feed: Some(feed),
            stats: None,
        }
    }
}

impl Plugin for LetterfallRenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(LetterfallHeadlessPlugin {
            config: self.config.clone(),
            font: self.font.clone(),
            feed: self.feed.clone(),
            stats: self.stats.clone(),
        });

        app.init_resource::<systems::GlyphMeshCache>()
            .init_resource::<systems::GlyphPalette>()
            .init_resource::<systems::VisualEntityMap>();

        app.add_systems(
            Startup,
            systems::setup_scene.after(systems::start_render_loop),
        );

        app.add_systems(
            Update,
            (systems::forward_window_pointer, systems::forward_mouse_wheel)
                .before(LetterfallSet::Input),
        );

        app.add_systems(
            Update,
            (systems::sync_frame_to_entities, systems::clear_released_visuals)
                .chain()
                .after(LetterfallSet::Input),
        );
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::Vec2;

    use super::*;
    use crate::bevy::test_utils::TestApp;
    use crate::impulse::ImpulseKind;
    use crate::interaction::{Affordance, PointerInput};
    use crate::letter::LetterState;
    use crate::scene::VisualId;

    #[test]
    fn test_sync_text_spawns_letters() {
        let mut app = TestApp::new();
        app.sync_text(&["AB"], "CD");

        assert_eq!(app.stats().letters, 4);
        assert_eq!(app.render_loop().registry().current_word(), 1);
    }

    #[test]
    fn test_fixed_step_advances_one_frame() {
        let mut app = TestApp::new();
        app.sync_text(&[], "HI");

        app.step_frames(1);

        assert_eq!(app.render_loop().frame(), 1);
        for letter in app.render_loop().registry().letters() {
            assert_eq!(letter.state, LetterState::Active);
        }
        let frame = app.world().resource::<FrameSlot>().take().unwrap();
        assert_eq!(frame.items.len(), 2);
    }

    #[test]
    fn test_update_without_fixed_step_does_not_tick() {
        let mut app = TestApp::new();
        app.update();
        app.update();
        assert_eq!(app.render_loop().frame(), 0);
    }

    #[test]
    fn test_impulse_command_reaches_current_word() {
        let mut app = TestApp::new();
        app.sync_text(&[], "GO");
        app.step_frames(1);

        app.push(TypingCommand::Impulse(ImpulseKind::Letter {
            char_index: 1,
            strength: 12.0,
        }));
        app.update();
        assert_eq!(app.render_loop().bus().version(), 1);
        app.step_frames(1);

        let render_loop = app.render_loop();
        let target = render_loop.registry().find(0, 1).unwrap();
        let other = render_loop.registry().find(0, 0).unwrap();
        let physics = &render_loop.stage().unwrap().physics;
        let target_v = physics.body_state(target.body()).unwrap().linvel;
        let other_v = physics.body_state(other.body()).unwrap().linvel;
        assert!(target_v.z < other_v.z);
    }

    #[test]
    fn test_reset_command_restores_origins() {
        let mut app = TestApp::new();
        app.sync_text(&[], "ABC");
        app.step_frames(20);

        app.push(TypingCommand::Reset);
        app.update();

        let render_loop = app.render_loop();
        let physics = &render_loop.stage().unwrap().physics;
        for letter in render_loop.registry().letters() {
            let position = physics.body_state(letter.body()).unwrap().translation;
            assert_eq!(position, letter.origin());
        }
    }

    #[test]
    fn test_input_recolours_letters() {
        let mut app = TestApp::new();
        app.sync_text(&[], "OK");
        app.push(TypingCommand::Input("OX".to_string()));
        app.update();

        let registry = app.render_loop().registry();
        assert_eq!(
            registry.find(0, 0).unwrap().material,
            crate::glyph::MaterialState::Correct
        );
        assert_eq!(
            registry.find(0, 1).unwrap().material,
            crate::glyph::MaterialState::Incorrect
        );
    }

    #[test]
    fn test_pointer_event_updates_affordance() {
        let mut app = TestApp::new();
        let viewport = Vec2::new(800.0, 600.0);

        app.world_mut()
            .write_message(PointerEvent::Pressed(PointerInput::new(Vec2::new(5.0, 5.0), viewport)));
        app.update();

        assert_eq!(
            app.world().resource::<PointerAffordance>().0,
            Affordance::Grabbing
        );

        app.world_mut()
            .write_message(PointerEvent::Released(PointerInput::new(Vec2::new(5.0, 5.0), viewport)));
        app.update();

        assert_eq!(app.world().resource::<PointerAffordance>().0, Affordance::Grab);
    }

    #[test]
    fn test_zoom_event_scales_camera() {
        let mut app = TestApp::new();
        app.world_mut().write_message(ZoomEvent(2.0));
        app.update();

        let zoom = app.render_loop().stage().unwrap().scene.rig().zoom();
        assert!((zoom - 1.21).abs() < 1e-4);
    }

    #[test]
    fn test_app_exit_tears_down() {
        let mut app = TestApp::new();
        app.sync_text(&[], "BYE");
        app.step_frames(1);

        app.world_mut().write_message(AppExit::Success);
        app.update();

        assert!(app.render_loop().is_torn_down());
        assert!(app.world().resource::<FrameSlot>().is_released());
        app.step_frames(1);
        assert_eq!(app.render_loop().frame(), 1);
    }

    #[test]
    fn test_expired_letters_emit_message() {
        let mut app = TestApp::new();
        app.sync_text(&[], "Q");
        app.step_frames(1);

        let body = app.render_loop().registry().letters()[0].body();
        app.world_mut()
            .resource_mut::<LetterfallRes>()
            .render_loop
            .stage_mut()
            .unwrap()
            .physics
            .reset_body(body, Vec3::new(0.0, -500.0, 0.0));
        app.step_frames(1);

        let messages = app.world().resource::<Messages<LettersExpiredEvent>>();
        let mut cursor = messages.get_cursor();
        let expired: Vec<_> = cursor.read(messages).collect();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].ids.len(), 1);
        assert_eq!(expired[0].stats.expired, 1);
        assert_eq!(app.stats().expired, 1);
        assert!(app.render_loop().stage().unwrap().scene.visual(VisualId(0)).is_none());
    }
}
