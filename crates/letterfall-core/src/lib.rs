//! Letterfall core library.
//!
//! Typed characters become extruded 3D glyphs that fall under `Rapier3D`
//! physics. The engine is plain Rust: a [`RenderLoop`] owns the physics world,
//! scene and glyph cache and advances them one frame per tick. The `bevy`
//! module wraps it in plugins for headless tests and windowed rendering.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod camera;
pub mod config;
pub mod font;
pub mod glyph;
pub mod impulse;
pub mod interaction;
pub mod letter;
pub mod physics;
pub mod registry;
pub mod render_loop;
pub mod scene;
pub mod tessellate;

// Bevy integration
pub mod bevy;

pub use camera::{CameraProjection, CameraView, OrbitRig, Ray};
pub use config::{ConfigError, LetterfallConfig};
pub use font::{
    BlockGlyphs, Deferred, DeferredState, FontError, FontQuery, GlyphSource, Resolver,
    SharedGlyphSource, TtfGlyphSource, load_font_file, load_system_font,
};
pub use glyph::{GlyphCache, GlyphError, GlyphGeometry, GlyphKey, GlyphStyle, MaterialState};
pub use impulse::{ImpulseBus, ImpulseCursor, ImpulseEvent, ImpulseKind};
pub use interaction::{Affordance, InteractionController, InteractionState, PointerInput};
pub use letter::{Letter, LetterId, LetterState, LetterStats};
pub use physics::{PHYSICS_DT, PhysicsWorld, default_gravity};
pub use registry::{EntityRegistry, RegistryError, SpawnRequest, Stage};
pub use render_loop::{FrameOutcome, FrameReport, RenderLoop};
pub use scene::{Frame, HeadlessSurface, SceneManager, Surface, SurfaceError, VisualId};
