//! The per-frame driver.
//!
//! `RenderLoop` owns the whole stage (physics, scene, glyph cache), the entity
//! registry, the impulse bus and the interaction controller, and mutates them
//! from one thread only. A host calls [`RenderLoop::tick`] once per display
//! refresh; each tick runs exactly one frame and re-arms the next one.
//!
//! Frame order:
//! 1. replay deferred letters once the font is ready
//! 2. consume the impulse bus (once per version)
//! 3. lift orbit suspension left by a letter press
//! 4. step physics, then advance letter lifecycles
//! 5. ease the camera rig
//! 6. cull letters below the floor
//! 7. sync visuals from bodies
//! 8. render

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::LetterfallConfig;
use crate::font::{Deferred, GlyphSource, SharedGlyphSource};
use crate::impulse::{self, ImpulseBus, ImpulseCursor, ImpulseKind};
use crate::interaction::{Affordance, InteractionController, InteractionState, PointerInput};
use crate::letter::{LetterId, LetterStats};
use crate::registry::{EntityRegistry, RegistryError, Stage};
use crate::scene::Surface;

/// Callback receiving the counters after every frame.
pub type StatsObserver = Box<dyn FnMut(&LetterStats) + Send + Sync>;

/// Summary of one rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub stats: LetterStats,
    /// Letters expired during this frame.
    pub expired: Vec<LetterId>,
    /// Letters touched by the impulse consumed this frame.
    pub impulsed: Vec<LetterId>,
    /// `false` if the surface refused the frame.
    pub presented: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Rendered(FrameReport),
    /// The loop is not armed (not started, or torn down).
    Cancelled,
}

pub struct RenderLoop {
    config: LetterfallConfig,
    stage: Option<Stage>,
    registry: EntityRegistry,
    bus: ImpulseBus,
    cursor: ImpulseCursor,
    interaction: InteractionController,
    font: Option<Deferred<SharedGlyphSource>>,
    font_failure_reported: bool,
    rng: ChaCha8Rng,
    armed: bool,
    frame: u64,
    observer: Option<StatsObserver>,
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("frame", &self.frame)
            .field("armed", &self.armed)
            .field("letters", &self.registry.len())
            .field("torn_down", &self.stage.is_none())
            .finish_non_exhaustive()
    }
}

impl RenderLoop {
    pub fn new(
        config: LetterfallConfig,
        surface: Box<dyn Surface>,
        font: Deferred<SharedGlyphSource>,
    ) -> Self {
        let stage = Stage::new(&config, surface);
        let registry = EntityRegistry::new(&config);
        let bus = ImpulseBus::new();
        let cursor = bus.cursor();
        Self {
            interaction: InteractionController::new(config.impulse.press),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            stage: Some(stage),
            registry,
            bus,
            cursor,
            font: Some(font),
            font_failure_reported: false,
            armed: false,
            frame: 0,
            observer: None,
            config,
        }
    }

    /// Arms the first frame. No-op after teardown.
    pub fn start(&mut self) {
        if self.stage.is_some() && !self.armed {
            self.armed = true;
            tracing::info!("[loop] started");
        }
    }

    pub fn is_running(&self) -> bool {
        self.armed
    }

    pub fn set_observer(&mut self, observer: StatsObserver) {
        self.observer = Some(observer);
    }

    /// Runs one frame if the loop is armed.
    pub fn tick(&mut self) -> FrameOutcome {
        if !self.armed {
            return FrameOutcome::Cancelled;
        }
        let Some(stage) = self.stage.as_mut() else {
            self.armed = false;
            return FrameOutcome::Cancelled;
        };
        self.armed = false;

        let font = ready_font(self.font.as_ref(), &mut self.font_failure_reported);
        if let Some(font) = &font {
            self.registry.flush_deferred(stage, font.as_ref());
        }

        let impulsed = match self.cursor.poll(&self.bus) {
            Some(event) => impulse::apply(
                &event,
                &self.registry,
                &mut stage.physics,
                &mut self.rng,
                &self.config.impulse,
            ),
            None => Vec::new(),
        };

        self.interaction.on_tick(&mut stage.scene);

        stage.physics.step();
        self.registry
            .update_lifecycle(&stage.physics, &self.config.physics);

        stage.scene.rig_mut().update();

        let expired = self
            .registry
            .cull(stage, self.config.physics.floor_threshold);
        for id in &expired {
            self.interaction.forget(*id);
        }

        self.registry.sync_visuals(stage);

        let presented = match stage.scene.render() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("[loop] frame {} not presented: {}", self.frame, e);
                false
            }
        };

        let stats = self.registry.stats(&stage.glyphs);
        if let Some(observer) = self.observer.as_mut() {
            observer(&stats);
        }

        self.frame += 1;
        self.armed = true;
        FrameOutcome::Rendered(FrameReport {
            frame: self.frame,
            stats,
            expired,
            impulsed,
            presented,
        })
    }

    /// Cancels the armed frame and releases the stage. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.armed = false;
        self.font = None;
        self.observer = None;
        if let Some(mut stage) = self.stage.take() {
            self.registry.clear();
            stage.scene.release();
            tracing::info!("[loop] torn down after {} frames", self.frame);
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.stage.is_none()
    }

    // ========================================================================
    // Host inputs
    // ========================================================================

    /// Spawns the letters implied by `history` and `current_text`.
    pub fn sync_text<S: AsRef<str>>(
        &mut self,
        history: &[S],
        current_text: &str,
    ) -> Result<usize, RegistryError> {
        let Some(stage) = self.stage.as_mut() else {
            return Ok(0);
        };
        let font = ready_font(self.font.as_ref(), &mut self.font_failure_reported);
        let font: Option<&dyn GlyphSource> = font.as_deref();
        self.registry.sync_text(stage, font, history, current_text)
    }

    pub fn apply_input(&mut self, input: &str) {
        if let Some(stage) = self.stage.as_mut() {
            self.registry.apply_input(&mut stage.scene, input);
        }
    }

    /// Publishes a typing impulse; it is applied before the next physics step.
    pub fn publish_impulse(&mut self, kind: ImpulseKind) -> u64 {
        self.bus.publish(kind)
    }

    pub fn pointer_move(&mut self, pointer: PointerInput) -> Affordance {
        match self.stage.as_mut() {
            Some(stage) => self
                .interaction
                .pointer_move(&mut stage.scene, &self.registry, pointer),
            None => self.interaction.affordance(),
        }
    }

    pub fn pointer_down(&mut self, pointer: PointerInput) -> InteractionState {
        match self.stage.as_mut() {
            Some(stage) => self.interaction.pointer_down(stage, &self.registry, pointer),
            None => self.interaction.state(),
        }
    }

    pub fn pointer_up(&mut self, pointer: PointerInput) -> Affordance {
        match self.stage.as_mut() {
            Some(stage) => self
                .interaction
                .pointer_up(&mut stage.scene, &self.registry, pointer),
            None => self.interaction.affordance(),
        }
    }

    /// Wheel zoom on the camera rig.
    pub fn zoom(&mut self, wheel: f32) {
        if let Some(stage) = self.stage.as_mut() {
            stage.scene.rig_mut().zoom_by(wheel);
        }
    }

    /// Puts every letter back at its spawn position.
    pub fn reset(&mut self) {
        if let Some(stage) = self.stage.as_mut() {
            self.interaction.clear(&mut stage.scene);
            self.registry.reset(stage);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn stats(&self) -> LetterStats {
        match &self.stage {
            Some(stage) => self.registry.stats(&stage.glyphs),
            None => LetterStats {
                expired: self.registry.expired_count(),
                ..LetterStats::default()
            },
        }
    }

    pub fn affordance(&self) -> Affordance {
        self.interaction.affordance()
    }

    pub fn interaction_state(&self) -> InteractionState {
        self.interaction.state()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn stage(&self) -> Option<&Stage> {
        self.stage.as_ref()
    }

    pub fn stage_mut(&mut self) -> Option<&mut Stage> {
        self.stage.as_mut()
    }

    pub fn bus(&self) -> &ImpulseBus {
        &self.bus
    }

    pub fn config(&self) -> &LetterfallConfig {
        &self.config
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// The font if it has resolved; reports a failed resolution once.
fn ready_font(
    font: Option<&Deferred<SharedGlyphSource>>,
    failure_reported: &mut bool,
) -> Option<SharedGlyphSource> {
    let font = font?;
    if let Some(source) = font.get() {
        return Some(source);
    }
    if font.is_failed() && !*failure_reported {
        *failure_reported = true;
        tracing::warn!("[loop] font failed to resolve; letters stay deferred");
    }
    None
}
