//! Entity registry: the ordered set of live letters.
//!
//! The registry pairs each letter's physics body with its visual and is the
//! only place that creates or destroys that pairing. Letters are appended in
//! order and only ever leave through [`EntityRegistry::expire`]. The
//! `(word_index, char_index)` of an expired letter stays reserved, so the same
//! position is never spawned twice.

use std::collections::{HashSet, VecDeque};

use bevy::math::{Quat, Vec3};

use crate::config::{LayoutConfig, LetterfallConfig, PhysicsConfig};
use crate::font::GlyphSource;
use crate::glyph::{GlyphCache, GlyphError, GlyphStyle, MaterialState};
use crate::letter::{Letter, LetterId, LetterState, LetterStats};
use crate::physics::{BodyShape, PhysicsWorld};
use crate::scene::{SceneManager, Surface, VisualId};

/// Smallest half extent given to a letter body.
const MIN_HALF_EXTENT: f32 = 0.05;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("letter ({word_index}, {char_index}) already exists")]
    Duplicate { word_index: usize, char_index: usize },
    #[error(transparent)]
    Glyph(#[from] GlyphError),
}

/// Everything the registry mutates when letters come and go.
#[derive(Debug)]
pub struct Stage {
    pub physics: PhysicsWorld,
    pub scene: SceneManager,
    pub glyphs: GlyphCache,
}

impl Stage {
    pub fn new(config: &LetterfallConfig, surface: Box<dyn Surface>) -> Self {
        Self {
            physics: PhysicsWorld::from_config(&config.physics),
            scene: SceneManager::new(config, surface),
            glyphs: GlyphCache::new(),
        }
    }
}

/// A letter waiting to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnRequest {
    pub glyph: char,
    pub word_index: usize,
    pub char_index: usize,
    /// Character count of the word, used for centring.
    pub word_len: usize,
}

/// Result of [`EntityRegistry::append_letter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Spawned(LetterId),
    /// Queued until the font resolves.
    Deferred,
}

#[derive(Debug)]
pub struct EntityRegistry {
    letters: Vec<Letter>,
    /// Live, queued and expired positions.
    reserved: HashSet<(usize, usize)>,
    deferred: VecDeque<SpawnRequest>,
    next_id: u64,
    expired: u64,
    history_seen: usize,
    current_word: usize,
    input: Vec<char>,
    layout: LayoutConfig,
    style: GlyphStyle,
    body_mass: f32,
}

impl EntityRegistry {
    pub fn new(config: &LetterfallConfig) -> Self {
        Self {
            letters: Vec::new(),
            reserved: HashSet::new(),
            deferred: VecDeque::new(),
            next_id: 0,
            expired: 0,
            history_seen: 0,
            current_word: 0,
            input: Vec::new(),
            layout: config.layout.clone(),
            style: config.glyph,
            body_mass: config.physics.body_mass,
        }
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Creates the letter for `request`, or queues it if `font` is not ready.
    ///
    /// Queued requests are replayed, in order, before any request made once the
    /// font is available.
    pub fn append_letter(
        &mut self,
        stage: &mut Stage,
        font: Option<&dyn GlyphSource>,
        request: SpawnRequest,
    ) -> Result<AppendOutcome, RegistryError> {
        let key = (request.word_index, request.char_index);
        if !self.reserved.insert(key) {
            return Err(RegistryError::Duplicate {
                word_index: request.word_index,
                char_index: request.char_index,
            });
        }

        let Some(font) = font else {
            self.deferred.push_back(request);
            tracing::debug!(
                "[registry] deferred {:?} at ({}, {}) until font is ready",
                request.glyph,
                request.word_index,
                request.char_index
            );
            return Ok(AppendOutcome::Deferred);
        };

        self.flush_deferred(stage, font);
        self.spawn(stage, font, request).map(AppendOutcome::Spawned)
    }

    /// Replays every queued request in its original order. Returns the number
    /// of letters created.
    pub fn flush_deferred(&mut self, stage: &mut Stage, font: &dyn GlyphSource) -> usize {
        if self.deferred.is_empty() {
            return 0;
        }
        tracing::info!("[registry] replaying {} deferred letters", self.deferred.len());

        let mut spawned = 0;
        while let Some(request) = self.deferred.pop_front() {
            match self.spawn(stage, font, request) {
                Ok(_) => spawned += 1,
                Err(e) => tracing::warn!("[registry] dropped deferred letter: {}", e),
            }
        }
        spawned
    }

    /// Appends every letter implied by the completed words and the current
    /// word that does not exist yet. Returns the number of letters requested.
    ///
    /// `current_text` is the whole word being typed; typed progress comes in
    /// through [`EntityRegistry::apply_input`].
    pub fn sync_text<S: AsRef<str>>(
        &mut self,
        stage: &mut Stage,
        font: Option<&dyn GlyphSource>,
        history: &[S],
        current_text: &str,
    ) -> Result<usize, RegistryError> {
        if history.len() < self.history_seen {
            tracing::warn!(
                "[registry] history shrank from {} to {} words; ignoring removed words",
                self.history_seen,
                history.len()
            );
        }

        let mut requests = Vec::new();
        for (word_index, word) in history.iter().enumerate().skip(self.history_seen) {
            self.collect_missing(word_index, word.as_ref(), &mut requests);
        }
        self.history_seen = history.len();
        if history.len() != self.current_word {
            // Keystrokes belong to the word that just completed.
            let previous = self.current_word;
            self.current_word = history.len();
            self.input.clear();
            self.refresh_materials(&mut stage.scene, previous.min(self.current_word));
        }
        self.collect_missing(self.current_word, current_text, &mut requests);

        let count = requests.len();
        for request in requests {
            self.append_letter(stage, font, request)?;
        }
        Ok(count)
    }

    fn collect_missing(&self, word_index: usize, word: &str, out: &mut Vec<SpawnRequest>) {
        let word_len = word.chars().count();
        out.extend(
            word.chars()
                .enumerate()
                .filter(|(char_index, _)| !self.reserved.contains(&(word_index, *char_index)))
                .map(|(char_index, glyph)| SpawnRequest {
                    glyph,
                    word_index,
                    char_index,
                    word_len,
                }),
        );
    }

    fn spawn(
        &mut self,
        stage: &mut Stage,
        font: &dyn GlyphSource,
        request: SpawnRequest,
    ) -> Result<LetterId, RegistryError> {
        let geometry = stage.glyphs.geometry(font, request.glyph, &self.style)?;
        let origin = self.spawn_position(request.word_index, request.char_index, request.word_len);
        let material = self.material_for(request.word_index, request.char_index, request.glyph);

        let body = stage.physics.add_body(
            BodyShape::Cuboid {
                half_extents: geometry.half_extents.max(Vec3::splat(MIN_HALF_EXTENT)),
            },
            self.body_mass,
            origin,
        );
        let visual = stage.scene.add_visual(geometry, material, origin);

        let id = LetterId(self.next_id);
        self.next_id += 1;

        let mut letter = Letter::new(
            id,
            request.glyph,
            (request.word_index, request.char_index),
            origin,
            body,
            visual,
        );
        letter.material = material;
        self.letters.push(letter);

        tracing::debug!(
            "[registry] spawned {} {:?} at ({}, {})",
            id,
            request.glyph,
            request.word_index,
            request.char_index
        );
        Ok(id)
    }

    /// Letters of a word are centred horizontally; later words spawn higher.
    pub fn spawn_position(&self, word_index: usize, char_index: usize, word_len: usize) -> Vec3 {
        #[allow(clippy::cast_precision_loss)]
        let (word_index, char_index, word_len) = (word_index as f32, char_index as f32, word_len as f32);
        let spacing = self.layout.spacing;
        let offset_x = -(word_len - 1.0).max(0.0) * spacing / 2.0;
        Vec3::new(
            offset_x + char_index * spacing,
            self.layout.base_height + word_index * self.layout.level_height,
            0.0,
        )
    }

    // ========================================================================
    // Typing state
    // ========================================================================

    /// Recolours the current word against the typed input.
    pub fn apply_input(&mut self, scene: &mut SceneManager, input: &str) {
        self.input = input.chars().collect();
        self.refresh_materials(scene, self.current_word);
    }

    /// Recomputes the material of every letter from `first_word` on.
    fn refresh_materials(&mut self, scene: &mut SceneManager, first_word: usize) {
        for i in 0..self.letters.len() {
            let letter = &self.letters[i];
            if letter.word_index < first_word {
                continue;
            }
            let material = self.material_for(letter.word_index, letter.char_index, letter.glyph);
            let letter = &mut self.letters[i];
            if letter.material != material {
                letter.material = material;
                scene.set_material(letter.visual(), material);
            }
        }
    }

    fn material_for(&self, word_index: usize, char_index: usize, glyph: char) -> MaterialState {
        if word_index < self.current_word {
            return MaterialState::Correct;
        }
        if word_index > self.current_word {
            return MaterialState::Pending;
        }
        match self.input.get(char_index) {
            Some(typed) if *typed == glyph => MaterialState::Correct,
            Some(_) => MaterialState::Incorrect,
            None => MaterialState::Pending,
        }
    }

    // ========================================================================
    // Removal and reset
    // ========================================================================

    /// Removes a letter's body and visual. Returns `false` if it was already
    /// expired or never existed.
    pub fn expire(&mut self, stage: &mut Stage, id: LetterId) -> bool {
        let Some(position) = self.letters.iter().position(|l| l.id == id) else {
            return false;
        };
        let mut letter = self.letters.remove(position);
        letter.state = LetterState::Expired;

        stage.physics.remove_body(letter.body());
        stage.scene.remove_visual(letter.visual());
        self.expired += 1;

        tracing::debug!(
            "[registry] expired {} {:?} (total expired: {})",
            id,
            letter.glyph,
            self.expired
        );
        true
    }

    /// Expires every letter whose body fell below `floor`. Returns the expired ids.
    pub fn cull(&mut self, stage: &mut Stage, floor: f32) -> Vec<LetterId> {
        let fallen: Vec<LetterId> = self
            .letters
            .iter()
            .filter(|l| {
                stage
                    .physics
                    .body_state(l.body())
                    .is_some_and(|s| s.translation.y < floor)
            })
            .map(|l| l.id)
            .collect();

        fallen.into_iter().filter(|id| self.expire(stage, *id)).collect()
    }

    /// Puts every letter back at its origin with no motion.
    pub fn reset(&mut self, stage: &mut Stage) {
        if self.letters.is_empty() {
            return;
        }
        for letter in &mut self.letters {
            stage.physics.reset_body(letter.body(), letter.origin());
            stage
                .scene
                .set_transform(letter.visual(), letter.origin(), Quat::IDENTITY);
            letter.state = LetterState::Pending;
        }
        tracing::info!("[registry] reset {} letters to their origins", self.letters.len());
    }

    /// Drops every letter without expiring it.
    pub fn clear(&mut self) {
        self.letters.clear();
        self.deferred.clear();
    }

    // ========================================================================
    // Per-frame updates
    // ========================================================================

    /// Advances lifecycle states from the latest physics step.
    pub fn update_lifecycle(&mut self, physics: &PhysicsWorld, config: &PhysicsConfig) {
        for letter in &mut self.letters {
            let Some(state) = physics.body_state(letter.body()) else {
                continue;
            };
            letter.state = match letter.state {
                LetterState::Pending => LetterState::Active,
                LetterState::Active | LetterState::Resting => {
                    let settled = state.sleeping
                        || (state.linvel.length() < config.rest_linear_speed
                            && state.angvel.length() < config.rest_angular_speed);
                    if settled {
                        LetterState::Resting
                    } else {
                        LetterState::Active
                    }
                }
                LetterState::Expired => LetterState::Expired,
            };
        }
    }

    /// Copies body transforms onto visuals.
    pub fn sync_visuals(&self, stage: &mut Stage) {
        for letter in &self.letters {
            if let Some(state) = stage.physics.body_state(letter.body()) {
                stage
                    .scene
                    .set_transform(letter.visual(), state.translation, state.rotation);
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn find(&self, word_index: usize, char_index: usize) -> Option<&Letter> {
        self.letters
            .iter()
            .find(|l| l.word_index == word_index && l.char_index == char_index)
    }

    pub fn get(&self, id: LetterId) -> Option<&Letter> {
        self.letters.iter().find(|l| l.id == id)
    }

    pub fn by_visual(&self, visual: VisualId) -> Option<&Letter> {
        self.letters.iter().find(|l| l.visual() == visual)
    }

    pub fn letters(&self) -> &[Letter] {
        &self.letters
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    pub fn current_word(&self) -> usize {
        self.current_word
    }

    pub fn expired_count(&self) -> u64 {
        self.expired
    }

    pub fn pending_spawns(&self) -> usize {
        self.deferred.len()
    }

    pub fn stats(&self, glyphs: &GlyphCache) -> LetterStats {
        LetterStats {
            letters: self.letters.len(),
            resting: self
                .letters
                .iter()
                .filter(|l| l.state == LetterState::Resting)
                .count(),
            expired: self.expired,
            pending_spawns: self.deferred.len(),
            cached_glyphs: glyphs.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::font::BlockGlyphs;
    use crate::scene::HeadlessSurface;

    fn setup() -> (EntityRegistry, Stage) {
        let config = LetterfallConfig::default();
        (
            EntityRegistry::new(&config),
            Stage::new(&config, Box::new(HeadlessSurface::default())),
        )
    }

    fn request(glyph: char, word_index: usize, char_index: usize, word_len: usize) -> SpawnRequest {
        SpawnRequest {
            glyph,
            word_index,
            char_index,
            word_len,
        }
    }

    #[test]
    fn test_sync_text_creates_one_letter_per_character() {
        let (mut registry, mut stage) = setup();
        let history = ["HELLO", "WORLD"];

        let count = registry
            .sync_text(&mut stage, Some(&BlockGlyphs), &history, "TYPE")
            .unwrap();

        assert_eq!(count, 14);
        assert_eq!(registry.len(), 5 + 5 + 4);
        let keys: HashSet<_> = registry.letters().iter().map(Letter::key).collect();
        assert_eq!(keys.len(), registry.len());
        assert_eq!(stage.physics.dynamic_body_count(), 14);
        assert_eq!(stage.scene.visual_count(), 14);
    }

    #[test]
    fn test_sync_text_is_incremental() {
        let (mut registry, mut stage) = setup();
        let font = Some(&BlockGlyphs as &dyn GlyphSource);

        registry.sync_text::<&str>(&mut stage, font, &[], "AB").unwrap();
        assert_eq!(registry.len(), 2);

        // Completing the word moves it into history; nothing new is spawned for it.
        let added = registry
            .sync_text(&mut stage, font, &["AB"], "CDE")
            .unwrap();
        assert_eq!(added, 3);
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.current_word(), 1);
    }

    #[test]
    fn test_history_and_current_word_scenario() {
        let (mut registry, mut stage) = setup();
        registry
            .sync_text(&mut stage, Some(&BlockGlyphs), &["AB"], "CD")
            .unwrap();
        registry.apply_input(&mut stage.scene, "C");

        assert_eq!(registry.len(), 4);
        for glyph in ['A', 'B'] {
            let letter = registry.letters().iter().find(|l| l.glyph == glyph).unwrap();
            assert_eq!(letter.word_index, 0);
        }
        let c = registry.find(1, 0).unwrap();
        let d = registry.find(1, 1).unwrap();
        assert_eq!((c.glyph, d.glyph), ('C', 'D'));
        assert_eq!(c.material, MaterialState::Correct);
        assert_eq!(d.material, MaterialState::Pending);
        assert_eq!(
            stage.scene.visual(c.visual()).unwrap().material,
            MaterialState::Correct
        );
    }

    #[test]
    fn test_new_word_starts_untyped() {
        let (mut registry, mut stage) = setup();
        let font = Some(&BlockGlyphs as &dyn GlyphSource);
        registry.sync_text::<&str>(&mut stage, font, &[], "AB").unwrap();
        registry.apply_input(&mut stage.scene, "AX");
        assert_eq!(registry.find(0, 1).unwrap().material, MaterialState::Incorrect);

        registry.sync_text(&mut stage, font, &["AB"], "AX").unwrap();

        assert_eq!(registry.find(1, 0).unwrap().material, MaterialState::Pending);
        assert_eq!(registry.find(1, 1).unwrap().material, MaterialState::Pending);
        // The completed word is now drawn as history.
        let b = registry.find(0, 1).unwrap();
        assert_eq!(b.material, MaterialState::Correct);
        assert_eq!(
            stage.scene.visual(b.visual()).unwrap().material,
            MaterialState::Correct
        );
    }

    #[test]
    fn test_incorrect_input_marks_letter() {
        let (mut registry, mut stage) = setup();
        registry
            .sync_text::<&str>(&mut stage, Some(&BlockGlyphs), &[], "CAT")
            .unwrap();
        registry.apply_input(&mut stage.scene, "CX");

        assert_eq!(registry.find(0, 0).unwrap().material, MaterialState::Correct);
        assert_eq!(registry.find(0, 1).unwrap().material, MaterialState::Incorrect);
        assert_eq!(registry.find(0, 2).unwrap().material, MaterialState::Pending);
    }

    #[test]
    fn test_duplicate_pair_is_rejected() {
        let (mut registry, mut stage) = setup();
        registry
            .append_letter(&mut stage, Some(&BlockGlyphs), request('A', 0, 0, 1))
            .unwrap();

        let err = registry
            .append_letter(&mut stage, Some(&BlockGlyphs), request('B', 0, 0, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Duplicate {
                word_index: 0,
                char_index: 0
            }
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_spawn_position_centres_word() {
        let (registry, _) = setup();
        let first = registry.spawn_position(0, 0, 4);
        let last = registry.spawn_position(0, 3, 4);
        assert!((first.x + 5.4).abs() < 1e-5);
        assert!((last.x - 5.4).abs() < 1e-5);
        assert_eq!(first.y, 5.0);
        assert_eq!(first.z, 0.0);

        let stacked = registry.spawn_position(2, 0, 1);
        assert_eq!(stacked, Vec3::new(0.0, 13.0, 0.0));
    }

    #[test]
    fn test_deferred_requests_replay_in_order() {
        let (mut registry, mut stage) = setup();
        let outcome = registry
            .sync_text::<&str>(&mut stage, None, &[], "XYZ")
            .unwrap();
        assert_eq!(outcome, 3);
        assert!(registry.is_empty());
        assert_eq!(registry.pending_spawns(), 3);

        assert_eq!(registry.flush_deferred(&mut stage, &BlockGlyphs), 3);

        let glyphs: String = registry.letters().iter().map(|l| l.glyph).collect();
        assert_eq!(glyphs, "XYZ");
        let ids: Vec<u64> = registry.letters().iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(registry.pending_spawns(), 0);
    }

    #[test]
    fn test_ready_font_replays_queue_first() {
        let (mut registry, mut stage) = setup();
        registry
            .append_letter(&mut stage, None, request('A', 0, 0, 2))
            .unwrap();

        let outcome = registry
            .append_letter(&mut stage, Some(&BlockGlyphs), request('B', 0, 1, 2))
            .unwrap();

        assert_eq!(outcome, AppendOutcome::Spawned(LetterId(1)));
        assert_eq!(registry.letters()[0].glyph, 'A');
        assert_eq!(registry.letters()[1].glyph, 'B');
    }

    #[test]
    fn test_expire_is_idempotent() {
        let (mut registry, mut stage) = setup();
        registry
            .sync_text::<&str>(&mut stage, Some(&BlockGlyphs), &[], "AB")
            .unwrap();
        let id = registry.find(0, 0).unwrap().id;

        assert!(registry.expire(&mut stage, id));
        assert!(!registry.expire(&mut stage, id));

        assert_eq!(registry.expired_count(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(stage.physics.dynamic_body_count(), 1);
        assert_eq!(stage.scene.visual_count(), 1);
    }

    #[test]
    fn test_expired_pair_is_not_respawned() {
        let (mut registry, mut stage) = setup();
        registry
            .sync_text::<&str>(&mut stage, Some(&BlockGlyphs), &[], "AB")
            .unwrap();
        let id = registry.find(0, 0).unwrap().id;
        registry.expire(&mut stage, id);

        let added = registry
            .sync_text::<&str>(&mut stage, Some(&BlockGlyphs), &[], "AB")
            .unwrap();
        assert_eq!(added, 0);
        assert!(registry.find(0, 0).is_none());
    }

    #[test]
    fn test_cull_expires_fallen_letter_once() {
        let (mut registry, mut stage) = setup();
        registry
            .sync_text(&mut stage, Some(&BlockGlyphs), &["A"], "A")
            .unwrap();
        let fallen = registry.find(0, 0).unwrap();
        let (id, body) = (fallen.id, fallen.body());
        let key = stage.scene.visual(fallen.visual()).unwrap().geometry.key;

        stage.physics.reset_body(body, Vec3::new(0.0, -150.0, 0.0));

        assert_eq!(registry.cull(&mut stage, -100.0), vec![id]);
        assert!(registry.cull(&mut stage, -100.0).is_empty());
        assert_eq!(registry.expired_count(), 1);
        // The other 'A' still uses the cached geometry.
        assert!(stage.glyphs.contains(&key));
        assert!(registry.find(1, 0).is_some());
    }

    #[test]
    fn test_reset_restores_origins() {
        let (mut registry, mut stage) = setup();
        registry
            .sync_text(&mut stage, Some(&BlockGlyphs), &["HI"], "YOU")
            .unwrap();
        stage.physics.step_n(40);
        for letter in registry.letters() {
            stage
                .physics
                .apply_impulse(letter.body(), Vec3::new(3.0, 2.0, -4.0), Vec3::new(0.2, 0.1, 0.0));
        }
        stage.physics.step_n(10);

        registry.reset(&mut stage);
        stage.physics.step();

        for letter in registry.letters() {
            let state = stage.physics.body_state(letter.body()).unwrap();
            assert!(
                state.translation.distance(letter.origin()) < 0.02,
                "{} drifted to {:?}",
                letter.id,
                state.translation
            );
        }
    }

    #[test]
    fn test_reset_on_empty_registry_is_noop() {
        let (mut registry, mut stage) = setup();
        registry.reset(&mut stage);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lifecycle_pending_to_active() {
        let (mut registry, mut stage) = setup();
        registry
            .sync_text::<&str>(&mut stage, Some(&BlockGlyphs), &[], "A")
            .unwrap();
        assert_eq!(registry.letters()[0].state, LetterState::Pending);

        stage.physics.step();
        registry.update_lifecycle(&stage.physics, &PhysicsConfig::default());

        assert_eq!(registry.letters()[0].state, LetterState::Active);
    }

    #[test]
    fn test_stats_reflect_registry() {
        let (mut registry, mut stage) = setup();
        registry
            .sync_text::<&str>(&mut stage, Some(&BlockGlyphs), &[], "AA")
            .unwrap();
        registry
            .append_letter(&mut stage, None, request('Q', 5, 0, 1))
            .unwrap();

        let stats = registry.stats(&stage.glyphs);
        assert_eq!(stats.letters, 2);
        assert_eq!(stats.pending_spawns, 1);
        assert_eq!(stats.cached_glyphs, 1);
        assert_eq!(stats.expired, 0);
    }
}
