//! Versioned impulse channel and the impulses it triggers.
//!
//! The bus keeps only the most recent event. Every publish bumps a version
//! number; a consumer remembers the last version it handled through an
//! [`ImpulseCursor`] and therefore sees each event at most once, however often
//! it polls.

use bevy::math::Vec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::ImpulseConfig;
use crate::letter::LetterId;
use crate::physics::PhysicsWorld;
use crate::registry::EntityRegistry;

/// What an impulse event asks for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImpulseKind {
    /// Nudge one letter of the current word.
    Letter { char_index: usize, strength: f32 },
    /// Scatter every letter.
    Word { strength: f32 },
}

impl ImpulseKind {
    pub fn strength(&self) -> f32 {
        match *self {
            Self::Letter { strength, .. } | Self::Word { strength } => strength,
        }
    }

    fn with_strength(self, strength: f32) -> Self {
        match self {
            Self::Letter { char_index, .. } => Self::Letter {
                char_index,
                strength,
            },
            Self::Word { .. } => Self::Word { strength },
        }
    }
}

/// An event together with the version it was published under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulseEvent {
    pub kind: ImpulseKind,
    pub version: u64,
}

/// Single-slot, last-value broadcast channel.
#[derive(Debug, Default)]
pub struct ImpulseBus {
    slot: Option<ImpulseEvent>,
    version: u64,
}

impl ImpulseBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current event and returns its version.
    pub fn publish(&mut self, kind: ImpulseKind) -> u64 {
        let kind = if kind.strength().is_finite() && kind.strength() >= 0.0 {
            kind
        } else {
            tracing::warn!("[impulse] clamped invalid strength {}", kind.strength());
            kind.with_strength(0.0)
        };
        self.version += 1;
        self.slot = Some(ImpulseEvent {
            kind,
            version: self.version,
        });
        self.version
    }

    pub fn latest(&self) -> Option<&ImpulseEvent> {
        self.slot.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// A cursor that has not seen any event yet.
    pub fn cursor(&self) -> ImpulseCursor {
        ImpulseCursor { seen: 0 }
    }
}

/// Consumer-side position in an [`ImpulseBus`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpulseCursor {
    seen: u64,
}

impl ImpulseCursor {
    /// Returns the current event if its version has not been seen before.
    pub fn poll(&mut self, bus: &ImpulseBus) -> Option<ImpulseEvent> {
        let event = *bus.latest()?;
        if event.version <= self.seen {
            return None;
        }
        self.seen = event.version;
        Some(event)
    }
}

/// Applies an event to the letters it targets. Returns the letters touched.
///
/// A letter-kind event addresses `char_index` within the current word; an
/// index with no matching letter is ignored.
pub fn apply(
    event: &ImpulseEvent,
    registry: &EntityRegistry,
    physics: &mut PhysicsWorld,
    rng: &mut ChaCha8Rng,
    config: &ImpulseConfig,
) -> Vec<LetterId> {
    match event.kind {
        ImpulseKind::Letter {
            char_index,
            strength,
        } => {
            let Some(letter) = registry.find(registry.current_word(), char_index) else {
                tracing::debug!(
                    "[impulse] no letter at index {} of word {}; ignored",
                    char_index,
                    registry.current_word()
                );
                return Vec::new();
            };
            let impulse = Vec3::new(0.0, config.letter_lift * strength, -strength);
            physics.apply_impulse(letter.body(), impulse, Vec3::ZERO);
            vec![letter.id]
        }
        ImpulseKind::Word { strength } => {
            let s = strength.min(config.word_cap);
            let mut touched = Vec::with_capacity(registry.len());
            for letter in registry.letters() {
                let impulse = scatter(rng, s);
                if physics.apply_impulse(letter.body(), impulse, Vec3::ZERO) {
                    touched.push(letter.id);
                }
            }
            tracing::debug!("[impulse] scattered {} letters at strength {}", touched.len(), s);
            touched
        }
    }
}

/// Random scatter vector: sideways either way, upward, always away from the camera.
fn scatter(rng: &mut ChaCha8Rng, strength: f32) -> Vec3 {
    if strength <= 0.0 {
        return Vec3::ZERO;
    }
    let half = strength / 2.0;
    Vec3::new(
        rng.random_range(-half..=half),
        rng.random_range(0.0..=half),
        -rng.random_range(0.1 * strength..=strength),
    )
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::config::LetterfallConfig;
    use crate::font::BlockGlyphs;
    use crate::letter::LetterState;
    use crate::registry::Stage;
    use crate::scene::HeadlessSurface;

    fn setup(history: &[&str], current: &str) -> (EntityRegistry, Stage) {
        let config = LetterfallConfig::default();
        let mut registry = EntityRegistry::new(&config);
        let mut stage = Stage::new(&config, Box::new(HeadlessSurface::default()));
        registry
            .sync_text(&mut stage, Some(&BlockGlyphs), history, current)
            .unwrap();
        (registry, stage)
    }

    fn velocities(registry: &EntityRegistry, physics: &PhysicsWorld) -> Vec<Vec3> {
        registry
            .letters()
            .iter()
            .map(|l| physics.body_state(l.body()).unwrap().linvel)
            .collect()
    }

    #[test]
    fn test_each_version_is_consumed_once() {
        let mut bus = ImpulseBus::new();
        let mut cursor = bus.cursor();
        assert!(cursor.poll(&bus).is_none());

        let v1 = bus.publish(ImpulseKind::Word { strength: 10.0 });
        assert_eq!(cursor.poll(&bus).map(|e| e.version), Some(v1));
        assert!(cursor.poll(&bus).is_none());

        let v2 = bus.publish(ImpulseKind::Word { strength: 10.0 });
        assert!(v2 > v1);
        assert_eq!(cursor.poll(&bus).map(|e| e.version), Some(v2));
    }

    #[test]
    fn test_only_latest_event_is_kept() {
        let mut bus = ImpulseBus::new();
        let mut cursor = bus.cursor();
        bus.publish(ImpulseKind::Letter {
            char_index: 0,
            strength: 1.0,
        });
        bus.publish(ImpulseKind::Letter {
            char_index: 1,
            strength: 1.0,
        });

        let event = cursor.poll(&bus).unwrap();
        assert!(matches!(event.kind, ImpulseKind::Letter { char_index: 1, .. }));
        assert!(cursor.poll(&bus).is_none());
    }

    #[test]
    fn test_negative_strength_is_clamped() {
        let mut bus = ImpulseBus::new();
        bus.publish(ImpulseKind::Word { strength: -5.0 });
        assert_eq!(bus.latest().unwrap().kind.strength(), 0.0);
    }

    #[test]
    fn test_letter_impulse_targets_current_word() {
        let (registry, mut stage) = setup(&["AB"], "CD");
        stage.physics.step();
        let before = velocities(&registry, &stage.physics);

        let event = ImpulseEvent {
            kind: ImpulseKind::Letter {
                char_index: 1,
                strength: 12.0,
            },
            version: 1,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let touched = apply(&event, &registry, &mut stage.physics, &mut rng, &ImpulseConfig::default());

        let target = registry.find(1, 1).unwrap();
        assert_eq!(touched, vec![target.id]);
        let after = velocities(&registry, &stage.physics);
        for (i, letter) in registry.letters().iter().enumerate() {
            if letter.id == target.id {
                assert!(after[i].z < before[i].z);
            } else {
                assert_eq!(after[i], before[i]);
            }
        }
    }

    #[test]
    fn test_letter_lift_follows_config() {
        let (registry, mut stage) = setup(&[], "A");
        let body = registry.find(0, 0).unwrap().body();
        stage.physics.step();
        let before = stage.physics.body_state(body).unwrap().linvel;
        let config = ImpulseConfig {
            letter_lift: 0.5,
            ..ImpulseConfig::default()
        };
        let event = ImpulseEvent {
            kind: ImpulseKind::Letter {
                char_index: 0,
                strength: 10.0,
            },
            version: 1,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        apply(&event, &registry, &mut stage.physics, &mut rng, &config);

        let delta = stage.physics.body_state(body).unwrap().linvel - before;
        assert!(delta.z < 0.0, "{delta:?}");
        assert!((delta.y / -delta.z - 0.5).abs() < 1e-4, "{delta:?}");
    }

    #[test]
    fn test_out_of_range_letter_impulse_is_ignored() {
        let (registry, mut stage) = setup(&[], "AB");
        let hash = stage.physics.compute_hash();
        let event = ImpulseEvent {
            kind: ImpulseKind::Letter {
                char_index: 9,
                strength: 12.0,
            },
            version: 1,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let touched = apply(&event, &registry, &mut stage.physics, &mut rng, &ImpulseConfig::default());

        assert!(touched.is_empty());
        assert_eq!(stage.physics.compute_hash(), hash);
    }

    #[test]
    fn test_word_impulse_scatters_every_letter() {
        let config = LetterfallConfig::default();
        let (mut registry, mut stage) = setup(&[], "WORD");
        // Let the letters land and settle.
        for _ in 0..360 {
            stage.physics.step();
            registry.update_lifecycle(&stage.physics, &config.physics);
        }
        assert!(
            registry
                .letters()
                .iter()
                .all(|l| l.state == LetterState::Resting)
        );
        let before = velocities(&registry, &stage.physics);

        let event = ImpulseEvent {
            kind: ImpulseKind::Word { strength: 80.0 },
            version: 1,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let touched = apply(&event, &registry, &mut stage.physics, &mut rng, &ImpulseConfig::default());
        assert_eq!(touched.len(), 4);

        let deltas: Vec<Vec3> = velocities(&registry, &stage.physics)
            .iter()
            .zip(&before)
            .map(|(after, before)| *after - *before)
            .collect();
        for delta in &deltas {
            assert!(delta.z < 0.0, "depth component should be negative: {delta:?}");
        }
        for i in 0..deltas.len() {
            for j in (i + 1)..deltas.len() {
                assert!(!deltas[i].abs_diff_eq(deltas[j], 1e-4));
            }
        }
    }

    #[test]
    fn test_word_impulse_is_clamped_to_cap() {
        let (registry, mut stage) = setup(&[], "CAPS");
        let before = velocities(&registry, &stage.physics);
        let config = ImpulseConfig::default();
        let event = ImpulseEvent {
            kind: ImpulseKind::Word { strength: 10_000.0 },
            version: 1,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        apply(&event, &registry, &mut stage.physics, &mut rng, &config);

        let half = config.word_cap / 2.0 + 1e-3;
        for (after, before) in velocities(&registry, &stage.physics).iter().zip(&before) {
            let delta = *after - *before;
            assert!(delta.x.abs() <= half, "{delta:?}");
            assert!(delta.y <= half, "{delta:?}");
            assert!(delta.z >= -config.word_cap - 1e-3, "{delta:?}");
        }
    }

    #[test]
    fn test_word_strength_is_capped() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let v = scatter(&mut rng, 120.0);
            assert!(v.x.abs() <= 60.0);
            assert!((0.0..=60.0).contains(&v.y));
            assert!((-120.0..=-12.0).contains(&v.z));
        }
        assert_eq!(scatter(&mut rng, 0.0), Vec3::ZERO);
    }
}
