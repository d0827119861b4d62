//! Runtime configuration for the letterfall engine.
//!
//! Every section deserializes with defaults, so a JSON file only needs to
//! name the values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::glyph::GlyphStyle;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LetterfallConfig {
    pub physics: PhysicsConfig,
    pub layout: LayoutConfig,
    pub glyph: GlyphStyle,
    pub impulse: ImpulseConfig,
    pub camera: CameraConfig,
    pub scene: SceneConfig,
    /// Seed for the word-scatter RNG.
    pub rng_seed: u64,
}

impl LetterfallConfig {
    /// Parses a JSON document and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn non_negative(name: &str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be >= 0, got {value}")))
            }
        }
        fn positive(name: &str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be > 0, got {value}")))
            }
        }

        positive("physics.dt", self.physics.dt)?;
        positive("physics.body_mass", self.physics.body_mass)?;
        non_negative("physics.angular_damping", self.physics.angular_damping)?;
        positive("layout.spacing", self.layout.spacing)?;
        positive("glyph.size", self.glyph.size)?;
        positive("glyph.depth", self.glyph.depth)?;
        positive("glyph.tolerance", self.glyph.tolerance)?;
        non_negative("impulse.letter_correct", self.impulse.letter_correct)?;
        non_negative("impulse.letter_incorrect", self.impulse.letter_incorrect)?;
        non_negative("impulse.letter_lift", self.impulse.letter_lift)?;
        non_negative("impulse.word_cap", self.impulse.word_cap)?;
        non_negative("impulse.press", self.impulse.press)?;
        positive("camera.distance", self.camera.distance)?;
        positive("camera.half_height", self.camera.half_height)?;

        if let Some(fov_y) = self.camera.fov_y
            && !(fov_y > 0.0 && fov_y < 180.0)
        {
            return Err(ConfigError::Invalid(format!(
                "camera.fov_y must be in (0, 180), got {fov_y}"
            )));
        }
        if !(self.camera.damping > 0.0 && self.camera.damping <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.damping must be in (0, 1], got {}",
                self.camera.damping
            )));
        }
        if self.physics.floor_threshold >= self.physics.ground_center[1] {
            return Err(ConfigError::Invalid(
                "physics.floor_threshold must lie below the ground".to_string(),
            ));
        }
        Ok(())
    }
}

/// Physics world settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity vector (world units/s²).
    pub gravity: [f32; 3],
    /// Fixed simulation timestep in seconds.
    pub dt: f32,
    /// Ground box center.
    pub ground_center: [f32; 3],
    /// Ground box half extents.
    pub ground_half_extents: [f32; 3],
    /// Letters whose body falls below this height are expired.
    pub floor_threshold: f32,
    pub body_mass: f32,
    pub angular_damping: f32,
    /// Linear speed under which a letter counts as resting.
    pub rest_linear_speed: f32,
    /// Angular speed under which a letter counts as resting.
    pub rest_angular_speed: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -50.0, 0.0],
            dt: 1.0 / 60.0,
            ground_center: [0.0, -10.0, 0.0],
            ground_half_extents: [50.0, 0.5, 50.0],
            floor_threshold: -100.0,
            body_mass: 1.0,
            angular_damping: 0.99,
            rest_linear_speed: 0.1,
            rest_angular_speed: 0.1,
        }
    }
}

/// Spawn placement of letters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal distance between neighbouring letters of a word.
    pub spacing: f32,
    /// Spawn height of word 0.
    pub base_height: f32,
    /// Extra spawn height per word index.
    pub level_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacing: 3.0 * 1.2,
            base_height: 5.0,
            level_height: 4.0,
        }
    }
}

/// Impulse strengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpulseConfig {
    /// Letter-kind strength for a correct keystroke.
    pub letter_correct: f32,
    /// Letter-kind strength for an incorrect keystroke.
    pub letter_incorrect: f32,
    /// Upward share of a letter-kind impulse, relative to its depth push.
    pub letter_lift: f32,
    /// Upper bound on a word-kind scatter strength.
    pub word_cap: f32,
    /// Word-kind strength emitted when a word completes.
    pub word_strength: f32,
    /// Depth impulse applied when a letter is clicked.
    pub press: f32,
}

impl Default for ImpulseConfig {
    fn default() -> Self {
        Self {
            letter_correct: 12.0,
            letter_incorrect: 4.0,
            letter_lift: 0.6,
            word_cap: 120.0,
            word_strength: 80.0,
            press: 15.0,
        }
    }
}

/// Orbit camera settings. Angles are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub target: [f32; 3],
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    /// Half of the visible height of the orthographic view.
    pub half_height: f32,
    /// Vertical field of view in degrees; when set the camera uses a
    /// perspective projection instead of the orthographic one.
    pub fov_y: Option<f32>,
    pub near: f32,
    pub far: f32,
    /// Fraction of the remaining angle covered per frame.
    pub damping: f32,
    /// Degrees of orbit per pixel of drag.
    pub orbit_sensitivity: f32,
    /// Zoom factor per wheel unit.
    pub zoom_step: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        // Eye at (-10, 10, 10) looking at the origin.
        let distance = 300.0_f32.sqrt();
        Self {
            target: [0.0, 0.0, 0.0],
            azimuth: -45.0,
            elevation: (10.0 / distance).asin().to_degrees(),
            distance,
            half_height: 15.0,
            fov_y: None,
            near: -10.0,
            far: 100.0,
            damping: 0.1,
            orbit_sensitivity: 0.3,
            zoom_step: 1.1,
        }
    }
}

/// A light in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LightConfig {
    Ambient { color: [f32; 3], intensity: f32 },
    Directional { color: [f32; 3], intensity: f32, position: [f32; 3] },
}

/// Background and lighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub background: [f32; 3],
    pub ground_color: [f32; 3],
    pub lights: Vec<LightConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: hex_rgb(0x20_25_33),
            ground_color: hex_rgb(0x22_22_22),
            lights: vec![
                LightConfig::Ambient {
                    color: hex_rgb(0xcc_cc_cc),
                    intensity: 1.0,
                },
                LightConfig::Directional {
                    color: [1.0, 1.0, 1.0],
                    intensity: 0.5,
                    position: [5.0, 5.0, 20.0],
                },
                LightConfig::Directional {
                    color: [1.0, 1.0, 1.0],
                    intensity: 1.0,
                    position: [-5.0, -5.0, -10.0],
                },
            ],
        }
    }
}

/// Converts a `0xRRGGBB` literal into linear-ish float components.
pub fn hex_rgb(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    [channel(16), channel(8), channel(0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LetterfallConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.layout.spacing - 3.6).abs() < 1e-6);
        assert_eq!(config.physics.floor_threshold, -100.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = LetterfallConfig::from_json_str(
            r#"{ "layout": { "spacing": 4.0 }, "rng_seed": 7 }"#,
        )
        .unwrap();

        assert_eq!(config.layout.spacing, 4.0);
        assert_eq!(config.layout.base_height, 5.0);
        assert_eq!(config.rng_seed, 7);
        assert_eq!(config.physics, PhysicsConfig::default());
    }

    #[test]
    fn test_negative_strength_rejected() {
        let err = LetterfallConfig::from_json_str(r#"{ "impulse": { "press": -1.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_perspective_fov_is_validated() {
        let config = LetterfallConfig::from_json_str(r#"{"camera": {"fov_y": 45.0}}"#).unwrap();
        assert_eq!(config.camera.fov_y, Some(45.0));
        assert!(LetterfallConfig::from_json_str(r#"{"camera": {"fov_y": 200.0}}"#).is_err());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = LetterfallConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_camera_default_matches_eye_position() {
        let camera = CameraConfig::default();
        let elev = camera.elevation.to_radians();
        let azim = camera.azimuth.to_radians();
        let eye = [
            camera.distance * elev.cos() * azim.sin(),
            camera.distance * elev.sin(),
            camera.distance * elev.cos() * azim.cos(),
        ];
        assert!((eye[0] + 10.0).abs() < 1e-3);
        assert!((eye[1] - 10.0).abs() < 1e-3);
        assert!((eye[2] - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_lights_roundtrip_tagged() {
        let json = serde_json::to_string(&SceneConfig::default()).unwrap();
        assert!(json.contains(r#""kind":"ambient""#));
        let back: SceneConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.lights.len(), 3);
    }

    #[test]
    fn test_hex_rgb() {
        assert_eq!(hex_rgb(0xff_00_00), [1.0, 0.0, 0.0]);
    }
}
