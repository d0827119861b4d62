//! Glyph geometry cache and the shared material palette.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::hex_rgb;
use crate::font::GlyphSource;
use crate::tessellate::{self, ExtrudeOptions, MeshData};

#[derive(Debug, thiserror::Error)]
pub enum GlyphError {
    #[error("failed to tessellate glyph {glyph:?}: {message}")]
    Tessellation { glyph: char, message: String },
}

/// Geometry parameters shared by every glyph of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphStyle {
    /// World units per em.
    pub size: f32,
    /// Extrusion depth in world units.
    pub depth: f32,
    /// Curve flattening tolerance in em units.
    pub tolerance: f32,
}

impl Default for GlyphStyle {
    fn default() -> Self {
        Self {
            size: 3.0,
            depth: 1.2,
            tolerance: 0.01,
        }
    }
}

impl Eq for GlyphStyle {}

impl Hash for GlyphStyle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.to_bits().hash(state);
        self.depth.to_bits().hash(state);
        self.tolerance.to_bits().hash(state);
    }
}

/// Cache key: one character rendered with one style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub glyph: char,
    pub style: GlyphStyle,
}

/// Immutable, centred geometry for one glyph.
#[derive(Debug)]
pub struct GlyphGeometry {
    pub key: GlyphKey,
    pub mesh: MeshData,
    /// Half extents of the bounding box, used to size the physics body.
    pub half_extents: Vec3,
}

/// Typing state a letter is drawn with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialState {
    #[default]
    Pending,
    Correct,
    Incorrect,
}

impl MaterialState {
    pub const ALL: [MaterialState; 3] = [Self::Pending, Self::Correct, Self::Incorrect];

    fn index(self) -> usize {
        match self {
            Self::Pending => 0,
            Self::Correct => 1,
            Self::Incorrect => 2,
        }
    }
}

/// Surface description of one palette entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub state: MaterialState,
    pub base_color: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
}

/// Content-addressed glyph geometry plus the fixed three-entry palette.
///
/// Entries are never evicted: the key space is bounded by the characters a
/// session types.
#[derive(Debug)]
pub struct GlyphCache {
    entries: HashMap<GlyphKey, Arc<GlyphGeometry>>,
    materials: [Material; 3],
}

impl Default for GlyphCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphCache {
    pub fn new() -> Self {
        let material = |state, hex| Material {
            state,
            base_color: hex_rgb(hex),
            metallic: 0.0,
            roughness: 0.6,
        };
        Self {
            entries: HashMap::new(),
            materials: [
                material(MaterialState::Pending, 0xaa_aa_aa),
                material(MaterialState::Correct, 0x4f_c3_f7),
                material(MaterialState::Incorrect, 0xf0_62_92),
            ],
        }
    }

    /// Returns the cached geometry for `(glyph, style)`, building it on first use.
    pub fn geometry(
        &mut self,
        source: &dyn GlyphSource,
        glyph: char,
        style: &GlyphStyle,
    ) -> Result<Arc<GlyphGeometry>, GlyphError> {
        let key = GlyphKey {
            glyph,
            style: *style,
        };
        if let Some(geometry) = self.entries.get(&key) {
            return Ok(Arc::clone(geometry));
        }

        let geometry = Arc::new(build_geometry(source, key)?);
        tracing::debug!(
            "[glyph] cached {:?} from '{}' ({} triangles)",
            glyph,
            source.name(),
            geometry.mesh.triangle_count()
        );
        self.entries.insert(key, Arc::clone(&geometry));
        Ok(geometry)
    }

    pub fn contains(&self, key: &GlyphKey) -> bool {
        self.entries.contains_key(key)
    }

    /// One of the three shared palette entries.
    pub fn material(&self, state: MaterialState) -> &Material {
        &self.materials[state.index()]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn build_geometry(source: &dyn GlyphSource, key: GlyphKey) -> Result<GlyphGeometry, GlyphError> {
    let style = key.style;
    let mesh = match source.outline(key.glyph) {
        Some(path) => tessellate::extrude(
            &path,
            ExtrudeOptions {
                scale: style.size,
                depth: style.depth,
                tolerance: style.tolerance,
            },
        )
        .map_err(|e| GlyphError::Tessellation {
            glyph: key.glyph,
            message: format!("{e:?}"),
        })?,
        None => MeshData::default(),
    };

    let half_extents = mesh
        .bounds()
        .map_or(Vec3::splat(style.size * 0.1), |(lo, hi)| (hi - lo) * 0.5);

    Ok(GlyphGeometry {
        key,
        mesh,
        half_extents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::BlockGlyphs;

    #[test]
    fn test_same_key_returns_same_handle() {
        let mut cache = GlyphCache::new();
        let style = GlyphStyle::default();

        let a = cache.geometry(&BlockGlyphs, 'A', &style).unwrap();
        let b = cache.geometry(&BlockGlyphs, 'A', &style).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_style_is_part_of_key() {
        let mut cache = GlyphCache::new();
        let small = GlyphStyle::default();
        let large = GlyphStyle {
            size: 6.0,
            ..small
        };

        let a = cache.geometry(&BlockGlyphs, 'A', &small).unwrap();
        let b = cache.geometry(&BlockGlyphs, 'A', &large).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
        assert!((b.half_extents.x - 2.0 * a.half_extents.x).abs() < 1e-4);
    }

    #[test]
    fn test_geometry_is_centred_and_sized() {
        let mut cache = GlyphCache::new();
        let style = GlyphStyle::default();
        let geometry = cache.geometry(&BlockGlyphs, 'B', &style).unwrap();

        let (lo, hi) = geometry.mesh.bounds().unwrap();
        assert!((lo + hi).length() < 1e-4);
        let width = BlockGlyphs::width('B') * style.size;
        assert!((geometry.half_extents.x - width / 2.0).abs() < 1e-4);
        assert!((geometry.half_extents.z - style.depth / 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_blank_glyph_gets_small_box() {
        let mut cache = GlyphCache::new();
        let style = GlyphStyle::default();
        let geometry = cache.geometry(&BlockGlyphs, ' ', &style).unwrap();

        assert!(geometry.mesh.is_empty());
        assert!(geometry.half_extents.abs_diff_eq(Vec3::splat(0.3), 1e-5));
    }

    #[test]
    fn test_materials_are_shared_palette() {
        let cache = GlyphCache::new();
        let first = std::ptr::from_ref(cache.material(MaterialState::Correct));
        let second = std::ptr::from_ref(cache.material(MaterialState::Correct));
        assert_eq!(first, second);

        assert_eq!(cache.material(MaterialState::Correct).base_color, hex_rgb(0x4f_c3_f7));
        assert_eq!(cache.material(MaterialState::Incorrect).base_color, hex_rgb(0xf0_62_92));
        assert_eq!(cache.material(MaterialState::Pending).state, MaterialState::Pending);
    }
}
