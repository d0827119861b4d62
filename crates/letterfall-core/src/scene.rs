//! Scene state: camera rig, lights, visuals and the drawing surface.

use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::math::{Quat, Vec3};
use parking_lot::Mutex;

use crate::camera::{CameraView, OrbitRig, Ray};
use crate::config::{LetterfallConfig, LightConfig};
use crate::glyph::{GlyphGeometry, GlyphKey, MaterialState};

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("failed to present frame: {0}")]
    Present(String),
    #[error("surface has been released")]
    Released,
}

/// Handle of a visual owned by the [`SceneManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VisualId(pub u64);

/// Drawable instance of a cached glyph.
#[derive(Debug, Clone)]
pub struct Visual {
    pub id: VisualId,
    pub geometry: Arc<GlyphGeometry>,
    pub material: MaterialState,
    pub translation: Vec3,
    pub rotation: Quat,
}

/// One visual as captured in a [`Frame`].
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub visual: VisualId,
    pub glyph: GlyphKey,
    pub geometry: Arc<GlyphGeometry>,
    pub material: MaterialState,
    pub translation: Vec3,
    pub rotation: Quat,
}

/// Everything a surface needs to draw one frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub number: u64,
    pub camera: CameraView,
    pub background: [f32; 3],
    pub lights: Vec<LightConfig>,
    pub items: Vec<DrawItem>,
}

/// Destination of rendered frames.
pub trait Surface: Send + Sync {
    /// Width over height of the drawable area.
    fn aspect(&self) -> f32;

    fn present(&mut self, frame: Frame) -> Result<(), SurfaceError>;

    /// Releases backing resources; later presents fail with [`SurfaceError::Released`].
    fn release(&mut self) {}
}

/// What a [`HeadlessSurface`] has seen so far.
#[derive(Debug, Default)]
pub struct PresentLog {
    pub presented: u64,
    pub last: Option<Frame>,
    pub released: bool,
}

/// Surface that records frames in memory.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    log: Arc<Mutex<PresentLog>>,
    aspect: f32,
    fail: bool,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(4.0 / 3.0)
    }
}

impl HeadlessSurface {
    pub fn new(aspect: f32) -> Self {
        Self {
            log: Arc::new(Mutex::new(PresentLog::default())),
            aspect,
            fail: false,
        }
    }

    /// A surface whose every present fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Shared view of the log; stays valid after the surface is boxed.
    pub fn log(&self) -> Arc<Mutex<PresentLog>> {
        Arc::clone(&self.log)
    }
}

impl Surface for HeadlessSurface {
    fn aspect(&self) -> f32 {
        self.aspect
    }

    fn present(&mut self, frame: Frame) -> Result<(), SurfaceError> {
        let mut log = self.log.lock();
        if log.released {
            return Err(SurfaceError::Released);
        }
        if self.fail {
            return Err(SurfaceError::Present("headless surface set to fail".to_string()));
        }
        log.presented += 1;
        log.last = Some(frame);
        Ok(())
    }

    fn release(&mut self) {
        let mut log = self.log.lock();
        log.released = true;
        log.last = None;
    }
}

/// Result of a successful pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub visual: VisualId,
    /// Distance along the ray.
    pub distance: f32,
    /// Hit point in world space.
    pub point: Vec3,
    /// Hit point relative to the visual's centre, in its local frame.
    pub local_point: Vec3,
}

/// Owns the camera rig, lighting, visuals and surface.
pub struct SceneManager {
    rig: OrbitRig,
    background: [f32; 3],
    lights: Vec<LightConfig>,
    visuals: BTreeMap<VisualId, Visual>,
    next_visual: u64,
    surface: Option<Box<dyn Surface>>,
    frames: u64,
}

impl std::fmt::Debug for SceneManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneManager")
            .field("visuals", &self.visuals.len())
            .field("frames", &self.frames)
            .field("released", &self.surface.is_none())
            .finish_non_exhaustive()
    }
}

impl SceneManager {
    pub fn new(config: &LetterfallConfig, surface: Box<dyn Surface>) -> Self {
        Self {
            rig: OrbitRig::from_config(&config.camera),
            background: config.scene.background,
            lights: config.scene.lights.clone(),
            visuals: BTreeMap::new(),
            next_visual: 0,
            surface: Some(surface),
            frames: 0,
        }
    }

    pub fn rig(&self) -> &OrbitRig {
        &self.rig
    }

    pub fn rig_mut(&mut self) -> &mut OrbitRig {
        &mut self.rig
    }

    pub fn aspect(&self) -> f32 {
        self.surface.as_ref().map_or(1.0, |s| s.aspect())
    }

    pub fn add_visual(
        &mut self,
        geometry: Arc<GlyphGeometry>,
        material: MaterialState,
        translation: Vec3,
    ) -> VisualId {
        let id = VisualId(self.next_visual);
        self.next_visual += 1;
        self.visuals.insert(
            id,
            Visual {
                id,
                geometry,
                material,
                translation,
                rotation: Quat::IDENTITY,
            },
        );
        id
    }

    /// Drops a visual. Its geometry reference is released; the cache keeps its own.
    pub fn remove_visual(&mut self, id: VisualId) -> Option<Visual> {
        self.visuals.remove(&id)
    }

    pub fn visual(&self, id: VisualId) -> Option<&Visual> {
        self.visuals.get(&id)
    }

    pub fn visuals(&self) -> impl Iterator<Item = &Visual> {
        self.visuals.values()
    }

    pub fn visual_count(&self) -> usize {
        self.visuals.len()
    }

    pub fn set_transform(&mut self, id: VisualId, translation: Vec3, rotation: Quat) {
        if let Some(visual) = self.visuals.get_mut(&id) {
            visual.translation = translation;
            visual.rotation = rotation;
        }
    }

    pub fn set_material(&mut self, id: VisualId, material: MaterialState) {
        if let Some(visual) = self.visuals.get_mut(&id) {
            visual.material = material;
        }
    }

    /// Nearest visual whose oriented bounding box the ray enters.
    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        self.visuals
            .values()
            .filter_map(|visual| {
                let inverse = visual.rotation.inverse();
                let origin = inverse * (ray.origin - visual.translation);
                let direction = inverse * ray.direction;
                let t = ray_box(origin, direction, visual.geometry.half_extents)?;
                Some(RayHit {
                    visual: visual.id,
                    distance: t,
                    point: ray.at(t),
                    local_point: origin + direction * t,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Captures the scene and presents it.
    pub fn render(&mut self) -> Result<(), SurfaceError> {
        let surface = self.surface.as_mut().ok_or(SurfaceError::Released)?;
        self.frames += 1;
        let frame = Frame {
            number: self.frames,
            camera: self.rig.view(),
            background: self.background,
            lights: self.lights.clone(),
            items: self
                .visuals
                .values()
                .map(|v| DrawItem {
                    visual: v.id,
                    glyph: v.geometry.key,
                    geometry: Arc::clone(&v.geometry),
                    material: v.material,
                    translation: v.translation,
                    rotation: v.rotation,
                })
                .collect(),
        };
        surface.present(frame)
    }

    /// Drops every visual and releases the surface. Idempotent.
    pub fn release(&mut self) {
        self.visuals.clear();
        if let Some(mut surface) = self.surface.take() {
            surface.release();
            tracing::info!("[scene] surface released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.surface.is_none()
    }
}

/// Slab test against a box centred at the origin. Returns the entry distance,
/// or 0 if the origin is inside.
fn ray_box(origin: Vec3, direction: Vec3, half: Vec3) -> Option<f32> {
    let mut t_min = 0.0_f32;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let (o, d, h) = (origin[axis], direction[axis], half[axis]);
        if d.abs() < f32::EPSILON {
            if o.abs() > h {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (t0, t1) = ((-h - o) * inv, (h - o) * inv);
        t_min = t_min.max(t0.min(t1));
        t_max = t_max.min(t0.max(t1));
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}
