//! Orbit camera rig.
//!
//! The rig keeps the eye on a sphere around a target. Drags move goal angles
//! and `update()` eases the current angles toward them, so the camera keeps
//! gliding for a few frames after the pointer stops.

use bevy::math::{Vec2, Vec3};

use crate::config::CameraConfig;

// 89 degrees.
const MAX_ELEVATION: f32 = 1.553_343;
const MIN_ELEVATION: f32 = -MAX_ELEVATION;
const MIN_ZOOM: f32 = 0.25;
const MAX_ZOOM: f32 = 4.0;
const SETTLE_EPSILON: f32 = 1e-5;
const MIN_PERSPECTIVE_NEAR: f32 = 0.1;

/// A half-line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Projection used by the rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraProjection {
    Orthographic { half_height: f32, near: f32, far: f32 },
    Perspective { fov_y: f32, near: f32, far: f32 },
}

/// Snapshot of the camera for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: CameraProjection,
    /// Orthographic magnification; 1.0 is the configured framing.
    pub zoom: f32,
}

/// Camera orbiting a target point.
#[derive(Debug, Clone)]
pub struct OrbitRig {
    target: Vec3,
    distance: f32,
    azimuth: f32,
    elevation: f32,
    goal_azimuth: f32,
    goal_elevation: f32,
    zoom: f32,
    damping: f32,
    sensitivity: f32,
    zoom_step: f32,
    projection: CameraProjection,
    enabled: bool,
    drag_anchor: Option<Vec2>,
}

impl OrbitRig {
    pub fn from_config(config: &CameraConfig) -> Self {
        let azimuth = config.azimuth.to_radians();
        let elevation = config.elevation.to_radians().clamp(MIN_ELEVATION, MAX_ELEVATION);
        Self {
            target: Vec3::from_array(config.target),
            distance: config.distance,
            azimuth,
            elevation,
            goal_azimuth: azimuth,
            goal_elevation: elevation,
            zoom: 1.0,
            damping: config.damping,
            sensitivity: config.orbit_sensitivity.to_radians(),
            zoom_step: config.zoom_step,
            projection: match config.fov_y {
                Some(fov_y) => CameraProjection::Perspective {
                    fov_y: fov_y.to_radians(),
                    // Orthographic framing may use a negative near plane.
                    near: config.near.max(MIN_PERSPECTIVE_NEAR),
                    far: config.far,
                },
                None => CameraProjection::Orthographic {
                    half_height: config.half_height,
                    near: config.near,
                    far: config.far,
                },
            },
            enabled: true,
            drag_anchor: None,
        }
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        let (sin_e, cos_e) = self.elevation.sin_cos();
        self.target + self.distance * Vec3::new(cos_e * sin_a, sin_e, cos_e * cos_a)
    }

    pub fn view(&self) -> CameraView {
        CameraView {
            eye: self.eye(),
            target: self.target,
            up: Vec3::Y,
            projection: self.projection,
            zoom: self.zoom,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Gates user orbit input. Disabling cancels a drag in progress.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.drag_anchor = None;
        }
        self.enabled = enabled;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    /// Starts an orbit drag at a pixel position. Ignored while disabled.
    pub fn begin_drag(&mut self, position: Vec2) -> bool {
        if !self.enabled {
            return false;
        }
        self.drag_anchor = Some(position);
        true
    }

    /// Moves the goal angles by the pixel delta since the last drag position.
    pub fn drag_to(&mut self, position: Vec2) {
        let Some(anchor) = self.drag_anchor else {
            return;
        };
        let delta = position - anchor;
        self.goal_azimuth -= delta.x * self.sensitivity;
        self.goal_elevation =
            (self.goal_elevation + delta.y * self.sensitivity).clamp(MIN_ELEVATION, MAX_ELEVATION);
        self.drag_anchor = Some(position);
    }

    pub fn end_drag(&mut self) {
        self.drag_anchor = None;
    }

    /// Zooms by `zoom_step` per wheel unit; positive values zoom in.
    pub fn zoom_by(&mut self, wheel: f32) {
        if !self.enabled || wheel.abs() < f32::EPSILON {
            return;
        }
        self.zoom = (self.zoom * self.zoom_step.powf(wheel)).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Eases the current angles toward the goal. Returns `true` while moving.
    pub fn update(&mut self) -> bool {
        let da = self.goal_azimuth - self.azimuth;
        let de = self.goal_elevation - self.elevation;
        if da.abs() < SETTLE_EPSILON && de.abs() < SETTLE_EPSILON {
            self.azimuth = self.goal_azimuth;
            self.elevation = self.goal_elevation;
            return false;
        }
        self.azimuth += da * self.damping;
        self.elevation += de * self.damping;
        true
    }

    /// Builds the pick ray through a point in normalized device coordinates
    /// (x right, y up, both in [-1, 1]).
    pub fn ray_from_ndc(&self, ndc: Vec2, aspect: f32) -> Ray {
        let eye = self.eye();
        let forward = (self.target - eye).normalize();
        let right = forward.cross(Vec3::Y).normalize();
        let up = right.cross(forward);

        match self.projection {
            CameraProjection::Orthographic { half_height, near, .. } => {
                let half_h = half_height / self.zoom;
                let half_w = half_h * aspect;
                let origin = eye + right * (ndc.x * half_w) + up * (ndc.y * half_h) + forward * near;
                Ray {
                    origin,
                    direction: forward,
                }
            }
            CameraProjection::Perspective { fov_y, .. } => {
                let tan = (fov_y * 0.5).tan();
                let direction =
                    (forward + right * (ndc.x * tan * aspect) + up * (ndc.y * tan)).normalize();
                Ray { origin: eye, direction }
            }
        }
    }
}

/// Converts a pixel position (origin top-left, y down) into NDC.
pub fn pixel_to_ndc(position: Vec2, viewport: Vec2) -> Vec2 {
    if viewport.x <= 0.0 || viewport.y <= 0.0 {
        return Vec2::ZERO;
    }
    Vec2::new(
        position.x / viewport.x * 2.0 - 1.0,
        1.0 - position.y / viewport.y * 2.0,
    )
}
