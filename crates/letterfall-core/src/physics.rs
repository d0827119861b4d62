//! Physics simulation using `Rapier3D` with deterministic behavior.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use bevy::math::{Quat, Vec3};
use rapier3d::prelude::*;

use crate::config::PhysicsConfig;

/// Fixed timestep for physics simulation (60Hz).
pub const PHYSICS_DT: f32 = 1.0 / 60.0;

/// Default gravity vector (downward, in world units/s²).
pub fn default_gravity() -> Vector {
    Vector::new(0.0, -50.0, 0.0)
}

/// Collision shape of a dynamic body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    /// Axis-aligned box in body space.
    Cuboid { half_extents: Vec3 },
}

/// Snapshot of a body's kinematic state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub translation: Vec3,
    pub rotation: Quat,
    pub linvel: Vec3,
    pub angvel: Vec3,
    pub sleeping: bool,
}

/// Physics world containing all `Rapier3D` components for deterministic simulation.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub gravity: Vector,
    pub frame: u64,
    angular_damping: f32,
    ground: Option<RigidBodyHandle>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("frame", &self.frame)
            .field("rigid_body_count", &self.rigid_body_set.len())
            .field("collider_count", &self.collider_set.len())
            .field("gravity", &self.gravity)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Creates a new physics world with default settings and no ground.
    pub fn new() -> Self {
        Self::with_gravity(default_gravity())
    }

    /// Creates a new physics world with custom gravity.
    pub fn with_gravity(gravity: Vector) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: PHYSICS_DT,
            ..Default::default()
        };

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity,
            frame: 0,
            angular_damping: 0.0,
            ground: None,
        }
    }

    /// Builds the world described by `config`, including the static ground.
    pub fn from_config(config: &PhysicsConfig) -> Self {
        let [gx, gy, gz] = config.gravity;
        let mut world = Self::with_gravity(Vector::new(gx, gy, gz));
        world.integration_parameters.dt = config.dt;
        world.angular_damping = config.angular_damping;

        let [cx, cy, cz] = config.ground_center;
        let [hx, hy, hz] = config.ground_half_extents;
        let ground = world.add_rigid_body(
            RigidBodyBuilder::fixed()
                .translation(Vector::new(cx, cy, cz))
                .build(),
        );
        world.add_collider(ColliderBuilder::cuboid(hx, hy, hz).friction(0.6).build(), ground);
        world.ground = Some(ground);

        world
    }

    /// Advances the physics simulation by one fixed timestep.
    pub fn step(&mut self) {
        self.physics_pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &(),
        );
        self.frame += 1;
    }

    /// Advances the physics simulation by multiple steps.
    pub fn step_n(&mut self, n: u32) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Adds a rigid body to the world and returns its handle.
    pub fn add_rigid_body(&mut self, rigid_body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(rigid_body)
    }

    /// Adds a collider attached to a rigid body.
    pub fn add_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Adds a dynamic body with the given shape, mass and position.
    pub fn add_body(&mut self, shape: BodyShape, mass: f32, position: Vec3) -> RigidBodyHandle {
        let rigid_body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(position.x, position.y, position.z))
            .angular_damping(self.angular_damping)
            .build();
        let handle = self.add_rigid_body(rigid_body);

        let collider = match shape {
            BodyShape::Cuboid { half_extents } => {
                ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
        }
        .mass(mass)
        .friction(0.5)
        .restitution(0.2)
        .build();
        self.add_collider(collider, handle);

        handle
    }

    /// Removes a rigid body and its attached colliders.
    ///
    /// Returns `false` if the handle was not present.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        if Some(handle) == self.ground {
            return false;
        }
        self.rigid_body_set
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    /// Applies an instantaneous impulse at `local_point` (body space, relative
    /// to the center of mass) and wakes the body.
    ///
    /// Returns `false` if the handle is unknown.
    pub fn apply_impulse(&mut self, handle: RigidBodyHandle, impulse: Vec3, local_point: Vec3) -> bool {
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return false;
        };

        let rotation = quat_from_rapier(body.rotation());
        let lever = rotation * local_point;
        let torque = lever.cross(impulse);

        body.apply_impulse(Vector::new(impulse.x, impulse.y, impulse.z), true);
        if torque.length_squared() > f32::EPSILON {
            body.apply_torque_impulse(Vector::new(torque.x, torque.y, torque.z), true);
        }
        true
    }

    /// Returns the kinematic state of a body.
    pub fn body_state(&self, handle: RigidBodyHandle) -> Option<BodyState> {
        let body = self.rigid_body_set.get(handle)?;
        let t = body.translation();
        let v = body.linvel();
        let w = body.angvel();
        Some(BodyState {
            translation: Vec3::new(t.x, t.y, t.z),
            rotation: quat_from_rapier(body.rotation()),
            linvel: Vec3::new(v.x, v.y, v.z),
            angvel: Vec3::new(w.x, w.y, w.z),
            sleeping: body.is_sleeping(),
        })
    }

    /// Teleports a body to `position` with identity orientation and zero
    /// velocity, then wakes it.
    pub fn reset_body(&mut self, handle: RigidBodyHandle, position: Vec3) -> bool {
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return false;
        };
        body.set_translation(Vector::new(position.x, position.y, position.z), false);
        body.set_rotation(Rotation::IDENTITY, false);
        body.set_linvel(Vector::ZERO, false);
        body.set_angvel(Vector::ZERO, false);
        body.reset_forces(false);
        body.reset_torques(false);
        body.wake_up(true);
        true
    }

    /// Gets an immutable reference to a rigid body.
    pub fn get_rigid_body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    /// Number of dynamic bodies (the ground is not counted).
    pub fn dynamic_body_count(&self) -> usize {
        self.rigid_body_set.iter().filter(|(_, b)| b.is_dynamic()).count()
    }

    /// Computes a deterministic hash of the current physics state.
    pub fn compute_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.frame.hash(&mut hasher);

        for (handle, body) in self.rigid_body_set.iter() {
            let (index, generation) = handle.into_raw_parts();
            index.hash(&mut hasher);
            generation.hash(&mut hasher);

            let pos = body.translation();
            hash_f32(pos.x, &mut hasher);
            hash_f32(pos.y, &mut hasher);
            hash_f32(pos.z, &mut hasher);

            let rot = quat_from_rapier(body.rotation());
            for c in rot.to_array() {
                hash_f32(c, &mut hasher);
            }

            let linvel = body.linvel();
            hash_f32(linvel.x, &mut hasher);
            hash_f32(linvel.y, &mut hasher);
            hash_f32(linvel.z, &mut hasher);
        }

        hasher.finish()
    }

}

/// Converts a rapier rotation into a Bevy quaternion.
fn quat_from_rapier(rotation: &Rotation) -> Quat {
    Quat::from_xyzw(rotation.x, rotation.y, rotation.z, rotation.w)
}

/// Hashes a f32 value by converting to bits.
fn hash_f32(value: f32, hasher: &mut impl Hasher) {
    value.to_bits().hash(hasher);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> BodyShape {
        BodyShape::Cuboid {
            half_extents: Vec3::splat(0.5),
        }
    }

    #[test]
    fn test_physics_world_creation() {
        let world = PhysicsWorld::new();
        assert_eq!(world.frame, 0);
        assert_eq!(world.integration_parameters.dt, PHYSICS_DT);
    }

    #[test]
    fn test_from_config_adds_ground_only() {
        let world = PhysicsWorld::from_config(&PhysicsConfig::default());
        assert_eq!(world.rigid_body_set.len(), 1);
        assert_eq!(world.dynamic_body_count(), 0);
    }

    #[test]
    fn test_deterministic_simulation() {
        let mut world1 = PhysicsWorld::from_config(&PhysicsConfig::default());
        let mut world2 = PhysicsWorld::from_config(&PhysicsConfig::default());

        let handle1 = world1.add_body(cube(), 1.0, Vec3::new(1.0, 5.0, 0.0));
        let handle2 = world2.add_body(cube(), 1.0, Vec3::new(1.0, 5.0, 0.0));
        world1.apply_impulse(handle1, Vec3::new(3.0, 0.0, -2.0), Vec3::new(0.2, 0.3, 0.0));
        world2.apply_impulse(handle2, Vec3::new(3.0, 0.0, -2.0), Vec3::new(0.2, 0.3, 0.0));

        for _ in 0..100 {
            world1.step();
            world2.step();
        }

        assert_eq!(world1.compute_hash(), world2.compute_hash());
        assert_eq!(world1.body_state(handle1), world2.body_state(handle2));
    }

    #[test]
    fn test_step_advances_frame() {
        let mut world = PhysicsWorld::new();
        assert_eq!(world.frame, 0);

        world.step();
        assert_eq!(world.frame, 1);

        world.step_n(10);
        assert_eq!(world.frame, 11);
    }

    #[test]
    fn test_gravity_pulls_down() {
        let mut world = PhysicsWorld::from_config(&PhysicsConfig::default());
        let handle = world.add_body(cube(), 1.0, Vec3::new(0.0, 5.0, 0.0));

        world.step_n(5);

        let state = world.body_state(handle).unwrap();
        assert!(state.translation.y < 5.0);
        assert!(state.linvel.y < 0.0);
    }

    #[test]
    fn test_add_and_remove_body() {
        let mut world = PhysicsWorld::new();
        let handle = world.add_body(cube(), 1.0, Vec3::new(0.0, 5.0, 0.0));
        assert!(world.get_rigid_body(handle).is_some());

        assert!(world.remove_body(handle));
        assert!(world.get_rigid_body(handle).is_none());
        assert!(!world.remove_body(handle));
    }

    #[test]
    fn test_ground_cannot_be_removed() {
        let mut world = PhysicsWorld::from_config(&PhysicsConfig::default());
        let ground = world.rigid_body_set.iter().next().map(|(h, _)| h).unwrap();
        assert!(!world.remove_body(ground));
        assert_eq!(world.rigid_body_set.len(), 1);
    }

    #[test]
    fn test_impulse_changes_velocity() {
        let mut world = PhysicsWorld::from_config(&PhysicsConfig::default());
        let handle = world.add_body(cube(), 1.0, Vec3::new(0.0, 5.0, 0.0));
        world.step();
        let before = world.body_state(handle).unwrap().linvel;

        assert!(world.apply_impulse(handle, Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO));

        let after = world.body_state(handle).unwrap().linvel;
        assert!(after.z < before.z);
    }

    #[test]
    fn test_off_center_impulse_spins_body() {
        let mut world = PhysicsWorld::from_config(&PhysicsConfig::default());
        let handle = world.add_body(cube(), 1.0, Vec3::new(0.0, 5.0, 0.0));
        world.step();

        world.apply_impulse(handle, Vec3::new(0.0, 0.0, -10.0), Vec3::new(0.5, 0.0, 0.0));

        let state = world.body_state(handle).unwrap();
        assert!(state.angvel.length() > 0.0);
    }

    #[test]
    fn test_reset_body_restores_origin() {
        let mut world = PhysicsWorld::from_config(&PhysicsConfig::default());
        let origin = Vec3::new(2.0, 5.0, 0.0);
        let handle = world.add_body(cube(), 1.0, origin);
        world.apply_impulse(handle, Vec3::new(5.0, 5.0, 5.0), Vec3::new(0.3, 0.0, 0.0));
        world.step_n(30);

        assert!(world.reset_body(handle, origin));

        let state = world.body_state(handle).unwrap();
        assert_eq!(state.translation, origin);
        assert_eq!(state.linvel, Vec3::ZERO);
        assert_eq!(state.angvel, Vec3::ZERO);
        assert!(state.rotation.abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn test_unknown_handle_operations_are_noops() {
        let mut world = PhysicsWorld::new();
        let handle = world.add_body(cube(), 1.0, Vec3::ZERO);
        world.remove_body(handle);

        assert!(!world.apply_impulse(handle, Vec3::X, Vec3::ZERO));
        assert!(!world.reset_body(handle, Vec3::ZERO));
        assert!(world.body_state(handle).is_none());
    }
}
