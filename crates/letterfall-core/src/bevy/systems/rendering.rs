//! Mirrors presented frames onto Bevy mesh entities.
//!
//! Each glyph key maps to one `Mesh` asset shared by every letter showing that
//! glyph, and each material state maps to one `StandardMaterial`.

use std::collections::{HashMap, HashSet};

use bevy::camera::ScalingMode;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;

use crate::bevy::{FrameSlot, GroundPlane, LetterVisual, LetterfallRes, MainCamera, SceneLight};
use crate::camera::{CameraProjection, CameraView};
use crate::config::LightConfig;
use crate::glyph::{GlyphKey, MaterialState};
use crate::scene::VisualId;
use crate::tessellate::MeshData;

/// Illuminance of a directional light with intensity 1.
const DIRECTIONAL_LUX: f32 = 4_000.0;
/// Brightness of an ambient light with intensity 1.
const AMBIENT_BRIGHTNESS: f32 = 400.0;

/// One mesh asset per glyph key.
#[derive(Resource, Default)]
pub struct GlyphMeshCache {
    meshes: HashMap<GlyphKey, Handle<Mesh>>,
}

impl GlyphMeshCache {
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

/// The three palette materials.
#[derive(Resource, Default)]
pub struct GlyphPalette {
    handles: Vec<(MaterialState, Handle<StandardMaterial>)>,
}

impl GlyphPalette {
    fn get(&self, state: MaterialState) -> Option<Handle<StandardMaterial>> {
        self.handles
            .iter()
            .find(|(s, _)| *s == state)
            .map(|(_, handle)| handle.clone())
    }
}

/// Visual id to mesh entity.
#[derive(Resource, Default)]
pub struct VisualEntityMap {
    pub map: HashMap<VisualId, Entity>,
}

/// Spawns camera, lights, ground and the palette.
pub fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut palette: ResMut<GlyphPalette>,
    res: Res<LetterfallRes>,
) {
    let config = res.render_loop.config();
    let Some(stage) = res.render_loop.stage() else {
        tracing::warn!("[render] render loop already torn down; scene not set up");
        return;
    };

    commands.insert_resource(ClearColor(rgb(config.scene.background)));

    let ambient = config
        .scene
        .lights
        .iter()
        .find_map(|light| match light {
            LightConfig::Ambient { color, intensity } => Some(AmbientLight {
                color: rgb(*color),
                brightness: intensity * AMBIENT_BRIGHTNESS,
                ..default()
            }),
            LightConfig::Directional { .. } => None,
        })
        .unwrap_or_default();

    let view = stage.scene.rig().view();
    let mut transform = Transform::default();
    let mut projection = Projection::from(OrthographicProjection::default_3d());
    apply_view(&view, &mut transform, &mut projection);
    commands.spawn((Camera3d::default(), projection, transform, ambient, MainCamera));

    for light in &config.scene.lights {
        if let LightConfig::Directional {
            color,
            intensity,
            position,
        } = light
        {
            commands.spawn((
                DirectionalLight {
                    color: rgb(*color),
                    illuminance: intensity * DIRECTIONAL_LUX,
                    ..default()
                },
                Transform::from_translation(Vec3::from_array(*position)).looking_at(Vec3::ZERO, Vec3::Y),
                SceneLight,
            ));
        }
    }

    let half = Vec3::from_array(config.physics.ground_half_extents);
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::from_size(half * 2.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: rgb(config.scene.ground_color),
            perceptual_roughness: 0.9,
            ..default()
        })),
        Transform::from_translation(Vec3::from_array(config.physics.ground_center)),
        GroundPlane,
    ));

    palette.handles = MaterialState::ALL
        .iter()
        .map(|state| {
            let material = stage.glyphs.material(*state);
            let handle = materials.add(StandardMaterial {
                base_color: rgb(material.base_color),
                metallic: material.metallic,
                perceptual_roughness: material.roughness,
                double_sided: true,
                cull_mode: None,
                ..default()
            });
            (*state, handle)
        })
        .collect();

    tracing::info!("[render] scene ready with {} lights", config.scene.lights.len());
}

/// Applies the latest presented frame to camera and letter entities.
#[allow(clippy::too_many_arguments)]
pub fn sync_frame_to_entities(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    slot: Res<FrameSlot>,
    palette: Res<GlyphPalette>,
    mut mesh_cache: ResMut<GlyphMeshCache>,
    mut entities: ResMut<VisualEntityMap>,
    mut visuals: Query<(&mut Transform, &mut MeshMaterial3d<StandardMaterial>), With<LetterVisual>>,
    mut cameras: Query<(&mut Transform, &mut Projection), (With<MainCamera>, Without<LetterVisual>)>,
) {
    let Some(frame) = slot.take() else {
        return;
    };

    if let Ok((mut transform, mut projection)) = cameras.single_mut() {
        apply_view(&frame.camera, &mut transform, &mut projection);
    }

    let mut seen = HashSet::with_capacity(frame.items.len());
    for item in &frame.items {
        seen.insert(item.visual);
        let Some(material) = palette.get(item.material) else {
            continue;
        };
        let transform = Transform::from_translation(item.translation).with_rotation(item.rotation);

        if let Some(entity) = entities.map.get(&item.visual) {
            if let Ok((mut current, mut current_material)) = visuals.get_mut(*entity) {
                *current = transform;
                if current_material.0 != material {
                    current_material.0 = material;
                }
            }
            continue;
        }

        let mesh = mesh_cache
            .meshes
            .entry(item.glyph)
            .or_insert_with(|| meshes.add(to_bevy_mesh(&item.geometry.mesh)))
            .clone();
        let entity = commands
            .spawn((
                Mesh3d(mesh),
                MeshMaterial3d(material),
                transform,
                LetterVisual(item.visual),
            ))
            .id();
        entities.map.insert(item.visual, entity);
    }

    entities.map.retain(|visual, entity| {
        if seen.contains(visual) {
            true
        } else {
            commands.entity(*entity).despawn();
            false
        }
    });
}

/// Despawns letter entities once the render loop has released its surface.
pub fn clear_released_visuals(
    mut commands: Commands,
    slot: Res<FrameSlot>,
    mut entities: ResMut<VisualEntityMap>,
) {
    if !slot.is_released() || entities.map.is_empty() {
        return;
    }
    for (_, entity) in entities.map.drain() {
        commands.entity(entity).despawn();
    }
}

fn apply_view(view: &CameraView, transform: &mut Transform, projection: &mut Projection) {
    *transform = Transform::from_translation(view.eye).looking_at(view.target, view.up);
    match view.projection {
        CameraProjection::Orthographic {
            half_height,
            near,
            far,
        } => {
            *projection = Projection::from(OrthographicProjection {
                scaling_mode: ScalingMode::FixedVertical {
                    viewport_height: half_height * 2.0,
                },
                near,
                far,
                scale: 1.0 / view.zoom,
                ..OrthographicProjection::default_3d()
            });
        }
        CameraProjection::Perspective { fov_y, near, far } => {
            *projection = Projection::from(PerspectiveProjection {
                fov: fov_y,
                near,
                far,
                ..default()
            });
        }
    }
}

fn to_bevy_mesh(data: &MeshData) -> Mesh {
    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, data.positions.clone());
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, data.normals.clone());
    mesh.insert_indices(Indices::U32(data.indices.clone()));
    mesh
}

fn rgb([r, g, b]: [f32; 3]) -> Color {
    Color::srgb(r, g, b)
}
