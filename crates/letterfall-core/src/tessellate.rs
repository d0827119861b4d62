//! Outline tessellation and extrusion.
//!
//! A glyph outline (em units, y up) is fill-tessellated with `lyon` into the
//! front and back caps, the flattened contours become the side walls, and the
//! resulting solid is scaled to world units and centred on its bounding box.

use bevy::math::{Vec2, Vec3};
use lyon::path::Path;
use lyon::path::iterator::PathIterator;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, FillVertexConstructor,
    TessellationError, VertexBuffers,
};

/// Triangle mesh with flat per-face normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounds as (min, max), or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.positions.iter().map(|p| Vec3::from_array(*p));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = u32::try_from(self.positions.len()).unwrap_or(u32::MAX);
        self.positions.push(position.to_array());
        self.normals.push(normal.to_array());
        index
    }

    /// Pushes a triangle, flipping it if needed so its winding faces `normal`.
    fn push_facing(&mut self, [a, b, c]: [u32; 3], normal: Vec3) {
        let p = |i: u32| Vec3::from_array(self.positions[i as usize]);
        let face = (p(b) - p(a)).cross(p(c) - p(a));
        if face.dot(normal) >= 0.0 {
            self.indices.extend([a, b, c]);
        } else {
            self.indices.extend([a, c, b]);
        }
    }
}

/// Extrusion parameters in world units (tolerance in em units).
#[derive(Debug, Clone, Copy)]
pub struct ExtrudeOptions {
    /// World units per em.
    pub scale: f32,
    /// Thickness along z.
    pub depth: f32,
    /// Curve flattening tolerance.
    pub tolerance: f32,
}

struct CapVertexCtor;

impl FillVertexConstructor<Vec2> for CapVertexCtor {
    fn new_vertex(&mut self, v: FillVertex) -> Vec2 {
        let p = v.position();
        Vec2::new(p.x, p.y)
    }
}

/// Tessellates and extrudes `path` into a closed, centred solid.
///
/// Returns an empty mesh if the path has no fillable area.
pub fn extrude(path: &Path, opts: ExtrudeOptions) -> Result<MeshData, TessellationError> {
    let mut buffers: VertexBuffers<Vec2, u32> = VertexBuffers::new();
    let fill = FillOptions::tolerance(opts.tolerance).with_fill_rule(FillRule::NonZero);
    FillTessellator::new().tessellate_path(
        path,
        &fill,
        &mut BuffersBuilder::new(&mut buffers, CapVertexCtor),
    )?;

    let mut mesh = MeshData::default();
    if buffers.indices.is_empty() {
        return Ok(mesh);
    }

    let half_depth = opts.depth * 0.5;
    let lift = |p: Vec2, z: f32| Vec3::new(p.x * opts.scale, p.y * opts.scale, z);

    for (z, normal) in [(half_depth, Vec3::Z), (-half_depth, Vec3::NEG_Z)] {
        let base = u32::try_from(mesh.positions.len()).unwrap_or(u32::MAX);
        for v in &buffers.vertices {
            mesh.push_vertex(lift(*v, z), normal);
        }
        for tri in buffers.indices.chunks_exact(3) {
            mesh.push_facing([base + tri[0], base + tri[1], base + tri[2]], normal);
        }
    }

    let contours = flatten_contours(path, opts.tolerance);
    // Outer contours and counters wind in opposite directions; the largest
    // contour tells which side of an edge is solid.
    let orientation = contours
        .iter()
        .map(|c| signed_area(c))
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .map_or(1.0, f32::signum);

    for contour in &contours {
        for (i, &a) in contour.iter().enumerate() {
            let b = contour[(i + 1) % contour.len()];
            let edge = b - a;
            if edge.length_squared() <= f32::EPSILON {
                continue;
            }
            let outward = Vec2::new(edge.y, -edge.x).normalize() * orientation;
            let normal = Vec3::new(outward.x, outward.y, 0.0);

            let quad = [
                mesh.push_vertex(lift(a, half_depth), normal),
                mesh.push_vertex(lift(b, half_depth), normal),
                mesh.push_vertex(lift(b, -half_depth), normal),
                mesh.push_vertex(lift(a, -half_depth), normal),
            ];
            mesh.push_facing([quad[0], quad[1], quad[2]], normal);
            mesh.push_facing([quad[0], quad[2], quad[3]], normal);
        }
    }

    center(&mut mesh);
    Ok(mesh)
}

/// Flattens every sub-path of `path` into a closed polyline.
fn flatten_contours(path: &Path, tolerance: f32) -> Vec<Vec<Vec2>> {
    use lyon::path::Event;

    let mut contours = Vec::new();
    let mut current: Vec<Vec2> = Vec::new();
    for event in path.iter().flattened(tolerance) {
        match event {
            Event::Begin { at } => {
                current.clear();
                current.push(Vec2::new(at.x, at.y));
            }
            Event::Line { to, .. } => current.push(Vec2::new(to.x, to.y)),
            Event::End { .. } => {
                if current.len() > 1 && current.first() == current.last() {
                    current.pop();
                }
                if current.len() >= 3 {
                    contours.push(std::mem::take(&mut current));
                }
                current.clear();
            }
            Event::Quadratic { .. } | Event::Cubic { .. } => {}
        }
    }
    contours
}

/// Shoelace area; positive for counter-clockwise contours.
fn signed_area(contour: &[Vec2]) -> f32 {
    let n = contour.len();
    (0..n)
        .map(|i| contour[i].perp_dot(contour[(i + 1) % n]))
        .sum::<f32>()
        * 0.5
}

fn center(mesh: &mut MeshData) {
    let Some((lo, hi)) = mesh.bounds() else {
        return;
    };
    let mid = (lo + hi) * 0.5;
    for p in &mut mesh.positions {
        p[0] -= mid.x;
        p[1] -= mid.y;
        p[2] -= mid.z;
    }
}
