//! Mesh data, procedural shapes and GPU meshes

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::material::Material;
use glam::{Vec2, Vec3, Vec4};
use std::f32::consts::PI;

/// CPU-side mesh
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub name: String,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            name: name.to_string(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Unit cube centered at the origin, four vertices per face
    pub fn cube() -> Self {
        let mut mesh = Mesh::new("cube");

        // (normal, u axis, v axis) per face
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, -Vec3::X, Vec3::Y),
            (Vec3::X, -Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, -Vec3::Z),
            (-Vec3::Y, Vec3::X, Vec3::Z),
        ];
        let corners = [
            Vec2::new(-0.5, -0.5),
            Vec2::new(0.5, -0.5),
            Vec2::new(0.5, 0.5),
            Vec2::new(-0.5, 0.5),
        ];

        for (face, (normal, u_axis, v_axis)) in faces.into_iter().enumerate() {
            for corner in corners {
                let position = normal * 0.5 + u_axis * corner.x + v_axis * corner.y;
                let uv = Vec2::new(corner.x + 0.5, 0.5 - corner.y);
                mesh.vertices
                    .push(Vertex::new(position, normal, uv, u_axis.extend(1.0)));
            }
            let base = face as u32 * 4;
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// UV sphere of radius 0.5
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let mut mesh = Mesh::new("sphere");
        let (segments, rings) = (segments.max(3), rings.max(2));

        for ring in 0..=rings {
            let phi = ring as f32 * PI / rings as f32;
            for segment in 0..=segments {
                let theta = segment as f32 * 2.0 * PI / segments as f32;
                let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                let tangent = Vec4::new(-theta.sin(), 0.0, theta.cos(), 1.0);
                let uv = Vec2::new(
                    segment as f32 / segments as f32,
                    ring as f32 / rings as f32,
                );
                mesh.vertices
                    .push(Vertex::new(normal * 0.5, normal, uv, tangent));
            }
        }

        let stride = segments + 1;
        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * stride + segment;
                let next = current + stride;
                mesh.indices.extend_from_slice(&[
                    current,
                    current + 1,
                    next,
                    current + 1,
                    next + 1,
                    next,
                ]);
            }
        }

        mesh
    }

    /// Square on the XZ plane facing +Y
    pub fn plane(size: f32) -> Self {
        let mut mesh = Mesh::new("plane");
        let h = size / 2.0;
        for (x, z) in [(-h, -h), (h, -h), (h, h), (-h, h)] {
            mesh.vertices.push(Vertex::new(
                Vec3::new(x, 0.0, z),
                Vec3::Y,
                Vec2::new((x + h) / size, (z + h) / size),
                Vec4::new(1.0, 0.0, 0.0, 1.0),
            ));
        }
        mesh.indices.extend_from_slice(&[0, 2, 1, 0, 3, 2]);
        mesh
    }
}

/// Area-weighted smooth normals from triangle faces
pub fn generate_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let mut accumulated = vec![Vec3::ZERO; vertices.len()];

    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let face = (vertices[b].position - vertices[a].position)
            .cross(vertices[c].position - vertices[a].position);
        for i in [a, b, c] {
            accumulated[i] += face;
        }
    }

    for (vertex, normal) in vertices.iter_mut().zip(accumulated) {
        vertex.normal = normal.try_normalize().unwrap_or(Vec3::Y);
    }
}

/// Per-vertex tangents from UV derivatives, Gram-Schmidt orthogonalized
///
/// `w` carries the bitangent sign.
pub fn generate_tangents(vertices: &mut [Vertex], indices: &[u32]) {
    let mut tangents = vec![Vec3::ZERO; vertices.len()];
    let mut bitangents = vec![Vec3::ZERO; vertices.len()];

    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (&vertices[a], &vertices[b], &vertices[c]);
        let edge1 = v1.position - v0.position;
        let edge2 = v2.position - v0.position;
        let duv1 = v1.uv - v0.uv;
        let duv2 = v2.uv - v0.uv;

        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
        let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;

        for i in [a, b, c] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    for (i, vertex) in vertices.iter_mut().enumerate() {
        let n = vertex.normal;
        let t = (tangents[i] - n * n.dot(tangents[i]))
            .try_normalize()
            .unwrap_or_else(|| n.any_orthonormal_vector());
        let sign = if n.cross(t).dot(bitangents[i]) < 0.0 {
            -1.0
        } else {
            1.0
        };
        vertex.tangent = t.extend(sign);
    }
}

/// Mesh uploaded to the GPU, optionally with its material
#[derive(Debug)]
pub struct GpuMesh {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    index_count: u32,
    material: Option<Material>,
}

impl GpuMesh {
    pub fn create<B: GraphicsBackend>(
        backend: &mut B,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
        material: Option<Material>,
    ) -> BackendResult<Self> {
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} vertices", label)),
                size: std::mem::size_of_val(vertices) as u64,
                usage: BufferUsage::VERTEX,
            },
            bytemuck::cast_slice(vertices),
        )?;
        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} indices", label)),
                size: std::mem::size_of_val(indices) as u64,
                usage: BufferUsage::INDEX,
            },
            bytemuck::cast_slice(indices),
        )?;

        log::debug!(
            "Uploaded mesh '{}' ({} vertices, {} indices)",
            label,
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            material,
        })
    }

    pub fn from_mesh<B: GraphicsBackend>(
        backend: &mut B,
        mesh: &Mesh,
        material: Option<Material>,
    ) -> BackendResult<Self> {
        Self::create(backend, &mesh.name, &mesh.vertices, &mesh.indices, material)
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn material(&self) -> Option<&Material> {
        self.material.as_ref()
    }

    pub fn draw<B: GraphicsBackend>(&self, backend: &mut B, material_group: Option<u32>) {
        self.draw_instanced(backend, 1, material_group);
    }

    /// Bind geometry (and material when `material_group` is set) and draw
    ///
    /// Instance data must already be bound on its own vertex slot.
    pub fn draw_instanced<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        instance_count: u32,
        material_group: Option<u32>,
    ) {
        if let (Some(group), Some(material)) = (material_group, &self.material) {
            backend.set_bind_group(group, material.bind_group());
        }
        backend.set_vertex_buffer(0, self.vertex_buffer, 0);
        backend.set_index_buffer(self.index_buffer, 0, IndexFormat::Uint32);
        backend.draw_indexed(0..self.index_count, 0, 0..instance_count);
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
        if let Some(material) = self.material {
            material.destroy(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case::cube(Mesh::cube(), 24, 12)]
    #[case::sphere(Mesh::sphere(8, 4), 45, 64)]
    #[case::plane(Mesh::plane(2.0), 4, 2)]
    fn shape_sizes(#[case] mesh: Mesh, #[case] vertices: usize, #[case] triangles: usize) {
        assert_eq!(mesh.vertices.len(), vertices);
        assert_eq!(mesh.triangle_count(), triangles);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn cube_faces_point_outward() {
        let cube = Mesh::cube();
        for v in &cube.vertices {
            assert_relative_eq!(v.position.dot(v.normal), 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn generated_tangents_follow_u_axis() {
        let mut plane = Mesh::plane(1.0);
        for v in &mut plane.vertices {
            v.tangent = Vec4::ZERO;
        }
        generate_tangents(&mut plane.vertices, &plane.indices);
        for v in &plane.vertices {
            assert_relative_eq!(v.tangent.x, 1.0, epsilon = 1e-5);
            assert_relative_eq!(v.tangent.w.abs(), 1.0);
        }
    }

    #[test]
    fn gpu_mesh_draws_all_indices() {
        let mut backend = DummyBackend::new(8, 8);
        let mesh = GpuMesh::from_mesh(&mut backend, &Mesh::cube(), None).unwrap();
        mesh.draw_instanced(&mut backend, 3, Some(1));

        let draws: Vec<_> = backend
            .commands()
            .iter()
            .filter_map(|cmd| match cmd {
                crate::backend::dummy::RecordedCommand::DrawIndexed { indices, instances } => {
                    Some((indices.clone(), instances.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![(0..36, 0..3)]);

        mesh.destroy(&mut backend);
        assert_eq!(backend.live_buffer_count(), 0);
    }
}
