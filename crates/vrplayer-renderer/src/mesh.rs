use bytemuck::{Pod, Zeroable};

/// Vertex format for the surrounding cube. Only positions: the fragment
/// stage derives texture coordinates from the interpolated direction.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SkyVertex {
    pub position: [f32; 3],
}

impl SkyVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

const fn v(x: f32, y: f32, z: f32) -> SkyVertex {
    SkyVertex { position: [x, y, z] }
}

/// Unit cube around the viewer as a triangle list, two triangles per face.
pub const CUBE_VERTICES: [SkyVertex; 36] = [
    // back
    v(-1.0, 1.0, -1.0),
    v(-1.0, -1.0, -1.0),
    v(1.0, -1.0, -1.0),
    v(1.0, -1.0, -1.0),
    v(1.0, 1.0, -1.0),
    v(-1.0, 1.0, -1.0),
    // front
    v(1.0, 1.0, 1.0),
    v(1.0, -1.0, 1.0),
    v(-1.0, -1.0, 1.0),
    v(-1.0, -1.0, 1.0),
    v(-1.0, 1.0, 1.0),
    v(1.0, 1.0, 1.0),
    // left
    v(-1.0, 1.0, 1.0),
    v(-1.0, -1.0, 1.0),
    v(-1.0, -1.0, -1.0),
    v(-1.0, -1.0, -1.0),
    v(-1.0, 1.0, -1.0),
    v(-1.0, 1.0, 1.0),
    // right
    v(1.0, 1.0, -1.0),
    v(1.0, -1.0, -1.0),
    v(1.0, -1.0, 1.0),
    v(1.0, -1.0, 1.0),
    v(1.0, 1.0, 1.0),
    v(1.0, 1.0, -1.0),
    // top
    v(-1.0, 1.0, -1.0),
    v(1.0, 1.0, -1.0),
    v(1.0, 1.0, 1.0),
    v(1.0, 1.0, 1.0),
    v(-1.0, 1.0, 1.0),
    v(-1.0, 1.0, -1.0),
    // bottom
    v(1.0, -1.0, -1.0),
    v(-1.0, -1.0, -1.0),
    v(-1.0, -1.0, 1.0),
    v(-1.0, -1.0, 1.0),
    v(1.0, -1.0, 1.0),
    v(1.0, -1.0, -1.0),
];

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn every_vertex_is_a_cube_corner() {
        for vertex in CUBE_VERTICES {
            assert!(vertex.position.iter().all(|c| c.abs() == 1.0));
        }
    }

    #[test]
    fn each_face_lies_on_one_plane() {
        for face in CUBE_VERTICES.chunks(6) {
            let shared_axis = (0..3).find(|&axis| {
                let value = face[0].position[axis];
                face.iter().all(|v| v.position[axis] == value)
            });
            assert!(shared_axis.is_some(), "face is not axis aligned: {face:?}");
        }
    }

    #[test]
    fn triangles_face_the_viewer() {
        // Seen from the origin, every triangle winds the same way.
        for tri in CUBE_VERTICES.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|v| Vec3::from(v.position));
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) < 0.0);
        }
    }

    #[test]
    fn vertex_stride_matches_layout() {
        assert_eq!(SkyVertex::layout().array_stride, 12);
    }
}
