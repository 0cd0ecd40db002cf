//! Mesh buffers ready for GPU upload

use rust3d_math::Vec3;

/// Floats per interleaved vertex: 3 position + 3 normal
pub const FLOATS_PER_VERTEX: usize = 6;

/// A deduplicated vertex
///
/// Identity is structural: two face corners resolving to the same position
/// and normal values are the same record.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VertexRecord {
    pub position: Vec3,
    pub normal: Vec3,
}

impl VertexRecord {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }

    /// Interleaved `[px, py, pz, nx, ny, nz]`
    pub fn to_floats(self) -> [f32; FLOATS_PER_VERTEX] {
        [
            self.position.x, self.position.y, self.position.z,
            self.normal.x, self.normal.y, self.normal.z,
        ]
    }
}

/// Indexed triangle mesh
///
/// `vertices` holds [`FLOATS_PER_VERTEX`] floats per vertex (position then
/// normal). Every index is below [`vertex_count`](Mesh::vertex_count) and
/// the index count is a multiple of 3.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten deduplicated records and their indices into a mesh
    pub fn from_records(records: &[VertexRecord], indices: Vec<u32>) -> Self {
        let vertices = records.iter().flat_map(|r| r.to_floats()).collect();
        Self { vertices, indices }
    }

    /// Number of unique vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Read back one vertex record
    pub fn vertex(&self, index: usize) -> Option<VertexRecord> {
        let start = index * FLOATS_PER_VERTEX;
        let v = self.vertices.get(start..start + FLOATS_PER_VERTEX)?;
        Some(VertexRecord::new(
            Vec3::new(v[0], v[1], v[2]),
            Vec3::new(v[3], v[4], v[5]),
        ))
    }

    /// Vertex data as raw bytes for a vertex buffer upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as raw bytes for an index buffer upload
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records_interleaves() {
        let records = [
            VertexRecord::new(Vec3::new(1.0, 2.0, 3.0), Vec3::Z),
            VertexRecord::new(Vec3::new(4.0, 5.0, 6.0), Vec3::Y),
        ];
        let mesh = Mesh::from_records(&records, vec![0, 1, 0]);
        assert_eq!(mesh.vertices, vec![1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 4.0, 5.0, 6.0, 0.0, 1.0, 0.0]);
        assert_eq!(mesh.vertex_count(), 2);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertex(1), Some(records[1]));
        assert_eq!(mesh.vertex(2), None);
    }

    #[test]
    fn test_byte_views() {
        let mesh = Mesh::from_records(&[VertexRecord::default()], vec![0, 0, 0]);
        assert_eq!(mesh.vertex_bytes().len(), FLOATS_PER_VERTEX * 4);
        assert_eq!(mesh.index_bytes().len(), 12);
    }

    #[test]
    fn test_empty() {
        let mesh = Mesh::new();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
    }
}
