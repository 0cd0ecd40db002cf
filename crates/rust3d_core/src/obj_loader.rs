//! Mesh text loader
//!
//! Reads the position/normal/face subset of the Wavefront OBJ format:
//!
//! ```text
//! v  x y z          position
//! vn x y z          normal
//! f  p//n p//n p//n face (corner = position[/texture]/normal, 1-based)
//! ```
//!
//! The parser is deliberately lenient. Lines with an unknown leading token are
//! ignored, and so are malformed records: a `v`/`vn` with fewer than three
//! numbers, or a face with fewer than three corners, a corner without a
//! normal, or an index that is out of range. A rejected face contributes
//! nothing. Nothing is reported.
//!
//! Corners resolving to the same (position, normal) pair share one output
//! vertex. Faces with more than three corners are fan-triangulated.

use std::collections::HashMap;
use std::path::Path;

use rust3d_math::Vec3;

use crate::{AssetError, Mesh, VertexRecord};

/// How face corners are matched against already-emitted vertices
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DedupStrategy {
    /// Compare against every emitted vertex. O(corners × unique vertices),
    /// fine for small meshes.
    #[default]
    LinearScan,
    /// Hash index on the vertex bit patterns. Same output, O(corners).
    Hashed,
}

/// Built-in unit cube (24 unique vertices, 12 triangles), used when no mesh
/// file is available
pub const UNIT_CUBE_OBJ: &str = "\
# unit cube centred on the origin
v -0.5 -0.5 0.5
v 0.5 -0.5 0.5
v 0.5 0.5 0.5
v -0.5 0.5 0.5
v -0.5 -0.5 -0.5
v 0.5 -0.5 -0.5
v 0.5 0.5 -0.5
v -0.5 0.5 -0.5
vn 0 0 1
vn 0 0 -1
vn 0 1 0
vn 0 -1 0
vn 1 0 0
vn -1 0 0
f 1//1 2//1 3//1 4//1
f 6//2 5//2 8//2 7//2
f 4//3 3//3 7//3 8//3
f 5//4 6//4 2//4 1//4
f 2//5 6//5 7//5 3//5
f 5//6 1//6 4//6 8//6
";

/// Lenient loader for `v` / `vn` / `f` mesh text
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjLoader {
    dedup: DedupStrategy,
}

impl ObjLoader {
    /// Loader using linear-scan deduplication
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose the deduplication strategy
    pub fn with_dedup(mut self, dedup: DedupStrategy) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn dedup(&self) -> DedupStrategy {
        self.dedup
    }

    /// Parse mesh text. Never fails; malformed lines are skipped.
    pub fn load(&self, source: &str) -> Mesh {
        let mut positions: Vec<Vec3> = Vec::new();
        let mut normals: Vec<Vec3> = Vec::new();
        let mut table = VertexTable::new(self.dedup);
        let mut indices: Vec<u32> = Vec::new();
        let mut skipped = 0usize;

        for line in source.lines() {
            let mut tokens = line.split_whitespace();
            let accepted = match tokens.next() {
                Some("v") => parse_vec3(tokens).map(|p| positions.push(p)).is_some(),
                Some("vn") => parse_vec3(tokens).map(|n| normals.push(n)).is_some(),
                Some("f") => {
                    match resolve_face(tokens, &positions, &normals) {
                        Some(corners) => {
                            let ids: Vec<u32> = corners.into_iter().map(|c| table.intern(c)).collect();
                            // Fan: (0, i, i + 1)
                            for i in 1..ids.len() - 1 {
                                indices.extend_from_slice(&[ids[0], ids[i], ids[i + 1]]);
                            }
                            true
                        }
                        None => false,
                    }
                }
                _ => true,
            };
            if !accepted {
                skipped += 1;
                log::trace!("Skipping malformed mesh line: {:?}", line);
            }
        }

        let mesh = Mesh::from_records(&table.records, indices);
        log::debug!(
            "Parsed mesh: {} vertices, {} triangles ({} malformed lines skipped)",
            mesh.vertex_count(),
            mesh.triangle_count(),
            skipped
        );
        mesh
    }

    /// Read a mesh file and parse it
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Mesh, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let source = String::from_utf8(bytes)
            .map_err(|e| AssetError::Parse(format!("{}: {}", path.display(), e)))?;
        Ok(self.load(&source))
    }
}

/// First three numbers of a record; extra components are ignored
fn parse_vec3<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<Vec3> {
    let x = tokens.next()?.parse().ok()?;
    let y = tokens.next()?.parse().ok()?;
    let z = tokens.next()?.parse().ok()?;
    Some(Vec3::new(x, y, z))
}

/// `p/t/n` or `p//n` → (position index, normal index), still 1-based
fn parse_corner(token: &str) -> Option<(usize, usize)> {
    let mut parts = token.split('/');
    let position = parts.next()?.parse().ok()?;
    let _texture = parts.next()?;
    let normal = parts.next()?.parse().ok()?;
    Some((position, normal))
}

fn lookup(items: &[Vec3], one_based: usize) -> Option<Vec3> {
    items.get(one_based.checked_sub(1)?).copied()
}

/// All corners of a face, or `None` if any corner is unusable
fn resolve_face<'a>(
    tokens: impl Iterator<Item = &'a str>,
    positions: &[Vec3],
    normals: &[Vec3],
) -> Option<Vec<VertexRecord>> {
    let corners = tokens
        .map(|token| {
            let (p, n) = parse_corner(token)?;
            Some(VertexRecord::new(lookup(positions, p)?, lookup(normals, n)?))
        })
        .collect::<Option<Vec<_>>>()?;

    (corners.len() >= 3).then_some(corners)
}

/// Emitted vertex records plus the optional hash index over them
struct VertexTable {
    records: Vec<VertexRecord>,
    index: Option<HashMap<[u32; 6], u32>>,
}

impl VertexTable {
    fn new(dedup: DedupStrategy) -> Self {
        Self {
            records: Vec::new(),
            index: match dedup {
                DedupStrategy::LinearScan => None,
                DedupStrategy::Hashed => Some(HashMap::new()),
            },
        }
    }

    /// Index of an equal record, appending one if none exists
    fn intern(&mut self, record: VertexRecord) -> u32 {
        let found = match &self.index {
            None => self.records.iter().position(|r| *r == record).map(|i| i as u32),
            Some(index) => record_key(&record).and_then(|key| index.get(&key).copied()),
        };
        if let Some(id) = found {
            return id;
        }

        let id = self.records.len() as u32;
        self.records.push(record);
        if let (Some(index), Some(key)) = (&mut self.index, record_key(&record)) {
            index.insert(key, id);
        }
        id
    }
}

/// Bit pattern key agreeing with `f32` equality: `-0.0` folds into `0.0`,
/// and records containing NaN get no key because they never compare equal
fn record_key(record: &VertexRecord) -> Option<[u32; 6]> {
    let floats = record.to_floats();
    if floats.iter().any(|f| f.is_nan()) {
        return None;
    }
    let mut key = [0u32; 6];
    for (k, f) in key.iter_mut().zip(floats) {
        *k = if f == 0.0 { 0 } else { f.to_bits() };
    }
    Some(key)
}
