use crate::{error::LoadError, index::Index, skeleton::SkeletonDefinition};
use bitflags::bitflags;
use glam::Vec3;
use meridian_render::{
    id::GeometryId, AttributeFormat, GeometryDescriptor, GraphicsDevice, IndexData,
    PrimitiveType, VertexAttribute,
};
use std::path::Path;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct MeshFlags: u32 {
        const FLIP_UVS_VERTICAL = 1 << 0;
        const U32_INDICES = 1 << 1;
        const U8_INDICES = 1 << 2;
        const U16_JOINT_IDS = 1 << 3;
        const U8_JOINT_IDS = 1 << 4;
    }
}

/// A region of the mesh's binary buffer.
///
/// `offset` is `None` for blobs that have no backing data, which read back
/// as zeros. A `stride` no larger than `element_size` means tightly packed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Blob {
    pub offset: Option<u32>,
    pub length: u32,
    pub stride: u16,
    pub element_size: u16,
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

impl Blob {
    pub fn new(offset: u32, length: u32, stride: u16, element_size: u16) -> Self {
        Self {
            offset: Some(offset),
            length,
            stride,
            element_size,
            min: Vec::new(),
            max: Vec::new(),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.length > 0
    }

    pub fn element_count(&self) -> usize {
        if self.element_size == 0 {
            0
        } else {
            self.length as usize / self.element_size as usize
        }
    }

    /// Bytes of buffer the blob spans, including stride padding.
    pub fn buffer_size(&self) -> usize {
        let count = self.element_count();
        if self.stride <= self.element_size || count == 0 {
            self.length as usize
        } else {
            (count - 1) * self.stride as usize + self.element_size as usize
        }
    }

    /// Copies the blob's elements out of `buffer`, tightly packed.
    pub fn read(&self, buffer: &[u8]) -> Result<Vec<u8>, LoadError> {
        let Some(offset) = self.offset else {
            return Ok(vec![0; self.length as usize]);
        };

        let offset = offset as usize;
        let size = self.buffer_size();
        let bytes = buffer
            .get(offset..offset + size)
            .ok_or(LoadError::BlobOutOfRange {
                offset,
                length: size,
                available: buffer.len(),
            })?;

        if self.stride <= self.element_size {
            return Ok(bytes.to_vec());
        }

        let (stride, element_size) = (self.stride as usize, self.element_size as usize);
        let mut packed = Vec::with_capacity(self.length as usize);
        for i in 0..self.element_count() {
            packed.extend_from_slice(&bytes[i * stride..i * stride + element_size]);
        }
        Ok(packed)
    }

    /// Clamps each component to the blob's bounds, when it has any.
    pub fn apply_min_max(&self, values: &mut [f32]) {
        let components = self.min.len().max(self.max.len());
        if components == 0 {
            return;
        }
        for element in values.chunks_mut(components) {
            for (i, value) in element.iter_mut().enumerate() {
                if let Some(min) = self.min.get(i) {
                    *value = value.max(*min);
                }
                if let Some(max) = self.max.get(i) {
                    *value = value.min(*max);
                }
            }
        }
    }
}

/// Replacement elements layered over an accessor's base data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseBlob {
    /// Element size 1, 2 or 4 gives the index width.
    pub indices: Blob,
    pub values: Blob,
    pub count: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Accessor {
    pub blob: Blob,
    pub sparse: Option<SparseBlob>,
}

impl Accessor {
    pub fn new(blob: Blob) -> Self {
        Self { blob, sparse: None }
    }

    pub fn with_sparse(blob: Blob, sparse: SparseBlob) -> Self {
        Self {
            blob,
            sparse: Some(sparse),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.blob.is_defined()
    }

    pub fn read(&self, buffer: &[u8]) -> Result<Vec<u8>, LoadError> {
        let mut bytes = self.blob.read(buffer)?;
        let Some(sparse) = &self.sparse else {
            return Ok(bytes);
        };

        let indices = sparse.indices.read(buffer)?;
        let values = sparse.values.read(buffer)?;
        let index_size = sparse.indices.element_size as usize;
        let element_size = self.blob.element_size as usize;
        for i in 0..sparse.count as usize {
            let index = read_index(&indices, i, index_size).ok_or(LoadError::BlobOutOfRange {
                offset: i * index_size,
                length: index_size,
                available: indices.len(),
            })?;
            let target = bytes
                .get_mut(index * element_size..(index + 1) * element_size)
                .ok_or(LoadError::BlobOutOfRange {
                    offset: index * element_size,
                    length: element_size,
                    available: self.blob.length as usize,
                })?;
            let value = values
                .get(i * element_size..(i + 1) * element_size)
                .ok_or(LoadError::BlobOutOfRange {
                    offset: i * element_size,
                    length: element_size,
                    available: values.len(),
                })?;
            target.copy_from_slice(value);
        }
        Ok(bytes)
    }

    fn read_floats(&self, buffer: &[u8]) -> Result<Vec<f32>, LoadError> {
        Ok(bytemuck::pod_collect_to_vec(&self.read(buffer)?))
    }
}

fn read_index(bytes: &[u8], i: usize, size: usize) -> Option<usize> {
    let raw = bytes.get(i * size..(i + 1) * size)?;
    match size {
        1 => Some(raw[0] as usize),
        2 => Some(u16::from_le_bytes([raw[0], raw[1]]) as usize),
        4 => Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TangentType {
    #[default]
    Vec3,
    /// Handedness in w.
    Vec4,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BlendShapeVersion {
    #[default]
    V1_0,
    V2_0,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlendShape {
    pub name: String,
    pub deltas: Accessor,
    pub normals: Accessor,
    pub tangents: Accessor,
    pub weight: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshDefinition {
    pub flags: MeshFlags,
    pub primitive_type: PrimitiveType,
    /// Binary buffer, relative to the models path.
    pub uri: String,
    pub indices: Accessor,
    pub positions: Accessor,
    pub normals: Accessor,
    pub tex_coords: Accessor,
    pub colors: Accessor,
    pub tangents: Accessor,
    pub tangent_type: TangentType,
    pub joints0: Accessor,
    pub weights0: Accessor,
    pub blend_shapes: Vec<BlendShape>,
    pub blend_shape_version: BlendShapeVersion,
    pub skeleton_idx: Option<Index<SkeletonDefinition>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawData {
    pub indices: Option<IndexData>,
    pub attribs: Vec<VertexAttribute>,
}

/// GPU side of a mesh. Default means not loaded yet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MeshGeometry {
    pub geometry: Option<GeometryId>,
    pub vertex_count: usize,
    pub blend_shape_count: usize,
}

impl MeshGeometry {
    pub fn is_loaded(&self) -> bool {
        self.geometry.is_some()
    }
}

impl MeshDefinition {
    pub fn is_quad(&self) -> bool {
        self.uri == "quad"
    }

    pub fn is_skinned(&self) -> bool {
        self.joints0.is_defined() && self.weights0.is_defined()
    }

    pub fn has_blend_shapes(&self) -> bool {
        !self.blend_shapes.is_empty()
    }

    /// Whether any blend shape carries position, normal and tangent deltas.
    pub fn blend_shape_components(&self) -> (bool, bool, bool) {
        self.blend_shapes
            .iter()
            .fold((false, false, false), |(p, n, t), shape| {
                (
                    p || shape.deltas.is_defined(),
                    n || shape.normals.is_defined(),
                    t || shape.tangents.is_defined(),
                )
            })
    }

    /// Reads the buffer and extracts every defined attribute.
    ///
    /// Performs no GPU calls and may run on any thread.
    pub fn load_raw(&self, models_path: &Path) -> Result<RawData, LoadError> {
        if self.is_quad() {
            return Ok(quad());
        }

        let path = models_path.join(&self.uri);
        let buffer = std::fs::read(&path).map_err(|err| LoadError::io(&path, err))?;
        let mut raw = RawData::default();

        if self.indices.is_defined() {
            let bytes = self.indices.read(&buffer)?;
            raw.indices = Some(if self.flags.contains(MeshFlags::U32_INDICES) {
                IndexData::U32(bytemuck::pod_collect_to_vec(&bytes))
            } else if self.flags.contains(MeshFlags::U8_INDICES) {
                IndexData::U16(bytes.iter().map(|&index| index as u16).collect())
            } else {
                IndexData::U16(bytemuck::pod_collect_to_vec(&bytes))
            });
        }

        let mut positions = Vec::new();
        if self.positions.is_defined() {
            positions = self.positions.read_floats(&buffer)?;
            self.positions.blob.apply_min_max(&mut positions);
            raw.attribs.push(VertexAttribute::new(
                "aPosition",
                AttributeFormat::Vec3,
                &positions,
            ));
        } else {
            tracing::warn!(uri = %self.uri, "mesh has no positions");
        }

        if self.normals.is_defined() {
            let normals = self.normals.read_floats(&buffer)?;
            raw.attribs
                .push(VertexAttribute::new("aNormal", AttributeFormat::Vec3, &normals));
        } else if self.primitive_type == PrimitiveType::Triangles && !positions.is_empty() {
            let normals = generate_normals(&positions, raw.indices.as_ref());
            raw.attribs
                .push(VertexAttribute::new("aNormal", AttributeFormat::Vec3, &normals));
        }

        if self.tex_coords.is_defined() {
            let mut uvs = self.tex_coords.read_floats(&buffer)?;
            if self.flags.contains(MeshFlags::FLIP_UVS_VERTICAL) {
                for uv in uvs.chunks_exact_mut(2) {
                    uv[1] = 1.0 - uv[1];
                }
            }
            raw.attribs
                .push(VertexAttribute::new("aTexCoord", AttributeFormat::Vec2, &uvs));
        }

        if self.colors.is_defined() {
            let colors = self.colors.read_floats(&buffer)?;
            let format = if self.colors.blob.element_size as usize == AttributeFormat::Vec4.size() {
                AttributeFormat::Vec4
            } else {
                AttributeFormat::Vec3
            };
            raw.attribs
                .push(VertexAttribute::new("aVertexColor", format, &colors));
        }

        if self.tangents.is_defined() {
            let tangents = self.tangents.read_floats(&buffer)?;
            let format = match self.tangent_type {
                TangentType::Vec3 => AttributeFormat::Vec3,
                TangentType::Vec4 => AttributeFormat::Vec4,
            };
            raw.attribs
                .push(VertexAttribute::new("aTangent", format, &tangents));
        }

        if self.is_skinned() {
            let bytes = self.joints0.read(&buffer)?;
            let joints: Vec<f32> = if self.flags.contains(MeshFlags::U8_JOINT_IDS) {
                bytes.iter().map(|&joint| joint as f32).collect()
            } else if self.flags.contains(MeshFlags::U16_JOINT_IDS) {
                bytemuck::pod_collect_to_vec::<u8, u16>(&bytes)
                    .into_iter()
                    .map(f32::from)
                    .collect()
            } else {
                bytemuck::pod_collect_to_vec(&bytes)
            };
            raw.attribs
                .push(VertexAttribute::new("aJoints", AttributeFormat::Vec4, &joints));

            let weights = self.weights0.read_floats(&buffer)?;
            raw.attribs
                .push(VertexAttribute::new("aWeights", AttributeFormat::Vec4, &weights));
        }

        for (i, shape) in self.blend_shapes.iter().enumerate() {
            for (accessor, name) in [
                (&shape.deltas, "aBlendShapePosition"),
                (&shape.normals, "aBlendShapeNormal"),
                (&shape.tangents, "aBlendShapeTangent"),
            ] {
                if accessor.is_defined() {
                    let deltas = accessor.read_floats(&buffer)?;
                    raw.attribs.push(VertexAttribute::new(
                        &format!("{name}{i}"),
                        AttributeFormat::Vec3,
                        &deltas,
                    ));
                }
            }
        }

        Ok(raw)
    }

    /// Must run on the rendering thread.
    pub fn load(&self, device: &mut dyn GraphicsDevice, raw: RawData) -> MeshGeometry {
        let desc = GeometryDescriptor {
            primitive: self.primitive_type,
            attributes: raw.attribs,
            indices: raw.indices,
        };
        let vertex_count = desc.vertex_count();
        MeshGeometry {
            geometry: Some(device.create_geometry(desc)),
            vertex_count,
            blend_shape_count: self.blend_shapes.len(),
        }
    }
}

// Unit quad in the xy plane, two triangles.
fn quad() -> RawData {
    let positions: [f32; 12] = [
        -0.5, -0.5, 0.0, 0.5, -0.5, 0.0, -0.5, 0.5, 0.0, 0.5, 0.5, 0.0,
    ];
    let uvs: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
    RawData {
        indices: Some(IndexData::U16(vec![0, 1, 2, 2, 1, 3])),
        attribs: vec![
            VertexAttribute::new("aPosition", AttributeFormat::Vec3, &positions),
            VertexAttribute::new("aTexCoord", AttributeFormat::Vec2, &uvs),
        ],
    }
}

/// Area weighted vertex normals for a triangle list.
fn generate_normals(positions: &[f32], indices: Option<&IndexData>) -> Vec<f32> {
    let vertices = positions
        .chunks_exact(3)
        .map(Vec3::from_slice)
        .collect::<Vec<_>>();
    let order: Vec<usize> = match indices {
        Some(IndexData::U16(indices)) => indices.iter().map(|&i| i as usize).collect(),
        Some(IndexData::U32(indices)) => indices.iter().map(|&i| i as usize).collect(),
        None => (0..vertices.len()).collect(),
    };

    let mut normals = vec![Vec3::ZERO; vertices.len()];
    for triangle in order.chunks_exact(3) {
        let (a, b, c) = (triangle[0], triangle[1], triangle[2]);
        if a.max(b).max(c) >= vertices.len() {
            continue;
        }
        let normal = (vertices[b] - vertices[a]).cross(vertices[c] - vertices[a]);
        normals[a] += normal;
        normals[b] += normal;
        normals[c] += normal;
    }

    normals
        .into_iter()
        .flat_map(|normal| normal.normalize_or_zero().to_array())
        .collect()
}
