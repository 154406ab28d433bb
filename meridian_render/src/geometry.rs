use bytemuck::Pod;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttributeFormat {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl AttributeFormat {
    pub fn size(self) -> usize {
        std::mem::size_of::<f32>()
            * match self {
                AttributeFormat::Float => 1,
                AttributeFormat::Vec2 => 2,
                AttributeFormat::Vec3 => 3,
                AttributeFormat::Vec4 => 4,
            }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VertexAttribute {
    pub name: String,
    pub format: AttributeFormat,
    pub data: Vec<u8>,
}

impl VertexAttribute {
    pub fn new<T: Pod>(name: &str, format: AttributeFormat, values: &[T]) -> Self {
        Self {
            name: name.to_owned(),
            format,
            data: bytemuck::cast_slice(values).to_vec(),
        }
    }

    pub fn count(&self) -> usize {
        self.data.len() / self.format.size()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum IndexData {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexData {
    pub fn len(&self) -> usize {
        match self {
            IndexData::U16(indices) => indices.len(),
            IndexData::U32(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryDescriptor {
    pub primitive: PrimitiveType,
    pub attributes: Vec<VertexAttribute>,
    pub indices: Option<IndexData>,
}

impl GeometryDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    pub fn vertex_count(&self) -> usize {
        self.attributes.first().map_or(0, VertexAttribute::count)
    }
}
