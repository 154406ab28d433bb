use glam::{Mat4, Quat, Vec3, Vec4};
use gltf::{
    accessor::{DataType, Dimensions},
    buffer::Source as BufferSource,
    image::Source as ImageSource,
    material::AlphaMode,
    mesh::Mode,
    texture::{MagFilter, MinFilter, WrappingMode},
    Document, Semantic,
};
use meridian_render::{FilterMode, PrimitiveType, SamplerFlags, WrapMode};
use meridian_scene::{
    mesh::{BlendShape, TangentType},
    Accessor, Blob, EnvironmentDefinition, Index, Joint, MaterialDefinition, MaterialFlags,
    MeshDefinition, MeshFlags, NodeDefinition, Renderable, SceneDefinition, SceneError,
    ShaderDefinitionFactory, SkeletonDefinition, SparseBlob, TextureDefinition, TextureStage,
};
use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GltfError {
    #[error("failed to load {}: {source}", path.display())]
    FailedToLoad {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    FailedToParse {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("buffer {0} is not an external file")]
    UnsupportedBuffer(usize),
    #[error("a primitive of mesh {0} reads from more than one buffer")]
    MixedBuffers(usize),
    #[error("node {0} is reached more than once in the node hierarchy")]
    NodeCycle(usize),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

type MeshPrimitives = Vec<(Index<MeshDefinition>, Index<MaterialDefinition>)>;

/// Reads the glTF file at `path` into the factory's resource bundle and
/// `scene`, returning the scene roots that were added.
///
/// Every renderable node gets its shader from `factory`. Buffer and image
/// URIs stay relative to the file's directory.
pub fn load_gltf_scene(
    path: &Path,
    factory: &mut ShaderDefinitionFactory,
    scene: &mut SceneDefinition,
) -> Result<Vec<Index<NodeDefinition>>, GltfError> {
    let bytes = std::fs::read(path).map_err(|source| GltfError::FailedToLoad {
        path: path.to_owned(),
        source,
    })?;
    let file = gltf::Gltf::from_slice(&bytes).map_err(|source| GltfError::FailedToParse {
        path: path.to_owned(),
        source,
    })?;
    let document = &file.document;
    let base_dir = path.parent().unwrap_or(Path::new(""));

    let resources = factory.resources_mut();
    let material_base = resources.materials.len();
    for material in document.materials() {
        resources.add_material(convert_material(&material));
    }
    let mut default_material = None;

    let mut meshes: Vec<MeshPrimitives> = Vec::new();
    for mesh in document.meshes() {
        let mut primitives = Vec::new();
        for primitive in mesh.primitives() {
            let definition = convert_primitive(&mesh, &primitive)?;
            let material = match primitive.material().index() {
                Some(index) => Index::new(material_base + index),
                None => *default_material.get_or_insert_with(|| {
                    resources.add_material(convert_material(&primitive.material()))
                }),
            };
            primitives.push((resources.add_mesh(definition), material));
        }
        meshes.push(primitives);
    }

    let skeleton_base = resources.skeletons.len();
    for _ in document.skins() {
        resources.add_skeleton(SkeletonDefinition::default());
    }

    let roots = root_nodes(document);
    let mut builder = NodeBuilder {
        factory: &mut *factory,
        scene: &mut *scene,
        meshes: &meshes,
        skeleton_base,
        node_map: HashMap::new(),
    };
    let mut added_roots = Vec::new();
    for root in &roots {
        let index = builder.add(root, None)?;
        builder.scene.add_root(index)?;
        added_roots.push(index);
    }
    let node_map = builder.node_map;

    let buffers = if document.skins().next().is_some() {
        read_buffers(document, base_dir)?
    } else {
        Vec::new()
    };
    let resources = factory.resources_mut();
    for skin in document.skins() {
        let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
        let matrices = reader
            .read_inverse_bind_matrices()
            .map(|matrices| matrices.map(|m| Mat4::from_cols_array_2d(&m)).collect::<Vec<_>>())
            .unwrap_or_default();

        let skeleton = &mut resources.skeletons[skeleton_base + skin.index()];
        skeleton.root_node_idx = skin
            .skeleton()
            .and_then(|node| node_map.get(&node.index()).copied());
        for (i, joint) in skin.joints().enumerate() {
            let node_idx = node_map.get(&joint.index()).copied();
            if node_idx.is_none() {
                tracing::warn!(skin = skin.index(), joint = joint.index(), "joint is not in the scene");
            }
            skeleton.joints.push(Joint {
                node_idx,
                inverse_bind_matrix: matrices.get(i).copied().unwrap_or(Mat4::IDENTITY),
            });
        }
    }

    if resources.environment_maps.is_empty() {
        resources.add_environment(EnvironmentDefinition::default());
    }

    tracing::info!(
        path = %path.display(),
        nodes = scene.node_count(),
        meshes = resources.meshes.len(),
        materials = resources.materials.len(),
        "loaded glTF scene"
    );
    Ok(added_roots)
}

struct NodeBuilder<'a, 'r> {
    factory: &'a mut ShaderDefinitionFactory<'r>,
    scene: &'a mut SceneDefinition,
    meshes: &'a [MeshPrimitives],
    skeleton_base: usize,
    node_map: HashMap<usize, Index<NodeDefinition>>,
}

impl NodeBuilder<'_, '_> {
    fn add(
        &mut self,
        node: &gltf::Node,
        parent: Option<Index<NodeDefinition>>,
    ) -> Result<Index<NodeDefinition>, GltfError> {
        if self.node_map.contains_key(&node.index()) {
            return Err(GltfError::NodeCycle(node.index()));
        }
        let (translation, rotation, scale) = node.transform().decomposed();
        let name = node
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("node{}", node.index()));

        let meshes = self.meshes;
        let primitives = node
            .mesh()
            .and_then(|mesh| meshes.get(mesh.index()))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let skeleton = node
            .skin()
            .map(|skin| Index::new(self.skeleton_base + skin.index()));

        let mut definition = NodeDefinition {
            name: name.clone(),
            position: Vec3::from_array(translation),
            orientation: Quat::from_array(rotation),
            scale: Vec3::from_array(scale),
            parent,
            ..Default::default()
        };
        if let Some(&(mesh, material)) = primitives.first() {
            definition.renderable = Some(self.renderable(mesh, material, skeleton));
        }
        self.assign_shader(&mut definition);
        let index = self.scene.add_node(definition)?;
        self.node_map.insert(node.index(), index);

        for (i, &(mesh, material)) in primitives.iter().enumerate().skip(1) {
            let mut extra = NodeDefinition {
                name: format!("{name}_{i}"),
                renderable: Some(self.renderable(mesh, material, skeleton)),
                parent: Some(index),
                ..Default::default()
            };
            self.assign_shader(&mut extra);
            self.scene.add_node(extra)?;
        }

        for child in node.children() {
            self.add(&child, Some(index))?;
        }
        Ok(index)
    }

    fn renderable(
        &mut self,
        mesh: Index<MeshDefinition>,
        material: Index<MaterialDefinition>,
        skeleton: Option<Index<SkeletonDefinition>>,
    ) -> Renderable {
        let Some(definition) = self
            .factory
            .resources_mut()
            .meshes
            .get_mut(mesh.get())
            .map(|(definition, _)| definition)
        else {
            return Renderable::model(mesh, material);
        };

        match skeleton {
            Some(skeleton) if definition.is_skinned() => {
                definition.skeleton_idx = Some(skeleton);
                Renderable::Skinned {
                    mesh,
                    material,
                    shader: None,
                    skeleton,
                }
            }
            _ => Renderable::model(mesh, material),
        }
    }

    fn assign_shader(&mut self, node: &mut NodeDefinition) {
        if node.renderable.is_none() {
            return;
        }
        let shader = self.factory.produce_shader(node);
        if let Some(renderable) = &mut node.renderable {
            renderable.set_shader(shader);
        }
    }
}

// Scene 0 when the file has scenes, otherwise every node without a parent.
fn root_nodes(document: &Document) -> Vec<gltf::Node<'_>> {
    if let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) {
        return scene.nodes().collect();
    }

    let mut has_parent = vec![false; document.nodes().len()];
    for node in document.nodes() {
        for child in node.children() {
            has_parent[child.index()] = true;
        }
    }
    document
        .nodes()
        .filter(|node| !has_parent[node.index()])
        .collect()
}

fn buffer_uri(buffer: &gltf::Buffer) -> Result<String, GltfError> {
    match buffer.source() {
        BufferSource::Uri(uri) if !uri.starts_with("data:") => Ok(uri.to_owned()),
        _ => Err(GltfError::UnsupportedBuffer(buffer.index())),
    }
}

fn read_buffers(document: &Document, base_dir: &Path) -> Result<Vec<Vec<u8>>, GltfError> {
    document
        .buffers()
        .map(|buffer| {
            let path = base_dir.join(buffer_uri(&buffer)?);
            std::fs::read(&path).map_err(|source| GltfError::FailedToLoad { path, source })
        })
        .collect()
}

pub fn convert_sampler(sampler: &gltf::texture::Sampler) -> SamplerFlags {
    let min = match sampler.min_filter() {
        Some(MinFilter::Nearest) => FilterMode::Nearest,
        Some(MinFilter::Linear) | None => FilterMode::Linear,
        Some(MinFilter::NearestMipmapNearest) => FilterMode::NearestMipmapNearest,
        Some(MinFilter::LinearMipmapNearest) => FilterMode::LinearMipmapNearest,
        Some(MinFilter::NearestMipmapLinear) => FilterMode::NearestMipmapLinear,
        Some(MinFilter::LinearMipmapLinear) => FilterMode::LinearMipmapLinear,
    };
    let mag = match sampler.mag_filter() {
        Some(MagFilter::Nearest) => FilterMode::Nearest,
        Some(MagFilter::Linear) | None => FilterMode::Linear,
    };
    SamplerFlags::encode(
        min,
        mag,
        convert_wrap(sampler.wrap_s()),
        convert_wrap(sampler.wrap_t()),
    )
}

fn convert_wrap(mode: WrappingMode) -> WrapMode {
    match mode {
        WrappingMode::ClampToEdge => WrapMode::ClampToEdge,
        WrappingMode::MirroredRepeat => WrapMode::MirroredRepeat,
        WrappingMode::Repeat => WrapMode::Repeat,
    }
}

fn texture_definition(texture: &gltf::Texture) -> Option<TextureDefinition> {
    match texture.source().source() {
        ImageSource::Uri { uri, .. } if !uri.starts_with("data:") => Some(TextureDefinition::new(
            uri,
            convert_sampler(&texture.sampler()),
        )),
        _ => {
            tracing::warn!(image = texture.source().index(), "embedded images are not supported");
            None
        }
    }
}

fn convert_material(material: &gltf::Material) -> MaterialDefinition {
    let pbr = material.pbr_metallic_roughness();
    let base_color_factor = Vec4::from_array(pbr.base_color_factor());
    let mut definition = MaterialDefinition {
        base_color_factor,
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        emissive_factor: Vec3::from_array(material.emissive_factor()),
        need_albedo_texture: true,
        need_normal_texture: true,
        ..Default::default()
    };

    match material.alpha_mode() {
        AlphaMode::Blend => definition.flags |= MaterialFlags::TRANSPARENCY,
        AlphaMode::Mask => {
            definition.flags |= MaterialFlags::TRANSPARENCY;
            definition.set_alpha_cutoff(material.alpha_cutoff().unwrap_or(0.5));
        }
        AlphaMode::Opaque => {}
    }

    let mut add_stage = |semantic: MaterialFlags, texture: &gltf::Texture| {
        if let Some(texture) = texture_definition(texture) {
            definition.flags |= semantic;
            definition.texture_stages.push(TextureStage { semantic, texture });
            true
        } else {
            false
        }
    };

    let has_albedo = pbr
        .base_color_texture()
        .is_some_and(|info| add_stage(MaterialFlags::ALBEDO, &info.texture()));
    let has_metallic_roughness = pbr.metallic_roughness_texture().is_some_and(|info| {
        add_stage(
            MaterialFlags::METALLIC | MaterialFlags::ROUGHNESS | MaterialFlags::GLTF_CHANNELS,
            &info.texture(),
        )
    });
    let normal_scale = material
        .normal_texture()
        .filter(|normal| add_stage(MaterialFlags::NORMAL, &normal.texture()))
        .map(|normal| normal.scale());
    let occlusion_strength = material
        .occlusion_texture()
        .filter(|occlusion| add_stage(MaterialFlags::OCCLUSION, &occlusion.texture()))
        .map(|occlusion| occlusion.strength());
    if let Some(info) = material.emissive_texture() {
        add_stage(MaterialFlags::EMISSIVE, &info.texture());
    }

    definition.color = if has_albedo {
        Vec4::ONE
    } else {
        base_color_factor
    };
    definition.need_metallic_roughness_texture = has_metallic_roughness;
    definition.normal_scale = normal_scale.unwrap_or(1.0);
    definition.occlusion_strength = occlusion_strength.unwrap_or(1.0);
    definition
}

/// Tracks the single buffer a primitive's accessors may read from.
struct BufferTracker {
    mesh: usize,
    uri: Option<String>,
}

impl BufferTracker {
    fn offset(&mut self, view: &gltf::buffer::View) -> Result<u32, GltfError> {
        let uri = buffer_uri(&view.buffer())?;
        match &self.uri {
            Some(existing) if *existing != uri => return Err(GltfError::MixedBuffers(self.mesh)),
            Some(_) => {}
            None => self.uri = Some(uri),
        }
        Ok(view.offset() as u32)
    }

    fn accessor(&mut self, accessor: &gltf::Accessor) -> Result<Accessor, GltfError> {
        let element_size = accessor.size() as u16;
        let length = (accessor.count() * accessor.size()) as u32;
        let mut blob = match accessor.view() {
            Some(view) => Blob::new(
                self.offset(&view)? + accessor.offset() as u32,
                length,
                view.stride().unwrap_or(0) as u16,
                element_size,
            ),
            None => Blob {
                length,
                element_size,
                ..Default::default()
            },
        };
        for (bound, value) in [(&mut blob.min, accessor.min()), (&mut blob.max, accessor.max())] {
            if let Some(value) = value {
                *bound = value
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|component| component.as_f64())
                    .map(|component| component as f32)
                    .collect();
            }
        }

        let Some(sparse) = accessor.sparse() else {
            return Ok(Accessor::new(blob));
        };
        let count = sparse.count() as u32;
        let indices = sparse.indices();
        let index_size = match indices.index_type() {
            gltf::accessor::sparse::IndexType::U8 => 1,
            gltf::accessor::sparse::IndexType::U16 => 2,
            gltf::accessor::sparse::IndexType::U32 => 4,
        };
        let values = sparse.values();
        Ok(Accessor::with_sparse(
            blob,
            SparseBlob {
                indices: Blob::new(
                    self.offset(&indices.view())? + indices.offset() as u32,
                    count * index_size as u32,
                    0,
                    index_size,
                ),
                values: Blob::new(
                    self.offset(&values.view())? + values.offset() as u32,
                    count * element_size as u32,
                    0,
                    element_size,
                ),
                count,
            },
        ))
    }
}

fn convert_mode(mode: Mode) -> PrimitiveType {
    match mode {
        Mode::Points => PrimitiveType::Points,
        Mode::Lines => PrimitiveType::Lines,
        Mode::LineLoop => PrimitiveType::LineLoop,
        Mode::LineStrip => PrimitiveType::LineStrip,
        Mode::Triangles => PrimitiveType::Triangles,
        Mode::TriangleStrip => PrimitiveType::TriangleStrip,
        Mode::TriangleFan => PrimitiveType::TriangleFan,
    }
}

fn is_float(accessor: &gltf::Accessor) -> bool {
    accessor.data_type() == DataType::F32 && !accessor.normalized()
}

fn convert_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
) -> Result<MeshDefinition, GltfError> {
    let mut buffers = BufferTracker {
        mesh: mesh.index(),
        uri: None,
    };
    let mut definition = MeshDefinition {
        flags: MeshFlags::FLIP_UVS_VERTICAL,
        primitive_type: convert_mode(primitive.mode()),
        ..Default::default()
    };

    if let Some(indices) = primitive.indices() {
        match indices.data_type() {
            DataType::U8 => definition.flags |= MeshFlags::U8_INDICES,
            DataType::U32 => definition.flags |= MeshFlags::U32_INDICES,
            _ => {}
        }
        definition.indices = buffers.accessor(&indices)?;
    }

    for (semantic, accessor) in primitive.attributes() {
        match semantic {
            Semantic::Positions => definition.positions = buffers.accessor(&accessor)?,
            Semantic::Normals => definition.normals = buffers.accessor(&accessor)?,
            Semantic::Tangents => {
                definition.tangents = buffers.accessor(&accessor)?;
                if accessor.dimensions() == Dimensions::Vec4 {
                    definition.tangent_type = TangentType::Vec4;
                }
            }
            Semantic::TexCoords(0) if is_float(&accessor) => {
                definition.tex_coords = buffers.accessor(&accessor)?
            }
            Semantic::Colors(0) if is_float(&accessor) => {
                definition.colors = buffers.accessor(&accessor)?
            }
            Semantic::Joints(0) => {
                match accessor.data_type() {
                    DataType::U8 => definition.flags |= MeshFlags::U8_JOINT_IDS,
                    DataType::U16 => definition.flags |= MeshFlags::U16_JOINT_IDS,
                    _ => {}
                }
                definition.joints0 = buffers.accessor(&accessor)?;
            }
            Semantic::Weights(0) if is_float(&accessor) => {
                definition.weights0 = buffers.accessor(&accessor)?
            }
            semantic => tracing::debug!(
                mesh = mesh.index(),
                ?semantic,
                "skipping unsupported attribute"
            ),
        }
    }

    let weights = mesh.weights().unwrap_or_default();
    for (i, target) in primitive.morph_targets().enumerate() {
        let mut shape = BlendShape {
            name: format!("{}_{i}", mesh.name().unwrap_or("blendShape")),
            weight: weights.get(i).copied().unwrap_or(0.0),
            ..Default::default()
        };
        if let Some(positions) = target.positions() {
            shape.deltas = buffers.accessor(&positions)?;
        }
        if let Some(normals) = target.normals() {
            shape.normals = buffers.accessor(&normals)?;
        }
        if let Some(tangents) = target.tangents() {
            shape.tangents = buffers.accessor(&tangents)?;
        }
        definition.blend_shapes.push(shape);
    }

    definition.uri = buffers.uri.unwrap_or_default();
    Ok(definition)
}
