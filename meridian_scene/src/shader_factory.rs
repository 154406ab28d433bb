use crate::{
    bundle::ResourceBundle,
    hash::FeatureHash,
    index::Index,
    material::{MaterialDefinition, MaterialFlags},
    mesh::{BlendShapeVersion, MeshDefinition, MeshFlags, TangentType},
    node::NodeDefinition,
    resource::{ResourceReceiver, ResourceType},
    shader::{ShaderDefinition, UniformValue},
};
use bitflags::bitflags;
use glam::Mat3;
use meridian_render::RendererState;
use std::collections::{BTreeMap, HashMap};

bitflags! {
    /// Everything about a material and mesh pair that changes the shader.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct ShaderFeatures: u32 {
        const TRANSPARENCY = 1 << 0;
        const THREE_TEX = 1 << 1;
        const BASECOLOR_TEX = 1 << 2;
        const METALLIC_ROUGHNESS_TEX = 1 << 3;
        const NORMAL_TEX = 1 << 4;
        const ALPHA_TEST = 1 << 5;
        const SUBSURFACE = 1 << 6;
        const OCCLUSION = 1 << 7;
        const EMISSIVE = 1 << 8;
        const GLTF_CHANNELS = 1 << 9;
        const SKINNING = 1 << 10;
        const FLIP_V = 1 << 11;
        const MORPH_POSITION = 1 << 12;
        const MORPH_NORMAL = 1 << 13;
        const MORPH_TANGENT = 1 << 14;
        const MORPH = 1 << 15;
        const MORPH_VERSION_2_0 = 1 << 16;
        const VEC4_TANGENT = 1 << 17;
    }
}

/// Hash tag and shader define of each feature, in hashing order.
///
/// Transparency has no define; it only changes the renderer state.
const FEATURE_TABLE: [(ShaderFeatures, &str, Option<&str>); 18] = [
    (ShaderFeatures::TRANSPARENCY, "TRANSPARENCY", None),
    (ShaderFeatures::THREE_TEX, "3TEX", Some("THREE_TEX")),
    (ShaderFeatures::BASECOLOR_TEX, "BCTEX", Some("BASECOLOR_TEX")),
    (ShaderFeatures::METALLIC_ROUGHNESS_TEX, "MRTEX", Some("METALLIC_ROUGHNESS_TEX")),
    (ShaderFeatures::NORMAL_TEX, "NTEX", Some("NORMAL_TEX")),
    (ShaderFeatures::ALPHA_TEST, "ALPH", Some("ALPHA_TEST")),
    (ShaderFeatures::SUBSURFACE, "SSS", Some("SSS")),
    (ShaderFeatures::OCCLUSION, "OCCL", Some("OCCLUSION")),
    (ShaderFeatures::EMISSIVE, "EMIS", Some("EMISSIVE")),
    (ShaderFeatures::GLTF_CHANNELS, "GLTF", Some("GLTF_CHANNELS")),
    (ShaderFeatures::SKINNING, "SKIN", Some("SKINNING")),
    (ShaderFeatures::FLIP_V, "FLIP", Some("FLIP_V")),
    (ShaderFeatures::MORPH_POSITION, "MORPHPOS", Some("MORPH_POSITION")),
    (ShaderFeatures::MORPH_NORMAL, "MORPHNOR", Some("MORPH_NORMAL")),
    (ShaderFeatures::MORPH_TANGENT, "MORPHTAN", Some("MORPH_TANGENT")),
    (ShaderFeatures::MORPH, "MORPH", Some("MORPH")),
    (ShaderFeatures::MORPH_VERSION_2_0, "MORPHV2", Some("MORPH_VERSION_2_0")),
    (ShaderFeatures::VEC4_TANGENT, "VEC4TAN", Some("VEC4_TANGENT")),
];

const MAX_LOD: f32 = 6.0;

impl ShaderFeatures {
    pub fn derive(material: &MaterialDefinition, mesh: &MeshDefinition) -> Self {
        let mut features = Self::empty();

        let transparency = material.flags.contains(MaterialFlags::TRANSPARENCY);
        features.set(Self::TRANSPARENCY, transparency);

        // Without both packed textures, the shader samples up to three
        // separate ones.
        let three_tex = transparency
            || !material.check_textures(MaterialFlags::ALBEDO | MaterialFlags::METALLIC)
            || !material.check_textures(MaterialFlags::NORMAL | MaterialFlags::ROUGHNESS);
        if three_tex {
            features |= Self::THREE_TEX;
            features.set(Self::BASECOLOR_TEX, material.check_textures(MaterialFlags::ALBEDO));
            features.set(
                Self::METALLIC_ROUGHNESS_TEX,
                material.check_textures(MaterialFlags::METALLIC | MaterialFlags::ROUGHNESS),
            );
            features.set(Self::NORMAL_TEX, material.check_textures(MaterialFlags::NORMAL));
        }

        features.set(Self::ALPHA_TEST, material.alpha_cutoff() > 0.0);
        features.set(
            Self::SUBSURFACE,
            material.flags.contains(MaterialFlags::SUBSURFACE),
        );
        features.set(
            Self::OCCLUSION,
            material.check_textures(MaterialFlags::OCCLUSION),
        );
        features.set(Self::EMISSIVE, material.check_textures(MaterialFlags::EMISSIVE));
        features.set(
            Self::GLTF_CHANNELS,
            material.flags.contains(MaterialFlags::GLTF_CHANNELS),
        );

        features.set(Self::SKINNING, mesh.is_skinned());
        features.set(
            Self::FLIP_V,
            mesh.flags.contains(MeshFlags::FLIP_UVS_VERTICAL),
        );

        if mesh.has_blend_shapes() {
            let (positions, normals, tangents) = mesh.blend_shape_components();
            features.set(Self::MORPH_POSITION, positions);
            features.set(Self::MORPH_NORMAL, normals);
            features.set(Self::MORPH_TANGENT, tangents);
            if positions || normals || tangents {
                features |= Self::MORPH;
                features.set(
                    Self::MORPH_VERSION_2_0,
                    mesh.blend_shape_version == BlendShapeVersion::V2_0,
                );
            }
        }

        features.set(Self::VEC4_TANGENT, mesh.tangent_type == TangentType::Vec4);
        features
    }

    pub fn feature_hash(self) -> u64 {
        let mut hash = FeatureHash::new();
        for (feature, tag, _) in FEATURE_TABLE {
            if self.contains(feature) {
                hash.add_tag(tag);
            }
        }
        hash.finish()
    }

    pub fn defines(self) -> Vec<String> {
        FEATURE_TABLE
            .iter()
            .filter(|(feature, _, _)| self.contains(*feature))
            .filter_map(|(_, _, define)| define.map(str::to_owned))
            .collect()
    }

    pub fn renderer_state(self) -> RendererState {
        if self.contains(Self::TRANSPARENCY) {
            (RendererState::OPAQUE | RendererState::ALPHA_BLEND) - RendererState::DEPTH_WRITE
        } else {
            RendererState::OPAQUE
        }
    }

    pub fn hints(self) -> Vec<String> {
        let mut hints = Vec::new();
        if self.contains(Self::TRANSPARENCY) {
            hints.push("OUTPUT_IS_TRANSPARENT".to_owned());
        }
        if self.intersects(Self::SKINNING | Self::MORPH) {
            hints.push("MODIFIES_GEOMETRY".to_owned());
        }
        hints
    }

    pub fn shader_definition(self) -> ShaderDefinition {
        let mut uniforms = BTreeMap::new();
        uniforms.insert("uMaxLOD".to_owned(), UniformValue::Float(MAX_LOD));
        uniforms.insert("uCubeMatrix".to_owned(), UniformValue::Mat3(Mat3::IDENTITY));

        ShaderDefinition {
            renderer_state: self.renderer_state(),
            defines: self.defines(),
            hints: self.hints(),
            uniforms,
            use_built_in_shader: true,
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct DrawableRefs {
    mesh: Option<usize>,
    material: Option<usize>,
}

impl ResourceReceiver for DrawableRefs {
    fn register(&mut self, ty: ResourceType, index: usize) {
        match ty {
            ResourceType::Mesh => self.mesh = Some(index),
            ResourceType::Material => self.material = Some(index),
            _ => {}
        }
    }
}

/// Shares one [`ShaderDefinition`] between all nodes with the same
/// [`ShaderFeatures`].
pub struct ShaderDefinitionFactory<'r> {
    resources: &'r mut ResourceBundle,
    shader_map: HashMap<u64, Index<ShaderDefinition>>,
}

impl<'r> ShaderDefinitionFactory<'r> {
    pub fn new(resources: &'r mut ResourceBundle) -> Self {
        Self {
            resources,
            shader_map: HashMap::new(),
        }
    }

    /// Attaches another bundle and forgets every cached shader.
    pub fn set_resources(&mut self, resources: &'r mut ResourceBundle) {
        self.resources = resources;
        self.shader_map.clear();
    }

    pub fn resources(&self) -> &ResourceBundle {
        &*self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceBundle {
        &mut *self.resources
    }

    /// Shader for a renderable node, or `None` when the node does not
    /// resolve to both a mesh and a material.
    pub fn produce_shader(&mut self, node: &NodeDefinition) -> Option<Index<ShaderDefinition>> {
        let mut refs = DrawableRefs::default();
        node.register_resources(&mut refs);

        let (Some(mesh), Some(material)) = (refs.mesh, refs.material) else {
            tracing::debug!(node = %node.name, "no mesh or material to shade");
            return None;
        };
        let (Some((mesh, _)), Some((material, _))) = (
            self.resources.meshes.get(mesh),
            self.resources.materials.get(material),
        ) else {
            tracing::warn!(node = %node.name, mesh, material, "node refers to missing resources");
            return None;
        };

        let features = ShaderFeatures::derive(material, mesh);
        let hash = features.feature_hash();
        if let Some(&index) = self.shader_map.get(&hash) {
            tracing::debug!(hash, index = index.get(), "shader cache hit");
            return Some(index);
        }

        let index = self.resources.add_shader(features.shader_definition());
        tracing::debug!(hash, index = index.get(), ?features, "shader cache miss");
        self.shader_map.insert(hash, index);
        Some(index)
    }
}
