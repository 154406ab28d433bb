use crate::{
    environment::{EnvironmentDefinition, EnvironmentTextures},
    error::LoadError,
    index::Index,
    material::MaterialDefinition,
    mesh::{MeshDefinition, MeshGeometry},
    resource::{ResourceRefCounts, ResourceType},
    shader::ShaderDefinition,
    skeleton::SkeletonDefinition,
};
use meridian_render::{id::ShaderId, GraphicsDevice, TextureSet};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Base directory of every resource kind, with a shared fallback root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourcePaths {
    root: PathBuf,
    overrides: HashMap<ResourceType, PathBuf>,
}

impl ResourcePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overrides: HashMap::new(),
        }
    }

    pub fn with(mut self, ty: ResourceType, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(ty, path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, ty: ResourceType) -> PathBuf {
        self.overrides
            .get(&ty)
            .cloned()
            .unwrap_or_else(|| self.root.clone())
    }
}

/// Definitions of everything a scene may draw, paired with the GPU state
/// created for them.
///
/// Definitions are added by format loaders; GPU state appears only after
/// [`ResourceBundle::load_resources`] for the resources that were counted.
#[derive(Debug, Default)]
pub struct ResourceBundle {
    pub environment_maps: Vec<(EnvironmentDefinition, EnvironmentTextures)>,
    pub shaders: Vec<(ShaderDefinition, Option<ShaderId>)>,
    pub skeletons: Vec<SkeletonDefinition>,
    pub meshes: Vec<(MeshDefinition, MeshGeometry)>,
    pub materials: Vec<(MaterialDefinition, Option<TextureSet>)>,
}

impl ResourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_environment(&mut self, environment: EnvironmentDefinition) -> Index<EnvironmentDefinition> {
        self.environment_maps
            .push((environment, EnvironmentTextures::default()));
        Index::new(self.environment_maps.len() - 1)
    }

    pub fn add_shader(&mut self, shader: ShaderDefinition) -> Index<ShaderDefinition> {
        self.shaders.push((shader, None));
        Index::new(self.shaders.len() - 1)
    }

    pub fn add_skeleton(&mut self, skeleton: SkeletonDefinition) -> Index<SkeletonDefinition> {
        self.skeletons.push(skeleton);
        Index::new(self.skeletons.len() - 1)
    }

    pub fn add_mesh(&mut self, mesh: MeshDefinition) -> Index<MeshDefinition> {
        self.meshes.push((mesh, MeshGeometry::default()));
        Index::new(self.meshes.len() - 1)
    }

    pub fn add_material(&mut self, material: MaterialDefinition) -> Index<MaterialDefinition> {
        self.materials.push((material, None));
        Index::new(self.materials.len() - 1)
    }

    pub fn mesh(&self, index: Index<MeshDefinition>) -> Option<&(MeshDefinition, MeshGeometry)> {
        self.meshes.get(index.get())
    }

    pub fn material(
        &self,
        index: Index<MaterialDefinition>,
    ) -> Option<&(MaterialDefinition, Option<TextureSet>)> {
        self.materials.get(index.get())
    }

    pub fn shader(&self, index: Index<ShaderDefinition>) -> Option<&(ShaderDefinition, Option<ShaderId>)> {
        self.shaders.get(index.get())
    }

    pub fn skeleton(&self, index: Index<SkeletonDefinition>) -> Option<&SkeletonDefinition> {
        self.skeletons.get(index.get())
    }

    pub fn len(&self, ty: ResourceType) -> usize {
        match ty {
            ResourceType::Environment => self.environment_maps.len(),
            ResourceType::Shader => self.shaders.len(),
            ResourceType::Skeleton => self.skeletons.len(),
            ResourceType::Mesh => self.meshes.len(),
            ResourceType::Material => self.materials.len(),
        }
    }

    /// Zeroed counts sized to the current collections.
    pub fn create_ref_counter(&self) -> ResourceRefCounts {
        ResourceRefCounts::new(|ty| self.len(ty))
    }

    /// Counts one environment reference per referenced material, however
    /// many nodes use it.
    pub fn count_environment_references(&self, counts: &mut ResourceRefCounts) {
        let materials = counts.referenced(ResourceType::Material).collect::<Vec<_>>();
        for index in materials {
            if let Some((material, _)) = self.materials.get(index) {
                counts.increment(ResourceType::Environment, material.environment_idx.get());
            }
        }
    }

    /// Loads every resource with a nonzero count that has no GPU state yet.
    ///
    /// Environments load first, since materials bind their textures. A
    /// failure leaves the resources loaded so far in place.
    pub fn load_resources(
        &mut self,
        device: &mut dyn GraphicsDevice,
        counts: &ResourceRefCounts,
        path_provider: impl Fn(ResourceType) -> PathBuf,
    ) -> Result<(), LoadError> {
        let environments_path = path_provider(ResourceType::Environment);
        for index in counts.referenced(ResourceType::Environment) {
            let Some((environment, textures)) = self.environment_maps.get_mut(index) else {
                continue;
            };
            if textures.is_loaded() || textures.brdf.is_some() {
                continue;
            }
            tracing::debug!(kind = "environment", index, "loading");
            let raw = environment.load_raw(&environments_path)?;
            *textures = environment.load(device, raw)?;
        }

        let shaders_path = path_provider(ResourceType::Shader);
        for index in counts.referenced(ResourceType::Shader) {
            let Some((shader, program)) = self.shaders.get_mut(index) else {
                continue;
            };
            if program.is_some() {
                continue;
            }
            tracing::debug!(kind = "shader", index, "loading");
            let raw = shader.load_raw(&shaders_path)?;
            *program = Some(shader.load(device, raw)?);
        }

        let meshes_path = path_provider(ResourceType::Mesh);
        for index in counts.referenced(ResourceType::Mesh) {
            let Some((mesh, geometry)) = self.meshes.get_mut(index) else {
                continue;
            };
            if geometry.is_loaded() {
                continue;
            }
            tracing::debug!(kind = "mesh", index, "loading");
            let raw = mesh.load_raw(&meshes_path)?;
            *geometry = mesh.load(device, raw);
        }

        let materials_path = path_provider(ResourceType::Material);
        for index in counts.referenced(ResourceType::Material) {
            let Some((material, texture_set)) = self.materials.get_mut(index) else {
                continue;
            };
            if texture_set.is_some() {
                continue;
            }
            tracing::debug!(kind = "material", index, "loading");
            let raw = material.load_raw(&materials_path);
            *texture_set = Some(material.load(device, &self.environment_maps, raw)?);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialFlags;
    use meridian_render::HeadlessDevice;

    fn bundle_with_unused_material() -> ResourceBundle {
        let mut bundle = ResourceBundle::new();
        bundle.add_environment(EnvironmentDefinition::default());
        bundle.add_mesh(MeshDefinition {
            uri: "quad".into(),
            ..Default::default()
        });
        bundle.add_mesh(MeshDefinition {
            uri: "quad".into(),
            ..Default::default()
        });
        for _ in 0..2 {
            bundle.add_material(MaterialDefinition {
                flags: MaterialFlags::ALBEDO,
                need_albedo_texture: true,
                ..Default::default()
            });
        }
        bundle
    }

    #[test]
    fn unreferenced_resources_stay_unloaded() {
        let mut bundle = bundle_with_unused_material();
        let mut counts = bundle.create_ref_counter();
        counts.increment(ResourceType::Mesh, 0);
        counts.increment(ResourceType::Material, 0);
        bundle.count_environment_references(&mut counts);
        assert_eq!(counts.get(ResourceType::Environment), &[1]);

        let mut device = HeadlessDevice::new();
        let paths = ResourcePaths::new("unused");
        bundle
            .load_resources(&mut device, &counts, |ty| paths.path(ty))
            .unwrap();

        assert!(bundle.meshes[0].1.is_loaded());
        assert!(!bundle.meshes[1].1.is_loaded());
        assert!(bundle.materials[0].1.is_some());
        assert!(bundle.materials[1].1.is_none());
        assert_eq!(device.geometry_count(), 1);
        assert_eq!(device.texture_count(), 1);
    }

    #[test]
    fn loading_twice_creates_nothing_new() {
        let mut bundle = bundle_with_unused_material();
        let mut counts = bundle.create_ref_counter();
        counts.increment(ResourceType::Mesh, 1);
        counts.increment(ResourceType::Material, 1);
        bundle.count_environment_references(&mut counts);

        let mut device = HeadlessDevice::new();
        for _ in 0..2 {
            bundle
                .load_resources(&mut device, &counts, |_| PathBuf::from("unused"))
                .unwrap();
        }
        assert_eq!(device.geometry_count(), 1);
        assert_eq!(device.texture_count(), 1);
    }

    #[test]
    fn material_with_missing_environment_fails() {
        let mut bundle = ResourceBundle::new();
        bundle.add_material(MaterialDefinition {
            environment_idx: Index::new(3),
            ..Default::default()
        });
        let mut counts = bundle.create_ref_counter();
        counts.increment(ResourceType::Material, 0);

        let mut device = HeadlessDevice::new();
        let result = bundle.load_resources(&mut device, &counts, |_| PathBuf::new());
        assert!(matches!(
            result,
            Err(LoadError::EnvironmentIndexOutOfBounds { index: 3, len: 0 })
        ));
        assert!(bundle.materials[0].1.is_none());
    }

    #[test]
    fn shared_material_references_environment_once() {
        use crate::{
            customization::Choices,
            node::{NodeDefinition, Renderable},
            scene::SceneDefinition,
        };

        let bundle = bundle_with_unused_material();
        let mut scene = SceneDefinition::new();
        let root = scene.add_node(NodeDefinition::new("root")).unwrap();
        for name in ["left", "right"] {
            scene
                .add_node(NodeDefinition {
                    renderable: Some(Renderable::model(Index::new(0), Index::new(0))),
                    parent: Some(root),
                    ..NodeDefinition::new(name)
                })
                .unwrap();
        }

        let mut counts = bundle.create_ref_counter();
        scene.count_resource_refs(root, &Choices::new(), &mut counts);
        bundle.count_environment_references(&mut counts);

        assert_eq!(counts.get(ResourceType::Material), &[2, 0]);
        assert_eq!(counts.get(ResourceType::Environment), &[1]);
    }

    #[test]
    fn resource_paths_fall_back_to_root() {
        let paths = ResourcePaths::new("/assets").with(ResourceType::Shader, "/shaders");
        assert_eq!(paths.path(ResourceType::Shader), PathBuf::from("/shaders"));
        assert_eq!(paths.path(ResourceType::Mesh), PathBuf::from("/assets"));
    }
}
