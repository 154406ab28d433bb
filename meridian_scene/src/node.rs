use crate::{
    index::Index,
    material::MaterialDefinition,
    mesh::MeshDefinition,
    resource::{ResourceReceiver, ResourceType},
    shader::ShaderDefinition,
    skeleton::SkeletonDefinition,
};
use glam::{Mat4, Quat, Vec3};

/// What a node draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Renderable {
    Model {
        mesh: Index<MeshDefinition>,
        material: Index<MaterialDefinition>,
        shader: Option<Index<ShaderDefinition>>,
    },
    Skinned {
        mesh: Index<MeshDefinition>,
        material: Index<MaterialDefinition>,
        shader: Option<Index<ShaderDefinition>>,
        skeleton: Index<SkeletonDefinition>,
    },
}

impl Renderable {
    pub fn model(mesh: Index<MeshDefinition>, material: Index<MaterialDefinition>) -> Self {
        Renderable::Model {
            mesh,
            material,
            shader: None,
        }
    }

    pub fn mesh(&self) -> Index<MeshDefinition> {
        match *self {
            Renderable::Model { mesh, .. } | Renderable::Skinned { mesh, .. } => mesh,
        }
    }

    pub fn material(&self) -> Index<MaterialDefinition> {
        match *self {
            Renderable::Model { material, .. } | Renderable::Skinned { material, .. } => material,
        }
    }

    pub fn shader(&self) -> Option<Index<ShaderDefinition>> {
        match *self {
            Renderable::Model { shader, .. } | Renderable::Skinned { shader, .. } => shader,
        }
    }

    pub fn set_shader(&mut self, index: Option<Index<ShaderDefinition>>) {
        match self {
            Renderable::Model { shader, .. } | Renderable::Skinned { shader, .. } => {
                *shader = index
            }
        }
    }

    pub fn skeleton(&self) -> Option<Index<SkeletonDefinition>> {
        match *self {
            Renderable::Model { .. } => None,
            Renderable::Skinned { skeleton, .. } => Some(skeleton),
        }
    }

    /// Every resource this renderable depends on.
    pub fn resource_refs(&self) -> Vec<(ResourceType, usize)> {
        let mut refs = vec![
            (ResourceType::Mesh, self.mesh().get()),
            (ResourceType::Material, self.material().get()),
        ];
        if let Some(shader) = self.shader() {
            refs.push((ResourceType::Shader, shader.get()));
        }
        if let Some(skeleton) = self.skeleton() {
            refs.push((ResourceType::Skeleton, skeleton.get()));
        }
        refs
    }

    pub fn register_resources(&self, receiver: &mut dyn ResourceReceiver) {
        for (ty, index) in self.resource_refs() {
            receiver.register(ty, index);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeDefinition {
    pub name: String,
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: Vec3,
    pub renderable: Option<Renderable>,
    /// Tag selecting which single child is visited; see [`crate::Choices`].
    pub customization: Option<String>,
    pub children: Vec<Index<NodeDefinition>>,
    pub parent: Option<Index<NodeDefinition>>,
}

impl Default for NodeDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            scale: Vec3::ONE,
            renderable: None,
            customization: None,
            children: Vec::new(),
            parent: None,
        }
    }
}

impl NodeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation, self.position)
    }

    pub fn is_renderable(&self) -> bool {
        self.renderable.is_some()
    }

    pub fn register_resources(&self, receiver: &mut dyn ResourceReceiver) {
        if let Some(renderable) = &self.renderable {
            renderable.register_resources(receiver);
        }
    }
}

/// Callbacks for a depth first walk of a scene.
pub trait NodeVisitor {
    fn start(&mut self, index: Index<NodeDefinition>, node: &NodeDefinition);

    fn finish(&mut self, _index: Index<NodeDefinition>, _node: &NodeDefinition) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<(ResourceType, usize)>);

    impl ResourceReceiver for Recorder {
        fn register(&mut self, ty: ResourceType, index: usize) {
            self.0.push((ty, index));
        }
    }

    #[test]
    fn skinned_registers_every_dependency() {
        let renderable = Renderable::Skinned {
            mesh: Index::new(1),
            material: Index::new(2),
            shader: Some(Index::new(3)),
            skeleton: Index::new(4),
        };
        let mut recorder = Recorder::default();
        renderable.register_resources(&mut recorder);
        assert_eq!(
            recorder.0,
            vec![
                (ResourceType::Mesh, 1),
                (ResourceType::Material, 2),
                (ResourceType::Shader, 3),
                (ResourceType::Skeleton, 4),
            ]
        );
    }

    #[test]
    fn plain_nodes_register_nothing() {
        let mut recorder = Recorder::default();
        NodeDefinition::new("empty").register_resources(&mut recorder);
        assert!(recorder.0.is_empty());

        let mut model = Renderable::model(Index::new(0), Index::new(0));
        model.set_shader(Some(Index::new(7)));
        assert_eq!(model.shader(), Some(Index::new(7)));
        assert_eq!(model.skeleton(), None);
    }
}
