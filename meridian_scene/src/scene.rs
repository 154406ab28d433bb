use crate::{
    bundle::ResourceBundle,
    customization::Choices,
    index::Index,
    material::MaterialDefinition,
    mesh::MeshDefinition,
    node::{NodeDefinition, NodeVisitor, Renderable},
    resource::ResourceRefCounts,
    shader::ShaderDefinition,
    skeleton::SkeletonDefinition,
};
use glam::Mat4;
use meridian_ecs::{Entity, LocalTransform, Name, World};
use meridian_render::{
    id::{GeometryId, ShaderId},
    RendererState, TextureSet,
};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0} does not exist")]
    InvalidNode(usize),
}

/// Definition a spawned entity was created from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeRef(pub Index<NodeDefinition>);

/// GPU objects needed to draw an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Renderer {
    pub mesh: Index<MeshDefinition>,
    pub material: Index<MaterialDefinition>,
    pub shader: Index<ShaderDefinition>,
    pub geometry: GeometryId,
    pub textures: TextureSet,
    pub program: ShaderId,
    pub state: RendererState,
}

/// Joints and inverse bind matrices are both indexed by joint id.
#[derive(Clone, Debug, PartialEq)]
pub struct Skin {
    pub skeleton: Index<SkeletonDefinition>,
    /// `None` for joints outside the instantiated subtree.
    pub joints: Vec<Option<Entity>>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// Node hierarchy of a scene; nodes refer to the [`ResourceBundle`] by index.
#[derive(Clone, Debug, Default)]
pub struct SceneDefinition {
    nodes: Vec<NodeDefinition>,
    roots: Vec<Index<NodeDefinition>>,
}

impl SceneDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `node`, linking it into its parent's children when it has one.
    pub fn add_node(&mut self, node: NodeDefinition) -> Result<Index<NodeDefinition>, SceneError> {
        let index = Index::new(self.nodes.len());
        if let Some(parent) = node.parent {
            self.nodes
                .get_mut(parent.get())
                .ok_or(SceneError::InvalidNode(parent.get()))?
                .children
                .push(index);
        }
        self.nodes.push(node);
        Ok(index)
    }

    pub fn add_root(&mut self, index: Index<NodeDefinition>) -> Result<(), SceneError> {
        if index.get() >= self.nodes.len() {
            return Err(SceneError::InvalidNode(index.get()));
        }
        self.roots.push(index);
        Ok(())
    }

    pub fn roots(&self) -> &[Index<NodeDefinition>] {
        &self.roots
    }

    pub fn node(&self, index: Index<NodeDefinition>) -> Option<&NodeDefinition> {
        self.nodes.get(index.get())
    }

    pub fn node_mut(&mut self, index: Index<NodeDefinition>) -> Option<&mut NodeDefinition> {
        self.nodes.get_mut(index.get())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn find_node(&self, name: &str) -> Option<Index<NodeDefinition>> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(Index::new)
    }

    /// Walks the subtree at `root` depth first, visiting only the chosen child
    /// of customized nodes.
    pub fn visit(&self, root: Index<NodeDefinition>, choices: &Choices, visitor: &mut dyn NodeVisitor) {
        let Some(node) = self.node(root) else {
            tracing::warn!(index = root.get(), "visit of a node outside the scene");
            return;
        };

        visitor.start(root, node);
        match &node.customization {
            Some(tag) => {
                if let Some(choice) = choices.resolve(tag, node.children.len()) {
                    self.visit(node.children[choice], choices, visitor);
                }
            }
            None => {
                for &child in &node.children {
                    self.visit(child, choices, visitor);
                }
            }
        }
        visitor.finish(root, node);
    }

    /// Registers the resources of every node [`SceneDefinition::visit`] reaches.
    pub fn count_resource_refs(
        &self,
        root: Index<NodeDefinition>,
        choices: &Choices,
        counts: &mut ResourceRefCounts,
    ) {
        struct RefCounter<'a>(&'a mut ResourceRefCounts);

        impl NodeVisitor for RefCounter<'_> {
            fn start(&mut self, _index: Index<NodeDefinition>, node: &NodeDefinition) {
                node.register_resources(&mut *self.0);
            }
        }

        self.visit(root, choices, &mut RefCounter(counts));
    }

    /// Spawns an entity for every visited node and returns the root entity.
    ///
    /// Renderable nodes whose resources are not loaded get no [`Renderer`].
    pub fn create_nodes(
        &self,
        root: Index<NodeDefinition>,
        choices: &Choices,
        resources: &ResourceBundle,
        world: &mut World,
    ) -> Option<Entity> {
        let mut creator = NodeCreator {
            resources,
            world,
            stack: Vec::new(),
            entities: HashMap::new(),
            skins: Vec::new(),
            root: None,
        };
        self.visit(root, choices, &mut creator);

        let NodeCreator {
            world,
            entities,
            skins,
            root,
            ..
        } = creator;
        for (entity, skeleton_idx) in skins {
            let Some(skeleton) = resources.skeleton(skeleton_idx) else {
                tracing::warn!(skeleton = skeleton_idx.get(), "skin refers to a missing skeleton");
                continue;
            };
            let joints = skeleton
                .joints
                .iter()
                .enumerate()
                .map(|(joint_id, joint)| {
                    let joint_entity = joint
                        .node_idx
                        .and_then(|node_idx| entities.get(&node_idx).copied());
                    if joint_entity.is_none() {
                        tracing::warn!(
                            skeleton = skeleton_idx.get(),
                            joint_id,
                            "joint was not instantiated"
                        );
                    }
                    joint_entity
                })
                .collect();
            let skin = Skin {
                skeleton: skeleton_idx,
                joints,
                inverse_bind_matrices: skeleton.inverse_bind_matrices(),
            };
            if let Err(err) = world.insert_one(entity, skin) {
                tracing::warn!(skeleton = skeleton_idx.get(), error = %err, "failed to attach skin");
            }
        }
        root
    }
}

struct NodeCreator<'a> {
    resources: &'a ResourceBundle,
    world: &'a mut World,
    stack: Vec<Entity>,
    entities: HashMap<Index<NodeDefinition>, Entity>,
    skins: Vec<(Entity, Index<SkeletonDefinition>)>,
    root: Option<Entity>,
}

impl NodeCreator<'_> {
    fn renderer(&self, renderable: &Renderable) -> Option<Renderer> {
        let (_, geometry) = self.resources.mesh(renderable.mesh())?;
        let (_, textures) = self.resources.material(renderable.material())?;
        let shader = renderable.shader()?;
        let (definition, program) = self.resources.shader(shader)?;
        Some(Renderer {
            mesh: renderable.mesh(),
            material: renderable.material(),
            shader,
            geometry: geometry.geometry?,
            textures: textures.clone()?,
            program: (*program)?,
            state: definition.renderer_state,
        })
    }
}

impl NodeVisitor for NodeCreator<'_> {
    fn start(&mut self, index: Index<NodeDefinition>, node: &NodeDefinition) {
        let entity = self.world.spawn((
            Name(node.name.clone()),
            LocalTransform {
                translation: node.position,
                rotation: node.orientation,
                scale: node.scale,
            },
            NodeRef(index),
        ));

        if let Some(renderable) = &node.renderable {
            match self.renderer(renderable) {
                Some(renderer) => {
                    if let Err(err) = self.world.insert_one(entity, renderer) {
                        tracing::warn!(node = %node.name, error = %err, "failed to attach renderer");
                    }
                }
                None => tracing::warn!(node = %node.name, "renderable node has unloaded resources"),
            }
            if let Some(skeleton) = renderable.skeleton() {
                self.skins.push((entity, skeleton));
            }
        }

        match self.stack.last() {
            Some(&parent) => {
                if let Err(err) = self.world.attach_child(parent, entity) {
                    tracing::warn!(node = %node.name, error = %err, "failed to attach to parent");
                }
            }
            None => self.root = Some(entity),
        }
        self.entities.insert(index, entity);
        self.stack.push(entity);
    }

    fn finish(&mut self, _index: Index<NodeDefinition>, _node: &NodeDefinition) {
        self.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        environment::EnvironmentDefinition,
        resource::ResourceType,
        shader_factory::ShaderDefinitionFactory,
        skeleton::Joint,
    };
    use meridian_render::HeadlessDevice;
    use std::path::PathBuf;

    fn renderable(mesh: usize, material: usize) -> Option<Renderable> {
        Some(Renderable::model(Index::new(mesh), Index::new(material)))
    }

    // root
    // +- lod (customized)
    //    +- high (mesh 0, material 0)
    //    +- low  (mesh 1, material 1)
    fn lod_scene() -> (SceneDefinition, Index<NodeDefinition>) {
        let mut scene = SceneDefinition::new();
        let root = scene.add_node(NodeDefinition::new("root")).unwrap();
        let lod = scene
            .add_node(NodeDefinition {
                customization: Some("lod".into()),
                parent: Some(root),
                ..NodeDefinition::new("lod")
            })
            .unwrap();
        for (name, i) in [("high", 0), ("low", 1)] {
            scene
                .add_node(NodeDefinition {
                    renderable: renderable(i, i),
                    parent: Some(lod),
                    ..NodeDefinition::new(name)
                })
                .unwrap();
        }
        scene.add_root(root).unwrap();
        (scene, root)
    }

    fn bundle() -> ResourceBundle {
        let mut bundle = ResourceBundle::new();
        bundle.add_environment(EnvironmentDefinition::default());
        for _ in 0..2 {
            bundle.add_mesh(MeshDefinition {
                uri: "quad".into(),
                ..Default::default()
            });
            bundle.add_material(MaterialDefinition {
                need_albedo_texture: true,
                ..Default::default()
            });
        }
        bundle
    }

    #[test]
    fn add_node_links_parent() {
        let (scene, root) = lod_scene();
        let lod = scene.find_node("lod").unwrap();
        assert_eq!(scene.node(root).unwrap().children, vec![lod]);
        assert_eq!(scene.node(lod).unwrap().children.len(), 2);
        assert_eq!(scene.node_count(), 4);

        let mut scene = scene;
        let orphan = NodeDefinition {
            parent: Some(Index::new(40)),
            ..NodeDefinition::new("orphan")
        };
        assert_eq!(scene.add_node(orphan), Err(SceneError::InvalidNode(40)));
    }

    #[test]
    fn customization_limits_counted_resources() {
        let (scene, root) = lod_scene();
        let bundle = bundle();

        let mut choices = Choices::new();
        choices.set("lod", 1);
        let mut counts = bundle.create_ref_counter();
        scene.count_resource_refs(root, &choices, &mut counts);

        assert_eq!(counts.get(ResourceType::Mesh), &[0, 1]);
        assert_eq!(counts.get(ResourceType::Material), &[0, 1]);

        let mut counts = bundle.create_ref_counter();
        scene.count_resource_refs(root, &Choices::new(), &mut counts);
        assert_eq!(counts.get(ResourceType::Mesh), &[1, 0]);
    }

    #[test]
    fn visit_reports_start_and_finish_in_order() {
        struct Trace(Vec<String>);

        impl NodeVisitor for Trace {
            fn start(&mut self, _index: Index<NodeDefinition>, node: &NodeDefinition) {
                self.0.push(format!("+{}", node.name));
            }

            fn finish(&mut self, _index: Index<NodeDefinition>, node: &NodeDefinition) {
                self.0.push(format!("-{}", node.name));
            }
        }

        let (scene, root) = lod_scene();
        let mut trace = Trace(Vec::new());
        let mut choices = Choices::new();
        choices.set("lod", 9);
        scene.visit(root, &choices, &mut trace);
        assert_eq!(trace.0, vec!["+root", "+lod", "+low", "-low", "-lod", "-root"]);
    }

    #[test]
    fn create_nodes_spawns_visited_hierarchy() {
        let (mut scene, root) = lod_scene();
        let mut bundle = bundle();

        let mut factory = ShaderDefinitionFactory::new(&mut bundle);
        for i in 0..scene.node_count() {
            let index = Index::new(i);
            let node = scene.node(index).unwrap();
            if node.is_renderable() {
                let shader = factory.produce_shader(node);
                if let Some(renderable) = &mut scene.node_mut(index).unwrap().renderable {
                    renderable.set_shader(shader);
                }
            }
        }

        let choices = Choices::new();
        let mut counts = bundle.create_ref_counter();
        scene.count_resource_refs(root, &choices, &mut counts);
        bundle.count_environment_references(&mut counts);

        let mut device = HeadlessDevice::new();
        bundle
            .load_resources(&mut device, &counts, |_| PathBuf::from("unused"))
            .unwrap();

        let mut world = World::new();
        let entity = scene.create_nodes(root, &choices, &bundle, &mut world).unwrap();
        assert_eq!(world.len(), 3);

        let lod = world.children(entity)[0];
        let high = world.children(lod)[0];
        assert_eq!(*world.get().get::<&Name>(high).unwrap(), Name("high".into()));

        let renderer = world.get().get::<&Renderer>(high).unwrap().clone();
        assert_eq!(renderer.mesh, Index::new(0));
        assert!(device.geometry(renderer.geometry).is_some());
        assert!(device.shader(renderer.program).is_some());
        assert!(world.get().get::<&Renderer>(lod).is_err());
    }

    #[test]
    fn skinned_nodes_get_joint_entities() {
        let mut scene = SceneDefinition::new();
        let root = scene.add_node(NodeDefinition::new("root")).unwrap();
        let joint = scene
            .add_node(NodeDefinition {
                parent: Some(root),
                ..NodeDefinition::new("joint")
            })
            .unwrap();
        scene
            .add_node(NodeDefinition {
                parent: Some(root),
                renderable: Some(Renderable::Skinned {
                    mesh: Index::new(0),
                    material: Index::new(0),
                    shader: None,
                    skeleton: Index::new(0),
                }),
                ..NodeDefinition::new("body")
            })
            .unwrap();

        let mut bundle = ResourceBundle::new();
        bundle.add_skeleton(SkeletonDefinition {
            root_node_idx: Some(joint),
            joints: vec![Joint {
                node_idx: Some(joint),
                inverse_bind_matrix: Mat4::from_scale(glam::Vec3::splat(2.0)),
            }],
        });

        let mut world = World::new();
        scene.create_nodes(root, &Choices::new(), &bundle, &mut world);

        let (body, joint_entity) = {
            let children = world.children(entity_named(&world, "root"));
            (children[1], children[0])
        };
        let skin = world.get().get::<&Skin>(body).unwrap().clone();
        assert_eq!(skin.joints, vec![Some(joint_entity)]);
        assert_eq!(skin.inverse_bind_matrices.len(), 1);
    }

    // root (customized)
    // +- branch_a
    // |  +- joint_a
    // +- branch_b
    //    +- joint_b
    //    +- body (skinned, joints [joint_a, joint_b])
    #[test]
    fn skin_joints_stay_aligned_when_a_joint_is_not_visited() {
        let mut scene = SceneDefinition::new();
        let root = scene
            .add_node(NodeDefinition {
                customization: Some("branch".into()),
                ..NodeDefinition::new("root")
            })
            .unwrap();
        let child = |scene: &mut SceneDefinition, name: &str, parent: Index<NodeDefinition>| {
            scene
                .add_node(NodeDefinition {
                    parent: Some(parent),
                    ..NodeDefinition::new(name)
                })
                .unwrap()
        };
        let branch_a = child(&mut scene, "branch_a", root);
        let joint_a = child(&mut scene, "joint_a", branch_a);
        let branch_b = child(&mut scene, "branch_b", root);
        let joint_b = child(&mut scene, "joint_b", branch_b);
        scene
            .add_node(NodeDefinition {
                parent: Some(branch_b),
                renderable: Some(Renderable::Skinned {
                    mesh: Index::new(0),
                    material: Index::new(0),
                    shader: None,
                    skeleton: Index::new(0),
                }),
                ..NodeDefinition::new("body")
            })
            .unwrap();

        let matrix_a = Mat4::from_scale(glam::Vec3::splat(2.0));
        let matrix_b = Mat4::from_scale(glam::Vec3::splat(3.0));
        let mut bundle = ResourceBundle::new();
        bundle.add_skeleton(SkeletonDefinition {
            root_node_idx: Some(root),
            joints: vec![
                Joint {
                    node_idx: Some(joint_a),
                    inverse_bind_matrix: matrix_a,
                },
                Joint {
                    node_idx: Some(joint_b),
                    inverse_bind_matrix: matrix_b,
                },
            ],
        });

        let mut choices = Choices::new();
        choices.set("branch", 1);
        let mut world = World::new();
        scene.create_nodes(root, &choices, &bundle, &mut world);

        let body = entity_named(&world, "body");
        let skin = world.get().get::<&Skin>(body).unwrap().clone();
        assert_eq!(skin.joints.len(), skin.inverse_bind_matrices.len());
        assert_eq!(skin.joints, vec![None, Some(entity_named(&world, "joint_b"))]);
        assert_eq!(skin.inverse_bind_matrices[1], matrix_b);
    }

    fn entity_named(world: &World, target: &str) -> Entity {
        world
            .query::<(&Name,)>()
            .iter()
            .find(|(_, (name,))| name.0 == target)
            .map(|(entity, _)| entity)
            .unwrap()
    }
}
