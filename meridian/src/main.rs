mod config;

use config::Config;
use meridian_ecs::World;
use meridian_gltf::load_gltf_scene;
use meridian_render::HeadlessDevice;
use meridian_scene::{
    ResourceBundle, ResourcePaths, ResourceType, SceneDefinition, ShaderDefinitionFactory,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let mut bundle = ResourceBundle::new();
    let mut scene = SceneDefinition::new();
    {
        let mut factory = ShaderDefinitionFactory::new(&mut bundle);
        load_gltf_scene(&config.scene, &mut factory, &mut scene)?;
    }

    let mut counts = bundle.create_ref_counter();
    for root in scene.roots() {
        scene.count_resource_refs(*root, &config.choices, &mut counts);
    }
    bundle.count_environment_references(&mut counts);

    let mut device = HeadlessDevice::new();
    let paths = ResourcePaths::new(&config.resources);
    bundle.load_resources(&mut device, &counts, |ty| paths.path(ty))?;
    tracing::info!(
        textures = device.texture_count(),
        samplers = device.sampler_count(),
        geometries = device.geometry_count(),
        shaders = device.shader_count(),
        "Resources loaded"
    );

    let mut world = World::new();
    for root in scene.roots() {
        if scene
            .create_nodes(*root, &config.choices, &bundle, &mut world)
            .is_none()
        {
            tracing::warn!(root = root.get(), "Root node missing from scene");
        }
    }

    tracing::info!(
        nodes = scene.node_count(),
        entities = world.len(),
        meshes = counts.referenced(ResourceType::Mesh).count(),
        materials = counts.referenced(ResourceType::Material).count(),
        "Scene instantiated"
    );

    Ok(())
}
