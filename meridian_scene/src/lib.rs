//! Scene definitions and the resource pipeline that turns them into GPU
//! objects and entities.
//!
//! A format loader fills a [`ResourceBundle`] and a [`SceneDefinition`],
//! asking a [`ShaderDefinitionFactory`] for the shader of every renderable
//! node. Instantiating a scene then counts the resources its visible nodes
//! need, loads only those, and spawns the node tree into a world.

pub mod bundle;
pub mod customization;
pub mod environment;
mod error;
mod hash;
pub mod index;
mod ktx;
pub mod material;
pub mod mesh;
pub mod node;
pub mod resource;
pub mod scene;
pub mod shader;
pub mod shader_factory;
pub mod skeleton;

pub use bundle::{ResourceBundle, ResourcePaths};
pub use customization::Choices;
pub use environment::{EnvironmentDefinition, EnvironmentTextures};
pub use error::LoadError;
pub use index::Index;
pub use material::{MaterialDefinition, MaterialFlags, TextureDefinition, TextureStage};
pub use mesh::{Accessor, BlendShape, Blob, MeshDefinition, MeshFlags, MeshGeometry, SparseBlob};
pub use node::{NodeDefinition, NodeVisitor, Renderable};
pub use resource::{ResourceReceiver, ResourceRefCounts, ResourceType};
pub use scene::{NodeRef, Renderer, SceneDefinition, SceneError, Skin};
pub use shader::{ShaderDefinition, UniformValue};
pub use shader_factory::{ShaderDefinitionFactory, ShaderFeatures};
pub use skeleton::{Joint, SkeletonDefinition};
