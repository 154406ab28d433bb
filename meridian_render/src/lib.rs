pub mod device;
mod error;
pub mod geometry;
pub mod id;
pub mod image_loader;
pub mod pixel;
pub mod renderer_state;
pub mod sampler;
pub mod texture;

pub use device::{GraphicsDevice, HeadlessDevice};
pub use error::RenderError;
pub use geometry::{AttributeFormat, GeometryDescriptor, IndexData, PrimitiveType, VertexAttribute};
pub use pixel::{PixelData, PixelFormat};
pub use renderer_state::RendererState;
pub use sampler::{FilterMode, SamplerDescriptor, SamplerFlags, WrapMode};
pub use texture::{TextureDescriptor, TextureSet, TextureType};
