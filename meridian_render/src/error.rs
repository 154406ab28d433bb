use crate::id::TextureId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),
    #[error("layer {layer} out of range ({layers} layers)")]
    LayerOutOfRange { layer: u32, layers: u32 },
    #[error("mip level {mip_level} out of range for a {width}x{height} texture")]
    MipLevelOutOfRange {
        mip_level: u32,
        width: u32,
        height: u32,
    },
    #[error("pixel data is {actual} bytes, texture expects {expected}")]
    PixelSizeMismatch { expected: usize, actual: usize },
    #[error("empty {stage} shader source")]
    EmptyShaderSource { stage: &'static str },
}
