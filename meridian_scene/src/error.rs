use meridian_render::RenderError;
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Environment index ({index}) out of bounds ({len}).")]
    EnvironmentIndexOutOfBounds { index: usize, len: usize },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("blob at {offset}+{length} exceeds buffer of {available} bytes")]
    BlobOutOfRange {
        offset: usize,
        length: usize,
        available: usize,
    },
    #[error("{} is {width}x{height}, not a strip of six square faces", path.display())]
    InvalidCubeMap {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error("{} is not a supported KTX cube map: {reason}", path.display())]
    InvalidKtx { path: PathBuf, reason: &'static str },
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
