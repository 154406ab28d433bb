use crate::{
    error::RenderError,
    geometry::GeometryDescriptor,
    id::{GeometryId, SamplerId, ShaderId, TextureId},
    pixel::PixelData,
    sampler::SamplerDescriptor,
    texture::{TextureDescriptor, TextureType},
};

/// The rendering backend the scene pipeline creates GPU objects through.
///
/// Every method must be called from the thread that owns the rendering
/// context.
pub trait GraphicsDevice {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureId;

    /// Uploads one mip level of `layer` (the cube face for cube maps).
    fn upload_texture(
        &mut self,
        texture: TextureId,
        layer: u32,
        mip_level: u32,
        pixels: &PixelData,
    ) -> Result<(), RenderError>;

    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<(), RenderError>;

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> SamplerId;

    fn create_geometry(&mut self, desc: GeometryDescriptor) -> GeometryId;

    fn create_shader(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
        hints: &[String],
    ) -> Result<ShaderId, RenderError>;
}

#[derive(Debug)]
pub struct AllocatedTexture {
    pub desc: TextureDescriptor,
    /// `(layer, mip_level)` of every upload, in call order.
    pub uploads: Vec<(u32, u32)>,
    pub has_mipmaps: bool,
}

#[derive(Debug)]
pub struct CompiledShader {
    pub vertex_source: String,
    pub fragment_source: String,
    pub hints: Vec<String>,
}

/// Keeps every created object in memory without touching a GPU.
///
/// Used for offline validation of scenes and as the backend in tests.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    textures: Vec<AllocatedTexture>,
    samplers: Vec<SamplerDescriptor>,
    geometries: Vec<GeometryDescriptor>,
    shaders: Vec<CompiledShader>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&self, id: TextureId) -> Option<&AllocatedTexture> {
        self.textures.get(id.0)
    }

    pub fn sampler(&self, id: SamplerId) -> Option<&SamplerDescriptor> {
        self.samplers.get(id.0)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&GeometryDescriptor> {
        self.geometries.get(id.0)
    }

    pub fn shader(&self, id: ShaderId) -> Option<&CompiledShader> {
        self.shaders.get(id.0)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    fn get_texture_mut(&mut self, id: TextureId) -> Result<&mut AllocatedTexture, RenderError> {
        self.textures
            .get_mut(id.0)
            .ok_or(RenderError::UnknownTexture(id))
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureId {
        self.textures.push(AllocatedTexture {
            desc: *desc,
            uploads: Vec::new(),
            has_mipmaps: false,
        });
        TextureId(self.textures.len() - 1)
    }

    fn upload_texture(
        &mut self,
        texture: TextureId,
        layer: u32,
        mip_level: u32,
        pixels: &PixelData,
    ) -> Result<(), RenderError> {
        let allocated = self.get_texture_mut(texture)?;
        let layers = match allocated.desc.ty {
            TextureType::Texture2D => 1,
            TextureType::TextureCube => 6,
        };
        if layer >= layers {
            return Err(RenderError::LayerOutOfRange { layer, layers });
        }

        let (width, height) = (allocated.desc.width, allocated.desc.height);
        let (level_width, level_height) = match mip_level {
            0 => (width, height),
            level if level < u32::BITS && (width >> level > 0 || height >> level > 0) => {
                ((width >> level).max(1), (height >> level).max(1))
            }
            _ => {
                return Err(RenderError::MipLevelOutOfRange {
                    mip_level,
                    width,
                    height,
                })
            }
        };

        let expected = level_width as usize
            * level_height as usize
            * allocated.desc.format.bytes_per_pixel();
        if pixels.data.len() != expected {
            return Err(RenderError::PixelSizeMismatch {
                expected,
                actual: pixels.data.len(),
            });
        }

        allocated.uploads.push((layer, mip_level));
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<(), RenderError> {
        self.get_texture_mut(texture)?.has_mipmaps = true;
        Ok(())
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> SamplerId {
        self.samplers.push(*desc);
        SamplerId(self.samplers.len() - 1)
    }

    fn create_geometry(&mut self, desc: GeometryDescriptor) -> GeometryId {
        self.geometries.push(desc);
        GeometryId(self.geometries.len() - 1)
    }

    fn create_shader(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
        hints: &[String],
    ) -> Result<ShaderId, RenderError> {
        if vertex_source.trim().is_empty() {
            return Err(RenderError::EmptyShaderSource { stage: "vertex" });
        }
        if fragment_source.trim().is_empty() {
            return Err(RenderError::EmptyShaderSource { stage: "fragment" });
        }

        self.shaders.push(CompiledShader {
            vertex_source: vertex_source.to_owned(),
            fragment_source: fragment_source.to_owned(),
            hints: hints.to_vec(),
        });
        Ok(ShaderId(self.shaders.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PixelFormat;

    #[test]
    fn upload_checks_extent() {
        let mut device = HeadlessDevice::new();
        let texture = device.create_texture(&TextureDescriptor {
            ty: TextureType::Texture2D,
            format: PixelFormat::Rgb888,
            width: 1,
            height: 1,
        });

        let result = device.upload_texture(texture, 0, 0, &PixelData::single_rgba([0; 4]));
        assert!(matches!(
            result,
            Err(RenderError::PixelSizeMismatch {
                expected: 3,
                actual: 4
            })
        ));

        device
            .upload_texture(texture, 0, 0, &PixelData::single_rgb([0; 3]))
            .unwrap();
        assert_eq!(device.texture(texture).unwrap().uploads, vec![(0, 0)]);
    }

    #[test]
    fn cube_textures_take_six_layers() {
        let mut device = HeadlessDevice::new();
        let texture = device.create_texture(&TextureDescriptor {
            ty: TextureType::TextureCube,
            format: PixelFormat::Rgba8888,
            width: 1,
            height: 1,
        });
        let face = PixelData::single_rgba([255; 4]);
        for layer in 0..6 {
            device.upload_texture(texture, layer, 0, &face).unwrap();
        }
        assert!(matches!(
            device.upload_texture(texture, 6, 0, &face),
            Err(RenderError::LayerOutOfRange { layer: 6, layers: 6 })
        ));
    }

    #[test]
    fn mip_levels_halve_down_to_one_pixel() {
        let mut device = HeadlessDevice::new();
        let texture = device.create_texture(&TextureDescriptor {
            ty: TextureType::Texture2D,
            format: PixelFormat::L8,
            width: 4,
            height: 2,
        });

        let level = |width, height| {
            PixelData::new(width, height, PixelFormat::L8, vec![0; (width * height) as usize])
        };
        device.upload_texture(texture, 0, 0, &level(4, 2)).unwrap();
        device.upload_texture(texture, 0, 1, &level(2, 1)).unwrap();
        device.upload_texture(texture, 0, 2, &level(1, 1)).unwrap();
        assert!(matches!(
            device.upload_texture(texture, 0, 3, &level(1, 1)),
            Err(RenderError::MipLevelOutOfRange { mip_level: 3, .. })
        ));
        assert_eq!(
            device.texture(texture).unwrap().uploads,
            vec![(0, 0), (0, 1), (0, 2)]
        );
    }

    #[test]
    fn rejects_empty_shader_sources() {
        let mut device = HeadlessDevice::new();
        assert!(device.create_shader("", "void main() {}", &[]).is_err());
        let id = device
            .create_shader("void main() {}", "void main() {}", &[])
            .unwrap();
        assert_eq!(device.shader_count(), 1);
        assert_eq!(device.shader(id).unwrap().hints.len(), 0);
    }
}
