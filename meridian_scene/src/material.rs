use crate::{
    environment::{EnvironmentDefinition, EnvironmentTextures},
    error::LoadError,
    index::Index,
};
use bitflags::bitflags;
use glam::{Vec3, Vec4};
use meridian_render::{
    id::SamplerId,
    image_loader::load_image,
    FilterMode, GraphicsDevice, PixelData, SamplerDescriptor, SamplerFlags, TextureDescriptor,
    TextureSet, TextureType, WrapMode,
};
use std::path::Path;

bitflags! {
    /// Texture channels present on a material, plus binary options.
    ///
    /// The top eight bits hold the alpha cutoff; see
    /// [`MaterialFlags::alpha_cutoff`].
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct MaterialFlags: u32 {
        const ALBEDO = 1 << 0;
        const METALLIC = 1 << 1;
        const ROUGHNESS = 1 << 2;
        const NORMAL = 1 << 3;
        const EMISSIVE = 1 << 4;
        const OCCLUSION = 1 << 5;
        const SUBSURFACE = 1 << 6;

        const TRANSPARENCY = 1 << 20;
        /// Metallic in B, roughness in G.
        const GLTF_CHANNELS = 1 << 21;

        const ALPHA_CUTOFF = 0xff << 24;
    }
}

impl MaterialFlags {
    pub const ALPHA_CUTOFF_BITS: u32 = 8;
    pub const ALPHA_CUTOFF_SHIFT: u32 = u32::BITS - Self::ALPHA_CUTOFF_BITS;
    pub const ALPHA_CUTOFF_MASK: u32 = (1 << Self::ALPHA_CUTOFF_BITS) - 1;

    pub fn alpha_cutoff(self) -> f32 {
        ((self.bits() >> Self::ALPHA_CUTOFF_SHIFT) & Self::ALPHA_CUTOFF_MASK) as f32 / 255.0
    }

    pub fn set_alpha_cutoff(&mut self, cutoff: f32) {
        let value = (cutoff.clamp(0.0, 1.0) * 255.0).round() as u32;
        *self = Self::from_bits_retain(
            (self.bits() & !(Self::ALPHA_CUTOFF_MASK << Self::ALPHA_CUTOFF_SHIFT))
                | (value << Self::ALPHA_CUTOFF_SHIFT),
        );
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureDefinition {
    pub image_uri: String,
    pub sampler_flags: SamplerFlags,
}

impl TextureDefinition {
    pub fn new(image_uri: impl Into<String>, sampler_flags: SamplerFlags) -> Self {
        Self {
            image_uri: image_uri.into(),
            sampler_flags,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureStage {
    pub semantic: MaterialFlags,
    pub texture: TextureDefinition,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawTexture {
    pub pixels: PixelData,
    pub sampler_flags: SamplerFlags,
}

/// Textures in the order [`MaterialDefinition::load`] binds them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawData {
    pub textures: Vec<RawTexture>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialDefinition {
    pub flags: MaterialFlags,
    pub environment_idx: Index<EnvironmentDefinition>,
    pub color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub base_color_factor: Vec4,
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    pub emissive_factor: Vec3,
    pub need_albedo_texture: bool,
    pub need_metallic_roughness_texture: bool,
    pub need_normal_texture: bool,
    /// Stage order matters: [`MaterialDefinition::load_raw`] consumes stages
    /// front to back.
    pub texture_stages: Vec<TextureStage>,
}

impl Default for MaterialDefinition {
    fn default() -> Self {
        Self {
            flags: MaterialFlags::empty(),
            environment_idx: Index::new(0),
            color: Vec4::ONE,
            metallic: 1.0,
            roughness: 1.0,
            base_color_factor: Vec4::ONE,
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            emissive_factor: Vec3::ZERO,
            need_albedo_texture: false,
            need_metallic_roughness_texture: false,
            need_normal_texture: false,
            texture_stages: Vec::new(),
        }
    }
}

// Normal of (0, 0, 1), roughness of 1.
const NORMAL_ROUGHNESS_PIXEL: [u8; 4] = [0x7f, 0x7f, 0xff, 0xff];
const NORMAL_PIXEL: [u8; 3] = [0x7f, 0x7f, 0xff];
// dli reads metallic/roughness from R and A, glTF from B and G.
const METALLIC_ROUGHNESS_PIXEL: [u8; 4] = [0xff; 4];

struct StageCursor<'a> {
    stages: &'a [TextureStage],
    pos: usize,
}

impl StageCursor<'_> {
    fn matches(&self, flags: MaterialFlags) -> bool {
        self.stages
            .get(self.pos)
            .is_some_and(|stage| stage.semantic.contains(flags))
    }

    fn take(&mut self, images_path: &Path) -> RawTexture {
        let stage = &self.stages[self.pos];
        self.pos += 1;
        RawTexture {
            pixels: load_image(&images_path.join(&stage.texture.image_uri)),
            sampler_flags: stage.texture.sampler_flags,
        }
    }
}

fn single_value(pixels: PixelData) -> RawTexture {
    RawTexture {
        pixels,
        sampler_flags: SamplerFlags::SINGLE_VALUE,
    }
}

fn unit_to_byte(value: f32) -> u8 {
    (value * 255.0) as u8
}

impl MaterialDefinition {
    pub fn alpha_cutoff(&self) -> f32 {
        self.flags.alpha_cutoff()
    }

    pub fn set_alpha_cutoff(&mut self, cutoff: f32) {
        self.flags.set_alpha_cutoff(cutoff);
    }

    /// Whether any stage provides every channel in `flags`.
    pub fn check_textures(&self, flags: MaterialFlags) -> bool {
        self.texture_stages
            .iter()
            .any(|stage| stage.semantic.contains(flags))
    }

    /// Loads the stage images and synthesizes single pixel stand-ins for the
    /// mandatory channels that have no image.
    ///
    /// Performs no GPU calls and may run on any thread.
    pub fn load_raw(&self, images_path: &Path) -> RawData {
        let has_transparency = self.flags.contains(MaterialFlags::TRANSPARENCY);
        let mut raw = RawData::default();
        let mut stages = StageCursor {
            stages: &self.texture_stages,
            pos: 0,
        };

        if stages.matches(MaterialFlags::ALBEDO | MaterialFlags::METALLIC) {
            raw.textures.push(stages.take(images_path));

            if stages.matches(MaterialFlags::NORMAL | MaterialFlags::ROUGHNESS) {
                raw.textures.push(stages.take(images_path));
            } else {
                raw.textures
                    .push(single_value(PixelData::single_rgba(NORMAL_ROUGHNESS_PIXEL)));
            }
        } else {
            if stages.matches(MaterialFlags::ALBEDO) {
                raw.textures.push(stages.take(images_path));
            } else if self.need_albedo_texture {
                raw.textures.push(single_value(self.albedo_pixel(
                    has_transparency,
                    stages.matches(MaterialFlags::METALLIC | MaterialFlags::ROUGHNESS),
                )));
            }

            // Transparency or an albedo image means metallic-roughness and
            // normal come as separate textures.
            let separate_metallic_roughness = has_transparency || stages.pos > 0;
            if stages.matches(MaterialFlags::METALLIC | MaterialFlags::ROUGHNESS) {
                raw.textures.push(stages.take(images_path));
            } else if separate_metallic_roughness && self.need_metallic_roughness_texture {
                raw.textures
                    .push(single_value(PixelData::single_rgba(METALLIC_ROUGHNESS_PIXEL)));
            }

            if stages.matches(MaterialFlags::NORMAL) {
                raw.textures.push(stages.take(images_path));
            } else if self.need_normal_texture {
                if separate_metallic_roughness {
                    raw.textures
                        .push(single_value(PixelData::single_rgb(NORMAL_PIXEL)));
                } else {
                    raw.textures
                        .push(single_value(PixelData::single_rgba(NORMAL_ROUGHNESS_PIXEL)));
                }
            }
        }

        for extra in [
            MaterialFlags::SUBSURFACE,
            MaterialFlags::OCCLUSION,
            MaterialFlags::EMISSIVE,
        ] {
            if stages.matches(extra) {
                raw.textures.push(stages.take(images_path));
            }
        }

        raw
    }

    // Albedo with alpha, albedo with metallic of 1, or plain albedo.
    fn albedo_pixel(&self, has_transparency: bool, has_metallic_roughness: bool) -> PixelData {
        let rgb = [
            unit_to_byte(self.color.x),
            unit_to_byte(self.color.y),
            unit_to_byte(self.color.z),
        ];
        if has_transparency {
            PixelData::single_rgba([rgb[0], rgb[1], rgb[2], unit_to_byte(self.color.w)])
        } else if !has_metallic_roughness {
            PixelData::single_rgba([rgb[0], rgb[1], rgb[2], 0xff])
        } else {
            PixelData::single_rgb(rgb)
        }
    }

    /// Creates a texture set from `raw`, then appends the textures of the
    /// referenced environment.
    ///
    /// Must run on the rendering thread.
    pub fn load(
        &self,
        device: &mut dyn GraphicsDevice,
        environments: &[(EnvironmentDefinition, EnvironmentTextures)],
        raw: RawData,
    ) -> Result<TextureSet, LoadError> {
        let (_, environment) = environments.get(self.environment_idx.get()).ok_or(
            LoadError::EnvironmentIndexOutOfBounds {
                index: self.environment_idx.get(),
                len: environments.len(),
            },
        )?;

        let mut texture_set = TextureSet::new();
        let mut n = 0;
        for texture in raw.textures {
            let pixels = &texture.pixels;
            if pixels.is_empty() {
                tracing::warn!(slot = n, "binding an empty texture");
            }
            let id = device.create_texture(&TextureDescriptor {
                ty: TextureType::Texture2D,
                format: pixels.format,
                width: pixels.width,
                height: pixels.height,
            });
            device.upload_texture(id, 0, 0, pixels)?;
            if texture.sampler_flags.has_mipmaps() {
                device.generate_mipmaps(id)?;
            }

            texture_set.set_texture(n, id);
            texture_set.set_sampler(n, texture.sampler_flags.make_sampler(device));
            n += 1;
        }

        if let Some(diffuse) = environment.diffuse {
            texture_set.set_texture(n, diffuse);
            n += 1;
        }

        if let Some(specular) = environment.specular {
            let sampler = specular_sampler(device);
            texture_set.set_texture(n, specular);
            texture_set.set_sampler(n, sampler);
            n += 1;
        }

        if let Some(brdf) = environment.brdf {
            texture_set.set_texture(n, brdf);
        }

        Ok(texture_set)
    }
}

fn specular_sampler(device: &mut dyn GraphicsDevice) -> SamplerId {
    device.create_sampler(&SamplerDescriptor {
        min_filter: FilterMode::LinearMipmapLinear,
        mag_filter: FilterMode::Linear,
        wrap_s: WrapMode::ClampToEdge,
        wrap_t: WrapMode::ClampToEdge,
        wrap_r: WrapMode::ClampToEdge,
    })
}
