use crate::{error::LoadError, ktx};
use glam::Quat;
use meridian_render::{
    id::TextureId, image_loader::load_image, GraphicsDevice, PixelData, TextureDescriptor,
    TextureType,
};
use std::path::Path;

pub const BRDF_TEXTURE_FILE_NAME: &str = "brdfLUT.png";

/// Image based lighting setup shared by materials.
///
/// The default value has no maps and is a valid environment: materials bound
/// to it simply get no environment textures.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentDefinition {
    pub diffuse_map_path: String,
    pub specular_map_path: String,
    pub cube_orientation: Quat,
    pub ibl_intensity: f32,
    pub use_brdf_texture: bool,
}

impl Default for EnvironmentDefinition {
    fn default() -> Self {
        Self {
            diffuse_map_path: String::new(),
            specular_map_path: String::new(),
            cube_orientation: Quat::IDENTITY,
            ibl_intensity: 1.0,
            use_brdf_texture: false,
        }
    }
}

/// Six faces in +X, -X, +Y, -Y, +Z, -Z order, each holding its mip chain
/// from level 0 down.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeData {
    pub faces: Vec<Vec<PixelData>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawData {
    pub diffuse: Option<CubeData>,
    pub specular: Option<CubeData>,
    pub brdf: Option<PixelData>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EnvironmentTextures {
    pub diffuse: Option<TextureId>,
    pub specular: Option<TextureId>,
    pub brdf: Option<TextureId>,
}

impl EnvironmentTextures {
    pub fn is_loaded(&self) -> bool {
        self.diffuse.is_some() || self.specular.is_some()
    }
}

impl EnvironmentDefinition {
    pub fn load_raw(&self, environments_path: &Path) -> Result<RawData, LoadError> {
        let mut raw = RawData::default();
        if !self.diffuse_map_path.is_empty() {
            raw.diffuse = load_cube(&environments_path.join(&self.diffuse_map_path))?;
        }
        if !self.specular_map_path.is_empty() {
            raw.specular = load_cube(&environments_path.join(&self.specular_map_path))?;
        }
        if self.use_brdf_texture {
            let brdf = load_image(&environments_path.join(BRDF_TEXTURE_FILE_NAME));
            raw.brdf = (!brdf.is_empty()).then_some(brdf);
        }
        Ok(raw)
    }

    pub fn load(
        &self,
        device: &mut dyn GraphicsDevice,
        raw: RawData,
    ) -> Result<EnvironmentTextures, LoadError> {
        let mut textures = EnvironmentTextures::default();
        if let Some(diffuse) = &raw.diffuse {
            textures.diffuse = upload_cube(device, diffuse, false)?;
        }
        if let Some(specular) = &raw.specular {
            textures.specular = upload_cube(device, specular, true)?;
        }
        if let Some(brdf) = &raw.brdf {
            let id = device.create_texture(&TextureDescriptor {
                ty: TextureType::Texture2D,
                format: brdf.format,
                width: brdf.width,
                height: brdf.height,
            });
            device.upload_texture(id, 0, 0, brdf)?;
            textures.brdf = Some(id);
        }
        Ok(textures)
    }
}

// KTX files carry the faces directly. Any other image is a vertical or
// horizontal strip of six square faces.
fn load_cube(path: &Path) -> Result<Option<CubeData>, LoadError> {
    if path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("ktx"))
    {
        return ktx::load_cube_map(path);
    }

    let pixels = load_image(path);
    if pixels.is_empty() {
        return Ok(None);
    }

    let (width, height) = (pixels.width, pixels.height);
    let faces = if height == width * 6 {
        (0..6)
            .map(|i| vec![pixels.crop(0, i * width, width, width)])
            .collect()
    } else if width == height * 6 {
        (0..6)
            .map(|i| vec![pixels.crop(i * height, 0, height, height)])
            .collect()
    } else {
        return Err(LoadError::InvalidCubeMap {
            path: path.to_owned(),
            width,
            height,
        });
    };
    Ok(Some(CubeData { faces }))
}

// Uploads every level present; `mipmaps` generates the rest when the cube
// came with level 0 only.
fn upload_cube(
    device: &mut dyn GraphicsDevice,
    cube: &CubeData,
    mipmaps: bool,
) -> Result<Option<TextureId>, LoadError> {
    let Some(first) = cube.faces.first().and_then(|levels| levels.first()) else {
        return Ok(None);
    };
    let id = device.create_texture(&TextureDescriptor {
        ty: TextureType::TextureCube,
        format: first.format,
        width: first.width,
        height: first.height,
    });
    for (layer, levels) in cube.faces.iter().enumerate() {
        for (mip_level, pixels) in levels.iter().enumerate() {
            device.upload_texture(id, layer as u32, mip_level as u32, pixels)?;
        }
    }
    if mipmaps && cube.faces.iter().all(|levels| levels.len() == 1) {
        device.generate_mipmaps(id)?;
    }
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use meridian_render::HeadlessDevice;

    fn fixture_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "meridian-environment-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_environment_loads_nothing() {
        let environment = EnvironmentDefinition::default();
        let raw = environment.load_raw(Path::new("nowhere")).unwrap();
        assert_eq!(raw, RawData::default());

        let mut device = HeadlessDevice::new();
        let textures = environment.load(&mut device, raw).unwrap();
        assert!(!textures.is_loaded());
        assert_eq!(device.texture_count(), 0);
    }

    #[test]
    fn vertical_strip_splits_into_faces() {
        let dir = fixture_dir("strip");
        let mut strip = RgbaImage::new(2, 12);
        for face in 0..6u32 {
            for y in 0..2 {
                for x in 0..2 {
                    strip.put_pixel(x, face * 2 + y, Rgba([face as u8, 0, 0, 255]));
                }
            }
        }
        strip.save(dir.join("specular.png")).unwrap();
        RgbaImage::new(4, 4).save(dir.join(BRDF_TEXTURE_FILE_NAME)).unwrap();

        let environment = EnvironmentDefinition {
            specular_map_path: "specular.png".into(),
            use_brdf_texture: true,
            ..Default::default()
        };
        let raw = environment.load_raw(&dir).unwrap();
        let specular = raw.specular.as_ref().unwrap();
        assert_eq!(specular.faces.len(), 6);
        assert_eq!(specular.faces[3][0].data[0], 3);
        assert_eq!((specular.faces[5][0].width, specular.faces[5][0].height), (2, 2));

        let mut device = HeadlessDevice::new();
        let textures = environment.load(&mut device, raw).unwrap();
        assert!(textures.is_loaded());
        let cube = device.texture(textures.specular.unwrap()).unwrap();
        assert_eq!(
            cube.uploads,
            vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)]
        );
        assert!(cube.has_mipmaps);
        assert!(textures.brdf.is_some());
    }

    #[test]
    fn ktx_cube_uploads_its_mip_chain() {
        let dir = fixture_dir("ktx");
        std::fs::write(dir.join("radiance.KTX"), ktx::tests::rgb_cube(4, 3)).unwrap();
        std::fs::write(dir.join("irradiance.ktx"), ktx::tests::rgb_cube(2, 1)).unwrap();

        let environment = EnvironmentDefinition {
            diffuse_map_path: "irradiance.ktx".into(),
            specular_map_path: "radiance.KTX".into(),
            ..Default::default()
        };
        let raw = environment.load_raw(&dir).unwrap();
        let specular = raw.specular.as_ref().unwrap();
        assert_eq!(specular.faces[1].len(), 3);
        assert_eq!(specular.faces[1][2].data, vec![1, 1, 1]);

        let mut device = HeadlessDevice::new();
        let textures = environment.load(&mut device, raw).unwrap();

        let radiance = device.texture(textures.specular.unwrap()).unwrap();
        assert_eq!(radiance.uploads.len(), 18);
        assert_eq!(radiance.uploads[17], (5, 2));
        assert!(!radiance.has_mipmaps);

        let irradiance = device.texture(textures.diffuse.unwrap()).unwrap();
        assert_eq!(irradiance.uploads.len(), 6);
        assert!(!irradiance.has_mipmaps);
    }

    #[test]
    fn missing_ktx_is_no_map_and_corrupt_ktx_fails() {
        let dir = fixture_dir("bad-ktx");
        std::fs::write(dir.join("broken.ktx"), b"garbage").unwrap();

        let missing = EnvironmentDefinition {
            diffuse_map_path: "absent.ktx".into(),
            ..Default::default()
        };
        assert_eq!(missing.load_raw(&dir).unwrap().diffuse, None);

        let broken = EnvironmentDefinition {
            diffuse_map_path: "broken.ktx".into(),
            ..Default::default()
        };
        assert!(matches!(
            broken.load_raw(&dir),
            Err(LoadError::InvalidKtx { .. })
        ));
    }

    #[test]
    fn rejects_non_strip_images() {
        let dir = fixture_dir("square");
        RgbaImage::new(4, 4).save(dir.join("diffuse.png")).unwrap();

        let environment = EnvironmentDefinition {
            diffuse_map_path: "diffuse.png".into(),
            ..Default::default()
        };
        assert!(matches!(
            environment.load_raw(&dir),
            Err(LoadError::InvalidCubeMap {
                width: 4,
                height: 4,
                ..
            })
        ));
    }
}
