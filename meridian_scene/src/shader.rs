use crate::error::LoadError;
use glam::{Mat3, Mat4, Vec3, Vec4};
use meridian_render::{id::ShaderId, GraphicsDevice, RendererState};
use std::{collections::BTreeMap, path::Path};

const BUILT_IN_VERTEX_SHADER: &str =
    include_str!("../shaders/default-physically-based-shader.vert");
const BUILT_IN_FRAGMENT_SHADER: &str =
    include_str!("../shaders/default-physically-based-shader.frag");

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderDefinition {
    pub renderer_state: RendererState,
    /// Relative to the shaders path; ignored for the built-in shader.
    pub vertex_shader_path: String,
    pub fragment_shader_path: String,
    pub defines: Vec<String>,
    pub hints: Vec<String>,
    pub uniforms: BTreeMap<String, UniformValue>,
    pub use_built_in_shader: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawData {
    pub vertex_source: String,
    pub fragment_source: String,
}

impl ShaderDefinition {
    /// Reads both sources and applies the defines.
    pub fn load_raw(&self, shaders_path: &Path) -> Result<RawData, LoadError> {
        let (vertex, fragment) = if self.use_built_in_shader {
            (
                BUILT_IN_VERTEX_SHADER.to_owned(),
                BUILT_IN_FRAGMENT_SHADER.to_owned(),
            )
        } else {
            (
                read_source(&shaders_path.join(&self.vertex_shader_path))?,
                read_source(&shaders_path.join(&self.fragment_shader_path))?,
            )
        };

        Ok(RawData {
            vertex_source: apply_defines(&vertex, &self.defines),
            fragment_source: apply_defines(&fragment, &self.defines),
        })
    }

    /// Must run on the rendering thread.
    pub fn load(&self, device: &mut dyn GraphicsDevice, raw: RawData) -> Result<ShaderId, LoadError> {
        Ok(device.create_shader(&raw.vertex_source, &raw.fragment_source, &self.hints)?)
    }
}

fn read_source(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|err| LoadError::io(path, err))
}

/// Inserts one `#define` line per define after the `#version` directive, or
/// at the top when the source has none.
fn apply_defines(source: &str, defines: &[String]) -> String {
    if defines.is_empty() {
        return source.to_owned();
    }

    let block = defines
        .iter()
        .map(|define| format!("#define {define}\n"))
        .collect::<String>();

    let version_end = source
        .lines()
        .next()
        .filter(|line| line.trim_start().starts_with("#version"))
        .map(|line| (line.len() + 1).min(source.len()));

    match version_end {
        Some(end) => {
            let (version, body) = source.split_at(end);
            let separator = if version.ends_with('\n') { "" } else { "\n" };
            format!("{version}{separator}{block}{body}")
        }
        None => format!("{block}{source}"),
    }
}
