use meridian_scene::Choices;
use std::{error::Error, path::PathBuf};

pub const RESOURCE_DIR_VAR: &str = "MERIDIAN_RESOURCE_DIR";

const USAGE: &str = "usage: meridian <scene.gltf> [--resources <dir>] [--choice <tag>=<option>]...";

#[derive(Debug)]
pub struct Config {
    pub scene: PathBuf,
    pub resources: PathBuf,
    pub choices: Choices,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        Self::parse(
            std::env::args().skip(1),
            std::env::var_os(RESOURCE_DIR_VAR).map(PathBuf::from),
        )
    }

    /// Without `--resources` or the environment fallback, resources are
    /// looked up next to the scene file.
    pub fn parse(
        args: impl IntoIterator<Item = String>,
        resource_dir: Option<PathBuf>,
    ) -> Result<Self, Box<dyn Error>> {
        let mut scene = None;
        let mut resources = None;
        let mut choices = Choices::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--resources" => {
                    let dir = args.next().ok_or("--resources needs a directory")?;
                    resources = Some(PathBuf::from(dir));
                }
                "--choice" => {
                    let choice = args.next().ok_or("--choice needs <tag>=<option>")?;
                    let (tag, option) = choice
                        .split_once('=')
                        .ok_or_else(|| format!("malformed choice {:?}", choice))?;
                    choices.set(tag, option.parse::<usize>()?);
                }
                flag if flag.starts_with("--") => {
                    return Err(format!("unknown flag {}\n{}", flag, USAGE).into());
                }
                _ if scene.is_some() => return Err(USAGE.into()),
                _ => scene = Some(PathBuf::from(arg)),
            }
        }

        let scene = scene.ok_or(USAGE)?;
        let resources = resources.or(resource_dir).unwrap_or_else(|| {
            scene
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default()
        });

        Ok(Self {
            scene,
            resources,
            choices,
        })
    }
}
