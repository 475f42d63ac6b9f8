use anyhow::Context;
use kiln_resource::{Asset, AssetLoader, ByteReader, LoadContext, ResourceType};
use std::path::Path;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    /// 由扩展名决定：`.vs` / `.fs` / `.cs`
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "vs" => Some(Self::Vertex),
            "fs" => Some(Self::Fragment),
            "cs" => Some(Self::Compute),
            _ => None,
        }
    }
}

/// 着色器源码，不做编译
pub struct Shader {
    pub stage: ShaderStage,
    pub source: String,
}

impl Asset for Shader {
    const TYPE: ResourceType = ResourceType::from_name("Shader");
}

#[derive(Default)]
pub struct ShaderLoader;

impl AssetLoader<Shader> for ShaderLoader {
    fn resource_loaded(&mut self, ctx: &mut LoadContext<'_>, bytes: ByteReader) -> anyhow::Result<Shader> {
        let stage = ShaderStage::from_path(ctx.path())
            .with_context(|| format!("unknown shader stage for {:?}", ctx.path()))?;
        let source = bytes.as_str()?;
        anyhow::ensure!(!source.trim().is_empty(), "shader source is empty");

        Ok(Shader {
            stage,
            source: source.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_from_extension() {
        assert_eq!(ShaderStage::from_path(Path::new("a/b.vs")), Some(ShaderStage::Vertex));
        assert_eq!(ShaderStage::from_path(Path::new("b.fs")), Some(ShaderStage::Fragment));
        assert_eq!(ShaderStage::from_path(Path::new("b.cs")), Some(ShaderStage::Compute));
        assert_eq!(ShaderStage::from_path(Path::new("b.glsl")), None);
        assert_eq!(ShaderStage::from_path(Path::new("vs")), None);
    }
}
