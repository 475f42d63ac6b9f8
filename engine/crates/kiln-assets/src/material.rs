use crate::shader::Shader;
use crate::texture::Texture;
use anyhow::Context;
use kiln_resource::{Asset, AssetLoader, ByteReader, ErasedHandle, LoadContext, ResourceHandle, ResourceState, ResourceType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 材质文件格式
///
/// ```json
/// {
///     "shader": "shader.vs",
///     "textures": ["tex.tga"],
///     "params": { "roughness": 0.5 }
/// }
/// ```
#[derive(Deserialize)]
struct MaterialDesc {
    shader: PathBuf,
    #[serde(default)]
    textures: Vec<PathBuf>,
    #[serde(default)]
    params: BTreeMap<String, f32>,
}

pub struct Material {
    pub shader: ResourceHandle<Shader>,
    pub textures: Vec<ResourceHandle<Texture>>,
    pub params: BTreeMap<String, f32>,

    /// 已经完成（无论成功失败）的依赖
    pub resolved: Vec<(ErasedHandle, ResourceState)>,
}

impl Asset for Material {
    const TYPE: ResourceType = ResourceType::from_name("Material");
}

impl Material {
    pub fn param(&self, name: &str) -> Option<f32> {
        self.params.get(name).copied()
    }
}

#[derive(Default)]
pub struct MaterialLoader;

impl AssetLoader<Material> for MaterialLoader {
    fn resource_loaded(&mut self, ctx: &mut LoadContext<'_>, bytes: ByteReader) -> anyhow::Result<Material> {
        let desc: MaterialDesc = serde_json::from_slice(bytes.as_bytes())
            .with_context(|| format!("invalid material json {:?}", ctx.path()))?;

        let shader = ctx.load_relative::<Shader>(&desc.shader);
        let textures = desc
            .textures
            .iter()
            .map(|texture| ctx.load_relative::<Texture>(texture))
            .collect();

        Ok(Material {
            shader,
            textures,
            params: desc.params,
            resolved: Vec::new(),
        })
    }

    fn child_resource_loaded(&mut self, asset: &mut Material, child: ErasedHandle, state: ResourceState) {
        log::debug!("Material dependency {} finished: {:?}", child.ty, state);
        asset.resolved.push((child, state));
    }
}
