use crate::material::Material;
use anyhow::Context;
use kiln_resource::{Asset, AssetLoader, ByteReader, LoadContext, ResourceHandle, ResourceType};
use serde::Deserialize;
use std::path::PathBuf;

/// 一个网格，`material` 是 [`Model::materials`] 中的下标
#[derive(Deserialize, Debug, Clone)]
pub struct Mesh {
    pub name: String,
    #[serde(default)]
    pub material: usize,
    pub positions: Vec<glam::Vec3>,
    pub indices: Vec<u32>,
}

/// 模型文件格式
///
/// ```json
/// {
///     "materials": ["mat.mtl"],
///     "meshes": [
///         { "name": "quad", "material": 0, "positions": [[0, 0, 0], [1, 0, 0], [1, 1, 0]], "indices": [0, 1, 2] }
///     ]
/// }
/// ```
#[derive(Deserialize)]
struct ModelDesc {
    #[serde(default)]
    materials: Vec<PathBuf>,
    #[serde(default)]
    meshes: Vec<Mesh>,
}

pub struct Model {
    pub materials: Vec<ResourceHandle<Material>>,
    pub meshes: Vec<Mesh>,
}

impl Asset for Model {
    const TYPE: ResourceType = ResourceType::from_name("Model");
}

impl Model {
    /// 所有顶点的包围盒，没有顶点时返回 `None`
    pub fn bounds(&self) -> Option<(glam::Vec3, glam::Vec3)> {
        let mut positions = self.meshes.iter().flat_map(|mesh| mesh.positions.iter().copied());
        let first = positions.next()?;
        Some(positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.indices.len() / 3).sum()
    }
}

fn validate_mesh(mesh: &Mesh, material_count: usize) -> anyhow::Result<()> {
    anyhow::ensure!(
        mesh.material < material_count,
        "mesh {} uses material {} but only {} material(s) are declared",
        mesh.name,
        mesh.material,
        material_count
    );
    anyhow::ensure!(mesh.indices.len() % 3 == 0, "mesh {} is not a triangle list", mesh.name);
    if let Some(index) = mesh.indices.iter().find(|&&index| index as usize >= mesh.positions.len()) {
        anyhow::bail!("mesh {} index {} is out of range", mesh.name, index);
    }
    Ok(())
}

#[derive(Default)]
pub struct ModelLoader;

impl AssetLoader<Model> for ModelLoader {
    fn resource_loaded(&mut self, ctx: &mut LoadContext<'_>, bytes: ByteReader) -> anyhow::Result<Model> {
        let desc: ModelDesc = serde_json::from_slice(bytes.as_bytes())
            .with_context(|| format!("invalid model json {:?}", ctx.path()))?;

        // 先校验再请求依赖，解析失败时不会留下多余的引用
        for mesh in &desc.meshes {
            validate_mesh(mesh, desc.materials.len())?;
        }

        let materials = desc
            .materials
            .iter()
            .map(|material| ctx.load_relative::<Material>(material))
            .collect();

        Ok(Model {
            materials,
            meshes: desc.meshes,
        })
    }
}
