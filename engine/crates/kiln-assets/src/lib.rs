//! 内置资源类型
//!
//! 依赖关系：Model -> Material -> {Shader, Texture}。
//! 所有子资源路径都相对于引用它的文件所在目录。

pub mod material;
pub mod model;
pub mod shader;
pub mod texture;

pub use material::{Material, MaterialLoader};
pub use model::{Mesh, Model, ModelLoader};
pub use shader::{Shader, ShaderLoader, ShaderStage};
pub use texture::{Texture, TextureLoader};

use kiln_resource::{DependencyManager, FileSystem, RegistryError, ResourceManager};
use std::rc::Rc;

/// 注册所有内置类型的 manager，叶子类型在前
pub fn register_builtin_managers(
    deps: &mut DependencyManager,
    file_system: Rc<dyn FileSystem>,
) -> Result<(), RegistryError> {
    deps.register_manager(ResourceManager::<Shader>::new(ShaderLoader, file_system.clone()))?;
    deps.register_manager(ResourceManager::<Texture>::new(TextureLoader, file_system.clone()))?;
    deps.register_manager(ResourceManager::<Material>::new(MaterialLoader, file_system.clone()))?;
    deps.register_manager(ResourceManager::<Model>::new(ModelLoader, file_system))?;
    Ok(())
}
