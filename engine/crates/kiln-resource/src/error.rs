use crate::resource_type::ResourceType;
use std::path::PathBuf;

/// 文件系统层面的失败，会被转换为资源的 `Failure` 状态
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("short read on {path:?}: {transferred} of {expected} bytes")]
    ShortRead {
        path: PathBuf,
        expected: u64,
        transferred: u64,
    },

    #[error("read of {0:?} was cancelled")]
    Cancelled(PathBuf),
}

/// 一次加载尝试失败的原因，保存在 [`crate::Resource::failure`] 中供使用者查询
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error("failed to parse {path:?}: {source:#}")]
    Parse {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("{path:?} depends on {dependency_type} {dependency:?}, which failed to load")]
    DependencyFailed {
        path: PathBuf,
        dependency: PathBuf,
        dependency_type: ResourceType,
    },

    #[error("{path:?} requested itself as a dependency")]
    SelfDependency { path: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a resource manager for {0} is already registered")]
    DuplicateManager(ResourceType),
}
