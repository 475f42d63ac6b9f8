use std::fmt;
use std::hash::{Hash, Hasher};

/// 资源类型标识
///
/// 由类型名计算 64 位 FNV-1a 哈希得到，作为 [`crate::DependencyManager`] 中 manager 的注册键。
/// 相等性与哈希只看 `hash`，`name` 仅用于日志。
#[derive(Clone, Copy)]
pub struct ResourceType {
    hash: u64,
    name: &'static str,
}

impl ResourceType {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    pub const fn from_name(name: &'static str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self { hash, name }
    }

    #[inline]
    pub const fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}
impl Eq for ResourceType {}

impl Hash for ResourceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#018x})", self.name, self.hash)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 可以被 [`crate::ResourceManager`] 管理的资源负载类型
///
/// ```ignore
/// impl Asset for Shader {
///     const TYPE: ResourceType = ResourceType::from_name("Shader");
/// }
/// ```
pub trait Asset: 'static {
    const TYPE: ResourceType;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_same_type() {
        const A: ResourceType = ResourceType::from_name("Texture");
        let b = ResourceType::from_name("Texture");
        assert_eq!(A, b);
        assert_eq!(A.hash(), b.hash());
    }

    #[test]
    fn test_different_names_differ() {
        let shader = ResourceType::from_name("Shader");
        let material = ResourceType::from_name("Material");
        assert_ne!(shader, material);
        assert_eq!(shader.to_string(), "Shader");
    }

    #[test]
    fn test_fnv1a_reference_value() {
        // FNV-1a("a") 的标准结果
        assert_eq!(ResourceType::from_name("a").hash(), 0xaf63_dc4c_8601_ec8c);
    }
}
