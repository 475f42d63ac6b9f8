use anyhow::Context;
use kiln_resource::{Asset, AssetLoader, ByteReader, LoadContext, ResourceType};

/// 解码后的 RGBA8 像素
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Asset for Texture {
    const TYPE: ResourceType = ResourceType::from_name("Texture");
}

// getters
impl Texture {
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 行优先，每像素 4 字节
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        self.pixels.get(offset..offset + 4)?.try_into().ok()
    }
}

/// 格式优先根据文件头判断，tga 这类没有 magic 的格式退回到扩展名
#[derive(Default)]
pub struct TextureLoader;

impl AssetLoader<Texture> for TextureLoader {
    fn resource_loaded(&mut self, ctx: &mut LoadContext<'_>, bytes: ByteReader) -> anyhow::Result<Texture> {
        let format = image::guess_format(bytes.as_bytes())
            .or_else(|_| image::ImageFormat::from_path(ctx.path()))
            .with_context(|| format!("unknown image format {:?}", ctx.path()))?;
        let image = image::load_from_memory_with_format(bytes.as_bytes(), format)
            .with_context(|| format!("failed to decode image {:?}", ctx.path()))?
            .into_rgba8();

        let (width, height) = image.dimensions();
        log::debug!("Decoded texture {:?}: {}x{}", ctx.path(), width, height);

        Ok(Texture {
            width,
            height,
            pixels: image.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_lookup() {
        let texture = Texture {
            width: 2,
            height: 1,
            pixels: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };

        assert_eq!(texture.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(texture.pixel(2, 0), None);
        assert_eq!(texture.pixel(0, 1), None);
    }
}
