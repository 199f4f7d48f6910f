use ash::vk;

/// 索引类型 (u16 或 u32)
pub trait GfxIndexType: Sized + Copy + bytemuck::Pod {
    const VK_INDEX_TYPE: vk::IndexType;

    #[inline]
    fn byte_size() -> usize {
        size_of::<Self>()
    }
}

impl GfxIndexType for u16 {
    const VK_INDEX_TYPE: vk::IndexType = vk::IndexType::UINT16;
}

impl GfxIndexType for u32 {
    const VK_INDEX_TYPE: vk::IndexType = vk::IndexType::UINT32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_sizes_match_vk_types() {
        assert_eq!(u16::byte_size(), 2);
        assert_eq!(u32::byte_size(), 4);
        assert_eq!(<u32 as GfxIndexType>::VK_INDEX_TYPE, vk::IndexType::UINT32);
    }
}
