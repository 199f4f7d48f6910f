use glam::{Mat4, UVec4, Vec2, Vec3, Vec4};

/// Vulkan 保证的最小 push constant 容量
pub const PUSH_CONSTANT_CAPACITY: usize = 128;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PushConstantError {
    #[error("push constant overflow: {requested} bytes requested, capacity is {capacity}")]
    Overflow { requested: usize, capacity: usize },
}

/// 可以写入 push constant 的值，按照 std430 的规则对齐
pub trait PushValue: bytemuck::Pod {
    const ALIGN: usize;
    const SIZE: usize;
}

macro_rules! impl_push_value {
    ($ty:ty, $align:expr, $size:expr) => {
        impl PushValue for $ty {
            const ALIGN: usize = $align;
            const SIZE: usize = $size;
        }
    };
}

impl_push_value!(f32, 4, 4);
impl_push_value!(u32, 4, 4);
impl_push_value!(i32, 4, 4);
impl_push_value!(Vec2, 8, 8);
impl_push_value!(Vec4, 16, 16);
impl_push_value!(UVec4, 16, 16);
impl_push_value!(Mat4, 16, 64);

// Vec3 是 12 字节，但是按照 vec4 的对齐和大小来占位
impl PushValue for Vec3 {
    const ALIGN: usize = 16;
    const SIZE: usize = 16;
}

/// 把若干值按顺序打包成一段 push constant 数据
///
/// 通常一个 draw 的数据分为两段：整个 pass 共享的部分和每个 draw 独有的部分。
/// 在两段之间调用 `mark_separator`，之后只需要重新写入 separator 之后的数据。
#[derive(Clone)]
pub struct PushConstantPacker {
    data: [u8; PUSH_CONSTANT_CAPACITY],
    len: usize,
    separator: usize,
}
impl Default for PushConstantPacker {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl PushConstantPacker {
    pub fn new() -> Self {
        Self {
            data: [0; PUSH_CONSTANT_CAPACITY],
            len: 0,
            separator: 0,
        }
    }
}
// getters
impl PushConstantPacker {
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn separator(&self) -> usize {
        self.separator
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// 从 offset 开始到末尾的数据
    #[inline]
    pub fn bytes_from(&self, offset: usize) -> &[u8] {
        &self.data[offset.min(self.len)..self.len]
    }

    /// 从 offset 开始到末尾的字节数
    #[inline]
    pub fn size_from(&self, offset: usize) -> usize {
        self.len.saturating_sub(offset)
    }
}
// update
impl PushConstantPacker {
    /// 写入一个值，超出容量时返回错误，packer 不变
    pub fn push<T: PushValue>(&mut self, value: T) -> Result<&mut Self, PushConstantError> {
        let offset = self.len.next_multiple_of(T::ALIGN);
        let end = offset + T::SIZE;
        if end > PUSH_CONSTANT_CAPACITY {
            return Err(PushConstantError::Overflow {
                requested: end,
                capacity: PUSH_CONSTANT_CAPACITY,
            });
        }

        // 对齐产生的空洞需要清零，避免残留上一次的数据
        self.data[self.len..offset].fill(0);
        let bytes = bytemuck::bytes_of(&value);
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.data[offset + bytes.len()..end].fill(0);
        self.len = end;

        Ok(self)
    }

    /// 记录当前位置，作为共享数据和 per-draw 数据的分界
    #[inline]
    pub fn mark_separator(&mut self) -> &mut Self {
        self.separator = self.len;
        self
    }

    /// 丢弃 separator 之后的数据，用于写入下一个 draw 的数据
    #[inline]
    pub fn truncate_to_separator(&mut self) -> &mut Self {
        self.len = self.separator;
        self
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
        self.separator = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_then_vec3_aligns_to_16() {
        let mut packer = PushConstantPacker::new();
        packer.push(1.0f32).unwrap().push(Vec3::new(2.0, 3.0, 4.0)).unwrap();
        assert_eq!(packer.len(), 32);

        let floats: &[f32] = bytemuck::cast_slice(packer.bytes());
        assert_eq!(floats, &[1.0, 0.0, 0.0, 0.0, 2.0, 3.0, 4.0, 0.0]);
    }

    #[test]
    fn scalar_alignment_rules() {
        let mut packer = PushConstantPacker::new();
        packer.push(7u32).unwrap();
        packer.push(Vec2::ONE).unwrap();
        assert_eq!(packer.len(), 16);

        packer.push(3i32).unwrap();
        packer.push(Vec4::ZERO).unwrap();
        assert_eq!(packer.len(), 48);
    }

    #[test]
    fn separator_splits_shared_and_per_draw_data() {
        let mut packer = PushConstantPacker::new();
        packer.push(Mat4::IDENTITY).unwrap().push(0.5f32).unwrap();
        packer.mark_separator();
        assert_eq!(packer.separator(), 68);

        packer.push(Vec3::ONE).unwrap();
        // 68 对齐到 80，再加 16
        assert_eq!(packer.len(), 96);
        assert_eq!(packer.size_from(packer.separator()), 28);
        assert_eq!(packer.bytes_from(packer.separator()).len(), 28);

        packer.truncate_to_separator().push(9u32).unwrap();
        assert_eq!(packer.len(), 72);
    }

    #[test]
    fn overflow_is_an_error() {
        let mut packer = PushConstantPacker::new();
        packer.push(Mat4::IDENTITY).unwrap().push(Mat4::IDENTITY).unwrap();
        assert_eq!(packer.len(), PUSH_CONSTANT_CAPACITY);

        let err = packer.push(1.0f32).err();
        assert_eq!(
            err,
            Some(PushConstantError::Overflow {
                requested: 132,
                capacity: PUSH_CONSTANT_CAPACITY
            })
        );
        assert_eq!(packer.len(), PUSH_CONSTANT_CAPACITY);
    }

    #[test]
    fn aligned_overflow_counts_padding() {
        let mut packer = PushConstantPacker::new();
        for _ in 0..29 {
            packer.push(0u32).unwrap();
        }
        assert_eq!(packer.len(), 116);
        // 116 对齐到 128 之后已经没有空间
        assert!(packer.push(Vec3::ZERO).is_err());
        assert!(packer.push(0u32).is_ok());
    }
}
