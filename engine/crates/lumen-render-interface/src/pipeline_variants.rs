use ash::vk;
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FillModes: u8 {
        const FILL = 1 << 0;
        const LINE = 1 << 1;
        const POINT = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CullModes: u8 {
        const NONE = 1 << 0;
        const FRONT = 1 << 1;
        const BACK = 1 << 2;
        const FRONT_AND_BACK = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SampleCounts: u8 {
        const X1 = 1 << 0;
        const X2 = 1 << 1;
        const X4 = 1 << 2;
        const X8 = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DepthFuncs: u8 {
        const NEVER = 1 << 0;
        const LESS = 1 << 1;
        const EQUAL = 1 << 2;
        const LESS_OR_EQUAL = 1 << 3;
        const GREATER = 1 << 4;
        const NOT_EQUAL = 1 << 5;
        const GREATER_OR_EQUAL = 1 << 6;
        const ALWAYS = 1 << 7;
    }
}

bitflags! {
    /// depth test / depth write 的开关
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Toggles: u8 {
        const OFF = 1 << 0;
        const ON = 1 << 1;
    }
}

/// 一个确定的光栅化配置：每个轴恰好只有一个 bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterState {
    pub fill: FillModes,
    pub cull: CullModes,
    pub samples: SampleCounts,
    pub depth_func: DepthFuncs,
    pub depth_test: Toggles,
    pub depth_write: Toggles,
}
// vk 转换
impl RasterState {
    #[inline]
    pub fn polygon_mode(&self) -> vk::PolygonMode {
        if self.fill == FillModes::LINE {
            vk::PolygonMode::LINE
        } else if self.fill == FillModes::POINT {
            vk::PolygonMode::POINT
        } else {
            vk::PolygonMode::FILL
        }
    }

    #[inline]
    pub fn cull_mode(&self) -> vk::CullModeFlags {
        if self.cull == CullModes::FRONT {
            vk::CullModeFlags::FRONT
        } else if self.cull == CullModes::BACK {
            vk::CullModeFlags::BACK
        } else if self.cull == CullModes::FRONT_AND_BACK {
            vk::CullModeFlags::FRONT_AND_BACK
        } else {
            vk::CullModeFlags::NONE
        }
    }

    #[inline]
    pub fn sample_count(&self) -> vk::SampleCountFlags {
        if self.samples == SampleCounts::X8 {
            vk::SampleCountFlags::TYPE_8
        } else if self.samples == SampleCounts::X4 {
            vk::SampleCountFlags::TYPE_4
        } else if self.samples == SampleCounts::X2 {
            vk::SampleCountFlags::TYPE_2
        } else {
            vk::SampleCountFlags::TYPE_1
        }
    }

    #[inline]
    pub fn compare_op(&self) -> vk::CompareOp {
        // DepthFuncs 的 bit 位置和 vk::CompareOp 的取值一一对应
        vk::CompareOp::from_raw(self.depth_func.bits().trailing_zeros() as i32)
    }

    #[inline]
    pub fn depth_test_enabled(&self) -> bool {
        self.depth_test == Toggles::ON
    }

    #[inline]
    pub fn depth_write_enabled(&self) -> bool {
        self.depth_write == Toggles::ON
    }
}

/// 一组合法的光栅化配置：每个轴可以设置多个 bit，表示每种组合各生成一个 pipeline
///
/// 变体下标使用混合进制编码，轴的顺序固定为
/// fill, cull, samples, depth_func, depth_test, depth_write，
/// fill 是最低位，每个轴的进制等于该轴设置的 bit 数量。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineVariants {
    pub fill: FillModes,
    pub cull: CullModes,
    pub samples: SampleCounts,
    pub depth_func: DepthFuncs,
    pub depth_test: Toggles,
    pub depth_write: Toggles,
}
impl Default for PipelineVariants {
    fn default() -> Self {
        Self {
            fill: FillModes::FILL,
            cull: CullModes::BACK,
            samples: SampleCounts::X1,
            depth_func: DepthFuncs::LESS,
            depth_test: Toggles::ON,
            depth_write: Toggles::ON,
        }
    }
}
impl PipelineVariants {
    #[inline]
    fn axes(&self) -> [u8; 6] {
        [
            self.fill.bits(),
            self.cull.bits(),
            self.samples.bits(),
            self.depth_func.bits(),
            self.depth_test.bits(),
            self.depth_write.bits(),
        ]
    }

    /// 所有轴 bit 数量的乘积
    #[inline]
    pub fn variant_count(&self) -> u32 {
        self.axes().iter().map(|bits| bits.count_ones()).product()
    }

    /// 某个轴上没有设置对应的 bit 时返回 None
    pub fn index_of(&self, state: &RasterState) -> Option<u32> {
        let wanted = [
            state.fill.bits(),
            state.cull.bits(),
            state.samples.bits(),
            state.depth_func.bits(),
            state.depth_test.bits(),
            state.depth_write.bits(),
        ];

        let mut index = 0;
        let mut multiplier = 1;
        for (axis, bit) in self.axes().into_iter().zip(wanted) {
            index += axis_rank(axis, bit)? * multiplier;
            multiplier *= axis.count_ones();
        }
        Some(index)
    }

    /// `index_of` 的逆映射，越界返回 None
    pub fn decode(&self, index: u32) -> Option<RasterState> {
        if index >= self.variant_count() {
            return None;
        }

        let mut rest = index;
        let mut bits = [0u8; 6];
        for (slot, axis) in bits.iter_mut().zip(self.axes()) {
            let radix = axis.count_ones();
            *slot = nth_set_bit(axis, rest % radix);
            rest /= radix;
        }

        Some(RasterState {
            fill: FillModes::from_bits_retain(bits[0]),
            cull: CullModes::from_bits_retain(bits[1]),
            samples: SampleCounts::from_bits_retain(bits[2]),
            depth_func: DepthFuncs::from_bits_retain(bits[3]),
            depth_test: Toggles::from_bits_retain(bits[4]),
            depth_write: Toggles::from_bits_retain(bits[5]),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = RasterState> + '_ {
        (0..self.variant_count()).filter_map(|index| self.decode(index))
    }
}

/// bit 在 axis 中是第几个被设置的 bit；bit 必须恰好是 axis 中的一个 bit
#[inline]
fn axis_rank(axis: u8, bit: u8) -> Option<u32> {
    if bit.count_ones() != 1 || axis & bit == 0 {
        return None;
    }
    Some((axis & (bit - 1)).count_ones())
}

/// axis 中第 n 个被设置的 bit
#[inline]
fn nth_set_bit(axis: u8, n: u32) -> u8 {
    let mut rest = axis;
    for _ in 0..n {
        rest &= rest - 1;
    }
    rest & rest.wrapping_neg()
}

/// 一个 shader 组合的所有 pipeline 变体，按照变体下标存放
pub struct PipelineVariantSet<P> {
    variants: PipelineVariants,
    pipelines: Vec<P>,
}
impl<P> PipelineVariantSet<P> {
    /// 立即为每个变体创建 pipeline，任何一个失败整体失败
    pub fn build<E>(
        variants: PipelineVariants,
        mut create: impl FnMut(u32, &RasterState) -> Result<P, E>,
    ) -> Result<Self, E> {
        let _span = tracy_client::span!("PipelineVariantSet::build");

        let mut pipelines = Vec::with_capacity(variants.variant_count() as usize);
        for (index, state) in variants.iter().enumerate() {
            pipelines.push(create(index as u32, &state)?);
        }
        Ok(Self { variants, pipelines })
    }

    #[inline]
    pub fn variants(&self) -> &PipelineVariants {
        &self.variants
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    #[inline]
    pub fn get(&self, state: &RasterState) -> Option<&P> {
        self.variants.index_of(state).and_then(|index| self.pipelines.get(index as usize))
    }

    #[inline]
    pub fn get_by_index(&self, index: u32) -> Option<&P> {
        self.pipelines.get(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rich_variants() -> PipelineVariants {
        PipelineVariants {
            fill: FillModes::FILL | FillModes::LINE | FillModes::POINT,
            cull: CullModes::NONE | CullModes::BACK,
            samples: SampleCounts::X1 | SampleCounts::X4,
            depth_func: DepthFuncs::LESS | DepthFuncs::LESS_OR_EQUAL | DepthFuncs::ALWAYS,
            depth_test: Toggles::OFF | Toggles::ON,
            depth_write: Toggles::ON,
        }
    }

    #[test]
    fn two_fills_two_culls_give_four_variants() {
        let variants = PipelineVariants {
            fill: FillModes::FILL | FillModes::LINE,
            cull: CullModes::NONE | CullModes::BACK,
            ..Default::default()
        };
        assert_eq!(variants.variant_count(), 4);
        assert_eq!(variants.iter().count(), 4);
    }

    #[test]
    fn decode_then_index_is_identity() {
        let variants = rich_variants();
        assert_eq!(variants.variant_count(), 3 * 2 * 2 * 3 * 2);
        for index in 0..variants.variant_count() {
            let state = variants.decode(index).unwrap();
            assert_eq!(variants.index_of(&state), Some(index));
        }
        assert_eq!(variants.decode(variants.variant_count()), None);
    }

    #[test]
    fn index_then_decode_is_identity_for_every_legal_combination() {
        let variants = rich_variants();
        let mut seen = std::collections::HashSet::new();
        for fill in variants.fill.iter() {
            for cull in variants.cull.iter() {
                for samples in variants.samples.iter() {
                    for depth_func in variants.depth_func.iter() {
                        for depth_test in variants.depth_test.iter() {
                            let state = RasterState {
                                fill,
                                cull,
                                samples,
                                depth_func,
                                depth_test,
                                depth_write: Toggles::ON,
                            };
                            let index = variants.index_of(&state).unwrap();
                            assert_eq!(variants.decode(index), Some(state));
                            assert!(seen.insert(index));
                        }
                    }
                }
            }
        }
        assert_eq!(seen.len() as u32, variants.variant_count());
    }

    #[test]
    fn fill_is_the_lowest_digit() {
        let variants = PipelineVariants {
            fill: FillModes::FILL | FillModes::LINE,
            cull: CullModes::NONE | CullModes::BACK,
            ..Default::default()
        };
        let state = |fill, cull| RasterState {
            fill,
            cull,
            ..variants.decode(0).unwrap()
        };
        assert_eq!(variants.index_of(&state(FillModes::FILL, CullModes::NONE)), Some(0));
        assert_eq!(variants.index_of(&state(FillModes::LINE, CullModes::NONE)), Some(1));
        assert_eq!(variants.index_of(&state(FillModes::FILL, CullModes::BACK)), Some(2));
        assert_eq!(variants.index_of(&state(FillModes::LINE, CullModes::BACK)), Some(3));
    }

    #[test]
    fn unset_bit_is_invalid() {
        let variants = PipelineVariants::default();
        let mut state = variants.decode(0).unwrap();
        state.fill = FillModes::LINE;
        assert_eq!(variants.index_of(&state), None);

        // 同一个轴上设置多个 bit 不是一个确定的配置
        state.fill = FillModes::FILL | FillModes::LINE;
        assert_eq!(variants.index_of(&state), None);
    }

    #[test]
    fn vk_conversions() {
        let state = RasterState {
            fill: FillModes::LINE,
            cull: CullModes::BACK,
            samples: SampleCounts::X4,
            depth_func: DepthFuncs::LESS_OR_EQUAL,
            depth_test: Toggles::ON,
            depth_write: Toggles::OFF,
        };
        assert_eq!(state.polygon_mode(), vk::PolygonMode::LINE);
        assert_eq!(state.cull_mode(), vk::CullModeFlags::BACK);
        assert_eq!(state.sample_count(), vk::SampleCountFlags::TYPE_4);
        assert_eq!(state.compare_op(), vk::CompareOp::LESS_OR_EQUAL);
        assert!(state.depth_test_enabled());
        assert!(!state.depth_write_enabled());

        let always = RasterState {
            depth_func: DepthFuncs::ALWAYS,
            ..state
        };
        assert_eq!(always.compare_op(), vk::CompareOp::ALWAYS);
    }

    #[test]
    fn eager_build_stores_one_pipeline_per_index() {
        let variants = rich_variants();
        let set = PipelineVariantSet::build(variants, |index, state| {
            Ok::<_, ()>((index, state.polygon_mode()))
        })
        .unwrap();
        assert_eq!(set.len() as u32, variants.variant_count());

        let state = variants.decode(17).unwrap();
        assert_eq!(set.get(&state).map(|p| p.0), Some(17));
        assert_eq!(set.get_by_index(17).map(|p| p.1), Some(state.polygon_mode()));
    }

    #[test]
    fn failed_pipeline_aborts_build() {
        let result = PipelineVariantSet::build(rich_variants(), |index, _| if index == 5 { Err(index) } else { Ok(()) });
        assert_eq!(result.err(), Some(5));
    }
}
