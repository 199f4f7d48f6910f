//! bloom mip chain 的尺寸和执行顺序，不涉及 GPU

use ash::vk;

/// downsample 的输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BloomSource {
    /// main pass 的 HDR color target
    SceneColor,
    Mip(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BloomStep {
    /// 从 src 采样，写入 dst_mip；mip 0 需要做亮度提取
    Downsample { src: BloomSource, dst_mip: u32 },
    /// 从 src_mip 采样，additive 混合到 dst_mip
    Upsample { src_mip: u32, dst_mip: u32 },
}

/// `floor(log2(width / 8))`，至少为 1
#[inline]
pub fn bloom_chain_length(window_width: u32) -> u32 {
    (window_width / 8).max(1).ilog2().max(1)
}

/// mip k 的尺寸是窗口尺寸的 1/2^(k+1)
#[inline]
pub fn bloom_mip_extent(window_extent: vk::Extent2D, mip: u32) -> vk::Extent2D {
    let shift = (mip + 1).min(31);
    vk::Extent2D {
        width: (window_extent.width >> shift).max(1),
        height: (window_extent.height >> shift).max(1),
    }
}

/// 先从 mip 0 向下逐级 downsample，再从最粗的 mip 向上 upsample 到 mip 0
pub fn bloom_steps(chain_length: u32) -> Vec<BloomStep> {
    let down = (0..chain_length).map(|mip| BloomStep::Downsample {
        src: if mip == 0 { BloomSource::SceneColor } else { BloomSource::Mip(mip - 1) },
        dst_mip: mip,
    });
    let up = (1..chain_length).rev().map(|mip| BloomStep::Upsample {
        src_mip: mip,
        dst_mip: mip - 1,
    });
    down.chain(up).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_length_follows_window_width() {
        assert_eq!(bloom_chain_length(1920), 7);
        assert_eq!(bloom_chain_length(1280), 7);
        assert_eq!(bloom_chain_length(1024), 7);
        assert_eq!(bloom_chain_length(800), 6);
        assert_eq!(bloom_chain_length(64), 3);
        // 极小的窗口仍然保留一级
        assert_eq!(bloom_chain_length(16), 1);
        assert_eq!(bloom_chain_length(8), 1);
        assert_eq!(bloom_chain_length(1), 1);
    }

    #[test]
    fn mips_halve_and_never_reach_zero() {
        let window = vk::Extent2D {
            width: 1920,
            height: 1080,
        };
        assert_eq!(bloom_mip_extent(window, 0), vk::Extent2D { width: 960, height: 540 });
        assert_eq!(bloom_mip_extent(window, 1), vk::Extent2D { width: 480, height: 270 });
        assert_eq!(bloom_mip_extent(window, 10).height, 1);
        assert_eq!(bloom_mip_extent(window, 40).width, 1);
    }

    #[test]
    fn steps_go_down_then_up() {
        let steps = bloom_steps(3);
        assert_eq!(
            steps,
            vec![
                BloomStep::Downsample {
                    src: BloomSource::SceneColor,
                    dst_mip: 0
                },
                BloomStep::Downsample {
                    src: BloomSource::Mip(0),
                    dst_mip: 1
                },
                BloomStep::Downsample {
                    src: BloomSource::Mip(1),
                    dst_mip: 2
                },
                BloomStep::Upsample { src_mip: 2, dst_mip: 1 },
                BloomStep::Upsample { src_mip: 1, dst_mip: 0 },
            ]
        );
        assert_eq!(bloom_steps(1).len(), 1);
    }
}
