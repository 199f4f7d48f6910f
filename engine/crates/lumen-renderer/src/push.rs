//! 把 `PushConstantPacker` 中的字节按照 pipeline layout 的 push constant range 切分后提交

use ash::vk;

use lumen_gfx::commands::command_buffer::GfxCommandBuffer;
use lumen_gfx::pipelines::graphics_pipeline::GfxPipelineLayout;
use lumen_render_interface::push_constants::PushConstantPacker;

/// 一次 `vkCmdPushConstants`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushSegment {
    pub offset: u32,
    pub size: u32,
    /// 覆盖这段字节的所有 range 的 stage 的并集
    pub stages: vk::ShaderStageFlags,
}

/// 在所有 range 的边界处切分 `[0, len)`
///
/// Vulkan 要求提交的每个字节，stage_flags 恰好包含覆盖该字节的所有 range 的 stage。
/// 不被任何 range 覆盖的字节（对齐 padding）不提交；stage 相同的相邻片段合并。
pub fn push_segments(ranges: &[vk::PushConstantRange], len: u32) -> Vec<PushSegment> {
    let mut cuts = vec![0, len];
    for range in ranges {
        cuts.push(range.offset.min(len));
        cuts.push((range.offset + range.size).min(len));
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut segments: Vec<PushSegment> = Vec::new();
    for pair in cuts.windows(2) {
        let (begin, end) = (pair[0], pair[1]);
        let stages = ranges
            .iter()
            .filter(|r| r.offset <= begin && begin < r.offset + r.size)
            .fold(vk::ShaderStageFlags::empty(), |acc, r| acc | r.stage_flags);
        if stages.is_empty() {
            continue;
        }
        match segments.last_mut() {
            Some(last) if last.stages == stages && last.offset + last.size == begin => last.size += end - begin,
            _ => segments.push(PushSegment {
                offset: begin,
                size: end - begin,
                stages,
            }),
        }
    }
    segments
}

/// 提交 packer 中的所有字节
pub fn cmd_push(cmd: &GfxCommandBuffer, layout: &GfxPipelineLayout, packer: &PushConstantPacker) {
    let bytes = packer.bytes();
    for segment in push_segments(layout.push_constant_ranges(), bytes.len() as u32) {
        let begin = segment.offset as usize;
        let end = begin + segment.size as usize;
        cmd.cmd_push_constants(layout.handle(), segment.stages, segment.offset, &bytes[begin..end]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(stage: vk::ShaderStageFlags, offset: u32, size: u32) -> vk::PushConstantRange {
        vk::PushConstantRange::default().stage_flags(stage).offset(offset).size(size)
    }

    const VS: vk::ShaderStageFlags = vk::ShaderStageFlags::VERTEX;
    const FS: vk::ShaderStageFlags = vk::ShaderStageFlags::FRAGMENT;

    #[test]
    fn disjoint_ranges_split_at_separator() {
        let segments = push_segments(&[range(VS, 0, 16), range(FS, 16, 48)], 64);
        assert_eq!(
            segments,
            vec![
                PushSegment {
                    offset: 0,
                    size: 16,
                    stages: VS
                },
                PushSegment {
                    offset: 16,
                    size: 48,
                    stages: FS
                },
            ]
        );
    }

    #[test]
    fn shared_bytes_use_both_stages() {
        let segments = push_segments(&[range(VS, 0, 32), range(FS, 16, 32)], 48);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].stages, VS | FS);
        assert_eq!((segments[1].offset, segments[1].size), (16, 16));
        assert_eq!(segments[2].stages, FS);

        let same = push_segments(&[range(VS, 0, 32), range(FS, 0, 32)], 32);
        assert_eq!(
            same,
            vec![PushSegment {
                offset: 0,
                size: 32,
                stages: VS | FS
            }]
        );
    }

    #[test]
    fn padding_between_ranges_is_not_pushed() {
        // vertex 只用 12 字节，fragment 从下一个 16 字节对齐处开始
        let segments = push_segments(&[range(VS, 0, 12), range(FS, 16, 16)], 32);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].size, 12);
        assert_eq!(segments[1].offset, 16);
    }

    #[test]
    fn clipped_to_packed_length() {
        let segments = push_segments(&[range(VS | FS, 0, 128)], 40);
        assert_eq!(
            segments,
            vec![PushSegment {
                offset: 0,
                size: 40,
                stages: VS | FS
            }]
        );
        assert!(push_segments(&[], 16).is_empty());
        assert!(push_segments(&[range(VS, 0, 16)], 0).is_empty());
    }
}
