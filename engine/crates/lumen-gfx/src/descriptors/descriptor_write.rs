use ash::vk;
use itertools::Itertools;

/// 一次 descriptor 更新：只能是 buffer 或者 image 其中一种
pub struct GfxWriteDescriptorSet {
    pub dst_set: vk::DescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_type: vk::DescriptorType,

    pub buffer_infos: Vec<vk::DescriptorBufferInfo>,
    pub image_infos: Vec<vk::DescriptorImageInfo>,
}
impl GfxWriteDescriptorSet {
    pub fn buffers(
        dst_set: vk::DescriptorSet,
        dst_binding: u32,
        dst_array_element: u32,
        descriptor_type: vk::DescriptorType,
        buffer_infos: Vec<vk::DescriptorBufferInfo>,
    ) -> Self {
        Self {
            dst_set,
            dst_binding,
            dst_array_element,
            descriptor_type,
            buffer_infos,
            image_infos: vec![],
        }
    }

    pub fn images(
        dst_set: vk::DescriptorSet,
        dst_binding: u32,
        dst_array_element: u32,
        descriptor_type: vk::DescriptorType,
        image_infos: Vec<vk::DescriptorImageInfo>,
    ) -> Self {
        Self {
            dst_set,
            dst_binding,
            dst_array_element,
            descriptor_type,
            buffer_infos: vec![],
            image_infos,
        }
    }

    #[inline]
    pub fn descriptor_count(&self) -> u32 {
        self.buffer_infos.len().max(self.image_infos.len()) as u32
    }

    pub fn to_vk_type(&self) -> vk::WriteDescriptorSet<'_> {
        debug_assert!(
            self.buffer_infos.is_empty() != self.image_infos.is_empty(),
            "Only one of buffer_infos or image_infos should be set in GfxWriteDescriptorSet"
        );

        vk::WriteDescriptorSet {
            dst_set: self.dst_set,
            dst_binding: self.dst_binding,
            dst_array_element: self.dst_array_element,
            descriptor_count: self.descriptor_count(),
            descriptor_type: self.descriptor_type,
            // 选择 buffer ptr 还是 image ptr，是由 descriptor type 控制的
            p_buffer_info: self.buffer_infos.as_ptr(),
            p_image_info: self.image_infos.as_ptr(),
            ..Default::default()
        }
    }

    /// 空的 write 会被跳过
    pub fn with_writes(writes: &[Self], cbk: impl Fn(&[vk::WriteDescriptorSet])) {
        let writes = writes.iter().filter(|w| w.descriptor_count() > 0).map(|w| w.to_vk_type()).collect_vec();
        if !writes.is_empty() {
            cbk(&writes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn empty_writes_are_skipped() {
        let writes = [
            GfxWriteDescriptorSet::buffers(
                vk::DescriptorSet::null(),
                0,
                3,
                vk::DescriptorType::STORAGE_BUFFER,
                vec![vk::DescriptorBufferInfo::default().range(vk::WHOLE_SIZE)],
            ),
            GfxWriteDescriptorSet::images(
                vk::DescriptorSet::null(),
                2,
                0,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vec![],
            ),
        ];

        let called = std::cell::Cell::new(0);
        GfxWriteDescriptorSet::with_writes(&writes, |vk_writes| {
            called.set(vk_writes.len());
            assert_eq!(vk_writes[0].dst_array_element, 3);
            assert_eq!(vk_writes[0].descriptor_count, 1);
        });
        assert_eq!(called.get(), 1);
    }
}
