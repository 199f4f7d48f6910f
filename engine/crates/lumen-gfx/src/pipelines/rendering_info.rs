use ash::vk;
use itertools::Itertools;

/// dynamic rendering 的一个 attachment
#[derive(Clone, Copy)]
pub struct GfxAttachment {
    pub image_view: vk::ImageView,
    pub layout: vk::ImageLayout,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub clear_value: vk::ClearValue,
}
impl GfxAttachment {
    /// 清空后写入
    #[inline]
    pub fn color_clear(image_view: vk::ImageView, clear_color: [f32; 4]) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue { float32: clear_color },
            },
        }
    }

    /// 保留已有内容，在其上继续绘制（例如 additive blend）
    #[inline]
    pub fn color_load(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::LOAD,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearValue::default(),
        }
    }

    /// 内容会被完整覆盖
    #[inline]
    pub fn color_dont_care(image_view: vk::ImageView) -> Self {
        Self {
            load_op: vk::AttachmentLoadOp::DONT_CARE,
            ..Self::color_load(image_view)
        }
    }

    #[inline]
    pub fn depth_clear(image_view: vk::ImageView, depth: f32) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil: 0 },
            },
        }
    }

    #[inline]
    pub fn depth_load(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::LOAD,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearValue::default(),
        }
    }

    fn as_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(self.clear_value)
    }
}

/// dynamic rendering 的完整 attachment 描述
pub struct GfxRenderingInfo {
    color_attachments: Vec<GfxAttachment>,
    depth_attachment: Option<GfxAttachment>,
    render_area: vk::Rect2D,
}
impl GfxRenderingInfo {
    pub fn new(
        color_attachments: Vec<GfxAttachment>,
        depth_attachment: Option<GfxAttachment>,
        render_area: vk::Rect2D,
    ) -> Self {
        Self {
            color_attachments,
            depth_attachment,
            render_area,
        }
    }

    #[inline]
    pub fn render_area(&self) -> vk::Rect2D {
        self.render_area
    }

    #[inline]
    pub fn color_attachments(&self) -> Vec<vk::RenderingAttachmentInfo<'static>> {
        self.color_attachments.iter().map(GfxAttachment::as_info).collect_vec()
    }

    #[inline]
    pub fn depth_attachment(&self) -> Option<vk::RenderingAttachmentInfo<'static>> {
        self.depth_attachment.as_ref().map(GfxAttachment::as_info)
    }
}
