use std::ptr;

use ash::vk;
use vk_mem::Alloc;

use crate::error::GfxResult;
use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,

    /// 在初始化阶段写死
    map_ptr: Option<*mut u8>,

    debug_name: String,

    usage: vk::BufferUsageFlags,
}
impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        let allocator = Gfx::get().allocator();
        unsafe {
            if self.map_ptr.is_some() {
                allocator.unmap_memory(&mut self.allocation);
            }

            allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}
// init & destroy
impl GfxBuffer {
    /// - align: buffer 起始地址的内存对齐，默认对齐到 8 字节
    /// - mem_map: 是否需要 CPU 写入，需要时会常驻映射
    /// - 优先使用 device memory
    pub fn new(
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        align: Option<vk::DeviceSize>,
        mem_map: bool,
        name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        // size 为 0 的 buffer 是非法的
        let buffer_size = buffer_size.max(1);
        let buffer_ci = vk::BufferCreateInfo::default().size(buffer_size).usage(buffer_usage);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: if mem_map {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };

        let allocator = Gfx::get().allocator();
        let align = align.unwrap_or(8);
        let (buffer, mut alloc) = unsafe { allocator.create_buffer_with_alignment(&buffer_ci, &alloc_ci, align)? };

        let mut mapped_ptr = None;
        if mem_map {
            match unsafe { allocator.map_memory(&mut alloc) } {
                Ok(ptr) => mapped_ptr = Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_buffer(buffer, &mut alloc) };
                    return Err(e.into());
                }
            }
        }

        Gfx::get().gfx_device().set_object_debug_name(buffer, format!("Buffer::{}", name.as_ref()));
        Ok(Self {
            handle: buffer,
            allocation: alloc,
            size: buffer_size,
            map_ptr: mapped_ptr,

            debug_name: name.as_ref().to_string(),

            usage: buffer_usage,
        })
    }

    #[inline]
    pub fn new_stage_buffer(size: vk::DeviceSize, debug_name: impl AsRef<str>) -> GfxResult<Self> {
        Self::new(size, vk::BufferUsageFlags::TRANSFER_SRC, None, true, debug_name)
    }

    /// CPU 每帧写入、shader 通过 bindless 读取的 storage buffer
    #[inline]
    pub fn new_mapped_storage(size: vk::DeviceSize, debug_name: impl AsRef<str>) -> GfxResult<Self> {
        Self::new(size, vk::BufferUsageFlags::STORAGE_BUFFER, Some(16), true, debug_name)
    }

    /// 只由 GPU 读取的 buffer，数据通过 stage buffer 上传
    #[inline]
    pub fn new_device_local(
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        Self::new(size, usage | vk::BufferUsageFlags::TRANSFER_DST, None, false, debug_name)
    }
}
// destroy
impl GfxBuffer {
    #[inline]
    pub fn destroy(self) {
        drop(self)
    }
}
// getter
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}
// tools
impl GfxBuffer {
    #[inline]
    pub fn flush(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> GfxResult<()> {
        Gfx::get().allocator().flush_allocation(&self.allocation, offset, size)?;
        Ok(())
    }

    /// 通过 mem map 的方式将 bytes 写入到 buffer 的 offset 处
    ///
    /// # Panic
    /// buffer 没有映射，或者写入范围超出 buffer
    pub fn write_bytes(&self, offset: vk::DeviceSize, bytes: &[u8]) -> GfxResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let map_ptr = self.map_ptr.expect("buffer is not host visible");
        assert!(offset + bytes.len() as vk::DeviceSize <= self.size, "write out of range: {}", self.debug_name);

        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), map_ptr.add(offset as usize), bytes.len());
        }
        self.flush(offset, bytes.len() as vk::DeviceSize)
    }

    /// 通过 mem map 的方式将 data 传入到 buffer 中
    #[inline]
    pub fn transfer_data_by_mmap<T: bytemuck::Pod>(&self, data: &[T]) -> GfxResult<()> {
        self.write_bytes(0, bytemuck::cast_slice(data))
    }

    /// 创建一个临时的 stage buffer，先将数据放入 stage buffer，再 transfer 到
    /// self
    ///
    /// sync 表示这个函数是同步等待的，会阻塞运行
    ///
    /// # Note
    /// * 避免使用这个将 *小块* 数据从内存传到 GPU，推荐使用 mem map
    /// * 这个应该是用来传输大块数据的
    pub fn transfer_data_sync<T: bytemuck::Pod>(&self, data: &[T]) -> GfxResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() {
            return Ok(());
        }
        let stage_buffer =
            Self::new_stage_buffer(bytes.len() as vk::DeviceSize, format!("{}-stage-buffer", self.debug_name))?;
        stage_buffer.write_bytes(0, bytes)?;

        let cmd_name = format!("{}-transfer-data", &self.debug_name);
        Gfx::get().one_time_exec(
            |cmd| {
                cmd.cmd_copy_buffer(
                    &stage_buffer,
                    self,
                    &[vk::BufferCopy {
                        size: bytes.len() as vk::DeviceSize,
                        ..Default::default()
                    }],
                );
            },
            &cmd_name,
        )
    }
}
