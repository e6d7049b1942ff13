use std::rc::Rc;

use glow::HasContext;

use crate::error::{Result, TensorError};

/// A GPU shader-storage buffer holding `len` `f32` elements.
///
/// Releases its GL object on drop, closing the leak in the distilled source's
/// `free_run_state` (see `DESIGN.md`), where one of the four scratch buffers
/// was never freed.
pub struct GpuBuffer {
    gl: Rc<glow::Context>,
    handle: glow::NativeBuffer,
    len: usize,
}

impl GpuBuffer {
    /// Allocates a zero-initialized buffer of `len` floats.
    pub fn zeros(gl: Rc<glow::Context>, len: usize) -> Result<Self> {
        Self::from_slice(gl, &vec![0.0f32; len])
    }

    /// Allocates a buffer and uploads `data` as its initial contents.
    pub fn from_slice(gl: Rc<glow::Context>, data: &[f32]) -> Result<Self> {
        unsafe {
            let handle = gl.create_buffer().map_err(|e| TensorError::Context(e))?;
            gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, Some(handle));
            let bytes = bytemuck_cast(data);
            gl.buffer_data_u8_slice(glow::SHADER_STORAGE_BUFFER, bytes, glow::DYNAMIC_DRAW);
            gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, None);
            Ok(GpuBuffer {
                gl,
                handle,
                len: data.len(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn handle(&self) -> glow::NativeBuffer {
        self.handle
    }

    /// Binds this buffer to a shader-storage binding point for the duration
    /// of the next dispatch.
    pub fn bind(&self, binding: u32) {
        unsafe {
            self.gl.bind_buffer_base(glow::SHADER_STORAGE_BUFFER, binding, Some(self.handle));
        }
    }

    /// Host-to-device sub-range write (used for the per-step embedding copy
    /// and for uploading weights once at startup).
    pub fn write(&self, offset_elems: usize, data: &[f32]) {
        unsafe {
            self.gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, Some(self.handle));
            self.gl.buffer_sub_data_u8_slice(
                glow::SHADER_STORAGE_BUFFER,
                (offset_elems * 4) as i32,
                bytemuck_cast(data),
            );
            self.gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, None);
        }
    }

    /// Device-to-host readback of a sub-range. Blocks until prior dispatches
    /// touching this buffer have completed.
    pub fn read(&self, offset_elems: usize, out: &mut [f32]) {
        unsafe {
            self.gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, Some(self.handle));
            let bytes = bytemuck_cast_mut(out);
            self.gl.get_buffer_sub_data(glow::SHADER_STORAGE_BUFFER, (offset_elems * 4) as i32, bytes);
            self.gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, None);
        }
    }

    /// Device-to-device copy, used for writing the per-step `k`/`v` vectors
    /// into the KV cache without a host round trip.
    pub fn copy_from(&self, src: &GpuBuffer, src_offset_elems: usize, dst_offset_elems: usize, count_elems: usize) {
        unsafe {
            self.gl.bind_buffer(glow::COPY_READ_BUFFER, Some(src.handle));
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.handle));
            self.gl.copy_buffer_sub_data(
                glow::COPY_READ_BUFFER,
                glow::COPY_WRITE_BUFFER,
                (src_offset_elems * 4) as i32,
                (dst_offset_elems * 4) as i32,
                (count_elems * 4) as i32,
            );
            self.gl.bind_buffer(glow::COPY_READ_BUFFER, None);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_buffer(self.handle);
        }
    }
}

fn bytemuck_cast(data: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(data.as_ptr().cast::<u8>(), std::mem::size_of_val(data)) }
}

fn bytemuck_cast_mut(data: &mut [f32]) -> &mut [u8] {
    unsafe { std::slice::from_raw_parts_mut(data.as_mut_ptr().cast::<u8>(), std::mem::size_of_val(data)) }
}
