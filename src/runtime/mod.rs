//! Provides the graphics contexts that act as the main point of interaction with the GPU.
//!
//! Every GPU-facing component of the engine receives its [GraphicsContext] explicitly, rather than
//! reaching for a global handle. Two implementations are provided:
//!
//! - [web::WebGlContext], a thin wrapper around a browser `WebGLRenderingContext`, obtained
//!   through [web::BrowserPlatform];
//! - [headless::HeadlessContext], a software stand-in that records every call and simulates
//!   shader compilation and linking, obtained through [headless::HeadlessPlatform].

use bitflags::bitflags;
use web_sys::WebGlRenderingContext as Gl;

use crate::buffer::{BufferTarget, DataType, UsageHint};
use crate::pipeline::{ShaderStage, Topology};

mod context_options;
pub use self::context_options::{ContextOptions, ContextOptionsBuilder, PowerPreference};

mod platform;
pub use self::platform::{AcquireError, Platform, Surface, SurfaceTarget};

pub mod headless;
pub mod state;
pub mod web;

/// The command interface of a graphics driver.
///
/// Mirrors the subset of the WebGL 1.0 API the engine needs. Object handles are opaque associated
/// types; creation functions return `None` when the driver could not allocate an object (which in
/// practice means the context was lost).
///
/// Implementations use interior mutability: all operations take `&self`, matching the way the
/// browser exposes the context.
pub trait GraphicsContext {
    /// Handle to a shader object.
    type Shader;

    /// Handle to a program object.
    type Program;

    /// Handle to a buffer object.
    type Buffer;

    fn create_shader(&self, stage: ShaderStage) -> Option<Self::Shader>;

    fn shader_source(&self, shader: &Self::Shader, source: &str);

    fn compile_shader(&self, shader: &Self::Shader);

    fn shader_compile_status(&self, shader: &Self::Shader) -> bool;

    fn shader_info_log(&self, shader: &Self::Shader) -> Option<String>;

    fn delete_shader(&self, shader: &Self::Shader);

    fn create_program(&self) -> Option<Self::Program>;

    fn attach_shader(&self, program: &Self::Program, shader: &Self::Shader);

    fn link_program(&self, program: &Self::Program);

    fn program_link_status(&self, program: &Self::Program) -> bool;

    fn program_info_log(&self, program: &Self::Program) -> Option<String>;

    fn active_attribute_count(&self, program: &Self::Program) -> u32;

    fn active_attribute(&self, program: &Self::Program, index: u32) -> Option<ActiveInfo>;

    /// Returns the location bound to the attribute, or `-1` if the program has no active
    /// attribute with that name.
    fn attribute_location(&self, program: &Self::Program, name: &str) -> i32;

    fn use_program(&self, program: Option<&Self::Program>);

    fn delete_program(&self, program: &Self::Program);

    fn create_buffer(&self) -> Option<Self::Buffer>;

    fn delete_buffer(&self, buffer: &Self::Buffer);

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<&Self::Buffer>);

    fn buffer_data_f32(&self, target: BufferTarget, data: &[f32], usage: UsageHint);

    fn vertex_attrib_pointer(
        &self,
        location: u32,
        size: i32,
        data_type: DataType,
        normalized: bool,
        stride: i32,
        offset: i32,
    );

    fn enable_vertex_attrib_array(&self, location: u32);

    fn disable_vertex_attrib_array(&self, location: u32);

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32);

    fn clear(&self, mask: ClearMask);

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);

    fn draw_arrays(&self, topology: Topology, first: i32, count: i32);
}

/// Describes an active attribute or uniform of a linked program, as reported by the driver.
#[derive(Clone, PartialEq, Debug)]
pub struct ActiveInfo {
    name: String,
    size: i32,
    type_id: u32,
}

impl ActiveInfo {
    pub fn new<S>(name: S, size: i32, type_id: u32) -> Self
    where
        S: Into<String>,
    {
        ActiveInfo {
            name: name.into(),
            size,
            type_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The array length of the variable (`1` for non-array variables).
    pub fn size(&self) -> i32 {
        self.size
    }

    /// The GL type identifier (e.g. `FLOAT_VEC3`).
    pub fn type_id(&self) -> u32 {
        self.type_id
    }
}

bitflags! {
    /// Selects the buffers that are cleared by [GraphicsContext::clear].
    pub struct ClearMask: u32 {
        const COLOR = Gl::COLOR_BUFFER_BIT;
        const DEPTH = Gl::DEPTH_BUFFER_BIT;
        const STENCIL = Gl::STENCIL_BUFFER_BIT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_mask_bits_match_gl() {
        assert_eq!(ClearMask::COLOR.bits(), 0x4000);
        assert_eq!(ClearMask::DEPTH.bits(), 0x0100);
        assert_eq!(
            (ClearMask::COLOR | ClearMask::STENCIL).bits(),
            0x4000 | 0x0400
        );
    }
}
