//! The browser platform: a `<canvas>` element with a WebGL 1.0 rendering context, driven by
//! `requestAnimationFrame`.

use js_sys::Float32Array;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    HtmlCanvasElement, WebGlBuffer, WebGlProgram, WebGlRenderingContext as Gl, WebGlShader,
    Window,
};

use crate::buffer::{BufferTarget, DataType, UsageHint};
use crate::frame::{FrameRequestError, FrameScheduler};
use crate::pipeline::{ShaderStage, Topology};
use crate::runtime::{
    AcquireError, ActiveInfo, ClearMask, ContextOptions, GraphicsContext, Platform, Surface,
    SurfaceTarget,
};

/// A [GraphicsContext] that forwards every call to a browser `WebGLRenderingContext`.
#[derive(Clone, Debug)]
pub struct WebGlContext {
    gl: Gl,
}

impl WebGlContext {
    pub fn new(gl: Gl) -> Self {
        WebGlContext { gl }
    }

    /// The underlying rendering context.
    pub fn gl(&self) -> &Gl {
        &self.gl
    }
}

impl GraphicsContext for WebGlContext {
    type Shader = WebGlShader;

    type Program = WebGlProgram;

    type Buffer = WebGlBuffer;

    fn create_shader(&self, stage: ShaderStage) -> Option<WebGlShader> {
        self.gl.create_shader(stage.gl_id())
    }

    fn shader_source(&self, shader: &WebGlShader, source: &str) {
        self.gl.shader_source(shader, source);
    }

    fn compile_shader(&self, shader: &WebGlShader) {
        self.gl.compile_shader(shader);
    }

    fn shader_compile_status(&self, shader: &WebGlShader) -> bool {
        self.gl
            .get_shader_parameter(shader, Gl::COMPILE_STATUS)
            .as_bool()
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: &WebGlShader) -> Option<String> {
        self.gl.get_shader_info_log(shader)
    }

    fn delete_shader(&self, shader: &WebGlShader) {
        self.gl.delete_shader(Some(shader));
    }

    fn create_program(&self) -> Option<WebGlProgram> {
        self.gl.create_program()
    }

    fn attach_shader(&self, program: &WebGlProgram, shader: &WebGlShader) {
        self.gl.attach_shader(program, shader);
    }

    fn link_program(&self, program: &WebGlProgram) {
        self.gl.link_program(program);
    }

    fn program_link_status(&self, program: &WebGlProgram) -> bool {
        self.gl
            .get_program_parameter(program, Gl::LINK_STATUS)
            .as_bool()
            .unwrap_or(false)
    }

    fn program_info_log(&self, program: &WebGlProgram) -> Option<String> {
        self.gl.get_program_info_log(program)
    }

    fn active_attribute_count(&self, program: &WebGlProgram) -> u32 {
        self.gl
            .get_program_parameter(program, Gl::ACTIVE_ATTRIBUTES)
            .as_f64()
            .unwrap_or(0.0) as u32
    }

    fn active_attribute(&self, program: &WebGlProgram, index: u32) -> Option<ActiveInfo> {
        self.gl
            .get_active_attrib(program, index)
            .map(|info| ActiveInfo::new(info.name(), info.size(), info.type_()))
    }

    fn attribute_location(&self, program: &WebGlProgram, name: &str) -> i32 {
        self.gl.get_attrib_location(program, name)
    }

    fn use_program(&self, program: Option<&WebGlProgram>) {
        self.gl.use_program(program);
    }

    fn delete_program(&self, program: &WebGlProgram) {
        self.gl.delete_program(Some(program));
    }

    fn create_buffer(&self) -> Option<WebGlBuffer> {
        self.gl.create_buffer()
    }

    fn delete_buffer(&self, buffer: &WebGlBuffer) {
        self.gl.delete_buffer(Some(buffer));
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<&WebGlBuffer>) {
        self.gl.bind_buffer(target.gl_id(), buffer);
    }

    fn buffer_data_f32(&self, target: BufferTarget, data: &[f32], usage: UsageHint) {
        let array = Float32Array::from(data);

        self.gl
            .buffer_data_with_array_buffer_view(target.gl_id(), &array, usage.gl_id());
    }

    fn vertex_attrib_pointer(
        &self,
        location: u32,
        size: i32,
        data_type: DataType,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        self.gl.vertex_attrib_pointer_with_i32(
            location,
            size,
            data_type.gl_id(),
            normalized,
            stride,
            offset,
        );
    }

    fn enable_vertex_attrib_array(&self, location: u32) {
        self.gl.enable_vertex_attrib_array(location);
    }

    fn disable_vertex_attrib_array(&self, location: u32) {
        self.gl.disable_vertex_attrib_array(location);
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.gl.clear_color(red, green, blue, alpha);
    }

    fn clear(&self, mask: ClearMask) {
        self.gl.clear(mask.bits());
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.gl.viewport(x, y, width, height);
    }

    fn draw_arrays(&self, topology: Topology, first: i32, count: i32) {
        self.gl.draw_arrays(topology.gl_id(), first, count);
    }
}

/// A `<canvas>` element.
#[derive(Clone, Debug)]
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
}

impl CanvasSurface {
    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

impl Surface for CanvasSurface {
    fn width(&self) -> u32 {
        self.canvas.width()
    }

    fn height(&self) -> u32 {
        self.canvas.height()
    }

    fn set_size(&self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }
}

/// Schedules frames with `window.requestAnimationFrame`.
#[derive(Clone, Debug)]
pub struct AnimationFrameScheduler {
    window: Window,
}

impl FrameScheduler for AnimationFrameScheduler {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Result<(), FrameRequestError> {
        let closure = Closure::once_into_js(move || callback());

        self.window
            .request_animation_frame(closure.unchecked_ref())
            .map(|_| ())
            .map_err(|error| FrameRequestError {
                reason: describe_js_error(&error),
            })
    }
}

/// The browser window the engine runs in.
#[derive(Clone, Debug)]
pub struct BrowserPlatform {
    window: Window,
}

impl BrowserPlatform {
    /// Returns the platform for the global `window`, or `None` when not running in a browser
    /// window (e.g. in a web worker).
    pub fn new() -> Option<Self> {
        web_sys::window().map(BrowserPlatform::from_window)
    }

    pub fn from_window(window: Window) -> Self {
        BrowserPlatform { window }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn canvas(&self, target: &SurfaceTarget) -> Result<HtmlCanvasElement, AcquireError> {
        let document = self.window.document().ok_or(AcquireError::NoDocument)?;

        match target {
            SurfaceTarget::Element(id) => document
                .get_element_by_id(id)
                .and_then(|element| element.dyn_into::<HtmlCanvasElement>().ok())
                .ok_or_else(|| AcquireError::SurfaceNotFound { id: id.clone() }),
            SurfaceTarget::Create => {
                let body = document.body().ok_or(AcquireError::NoDocument)?;
                let canvas = document
                    .create_element("canvas")
                    .ok()
                    .and_then(|element| element.dyn_into::<HtmlCanvasElement>().ok())
                    .ok_or(AcquireError::NoDocument)?;

                body.append_child(&canvas)
                    .map_err(|_| AcquireError::NoDocument)?;

                Ok(canvas)
            }
        }
    }
}

impl Platform for BrowserPlatform {
    type Context = WebGlContext;

    type Surface = CanvasSurface;

    type Scheduler = AnimationFrameScheduler;

    fn acquire(
        &self,
        target: &SurfaceTarget,
        options: &ContextOptions,
    ) -> Result<(CanvasSurface, WebGlContext), AcquireError> {
        let canvas = self.canvas(target)?;

        let attributes = JsValue::from_serde(&options.to_attributes()).map_err(|error| {
            AcquireError::ContextCreation {
                reason: error.to_string(),
            }
        })?;

        let gl = canvas
            .get_context_with_context_options("webgl", &attributes)
            .map_err(|error| AcquireError::ContextCreation {
                reason: describe_js_error(&error),
            })?
            .ok_or_else(|| AcquireError::ContextCreation {
                reason: "WebGL is not supported".to_string(),
            })?
            .dyn_into::<Gl>()
            .map_err(|_| AcquireError::ContextCreation {
                reason: "the context is not a WebGLRenderingContext".to_string(),
            })?;

        log::info!("Acquired a WebGL context");

        Ok((CanvasSurface { canvas }, WebGlContext::new(gl)))
    }

    fn window_size(&self) -> (u32, u32) {
        let dimension = |value: Result<JsValue, JsValue>| {
            value.ok().and_then(|value| value.as_f64()).unwrap_or(0.0) as u32
        };

        (
            dimension(self.window.inner_width()),
            dimension(self.window.inner_height()),
        )
    }

    fn frame_scheduler(&self) -> AnimationFrameScheduler {
        AnimationFrameScheduler {
            window: self.window.clone(),
        }
    }
}

fn describe_js_error(error: &JsValue) -> String {
    error
        .as_string()
        .unwrap_or_else(|| format!("{:?}", error))
}
