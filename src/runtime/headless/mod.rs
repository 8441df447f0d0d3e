//! A graphics context and platform that run without a browser or a GPU.
//!
//! [HeadlessContext] records every command it receives as a [Command], keeps the contents of
//! buffer objects, and simulates the driver's shader compiler and linker closely enough to
//! report syntax errors, mismatched stage interfaces and active attributes. [HeadlessPlatform]
//! pairs it with an in-memory surface and a [ManualScheduler], so that the engine's frame loop
//! can be stepped one display refresh at a time.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use fnv::FnvHashMap;

use crate::buffer::{BufferTarget, DataType, UsageHint};
use crate::frame::{FrameRequestError, FrameScheduler};
use crate::pipeline::{ShaderStage, Topology};
use crate::runtime::{
    AcquireError, ActiveInfo, ClearMask, ContextOptions, GraphicsContext, Platform, Surface,
    SurfaceTarget,
};

mod glsl;

use self::glsl::{LinkedAttribute, ShaderInterface};

/// A command received by a [HeadlessContext].
///
/// Queries (compile status, info logs, attribute reflection) are not recorded.
#[derive(Clone, PartialEq, Debug)]
pub enum Command {
    CreateShader {
        shader: u32,
        stage: ShaderStage,
    },
    ShaderSource(u32),
    CompileShader(u32),
    DeleteShader(u32),
    CreateProgram(u32),
    AttachShader {
        program: u32,
        shader: u32,
    },
    LinkProgram(u32),
    UseProgram(Option<u32>),
    DeleteProgram(u32),
    CreateBuffer(u32),
    DeleteBuffer(u32),
    BindBuffer {
        target: BufferTarget,
        buffer: Option<u32>,
    },
    BufferData {
        target: BufferTarget,
        data: Vec<f32>,
        usage: UsageHint,
    },
    VertexAttribPointer {
        location: u32,
        size: i32,
        data_type: DataType,
        normalized: bool,
        stride: i32,
        offset: i32,
    },
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    ClearColor([f32; 4]),
    Clear(ClearMask),
    Viewport {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    DrawArrays {
        topology: Topology,
        first: i32,
        count: i32,
    },
}

#[derive(PartialEq, Debug)]
pub struct HeadlessShader {
    id: u32,
}

impl HeadlessShader {
    pub fn id(&self) -> u32 {
        self.id
    }
}

#[derive(PartialEq, Debug)]
pub struct HeadlessProgram {
    id: u32,
}

impl HeadlessProgram {
    pub fn id(&self) -> u32 {
        self.id
    }
}

#[derive(PartialEq, Debug)]
pub struct HeadlessBuffer {
    id: u32,
}

impl HeadlessBuffer {
    pub fn id(&self) -> u32 {
        self.id
    }
}

struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: Option<Result<ShaderInterface, String>>,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<u32>,
    linked: Option<Result<Vec<LinkedAttribute>, String>>,
}

#[derive(Default)]
struct Driver {
    last_id: u32,
    lost: bool,
    commands: Vec<Command>,
    shaders: FnvHashMap<u32, ShaderObject>,
    programs: FnvHashMap<u32, ProgramObject>,
    buffers: FnvHashMap<u32, Vec<f32>>,
    bindings: FnvHashMap<BufferTarget, u32>,
}

impl Driver {
    fn allocate(&mut self) -> Option<u32> {
        if self.lost {
            None
        } else {
            self.last_id += 1;

            Some(self.last_id)
        }
    }

    fn link(&self, program: &ProgramObject) -> Result<Vec<LinkedAttribute>, String> {
        let stage = |stage: ShaderStage| {
            program
                .attached
                .iter()
                .filter_map(|id| self.shaders.get(id))
                .find(|shader| shader.stage == stage)
                .ok_or_else(|| format!("ERROR: Missing {} shader\n", stage))
                .and_then(|shader| match &shader.compiled {
                    Some(Ok(interface)) => Ok(interface),
                    _ => Err(format!("ERROR: The {} shader is not compiled\n", stage)),
                })
        };

        glsl::link(stage(ShaderStage::Vertex)?, stage(ShaderStage::Fragment)?)
    }
}

/// A [GraphicsContext] that records commands instead of executing them.
///
/// Cloning yields another handle to the same context.
#[derive(Clone, Default)]
pub struct HeadlessContext {
    driver: Rc<RefCell<Driver>>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        HeadlessContext::default()
    }

    /// The commands received since creation or since the last [clear_commands].
    ///
    /// [clear_commands]: HeadlessContext::clear_commands
    pub fn commands(&self) -> Vec<Command> {
        self.driver.borrow().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.driver.borrow_mut().commands.clear();
    }

    /// Simulates losing the context: from now on, no new objects can be created.
    pub fn lose_context(&self) {
        self.driver.borrow_mut().lost = true;
    }

    pub fn is_context_lost(&self) -> bool {
        self.driver.borrow().lost
    }

    /// The data last uploaded to the buffer object with the given id, or `None` if no such
    /// buffer object exists.
    pub fn buffer_data(&self, buffer: u32) -> Option<Vec<f32>> {
        self.driver.borrow().buffers.get(&buffer).cloned()
    }

    /// The number of shader objects that have been created but not deleted.
    pub fn live_shader_count(&self) -> usize {
        self.driver.borrow().shaders.len()
    }

    /// The number of program objects that have been created but not deleted.
    pub fn live_program_count(&self) -> usize {
        self.driver.borrow().programs.len()
    }

    /// The number of buffer objects that have been created but not deleted.
    pub fn live_buffer_count(&self) -> usize {
        self.driver.borrow().buffers.len()
    }

    fn record(&self, command: Command) {
        self.driver.borrow_mut().commands.push(command);
    }

    fn linked_attributes<F, T>(&self, program: &HeadlessProgram, f: F) -> Option<T>
    where
        F: FnOnce(&[LinkedAttribute]) -> Option<T>,
    {
        let driver = self.driver.borrow();

        match driver.programs.get(&program.id).and_then(|p| p.linked.as_ref()) {
            Some(Ok(attributes)) => f(attributes),
            _ => None,
        }
    }
}

impl GraphicsContext for HeadlessContext {
    type Shader = HeadlessShader;

    type Program = HeadlessProgram;

    type Buffer = HeadlessBuffer;

    fn create_shader(&self, stage: ShaderStage) -> Option<HeadlessShader> {
        let mut driver = self.driver.borrow_mut();
        let id = driver.allocate()?;

        driver.shaders.insert(
            id,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: None,
            },
        );
        driver
            .commands
            .push(Command::CreateShader { shader: id, stage });

        Some(HeadlessShader { id })
    }

    fn shader_source(&self, shader: &HeadlessShader, source: &str) {
        if let Some(object) = self.driver.borrow_mut().shaders.get_mut(&shader.id) {
            object.source = source.to_string();
        }

        self.record(Command::ShaderSource(shader.id));
    }

    fn compile_shader(&self, shader: &HeadlessShader) {
        if let Some(object) = self.driver.borrow_mut().shaders.get_mut(&shader.id) {
            object.compiled = Some(glsl::compile(object.stage, &object.source));
        }

        self.record(Command::CompileShader(shader.id));
    }

    fn shader_compile_status(&self, shader: &HeadlessShader) -> bool {
        match self.driver.borrow().shaders.get(&shader.id) {
            Some(ShaderObject {
                compiled: Some(Ok(_)),
                ..
            }) => true,
            _ => false,
        }
    }

    fn shader_info_log(&self, shader: &HeadlessShader) -> Option<String> {
        self.driver
            .borrow()
            .shaders
            .get(&shader.id)
            .map(|object| match &object.compiled {
                Some(Err(log)) => log.clone(),
                _ => String::new(),
            })
    }

    fn delete_shader(&self, shader: &HeadlessShader) {
        self.driver.borrow_mut().shaders.remove(&shader.id);
        self.record(Command::DeleteShader(shader.id));
    }

    fn create_program(&self) -> Option<HeadlessProgram> {
        let mut driver = self.driver.borrow_mut();
        let id = driver.allocate()?;

        driver.programs.insert(id, ProgramObject::default());
        driver.commands.push(Command::CreateProgram(id));

        Some(HeadlessProgram { id })
    }

    fn attach_shader(&self, program: &HeadlessProgram, shader: &HeadlessShader) {
        if let Some(object) = self.driver.borrow_mut().programs.get_mut(&program.id) {
            object.attached.push(shader.id);
        }

        self.record(Command::AttachShader {
            program: program.id,
            shader: shader.id,
        });
    }

    fn link_program(&self, program: &HeadlessProgram) {
        {
            let mut driver = self.driver.borrow_mut();

            if let Some(object) = driver.programs.get(&program.id) {
                let result = driver.link(object);

                if let Some(object) = driver.programs.get_mut(&program.id) {
                    object.linked = Some(result);
                }
            }
        }

        self.record(Command::LinkProgram(program.id));
    }

    fn program_link_status(&self, program: &HeadlessProgram) -> bool {
        match self.driver.borrow().programs.get(&program.id) {
            Some(ProgramObject {
                linked: Some(Ok(_)),
                ..
            }) => true,
            _ => false,
        }
    }

    fn program_info_log(&self, program: &HeadlessProgram) -> Option<String> {
        self.driver
            .borrow()
            .programs
            .get(&program.id)
            .map(|object| match &object.linked {
                Some(Err(log)) => log.clone(),
                _ => String::new(),
            })
    }

    fn active_attribute_count(&self, program: &HeadlessProgram) -> u32 {
        self.linked_attributes(program, |attributes| Some(attributes.len() as u32))
            .unwrap_or(0)
    }

    fn active_attribute(&self, program: &HeadlessProgram, index: u32) -> Option<ActiveInfo> {
        self.linked_attributes(program, |attributes| {
            attributes.get(index as usize).map(|attribute| {
                ActiveInfo::new(
                    attribute.name.clone(),
                    1,
                    glsl::type_id(&attribute.type_name),
                )
            })
        })
    }

    fn attribute_location(&self, program: &HeadlessProgram, name: &str) -> i32 {
        self.linked_attributes(program, |attributes| {
            attributes
                .iter()
                .find(|attribute| attribute.name == name)
                .map(|attribute| attribute.location as i32)
        })
        .unwrap_or(-1)
    }

    fn use_program(&self, program: Option<&HeadlessProgram>) {
        self.record(Command::UseProgram(program.map(|program| program.id)));
    }

    fn delete_program(&self, program: &HeadlessProgram) {
        self.driver.borrow_mut().programs.remove(&program.id);
        self.record(Command::DeleteProgram(program.id));
    }

    fn create_buffer(&self) -> Option<HeadlessBuffer> {
        let mut driver = self.driver.borrow_mut();
        let id = driver.allocate()?;

        driver.buffers.insert(id, Vec::new());
        driver.commands.push(Command::CreateBuffer(id));

        Some(HeadlessBuffer { id })
    }

    fn delete_buffer(&self, buffer: &HeadlessBuffer) {
        let mut driver = self.driver.borrow_mut();

        driver.buffers.remove(&buffer.id);
        driver.bindings.retain(|_, bound| *bound != buffer.id);
        driver.commands.push(Command::DeleteBuffer(buffer.id));
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<&HeadlessBuffer>) {
        let buffer = buffer.map(|buffer| buffer.id);

        {
            let mut driver = self.driver.borrow_mut();

            match buffer {
                Some(id) => driver.bindings.insert(target, id),
                None => driver.bindings.remove(&target),
            };
        }

        self.record(Command::BindBuffer { target, buffer });
    }

    fn buffer_data_f32(&self, target: BufferTarget, data: &[f32], usage: UsageHint) {
        let mut driver = self.driver.borrow_mut();

        if let Some(id) = driver.bindings.get(&target).copied() {
            driver.buffers.insert(id, data.to_vec());
        }

        driver.commands.push(Command::BufferData {
            target,
            data: data.to_vec(),
            usage,
        });
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
        self.record(Command::VertexAttribPointer {
            location,
            size,
            data_type,
            normalized,
            stride,
            offset,
        });
    }

    fn enable_vertex_attrib_array(&self, location: u32) {
        self.record(Command::EnableVertexAttribArray(location));
    }

    fn disable_vertex_attrib_array(&self, location: u32) {
        self.record(Command::DisableVertexAttribArray(location));
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.record(Command::ClearColor([red, green, blue, alpha]));
    }

    fn clear(&self, mask: ClearMask) {
        self.record(Command::Clear(mask));
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(Command::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn draw_arrays(&self, topology: Topology, first: i32, count: i32) {
        self.record(Command::DrawArrays {
            topology,
            first,
            count,
        });
    }
}

/// An in-memory drawing surface. Cloning yields another handle to the same surface.
#[derive(Clone, Debug)]
pub struct HeadlessSurface {
    size: Rc<Cell<(u32, u32)>>,
}

impl HeadlessSurface {
    /// Creates a surface with the default canvas dimensions of 300 by 150.
    pub fn new() -> Self {
        HeadlessSurface {
            size: Rc::new(Cell::new((300, 150))),
        }
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        HeadlessSurface::new()
    }
}

impl Surface for HeadlessSurface {
    fn width(&self) -> u32 {
        self.size.get().0
    }

    fn height(&self) -> u32 {
        self.size.get().1
    }

    fn set_size(&self, width: u32, height: u32) {
        self.size.set((width, height));
    }
}

/// A [FrameScheduler] that only runs frame callbacks when told to.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<VecDeque<Box<dyn FnOnce()>>>>,
    failing: Rc<Cell<bool>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        ManualScheduler::default()
    }

    /// While `fail` is `true`, every frame request is rejected.
    pub fn fail_requests(&self, fail: bool) {
        self.failing.set(fail);
    }

    /// The number of callbacks waiting for the next refresh.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Simulates a display refresh: runs every callback that was requested before the call.
    /// Callbacks requested while refreshing wait for the next refresh.
    ///
    /// Returns `false` if no callbacks were waiting.
    pub fn refresh(&self) -> bool {
        let callbacks: Vec<_> = self.queue.borrow_mut().drain(..).collect();
        let ran = !callbacks.is_empty();

        for callback in callbacks {
            callback();
        }

        ran
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Result<(), FrameRequestError> {
        if self.failing.get() {
            return Err(FrameRequestError {
                reason: "the scheduler is rejecting requests".to_string(),
            });
        }

        self.queue.borrow_mut().push_back(callback);

        Ok(())
    }
}

/// A [Platform] backed by a [HeadlessContext].
///
/// The platform hands out handles to one shared context, surface and scheduler; keep clones of
/// them (see [context], [surface] and [scheduler]) to observe an engine running on the platform.
///
/// [context]: HeadlessPlatform::context
/// [surface]: HeadlessPlatform::surface
/// [scheduler]: HeadlessPlatform::scheduler
pub struct HeadlessPlatform {
    context: HeadlessContext,
    surface: HeadlessSurface,
    scheduler: ManualScheduler,
    window_size: Cell<(u32, u32)>,
    element_ids: Vec<String>,
    context_available: bool,
    requested_options: RefCell<Option<ContextOptions>>,
}

impl HeadlessPlatform {
    /// Creates a platform with a 1024 by 768 window and no existing surface elements.
    pub fn new() -> Self {
        HeadlessPlatform {
            context: HeadlessContext::new(),
            surface: HeadlessSurface::new(),
            scheduler: ManualScheduler::new(),
            window_size: Cell::new((1024, 768)),
            element_ids: Vec::new(),
            context_available: true,
            requested_options: RefCell::new(None),
        }
    }

    pub fn with_window_size(self, width: u32, height: u32) -> Self {
        self.window_size.set((width, height));

        self
    }

    /// Adds an existing surface element with the given `id`.
    pub fn with_element<S>(mut self, id: S) -> Self
    where
        S: Into<String>,
    {
        self.element_ids.push(id.into());

        self
    }

    /// Makes every attempt to obtain a graphics context fail, as on a system without WebGL
    /// support.
    pub fn without_context(mut self) -> Self {
        self.context_available = false;

        self
    }

    /// Simulates the user resizing the window.
    pub fn set_window_size(&self, width: u32, height: u32) {
        self.window_size.set((width, height));
    }

    pub fn context(&self) -> &HeadlessContext {
        &self.context
    }

    pub fn surface(&self) -> &HeadlessSurface {
        &self.surface
    }

    pub fn scheduler(&self) -> &ManualScheduler {
        &self.scheduler
    }

    /// The options passed to the last [Platform::acquire] call, if any.
    pub fn requested_options(&self) -> Option<ContextOptions> {
        self.requested_options.borrow().clone()
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        HeadlessPlatform::new()
    }
}

impl Platform for HeadlessPlatform {
    type Context = HeadlessContext;

    type Surface = HeadlessSurface;

    type Scheduler = ManualScheduler;

    fn acquire(
        &self,
        target: &SurfaceTarget,
        options: &ContextOptions,
    ) -> Result<(HeadlessSurface, HeadlessContext), AcquireError> {
        self.requested_options.replace(Some(options.clone()));

        if let SurfaceTarget::Element(id) = target {
            if !self.element_ids.contains(id) {
                return Err(AcquireError::SurfaceNotFound { id: id.clone() });
            }
        }

        if !self.context_available {
            return Err(AcquireError::ContextCreation {
                reason: "getContext(\"webgl\") returned null".to_string(),
            });
        }

        Ok((self.surface.clone(), self.context.clone()))
    }

    fn window_size(&self) -> (u32, u32) {
        self.window_size.get()
    }

    fn frame_scheduler(&self) -> ManualScheduler {
        self.scheduler.clone()
    }
}
