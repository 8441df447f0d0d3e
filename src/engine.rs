use std::cell::RefCell;
use std::rc::Rc;

use failure::Fail;

use crate::buffer::{BufferAllocationError, UsageHint, VertexBuffer};
use crate::config::EngineConfig;
use crate::frame::{self, FrameDriver, FrameLoopHandle};
use crate::pipeline::{AttributeNotFound, CreateProgramError, ShaderProgram};
use crate::runtime::state::{ContextUpdate, DynamicState};
use crate::runtime::{AcquireError, GraphicsContext, Platform, Surface};

/// The name of the program built from [BASIC_VERTEX_SHADER] and [BASIC_FRAGMENT_SHADER].
pub const BASIC_SHADER_NAME: &str = "basic";

/// Passes `a_position` through unchanged.
pub const BASIC_VERTEX_SHADER: &str = include_str!("shaders/basic_vertex.glsl");

/// Colors every fragment opaque white.
pub const BASIC_FRAGMENT_SHADER: &str = include_str!("shaders/basic_fragment.glsl");

/// The vertex positions uploaded at startup.
pub const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [0.0, 0.5, 0.0], [0.5, 0.5, 0.0]];

#[derive(Fail, Clone, PartialEq, Debug)]
pub enum StartError {
    #[fail(display = "The engine has already been started")]
    AlreadyStarted,
    #[fail(display = "{}", _0)]
    Acquire(#[cause] AcquireError),
    #[fail(display = "{}", _0)]
    CreateProgram(#[cause] CreateProgramError),
    #[fail(display = "{}", _0)]
    BufferAllocation(#[cause] BufferAllocationError),
    #[fail(display = "{}", _0)]
    AttributeNotFound(#[cause] AttributeNotFound),
}

impl From<AcquireError> for StartError {
    fn from(error: AcquireError) -> Self {
        StartError::Acquire(error)
    }
}

impl From<CreateProgramError> for StartError {
    fn from(error: CreateProgramError) -> Self {
        StartError::CreateProgram(error)
    }
}

impl From<BufferAllocationError> for StartError {
    fn from(error: BufferAllocationError) -> Self {
        StartError::BufferAllocation(error)
    }
}

impl From<AttributeNotFound> for StartError {
    fn from(error: AttributeNotFound) -> Self {
        StartError::AttributeNotFound(error)
    }
}

struct Running<P>
where
    P: Platform,
{
    surface: P::Surface,
    context: Rc<P::Context>,
    driver: Rc<RefCell<FrameDriver<P::Context>>>,
    frame_loop: FrameLoopHandle,
}

/// Renders a single white triangle on a cleared surface, once per display refresh.
///
/// An engine does nothing until it is [started](Engine::start): starting acquires the surface
/// and its graphics context, builds the shader program and uploads the triangle, then hands the
/// frame loop to the platform's scheduler.
pub struct Engine<P>
where
    P: Platform,
{
    platform: P,
    config: EngineConfig,
    running: Option<Running<P>>,
}

impl<P> Engine<P>
where
    P: Platform,
    P::Context: 'static,
{
    pub fn new(platform: P, config: EngineConfig) -> Self {
        log::info!("Engine initialising...");

        Engine {
            platform,
            config,
            running: None,
        }
    }

    /// Acquires the graphics context, builds the GPU resources and starts the frame loop.
    ///
    /// Nothing is retained when this fails: the engine stays un-started and [resize] remains a
    /// no-op.
    ///
    /// [resize]: Engine::resize
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.running.is_some() {
            return Err(StartError::AlreadyStarted);
        }

        let (surface, context) = self
            .platform
            .acquire(&self.config.surface_target(), self.config.context_options())?;
        let context = Rc::new(context);
        let mut state = DynamicState::initial();

        state
            .set_clear_color::<P::Context>(self.config.clear_color())
            .apply(&context)
            .unwrap_or(());

        let program = ShaderProgram::compile(
            &context,
            BASIC_SHADER_NAME,
            BASIC_VERTEX_SHADER,
            BASIC_FRAGMENT_SHADER,
        )?;

        program.use_program();

        let vertex_buffer =
            VertexBuffer::new(&context, &mut state, &TRIANGLE, UsageHint::StaticDraw)?;
        let driver = Rc::new(RefCell::new(FrameDriver::new(
            &context,
            state,
            program,
            vertex_buffer,
        )?));

        let frame_driver = driver.clone();
        let frame_loop = frame::run(self.platform.frame_scheduler(), move || {
            frame_driver.borrow_mut().advance_frame()
        });

        self.running = Some(Running {
            surface,
            context,
            driver,
            frame_loop,
        });

        log::info!("Engine started");

        Ok(())
    }

    /// Matches the surface to the window's current inner size. Does nothing if the engine has
    /// not been started.
    pub fn resize(&self) {
        if self.running.is_some() {
            let (width, height) = self.platform.window_size();

            self.resize_to(width, height);
        }
    }

    /// Sets the surface size and the viewport to `width` by `height`. Does nothing if the engine
    /// has not been started.
    pub fn resize_to(&self, width: u32, height: u32) {
        if let Some(running) = &self.running {
            running.surface.set_size(width, height);
            running
                .context
                .viewport(0, 0, width as i32, height as i32);

            log::debug!("Resized surface to {}x{}", width, height);
        }
    }

    /// Cancels the frame loop. The program and vertex buffer are deleted once the last frame
    /// callback still queued with the scheduler has been dropped.
    ///
    /// Returns `false` if the engine was not running.
    pub fn stop(&mut self) -> bool {
        match self.running.take() {
            Some(running) => {
                running.frame_loop.cancel();

                log::info!(
                    "Engine stopped after {} frame(s)",
                    running.frame_loop.frame_count()
                );

                true
            }
            None => false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    /// Whether frames are still being scheduled. A started engine stops running when the platform
    /// rejects a frame request; [stop](Engine::stop) then releases its resources.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|running| !running.frame_loop.is_cancelled())
            .unwrap_or(false)
    }

    /// The number of frames rendered since the engine was started, or `0` if it is not running.
    pub fn frame_count(&self) -> u64 {
        self.running
            .as_ref()
            .map(|running| running.driver.borrow().frames_drawn())
            .unwrap_or(0)
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
