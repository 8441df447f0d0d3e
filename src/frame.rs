//! The per-frame draw and the loop that drives it.
//!
//! [FrameDriver::advance_frame] renders a single frame. The loop itself is owned by the hosting
//! environment: [run] hands each frame to a [FrameScheduler] (in the browser this is
//! `requestAnimationFrame`), and checks its cancellation token before every frame. Because the
//! scheduler is pluggable, the loop can be single-stepped without a display, see
//! [ManualScheduler](crate::runtime::headless::ManualScheduler).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use failure::Fail;

use crate::buffer::{DataType, VertexBuffer};
use crate::pipeline::{AttributeNotFound, ShaderProgram, Topology};
use crate::runtime::state::{ContextUpdate, DynamicState};
use crate::runtime::{ClearMask, GraphicsContext};

/// The name of the vertex position attribute the frame driver feeds.
pub const POSITION_ATTRIBUTE: &str = "a_position";

/// Components per position: `x`, `y` and `z`.
const POSITION_COMPONENTS: i32 = 3;

/// Returned when the hosting environment refuses to schedule a frame.
#[derive(Fail, Clone, PartialEq, Debug)]
#[fail(display = "Failed to request a frame: {}", reason)]
pub struct FrameRequestError {
    pub reason: String,
}

/// The display's per-refresh callback queue.
pub trait FrameScheduler {
    /// Requests that `callback` is invoked once, no earlier than the next display refresh.
    ///
    /// The callback is dropped without being invoked if the request fails.
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Result<(), FrameRequestError>;
}

/// Runs `frame` once per display refresh, as provided by `scheduler`, until the returned handle
/// is cancelled or dropped.
///
/// The first frame is requested immediately; nothing is rendered before the scheduler invokes it.
/// If the scheduler rejects a request the loop ends and the handle reports it as cancelled.
pub fn run<S, F>(scheduler: S, frame: F) -> FrameLoopHandle
where
    S: FrameScheduler + Clone + 'static,
    F: FnMut() + 'static,
{
    let token = LoopToken {
        cancelled: Rc::new(Cell::new(false)),
        frame_count: Rc::new(Cell::new(0)),
    };

    request_next(scheduler, Rc::new(RefCell::new(frame)), token.clone());

    FrameLoopHandle { token }
}

fn request_next<S, F>(scheduler: S, frame: Rc<RefCell<F>>, token: LoopToken)
where
    S: FrameScheduler + Clone + 'static,
    F: FnMut() + 'static,
{
    let next_scheduler = scheduler.clone();
    let cancelled = token.cancelled.clone();

    let result = scheduler.request_frame(Box::new(move || {
        if token.cancelled.get() {
            return;
        }

        (&mut *frame.borrow_mut())();

        token.frame_count.set(token.frame_count.get() + 1);

        request_next(next_scheduler, frame, token);
    }));

    if let Err(error) = result {
        log::error!("Frame loop stopped: {}", error);

        cancelled.set(true);
    }
}

#[derive(Clone)]
struct LoopToken {
    cancelled: Rc<Cell<bool>>,
    frame_count: Rc<Cell<u64>>,
}

/// Controls a loop started with [run]. Dropping the handle cancels the loop.
pub struct FrameLoopHandle {
    token: LoopToken,
}

impl FrameLoopHandle {
    /// Stops the loop: frames already requested from the scheduler will not render and will not
    /// request further frames.
    ///
    /// Returns `false` if the loop had already been cancelled or had ended on a failed frame
    /// request.
    pub fn cancel(&self) -> bool {
        !self.token.cancelled.replace(true)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.cancelled.get()
    }

    /// The number of frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.token.frame_count.get()
    }
}

impl Drop for FrameLoopHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Draws the vertex buffer as a single triangle list with the shader program, once per frame.
pub struct FrameDriver<C>
where
    C: GraphicsContext,
{
    context: Rc<C>,
    state: DynamicState,
    _program: ShaderProgram<C>,
    vertex_buffer: VertexBuffer<C>,
    position_location: u32,
    frames_drawn: u64,
}

impl<C> FrameDriver<C>
where
    C: GraphicsContext,
{
    /// Prepares a driver for the given program and buffer.
    ///
    /// Resolves the location of the [POSITION_ATTRIBUTE] and leaves its attribute array disabled
    /// until the first frame.
    pub fn new(
        context: &Rc<C>,
        state: DynamicState,
        program: ShaderProgram<C>,
        vertex_buffer: VertexBuffer<C>,
    ) -> Result<Self, AttributeNotFound> {
        let position_location = program.attribute_location(POSITION_ATTRIBUTE)?;

        // A context reacquired after a stop may still have the array enabled; `state` starts out
        // assuming it is disabled.
        context.disable_vertex_attrib_array(position_location);

        Ok(FrameDriver {
            context: context.clone(),
            state,
            _program: program,
            vertex_buffer,
            position_location,
            frames_drawn: 0,
        })
    }

    /// Clears the color buffer and draws the vertex buffer's 3 vertices as a triangle list.
    pub fn advance_frame(&mut self) {
        let context = &*self.context;

        context.clear(ClearMask::COLOR);

        self.vertex_buffer.bind(&mut self.state);

        context.vertex_attrib_pointer(
            self.position_location,
            POSITION_COMPONENTS,
            DataType::Float,
            false,
            0,
            0,
        );

        self.state
            .set_vertex_attrib_array_enabled::<C>(self.position_location, true)
            .apply(context)
            .unwrap_or(());

        context.draw_arrays(Topology::Triangles, 0, 3);

        self.frames_drawn += 1;
    }

    pub fn vertex_buffer(&self) -> &VertexBuffer<C> {
        &self.vertex_buffer
    }

    pub fn position_location(&self) -> u32 {
        self.position_location
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferTarget, UsageHint};
    use crate::runtime::headless::{Command, HeadlessContext, ManualScheduler};

    const VERTEX_SOURCE: &str = "
attribute vec3 a_position;

void main() {
    gl_Position = vec4(a_position, 1.0);
}";

    const FRAGMENT_SOURCE: &str = "
precision mediump float;

void main() {
    gl_FragColor = vec4(1.0);
}";

    const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [0.0, 0.5, 0.0], [0.5, 0.5, 0.0]];

    fn driver(context: &Rc<HeadlessContext>) -> FrameDriver<HeadlessContext> {
        let mut state = DynamicState::initial();
        let program =
            ShaderProgram::compile(context, "basic", VERTEX_SOURCE, FRAGMENT_SOURCE).unwrap();
        let vertex_buffer =
            VertexBuffer::new(context, &mut state, &TRIANGLE, UsageHint::StaticDraw).unwrap();

        FrameDriver::new(context, state, program, vertex_buffer).unwrap()
    }

    #[test]
    fn test_advance_frame_draws_one_triangle() {
        let context = Rc::new(HeadlessContext::new());
        let mut driver = driver(&context);
        let location = driver.position_location();
        let buffer = driver.vertex_buffer().object().id();

        context.clear_commands();
        driver.advance_frame();

        assert_eq!(
            context.commands(),
            vec![
                Command::Clear(ClearMask::COLOR),
                Command::BindBuffer {
                    target: BufferTarget::Array,
                    buffer: Some(buffer),
                },
                Command::VertexAttribPointer {
                    location,
                    size: 3,
                    data_type: DataType::Float,
                    normalized: false,
                    stride: 0,
                    offset: 0,
                },
                Command::EnableVertexAttribArray(location),
                Command::DrawArrays {
                    topology: Topology::Triangles,
                    first: 0,
                    count: 3,
                },
            ]
        );
    }

    #[test]
    fn test_new_disables_position_array() {
        let context = Rc::new(HeadlessContext::new());
        let mut state = DynamicState::initial();
        let program =
            ShaderProgram::compile(&context, "basic", VERTEX_SOURCE, FRAGMENT_SOURCE).unwrap();
        let vertex_buffer =
            VertexBuffer::new(&context, &mut state, &TRIANGLE, UsageHint::StaticDraw).unwrap();

        context.clear_commands();

        let driver = FrameDriver::new(&context, state, program, vertex_buffer).unwrap();

        assert_eq!(
            context.commands(),
            vec![Command::DisableVertexAttribArray(driver.position_location())]
        );
    }

    #[test]
    fn test_repeated_frames_never_touch_vertex_data() {
        let context = Rc::new(HeadlessContext::new());
        let mut driver = driver(&context);
        let buffer = driver.vertex_buffer().object().id();
        let uploaded = context.buffer_data(buffer);

        context.clear_commands();

        for _ in 0..5 {
            driver.advance_frame();
        }

        let commands = context.commands();
        let draws: Vec<_> = commands
            .iter()
            .filter(|command| matches!(command, Command::DrawArrays { .. }))
            .collect();

        assert_eq!(draws.len(), 5);
        assert!(draws.iter().all(|command| **command
            == Command::DrawArrays {
                topology: Topology::Triangles,
                first: 0,
                count: 3,
            }));
        assert!(!commands
            .iter()
            .any(|command| matches!(command, Command::BufferData { .. })));
        assert_eq!(context.buffer_data(buffer), uploaded);
        assert_eq!(driver.vertex_buffer().positions(), &TRIANGLE[..]);
        assert_eq!(driver.frames_drawn(), 5);
    }

    #[test]
    fn test_driver_requires_position_attribute() {
        let context = Rc::new(HeadlessContext::new());
        let mut state = DynamicState::initial();
        let vertex_source = "
attribute vec3 position;

void main() {
    gl_Position = vec4(position, 1.0);
}";
        let program =
            ShaderProgram::compile(&context, "basic", vertex_source, FRAGMENT_SOURCE).unwrap();
        let vertex_buffer =
            VertexBuffer::new(&context, &mut state, &TRIANGLE, UsageHint::StaticDraw).unwrap();

        let result = FrameDriver::new(&context, state, program, vertex_buffer);

        assert_eq!(
            result.err(),
            Some(AttributeNotFound {
                name: "a_position".to_string(),
                shader_name: "basic".to_string(),
            })
        );
    }

    #[test]
    fn test_run_renders_one_frame_per_refresh() {
        let scheduler = ManualScheduler::new();
        let counter = Rc::new(Cell::new(0));
        let frame_counter = counter.clone();

        let handle = run(scheduler.clone(), move || {
            frame_counter.set(frame_counter.get() + 1)
        });

        assert_eq!(counter.get(), 0);
        assert_eq!(scheduler.pending(), 1);

        assert!(scheduler.refresh());
        assert!(scheduler.refresh());
        assert!(scheduler.refresh());

        assert_eq!(counter.get(), 3);
        assert_eq!(handle.frame_count(), 3);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_cancelled_loop_stops_between_frames() {
        let scheduler = ManualScheduler::new();
        let counter = Rc::new(Cell::new(0));
        let frame_counter = counter.clone();

        let handle = run(scheduler.clone(), move || {
            frame_counter.set(frame_counter.get() + 1)
        });

        scheduler.refresh();

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(handle.is_cancelled());

        scheduler.refresh();

        assert_eq!(counter.get(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_dropping_handle_cancels_loop() {
        let scheduler = ManualScheduler::new();
        let counter = Rc::new(Cell::new(0));
        let frame_counter = counter.clone();

        let handle = run(scheduler.clone(), move || {
            frame_counter.set(frame_counter.get() + 1)
        });

        drop(handle);

        scheduler.refresh();

        assert_eq!(counter.get(), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_rejected_request_ends_loop() {
        let scheduler = ManualScheduler::new();
        let counter = Rc::new(Cell::new(0));
        let frame_counter = counter.clone();

        let handle = run(scheduler.clone(), move || {
            frame_counter.set(frame_counter.get() + 1)
        });

        scheduler.refresh();
        scheduler.fail_requests(true);
        scheduler.refresh();

        assert_eq!(counter.get(), 2);
        assert!(handle.is_cancelled());
        assert!(!handle.cancel());
        assert_eq!(scheduler.pending(), 0);

        scheduler.fail_requests(false);

        assert!(!scheduler.refresh());
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_rejected_first_request() {
        let scheduler = ManualScheduler::new();

        scheduler.fail_requests(true);

        let handle = run(scheduler.clone(), || ());

        assert!(handle.is_cancelled());
        assert_eq!(handle.frame_count(), 0);
        assert_eq!(scheduler.pending(), 0);
    }
}
