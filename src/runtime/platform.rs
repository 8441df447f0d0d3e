use failure::Fail;

use crate::frame::FrameScheduler;
use crate::runtime::{ContextOptions, GraphicsContext};

/// Identifies the drawing surface a graphics context should be created for.
#[derive(Clone, PartialEq, Debug)]
pub enum SurfaceTarget {
    /// Create a new surface and attach it to the document.
    Create,

    /// Use the existing surface element with the given id.
    Element(String),
}

impl From<Option<String>> for SurfaceTarget {
    fn from(id: Option<String>) -> Self {
        match id {
            Some(id) => SurfaceTarget::Element(id),
            None => SurfaceTarget::Create,
        }
    }
}

/// The on-screen region a graphics context renders into.
pub trait Surface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn set_size(&self, width: u32, height: u32);
}

/// The hosting environment: provides a drawing surface with its graphics context, the dimensions
/// of the window that contains it, and the display's per-refresh callback queue.
pub trait Platform {
    type Context: GraphicsContext;

    type Surface: Surface;

    type Scheduler: FrameScheduler + Clone + 'static;

    /// Locates or creates the drawing surface described by `target` and obtains its graphics
    /// context.
    ///
    /// There is no fallback context type and no retry: an error here is fatal to engine startup.
    fn acquire(
        &self,
        target: &SurfaceTarget,
        options: &ContextOptions,
    ) -> Result<(Self::Surface, Self::Context), AcquireError>;

    /// The current inner `(width, height)` of the window.
    fn window_size(&self) -> (u32, u32);

    fn frame_scheduler(&self) -> Self::Scheduler;
}

#[derive(Fail, Clone, PartialEq, Debug)]
pub enum AcquireError {
    #[fail(display = "Cannot find a canvas element named: {}", id)]
    SurfaceNotFound { id: String },
    #[fail(display = "Unable to initialize WebGL: {}", reason)]
    ContextCreation { reason: String },
    #[fail(display = "No document is available to attach a canvas element to")]
    NoDocument,
}
