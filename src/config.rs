use crate::logging::LoggingConfig;
use crate::runtime::{ContextOptions, SurfaceTarget};

/// Startup configuration for an [Engine](crate::Engine).
///
/// # Example
///
/// ```
/// use web_engine::EngineConfig;
///
/// let config = EngineConfig::begin()
///     .canvas_id("viewport")
///     .clear_color([0.1, 0.1, 0.1, 1.0])
///     .finish();
///
/// assert_eq!(config.canvas_id(), Some("viewport"));
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct EngineConfig {
    canvas_id: Option<String>,
    clear_color: [f32; 4],
    context_options: ContextOptions,
    logging: LoggingConfig,
}

impl EngineConfig {
    pub fn begin() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: EngineConfig::default(),
        }
    }

    /// The id of an existing canvas element to render into. When `None`, a new canvas is created
    /// and appended to the document body.
    pub fn canvas_id(&self) -> Option<&str> {
        self.canvas_id.as_ref().map(|id| id.as_str())
    }

    pub fn surface_target(&self) -> SurfaceTarget {
        SurfaceTarget::from(self.canvas_id.clone())
    }

    /// The color the frame buffer is cleared to, as RGBA components in the range `0.0..=1.0`.
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn context_options(&self) -> &ContextOptions {
        &self.context_options
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            canvas_id: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            context_options: ContextOptions::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn canvas_id<S>(mut self, canvas_id: S) -> Self
    where
        S: Into<String>,
    {
        self.config.canvas_id = Some(canvas_id.into());

        self
    }

    pub fn clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.config.clear_color = clear_color;

        self
    }

    pub fn context_options(mut self, context_options: ContextOptions) -> Self {
        self.config.context_options = context_options;

        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;

        self
    }

    pub fn finish(self) -> EngineConfig {
        self.config
    }
}
