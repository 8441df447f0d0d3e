//! A minimal WebGL rendering engine: it acquires a canvas and its WebGL context, compiles a pair
//! of embedded shaders into a program, uploads one triangle and draws it every display refresh.
//!
//! The GPU is reached through the [runtime::GraphicsContext] trait, implemented for the browser
//! by [runtime::web] and for native tests by [runtime::headless].
//!
//! # Example
//!
//! ```
//! use web_engine::runtime::headless::HeadlessPlatform;
//! use web_engine::{Engine, EngineConfig};
//!
//! let platform = HeadlessPlatform::new().with_window_size(640, 480);
//! let scheduler = platform.scheduler().clone();
//!
//! let mut engine = Engine::new(platform, EngineConfig::default());
//!
//! engine.start().unwrap();
//! engine.resize();
//!
//! scheduler.refresh();
//!
//! assert_eq!(engine.frame_count(), 1);
//! ```

pub mod buffer;
pub mod frame;
pub mod logging;
pub mod pipeline;
pub mod runtime;

mod config;
pub use self::config::{EngineConfig, EngineConfigBuilder};

mod engine;
pub use self::engine::{
    Engine, StartError, BASIC_FRAGMENT_SHADER, BASIC_SHADER_NAME, BASIC_VERTEX_SHADER, TRIANGLE,
};

#[cfg(target_arch = "wasm32")]
mod entry;

mod util;
