use std::fmt;
use std::rc::Rc;

use failure::Fail;
use web_sys::WebGlRenderingContext as Gl;

use crate::pipeline::CreateProgramError;
use crate::runtime::GraphicsContext;

/// A stage of the programmable graphics pipeline.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn gl_id(&self) -> u32 {
        match self {
            ShaderStage::Vertex => Gl::VERTEX_SHADER,
            ShaderStage::Fragment => Gl::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Returned when the driver rejects the source code of a shader stage.
#[derive(Fail, Clone, PartialEq, Debug)]
#[fail(
    display = "Error compiling {} shader '{}': {}",
    stage, name, diagnostic
)]
pub struct ShaderCompileError {
    pub stage: ShaderStage,

    /// The name of the program the stage belongs to.
    pub name: String,

    /// The driver's info log.
    pub diagnostic: String,
}

/// A compiled shader object; deletes the object when dropped.
pub(crate) struct Shader<C>
where
    C: GraphicsContext,
{
    context: Rc<C>,
    object: C::Shader,
}

impl<C> Shader<C>
where
    C: GraphicsContext,
{
    pub(crate) fn compile(
        context: &Rc<C>,
        stage: ShaderStage,
        program_name: &str,
        source: &str,
    ) -> Result<Self, CreateProgramError> {
        let object = context
            .create_shader(stage)
            .ok_or(CreateProgramError::ObjectAllocation { object: "shader" })?;

        context.shader_source(&object, source);
        context.compile_shader(&object);

        let diagnostic = failure_diagnostic(
            context.shader_compile_status(&object),
            context.shader_info_log(&object),
        );

        if let Some(diagnostic) = diagnostic {
            context.delete_shader(&object);

            return Err(ShaderCompileError {
                stage,
                name: program_name.to_string(),
                diagnostic,
            }
            .into());
        }

        log::debug!("Compiled {} shader for '{}'", stage, program_name);

        Ok(Shader {
            context: context.clone(),
            object,
        })
    }

    pub(crate) fn object(&self) -> &C::Shader {
        &self.object
    }
}

impl<C> Drop for Shader<C>
where
    C: GraphicsContext,
{
    fn drop(&mut self) {
        self.context.delete_shader(&self.object);
    }
}

/// Decides whether a compile or link step failed, returning the diagnostic to report if it did.
///
/// A step fails if the driver reports a failed status or leaves anything in the info log. The
/// diagnostic is the log with surrounding whitespace removed.
pub(crate) fn failure_diagnostic(status: bool, info_log: Option<String>) -> Option<String> {
    let info_log = info_log.unwrap_or_default();

    if status && info_log.is_empty() {
        return None;
    }

    match info_log.trim() {
        "" => Some("unknown error".to_string()),
        trimmed => Some(trimmed.to_string()),
    }
}
