use std::rc::Rc;

use failure::Fail;
use fnv::FnvHashMap;

use crate::pipeline::shader::{failure_diagnostic, Shader};
use crate::pipeline::{ShaderCompileError, ShaderStage};
use crate::runtime::GraphicsContext;

/// Returned when the driver fails to link the vertex and fragment stages of a program.
#[derive(Fail, Clone, PartialEq, Debug)]
#[fail(display = "Error linking shader '{}': {}", name, diagnostic)]
pub struct ShaderLinkError {
    pub name: String,
    pub diagnostic: String,
}

/// Returned by [ShaderProgram::attribute_location] for names that do not identify an active
/// attribute of the program.
///
/// Attributes the compiler optimized out (because the shader code never reads them) are not
/// active and will also produce this error.
#[derive(Fail, Clone, PartialEq, Debug)]
#[fail(
    display = "Unable to find attribute named '{}' in shader named '{}'",
    name, shader_name
)]
pub struct AttributeNotFound {
    pub name: String,
    pub shader_name: String,
}

#[derive(Fail, Clone, PartialEq, Debug)]
pub enum CreateProgramError {
    #[fail(display = "{}", _0)]
    Compile(#[cause] ShaderCompileError),
    #[fail(display = "{}", _0)]
    Link(#[cause] ShaderLinkError),
    #[fail(display = "The graphics context could not allocate a {} object", object)]
    ObjectAllocation { object: &'static str },
}

impl From<ShaderCompileError> for CreateProgramError {
    fn from(error: ShaderCompileError) -> Self {
        CreateProgramError::Compile(error)
    }
}

impl From<ShaderLinkError> for CreateProgramError {
    fn from(error: ShaderLinkError) -> Self {
        CreateProgramError::Link(error)
    }
}

/// An active vertex attribute of a linked [ShaderProgram].
#[derive(Clone, PartialEq, Debug)]
pub struct ActiveAttribute {
    name: String,
    location: u32,
    size: i32,
    type_id: u32,
}

impl ActiveAttribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The binding slot the linker assigned to the attribute.
    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn type_id(&self) -> u32 {
        self.type_id
    }
}

/// A vertex stage and a fragment stage, linked together into a program object.
///
/// The active attributes of the program are discovered once, when the program is compiled; the
/// resulting name to location mapping never changes afterwards.
pub struct ShaderProgram<C>
where
    C: GraphicsContext,
{
    name: String,
    context: Rc<C>,
    object: C::Program,
    attributes: Vec<ActiveAttribute>,
    attribute_locations: FnvHashMap<String, u32>,
    // Held so the shader objects live as long as the program, dropped after it.
    _vertex_shader: Shader<C>,
    _fragment_shader: Shader<C>,
}

impl<C> ShaderProgram<C>
where
    C: GraphicsContext,
{
    /// Compiles both stages, links them and records the program's active attributes.
    ///
    /// `name` only serves to identify the program in diagnostics.
    ///
    /// Fails with [CreateProgramError::Compile] if either stage does not compile (the vertex
    /// stage is compiled first), with [CreateProgramError::Link] if the stages do not link, or
    /// with [CreateProgramError::ObjectAllocation] if the context could not create a shader or
    /// program object. Any objects created before the failure are deleted again.
    pub fn compile<N>(
        context: &Rc<C>,
        name: N,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, CreateProgramError>
    where
        N: Into<String>,
    {
        let name = name.into();

        let vertex_shader = Shader::compile(context, ShaderStage::Vertex, &name, vertex_source)?;
        let fragment_shader =
            Shader::compile(context, ShaderStage::Fragment, &name, fragment_source)?;

        let object = context
            .create_program()
            .ok_or(CreateProgramError::ObjectAllocation { object: "program" })?;

        context.attach_shader(&object, vertex_shader.object());
        context.attach_shader(&object, fragment_shader.object());
        context.link_program(&object);

        let diagnostic = failure_diagnostic(
            context.program_link_status(&object),
            context.program_info_log(&object),
        );

        if let Some(diagnostic) = diagnostic {
            context.delete_program(&object);

            return Err(ShaderLinkError { name, diagnostic }.into());
        }

        let attributes = detect_attributes(context.as_ref(), &object);
        let attribute_locations = attributes
            .iter()
            .map(|attribute| (attribute.name.clone(), attribute.location))
            .collect();

        log::debug!(
            "Linked shader '{}' with {} active attribute(s)",
            name,
            attributes.len()
        );

        Ok(ShaderProgram {
            name,
            context: context.clone(),
            object,
            attributes,
            attribute_locations,
            _vertex_shader: vertex_shader,
            _fragment_shader: fragment_shader,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Makes this program the active program of the context.
    pub fn use_program(&self) {
        self.context.use_program(Some(&self.object));
    }

    /// Returns the location of the active attribute with the given `name`.
    pub fn attribute_location(&self, name: &str) -> Result<u32, AttributeNotFound> {
        self.attribute_locations
            .get(name)
            .copied()
            .ok_or_else(|| AttributeNotFound {
                name: name.to_string(),
                shader_name: self.name.clone(),
            })
    }

    /// The program's active attributes, in the order the driver enumerated them.
    pub fn attributes(&self) -> &[ActiveAttribute] {
        &self.attributes
    }
}

impl<C> Drop for ShaderProgram<C>
where
    C: GraphicsContext,
{
    fn drop(&mut self) {
        self.context.delete_program(&self.object);
    }
}

fn detect_attributes<C>(context: &C, program: &C::Program) -> Vec<ActiveAttribute>
where
    C: GraphicsContext,
{
    let count = context.active_attribute_count(program);
    let mut attributes = Vec::with_capacity(count as usize);

    for index in 0..count {
        let info = match context.active_attribute(program, index) {
            Some(info) => info,
            None => break,
        };

        let location = context.attribute_location(program, info.name());

        // Built-in attributes (`gl_VertexID` and friends) are reported as active, but have no
        // location.
        if location >= 0 {
            attributes.push(ActiveAttribute {
                name: info.name().to_string(),
                location: location as u32,
                size: info.size(),
                type_id: info.type_id(),
            });
        }
    }

    attributes
}
