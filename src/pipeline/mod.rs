//! Shader stages, linked shader programs and primitive topology.

mod primitive_assembly;
pub use self::primitive_assembly::Topology;

mod shader;
pub use self::shader::{ShaderCompileError, ShaderStage};

mod program;
pub use self::program::{
    ActiveAttribute, AttributeNotFound, CreateProgramError, ShaderLinkError, ShaderProgram,
};
