//! GPU-accessible memory buffers.

use std::rc::Rc;

use failure::Fail;
use web_sys::WebGlRenderingContext as Gl;

use crate::pipeline::Topology;
use crate::runtime::state::{ContextUpdate, DynamicState};
use crate::runtime::GraphicsContext;
use crate::util::next_object_id;

/// The binding point a buffer is bound to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

impl BufferTarget {
    pub(crate) fn gl_id(&self) -> u32 {
        match self {
            BufferTarget::Array => Gl::ARRAY_BUFFER,
            BufferTarget::ElementArray => Gl::ELEMENT_ARRAY_BUFFER,
        }
    }
}

impl Default for BufferTarget {
    fn default() -> Self {
        BufferTarget::Array
    }
}

/// Hint to the driver about how a buffer's data will be accessed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UsageHint {
    StaticDraw,
    DynamicDraw,
    StreamDraw,
}

impl UsageHint {
    pub(crate) fn gl_id(&self) -> u32 {
        match self {
            UsageHint::StaticDraw => Gl::STATIC_DRAW,
            UsageHint::DynamicDraw => Gl::DYNAMIC_DRAW,
            UsageHint::StreamDraw => Gl::STREAM_DRAW,
        }
    }
}

/// The numeric type of the components stored in a buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DataType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
}

impl DataType {
    pub(crate) fn gl_id(&self) -> u32 {
        match self {
            DataType::Byte => Gl::BYTE,
            DataType::UnsignedByte => Gl::UNSIGNED_BYTE,
            DataType::Short => Gl::SHORT,
            DataType::UnsignedShort => Gl::UNSIGNED_SHORT,
            DataType::Int => Gl::INT,
            DataType::UnsignedInt => Gl::UNSIGNED_INT,
            DataType::Float => Gl::FLOAT,
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Byte | DataType::UnsignedByte => 1,
            DataType::Short | DataType::UnsignedShort => 2,
            DataType::Int | DataType::UnsignedInt | DataType::Float => 4,
        }
    }
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Float
    }
}

#[derive(Fail, Clone, PartialEq, Debug)]
#[fail(display = "The graphics context could not allocate a buffer object")]
pub struct BufferAllocationError;

/// A buffer of vertex positions, uploaded once and never modified afterwards. The buffer object
/// is deleted when the `VertexBuffer` is dropped.
pub struct VertexBuffer<C>
where
    C: GraphicsContext,
{
    id: usize,
    context: Rc<C>,
    object: C::Buffer,
    positions: Vec<[f32; 3]>,
}

impl<C> VertexBuffer<C>
where
    C: GraphicsContext,
{
    /// Creates a buffer object and uploads `positions` to it.
    ///
    /// The buffer is bound to [BufferTarget::Array] for the upload and unbound again afterwards.
    pub fn new(
        context: &Rc<C>,
        state: &mut DynamicState,
        positions: &[[f32; 3]],
        usage_hint: UsageHint,
    ) -> Result<Self, BufferAllocationError> {
        let object = context.create_buffer().ok_or(BufferAllocationError)?;
        let id = next_object_id();
        let data: Vec<f32> = positions.iter().flat_map(|p| p.iter().copied()).collect();

        state
            .set_bound_array_buffer::<C>(Some((id, &object)))
            .apply(context)
            .unwrap_or(());

        context.buffer_data_f32(BufferTarget::Array, &data, usage_hint);

        state
            .set_bound_array_buffer::<C>(None)
            .apply(context)
            .unwrap_or(());

        log::debug!("Uploaded {} vertex position(s)", positions.len());

        Ok(VertexBuffer {
            id,
            context: context.clone(),
            object,
            positions: positions.to_vec(),
        })
    }

    /// Identifies this buffer in [DynamicState].
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn object(&self) -> &C::Buffer {
        &self.object
    }

    /// The positions that were uploaded when the buffer was created.
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Binds this buffer to [BufferTarget::Array].
    pub fn bind(&self, state: &mut DynamicState) {
        state
            .set_bound_array_buffer::<C>(Some((self.id, &self.object)))
            .apply(&self.context)
            .unwrap_or(());
    }
}

impl<C> Drop for VertexBuffer<C>
where
    C: GraphicsContext,
{
    fn drop(&mut self) {
        self.context.delete_buffer(&self.object);
    }
}

/// Layout description for a buffer of arbitrary vertex data.
///
/// This is an extension point: it records how vertex data would be interpreted, but it does not
/// upload or draw anything yet.
#[derive(Clone, PartialEq, Debug)]
pub struct GlBuffer {
    element_size: usize,
    data_type: DataType,
    target: BufferTarget,
    mode: Topology,
    type_size: usize,
    stride: usize,
    data: Vec<f32>,
}

impl GlBuffer {
    /// Creates a buffer layout for elements of `element_size` components, with `FLOAT`
    /// components, bound to [BufferTarget::Array] and drawn as a triangle list.
    pub fn new(element_size: usize) -> Self {
        GlBuffer::with_format(
            element_size,
            DataType::default(),
            BufferTarget::default(),
            Topology::default(),
        )
    }

    pub fn with_format(
        element_size: usize,
        data_type: DataType,
        target: BufferTarget,
        mode: Topology,
    ) -> Self {
        let type_size = data_type.size_in_bytes();

        GlBuffer {
            element_size,
            data_type,
            target,
            mode,
            type_size,
            stride: element_size * type_size,
            data: Vec::new(),
        }
    }

    /// The number of components per element.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn mode(&self) -> Topology {
        self.mode
    }

    /// The size in bytes of a single component.
    pub fn type_size(&self) -> usize {
        self.type_size
    }

    /// The size in bytes of a single element.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::headless::{Command, HeadlessContext};

    const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [0.0, 0.5, 0.0], [0.5, 0.5, 0.0]];

    #[test]
    fn test_vertex_buffer_upload() {
        let context = Rc::new(HeadlessContext::new());
        let mut state = DynamicState::initial();
        let buffer =
            VertexBuffer::new(&context, &mut state, &TRIANGLE, UsageHint::StaticDraw).unwrap();
        let raw = buffer.object().id();

        assert_eq!(
            context.commands(),
            vec![
                Command::CreateBuffer(raw),
                Command::BindBuffer {
                    target: BufferTarget::Array,
                    buffer: Some(raw),
                },
                Command::BufferData {
                    target: BufferTarget::Array,
                    data: vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.5, 0.5, 0.0],
                    usage: UsageHint::StaticDraw,
                },
                Command::BindBuffer {
                    target: BufferTarget::Array,
                    buffer: None,
                },
            ]
        );
        assert_eq!(buffer.positions(), &TRIANGLE[..]);
        assert_eq!(buffer.vertex_count(), 3);
        assert_eq!(state.bound_array_buffer(), None);
    }

    #[test]
    fn test_vertex_buffer_allocation_failure() {
        let context = Rc::new(HeadlessContext::new());
        let mut state = DynamicState::initial();

        context.lose_context();

        let result = VertexBuffer::new(&context, &mut state, &TRIANGLE, UsageHint::StaticDraw);

        assert_eq!(result.err(), Some(BufferAllocationError));
    }

    #[test]
    fn test_dropping_vertex_buffer_deletes_object() {
        let context = Rc::new(HeadlessContext::new());
        let mut state = DynamicState::initial();
        let buffer =
            VertexBuffer::new(&context, &mut state, &TRIANGLE, UsageHint::StaticDraw).unwrap();
        let raw = buffer.object().id();

        assert_eq!(context.live_buffer_count(), 1);

        drop(buffer);

        assert_eq!(context.live_buffer_count(), 0);
        assert_eq!(context.commands().last(), Some(&Command::DeleteBuffer(raw)));
    }

    #[test]
    fn test_gl_buffer_defaults() {
        let buffer = GlBuffer::new(3);

        assert_eq!(buffer.element_size(), 3);
        assert_eq!(buffer.data_type(), DataType::Float);
        assert_eq!(buffer.target(), BufferTarget::Array);
        assert_eq!(buffer.mode(), Topology::Triangles);
        assert_eq!(buffer.type_size(), 4);
        assert_eq!(buffer.stride(), 12);
        assert!(buffer.data().is_empty());
    }

    #[test]
    fn test_gl_buffer_with_format() {
        let buffer = GlBuffer::with_format(
            2,
            DataType::UnsignedShort,
            BufferTarget::ElementArray,
            Topology::Lines,
        );

        assert_eq!(buffer.type_size(), 2);
        assert_eq!(buffer.stride(), 4);
        assert_eq!(buffer.target(), BufferTarget::ElementArray);
        assert_eq!(buffer.mode(), Topology::Lines);
    }
}
