use web_sys::WebGlRenderingContext as Gl;

/// The way a sequence of vertices is assembled into primitives.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    /// Every 3 consecutive vertices form an independent triangle (a "triangle list").
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Topology {
    pub(crate) fn gl_id(&self) -> u32 {
        match self {
            Topology::Points => Gl::POINTS,
            Topology::Lines => Gl::LINES,
            Topology::LineStrip => Gl::LINE_STRIP,
            Topology::LineLoop => Gl::LINE_LOOP,
            Topology::Triangles => Gl::TRIANGLES,
            Topology::TriangleStrip => Gl::TRIANGLE_STRIP,
            Topology::TriangleFan => Gl::TRIANGLE_FAN,
        }
    }
}

impl Default for Topology {
    fn default() -> Self {
        Topology::Triangles
    }
}
