//! Tracks the bits of graphics context state the engine modifies, so that redundant state changes
//! can be skipped.
//!
//! Each setter records the new value and returns a [ContextUpdate]; the update only touches the
//! context if the value actually changed. The tracked values assume the context starts out in its
//! default state, which holds for a freshly acquired context.

use fnv::FnvHashSet;

use crate::buffer::BufferTarget;
use crate::runtime::GraphicsContext;

pub trait ContextUpdate<'a, C, E> {
    fn apply(self, context: &C) -> Result<(), E>;
}

impl<'a, C, F, E> ContextUpdate<'a, C, E> for Option<F>
where
    F: FnOnce(&C) -> Result<(), E> + 'a,
{
    fn apply(self, context: &C) -> Result<(), E> {
        self.map(|f| f(context)).unwrap_or(Ok(()))
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct DynamicState {
    clear_color: [f32; 4],
    bound_array_buffer: Option<usize>,
    enabled_vertex_attrib_arrays: FnvHashSet<u32>,
}

impl DynamicState {
    pub fn initial() -> Self {
        DynamicState {
            clear_color: [0.0, 0.0, 0.0, 0.0],
            bound_array_buffer: None,
            enabled_vertex_attrib_arrays: FnvHashSet::default(),
        }
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn set_clear_color<C>(&mut self, color: [f32; 4]) -> impl ContextUpdate<'static, C, ()>
    where
        C: GraphicsContext,
    {
        if color != self.clear_color {
            self.clear_color = color;

            Some(move |context: &C| {
                context.clear_color(color[0], color[1], color[2], color[3]);

                Ok(())
            })
        } else {
            None
        }
    }

    /// The object id of the buffer currently bound to [BufferTarget::Array], if any.
    pub fn bound_array_buffer(&self) -> Option<usize> {
        self.bound_array_buffer
    }

    /// Binds `buffer`, given as an `(object id, buffer handle)` pair, to [BufferTarget::Array].
    pub fn set_bound_array_buffer<'a, C>(
        &mut self,
        buffer: Option<(usize, &'a C::Buffer)>,
    ) -> impl ContextUpdate<'a, C, ()>
    where
        C: GraphicsContext,
    {
        let id = buffer.map(|(id, _)| id);

        if id != self.bound_array_buffer {
            self.bound_array_buffer = id;

            Some(move |context: &C| {
                context.bind_buffer(BufferTarget::Array, buffer.map(|(_, buffer)| buffer));

                Ok(())
            })
        } else {
            None
        }
    }

    pub fn vertex_attrib_array_enabled(&self, location: u32) -> bool {
        self.enabled_vertex_attrib_arrays.contains(&location)
    }

    pub fn set_vertex_attrib_array_enabled<C>(
        &mut self,
        location: u32,
        enabled: bool,
    ) -> impl ContextUpdate<'static, C, ()>
    where
        C: GraphicsContext,
    {
        let changed = if enabled {
            self.enabled_vertex_attrib_arrays.insert(location)
        } else {
            self.enabled_vertex_attrib_arrays.remove(&location)
        };

        if changed {
            Some(move |context: &C| {
                if enabled {
                    context.enable_vertex_attrib_array(location);
                } else {
                    context.disable_vertex_attrib_array(location);
                }

                Ok(())
            })
        } else {
            None
        }
    }
}

impl Default for DynamicState {
    fn default() -> Self {
        DynamicState::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::headless::{Command, HeadlessContext};

    #[test]
    fn test_set_clear_color_skips_redundant_updates() {
        let context = HeadlessContext::new();
        let mut state = DynamicState::initial();

        state
            .set_clear_color::<HeadlessContext>([0.0, 0.0, 0.0, 1.0])
            .apply(&context)
            .unwrap();
        state
            .set_clear_color::<HeadlessContext>([0.0, 0.0, 0.0, 1.0])
            .apply(&context)
            .unwrap();

        assert_eq!(
            context.commands(),
            vec![Command::ClearColor([0.0, 0.0, 0.0, 1.0])]
        );
        assert_eq!(state.clear_color(), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_default_clear_color_is_not_reissued() {
        let context = HeadlessContext::new();
        let mut state = DynamicState::initial();

        state
            .set_clear_color::<HeadlessContext>([0.0, 0.0, 0.0, 0.0])
            .apply(&context)
            .unwrap();

        assert!(context.commands().is_empty());
    }

    #[test]
    fn test_set_bound_array_buffer() {
        let context = HeadlessContext::new();
        let buffer = context.create_buffer().unwrap();
        let mut state = DynamicState::initial();

        context.clear_commands();

        state
            .set_bound_array_buffer::<HeadlessContext>(Some((7, &buffer)))
            .apply(&context)
            .unwrap();
        state
            .set_bound_array_buffer::<HeadlessContext>(Some((7, &buffer)))
            .apply(&context)
            .unwrap();

        assert_eq!(state.bound_array_buffer(), Some(7));

        state
            .set_bound_array_buffer::<HeadlessContext>(None)
            .apply(&context)
            .unwrap();

        assert_eq!(
            context.commands(),
            vec![
                Command::BindBuffer {
                    target: BufferTarget::Array,
                    buffer: Some(buffer.id()),
                },
                Command::BindBuffer {
                    target: BufferTarget::Array,
                    buffer: None,
                },
            ]
        );
        assert_eq!(state.bound_array_buffer(), None);
    }

    #[test]
    fn test_set_vertex_attrib_array_enabled() {
        let context = HeadlessContext::new();
        let mut state = DynamicState::initial();

        state
            .set_vertex_attrib_array_enabled::<HeadlessContext>(2, false)
            .apply(&context)
            .unwrap();

        assert!(context.commands().is_empty());

        state
            .set_vertex_attrib_array_enabled::<HeadlessContext>(2, true)
            .apply(&context)
            .unwrap();
        state
            .set_vertex_attrib_array_enabled::<HeadlessContext>(2, true)
            .apply(&context)
            .unwrap();

        assert!(state.vertex_attrib_array_enabled(2));

        state
            .set_vertex_attrib_array_enabled::<HeadlessContext>(2, false)
            .apply(&context)
            .unwrap();

        assert_eq!(
            context.commands(),
            vec![
                Command::EnableVertexAttribArray(2),
                Command::DisableVertexAttribArray(2),
            ]
        );
    }
}
