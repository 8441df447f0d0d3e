use serde_derive::Serialize;

/// Hint to the browser about which GPU configuration is suitable for the context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    Default,
    HighPerformance,
    LowPower,
}

impl Default for PowerPreference {
    fn default() -> Self {
        PowerPreference::Default
    }
}

/// The context creation attributes used when a graphics context is requested for a drawing
/// surface.
///
/// The defaults match the WebGL defaults. Use [ContextOptions::begin] to build a custom set of
/// options:
///
/// ```
/// use web_engine::runtime::{ContextOptions, PowerPreference};
///
/// let options = ContextOptions::begin()
///     .antialias(false)
///     .power_preference(PowerPreference::LowPower)
///     .finish();
///
/// assert!(!options.antialias());
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct ContextOptions {
    alpha: bool,
    antialias: bool,
    depth: bool,
    stencil: bool,
    premultiplied_alpha: bool,
    preserve_drawing_buffer: bool,
    fail_if_major_performance_caveat: bool,
    power_preference: PowerPreference,
}

impl ContextOptions {
    pub fn begin() -> ContextOptionsBuilder {
        ContextOptionsBuilder {
            options: ContextOptions::default(),
        }
    }

    pub fn alpha(&self) -> bool {
        self.alpha
    }

    pub fn antialias(&self) -> bool {
        self.antialias
    }

    pub fn depth(&self) -> bool {
        self.depth
    }

    pub fn stencil(&self) -> bool {
        self.stencil
    }

    pub fn premultiplied_alpha(&self) -> bool {
        self.premultiplied_alpha
    }

    pub fn preserve_drawing_buffer(&self) -> bool {
        self.preserve_drawing_buffer
    }

    pub fn fail_if_major_performance_caveat(&self) -> bool {
        self.fail_if_major_performance_caveat
    }

    pub fn power_preference(&self) -> PowerPreference {
        self.power_preference
    }

    pub(crate) fn to_attributes(&self) -> ContextAttributes {
        ContextAttributes {
            alpha: self.alpha,
            antialias: self.antialias,
            depth: self.depth,
            stencil: self.stencil,
            premultiplied_alpha: self.premultiplied_alpha,
            preserve_drawing_buffer: self.preserve_drawing_buffer,
            fail_if_major_performance_caveat: self.fail_if_major_performance_caveat,
            power_preference: self.power_preference,
        }
    }
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            alpha: true,
            antialias: true,
            depth: true,
            stencil: false,
            premultiplied_alpha: true,
            preserve_drawing_buffer: false,
            fail_if_major_performance_caveat: false,
            power_preference: PowerPreference::default(),
        }
    }
}

pub struct ContextOptionsBuilder {
    options: ContextOptions,
}

impl ContextOptionsBuilder {
    pub fn alpha(mut self, alpha: bool) -> Self {
        self.options.alpha = alpha;

        self
    }

    pub fn antialias(mut self, antialias: bool) -> Self {
        self.options.antialias = antialias;

        self
    }

    pub fn depth(mut self, depth: bool) -> Self {
        self.options.depth = depth;

        self
    }

    pub fn stencil(mut self, stencil: bool) -> Self {
        self.options.stencil = stencil;

        self
    }

    pub fn premultiplied_alpha(mut self, premultiplied_alpha: bool) -> Self {
        self.options.premultiplied_alpha = premultiplied_alpha;

        self
    }

    pub fn preserve_drawing_buffer(mut self, preserve_drawing_buffer: bool) -> Self {
        self.options.preserve_drawing_buffer = preserve_drawing_buffer;

        self
    }

    pub fn fail_if_major_performance_caveat(
        mut self,
        fail_if_major_performance_caveat: bool,
    ) -> Self {
        self.options.fail_if_major_performance_caveat = fail_if_major_performance_caveat;

        self
    }

    pub fn power_preference(mut self, power_preference: PowerPreference) -> Self {
        self.options.power_preference = power_preference;

        self
    }

    pub fn finish(self) -> ContextOptions {
        self.options
    }
}

/// The `WebGLContextAttributes` dictionary, in the shape `getContext` expects it.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContextAttributes {
    alpha: bool,
    antialias: bool,
    depth: bool,
    stencil: bool,
    premultiplied_alpha: bool,
    preserve_drawing_buffer: bool,
    fail_if_major_performance_caveat: bool,
    power_preference: PowerPreference,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_match_webgl_defaults() {
        let options = ContextOptions::default();

        assert!(options.alpha());
        assert!(options.antialias());
        assert!(options.depth());
        assert!(!options.stencil());
        assert!(options.premultiplied_alpha());
        assert!(!options.preserve_drawing_buffer());
        assert!(!options.fail_if_major_performance_caveat());
        assert_eq!(options.power_preference(), PowerPreference::Default);
    }

    #[test]
    fn test_builder_overrides() {
        let options = ContextOptions::begin()
            .alpha(false)
            .stencil(true)
            .preserve_drawing_buffer(true)
            .power_preference(PowerPreference::HighPerformance)
            .finish();

        assert!(!options.alpha());
        assert!(options.stencil());
        assert!(options.preserve_drawing_buffer());
        assert!(options.antialias());
        assert_eq!(options.power_preference(), PowerPreference::HighPerformance);
    }

    #[test]
    fn test_attributes_serialize_to_webgl_dictionary() {
        let options = ContextOptions::begin()
            .antialias(false)
            .power_preference(PowerPreference::LowPower)
            .finish();
        let json = serde_json::to_value(&options.to_attributes()).unwrap();

        assert_eq!(json["antialias"], false);
        assert_eq!(json["premultipliedAlpha"], true);
        assert_eq!(json["preserveDrawingBuffer"], false);
        assert_eq!(json["failIfMajorPerformanceCaveat"], false);
        assert_eq!(json["powerPreference"], "low-power");
    }
}
