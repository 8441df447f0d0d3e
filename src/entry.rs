use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::logging::init_logging;
use crate::runtime::web::BrowserPlatform;
use crate::{Engine, EngineConfig};

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let config = EngineConfig::default();

    init_logging(config.logging());

    let platform =
        BrowserPlatform::new().ok_or_else(|| JsValue::from_str("No global window available"))?;
    let window = platform.window().clone();
    let mut engine = Engine::new(platform, config);

    engine
        .start()
        .map_err(|error| JsValue::from_str(&error.to_string()))?;
    engine.resize();

    let on_resize = Closure::wrap(Box::new(move || engine.resize()) as Box<dyn FnMut()>);

    window.set_onresize(Some(on_resize.as_ref().unchecked_ref()));

    // The engine lives for as long as the page does.
    on_resize.forget();

    Ok(())
}
