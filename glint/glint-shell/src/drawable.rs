use ui_api::UiContext;

/// Per-window application logic. The shell calls `on_update` then
/// `on_render` once per tick while the window's UI context is current;
/// `on_render` is where draw lists are built and submitted.
pub trait Drawable {
    fn on_update(&mut self, _ui: &mut UiContext, _dt: f32) {}
    fn on_render(&mut self, _ui: &mut UiContext) {}
}
