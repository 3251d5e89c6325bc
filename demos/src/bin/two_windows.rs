//! Two-window shell demo: a primary window with a custom titlebar and a tool
//! window parented to it. Each window's drawable counts clicks and lays out
//! flat quads; the lists go through the null backend, so the windows present
//! the clear color until a widget renderer is plugged in.
//! Run: cargo run -p demos --bin two_windows

use glint_shell::{Application, ApplicationConfig, Drawable, WindowSettings};
use ui_api::{colors, Color, DrawCommand, DrawList, DrawVert, NullDrawBackend, UiContext, UiEvent};

const TITLEBAR_HEIGHT: f32 = 32.0;

/// Append one solid quad to the list as two triangles.
fn push_quad(list: &mut DrawList, min: [f32; 2], max: [f32; 2], color: Color) {
    let base = list.vertices.len() as u32;
    for pos in [
        [min[0], min[1]],
        [max[0], min[1]],
        [max[0], max[1]],
        [min[0], max[1]],
    ] {
        list.vertices.push(DrawVert {
            pos,
            uv: [0.0, 0.0],
            color: color.packed(),
        });
    }
    list.indices
        .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
}

struct QuadBoard {
    label: &'static str,
    clicks: u32,
}

impl QuadBoard {
    fn new(label: &'static str) -> Self {
        Self { label, clicks: 0 }
    }
}

impl Drawable for QuadBoard {
    fn on_update(&mut self, ui: &mut UiContext, _dt: f32) {
        for event in ui.take_events() {
            if let UiEvent::MouseButton { pressed: true, .. } = event {
                self.clicks += 1;
                log::info!("{}: click #{}", self.label, self.clicks);
            }
        }
    }

    fn on_render(&mut self, ui: &mut UiContext) {
        let size = ui.display_size();
        let style = *ui.style();
        let mut list = DrawList::default();

        push_quad(&mut list, [0.0, 0.0], [size[0], TITLEBAR_HEIGHT], style.titlebar);

        let cursor = ui.input().cursor_pos;
        let (cx, cy) = (cursor.0 as f32, cursor.1 as f32);
        let chip = if self.clicks % 2 == 0 {
            colors::ACCENT
        } else {
            colors::HIGHLIGHT
        };
        push_quad(&mut list, [cx - 12.0, cy - 12.0], [cx + 12.0, cy + 12.0], chip);

        let scale = ui.framebuffer_scale();
        list.commands.push(DrawCommand {
            clip_rect: [0.0, 0.0, size[0] * scale, size[1] * scale],
            texture: 0,
            index_offset: 0,
            index_count: list.indices.len() as u32,
        });
        ui.submit_list(list);
    }
}

fn main() {
    glint_shell::init_logging();

    let mut app = Application::new(ApplicationConfig {
        name: "two_windows".to_string(),
        clear_color: colors::BACKGROUND_DARK,
        ..ApplicationConfig::default()
    });

    let primary = app.spawn_window(
        WindowSettings {
            title: "Glint demo".to_string(),
            width: 960,
            height: 600,
            resizable: true,
            custom_titlebar: true,
            ..WindowSettings::default()
        },
        Box::new(QuadBoard::new("primary")),
        Box::new(NullDrawBackend),
    );
    app.spawn_window(
        WindowSettings {
            title: "Tool".to_string(),
            width: 320,
            height: 420,
            parent: Some(primary),
            ..WindowSettings::default()
        },
        Box::new(QuadBoard::new("tool")),
        Box::new(NullDrawBackend),
    );

    if let Err(e) = app.run() {
        log::error!("two_windows exited with an error: {e}");
        std::process::exit(1);
    }
}
