//! Theme palette and style defaults shared by every window.

/// Packed RGBA color: alpha, blue, green, red from the high byte down,
/// matching the GUI vertex color format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color(u32);

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((a as u32) << 24) | ((b as u32) << 16) | ((g as u32) << 8) | (r as u32))
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    pub const fn packed(self) -> u32 {
        self.0
    }

    pub const fn r(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub const fn g(self) -> u8 {
        ((self.0 >> 8) & 0xff) as u8
    }

    pub const fn b(self) -> u8 {
        ((self.0 >> 16) & 0xff) as u8
    }

    pub const fn a(self) -> u8 {
        ((self.0 >> 24) & 0xff) as u8
    }

    /// Normalized components, for clear colors.
    pub fn to_f32_array(self) -> [f32; 4] {
        [
            self.r() as f32 / 255.0,
            self.g() as f32 / 255.0,
            self.b() as f32 / 255.0,
            self.a() as f32 / 255.0,
        ]
    }
}

/// The named palette.
pub mod colors {
    use super::Color;

    pub const ACCENT: Color = Color::rgb(0, 120, 215);
    pub const HIGHLIGHT: Color = Color::rgb(255, 193, 7);
    pub const NICE_BLUE: Color = Color::rgb(52, 152, 219);
    pub const COMPLIMENT: Color = Color::rgb(231, 76, 60);
    pub const BACKGROUND: Color = Color::rgb(248, 249, 250);
    pub const BACKGROUND_DARK: Color = Color::rgb(36, 37, 38);
    pub const BACKGROUND_POPUP: Color = Color::rgb(255, 255, 255);
    pub const TITLEBAR: Color = Color::rgb(44, 62, 80);
    pub const TITLEBAR_BRIGHTER: Color = Color::rgb(52, 73, 94);
    pub const TITLEBAR_DARKER: Color = Color::rgb(33, 37, 41);
    pub const PROPERTY_FIELD: Color = Color::rgb(52, 73, 94);
    pub const TEXT: Color = Color::rgb(33, 37, 41);
    pub const TEXT_BRIGHTER: Color = Color::rgb(255, 255, 255);
    pub const TEXT_DARKER: Color = Color::rgb(87, 96, 111);
    pub const TEXT_ERROR: Color = Color::rgb(231, 76, 60);
    pub const BUTTON: Color = Color::rgba(52, 52, 52, 200);
    pub const BUTTON_BRIGHTER: Color = Color::rgba(52, 52, 52, 150);
    pub const BUTTON_DARKER: Color = Color::rgb(60, 60, 60);
    pub const MUTED: Color = Color::rgb(189, 195, 199);
    pub const GROUP_HEADER: Color = Color::rgb(52, 152, 219);
    pub const SELECTION: Color = Color::rgb(88, 101, 242);
    pub const SELECTION_MUTED: Color = Color::rgb(107, 115, 125);
}

/// Colors a window and its widgets draw with. Defaults to the dark theme.
#[derive(Clone, Copy, Debug)]
pub struct Style {
    pub clear_color: Color,
    pub background: Color,
    pub titlebar: Color,
    pub text: Color,
    pub accent: Color,
    pub selection: Color,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            clear_color: colors::BACKGROUND_DARK,
            background: colors::BACKGROUND_DARK,
            titlebar: colors::TITLEBAR,
            text: colors::TEXT_BRIGHTER,
            accent: colors::ACCENT,
            selection: colors::SELECTION,
        }
    }
}
