use ratatui::style::Color;

pub const BG: Color = Color::Rgb(15, 15, 25);
pub const SURFACE: Color = Color::Rgb(22, 22, 36);
pub const BORDER: Color = Color::Rgb(50, 50, 70);
pub const BORDER_ACTIVE: Color = Color::Rgb(100, 60, 200);
pub const TEXT: Color = Color::Rgb(210, 210, 225);
pub const DIM: Color = Color::Rgb(90, 90, 110);
pub const ACCENT: Color = Color::Rgb(140, 80, 255);
pub const GREEN: Color = Color::Rgb(80, 200, 120);
pub const YELLOW: Color = Color::Rgb(230, 190, 60);
pub const CYAN: Color = Color::Rgb(80, 200, 220);
pub const RED: Color = Color::Rgb(230, 80, 80);
pub const HINT: Color = Color::Rgb(60, 60, 80);
