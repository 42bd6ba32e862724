use ratatui::style::{Color, Modifier, Style};

// Color palette, word-processor blue with a markdown amber accent
pub const PRIMARY: Color = Color::Rgb(72, 118, 196);
pub const SUCCESS: Color = Color::Rgb(96, 168, 112);
pub const ACCENT: Color = Color::Rgb(214, 168, 72);
pub const ERROR: Color = Color::Rgb(200, 72, 72);
pub const MUTED: Color = Color::Rgb(120, 124, 132);
pub const HIGHLIGHT: Color = Color::Rgb(40, 52, 76);
const STATUS_BG: Color = Color::Rgb(28, 32, 44);

// Styles
pub fn title_style() -> Style {
    Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn selected_style() -> Style {
    Style::default().bg(HIGHLIGHT).add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default().fg(Color::White)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn highlight_style() -> Style {
    Style::default().fg(ACCENT)
}

pub fn success_style() -> Style {
    Style::default().fg(SUCCESS)
}

pub fn error_style() -> Style {
    Style::default().fg(ERROR)
}

pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(PRIMARY)
    } else {
        Style::default().fg(MUTED)
    }
}

/// Text typed into the redirect prompt
pub fn input_style() -> Style {
    Style::default().fg(ACCENT)
}

pub fn status_bar_style() -> Style {
    Style::default().bg(STATUS_BG).fg(Color::White)
}

pub fn help_key_style() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    Style::default().fg(Color::White)
}
