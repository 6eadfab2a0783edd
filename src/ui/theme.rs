//! Immutable styling for the terminal view.
//!
//! Constructed once at startup and passed by value into every render call;
//! nothing here is mutable shared state.

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy)]
pub struct ThemePalette {
    pub border: Color,
    pub accent: Color,
    pub success: Color,
    pub failure: Color,
    pub hint: Color,
    pub spinner: Color,
}

impl ThemePalette {
    /// Muted dark palette; low-saturation base with sparing accents.
    pub fn dark() -> Self {
        Self {
            border: Color::Rgb(59, 66, 97),     // #3b4261
            accent: Color::Rgb(122, 162, 247),  // #7aa2f7
            success: Color::Rgb(158, 206, 106), // #9ece6a
            failure: Color::Rgb(247, 118, 142), // #f7768e
            hint: Color::Rgb(105, 114, 158),    // #696e9e
            spinner: Color::Rgb(187, 154, 247), // #bb9af7
        }
    }

    pub fn title(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }
}
