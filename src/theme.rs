//! Dark and light palettes

use ratatui::style::Color;

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub is_dark: bool,
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub border_focused: Color,
    pub accent: Color,
    pub user: Color,
    pub assistant: Color,
    pub inline_code: Color,
    pub code_background: Color,
    pub code_header: Color,
    pub selection: Color,
    pub success: Color,
    pub error: Color,
    /// Name of a theme in syntect's default theme set
    pub syntax_theme: &'static str,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            is_dark: true,
            background: Color::Rgb(33, 33, 33),
            text: Color::Rgb(236, 236, 236),
            muted: Color::Rgb(142, 142, 160),
            border: Color::Rgb(64, 64, 64),
            border_focused: Color::Rgb(16, 163, 127),
            accent: Color::Rgb(16, 163, 127),
            user: Color::Rgb(84, 54, 218),
            assistant: Color::Rgb(16, 163, 127),
            inline_code: Color::Rgb(255, 166, 87),
            code_background: Color::Rgb(26, 26, 26),
            code_header: Color::Rgb(45, 45, 45),
            selection: Color::Rgb(64, 64, 64),
            success: Color::Rgb(72, 185, 100),
            error: Color::Rgb(244, 67, 54),
            syntax_theme: "base16-ocean.dark",
        }
    }

    pub fn light() -> Self {
        Self {
            is_dark: false,
            background: Color::Rgb(255, 255, 255),
            text: Color::Rgb(0, 0, 0),
            muted: Color::Rgb(102, 102, 102),
            border: Color::Rgb(224, 224, 224),
            border_focused: Color::Rgb(16, 163, 127),
            accent: Color::Rgb(16, 163, 127),
            user: Color::Rgb(171, 104, 255),
            assistant: Color::Rgb(16, 163, 127),
            inline_code: Color::Rgb(207, 34, 46),
            code_background: Color::Rgb(246, 248, 250),
            code_header: Color::Rgb(232, 232, 232),
            selection: Color::Rgb(232, 232, 232),
            success: Color::Rgb(26, 127, 55),
            error: Color::Rgb(207, 34, 46),
            syntax_theme: "InspiredGitHub",
        }
    }

    pub fn from_dark_mode(dark: bool) -> Self {
        if dark {
            Self::dark()
        } else {
            Self::light()
        }
    }

    pub fn toggled(&self) -> Self {
        Self::from_dark_mode(!self.is_dark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_round_trips() {
        let dark = Theme::dark();
        let light = dark.toggled();
        assert!(!light.is_dark);
        assert_eq!(light.toggled(), dark);
    }
}
