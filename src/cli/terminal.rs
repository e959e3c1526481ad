//! Styling for command output.

use std::fmt::Display;

use owo_colors::{OwoColorize, colors::css};
use supports_color::Stream;

/// The styles command output is written with.
///
/// Color is decided once per stream, so render functions can be handed a
/// [`Palette::plain`] in tests and produce exact text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    color: bool,
}

impl Palette {
    /// Colored if standard output supports it.
    pub fn stdout() -> Self {
        Self {
            color: supports_color::on_cached(Stream::Stdout).is_some(),
        }
    }

    /// Never colored.
    pub const fn plain() -> Self {
        Self { color: false }
    }

    /// A device or value heading.
    pub fn title(self, text: impl Display) -> String {
        self.paint(text, |t| t.fg::<css::LightBlue>().bold().to_string())
    }

    /// A field name in front of a value.
    pub fn label(self, text: impl Display) -> String {
        self.paint(text, |t| t.dimmed().to_string())
    }

    /// A file that parsed.
    pub fn passed(self, text: impl Display) -> String {
        self.paint(text, |t| t.fg::<css::Green>().to_string())
    }

    /// A file that did not.
    pub fn failed(self, text: impl Display) -> String {
        self.paint(text, |t| t.fg::<css::OrangeRed>().to_string())
    }

    fn paint(self, text: impl Display, style: impl FnOnce(&str) -> String) -> String {
        let text = text.to_string();
        if self.color { style(&text) } else { text }
    }
}
