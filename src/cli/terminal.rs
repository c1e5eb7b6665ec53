//! Coloured command output.

use std::{fmt::Display, sync::LazyLock};

use owo_colors::{OwoColorize, Style};

static COLOR: LazyLock<bool> =
    LazyLock::new(|| supports_color::on(supports_color::Stream::Stdout).is_some());

/// The styling of a line of command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Finished without problems.
    Success,
    /// Finished, but something needs attention.
    Warning,
    /// A problem that fails the command.
    Error,
    /// Routine detail, such as a skipped record.
    Muted,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Success => Style::new().green(),
            Self::Warning => Style::new().yellow(),
            Self::Error => Style::new().red().bold(),
            Self::Muted => Style::new().dimmed(),
        }
    }

    /// Render `text` in this tone, or plainly when the terminal has no
    /// colour support.
    pub fn paint(self, text: impl Display) -> String {
        self.paint_if(*COLOR, text)
    }

    fn paint_if(self, color: bool, text: impl Display) -> String {
        if color {
            text.style(self.style()).to_string()
        } else {
            text.to_string()
        }
    }
}
