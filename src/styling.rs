//! Minimal terminal styling.
//!
//! Follows the corpus convention of pre-built `anstyle` style constants
//! rendered through `anstream` (which auto-detects `NO_COLOR`/pipe status)
//! rather than reaching for a full TUI crate for what is, in this crate,
//! plain colored text.

use anstyle::{AnsiColor, Color, Style};

pub use anstream::{eprintln, println};

const fn fg(color: AnsiColor) -> Style {
    Style::new().fg_color(Some(Color::Ansi(color)))
}

pub const RESET: Style = Style::new();
pub const ERROR: Style = fg(AnsiColor::Red);
pub const WARNING: Style = fg(AnsiColor::Yellow);
pub const INFO: Style = fg(AnsiColor::Blue);
pub const SUCCESS: Style = fg(AnsiColor::Green);
pub const HINT: Style = fg(AnsiColor::Cyan);
pub const DIM: Style = Style::new().dimmed();

pub const ERROR_EMOJI: &str = "✗";
pub const WARNING_EMOJI: &str = "⚠";
pub const INFO_EMOJI: &str = "●";
pub const SUCCESS_EMOJI: &str = "✓";
pub const HINT_EMOJI: &str = "→";

pub fn success_message(msg: impl AsRef<str>) -> String {
    format!("{SUCCESS_EMOJI} {SUCCESS}{}{RESET}", msg.as_ref())
}

pub fn warning_message(msg: impl AsRef<str>) -> String {
    format!("{WARNING_EMOJI} {WARNING}{}{RESET}", msg.as_ref())
}

pub fn info_message(msg: impl AsRef<str>) -> String {
    format!("{INFO_EMOJI} {INFO}{}{RESET}", msg.as_ref())
}

pub fn hint_message(msg: impl AsRef<str>) -> String {
    format!("{HINT_EMOJI} {HINT}{}{RESET}", msg.as_ref())
}
