//! Colored terminal output

use owo_colors::{Color, OwoColorize, colors::css};

/// Colors are used only when stdout is a terminal that supports them.
fn paint<C: Color>(text: &str) -> String {
    if supports_color::on(supports_color::Stream::Stdout).is_some() {
        text.fg::<C>().to_string()
    } else {
        text.to_string()
    }
}

/// Extension trait for colorizing output
pub trait Colorize {
    /// Color as success (green)
    fn success(&self) -> String;
    /// Color as warning (amber)
    fn warning(&self) -> String;
    /// Color as info (blue)
    fn info(&self) -> String;
}

impl Colorize for str {
    fn success(&self) -> String {
        paint::<css::Green>(self)
    }

    fn warning(&self) -> String {
        paint::<css::Orange>(self)
    }

    fn info(&self) -> String {
        paint::<css::LightBlue>(self)
    }
}

impl Colorize for String {
    fn success(&self) -> String {
        self.as_str().success()
    }

    fn warning(&self) -> String {
        self.as_str().warning()
    }

    fn info(&self) -> String {
        self.as_str().info()
    }
}
