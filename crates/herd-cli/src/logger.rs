use std::{
    hash::{DefaultHasher, Hash, Hasher},
    io::{self, Stdout, Write},
};

use colored::{Color, Colorize};

/// Prefixed, colored console output for the CLI.
pub struct Logger<W: Write = Stdout> {
    output: W,
}

impl<W: Write> Logger<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    fn string_to_color(s: &str) -> Color {
        let colors = [
            Color::Green,
            Color::Blue,
            Color::Magenta,
            Color::Cyan,
            Color::BrightGreen,
            Color::BrightBlue,
            Color::BrightMagenta,
            Color::BrightCyan,
        ];

        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        let hash = hasher.finish();

        let idx = usize::try_from(hash).unwrap_or_default() % colors.len();
        colors[idx]
    }

    fn write_prefixed(&mut self, prefix: &str, message: &str) {
        for line in message.lines() {
            let _ = writeln!(self.output, "{prefix} {line}");
        }
    }

    /// Print `message` line by line under a `[source]` prefix whose color is
    /// stable per source.
    pub fn log(&mut self, source: &str, message: &str) {
        let prefix = format!("[{source}]")
            .color(Self::string_to_color(source))
            .to_string();
        self.write_prefixed(&prefix, message);
    }

    pub fn system(&mut self, message: &str) {
        let prefix = "[herd]".bold().to_string();
        self.write_prefixed(&prefix, message);
    }

    pub fn error(&mut self, message: &str) {
        let prefix = "[error]".color(Color::Red).to_string();
        self.write_prefixed(&prefix, message);
    }

    /// Print a line with no prefix.
    pub fn plain(&mut self, message: &str) {
        let _ = writeln!(self.output, "{message}");
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(io::stdout())
    }
}
