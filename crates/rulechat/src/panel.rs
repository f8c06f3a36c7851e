//! Boxed, markdown-formatted replies.

use std::env;
use std::io::{self, IsTerminal, Stdout, Write};

use owo_colors::{OwoColorize, Style};
use rulechat_core::Render;

use crate::markdown::{self, Look, Span};

/// Total width of a panel, borders included.
pub const PANEL_WIDTH: usize = 80;
const INNER_WIDTH: usize = PANEL_WIDTH - 4;
const ACCENT: (u8, u8, u8) = (32, 178, 170);

/// Lays out `text` in a panel.
///
/// Literal `\n` sequences (as models tend to emit inside JSON strings) are
/// turned into line breaks first. Escape codes are only emitted when `color`
/// is set, the layout is the same either way.
pub fn render_panel(text: &str, color: bool) -> String {
    let text = text.replace("\\n", "\n");
    let border = |s: &str| paint(s, border_style(), color);
    let horizontal = "─".repeat(PANEL_WIDTH - 2);

    let mut out = String::from("\n");
    out.push_str(&border(&format!("╭{horizontal}╮")));
    out.push('\n');
    for line in markdown::to_lines(&text) {
        for row in markdown::wrap(&line, INNER_WIDTH) {
            let used = row.iter().map(Span::width).sum::<usize>();
            out.push_str(&border("│"));
            out.push(' ');
            for span in &row {
                out.push_str(&paint(&span.text, style(span.look), color));
            }
            out.push_str(&" ".repeat(INNER_WIDTH.saturating_sub(used)));
            out.push(' ');
            out.push_str(&border("│"));
            out.push('\n');
        }
    }
    out.push_str(&border(&format!("╰{horizontal}╯")));
    out.push_str("\n\n");
    out
}

#[inline]
fn border_style() -> Style {
    Style::new().truecolor(ACCENT.0, ACCENT.1, ACCENT.2)
}

fn style(look: Look) -> Style {
    let mut style = Style::new();
    if look.bold {
        style = style.bold();
    }
    if look.italic {
        style = style.italic();
    }
    if look.underline {
        style = style.underline();
    }
    if look.strike {
        style = style.strikethrough();
    }
    if look.accent {
        style = style.truecolor(ACCENT.0, ACCENT.1, ACCENT.2);
    }
    if look.dim {
        style = style.dimmed();
    }
    style
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        format!("{}", text.style(style))
    } else {
        text.to_owned()
    }
}

/// A [`Render`] that writes panels to a writer.
pub struct PanelRenderer<W> {
    writer: W,
    color: bool,
}

impl<W: Write> PanelRenderer<W> {
    /// Creates a renderer writing to `writer`, with escape codes if `color`
    /// is set.
    #[inline]
    pub fn new(writer: W, color: bool) -> Self {
        Self { writer, color }
    }

    /// Unwraps the writer.
    #[inline]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl PanelRenderer<Stdout> {
    /// Writes to stdout, in colour if stdout is a terminal and `NO_COLOR` is
    /// not set.
    pub fn stdout() -> Self {
        let stdout = io::stdout();
        let color = stdout.is_terminal()
            && env::var_os("NO_COLOR").is_none_or(|value| value.is_empty());
        Self::new(stdout, color)
    }
}

impl<W: Write> Render for PanelRenderer<W> {
    fn render(&mut self, text: &str) {
        let panel = render_panel(text, self.color);
        let written = self
            .writer
            .write_all(panel.as_bytes())
            .and_then(|_| self.writer.flush());
        if let Err(err) = written {
            warn!("failed to write panel, falling back to plain text: {err}");
            let plain = text.replace("\\n", "\n");
            if let Err(err) = writeln!(self.writer, "{plain}") {
                error!("failed to write reply: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use unicode_width::UnicodeWidthStr;

    use super::*;

    fn content_rows(panel: &str) -> Vec<&str> {
        let lines = panel.lines().collect::<Vec<_>>();
        // Blank line, top border, rows, bottom border, blank line.
        lines[2..lines.len() - 2].to_vec()
    }

    #[test]
    fn test_layout() {
        let panel = render_panel("Hello", false);
        assert!(panel.starts_with("\n╭"));
        assert!(panel.ends_with("╯\n\n"));
        for line in panel.lines().filter(|line| !line.is_empty()) {
            assert_eq!(line.width(), PANEL_WIDTH, "{line:?}");
        }
        assert_eq!(
            content_rows(&panel),
            [format!("│ Hello{} │", " ".repeat(71))]
        );
    }

    #[test]
    fn test_escaped_and_real_line_breaks() {
        for text in ["Hello\\nWorld", "Hello\nWorld"] {
            let panel = render_panel(text, false);
            let rows = content_rows(&panel);
            assert_eq!(rows.len(), 2);
            assert!(rows[0].starts_with("│ Hello "));
            assert!(rows[1].starts_with("│ World "));
        }
    }

    #[test]
    fn test_long_text_is_wrapped() {
        let text = "lorem ipsum ".repeat(30);
        let panel = render_panel(&text, false);
        let rows = content_rows(&panel);
        assert!(rows.len() > 1);
        for row in rows {
            assert_eq!(row.width(), PANEL_WIDTH);
        }
    }

    #[test]
    fn test_color_is_optional() {
        let text = "# Title\n\nSome **bold** text";
        assert!(!render_panel(text, false).contains('\x1b'));
        let colored = render_panel(text, true);
        assert!(colored.contains('\x1b'));
        assert_eq!(colored, render_panel(text, true));
    }

    #[test]
    fn test_renderer_writes_panel() {
        let mut renderer = PanelRenderer::new(Vec::new(), false);
        renderer.render("Hi");
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(output, render_panel("Hi", false));
    }

    /// Rejects writes larger than a few bytes.
    struct Narrow(Vec<u8>);

    impl Write for Narrow {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() > 16 {
                return Err(io::Error::other("too large"));
            }
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_renderer_falls_back_to_plain_text() {
        let mut renderer = PanelRenderer::new(Narrow(Vec::new()), false);
        renderer.render("Hi\\nthere");
        let output = String::from_utf8(renderer.into_inner().0).unwrap();
        assert_eq!(output, "Hi\nthere\n");
    }
}
