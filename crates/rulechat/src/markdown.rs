//! Markdown to styled, wrapped lines.
//!
//! [`to_lines`] walks the `pulldown-cmark` event stream and produces logical
//! lines with their prefixes (quote gutters, list markers). [`wrap`] then
//! breaks one logical line into rows that fit a given width. Neither knows
//! about escape codes, see `panel` for that.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const BULLETS: [char; 3] = ['•', '◦', '▪'];
const GUTTER: &str = "▌ ";
const CODE_INDENT: &str = "  ";

/// Text attributes of a span.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Look {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub accent: bool,
    pub dim: bool,
}

impl Look {
    const ACCENT: Look = Look {
        bold: false,
        italic: false,
        underline: false,
        strike: false,
        accent: true,
        dim: false,
    };

    const DIM: Look = Look {
        bold: false,
        italic: false,
        underline: false,
        strike: false,
        accent: false,
        dim: true,
    };
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub look: Look,
}

impl Span {
    #[inline]
    fn new(text: impl Into<String>, look: Look) -> Self {
        Self {
            text: text.into(),
            look,
        }
    }

    #[inline]
    fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Look::default())
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.text.width()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// Word-wrapped text.
    Text,
    /// Code, hard-split instead of wrapped.
    Verbatim,
    /// A horizontal rule spanning the whole width.
    Rule,
}

/// One logical line, before wrapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    /// Printed before the first row.
    pub lead: Vec<Span>,
    /// Printed before every following row.
    pub hang: Vec<Span>,
    pub spans: Vec<Span>,
}

impl Line {
    fn blank() -> Self {
        Self {
            kind: LineKind::Text,
            lead: vec![],
            hang: vec![],
            spans: vec![],
        }
    }

    fn is_blank(&self) -> bool {
        self.kind == LineKind::Text
            && self.spans.iter().all(|span| span.text.trim().is_empty())
    }
}

/// Parses `markdown` into logical lines. Always returns at least one line.
pub fn to_lines(markdown: &str) -> Vec<Line> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut builder = Builder::default();
    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(tag) => builder.start(tag),
            Event::End(_) => {
                if let Some(open) = builder.open.pop() {
                    builder.end(open);
                }
            }
            Event::Text(text) => builder.text(&text),
            Event::Code(code) => builder.code(&code),
            Event::SoftBreak | Event::HardBreak => builder.flush(),
            Event::Rule => builder.rule(),
            Event::Html(html) | Event::InlineHtml(html) => builder.html(&html),
            Event::TaskListMarker(done) => {
                let look = builder.look();
                builder.push(if done { "[x] " } else { "[ ] " }, look);
            }
            _ => {}
        }
    }
    builder.finish()
}

/// Breaks a logical line into rows no wider than `width` columns, prefixes
/// included.
pub fn wrap(line: &Line, width: usize) -> Vec<Vec<Span>> {
    if line.kind == LineKind::Rule {
        return vec![vec![Span::new("─".repeat(width), Look::DIM)]];
    }

    let mut rows = Rows::new(line, width);
    let cells = line
        .spans
        .iter()
        .flat_map(|span| span.text.chars().map(|ch| (ch, span.look)))
        .collect::<Vec<_>>();

    if line.kind == LineKind::Verbatim {
        for &(ch, look) in &cells {
            rows.put_split(ch, look);
        }
        return rows.finish();
    }

    let mut last_look = None;
    for word in cells
        .split(|(ch, _)| ch.is_whitespace())
        .filter(|word| !word.is_empty())
    {
        let word_width =
            word.iter().map(|&(ch, _)| char_width(ch)).sum::<usize>();
        let first_look = word[0].1;
        if !rows.fresh {
            if rows.used + 1 + word_width <= width {
                let look = match last_look {
                    Some(look) if look == first_look => look,
                    _ => Look::default(),
                };
                rows.put(' ', look);
            } else {
                rows.break_row();
            }
        }
        for &(ch, look) in word {
            rows.put_split(ch, look);
        }
        last_look = word.last().map(|&(_, look)| look);
    }
    rows.finish()
}

#[inline]
fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

/// Cuts `prefix` down to at most `max` columns.
fn clip(prefix: &[Span], max: usize) -> Vec<Span> {
    let mut clipped = vec![];
    let mut used = 0;
    for span in prefix {
        let mut text = String::new();
        for ch in span.text.chars() {
            used += char_width(ch);
            if used > max {
                break;
            }
            text.push(ch);
        }
        if !text.is_empty() {
            clipped.push(Span::new(text, span.look));
        }
        if used > max {
            break;
        }
    }
    clipped
}

struct Rows {
    hang: Vec<Span>,
    width: usize,
    rows: Vec<Vec<Span>>,
    row: Vec<Span>,
    used: usize,
    /// Nothing but the prefix on the current row.
    fresh: bool,
}

impl Rows {
    fn new(line: &Line, width: usize) -> Self {
        // Prefixes never take more than half of the row.
        let lead = clip(&line.lead, width / 2);
        Self {
            hang: clip(&line.hang, width / 2),
            width,
            rows: vec![],
            used: lead.iter().map(Span::width).sum(),
            row: lead,
            fresh: true,
        }
    }

    fn break_row(&mut self) {
        let row = std::mem::replace(&mut self.row, self.hang.clone());
        self.rows.push(row);
        self.used = self.hang.iter().map(Span::width).sum();
        self.fresh = true;
    }

    fn put(&mut self, ch: char, look: Look) {
        match self.row.last_mut() {
            Some(span) if span.look == look => span.text.push(ch),
            _ => self.row.push(Span::new(ch, look)),
        }
        self.used += char_width(ch);
        self.fresh = false;
    }

    /// Like `put`, but starts a new row first if `ch` does not fit.
    fn put_split(&mut self, ch: char, look: Look) {
        if !self.fresh && self.used + char_width(ch) > self.width {
            self.break_row();
        }
        self.put(ch, look);
    }

    fn finish(mut self) -> Vec<Vec<Span>> {
        self.rows.push(self.row);
        self.rows
    }
}

enum Open {
    Block,
    Heading,
    BlockQuote,
    CodeBlock,
    List,
    Item,
    Emphasis,
    Strong,
    Strikethrough,
    Link(String),
    Other,
}

struct ListState {
    next: Option<u64>,
    marker_width: usize,
}

#[derive(Default)]
struct Builder {
    lines: Vec<Line>,
    spans: Vec<Span>,
    open: Vec<Open>,
    lists: Vec<ListState>,
    marker: Option<String>,
    quotes: usize,
    heading: Option<HeadingLevel>,
    code_block: bool,
    italic: usize,
    bold: usize,
    strike: usize,
    links: usize,
    link_text: String,
}

impl Builder {
    fn look(&self) -> Look {
        Look {
            bold: self.bold > 0 || self.heading.is_some(),
            italic: self.italic > 0,
            underline: self.links > 0 || self.heading == Some(HeadingLevel::H1),
            strike: self.strike > 0,
            ..Default::default()
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let open = match tag {
            Tag::Paragraph | Tag::HtmlBlock => {
                self.gap();
                Open::Block
            }
            Tag::Heading { level, .. } => {
                self.gap();
                self.heading = Some(level);
                Open::Heading
            }
            Tag::BlockQuote(..) => {
                self.gap();
                self.quotes += 1;
                Open::BlockQuote
            }
            Tag::CodeBlock(_) => {
                self.gap();
                self.code_block = true;
                Open::CodeBlock
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.gap();
                } else {
                    self.flush();
                }
                self.lists.push(ListState {
                    next: start,
                    marker_width: 0,
                });
                Open::List
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len();
                if let Some(list) = self.lists.last_mut() {
                    let marker = match &mut list.next {
                        Some(next) => {
                            let marker = format!("{next}. ");
                            *next += 1;
                            marker
                        }
                        None => {
                            let bullet = BULLETS[(depth - 1) % BULLETS.len()];
                            format!("{bullet} ")
                        }
                    };
                    list.marker_width = marker.width();
                    self.marker = Some(marker);
                }
                Open::Item
            }
            Tag::Emphasis => {
                self.italic += 1;
                Open::Emphasis
            }
            Tag::Strong => {
                self.bold += 1;
                Open::Strong
            }
            Tag::Strikethrough => {
                self.strike += 1;
                Open::Strikethrough
            }
            Tag::Link { dest_url, .. } => {
                self.links += 1;
                self.link_text.clear();
                Open::Link(dest_url.into_string())
            }
            _ => Open::Other,
        };
        self.open.push(open);
    }

    fn end(&mut self, open: Open) {
        match open {
            Open::Block | Open::Item => self.flush(),
            Open::Heading => {
                self.flush();
                self.heading = None;
            }
            Open::BlockQuote => {
                self.flush();
                self.quotes = self.quotes.saturating_sub(1);
            }
            Open::CodeBlock => self.code_block = false,
            Open::List => {
                self.flush();
                self.lists.pop();
            }
            Open::Emphasis => self.italic = self.italic.saturating_sub(1),
            Open::Strong => self.bold = self.bold.saturating_sub(1),
            Open::Strikethrough => {
                self.strike = self.strike.saturating_sub(1);
            }
            Open::Link(url) => {
                self.links = self.links.saturating_sub(1);
                // Autolinks already show their target.
                if !url.is_empty() && self.link_text != url {
                    self.push(format!(" ({url})"), Look::DIM);
                }
            }
            Open::Other => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.code_block {
            for line in text.lines() {
                self.verbatim(line);
            }
            return;
        }
        if self.links > 0 {
            self.link_text.push_str(text);
        }
        let look = self.look();
        self.push(text, look);
    }

    fn code(&mut self, code: &str) {
        if self.links > 0 {
            self.link_text.push_str(code);
        }
        let look = Look {
            accent: true,
            ..self.look()
        };
        self.push(code, look);
    }

    fn html(&mut self, html: &str) {
        for (idx, line) in html.lines().enumerate() {
            if idx > 0 {
                self.flush();
            }
            self.push(line, Look::default());
        }
    }

    fn rule(&mut self) {
        self.gap();
        self.lines.push(Line {
            kind: LineKind::Rule,
            ..Line::blank()
        });
    }

    fn push(&mut self, text: impl AsRef<str>, look: Look) {
        let text = text.as_ref();
        match self.spans.last_mut() {
            Some(span) if span.look == look => span.text.push_str(text),
            _ => self.spans.push(Span::new(text, look)),
        }
    }

    fn verbatim(&mut self, line: &str) {
        let (mut lead, mut hang) = self.prefixes();
        lead.push(Span::plain(CODE_INDENT));
        hang.push(Span::plain(CODE_INDENT));
        self.lines.push(Line {
            kind: LineKind::Verbatim,
            lead,
            hang,
            spans: vec![Span::new(line.replace('\t', "    "), Look::ACCENT)],
        });
    }

    /// Ends the current logical line.
    fn flush(&mut self) {
        if self.spans.is_empty() && self.marker.is_none() {
            return;
        }
        let (lead, hang) = self.prefixes();
        let spans = std::mem::take(&mut self.spans);
        self.lines.push(Line {
            kind: LineKind::Text,
            lead,
            hang,
            spans,
        });
    }

    /// Separates top-level blocks with one blank line.
    fn gap(&mut self) {
        // A pending list marker goes on the item's first block.
        if self.marker.is_some() && self.spans.is_empty() {
            return;
        }
        self.flush();
        if !self.lists.is_empty() {
            return;
        }
        if self.lines.last().is_some_and(|line| !line.is_blank()) {
            self.lines.push(Line::blank());
        }
    }

    fn prefixes(&mut self) -> (Vec<Span>, Vec<Span>) {
        let mut lead = vec![];
        if self.quotes > 0 {
            lead.push(Span::new(GUTTER.repeat(self.quotes), Look::DIM));
        }
        let mut hang = lead.clone();

        if let Some(depth) = self.lists.len().checked_sub(1) {
            let indent = "  ".repeat(depth);
            let marker_width =
                self.lists.last().map_or(0, |list| list.marker_width);
            let padding = format!("{indent}{}", " ".repeat(marker_width));
            match self.marker.take() {
                Some(marker) => {
                    if !indent.is_empty() {
                        lead.push(Span::plain(indent));
                    }
                    lead.push(Span::new(marker, Look::ACCENT));
                }
                None => lead.push(Span::plain(padding.clone())),
            }
            hang.push(Span::plain(padding));
        }
        (lead, hang)
    }

    fn finish(mut self) -> Vec<Line> {
        self.flush();
        while self.lines.last().is_some_and(Line::is_blank) {
            self.lines.pop();
        }
        if self.lines.is_empty() {
            self.lines.push(Line::blank());
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_text(row: &[Span]) -> String {
        row.iter().map(|span| span.text.as_str()).collect()
    }

    fn render(markdown: &str, width: usize) -> Vec<String> {
        to_lines(markdown)
            .iter()
            .flat_map(|line| wrap(line, width))
            .map(|row| row_text(&row))
            .collect()
    }

    #[test]
    fn test_paragraphs_and_breaks() {
        assert_eq!(
            render("one\ntwo\n\nthree", 40),
            ["one", "two", "", "three"]
        );
        assert_eq!(render("", 40), [""]);
    }

    #[test]
    fn test_heading_and_inline_styles() {
        let lines =
            to_lines("# Title\n\nSome *soft* and **loud** ~~gone~~ `code`.");
        assert_eq!(lines.len(), 3);
        let title = &lines[0].spans[0];
        assert!(title.look.bold && title.look.underline);

        let looks = lines[2]
            .spans
            .iter()
            .map(|span| (span.text.as_str(), span.look))
            .collect::<Vec<_>>();
        assert!(looks.contains(&(
            "soft",
            Look {
                italic: true,
                ..Default::default()
            }
        )));
        assert!(looks.contains(&(
            "loud",
            Look {
                bold: true,
                ..Default::default()
            }
        )));
        assert!(looks.contains(&(
            "gone",
            Look {
                strike: true,
                ..Default::default()
            }
        )));
        assert!(looks.contains(&("code", Look::ACCENT)));
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            render(
                "Intro\n\n- one\n- two\n  - nested\n\n1. first\n2. second",
                40
            ),
            [
                "Intro",
                "",
                "• one",
                "• two",
                "  ◦ nested",
                "",
                "1. first",
                "2. second"
            ]
        );
    }

    #[test]
    fn test_loose_lists() {
        assert_eq!(render("- a\n\n- b", 40), ["• a", "• b"]);
        assert_eq!(
            render("1. Pick a GPU\n\n2. Pick a CPU", 40),
            ["1. Pick a GPU", "2. Pick a CPU"]
        );
        assert_eq!(
            render("- **GPU**\n\n  Most of the budget.\n\n- CPU", 40),
            ["• GPU", "  Most of the budget.", "• CPU"]
        );
    }

    #[test]
    fn test_deep_nesting_stays_in_width() {
        let quoted = format!("{} deep", ">".repeat(45));
        let rows = render(&quoted, 20);
        for row in &rows {
            assert!(row.width() <= 20, "{row:?} is too wide");
        }
        assert!(rows.concat().contains("deep"));

        let mut nested = String::new();
        for depth in 0..20 {
            let indent = "  ".repeat(depth);
            nested.push_str(&format!("{indent}- level {depth}\n"));
        }
        for row in render(&nested, 20) {
            assert!(row.width() <= 20, "{row:?} is too wide");
        }
    }

    #[test]
    fn test_quote_link_and_rule() {
        assert_eq!(render("> quoted", 40), ["▌ quoted"]);
        assert_eq!(
            render("See [docs](https://x.io) or <https://y.io>", 40),
            ["See docs (https://x.io) or https://y.io"]
        );
        assert_eq!(
            render("a\n\n---\n\nb", 5),
            ["a", "", "─────", "", "b"]
        );
    }

    #[test]
    fn test_word_wrap_keeps_hanging_indent() {
        assert_eq!(render("aaa bbb ccc", 7), ["aaa bbb", "ccc"]);
        assert_eq!(render("- aaa bbb ccc", 9), ["• aaa bbb", "  ccc"]);
        assert_eq!(render("abcdefghij", 4), ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_code_block_is_hard_split() {
        assert_eq!(
            render("```\nfn main() {}\n\nxxxxxxxxxx\n```", 6),
            ["  fn m", "  ain(", "  ) {}", "  ", "  xxxx", "  xxxx", "  xx"]
        );
    }

    #[test]
    fn test_wide_characters() {
        for row in render("你好世界 你好世界", 8) {
            assert!(row.width() <= 8, "{row:?} is too wide");
        }
    }
}
