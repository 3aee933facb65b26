//! Markdown to styled terminal lines
//!
//! Assistant replies go through `pulldown-cmark` (with the GitHub extensions
//! for tables, strikethrough and task lists). Fenced code blocks are
//! highlighted with `syntect` and get a header line with the language label
//! and the copy hint. User messages never go through here; they are shown
//! verbatim by [`literal_lines`].

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tracing::debug;

use crate::theme::Theme;

/// A fenced or indented code block found in a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    /// Raw block text, without the final newline
    pub code: String,
    /// Index of the header line within the owning [`RenderedMessage`]
    pub header_line: usize,
}

impl CodeBlock {
    pub fn label(&self) -> &str {
        self.language.as_deref().unwrap_or("code")
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderedMessage {
    pub lines: Vec<Line<'static>>,
    pub code_blocks: Vec<CodeBlock>,
}

/// Header line drawn above every code block
pub fn code_header(label: &str, theme: &Theme, selected: bool) -> Line<'static> {
    let (label_style, hint_style) = if selected {
        (
            Style::default()
                .bg(theme.accent)
                .fg(theme.background)
                .add_modifier(Modifier::BOLD),
            Style::default()
                .bg(theme.selection)
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        (
            Style::default().bg(theme.code_header).fg(theme.muted),
            Style::default().bg(theme.code_header).fg(theme.muted),
        )
    };

    Line::from(vec![
        Span::styled(format!(" {} ", label), label_style),
        Span::styled(" ⧉ copy (y) ", hint_style),
    ])
}

/// User text, shown as typed
pub fn literal_lines(text: &str, theme: &Theme) -> Vec<Line<'static>> {
    text.split('\n')
        .map(|line| {
            Line::from(Span::styled(
                line.trim_end_matches('\r').to_string(),
                Style::default().fg(theme.text),
            ))
        })
        .collect()
}

pub struct MarkdownRenderer {
    syntaxes: SyntaxSet,
    themes: ThemeSet,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            themes: ThemeSet::load_defaults(),
        }
    }

    pub fn render(&self, markdown: &str, theme: &Theme) -> RenderedMessage {
        let options =
            Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;

        let mut writer = Writer::new(self, theme);
        for event in Parser::new_ext(markdown, options) {
            writer.handle(event);
        }
        writer.finish()
    }

    fn highlight(&self, code: &str, language: Option<&str>, theme: &Theme) -> Vec<Line<'static>> {
        let gutter = Span::styled("  ", Style::default().bg(theme.code_background));
        let plain = Style::default().fg(theme.text).bg(theme.code_background);

        if code.is_empty() {
            return vec![Line::from(gutter)];
        }

        let syntax = language
            .and_then(|lang| self.syntaxes.find_syntax_by_token(lang))
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text());

        let Some(syntax_theme) = self.themes.themes.get(theme.syntax_theme) else {
            debug!(theme = theme.syntax_theme, "syntax theme not found");
            return code
                .split('\n')
                .map(|line| Line::from(vec![gutter.clone(), Span::styled(line.to_string(), plain)]))
                .collect();
        };

        let mut highlighter = HighlightLines::new(syntax, syntax_theme);
        let mut lines = Vec::new();

        for line in LinesWithEndings::from(code) {
            let mut spans = vec![gutter.clone()];
            match highlighter.highlight_line(line, &self.syntaxes) {
                Ok(ranges) => {
                    for (style, text) in ranges {
                        let text = text.trim_end_matches(['\n', '\r']);
                        if !text.is_empty() {
                            spans.push(Span::styled(text.to_string(), syntect_style(style, theme)));
                        }
                    }
                }
                Err(err) => {
                    debug!(error = %err, "highlighting failed");
                    spans.push(Span::styled(
                        line.trim_end_matches(['\n', '\r']).to_string(),
                        plain,
                    ));
                }
            }
            lines.push(Line::from(spans));
        }

        lines
    }
}

fn syntect_style(style: syntect::highlighting::Style, theme: &Theme) -> Style {
    let fg = style.foreground;
    let mut out = Style::default()
        .fg(ratatui::style::Color::Rgb(fg.r, fg.g, fg.b))
        .bg(theme.code_background);
    if style.font_style.contains(FontStyle::BOLD) {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    out
}

/// Event sink that accumulates lines while walking the parser output
struct Writer<'a> {
    renderer: &'a MarkdownRenderer,
    theme: &'a Theme,
    lines: Vec<Line<'static>>,
    code_blocks: Vec<CodeBlock>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    // None = bullet list, Some(n) = next number of an ordered list
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    code: Option<(Option<String>, String)>,
    link: Option<String>,
}

impl<'a> Writer<'a> {
    fn new(renderer: &'a MarkdownRenderer, theme: &'a Theme) -> Self {
        Self {
            renderer,
            theme,
            lines: Vec::new(),
            code_blocks: Vec::new(),
            current: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            code: None,
            link: None,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| Style::default().fg(self.theme.text))
    }

    fn push_style(&mut self, modifier: Modifier) {
        let style = self.style().add_modifier(modifier);
        self.styles.push(style);
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn text(&mut self, text: impl Into<String>) {
        let style = self.style();
        self.current.push(Span::styled(text.into(), style));
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut spans = std::mem::take(&mut self.current);
        if self.quote_depth > 0 {
            spans.insert(
                0,
                Span::styled("│ ".repeat(self.quote_depth), Style::default().fg(self.theme.muted)),
            );
        }
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some((_, code)) = self.code.as_mut() {
                    code.push_str(&text);
                } else {
                    self.text(text.into_string());
                }
            }
            Event::Code(code) => {
                let style = Style::default().fg(self.theme.inline_code);
                self.current.push(Span::styled(code.into_string(), style));
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                self.text(html.trim_end_matches('\n').to_string());
            }
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(40),
                    Style::default().fg(self.theme.muted),
                )));
                self.blank();
            }
            Event::TaskListMarker(checked) => {
                self.text(if checked { "[x] " } else { "[ ] " });
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                let mut style = self
                    .style()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD);
                if level == HeadingLevel::H1 {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                self.styles.push(style);
            }
            Tag::BlockQuote => {
                self.flush();
                self.quote_depth += 1;
                let style = self
                    .style()
                    .fg(self.theme.muted)
                    .add_modifier(Modifier::ITALIC);
                self.styles.push(style);
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .filter(|lang| !lang.is_empty())
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}• ", indent),
                };
                self.current
                    .push(Span::styled(marker, Style::default().fg(self.theme.accent)));
            }
            Tag::Emphasis => self.push_style(Modifier::ITALIC),
            Tag::Strong => self.push_style(Modifier::BOLD),
            Tag::Strikethrough => self.push_style(Modifier::CROSSED_OUT),
            Tag::Link { dest_url, .. } => {
                let style = self
                    .style()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::UNDERLINED);
                self.styles.push(style);
                self.link = Some(dest_url.into_string());
            }
            Tag::Table(_) => self.flush(),
            Tag::TableHead => self.push_style(Modifier::BOLD),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.blank(),
            TagEnd::Heading(_) => {
                self.pop_style();
                self.blank();
            }
            TagEnd::BlockQuote => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.pop_style();
                self.blank();
            }
            TagEnd::CodeBlock => {
                if let Some((language, code)) = self.code.take() {
                    self.code_block(language, code);
                }
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::Link => {
                self.pop_style();
                if let Some(url) = self.link.take().filter(|url| !url.is_empty()) {
                    self.current.push(Span::styled(
                        format!(" ({})", url),
                        Style::default().fg(self.theme.muted),
                    ));
                }
            }
            TagEnd::TableCell => {
                self.current
                    .push(Span::styled(" │ ", Style::default().fg(self.theme.muted)));
            }
            TagEnd::TableHead => {
                self.pop_style();
                self.flush();
            }
            TagEnd::TableRow => self.flush(),
            TagEnd::Table => self.blank(),
            _ => {}
        }
    }

    fn code_block(&mut self, language: Option<String>, mut code: String) {
        if code.ends_with('\n') {
            code.pop();
        }

        let header_line = self.lines.len();
        let label = language.as_deref().unwrap_or("code");
        self.lines.push(code_header(label, self.theme, false));
        let body = self.renderer.highlight(&code, language.as_deref(), self.theme);
        self.lines.extend(body);
        self.lines.push(Line::default());

        self.code_blocks.push(CodeBlock {
            language,
            code,
            header_line,
        });
    }

    fn finish(mut self) -> RenderedMessage {
        self.flush();
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        RenderedMessage {
            lines: self.lines,
            code_blocks: self.code_blocks,
        }
    }
}
