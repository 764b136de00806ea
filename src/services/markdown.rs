//! Markdown rendering
//!
//! Blog content is written in Markdown and rendered with pulldown-cmark.
//! Raw HTML in the source is escaped, never passed through, so post bodies
//! cannot inject markup or scripts.
//!
//! ```
//! use leafblog::services::markdown::MarkdownRenderer;
//!
//! let html = MarkdownRenderer::new().render("# Hello\n\n<script>x</script>");
//! assert!(html.contains("<h1>"));
//! assert!(!html.contains("<script>"));
//! ```

use pulldown_cmark::{html, Event, Options, Parser};

/// Thread-safe Markdown to HTML renderer
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    /// Renderer with tables, strikethrough, task lists and footnotes enabled
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);
        Self { options }
    }

    /// Render Markdown to HTML
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }

    /// Plain-text excerpt of at most `max_chars` characters, for listings
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, self.options) {
            match event {
                Event::Text(t) | Event::Code(t) | Event::Html(t) | Event::InlineHtml(t) => {
                    text.push_str(&t)
                }
                Event::SoftBreak | Event::HardBreak | Event::End(_) => text.push(' '),
                _ => {}
            }
        }
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= max_chars {
            collapsed
        } else {
            let cut: String = collapsed.chars().take(max_chars).collect();
            format!("{}…", cut.trim_end())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let html = MarkdownRenderer::new().render("# Title\n\nSome **bold** text.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn test_render_escapes_raw_html() {
        let renderer = MarkdownRenderer::new();
        let block = renderer.render("<script>alert(1)</script>");
        assert!(!block.contains("<script>"));
        assert!(block.contains("&lt;script&gt;"));

        let inline = renderer.render("hi <img src=x onerror=alert(1)> there");
        assert!(!inline.contains("<img"));
    }

    #[test]
    fn test_render_tables() {
        let html = MarkdownRenderer::new().render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_excerpt_strips_markup_and_truncates() {
        let renderer = MarkdownRenderer::new();
        assert_eq!(renderer.excerpt("# Title\n\nBody *text*", 100), "Title Body text");

        let long = renderer.excerpt(&"word ".repeat(50), 12);
        assert!(long.ends_with('…'));
        assert!(long.chars().count() <= 13);
    }
}
