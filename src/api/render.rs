//! Markdown to HTML for chat replies

use pulldown_cmark::{html, Event, Options, Parser};

/// Render a reply to HTML. Raw HTML in the source is shown as text, never
/// passed through.
pub fn to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_html_is_escaped() {
        let out = to_html("Hello <script>alert(1)</script>");
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_block_html_is_escaped() {
        let out = to_html("<div onclick=\"x()\">hi</div>");
        assert!(!out.contains("<div"));
    }

    #[test]
    fn test_tables_render() {
        let out = to_html("| A | B |\n|---|---|\n| 1 | 2 |\n");
        assert!(out.contains("<table>"));
        assert!(out.contains("<td>1</td>"));
    }

    #[test]
    fn test_escaped_user_text_stays_literal() {
        let out = to_html(&crate::reply::user_text("[x](javascript:alert(1))"));
        assert!(!out.contains("<a"));
    }
}
