use pulldown_cmark::{html, Options, Parser};

/// Converts markdown source into display markup
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, source: &str) -> String;
}

/// CommonMark renderer with the usual GitHub extensions
///
/// Soft line breaks stay newlines in the output; a single trailing newline
/// inside a paragraph never becomes a `<br>`.
#[derive(Debug, Clone)]
pub struct CommonMarkRenderer {
    options: Options,
}

impl Default for CommonMarkRenderer {
    fn default() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        Self { options }
    }
}

impl MarkdownRenderer for CommonMarkRenderer {
    fn render(&self, source: &str) -> String {
        let parser = Parser::new_ext(source, self.options);
        let mut markup = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut markup, parser);
        markup
    }
}
