use crate::domain::model::Attachment;
use scraper::{ElementRef, Html, Node};

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "body", "dd", "div", "dl", "dt", "footer", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section", "table", "tbody",
    "thead", "tfoot", "tr", "ul",
];
const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "title", "template"];

fn push_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                // 連續空白視為一個空格，換行只來自標籤
                if text.starts_with(char::is_whitespace) {
                    out.push(' ');
                }
                out.push_str(&text.split_whitespace().collect::<Vec<_>>().join(" "));
                if text.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
            }
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                match name {
                    "br" => out.push('\n'),
                    "td" | "th" => out.push(' '),
                    _ => {}
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push_str("\n\n");
                }
                push_text(child_el, out);
                if block {
                    out.push_str("\n\n");
                }
            }
            _ => {}
        }
    }
}

/// Trims every line and keeps at most one blank line between blocks.
fn tidy_lines(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.split('\n') {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Visible text of an HTML document. `<br>` ends a line and block elements
/// such as paragraphs and table rows are separated by a blank line, so line
/// oriented extractors see the same layout as a reader would.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    push_text(document.root_element(), &mut raw);
    tidy_lines(&raw)
}

/// Text content of a non-tabular attachment. Unsupported types yield "".
pub fn attachment_text(attachment: &Attachment) -> String {
    match attachment.extension().as_str() {
        "html" | "htm" => html_to_text(&String::from_utf8_lossy(&attachment.data)),
        "txt" | "text" => String::from_utf8_lossy(&attachment.data).into_owned(),
        other => {
            tracing::debug!(
                "No text parser for attachment {} (.{})",
                attachment.filename,
                other
            );
            String::new()
        }
    }
}
