//! Tolerant HTML helpers shared by both rich-text encodings.

use scraper::{ElementRef, Html, Node};

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "head", "title", "template"];

/// Elements that separate words when flattened to text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "br",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// Convert an HTML fragment into a single line of readable text.
///
/// The fragment is parsed leniently (unclosed tags, stray entities and bare
/// text are all accepted). Visible text is kept in document order, block
/// elements and `<br>` act as word separators, and every whitespace run
/// collapses to a single space.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut raw = String::with_capacity(html.len());
    collect_text(fragment.root_element(), &mut raw);

    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if HIDDEN_ELEMENTS.contains(&name) {
                    continue;
                }

                let is_block = BLOCK_ELEMENTS.contains(&name);
                if is_block {
                    out.push(' ');
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
                if is_block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Re-serialize an HTML fragment so that it stands alone as valid markup.
///
/// Unclosed elements are closed, stray `<` and `&` are escaped and
/// mis-nested tags are repaired the way a browser would repair them.
pub fn sanitize_fragment(markup: &str) -> String {
    Html::parse_fragment(markup).root_element().inner_html()
}
