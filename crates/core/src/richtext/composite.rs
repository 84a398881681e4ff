//! Composite rich text: a structured node tree rendered to standalone markup.

use serde::{Deserialize, Serialize};

use crate::error::RichTextDecodeError;
use crate::html::sanitize_fragment;

/// Decoded composite rich-text document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeDocument {
    #[serde(default)]
    pub content: Vec<CompositeNode>,
}

/// A single node of a composite document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CompositeNode {
    Paragraph {
        #[serde(default)]
        content: Vec<CompositeNode>,
    },
    Heading {
        level: u8,
        #[serde(default)]
        content: Vec<CompositeNode>,
    },
    Text {
        text: String,
        #[serde(default)]
        marks: Vec<Mark>,
    },
    HardBreak,
    BulletList {
        #[serde(default)]
        content: Vec<CompositeNode>,
    },
    OrderedList {
        #[serde(default)]
        content: Vec<CompositeNode>,
    },
    ListItem {
        #[serde(default)]
        content: Vec<CompositeNode>,
    },
    Link {
        href: String,
        #[serde(default)]
        content: Vec<CompositeNode>,
    },
    Table {
        #[serde(default)]
        content: Vec<CompositeNode>,
    },
    TableRow {
        #[serde(default)]
        content: Vec<CompositeNode>,
    },
    TableCell {
        #[serde(default)]
        content: Vec<CompositeNode>,
    },
    Image {
        src: String,
        #[serde(default)]
        alt: String,
    },
    HorizontalRule,
    /// Legacy markup embedded verbatim in the document.
    Html { markup: String },
}

/// Inline formatting applied to a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
}

impl Mark {
    fn tag(self) -> &'static str {
        match self {
            Mark::Bold => "b",
            Mark::Italic => "i",
            Mark::Underline => "u",
            Mark::Strike => "s",
            Mark::Code => "code",
        }
    }
}

impl CompositeDocument {
    /// Decode the raw composite item value.
    pub fn decode(raw: &serde_json::Value) -> Result<Self, RichTextDecodeError> {
        let document = CompositeDocument::deserialize(raw)
            .map_err(|e| RichTextDecodeError::Composite(e.to_string()))?;
        validate_nodes(&document.content)?;
        Ok(document)
    }

    /// Render the document as an XML-compatible HTML fragment.
    pub fn render_html(&self) -> String {
        let mut out = String::new();
        render_nodes(&self.content, &mut out);
        out
    }
}

fn validate_nodes(nodes: &[CompositeNode]) -> Result<(), RichTextDecodeError> {
    for node in nodes {
        match node {
            CompositeNode::Heading { level, content } => {
                if !(1..=6).contains(level) {
                    return Err(RichTextDecodeError::HeadingLevel(*level));
                }
                validate_nodes(content)?;
            }
            CompositeNode::Paragraph { content }
            | CompositeNode::BulletList { content }
            | CompositeNode::OrderedList { content }
            | CompositeNode::ListItem { content }
            | CompositeNode::Link { content, .. }
            | CompositeNode::Table { content }
            | CompositeNode::TableRow { content }
            | CompositeNode::TableCell { content } => validate_nodes(content)?,
            CompositeNode::Text { .. }
            | CompositeNode::HardBreak
            | CompositeNode::Image { .. }
            | CompositeNode::HorizontalRule
            | CompositeNode::Html { .. } => {}
        }
    }
    Ok(())
}

fn render_nodes(nodes: &[CompositeNode], out: &mut String) {
    for node in nodes {
        render_node(node, out);
    }
}

fn render_node(node: &CompositeNode, out: &mut String) {
    match node {
        CompositeNode::Paragraph { content } => wrap("p", content, out),
        CompositeNode::Heading { level, content } => wrap(&format!("h{level}"), content, out),
        CompositeNode::Text { text, marks } => {
            for mark in marks {
                out.push_str(&format!("<{}>", mark.tag()));
            }
            out.push_str(&html_escape::encode_text(text));
            for mark in marks.iter().rev() {
                out.push_str(&format!("</{}>", mark.tag()));
            }
        }
        CompositeNode::HardBreak => out.push_str("<br />"),
        CompositeNode::BulletList { content } => wrap("ul", content, out),
        CompositeNode::OrderedList { content } => wrap("ol", content, out),
        CompositeNode::ListItem { content } => wrap("li", content, out),
        CompositeNode::Link { href, content } => {
            out.push_str(&format!(
                "<a href=\"{}\">",
                html_escape::encode_double_quoted_attribute(href)
            ));
            render_nodes(content, out);
            out.push_str("</a>");
        }
        CompositeNode::Table { content } => wrap("table", content, out),
        CompositeNode::TableRow { content } => wrap("tr", content, out),
        CompositeNode::TableCell { content } => wrap("td", content, out),
        CompositeNode::Image { src, alt } => out.push_str(&format!(
            "<img src=\"{}\" alt=\"{}\" />",
            html_escape::encode_double_quoted_attribute(src),
            html_escape::encode_double_quoted_attribute(alt)
        )),
        CompositeNode::HorizontalRule => out.push_str("<hr />"),
        CompositeNode::Html { markup } => out.push_str(&sanitize_fragment(markup)),
    }
}

fn wrap(tag: &str, content: &[CompositeNode], out: &mut String) {
    out.push_str(&format!("<{tag}>"));
    render_nodes(content, out);
    out.push_str(&format!("</{tag}>"));
}
