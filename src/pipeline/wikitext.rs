//! Wikitext emission.
//!
//! Block nodes each start with their own separator (`\n\n` for paragraphs,
//! headings and tables, `\n` for list items), so the output is simply the
//! concatenation of the rendered blocks. Runs of blank lines that result
//! from adjacent separators are collapsed later by
//! [`crate::pipeline::postprocess`].
//!
//! Tables use the compact form: header cells one per line (`! text`), each
//! data row as `|-` followed by `| a || b`. A cell spanning N columns gets a
//! `colspan="N" | ` prefix. Cell text is single-line; paragraphs inside a
//! cell are joined with spaces.

use crate::document::{wrap_block, EmphasisKind, ImageRef, Node};
use crate::error::ConversionWarning;
use tracing::warn;

/// Render a document body.
pub fn render_wikitext(body: &[Node]) -> (String, Vec<ConversionWarning>) {
    let mut renderer = Renderer::default();
    let mut out = String::new();
    for node in body {
        renderer.block(node, &mut out);
    }
    (out, renderer.warnings)
}

#[derive(Default)]
struct Renderer {
    tables: usize,
    warnings: Vec<ConversionWarning>,
}

impl Renderer {
    fn block(&mut self, node: &Node, out: &mut String) {
        match node {
            Node::Paragraph { children } => {
                out.push_str("\n\n");
                out.push_str(&wrap_block(&inline(children)));
            }
            Node::Heading { level, children } => {
                let marks = "=".repeat(usize::from(*level));
                out.push_str("\n\n");
                out.push_str(&marks);
                out.push_str(&wrap_block(&inline(children)));
                out.push_str(&marks);
            }
            Node::ListItem {
                ordered,
                depth,
                children,
            } => {
                let marker = if *ordered { "#" } else { "*" };
                out.push('\n');
                out.push_str(&marker.repeat(usize::from(*depth) + 1));
                out.push(' ');
                out.push_str(&wrap_block(&inline(children)));
            }
            Node::Table { rows } => self.table(rows, out),
            // Inline content at block level; the loader never produces it,
            // but later stages may.
            other => out.push_str(&inline(std::slice::from_ref(other))),
        }
    }

    fn table(&mut self, rows: &[Node], out: &mut String) {
        self.tables += 1;

        let mut headers = Vec::new();
        let mut data_rows: Vec<Vec<String>> = Vec::new();
        for row in rows {
            let mut data = Vec::new();
            for cell in row.children() {
                if let Node::TableCell {
                    colspan,
                    is_header,
                    children,
                } = cell
                {
                    let token = cell_token(*colspan, children);
                    if *is_header {
                        headers.push(token);
                    } else {
                        data.push(token);
                    }
                }
            }
            if !data.is_empty() {
                data_rows.push(data);
            }
        }

        if headers.is_empty() {
            warn!("Table {} has no header row", self.tables);
            self.warnings
                .push(ConversionWarning::MalformedTable { table: self.tables });
        }

        let mut lines = vec!["\n\n{| class=\"wikitable\"".to_string()];
        lines.extend(headers.iter().map(|h| format!("! {h}")));
        for row in &data_rows {
            lines.push("|-".to_string());
            lines.push(format!("| {}", row.join(" || ")));
        }
        lines.push("|}\n".to_string());
        out.push_str(&lines.join("\n"));
    }
}

fn cell_token(colspan: u32, children: &[Node]) -> String {
    let text = children
        .iter()
        .map(|child| match child {
            Node::Paragraph { children }
            | Node::Heading { children, .. }
            | Node::ListItem { children, .. } => wrap_block(&inline(children)),
            Node::Table { .. } => wrap_block(&child.plain_text()),
            other => wrap_block(&inline(std::slice::from_ref(other))),
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if colspan > 1 {
        format!("colspan=\"{colspan}\" | {text}")
    } else {
        text
    }
}

/// Render inline nodes to a single string.
fn inline(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        push_inline(node, &mut out);
    }
    out
}

fn push_inline(node: &Node, out: &mut String) {
    match node {
        Node::Text(s) => out.push_str(s),
        Node::Emphasis { kind, children } => {
            let marks = match kind {
                EmphasisKind::Italic => "''",
                EmphasisKind::Bold => "'''",
            };
            out.push_str(marks);
            out.push_str(&inline(children));
            out.push_str(marks);
        }
        Node::Link {
            href,
            text,
            is_citation,
        } => match href.as_deref() {
            Some(href) if !is_citation && is_external(href) => {
                out.push_str(&format!("[{href} {text}]"));
            }
            _ => out.push_str(text),
        },
        Node::Image(image) => out.push_str(&image_markup(image)),
        other => out.push_str(&inline(other.children())),
    }
}

fn is_external(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

fn image_markup(image: &ImageRef) -> String {
    let alt = image.alt_text.as_deref().unwrap_or("");
    match image.remote_id.as_deref() {
        Some(remote_id) => format!("[[{remote_id}|thumb|center|600px|{alt}]]"),
        None => format!(
            "<!-- unresolved image {}: {} -->",
            image.sequence_number,
            alt.replace("--", "- -")
        ),
    }
}
