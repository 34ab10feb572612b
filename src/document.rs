//! The document tree shared by the loader, citation resolver and wikitext
//! renderer.
//!
//! The tree is deliberately small: it only knows the constructs that have a
//! wikitext counterpart. Container variants own their children; leaf
//! variants own their strings. Later stages rewrite strings in place and
//! never reshape the tree, except for deleting citation-notice paragraphs.

use serde::{Deserialize, Serialize};

/// Inline emphasis kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmphasisKind {
    Italic,
    Bold,
}

/// Reference from an `Image` node to its embedded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// 1-based position of the image in document order.
    pub sequence_number: u32,
    /// ALT text exactly as stored in the document.
    pub alt_text: Option<String>,
    /// Remote identifier (e.g. `File:report_1.png`), set once resolved.
    pub remote_id: Option<String>,
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Paragraph {
        children: Vec<Node>,
    },
    /// Level is 1–4.
    Heading {
        level: u8,
        children: Vec<Node>,
    },
    /// `depth` is the nesting level, 0 for a top-level item.
    ListItem {
        ordered: bool,
        depth: u8,
        children: Vec<Node>,
    },
    Table {
        rows: Vec<Node>,
    },
    TableRow {
        cells: Vec<Node>,
    },
    TableCell {
        colspan: u32,
        is_header: bool,
        children: Vec<Node>,
    },
    Image(ImageRef),
    /// A hyperlink. Citation links keep `is_citation = true` and lose their
    /// href once rewritten; they render as plain inline text.
    Link {
        href: Option<String>,
        text: String,
        is_citation: bool,
    },
    Emphasis {
        kind: EmphasisKind,
        children: Vec<Node>,
    },
    Text(String),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Node::Paragraph { children }
    }

    /// Child nodes of a container, empty for leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Paragraph { children }
            | Node::Heading { children, .. }
            | Node::ListItem { children, .. }
            | Node::TableCell { children, .. }
            | Node::Emphasis { children, .. } => children,
            Node::Table { rows } => rows,
            Node::TableRow { cells } => cells,
            Node::Image(_) | Node::Link { .. } | Node::Text(_) => &[],
        }
    }

    /// Mutable access to child nodes, `None` for leaves.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Paragraph { children }
            | Node::Heading { children, .. }
            | Node::ListItem { children, .. }
            | Node::TableCell { children, .. }
            | Node::Emphasis { children, .. } => Some(children),
            Node::Table { rows } => Some(rows),
            Node::TableRow { cells } => Some(cells),
            Node::Image(_) | Node::Link { .. } | Node::Text(_) => None,
        }
    }

    /// Raw concatenated text of this node and its descendants, with no
    /// markup. Images contribute nothing.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.push_plain_text(&mut out);
        out
    }

    fn push_plain_text(&self, out: &mut String) {
        match self {
            Node::Text(s) => out.push_str(s),
            Node::Link { text, .. } => out.push_str(text),
            Node::Image(_) => {}
            other => {
                for child in other.children() {
                    child.push_plain_text(out);
                }
            }
        }
    }

    /// Visit this node and all descendants depth-first, parents first.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Node)) {
        f(self);
        if let Some(children) = self.children_mut() {
            for child in children {
                child.walk_mut(f);
            }
        }
    }
}

/// Visit every node of a body depth-first.
pub fn walk_body_mut(body: &mut [Node], f: &mut dyn FnMut(&mut Node)) {
    for node in body {
        node.walk_mut(f);
    }
}

/// Join the lines of a text run with single spaces, trimming each line.
///
/// Word documents carry soft line breaks inside a semantic paragraph; in
/// wikitext a newline would end the paragraph, so they are folded here.
pub fn wrap_block(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
}
