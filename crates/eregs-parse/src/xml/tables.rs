//! `<GPOTABLE>` handling.
//!
//! Column headers come as a flat run of `<CHED H="n">` cells where `H` is
//! the nesting level. They are rebuilt into a tree so each header cell
//! knows how many leaf columns it spans and how many rows a leaf must
//! stretch to reach the bottom of the header block.

use roxmltree::Node as XmlNode;
use serde::{Deserialize, Serialize};

use super::{parse_document, text_of};
use crate::ParseError;

/// One rendered header cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderCell {
    pub text: String,
    pub colspan: usize,
    pub rowspan: usize,
}

/// Table contents as the formatting layer serves them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub header: Vec<Vec<HeaderCell>>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug)]
struct HeaderNode {
    text: String,
    level: usize,
    children: Vec<HeaderNode>,
}

impl HeaderNode {
    fn leaves(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(HeaderNode::leaves).sum()
        }
    }
}

impl TableData {
    /// Parse a table from its XML source.
    pub fn from_xml(xml: &str) -> Result<Self, ParseError> {
        let doc = parse_document(xml)?;
        let root = doc.root_element();
        let table = if root.has_tag_name("GPOTABLE") {
            Some(root)
        } else {
            root.descendants().find(|n| n.has_tag_name("GPOTABLE"))
        };
        table
            .map(Self::from_node)
            .ok_or_else(|| ParseError::MissingElement("GPOTABLE".into()))
    }

    pub fn from_node(table: XmlNode<'_, '_>) -> Self {
        let cheds: Vec<(usize, String)> = table
            .descendants()
            .filter(|n| n.has_tag_name("CHED"))
            .map(|n| {
                let level = n.attribute("H").and_then(|h| h.parse().ok()).unwrap_or(1);
                (level, text_of(n))
            })
            .collect();
        let rows = table
            .descendants()
            .filter(|n| n.has_tag_name("ROW"))
            .map(|row| {
                row.children()
                    .filter(|c| c.has_tag_name("ENT"))
                    .map(text_of)
                    .collect()
            })
            .collect();
        Self {
            header: header_rows(&header_tree(&cheds)),
            rows,
        }
    }

    /// Leaf column headings, left to right.
    pub fn columns(&self) -> Vec<&str> {
        let mut leaves: Vec<(usize, &str)> = Vec::new();
        // A leaf's rowspan reaches the bottom row, so leaves are the cells
        // whose row index plus rowspan equals the header height.
        let height = self.header.len();
        for (row_idx, row) in self.header.iter().enumerate() {
            let mut col = 0;
            for cell in row {
                if row_idx + cell.rowspan == height && cell.colspan == 1 {
                    leaves.push((self.column_of(row_idx, col), cell.text.as_str()));
                }
                col += 1;
            }
        }
        leaves.sort_by_key(|(c, _)| *c);
        leaves.into_iter().map(|(_, t)| t).collect()
    }

    /// Absolute column where the `nth` cell of `row` starts.
    fn column_of(&self, row: usize, nth: usize) -> usize {
        // Cells from rows above with a rowspan covering `row` take columns
        // too; walk all rows up to `row` laying out occupied columns.
        let width = self.rows.first().map_or(0, Vec::len).max(
            self.header
                .first()
                .map_or(0, |r| r.iter().map(|c| c.colspan).sum()),
        );
        let mut occupied = vec![0usize; width];
        for (r, cells) in self.header.iter().enumerate() {
            let mut col = 0;
            for (i, cell) in cells.iter().enumerate() {
                while col < width && occupied[col] > r {
                    col += 1;
                }
                if r == row && i == nth {
                    return col;
                }
                for slot in occupied.iter_mut().skip(col).take(cell.colspan) {
                    *slot = r + cell.rowspan;
                }
                col += cell.colspan;
            }
        }
        nth
    }

    /// Markdown rendering used as the node's plain text.
    pub fn to_markdown(&self) -> String {
        let columns = self.columns();
        let width = columns
            .len()
            .max(self.rows.iter().map(Vec::len).max().unwrap_or(0));
        if width == 0 {
            return String::new();
        }
        let mut out = String::new();
        let heading: Vec<&str> = (0..width)
            .map(|i| columns.get(i).copied().unwrap_or(""))
            .collect();
        out.push_str(&format!("|{}|\n", heading.join("|")));
        out.push_str(&format!("|{}|", vec!["---"; width].join("|")));
        for row in &self.rows {
            let cells: Vec<&str> = (0..width)
                .map(|i| row.get(i).map_or("", String::as_str))
                .collect();
            out.push_str(&format!("\n|{}|", cells.join("|")));
        }
        out
    }
}

fn header_tree(cheds: &[(usize, String)]) -> Vec<HeaderNode> {
    let mut roots: Vec<HeaderNode> = Vec::new();
    for (level, text) in cheds {
        let node = HeaderNode {
            text: text.clone(),
            level: *level,
            children: Vec::new(),
        };
        insert(&mut roots, node);
    }
    roots
}

/// Attach `node` under the last open node with a smaller level.
fn insert(siblings: &mut Vec<HeaderNode>, node: HeaderNode) {
    if let Some(last) = siblings.last_mut()
        && last.level < node.level
    {
        insert(&mut last.children, node);
        return;
    }
    siblings.push(node);
}

fn max_depth(nodes: &[HeaderNode]) -> usize {
    nodes
        .iter()
        .map(|n| 1 + max_depth(&n.children))
        .max()
        .unwrap_or(0)
}

fn header_rows(roots: &[HeaderNode]) -> Vec<Vec<HeaderCell>> {
    let height = max_depth(roots);
    let mut rows: Vec<Vec<HeaderCell>> = vec![Vec::new(); height];
    fn visit(node: &HeaderNode, row: usize, height: usize, rows: &mut [Vec<HeaderCell>]) {
        let rowspan = if node.children.is_empty() { height - row } else { 1 };
        rows[row].push(HeaderCell {
            text: node.text.clone(),
            colspan: node.leaves(),
            rowspan,
        });
        for child in &node.children {
            visit(child, row + 1, height, rows);
        }
    }
    for root in roots {
        visit(root, 0, height, &mut rows);
    }
    rows
}
