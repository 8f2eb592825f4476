//! Anchor rules and the placement of rendered blocks

use std::fmt;

use serde::Deserialize;

/// Where a fragment's rendered block goes in the composed document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorRule {
    /// Append at the end of a named section of the base template
    Section(String),
    /// Insert right after the full extent of the entry named by a
    /// reference placeholder
    After(String),
}

impl fmt::Display for AnchorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorRule::Section(name) => write!(f, "section '{}'", name),
            AnchorRule::After(placeholder) => write!(f, "after '{{{}}}'", placeholder),
        }
    }
}

/// How a block of the composed document got where it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Fixed text of the base template
    Skeleton,
    /// Appended to a base template section
    Section(String),
    /// Inserted after another entry
    After { kind: String, key: String },
}

/// Arena of placed blocks.
///
/// Section contents and the blocks trailing each entry are both kept in
/// insertion order, so placing everything in one forward pass and then
/// walking the skeleton gives the final order.
#[derive(Debug, Default)]
pub(crate) struct PlacementTree {
    nodes: Vec<Node>,
    sections: Vec<(String, Vec<usize>)>,
}

#[derive(Debug)]
struct Node {
    text: String,
    placement: Placement,
    tail: Vec<usize>,
}

impl PlacementTree {
    pub fn new<I, S>(sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: Vec::new(),
            sections: sections.into_iter().map(|s| (s.into(), Vec::new())).collect(),
        }
    }

    /// Append a block to a section. Returns the node id, or `None` if the
    /// section does not exist.
    pub fn push_section(&mut self, section: &str, text: String) -> Option<usize> {
        let id = self.nodes.len();
        let (_, members) = self.sections.iter_mut().find(|(name, _)| name == section)?;
        members.push(id);
        self.nodes.push(Node {
            text,
            placement: Placement::Section(section.to_string()),
            tail: Vec::new(),
        });
        Some(id)
    }

    /// Insert a block after the full extent of an already placed node
    pub fn push_after(
        &mut self,
        target: usize,
        kind: &str,
        key: &str,
        text: String,
    ) -> Option<usize> {
        let id = self.nodes.len();
        self.nodes.get_mut(target)?.tail.push(id);
        self.nodes.push(Node {
            text,
            placement: Placement::After {
                kind: kind.to_string(),
                key: key.to_string(),
            },
            tail: Vec::new(),
        });
        Some(id)
    }

    /// Blocks placed in a section, flattened in document order
    pub fn drain_section(&self, section: &str, out: &mut Vec<(String, Placement)>) {
        if let Some((_, members)) = self.sections.iter().find(|(name, _)| name == section) {
            for &id in members {
                self.emit(id, out);
            }
        }
    }

    fn emit(&self, id: usize, out: &mut Vec<(String, Placement)>) {
        let node = &self.nodes[id];
        out.push((node.text.clone(), node.placement.clone()));
        for &child in &node.tail {
            self.emit(child, out);
        }
    }
}
