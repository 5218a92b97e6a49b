use std::sync::Arc;

use crate::pos::Range;
use crate::structure::Nav;

use super::ast::Node;

/// Describes offsets in a JSON file as property paths like `a.b[0]`.
#[derive(Debug, Clone)]
pub struct Navigation {
    root: Arc<Node>,
}

impl Navigation {
    pub fn new(root: Arc<Node>) -> Self {
        Self { root }
    }

    /// Path steps and the innermost container around `offset`, below the
    /// root.
    fn steps(&self, offset: usize) -> (Vec<String>, Option<&Node>) {
        let mut steps = Vec::new();
        let mut innermost = None;
        let mut node = self.root.as_ref();
        loop {
            let next = match node {
                Node::Object(object) => object
                    .properties
                    .iter()
                    .find(|p| is_container(&p.value) && p.value.range().contains_offset(offset))
                    .map(|p| (format!(".{}", p.name), &p.value)),
                Node::Array(array) => array
                    .values
                    .iter()
                    .enumerate()
                    .find(|(_, v)| is_container(v) && v.range().contains_offset(offset))
                    .map(|(i, v)| (format!("[{i}]"), v)),
                _ => None,
            };
            let Some((step, child)) = next else {
                return (steps, innermost);
            };
            steps.push(step);
            innermost = Some(child);
            node = child;
        }
    }
}

fn is_container(node: &Node) -> bool {
    matches!(node, Node::Object(_) | Node::Array(_))
}

impl Nav for Navigation {
    fn context_string(&self, offset: usize) -> String {
        let (steps, _) = self.steps(offset);
        let path = steps.concat();
        path.strip_prefix('.').map(str::to_string).unwrap_or(path)
    }

    fn context_def_range(&self, offset: usize) -> Option<Range> {
        let (_, innermost) = self.steps(offset);
        innermost.map(|node| node.start_range().clone())
    }
}
