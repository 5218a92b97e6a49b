use std::sync::Arc;

use crate::pos::Range;
use crate::structure::Nav;

use super::ast::{Block, Body};

/// Locates blocks by byte offset within a parsed native file.
#[derive(Debug, Clone)]
pub struct Navigation {
    root: Arc<Body>,
}

impl Navigation {
    pub fn new(root: Arc<Body>) -> Self {
        Self { root }
    }

    fn innermost_block(&self, offset: usize) -> Option<&Block> {
        let mut found = None;
        let mut body = self.root.as_ref();
        while let Some(block) = body
            .blocks
            .iter()
            .find(|block| block.src_range().contains_offset(offset))
        {
            found = Some(block);
            body = block.body.as_ref();
        }
        found
    }
}

impl Nav for Navigation {
    fn context_string(&self, offset: usize) -> String {
        let Some(block) = self.innermost_block(offset) else {
            return String::new();
        };
        let mut header = block.type_name.clone();
        for label in &block.labels {
            header.push_str(&format!(" {label:?}"));
        }
        header
    }

    fn context_def_range(&self, offset: usize) -> Option<Range> {
        self.innermost_block(offset).map(Block::def_range)
    }
}
