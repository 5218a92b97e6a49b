use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::expression::Expression;
use crate::pos::Range;

/// A container of attributes and blocks whose contents are retrieved
/// through a schema.
///
/// Bodies are immutable; every retrieval builds new content.
pub trait Body: fmt::Debug + Send + Sync {
    /// Retrieves the content described by `schema`. Anything in the body
    /// that the schema does not mention is an error.
    fn content(&self, schema: &BodySchema) -> (BodyContent, Diagnostics);

    /// Like [`Body::content`], but returns whatever the schema does not
    /// mention as a remainder body instead of reporting it.
    fn partial_content(&self, schema: &BodySchema) -> (BodyContent, Arc<dyn Body>, Diagnostics);

    /// Retrieves every attribute without a schema. Blocks are an error.
    fn just_attributes(&self) -> (Attributes, Diagnostics);

    /// Where a missing required item should be reported.
    fn missing_item_range(&self) -> Range;
}

pub type Attributes = IndexMap<String, Attribute>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AttributeSchema {
    pub name: String,
    pub required: bool,
}

impl AttributeSchema {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BlockHeaderSchema {
    pub type_name: String,
    pub label_names: Vec<String>,
}

impl BlockHeaderSchema {
    pub fn new(type_name: impl Into<String>, label_names: &[&str]) -> Self {
        Self {
            type_name: type_name.into(),
            label_names: label_names.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BodySchema {
    pub attributes: Vec<AttributeSchema>,
    pub blocks: Vec<BlockHeaderSchema>,
}

impl BodySchema {
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    pub fn block(&self, type_name: &str) -> Option<&BlockHeaderSchema> {
        self.blocks.iter().find(|block| block.type_name == type_name)
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|attr| attr.name.as_str()).collect()
    }

    pub fn block_type_names(&self) -> Vec<&str> {
        self.blocks.iter().map(|block| block.type_name.as_str()).collect()
    }
}

/// What a schema retrieved from a body.
#[derive(Debug, Clone, Default)]
pub struct BodyContent {
    pub attributes: Attributes,
    pub blocks: Vec<Block>,
    pub missing_item_range: Range,
}

impl BodyContent {
    pub fn empty(missing_item_range: Range) -> Self {
        Self {
            missing_item_range,
            ..Self::default()
        }
    }

    pub fn blocks_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Block> {
        self.blocks
            .iter()
            .filter(move |block| block.type_name == type_name)
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub expr: Arc<dyn Expression>,
    pub range: Range,
    pub name_range: Range,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub type_name: String,
    pub labels: Vec<String>,
    pub body: Arc<dyn Body>,
    pub def_range: Range,
    pub type_range: Range,
    pub label_ranges: Vec<Range>,
}

/// Answers questions about where in a file an offset sits.
pub trait Nav: fmt::Debug + Send + Sync {
    /// A short description of the innermost block around `offset`, such
    /// as `resource "a" "b"`. Empty when there is none.
    fn context_string(&self, offset: usize) -> String;

    /// The header range of the innermost block around `offset`.
    fn context_def_range(&self, offset: usize) -> Option<Range>;
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct File {
    pub body: Arc<dyn Body>,
    pub bytes: Arc<[u8]>,
    pub nav: Option<Arc<dyn Nav>>,
}

/// A body with nothing in it.
#[derive(Debug, Clone, Default)]
pub struct EmptyBody {
    pub range: Range,
}

impl EmptyBody {
    pub fn new(range: Range) -> Arc<dyn Body> {
        Arc::new(Self { range })
    }
}

impl Body for EmptyBody {
    fn content(&self, schema: &BodySchema) -> (BodyContent, Diagnostics) {
        let (content, _, diags) = self.partial_content(schema);
        (content, diags)
    }

    fn partial_content(&self, schema: &BodySchema) -> (BodyContent, Arc<dyn Body>, Diagnostics) {
        let diags = missing_required_attributes(schema, &Attributes::new(), &self.range);
        (
            BodyContent::empty(self.range.clone()),
            Arc::new(self.clone()),
            diags,
        )
    }

    fn just_attributes(&self) -> (Attributes, Diagnostics) {
        (Attributes::new(), Diagnostics::new())
    }

    fn missing_item_range(&self) -> Range {
        self.range.clone()
    }
}

/// One "Missing required argument" error per required attribute of
/// `schema` that `found` lacks.
pub fn missing_required_attributes(
    schema: &BodySchema,
    found: &Attributes,
    missing_range: &Range,
) -> Diagnostics {
    schema
        .attributes
        .iter()
        .filter(|attr| attr.required && !found.contains_key(&attr.name))
        .map(|attr| {
            Diagnostic::error(
                "Missing required argument",
                format!(
                    "The argument {:?} is required, but no definition was found.",
                    attr.name
                ),
            )
            .with_subject(missing_range.clone())
        })
        .collect()
}
