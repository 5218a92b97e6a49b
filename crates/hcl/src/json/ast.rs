use hcl_value::Number;

use crate::pos::{range_between, Range};

/// A parsed JSON value, with the ranges needed to report problems in it.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Object(Object),
    Array(Array),
    String { value: String, src_range: Range },
    Number { value: Number, src_range: Range },
    Bool { value: bool, src_range: Range },
    Null { src_range: Range },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Properties in source order. Names may repeat.
    pub properties: Vec<Property>,
    pub src_range: Range,
    pub open_range: Range,
    pub close_range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: Node,
    pub name_range: Range,
}

impl Property {
    pub fn range(&self) -> Range {
        range_between(&self.name_range, self.value.range())
    }

    /// `"//"` properties hold comments.
    pub fn is_comment(&self) -> bool {
        self.name == "//"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub values: Vec<Node>,
    pub src_range: Range,
    pub open_range: Range,
}

impl Node {
    pub fn range(&self) -> &Range {
        match self {
            Node::Object(object) => &object.src_range,
            Node::Array(array) => &array.src_range,
            Node::String { src_range, .. }
            | Node::Number { src_range, .. }
            | Node::Bool { src_range, .. }
            | Node::Null { src_range } => src_range,
        }
    }

    /// The opening bracket of a container, or the whole of a scalar.
    pub fn start_range(&self) -> &Range {
        match self {
            Node::Object(object) => &object.open_range,
            Node::Array(array) => &array.open_range,
            other => other.range(),
        }
    }
}
