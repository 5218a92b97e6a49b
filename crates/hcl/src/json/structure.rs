use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::didyoumean::suggestion_sentence;
use crate::pos::Range;
use crate::structure::{self, Attributes, BodyContent, BodySchema};

use super::ast::{Node, Property};
use super::expression::JsonExpr;

/// A JSON value seen as a body: an object whose properties are
/// attributes or blocks depending on the schema, or an array of such
/// objects whose properties are merged.
#[derive(Debug, Clone)]
pub struct Body {
    val: Arc<Node>,
    /// Names already claimed by an earlier `partial_content`.
    hidden_attrs: BTreeSet<String>,
}

impl Body {
    pub fn new(val: Arc<Node>) -> Self {
        Self {
            val,
            hidden_attrs: BTreeSet::new(),
        }
    }

    fn extract(&self, schema: &BodySchema) -> (BodyContent, BTreeSet<String>, Diagnostics) {
        let (properties, mut diags) = collect_properties(&self.val, None);
        let mut used = self.hidden_attrs.clone();
        let mut content = BodyContent::empty(structure::Body::missing_item_range(self));

        let mut by_name: IndexMap<&str, Vec<&Property>> = IndexMap::new();
        for property in properties {
            by_name.entry(property.name.as_str()).or_default().push(property);
        }

        for attr_schema in &schema.attributes {
            let name = attr_schema.name.as_str();
            let found = by_name
                .get(name)
                .filter(|_| !self.hidden_attrs.contains(name));
            let Some(found) = found else {
                if attr_schema.required {
                    diags.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!(
                                "The argument {name:?} is required, but no definition was found."
                            ),
                        )
                        .with_subject(content.missing_item_range.clone()),
                    );
                }
                continue;
            };
            let first = found[0];
            if let Some(second) = found.get(1) {
                diags.push(
                    Diagnostic::error(
                        "Duplicate argument",
                        format!(
                            "Only one argument named {name:?} can be set. The previous definition was at {}.",
                            first.name_range
                        ),
                    )
                    .with_subject(second.name_range.clone()),
                );
            }
            content
                .attributes
                .insert(name.to_string(), to_attribute(first));
            used.insert(name.to_string());
        }

        for block_schema in &schema.blocks {
            let type_name = block_schema.type_name.as_str();
            if !self.hidden_attrs.contains(type_name) {
                for property in by_name.get(type_name).into_iter().flatten() {
                    let unpacker = BlockUnpacker {
                        type_name,
                        type_range: &property.name_range,
                    };
                    diags.extend(unpacker.unpack(
                        &property.value,
                        &block_schema.label_names,
                        &mut Vec::new(),
                        &mut content.blocks,
                    ));
                }
            }
            used.insert(type_name.to_string());
        }

        tracing::trace!(
            attributes = content.attributes.len(),
            blocks = content.blocks.len(),
            diagnostics = diags.len(),
            "extracted json body content"
        );
        (content, used, diags)
    }
}

fn to_attribute(property: &Property) -> structure::Attribute {
    structure::Attribute {
        name: property.name.clone(),
        expr: Arc::new(JsonExpr::new(property.value.clone())),
        range: property.range(),
        name_range: property.name_range.clone(),
    }
}

/// The properties of an object, or of every object in an array. `label`
/// names what the properties stand for when they are block labels.
fn collect_properties<'a>(
    node: &'a Node,
    label: Option<&str>,
) -> (Vec<&'a Property>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut properties = Vec::new();
    let not_object = |node: &Node| {
        let detail = match label {
            Some(label) => {
                format!("A JSON object is required here, to specify {label} labels for this block.")
            }
            None => "A JSON object is required here, setting the arguments for this block."
                .to_string(),
        };
        Diagnostic::error("Incorrect JSON value type", detail)
            .with_subject(node.start_range().clone())
    };

    match node {
        Node::Null { .. } => {}
        Node::Object(object) => properties.extend(&object.properties),
        Node::Array(array) => {
            for element in &array.values {
                match element {
                    Node::Object(object) => properties.extend(&object.properties),
                    other => diags.push(not_object(other)),
                }
            }
        }
        other => diags.push(not_object(other)),
    }
    (properties, diags)
}

struct BlockUnpacker<'a> {
    type_name: &'a str,
    type_range: &'a Range,
}

impl BlockUnpacker<'_> {
    /// Peels one nesting level per remaining label, then turns what is left
    /// into one block per object.
    fn unpack(
        &self,
        node: &Node,
        labels_left: &[String],
        labels_used: &mut Vec<(String, Range)>,
        blocks: &mut Vec<structure::Block>,
    ) -> Diagnostics {
        if let Some((label_name, rest)) = labels_left.split_first() {
            let (properties, mut diags) = collect_properties(node, Some(label_name.as_str()));
            if properties.is_empty() && !diags.has_errors() && !matches!(node, Node::Null { .. })
            {
                diags.push(
                    Diagnostic::error(
                        "Missing block label",
                        format!(
                            "At least one object property is required, whose name represents the {} block's {label_name}.",
                            self.type_name
                        ),
                    )
                    .with_subject(node.start_range().clone()),
                );
            }
            for property in properties {
                labels_used.push((property.name.clone(), property.name_range.clone()));
                diags.extend(self.unpack(&property.value, rest, labels_used, blocks));
                labels_used.pop();
            }
            return diags;
        }

        let labels: Vec<String> = labels_used.iter().map(|(label, _)| label.clone()).collect();
        let label_ranges: Vec<Range> = labels_used.iter().map(|(_, range)| range.clone()).collect();
        let block = |val: &Node, def_range: &Range| structure::Block {
            type_name: self.type_name.to_string(),
            labels: labels.clone(),
            body: Arc::new(Body::new(Arc::new(val.clone()))),
            def_range: def_range.clone(),
            type_range: self.type_range.clone(),
            label_ranges: label_ranges.clone(),
        };

        match node {
            // A null block is no block at all.
            Node::Null { .. } => Diagnostics::new(),
            Node::Object(object) => {
                blocks.push(block(node, &object.open_range));
                Diagnostics::new()
            }
            Node::Array(array) => {
                // Elements that are not objects are reported when their
                // content is requested.
                blocks.extend(array.values.iter().map(|val| block(val, &array.open_range)));
                Diagnostics::new()
            }
            other => Diagnostic::error(
                "Incorrect JSON value type",
                format!(
                    "Either a JSON object or a JSON array is required, representing the contents of one or more {:?} blocks.",
                    self.type_name
                ),
            )
            .with_subject(other.start_range().clone())
            .into(),
        }
    }
}

impl structure::Body for Body {
    fn content(&self, schema: &BodySchema) -> (BodyContent, Diagnostics) {
        let (content, used, mut diags) = self.extract(schema);

        let mut suggestions: Vec<&str> = schema
            .attributes
            .iter()
            .map(|attr| attr.name.as_str())
            .filter(|name| !used.contains(*name))
            .collect();
        // Blocks may repeat, so their names are always worth suggesting.
        suggestions.extend(schema.block_type_names());

        let (properties, _) = collect_properties(&self.val, None);
        for property in properties {
            if property.is_comment() || used.contains(&property.name) {
                continue;
            }
            let suggestion = suggestion_sentence(&property.name, &suggestions);
            diags.push(
                Diagnostic::error(
                    "Extraneous JSON object property",
                    format!(
                        "No argument or block type is named {:?}.{suggestion}",
                        property.name
                    ),
                )
                .with_subject(property.name_range.clone())
                .with_context(property.range()),
            );
        }
        (content, diags)
    }

    fn partial_content(
        &self,
        schema: &BodySchema,
    ) -> (BodyContent, Arc<dyn structure::Body>, Diagnostics) {
        let (content, used, diags) = self.extract(schema);
        let remain = Body {
            val: self.val.clone(),
            hidden_attrs: used,
        };
        (content, Arc::new(remain), diags)
    }

    fn just_attributes(&self) -> (Attributes, Diagnostics) {
        let (properties, mut diags) = collect_properties(&self.val, None);
        let mut attrs = Attributes::new();
        for property in properties {
            if property.is_comment() || self.hidden_attrs.contains(&property.name) {
                continue;
            }
            if let Some(existing) = attrs.get(&property.name) {
                diags.push(
                    Diagnostic::error(
                        "Duplicate argument",
                        format!(
                            "The argument {:?} was already set at {}.",
                            property.name, existing.range
                        ),
                    )
                    .with_subject(property.name_range.clone()),
                );
                continue;
            }
            attrs.insert(property.name.clone(), to_attribute(property));
        }
        (attrs, diags)
    }

    fn missing_item_range(&self) -> Range {
        match self.val.as_ref() {
            Node::Object(object) => object.close_range.clone(),
            Node::Array(array) => array.open_range.clone(),
            other => other.range().clone(),
        }
    }
}
