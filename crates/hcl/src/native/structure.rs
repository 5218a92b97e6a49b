use std::sync::Arc;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::didyoumean::name_suggestion;
use crate::pos::{range_between, Range};
use crate::structure::{self, missing_required_attributes, Attributes, BodyContent, BodySchema};

use super::ast::{Attribute, Block, Body};

impl Attribute {
    pub fn to_attribute(&self) -> structure::Attribute {
        structure::Attribute {
            name: self.name.clone(),
            expr: self.expr.clone(),
            range: self.src_range.clone(),
            name_range: self.name_range.clone(),
        }
    }
}

impl Block {
    pub fn to_block(&self) -> structure::Block {
        structure::Block {
            type_name: self.type_name.clone(),
            labels: self.labels.clone(),
            body: self.body.clone(),
            def_range: self.def_range(),
            type_range: self.type_range.clone(),
            label_ranges: self.label_ranges.clone(),
        }
    }

    fn header_range(&self) -> Range {
        range_between(&self.type_range, &self.open_brace_range)
    }

    /// Checks the labels against `schema`, reporting the first problem.
    fn check_labels(&self, schema: &structure::BlockHeaderSchema) -> Option<Diagnostic> {
        let wanted = schema.label_names.len();
        let name = &self.type_name;
        if self.labels.len() > wanted {
            let detail = if wanted == 0 {
                format!("No labels are expected for {name} blocks.")
            } else {
                format!(
                    "Only {wanted} labels ({}) are expected for {name} blocks.",
                    schema.label_names.join(", ")
                )
            };
            return Some(
                Diagnostic::error(format!("Extraneous label for {name}"), detail)
                    .with_subject(self.label_ranges[wanted].clone())
                    .with_context(self.header_range()),
            );
        }
        if self.labels.len() < wanted {
            return Some(
                Diagnostic::error(
                    format!(
                        "Missing {} for {name}",
                        schema.label_names[self.labels.len()]
                    ),
                    format!(
                        "All {name} blocks must have {wanted} labels ({}).",
                        schema.label_names.join(", ")
                    ),
                )
                .with_subject(self.open_brace_range.clone())
                .with_context(self.header_range()),
            );
        }
        None
    }
}

impl Body {
    fn attribute_visible(&self, name: &str) -> bool {
        !self.hidden_attrs.contains(name)
    }

    fn block_visible(&self, type_name: &str) -> bool {
        !self.hidden_blocks.contains(type_name)
    }

    fn visible_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .values()
            .filter(|attr| self.attribute_visible(&attr.name))
    }

    fn visible_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(|block| self.block_visible(&block.type_name))
    }
}

impl structure::Body for Body {
    fn content(&self, schema: &BodySchema) -> (BodyContent, Diagnostics) {
        let (content, _, mut diags) = self.partial_content(schema);

        for attr in self.visible_attributes() {
            // Block-named arguments were already reported by partial_content.
            if schema.attribute(&attr.name).is_some() || schema.block(&attr.name).is_some() {
                continue;
            }
            let unclaimed: Vec<&str> = schema
                .attribute_names()
                .into_iter()
                .filter(|name| !content.attributes.contains_key(*name))
                .collect();
            let suggestion = name_suggestion(&attr.name, &unclaimed)
                .map(|suggestion| format!(" Did you mean {suggestion:?}?"))
                .unwrap_or_default();
            diags.push(
                Diagnostic::error(
                    "Unsupported argument",
                    format!(
                        "An argument named {:?} is not expected here.{suggestion}",
                        attr.name
                    ),
                )
                .with_subject(attr.name_range.clone()),
            );
        }

        for block in self.visible_blocks() {
            if schema.block(&block.type_name).is_some() {
                continue;
            }
            let suggestion = match name_suggestion(&block.type_name, &schema.block_type_names()) {
                Some(suggestion) => format!(" Did you mean {suggestion:?}?"),
                None if schema.attribute(&block.type_name).is_some() => format!(
                    " Did you mean to define argument {:?}? If so, use the equals sign to assign it a value.",
                    block.type_name
                ),
                None => String::new(),
            };
            diags.push(
                Diagnostic::error(
                    "Unsupported block type",
                    format!(
                        "Blocks of type {:?} are not expected here.{suggestion}",
                        block.type_name
                    ),
                )
                .with_subject(block.type_range.clone()),
            );
        }

        (content, diags)
    }

    fn partial_content(
        &self,
        schema: &BodySchema,
    ) -> (BodyContent, Arc<dyn structure::Body>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut content = BodyContent::empty(self.missing_item_range());
        let mut hidden_attrs = self.hidden_attrs.clone();
        let mut hidden_blocks = self.hidden_blocks.clone();

        for attr_schema in &schema.attributes {
            let name = &attr_schema.name;
            if let Some(attr) = self.attributes.get(name) {
                if self.attribute_visible(name) {
                    hidden_attrs.insert(name.clone());
                    content.attributes.insert(name.clone(), attr.to_attribute());
                }
            }
        }
        diags.extend(missing_required_attributes(
            schema,
            &content.attributes,
            &self.missing_item_range(),
        ));

        for attr in self.visible_attributes() {
            if hidden_attrs.contains(&attr.name) || schema.block(&attr.name).is_none() {
                continue;
            }
            diags.push(
                Diagnostic::error(
                    "Unsupported argument",
                    format!(
                        "An argument named {:?} is not expected here. Did you mean to define a block of type {:?}?",
                        attr.name, attr.name
                    ),
                )
                .with_subject(attr.name_range.clone()),
            );
        }

        for block in self.visible_blocks() {
            let Some(block_schema) = schema.block(&block.type_name) else {
                continue;
            };
            match block.check_labels(block_schema) {
                Some(diag) => diags.push(diag),
                None => content.blocks.push(block.to_block()),
            }
        }
        // Hidden only now, so that several blocks of one type are all seen.
        for block_schema in &schema.blocks {
            hidden_blocks.insert(block_schema.type_name.clone());
        }

        tracing::trace!(
            attributes = content.attributes.len(),
            blocks = content.blocks.len(),
            diagnostics = diags.len(),
            "extracted native body content"
        );
        let remain = Body {
            hidden_attrs,
            hidden_blocks,
            ..self.clone()
        };
        (content, Arc::new(remain), diags)
    }

    fn just_attributes(&self) -> (Attributes, Diagnostics) {
        let mut diags = Diagnostics::new();
        if let Some(example) = self.visible_blocks().next() {
            diags.push(
                Diagnostic::error(
                    format!("Unexpected {:?} block", example.type_name),
                    "Blocks are not allowed here.",
                )
                .with_subject(example.type_range.clone()),
            );
        }
        // Attributes are still returned alongside the error so that
        // analysis can continue.
        let attrs = self
            .visible_attributes()
            .map(|attr| (attr.name.clone(), attr.to_attribute()))
            .collect();
        (attrs, diags)
    }

    fn missing_item_range(&self) -> Range {
        self.src_range.start_point()
    }
}
