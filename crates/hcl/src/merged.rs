use std::sync::Arc;

use indexmap::IndexMap;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::pos::Range;
use crate::structure::{
    missing_required_attributes, Attributes, Body, BodyContent, BodySchema,
};

/// Presents several bodies as one.
///
/// For schema-driven retrieval the first body to define an attribute
/// wins and later definitions are ignored. Blocks from every body are
/// concatenated in body order. An attribute that the schema does not claim
/// but that more than one body defines is reported as ambiguous by
/// `content`; `partial_content` keeps such attributes in the merged
/// remainder, where a later `just_attributes` reports the duplicate.
#[derive(Debug, Clone, Default)]
pub struct MergedBodies {
    bodies: Vec<Arc<dyn Body>>,
}

impl MergedBodies {
    pub fn new(bodies: Vec<Arc<dyn Body>>) -> Self {
        Self { bodies }
    }

    pub fn bodies(&self) -> &[Arc<dyn Body>] {
        &self.bodies
    }

    fn merged_content(
        &self,
        schema: &BodySchema,
        partial: bool,
    ) -> (BodyContent, Vec<Arc<dyn Body>>, Diagnostics) {
        // Required attributes are checked once, across all bodies.
        let mut relaxed = schema.clone();
        for attr in &mut relaxed.attributes {
            attr.required = false;
        }

        let mut diags = Diagnostics::new();
        let mut content = BodyContent::empty(self.missing_item_range());
        let mut leftovers = Vec::new();
        let mut unclaimed: IndexMap<String, Range> = IndexMap::new();

        for body in &self.bodies {
            let (this, this_diags) = if partial {
                let (this, remain, this_diags) = body.partial_content(&relaxed);
                leftovers.push(remain);
                (this, this_diags)
            } else {
                let (_, remain, _) = body.partial_content(&relaxed);
                let (extra, _) = remain.just_attributes();
                for (name, attr) in extra {
                    match unclaimed.get(&name) {
                        Some(first) => diags.push(ambiguous_argument(&name, first, &attr.name_range)),
                        None => {
                            unclaimed.insert(name, attr.name_range);
                        }
                    }
                }
                body.content(&relaxed)
            };
            diags.extend(this_diags);
            for (name, attr) in this.attributes {
                if let Some(existing) = content.attributes.get(&name) {
                    tracing::trace!(
                        attribute = %name,
                        kept = %existing.name_range,
                        ignored = %attr.name_range,
                        "merged body keeps first definition"
                    );
                    continue;
                }
                content.attributes.insert(name, attr);
            }
            content.blocks.extend(this.blocks);
        }

        diags.extend(missing_required_attributes(
            schema,
            &content.attributes,
            &content.missing_item_range,
        ));
        (content, leftovers, diags)
    }
}

fn ambiguous_argument(name: &str, first: &Range, again: &Range) -> Diagnostic {
    Diagnostic::error(
        "Ambiguous argument",
        format!(
            "The argument {name:?} is not expected here, and is defined by more than one of the merged bodies. It was first defined at {first}."
        ),
    )
    .with_subject(again.clone())
}

/// Merges `bodies` into a single body.
pub fn merge_bodies(bodies: Vec<Arc<dyn Body>>) -> Arc<dyn Body> {
    Arc::new(MergedBodies::new(bodies))
}

impl Body for MergedBodies {
    fn content(&self, schema: &BodySchema) -> (BodyContent, Diagnostics) {
        let (content, _, diags) = self.merged_content(schema, false);
        (content, diags)
    }

    fn partial_content(&self, schema: &BodySchema) -> (BodyContent, Arc<dyn Body>, Diagnostics) {
        let (content, leftovers, diags) = self.merged_content(schema, true);
        (content, merge_bodies(leftovers), diags)
    }

    fn just_attributes(&self) -> (Attributes, Diagnostics) {
        let mut attrs = Attributes::new();
        let mut diags = Diagnostics::new();
        for body in &self.bodies {
            let (this, this_diags) = body.just_attributes();
            diags.extend(this_diags);
            for (name, attr) in this {
                if let Some(existing) = attrs.get(&name) {
                    diags.push(
                        Diagnostic::error(
                            "Duplicate argument",
                            format!(
                                "Argument {name:?} was already set at {}",
                                existing.name_range
                            ),
                        )
                        .with_subject(attr.name_range.clone()),
                    );
                    continue;
                }
                attrs.insert(name, attr);
            }
        }
        (attrs, diags)
    }

    fn missing_item_range(&self) -> Range {
        self.bodies
            .first()
            .map(|body| body.missing_item_range())
            .unwrap_or_default()
    }
}
