use std::fmt;
use std::sync::Arc;

use crate::diagnostics::Diagnostics;
use crate::pos::Range;
use crate::structure::{Attributes, Body, BodyContent, BodySchema};

/// Rewrites a body before its content is retrieved.
pub trait Transformer: Send + Sync {
    fn transform_body(&self, body: Arc<dyn Body>) -> Arc<dyn Body>;
}

/// A [`Transformer`] built from a closure.
pub struct TransformerFunc<F>(pub F);

impl<F> Transformer for TransformerFunc<F>
where
    F: Fn(Arc<dyn Body>) -> Arc<dyn Body> + Send + Sync,
{
    fn transform_body(&self, body: Arc<dyn Body>) -> Arc<dyn Body> {
        (self.0)(body)
    }
}

/// Applies `transformer` to `body` once, without touching nested blocks.
pub fn shallow(body: Arc<dyn Body>, transformer: &dyn Transformer) -> Arc<dyn Body> {
    transformer.transform_body(body)
}

/// Applies `transformer` to `body` and, lazily, to the body of every
/// block retrieved from it at any depth.
pub fn deep(body: Arc<dyn Body>, transformer: Arc<dyn Transformer>) -> Arc<dyn Body> {
    Arc::new(DeepWrapper {
        transformed: body,
        transformer,
    })
}

#[derive(Clone)]
struct DeepWrapper {
    transformed: Arc<dyn Body>,
    transformer: Arc<dyn Transformer>,
}

impl fmt::Debug for DeepWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepWrapper")
            .field("transformed", &self.transformed)
            .finish_non_exhaustive()
    }
}

impl DeepWrapper {
    fn wrap_blocks(&self, mut content: BodyContent) -> BodyContent {
        for block in &mut content.blocks {
            block.body = deep(block.body.clone(), self.transformer.clone());
        }
        content
    }
}

impl Body for DeepWrapper {
    fn content(&self, schema: &BodySchema) -> (BodyContent, Diagnostics) {
        let body = self.transformer.transform_body(self.transformed.clone());
        let (content, diags) = body.content(schema);
        (self.wrap_blocks(content), diags)
    }

    fn partial_content(&self, schema: &BodySchema) -> (BodyContent, Arc<dyn Body>, Diagnostics) {
        let body = self.transformer.transform_body(self.transformed.clone());
        let (content, remain, diags) = body.partial_content(schema);
        (
            self.wrap_blocks(content),
            deep(remain, self.transformer.clone()),
            diags,
        )
    }

    fn just_attributes(&self) -> (Attributes, Diagnostics) {
        self.transformer
            .transform_body(self.transformed.clone())
            .just_attributes()
    }

    fn missing_item_range(&self) -> Range {
        self.transformed.missing_item_range()
    }
}

/// Wraps `body` so that every retrieval reports `diags` first.
///
/// When `diags` contains errors the wrapped body is never consulted and
/// retrieval returns empty content.
pub fn body_with_diagnostics(body: Arc<dyn Body>, diags: Diagnostics) -> Arc<dyn Body> {
    Arc::new(DiagBody {
        diags,
        wrapped: body,
    })
}

#[derive(Debug, Clone)]
struct DiagBody {
    diags: Diagnostics,
    wrapped: Arc<dyn Body>,
}

impl Body for DiagBody {
    fn content(&self, schema: &BodySchema) -> (BodyContent, Diagnostics) {
        if self.diags.has_errors() {
            return (
                BodyContent::empty(self.missing_item_range()),
                self.diags.clone(),
            );
        }
        let (content, more) = self.wrapped.content(schema);
        let mut diags = self.diags.clone();
        diags.extend(more);
        (content, diags)
    }

    fn partial_content(&self, schema: &BodySchema) -> (BodyContent, Arc<dyn Body>, Diagnostics) {
        if self.diags.has_errors() {
            return (
                BodyContent::empty(self.missing_item_range()),
                Arc::new(self.clone()),
                self.diags.clone(),
            );
        }
        let (content, remain, more) = self.wrapped.partial_content(schema);
        let mut diags = self.diags.clone();
        diags.extend(more);
        (content, remain, diags)
    }

    fn just_attributes(&self) -> (Attributes, Diagnostics) {
        if self.diags.has_errors() {
            return (Attributes::new(), self.diags.clone());
        }
        let (attrs, more) = self.wrapped.just_attributes();
        let mut diags = self.diags.clone();
        diags.extend(more);
        (attrs, diags)
    }

    fn missing_item_range(&self) -> Range {
        self.wrapped.missing_item_range()
    }
}
