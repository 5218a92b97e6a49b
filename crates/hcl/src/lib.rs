//! Parsing and evaluation for the HCL configuration language.
//!
//! Source is read in either the native syntax ([`native`]) or the JSON
//! profile ([`json`]). Both produce a [`File`] whose [`Body`] is decoded
//! with a [`BodySchema`]; attribute values are [`Expression`]s evaluated
//! against an [`EvalContext`] into dynamic [`Value`]s. Problems are
//! reported as [`Diagnostics`], which [`DiagnosticWriter`] renders as text.

mod config;
mod diagnostic_text;
mod diagnostics;
mod didyoumean;
mod error;
mod eval_context;
mod expression;
pub mod json;
mod merged;
pub mod native;
mod ops;
mod parse;
mod pos;
mod structure;
mod transform;
mod traversal;

pub use hcl_value;
pub use hcl_value::{Function, Type, Value};

pub use config::WriterConfig;
pub use diagnostic_text::{value_str, DiagnosticWriter};
pub use diagnostics::{Diagnostic, Diagnostics, FunctionCallDiagExtra, Severity};
pub use didyoumean::name_suggestion;
pub use error::HclError;
pub use eval_context::EvalContext;
pub use expression::{
    abs_traversal_for_expr, expr_as_keyword, expr_list, expr_map, rel_traversal_for_expr,
    Expression, KeyValuePair, StaticExpr,
};
pub use merged::{merge_bodies, MergedBodies};
pub use ops::{get_attr, index};
pub use parse::{
    lex_native, parse_by_suffix, parse_expression, parse_json, parse_native, parse_template,
    parse_traversal_abs, register_suffix, FileParser, ParseOptions, SuffixParser,
};
pub use pos::{line_ranges, range_between, range_over, Pos, Range};
pub use structure::{
    missing_required_attributes, Attribute, AttributeSchema, Attributes, Block,
    BlockHeaderSchema, Body, BodyContent, BodySchema, EmptyBody, File, Nav,
};
pub use transform::{body_with_diagnostics, deep, shallow, Transformer, TransformerFunc};
pub use traversal::{Traversal, Traverser};
