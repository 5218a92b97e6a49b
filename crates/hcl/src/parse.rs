use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::expression::Expression;
use crate::json;
use crate::native::{self, Tokens};
use crate::pos::Pos;
use crate::structure::File;
use crate::traversal::Traversal;

/// Knobs shared by the parse entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Position of the first byte, for sources embedded in larger files.
    pub start_pos: Pos,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            start_pos: Pos::INITIAL,
        }
    }
}

pub fn parse_native(src: &[u8], filename: &str, start: Pos) -> (File, Diagnostics) {
    let (file, diags) = native::parse_config(src, filename, start);
    debug!(
        filename,
        bytes = src.len(),
        diagnostics = diags.len(),
        "parsed native file"
    );
    (file, diags)
}

pub fn parse_json(src: &[u8], filename: &str) -> (File, Diagnostics) {
    let (file, diags) = json::parse(src, filename);
    debug!(
        filename,
        bytes = src.len(),
        diagnostics = diags.len(),
        "parsed json file"
    );
    (file, diags)
}

/// The tokens of a native file, for editor tooling.
pub fn lex_native(src: &[u8], filename: &str, start: Pos) -> (Tokens, Diagnostics) {
    let (tokens, diags) = native::lex_config(src, filename, start);
    trace!(filename, tokens = tokens.len(), "lexed native file");
    (tokens, diags)
}

pub fn parse_expression(
    src: &[u8],
    filename: &str,
    start: Pos,
) -> (Arc<dyn Expression>, Diagnostics) {
    let (expr, diags) = native::parse_expression(src, filename, start);
    trace!(filename, diagnostics = diags.len(), "parsed expression");
    (Arc::new(expr), diags)
}

pub fn parse_template(
    src: &[u8],
    filename: &str,
    start: Pos,
) -> (Arc<dyn Expression>, Diagnostics) {
    let (expr, diags) = native::parse_template(src, filename, start);
    trace!(filename, diagnostics = diags.len(), "parsed template");
    (Arc::new(expr), diags)
}

pub fn parse_traversal_abs(src: &[u8], filename: &str, start: Pos) -> (Traversal, Diagnostics) {
    native::parse_traversal_abs(src, filename, start)
}

pub type SuffixParser = fn(&[u8], &str) -> (File, Diagnostics);

static SUFFIX_PARSERS: Lazy<RwLock<BTreeMap<String, SuffixParser>>> = Lazy::new(|| {
    let mut parsers: BTreeMap<String, SuffixParser> = BTreeMap::new();
    parsers.insert(".hcl".to_string(), |src, filename| {
        parse_native(src, filename, Pos::INITIAL)
    });
    parsers.insert(".json".to_string(), parse_json);
    RwLock::new(parsers)
});

/// Makes [`parse_by_suffix`] use `parser` for filenames ending in
/// `suffix`.
///
/// # Panics
///
/// If `suffix` is already registered.
pub fn register_suffix(suffix: &str, parser: SuffixParser) {
    let mut parsers = SUFFIX_PARSERS
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if parsers.contains_key(suffix) {
        panic!("a parser for {suffix:?} is already registered");
    }
    parsers.insert(suffix.to_string(), parser);
}

/// Parses `src` with the parser registered for the longest suffix of
/// `filename`. `.hcl` and `.json` are always known.
pub fn parse_by_suffix(filename: &str, src: &[u8]) -> (Option<File>, Diagnostics) {
    let parser = {
        let parsers = SUFFIX_PARSERS
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        parsers
            .iter()
            .filter(|(suffix, _)| filename.ends_with(suffix.as_str()))
            .max_by_key(|(suffix, _)| suffix.len())
            .map(|(_, parser)| *parser)
    };
    match parser {
        Some(parser) => {
            let (file, diags) = parser(src, filename);
            (Some(file), diags)
        }
        None => {
            let suffix = Path::new(filename)
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();
            let diag = Diagnostic::error(
                "Unsupported file format",
                format!("Cannot read from {filename}: unrecognized file format suffix {suffix:?}."),
            );
            (None, diag.into())
        }
    }
}

/// Parses files and remembers them by filename, so that diagnostics can
/// later be rendered against their source.
///
/// Parsing a filename a second time returns the file from the first
/// parse without looking at the new source.
#[derive(Debug, Default)]
pub struct FileParser {
    files: IndexMap<String, File>,
    options: ParseOptions,
}

impl FileParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self {
            files: IndexMap::new(),
            options,
        }
    }

    pub fn parse_native(&mut self, src: &[u8], filename: &str) -> (File, Diagnostics) {
        let start = self.options.start_pos;
        self.parse_cached(filename, || parse_native(src, filename, start))
    }

    pub fn parse_json(&mut self, src: &[u8], filename: &str) -> (File, Diagnostics) {
        self.parse_cached(filename, || parse_json(src, filename))
    }

    pub fn parse_native_file(&mut self, path: &Path) -> (Option<File>, Diagnostics) {
        let filename = path.to_string_lossy().into_owned();
        match read_source(path, &filename) {
            Ok(src) => {
                let (file, diags) = self.parse_native(&src, &filename);
                (Some(file), diags)
            }
            Err(diags) => (None, diags),
        }
    }

    pub fn parse_json_file(&mut self, path: &Path) -> (Option<File>, Diagnostics) {
        let filename = path.to_string_lossy().into_owned();
        match read_source(path, &filename) {
            Ok(src) => {
                let (file, diags) = self.parse_json(&src, &filename);
                (Some(file), diags)
            }
            Err(diags) => (None, diags),
        }
    }

    /// Registers a file parsed elsewhere, replacing any cached one.
    pub fn add_file(&mut self, filename: impl Into<String>, file: File) {
        self.files.insert(filename.into(), file);
    }

    pub fn files(&self) -> &IndexMap<String, File> {
        &self.files
    }

    fn parse_cached(
        &mut self,
        filename: &str,
        parse: impl FnOnce() -> (File, Diagnostics),
    ) -> (File, Diagnostics) {
        if let Some(file) = self.files.get(filename) {
            trace!(filename, "file already parsed");
            return (file.clone(), Diagnostics::new());
        }
        let (file, diags) = parse();
        self.files.insert(filename.to_string(), file.clone());
        (file, diags)
    }
}

fn read_source(path: &Path, filename: &str) -> Result<Vec<u8>, Diagnostics> {
    std::fs::read(path).map_err(|err| {
        debug!(filename, error = %err, "failed to read configuration file");
        Diagnostic::error(
            "Failed to read file",
            format!("The configuration file {filename:?} could not be read: {err}."),
        )
        .into()
    })
}
