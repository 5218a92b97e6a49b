use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io;

use hcl_value::{Type, Value};
use indexmap::IndexMap;
use owo_colors::OwoColorize;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::WriterConfig;
use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::pos::{line_ranges, range_over, Range};
use crate::structure::File;
use crate::traversal::{Traversal, Traverser};

/// Width of the `→ 1234: ` gutter in front of source lines.
const GUTTER: usize = 8;

/// Renders diagnostics as human-readable text with source snippets.
///
/// Source is looked up by the filename of each diagnostic's subject; a
/// diagnostic about a file that is not in `files` is still rendered, just
/// without its snippet.
pub struct DiagnosticWriter<'a> {
    files: &'a IndexMap<String, File>,
    config: WriterConfig,
}

impl<'a> DiagnosticWriter<'a> {
    pub fn new(files: &'a IndexMap<String, File>, config: WriterConfig) -> Self {
        Self { files, config }
    }

    pub fn write_diagnostic(&self, out: &mut impl io::Write, diag: &Diagnostic) -> io::Result<()> {
        out.write_all(self.render(diag).as_bytes())
    }

    pub fn write_diagnostics(&self, out: &mut impl io::Write, diags: &Diagnostics) -> io::Result<()> {
        out.write_all(self.render_all(diags).as_bytes())
    }

    /// Every diagnostic, separated by blank lines.
    pub fn render_all(&self, diags: &Diagnostics) -> String {
        diags
            .iter()
            .map(|diag| self.render(diag))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();
        let severity = diag.severity.to_string();
        let severity = match (self.config.color, diag.severity) {
            (false, _) => severity,
            (true, Severity::Error) => severity.red().to_string(),
            (true, Severity::Warning) => severity.yellow().to_string(),
        };
        let _ = writeln!(out, "{severity}: {}\n", diag.summary);

        if let Some(subject) = &diag.subject {
            self.render_snippet(&mut out, diag, subject);
            self.render_variables(&mut out, diag);
        }

        if !diag.detail.is_empty() {
            for line in diag.detail.split('\n') {
                // Indented lines are preformatted.
                if self.config.width == 0 || line.starts_with(' ') {
                    let _ = writeln!(out, "{line}");
                } else {
                    for wrapped in wrap(line, self.config.width) {
                        let _ = writeln!(out, "{wrapped}");
                    }
                }
            }
        }
        out
    }

    fn render_snippet(&self, out: &mut String, diag: &Diagnostic, subject: &Range) {
        let filename = &subject.filename;
        let line = subject.start.line;
        let Some(file) = self.files.get(filename) else {
            let _ = writeln!(out, "  on {filename} line {line}:\n  (source code not available)\n");
            return;
        };

        let context = file
            .nav
            .as_ref()
            .map(|nav| nav.context_string(subject.start.byte))
            .filter(|context| !context.is_empty())
            .map(|context| format!(", in {context}"))
            .unwrap_or_default();
        let _ = writeln!(out, "  on {filename} line {line}{context}:");

        let highlight = widen(subject.clone());
        let snippet = match &diag.context {
            Some(context) => widen(range_over(subject, context)),
            None => highlight.clone(),
        };

        let src = &file.bytes;
        let lines = line_ranges(src, filename);
        let overlapping: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.overlaps(&snippet))
            .map(|(i, _)| i)
            .collect();
        let (first, last) = match (overlapping.first(), overlapping.last()) {
            (Some(first), Some(last)) => (*first, *last),
            // Points past the end of a line still belong to it.
            _ if line >= 1 && line <= lines.len() => (line - 1, line - 1),
            _ => {
                out.push('\n');
                return;
            }
        };
        let from = first.saturating_sub(self.config.context_lines);
        let to = (last + self.config.context_lines).min(lines.len() - 1);

        for line_range in &lines[from..=to] {
            let (before, marked, after) = line_range.partition_around(&highlight);
            let text = |range: &Range| String::from_utf8_lossy(range.slice_bytes(src)).into_owned();
            let [before, marked, after] = self.truncate([text(&before), text(&marked), text(&after)]);
            let marker = if line_range.overlaps(&highlight) { "→" } else { " " };
            let marked = if self.config.color && !marked.is_empty() {
                marked.bold().underline().to_string()
            } else {
                marked
            };
            let _ = writeln!(
                out,
                "{marker} {:>4}: {before}{marked}{after}",
                line_range.start.line
            );
        }
        out.push('\n');
    }

    /// Cuts a source line split in three parts so that it fits the
    /// configured width, ending it with an ellipsis when anything was cut.
    fn truncate(&self, parts: [String; 3]) -> [String; 3] {
        if self.config.width == 0 {
            return parts;
        }
        let mut budget = self.config.width.saturating_sub(GUTTER);
        let total: usize = parts.iter().map(|part| part.graphemes(true).count()).sum();
        if total <= budget {
            return parts;
        }
        budget = budget.saturating_sub(1);
        let mut cut = parts.map(|part| {
            let kept: String = part.graphemes(true).take(budget).collect();
            budget -= kept.graphemes(true).count();
            kept
        });
        cut[2].push('…');
        cut
    }

    /// The `with a as 1, b set to null` lines listing the variables the
    /// failing expression referred to.
    fn render_variables(&self, out: &mut String, diag: &Diagnostic) {
        let (Some(expr), Some(ctx)) = (&diag.expression, &diag.eval_context) else {
            return;
        };
        let mut seen = BTreeSet::new();
        let mut statements = BTreeSet::new();
        for traversal in expr.variables() {
            let (value, diags) = traversal.traverse_abs(Some(ctx));
            // Failures here are already reported elsewhere.
            if diags.has_errors() || !value.is_known() {
                continue;
            }
            let name = traversal_str(&traversal);
            if !seen.insert(name.clone()) {
                continue;
            }
            if value.is_null() {
                statements.insert(format!("{name} set to null"));
            } else {
                statements.insert(format!("{name} as {}", value_str(&value)));
            }
        }
        if statements.is_empty() {
            return;
        }
        let lines: Vec<String> = statements.into_iter().collect();
        let _ = writeln!(out, "with {}\n", lines.join(",\n     "));
    }
}

/// An empty range cannot be underlined, so it becomes one column wide.
fn widen(mut range: Range) -> Range {
    if range.empty() {
        range.end.byte += 1;
        range.end.column += 1;
    }
    range
}

fn traversal_str(traversal: &Traversal) -> String {
    let mut out = String::new();
    for step in &traversal.steps {
        match step {
            Traverser::Root { name, .. } => out.push_str(name),
            Traverser::Attr { name, .. } => {
                out.push('.');
                out.push_str(name);
            }
            Traverser::Index { key, .. } if key.ty().is_primitive() => {
                let _ = write!(out, "[{}]", value_str(key));
            }
            // Structural keys would make the line unreadably long.
            Traverser::Index { .. } => out.push_str("[...]"),
            Traverser::Splat { .. } => out.push_str("[*]"),
        }
    }
    out
}

/// A concise description of a value for the "with" lines.
pub fn value_str(value: &Value) -> String {
    if value.is_null() {
        return "null".to_string();
    }
    if !value.is_known() {
        return "(not yet known)".to_string();
    }
    let ty = value.ty();
    match ty {
        Type::Bool => value.as_bool().map(|b| b.to_string()).unwrap_or_default(),
        Type::Number => value
            .as_number()
            .map(|n| n.to_string())
            .unwrap_or_default(),
        Type::String => format!("{:?}", value.as_str().unwrap_or_default()),
        Type::List(_) | Type::Set(_) | Type::Map(_) | Type::Tuple(_) => {
            let kind = match ty {
                Type::List(_) => "list",
                Type::Set(_) => "set",
                Type::Map(_) => "map",
                _ => "tuple",
            };
            match value.length().unwrap_or_default() {
                0 => format!("empty {kind}"),
                1 => format!("{kind} with 1 element"),
                n => format!("{kind} with {n} elements"),
            }
        }
        Type::Object(attrs) => match attrs.len() {
            0 => "object with no attributes".to_string(),
            1 => {
                let name = attrs.keys().next().cloned().unwrap_or_default();
                format!("object with 1 attribute {name:?}")
            }
            n => format!("object with {n} attributes"),
        },
        Type::Dynamic => "dynamic".to_string(),
    }
}

/// Greedy word wrap at `width` grapheme columns. Words longer than the
/// width get a line of their own.
fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    for word in line.split(' ') {
        let word_width = word.graphemes(true).count();
        if current_width > 0 && current_width + 1 + word_width > width {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        if current_width > 0 {
            current.push(' ');
            current_width += 1;
        }
        current.push_str(word);
        current_width += word_width;
    }
    lines.push(current);
    lines
}

#[cfg(test)]
mod tests;
