//! Indentation-tracking writer for generated Go and C source.
//!
//! ```
//! use gdext_codegen::generator::CodeWriter;
//!
//! let mut w = CodeWriter::new();
//! w.block("func (cx *Vector2) Length() float64", |w| {
//!     w.line("return 0");
//! });
//! assert_eq!(w.finish(), "func (cx *Vector2) Length() float64 {\n\treturn 0\n}\n");
//! ```

/// Separates alignment cells within a line. Consecutive lines carrying the
/// same column are padded to a common width when the writer finishes, the
/// way gofmt lines up specs, struct fields and keyed literal elements.
pub const CELL: char = '\u{b}';

/// Accumulates source text, indenting with tabs as gofmt does.
#[derive(Debug, Default)]
pub struct CodeWriter {
    out: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation. Empty text writes a bare newline.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push('\t');
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    /// One line made of alignment cells, e.g. `["Name", "Type", "= 1"]`.
    pub fn cells<S: AsRef<str>>(&mut self, cells: &[S]) {
        let mut text = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                text.push(CELL);
            }
            text.push_str(cell.as_ref());
        }
        self.line(text);
    }

    /// Write several lines, each at the current indentation.
    pub fn lines(&mut self, text: &str) {
        for line in text.lines() {
            self.line(line);
        }
    }

    /// A blank line, collapsing runs so output never holds two in a row.
    pub fn blank_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    /// `// text` comment lines; each line of `text` becomes one comment line.
    pub fn comment(&mut self, text: &str) {
        for line in text.lines() {
            if line.is_empty() {
                self.line("//");
            } else {
                self.line(format!("// {line}"));
            }
        }
    }

    /// Run `f` one level deeper.
    pub fn indented<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.indent += 1;
        let result = f(self);
        self.indent -= 1;
        result
    }

    /// `open {`, the body from `f`, then `}`.
    pub fn block<R>(&mut self, open: impl AsRef<str>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.delimited(open.as_ref(), "{", "}", f)
    }

    /// A composite literal: `open{`, the elements from `f`, then `}`.
    pub fn literal<R>(&mut self, open: impl AsRef<str>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.line(format!("{}{{", open.as_ref()));
        let result = self.indented(f);
        self.line("}");
        result
    }

    /// `open {` and `}` around `f` without indenting, so `case` clauses sit
    /// level with their `switch`.
    pub fn switch<R>(&mut self, open: impl AsRef<str>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.line(format!("{} {{", open.as_ref()));
        let result = f(self);
        self.line("}");
        result
    }

    /// `open (`, the body from `f`, then `)`, as for Go `const` and `import` groups.
    pub fn group<R>(&mut self, open: impl AsRef<str>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.delimited(open.as_ref(), "(", ")", f)
    }

    /// Write `open {` and indent until the matching [`close`](Self::close).
    pub fn open(&mut self, open: impl AsRef<str>) {
        self.line(format!("{} {{", open.as_ref()));
        self.indent += 1;
    }

    pub fn close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }

    fn delimited<R>(&mut self, open: &str, left: &str, right: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        if open.is_empty() {
            self.line(left);
        } else {
            self.line(format!("{open} {left}"));
        }
        let result = self.indented(f);
        self.line(right);
        result
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// The accumulated text with cells aligned, ending in exactly one newline.
    pub fn finish(self) -> String {
        let mut out = align(&self.out);
        let trimmed = out.trim_end_matches('\n').len();
        out.truncate(trimmed);
        out.push('\n');
        out
    }
}

/// Pad the cells of every run of consecutive, equally indented lines.
fn align(text: &str) -> String {
    if !text.contains(CELL) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut run: Vec<Vec<&str>> = Vec::new();
    let mut run_indent = "";
    for line in text.split_inclusive('\n') {
        let body = line.strip_suffix('\n').unwrap_or(line);
        let content = body.trim_start_matches('\t');
        let indent = &body[..body.len() - content.len()];
        if content.contains(CELL) && (run.is_empty() || indent == run_indent) {
            run_indent = indent;
            run.push(content.split(CELL).collect());
            continue;
        }
        flush_run(&mut out, run_indent, &mut run);
        if content.contains(CELL) {
            run_indent = indent;
            run.push(content.split(CELL).collect());
        } else {
            out.push_str(line);
        }
    }
    flush_run(&mut out, run_indent, &mut run);
    out
}

fn flush_run(out: &mut String, indent: &str, run: &mut Vec<Vec<&str>>) {
    if run.is_empty() {
        return;
    }
    let mut widths: Vec<Vec<usize>> = run.iter().map(|cells| vec![0; cells.len()]).collect();
    column_widths(run, &mut widths, 0);
    for (cells, widths) in run.iter().zip(&widths) {
        out.push_str(indent);
        let last = cells.len() - 1;
        for (i, cell) in cells.iter().enumerate() {
            out.push_str(cell);
            if i < last {
                let pad = widths[i] + 1 - cell.chars().count();
                out.extend(std::iter::repeat_n(' ', pad));
            }
        }
        out.push('\n');
    }
    run.clear();
}

/// A column spans consecutive lines that have a cell after it; each span
/// gets the width of its widest cell, then the next column is measured
/// within that span.
fn column_widths(rows: &[Vec<&str>], widths: &mut [Vec<usize>], col: usize) {
    let mut i = 0;
    while i < rows.len() {
        if rows[i].len() <= col + 1 {
            i += 1;
            continue;
        }
        let start = i;
        while i < rows.len() && rows[i].len() > col + 1 {
            i += 1;
        }
        let width = rows[start..i]
            .iter()
            .map(|cells| cells[col].chars().count())
            .max()
            .unwrap_or(0);
        for w in &mut widths[start..i] {
            w[col] = width;
        }
        column_widths(&rows[start..i], &mut widths[start..i], col + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_blocks_indent_with_tabs() {
        let mut w = CodeWriter::new();
        w.block("func f()", |w| {
            w.block("if ok", |w| w.line("return"));
        });
        assert_eq!(w.finish(), "func f() {\n\tif ok {\n\t\treturn\n\t}\n}\n");
    }

    #[test]
    fn test_group_and_comment() {
        let mut w = CodeWriter::new();
        w.comment("Mode values.\n\nAliases share a value.");
        w.group("const", |w| w.line("A Mode = 0"));
        assert_eq!(
            w.finish(),
            "// Mode values.\n//\n// Aliases share a value.\nconst (\n\tA Mode = 0\n)\n"
        );
    }

    #[test]
    fn test_cells_align_within_a_run() {
        let mut w = CodeWriter::new();
        w.group("const", |w| {
            w.cells(&["A", "Mode", "= 0"]);
            w.cells(&["Longer", "Mode", "= 1"]);
        });
        w.blank_line();
        w.literal("var names = map[string]int", |w| {
            w.cells(&["\"a\":", "1,"]);
            w.cells(&["\"abc\":", "2,"]);
        });
        assert_eq!(
            w.finish(),
            "const (\n\tA      Mode = 0\n\tLonger Mode = 1\n)\n\nvar names = map[string]int{\n\t\"a\":   1,\n\t\"abc\": 2,\n}\n"
        );
    }

    #[test]
    fn test_trailing_column_aligns_only_where_present() {
        let mut w = CodeWriter::new();
        w.cells(&["A", "int", "// first"]);
        w.cells(&["Bbbb", "string"]);
        w.cells(&["C", "int32", "// third"]);
        assert_eq!(
            w.finish(),
            "A    int // first\nBbbb string\nC    int32 // third\n"
        );
    }

    #[test]
    fn test_switch_keeps_cases_level() {
        let mut w = CodeWriter::new();
        w.switch("switch x", |w| {
            w.line("case 1:");
            w.indented(|w| w.line("return"));
        });
        assert_eq!(w.finish(), "switch x {\ncase 1:\n\treturn\n}\n");
    }

    #[test]
    fn test_blank_lines_collapse() {
        let mut w = CodeWriter::new();
        w.blank_line();
        w.line("a");
        w.blank_line();
        w.blank_line();
        w.line("b");
        w.blank_line();
        assert_eq!(w.finish(), "a\n\nb\n");
    }
}
