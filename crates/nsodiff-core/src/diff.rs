// ── Side-by-side HTML diff ──
//
// Line-level comparison of the live payload (left) against the controller
// payload (right). `diffy` finds the edit script; this module pairs up
// deletions and insertions into "changed" rows and renders one HTML table,
// wrapping long lines at a fixed column.

use std::fmt::Write as _;
use std::path::PathBuf;

use diffy::{DiffOptions, Line};
use quick_xml::escape::escape;

/// Column at which long lines are wrapped unless configured otherwise.
pub const DEFAULT_WRAP_COLUMN: usize = 10;

/// Row counts of a rendered diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    /// Lines only on the right.
    pub added: usize,
    /// Lines only on the left.
    pub removed: usize,
    /// Left/right pairs that differ.
    pub changed: usize,
}

impl DiffStats {
    pub fn is_clean(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.changed == 0
    }
}

/// A diff report written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub path: PathBuf,
    pub stats: DiffStats,
}

/// Rendered document plus its statistics.
#[derive(Debug, Clone)]
pub struct RenderedDiff {
    pub html: String,
    pub stats: DiffStats,
}

/// Display row. Owns its text: the hunks borrow a patch local to
/// [`compare`].
enum Row {
    Same {
        from_no: usize,
        to_no: usize,
        text: String,
    },
    Change {
        from: Option<(usize, String)>,
        to: Option<(usize, String)>,
    },
}

/// HTML side-by-side renderer.
#[derive(Debug, Clone)]
pub struct HtmlDiff {
    wrap_column: usize,
    title: String,
    from_label: String,
    to_label: String,
}

impl Default for HtmlDiff {
    fn default() -> Self {
        Self::new(DEFAULT_WRAP_COLUMN)
    }
}

impl HtmlDiff {
    /// `wrap_column` of zero disables wrapping.
    pub fn new(wrap_column: usize) -> Self {
        Self {
            wrap_column,
            title: "Configuration diff".into(),
            from_label: "from".into(),
            to_label: "to".into(),
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn labels(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_label = from.into();
        self.to_label = to.into();
        self
    }

    pub fn render(&self, from: &str, to: &str) -> RenderedDiff {
        let from = with_final_newline(from);
        let to = with_final_newline(to);
        let (rows, stats) = compare(&from, &to);

        let mut body = String::new();
        for row in &rows {
            self.render_row(&mut body, row);
        }

        let banner = if stats.is_clean() {
            "<p class=\"no_diff\">No Differences Found</p>\n"
        } else {
            ""
        };

        let html = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title}</title>\n<style>\n{STYLE}</style>\n</head>\n<body>\n\
             <h1>{title}</h1>\n{banner}\
             <table class=\"diff\">\n<thead><tr>\
             <th colspan=\"2\" class=\"diff_header\">{from_label}</th>\
             <th colspan=\"2\" class=\"diff_header\">{to_label}</th>\
             </tr></thead>\n<tbody>\n{body}</tbody>\n</table>\n{LEGEND}</body>\n</html>\n",
            title = escape(&self.title),
            from_label = escape(&self.from_label),
            to_label = escape(&self.to_label),
        );

        RenderedDiff { html, stats }
    }

    fn render_row(&self, out: &mut String, row: &Row) {
        match row {
            Row::Same { from_no, to_no, text } => {
                for (i, chunk) in self.wrap(text).iter().enumerate() {
                    let (left_no, right_no) = if i == 0 {
                        (from_no.to_string(), to_no.to_string())
                    } else {
                        (">".to_owned(), ">".to_owned())
                    };
                    push_row(out, (&left_no, chunk, ""), (&right_no, chunk, ""));
                }
            }
            Row::Change { from, to } => {
                let class = match (from, to) {
                    (Some(_), Some(_)) => (" diff_chg", " diff_chg"),
                    (Some(_), None) => (" diff_sub", ""),
                    _ => ("", " diff_add"),
                };
                let left = from
                    .as_ref()
                    .map(|(no, text)| (*no, self.wrap(text)))
                    .unwrap_or_default();
                let right = to
                    .as_ref()
                    .map(|(no, text)| (*no, self.wrap(text)))
                    .unwrap_or_default();
                let height = left.1.len().max(right.1.len());

                for i in 0..height {
                    let number = |side: &(usize, Vec<String>)| match i {
                        _ if i >= side.1.len() => String::new(),
                        0 => side.0.to_string(),
                        _ => ">".to_owned(),
                    };
                    let cell = |side: &(usize, Vec<String>)| side.1.get(i).cloned().unwrap_or_default();
                    let cls = |side: &(usize, Vec<String>), cls: &'static str| {
                        if i < side.1.len() { cls } else { "" }
                    };
                    push_row(
                        out,
                        (&number(&left), &cell(&left), cls(&left, class.0)),
                        (&number(&right), &cell(&right), cls(&right, class.1)),
                    );
                }
            }
        }
    }

    fn wrap(&self, text: &str) -> Vec<String> {
        if self.wrap_column == 0 || text.chars().count() <= self.wrap_column {
            return vec![text.to_owned()];
        }
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.wrap_column)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}

fn push_row(out: &mut String, left: (&str, &str, &str), right: (&str, &str, &str)) {
    let _ = writeln!(
        out,
        "<tr><td class=\"diff_header\">{}</td><td class=\"diff_text{}\">{}</td>\
         <td class=\"diff_header\">{}</td><td class=\"diff_text{}\">{}</td></tr>",
        escape(left.0),
        left.2,
        escape(left.1),
        escape(right.0),
        right.2,
        escape(right.1),
    );
}

/// Pair the edit script into display rows.
///
/// The patch is built with a context window wider than either input, so
/// a non-empty patch is a single hunk covering both texts end to end.
fn compare(from: &str, to: &str) -> (Vec<Row>, DiffStats) {
    let context = from.lines().count().max(to.lines().count()) + 1;
    let mut options = DiffOptions::new();
    options.set_context_len(context);
    let patch = options.create_patch(from, to);

    let mut rows = Vec::new();
    let mut stats = DiffStats::default();

    if patch.hunks().is_empty() {
        rows.extend(from.lines().enumerate().map(|(i, text)| Row::Same {
            from_no: i + 1,
            to_no: i + 1,
            text: text.to_owned(),
        }));
        return (rows, stats);
    }

    let mut from_no = 1;
    let mut to_no = 1;
    let mut deleted: Vec<(usize, String)> = Vec::new();
    let mut inserted: Vec<(usize, String)> = Vec::new();

    for hunk in patch.hunks() {
        for line in hunk.lines() {
            match line {
                Line::Context(text) => {
                    flush(&mut rows, &mut stats, &mut deleted, &mut inserted);
                    rows.push(Row::Same {
                        from_no,
                        to_no,
                        text: trim_eol(text).to_owned(),
                    });
                    from_no += 1;
                    to_no += 1;
                }
                Line::Delete(text) => {
                    deleted.push((from_no, trim_eol(text).to_owned()));
                    from_no += 1;
                }
                Line::Insert(text) => {
                    inserted.push((to_no, trim_eol(text).to_owned()));
                    to_no += 1;
                }
            }
        }
    }
    flush(&mut rows, &mut stats, &mut deleted, &mut inserted);

    (rows, stats)
}

/// Emit pending deletions and insertions side by side.
fn flush(
    rows: &mut Vec<Row>,
    stats: &mut DiffStats,
    deleted: &mut Vec<(usize, String)>,
    inserted: &mut Vec<(usize, String)>,
) {
    let mut from_side = deleted.drain(..);
    let mut to_side = inserted.drain(..);
    loop {
        let (from, to) = (from_side.next(), to_side.next());
        match (&from, &to) {
            (Some(_), Some(_)) => stats.changed += 1,
            (Some(_), None) => stats.removed += 1,
            (None, Some(_)) => stats.added += 1,
            (None, None) => break,
        }
        rows.push(Row::Change { from, to });
    }
}

fn trim_eol(text: &str) -> &str {
    text.trim_end_matches(['\n', '\r'])
}

fn with_final_newline(text: &str) -> String {
    let mut owned = text.replace("\r\n", "\n");
    if !owned.is_empty() && !owned.ends_with('\n') {
        owned.push('\n');
    }
    owned
}

const STYLE: &str = "\
table.diff { font-family: Courier, monospace; border: medium; border-collapse: collapse; }
.diff_header { background-color: #e0e0e0; text-align: right; padding: 0 4px; }
td.diff_text { white-space: pre-wrap; padding: 0 4px; }
.diff_add { background-color: #aaffaa; }
.diff_chg { background-color: #ffff77; }
.diff_sub { background-color: #ffaaaa; }
p.no_diff { font-weight: bold; }
";

const LEGEND: &str = "\
<table class=\"legend\"><tr><th>Legends</th></tr>\
<tr><td><span class=\"diff_add\">Added</span> \
<span class=\"diff_chg\">Changed</span> \
<span class=\"diff_sub\">Deleted</span></td></tr></table>\n";
