//! Plain-text table rendering for status and host reports.
//!
//! Output is monospace-aligned and optionally wrapped in a markdown code
//! fence so chat-style sinks keep the columns intact.

/// Column alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct TableStyle {
    pub wrap_markdown: bool,
    pub header_separator: bool,
    pub column_separators: bool,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            wrap_markdown: true,
            header_separator: true,
            column_separators: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    alignments: Vec<Align>,
}

impl Table {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set per-column alignment. Missing entries default to left.
    pub fn align(mut self, alignments: impl IntoIterator<Item = Align>) -> Self {
        self.alignments = alignments.into_iter().collect();
        self
    }

    pub fn push_row<S: Into<String>>(&mut self, row: impl IntoIterator<Item = S>) {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    fn num_columns(&self) -> usize {
        if !self.headers.is_empty() {
            self.headers.len()
        } else {
            self.rows.iter().map(Vec::len).max().unwrap_or(0)
        }
    }

    /// Render the table. Returns `None` when there is nothing to show.
    pub fn render(&self, style: TableStyle) -> Option<String> {
        let columns = self.num_columns();
        if columns == 0 {
            return None;
        }

        let widths: Vec<usize> = (0..columns)
            .map(|i| {
                std::iter::once(&self.headers)
                    .chain(self.rows.iter())
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let sep = if style.column_separators { " | " } else { " " };
        let mut lines = Vec::with_capacity(self.rows.len() + 2);

        if !self.headers.is_empty() {
            lines.push(self.render_row(&self.headers, &widths, sep, true));
            if style.header_separator {
                let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
                lines.push(dashes.join(sep));
            }
        }
        for row in &self.rows {
            lines.push(self.render_row(row, &widths, sep, false));
        }

        let body = lines.join("\n");
        Some(if style.wrap_markdown {
            format!("```\n{body}\n```")
        } else {
            body
        })
    }

    fn render_row(&self, row: &[String], widths: &[usize], sep: &str, header: bool) -> String {
        widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let align = if header {
                    Align::Left
                } else {
                    self.alignments.get(i).copied().unwrap_or(Align::Left)
                };
                match align {
                    Align::Left => format!("{cell:<width$}"),
                    Align::Right => format!("{cell:>width$}"),
                }
            })
            .collect::<Vec<_>>()
            .join(sep)
    }
}

/// Render `key value` pairs as a two-column block, keys left, values right.
pub fn render_kv<K, V>(pairs: impl IntoIterator<Item = (K, V)>, wrap_markdown: bool) -> Option<String>
where
    K: ToString,
    V: ToString,
{
    let mut table = Table::default().align([Align::Left, Align::Right]);
    for (k, v) in pairs {
        table.push_row([k.to_string(), v.to_string()]);
    }
    if table.rows.is_empty() {
        return None;
    }
    table.render(TableStyle {
        wrap_markdown,
        header_separator: false,
        column_separators: false,
    })
}
