use std::fmt::{self, Write};

/// Horizontal placement of a cell within its column.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Align {
    #[default]
    Left,
    Right,
}

pub(crate) struct Row {
    cells: Vec<String>,
}

impl Row {
    /// Header cells are used as awk field names
    fn is_awk_safe(&self) -> bool {
        !self
            .cells
            .iter()
            .any(|cell| cell.is_empty() || cell.contains(char::is_whitespace))
    }

    fn columns(&self) -> usize {
        self.cells.len()
    }
}

pub(crate) trait IntoRow: Into<Row> + Sized {
    fn into_row(self) -> Row {
        self.into()
    }
}

impl<T> IntoRow for T where T: Into<Row> + Sized {}

impl From<Vec<String>> for Row {
    fn from(value: Vec<String>) -> Self {
        Row { cells: value }
    }
}

impl From<Vec<&str>> for Row {
    fn from(value: Vec<&str>) -> Self {
        Row {
            cells: value.into_iter().map(str::to_owned).collect(),
        }
    }
}

/// A whitespace separated table whose header doubles as awk field names.
pub(crate) struct Table {
    header: Option<Row>,
    body: Vec<Row>,
    align: Vec<Align>,
    print_header: bool,
}

impl Table {
    pub(crate) fn new() -> Table {
        Table {
            header: None,
            body: Vec::new(),
            align: Vec::new(),
            print_header: true,
        }
    }

    fn num_columns(&self) -> Option<usize> {
        self.header
            .as_ref()
            .or_else(|| self.body.first())
            .map(Row::columns)
    }

    fn check_columns(&self, row: &Row) {
        if let Some(expected) = self.num_columns() {
            assert_eq!(
                expected,
                row.columns(),
                "table has {} columns but a row with {} columns was inserted",
                expected,
                row.columns()
            );
        }
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    pub(crate) fn set_header<S: IntoRow>(&mut self, header: S) {
        let header = header.into_row();

        self.check_columns(&header);

        assert!(header.is_awk_safe(), "table header contains whitespace");

        self.header.replace(header);
    }

    /// Places the cells of `column`. Columns are left aligned by default.
    pub(crate) fn align(&mut self, column: usize, align: Align) {
        if self.align.len() <= column {
            self.align.resize(column + 1, Align::default());
        }

        self.align[column] = align;
    }

    pub(crate) fn add_row<S: IntoRow>(&mut self, row: S) {
        let row = row.into_row();

        self.check_columns(&row);

        self.body.push(row);
    }

    fn visible_rows(&self) -> impl Iterator<Item = &Row> {
        let header = self.header.iter().filter(|_| self.print_header);

        header.chain(self.body.iter())
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.num_columns().unwrap_or(0)];

        for row in self.visible_rows() {
            for (width, cell) in widths.iter_mut().zip(&row.cells) {
                *width = (*width).max(cell.chars().count());
            }
        }

        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();

        for row in self.visible_rows() {
            let last = row.cells.len().saturating_sub(1);

            for (i, cell) in row.cells.iter().enumerate() {
                let width = widths[i];

                match self.align.get(i).copied().unwrap_or_default() {
                    // Trailing padding would only produce trailing whitespace
                    Align::Left if i == last => f.write_str(cell)?,
                    Align::Left => write!(f, "{:<width$}", cell, width = width)?,
                    Align::Right => write!(f, "{:>width$}", cell, width = width)?,
                }

                if i != last {
                    f.write_str("  ")?;
                }
            }

            f.write_char('\n')?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}
