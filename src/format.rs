use prettytable::format::{Alignment, FormatBuilder, LinePosition, LineSeparator, TableFormat};
use prettytable::{Cell, Row, Table};
use std::io::{self, Write};

/// Output settings for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterOptions {
    /// Write results here instead of stdout. Empty means stdout.
    pub out_file: String,
    /// Field separator for unaligned output.
    pub delimiter: String,
    pub show_title_and_summary: bool,
    pub no_align: bool,
}

impl Default for FormatterOptions {
    fn default() -> Self {
        Self {
            out_file: String::new(),
            delimiter: "|".to_string(),
            show_title_and_summary: true,
            no_align: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub name: String,
    pub type_name: String,
}

impl ColumnHeader {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self.type_name.as_str(),
            "INT2" | "INT4" | "INT8" | "OID" | "FLOAT4" | "FLOAT8" | "NUMERIC" | "MONEY"
        )
    }
}

/// One statement's worth of output. `rows` cells are `None` for SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<Vec<Option<String>>>,
    pub rows_affected: u64,
}

impl QueryOutput {
    pub fn returns_rows(&self) -> bool {
        !self.columns.is_empty()
    }
}

fn psql_format() -> TableFormat {
    FormatBuilder::new()
        .column_separator('|')
        .separators(&[LinePosition::Title], LineSeparator::new('-', '+', '-', '-'))
        .padding(1, 1)
        .build()
}

fn row_summary(count: usize) -> String {
    if count == 1 {
        "(1 row)".to_string()
    } else {
        format!("({count} rows)")
    }
}

/// Print a result set in psql style.
pub fn print_result(
    result: &QueryOutput,
    options: &FormatterOptions,
    out: &mut dyn Write,
    title: &str,
) -> io::Result<()> {
    if !result.returns_rows() {
        if options.show_title_and_summary {
            writeln!(out, "OK ({} rows affected)", result.rows_affected)?;
        }
        return Ok(());
    }

    if options.show_title_and_summary && !title.is_empty() {
        if options.no_align {
            writeln!(out, "{title}")?;
        } else {
            let width = aligned_width(result);
            writeln!(out, "{title:^width$}")?;
        }
    }

    if options.no_align {
        print_unaligned(result, options, out)?;
    } else {
        print_aligned(result, options, out)?;
    }

    if options.show_title_and_summary {
        writeln!(out, "{}", row_summary(result.rows.len()))?;
        writeln!(out)?;
    }
    Ok(())
}

fn print_unaligned(
    result: &QueryOutput,
    options: &FormatterOptions,
    out: &mut dyn Write,
) -> io::Result<()> {
    if options.show_title_and_summary {
        let header: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        writeln!(out, "{}", header.join(&options.delimiter))?;
    }
    for row in &result.rows {
        let cells: Vec<&str> = row.iter().map(|v| v.as_deref().unwrap_or("")).collect();
        writeln!(out, "{}", cells.join(&options.delimiter))?;
    }
    Ok(())
}

fn print_aligned(
    result: &QueryOutput,
    options: &FormatterOptions,
    out: &mut dyn Write,
) -> io::Result<()> {
    let mut table = Table::new();
    table.set_format(psql_format());

    if options.show_title_and_summary {
        table.set_titles(Row::new(
            result
                .columns
                .iter()
                .map(|c| Cell::new_align(&c.name, Alignment::CENTER))
                .collect(),
        ));
    }

    for row in &result.rows {
        let cells = row
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let text = value.as_deref().unwrap_or("");
                let numeric = result.columns.get(i).is_some_and(ColumnHeader::is_numeric);
                let align = if numeric { Alignment::RIGHT } else { Alignment::LEFT };
                Cell::new_align(text, align)
            })
            .collect();
        table.add_row(Row::new(cells));
    }

    table.print(out)?;
    Ok(())
}

/// Width of the aligned rendering, used to centre the title.
fn aligned_width(result: &QueryOutput) -> usize {
    let widths = result.columns.iter().enumerate().map(|(i, column)| {
        result
            .rows
            .iter()
            .filter_map(|row| row.get(i).and_then(|v| v.as_deref()))
            .map(|v| v.chars().count())
            .chain(std::iter::once(column.name.chars().count()))
            .max()
            .unwrap_or(0)
            + 2
    });
    let columns = result.columns.len();
    widths.sum::<usize>() + columns.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn databases() -> QueryOutput {
        QueryOutput {
            columns: vec![ColumnHeader::new("Name", "NAME"), ColumnHeader::new("Size", "INT8")],
            rows: vec![
                vec![Some("postgres".to_string()), Some("7".to_string())],
                vec![Some("app".to_string()), None],
            ],
            rows_affected: 2,
        }
    }

    fn render(result: &QueryOutput, options: &FormatterOptions, title: &str) -> String {
        let mut out = Vec::new();
        print_result(result, options, &mut out, title).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[rstest]
    fn test_aligned_output(databases: QueryOutput) {
        let text = render(&databases, &FormatterOptions::default(), "List of databases");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0].trim(), "List of databases");
        assert!(lines[1].contains("Name"));
        assert!(lines[1].contains('|'));
        assert!(lines[2].contains("-+-"));
        assert!(lines[3].contains("postgres"));
        assert!(text.contains("(2 rows)"));
    }

    #[rstest]
    fn test_unaligned_output(databases: QueryOutput) {
        let options = FormatterOptions {
            no_align: true,
            delimiter: ",".to_string(),
            ..FormatterOptions::default()
        };
        let text = render(&databases, &options, "");
        assert_eq!(text, "Name,Size\npostgres,7\napp,\n(2 rows)\n\n");
    }

    #[rstest]
    fn test_tuples_only(databases: QueryOutput) {
        let options = FormatterOptions {
            no_align: true,
            show_title_and_summary: false,
            ..FormatterOptions::default()
        };
        let text = render(&databases, &options, "List of databases");
        assert_eq!(text, "postgres|7\napp|\n");
    }

    #[test]
    fn test_statement_without_rows() {
        let result = QueryOutput {
            rows_affected: 3,
            ..QueryOutput::default()
        };
        assert_eq!(render(&result, &FormatterOptions::default(), ""), "OK (3 rows affected)\n");
    }

    #[rstest]
    #[case(0, "(0 rows)")]
    #[case(1, "(1 row)")]
    #[case(12, "(12 rows)")]
    fn test_row_summary(#[case] count: usize, #[case] expected: &str) {
        assert_eq!(row_summary(count), expected);
    }
}
