use crate::records::Record;

/// Rendered state of the table area.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TableOutput {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub table_visible: bool,
    pub empty_state_visible: bool,
    pub row_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowShade {
    Even,
    Odd,
}

impl TableOutput {
    pub fn empty() -> Self {
        Self {
            headers: Vec::new(),
            rows: Vec::new(),
            table_visible: false,
            empty_state_visible: true,
            row_count: 0,
        }
    }

    pub fn row_count_label(&self) -> String {
        format!("Total rows: {}", self.row_count)
    }

    pub fn shade(row_idx: usize) -> RowShade {
        if row_idx % 2 == 0 {
            RowShade::Even
        } else {
            RowShade::Odd
        }
    }

    /// Display width per column: widest of header and cells, clipped to `max_width`.
    pub fn column_widths(&self, max_width: usize) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let widest = self
                    .rows
                    .iter()
                    .map(|r| r[idx].chars().count())
                    .fold(name.chars().count(), usize::max);
                widest.min(max_width)
            })
            .collect()
    }
}

/// Projects records onto the table area.
///
/// Columns are the keys of the first record, in order. Cells are looked up by
/// column name and fall back to the empty string.
pub fn render(rows: &[Record]) -> TableOutput {
    let Some(first) = rows.first() else {
        return TableOutput::empty();
    };
    let headers: Vec<String> = first.keys().map(str::to_string).collect();
    let body = rows
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|h| record.get(h).unwrap_or("").to_string())
                .collect()
        })
        .collect();

    TableOutput {
        headers,
        rows: body,
        table_visible: true,
        empty_state_visible: false,
        row_count: rows.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, &str)]) -> Record {
        fields.iter().copied().collect()
    }

    #[test]
    fn empty_input_shows_empty_state() {
        let out = render(&[]);
        assert!(out.rows.is_empty());
        assert!(out.empty_state_visible);
        assert!(!out.table_visible);
        assert_eq!(out.row_count, 0);
        assert_eq!(out.row_count_label(), "Total rows: 0");
    }

    #[test]
    fn headers_come_from_first_record() {
        let rows = vec![
            record(&[("name", "Ada"), ("age", "36")]),
            record(&[("age", "41"), ("name", "Grace")]),
            record(&[("name", "Linus"), ("city", "Helsinki")]),
        ];
        let out = render(&rows);
        assert_eq!(out.headers, vec!["name", "age"]);
        assert_eq!(out.rows.len(), 3);
        assert_eq!(out.rows[1], vec!["Grace", "41"]);
        // Missing columns render empty, extra ones are dropped.
        assert_eq!(out.rows[2], vec!["Linus", ""]);
        assert!(out.table_visible);
        assert!(!out.empty_state_visible);
        assert_eq!(out.row_count, 3);
    }

    #[test]
    fn cells_are_taken_verbatim() {
        let rows = vec![record(&[("<b>h</b>", "<i>x</i>")])];
        let out = render(&rows);
        assert_eq!(out.headers[0], "<b>h</b>");
        assert_eq!(out.rows[0][0], "<i>x</i>");
    }

    #[test]
    fn rows_alternate_shade() {
        assert_eq!(TableOutput::shade(0), RowShade::Even);
        assert_eq!(TableOutput::shade(1), RowShade::Odd);
        assert_eq!(TableOutput::shade(2), RowShade::Even);
    }

    #[test]
    fn column_widths_are_clipped() {
        let rows = vec![record(&[("id", "1"), ("text", "x".repeat(100).as_str())])];
        assert_eq!(render(&rows).column_widths(40), vec![2, 40]);
    }
}
