use std::collections::HashMap;

/// One decoded spreadsheet row: column names paired with display values, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

pub type RowCollection = Vec<Record>;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column` to `value`, keeping the position of an already present column.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Converts a grid of display strings into records.
///
/// The first row that has a non-empty cell provides the column names. Every
/// following row becomes one record, cells missing at the end of a row are
/// filled with the empty string and rows without any content are skipped.
pub fn grid_to_records(grid: &[Vec<String>]) -> RowCollection {
    let mut rows = grid.iter().skip_while(|row| is_blank(row));
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let headers = build_headers(header_row);

    rows.filter(|row| !is_blank(row))
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let value = row.get(idx).map(String::as_str).unwrap_or("");
                    (name.clone(), value.to_string())
                })
                .collect()
        })
        .collect()
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.is_empty())
}

// Empty names become __EMPTY, __EMPTY_1, ...; repeated names get _1, _2, ...
fn build_headers(row: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut headers: Vec<String> = Vec::with_capacity(row.len());
    for cell in row {
        let base = if cell.is_empty() {
            "__EMPTY".to_string()
        } else {
            cell.clone()
        };
        let mut name = base.clone();
        while headers.contains(&name) {
            let counter = seen.entry(base.clone()).or_insert(0);
            *counter += 1;
            name = format!("{base}_{counter}");
        }
        headers.push(name);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn record_keeps_insertion_order() {
        let mut record = Record::new();
        record.insert("b", "2");
        record.insert("a", "1");
        record.insert("b", "3");
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(record.get("b"), Some("3"));
        assert_eq!(record.get("c"), None);
    }

    #[test]
    fn header_row_names_the_columns() {
        let records = grid_to_records(&grid(&[
            &["Name", "Age"],
            &["Ada", "36"],
            &["Linus"],
        ]));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["Name", "Age"]);
        assert_eq!(records[1].get("Name"), Some("Linus"));
        assert_eq!(records[1].get("Age"), Some(""));
    }

    #[test]
    fn blank_rows_are_skipped() {
        let records = grid_to_records(&grid(&[
            &["", ""],
            &["id", "value"],
            &["", ""],
            &["1", "x"],
        ]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("id"), Some("1"));
    }

    #[test]
    fn empty_and_duplicate_headers_are_renamed() {
        let records = grid_to_records(&grid(&[
            &["a", "", "a", "", "a"],
            &["1", "2", "3", "4", "5"],
        ]));
        assert_eq!(
            records[0].keys().collect::<Vec<_>>(),
            vec!["a", "__EMPTY", "a_1", "__EMPTY_1", "a_2"]
        );
        assert_eq!(records[0].get("a_2"), Some("5"));
    }

    #[test]
    fn header_only_sheet_has_no_records() {
        assert!(grid_to_records(&grid(&[&["a", "b"]])).is_empty());
        assert!(grid_to_records(&[]).is_empty());
    }
}
