use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

use calamine::{Data, ExcelDateTime, Reader, open_workbook_auto_from_rs};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::domain::SVError;
use crate::records::{RowCollection, grid_to_records};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    CSV,
    TSV,
    PARQUET,
    ARROW,
    WORKBOOK,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub cells: Vec<Vec<String>>,
}

/// Decoded file content: sheets in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet_to_records(&self, name: &str) -> Option<RowCollection> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .map(|s| grid_to_records(&s.cells))
    }

    pub fn first_sheet_records(&self) -> Result<RowCollection, SVError> {
        let first = self
            .sheet_names()
            .first()
            .copied()
            .ok_or_else(|| SVError::DecodeFailure("workbook has no sheets".into()))?;
        self.sheet_to_records(first)
            .ok_or_else(|| SVError::DecodeFailure(format!("sheet {first} is missing")))
    }
}

/// Turns raw file bytes into a workbook. `name` is the file name, used to pick the format.
pub trait Decoder: Send + Sync {
    fn decode(&self, name: &str, bytes: &[u8]) -> Result<Workbook, SVError>;
}

/// Workbook formats go through calamine, delimited and columnar formats through polars.
#[derive(Debug, Default)]
pub struct SheetDecoder;

impl Decoder for SheetDecoder {
    fn decode(&self, name: &str, bytes: &[u8]) -> Result<Workbook, SVError> {
        let start_time = Instant::now();
        let file_type = detect_file_type(Path::new(name));
        debug!("Decoding {name} ({} bytes) as {file_type:?}", bytes.len());

        let workbook = match file_type {
            FileType::WORKBOOK => decode_workbook(bytes)?,
            FileType::CSV => frame_to_workbook(name, &read_csv(bytes, b',')?)?,
            FileType::TSV => frame_to_workbook(name, &read_csv(bytes, b'\t')?)?,
            FileType::PARQUET => {
                let df = ParquetReader::new(Cursor::new(bytes.to_vec())).finish()?;
                frame_to_workbook(name, &df)?
            }
            FileType::ARROW => {
                let df = IpcReader::new(Cursor::new(bytes.to_vec())).finish()?;
                frame_to_workbook(name, &df)?
            }
        };

        info!(
            "Decoded {} sheet(s) from {name} in {}ms",
            workbook.sheets.len(),
            start_time.elapsed().as_millis()
        );
        Ok(workbook)
    }
}

fn detect_file_type(path: &Path) -> FileType {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => FileType::CSV,
        Some("TSV") | Some("TAB") => FileType::TSV,
        Some("PARQUET") | Some("PQ") => FileType::PARQUET,
        Some("ARROW") | Some("IPC") | Some("FEATHER") => FileType::ARROW,
        // xlsx, xlsm, xlsb, xls, xla, ods and anything unknown: let calamine sniff the format.
        _ => FileType::WORKBOOK,
    }
}

fn decode_workbook(bytes: &[u8]) -> Result<Workbook, SVError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let cells = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect::<Vec<Vec<String>>>();
        trace!("Sheet {name}: {} rows", cells.len());
        sheets.push(Sheet { name, cells });
    }
    Ok(Workbook::new(sheets))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(dt) => datetime_text(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        other => other.to_string(),
    }
}

// Date styled cells are stored as serial numbers; show them as dates instead.
fn datetime_text(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        if let Some(duration) = dt.as_duration() {
            let secs = duration.num_seconds();
            let (h, m, s) = (secs / 3600, (secs % 3600).abs() / 60, secs.abs() % 60);
            return format!("{h}:{m:02}:{s:02}");
        }
    } else if let Some(value) = dt.as_datetime() {
        let pattern = if dt.as_f64() < 1.0 {
            "%H:%M:%S"
        } else if dt.as_f64().fract() == 0.0 {
            "%Y-%m-%d"
        } else {
            "%Y-%m-%d %H:%M:%S"
        };
        return value.format(pattern).to_string();
    }
    dt.as_f64().to_string()
}

// Every column is read as text so cells keep their exact spelling.
fn read_csv(bytes: &[u8], separator: u8) -> Result<DataFrame, PolarsError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| {
            opts.with_separator(separator)
                .with_truncate_ragged_lines(true)
        })
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
}

// Columns are converted to strings in parallel, one rayon task per column.
fn frame_to_workbook(name: &str, df: &DataFrame) -> Result<Workbook, SVError> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let columns = names
        .par_iter()
        .map(|col_name| column_text(df, col_name))
        .collect::<Result<Vec<Vec<String>>, PolarsError>>()?;

    let mut cells = Vec::with_capacity(df.height() + 1);
    cells.push(names);
    for row in 0..df.height() {
        cells.push(columns.iter().map(|c| c[row].clone()).collect());
    }

    let sheet_name = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Sheet1")
        .to_string();
    Ok(Workbook::new(vec![Sheet {
        name: sheet_name,
        cells,
    }]))
}

fn column_text(df: &DataFrame, col_name: &str) -> Result<Vec<String>, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    Ok(series
        .into_iter()
        .map(|value| value.unwrap_or("").to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use ::zip::write::SimpleFileOptions;

    const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/><xf numFmtId="22" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

    fn xlsx_bytes(sheet_xml: &str) -> Vec<u8> {
        let files = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#,
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="People" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
            ),
            ("xl/styles.xml", STYLES_XML),
            ("xl/worksheets/sheet1.xml", sheet_xml),
        ];

        let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer
                .start_file(name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn inline(cell_ref: &str, text: &str) -> String {
        format!(r#"<c r="{cell_ref}" t="inlineStr"><is><t>{text}</t></is></c>"#)
    }

    #[test]
    fn decodes_first_sheet_of_xlsx() {
        let sheet = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1">{}{}</row><row r="2">{}<c r="B2"><v>36</v></c></row><row r="3">{}</row></sheetData></worksheet>"#,
            inline("A1", "name"),
            inline("B1", "age"),
            inline("A2", "Ada"),
            inline("A3", "Grace"),
        );
        let workbook = SheetDecoder.decode("people.xlsx", &xlsx_bytes(&sheet)).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["People"]);

        let records = workbook.first_sheet_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["name", "age"]);
        assert_eq!(records[0].get("age"), Some("36"));
        assert_eq!(records[1].get("name"), Some("Grace"));
        assert_eq!(records[1].get("age"), Some(""));
    }

    #[test]
    fn decodes_csv_with_polars() {
        let bytes = b"id,city,score\n1,Vienna,1.5\n2,,3\n";
        let workbook = SheetDecoder.decode("scores.csv", bytes).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["scores"]);

        let records = workbook.first_sheet_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["id", "city", "score"]);
        assert_eq!(records[0].get("city"), Some("Vienna"));
        assert_eq!(records[1].get("id"), Some("2"));
        assert_eq!(records[1].get("city"), Some(""));
    }

    #[test]
    fn csv_cells_keep_their_text() {
        let mut csv = String::from("code,label\n");
        for i in 0..200 {
            csv.push_str(&format!("{i},row {i}\n"));
        }
        csv.push_str("200,ABC\n");
        let records = SheetDecoder
            .decode("late.csv", csv.as_bytes())
            .unwrap()
            .first_sheet_records()
            .unwrap();
        assert_eq!(records.len(), 201);
        assert_eq!(records[200].get("label"), Some("ABC"));

        let records = SheetDecoder
            .decode("prices.csv", b"zip,price\n01010,1.50\n")
            .unwrap()
            .first_sheet_records()
            .unwrap();
        assert_eq!(records[0].get("zip"), Some("01010"));
        assert_eq!(records[0].get("price"), Some("1.50"));
    }

    #[test]
    fn csv_extra_fields_are_dropped() {
        let records = SheetDecoder
            .decode("ragged.csv", b"a,b\n1,2\n3,4,5\n")
            .unwrap()
            .first_sheet_records()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("b"), Some("4"));
    }

    #[test]
    fn xlsx_dates_show_as_dates() {
        let sheet = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1">{}{}{}</row><row r="2"><c r="A2" s="1"><v>45306</v></c><c r="B2" s="2"><v>45306.5</v></c><c r="C2"><v>45306</v></c></row></sheetData></worksheet>"#,
            inline("A1", "when"),
            inline("B1", "stamp"),
            inline("C1", "plain"),
        );
        let records = SheetDecoder
            .decode("dates.xlsx", &xlsx_bytes(&sheet))
            .unwrap()
            .first_sheet_records()
            .unwrap();
        assert_eq!(records[0].get("when"), Some("2024-01-15"));
        assert_eq!(records[0].get("stamp"), Some("2024-01-15 12:00:00"));
        assert_eq!(records[0].get("plain"), Some("45306"));
    }

    #[test]
    fn decodes_tsv_with_polars() {
        let bytes = b"a\tb\nx\ty\n";
        let records = SheetDecoder
            .decode("data.TSV", bytes)
            .unwrap()
            .first_sheet_records()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("b"), Some("y"));
    }

    #[test]
    fn decodes_parquet_with_polars() {
        let mut df = df!("n" => [1i64, 2, 3], "s" => ["a", "b", "c"]).unwrap();
        let mut buf = Vec::new();
        ParquetWriter::new(&mut buf).finish(&mut df).unwrap();

        let records = SheetDecoder
            .decode("frame.parquet", &buf)
            .unwrap()
            .first_sheet_records()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].get("n"), Some("3"));
        assert_eq!(records[2].get("s"), Some("c"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let bytes = b"\x00\x01 definitely not a workbook";
        assert!(SheetDecoder.decode("broken.xlsx", bytes).is_err());
        assert!(SheetDecoder.decode("unknown.bin", bytes).is_err());
    }

    #[test]
    fn workbook_without_sheets_fails() {
        let workbook = Workbook::default();
        assert!(matches!(
            workbook.first_sheet_records(),
            Err(SVError::DecodeFailure(_))
        ));
    }

    #[test]
    fn file_type_follows_extension() {
        assert_eq!(detect_file_type(Path::new("a.CSV")), FileType::CSV);
        assert_eq!(detect_file_type(Path::new("a.pq")), FileType::PARQUET);
        assert_eq!(detect_file_type(Path::new("a.feather")), FileType::ARROW);
        assert_eq!(detect_file_type(Path::new("a.xlsx")), FileType::WORKBOOK);
        assert_eq!(detect_file_type(Path::new("noext")), FileType::WORKBOOK);
    }
}
