use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type ReportRow = Map<String, Value>;

/// Column limit of an XLSX worksheet.
pub const MAX_XLSX_COLUMNS: usize = 16_384;

/// How a spreadsheet download is laid out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub sheet_name: String,
    /// Write the column names as the first row.
    pub include_header: bool,
    /// Leading columns to drop, e.g. a row number the API prepends.
    pub skip_columns: usize,
}

impl SheetLayout {
    pub fn named(sheet_name: &str) -> Self {
        SheetLayout {
            sheet_name: sheet_name.to_string(),
            include_header: true,
            skip_columns: 0,
        }
    }
}

/// How a delimited flat-file download is laid out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatFileLayout {
    pub delimiter: char,
    /// Leading data rows to drop before writing.
    pub skip_rows: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Xlsx(SheetLayout),
    FlatFile(FlatFileLayout),
}

impl OutputFormat {
    pub fn file_name(&self, report_name: &str) -> String {
        match self {
            OutputFormat::Xlsx(layout) => format!("{}.xlsx", layout.sheet_name),
            OutputFormat::FlatFile(_) => format!("report_{}.cdf", report_name),
        }
    }
}

/// Header and trailer lines wrapped around a flat-file report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderTrailer {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub header: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub trail: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Extract report rows from a report-generation response.
///
/// Accepts a bare array of row objects, or an object carrying the rows under `data`.
/// An object with a `message` (or `success: false`) is an upstream error.
///
/// # Arguments
/// * `response` - The decoded JSON body
///
/// # Returns
/// * `Result<Vec<ReportRow>, ReportError>` - The rows, or why there are none
pub fn parse_report_rows(response: Value) -> Result<Vec<ReportRow>, ReportError> {
    let rows = match response {
        Value::Array(rows) => rows,
        Value::Object(mut map) => {
            let failed = matches!(map.get("success"), Some(Value::Bool(false)));
            match map.remove("data") {
                Some(Value::Array(rows)) if !failed => rows,
                _ => {
                    let message = map
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    return Err(match message {
                        Some(message) => ReportError::Upstream(message),
                        None if failed => ReportError::NoData,
                        None => ReportError::UnexpectedShape("expected an array of rows".to_string()),
                    });
                }
            }
        }
        _ => {
            return Err(ReportError::UnexpectedShape(
                "expected an array of rows".to_string(),
            ));
        }
    };

    let rows: Vec<ReportRow> = rows
        .into_iter()
        .filter_map(|row| match row {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();

    if rows.is_empty() {
        return Err(ReportError::NoData);
    }
    Ok(rows)
}

/// Column names, taken from the first row in key order.
pub fn columns(rows: &[ReportRow]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

/// Convert report rows to CSV format
///
/// Values containing commas, quotes or newlines are quoted, with quotes doubled.
///
/// # Arguments
/// * `rows` - Rows returned by the report endpoint
/// * `layout` - Header and column options
///
/// # Returns
/// * `String` - CSV content
pub fn to_csv(rows: &[ReportRow], layout: &SheetLayout) -> String {
    let columns: Vec<String> = columns(rows).into_iter().skip(layout.skip_columns).collect();
    let mut csv_content = String::new();

    if layout.include_header {
        let header: Vec<String> = columns.iter().map(|c| escape_csv(c)).collect();
        csv_content.push_str(&header.join(","));
        csv_content.push('\n');
    }

    for row in rows {
        let line: Vec<String> = columns
            .iter()
            .map(|c| escape_csv(&cell_text(row.get(c))))
            .collect();
        csv_content.push_str(&line.join(","));
        csv_content.push('\n');
    }

    csv_content
}

/// Convert report rows to XLSX format
///
/// Numbers and booleans keep their type; every other value is written as text and
/// nulls are left blank.
///
/// # Arguments
/// * `rows` - Rows returned by the report endpoint
/// * `layout` - Sheet name, header and column options
///
/// # Returns
/// * `Result<Vec<u8>, ReportError>` - XLSX file content as bytes or an error
pub fn to_xlsx(rows: &[ReportRow], layout: &SheetLayout) -> Result<Vec<u8>, ReportError> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let columns: Vec<String> = columns(rows).into_iter().skip(layout.skip_columns).collect();
    if columns.len() > MAX_XLSX_COLUMNS {
        return Err(ReportError::TooManyColumns {
            count: columns.len(),
            max: MAX_XLSX_COLUMNS,
        });
    }
    let column = |c: usize| {
        u16::try_from(c).map_err(|_| ReportError::TooManyColumns {
            count: columns.len(),
            max: MAX_XLSX_COLUMNS,
        })
    };

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(&layout.sheet_name)?;

    let mut r: u32 = 0;
    if layout.include_header {
        for (c, name) in columns.iter().enumerate() {
            worksheet.write_string(r, column(c)?, name)?;
        }
        r += 1;
    }

    for row in rows {
        for (c, name) in columns.iter().enumerate() {
            let c = column(c)?;
            match row.get(name) {
                None | Some(Value::Null) => {}
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(f) => {
                        worksheet.write_number(r, c, f)?;
                    }
                    None => {
                        worksheet.write_string(r, c, &n.to_string())?;
                    }
                },
                Some(Value::Bool(b)) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Some(other) => {
                    worksheet.write_string(r, c, &cell_text(Some(other)))?;
                }
            }
        }
        r += 1;
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

/// Convert report rows to a delimited flat file wrapped in header and trailer.
///
/// Values are trimmed and joined with the layout's delimiter, one row per line, after
/// dropping `skip_rows` leading rows.
///
/// # Examples
/// ```
/// use report_console::downloader::{to_flat_file, FlatFileLayout, HeaderTrailer};
/// use serde_json::json;
///
/// let rows = vec![
///     json!({ "a": "skip", "b": 0 }).as_object().unwrap().clone(),
///     json!({ "a": " x ", "b": 1 }).as_object().unwrap().clone(),
/// ];
/// let layout = FlatFileLayout { delimiter: '~', skip_rows: 1 };
/// let wrap = HeaderTrailer { header: "HDR".into(), trail: "TRL".into() };
/// assert_eq!(to_flat_file(&rows, &layout, &wrap), "HDR\nx~1\nTRL");
/// ```
pub fn to_flat_file(rows: &[ReportRow], layout: &FlatFileLayout, wrap: &HeaderTrailer) -> String {
    let delimiter = layout.delimiter.to_string();
    let body: Vec<String> = rows
        .iter()
        .skip(layout.skip_rows)
        .map(|row| {
            row.values()
                .map(|v| cell_text(Some(v)).trim().to_string())
                .collect::<Vec<_>>()
                .join(&delimiter)
        })
        .collect();

    format!("{}\n{}\n{}", wrap.header, body.join("\n"), wrap.trail)
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
