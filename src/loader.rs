use crate::error::AnalysisError;
use crate::table::Table;
use calamine::{Data, Reader, Xls, Xlsx};
use log::info;
use std::io::Cursor;

/// Parse an uploaded file into a [`Table`], dispatching on the filename
/// extension.
///
/// `.csv` files are parsed as comma-separated values with a header row;
/// `.xlsx`/`.xls` files are parsed from their first sheet, first row as the
/// header. Any other extension fails with
/// [`AnalysisError::UnsupportedFormat`] and produces no table.
pub fn load_table(data: &[u8], filename: &str) -> Result<Table, AnalysisError> {
    let extension = filename
        .rsplit('.')
        .next()
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    let table = match extension.as_str() {
        "csv" => from_csv(data)?,
        "xlsx" => from_xlsx(data)?,
        "xls" => from_xls(data)?,
        _ => return Err(AnalysisError::UnsupportedFormat),
    };

    info!(
        "loaded '{}': {} rows x {} columns",
        filename,
        table.height(),
        table.width()
    );
    Ok(table)
}

/// Parse CSV bytes (header row expected) into a table.
pub fn from_csv(data: &[u8]) -> Result<Table, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.is_empty() {
        return Err(AnalysisError::EmptyFile);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }

    Ok(Table::from_records(headers, rows))
}

/// Parse xlsx bytes; first sheet only.
pub fn from_xlsx(data: &[u8]) -> Result<Table, AnalysisError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(data.to_vec()))
        .map_err(|e| AnalysisError::Spreadsheet(e.to_string()))?;
    let names = workbook.sheet_names();
    let sheet = first_sheet_name(&names)?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| AnalysisError::Spreadsheet(e.to_string()))?;
    table_from_range(&range)
}

/// Parse legacy xls bytes; first sheet only.
pub fn from_xls(data: &[u8]) -> Result<Table, AnalysisError> {
    let mut workbook: Xls<_> = Xls::new(Cursor::new(data.to_vec()))
        .map_err(|e| AnalysisError::Spreadsheet(e.to_string()))?;
    let names = workbook.sheet_names();
    let sheet = first_sheet_name(&names)?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| AnalysisError::Spreadsheet(e.to_string()))?;
    table_from_range(&range)
}

fn first_sheet_name(names: &[String]) -> Result<String, AnalysisError> {
    names
        .first()
        .cloned()
        .ok_or_else(|| AnalysisError::Spreadsheet("workbook has no sheets".to_string()))
}

fn table_from_range(range: &calamine::Range<Data>) -> Result<Table, AnalysisError> {
    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<String>>());

    let headers = rows.next().ok_or(AnalysisError::EmptyFile)?;
    Ok(Table::from_records(headers, rows.collect()))
}

// Stringify a spreadsheet cell; the table layer re-infers types from the
// string form, the same way CSV cells are handled.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
