use crate::error::AnalysisError;
use crate::table::Table;

/// Serialize a table to CSV: header row, no index column, missing values as
/// empty fields. This is the payload of the `cleaned_data.csv` download.
pub fn to_csv(table: &Table) -> Result<String, AnalysisError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(table.columns.iter().map(|c| c.name.as_str()))?;
    for r in 0..table.height() {
        writer.write_record(table.columns.iter().map(|c| c.values[r].to_field()))?;
    }

    let bytes = writer.into_inner().map_err(|e| {
        AnalysisError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    })?;
    String::from_utf8(bytes).map_err(|e| {
        AnalysisError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::{self, CleaningDirective};
    use crate::loader::from_csv;

    #[test]
    fn header_row_and_no_index_column() {
        let table = from_csv(b"a,b\n1,2\n3,4\n").unwrap();
        let csv = to_csv(&table).unwrap();
        assert_eq!(csv, "a,b\n1,2\n3,4\n");
    }

    #[test]
    fn round_trip_with_no_cleaning_reproduces_the_data() {
        let original = b"name,score\nalice,1.5\nbob,2\n";
        let table = from_csv(original).unwrap();
        let cleaned = cleaner::apply(&table, CleaningDirective::None);
        let csv = to_csv(&cleaned).unwrap();
        assert_eq!(csv.as_bytes(), original);
    }

    #[test]
    fn missing_values_export_as_empty_fields() {
        let table = from_csv(b"a,b\n1,\n,x\n").unwrap();
        let csv = to_csv(&table).unwrap();
        assert_eq!(csv, "a,b\n1,\n,x\n");
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let table = from_csv(b"a\n\"x, y\"\n").unwrap();
        let csv = to_csv(&table).unwrap();
        assert_eq!(csv, "a\n\"x, y\"\n");
    }
}
