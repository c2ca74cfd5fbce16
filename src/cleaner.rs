use crate::table::{Column, Table, Value};
use log::info;

/// Missing-value strategy selected by the user for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleaningDirective {
    /// Leave the table untouched.
    None,
    /// Remove every row containing at least one missing value.
    DropMissing,
    /// Fill missing values in numeric columns with the column mean.
    FillMean,
    /// Fill missing values in numeric columns with the column median.
    FillMedian,
    /// Fill missing values in every column with its most frequent value.
    FillMode,
}

impl CleaningDirective {
    /// Map the upload form's `clean_option` value. Absent or unrecognized
    /// values mean "do nothing".
    pub fn from_form(value: Option<&str>) -> Self {
        match value {
            Some("drop_na") => CleaningDirective::DropMissing,
            Some("fill_mean") => CleaningDirective::FillMean,
            Some("fill_median") => CleaningDirective::FillMedian,
            Some("fill_mode") => CleaningDirective::FillMode,
            _ => CleaningDirective::None,
        }
    }
}

/// Apply a cleaning directive, producing a new table. The input is never
/// mutated. An empty table passes through every directive unchanged.
pub fn apply(table: &Table, directive: CleaningDirective) -> Table {
    let cleaned = match directive {
        CleaningDirective::None => table.clone(),
        CleaningDirective::DropMissing => table.drop_missing_rows(),
        CleaningDirective::FillMean => fill_numeric(table, |c| c.mean()),
        CleaningDirective::FillMedian => fill_numeric(table, |c| c.median()),
        CleaningDirective::FillMode => fill_mode(table),
    };
    info!(
        "cleaning {:?}: {} rows -> {} rows, {} missing values remain",
        directive,
        table.height(),
        cleaned.height(),
        cleaned.total_missing()
    );
    cleaned
}

// Fill missing values in numeric columns with a per-column statistic.
// Non-numeric columns are untouched; a numeric column with no observed
// value has no statistic and stays missing.
fn fill_numeric(table: &Table, stat: impl Fn(&Column) -> Option<f64>) -> Table {
    let columns = table
        .columns
        .iter()
        .map(|col| {
            if !col.is_numeric() {
                return col.clone();
            }
            match stat(col) {
                Some(fill) => replace_missing(col, Value::Number(fill)),
                None => col.clone(),
            }
        })
        .collect();
    Table { columns }
}

fn fill_mode(table: &Table) -> Table {
    let columns = table
        .columns
        .iter()
        .map(|col| match col.mode() {
            Some(fill) => replace_missing(col, fill),
            None => col.clone(),
        })
        .collect();
    Table { columns }
}

fn replace_missing(col: &Column, fill: Value) -> Column {
    Column {
        name: col.name.clone(),
        ty: col.ty,
        values: col
            .values
            .iter()
            .map(|v| if v.is_missing() { fill.clone() } else { v.clone() })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::from_csv;
    use crate::table::ColumnType;

    const SAMPLE: &[u8] = b"a,b\n1,\n,4\n5,6\n";

    fn table_values(table: &Table, col: usize) -> Vec<Value> {
        table.columns[col].values.clone()
    }

    #[test]
    fn form_values_map_to_directives() {
        assert_eq!(
            CleaningDirective::from_form(Some("drop_na")),
            CleaningDirective::DropMissing
        );
        assert_eq!(
            CleaningDirective::from_form(Some("fill_mode")),
            CleaningDirective::FillMode
        );
        assert_eq!(CleaningDirective::from_form(None), CleaningDirective::None);
        assert_eq!(
            CleaningDirective::from_form(Some("banana")),
            CleaningDirective::None
        );
    }

    #[test]
    fn fill_mean_uses_per_column_means() {
        let table = from_csv(SAMPLE).unwrap();
        let cleaned = apply(&table, CleaningDirective::FillMean);

        // mean(1, 5) = 3, mean(4, 6) = 5
        assert_eq!(
            table_values(&cleaned, 0),
            vec![Value::Number(1.0), Value::Number(3.0), Value::Number(5.0)]
        );
        assert_eq!(
            table_values(&cleaned, 1),
            vec![Value::Number(5.0), Value::Number(4.0), Value::Number(6.0)]
        );
        assert_eq!(cleaned.total_missing(), 0);
    }

    #[test]
    fn drop_missing_keeps_only_complete_rows() {
        let table = from_csv(SAMPLE).unwrap();
        let cleaned = apply(&table, CleaningDirective::DropMissing);

        assert_eq!(cleaned.height(), 1);
        assert_eq!(table_values(&cleaned, 0), vec![Value::Number(5.0)]);
        assert_eq!(table_values(&cleaned, 1), vec![Value::Number(6.0)]);
        assert_eq!(cleaned.total_missing(), 0);
    }

    #[test]
    fn fill_median_leaves_non_numeric_columns_alone() {
        let table = from_csv(b"x,label\n1,a\n3,\n10,b\n").unwrap();
        let cleaned = apply(&table, CleaningDirective::FillMedian);

        assert_eq!(cleaned.columns[1].ty, ColumnType::Text);
        // Text column still has its missing value; numeric column does not.
        assert_eq!(cleaned.columns[1].missing_count(), 1);
        assert_eq!(cleaned.columns[0].missing_count(), 0);
    }

    #[test]
    fn fill_mode_fills_every_column() {
        let table = from_csv(b"n,label\n1,a\n1,b\n,a\n2,\n").unwrap();
        let cleaned = apply(&table, CleaningDirective::FillMode);

        assert_eq!(cleaned.total_missing(), 0);
        assert_eq!(cleaned.columns[0].values[2], Value::Number(1.0));
        assert_eq!(cleaned.columns[1].values[3], Value::Text("a".into()));
    }

    #[test]
    fn clean_table_is_unchanged_by_every_directive() {
        let table = from_csv(b"a,b\n1,x\n2,y\n").unwrap();
        for directive in [
            CleaningDirective::None,
            CleaningDirective::DropMissing,
            CleaningDirective::FillMean,
            CleaningDirective::FillMedian,
            CleaningDirective::FillMode,
        ] {
            let cleaned = apply(&table, directive);
            assert_eq!(cleaned.height(), table.height());
            for (a, b) in cleaned.columns.iter().zip(table.columns.iter()) {
                assert_eq!(a.values, b.values, "directive {:?}", directive);
            }
        }
    }

    #[test]
    fn empty_table_passes_through_every_directive() {
        let table = from_csv(b"a,b\n").unwrap();
        for directive in [
            CleaningDirective::DropMissing,
            CleaningDirective::FillMean,
            CleaningDirective::FillMedian,
            CleaningDirective::FillMode,
        ] {
            let cleaned = apply(&table, directive);
            assert!(cleaned.is_empty());
            assert_eq!(cleaned.width(), 2);
        }
    }

    #[test]
    fn all_missing_column_stays_missing_for_mean_fill() {
        let table = from_csv(b"a,b\n1,\n2,\n").unwrap();
        let cleaned = apply(&table, CleaningDirective::FillMean);
        assert_eq!(cleaned.columns[1].missing_count(), 2);
    }
}
