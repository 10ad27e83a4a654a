//! CSV export of a scored table

use crate::error::{DashboardError, Result};
use crate::types::ScoredTable;

/// File name offered to the browser
pub const EXPORT_FILE_NAME: &str = "predictions.csv";

/// Columns appended after the uploaded columns, in order
pub const APPENDED_COLUMNS: [&str; 3] = ["fraud_probability", "predicted_label", "desc_length"];

/// Serialize the scored table: every uploaded column, then the appended
/// columns. An uploaded column that already carries one of the appended
/// names is overwritten in place rather than duplicated.
pub fn to_csv(table: &ScoredTable) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let raw = table.raw();
    let existing: Vec<Option<usize>> = APPENDED_COLUMNS
        .iter()
        .map(|name| raw.column_index(name))
        .collect();

    let mut header: Vec<&str> = raw.headers().iter().map(String::as_str).collect();
    for (name, slot) in APPENDED_COLUMNS.iter().zip(&existing) {
        if slot.is_none() {
            header.push(*name);
        }
    }
    writer.write_record(&header).map_err(export_error)?;

    for row in table.rows() {
        let mut record: Vec<String> = raw.rows()[row.index].clone();
        let appended = [
            row.probability.to_string(),
            row.label.as_u8().to_string(),
            row.desc_length.to_string(),
        ];
        for (value, slot) in appended.into_iter().zip(&existing) {
            match slot {
                Some(i) => record[*i] = value,
                None => record.push(value),
            }
        }
        writer.write_record(&record).map_err(export_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| DashboardError::Io(e.into_error()))
}

fn export_error(err: csv::Error) -> DashboardError {
    DashboardError::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawTable;

    fn scored() -> ScoredTable {
        let csv = "job_id,title,location,description,telecommuting,has_company_logo\n\
            1,Data Entry,\"US, NY\",\"Line one\nline two\",1,0\n\
            2,Engineer,DE,,0,1\n";
        let raw = RawTable::from_reader(csv.as_bytes(), "t.csv").unwrap();
        let cols = raw.listing_columns().unwrap();
        ScoredTable::new(raw, cols, vec![0.5, 0.125], 0.5)
    }

    #[test]
    fn test_export_reparses_to_same_shape() {
        let table = scored();
        let bytes = to_csv(&table).unwrap();
        assert!(!bytes.is_empty());

        let back = RawTable::from_reader(bytes.as_slice(), EXPORT_FILE_NAME).unwrap();
        assert_eq!(back.len(), table.len());

        let mut expected: Vec<String> = table.raw().headers().to_vec();
        expected.extend(APPENDED_COLUMNS.iter().map(|s| s.to_string()));
        assert_eq!(back.headers(), expected.as_slice());

        let prob = back.column_index("fraud_probability").unwrap();
        let label = back.column_index("predicted_label").unwrap();
        let desc = back.column_index("desc_length").unwrap();
        assert_eq!(back.cell(0, prob), "0.5");
        assert_eq!(back.cell(0, label), "1");
        assert_eq!(back.cell(1, label), "0");
        assert_eq!(back.cell(0, desc), "17");
        assert_eq!(back.cell(0, back.column_index("location").unwrap()), "US, NY");
    }

    #[test]
    fn test_existing_output_columns_are_overwritten() {
        let csv = "title,location,description,telecommuting,has_company_logo,fraud_probability\n\
            A,US,abc,0,1,stale\n";
        let raw = RawTable::from_reader(csv.as_bytes(), "t.csv").unwrap();
        let cols = raw.listing_columns().unwrap();
        let table = ScoredTable::new(raw, cols, vec![0.75], 0.5);

        let bytes = to_csv(&table).unwrap();
        let back = RawTable::from_reader(bytes.as_slice(), EXPORT_FILE_NAME).unwrap();

        assert_eq!(back.headers().len(), 6 + 2);
        let named = |name: &str| back.headers().iter().filter(|h| h.as_str() == name).count();
        assert_eq!(named("fraud_probability"), 1);
        // overwritten where the upload had it
        assert_eq!(back.column_index("fraud_probability"), Some(5));
        assert_eq!(back.cell(0, 5), "0.75");
        assert_eq!(back.cell(0, back.column_index("predicted_label").unwrap()), "1");
        assert_eq!(back.cell(0, back.column_index("desc_length").unwrap()), "3");
    }
}
