use crate::utils::error::{PlatformError, Result};
use serde::Serialize;

/// Serializes flat rows to CSV with a header taken from the field names.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PlatformError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| PlatformError::validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row<'a> {
        name: &'a str,
        count: u32,
    }

    #[test]
    fn test_to_csv_quotes_fields() {
        let rows = [
            Row { name: "Adyar", count: 3 },
            Row { name: "T Nagar, Market", count: 0 },
        ];
        let out = to_csv(&rows).unwrap();
        assert_eq!(out, "name,count\nAdyar,3\n\"T Nagar, Market\",0\n");
    }

    #[test]
    fn test_to_csv_empty_has_no_header() {
        let rows: Vec<Row> = Vec::new();
        assert_eq!(to_csv(&rows).unwrap(), "");
    }
}
