//! CSV loaders for the two run inputs: the address list and the API keys.

use crate::common::{Address, ApiKey, Error, Result};
use std::path::Path;

/// Column holding one API key per row in a keys file.
pub const KEY_COLUMN: &str = "key";

/// Reads the `column` values of a headed CSV file, in file order.
///
/// Values are taken verbatim (address keys are compared byte-for-byte), so
/// every row is dispatched, including empty cells and duplicates.
///
/// # Errors
///
/// - [`Error::MissingColumn`] if the header has no `column`.
/// - [`Error::Csv`] if the file cannot be opened or parsed.
pub fn read_addresses(path: impl AsRef<Path>, column: &str) -> Result<Vec<Address>> {
    read_column(path.as_ref(), column, |value| Some(Address::from(value)))
}

/// Reads the `key` column of a headed CSV file. Keys are trimmed and blank
/// rows dropped.
///
/// # Errors
///
/// - [`Error::MissingColumn`] if the header has no `key` column.
/// - [`Error::Csv`] if the file cannot be opened or parsed.
pub fn read_api_keys(path: impl AsRef<Path>) -> Result<Vec<ApiKey>> {
    read_column(path.as_ref(), KEY_COLUMN, |value| {
        let value = value.trim();
        (!value.is_empty()).then(|| ApiKey::from(value))
    })
}

fn read_column<T>(
    path: &Path,
    column: &str,
    mut parse: impl FnMut(&str) -> Option<T>,
) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let idx = reader
        .headers()?
        .iter()
        .position(|header| header.trim_start_matches('\u{feff}') == column)
        .ok_or_else(|| Error::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(idx).and_then(&mut parse) {
            values.push(value);
        }
    }
    tracing::debug!("Read {} `{column}` values from {}", values.len(), path.display());
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn addresses_keep_order_duplicates_and_empty_cells() {
        let file = csv_file("id,address,price\n1,\"Тверская ул., 7\",10\n2,,11\n3,Арбат 1,12\n4,Арбат 1,13\n");
        let addresses = read_addresses(file.path(), "address").unwrap();
        assert_eq!(
            addresses,
            [
                Address::from("Тверская ул., 7"),
                Address::from(""),
                Address::from("Арбат 1"),
                Address::from("Арбат 1"),
            ]
        );
    }

    #[test]
    fn missing_address_column_is_reported() {
        let file = csv_file("id,street\n1,Арбат\n");
        let err = read_addresses(file.path(), "address").unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "address"));
    }

    #[test]
    fn keys_are_trimmed_and_blanks_dropped() {
        let file = csv_file("\u{feff}key,owner\n  k1 ,a\n\t,b\nk2,c\n");
        let keys: Vec<_> = read_api_keys(file.path())
            .unwrap()
            .iter()
            .map(|k| k.expose().to_string())
            .collect();
        assert_eq!(keys, ["k1", "k2"]);
    }

    #[test]
    fn unreadable_file_is_a_csv_error() {
        let err = read_api_keys("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, Error::Csv(_)));
    }
}
