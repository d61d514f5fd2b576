//! CSV export of input addresses joined with their coordinates.

use anyhow::Context;
use geoshard::{Address, Coordinates};
use std::path::Path;
use tempfile::NamedTempFile;

/// Writes `address,latitude,longitude` rows to `path`, leaving both
/// coordinates empty for addresses without usable coordinates.
///
/// The file is written next to its destination and renamed into place, so
/// an existing file is only ever replaced by a complete one.
pub fn write_merged_csv(path: &Path, rows: &[(Address, Option<Coordinates>)]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;

    let mut writer = csv::Writer::from_writer(temp);
    writer.write_record(["address", "latitude", "longitude"])?;
    for (address, coordinates) in rows {
        let (latitude, longitude) = match coordinates {
            Some(c) => (c.latitude.to_string(), c.longitude.to_string()),
            None => (String::new(), String::new()),
        };
        writer.write_record([address.as_str(), &latitude, &longitude])?;
    }

    let temp = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush {}: {}", path.display(), e.error()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("failed to sync {}", temp.path().display()))?;
    temp.persist(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_rows_in_order_with_blank_coordinates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![
            (Address::from("Арбат 1"), Some(Coordinates::new(55.75, 37.59))),
            (Address::from("nowhere, 0"), None),
        ];

        write_merged_csv(&path, &rows).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "address,latitude,longitude\nАрбат 1,55.75,37.59\n\"nowhere, 0\",,\n"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "stale").unwrap();

        write_merged_csv(&path, &[]).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "address,latitude,longitude\n"
        );
    }
}
