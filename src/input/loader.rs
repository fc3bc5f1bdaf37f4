//! Load model points from CSV
//!
//! The first row is a header. One column (configurable, `id` by default)
//! identifies the model point; every other column becomes a field.

use super::ModelPoint;
use anyhow::{bail, Context, Result};
use csv::Reader;
use std::collections::HashSet;
use std::path::Path;

/// Load all model points from a CSV file
pub fn load_model_points<P: AsRef<Path>>(path: P, id_column: &str) -> Result<Vec<ModelPoint>> {
    let path = path.as_ref();
    let reader = Reader::from_path(path)
        .with_context(|| format!("failed to open model points file {}", path.display()))?;
    let points = read_points(reader, id_column)
        .with_context(|| format!("failed to read model points from {}", path.display()))?;

    log::info!("Loaded {} model point(s) from {}", points.len(), path.display());
    Ok(points)
}

/// Load model points from any reader (e.g., string buffer, network stream)
pub fn load_model_points_from_reader<R: std::io::Read>(
    reader: R,
    id_column: &str,
) -> Result<Vec<ModelPoint>> {
    read_points(Reader::from_reader(reader), id_column)
}

fn read_points<R: std::io::Read>(mut reader: Reader<R>, id_column: &str) -> Result<Vec<ModelPoint>> {
    let headers = reader.headers()?.clone();
    let id_index = headers
        .iter()
        .position(|h| h == id_column)
        .with_context(|| format!("id column '{}' not found in header", id_column))?;

    let mut points = Vec::new();
    let mut seen = HashSet::new();

    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed row {}", row + 1))?;
        let id = record.get(id_index).unwrap_or_default().trim().to_string();
        if !seen.insert(id.clone()) {
            bail!("duplicate model point id '{}' at row {}", id, row + 1);
        }

        let mut point = ModelPoint::new(id);
        for (i, (header, value)) in headers.iter().zip(record.iter()).enumerate() {
            if i != id_index {
                point.set(header, value.trim());
            }
        }
        points.push(point);
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
policy,sum_assured,remaining_term,product
A1,1000,5,endowment
A2,2500.5,10,endowment
";

    #[test]
    fn test_load_from_reader() {
        let points = load_model_points_from_reader(SAMPLE.as_bytes(), "policy").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].id(), "A1");
        assert_eq!(points[1].number("sum_assured").unwrap(), 2500.5);
        assert_eq!(points[1].text("product").unwrap(), "endowment");
        assert!(points[0].get("policy").is_none());
    }

    #[test]
    fn test_missing_id_column() {
        let err = load_model_points_from_reader(SAMPLE.as_bytes(), "id").unwrap_err();
        assert!(err.to_string().contains("id column 'id'"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let data = "id,x\n1,2\n1,3\n";
        assert!(load_model_points_from_reader(data.as_bytes(), "id").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let points = load_model_points(file.path(), "policy").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].number("remaining_term").unwrap(), 5.0);
    }
}
