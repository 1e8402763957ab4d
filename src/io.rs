use crate::report::{ParetoPoint, Solution};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory: {}", dir.display()))?;
        }
    }
    Ok(())
}

pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// `<stem>.<suffix>.json` next to `path`. Fails rather than return `path` itself.
pub fn sibling_path(path: &Path, suffix: &str) -> Result<PathBuf> {
    let stem = match path.file_stem() {
        Some(stem) => stem.to_string_lossy(),
        None => bail!("output path has no file name: {}", path.display()),
    };
    let sibling = path.with_file_name(format!("{}.{}.json", stem, suffix));
    if sibling == path {
        bail!("{} output would overwrite {}", suffix, path.display());
    }
    Ok(sibling)
}

/// Quote a CSV field, doubling embedded quotes.
fn quote_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Pareto front as CSV, one row per plotted point.
pub struct CsvWriter {
    w: BufWriter<File>,
}

impl CsvWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let f = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self { w: BufWriter::new(f) })
    }

    pub fn write_header(&mut self) -> Result<()> {
        writeln!(
            self.w,
            "solution_id,cost,coverage,coverage_percentage,num_stations,stations"
        )?;
        Ok(())
    }

    pub fn write_row(&mut self, point: &ParetoPoint, solution: &Solution) -> Result<()> {
        let names: Vec<&str> = solution
            .selected_stations
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        writeln!(
            self.w,
            "{},{:.2},{},{:.4},{},{}",
            point.solution_id,
            point.cost,
            point.coverage,
            point.coverage_percentage,
            names.len(),
            quote_field(&names.join(";"))
        )?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Station;

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("pareto.csv");

        let solution = Solution {
            id: 2,
            cost: 150000.0,
            coverage: 40,
            coverage_percentage: 20.0,
            selected_stations: vec![Station {
                id: 1,
                name: "Baner".to_string(),
                lat: 18.563,
                lon: 73.789,
                cost: 150000.0,
                radius: None,
            }],
            rank: 0,
        };
        let point = ParetoPoint {
            cost: 150000.0,
            coverage: 40,
            coverage_percentage: 20.0,
            solution_id: 2,
        };

        let mut w = CsvWriter::create(&path).unwrap();
        w.write_header().unwrap();
        w.write_row(&point, &solution).unwrap();
        w.flush().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "2,150000.00,40,20.0000,1,\"Baner\"");
    }

    #[test]
    fn test_csv_quotes_in_station_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pareto.csv");

        let solution = Solution {
            id: 1,
            cost: 5.0,
            coverage: 1,
            coverage_percentage: 100.0,
            selected_stations: vec![Station {
                id: 0,
                name: "Park \"North\", Gate".to_string(),
                lat: 0.0,
                lon: 0.0,
                cost: 5.0,
                radius: None,
            }],
            rank: 0,
        };
        let point = ParetoPoint {
            cost: 5.0,
            coverage: 1,
            coverage_percentage: 100.0,
            solution_id: 1,
        };

        let mut w = CsvWriter::create(&path).unwrap();
        w.write_row(&point, &solution).unwrap();
        w.flush().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), "1,5.00,1,100.0000,1,\"Park \"\"North\"\", Gate\"");
    }

    #[test]
    fn test_sibling_path() {
        let p = sibling_path(Path::new("out/response.json"), "summary").unwrap();
        assert_eq!(p, PathBuf::from("out/response.summary.json"));

        // No extension: still a distinct file next to the response
        let p = sibling_path(Path::new("out/resp"), "summary").unwrap();
        assert_eq!(p, PathBuf::from("out/resp.summary.json"));

        let p = sibling_path(Path::new("x.json.d/resp.json"), "summary").unwrap();
        assert_eq!(p, PathBuf::from("x.json.d/resp.summary.json"));

        assert!(sibling_path(Path::new(".."), "summary").is_err());
    }

    #[test]
    fn test_write_json_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}
