//! Headerless CSV loading for supervised datasets.

use std::fs::File;
use std::io::{BufRead as _, BufReader};
use std::path::Path;

use anyhow::{Context as _, ensure};

use oxcsf_engine::Dataset;

/// Loads a dataset whose rows hold `x_dim` feature columns followed by
/// `y_dim` target columns.
pub fn load_dataset(path: &Path, x_dim: usize, y_dim: usize) -> anyhow::Result<Dataset> {
    let (values, width) = load_matrix(path)?;
    ensure!(
        width == x_dim + y_dim,
        "{} has {width} columns, expected {} (x) + {} (y)",
        path.display(),
        x_dim,
        y_dim
    );
    let n_samples = values.len() / width;
    let mut x = Vec::with_capacity(n_samples * x_dim);
    let mut y = Vec::with_capacity(n_samples * y_dim);
    for row in values.chunks(width) {
        x.extend_from_slice(&row[..x_dim]);
        y.extend_from_slice(&row[x_dim..]);
    }
    Ok(Dataset::new(x, y, x_dim, y_dim)?)
}

/// Loads a rectangular numeric matrix; returns the values row-major along
/// with the column count.
pub fn load_matrix(path: &Path) -> anyhow::Result<(Vec<f64>, usize)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut values = Vec::new();
    let mut width = None;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut cols = 0;
        for field in line.split(',') {
            let value: f64 = field
                .trim()
                .parse()
                .with_context(|| format!("{}:{}: bad number {field:?}", path.display(), line_no + 1))?;
            values.push(value);
            cols += 1;
        }
        match width {
            None => width = Some(cols),
            Some(w) => ensure!(
                w == cols,
                "{}:{}: ragged row ({cols} columns, expected {w})",
                path.display(),
                line_no + 1
            ),
        }
    }
    let width = width.context("empty csv file")?;
    Ok((values, width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_tmp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("oxcsf-csv-{name}-{}", std::process::id()));
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_features_and_targets() {
        let path = write_tmp("ok", "0.1, 0.2, 1.0\n0.3, 0.4, 2.0\n\n");
        let data = load_dataset(&path, 2, 1).unwrap();
        assert_eq!(data.n_samples(), 2);
        assert_eq!(data.x_row(1), &[0.3, 0.4]);
        assert_eq!(data.y_row(1), &[2.0]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_ragged_and_bad_rows() {
        let ragged = write_tmp("ragged", "1,2,3\n1,2\n");
        assert!(load_matrix(&ragged).is_err());
        let _ = std::fs::remove_file(&ragged);

        let bad = write_tmp("bad", "1,x,3\n");
        assert!(load_matrix(&bad).is_err());
        let _ = std::fs::remove_file(&bad);
    }

    #[test]
    fn rejects_wrong_column_count() {
        let path = write_tmp("cols", "1,2,3\n");
        assert!(load_dataset(&path, 3, 1).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
