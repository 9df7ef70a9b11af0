//! Result tables.
//!
//! A sweep produces one table per decoherence scale `mu`, each row holding
//! a cluster radius, a (p, q) pair and the measured rate. Tables are written
//! as tab-separated text with a `k\tp\tq\tr` header.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Header line of every result table.
pub const HEADER: &str = "k\tp\tq\tr";

/// One measured point of the parameter grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResultRow {
    pub mu: f64,
    pub k: usize,
    pub p: f64,
    pub q: f64,
    pub rate: f64,
}

/// Receiver of result rows, grouped into one table per `mu`.
///
/// Calls arrive as `begin_table`, any number of `push_row`, then
/// `finish_table`, repeated for every decoherence scale of the sweep.
pub trait RowSink {
    fn begin_table(&mut self, mu: f64) -> Result<()>;
    fn push_row(&mut self, row: &ResultRow) -> Result<()>;
    fn finish_table(&mut self) -> Result<()>;
}

/// Collects rows in memory.
impl RowSink for Vec<ResultRow> {
    fn begin_table(&mut self, _mu: f64) -> Result<()> {
        Ok(())
    }

    fn push_row(&mut self, row: &ResultRow) -> Result<()> {
        self.push(*row);
        Ok(())
    }

    fn finish_table(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Run attributes embedded in every result file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunTag {
    /// Side length of the grid.
    pub size: usize,
    pub alice: usize,
    pub bob: usize,
}

/// Returns the file name of the table for decoherence scale `mu`.
///
/// `mu` is printed with six decimals, so scales that differ only beyond
/// that precision share a file name.
pub fn result_file_name(mu: f64, tag: RunTag) -> String {
    format!(
        "results_mu={:.6}_L={},A={},B={}.txt",
        mu, tag.size, tag.alice, tag.bob
    )
}

/// Writes every table to its own file in an output directory.
///
/// The directory is created on the first table, so a sweep that never
/// produces output leaves the file system untouched.
pub struct ResultFiles {
    dir: PathBuf,
    tag: RunTag,
    current: Option<(PathBuf, BufWriter<File>)>,
    written: Vec<PathBuf>,
}

impl ResultFiles {
    pub fn new<P: AsRef<Path>>(dir: P, tag: RunTag) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            tag,
            current: None,
            written: Vec::new(),
        }
    }

    /// Paths of the tables finished so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl RowSink for ResultFiles {
    fn begin_table(&mut self, mu: f64) -> Result<()> {
        self.finish_table()?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory {}", self.dir.display()))?;

        let path = self.dir.join(result_file_name(mu, self.tag));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create result file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{HEADER}")?;
        self.current = Some((path, writer));
        Ok(())
    }

    fn push_row(&mut self, row: &ResultRow) -> Result<()> {
        let (path, writer) = self
            .current
            .as_mut()
            .context("Result row pushed outside of a table")?;
        writeln!(writer, "{}\t{}\t{}\t{}", row.k, row.p, row.q, row.rate)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn finish_table(&mut self) -> Result<()> {
        if let Some((path, mut writer)) = self.current.take() {
            writer
                .flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
            self.written.push(path);
        }
        Ok(())
    }
}
