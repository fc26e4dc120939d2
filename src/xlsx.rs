use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;
use tracing::info;

pub const OUTPUT_PATH: &str = "results.xlsx";

/// Exclusive writer over the output workbook. The row cursor only moves
/// forward; callers never address rows directly.
pub struct Sheet {
    workbook: Workbook,
    row: u32,
    path: PathBuf,
}

impl Sheet {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        // product, version, id, description, published, cvss
        for (col, width) in [(0, 14), (1, 10), (2, 18), (3, 80), (4, 28), (5, 32)] {
            worksheet.set_column_width(col, width)?;
        }
        Ok(Self {
            workbook,
            row: 0,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Write `fields` left-to-right into the next row. Continuation rows
    /// leave the two identity columns blank and start at column 2. The
    /// cursor advances once per call regardless of field count.
    pub fn append_row(&mut self, fields: &[String], first_in_group: bool) -> Result<()> {
        let worksheet = self.workbook.worksheet_from_index(0)?;
        let mut col: u16 = if first_in_group { 0 } else { 2 };
        for field in fields {
            worksheet.write(self.row, col, field)?;
            col += 1;
        }
        self.row += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u32 {
        self.row
    }

    /// Flush the workbook to disk. Consumes the sink; call exactly once.
    pub fn finalize(mut self) -> Result<()> {
        self.workbook
            .save(&self.path)
            .with_context(|| format!("failed to save {}", self.path.display()))?;
        info!("wrote {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_fields() -> Vec<String> {
        ["CVE-2021-41617", "sshd bug", "September 26, 2021", "V3.1: 7.0 HIGH/V2.0: 4.4 MEDIUM"]
            .map(String::from)
            .to_vec()
    }

    #[test]
    fn cursor_advances_once_per_append() {
        let mut sheet = Sheet::create("unused.xlsx").unwrap();
        assert_eq!(sheet.rows_written(), 0);

        let mut first = vec!["openssh".to_string(), "7.4".to_string()];
        first.extend(record_fields());
        sheet.append_row(&first, true).unwrap();
        sheet.append_row(&record_fields(), false).unwrap();
        sheet.append_row(&record_fields(), false).unwrap();
        assert_eq!(sheet.rows_written(), 3);
    }

    #[test]
    fn finalize_writes_the_file() {
        let path = std::env::temp_dir().join("nvd_scraper_sheet_test.xlsx");
        let _ = std::fs::remove_file(&path);

        let mut sheet = Sheet::create(&path).unwrap();
        let mut first = vec!["openssh".to_string(), "7.4".to_string()];
        first.extend(record_fields());
        sheet.append_row(&first, true).unwrap();
        sheet.finalize().unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.len() > 0);
        std::fs::remove_file(&path).unwrap();
    }
}
