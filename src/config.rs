//! Run settings resolved from the command line and environment.

use crate::error::{Error, Result};
use crate::loader::ReportFormat;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Settings {
    pub report: PathBuf,
    pub format: Option<ReportFormat>,
    pub reference: PathBuf,
    pub out_dir: Option<PathBuf>,
    pub preview_rows: usize,
}

impl Settings {
    /// Resolve the reference workbook, falling back to a scan of `search_dir`
    /// when none was given.
    pub fn resolve(
        report: PathBuf,
        format: Option<ReportFormat>,
        reference: Option<PathBuf>,
        search_dir: &Path,
        out_dir: Option<PathBuf>,
        preview_rows: usize,
    ) -> Result<Self> {
        let reference = match reference {
            Some(p) => p,
            None => discover_reference(search_dir, &report)?,
        };
        Ok(Settings {
            report,
            format,
            reference,
            out_dir,
            preview_rows,
        })
    }
}

fn is_workbook(path: &Path) -> bool {
    // `~$name.xlsx` is the lock file Office keeps next to an open workbook.
    let is_lock_file = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"));
    let has_workbook_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            matches!(
                e.to_ascii_lowercase().as_str(),
                "xlsx" | "xlsm" | "xls" | "ods"
            )
        });
    has_workbook_ext && !is_lock_file
}

/// Find the single workbook in `dir`, ignoring the report being analysed.
pub fn discover_reference(dir: &Path, report: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let report_path = report.canonicalize().ok();

    let mut candidates: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if !path.is_file() || !is_workbook(&path) {
            continue;
        }
        let same_as_report = report_path.is_some() && path.canonicalize().ok() == report_path;
        if !same_as_report {
            candidates.push(path);
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(Error::ReferenceDiscovery(format!(
            "no reference workbook found in {}",
            dir.display()
        ))),
        1 => {
            let found = candidates.remove(0);
            info!(path = %found.display(), "using discovered reference workbook");
            Ok(found)
        }
        _ => Err(Error::ReferenceDiscovery(format!(
            "several candidate workbooks in {} ({}); pass one explicitly",
            dir.display(),
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}
