//! Neighbor hand-over analysis.
//!
//! Reads a neighbor hand-over report, ranks the target cells with the worst
//! hand-over success rate for the report's source site, and places the sites
//! involved on a map using a reference workbook.
//!
//! ```no_run
//! use nbr_ho_analysis::{geo::SiteLocationTable, loader, pipeline::Analysis};
//! use std::path::Path;
//!
//! let upload = loader::load_report(Path::new("NBR_HO_Analysis.csv"), None, 5)?;
//! let locations = SiteLocationTable::load(Path::new("sites.xlsx"))?;
//! let analysis = Analysis::run(&upload, &locations)?;
//! println!("{} worst cells", analysis.ranking.cells.len());
//! # Ok::<(), nbr_ho_analysis::error::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod reports;
pub mod types;
pub mod util;

pub use error::{Error, Result};
pub use pipeline::Analysis;
