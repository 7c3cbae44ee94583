// Entry point and high-level CLI flow.
//
// One invocation analyses one uploaded report:
// - the report is parsed and a preview of its head is printed,
// - the worst target cells are ranked and geolocated,
// - both tables are printed and, unless disabled, exported with a JSON
//   summary and a GeoJSON map layer.
use anyhow::Context;
use clap::Parser;
use nbr_ho_analysis::config::Settings;
use nbr_ho_analysis::geo::SiteLocationTable;
use nbr_ho_analysis::loader::{self, ReportFormat, ReportUpload, DEFAULT_PREVIEW_ROWS};
use nbr_ho_analysis::output;
use nbr_ho_analysis::pipeline::Analysis;
use nbr_ho_analysis::reports::{MIN_TRAFFIC_SHARE, WORST_CELL_LIMIT};
use nbr_ho_analysis::util;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "nbr-ho-analysis",
    about = "Rank the worst neighbor hand-over targets of a site and map them"
)]
struct Args {
    /// Neighbor hand-over report (semicolon csv or xlsx)
    #[arg(long)]
    report: PathBuf,

    /// Report encoding; sniffed from the file name when omitted
    #[arg(long, value_enum)]
    format: Option<ReportFormat>,

    /// Workbook with the MRBTS-Cascade and Cascade Coordinates sheets
    #[arg(long, env = "NBR_HO_REFERENCE")]
    reference: Option<PathBuf>,

    /// Directory for the exported tables
    #[arg(long, env = "NBR_HO_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Rows of the uploaded report to preview
    #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
    preview_rows: usize,

    /// Print the tables without writing any file
    #[arg(long)]
    no_export: bool,
}

fn print_upload(upload: &ReportUpload, settings: &Settings) {
    println!("{}", upload.file_name);
    if let Some(modified) = output::file_modified(&settings.report) {
        println!("{}", modified.format("%Y-%m-%d %H:%M:%S"));
    }
    println!();
    println!("{}\n", output::render_upload_preview(upload));
    println!(
        "Processing report... ({} rows loaded, {} skipped without a valid eci_id)\n",
        util::format_int(upload.load_report.total_rows as u64),
        util::format_int(upload.load_report.invalid_rows as u64)
    );
}

fn print_analysis(analysis: &Analysis) {
    println!("Source site: {}\n", analysis.source_site);

    println!("Cells with worst HOSR in ascending order");
    println!(
        "(Top {}, >{}% of preparations)\n",
        WORST_CELL_LIMIT,
        util::format_number(MIN_TRAFFIC_SHARE * 100.0, 1)
    );
    output::preview_table_rows(
        &output::ranked_rows(&analysis.ranking.cells),
        WORST_CELL_LIMIT,
    );

    println!("MRBTS / Cascade coordinates\n");
    output::preview_table_rows(&output::site_rows(&analysis.sites), analysis.sites.len());
    if analysis.summary.sites_missing_coordinates > 0 {
        println!(
            "Note: {} site(s) have no coordinates and are left off the map.\n",
            analysis.summary.sites_missing_coordinates
        );
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let out_dir = if args.no_export {
        None
    } else {
        Some(args.out_dir)
    };
    let settings = Settings::resolve(
        args.report,
        args.format,
        args.reference,
        &cwd,
        out_dir,
        args.preview_rows,
    )?;

    let upload = loader::load_report(&settings.report, settings.format, settings.preview_rows)?;
    print_upload(&upload, &settings);

    let locations = SiteLocationTable::load(&settings.reference)?;
    let analysis = Analysis::run(&upload, &locations)?;
    print_analysis(&analysis);

    if let Some(dir) = &settings.out_dir {
        let written = output::export_analysis(&analysis, dir)?;
        println!("Outputs saved:");
        for path in written {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nbr_ho_analysis=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = failure_message(&e);
            // RUST_LOG can filter the event out; the message always reaches stderr.
            eprintln!("{}", message);
            error!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn failure_message(e: &anyhow::Error) -> String {
    format!("There was an error processing this file: {:#}", e)
}
