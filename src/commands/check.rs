//! Check content integrity

use anyhow::Result;

use crate::check::{self, Report};
use crate::Site;

/// Check every document and print diagnostics; fails when any error is found
pub fn run(site: &Site, drafts: bool) -> Result<Report> {
    let report = check::check_site(site, drafts)?;

    for diagnostic in &report.diagnostics {
        println!("{}", diagnostic);
    }
    println!(
        "Checked {} files: {} errors, {} warnings",
        report.files,
        report.errors(),
        report.warnings()
    );

    if report.has_errors() {
        anyhow::bail!("{} errors found in {:?}", report.errors(), site.content_dir);
    }
    Ok(report)
}
