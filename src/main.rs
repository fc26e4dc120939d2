mod catalog;
mod extract;
mod net;
mod search;
mod xlsx;

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::extract::CveRecord;
use crate::net::Client;
use crate::search::Pager;
use crate::xlsx::Sheet;

#[derive(Parser)]
#[command(name = "nvd_scraper", about = "Fetch CVE records for a product/version from NVD")]
struct Cli {
    /// Product name as known to the NVD CPE dictionary
    product: String,
    /// Product version string
    version: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let net = Client::new();
    let mut sheet = Sheet::create(xlsx::OUTPUT_PATH)?;

    let outcome = run_query(&net, &mut sheet, &cli.product, &cli.version).await;

    // Flush whatever was collected even when the run failed partway.
    let finalized = sheet.finalize();
    let counts = outcome?;
    finalized?;

    counts.print();

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("Done in {}", format_duration(elapsed));
    }

    Ok(())
}

#[derive(Default)]
struct RunCounts {
    vendors: usize,
    records: usize,
}

impl RunCounts {
    fn print(&self) {
        println!(
            "Saved {} record(s) from {} vendor(s).",
            self.records, self.vendors,
        );
    }
}

/// Top-level driver: existence check, vendor iteration, pagination.
/// Not-found outcomes log and return normally; transport and extraction
/// failures propagate.
async fn run_query(
    net: &Client,
    sheet: &mut Sheet,
    product: &str,
    version: &str,
) -> Result<RunCounts> {
    let mut counts = RunCounts::default();

    if !catalog::product_exists(net, product).await? {
        info!("product {} not found in the CPE dictionary", product);
        return Ok(counts);
    }

    let vendors = catalog::vendors_for(net, product).await?;
    info!("{} vendor(s) listed for {}", vendors.len(), product);

    for vendor in &vendors {
        let versions = catalog::versions_for(net, product, vendor, version).await?;
        if !versions.iter().any(|v| v == version) {
            info!(
                "vendor {}: version {} not among supported versions {:?}",
                vendor, version, versions
            );
            continue;
        }
        info!("vendor {}: version {} supported, fetching search results", vendor, version);
        counts.vendors += 1;
        counts.records += paginate(net, sheet, vendor, product, version).await?;
    }

    Ok(counts)
}

/// Walk every results page for one vendor, appending each record to the
/// sheet. The first row of the vendor's group carries the product/version
/// identity columns.
async fn paginate(
    net: &Client,
    sheet: &mut Sheet,
    vendor: &str,
    product: &str,
    version: &str,
) -> Result<usize> {
    let mut page = search::fetch_page(net, vendor, product, version, 0).await?;
    let total = extract::record_count(&page)?;
    info!("{} matching record(s) declared", total);
    if total == 0 {
        return Ok(0);
    }

    let pb = ProgressBar::new(u64::from(Pager::expected_pages(total)));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages")?
            .progress_chars("=> "),
    );

    let mut pager = Pager::new(total);
    let mut written = 0usize;
    loop {
        let records = extract::records(&page)?;
        for rec in &records {
            append_record(sheet, product, version, rec, written == 0)?;
            written += 1;
        }
        pb.inc(1);
        if !pager.advance(records.len()) {
            break;
        }
        page = search::fetch_page(net, vendor, product, version, pager.offset()).await?;
    }
    pb.finish_and_clear();

    if written as u64 != u64::from(total) {
        warn!("retrieved {} record(s), results page declared {}", written, total);
    }
    Ok(written)
}

fn append_record(
    sheet: &mut Sheet,
    product: &str,
    version: &str,
    rec: &CveRecord,
    first_in_group: bool,
) -> Result<()> {
    let mut fields = Vec::with_capacity(6);
    if first_in_group {
        fields.push(product.to_string());
        fields.push(version.to_string());
    }
    fields.extend([
        rec.id.clone(),
        rec.description.clone(),
        rec.published.clone(),
        rec.cvss.clone(),
    ]);
    sheet.append_row(&fields, first_in_group)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
