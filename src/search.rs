use anyhow::Result;

use crate::net::{Client, Decode};

const SEARCH_URL: &str = "https://nvd.nist.gov/vuln/search/results";

/// The search UI returns at most 20 results per page.
pub const PAGE_SIZE: u32 = 20;

/// Composite CPE identifiers the advanced search form expects.
fn cpe_params(vendor: &str, product: &str, version: &str) -> (String, String, String) {
    (
        format!("cpe:/:{vendor}"),
        format!("cpe:/::{product}"),
        format!("cpe:/:{vendor}:{product}:{version}"),
    )
}

/// Fetch one page of search results markup, starting at `offset`.
pub async fn fetch_page(
    net: &Client,
    vendor: &str,
    product: &str,
    version: &str,
    offset: u32,
) -> Result<String> {
    let (cpe_vendor, cpe_product, cpe_version) = cpe_params(vendor, product, version);
    let start_index = offset.to_string();
    let params = [
        ("form_type", "Advanced"),
        ("results_type", "overview"),
        ("search_type", "all"),
        ("cpe_vendor", cpe_vendor.as_str()),
        ("cpe_product", cpe_product.as_str()),
        ("cpe_version", cpe_version.as_str()),
        ("startIndex", start_index.as_str()),
    ];
    net.request(SEARCH_URL, &params, Decode::Html)
        .await?
        .into_html()
}

/// Pagination bookkeeping for one vendor's result walk. The offset always
/// advances by the fixed page size; the remaining count shrinks by the
/// records actually seen, so a short last page ends the walk cleanly.
pub struct Pager {
    remaining: i64,
    offset: u32,
}

impl Pager {
    pub fn new(total: u32) -> Self {
        Self {
            remaining: i64::from(total),
            offset: 0,
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Account for one consumed page. Returns true if another page should
    /// be fetched. A page with no records ends the walk regardless of the
    /// declared total.
    pub fn advance(&mut self, records_on_page: usize) -> bool {
        if records_on_page == 0 {
            self.remaining = 0;
            return false;
        }
        self.remaining -= records_on_page as i64;
        self.offset += PAGE_SIZE;
        self.remaining > 0
    }

    pub fn expected_pages(total: u32) -> u32 {
        total.div_ceil(PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpe_identifiers_use_fixed_colon_format() {
        let (vendor, product, version) = cpe_params("openbsd", "openssh", "7.4");
        assert_eq!(vendor, "cpe:/:openbsd");
        assert_eq!(product, "cpe:/::openssh");
        assert_eq!(version, "cpe:/:openbsd:openssh:7.4");
    }

    #[test]
    fn offsets_step_by_page_size() {
        let mut pager = Pager::new(45);
        let mut offsets = vec![pager.offset()];
        while pager.advance(PAGE_SIZE as usize) {
            offsets.push(pager.offset());
        }
        assert_eq!(offsets, vec![0, 20, 40]);
    }

    #[test]
    fn full_pages_need_ceil_n_over_20_fetches() {
        for (total, pages) in [(1u32, 1u32), (20, 1), (21, 2), (45, 3), (60, 3)] {
            assert_eq!(Pager::expected_pages(total), pages);

            let mut pager = Pager::new(total);
            let mut fetched = 1;
            let mut left = total as usize;
            loop {
                let on_page = left.min(PAGE_SIZE as usize);
                left -= on_page;
                if !pager.advance(on_page) {
                    break;
                }
                fetched += 1;
            }
            assert_eq!(fetched, pages, "total={}", total);
        }
    }

    #[test]
    fn drifted_result_set_still_terminates() {
        // Declared 45 but the site only has 25: a short page keeps the walk
        // alive, the following empty page ends it.
        let mut pager = Pager::new(45);
        assert!(pager.advance(20));
        assert!(pager.advance(5));
        assert!(!pager.advance(0));
    }

    #[test]
    fn empty_page_ends_walk() {
        let mut pager = Pager::new(45);
        assert!(pager.advance(20));
        assert!(!pager.advance(0));
    }
}
