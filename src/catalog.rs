use anyhow::{Context, Result};
use serde::Deserialize;

use crate::net::{Client, Decode};

const PRODUCTS_URL: &str = "https://nvd.nist.gov/rest/public/cpe/products";
const VENDORS_URL: &str = "https://nvd.nist.gov/rest/public/cpe/vendors";
const VERSIONS_URL: &str = "https://nvd.nist.gov/rest/public/cpe/versions";

#[derive(Debug, Deserialize)]
pub struct ComponentsResponse {
    #[serde(default)]
    pub components: Vec<Component>,
}

/// One product/vendor/version entry from a CPE catalog endpoint.
#[derive(Debug, Deserialize)]
pub struct Component {
    #[serde(rename = "componentName")]
    pub component_name: String,
    #[serde(rename = "cpeUri", default)]
    pub cpe_uri: Option<String>,
}

async fn components(net: &Client, url: &str, params: &[(&str, &str)]) -> Result<Vec<Component>> {
    let value = net.request(url, params, Decode::Json).await?.into_json()?;
    let resp: ComponentsResponse = serde_json::from_value(value)
        .with_context(|| format!("unexpected component list shape from {}", url))?;
    Ok(resp.components)
}

/// True iff the CPE dictionary has any product matching `product` as a prefix.
pub async fn product_exists(net: &Client, product: &str) -> Result<bool> {
    let comps = components(
        net,
        PRODUCTS_URL,
        &[("serviceType", "productList"), ("startsWith", product)],
    )
    .await?;
    Ok(!comps.is_empty())
}

/// Vendors that declare the product, possibly empty.
pub async fn vendors_for(net: &Client, product: &str) -> Result<Vec<String>> {
    let comps = components(
        net,
        VENDORS_URL,
        &[("serviceType", "vendors"), ("product", product)],
    )
    .await?;
    Ok(comps.into_iter().map(|c| c.component_name).collect())
}

/// Versions a vendor declares for the product, filtered by a starts-with
/// prefix. The version token is the trailing segment of each cpeUri.
pub async fn versions_for(
    net: &Client,
    product: &str,
    vendor: &str,
    version_prefix: &str,
) -> Result<Vec<String>> {
    let comps = components(
        net,
        VERSIONS_URL,
        &[
            ("serviceType", "versionList"),
            ("product", product),
            ("vendor", vendor),
            ("startsWith", version_prefix),
        ],
    )
    .await?;
    Ok(comps
        .into_iter()
        .filter_map(|c| c.cpe_uri)
        .filter_map(|uri| version_token(&uri).map(str::to_string))
        .collect())
}

/// "cpe:/a:openbsd:openssh:7.4" -> "7.4"
fn version_token(uri: &str) -> Option<&str> {
    uri.rsplit(':').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_list_parses() {
        let raw = r#"{
            "totalRows": 2,
            "components": [
                {"componentName": "openbsd", "cpeUri": "cpe:/a:openbsd"},
                {"componentName": "openssh"}
            ]
        }"#;
        let resp: ComponentsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.components.len(), 2);
        assert_eq!(resp.components[0].component_name, "openbsd");
        assert_eq!(resp.components[1].cpe_uri, None);
    }

    #[test]
    fn absent_components_means_empty() {
        let resp: ComponentsResponse = serde_json::from_str(r#"{"totalRows": 0}"#).unwrap();
        assert!(resp.components.is_empty());
    }

    #[test]
    fn version_token_takes_trailing_segment() {
        assert_eq!(version_token("cpe:/a:openbsd:openssh:7.4"), Some("7.4"));
        assert_eq!(version_token("cpe:/a:openbsd:openssh:7.4:p1"), Some("p1"));
        assert_eq!(version_token("cpe:/a:openbsd:openssh:"), None);
    }
}
