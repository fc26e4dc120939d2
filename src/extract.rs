use std::sync::LazyLock;

use anyhow::{anyhow, Context, Result};
use regex::Regex;

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-testid="vuln-matching-records-count"[^>]*>([^<]*)<"#).unwrap()
});
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<tr[^>]*\bdata-testid="[^"]*"[^>]*>(.*?)</tr>"#).unwrap());
static TH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<th[^>]*>(.*?)</th>").unwrap());
static P_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<p[^>]*>(.*?)</p>").unwrap());
static PUBLISHED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span[^>]*data-testid="vuln-published-on-[^"]*"[^>]*>(.*?)</span>"#).unwrap()
});
static CVSS3_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span[^>]*\bid="cvss3-link"[^>]*>(.*?)</span>"#).unwrap()
});
static CVSS2_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span[^>]*\bid="cvss2-link"[^>]*>(.*?)</span>"#).unwrap()
});
static TAG_STRIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// One row of the vulnerability search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CveRecord {
    pub id: String,
    pub description: String,
    pub published: String,
    /// "<v3 score>/<v2 score>", either side falling back to an explicit
    /// "not available" marker.
    pub cvss: String,
}

/// Where a field's text lives inside a result row. All markup-shape
/// assumptions are confined to this table.
struct FieldRule {
    name: &'static str,
    pattern: &'static LazyLock<Regex>,
    fallback: Option<&'static str>,
}

static RULES: [FieldRule; 5] = [
    FieldRule {
        name: "id",
        pattern: &TH_RE,
        fallback: None,
    },
    FieldRule {
        name: "description",
        pattern: &P_RE,
        fallback: None,
    },
    FieldRule {
        name: "published",
        pattern: &PUBLISHED_RE,
        fallback: None,
    },
    FieldRule {
        name: "cvss3",
        pattern: &CVSS3_RE,
        fallback: Some("V3.x:(not available)"),
    },
    FieldRule {
        name: "cvss2",
        pattern: &CVSS2_RE,
        fallback: Some("V2.x:(not available)"),
    },
];

/// Declared total from the "matching records" element. Errors if the
/// element is absent or its text is not a number.
pub fn record_count(page: &str) -> Result<u32> {
    let caps = COUNT_RE
        .captures(page)
        .ok_or_else(|| anyhow!("matching-records count not found in results page"))?;
    let text = clean_text(&caps[1]);
    text.replace(',', "")
        .parse()
        .with_context(|| format!("matching-records count {:?} is not a number", text))
}

/// Extract every tagged result row from a page. Rows without a
/// data-testid attribute (table headers and the like) are skipped; an
/// empty result set is not an error.
pub fn records(page: &str) -> Result<Vec<CveRecord>> {
    let mut out = Vec::new();
    for (i, caps) in ROW_RE.captures_iter(page).enumerate() {
        let rec = extract_row(&caps[1]).with_context(|| format!("result row {}", i))?;
        out.push(rec);
    }
    Ok(out)
}

fn extract_row(row: &str) -> Result<CveRecord> {
    let id = field(row, "id")?;
    let description = field(row, "description")?;
    let published = field(row, "published")?;
    let cvss3 = field(row, "cvss3")?;
    let cvss2 = field(row, "cvss2")?;
    Ok(CveRecord {
        id,
        description,
        published,
        cvss: format!("{}/{}", cvss3, cvss2),
    })
}

fn field(row: &str, name: &str) -> Result<String> {
    let rule = RULES
        .iter()
        .find(|r| r.name == name)
        .ok_or_else(|| anyhow!("no extraction rule for {}", name))?;
    let text = rule
        .pattern
        .captures(row)
        .map(|c| clean_text(&c[1]))
        .filter(|t| !t.is_empty());
    match (text, rule.fallback) {
        (Some(t), _) => Ok(t),
        (None, Some(fb)) => Ok(fb.to_string()),
        (None, None) => Err(anyhow!("missing {} element", name)),
    }
}

/// Strip tags, decode the common entities, collapse whitespace.
fn clean_text(html: &str) -> String {
    let text = TAG_STRIP_RE.replace_all(html, " ");
    let text = decode_entities(&text);
    WS_RE.replace_all(&text, " ").trim().to_string()
}

fn decode_entities(s: &str) -> String {
    // &amp; last so "&amp;lt;" decodes to "&lt;", not "<".
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
