//! Anchor discovery for link-scrape jobs.

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// A file referenced by an anchor on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedFile {
    pub url: String,
    /// Everything after the last `/` of the resolved URL.
    pub file_name: String,
}

/// Every anchor target on `html`, resolved against `base`, in document order.
///
/// Anchors without `href`, targets that fail to resolve, and targets ending
/// in `/` are skipped. Duplicates are kept.
pub fn extract_links(html: &str, base: &Url) -> Vec<LinkedFile> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| match base.join(href) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                debug!(href, error = %e, "Skipping unresolvable link");
                None
            }
        })
        .filter_map(|resolved| {
            let url = resolved.to_string();
            let file_name = url.rsplit('/').next().unwrap_or_default().to_string();
            (!file_name.is_empty()).then_some(LinkedFile { url, file_name })
        })
        .collect()
}
