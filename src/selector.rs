//! Page-range selection.

use std::collections::BTreeSet;

/// Which pages of a document to process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageRange {
    /// Every page.
    #[default]
    All,
    /// Pages 1, 3, 5, ... (1-based).
    Odd,
    /// Pages 2, 4, 6, ... (1-based).
    Even,
    /// A selection string such as `"2-5,7"`, 1-based.
    Custom(String),
}

/// Resolve a range to sorted, de-duplicated 0-based page indices.
///
/// `Custom` strings are comma-separated parts, each either a single page
/// number or an `a-b` span (bounds are swapped when reversed). Whitespace
/// is ignored, out-of-bounds pages are dropped, and unparsable parts
/// contribute nothing. An empty result is the caller's cue to fall back
/// to all pages.
pub fn select_pages(range: &PageRange, total: usize) -> Vec<usize> {
    match range {
        PageRange::All => (0..total).collect(),
        PageRange::Odd => (0..total).filter(|i| (i + 1) % 2 == 1).collect(),
        PageRange::Even => (0..total).filter(|i| (i + 1) % 2 == 0).collect(),
        PageRange::Custom(spec) => parse_custom_range(spec, total),
    }
}

fn parse_custom_range(spec: &str, total: usize) -> Vec<usize> {
    let normalized: String = spec.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pages: BTreeSet<usize> = BTreeSet::new();

    for part in normalized.split(',') {
        if part.is_empty() {
            continue;
        }

        if let Some((lo, hi)) = part.split_once('-') {
            let (Some(lo), Some(hi)) = (parse_page(lo), parse_page(hi)) else {
                continue;
            };
            let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };
            for page in lo..=hi {
                if page <= total {
                    pages.insert(page - 1);
                }
            }
        } else if let Some(page) = parse_page(part) {
            if page <= total {
                pages.insert(page - 1);
            }
        }
    }

    pages.into_iter().collect()
}

fn parse_page(s: &str) -> Option<usize> {
    s.parse::<usize>().ok().filter(|&n| n >= 1)
}
