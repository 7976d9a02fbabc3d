use std::collections::HashSet;

use crate::parser::ParsedSite;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    /// Entries whose filter repeats an earlier one.
    pub deduped: usize,
}

/// Drop entries repeating an earlier filter and order the rest by filter.
///
/// Distinct entries always keep their own rule, even when a listed parent
/// domain already covers them. The resulting order is independent of the order entries were added in,
/// which keeps rule id assignment stable across list edits.
pub fn optimize_sites(sites: &mut Vec<ParsedSite>) -> OptimizeStats {
    let before = sites.len();

    let mut seen: HashSet<String> = HashSet::new();
    let mut deduped = 0usize;
    sites.retain(|site| {
        if seen.insert(site.url_filter.clone()) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    sites.sort_by(|a, b| a.url_filter.cmp(&b.url_filter));

    OptimizeStats {
        before,
        after: sites.len(),
        deduped,
    }
}
