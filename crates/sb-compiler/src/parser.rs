use sb_core::site::{SiteError, SitePattern};
use sb_core::types::SiteEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSite {
    /// Position of the entry in the settings list.
    pub entry_index: usize,
    pub pattern: SitePattern,
    pub url_filter: String,
}

/// Entry that cannot be turned into a well-formed filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSite {
    pub entry_index: usize,
    pub url: String,
    pub error: SiteError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSiteList {
    pub sites: Vec<ParsedSite>,
    pub rejected: Vec<RejectedSite>,
}

pub fn parse_site_list(entries: &[SiteEntry]) -> ParsedSiteList {
    let mut list = ParsedSiteList::default();

    for (entry_index, entry) in entries.iter().enumerate() {
        match SitePattern::parse(&entry.url) {
            Ok(pattern) => {
                let url_filter = pattern.url_filter();
                list.sites.push(ParsedSite {
                    entry_index,
                    pattern,
                    url_filter,
                });
            }
            Err(error) => {
                log::warn!("skipping site entry {:?}: {}", entry.url, error);
                list.rejected.push(RejectedSite {
                    entry_index,
                    url: entry.url.clone(),
                    error,
                });
            }
        }
    }

    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_valid_and_rejected_entries() {
        let entries = vec![
            SiteEntry::new("facebook.com"),
            SiteEntry::new(""),
            SiteEntry::with_category("reddit.com/r/all", "news"),
            SiteEntry::new("ads*.com"),
        ];
        let list = parse_site_list(&entries);

        assert_eq!(list.sites.len(), 2);
        assert_eq!(list.sites[0].entry_index, 0);
        assert_eq!(list.sites[0].url_filter, "||facebook.com^");
        assert_eq!(list.sites[1].entry_index, 2);
        assert_eq!(list.sites[1].url_filter, "reddit.com/r/all");

        assert_eq!(list.rejected.len(), 2);
        assert_eq!(list.rejected[0].error, SiteError::Empty);
        assert_eq!(list.rejected[1].url, "ads*.com");
        assert_eq!(list.rejected[1].error, SiteError::UnsupportedCharacter('*'));
    }
}
