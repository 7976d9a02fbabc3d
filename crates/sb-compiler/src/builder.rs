use std::collections::HashSet;

use sb_core::hash::{next_rule_id, rule_id_for};
use sb_core::types::{Rule, Settings};

use crate::optimizer::{optimize_sites, OptimizeStats};
use crate::parser::{parse_site_list, ParsedSite, RejectedSite};

/// Declarative rules for one settings snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledRuleSet {
    pub rules: Vec<Rule>,
    pub rejected: Vec<RejectedSite>,
    pub stats: OptimizeStats,
    /// False when blocking is switched off; `rules` is then empty.
    pub blocking_enabled: bool,
}

/// Assign rule ids and build one block rule per site.
///
/// Each id is derived from the filter text, so a site keeps its id when
/// other entries are added or removed. Hash collisions are resolved by
/// probing upwards, in the order `sites` is given.
pub fn build_rules(sites: &[ParsedSite]) -> Vec<Rule> {
    let mut used: HashSet<u32> = HashSet::with_capacity(sites.len());
    let mut rules = Vec::with_capacity(sites.len());

    for site in sites {
        let mut id = rule_id_for(&site.url_filter);
        while !used.insert(id) {
            log::debug!("rule id {} taken, probing for {}", id, site.url_filter);
            id = next_rule_id(id);
        }
        rules.push(Rule::block_navigation(id, site.url_filter.clone()));
    }

    rules
}

/// Compile the rule set a snapshot should install.
///
/// Entries that fail validation are reported in `rejected` and never turn
/// into rules; the remaining entries still compile.
pub fn compile_settings(settings: &Settings) -> CompiledRuleSet {
    let parsed = parse_site_list(&settings.sites);
    let mut sites = parsed.sites;
    let stats = optimize_sites(&mut sites);

    let blocking_enabled = settings.blocking_enabled();
    let rules = if blocking_enabled {
        build_rules(&sites)
    } else {
        Vec::new()
    };

    CompiledRuleSet {
        rules,
        rejected: parsed.rejected,
        stats,
        blocking_enabled,
    }
}

/// Serialize rules as a declarative ruleset file.
pub fn ruleset_to_json(rules: &[Rule]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rules)
}
