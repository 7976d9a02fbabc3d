//! SiteBlockr Rule Compiler
//!
//! This crate compiles a settings snapshot into the declarative rule set the
//! browser engine should hold: entries are parsed and validated, redundant
//! ones are dropped, and every remaining pattern gets a stable rule id.

pub mod parser;
pub mod optimizer;
pub mod builder;

pub use builder::{build_rules, compile_settings, ruleset_to_json, CompiledRuleSet};
pub use optimizer::{optimize_sites, OptimizeStats};
pub use parser::{parse_site_list, ParsedSite, ParsedSiteList, RejectedSite};
