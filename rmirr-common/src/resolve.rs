//! Longest-prefix resolution of a path to the mirror rule that owns it

use std::cmp::Ordering;

use crate::endpoint::{is_within, join_relative, normalize_path};
use crate::mirrors::MirrorRule;

/// The rule owning a queried path and the mount point that matched
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    /// The queried path
    pub query: String,
    /// The rule's own source path
    pub root_path: String,
    /// The candidate that matched: the source path or source path plus alias
    pub alias_path: String,
    pub rule: &'a MirrorRule,
}

impl Resolution<'_> {
    /// Part of the query below the matched candidate, without a leading separator
    pub fn relative_path(&self) -> &str {
        self.query
            .strip_prefix(&self.alias_path)
            .unwrap_or("")
            .trim_start_matches('/')
    }

    pub fn matched_alias(&self) -> bool {
        self.alias_path != self.root_path
    }
}

/// All mount points a rule owns: its source path and one per alias name
///
/// Alias candidates are lexically normalized, so `sub/` and `./sub` name the
/// same mount point as `sub`.
pub fn candidate_roots(rule: &MirrorRule) -> Vec<String> {
    let Some(root) = rule.source.path.as_deref() else {
        return Vec::new();
    };

    std::iter::once(root.to_string())
        .chain(
            rule.alias_names
                .iter()
                .map(|alias| normalize_path(&join_relative(root, alias))),
        )
        .collect()
}

/// Find the rule whose candidate root is the longest prefix of `query`
///
/// A candidate matches when it equals the query or is followed in the query
/// by a separator. Equal-length matches can only come from duplicated mount
/// points; they are broken by rule name and then source string so the result
/// never depends on rule order.
pub fn resolve<'a>(query: &str, rules: &'a [MirrorRule]) -> Option<Resolution<'a>> {
    let mut best: Option<Resolution<'a>> = None;

    for rule in rules {
        let Some(root) = rule.source.path.as_deref() else {
            continue;
        };

        for candidate in candidate_roots(rule) {
            if !is_within(query, &candidate) {
                continue;
            }

            let better = match &best {
                None => true,
                Some(current) => prefer(&candidate, rule, current) == Ordering::Greater,
            };
            log::debug!(
                "query {} candidate {} (rule {}) better={}",
                query,
                candidate,
                rule.display_name(),
                better
            );

            if better {
                best = Some(Resolution {
                    query: query.to_string(),
                    root_path: root.to_string(),
                    alias_path: candidate,
                    rule,
                });
            }
        }
    }

    best
}

fn prefer(candidate: &str, rule: &MirrorRule, current: &Resolution<'_>) -> Ordering {
    candidate
        .len()
        .cmp(&current.alias_path.len())
        .then_with(|| {
            // Smaller key wins the tie, hence the reversed comparison
            tie_key(current.rule).cmp(&tie_key(rule))
        })
}

fn tie_key(rule: &MirrorRule) -> (String, String) {
    (
        rule.name.clone().unwrap_or_default(),
        rule.source.to_string(),
    )
}
