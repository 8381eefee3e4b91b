//! Нечёткий поиск символов по рабочей области.

use serde::Serialize;

use crate::parser::Symbol;
use crate::workspace::WorkspaceSnapshot;

/// Качество совпадения; меньше значит лучше
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MatchRank {
    Prefix,
    Substring,
    Subsequence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceSymbolMatch {
    pub symbol: Symbol,
    pub rank: MatchRank,
}

/// Rank of `name` against an already lower-cased query
pub fn match_rank(name: &str, query: &str) -> Option<MatchRank> {
    let name = name.to_lowercase();
    if name.starts_with(query) {
        Some(MatchRank::Prefix)
    } else if name.contains(query) {
        Some(MatchRank::Substring)
    } else if is_subsequence(&name, query) {
        Some(MatchRank::Subsequence)
    } else {
        None
    }
}

fn is_subsequence(haystack: &str, needle: &str) -> bool {
    let mut rest = haystack.chars();
    needle.chars().all(|c| rest.any(|h| h == c))
}

/// Module-scope symbols of the snapshot matching `query`.
/// Prefix matches come first, then substring, then subsequence; ties are
/// ordered by name, then path, then line.
pub fn search_symbols(snapshot: &WorkspaceSnapshot, query: &str) -> Vec<WorkspaceSymbolMatch> {
    let query = query.trim().to_lowercase();
    let mut matches: Vec<WorkspaceSymbolMatch> = snapshot
        .reverse_index()
        .entries()
        .filter_map(|entry| {
            match_rank(&entry.symbol.name, &query).map(|rank| WorkspaceSymbolMatch {
                symbol: entry.symbol.clone(),
                rank,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| a.symbol.lower_name().cmp(&b.symbol.lower_name()))
            .then_with(|| a.symbol.file().cmp(b.symbol.file()))
            .then_with(|| a.symbol.source_range.start_line.cmp(&b.symbol.source_range.start_line))
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_rank() {
        assert_eq!(match_rank("ЗаписатьДанные", "запис"), Some(MatchRank::Prefix));
        assert_eq!(match_rank("ЗаписатьДанные", "данные"), Some(MatchRank::Substring));
        assert_eq!(match_rank("ЗаписатьДанные", "здн"), Some(MatchRank::Subsequence));
        assert_eq!(match_rank("ЗаписатьДанные", "дз"), None);
        assert_eq!(match_rank("Любое", ""), Some(MatchRank::Prefix));
    }
}
