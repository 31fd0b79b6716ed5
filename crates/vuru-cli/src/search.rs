use vuru_core::Index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum SearchMatchKind {
    Exact,
    Prefix,
    Keyword,
    Description,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchResult {
    pub name: String,
    pub version: String,
    pub category: String,
    pub match_kind: SearchMatchKind,
}

/// Case-insensitive search over package names and short descriptions.
pub(crate) fn search_index(index: &Index, query: &str) -> Vec<SearchResult> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    let mut results = index
        .iter()
        .filter_map(|(name, record)| {
            let match_kind =
                classify_search_match(name, record.short_desc.as_deref(), &query)?;
            Some(SearchResult {
                name: name.to_string(),
                version: record.version_label().to_string(),
                category: record.category_label().to_string(),
                match_kind,
            })
        })
        .collect::<Vec<_>>();
    results.sort_by(|left, right| {
        left.match_kind
            .cmp(&right.match_kind)
            .then_with(|| left.name.cmp(&right.name))
    });
    results
}

/// `query` must already be lowercased.
pub(crate) fn classify_search_match(
    name: &str,
    description: Option<&str>,
    query: &str,
) -> Option<SearchMatchKind> {
    let name = name.to_lowercase();
    if name == query {
        return Some(SearchMatchKind::Exact);
    }
    if name.starts_with(query) {
        return Some(SearchMatchKind::Prefix);
    }
    if name.contains(query) {
        return Some(SearchMatchKind::Keyword);
    }
    if description.is_some_and(|description| description.to_lowercase().contains(query)) {
        return Some(SearchMatchKind::Description);
    }
    None
}

pub(crate) fn format_search_results(results: &[SearchResult], query: &str) -> Vec<String> {
    if results.is_empty() {
        return vec![format!(
            "No packages found matching '{query}'. Try a broader keyword or run `vuru -S` to refresh the index."
        )];
    }

    let mut lines = Vec::with_capacity(results.len() + 4);
    lines.push(table_row("PACKAGE", "VERSION", "CATEGORY"));
    lines.push("-".repeat(61));
    for result in results {
        lines.push(table_row(&result.name, &result.version, &result.category));
    }
    lines.push(String::new());
    lines.push(format!("{} package(s) found", results.len()));
    lines
}

fn table_row(name: &str, version: &str, category: &str) -> String {
    format!("{name:<24} {version:<15} {category}")
}
