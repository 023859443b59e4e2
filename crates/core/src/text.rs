use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercases, trims, collapses inner whitespace and strips diacritics, so
/// `"Saldo  Atual"`, `"SALDO ATUAL"` and `"saldo atual"` compare equal.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Index of the first column whose normalized name contains a candidate.
///
/// Candidates are tried in the caller's priority order; for each candidate the
/// columns are scanned left to right. First hit wins, there is no scoring.
pub fn find_column_index<S: AsRef<str>>(columns: &[S], candidates: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = columns.iter().map(|c| normalize(c.as_ref())).collect();
    candidates.iter().find_map(|candidate| {
        let candidate = normalize(candidate);
        normalized.iter().position(|name| name.contains(&candidate))
    })
}

/// Name of the column picked by [`find_column_index`].
pub fn find_column<'a, S: AsRef<str>>(columns: &'a [S], candidates: &[&str]) -> Option<&'a str> {
    find_column_index(columns, candidates).map(|i| columns[i].as_ref())
}

/// Picks a sheet: exact normalized match, else first sheet containing
/// `fallback`, else the first sheet of the workbook.
pub fn resolve_sheet<'a, S: AsRef<str>>(
    sheet_names: &'a [S],
    exact: &str,
    fallback: &str,
) -> Option<&'a str> {
    let exact = normalize(exact);
    let fallback = normalize(fallback);

    sheet_names
        .iter()
        .find(|name| normalize(name.as_ref()) == exact)
        .or_else(|| {
            sheet_names
                .iter()
                .find(|name| normalize(name.as_ref()).contains(&fallback))
        })
        .or_else(|| sheet_names.first())
        .map(|name| name.as_ref())
}
