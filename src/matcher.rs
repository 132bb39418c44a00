//! Exact-then-substring resolution of a canonical field to one input column.

/// Returns the first column matching `candidates`.
///
/// Pass one compares each candidate, in priority order, against every
/// column for case- and whitespace-insensitive equality. Pass two looks for
/// the candidate as a case-insensitive substring of a column name. A column
/// name contained in a candidate never matches.
pub fn find_column<'a, S>(columns: &'a [S], candidates: &[&str]) -> Option<&'a str>
where
    S: AsRef<str>,
{
    let lowered = columns
        .iter()
        .map(|c| c.as_ref().trim().to_lowercase())
        .collect::<Vec<_>>();

    for candidate in candidates {
        let wanted = candidate.trim().to_lowercase();
        if let Some(idx) = lowered.iter().position(|c| *c == wanted) {
            return Some(columns[idx].as_ref());
        }
    }

    for candidate in candidates {
        let wanted = candidate.to_lowercase();
        if wanted.is_empty() {
            continue;
        }
        if let Some(idx) = columns
            .iter()
            .position(|c| c.as_ref().to_lowercase().contains(&wanted))
        {
            return Some(columns[idx].as_ref());
        }
    }

    None
}
