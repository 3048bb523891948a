use crate::client::Row;

/// Split `--format=csv` output into rows of trimmed fields.
///
/// Blank lines are dropped.  A header line, if the caller asked for one, is
/// returned like any other row.
pub fn parse_csv(text: &str) -> Vec<Row> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split(',').map(|f| f.trim().to_string()).collect())
        .collect()
}

/// Split `nvidia-smi pmon` output into rows of whitespace-separated fields.
///
/// pmon prints two `#`-prefixed header lines (column names and units);
/// those and blank lines are skipped.
pub fn parse_pmon(text: &str) -> Vec<Row> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect()
}

/// Parse a numeric field, tolerating a trailing unit (`"42 %"`, `"8192 MiB"`).
///
/// Returns `None` for the placeholders nvidia-smi uses when a value is not
/// sampled (`-`, `N/A`, `[N/A]`) and for anything else non-numeric.
pub fn parse_value(field: &str) -> Option<u64> {
    let token = field.split_whitespace().next()?;
    match token {
        "-" | "N/A" | "[N/A]" => None,
        t => t.parse::<u64>().ok(),
    }
}
