//! Directory listing parsing.

/// File names from raw listing lines: the last whitespace-separated token of
/// each non-blank line, in listing order.
///
/// Works for Unix `LIST` output (`-rw-r--r-- 1 ftp ftp 1234 Jan 15 12:00 a.csv`)
/// and for bare name-per-line listings alike.
pub fn parse_listing<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| line.as_ref().split_whitespace().last())
        .map(str::to_string)
        .collect()
}
