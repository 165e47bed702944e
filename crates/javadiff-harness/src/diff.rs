//! Diff rendering for problem logs and program output.

/// Render a line diff between expected and actual text.
///
/// Lines past the end of the shorter side are reported as added or removed.
#[must_use]
pub fn render_diff(expected: &str, actual: &str) -> String {
    if expected == actual {
        return String::from("[identical]");
    }

    let expected_lines: Vec<&str> = expected.lines().collect();
    let actual_lines: Vec<&str> = actual.lines().collect();
    let mut out = String::new();
    out.push_str("--- expected\n");
    out.push_str("+++ actual\n");
    for i in 0..expected_lines.len().max(actual_lines.len()) {
        let e = expected_lines.get(i);
        let a = actual_lines.get(i);
        if e == a {
            continue;
        }
        out.push_str(&format!("@@ line {} @@\n", i + 1));
        if let Some(e) = e {
            out.push_str(&format!("-{e}\n"));
        }
        if let Some(a) = a {
            out.push_str(&format!("+{a}\n"));
        }
    }
    out
}

/// Cut `text` to at most `limit` characters for failure context.
#[must_use]
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text() {
        assert_eq!(render_diff("a\nb", "a\nb"), "[identical]");
    }

    #[test]
    fn changed_line_is_reported() {
        let diff = render_diff("a\nb\nc", "a\nB\nc");
        assert_eq!(diff, "--- expected\n+++ actual\n@@ line 2 @@\n-b\n+B\n");
    }

    #[test]
    fn extra_and_missing_lines() {
        let diff = render_diff("a", "a\nb");
        assert!(diff.ends_with("@@ line 2 @@\n+b\n"));
        let diff = render_diff("a\nb", "a");
        assert!(diff.ends_with("@@ line 2 @@\n-b\n"));
    }

    #[test]
    fn trailing_newline_only_difference_is_not_identical() {
        let diff = render_diff("a\n", "a");
        assert_eq!(diff, "--- expected\n+++ actual\n");
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("äöüß", 2), "äö...");
    }
}
