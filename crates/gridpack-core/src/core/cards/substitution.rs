use regex::{NoExpand, Regex};

/// Replaces every literal occurrence of `key` in `text` with `value`.
pub fn apply_named_substitution(text: &str, key: &str, value: &str) -> String {
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, value)
}

/// Rewrites the value portion of a `value = key ! comment` run-card line.
///
/// Everything up to and including the key and an optional comment marker is
/// replaced by a right-aligned value and left-aligned key, leaving the trailing
/// comment text untouched.
pub fn rewrite_assignment_line(
    line: &str,
    key: &str,
    value: &str,
    value_width: usize,
    key_width: usize,
) -> Result<String, regex::Error> {
    let pattern = Regex::new(&format!(r".*=\s*{}\s*[!#]?", regex::escape(key)))?;
    let replacement = format!(
        " {:>vw$} = {:<kw$} !",
        value,
        key,
        vw = value_width,
        kw = key_width
    );
    Ok(pattern
        .replace_all(line, NoExpand(&replacement))
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_substitution_replaces_every_occurrence() {
        let text = "output SUBSETUP -nojpeg\n# SUBSETUP\n";
        assert_eq!(
            apply_named_substitution(text, "SUBSETUP", "ttH_Test_run0"),
            "output ttH_Test_run0 -nojpeg\n# ttH_Test_run0\n"
        );
    }

    #[test]
    fn named_substitution_is_literal() {
        let text = "generate p p > t t~ DIM6=1 QED=1";
        assert_eq!(
            apply_named_substitution(text, "DIM6=1", "DIM6^2==1"),
            "generate p p > t t~ DIM6^2==1 QED=1"
        );
        assert_eq!(apply_named_substitution("a.b", ".", "$1"), "a$1b");
        assert_eq!(apply_named_substitution("abc", "", "x"), "abc");
    }

    #[test]
    fn rewrite_assignment_line_keeps_trailing_comment() {
        let line = "  10000 = nevents ! Number of unweighted events requested";
        let out = rewrite_assignment_line(line, "nevents", "500", 5, 8).unwrap();
        assert_eq!(out, "   500 = nevents  ! Number of unweighted events requested");
    }

    #[test]
    fn rewrite_assignment_line_escapes_key() {
        let line = " 0 = a.b";
        let out = rewrite_assignment_line(line, "a.b", "1", 1, 3).unwrap();
        assert_eq!(out, " 1 = a.b !");
        let untouched = rewrite_assignment_line(" 0 = axb", "a.b", "1", 1, 3).unwrap();
        assert_eq!(untouched, " 0 = axb");
    }
}
