//! Small string helpers for bounded, human-facing output.

/// Keep at most `max_chars` characters from the end of `s`, prefixed with an
/// elision marker when anything was dropped.
#[must_use]
pub fn tail_chars(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars {
        return s.to_string();
    }
    let skip = count - max_chars;
    let tail: String = s.chars().skip(skip).collect();
    format!("...{tail}")
}

/// Keep at most `max_chars` characters from the start of `s`.
#[must_use]
pub fn head_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let head: String = s.chars().take(max_chars).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_strings_pass_through() {
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(head_chars("abc", 3), "abc");
    }

    #[test]
    fn multibyte_boundaries_are_respected() {
        assert_eq!(tail_chars("héllo wörld", 5), "...wörld");
        assert_eq!(head_chars("héllo wörld", 2), "hé...");
    }

    proptest! {
        #[test]
        fn tail_never_exceeds_budget(s in ".*", max in 0usize..64) {
            let out = tail_chars(&s, max);
            prop_assert!(out.chars().count() <= max + 3);
        }
    }
}
