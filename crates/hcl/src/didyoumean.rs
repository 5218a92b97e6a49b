/// Returns the candidate closest to `given`, if it is close enough to be
/// a plausible typo.
///
/// Short names tolerate an edit distance of 2, longer ones 3.
pub fn name_suggestion<S: AsRef<str>>(given: &str, candidates: &[S]) -> Option<String> {
    let threshold = if given.chars().count() <= 5 { 2 } else { 3 };
    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let distance = strsim::levenshtein(given, candidate);
        if distance > threshold || distance == 0 {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, candidate)| candidate.to_string())
}

/// " Did you mean \"x\"?" or an empty string.
pub fn suggestion_sentence<S: AsRef<str>>(given: &str, candidates: &[S]) -> String {
    name_suggestion(given, candidates)
        .map(|name| format!(" Did you mean {name:?}?"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_keyword() {
        let keywords = ["if", "else", "endif", "for", "endfor"];
        assert_eq!(name_suggestion("endfr", &keywords), Some("endfor".to_string()));
        assert_eq!(name_suggestion("fi", &keywords), Some("if".to_string()));
        assert_eq!(name_suggestion("banana", &keywords), None);
    }

    #[test]
    fn longer_names_allow_three_edits() {
        let names = ["instance_type"];
        assert_eq!(
            name_suggestion("instanse_tpe", &names),
            Some("instance_type".to_string())
        );
    }

    #[test]
    fn sentence_form() {
        assert_eq!(suggestion_sentence("fo", &["foo"]), " Did you mean \"foo\"?");
        assert_eq!(suggestion_sentence("zzz", &["foo"]), "");
    }
}
