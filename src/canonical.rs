/// Turn a page title into a lower-case, underscore-separated, percent-encoded
/// identifier. Distinct titles may map to the same identifier.
pub fn canonicalize(title: &str) -> String {
    let lowered: String = title
        .chars()
        .map(|c| match c {
            ' ' => '_',
            c => simple_lowercase(c),
        })
        .collect();
    urlencoding::encode(&lowered).into_owned()
}

/// Per-character lowercase mapping, one char in, one char out. No final-sigma
/// or other context rules.
fn simple_lowercase(c: char) -> char {
    // U+0130 is the only char whose full lowercase mapping expands
    if c == '\u{130}' {
        return 'i';
    }
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(canonicalize("Apollo 11"), "apollo_11");
    }

    #[test]
    fn reserved_chars_are_escaped() {
        assert_eq!(canonicalize("C++ Programming"), "c%2B%2B_programming");
        assert_eq!(canonicalize("AC/DC"), "ac%2Fdc");
        assert_eq!(canonicalize("What? Why!"), "what%3F_why%21");
    }

    #[test]
    fn unreserved_chars_pass_through() {
        assert_eq!(canonicalize("a-b_c.d~e"), "a-b_c.d~e");
    }

    #[test]
    fn non_ascii_is_utf8_percent_encoded() {
        assert_eq!(canonicalize("Café"), "caf%C3%A9");
        assert_eq!(canonicalize("ÉCOLE"), "%C3%A9cole");
    }

    #[test]
    fn final_sigma_is_not_context_sensitive() {
        assert_eq!(canonicalize("ΟΔΟΣ"), "%CE%BF%CE%B4%CE%BF%CF%83");
        assert_eq!(canonicalize("ΟΔΟΣ ΣΟΦ"), canonicalize("οδοσ σοφ"));
    }

    #[test]
    fn dotted_capital_i_maps_to_plain_i() {
        assert_eq!(canonicalize("İstanbul"), "istanbul");
        assert_eq!(canonicalize("KIZ"), "kiz");
    }

    #[test]
    fn empty_title() {
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn deterministic() {
        let title = "Some Title (disambiguation)";
        assert_eq!(canonicalize(title), canonicalize(title));
        assert_eq!(canonicalize(title), "some_title_%28disambiguation%29");
    }

    #[test]
    fn case_variants_collide() {
        assert_eq!(canonicalize("Foo Bar"), canonicalize("FOO BAR"));
    }
}
