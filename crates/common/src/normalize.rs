// Content canonicalization: NFC composition, whitespace collapsing, and
// stripping of whitespace at markup boundaries.
//
// The normalized form is only ever used for equality comparison; it is never
// written back into the editor or onto the wire.

use unicode_normalization::UnicodeNormalization;

/// Normalize document markup into a comparison-stable form.
///
/// Rules:
/// - Apply Unicode NFC composition
/// - Collapse every run of whitespace into a single space
/// - Drop a collapsed space that touches a `<` or `>`
/// - Strip leading and trailing whitespace
/// - Recompose, since dropping a space can join `<` or `>` with a combining mark
///
/// `normalize(normalize(x)) == normalize(x)` for every input.
pub fn normalize(input: &str) -> String {
    let composed: String = input.nfc().collect();
    let mut out = String::with_capacity(composed.len());
    let mut chars = composed.chars().peekable();

    while let Some(ch) = chars.next() {
        if !ch.is_whitespace() {
            out.push(ch);
            continue;
        }

        // Swallow the rest of the run so `next` is the first non-whitespace char.
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let after_boundary = matches!(out.chars().last(), None | Some('<') | Some('>'));
        let before_boundary = matches!(chars.peek(), None | Some('<') | Some('>'));
        if !after_boundary && !before_boundary {
            out.push(' ');
        }
    }

    out.nfc().collect()
}

/// Whether two documents differ only by incidental formatting.
pub fn same_content(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(normalize("hello   \t\n world"), "hello world");
    }

    #[test]
    fn strips_whitespace_between_tags() {
        assert_eq!(normalize("<p>a</p>\n    <p>b</p>"), "<p>a</p><p>b</p>");
    }

    #[test]
    fn strips_whitespace_inside_tag_edges() {
        assert_eq!(normalize("<p>  hello  </p>"), "<p>hello</p>");
        assert_eq!(normalize("< p >x</p >"), "<p>x</p>");
    }

    #[test]
    fn keeps_single_space_between_words_in_text() {
        assert_eq!(normalize("<p>two  words</p>"), "<p>two words</p>");
    }

    #[test]
    fn trims_ends() {
        assert_eq!(normalize("  \n<div>x</div>\n  "), "<div>x</div>");
    }

    #[test]
    fn empty_and_whitespace_only_normalize_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t "), "");
    }

    #[test]
    fn non_breaking_space_counts_as_whitespace() {
        assert_eq!(normalize("a\u{00A0}\u{00A0}b"), "a b");
    }

    #[test]
    fn composes_canonically_equivalent_text() {
        assert_eq!(normalize("caf\u{0065}\u{0301}"), normalize("café"));
    }

    #[test]
    fn dropped_boundary_space_recomposes() {
        // U+226E is `<` followed by U+0338.
        let once = normalize("a < \u{0338}");
        assert_eq!(once, "a\u{226E}");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn pretty_printed_and_compact_markup_are_the_same_content() {
        let compact = "<ul><li>one</li><li>two</li></ul>";
        let pretty = "<ul>\n  <li>one</li>\n  <li>two</li>\n</ul>\n";
        assert!(same_content(compact, pretty));
    }

    #[test]
    fn real_text_changes_are_not_the_same_content() {
        assert!(!same_content("<p>a</p>", "<p>b</p>"));
        assert!(!same_content("<p>ab</p>", "<p>a b</p>"));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(input in "\\PC*") {
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn markup_whitespace_is_ignored(
            words in proptest::collection::vec("[a-z]{1,8}", 1..6),
            pad in "[ \t\n]{0,4}",
        ) {
            let compact: String = words.iter().map(|w| format!("<p>{w}</p>")).collect();
            let padded: String =
                words.iter().map(|w| format!("{pad}<p>{pad}{w}{pad}</p>{pad}")).collect();
            prop_assert_eq!(normalize(&compact), normalize(&padded));
        }
    }
}
