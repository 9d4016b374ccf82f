//! Property-based tests for the SGR span parser
//!
//! These tests use proptest to generate random inputs and verify that the
//! parser never panics and never loses or invents text.

use pexe::{parse_line, Color, StyledSpan};
use proptest::prelude::*;

const WHITE: Color = Color::new(255, 255, 255);
const BLACK: Color = Color::new(0, 0, 0);

fn joined(spans: &[StyledSpan]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

/// One SGR escape with arbitrary numeric parameters
fn sgr_escape() -> impl Strategy<Value = String> {
    prop::collection::vec(0u32..300, 0..6).prop_map(|params| {
        let body: Vec<String> = params.iter().map(u32::to_string).collect();
        format!("\x1b[{}m", body.join(";"))
    })
}

proptest! {
    #[test]
    fn test_parser_doesnt_panic_on_random_input(s in "\\PC*") {
        let _ = parse_line(&s, WHITE, BLACK);
    }

    #[test]
    fn test_parser_doesnt_panic_on_escape_soup(s in "(\x1b|\\[|[0-9]|;|m|x){0,200}") {
        let _ = parse_line(&s, WHITE, BLACK);
    }

    #[test]
    fn test_plain_text_is_one_default_span(s in "[a-zA-Z0-9 ]{1,200}") {
        let spans = parse_line(&s, WHITE, BLACK);
        prop_assert_eq!(spans, vec![StyledSpan::plain(s.clone(), WHITE, BLACK)]);
    }

    #[test]
    fn test_text_survives_between_escapes(
        pieces in prop::collection::vec(("[a-z ]{0,20}", sgr_escape()), 0..10),
        tail in "[a-z ]{0,20}",
    ) {
        let mut raw = String::new();
        let mut expected = String::new();
        for (text, escape) in &pieces {
            raw.push_str(text);
            raw.push_str(escape);
            expected.push_str(text);
        }
        raw.push_str(&tail);
        expected.push_str(&tail);

        let spans = parse_line(&raw, WHITE, BLACK);
        prop_assert_eq!(joined(&spans), expected);
        prop_assert!(spans.iter().all(|s| !s.text.is_empty()));
    }

    #[test]
    fn test_reset_restores_defaults(
        prefix in prop::collection::vec(sgr_escape(), 0..5),
        text in "[a-z]{1,20}",
    ) {
        let raw = format!("{}\x1b[0m{}", prefix.concat(), text);
        let spans = parse_line(&raw, WHITE, BLACK);
        prop_assert_eq!(spans, vec![StyledSpan::plain(text.clone(), WHITE, BLACK)]);
    }

    #[test]
    fn test_standard_foreground_codes(code in 30u32..38, text in "[a-z]{1,20}") {
        let raw = format!("\x1b[{}m{}\x1b[0m", code, text);
        let spans = parse_line(&raw, WHITE, BLACK);
        prop_assert_eq!(spans.len(), 1);
        prop_assert_eq!(&spans[0].text, &text);
        prop_assert_eq!(spans[0].background, BLACK);
    }
}
