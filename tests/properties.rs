//! Property-based tests for the balancer, parameter binding and the driver.
//!
//! These check structural guarantees over generated input rather than exact
//! output: balanced input survives unchanged, stray closers stay literal,
//! positional arguments never take a claimed number and rendering never
//! panics.

use std::collections::BTreeSet;

use proptest::prelude::*;
use wiki_markup::{TagBalancer, build_parameters, parse};

const TAGS: &[&str] = &["b", "i", "em", "div", "p", "span", "for", "ul", "li"];

/// Plain text with no markup characters.
fn text_strategy() -> impl Strategy<Value = String> {
    "[a-z ]{1,6}"
}

/// Well-nested HTML built from non-void elements.
fn balanced_strategy() -> impl Strategy<Value = String> {
    let leaf = text_strategy();
    leaf.prop_recursive(4, 32, 4, |inner| {
        (
            prop::sample::select(TAGS),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(tag, children)| format!("<{tag}>{}</{tag}>", children.concat()))
    })
}

/// Openers, closers and text in any order.
fn tag_soup_strategy() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        text_strategy(),
        prop::sample::select(TAGS).prop_map(|t| format!("<{t}>")),
        prop::sample::select(TAGS).prop_map(|t| format!("</{t}>")),
        Just("<br>".to_string()),
    ];
    prop::collection::vec(piece, 0..16).prop_map(|pieces| pieces.concat())
}

/// Text interleaved with closers that have no opener.
fn stray_closer_strategy() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        text_strategy(),
        prop::sample::select(TAGS).prop_map(|t| format!("</{t}>")),
    ];
    prop::collection::vec(piece, 0..10).prop_map(|pieces| pieces.concat())
}

const MARKUP_PIECES: &[&str] = &[
    "\n",
    "\n\n",
    "{for mac}",
    "{for win, linux}",
    "{/for}",
    "{note}",
    "{/note}",
    "{warning}",
    "{/warning}",
    "{key Ctrl+Q}",
    "{menu Tools}",
    "[[T:missing|a|2=b]]",
    "[[Include:",
    "[[V:clip|width=10]]",
    "[[Image:logo|alt=x]]",
    "[[Some page#Part|text]]",
    "[[",
    "]]",
    "|",
    "''",
    "'''",
    "* ",
    "# ",
    "= ",
    "----",
    "<b>",
    "</i>",
    "[http://example.com link]",
    "é€",
];

/// Fragments of wiki markup, including unterminated ones.
fn markup_strategy() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        text_strategy(),
        prop::sample::select(MARKUP_PIECES).prop_map(str::to_string),
    ];
    prop::collection::vec(piece, 0..24).prop_map(|pieces| pieces.concat())
}

#[cfg(test)]
mod proptest_tests {
    use super::*;

    proptest! {
        #[test]
        fn balanced_input_is_unchanged(html in balanced_strategy()) {
            let tree = TagBalancer::parse(&html);
            prop_assert_eq!(tree.to_html(), html);
            prop_assert!(tree.repairs().is_empty(), "repairs: {:?}", tree.repairs());
        }

        #[test]
        fn balancing_is_idempotent(soup in tag_soup_strategy()) {
            let once = TagBalancer::parse(&soup).to_html();
            let twice = TagBalancer::parse(&once);
            prop_assert_eq!(twice.to_html(), once);
            prop_assert!(twice.repairs().iter().all(|r| r.to_string().starts_with("kept")));
        }

        #[test]
        fn stray_closers_stay_literal(text in stray_closer_strategy()) {
            prop_assert_eq!(TagBalancer::parse(&text).to_html(), text);
        }

        #[test]
        fn positional_never_takes_claimed_number(
            claimed in prop::collection::btree_set(1usize..10, 0..5),
            positional in prop::collection::vec("[a-z]{1,5}", 0..6),
            seed in any::<u64>(),
        ) {
            let mut args: Vec<String> = claimed.iter().map(|n| format!("{n}=v{n}")).collect();
            args.extend(positional.iter().cloned());
            // Deterministic interleaving from the seed.
            let len = args.len().max(1);
            args.rotate_left((seed as usize) % len);

            let params = build_parameters(&args);
            prop_assert_eq!(params.len(), claimed.len() + positional.len());
            for n in &claimed {
                let expected = format!("v{n}");
                prop_assert_eq!(params.get(&n.to_string()), Some(expected.as_str()));
            }

            let free: Vec<String> = (1usize..)
                .filter(|n| !claimed.contains(n))
                .take(positional.len())
                .map(|n| n.to_string())
                .collect();
            let in_order: Vec<&String> = args.iter().filter(|a| !a.contains('=')).collect();
            for (key, value) in free.iter().zip(in_order) {
                prop_assert_eq!(params.get(key), Some(value.as_str()));
            }
            let keys: BTreeSet<&str> = params.iter().map(|(k, _)| k).collect();
            prop_assert_eq!(keys.len(), params.len());
        }

        #[test]
        fn rendering_markup_never_panics(markup in markup_strategy()) {
            let result = parse(&markup, "en-US");
            prop_assert!(!result.html.contains('\x07'));
            prop_assert!(!result.html.contains("<for"));
        }

        #[test]
        fn rendering_arbitrary_text_never_panics(text in "\\PC{0,64}") {
            let result = parse(&text, "fr");
            prop_assert!(!result.html.contains('\x07'));
        }
    }
}
