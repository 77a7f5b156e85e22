//! Name normalization shared by deduplication and graph building.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Legal-form suffixes stripped from the end of names (compared without dots).
static CORPORATE_SUFFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "inc",
        "incorporated",
        "corp",
        "corporation",
        "llc",
        "ltd",
        "limited",
        "co",
        "plc",
        "gmbh",
        "ag",
        "sa",
        "sas",
        "bv",
        "nv",
        "pty",
        "lp",
        "llp",
        "srl",
        "oy",
        "ab",
    ]
    .into_iter()
    .collect()
});

const QUOTES: &[char] = &['"', '\'', '`', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}'];
const TRAILING: &[char] = &['.', ',', ';', ':'];

/// Normalize an entity name for comparison.
///
/// Lowercases, collapses whitespace, strips surrounding quotes, trailing
/// punctuation and trailing corporate suffixes. The result is a fixed point:
/// `normalize_name(&normalize_name(x)) == normalize_name(x)`.
pub fn normalize_name(name: &str) -> String {
    let mut current = collapse_whitespace(&name.to_lowercase());

    loop {
        let next = strip_corporate_suffix(&trim_decoration(&current));
        if next == current {
            return current;
        }
        current = next;
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn trim_decoration(s: &str) -> String {
    let s = s.trim_matches(|c: char| QUOTES.contains(&c) || c.is_whitespace());
    let s = s.trim_end_matches(|c: char| TRAILING.contains(&c) || c.is_whitespace());
    collapse_whitespace(s)
}

fn strip_corporate_suffix(s: &str) -> String {
    let Some((head, last)) = s.rsplit_once(' ') else {
        // Never strip a name down to nothing.
        return s.to_string();
    };

    let bare: String = last.chars().filter(|c| *c != '.').collect();
    if CORPORATE_SUFFIXES.contains(bare.as_str()) {
        head.trim_end_matches(|c: char| c == ',' || c.is_whitespace())
            .to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_normalization() {
        assert_eq!(normalize_name("  Tim   Cook "), "tim cook");
        assert_eq!(normalize_name("\"OpenAI\""), "openai");
        assert_eq!(normalize_name("Node.js"), "node.js");
    }

    #[test]
    fn test_strips_corporate_suffixes() {
        assert_eq!(normalize_name("Apple Inc."), "apple");
        assert_eq!(normalize_name("Acme, Inc."), "acme");
        assert_eq!(normalize_name("Foo Co. Ltd."), "foo");
        assert_eq!(normalize_name("Widgets L.L.C."), "widgets");
        assert_eq!(normalize_name("Siemens AG"), "siemens");
    }

    #[test]
    fn test_single_token_suffix_is_kept() {
        assert_eq!(normalize_name("Co"), "co");
        assert_eq!(normalize_name("Inc."), "inc");
    }

    #[test]
    fn test_leading_dot_is_kept() {
        assert_eq!(normalize_name(".NET"), ".net");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Apple Inc.",
            "  The Coca-Cola Company, Ltd. ",
            "'Microsoft Corp'",
            "Tim Cook",
            "A.I.",
            "...",
            "Müller GmbH & Co. KG",
            "HashMap::new",
            "",
        ];
        for sample in samples {
            let once = normalize_name(sample);
            assert_eq!(normalize_name(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
