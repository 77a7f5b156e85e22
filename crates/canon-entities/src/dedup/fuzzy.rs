//! String similarity between normalized names.

/// Similarity in [0, 1]: the larger of normalized Levenshtein and Jaro-Winkler.
///
/// Levenshtein catches edits spread through the name; Jaro-Winkler rewards a
/// shared prefix ("tim cook" / "timothy cook").
pub fn similarity(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    let levenshtein = strsim::normalized_levenshtein(a, b);
    let jaro_winkler = strsim::jaro_winkler(a, b);
    levenshtein.max(jaro_winkler) as f32
}
