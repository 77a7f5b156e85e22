//! Response checks shared by the providers.

use canon_core::error::{CanonError, CanonResult};

/// Reject a provider reply whose vector count or width is off.
pub(crate) fn ensure_shape(
    model: &str,
    expected: usize,
    dimension: usize,
    vectors: &[Vec<f32>],
) -> CanonResult<()> {
    if vectors.len() != expected {
        return Err(CanonError::embedding(format!(
            "{} returned {} vectors for {} names",
            model,
            vectors.len(),
            expected
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(CanonError::embedding(format!(
            "{} returned {}-dimensional vectors, configured dimensions is {}",
            model,
            bad.len(),
            dimension
        )));
    }
    Ok(())
}
