/// Identity embedding produced by the recognition model.
///
/// Always stored L2-normalized, so the dot product of two embeddings is
/// their cosine similarity.
#[derive(Clone, Debug, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Normalizes `values` to unit length. A zero vector stays zero.
    pub fn new(mut values: Vec<f32>) -> Self {
        l2_normalize(&mut values);
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn cosine_similarity(&self, other: &Embedding) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (*a as f64) * (*b as f64))
            .sum()
    }

    /// True when the similarity to at least one entry of `history` is
    /// strictly greater than `threshold`.
    pub fn is_similar_to_any<'a>(
        &self,
        history: impl IntoIterator<Item = &'a Embedding>,
        threshold: f64,
    ) -> bool {
        history
            .into_iter()
            .any(|known| self.cosine_similarity(known) > threshold)
    }
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
