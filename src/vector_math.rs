use ndarray::ArrayView1;

/// Cosine similarity in `[-1, 1]`; `None` when the vectors are empty or differ in length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    let (a, b) = views(a, b)?;
    let denom = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if denom <= f32::EPSILON {
        return Some(0.0);
    }
    Some((a.dot(&b) / denom).clamp(-1.0, 1.0))
}

pub fn dot_product(a: &[f32], b: &[f32]) -> Option<f32> {
    let (a, b) = views(a, b)?;
    Some(a.dot(&b))
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    let (a, b) = views(a, b)?;
    let diff = &a - &b;
    Some(diff.dot(&diff).sqrt())
}

fn views<'a>(a: &'a [f32], b: &'a [f32]) -> Option<(ArrayView1<'a, f32>, ArrayView1<'a, f32>)> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    Some((ArrayView1::from(a), ArrayView1::from(b)))
}
