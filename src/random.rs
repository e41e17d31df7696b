use rand::{Rng, seq::IndexedRandom};

/// Uniform integer in `[min, max]`, both ends inclusive.
pub fn random_int<R: Rng + ?Sized>(rng: &mut R, min: i64, max: i64) -> i64 {
    if min >= max {
        return min;
    }
    rng.random_range(min..=max)
}

/// Uniform float in `[min, max)`, rounded to `decimals` places.
pub fn random_float<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let value = rng.random::<f64>() * (max - min) + min;
    (value * factor).round() / factor
}

/// True with probability `true_ratio`. Ratios outside `[0, 1]` saturate.
pub fn random_bool<R: Rng + ?Sized>(rng: &mut R, true_ratio: f64) -> bool {
    rng.random::<f64>() < true_ratio
}

pub fn pick_one<'a, R: Rng + ?Sized, T>(rng: &mut R, items: &'a [T]) -> Option<&'a T> {
    items.choose(rng)
}

/// Draws up to `size` items without replacement, in draw order.
pub fn sample_size<R: Rng + ?Sized, T: Clone>(rng: &mut R, items: &[T], size: usize) -> Vec<T> {
    let mut pool = items.to_vec();
    let mut result = Vec::with_capacity(size.min(pool.len()));
    while result.len() < size && !pool.is_empty() {
        let index = rng.random_range(0..pool.len());
        result.push(pool.remove(index));
    }
    result
}
