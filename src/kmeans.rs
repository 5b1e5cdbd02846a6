//! Lloyd's k-means with k-means++ seeding and random restarts.

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::Error;
use crate::math::squared_distance;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    pub k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel<const D: usize> {
    pub centroids: Vec<[f64; D]>,
    /// sum of squared distances to the closest centroid
    pub inertia: f64,
}

impl<const D: usize> KMeansModel<D> {
    /// Index of the nearest centroid.
    pub fn predict(&self, point: &[f64; D]) -> usize {
        nearest(&self.centroids, point).0
    }
}

fn nearest<const D: usize>(centroids: &[[f64; D]], point: &[f64; D]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(c, point)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// Runs `n_init` seeded restarts and keeps the one with the lowest inertia.
pub fn fit<const D: usize>(data: &[[f64; D]], params: &KMeansParams) -> Result<KMeansModel<D>, Error> {
    if data.is_empty() {
        return Err(Error::InsufficientData);
    }

    if params.k == 0 {
        return Err(Error::Classifier("k must be positive".into()));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut best: Option<KMeansModel<D>> = None;

    for _ in 0..params.n_init.max(1) {
        let init = init_plus_plus(data, params.k, &mut rng);
        let model = lloyd(data, init, params.max_iter, params.tolerance);

        if best.as_ref().map_or(true, |b| model.inertia < b.inertia) {
            best = Some(model);
        }
    }

    best.ok_or(Error::InsufficientData)
}

fn init_plus_plus<const D: usize, R: Rng>(data: &[[f64; D]], k: usize, rng: &mut R) -> Vec<[f64; D]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.gen_range(0..data.len())]);

    while centroids.len() < k {
        let weights: Vec<f64> = data.iter().map(|p| nearest(&centroids, p).1).collect();

        // all points already sit on a centroid
        let next = match WeightedIndex::new(&weights) {
            Ok(dist) => data[dist.sample(rng)],
            Err(_) => data[rng.gen_range(0..data.len())],
        };

        centroids.push(next);
    }

    centroids
}

fn lloyd<const D: usize>(
    data: &[[f64; D]],
    mut centroids: Vec<[f64; D]>,
    max_iter: usize,
    tolerance: f64,
) -> KMeansModel<D> {
    let k = centroids.len();

    for _ in 0..max_iter {
        let mut sums = vec![[0.0f64; D]; k];
        let mut counts = vec![0usize; k];

        for p in data {
            let (c, _) = nearest(&centroids, p);
            counts[c] += 1;
            sums[c].iter_mut().zip(p).for_each(|(s, v)| *s += v);
        }

        let mut shift = 0.0f64;
        for (c, centroid) in centroids.iter_mut().enumerate() {
            // empty cluster keeps its previous centroid
            if counts[c] == 0 {
                continue;
            }

            let n = counts[c] as f64;
            let updated = sums[c].map(|s| s / n);
            shift = shift.max(squared_distance(centroid, &updated));
            *centroid = updated;
        }

        if shift <= tolerance * tolerance {
            break;
        }
    }

    let inertia = data.iter().map(|p| nearest(&centroids, p).1).sum();

    KMeansModel { centroids, inertia }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(seed: u64) -> KMeansParams {
        KMeansParams {
            k: 2,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed,
        }
    }

    fn two_blobs() -> Vec<[f64; 3]> {
        let mut data = Vec::new();
        for i in 0..20 {
            let d = (i % 5) as f64;
            data.push([50.0 + d, 200.0 - d, 130.0]);
            data.push([180.0 - d, 90.0 + d, 60.0]);
        }
        data
    }

    #[test]
    fn separates_two_blobs() {
        let data = two_blobs();
        let model = fit(&data, &params(7)).unwrap();

        let a = model.predict(&data[0]);
        let b = model.predict(&data[1]);
        assert_ne!(a, b);

        for (i, p) in data.iter().enumerate() {
            let expected = if i % 2 == 0 { a } else { b };
            assert_eq!(model.predict(p), expected);
        }
    }

    #[test]
    fn same_seed_same_model() {
        let data = two_blobs();
        assert_eq!(fit(&data, &params(3)).unwrap(), fit(&data, &params(3)).unwrap());
    }

    #[test]
    fn empty_data_is_rejected() {
        let data: Vec<[f64; 3]> = Vec::new();
        assert!(matches!(fit(&data, &params(0)), Err(Error::InsufficientData)));
    }

    #[test]
    fn single_sample_still_fits() {
        let data = vec![[1.0, 2.0, 3.0]];
        let model = fit(&data, &params(0)).unwrap();

        assert_eq!(model.centroids.len(), 2);
        assert_eq!(model.inertia, 0.0);
        assert!(model.predict(&[1.0, 2.0, 3.0]) < 2);
    }
}
