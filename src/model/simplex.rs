//! Euclidean projection onto the probability simplex.

use ndarray::{Array1, ArrayView1};

use crate::error::{PipelineError, Result};

/// Nearest point (in L2) to `v` with non-negative entries summing to 1.
///
/// Sort descending, find the last index where the shifted entry stays
/// positive, and threshold everything by the implied offset.
pub fn project_simplex(v: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
    if v.is_empty() {
        return Err(PipelineError::Precondition(
            "cannot project an empty vector onto the simplex".to_string(),
        ));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(PipelineError::Precondition(format!(
            "cannot project a non-finite vector onto the simplex: {}",
            v
        )));
    }

    let mut u = v.to_vec();
    u.sort_by(|a, b| b.total_cmp(a));

    let mut cssv = 0.0;
    let mut rho = 0;
    let mut cssv_at_rho = u[0];
    for (i, &ui) in u.iter().enumerate() {
        cssv += ui;
        if ui * (i + 1) as f64 > cssv - 1.0 {
            rho = i;
            cssv_at_rho = cssv;
        }
    }
    let theta = (cssv_at_rho - 1.0) / (rho + 1) as f64;

    Ok(v.mapv(|x| (x - theta).max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_on_simplex(w: &Array1<f64>) {
        assert!(w.iter().all(|&x| x >= 0.0), "negative entry in {}", w);
        assert!((w.sum() - 1.0).abs() < 1e-9, "sum {} != 1", w.sum());
    }

    fn dist2(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
        (a - b).mapv(|d| d * d).sum()
    }

    #[test]
    fn test_already_on_simplex_is_fixed_point() {
        let v = array![0.2, 0.3, 0.5];
        let w = project_simplex(v.view()).unwrap();
        for (a, b) in w.iter().zip(v.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_single_coordinate_is_one() {
        for x in [-5.0, 0.0, 0.3, 42.0] {
            let w = project_simplex(array![x].view()).unwrap();
            assert_eq!(w.len(), 1);
            assert!((w[0] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_dominant_coordinate_takes_all() {
        let w = project_simplex(array![10.0, 0.0, -3.0].view()).unwrap();
        assert_eq!(w, array![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_is_precondition_error() {
        let v: Array1<f64> = Array1::zeros(0);
        assert!(matches!(project_simplex(v.view()), Err(PipelineError::Precondition(_))));
    }

    #[test]
    fn test_non_finite_rejected() {
        let v = array![0.5, f64::NAN];
        assert!(project_simplex(v.view()).is_err());
    }

    #[test]
    fn test_random_vectors_feasible_and_nearest() {
        let mut rng = StdRng::seed_from_u64(7);
        // Grid over the 2-simplex for brute-force comparison.
        let steps = 200;
        let mut grid = Vec::new();
        for i in 0..=steps {
            for j in 0..=(steps - i) {
                let a = i as f64 / steps as f64;
                let b = j as f64 / steps as f64;
                grid.push(array![a, b, 1.0 - a - b]);
            }
        }

        for _ in 0..25 {
            let v: Array1<f64> = (0..3).map(|_| rng.gen_range(-2.0..2.0)).collect();
            let w = project_simplex(v.view()).unwrap();
            assert_on_simplex(&w);

            let best = grid
                .iter()
                .map(|g| dist2(g, &v))
                .fold(f64::INFINITY, f64::min);
            // The projection must be at least as close as every grid point.
            assert!(dist2(&w, &v) <= best + 1e-12, "projection {} not nearest for {}", w, v);
        }
    }
}
