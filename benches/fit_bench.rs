use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use osiu::model::{bootstrap, fit_weights, target_distribution, BootstrapOptions, FitOptions, GradientMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn design(rows: usize, cols: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(11);
    Array2::from_shape_fn((rows, cols), |_| rng.gen::<f64>())
}

fn bench_fit(c: &mut Criterion) {
    let m = design(400, 6);
    let q = target_distribution(m.view());

    let fd = FitOptions { max_iter: 100, ..FitOptions::default() };
    c.bench_function("fit_finite_difference_400x6", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(42);
            fit_weights(black_box(m.view()), black_box(q.view()), &fd, &mut rng).unwrap()
        })
    });

    let analytic = FitOptions { gradient: GradientMode::Analytic, ..fd.clone() };
    c.bench_function("fit_analytic_400x6", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(42);
            fit_weights(black_box(m.view()), black_box(q.view()), &analytic, &mut rng).unwrap()
        })
    });

    let boot = BootstrapOptions {
        trials: 16,
        fit: FitOptions { max_iter: 50, ..FitOptions::default() },
        ..BootstrapOptions::default()
    };
    c.bench_function("bootstrap_16_trials", |b| {
        b.iter(|| bootstrap(black_box(m.view()), black_box(q.view()), &boot).unwrap())
    });
}

criterion_group!(benches, bench_fit);
criterion_main!(benches);
