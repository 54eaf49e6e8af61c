use cosmodrift::config::GravityConfig;
use cosmodrift::cosmology::Cosmology;
use cosmodrift::physics::gravity::shortrange::ShortRangeTable;
use cosmodrift::physics::gravity::tree::ForceTree;
use cosmodrift::physics::gravity::walk::{
    evaluate_shortrange, GravityQuery, WalkMode, WalkParams,
};
use cosmodrift::physics::gravity::{Gravity, Softenings};
use cosmodrift::physics::math::{Scalar, Vector};
use cosmodrift::physics::particle::{Particle, ParticleType};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::f64::consts;
use std::hint::black_box;

/// Generate particles with a proper spherical distribution.
fn generate_particles_spherical(count: usize, seed: u64, radius: Scalar) -> Vec<Particle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut particles = Vec::with_capacity(count);

    for _ in 0..count {
        let theta = rng.random_range(0.0..=2.0 * consts::PI);
        let phi = libm::acos(rng.random_range(-1.0..=1.0));
        let r = rng.random_range(0.0..radius);

        let position = Vector::new(
            radius + r * libm::sin(phi) * libm::cos(theta),
            radius + r * libm::sin(phi) * libm::sin(theta),
            radius + r * libm::cos(phi),
        );

        let mass = rng.random_range(1.0..100.0);
        particles.push(Particle::new(
            position,
            Vector::ZERO,
            mass,
            ParticleType::DarkMatter,
        ));
    }

    particles
}

fn bench_config() -> GravityConfig {
    GravityConfig {
        boxsize: 0.0,
        rcut: 1.0e6,
        asmth: 1.0e5,
        ..GravityConfig::default()
    }
}

fn bench_tree_build_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build_scaling");

    let counts = [100, 1_000, 10_000, 100_000];
    let config = bench_config();
    let softenings = Softenings::compute(&config, 1.0);

    for &count in &counts {
        let particles = generate_particles_spherical(count, 42, 500.0);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("particles", count), &count, |b, _| {
            b.iter(|| {
                let tree =
                    ForceTree::build(black_box(&particles), 0.0, &softenings.force);
                black_box(tree);
            });
        });
    }

    group.finish();
}

fn bench_walk_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk_scaling");

    let counts = [100, 1_000, 10_000];
    let config = bench_config();
    let softenings = Softenings::compute(&config, 1.0);
    let table = ShortRangeTable::new();

    for &count in &counts {
        let particles = generate_particles_spherical(count, 42, 500.0);
        let tree = ForceTree::build(&particles, 0.0, &softenings.force);
        let params = WalkParams::new(&config, softenings.force);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("particles", count), &count, |b, _| {
            b.iter(|| {
                let mut exports = Vec::new();
                for p in &particles {
                    let query = GravityQuery::from_particle(p);
                    let result = evaluate_shortrange(
                        &tree,
                        &particles,
                        black_box(&query),
                        &params,
                        &table,
                        WalkMode::Primary,
                        &mut exports,
                    );
                    black_box(result);
                }
            });
        });
    }

    group.finish();
}

fn bench_opening_criteria(c: &mut Criterion) {
    let mut group = c.benchmark_group("opening_criteria");

    let particles = generate_particles_spherical(10_000, 42, 500.0);
    let config = bench_config();
    let softenings = Softenings::compute(&config, 1.0);
    let tree = ForceTree::build(&particles, 0.0, &softenings.force);
    let table = ShortRangeTable::new();

    for &theta in &[0.3, 0.5, 0.7] {
        let mut config = bench_config();
        config.err_tol_theta = theta;
        let params = WalkParams::new(&config, softenings.force);

        group.bench_with_input(
            BenchmarkId::new("barnes_hut_theta", theta),
            &theta,
            |b, _| {
                b.iter(|| {
                    let mut exports = Vec::new();
                    for p in particles.iter().take(100) {
                        let query = GravityQuery::from_particle(p);
                        black_box(evaluate_shortrange(
                            &tree,
                            &particles,
                            &query,
                            &params,
                            &table,
                            WalkMode::Primary,
                            &mut exports,
                        ));
                    }
                });
            },
        );
    }

    // relative criterion needs a previous-pass acceleration estimate
    let mut config = bench_config();
    config.err_tol_theta = 0.0;
    let params = WalkParams::new(&config, softenings.force);
    let mut seeded = particles.clone();
    for p in &mut seeded {
        p.old_acc = 1.0e-2;
    }
    group.bench_function("relative", |b| {
        b.iter(|| {
            let mut exports = Vec::new();
            for p in seeded.iter().take(100) {
                let query = GravityQuery::from_particle(p);
                black_box(evaluate_shortrange(
                    &tree,
                    &seeded,
                    &query,
                    &params,
                    &table,
                    WalkMode::Primary,
                    &mut exports,
                ));
            }
        });
    });

    group.finish();
}

fn bench_full_force_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_force_step");
    group.sample_size(20);

    let config = bench_config();
    let cosmology = Cosmology::default();

    for &count in &[1_000, 10_000] {
        let particles = generate_particles_spherical(count, 42, 500.0);
        let gravity = Gravity::new(config.clone());
        let softenings = gravity.softenings(1.0);
        let tree = ForceTree::build(&particles, 0.0, &softenings.force);
        let active: Vec<usize> = (0..count).collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("particles", count), &count, |b, _| {
            b.iter(|| {
                let mut particles = particles.clone();
                black_box(gravity.compute_forces(
                    &tree,
                    &mut particles,
                    &active,
                    &cosmology,
                    1.0,
                ));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_tree_build_scaling,
    bench_walk_scaling,
    bench_opening_criteria,
    bench_full_force_step
);
criterion_main!(benches);
