/*!
# Performance Benchmarks for Bandtangle

Criterion benchmarks over the full pipeline on synthetic parabolic-band
grids, to catch regressions in the graph build and the merge loop.
*/

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ndarray::{Array2, Array4};
use std::hint::black_box;

use bandtangle::core::io::InputBundle;
use bandtangle::core::types::NEIGHBOR_STEPS;
use bandtangle::material::Material;
use bandtangle::solver::SolverOptions;

fn synthetic_bundle(nk: usize, nbnd: usize) -> InputBundle {
    let nks = nk * nk;
    let eigenvalues = Array2::from_shape_fn((nks, nbnd), |(k, b)| {
        let (i, j) = (k % nk, k / nk);
        b as f64 + 0.01 * ((i * i + j * j) as f64)
    });
    let mut neighbors = Array2::from_elem((nks, 4), -1i32);
    for k in 0..nks {
        let (i, j) = (k % nk, k / nk);
        for (dir, &(di, dj)) in NEIGHBOR_STEPS.iter().enumerate() {
            let (ii, jj) = (i as isize + di, j as isize + dj);
            if ii >= 0 && jj >= 0 && (ii as usize) < nk && (jj as usize) < nk {
                neighbors[[k, dir]] = (jj as usize * nk + ii as usize) as i32;
            }
        }
    }
    let mut connections = Array4::zeros((nks, 4, nbnd, nbnd));
    for k in 0..nks {
        for dir in 0..4 {
            if neighbors[[k, dir]] >= 0 {
                for b in 0..nbnd {
                    connections[[k, dir, b, b]] = 0.99;
                }
            }
        }
    }
    InputBundle::new(nk, nk, eigenvalues, connections, neighbors).unwrap()
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve_parabolic");

    for size in [8usize, 12, 16].iter() {
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let bundle = synthetic_bundle(size, 4);
                let mut material =
                    Material::new(size, size, bundle, SolverOptions::default());
                material.make_vectors().unwrap();
                material.make_connections().unwrap();
                let outcome = material.solve().unwrap();
                black_box(outcome)
            });
        });
    }
    group.finish();
}

fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");

    for size in [16usize, 24].iter() {
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let bundle = synthetic_bundle(size, 4);
                let mut material =
                    Material::new(size, size, bundle, SolverOptions::default());
                material.make_vectors().unwrap();
                material.make_connections().unwrap();
                black_box(material.graph().unwrap().edge_count())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_solve, bench_graph_build);
criterion_main!(benches);
