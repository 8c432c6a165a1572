//! KD-tree build and query benchmarks.

use std::f64::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lumen_math::{Point3, Vec3};
use lumen_raytrace::{Geometry, KdSettings, Mesh, MeshSettings, Ray};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Closed UV sphere of unit radius.
fn sphere_mesh(stacks: u32, slices: u32, kd: KdSettings) -> Mesh {
    let mut positions = Vec::new();
    for i in 0..=stacks {
        let theta = PI * i as f64 / stacks as f64;
        for j in 0..slices {
            let phi = 2.0 * PI * j as f64 / slices as f64;
            positions.push(Point3::new(
                theta.sin() * phi.cos(),
                theta.cos(),
                theta.sin() * phi.sin(),
            ));
        }
    }
    let index = |i: u32, j: u32| i * slices + j % slices;
    let mut triangles = Vec::new();
    for i in 0..stacks {
        for j in 0..slices {
            let (a, b) = (index(i, j), index(i, j + 1));
            let (c, d) = (index(i + 1, j), index(i + 1, j + 1));
            triangles.push([a, b, d]);
            triangles.push([a, d, c]);
        }
    }
    let settings = MeshSettings {
        kd,
        ..MeshSettings::default()
    };
    let mut mesh = Mesh::from_triangles(&positions, &triangles, settings).unwrap();
    mesh.prepare().unwrap();
    mesh
}

fn random_rays(count: usize) -> Vec<Ray> {
    let mut rng = StdRng::seed_from_u64(17);
    (0..count)
        .map(|_| {
            let origin = Point3::new(
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-3.0..3.0),
                -4.0,
            );
            let target = Point3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            Ray::new(origin, target - origin)
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("kdtree_build");
    group.sample_size(20);
    for (name, kd) in [("median", KdSettings::default()), ("sah", KdSettings::sah())] {
        group.bench_with_input(BenchmarkId::new(name, 64), &kd, |b, kd| {
            b.iter(|| black_box(sphere_mesh(64, 128, kd.clone())))
        });
    }
    group.finish();
}

fn bench_intersect(c: &mut Criterion) {
    let rays = random_rays(1024);
    let median = sphere_mesh(64, 128, KdSettings::default());
    let sah = sphere_mesh(64, 128, KdSettings::sah());

    let mut group = c.benchmark_group("kdtree_intersect");
    group.bench_function("median", |b| {
        b.iter(|| rays.iter().filter_map(|r| median.intersect_ray(r)).count())
    });
    group.bench_function("sah", |b| {
        b.iter(|| rays.iter().filter_map(|r| sah.intersect_ray(r)).count())
    });
    group.bench_function("brute_force", |b| {
        b.iter(|| rays.iter().filter_map(|r| median.intersect_brute_force(r)).count())
    });
    group.finish();

    let miss = Ray::new(Point3::new(5.0, 5.0, 5.0), Vec3::new(1.0, 0.0, 0.0));
    c.bench_function("kdtree_miss", |b| b.iter(|| sah.intersect_ray(black_box(&miss))));
}

criterion_group!(benches, bench_build, bench_intersect);
criterion_main!(benches);
