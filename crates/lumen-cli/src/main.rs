//! lumen CLI - build and check ray tracing acceleration structures
//!
//! Loads meshes and heightfields, reports how their acceleration
//! structures came out, and cross-checks accelerated queries against
//! brute force on seeded random rays.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use lumen_math::{Point3, Vec3};
use lumen_raytrace::{
    load_obj, Csg, Cube, Geometry, Heightfield, HeightfieldSettings, KdSettings, KdStats,
    MeshSettings, Plane, Ray, RegularPolygon, Scene, Sphere, SplitStrategy,
};
use serde::Serialize;

mod check;

use check::Agreement;

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Build and check lumen ray tracing acceleration structures", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an OBJ mesh, build its KD-tree and verify it against brute force
    Mesh {
        /// Wavefront OBJ file
        file: PathBuf,
        /// Use the surface-area heuristic instead of median splits
        #[arg(long)]
        sah: bool,
        /// Skip the KD-tree entirely
        #[arg(long)]
        no_kd: bool,
        /// Report geometric instead of interpolated normals
        #[arg(long)]
        faceted: bool,
        /// TOML file with KD-tree settings
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of random rays to compare
        #[arg(long, default_value_t = 10_000)]
        rays: usize,
        /// Seed for the random rays
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build a heightfield from a grayscale image and check its ray marcher
    Heightfield {
        /// Grayscale (or color, converted to luma) image
        image: PathBuf,
        /// Gaussian blur sigma in pixels
        #[arg(long, default_value_t = 0.0)]
        blur: f64,
        /// Build the max-height pyramid and compare it with plain marching
        #[arg(long)]
        accelerate: bool,
        /// Height of a white pixel
        #[arg(long, default_value_t = 32.0)]
        scale: f64,
        /// Number of random rays to compare
        #[arg(long, default_value_t = 10_000)]
        rays: usize,
        /// Seed for the random rays
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fire one ray at a built-in shape and print the hit
    Probe {
        /// Shape to probe
        #[arg(long, value_enum, default_value_t = Shape::Sphere)]
        shape: Shape,
        /// Ray origin as x,y,z
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_values_t = [0.0, 0.0, -5.0])]
        origin: Vec<f64>,
        /// Ray direction as x,y,z
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_values_t = [0.0, 0.0, 1.0])]
        direction: Vec<f64>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Built-in probe targets, all centered on the origin.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Shape {
    /// Unit sphere
    Sphere,
    /// Infinite ground plane y = 0
    Plane,
    /// Cube with side 2
    Cube,
    /// Hexagon of radius 1 in the plane y = 0
    Hexagon,
    /// Intersection of two overlapping unit spheres
    Lens,
}

#[derive(Serialize)]
struct MeshReport {
    file: PathBuf,
    vertices: usize,
    triangles: usize,
    build_ms: f64,
    kd: Option<KdStats>,
    check: Agreement,
}

#[derive(Serialize)]
struct HeightfieldReport {
    image: PathBuf,
    width: usize,
    height: usize,
    build_ms: f64,
    levels: usize,
    check: Option<Agreement>,
}

#[derive(Serialize)]
struct ProbeReport {
    distance: f64,
    point: [f64; 3],
    normal: [f64; 3],
    uv: [f64; 2],
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Mesh {
            file,
            sah,
            no_kd,
            faceted,
            config,
            rays,
            seed,
            json,
        } => {
            let mut kd = match config {
                Some(path) => read_kd_settings(&path)?,
                None => KdSettings::default(),
            };
            if sah {
                kd.strategy = SplitStrategy::Sah;
            }
            let settings = MeshSettings {
                faceted,
                use_kd_tree: !no_kd,
                kd,
                ..MeshSettings::default()
            };
            let report = check_mesh(&file, settings, rays, seed)?;
            print_mesh_report(&report, json)?;
            if report.check.mismatches > 0 {
                bail!(
                    "{} of {} rays disagree between the KD-tree and brute force",
                    report.check.mismatches,
                    report.check.rays
                );
            }
        }
        Commands::Heightfield {
            image,
            blur,
            accelerate,
            scale,
            rays,
            seed,
            json,
        } => {
            let settings = HeightfieldSettings { blur, accelerate };
            let report = check_heightfield(&image, &settings, scale, rays, seed)?;
            print_heightfield_report(&report, json)?;
            if let Some(check) = report.check.as_ref().filter(|c| c.mismatches > 0) {
                bail!(
                    "{} of {} rays disagree between accelerated and plain marching",
                    check.mismatches,
                    check.rays
                );
            }
        }
        Commands::Probe {
            shape,
            origin,
            direction,
            json,
        } => {
            probe(shape, &origin, &direction, json)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn read_kd_settings(path: &Path) -> Result<KdSettings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading KD settings from {}", path.display()))?;
    let kd: KdSettings =
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    kd.validate()?;
    Ok(kd)
}

fn check_mesh(file: &Path, settings: MeshSettings, rays: usize, seed: u64) -> Result<MeshReport> {
    let mut mesh =
        load_obj(file, settings).with_context(|| format!("loading {}", file.display()))?;

    let start = Instant::now();
    mesh.prepare()
        .with_context(|| format!("preparing {}", file.display()))?;
    let build_ms = start.elapsed().as_secs_f64() * 1e3;
    info!("prepared {} in {:.2} ms", file.display(), build_ms);

    let rays = check::rays_around(mesh.bbox(), rays, seed);
    let check = check::compare(
        &rays,
        |ray| mesh.intersect_ray(ray),
        |ray| mesh.intersect_brute_force(ray),
    );

    Ok(MeshReport {
        file: file.to_path_buf(),
        vertices: mesh.vertices().len(),
        triangles: mesh.triangles().len(),
        build_ms,
        kd: mesh.kd_tree().map(|tree| tree.stats().clone()),
        check,
    })
}

fn check_heightfield(
    image: &Path,
    settings: &HeightfieldSettings,
    scale: f64,
    rays: usize,
    seed: u64,
) -> Result<HeightfieldReport> {
    let pixels = image::open(image)
        .with_context(|| format!("opening {}", image.display()))?
        .into_luma16();
    let (width, height) = (pixels.width() as usize, pixels.height() as usize);
    let samples: Vec<f64> = pixels
        .pixels()
        .map(|p| f64::from(p.0[0]) / f64::from(u16::MAX) * scale)
        .collect();

    let start = Instant::now();
    let field = Heightfield::from_samples(width, height, &samples, settings)
        .with_context(|| format!("building heightfield from {}", image.display()))?;
    let build_ms = start.elapsed().as_secs_f64() * 1e3;
    info!(
        "built {}x{} heightfield with {} levels in {:.2} ms",
        width,
        height,
        field.levels(),
        build_ms
    );

    let check = settings.accelerate.then(|| {
        let rays = check::rays_from_above(field.bbox(), rays, seed);
        check::compare(
            &rays,
            |ray| field.intersect_ray(ray),
            |ray| field.intersect_unaccelerated(ray),
        )
    });

    Ok(HeightfieldReport {
        image: image.to_path_buf(),
        width,
        height,
        build_ms,
        levels: field.levels(),
        check,
    })
}

fn print_check(check: &Agreement, fast: &str, reference: &str) {
    println!(
        "  rays: {} ({} hits, {} mismatches)",
        check.rays, check.hits, check.mismatches
    );
    println!("  {}: {:.2} ms", fast, check.fast_ms);
    println!("  {}: {:.2} ms", reference, check.reference_ms);
}

fn print_mesh_report(report: &MeshReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("Mesh: {}", report.file.display());
    println!("  vertices: {}", report.vertices);
    println!("  triangles: {}", report.triangles);
    println!("  build: {:.2} ms", report.build_ms);
    match &report.kd {
        Some(kd) => {
            println!(
                "  kd-tree: {} leaves ({} empty), {} internal, depth {}",
                kd.leaves, kd.empty_leaves, kd.internal_nodes, kd.max_depth
            );
            println!(
                "  leaves: avg depth {:.1}, avg size {:.1}, {} triangle refs",
                kd.average_leaf_depth, kd.average_leaf_size, kd.triangle_refs
            );
        }
        None => println!("  kd-tree: none (linear scan)"),
    }
    print_check(&report.check, "tree", "brute force");
    Ok(())
}

fn print_heightfield_report(report: &HeightfieldReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("Heightfield: {}", report.image.display());
    println!("  grid: {}x{}", report.width, report.height);
    println!("  build: {:.2} ms", report.build_ms);
    println!("  pyramid levels: {}", report.levels);
    if let Some(check) = &report.check {
        print_check(check, "accelerated", "plain");
    }
    Ok(())
}

fn build_probe_scene(shape: Shape) -> Result<Scene> {
    let mut scene = Scene::new();
    match shape {
        Shape::Sphere => {
            scene.add_node(Sphere::new(Point3::origin(), 1.0));
        }
        Shape::Plane => {
            scene.add_node(Plane::new(0.0));
        }
        Shape::Cube => {
            scene.add_node(Cube::new(Point3::origin(), 2.0));
        }
        Shape::Hexagon => {
            scene.add_node(RegularPolygon::new(Point3::origin(), 6, 1.0));
        }
        Shape::Lens => {
            let a = scene.add(Sphere::new(Point3::new(-0.5, 0.0, 0.0), 1.0));
            let b = scene.add(Sphere::new(Point3::new(0.5, 0.0, 0.0), 1.0));
            scene.add_node(Csg::and(a, b));
        }
    }
    scene.prepare()?;
    Ok(scene)
}

fn probe(shape: Shape, origin: &[f64], direction: &[f64], json: bool) -> Result<()> {
    if origin.len() != 3 || direction.len() != 3 {
        bail!("probe origin and direction take exactly three components");
    }
    let direction = Vec3::from_column_slice(direction);
    if direction.norm() == 0.0 {
        bail!("probe direction must be non-zero");
    }
    let ray = Ray::new(Point3::from_slice(origin), direction);
    let scene = build_probe_scene(shape)?;

    let report = scene.closest_hit(&ray).map(|hit| ProbeReport {
        distance: hit.distance,
        point: hit.point.coords.into(),
        normal: hit.normal.into(),
        uv: hit.uv.coords.into(),
    });
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    match report {
        Some(hit) => {
            println!("hit at distance {:.6}", hit.distance);
            println!("  point: {:?}", hit.point);
            println!("  normal: {:?}", hit.normal);
            println!("  uv: {:?}", hit.uv);
        }
        None => println!("miss"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_mesh_flags() {
        let cli = Cli::try_parse_from([
            "lumen", "-vv", "mesh", "bunny.obj", "--sah", "--rays", "50", "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Mesh {
                file,
                sah,
                no_kd,
                rays,
                json,
                ..
            } => {
                assert_eq!(file, PathBuf::from("bunny.obj"));
                assert!(sah && json && !no_kd);
                assert_eq!(rays, 50);
            }
            _ => panic!("expected mesh command"),
        }
    }

    #[test]
    fn test_probe_vectors_parse() {
        let cli = Cli::try_parse_from([
            "lumen", "probe", "--shape", "lens", "--origin", "-10,0,0", "--direction", "1,0,0",
        ])
        .unwrap();
        match cli.command {
            Commands::Probe {
                shape,
                origin,
                direction,
                ..
            } => {
                assert!(matches!(shape, Shape::Lens));
                assert_eq!(origin, vec![-10.0, 0.0, 0.0]);
                assert_eq!(direction, vec![1.0, 0.0, 0.0]);
            }
            _ => panic!("expected probe command"),
        }
    }

    #[test]
    fn test_probe_scenes_answer() {
        let ray = Ray::new(Point3::new(0.0, 3.0, 0.2), Vec3::new(0.0, -1.0, 0.0));
        for shape in [Shape::Sphere, Shape::Plane, Shape::Cube, Shape::Hexagon, Shape::Lens] {
            let scene = build_probe_scene(shape).unwrap();
            assert!(scene.closest_hit(&ray).is_some(), "{:?}", shape);
        }
    }

    #[test]
    fn test_kd_settings_file() {
        let dir = std::env::temp_dir().join(format!("lumen-cli-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("kd.toml");
        fs::write(&path, "strategy = \"sah\"\nleaf_size = 4\n").unwrap();
        let kd = read_kd_settings(&path).unwrap();
        assert_eq!(kd.strategy, SplitStrategy::Sah);
        assert_eq!(kd.leaf_size, 4);

        fs::write(&path, "leaf_size = 0\n").unwrap();
        assert!(read_kd_settings(&path).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_mesh_check_on_obj() {
        let dir = std::env::temp_dir().join(format!("lumen-cli-mesh-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tetra.obj");
        fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1\nf 1 3 2\nf 1 2 4\nf 1 4 3\nf 2 3 4\n",
        )
        .unwrap();
        let report = check_mesh(&path, MeshSettings::default(), 200, 7).unwrap();
        assert_eq!(report.triangles, 4);
        assert_eq!(report.vertices, 4);
        assert!(report.kd.is_none());
        assert_eq!(report.check.mismatches, 0);
        assert!(report.check.hits > 0);
        fs::remove_dir_all(&dir).unwrap();
    }
}
