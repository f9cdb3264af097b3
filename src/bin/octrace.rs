//! Builds an octree over a random box scene and traces rays through it.
//!
//! Reports traversal statistics, and with `--verify` checks every ray's
//! candidates against a brute force slab test over all boxes.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use octrace::nalgebra_types::*;
use octrace::octree::{
    CachePool, Candidate, DirectMappedCache, OctreeBuilder, OctreeConfig, OctreeIndex,
    TraversalStats,
};
use octrace::{BoundingBox, Ray, AABB};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::time::Instant;

/// Octree ray traversal benchmark.
#[derive(Parser, Debug)]
#[command(name = "octrace", about = "Traces random rays through an octree over random boxes")]
struct Args {
    /// Number of boxes in the scene.
    #[arg(long, default_value_t = 10_000)]
    objects: usize,

    /// Number of rays to trace.
    #[arg(long, default_value_t = 100_000)]
    rays: u64,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Boxes are centered within [-extent, extent] on every axis.
    #[arg(long, default_value_t = 100.0)]
    extent: f64,

    /// Largest half edge of a box.
    #[arg(long = "object-size", default_value_t = 1.0)]
    object_size: f64,

    /// Fraction of a node's edge below which straddling boxes are pushed into
    /// children. Must be below 1/3.
    #[arg(long = "force-ratio", default_value_t = 0.25)]
    force_ratio: f64,

    #[arg(long = "max-depth", default_value_t = 20)]
    max_depth: usize,

    /// Slots per negative intersection cache.
    #[arg(long = "cache-slots", default_value_t = 64)]
    cache_slots: usize,

    /// Compare every ray against a brute force test over all boxes.
    #[arg(long)]
    verify: bool,

    /// More logging; repeat for more.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    use simplelog::LevelFilter::{Debug, Info, Off, Trace};
    simplelog::TermLogger::init(
        match args.verbose {
            0 => Info,
            1 => Debug,
            _ => Trace,
        },
        simplelog::ConfigBuilder::new()
            .set_target_level(Off)
            .set_location_level(Off)
            .build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    log::debug!("{:?}", args);

    let config = OctreeConfig {
        force_subnode_ratio: args.force_ratio,
        max_depth: args.max_depth,
        negative_cache_slots: args.cache_slots,
        ..Default::default()
    };

    let boxes = random_boxes(&args);
    let scene = AABB::unite(boxes.iter());
    if scene.is_valid() {
        log::debug!("scene spans {:?} to {:?}", scene.min(), scene.max());
    }
    let start = Instant::now();
    let mut builder = OctreeBuilder::new(config.clone()).context("invalid octree configuration")?;
    for (i, b) in boxes.iter().enumerate() {
        builder.add(i, b).with_context(|| format!("failed to insert box {}", i))?;
    }
    let index = builder.finalize();
    log::info!(
        "built octree over {} boxes in {:?}: {} nodes, {} references, depth {}",
        index.object_count(),
        start.elapsed(),
        index.node_count(),
        index.reference_count(),
        index.depth()
    );

    let pool = CachePool::<DirectMappedCache<usize>>::direct_mapped(&config);
    let start = Instant::now();
    let results: Vec<(TraversalStats, usize)> = (0..args.rays)
        .into_par_iter()
        .map(|i| {
            let ray = random_ray(&args, i);
            let mut cache = pool.checkout();
            trace_one(&index, &boxes, ray, &mut *cache, args.verify)
        })
        .collect();
    let elapsed = start.elapsed();

    let mut total = TraversalStats::default();
    let mut missing = 0;
    for (stats, missed) in results {
        total += stats;
        missing += missed;
    }
    log::info!("traced {} rays in {:?}", args.rays, elapsed);
    log::info!(
        "per ray: {:.2} nodes, {:.2} tests, {:.2} hits, {:.2} cache hits",
        total.nodes_visited as f64 / args.rays.max(1) as f64,
        total.objects_tested as f64 / args.rays.max(1) as f64,
        total.hits as f64 / args.rays.max(1) as f64,
        total.cache_hits as f64 / args.rays.max(1) as f64
    );
    log::info!(
        "{} cache collisions, deepest level {}",
        total.cache_collisions,
        total.max_depth
    );

    if args.verify {
        if missing > 0 {
            bail!("{} intersecting boxes were never offered as candidates", missing);
        }
        log::info!("verified against brute force");
    }
    Ok(())
}

fn random_boxes(args: &Args) -> Vec<BoundingBox<f64>> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let e = args.extent;
    (0..args.objects)
        .map(|_| {
            let center = vector![
                rng.random_range(-e..=e),
                rng.random_range(-e..=e),
                rng.random_range(-e..=e)
            ];
            let half = vector![
                rng.random::<f64>() * args.object_size,
                rng.random::<f64>() * args.object_size,
                rng.random::<f64>() * args.object_size
            ];
            BoundingBox::from_points(center - half, center + half)
        })
        .collect()
}

/// A ray from outside the scene aimed at a point inside it. Each ray has its
/// own generator so the set of rays does not depend on thread scheduling.
fn random_ray(args: &Args, i: u64) -> Ray<f64> {
    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ i);
    let e = args.extent;
    let mut unit = || {
        let v = vector![
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0)
        ];
        if v.norm() > 1e-9 {
            v.normalize()
        } else {
            vector![1.0, 0.0, 0.0]
        }
    };
    let origin = unit() * (3.0 * e);
    let target = unit() * (0.5 * e);
    Ray::new(origin, target - origin)
}

/// Traverse with a slab test as the candidate test. Returns the stats and,
/// when verifying, how many intersecting boxes were never offered.
fn trace_one(
    index: &OctreeIndex<f64, usize>,
    boxes: &[BoundingBox<f64>],
    mut ray: Ray<f64>,
    cache: &mut DirectMappedCache<usize>,
    verify: bool,
) -> (TraversalStats, usize) {
    let query = ray;
    let mut hits = Vec::new();
    let stats = index.for_each_possible_intersector(&mut ray, cache, |i, ray| {
        match boxes[i].ray_interval(ray) {
            Some(_) => {
                hits.push(i);
                Candidate::Hit
            }
            None => Candidate::Miss,
        }
    });
    if !verify {
        return (stats, 0);
    }

    hits.sort_unstable();
    let missed = (0..boxes.len())
        .filter(|&i| boxes[i].ray_interval(&query).is_some() && hits.binary_search(&i).is_err())
        .inspect(|i| log::warn!("box {} missed by {:?}", i, query))
        .count();
    (stats, missed)
}
