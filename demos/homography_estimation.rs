//! Example: Homography estimation from point correspondences
//!
//! Generates a synthetic scene related by a known perspective transform,
//! corrupts part of it and recovers the transform with RANSAC.
//!
//! Run with `RUST_LOG=homography_ransac=debug` to see the search progress.

use homography_ransac::*;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Homography Estimation Example ===\n");

    let n_points = 60;
    let n_outliers = 25;
    let n_total = n_points + n_outliers;

    let truth = Homography::from_row_major(&[1.1, 0.05, 12.0, -0.08, 0.95, 30.0, 1e-4, 2e-4, 1.0]);
    let mut rng = StdRng::seed_from_u64(42);
    let mut points1 = DMatrix::<f64>::zeros(n_total, 2);
    let mut points2 = DMatrix::<f64>::zeros(n_total, 2);

    for i in 0..n_total {
        let p = Point2D::new(rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0));
        points1[(i, 0)] = p.x;
        points1[(i, 1)] = p.y;
        let q = if i < n_points {
            // Inliers carry a little measurement noise.
            truth
                .project(&p)
                .map(|q| Point2D::new(q.x + rng.gen_range(-0.5..0.5), q.y + rng.gen_range(-0.5..0.5)))
                .ok_or("inlier projected to infinity")?
        } else {
            Point2D::new(rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0))
        };
        points2[(i, 0)] = q.x;
        points2[(i, 1)] = q.y;
    }

    println!("Generated {} inliers and {} outliers\n", n_points, n_outliers);

    let mut settings = RansacSettings::new(2000, 2.0).with_seed(7);
    settings.confidence = Some(0.999);
    settings.refine_with_inliers = true;
    let result = estimate_homography_matrix(&points1, &points2, Some(settings))?;

    println!("Estimation results:");
    println!("  Found: {}", result.found);
    println!("  {} inliers out of {} points", result.inliers.len(), n_total);
    println!("  Iterations: {}", result.iterations);

    println!("\nEstimated homography matrix:");
    for i in 0..3 {
        println!(
            "  [{:10.5}, {:10.5}, {:10.5}]",
            result.model.h[(i, 0)],
            result.model.h[(i, 1)],
            result.model.h[(i, 2)]
        );
    }

    let correct = result.inliers.iter().filter(|&&idx| idx < n_points).count();
    println!("\nCorrectly identified {} out of {} true inliers", correct, n_points);

    Ok(())
}
