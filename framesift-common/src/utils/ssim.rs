//! Structural similarity between two grayscale images.
//!
//! The mean SSIM over every 7x7 window that fits completely inside the image, using
//! uniform weights and sample covariances, which is what scikit-image calls the
//! default. Images too small for a single window are compared as one big window.

use image::GrayImage;
use rayon::prelude::*;

use super::math::Covariance;

pub const WINDOW: u32 = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = u8::MAX as f64;
const C1: f64 = (K1 * DATA_RANGE) * (K1 * DATA_RANGE);
const C2: f64 = (K2 * DATA_RANGE) * (K2 * DATA_RANGE);

/// Mean structural similarity, 1.0 means identical. The images must have the same
/// dimensions.
pub fn mean_ssim(a: &GrayImage, b: &GrayImage) -> f64 {
    assert_eq!(a.dimensions(), b.dimensions());
    let (width, height) = a.dimensions();

    if width == 0 || height == 0 {
        return 1.0;
    }

    if width < WINDOW || height < WINDOW {
        return global_ssim(a, b);
    }

    let rows = height - WINDOW + 1;
    let cols = width - WINDOW + 1;
    let total: f64 = (0..rows)
        .into_par_iter()
        .map(|y| window_row(a, b, y))
        .sum();

    total / (rows as f64 * cols as f64)
}

fn global_ssim(a: &GrayImage, b: &GrayImage) -> f64 {
    let mut cov = Covariance::new();
    cov.extend(a.pixels().zip(b.pixels()).map(|(pa, pb)| (pa[0], pb[0])));
    ssim(
        cov.mean_x(),
        cov.mean_y(),
        cov.variance_x(),
        cov.variance_y(),
        cov.covariance(),
    )
}

#[derive(Default, Clone, Copy)]
struct Sums {
    a: u64,
    b: u64,
    aa: u64,
    bb: u64,
    ab: u64,
}

impl Sums {
    fn add(&mut self, other: &Sums) {
        self.a += other.a;
        self.b += other.b;
        self.aa += other.aa;
        self.bb += other.bb;
        self.ab += other.ab;
    }

    fn sub(&mut self, other: &Sums) {
        self.a -= other.a;
        self.b -= other.b;
        self.aa -= other.aa;
        self.bb -= other.bb;
        self.ab -= other.ab;
    }

    fn ssim(&self) -> f64 {
        let n = (WINDOW * WINDOW) as f64;
        let cov_norm = n / (n - 1.0);
        let mean_a = self.a as f64 / n;
        let mean_b = self.b as f64 / n;
        let var_a = (self.aa as f64 / n - mean_a * mean_a) * cov_norm;
        let var_b = (self.bb as f64 / n - mean_b * mean_b) * cov_norm;
        let cov = (self.ab as f64 / n - mean_a * mean_b) * cov_norm;
        ssim(mean_a, mean_b, var_a, var_b, cov)
    }
}

/// The sum of the SSIM of every window whose top row is `y`. The window slides along
/// the row, so each column is only summed once.
fn window_row(a: &GrayImage, b: &GrayImage, y: u32) -> f64 {
    let width = a.width();
    let columns: Vec<Sums> = (0..width)
        .map(|x| {
            let mut sums = Sums::default();
            for dy in 0..WINDOW {
                let pa = a.get_pixel(x, y + dy)[0] as u64;
                let pb = b.get_pixel(x, y + dy)[0] as u64;
                sums.a += pa;
                sums.b += pb;
                sums.aa += pa * pa;
                sums.bb += pb * pb;
                sums.ab += pa * pb;
            }
            sums
        })
        .collect();

    let window = WINDOW as usize;
    let mut acc = Sums::default();
    columns[..window].iter().for_each(|col| acc.add(col));

    let mut total = acc.ssim();
    for x in window..columns.len() {
        acc.add(&columns[x]);
        acc.sub(&columns[x - window]);
        total += acc.ssim();
    }
    total
}

fn ssim(mean_a: f64, mean_b: f64, var_a: f64, var_b: f64, cov: f64) -> f64 {
    ((2.0 * mean_a * mean_b + C1) * (2.0 * cov + C2))
        / ((mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2))
}
