use image::imageops::{self, FilterType};
use image::{GenericImageView, GrayImage, ImageBuffer, Luma, Pixel, RgbImage};

pub use image::imageops::colorops::grayscale;

pub const WHITE: u8 = u8::MAX;
pub const BLACK: u8 = u8::MIN;
pub struct Mask(pub GrayImage);

/// Resize to exactly `width` x `height`, the aspect ratio is not kept.
pub fn stretch<I: GenericImageView>(
    image: &I,
    width: u32,
    height: u32,
) -> ImageBuffer<I::Pixel, Vec<<I::Pixel as Pixel>::Subpixel>>
where
    I::Pixel: 'static,
    <I::Pixel as Pixel>::Subpixel: 'static,
{
    imageops::resize(image, width, height, FilterType::Triangle)
}

pub fn filled(width: u32, height: u32, red: u8, green: u8, blue: u8) -> RgbImage {
    let mut buf = ImageBuffer::new(width, height);
    buf.enumerate_pixels_mut()
        .for_each(|(_, _, pixel)| *pixel = image::Rgb([red, green, blue]));
    buf
}

pub fn construct_gray(raw: &[&[u8]]) -> GrayImage {
    assert!(raw.windows(2).all(|w| w[0].len() == w[1].len()));
    let height = raw.len() as u32;
    let width = raw.iter().next().map(|row| row.len()).unwrap_or(0) as u32;
    GrayImage::from_fn(width, height, |x, y| {
        image::Luma([raw[y as usize][x as usize]])
    })
}

/// Pixels brighter than `threshold` become white, the rest black.
pub fn maskify(mut img: GrayImage, threshold: u8) -> Mask {
    img.pixels_mut().for_each(|p| {
        p.apply(|bright| (bright <= threshold).then_some(BLACK).unwrap_or(WHITE))
    });
    Mask(img)
}

/// The same sigma OpenCV picks when it is asked to choose one from the kernel size.
pub fn gaussian_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// A normalized one dimensional Gaussian kernel. `kernel_size` must be odd.
pub fn gaussian_kernel(kernel_size: u32) -> Vec<f32> {
    assert!(kernel_size % 2 == 1, "the kernel size must be odd");
    let sigma = gaussian_sigma(kernel_size);
    let half = (kernel_size / 2) as i64;
    let weights: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Separable Gaussian blur where pixels outside the image are the nearest edge pixel.
/// A kernel size of one leaves the image as is.
pub fn gaussian_blur(img: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 || img.width() == 0 || img.height() == 0 {
        return img.clone();
    }

    let kernel = gaussian_kernel(kernel_size);
    let half = (kernel.len() / 2) as i64;
    let (width, height) = img.dimensions();
    let (w, h) = (width as i64, height as i64);

    let convolve = |get: &dyn Fn(i64) -> f32| -> f32 {
        kernel
            .iter()
            .enumerate()
            .map(|(k, weight)| weight * get(k as i64 - half))
            .sum()
    };

    let mut horizontal = vec![0f32; (width * height) as usize];
    for y in 0..h {
        for x in 0..w {
            horizontal[(y * w + x) as usize] = convolve(&|offset| {
                let sx = (x + offset).clamp(0, w - 1);
                img.get_pixel(sx as u32, y as u32)[0] as f32
            });
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let value = convolve(&|offset| {
            let sy = (y + offset).clamp(0, h - 1);
            horizontal[(sy * w + x) as usize]
        });
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Per pixel absolute difference. The images must have the same dimensions.
pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    assert_eq!(a.dimensions(), b.dimensions());
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y)[0].abs_diff(b.get_pixel(x, y)[0])])
    })
}

/// The area, in pixels, of every 8-connected white region of the mask.
pub fn white_region_areas(mask: &Mask) -> Vec<u64> {
    let mask = &mask.0;
    let (width, height) = mask.dimensions();
    let index = |x: u32, y: u32| (y * width + x) as usize;

    let mut visited = vec![false; (width * height) as usize];
    let mut areas = Vec::new();
    let mut stack = Vec::new();

    for (x, y, p) in mask.enumerate_pixels() {
        if p[0] != WHITE || visited[index(x, y)] {
            continue;
        }

        visited[index(x, y)] = true;
        stack.push((x, y));
        let mut area = 0;

        while let Some((cx, cy)) = stack.pop() {
            area += 1;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = cx as i64 + dx;
                    let ny = cy as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    if !visited[index(nx, ny)] && mask.get_pixel(nx, ny)[0] == WHITE {
                        visited[index(nx, ny)] = true;
                        stack.push((nx, ny));
                    }
                }
            }
        }

        areas.push(area);
    }

    areas
}
