use image::RgbImage;

pub const BLACK: [f32; 3] = [0.0, 0.0, 0.0];
pub const WHITE: [f32; 3] = [255.0, 255.0, 255.0];
pub const RED: [f32; 3] = [255.0, 0.0, 0.0];

pub const MONO_PALETTE: [[f32; 3]; 2] = [BLACK, WHITE];
pub const MONO_BLACK: u8 = 0;

pub const TRICOLOR_PALETTE: [[f32; 3]; 3] = [BLACK, RED, WHITE];
pub const TRICOLOR_BLACK: u8 = 0;
pub const TRICOLOR_RED: u8 = 1;

// Order matches the ACeP controller's colour indices.
const DESATURATED_PALETTE: [[u8; 3]; 7] = [
    [0, 0, 0],
    [255, 255, 255],
    [0, 255, 0],
    [0, 0, 255],
    [255, 0, 0],
    [255, 255, 0],
    [255, 140, 0],
];

const SATURATED_PALETTE: [[u8; 3]; 7] = [
    [57, 48, 57],
    [255, 255, 255],
    [58, 91, 70],
    [61, 59, 94],
    [156, 72, 75],
    [208, 190, 71],
    [177, 106, 73],
];

pub fn acep_palette(saturation: f32) -> [[f32; 3]; 7] {
    let sat = saturation.clamp(0.0, 1.0);
    let mut palette = [[0.0f32; 3]; 7];
    for (i, entry) in palette.iter_mut().enumerate() {
        for channel in 0..3 {
            let saturated = SATURATED_PALETTE[i][channel] as f32;
            let desaturated = DESATURATED_PALETTE[i][channel] as f32;
            entry[channel] = saturated * sat + desaturated * (1.0 - sat);
        }
    }
    palette
}

/// Rec. 601 luma, rounded to the nearest integer.
pub fn luma(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(u32::from);
    ((r * 299 + g * 587 + b * 114 + 500) / 1000) as u8
}

pub fn grayscale_in_place(image: &mut RgbImage) {
    for p in image.pixels_mut() {
        let l = luma(p.0);
        p.0 = [l, l, l];
    }
}

pub fn nearest_colour(palette: &[[f32; 3]], colour: [f32; 3]) -> (usize, [f32; 3]) {
    let mut best_index = 0usize;
    let mut best_distance = f32::MAX;
    for (idx, candidate) in palette.iter().enumerate() {
        let dr = colour[0] - candidate[0];
        let dg = colour[1] - candidate[1];
        let db = colour[2] - candidate[2];
        let distance = dr * dr + dg * dg + db * db;
        if distance < best_distance {
            best_distance = distance;
            best_index = idx;
        }
    }

    (best_index, palette[best_index])
}

/// Floyd-Steinberg weights: 7/16 right, 3/16 below-left, 5/16 below, 1/16 below-right.
fn distribute_error(
    working: &mut [[f32; 3]],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    error: [f32; 3],
) {
    let apply = |working: &mut [[f32; 3]], nx: isize, ny: isize, factor: f32| {
        if nx < 0 || ny < 0 {
            return;
        }
        let nx = nx as usize;
        let ny = ny as usize;
        if nx >= width || ny >= height {
            return;
        }
        let idx = ny * width + nx;
        for channel in 0..3 {
            let value = working[idx][channel] + error[channel] * factor;
            working[idx][channel] = value.clamp(0.0, 255.0);
        }
    };

    apply(working, (x as isize) + 1, y as isize, 7.0 / 16.0);
    apply(working, (x as isize) - 1, (y as isize) + 1, 3.0 / 16.0);
    apply(working, x as isize, (y as isize) + 1, 5.0 / 16.0);
    apply(working, (x as isize) + 1, (y as isize) + 1, 1.0 / 16.0);
}

/// Error-diffuses `rgb` onto `palette`, returning one palette index per pixel.
pub fn dither_indices(rgb: &RgbImage, palette: &[[f32; 3]]) -> Vec<u8> {
    let width = rgb.width() as usize;
    let height = rgb.height() as usize;
    let mut working: Vec<[f32; 3]> = rgb
        .pixels()
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect();
    let mut indices = vec![0u8; width * height];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old_pixel = working[idx];
            let (closest_index, closest_colour) = nearest_colour(palette, old_pixel);
            indices[idx] = closest_index as u8;

            let error = [
                old_pixel[0] - closest_colour[0],
                old_pixel[1] - closest_colour[1],
                old_pixel[2] - closest_colour[2],
            ];

            distribute_error(&mut working, width, height, x, y, error);
        }
    }
    indices
}

pub fn nearest_indices(rgb: &RgbImage, palette: &[[f32; 3]]) -> Vec<u8> {
    rgb.pixels()
        .map(|p| nearest_colour(palette, [p[0] as f32, p[1] as f32, p[2] as f32]).0 as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn luma_matches_rec601_weights() {
        assert_eq!(luma([255, 255, 255]), 255);
        assert_eq!(luma([0, 0, 0]), 0);
        assert_eq!(luma([255, 0, 0]), 76);
        assert_eq!(luma([0, 255, 0]), 150);
    }

    #[test]
    fn nearest_picks_closest_entry() {
        let (idx, _) = nearest_colour(&TRICOLOR_PALETTE, [200.0, 30.0, 20.0]);
        assert_eq!(idx as u8, TRICOLOR_RED);
    }

    #[test]
    fn mid_grey_dithers_to_roughly_half_white() {
        let image = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        let indices = dither_indices(&image, &MONO_PALETTE);
        let white = indices.iter().filter(|&&i| i != MONO_BLACK).count();
        assert!((448..=576).contains(&white), "white pixels: {white}");
    }

    #[test]
    fn saturation_blends_between_palettes() {
        assert_eq!(acep_palette(0.0)[0], [0.0, 0.0, 0.0]);
        assert_eq!(acep_palette(1.0)[0], [57.0, 48.0, 57.0]);
        assert_eq!(acep_palette(0.5)[1], [255.0, 255.0, 255.0]);
    }
}
