pub mod dither;
pub mod frame;

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::error::ConversionError;
use crate::exif::apply_exif_orientation;
use crate::panel::{ColorMode, PanelSpec, Rotation};

pub use frame::{Frame, IndexedPlane, Plane};

use dither::{
    MONO_BLACK, MONO_PALETTE, TRICOLOR_BLACK, TRICOLOR_PALETTE, TRICOLOR_RED, acep_palette,
    dither_indices, grayscale_in_place, luma, nearest_indices,
};

pub const DEFAULT_THRESHOLD: u8 = 128;
pub const DEFAULT_THRESHOLD_OFFSET: u8 = 32;
pub const DEFAULT_SATURATION: f32 = 0.5;

// Prepared bitmaps are already two-level; anything at or above mid-grey counts as white.
const PREPARED_WHITE_LEVEL: u8 = 128;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvertOptions {
    pub rotation: Rotation,
    pub threshold: u8,
    pub threshold_offset: u8,
    pub bicolor: bool,
    pub invert: bool,
    pub dither: bool,
    pub swap_planes: bool,
    /// Black & white only on palette panels: grayscale pre-pass onto the first two entries.
    pub monochrome: bool,
    pub saturation: f32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg0,
            threshold: DEFAULT_THRESHOLD,
            threshold_offset: DEFAULT_THRESHOLD_OFFSET,
            bicolor: false,
            invert: false,
            dither: false,
            swap_planes: false,
            monochrome: false,
            saturation: DEFAULT_SATURATION,
        }
    }
}

/// Rotate, letterbox and colour-reduce `image` into a frame for `panel`.
pub fn convert(image: &DynamicImage, options: &ConvertOptions, panel: &PanelSpec) -> Frame {
    let rotated = options.rotation.apply(image.to_rgb8());
    let mut fitted = fit_to_panel(&rotated, panel);

    match panel.color_mode {
        ColorMode::TwoColor => {
            let frame = reduce_two_color(&fitted, options, panel);
            if options.swap_planes {
                frame.swap_planes()
            } else {
                frame
            }
        }
        ColorMode::SevenColorPalette => {
            if options.monochrome {
                grayscale_in_place(&mut fitted);
            }
            let full = acep_palette(options.saturation);
            // Black and white lead the device palette.
            let palette = if options.monochrome { &full[..2] } else { &full[..] };
            let indices = if options.dither {
                dither_indices(&fitted, palette)
            } else {
                nearest_indices(&fitted, palette)
            };
            let plane = IndexedPlane::from_indices(panel.width, panel.height, indices)
                .unwrap_or_else(|| IndexedPlane::filled(panel.width, panel.height, 1));
            Frame::Palette(plane)
        }
    }
}

pub fn convert_file(
    path: &Path,
    options: &ConvertOptions,
    panel: &PanelSpec,
) -> Result<Frame, ConversionError> {
    let image = load_image(path)?;
    Ok(convert(&image, options, panel))
}

pub fn load_image(path: &Path) -> Result<DynamicImage, ConversionError> {
    let bytes = std::fs::read(path).map_err(image::ImageError::IoError)?;
    let image = image::load_from_memory(&bytes)?;
    Ok(apply_exif_orientation(&bytes, image))
}

/// Scales `image` to fit inside the panel without cropping, centred on the panel background.
pub fn fit_to_panel(image: &RgbImage, panel: &PanelSpec) -> RgbImage {
    let target_w = panel.width as u32;
    let target_h = panel.height as u32;
    let (src_w, src_h) = image.dimensions();
    if (src_w, src_h) == (target_w, target_h) {
        return image.clone();
    }

    let mut canvas = RgbImage::from_pixel(target_w, target_h, Rgb(panel.background));
    if src_w == 0 || src_h == 0 {
        return canvas;
    }

    let scale = f64::min(
        target_w as f64 / src_w as f64,
        target_h as f64 / src_h as f64,
    );
    let scaled_w = ((src_w as f64 * scale).round() as u32).clamp(1, target_w);
    let scaled_h = ((src_h as f64 * scale).round() as u32).clamp(1, target_h);

    let scaled = imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle);
    let x = (target_w - scaled_w) / 2;
    let y = (target_h - scaled_h) / 2;
    imageops::replace(&mut canvas, &scaled, x as i64, y as i64);
    canvas
}

fn reduce_two_color(rgb: &RgbImage, options: &ConvertOptions, panel: &PanelSpec) -> Frame {
    let (w, h) = (panel.width, panel.height);
    let mut primary = Plane::white(w, h);
    let mut secondary = Plane::white(w, h);
    let width = w as usize;

    match (options.dither, options.bicolor) {
        (true, false) => {
            let mut grey = rgb.clone();
            grayscale_in_place(&mut grey);
            for (idx, colour) in dither_indices(&grey, &MONO_PALETTE).into_iter().enumerate() {
                primary.set_white(idx % width, idx / width, colour != MONO_BLACK);
            }
            if options.invert {
                primary.invert();
            }
        }
        (true, true) => {
            for (idx, colour) in dither_indices(rgb, &TRICOLOR_PALETTE).into_iter().enumerate() {
                let (x, y) = (idx % width, idx / width);
                match colour {
                    TRICOLOR_BLACK => primary.set_white(x, y, false),
                    TRICOLOR_RED => secondary.set_white(x, y, false),
                    _ => {}
                }
            }
        }
        (false, false) => {
            for (x, y, p) in rgb.enumerate_pixels() {
                let white = (luma(p.0) > options.threshold) != options.invert;
                primary.set_white(x as usize, y as usize, white);
            }
        }
        (false, true) => {
            let red_threshold = options.threshold.saturating_add(options.threshold_offset);
            for (x, y, p) in rgb.enumerate_pixels() {
                let l = luma(p.0);
                let red_hit = l > red_threshold;
                let black_white = (l > options.threshold) != options.invert;
                let red_white = !red_hit != options.invert;
                primary.set_white(x as usize, y as usize, black_white);
                secondary.set_white(x as usize, y as usize, red_white);
            }
        }
    }

    Frame::TwoColor { primary, secondary }
}

/// Builds a frame from bitmaps that were split and converted elsewhere.
/// Either plane may be missing; absent planes stay blank. Palette panels take
/// exactly one image, given in either slot.
pub fn frame_from_prepared(
    black: Option<&DynamicImage>,
    red: Option<&DynamicImage>,
    panel: &PanelSpec,
) -> Result<Frame, ConversionError> {
    if black.is_none() && red.is_none() {
        return Err(ConversionError::MissingPlanes);
    }
    for image in black.iter().chain(red.iter()) {
        check_dimensions(image, panel)?;
    }

    match panel.color_mode {
        ColorMode::TwoColor => {
            let to_plane = |image: Option<&DynamicImage>| {
                let mut plane = Plane::white(panel.width, panel.height);
                if let Some(image) = image {
                    for (x, y, p) in image.to_rgb8().enumerate_pixels() {
                        plane.set_white(x as usize, y as usize, luma(p.0) >= PREPARED_WHITE_LEVEL);
                    }
                }
                plane
            };
            Ok(Frame::TwoColor {
                primary: to_plane(black),
                secondary: to_plane(red),
            })
        }
        ColorMode::SevenColorPalette => {
            let image = match (black, red) {
                (Some(image), None) | (None, Some(image)) => image,
                (Some(_), Some(_)) => return Err(ConversionError::AmbiguousPlanes),
                (None, None) => return Err(ConversionError::MissingPlanes),
            };
            let palette = acep_palette(DEFAULT_SATURATION);
            let indices = nearest_indices(&image.to_rgb8(), &palette);
            IndexedPlane::from_indices(panel.width, panel.height, indices)
                .map(Frame::Palette)
                .ok_or(ConversionError::InvalidImageDimensions {
                    expected: (panel.width, panel.height),
                    received: image.dimensions(),
                })
        }
    }
}

fn check_dimensions(image: &DynamicImage, panel: &PanelSpec) -> Result<(), ConversionError> {
    let received = image.dimensions();
    if received != (panel.width as u32, panel.height as u32) {
        return Err(ConversionError::InvalidImageDimensions {
            expected: (panel.width, panel.height),
            received,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let image = RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 255) / width.max(1)) as u8;
            Rgb([v, ((y * 7) % 256) as u8, 255 - v])
        });
        DynamicImage::ImageRgb8(image)
    }

    fn grey(width: u32, height: u32, level: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([level])))
    }

    fn planes(frame: Frame) -> (Plane, Plane) {
        match frame {
            Frame::TwoColor { primary, secondary } => (primary, secondary),
            Frame::Palette(_) => panic!("expected two-colour frame"),
        }
    }

    #[test]
    fn output_matches_panel_for_every_rotation() {
        let source = gradient(97, 41);
        for panel in [PanelSpec::two_color(40, 30), PanelSpec::seven_color(30, 40)] {
            for degrees in [0, 90, 180, 270] {
                let options = ConvertOptions {
                    rotation: Rotation::from_degrees(degrees),
                    dither: degrees % 180 == 0,
                    bicolor: true,
                    ..Default::default()
                };
                let frame = convert(&source, &options, &panel);
                assert_eq!(frame.dimensions(), (panel.width, panel.height));
                assert!(frame.fits(&panel));
            }
        }
    }

    #[test]
    fn conversion_is_deterministic() {
        let source = gradient(64, 48);
        let panel = PanelSpec::two_color(40, 30);
        let options = ConvertOptions {
            dither: true,
            bicolor: true,
            rotation: Rotation::Deg90,
            ..Default::default()
        };
        assert_eq!(convert(&source, &options, &panel), convert(&source, &options, &panel));

        let acep = PanelSpec::seven_color(40, 30);
        let options = ConvertOptions {
            dither: true,
            ..Default::default()
        };
        assert_eq!(convert(&source, &options, &acep), convert(&source, &options, &acep));
    }

    #[test]
    fn letterbox_margins_use_panel_background() {
        let panel = PanelSpec::two_color(40, 20).with_background([0, 0, 0]);
        let fitted = fit_to_panel(&RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])), &panel);
        assert_eq!(fitted.dimensions(), (40, 20));
        assert_eq!(fitted.get_pixel(0, 10).0, [0, 0, 0]);
        assert_eq!(fitted.get_pixel(20, 10).0, [255, 255, 255]);
        assert_eq!(fitted.get_pixel(39, 10).0, [0, 0, 0]);
    }

    #[test]
    fn threshold_splits_on_luminance() {
        let panel = PanelSpec::two_color(8, 1);
        let source = DynamicImage::ImageLuma8(GrayImage::from_fn(8, 1, |x, _| {
            Luma([[0, 100, 128, 129, 130, 200, 250, 255][x as usize]])
        }));
        let (primary, secondary) = planes(convert(&source, &ConvertOptions::default(), &panel));
        assert_eq!(primary.as_bytes(), &[0b0001_1111]);
        assert_eq!(secondary, Plane::white(8, 1));

        let inverted = ConvertOptions {
            invert: true,
            ..Default::default()
        };
        let (primary, _) = planes(convert(&source, &inverted, &panel));
        assert_eq!(primary.as_bytes(), &[0b1110_0000]);
    }

    #[test]
    fn bicolor_threshold_plane_semantics() {
        let panel = PanelSpec::two_color(16, 16);
        let source = DynamicImage::ImageLuma8(GrayImage::from_fn(16, 16, |x, y| {
            Luma([(y * 16 + x) as u8])
        }));
        let options = ConvertOptions {
            bicolor: true,
            threshold: 100,
            threshold_offset: 60,
            ..Default::default()
        };
        let (primary, secondary) = planes(convert(&source, &options, &panel));
        for y in 0..16 {
            for x in 0..16 {
                let l = (y * 16 + x) as u8;
                assert_eq!(primary.is_white(x, y), l > 100, "primary at luma {l}");
                assert_eq!(secondary.is_white(x, y), !(l > 160), "secondary at luma {l}");
            }
        }
    }

    #[test]
    fn bicolor_threshold_offset_saturates() {
        let panel = PanelSpec::two_color(8, 1);
        let options = ConvertOptions {
            bicolor: true,
            threshold: 250,
            threshold_offset: 100,
            ..Default::default()
        };
        let (_, secondary) = planes(convert(&grey(8, 1, 255), &options, &panel));
        assert_eq!(secondary, Plane::white(8, 1));
    }

    #[test]
    fn swap_planes_is_an_involution() {
        let panel = PanelSpec::two_color(16, 8);
        let source = gradient(16, 8);
        let base = ConvertOptions {
            bicolor: true,
            threshold: 90,
            threshold_offset: 40,
            ..Default::default()
        };
        let swapped = ConvertOptions {
            swap_planes: true,
            ..base
        };
        let (p, s) = planes(convert(&source, &base, &panel));
        let (sp, ss) = planes(convert(&source, &swapped, &panel));
        assert_eq!((sp, ss), (s, p));

        let original = convert(&source, &base, &panel);
        assert_eq!(original.clone().swap_planes().swap_planes(), original);
    }

    #[test]
    fn dithered_bicolor_keeps_planes_disjoint() {
        let panel = PanelSpec::two_color(24, 24);
        let options = ConvertOptions {
            bicolor: true,
            dither: true,
            ..Default::default()
        };
        let (primary, secondary) = planes(convert(&gradient(50, 50), &options, &panel));
        let mut red = 0;
        for y in 0..24 {
            for x in 0..24 {
                assert!(primary.is_white(x, y) || secondary.is_white(x, y));
                if !secondary.is_white(x, y) {
                    red += 1;
                }
            }
        }
        assert!(red > 0);
    }

    #[test]
    fn pure_red_lands_on_red_plane() {
        let panel = PanelSpec::two_color(8, 8);
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 0, 0])));
        let options = ConvertOptions {
            bicolor: true,
            dither: true,
            ..Default::default()
        };
        let (primary, secondary) = planes(convert(&source, &options, &panel));
        assert_eq!(primary, Plane::white(8, 8));
        assert!(secondary.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn monochrome_palette_uses_only_black_and_white() {
        let panel = PanelSpec::seven_color(20, 20);
        let options = ConvertOptions {
            monochrome: true,
            saturation: 0.0,
            ..Default::default()
        };
        let Frame::Palette(plane) = convert(&gradient(20, 20), &options, &panel) else {
            panic!("expected palette frame");
        };
        assert!(plane.indices().iter().all(|&i| i == 0 || i == 1));
    }

    #[test]
    fn swap_is_ignored_for_palette_panels() {
        let panel = PanelSpec::seven_color(10, 10);
        let source = gradient(10, 10);
        let plain = convert(&source, &ConvertOptions::default(), &panel);
        let swapped = convert(
            &source,
            &ConvertOptions {
                swap_planes: true,
                ..Default::default()
            },
            &panel,
        );
        assert_eq!(plain, swapped);
    }

    #[test]
    fn prepared_planes_must_match_panel() {
        let panel = PanelSpec::two_color(8, 2);
        let err = frame_from_prepared(Some(&grey(4, 2, 0)), None, &panel).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidImageDimensions { .. }));
        assert!(matches!(
            frame_from_prepared(None, None, &panel),
            Err(ConversionError::MissingPlanes)
        ));
    }

    #[test]
    fn palette_panel_rejects_two_prepared_planes() {
        let panel = PanelSpec::seven_color(8, 2);
        let black = grey(8, 2, 0);
        let red = grey(8, 2, 255);

        assert!(matches!(
            frame_from_prepared(Some(&black), Some(&red), &panel),
            Err(ConversionError::AmbiguousPlanes)
        ));
        assert!(matches!(
            frame_from_prepared(None, Some(&red), &panel),
            Ok(Frame::Palette(_))
        ));
    }

    #[test]
    fn prepared_red_only_leaves_black_blank() {
        let panel = PanelSpec::two_color(8, 2);
        let frame = frame_from_prepared(None, Some(&grey(8, 2, 0)), &panel).unwrap();
        let (primary, secondary) = planes(frame);
        assert_eq!(primary, Plane::white(8, 2));
        assert!(secondary.as_bytes().iter().all(|&b| b == 0));
    }
}
