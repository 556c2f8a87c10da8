use image::{DynamicImage, Rgb, RgbImage};

use crate::convert::{ConvertOptions, Frame, convert};
use crate::job::Job;
use crate::panel::PanelSpec;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Startup card: a black frame around a red arrow pointing at the top edge,
/// so the mounting orientation is obvious at a glance.
pub fn banner_image(panel: &PanelSpec) -> RgbImage {
    let (w, h) = (panel.width as u32, panel.height as u32);
    let mut img = RgbImage::from_pixel(w, h, WHITE);
    if w == 0 || h == 0 {
        return img;
    }

    let border = (w.min(h) / 40).max(1);
    for (x, y, p) in img.enumerate_pixels_mut() {
        if x < border || y < border || x >= w - border || y >= h - border {
            *p = BLACK;
        }
    }

    let cx = (w / 2) as i32;
    let tip_y = (h as f32 * 0.15) as i32;
    let base_y = (h as f32 * 0.55) as i32;
    let max_half = (w as f32 * 0.25) as i32;
    for y in tip_y..=base_y {
        let t = (y - tip_y) as f32 / (base_y - tip_y).max(1) as f32;
        let half = (max_half as f32 * t) as i32;
        let x0 = (cx - half).max(0) as u32;
        let x1 = (cx + half).min(w as i32 - 1) as u32;
        for x in x0..=x1 {
            img.put_pixel(x, y as u32, RED);
        }
    }

    let shaft_half = ((w as f32 * 0.05) as i32).max(1);
    let shaft_end = (h as f32 * 0.85) as u32;
    let x0 = (cx - shaft_half).max(0) as u32;
    let x1 = (cx + shaft_half).min(w as i32 - 1) as u32;
    for y in base_y as u32..=shaft_end.min(h - 1) {
        for x in x0..=x1 {
            img.put_pixel(x, y, BLACK);
        }
    }
    img
}

pub fn banner_frame(panel: &PanelSpec) -> Frame {
    // Pure colours against the unblended palette map exactly, without dither noise.
    let options = ConvertOptions {
        bicolor: true,
        dither: true,
        saturation: 0.0,
        ..ConvertOptions::default()
    };
    convert(&DynamicImage::ImageRgb8(banner_image(panel)), &options, panel)
}

pub fn banner_job(panel: &PanelSpec) -> Job {
    Job::Raw {
        frame: banner_frame(panel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::dither::acep_palette;

    #[test]
    fn two_color_banner_uses_both_planes() {
        let panel = PanelSpec::two_color(400, 300);
        let Frame::TwoColor { primary, secondary } = banner_frame(&panel) else {
            panic!("expected two planes");
        };
        // Corner is border, centre of the arrow head is red, the left margin is white.
        assert!(!primary.is_white(0, 0));
        assert!(secondary.is_white(0, 0));
        assert!(!secondary.is_white(200, 120));
        assert!(primary.is_white(200, 120));
        assert!(primary.is_white(40, 150) && secondary.is_white(40, 150));
    }

    #[test]
    fn palette_banner_maps_to_exact_entries() {
        let panel = PanelSpec::seven_color(600, 448);
        let Frame::Palette(plane) = banner_frame(&panel) else {
            panic!("expected palette frame");
        };
        let palette = acep_palette(0.0);
        let red = palette.iter().position(|c| *c == [255.0, 0.0, 0.0]).unwrap() as u8;
        assert_eq!(plane.get(0, 0), 0);
        assert_eq!(plane.get(300, 180), red);
        assert_eq!(plane.get(60, 224), 1);
    }

    #[test]
    fn banner_job_fits_panel() {
        let panel = PanelSpec::two_color(16, 8);
        let Job::Raw { frame } = banner_job(&panel) else {
            panic!("expected raw job");
        };
        assert!(frame.fits(&panel));
    }
}
