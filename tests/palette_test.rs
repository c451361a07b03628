use scanbind::preprocess::palette::{
    PaletteOptions, extract_palette, posterize, saturation_value,
};
use scanbind::preprocess::round_u8;
use scanbind::source::RasterImage;

/// 100x100 RGB page: near-white background with one 20x20 ink block.
fn two_color_page(bg: [u8; 3], fg: [u8; 3]) -> RasterImage {
    let mut pixels = Vec::with_capacity(100 * 100 * 3);
    for y in 0..100u32 {
        for x in 0..100u32 {
            let px = if (40..60).contains(&x) && (40..60).contains(&y) {
                fg
            } else {
                bg
            };
            pixels.extend_from_slice(&px);
        }
    }
    RasterImage::new(100, 100, 3, pixels)
}

#[test]
fn rounding_rule_is_add_half_then_truncate() {
    assert_eq!(round_u8(0.0), 0);
    assert_eq!(round_u8(0.49), 0);
    assert_eq!(round_u8(0.5), 1);
    assert_eq!(round_u8(254.49), 254);
    assert_eq!(round_u8(254.5), 255);
    // Clamped to the closed interval, not wrapped.
    assert_eq!(round_u8(300.0), 255);
    assert_eq!(round_u8(-0.4), 0);
    assert_eq!(round_u8(-10.0), 0);
}

#[test]
fn saturation_value_boundaries() {
    assert_eq!(saturation_value(255, 255, 255), (0.0, 1.0));
    assert_eq!(saturation_value(0, 0, 0), (0.0, 0.0));
    assert_eq!(saturation_value(255, 0, 0), (1.0, 1.0));
    let (sat, val) = saturation_value(128, 64, 64);
    assert_eq!(sat, 0.5);
    assert_eq!(val, 128.0 / 255.0);
}

#[test]
fn p6_two_color_image_round_trips_exactly() {
    let bg = [250, 250, 250];
    let fg = [40, 40, 200];
    let page = two_color_page(bg, fg);

    let result = extract_palette(&page, 2, &PaletteOptions::default()).unwrap();
    assert_eq!(result.palette.len(), 2);
    assert_eq!(result.palette[0], [250.0, 250.0, 250.0]);
    assert_eq!(result.palette[1], [40.0, 40.0, 200.0]);

    // Background pixels map to entry 0, ink to entry 1.
    assert_eq!(result.indexes[0], 0);
    assert_eq!(result.indexes[50 * 100 + 50], 1);

    // Re-compositing through the palette reproduces the page exactly.
    let composited = result.composite();
    assert_eq!(composited.pixels, page.pixels);
}

#[test]
fn background_is_most_common_color_not_first_color() {
    // Ink occupies the top-left corner; background must still win.
    let mut page = two_color_page([230, 230, 230], [10, 10, 10]);
    for y in 0..10u32 {
        for x in 0..10u32 {
            let idx = ((y * 100 + x) * 3) as usize;
            page.pixels[idx..idx + 3].copy_from_slice(&[10, 10, 10]);
        }
    }

    let result = extract_palette(&page, 2, &PaletteOptions::default()).unwrap();
    assert_eq!(result.palette[0], [230.0, 230.0, 230.0]);
}

#[test]
fn uniform_image_yields_background_only_palette() {
    let page = RasterImage::new(50, 50, 3, vec![240; 50 * 50 * 3]);
    let result = extract_palette(&page, 4, &PaletteOptions::default()).unwrap();
    assert_eq!(result.palette.len(), 4);
    assert!(result.indexes.iter().all(|&i| i == 0));
    assert_eq!(result.palette[0], [240.0, 240.0, 240.0]);
}

#[test]
fn white_background_option_forces_entry_zero_to_white() {
    let page = two_color_page([235, 240, 238], [20, 20, 120]);
    let opts = PaletteOptions {
        white_background: true,
        ..PaletteOptions::default()
    };
    let result = extract_palette(&page, 2, &opts).unwrap();
    assert_eq!(result.palette[0], [255.0, 255.0, 255.0]);

    let composited = result.composite();
    // Background pixels composite to pure white.
    assert_eq!(&composited.pixels[0..3], &[255, 255, 255]);
}

#[test]
fn saturation_stretch_maxes_out_the_most_saturated_entry() {
    let page = two_color_page([250, 250, 250], [100, 150, 150]);
    let opts = PaletteOptions {
        stretch_saturation: true,
        ..PaletteOptions::default()
    };
    let result = extract_palette(&page, 2, &opts).unwrap();

    // Ink entry: sat was (150-100)/150; after stretching against the
    // zero-saturation background it must sit at exactly 1.0.
    let entry = result.palette[1];
    let (sat, _val) = saturation_value(round_u8(entry[0]), round_u8(entry[1]), round_u8(entry[2]));
    assert!((sat - 1.0).abs() < 0.01, "stretched saturation was {sat}");
}

#[test]
fn color_count_is_clamped() {
    let page = two_color_page([250, 250, 250], [40, 40, 200]);
    let result = extract_palette(&page, 1, &PaletteOptions::default()).unwrap();
    assert_eq!(result.palette.len(), 2);
    let result = extract_palette(&page, 100_000, &PaletteOptions::default()).unwrap();
    assert_eq!(result.palette.len(), 256);
}

#[test]
fn posterize_two_colors_snaps_channels_to_extremes() {
    let mut page = RasterImage::new(2, 1, 3, vec![100, 200, 0, 255, 30, 128]);
    posterize(&mut page, 2);
    assert_eq!(page.pixels, vec![0, 255, 0, 255, 0, 255]);
}

#[test]
fn posterize_27_colors_uses_three_levels() {
    let mut page = RasterImage::new(1, 1, 3, vec![100, 0, 255]);
    posterize(&mut page, 27);
    assert_eq!(page.pixels, vec![128, 0, 255]);
}
