//! Color parsing and blending

use image::Rgba;

/// Parse a hex color into RGBA
///
/// Accepts `RGB`, `RRGGBB` and `RRGGBBAA`, with or without a leading `#`.
/// Alpha defaults to opaque. Returns None on invalid input.
pub fn parse_hex_color(hex: &str) -> Option<Rgba<u8>> {
    let hex = hex.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        3 => {
            // Short format: expand F -> FF
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some(Rgba([r, g, b, 255]))
        }
        _ => None,
    }
}

/// Format as `#rrggbb` (or `#rrggbbaa` when not opaque)
pub fn to_hex(color: Rgba<u8>) -> String {
    let [r, g, b, a] = color.0;
    if a == 255 {
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
    }
}

/// Composite `color` over `base` at `coverage` (0 = untouched, 255 = full)
///
/// Source-over in straight alpha; the color's own alpha scales coverage.
pub fn blend_pixel(base: &mut Rgba<u8>, color: Rgba<u8>, coverage: u8) {
    let src_a = (coverage as f32 / 255.0) * (color[3] as f32 / 255.0);
    if src_a <= 0.0 {
        return;
    }
    let dst_a = base[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    for i in 0..3 {
        let src = color[i] as f32 / 255.0;
        let dst = base[i] as f32 / 255.0;
        let out = (src * src_a + dst * dst_a * (1.0 - src_a)) / out_a;
        base[i] = (out * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    base[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}
