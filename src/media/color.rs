//! Colour-mode flattening.
//!
//! JPEG has no alpha channel, so every decoded image is reduced to 8-bit RGB
//! before encoding. The decoded colour type is resolved into a [`ColorMode`]
//! once, and [`ColorMode::flatten`] performs the matching conversion:
//!
//! | Mode      | Source colour types                 | Conversion                     |
//! |-----------|-------------------------------------|--------------------------------|
//! | `Rgb`     | RGB8                                | none                           |
//! | `Alpha`   | LA, RGBA (8/16-bit, float)          | composite onto white           |
//! | `Palette` | indexed PNG, GIF                    | expand to RGBA, then composite |
//! | `Other`   | L, RGB16, RGB float                 | direct RGB conversion          |

use image::{ColorType, DynamicImage, Rgb, RgbImage, RgbaImage};

use super::detect::SourceFormat;

/// PNG IHDR colour type for indexed images.
const PNG_COLOR_TYPE_INDEXED: u8 = 3;

/// Offset of the colour type byte: 8 signature + 4 length + 4 "IHDR" + 4 width
/// + 4 height + 1 bit depth.
const PNG_COLOR_TYPE_OFFSET: usize = 25;

/// How a decoded image must be converted to reach 8-bit RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Already 8-bit RGB
    Rgb,
    /// Carries an alpha channel
    Alpha,
    /// Indexed colour in the source encoding
    Palette,
    /// Any other opaque layout (greyscale, high bit depth)
    Other,
}

impl ColorMode {
    /// Classify a decoded image.
    ///
    /// `palette` reports whether the source encoding was indexed; the decoder
    /// has already expanded indices by the time we see pixels.
    pub fn classify(color: ColorType, palette: bool) -> Self {
        if palette {
            return ColorMode::Palette;
        }
        match color {
            ColorType::Rgb8 => ColorMode::Rgb,
            c if c.has_alpha() => ColorMode::Alpha,
            _ => ColorMode::Other,
        }
    }

    /// Convert the image to opaque 8-bit RGB.
    pub fn flatten(self, image: DynamicImage) -> RgbImage {
        match self {
            ColorMode::Rgb | ColorMode::Other => image.into_rgb8(),
            ColorMode::Alpha | ColorMode::Palette => composite_on_white(&image.into_rgba8()),
        }
    }
}

/// Conventional short name for a decoded colour layout ("RGB", "RGBA", "P", ...).
pub fn mode_name(color: ColorType, palette: bool) -> &'static str {
    if palette {
        return "P";
    }
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGB;F",
        ColorType::Rgba32F => "RGBA;F",
        _ => "unknown",
    }
}

/// Returns `true` if the source encoding stores palette indices.
pub fn is_indexed_source(format: SourceFormat, bytes: &[u8]) -> bool {
    match format {
        SourceFormat::Gif => true,
        SourceFormat::Png => {
            bytes.len() > PNG_COLOR_TYPE_OFFSET
                && &bytes[12..16] == b"IHDR"
                && bytes[PNG_COLOR_TYPE_OFFSET] == PNG_COLOR_TYPE_INDEXED
        }
        _ => false,
    }
}

/// Alpha-composite `image` onto an opaque white canvas of the same size.
pub fn composite_on_white(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        Rgb([blend(r, a), blend(g, a), blend(b, a)])
    })
}

#[inline]
fn blend(channel: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    let value = channel as u32 * a + 255 * (255 - a);
    ((value + 127) / 255) as u8
}
