//! Map rendering: turns extracted GRIB2 fields into one PNG per product.
//!
//! Four products are derived per run:
//! - `2m_temperature`: shaded 2 m temperature in °C
//! - `10m_wind`: shaded 10 m wind speed in m/s with strided direction arrows
//! - `thickness_slp`: shaded 1000-500 hPa thickness (dam) with sea level
//!   pressure isolines every 3 hPa
//! - `precipitation`: shaded accumulated precipitation in mm
//!
//! Rendering is a bilinear upsample of the field grid to output pixels,
//! a fixed multi-stop color ramp per product, and marching-squares isolines
//! for the pressure overlay.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::ForecastRequest;
use crate::error::RenderError;
use crate::grib::{self, FieldKey, GribContents};

/// Output image width in pixels; height follows the grid aspect ratio.
const RENDER_WIDTH: usize = 800;

/// Isoline color for the pressure overlay.
const ISOLINE_RGBA: [u8; 4] = [30, 30, 30, 255];

/// Wind arrow color.
const ARROW_RGBA: [u8; 4] = [40, 40, 40, 255];

/// Grid-point stride between wind arrows.
const ARROW_STRIDE: usize = 5;

/// Wind speed whose arrow shaft spans one stride of grid cells.
const ARROW_REFERENCE_SPEED: f32 = 20.0;

/// Product names, in render order.
pub const PRODUCT_NAMES: [&str; 4] = [
    "2m_temperature",
    "10m_wind",
    "thickness_slp",
    "precipitation",
];

/// One rendered image on disk.
#[derive(Debug, Clone)]
pub struct Product {
    pub name: &'static str,
    pub path: PathBuf,
}

/// A value-to-color ramp stop. Values between stops interpolate linearly;
/// values outside the ramp clamp to the end colors.
#[derive(Debug, Clone, Copy)]
struct ColorStop {
    value: f32,
    rgb: [u8; 3],
}

/// 2 m temperature, °C. Blue through red, -5 to 45.
const TEMP_RAMP: [ColorStop; 7] = [
    ColorStop { value: -5.0, rgb: [49, 54, 149] },
    ColorStop { value: 3.0, rgb: [69, 117, 180] },
    ColorStop { value: 11.0, rgb: [116, 173, 209] },
    ColorStop { value: 19.0, rgb: [224, 243, 248] },
    ColorStop { value: 27.0, rgb: [253, 174, 97] },
    ColorStop { value: 36.0, rgb: [244, 109, 67] },
    ColorStop { value: 45.0, rgb: [165, 0, 38] },
];

/// 10 m wind speed, m/s. White to dark orange, 0 to 24.
const WIND_RAMP: [ColorStop; 5] = [
    ColorStop { value: 0.0, rgb: [255, 245, 235] },
    ColorStop { value: 6.0, rgb: [253, 208, 162] },
    ColorStop { value: 12.0, rgb: [253, 141, 60] },
    ColorStop { value: 18.0, rgb: [217, 72, 1] },
    ColorStop { value: 24.0, rgb: [127, 39, 4] },
];

/// 1000-500 hPa thickness, dam. Blue through yellow to red, 490 to 590.
const THICKNESS_RAMP: [ColorStop; 5] = [
    ColorStop { value: 490.0, rgb: [33, 102, 172] },
    ColorStop { value: 515.0, rgb: [146, 197, 222] },
    ColorStop { value: 540.0, rgb: [255, 255, 191] },
    ColorStop { value: 565.0, rgb: [244, 165, 130] },
    ColorStop { value: 590.0, rgb: [178, 24, 43] },
];

/// Accumulated precipitation, mm. White-blue-green-yellow-red, 0 to 65.
const PRECIP_RAMP: [ColorStop; 6] = [
    ColorStop { value: 0.0, rgb: [255, 255, 255] },
    ColorStop { value: 5.0, rgb: [158, 202, 225] },
    ColorStop { value: 15.0, rgb: [49, 130, 189] },
    ColorStop { value: 30.0, rgb: [49, 163, 84] },
    ColorStop { value: 45.0, rgb: [254, 217, 118] },
    ColorStop { value: 65.0, rgb: [189, 0, 38] },
];

/// Renders products into a figure directory.
pub struct Renderer {
    fig_dir: PathBuf,
}

/// Products that rendered plus the per-product errors that were skipped.
pub struct RenderOutcome {
    pub products: Vec<Product>,
    pub skipped: Vec<RenderError>,
}

impl Renderer {
    pub fn new(fig_dir: PathBuf) -> Self {
        Self { fig_dir }
    }

    /// Render every product.
    ///
    /// Per-product failures (typically a missing field) are logged and
    /// collected, not fatal: surviving products are still produced, matching
    /// how a missing precipitation field is treated as skippable. Callers
    /// decide whether an empty product set fails the run.
    pub fn render_all(
        &self,
        contents: &GribContents,
        request: &ForecastRequest,
    ) -> Result<RenderOutcome, RenderError> {
        std::fs::create_dir_all(&self.fig_dir).map_err(|source| RenderError::Io {
            path: self.fig_dir.clone(),
            source,
        })?;

        let mut products = Vec::new();
        let mut skipped = Vec::new();
        for name in PRODUCT_NAMES {
            match self.render_product(name, contents, request) {
                Ok(product) => {
                    info!(product = name, path = %product.path.display(), "Rendered product");
                    products.push(product);
                }
                Err(e) => {
                    warn!(product = name, error = %e, "Skipping product");
                    skipped.push(e);
                }
            }
        }
        Ok(RenderOutcome { products, skipped })
    }

    /// Render a single named product.
    pub fn render_product(
        &self,
        name: &'static str,
        contents: &GribContents,
        request: &ForecastRequest,
    ) -> Result<Product, RenderError> {
        let (width, height) = request.grid_dims();
        match name {
            "2m_temperature" => {
                let tmp = require(contents, &grib::TMP_2M, name, width * height)?;
                let celsius: Vec<f32> = tmp.iter().map(|k| k - 273.15).collect();
                self.write_product(name, request, &celsius, width, height, &TEMP_RAMP, None)
            }
            "10m_wind" => {
                let u = require(contents, &grib::UGRD_10M, name, width * height)?;
                let v = require(contents, &grib::VGRD_10M, name, width * height)?;
                let speed: Vec<f32> = u
                    .iter()
                    .zip(v.iter())
                    .map(|(u, v)| (u * u + v * v).sqrt())
                    .collect();
                self.write_product(
                    name,
                    request,
                    &speed,
                    width,
                    height,
                    &WIND_RAMP,
                    Some(Overlay::Arrows { u, v }),
                )
            }
            "thickness_slp" => {
                let z1000 = require(contents, &grib::HGT_1000, name, width * height)?;
                let z500 = require(contents, &grib::HGT_500, name, width * height)?;
                let prmsl = require(contents, &grib::PRMSL, name, width * height)?;
                // Thickness in decameters, the conventional unit for the
                // 540 dam rain/snow line.
                let thickness: Vec<f32> = z500
                    .iter()
                    .zip(z1000.iter())
                    .map(|(hi, lo)| (hi - lo) / 10.0)
                    .collect();
                let slp_hpa: Vec<f32> = prmsl.iter().map(|pa| pa / 100.0).collect();
                let overlay = Overlay::Isolines {
                    data: &slp_hpa,
                    levels: isoline_levels(990.0, 1029.0, 3.0),
                };
                self.write_product(
                    name,
                    request,
                    &thickness,
                    width,
                    height,
                    &THICKNESS_RAMP,
                    Some(overlay),
                )
            }
            "precipitation" => {
                let apcp = require(contents, &grib::APCP, name, width * height)?;
                self.write_product(name, request, apcp, width, height, &PRECIP_RAMP, None)
            }
            other => Err(RenderError::Grib(format!("unknown product '{other}'"))),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_product(
        &self,
        name: &'static str,
        request: &ForecastRequest,
        data: &[f32],
        width: usize,
        height: usize,
        ramp: &[ColorStop],
        overlay: Option<Overlay<'_>>,
    ) -> Result<Product, RenderError> {
        let out_width = RENDER_WIDTH;
        // Clamp the aspect ratio so a sliver of a bbox cannot blow up the
        // image height.
        let out_height = (RENDER_WIDTH * height / width).clamp(1, RENDER_WIDTH * 4);

        let resampled = resample_bilinear(data, width, height, out_width, out_height);
        let mut pixels = Vec::with_capacity(out_width * out_height * 4);
        for &value in &resampled {
            let [r, g, b] = sample_ramp(ramp, value);
            pixels.extend_from_slice(&[r, g, b, 255]);
        }

        if let Some(overlay) = overlay {
            let scale_x = (out_width - 1) as f32 / (width - 1).max(1) as f32;
            let scale_y = (out_height - 1) as f32 / (height - 1).max(1) as f32;
            let (segments, rgba) = match overlay {
                Overlay::Isolines { data, levels } => {
                    let mut segments = Vec::new();
                    for level in &levels {
                        segments.extend(march_squares(data, width, height, *level));
                    }
                    (segments, ISOLINE_RGBA)
                }
                Overlay::Arrows { u, v } => (arrow_segments(u, v, width, height), ARROW_RGBA),
            };
            for ((x1, y1), (x2, y2)) in segments {
                draw_line(
                    &mut pixels,
                    out_width,
                    out_height,
                    x1 * scale_x,
                    y1 * scale_y,
                    x2 * scale_x,
                    y2 * scale_y,
                    rgba,
                );
            }
        }

        let path = self.fig_dir.join(format!(
            "{}_{}.png",
            name,
            request.valid_time().format("%Y%m%d_%H")
        ));
        image::save_buffer(
            &path,
            &pixels,
            out_width as u32,
            out_height as u32,
            image::ColorType::Rgba8,
        )?;

        Ok(Product { name, path })
    }
}

/// Line work drawn over the shading, in grid coordinates.
enum Overlay<'a> {
    /// Contour a second field at the given levels.
    Isolines { data: &'a [f32], levels: Vec<f32> },
    /// Strided direction arrows from a vector field.
    Arrows { u: &'a [f32], v: &'a [f32] },
}

/// Arrow segments for a vector field, one arrow every [`ARROW_STRIDE`] grid
/// points: a shaft scaled so [`ARROW_REFERENCE_SPEED`] spans one stride, plus
/// two head strokes swept back from the tip. Calm points are left blank.
fn arrow_segments(u: &[f32], v: &[f32], width: usize, height: usize) -> Vec<Segment> {
    let unit = ARROW_STRIDE as f32 / ARROW_REFERENCE_SPEED;
    let mut segments = Vec::new();
    for y in (0..height).step_by(ARROW_STRIDE) {
        for x in (0..width).step_by(ARROW_STRIDE) {
            let du = u[y * width + x];
            let dv = v[y * width + x];
            if du.is_nan() || dv.is_nan() {
                continue;
            }
            if (du * du + dv * dv).sqrt() < 0.5 {
                continue;
            }
            // Grid rows run north to south, so a northward wind points up.
            let (dx, dy) = (du * unit, -dv * unit);
            let (tail_x, tail_y) = (x as f32, y as f32);
            let (tip_x, tip_y) = (tail_x + dx, tail_y + dy);
            segments.push(((tail_x, tail_y), (tip_x, tip_y)));

            let (back_x, back_y) = (-dx * 0.3, -dy * 0.3);
            segments.push((
                (tip_x, tip_y),
                (tip_x + back_x - back_y * 0.6, tip_y + back_y + back_x * 0.6),
            ));
            segments.push((
                (tip_x, tip_y),
                (tip_x + back_x + back_y * 0.6, tip_y + back_y - back_x * 0.6),
            ));
        }
    }
    segments
}

/// Look up a field and check it against the expected grid size.
fn require<'a>(
    contents: &'a GribContents,
    key: &FieldKey,
    product: &'static str,
    expected: usize,
) -> Result<&'a [f32], RenderError> {
    let values = contents
        .get(key)
        .ok_or(RenderError::MissingField {
            product,
            field: key.name,
        })?;
    if values.len() != expected {
        return Err(RenderError::GridMismatch {
            product,
            expected,
            actual: values.len(),
        });
    }
    Ok(values)
}

/// Linear interpolation over the ramp stops, clamped at both ends.
fn sample_ramp(ramp: &[ColorStop], value: f32) -> [u8; 3] {
    if value.is_nan() || value <= ramp[0].value {
        return ramp[0].rgb;
    }
    let last = ramp[ramp.len() - 1];
    if value >= last.value {
        return last.rgb;
    }
    for pair in ramp.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if value <= hi.value {
            let t = (value - lo.value) / (hi.value - lo.value);
            let mix = |a: u8, b: u8| (a as f32 + t * (b as f32 - a as f32)).round() as u8;
            return [
                mix(lo.rgb[0], hi.rgb[0]),
                mix(lo.rgb[1], hi.rgb[1]),
                mix(lo.rgb[2], hi.rgb[2]),
            ];
        }
    }
    last.rgb
}

/// Contour levels from `start` to `end` inclusive at `step` spacing.
fn isoline_levels(start: f32, end: f32, step: f32) -> Vec<f32> {
    let mut levels = Vec::new();
    let mut level = start;
    while level <= end {
        levels.push(level);
        level += step;
    }
    levels
}

/// Bilinear resampling of a row-major grid to a new resolution.
fn resample_bilinear(
    data: &[f32],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<f32> {
    if src_width == dst_width && src_height == dst_height {
        return data.to_vec();
    }

    let mut output = vec![0.0f32; dst_width * dst_height];
    // A one-point source dimension has nothing to interpolate across; a zero
    // ratio pins every destination sample to that single row or column.
    let ratio = |src: usize, dst: usize| {
        if src > 1 {
            (src - 1) as f32 / (dst - 1).max(1) as f32
        } else {
            0.0
        }
    };
    let x_ratio = ratio(src_width, dst_width);
    let y_ratio = ratio(src_height, dst_height);

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x1 = src_x.floor() as usize;
            let y1 = src_y.floor() as usize;
            let x2 = (x1 + 1).min(src_width - 1);
            let y2 = (y1 + 1).min(src_height - 1);

            let fx = src_x - x1 as f32;
            let fy = src_y - y1 as f32;

            let top = data[y1 * src_width + x1] * (1.0 - fx) + data[y1 * src_width + x2] * fx;
            let bottom = data[y2 * src_width + x1] * (1.0 - fx) + data[y2 * src_width + x2] * fx;
            output[y * dst_width + x] = top * (1.0 - fy) + bottom * fy;
        }
    }
    output
}

/// A contour line segment in grid coordinates: ((x1, y1), (x2, y2)).
type Segment = ((f32, f32), (f32, f32));

/// Marching squares: line segments where `data` crosses `level`.
fn march_squares(data: &[f32], width: usize, height: usize, level: f32) -> Vec<Segment> {
    if width < 2 || height < 2 || data.len() != width * height {
        return vec![];
    }

    let mut segments = Vec::new();
    for y in 0..(height - 1) {
        for x in 0..(width - 1) {
            let tl = data[y * width + x];
            let tr = data[y * width + x + 1];
            let bl = data[(y + 1) * width + x];
            let br = data[(y + 1) * width + x + 1];

            if tl.is_nan() || tr.is_nan() || bl.is_nan() || br.is_nan() {
                continue;
            }

            let mut index = 0u8;
            if tl >= level {
                index |= 1;
            }
            if tr >= level {
                index |= 2;
            }
            if br >= level {
                index |= 4;
            }
            if bl >= level {
                index |= 8;
            }

            let (x, y) = (x as f32, y as f32);
            let top = cross(x, y, x + 1.0, y, tl, tr, level);
            let right = cross(x + 1.0, y, x + 1.0, y + 1.0, tr, br, level);
            let bottom = cross(x, y + 1.0, x + 1.0, y + 1.0, bl, br, level);
            let left = cross(x, y, x, y + 1.0, tl, bl, level);

            match index {
                0 | 15 => {}
                1 | 14 => segments.push((left, top)),
                2 | 13 => segments.push((top, right)),
                3 | 12 => segments.push((left, right)),
                4 | 11 => segments.push((right, bottom)),
                5 => {
                    segments.push((left, top));
                    segments.push((right, bottom));
                }
                6 | 9 => segments.push((top, bottom)),
                7 | 8 => segments.push((left, bottom)),
                10 => {
                    segments.push((top, right));
                    segments.push((left, bottom));
                }
                _ => {}
            }
        }
    }
    segments
}

/// Point where the contour level crosses a cell edge.
fn cross(x1: f32, y1: f32, x2: f32, y2: f32, v1: f32, v2: f32, level: f32) -> (f32, f32) {
    if (v2 - v1).abs() < 1e-6 {
        return ((x1 + x2) / 2.0, (y1 + y2) / 2.0);
    }
    let t = ((level - v1) / (v2 - v1)).clamp(0.0, 1.0);
    (x1 + t * (x2 - x1), y1 + t * (y2 - y1))
}

/// Plot a line segment into an RGBA pixel buffer.
#[allow(clippy::too_many_arguments)]
fn draw_line(
    pixels: &mut [u8],
    width: usize,
    height: usize,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    rgba: [u8; 4],
) {
    let steps = (x2 - x1).abs().max((y2 - y1).abs()).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = (x1 + t * (x2 - x1)).round() as isize;
        let y = (y1 + t * (y2 - y1)).round() as isize;
        if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
            continue;
        }
        let offset = (y as usize * width + x as usize) * 4;
        pixels[offset..offset + 4].copy_from_slice(&rgba);
    }
}
