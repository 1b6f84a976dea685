//! Synthetic GRIB2 fixtures for integration tests.
//!
//! Builds minimal but structurally valid GRIB2 messages (lat/lon grid
//! template 3.0, product template 4.0, simple packing template 5.0) so the
//! pipeline can be exercised without network access or real model output.
//! One message per field, concatenated into one file, like a NOMADS subset.

/// Regular lat/lon grid, scanned +i (west to east), -j (north to south).
#[derive(Debug, Clone, Copy)]
pub struct GridSpec {
    pub ni: u32,
    pub nj: u32,
    /// Latitude of the first (northernmost) row, degrees.
    pub north: f64,
    /// Longitude of the first (westernmost) column, degrees east.
    pub west: f64,
    /// Grid spacing, degrees.
    pub step: f64,
}

impl GridSpec {
    pub fn points(&self) -> usize {
        (self.ni * self.nj) as usize
    }
}

/// One field to encode: GRIB2 identification plus a linear value gradient.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
    /// Code table 4.5 type of first fixed surface.
    pub level_type: u8,
    /// Scaled surface value (scale factor 0), native units.
    pub level_value: u32,
    pub base: f32,
    pub span: f32,
}

/// The seven fields a full forecast subset carries.
pub fn standard_fields() -> Vec<FieldSpec> {
    vec![
        // TMP 2 m above ground, K
        FieldSpec { discipline: 0, category: 0, number: 0, level_type: 103, level_value: 2, base: 270.0, span: 30.0 },
        // UGRD / VGRD 10 m above ground, m/s
        FieldSpec { discipline: 0, category: 2, number: 2, level_type: 103, level_value: 10, base: 0.0, span: 20.0 },
        FieldSpec { discipline: 0, category: 2, number: 3, level_type: 103, level_value: 10, base: 0.0, span: 10.0 },
        // HGT at 1000 hPa and 500 hPa (levels in Pa), gpm
        FieldSpec { discipline: 0, category: 3, number: 5, level_type: 100, level_value: 100_000, base: 20.0, span: 150.0 },
        FieldSpec { discipline: 0, category: 3, number: 5, level_type: 100, level_value: 50_000, base: 5_300.0, span: 500.0 },
        // PRMSL, Pa
        FieldSpec { discipline: 0, category: 3, number: 1, level_type: 101, level_value: 0, base: 98_900.0, span: 4_000.0 },
        // APCP at the surface, mm
        FieldSpec { discipline: 0, category: 1, number: 8, level_type: 1, level_value: 0, base: 0.0, span: 60.0 },
    ]
}

/// `standard_fields` minus precipitation.
pub fn fields_without_precip() -> Vec<FieldSpec> {
    standard_fields()
        .into_iter()
        .filter(|f| !(f.category == 1 && f.number == 8))
        .collect()
}

/// Encode one GRIB2 message per field and concatenate them.
pub fn grib_file_bytes(grid: GridSpec, fields: &[FieldSpec]) -> Vec<u8> {
    let mut file = Vec::new();
    for field in fields {
        file.extend_from_slice(&build_message(grid, field));
    }
    file
}

fn build_message(grid: GridSpec, field: &FieldSpec) -> Vec<u8> {
    let n = grid.points();
    let values: Vec<f32> = (0..n)
        .map(|i| field.base + field.span * i as f32 / (n - 1).max(1) as f32)
        .collect();

    let section1 = build_section1();
    let section3 = build_section3(grid);
    let section4 = build_section4(field);
    let section5 = build_section5(&values);
    let section6 = build_section6();
    let section7 = build_section7(&values);

    let total = 16
        + section1.len()
        + section3.len()
        + section4.len()
        + section5.len()
        + section6.len()
        + section7.len()
        + 4;

    let mut message = Vec::with_capacity(total);
    // Section 0: indicator
    message.extend_from_slice(b"GRIB");
    message.extend_from_slice(&[0, 0]); // reserved
    message.push(field.discipline);
    message.push(2); // edition
    message.extend_from_slice(&(total as u64).to_be_bytes());

    message.extend_from_slice(&section1);
    message.extend_from_slice(&section3);
    message.extend_from_slice(&section4);
    message.extend_from_slice(&section5);
    message.extend_from_slice(&section6);
    message.extend_from_slice(&section7);
    message.extend_from_slice(b"7777");

    message
}

fn build_section1() -> Vec<u8> {
    let mut s = Vec::new();
    s.extend_from_slice(&21u32.to_be_bytes());
    s.push(1);
    s.extend_from_slice(&7u16.to_be_bytes()); // NCEP
    s.extend_from_slice(&0u16.to_be_bytes()); // sub-center
    s.push(2); // master table version
    s.push(1); // local table version
    s.push(1); // reference time is start of forecast
    s.extend_from_slice(&2025u16.to_be_bytes());
    s.push(6); // month
    s.push(15); // day
    s.push(12); // hour
    s.push(0);
    s.push(0);
    s.push(0); // operational
    s.push(1); // forecast data
    s
}

/// GRIB2 signed microdegrees: sign bit plus magnitude.
fn signed_microdeg(deg: f64) -> u32 {
    let magnitude = (deg.abs() * 1e6).round() as u32;
    if deg < 0.0 {
        magnitude | 0x8000_0000
    } else {
        magnitude
    }
}

fn build_section3(grid: GridSpec) -> Vec<u8> {
    let mut s = Vec::new();
    s.extend_from_slice(&72u32.to_be_bytes()); // 14 + 58 template bytes
    s.push(3);
    s.push(0); // grid definition from template
    s.extend_from_slice(&(grid.points() as u32).to_be_bytes());
    s.push(0); // no optional list
    s.push(0);
    s.extend_from_slice(&0u16.to_be_bytes()); // template 3.0: lat/lon

    s.push(6); // spherical earth, radius 6371229 m
    s.push(0);
    s.extend_from_slice(&0u32.to_be_bytes());
    s.push(0);
    s.extend_from_slice(&0u32.to_be_bytes());
    s.push(0);
    s.extend_from_slice(&0u32.to_be_bytes());

    s.extend_from_slice(&grid.ni.to_be_bytes());
    s.extend_from_slice(&grid.nj.to_be_bytes());
    s.extend_from_slice(&0u32.to_be_bytes()); // basic angle
    s.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // subdivisions

    let south = grid.north - grid.step * (grid.nj - 1) as f64;
    let east = grid.west + grid.step * (grid.ni - 1) as f64;
    s.extend_from_slice(&signed_microdeg(grid.north).to_be_bytes()); // La1
    s.extend_from_slice(&signed_microdeg(normalize_lon(grid.west)).to_be_bytes()); // Lo1
    s.push(48); // resolution/component flags
    s.extend_from_slice(&signed_microdeg(south).to_be_bytes()); // La2
    s.extend_from_slice(&signed_microdeg(normalize_lon(east)).to_be_bytes()); // Lo2
    s.extend_from_slice(&((grid.step * 1e6).round() as u32).to_be_bytes()); // Di
    s.extend_from_slice(&((grid.step * 1e6).round() as u32).to_be_bytes()); // Dj
    s.push(0b0100_0000); // +i, -j, i consecutive
    s
}

fn normalize_lon(deg: f64) -> f64 {
    if deg < 0.0 {
        deg + 360.0
    } else {
        deg
    }
}

fn build_section4(field: &FieldSpec) -> Vec<u8> {
    let mut s = Vec::new();
    s.extend_from_slice(&34u32.to_be_bytes());
    s.push(4);
    s.extend_from_slice(&0u16.to_be_bytes()); // no coordinate values
    s.extend_from_slice(&0u16.to_be_bytes()); // template 4.0

    s.push(field.category);
    s.push(field.number);
    s.push(2); // generating process: forecast
    s.push(0);
    s.push(0);
    s.extend_from_slice(&0u16.to_be_bytes()); // cutoff hours
    s.push(0); // cutoff minutes
    s.push(1); // time unit: hours
    s.extend_from_slice(&24u32.to_be_bytes()); // forecast time

    s.push(field.level_type);
    s.push(0); // scale factor
    s.extend_from_slice(&field.level_value.to_be_bytes());

    s.push(255); // no second fixed surface
    s.push(0);
    s.extend_from_slice(&0u32.to_be_bytes());
    s
}

fn build_section5(values: &[f32]) -> Vec<u8> {
    let reference = min_value(values);

    let mut s = Vec::new();
    s.extend_from_slice(&21u32.to_be_bytes());
    s.push(5);
    s.extend_from_slice(&(values.len() as u32).to_be_bytes());
    s.extend_from_slice(&0u16.to_be_bytes()); // template 5.0: simple packing
    s.extend_from_slice(&reference.to_be_bytes());
    // Binary and decimal scale factors of zero: packed values are plain
    // offsets from the reference, quantized to 1 unit. Keeps the encoding
    // trivially correct for field spans below 65536.
    s.extend_from_slice(&0u16.to_be_bytes());
    s.extend_from_slice(&0u16.to_be_bytes());
    s.push(16); // bits per value
    s.push(0); // original type: floating point
    s
}

fn build_section6() -> Vec<u8> {
    let mut s = Vec::new();
    s.extend_from_slice(&6u32.to_be_bytes());
    s.push(6);
    s.push(255); // no bitmap
    s
}

fn build_section7(values: &[f32]) -> Vec<u8> {
    let reference = min_value(values);
    let mut s = Vec::new();
    s.extend_from_slice(&((5 + values.len() * 2) as u32).to_be_bytes());
    s.push(7);
    for &value in values {
        let packed = (value - reference).round().clamp(0.0, 65_535.0) as u16;
        s.extend_from_slice(&packed.to_be_bytes());
    }
    s
}

fn min_value(values: &[f32]) -> f32 {
    values.iter().copied().fold(f32::INFINITY, f32::min)
}
