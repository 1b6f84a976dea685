//! Named-field extraction from GRIB2 files.
//!
//! Binary parsing and unpacking are delegated to the `grib` crate; this
//! module only identifies the submessages the products need (by discipline,
//! parameter category/number, and fixed surface) and decodes their values.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use crate::error::RenderError;

/// Identifies one meteorological field inside a GRIB2 file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldKey {
    pub name: &'static str,
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
    /// GRIB2 code table 4.5 type of first fixed surface.
    pub surface_type: u8,
    /// Level value in the surface type's native unit (m or Pa), when the
    /// surface type alone is not enough to single the field out.
    pub level_value: Option<f64>,
}

/// 2 m temperature (K).
pub const TMP_2M: FieldKey = FieldKey {
    name: "TMP 2m",
    discipline: 0,
    category: 0,
    number: 0,
    surface_type: 103,
    level_value: Some(2.0),
};

/// 10 m u wind component (m/s).
pub const UGRD_10M: FieldKey = FieldKey {
    name: "UGRD 10m",
    discipline: 0,
    category: 2,
    number: 2,
    surface_type: 103,
    level_value: Some(10.0),
};

/// 10 m v wind component (m/s).
pub const VGRD_10M: FieldKey = FieldKey {
    name: "VGRD 10m",
    discipline: 0,
    category: 2,
    number: 3,
    surface_type: 103,
    level_value: Some(10.0),
};

/// Geopotential height at 1000 hPa (gpm). Isobaric levels are in Pa.
pub const HGT_1000: FieldKey = FieldKey {
    name: "HGT 1000hPa",
    discipline: 0,
    category: 3,
    number: 5,
    surface_type: 100,
    level_value: Some(100_000.0),
};

/// Geopotential height at 500 hPa (gpm).
pub const HGT_500: FieldKey = FieldKey {
    name: "HGT 500hPa",
    discipline: 0,
    category: 3,
    number: 5,
    surface_type: 100,
    level_value: Some(50_000.0),
};

/// Pressure reduced to mean sea level (Pa).
pub const PRMSL: FieldKey = FieldKey {
    name: "PRMSL",
    discipline: 0,
    category: 3,
    number: 1,
    surface_type: 101,
    level_value: None,
};

/// Accumulated total precipitation (kg/m², i.e. mm).
pub const APCP: FieldKey = FieldKey {
    name: "APCP surface",
    discipline: 0,
    category: 1,
    number: 8,
    surface_type: 1,
    level_value: None,
};

/// One decoded field: identification plus its unpacked grid values.
#[derive(Debug, Clone)]
pub struct GribField {
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
    pub surface_type: u8,
    pub level_value: f64,
    pub values: Vec<f32>,
}

impl FieldKey {
    fn matches(&self, field: &GribField) -> bool {
        if self.discipline != field.discipline
            || self.category != field.category
            || self.number != field.number
            || self.surface_type != field.surface_type
        {
            return false;
        }
        match self.level_value {
            Some(expected) => {
                // Tolerance wide enough for scale-factor rounding, narrow
                // enough to keep 1000 hPa and 500 hPa apart.
                (field.level_value - expected).abs() <= expected.abs() * 1e-3 + 0.5
            }
            None => true,
        }
    }
}

/// All decoded fields of one GRIB2 file.
pub struct GribContents {
    fields: Vec<GribField>,
}

impl GribContents {
    /// Read and decode every submessage of the file.
    ///
    /// Subset files from the grib filter only contain the handful of fields
    /// that were asked for, so decoding everything up front is cheap and
    /// lets each product look up its inputs without re-reading the file.
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let file = File::open(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let grib2 = grib::from_reader(reader).map_err(|e| RenderError::Grib(format!("{e:?}")))?;

        let mut fields = Vec::new();
        for (_index, submessage) in grib2.iter() {
            let discipline = submessage.indicator().discipline;
            let prod_def = submessage.prod_def();
            let (Some(category), Some(number)) = (
                prod_def.parameter_category(),
                prod_def.parameter_number(),
            ) else {
                continue;
            };
            let (surface_type, level_value) = match prod_def.fixed_surfaces() {
                Some((first, _second)) => (first.surface_type, first.value()),
                None => (255, f64::NAN),
            };

            let decoder = grib::Grib2SubmessageDecoder::from(submessage)
                .map_err(|e| RenderError::Grib(format!("{e:?}")))?;
            let values: Vec<f32> = decoder
                .dispatch()
                .map_err(|e| RenderError::Grib(format!("{e:?}")))?
                .collect();

            debug!(
                discipline,
                category,
                number,
                surface_type,
                level_value,
                points = values.len(),
                "Decoded GRIB2 field"
            );
            fields.push(GribField {
                discipline,
                category,
                number,
                surface_type,
                level_value,
                values,
            });
        }

        Ok(Self { fields })
    }

    #[cfg(test)]
    pub fn from_fields(fields: Vec<GribField>) -> Self {
        Self { fields }
    }

    /// Grid values for a field, or `None` when the file does not carry it.
    pub fn get(&self, key: &FieldKey) -> Option<&[f32]> {
        self.fields
            .iter()
            .find(|f| key.matches(f))
            .map(|f| f.values.as_slice())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
