//! Run configuration: forecast request parameters and mail settings.
//!
//! A [`ForecastRequest`] is built once from CLI input and threaded through
//! the whole run; the bounding box is an explicit field, never ambient state.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Default NOMADS server used to build grib-filter URLs.
pub const DEFAULT_NOMADS_URL: &str = "https://nomads.ncep.noaa.gov";

/// GFS run cycles, in UTC hours.
pub const GFS_CYCLES: [u32; 4] = [0, 6, 12, 18];

/// Variables requested from the grib filter.
const FILTER_VARS: [&str; 6] = ["APCP", "HGT", "PRMSL", "TMP", "UGRD", "VGRD"];

/// Levels requested from the grib filter.
const FILTER_LEVELS: [&str; 6] = [
    "2_m_above_ground",
    "10_m_above_ground",
    "1000_mb",
    "500_mb",
    "mean_sea_level",
    "surface",
];

/// GFS output grid resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resolution {
    /// 0.25 degree grid
    #[value(name = "0p25")]
    P25,
    /// 0.50 degree grid
    #[value(name = "0p50")]
    P50,
    /// 1.00 degree grid
    #[value(name = "1p00")]
    P100,
}

impl Resolution {
    /// Grid spacing in degrees.
    pub fn degrees(self) -> f64 {
        match self {
            Resolution::P25 => 0.25,
            Resolution::P50 => 0.5,
            Resolution::P100 => 1.0,
        }
    }

    /// Token used in NOMADS file names and filter script names.
    pub fn token(self) -> &'static str {
        match self {
            Resolution::P25 => "0p25",
            Resolution::P50 => "0p50",
            Resolution::P100 => "1p00",
        }
    }
}

/// A geographic bounding box in degrees, west/east in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Self {
        Self {
            west,
            east,
            south,
            north,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.west >= self.east {
            bail!("bbox west ({}) must be less than east ({})", self.west, self.east);
        }
        if self.south >= self.north {
            bail!(
                "bbox south ({}) must be less than north ({})",
                self.south,
                self.north
            );
        }
        if self.west < -180.0 || self.east > 180.0 || self.south < -90.0 || self.north > 90.0 {
            bail!("bbox out of range: {:?}", self);
        }
        Ok(())
    }

    /// Stable filename tag, e.g. `m80_m30_m60_5` for (-80, -30, -60, 5).
    pub fn tag(&self) -> String {
        fn part(v: f64) -> String {
            let s = if v == v.trunc() {
                format!("{}", v as i64)
            } else {
                format!("{}", v).replace('.', "p")
            };
            s.replace('-', "m")
        }
        format!(
            "{}_{}_{}_{}",
            part(self.west),
            part(self.east),
            part(self.south),
            part(self.north)
        )
    }
}

/// Immutable description of one forecast fetch, built once per run.
#[derive(Debug, Clone)]
pub struct ForecastRequest {
    /// Model run time (date + cycle hour, UTC).
    pub cycle: DateTime<Utc>,
    /// Forecast lead time in hours.
    pub forecast_hour: u32,
    pub resolution: Resolution,
    pub bbox: BoundingBox,
    /// A local file younger than this is considered fresh.
    pub max_age: std::time::Duration,
}

impl ForecastRequest {
    /// Time the forecast is valid for.
    pub fn valid_time(&self) -> DateTime<Utc> {
        self.cycle + Duration::hours(self.forecast_hour as i64)
    }

    /// Deterministic local filename for this request. Identical parameters
    /// always name the same file, which is what makes the freshness skip work.
    pub fn local_filename(&self) -> String {
        format!(
            "gfs.{}.t{:02}z.pgrb2.{}.f{:03}.{}.grib2",
            self.cycle.format("%Y%m%d"),
            self.cycle.hour(),
            self.resolution.token(),
            self.forecast_hour,
            self.bbox.tag()
        )
    }

    /// Expected grid dimensions (width, height) of the subset file.
    ///
    /// The grib filter returns an inclusive lat/lon grid, so a 10 degree
    /// span at 1 degree spacing has 11 points.
    pub fn grid_dims(&self) -> (usize, usize) {
        let step = self.resolution.degrees();
        let width = ((self.bbox.east - self.bbox.west) / step).round() as usize + 1;
        let height = ((self.bbox.north - self.bbox.south) / step).round() as usize + 1;
        (width, height)
    }

    /// NOMADS grib-filter URL for this request.
    pub fn filter_url(&self, base: &str) -> String {
        let res = self.resolution.token();
        let mut url = format!(
            "{}/cgi-bin/filter_gfs_{}.pl?dir=%2Fgfs.{}%2F{:02}%2Fatmos&file=gfs.t{:02}z.pgrb2.{}.f{:03}",
            base.trim_end_matches('/'),
            res,
            self.cycle.format("%Y%m%d"),
            self.cycle.hour(),
            self.cycle.hour(),
            res,
            self.forecast_hour,
        );
        for var in FILTER_VARS {
            url.push_str("&var_");
            url.push_str(var);
            url.push_str("=on");
        }
        for lev in FILTER_LEVELS {
            url.push_str("&lev_");
            url.push_str(lev);
            url.push_str("=on");
        }
        url.push_str(&format!(
            "&subregion=&toplat={}&leftlon={}&rightlon={}&bottomlat={}",
            self.bbox.north, self.bbox.west, self.bbox.east, self.bbox.south
        ));
        url
    }
}

/// Parse a `--cycle` argument: either `latest` or `YYYYMMDDHH`.
pub fn parse_cycle(s: &str, now: DateTime<Utc>, delay_hours: u32) -> Result<DateTime<Utc>> {
    if s.eq_ignore_ascii_case("latest") {
        return Ok(latest_available_cycle(now, delay_hours));
    }
    if s.len() != 10 || !s.is_ascii() {
        bail!("cycle must be 'latest' or YYYYMMDDHH, got '{}'", s);
    }
    let (date_part, hour_part) = s.split_at(8);
    let date = chrono::NaiveDate::parse_from_str(date_part, "%Y%m%d")
        .with_context(|| format!("invalid cycle date '{}'", date_part))?;
    let hour: u32 = hour_part
        .parse()
        .with_context(|| format!("invalid cycle hour '{}'", hour_part))?;
    if !GFS_CYCLES.contains(&hour) {
        bail!("cycle hour must be one of {:?}, got {}", GFS_CYCLES, hour);
    }
    let ndt = date.and_hms_opt(hour, 0, 0).context("invalid cycle datetime")?;
    Ok(Utc.from_utc_datetime(&ndt))
}

/// Most recent cycle expected to be published, accounting for the lag
/// between a model run and its files appearing on NOMADS.
pub fn latest_available_cycle(now: DateTime<Utc>, delay_hours: u32) -> DateTime<Utc> {
    let shifted = now - Duration::hours(delay_hours as i64);
    let hour = shifted.hour();
    let cycle_hour = GFS_CYCLES
        .iter()
        .filter(|&&c| c <= hour)
        .max()
        .copied()
        .unwrap_or(0);
    shifted
        .date_naive()
        .and_hms_opt(cycle_hour, 0, 0)
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .unwrap_or(shifted)
}

/// E-mail delivery settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub smtp_server: String,
    pub port: u16,
    pub zip_name: String,
    /// Delete the zip from disk after a successful send.
    pub remove_archive: bool,
}
