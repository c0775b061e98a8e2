use chrono::TimeDelta;
use clap::Parser;
use std::path::PathBuf;

use crate::record::LatLng;
use crate::storage::{FileStorage, StorageError};
use crate::store::DEFAULT_EXPIRY_DAYS;
use crate::tooltip::Locale;

pub const OSM_TILES: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const MAX_ZOOM: u8 = 19;
pub const MAX_EXPIRY_DAYS: i64 = 3650;

/// Draw forest plots on a map and record planting or cutting.
#[derive(Debug, Clone, Parser)]
#[command(name = "treemap", version)]
pub struct Config {
    /// Latitude of the initial view
    #[arg(long, env = "TREEMAP_CENTER_LAT", default_value_t = 53.283, allow_negative_numbers = true)]
    pub center_lat: f64,

    /// Longitude of the initial view
    #[arg(long, env = "TREEMAP_CENTER_LON", default_value_t = 69.396, allow_negative_numbers = true)]
    pub center_lon: f64,

    /// Initial zoom level
    #[arg(long, env = "TREEMAP_ZOOM", default_value_t = 13,
          value_parser = clap::value_parser!(u8).range(0..=MAX_ZOOM as i64))]
    pub zoom: u8,

    /// Raster tile URL template with {z}, {x} and {y} placeholders
    #[arg(long, env = "TREEMAP_TILE_URL", default_value = OSM_TILES)]
    pub tile_url: String,

    /// Directory holding saved annotations
    #[arg(long, env = "TREEMAP_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Days saved annotations are kept after the last change
    #[arg(long, env = "TREEMAP_EXPIRY_DAYS", default_value_t = DEFAULT_EXPIRY_DAYS,
          value_parser = clap::value_parser!(i64).range(1..=MAX_EXPIRY_DAYS))]
    pub expiry_days: i64,

    /// Language of labels and tooltips
    #[arg(long, env = "TREEMAP_LOCALE", value_enum, default_value_t = Locale::En)]
    pub locale: Locale,
}

impl Config {
    pub fn center(&self) -> LatLng {
        LatLng::new(self.center_lat, self.center_lon)
    }

    /// Lifetime of the saved blob. Saturates instead of panicking; an unreachable
    /// expiry is reported by storage on write.
    pub fn expiry(&self) -> TimeDelta {
        TimeDelta::try_days(self.expiry_days).unwrap_or(TimeDelta::MAX)
    }

    pub fn storage(&self) -> Result<FileStorage, StorageError> {
        match &self.data_dir {
            Some(dir) => Ok(FileStorage::with_root(dir)),
            None => FileStorage::from_default_project(),
        }
    }
}
