//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Driver configuration.
//!

use crate::astro::Location;
use crate::parking::ParkPosition;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_POLL_PERIOD_MS: u64 = 1000;

#[derive(Default, Serialize, Deserialize)]
struct ConfigData {
    #[serde(skip_serializing_if = "Option::is_none")]
    last_device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    park_position: Option<ParkPosition>,
    /// Whether the mount was left parked when last disconnected.
    #[serde(skip_serializing_if = "Option::is_none")]
    parked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    poll_period_ms: Option<u64>
}

pub struct Configuration {
    file_path: PathBuf,
    data: ConfigData
}

impl Configuration {
    pub fn new() -> Configuration {
        Configuration::with_path(config_file_path())
    }

    pub fn with_path(file_path: PathBuf) -> Configuration {
        let data = match std::fs::read_to_string(&file_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("invalid configuration in {}: {}", file_path.display(), e);
                    Default::default()
                }
            },
            Err(_) => Default::default()
        };

        Configuration{ file_path, data }
    }

    pub fn store(&self) -> Result<(), std::io::Error> {
        let contents = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.file_path, contents)
    }

    pub fn last_device(&self) -> Option<String> {
        self.data.last_device.clone()
    }

    pub fn set_last_device(&mut self, value: &str) {
        self.data.last_device = Some(value.to_string());
    }

    pub fn location(&self) -> Option<Location> {
        match (self.data.latitude, self.data.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location{ latitude, longitude }),
            _ => None
        }
    }

    pub fn set_location(&mut self, location: Location) {
        self.data.latitude = Some(location.latitude);
        self.data.longitude = Some(location.longitude);
    }

    pub fn park_position(&self) -> Option<ParkPosition> {
        self.data.park_position
    }

    pub fn set_park_position(&mut self, value: ParkPosition) {
        self.data.park_position = Some(value);
    }

    pub fn parked(&self) -> bool {
        self.data.parked.unwrap_or(false)
    }

    pub fn set_parked(&mut self, value: bool) {
        self.data.parked = Some(value);
    }

    pub fn poll_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.data.poll_period_ms.unwrap_or(DEFAULT_POLL_PERIOD_MS)
        )
    }

    pub fn set_poll_period(&mut self, value: std::time::Duration) {
        self.data.poll_period_ms = Some(value.as_millis() as u64);
    }
}

fn config_file_path() -> PathBuf {
    Path::new(
        &dirs::config_dir().or(Some(Path::new("").to_path_buf())).unwrap()
    ).join("eqdriver.json")
}
