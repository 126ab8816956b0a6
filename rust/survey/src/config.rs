// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration loaded from environment variables.

use std::str::FromStr;

use facade_lite_geometry::CalibrationConfig;
use tracing::warn;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Calibration band, rounding and preview scale.
    pub calibration: CalibrationConfig,
    /// Decimal places of area values written into survey forms.
    pub area_decimals: usize,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their default, and an unusable
    /// calibration band reverts to the default band.
    pub fn from_env() -> Self {
        let defaults = CalibrationConfig::default();
        Self {
            calibration: CalibrationConfig {
                min_meter_per_pixel: env_or("FACADE_SCALE_MIN", defaults.min_meter_per_pixel),
                max_meter_per_pixel: env_or("FACADE_SCALE_MAX", defaults.max_meter_per_pixel),
                decimals: env_or("FACADE_SCALE_DECIMALS", defaults.decimals),
                preview_meter_per_pixel: env_or(
                    "FACADE_PREVIEW_METER_PER_PIXEL",
                    defaults.preview_meter_per_pixel,
                ),
            },
            area_decimals: env_or("FACADE_AREA_DECIMALS", DEFAULT_AREA_DECIMALS),
        }
        .sanitized()
    }

    /// Replace calibration settings that would make the engines misbehave
    /// with their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = CalibrationConfig::default();
        let calibration = &mut self.calibration;
        if !calibration.has_valid_band() {
            warn!(
                min = calibration.min_meter_per_pixel,
                max = calibration.max_meter_per_pixel,
                "Invalid meter-per-pixel band, using defaults"
            );
            calibration.min_meter_per_pixel = defaults.min_meter_per_pixel;
            calibration.max_meter_per_pixel = defaults.max_meter_per_pixel;
        }
        let preview = calibration.preview_meter_per_pixel;
        if !preview.is_finite() || preview <= 0.0 {
            warn!(preview = preview, "Invalid preview meter-per-pixel, using default");
            calibration.preview_meter_per_pixel = defaults.preview_meter_per_pixel;
        }
        if calibration.decimals > MAX_SCALE_DECIMALS {
            warn!(decimals = calibration.decimals, "Scale precision too high, using default");
            calibration.decimals = defaults.decimals;
        }
        self
    }
}

const MAX_SCALE_DECIMALS: u32 = 15;

const DEFAULT_AREA_DECIMALS: usize = 2;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationConfig::default(),
            area_decimals: DEFAULT_AREA_DECIMALS,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
