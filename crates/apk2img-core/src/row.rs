//! The per-sample feature record and its persisted column schema.
//!
//! One `FeatureRow` holds everything the manifest extractor derives for a
//! single APK: named scalar counts, the four raw token sets, and the
//! file-name identity that ties the row to its rasters. The serde field
//! order below IS the persisted column order; the store validates loaded
//! headers against [`STORE_HEADER`].

use serde::{Deserialize, Serialize};

/// Column names of the persisted tabular store, in order.
pub const STORE_HEADER: [&str; 18] = [
    "App name",
    "Number of Icons",
    "Number of Audio",
    "Number of Videos",
    "App size",
    "Number of Activities",
    "Number of Meta-Data",
    "Number of Services",
    "Number of Permissions",
    "Number of Actions",
    "Number of Providers",
    "Number of Receivers",
    "Number of Categories",
    "Permissions",
    "Actions",
    "Services",
    "Categories",
    "FileName",
];

/// Scalar fields emitted at the head of every feature vector, in the order
/// [`FeatureRow::scalars`] produces them.
pub const SCALAR_FIELD_COUNT: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    #[serde(rename = "App name")]
    pub package: String,
    #[serde(rename = "Number of Icons")]
    pub icon_count: u32,
    #[serde(rename = "Number of Audio")]
    pub audio_count: u32,
    #[serde(rename = "Number of Videos")]
    pub video_count: u32,
    /// Persisted as the bucketed human-readable form ("3.4MiB"); the numeric
    /// value round-trips through [`human_size`].
    #[serde(rename = "App size", with = "human_size")]
    pub size_bytes: u64,
    #[serde(rename = "Number of Activities")]
    pub activity_count: u32,
    #[serde(rename = "Number of Meta-Data")]
    pub meta_data_count: u32,
    #[serde(rename = "Number of Services")]
    pub service_count: u32,
    #[serde(rename = "Number of Permissions")]
    pub permission_count: u32,
    #[serde(rename = "Number of Actions")]
    pub action_count: u32,
    #[serde(rename = "Number of Providers")]
    pub provider_count: u32,
    #[serde(rename = "Number of Receivers")]
    pub receiver_count: u32,
    #[serde(rename = "Number of Categories")]
    pub category_count: u32,
    #[serde(rename = "Permissions", with = "json_cell")]
    pub permissions: Vec<String>,
    #[serde(rename = "Actions", with = "json_cell")]
    pub actions: Vec<String>,
    #[serde(rename = "Services", with = "json_cell")]
    pub services: Vec<String>,
    #[serde(rename = "Categories", with = "json_cell")]
    pub categories: Vec<String>,
    #[serde(rename = "FileName")]
    pub file_name: String,
}

impl FeatureRow {
    /// The store's unique key: the artifact's file name, not its path.
    pub fn identity(&self) -> &str {
        &self.file_name
    }

    /// File-name stem used to key this sample's rasters.
    pub fn stem(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.file_name)
    }

    /// Scalar fields in declared order. This order is a layout contract:
    /// every feature vector starts with exactly these values.
    pub fn scalars(&self) -> [f32; SCALAR_FIELD_COUNT] {
        [
            self.icon_count as f32,
            self.audio_count as f32,
            self.video_count as f32,
            self.size_bytes as f32,
            self.activity_count as f32,
            self.meta_data_count as f32,
            self.service_count as f32,
            self.permission_count as f32,
            self.action_count as f32,
            self.provider_count as f32,
            self.receiver_count as f32,
            self.category_count as f32,
        ]
    }
}

/// Size-bucketed human-readable byte counts, binary units: "512.0B",
/// "3.4KiB", "1.2GiB". `parse` inverts `format` over bucketed values, so a
/// size written to the store loads back to the same bucketed number.
pub mod human_size {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const UNITS: [&str; 8] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"];

    pub fn format(bytes: u64) -> String {
        let mut value = bytes as f64;
        for unit in UNITS {
            if value < 1024.0 {
                return format!("{value:.1}{unit}B");
            }
            value /= 1024.0;
        }
        format!("{value:.1}YiB")
    }

    pub fn parse(s: &str) -> Option<u64> {
        let s = s.trim().strip_suffix('B')?;
        let (number, multiplier) = UNITS
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .find_map(|(exp, unit)| {
                s.strip_suffix(unit)
                    .map(|num| (num, 1024f64.powi(exp as i32)))
            })
            .unwrap_or((s, 1.0));
        let value: f64 = number.trim().parse().ok()?;
        if value < 0.0 {
            return None;
        }
        Some((value * multiplier).round() as u64)
    }

    pub fn serialize<S: Serializer>(bytes: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| D::Error::custom(format!("unparseable app size {s:?}")))
    }
}

/// Token sets persisted as compact JSON arrays inside one tabular cell, so
/// multi-value categorical data survives a flat row-oriented format exactly.
mod json_cell {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        tokens: &Vec<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let json = serde_json::to_string(tokens).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&json)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<String>, D::Error> {
        let s = String::deserialize(deserializer)?;
        serde_json::from_str(&s).map_err(|e| D::Error::custom(format!("bad token cell: {e}")))
    }
}
