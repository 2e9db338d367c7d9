//! Tracked sites.

use serde::{Deserialize, Serialize};

/// A site whose forecasts are collected and scored.
///
/// `id` is the stable key used by every persisted record; renaming it orphans
/// the site's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
}

impl Location {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            name: name.into(),
        }
    }

    /// True if both coordinates are inside their valid ranges.
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Airport stations tracked when the config names none.
pub fn default_stations() -> Vec<Location> {
    vec![
        Location::new("KBIS", 46.7727, -100.7467, "Bismarck"),
        Location::new("KBOS", 42.3656, -71.0096, "Boston Logan"),
        Location::new("KDFW", 32.8998, -97.0403, "Dallas/Fort Worth"),
        Location::new("KDEN", 39.8561, -104.6737, "Denver Intl"),
        Location::new("KLAX", 33.9416, -118.4085, "Los Angeles Intl"),
        Location::new("KMIA", 25.7959, -80.2870, "Miami Intl"),
        Location::new("KOMA", 41.3032, -95.8941, "Omaha Eppley"),
        Location::new("KORD", 41.9742, -87.9073, "Chicago O'Hare"),
        Location::new("KPDX", 45.5898, -122.5951, "Portland Intl"),
        Location::new("KPHX", 33.4342, -112.0080, "Phoenix Sky Harbor"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stations_have_unique_ids() {
        let stations = default_stations();
        let mut ids: Vec<&str> = stations.iter().map(|l| l.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), stations.len());
    }

    #[test]
    fn coordinate_ranges() {
        assert!(Location::new("A", 45.0, -120.0, "ok").has_valid_coordinates());
        assert!(!Location::new("B", 91.0, 0.0, "bad lat").has_valid_coordinates());
        assert!(!Location::new("C", 0.0, 181.0, "bad lon").has_valid_coordinates());
    }
}
