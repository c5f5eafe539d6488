//! Common test fixtures for the ABI pipeline tests.

/// Lon/lat boxes as `(west, south, east, north)`.
pub mod bbox {
    /// Central US around the March 2019 cyclone
    pub const CYCLONE: (f64, f64, f64, f64) = (-105.0, 30.0, -85.0, 45.0);

    /// Over the western Pacific, outside the GOES-16 CONUS sector
    pub const WEST_PACIFIC: (f64, f64, f64, f64) = (150.0, 10.0, 170.0, 30.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxes_are_ordered() {
        for (w, s, e, n) in [bbox::CYCLONE, bbox::WEST_PACIFIC] {
            assert!(w < e && s < n);
        }
    }
}
