//! 通用工具函数

use crate::models::Coordinates;

/// 地球平均半径（公里）
const EARTH_RADIUS_KM: f64 = 6371.0;

/// 两点间的球面直线距离（公里）
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let (lat1, lat2) = (from.lat.to_radians(), to.lat.to_radians());
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// 保留两位小数，便于展示与比较
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 规范化专科标签："Trauma Surgeon" -> "trauma_surgeon"
pub fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_km() {
        let saket = Coordinates::new(28.5245, 77.2060);
        let aiims = Coordinates::new(28.5650, 77.2060);

        let distance = haversine_km(saket, aiims);
        assert!((distance - 4.5).abs() < 0.1);
        assert_eq!(haversine_km(saket, saket), 0.0);
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("Trauma Surgeon"), "trauma_surgeon");
        assert_eq!(normalize_tag(" cardiologist "), "cardiologist");
        assert_eq!(normalize_tag("emergency-physician"), "emergency_physician");
    }
}
