//! Territory detection against the session's territory table.

use chronoatlas_core::detection::{BoxFuture, DetectionError, DetectionResult, LineTerritories, TerritoryDetector};
use chronoatlas_core::geometry::{self, LatLng};
use chronoatlas_core::shapes::{Line, Shape};
use chronoatlas_render::TerritoryHighlight;
use kurbo::{Point, Rect};

/// Bounding-box lookup over a fixed set of territories.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    entries: Vec<(String, Rect)>,
    circle_steps: usize,
}

impl TableDetector {
    pub fn new(territories: &[TerritoryHighlight], circle_steps: usize) -> Self {
        let entries = territories
            .iter()
            .filter_map(|t| {
                let points: Vec<LatLng> = t.rings.iter().flatten().copied().collect();
                geometry::bounds(&points).map(|rect| (t.name.clone(), rect))
            })
            .collect();
        Self { entries, circle_steps }
    }

    fn covering(&self, shape: &Shape) -> DetectionResult<Vec<String>> {
        let bounds = geometry::bounds(&shape.ring(self.circle_steps))
            .ok_or_else(|| DetectionError::Failed("shape has no vertices".into()))?;
        Ok(self
            .entries
            .iter()
            .filter(|(_, rect)| rect.intersect(bounds).area() > 0.0)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn at(&self, point: LatLng) -> Option<String> {
        let p = Point::from(point);
        self.entries
            .iter()
            .find(|(_, rect)| rect.contains(p))
            .map(|(name, _)| name.clone())
    }
}

impl TerritoryDetector for TableDetector {
    fn detect_in_shape(&self, shape: &Shape) -> BoxFuture<'_, DetectionResult<Vec<String>>> {
        Box::pin(std::future::ready(self.covering(shape)))
    }

    fn detect_for_line(&self, line: &Line) -> BoxFuture<'_, DetectionResult<LineTerritories>> {
        Box::pin(std::future::ready(Ok(LineTerritories {
            from: self.at(line.start()),
            to: self.at(line.end()),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(name: &str, lng: f64, lat: f64) -> TerritoryHighlight {
        TerritoryHighlight {
            name: name.to_string(),
            color: Default::default(),
            opacity: 0.35,
            rings: vec![vec![
                LatLng::from_lng_lat(lng, lat),
                LatLng::from_lng_lat(lng + 10.0, lat),
                LatLng::from_lng_lat(lng + 10.0, lat + 10.0),
                LatLng::from_lng_lat(lng, lat + 10.0),
            ]],
        }
    }

    #[test]
    fn test_shape_overlap() {
        let detector = TableDetector::new(&[square("West", 0.0, 0.0), square("East", 20.0, 0.0)], 64);
        let shape = Shape::circle(LatLng::new(5.0, 9.0), 300.0).unwrap();
        let names = pollster::block_on(detector.detect_in_shape(&shape)).unwrap();
        assert_eq!(names, vec!["West".to_string()]);
    }

    #[test]
    fn test_line_endpoints() {
        let detector = TableDetector::new(&[square("West", 0.0, 0.0), square("East", 20.0, 0.0)], 64);
        let line = Line::straight(LatLng::new(5.0, 5.0), LatLng::new(5.0, 15.0)).unwrap();
        let found = pollster::block_on(detector.detect_for_line(&line)).unwrap();
        assert_eq!(found.from.as_deref(), Some("West"));
        assert_eq!(found.to, None);
    }
}
