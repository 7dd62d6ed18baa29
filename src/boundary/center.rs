use geo::BoundingRect;

use super::view::LatLng;

/// Center of the bounding box enclosing all feature geometries.
///
/// Features without a geometry, or whose geometry cannot be converted, do not
/// contribute. Returns `None` when nothing contributes.
pub fn features_center<'a, I>(features: I) -> Option<LatLng>
where
    I: IntoIterator<Item = &'a geojson::Feature>,
{
    let mut bounds: Option<geo::Rect> = None;
    for feature in features {
        let geometry = match &feature.geometry {
            Some(geometry) => geometry,
            None => continue,
        };
        let geometry: geo::Geometry = match geometry.clone().try_into() {
            Ok(geometry) => geometry,
            Err(err) => {
                log::debug!("Skipping geometry for center computation, {}", err);
                continue;
            }
        };
        if let Some(rect) = geometry.bounding_rect() {
            bounds = Some(match bounds {
                Some(current) => merge_rects(&current, &rect),
                None => rect,
            });
        }
    }
    bounds.map(|rect| LatLng::from(rect.center()))
}

fn merge_rects(a: &geo::Rect, b: &geo::Rect) -> geo::Rect {
    geo::Rect::new(
        geo::Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        geo::Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::geofile::feature::tests::square_feature;

    use super::features_center;

    #[test]
    fn test_empty_has_no_center() {
        let features: Vec<geojson::Feature> = vec![];
        assert_eq!(None, features_center(&features));
    }

    #[test]
    fn test_single_square_center_is_centroid() {
        let features = vec![square_feature(76.5, 10.0, 0.02)];
        let center = features_center(&features).unwrap();
        assert_abs_diff_eq!(center.lat, 10.01, epsilon = 1e-9);
        assert_abs_diff_eq!(center.lng, 76.51, epsilon = 1e-9);
    }

    #[test]
    fn test_center_spans_all_features() {
        let features = vec![
            square_feature(76.0, 10.0, 1.0),
            square_feature(78.0, 12.0, 1.0),
        ];
        let center = features_center(&features).unwrap();
        assert_abs_diff_eq!(center.lat, 11.5, epsilon = 1e-9);
        assert_abs_diff_eq!(center.lng, 77.5, epsilon = 1e-9);
    }

    #[test]
    fn test_features_without_geometry_are_skipped() {
        let mut empty = square_feature(0.0, 0.0, 1.0);
        empty.geometry = None;
        let features = vec![empty, square_feature(76.0, 10.0, 1.0)];
        let center = features_center(&features).unwrap();
        assert_abs_diff_eq!(center.lat, 10.5, epsilon = 1e-9);
        assert_abs_diff_eq!(center.lng, 76.5, epsilon = 1e-9);
    }
}
