//! GeoJSON output: one weighted point per classified post.
//!
//! Posts carrying a genuine geocode keep it; everything else is scattered
//! around the region center so density still reads correctly on a heat map.

use rand::Rng;
use serde::Serialize;
use tracing::warn;

use crate::classify::EmotionResult;
use crate::model::{truncate_chars, Coordinates, UnifiedPost};

/// Kilometers per degree of latitude (flat-earth approximation).
const KM_PER_DEGREE: f64 = 111.0;

/// Transport cap on feature text.
const FEATURE_TEXT_MAX_CHARS: usize = 280;

#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<MapFeature>,
}

impl FeatureCollection {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            kind: "FeatureCollection",
            features: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MapFeature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: PointGeometry,
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// GeoJSON axis order: longitude first.
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    pub emotion: crate::classify::Emotion,
    pub confidence: f64,
    /// Heat-map weight; equal to confidence.
    pub intensity: f64,
    pub color: &'static str,
    pub text: String,
    pub source: crate::model::SourceTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<f64>,
}

/// Build a feature collection from classified posts.
///
/// Posts that cannot be assigned finite coordinates are dropped, not emitted
/// with placeholders. Empty input yields an empty, well-formed collection.
#[must_use]
pub fn format_features(
    classified: &[(UnifiedPost, EmotionResult)],
    center: Coordinates,
    spread_radius_km: f64,
) -> FeatureCollection {
    let mut rng = rand::thread_rng();
    let mut features = Vec::with_capacity(classified.len());

    for (post, result) in classified {
        let (lat, lon) = match post.coords() {
            Some(coords) => coords,
            None => scatter_around(&mut rng, center, spread_radius_km),
        };

        if !lat.is_finite() || !lon.is_finite() {
            warn!(uri = %post.uri, "Dropping post with non-finite coordinates");
            continue;
        }

        let url = post.uri.starts_with("http").then(|| post.uri.clone());

        features.push(MapFeature {
            kind: "Feature",
            geometry: PointGeometry {
                kind: "Point",
                coordinates: [lon, lat],
            },
            properties: FeatureProperties {
                emotion: result.emotion,
                confidence: result.confidence,
                intensity: result.confidence,
                color: result.emotion.color(),
                text: truncate_chars(&post.text, FEATURE_TEXT_MAX_CHARS),
                source: post.source,
                url,
                created_at: post.created_at.clone(),
                tone: post.tone,
            },
        });
    }

    FeatureCollection {
        kind: "FeatureCollection",
        features,
    }
}

/// Synthesize a point near the center.
///
/// Bearing is uniform over [0, 2π); radial distance is sqrt-scaled uniform
/// over [0, radius], which biases density toward the center rather than
/// spreading uniformly over the disc. Longitude offset is corrected by
/// cos(latitude) for meridian convergence.
fn scatter_around<R: Rng>(rng: &mut R, center: Coordinates, spread_radius_km: f64) -> (f64, f64) {
    let bearing = rng.gen::<f64>() * std::f64::consts::TAU;
    let distance_km = spread_radius_km * rng.gen::<f64>().sqrt();

    let lat = center.lat + (distance_km / KM_PER_DEGREE) * bearing.cos();
    let lon = center.lon
        + (distance_km / KM_PER_DEGREE) * bearing.sin() / center.lat.to_radians().cos();
    (lat, lon)
}
