//! Plain WKT payloads.

use featureserver_core::{Feature, wkt::from_wkt};

use crate::{CodecError, Decoder};

/// Identifier given to the single feature a WKT payload decodes into.
pub const WKT_FEATURE_ID: i64 = 1;

/// Decodes one WKT literal into a one-feature list.
///
/// # Examples
/// ```
/// use featureserver_core::{FeatureId, Geometry};
/// use featureserver_formats::{Decoder, WktDecoder};
///
/// let features = WktDecoder.decode("POINT(1 2)")?;
/// assert_eq!(features.len(), 1);
/// assert_eq!(features.first().and_then(|f| f.id.clone()), Some(FeatureId::Integer(1)));
/// assert_eq!(features.first().and_then(|f| f.geometry.clone()), Some(Geometry::point(1.0, 2.0)));
/// # Ok::<(), featureserver_formats::CodecError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct WktDecoder;

impl Decoder for WktDecoder {
    fn decode(&self, input: &str) -> Result<Vec<Feature>, CodecError> {
        let geometry = from_wkt(input)?;
        Ok(vec![
            Feature::new()
                .with_id(WKT_FEATURE_ID)
                .with_geometry(geometry),
        ])
    }
}
