//! Shapefile writer.
//!
//! A shapefile is four sibling files: shapes (`.shp`), their index (`.shx`),
//! an attribute table (`.dbf`) and optionally a projection (`.prj`). The
//! encoder produces all of them in memory; callers decide where they go.

mod dbf;
mod projection;
mod shape;

use std::io::Cursor;

use featureserver_core::{Feature, GeometryKind};
use log::debug;
use shapefile::{Point, Polygon, Polyline, ShapeWriter, Writer, record::EsriShape};

pub use projection::ProjectionLibrary;

use crate::{CodecError, Encoder};
use dbf::Table;
use shape::FromGeometry;

pub(crate) const FORMAT: &str = "Shapefile";

/// The encoded files of one shapefile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapefileBuffers {
    /// Main file.
    pub shp: Vec<u8>,
    /// Record index.
    pub shx: Vec<u8>,
    /// Attribute table.
    pub dbf: Vec<u8>,
    /// Projection text, when one was resolved.
    pub prj: Option<String>,
}

impl ShapefileBuffers {
    /// File names and contents for a shapefile called `stem`.
    #[must_use]
    pub fn files(&self, stem: &str) -> Vec<(String, Vec<u8>)> {
        let mut files = vec![
            (format!("{stem}.shp"), self.shp.clone()),
            (format!("{stem}.shx"), self.shx.clone()),
            (format!("{stem}.dbf"), self.dbf.clone()),
        ];
        if let Some(prj) = &self.prj {
            files.push((format!("{stem}.prj"), prj.clone().into_bytes()));
        }
        files
    }
}

/// Encodes features as a shapefile.
///
/// All features must carry a Point, LineString or Polygon geometry and
/// share the kind of the first one.
#[derive(Debug, Default)]
pub struct ShapefileEncoder {
    projections: Option<ProjectionLibrary>,
}

impl ShapefileEncoder {
    /// Encoder writing no projection file.
    #[must_use]
    pub const fn new() -> Self {
        Self { projections: None }
    }

    /// Resolve `.prj` text from `library`.
    #[must_use]
    pub fn with_projections(mut self, library: ProjectionLibrary) -> Self {
        self.projections = Some(library);
        self
    }

    fn shape_kind(features: &[Feature]) -> Result<Option<GeometryKind>, CodecError> {
        let mut expected: Option<GeometryKind> = None;
        for (index, feature) in features.iter().enumerate() {
            let kind = feature
                .geometry
                .as_ref()
                .map(featureserver_core::Geometry::kind)
                .ok_or(CodecError::FeatureWithoutGeometry { index })?;
            if !matches!(
                kind,
                GeometryKind::Point | GeometryKind::LineString | GeometryKind::Polygon
            ) {
                return Err(CodecError::UnsupportedGeometry {
                    format: FORMAT,
                    kind,
                });
            }
            match expected {
                Some(first) if first != kind => {
                    return Err(CodecError::MixedShapeKinds {
                        index,
                        expected: first,
                        found: kind,
                    });
                }
                Some(_) => {}
                None => expected = Some(kind),
            }
        }
        Ok(expected)
    }

    fn projection(&self, features: &[Feature]) -> Result<Option<String>, CodecError> {
        let Some(library) = &self.projections else {
            return Ok(None);
        };
        let Some(srid) = features.first().and_then(|feature| feature.srid) else {
            return Ok(None);
        };
        library.definition(srid).map(Some)
    }
}

/// Write every feature as a shape of type `S` plus its attribute row.
///
/// The writers finish their headers when dropped.
fn write_shapes<S>(features: &[Feature], table: &Table) -> Result<ShapefileBuffers, CodecError>
where
    S: FromGeometry + EsriShape,
{
    let mut shp = Cursor::new(Vec::new());
    let mut shx = Cursor::new(Vec::new());
    let mut dbf = Cursor::new(Vec::new());
    let mut writer = Writer::new(
        ShapeWriter::with_shx(&mut shp, &mut shx),
        table.builder()?.build_with_dest(&mut dbf),
    );
    for (index, feature) in features.iter().enumerate() {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or(CodecError::FeatureWithoutGeometry { index })?;
        let shape = S::from_geometry(index, geometry)?;
        writer
            .write_shape_and_record(&shape, &table.record(feature))
            .map_err(|source| CodecError::Shapefile {
                index,
                source: Box::new(source),
            })?;
    }
    drop(writer);
    Ok(ShapefileBuffers {
        shp: shp.into_inner(),
        shx: shx.into_inner(),
        dbf: dbf.into_inner(),
        prj: None,
    })
}

impl Encoder for ShapefileEncoder {
    type Output = ShapefileBuffers;

    fn encode(&self, features: &[Feature]) -> Result<ShapefileBuffers, CodecError> {
        let kind = Self::shape_kind(features)?;
        let table = Table::for_features(features);
        let buffers = match kind {
            Some(GeometryKind::LineString) => write_shapes::<Polyline>(features, &table)?,
            Some(GeometryKind::Polygon) => write_shapes::<Polygon>(features, &table)?,
            _ => write_shapes::<Point>(features, &table)?,
        };
        let prj = self.projection(features)?;
        debug!(
            "encoded {} {kind:?} records into a shapefile",
            features.len()
        );
        Ok(ShapefileBuffers { prj, ..buffers })
    }
}
