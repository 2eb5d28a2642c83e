//! PostGIS-compatible spatial SQL functions for SQLite connections.
//!
//! Geometry values are SRID-prefixed WKT text. Every function returns `NULL`
//! for `NULL` geometry input.

use featureserver_core::{
    Geometry, GeometryError,
    wkt::{from_wkt, to_wkt},
};
use geo::{Intersects, Rect, coord};
use rusqlite::{
    Connection,
    functions::{Aggregate, Context, FunctionFlags},
};

use super::transform::{SpatialFunctionError, reproject};

const SRID_PREFIX: &str = "SRID=";

#[derive(Debug, Clone, PartialEq)]
struct SpatialValue {
    srid: u32,
    geometry: Geometry,
}

impl SpatialValue {
    fn parse(text: &str) -> Result<Self, SpatialFunctionError> {
        let trimmed = text.trim();
        let Some(rest) = trimmed.strip_prefix(SRID_PREFIX) else {
            return Ok(Self {
                srid: 0,
                geometry: from_wkt(trimmed)?,
            });
        };
        let malformed = |reason: &str| GeometryError::Malformed {
            text: trimmed.to_owned(),
            reason: reason.to_owned(),
        };
        let (code, wkt) = rest
            .split_once(';')
            .ok_or_else(|| malformed("missing ';' after SRID"))?;
        let srid = code
            .trim()
            .parse::<u32>()
            .map_err(|_| malformed("SRID is not a number"))?;
        Ok(Self {
            srid,
            geometry: from_wkt(wkt)?,
        })
    }

    fn to_ewkt(&self) -> String {
        format!("{SRID_PREFIX}{};{}", self.srid, to_wkt(&self.geometry))
    }
}

fn user_error(err: SpatialFunctionError) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(err))
}

fn geometry_arg(ctx: &Context<'_>, index: usize) -> rusqlite::Result<Option<SpatialValue>> {
    ctx.get::<Option<String>>(index)?
        .map(|text| SpatialValue::parse(&text).map_err(user_error))
        .transpose()
}

fn srid_arg(ctx: &Context<'_>, index: usize) -> rusqlite::Result<u32> {
    let raw: i64 = ctx.get(index)?;
    u32::try_from(raw).map_err(|_| user_error(SpatialFunctionError::InvalidSrid { srid: raw }))
}

fn geom_from_text(ctx: &Context<'_>, srid: Option<u32>) -> rusqlite::Result<Option<String>> {
    Ok(geometry_arg(ctx, 0)?.map(|mut value| {
        if let Some(srid) = srid {
            value.srid = srid;
        }
        value.to_ewkt()
    }))
}

fn set_srid(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    let srid = srid_arg(ctx, 1)?;
    geom_from_text(ctx, Some(srid))
}

fn transform(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    let target = srid_arg(ctx, 1)?;
    let Some(value) = geometry_arg(ctx, 0)? else {
        return Ok(None);
    };
    let geometry = reproject(value.geometry, value.srid, target).map_err(user_error)?;
    Ok(Some(
        SpatialValue {
            srid: target,
            geometry,
        }
        .to_ewkt(),
    ))
}

fn as_text(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    Ok(geometry_arg(ctx, 0)?.map(|value| to_wkt(&value.geometry)))
}

fn make_envelope(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    let mut edges = [0.0_f64; 4];
    for (index, edge) in edges.iter_mut().enumerate() {
        let Some(value) = ctx.get::<Option<f64>>(index)? else {
            return Ok(None);
        };
        *edge = value;
    }
    let srid = if ctx.len() > 4 { srid_arg(ctx, 4)? } else { 0 };
    let [min_x, min_y, max_x, max_y] = edges;
    let rect = Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y });
    Ok(Some(
        SpatialValue {
            srid,
            geometry: Geometry::Polygon(rect.to_polygon()),
        }
        .to_ewkt(),
    ))
}

fn intersects(ctx: &Context<'_>) -> rusqlite::Result<Option<bool>> {
    let (Some(left), Some(right)) = (geometry_arg(ctx, 0)?, geometry_arg(ctx, 1)?) else {
        return Ok(None);
    };
    if left.srid != right.srid {
        return Err(user_error(SpatialFunctionError::MixedSrid {
            left: left.srid,
            right: right.srid,
        }));
    }
    let left_geometry = geo::Geometry::from(left.geometry);
    let right_geometry = geo::Geometry::from(right.geometry);
    Ok(Some(left_geometry.intersects(&right_geometry)))
}

/// `ST_Extent`: the bounding box of every non-null geometry in the group,
/// rendered as `BOX(minx miny,maxx maxy)`.
struct ExtentAggregate;

fn merge(current: Rect<f64>, next: Rect<f64>) -> Rect<f64> {
    Rect::new(
        coord! {
            x: current.min().x.min(next.min().x),
            y: current.min().y.min(next.min().y),
        },
        coord! {
            x: current.max().x.max(next.max().x),
            y: current.max().y.max(next.max().y),
        },
    )
}

impl Aggregate<Option<Rect<f64>>, Option<String>> for ExtentAggregate {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<Option<Rect<f64>>> {
        Ok(None)
    }

    fn step(&self, ctx: &mut Context<'_>, extent: &mut Option<Rect<f64>>) -> rusqlite::Result<()> {
        let Some(value) = geometry_arg(ctx, 0)? else {
            return Ok(());
        };
        if let Some(rect) = value.geometry.bounding_rect() {
            *extent = Some(extent.map_or(rect, |current| merge(current, rect)));
        }
        Ok(())
    }

    fn finalize(
        &self,
        _ctx: &mut Context<'_>,
        extent: Option<Option<Rect<f64>>>,
    ) -> rusqlite::Result<Option<String>> {
        Ok(extent.flatten().map(|rect| {
            format!(
                "BOX({} {},{} {})",
                rect.min().x,
                rect.min().y,
                rect.max().x,
                rect.max().y
            )
        }))
    }
}

/// Register `ST_GeomFromText`, `ST_SetSRID`, `ST_Transform`, `ST_AsText`,
/// `ST_MakeEnvelope`, `ST_Intersects` and the `ST_Extent` aggregate.
///
/// # Errors
/// Returns the SQLite error if registration fails.
pub fn register_spatial_functions(connection: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    connection.create_scalar_function("ST_GeomFromText", 1, flags, |ctx| {
        geom_from_text(ctx, None)
    })?;
    connection.create_scalar_function("ST_GeomFromText", 2, flags, set_srid)?;
    connection.create_scalar_function("ST_SetSRID", 2, flags, set_srid)?;
    connection.create_scalar_function("ST_Transform", 2, flags, transform)?;
    connection.create_scalar_function("ST_AsText", 1, flags, as_text)?;
    connection.create_scalar_function("ST_MakeEnvelope", 4, flags, make_envelope)?;
    connection.create_scalar_function("ST_MakeEnvelope", 5, flags, make_envelope)?;
    connection.create_scalar_function("ST_Intersects", 2, flags, intersects)?;
    connection.create_aggregate_function("ST_Extent", 1, flags, ExtentAggregate)?;
    Ok(())
}
