/// STL file parser for binary and ASCII formats
use std::path::Path;

use nalgebra::Point3;
use nom::{
    bytes::complete::{tag, take},
    character::complete::{multispace0, multispace1, not_line_ending},
    multi::{count, many0},
    number::complete::{float, le_f32, le_u32},
    sequence::{preceded, tuple},
    IResult,
};

use crate::error::{Result, ViewerError};
use crate::geometry::{Geometry, Triangle};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Read and parse an STL file from disk
pub fn load_stl(path: impl AsRef<Path>) -> Result<Geometry> {
    let data = std::fs::read(path)?;
    parse_stl(&data)
}

/// Detect and parse STL data (binary or ASCII).
///
/// Data whose length matches the facet count in a binary header is binary
/// even if it starts with `solid`, which many exporters write there.
pub fn parse_stl(data: &[u8]) -> Result<Geometry> {
    if binary_facet_count(data).is_some_and(|n| HEADER_LEN + 4 + n * FACET_LEN == data.len()) {
        return parse_binary_stl(data);
    }

    match std::str::from_utf8(data) {
        Ok(text) if text.trim_start().starts_with("solid") => parse_ascii_stl(text),
        _ => parse_binary_stl(data),
    }
}

fn binary_facet_count(data: &[u8]) -> Option<usize> {
    let bytes: [u8; 4] = data.get(HEADER_LEN..HEADER_LEN + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes) as usize)
}

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Geometry> {
    let Some(triangle_count) = binary_facet_count(data) else {
        return Err(ViewerError::Stl("file too small to be a valid STL".into()));
    };

    let facets = &data[HEADER_LEN + 4..];
    if facets.len() < triangle_count * FACET_LEN {
        return Err(ViewerError::Stl(format!(
            "header announces {triangle_count} facets but only {} bytes follow",
            facets.len()
        )));
    }

    let (_, triangles) = count(binary_facet, triangle_count)(facets)
        .map_err(|_| ViewerError::Stl("unexpected end of file".into()))?;
    Ok(collect(triangles))
}

fn binary_facet(input: &[u8]) -> IResult<&[u8], Triangle> {
    // The stored normal is recomputed from the winding
    let (input, _normal) = take(12usize)(input)?;
    let (input, (a, b, c)) = tuple((binary_point, binary_point, binary_point))(input)?;
    let (input, _attributes) = take(2usize)(input)?;
    Ok((input, Triangle::new(a, b, c)))
}

fn binary_point(input: &[u8]) -> IResult<&[u8], Point3<f32>> {
    let (input, (x, y, z)) = tuple((le_f32, le_f32, le_f32))(input)?;
    Ok((input, Point3::new(x, y, z)))
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Geometry> {
    match ascii_solid(input) {
        Ok((_, triangles)) => Ok(collect(triangles)),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            let offset = input.len() - e.input.len();
            let line = input[..offset].matches('\n').count() + 1;
            Err(ViewerError::Stl(format!("malformed ASCII STL near line {line}")))
        }
        Err(nom::Err::Incomplete(_)) => Err(ViewerError::Stl("truncated ASCII STL".into())),
    }
}

fn ascii_solid(input: &str) -> IResult<&str, Vec<Triangle>> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _name) = not_line_ending(input)?;
    let (input, triangles) = many0(ascii_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    let (input, _name) = not_line_ending(input)?;
    Ok((input, triangles))
}

fn ascii_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, _normal) = ascii_vector(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = ascii_vertex(input)?;
    let (input, v2) = ascii_vertex(input)?;
    let (input, v3) = ascii_vertex(input)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn ascii_vertex(input: &str) -> IResult<&str, Point3<f32>> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = ascii_vector(input)?;
    Ok((input, Point3::new(x, y, z)))
}

fn ascii_vector(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

fn collect(triangles: Vec<Triangle>) -> Geometry {
    let mut geometry = Geometry::with_capacity(triangles.len());
    for triangle in triangles {
        geometry.add_triangle(triangle);
    }
    geometry
}
