// ===========================================================================
// Line/point algebra on planar (metric SRID) geometries
// ===========================================================================
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{EuclideanDistance, EuclideanLength, LineInterpolatePoint, LineLocatePoint};
use geo_types::{Coord, Line, LineString, Point};

/// Positions closer than this to each other are treated as equal.
/// Only used to compare fractional positions, never distances.
pub const POSITION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("geometry has no coordinates")]
    Empty,
    #[error("position {0} is outside [0, 1]")]
    PositionOutOfRange(f64),
}

/// Result of projecting a point onto a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearReference {
    /// Fractional position along the line, in [0, 1].
    pub position: f64,
    /// Signed perpendicular distance, positive on the left of the line direction.
    pub offset: f64,
    /// Nearest point on the line.
    pub projected: Coord,
}

pub fn distance(a: Coord, b: Coord) -> f64 {
    Point::from(a).euclidean_distance(&Point::from(b))
}

pub fn coords_close(a: Coord, b: Coord, tolerance: f64) -> bool {
    distance(a, b) <= tolerance
}

/// Euclidean length of a polyline.
pub fn polyline_length(coords: &[Coord]) -> f64 {
    coords
        .windows(2)
        .map(|w| Line::new(w[0], w[1]).euclidean_length())
        .sum()
}

fn check_position(t: f64) -> Result<f64, GeometryError> {
    if !t.is_finite() || t < -POSITION_EPSILON || t > 1.0 + POSITION_EPSILON {
        return Err(GeometryError::PositionOutOfRange(t));
    }
    Ok(t.clamp(0.0, 1.0))
}

/// The line without repeated vertices; geo's fractions are undefined on
/// zero-length segments.
fn without_repeats(line: &LineString) -> Result<LineString, GeometryError> {
    if line.0.is_empty() {
        return Err(GeometryError::Empty);
    }
    let mut clean = line.clone();
    clean.0.dedup();
    Ok(clean)
}

/// Fractional position of every vertex of a repeat-free line of positive length.
fn vertex_fractions(line: &LineString) -> Vec<f64> {
    let total = line.euclidean_length();
    let mut travelled = 0.0;
    let mut fractions = Vec::with_capacity(line.0.len());
    fractions.push(0.0);
    for segment in line.lines() {
        travelled += segment.euclidean_length();
        fractions.push(travelled / total);
    }
    fractions
}

fn interpolate(line: &LineString, t: f64) -> Result<Coord, GeometryError> {
    line.line_interpolate_point(t)
        .map(|p| p.0)
        .ok_or(GeometryError::PositionOutOfRange(t))
}

/// Coordinate at fractional position `t` along the line. Extrapolation is refused.
pub fn point_at_position(line: &LineString, t: f64) -> Result<Coord, GeometryError> {
    let t = check_position(t)?;
    let line = without_repeats(line)?;
    if line.0.len() == 1 {
        return Ok(line.0[0]);
    }
    interpolate(&line, t)
}

/// Nearest-point projection of `point` onto the line.
/// Ties between segments resolve to the earliest segment.
pub fn locate_point(line: &LineString, point: Coord) -> Result<LinearReference, GeometryError> {
    let line = without_repeats(line)?;
    let first = line.0[0];
    if line.0.len() == 1 {
        return Ok(LinearReference {
            position: 0.0,
            offset: distance(first, point),
            projected: first,
        });
    }

    let target = Point::from(point);
    let position = line
        .line_locate_point(&target)
        .ok_or(GeometryError::Empty)?
        .clamp(0.0, 1.0);
    let projected = interpolate(&line, position)?;

    // Side of the segment carrying the projection.
    let mut side = 1.0;
    let mut nearest = f64::INFINITY;
    for segment in line.lines() {
        let d = segment.euclidean_distance(&Point::from(projected));
        if d < nearest {
            nearest = d;
            let (dx, dy) = (segment.dx(), segment.dy());
            let cross = dx * (point.y - segment.start.y) - dy * (point.x - segment.start.x);
            side = if cross < 0.0 { -1.0 } else { 1.0 };
        }
    }

    Ok(LinearReference {
        position,
        offset: distance(projected, point) * side,
        projected,
    })
}

/// Portion of the line between two fractional positions.
/// `t0 > t1` yields the reversed sub-line; `t0 == t1` a single-coordinate line.
pub fn sub_line(line: &LineString, t0: f64, t1: f64) -> Result<LineString, GeometryError> {
    let t0 = check_position(t0)?;
    let t1 = check_position(t1)?;
    if t0 > t1 {
        let mut reversed = sub_line(line, t1, t0)?;
        reversed.0.reverse();
        return Ok(reversed);
    }

    let line = without_repeats(line)?;
    if line.0.len() == 1 || (t1 - t0).abs() <= POSITION_EPSILON {
        return Ok(LineString::new(vec![point_at_position(&line, t0)?]));
    }

    let fractions = vertex_fractions(&line);
    let mut result = vec![interpolate(&line, t0)?];
    for (c, f) in line.0.iter().zip(&fractions) {
        if *f > t0 && *f < t1 {
            push_distinct(&mut result, *c);
        }
    }
    push_distinct(&mut result, interpolate(&line, t1)?);
    if result.len() == 1 {
        // Start and end collapsed onto the same coordinate.
        result.push(result[0]);
    }
    Ok(LineString::new(result))
}

fn push_distinct(out: &mut Vec<Coord>, c: Coord) {
    if out.last().is_none_or(|last| *last != c) {
        out.push(c);
    }
}

/// Cut the line at every given position. Positions at the ends are ignored.
pub fn split_line(line: &LineString, positions: &[f64]) -> Result<Vec<LineString>, GeometryError> {
    let cuts = split_positions(positions)?;
    cuts.windows(2)
        .map(|w| sub_line(line, w[0], w[1]))
        .collect()
}

/// Sorted, de-duplicated cut list including 0 and 1.
pub fn split_positions(positions: &[f64]) -> Result<Vec<f64>, GeometryError> {
    let mut cuts = vec![0.0];
    let mut inner = positions
        .iter()
        .map(|&t| check_position(t))
        .collect::<Result<Vec<_>, _>>()?;
    inner.sort_by(|a, b| a.total_cmp(b));
    for t in inner {
        let last = cuts[cuts.len() - 1];
        if t > last + POSITION_EPSILON && t < 1.0 - POSITION_EPSILON {
            cuts.push(t);
        }
    }
    cuts.push(1.0);
    Ok(cuts)
}

pub fn split_at(line: &LineString, t: f64) -> Result<(LineString, LineString), GeometryError> {
    Ok((sub_line(line, 0.0, t)?, sub_line(line, t, 1.0)?))
}

/// Unit direction of the segment that carries position `t`.
fn direction_at(line: &LineString, t: f64) -> Option<(f64, f64)> {
    let line = without_repeats(line).ok()?;
    if line.0.len() < 2 {
        return None;
    }
    let fractions = vertex_fractions(&line);
    let index = fractions[1..]
        .iter()
        .position(|f| t <= *f)
        .unwrap_or(fractions.len() - 2);
    let segment = Line::new(line.0[index], line.0[index + 1]);
    let length = segment.euclidean_length();
    Some((segment.dx() / length, segment.dy() / length))
}

/// Point at position `t`, moved `offset` units perpendicular to the line (left positive).
pub fn offset_point(line: &LineString, t: f64, offset: f64) -> Result<Coord, GeometryError> {
    let base = point_at_position(line, t)?;
    if offset == 0.0 {
        return Ok(base);
    }
    match direction_at(line, t) {
        Some((dx, dy)) => Ok(Coord {
            x: base.x - dy * offset,
            y: base.y + dx * offset,
        }),
        None => Ok(base),
    }
}

/// Vertex-normal offset of a polyline (left positive). Good enough for trail widths.
pub fn offset_line(coords: &[Coord], offset: f64) -> Vec<Coord> {
    if offset == 0.0 || coords.len() < 2 {
        return coords.to_vec();
    }
    let normals: Vec<Option<(f64, f64)>> = coords
        .windows(2)
        .map(|w| {
            let len = distance(w[0], w[1]);
            (len > 0.0).then(|| (-(w[1].y - w[0].y) / len, (w[1].x - w[0].x) / len))
        })
        .collect();

    coords
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let before = if i > 0 { normals[i - 1] } else { None };
            let after = normals.get(i).copied().flatten();
            let (nx, ny) = match (before, after) {
                (Some(a), Some(b)) => {
                    let (sx, sy) = (a.0 + b.0, a.1 + b.1);
                    let len = sx.hypot(sy);
                    if len > 0.0 { (sx / len, sy / len) } else { b }
                }
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => (0.0, 0.0),
            };
            Coord {
                x: c.x + nx * offset,
                y: c.y + ny * offset,
            }
        })
        .collect()
}

/// Append `next` to `acc`, dropping `next`'s first coordinate when it touches the tail.
pub fn concat_coords(acc: &mut Vec<Coord>, next: &[Coord], tolerance: f64) {
    let mut iter = next.iter().copied();
    if let (Some(last), Some(first)) = (acc.last().copied(), next.first().copied()) {
        if coords_close(last, first, tolerance) {
            iter.next();
        }
    }
    for c in iter {
        push_distinct(acc, c);
    }
}

/// Insert vertices so that no segment exceeds `max_step`.
/// Original vertices are kept; zero-length segments are coalesced.
pub fn densify(coords: &[Coord], max_step: f64) -> Vec<Coord> {
    let Some(&first) = coords.first() else {
        return Vec::new();
    };
    let mut result = Vec::with_capacity(coords.len() * 2);
    result.push(first);

    for w in coords.windows(2) {
        let (p1, p2) = (w[0], w[1]);
        let dist = distance(p1, p2);
        if dist <= 0.0 {
            continue;
        }
        if max_step > 0.0 && dist > max_step {
            let steps = (dist / max_step).ceil() as usize;
            let segment = Line::new(p1, p2);
            for j in 1..steps {
                if let Some(p) = segment.line_interpolate_point(j as f64 / steps as f64) {
                    result.push(p.0);
                }
            }
        }
        result.push(p2);
    }
    result
}

/// True when the line never crosses or retraces itself.
/// A closed ring (first == last) is allowed to touch at its closing vertex.
pub fn is_simple(line: &LineString) -> bool {
    let segments: Vec<Line> = line
        .lines()
        .filter(|l| l.start != l.end)
        .collect();
    let n = segments.len();
    let closed = n > 2 && line.0.first() == line.0.last();

    for i in 0..n {
        for j in (i + 1)..n {
            let Some(hit) = line_intersection(segments[i], segments[j]) else {
                continue;
            };
            let adjacent = j == i + 1;
            let closing = closed && i == 0 && j == n - 1;
            match hit {
                LineIntersection::SinglePoint { intersection, .. } => {
                    if adjacent && intersection == segments[i].end {
                        continue;
                    }
                    if closing && intersection == segments[i].start {
                        continue;
                    }
                    return false;
                }
                LineIntersection::Collinear { .. } => return false,
            }
        }
    }
    true
}

/// Total length shared collinearly by the two lines.
pub fn collinear_overlap_length(a: &LineString, b: &LineString) -> f64 {
    let mut shared = 0.0;
    for sa in a.lines() {
        for sb in b.lines() {
            if let Some(LineIntersection::Collinear { intersection }) = line_intersection(sa, sb) {
                shared += distance(intersection.start, intersection.end);
            }
        }
    }
    shared
}

/// Single-point intersections between two lines (crossings and touches).
pub fn intersection_points(a: &LineString, b: &LineString) -> Vec<Coord> {
    let mut points: Vec<Coord> = Vec::new();
    for sa in a.lines() {
        for sb in b.lines() {
            if let Some(LineIntersection::SinglePoint { intersection, .. }) =
                line_intersection(sa, sb)
            {
                if !points.contains(&intersection) {
                    points.push(intersection);
                }
            }
        }
    }
    points
}
