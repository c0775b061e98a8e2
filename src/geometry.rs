use geo::{ChamberlainDuquetteArea, Coord, Intersects, Line, LineString, Polygon};

use crate::record::LatLng;

fn coord(p: LatLng) -> Coord<f64> {
    Coord { x: p.lng, y: p.lat }
}

fn to_polygon(ring: &[LatLng]) -> Polygon<f64> {
    let exterior: LineString<f64> = ring.iter().copied().map(coord).collect();
    Polygon::new(exterior, Vec::new())
}

/// Area of the ring on a spherical earth, in square metres.
///
/// The ring does not need to repeat its first vertex.
pub fn geodesic_area(ring: &[LatLng]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    to_polygon(ring).chamberlain_duquette_unsigned_area()
}

fn edges(points: &[LatLng], closed: bool) -> Vec<Line<f64>> {
    // repeated vertices would make zero-length edges that touch both neighbours
    let mut distinct = points.to_vec();
    distinct.dedup();
    if closed && distinct.len() > 1 && distinct.first() == distinct.last() {
        distinct.pop();
    }

    let mut lines: Vec<Line<f64>> = distinct
        .windows(2)
        .map(|w| Line::new(coord(w[0]), coord(w[1])))
        .collect();
    if closed && distinct.len() > 2 {
        lines.push(Line::new(coord(distinct[distinct.len() - 1]), coord(distinct[0])));
    }
    lines
}

/// Returns the indices of the first pair of non-adjacent edges that cross.
fn first_crossing(lines: &[Line<f64>], closed: bool) -> Option<(usize, usize)> {
    let n = lines.len();
    for i in 0..n {
        for j in (i + 2)..n {
            // first and last edge of a closed ring share a vertex
            if closed && i == 0 && j == n - 1 {
                continue;
            }
            if lines[i].intersects(&lines[j]) {
                return Some((i, j));
            }
        }
    }
    None
}

/// True if an open path crosses itself anywhere.
pub fn path_self_intersects(path: &[LatLng]) -> bool {
    first_crossing(&edges(path, false), false).is_some()
}

/// True if closing `ring` would produce a self-intersecting polygon.
pub fn ring_self_intersects(ring: &[LatLng]) -> bool {
    first_crossing(&edges(ring, true), true).is_some()
}
