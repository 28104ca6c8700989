//! `fast_covers` — recursive tile classification against a polygon.
//!
//! Tiling the bounding box at successively finer resolutions lets the
//! caller classify millions of points against a complex polygon while
//! running the expensive point-in-polygon test only for tiles that straddle
//! the boundary at the finest resolution.

use geo::{BoundingRect, Coord, MultiPolygon, Rect, Relate};

use dg_core::ProjPoint;

/// Default tile edge lengths in meters, coarse to fine.
pub const DEFAULT_RESOLUTIONS: [f64; 3] = [10_000.0, 5_000.0, 1_000.0];

/// Classification of one tile emitted by [`fast_covers`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CoverEvent {
    /// Tile fully inside the area.
    Inside(Rect<f64>),
    /// Tile disjoint from the area.
    Outside(Rect<f64>),
    /// Finest-resolution tile straddling the boundary.
    Unsure(Rect<f64>),
}

/// Recursively tile `area`'s bounding box at each resolution and report
/// every tile through `visit`.
///
/// For each tile: disjoint ⇒ `Outside`; contained ⇒ `Inside`; otherwise
/// recurse to the next resolution.  At the final resolution remaining tiles
/// are reported `Unsure`.
pub fn fast_covers<F>(area: &MultiPolygon<f64>, resolutions: &[f64], visit: &mut F)
where
    F: FnMut(CoverEvent),
{
    let Some(bbox) = area.bounding_rect() else {
        return;
    };
    cover_rect(area, bbox, resolutions, visit);
}

fn cover_rect<F>(area: &MultiPolygon<f64>, rect: Rect<f64>, resolutions: &[f64], visit: &mut F)
where
    F: FnMut(CoverEvent),
{
    let Some((&res, rest)) = resolutions.split_first() else {
        visit(CoverEvent::Unsure(rect));
        return;
    };

    let nx = (rect.width() / res).ceil().max(1.0) as usize;
    let ny = (rect.height() / res).ceil().max(1.0) as usize;

    for iy in 0..ny {
        for ix in 0..nx {
            let min = Coord {
                x: rect.min().x + ix as f64 * res,
                y: rect.min().y + iy as f64 * res,
            };
            let max = Coord {
                x: (min.x + res).min(rect.max().x),
                y: (min.y + res).min(rect.max().y),
            };
            if max.x <= min.x || max.y <= min.y {
                continue;
            }
            let tile = Rect::new(min, max);
            let tile_poly = tile.to_polygon();

            let matrix = area.relate(&tile_poly);
            if matrix.is_disjoint() {
                visit(CoverEvent::Outside(tile));
            } else if matrix.is_contains() {
                visit(CoverEvent::Inside(tile));
            } else if rest.is_empty() {
                visit(CoverEvent::Unsure(tile));
            } else {
                cover_rect(area, tile, rest, visit);
            }
        }
    }
}

/// Stamp membership of `points` in `area` using [`fast_covers`].
///
/// Points in `Inside` tiles are marked without a polygon test; points in
/// `Unsure` tiles get the exact test.  Points outside the bounding box are
/// `false`.  Idempotent by construction: the result depends only on the
/// inputs.
pub fn stamp_membership(area: &MultiPolygon<f64>, points: &[ProjPoint]) -> Vec<bool> {
    use geo::Contains;

    let mut result = vec![false; points.len()];
    let Some(bbox) = area.bounding_rect() else {
        return result;
    };

    // Bucket point indices into final-resolution grid cells so each tile
    // event touches only its own points.
    let res = *DEFAULT_RESOLUTIONS.last().unwrap();
    let nx = ((bbox.width() / res).ceil().max(1.0)) as usize;
    let ny = ((bbox.height() / res).ceil().max(1.0)) as usize;
    let key = |p: ProjPoint| -> Option<usize> {
        if p.x < bbox.min().x || p.x > bbox.max().x || p.y < bbox.min().y || p.y > bbox.max().y {
            return None;
        }
        let ix = (((p.x - bbox.min().x) / res) as usize).min(nx - 1);
        let iy = (((p.y - bbox.min().y) / res) as usize).min(ny - 1);
        Some(iy * nx + ix)
    };

    let mut buckets: rustc_hash::FxHashMap<usize, Vec<usize>> = rustc_hash::FxHashMap::default();
    for (i, &p) in points.iter().enumerate() {
        if let Some(k) = key(p) {
            buckets.entry(k).or_default().push(i);
        }
    }

    let indices_in = |rect: Rect<f64>, buckets: &rustc_hash::FxHashMap<usize, Vec<usize>>| {
        // A tile may span several final-resolution buckets at coarse levels.
        let mut out = Vec::new();
        let ix0 = ((rect.min().x - bbox.min().x) / res).floor().max(0.0) as usize;
        let iy0 = ((rect.min().y - bbox.min().y) / res).floor().max(0.0) as usize;
        let ix1 = (((rect.max().x - bbox.min().x) / res).ceil() as usize).min(nx);
        let iy1 = ((rect.max().y - bbox.min().y) / res).ceil() as usize;
        for iy in iy0..iy1 {
            for ix in ix0..ix1.max(ix0 + 1) {
                if let Some(list) = buckets.get(&(iy * nx + ix)) {
                    out.extend(
                        list.iter()
                            .copied()
                            .filter(|&i| rect_contains(rect, points[i])),
                    );
                }
            }
        }
        out
    };

    fast_covers(area, &DEFAULT_RESOLUTIONS, &mut |event| match event {
        CoverEvent::Inside(rect) => {
            for i in indices_in(rect, &buckets) {
                result[i] = true;
            }
        }
        CoverEvent::Outside(_) => {}
        CoverEvent::Unsure(rect) => {
            for i in indices_in(rect, &buckets) {
                let p = geo::Point::new(points[i].x, points[i].y);
                result[i] = area.contains(&p);
            }
        }
    });

    result
}

#[inline]
fn rect_contains(rect: Rect<f64>, p: ProjPoint) -> bool {
    p.x >= rect.min().x && p.x <= rect.max().x && p.y >= rect.min().y && p.y <= rect.max().y
}
