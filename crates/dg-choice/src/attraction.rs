//! Per-building attraction computation.
//!
//! Each activity's attraction is a sum of a small set of contribution
//! terms over the building's attributes: census population, POI counts,
//! land-use label, and footprint area.  Cells carry the element-wise sum
//! of their members (rebuilt by the arena after this pass).

use dg_core::{ActivityType, Building, Landuse, LocationArena};

/// Weight of one POI of the matching category.
const POI_SHOP_W: f64 = 20.0;
const POI_OFFICE_W: f64 = 10.0;
const POI_EDUCATION_W: f64 = 50.0;
const POI_LEISURE_W: f64 = 10.0;

/// Area contribution is square-rooted so a shopping mall does not swallow
/// the whole neighborhood's demand.
#[inline]
fn area_term(area_m2: f64) -> f64 {
    area_m2.max(0.0).sqrt()
}

/// Compute the attraction vector for one building.
fn building_attraction(b: &Building) -> [f64; ActivityType::COUNT] {
    let mut a = [0.0; ActivityType::COUNT];
    let area = area_term(b.area_m2);

    // HOME: census population dominates; without census, residential
    // floor space is the proxy.
    a[ActivityType::Home.index()] = if b.population > 0.0 {
        b.population
    } else {
        match b.landuse {
            Landuse::Residential => area,
            Landuse::None        => 0.5 * area,
            _                    => 0.0,
        }
    };

    // WORK: offices plus employment-heavy land uses.
    let work_landuse = match b.landuse {
        Landuse::Commercial | Landuse::Industrial => 1.0,
        Landuse::Retail                           => 0.6,
        _                                         => 0.1,
    };
    a[ActivityType::Work.index()] =
        POI_OFFICE_W * b.poi.offices as f64 + work_landuse * area;

    // BUSINESS trips go where work happens, with a retail tilt.
    a[ActivityType::Business.index()] = a[ActivityType::Work.index()]
        + 0.5 * POI_SHOP_W * b.poi.shops as f64;

    // SCHOOL: education POIs only.
    a[ActivityType::School.index()] = POI_EDUCATION_W * b.poi.education as f64;

    // SHOPPING: shops plus retail land use.
    let shop_landuse = match b.landuse {
        Landuse::Retail     => 1.0,
        Landuse::Commercial => 0.3,
        _                   => 0.0,
    };
    a[ActivityType::Shopping.index()] =
        POI_SHOP_W * b.poi.shops as f64 + shop_landuse * area;

    // OTHER: leisure POIs plus a small everywhere-term so low-amenity
    // areas still receive some discretionary trips.
    a[ActivityType::Other.index()] = POI_LEISURE_W * b.poi.leisure as f64
        + 0.2 * POI_SHOP_W * b.poi.shops as f64
        + 0.1 * area;

    a
}

/// Fill every building's attraction vector and rebuild the cell sums.
pub fn compute_attractions(arena: &mut LocationArena) {
    for b in &mut arena.buildings {
        b.attraction = building_attraction(b);
    }
    arena.rebuild_cell_aggregates();
}
