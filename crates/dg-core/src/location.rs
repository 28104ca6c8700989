//! The location arena: buildings, aggregation cells, and dummy zones.
//!
//! # Ownership model
//!
//! The Building ↔ Cell relation is cyclic (a cell lists its members, a
//! building knows its cell), so neither side owns the other.  Both live in
//! flat `Vec` arenas indexed by typed IDs; cells hold `Vec<BuildingId>` and
//! buildings hold a `CellId`.  No `Rc`, no back-pointers.
//!
//! # Dispatch
//!
//! [`LocRef`] is the polymorphic choice atom.  All accessors dispatch on
//! the tag through [`LocationArena`] — there is no trait object anywhere in
//! the destination-choice hot loop.

use crate::{ActivityType, BuildingId, CellId, DummyId, LatLon, ProjPoint, ZoneId};

/// Per-activity attraction vector, indexed by [`ActivityType::index`].
pub type AttractionVec = [f64; ActivityType::COUNT];

// ── Land use ──────────────────────────────────────────────────────────────────

/// Land-use label stamped on a building from intersecting OSM land-use areas.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Landuse {
    Residential,
    Commercial,
    Retail,
    Industrial,
    #[default]
    None,
}

impl Landuse {
    pub fn as_str(self) -> &'static str {
        match self {
            Landuse::Residential => "residential",
            Landuse::Commercial  => "commercial",
            Landuse::Retail      => "retail",
            Landuse::Industrial  => "industrial",
            Landuse::None        => "none",
        }
    }

    pub fn parse(s: &str) -> Landuse {
        match s {
            "residential" => Landuse::Residential,
            "commercial"  => Landuse::Commercial,
            "retail"      => Landuse::Retail,
            "industrial"  => Landuse::Industrial,
            _             => Landuse::None,
        }
    }
}

/// Counts of points of interest intersecting a building, bucketed by the
/// activity they attract.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct PoiCounts {
    /// `shop=*`
    pub shops: u32,
    /// `office=*`
    pub offices: u32,
    /// school, university, kindergarten
    pub education: u32,
    /// restaurant, cafe, fast food, place of worship, tourism
    pub leisure: u32,
}

impl PoiCounts {
    pub fn total(self) -> u32 {
        self.shops + self.offices + self.education + self.leisure
    }
}

// ── Building ──────────────────────────────────────────────────────────────────

/// A concrete destination extracted from OSM.
#[derive(Clone, Debug)]
pub struct Building {
    pub id: BuildingId,
    /// Representative point (polygon centroid) in the model CRS.
    pub coord: ProjPoint,
    pub latlon: LatLon,
    /// Projected footprint area; buildings ≤ 10 m² are discarded upstream.
    pub area_m2: f64,
    /// Census population share distributed onto this building.
    pub population: f64,
    pub landuse: Landuse,
    pub poi: PoiCounts,
    pub in_focus: bool,
    /// OD-matrix zone containing this building, when an OD file is loaded.
    pub od_zone: Option<ZoneId>,
    /// Owning aggregation cell; assigned by the grid clusterer.
    pub cell: CellId,
    /// Pre-computed per-activity attraction.
    pub attraction: AttractionVec,
}

// ── Cell ──────────────────────────────────────────────────────────────────────

/// An aggregation of buildings used for the coarse stage of two-stage
/// destination sampling.
#[derive(Clone, Debug)]
pub struct Cell {
    pub id: CellId,
    /// Mean of member coordinates.
    pub centroid: ProjPoint,
    pub latlon: LatLon,
    pub members: Vec<BuildingId>,
    /// Element-wise sum of member attractions.
    pub attraction: AttractionVec,
    /// Sum of member populations.
    pub population: f64,
    /// `true` if any member lies in the focus area.
    pub in_focus: bool,
    /// Modal OD zone of the members, when zones are loaded.
    pub od_zone: Option<ZoneId>,
    /// Mean member-to-centroid distance; strictly positive.
    pub avg_distance_to_self: f64,
    /// RegioStar7-like settlement class (1 = metropolis … 7 = rural),
    /// derived from population density.  Selects the distance-deterrence
    /// parameter row.
    pub region_type: u8,
}

// ── DummyZone ─────────────────────────────────────────────────────────────────

/// `avg_distance_to_self` sentinel for dummy locations.
const DUMMY_SELF_DISTANCE_M: f64 = 1.0;

/// Placeholder location for an OD zone that contains no model buildings.
///
/// Dummy locations participate in destination choice only for the activity
/// types listed in `transfer_activities`; they can never be routed on the
/// network.
#[derive(Clone, Debug)]
pub struct DummyZone {
    pub id: DummyId,
    pub zone: ZoneId,
    /// Zone centroid in the model CRS.
    pub coord: ProjPoint,
    pub latlon: LatLon,
    /// Activities this zone may send or receive.
    pub transfer_activities: Vec<ActivityType>,
}

impl DummyZone {
    #[inline]
    pub fn transfers(&self, t: ActivityType) -> bool {
        self.transfer_activities.contains(&t)
    }
}

// ── LocRef ────────────────────────────────────────────────────────────────────

/// The polymorphic choice atom: a reference into one of the three arenas.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum LocRef {
    Building(BuildingId),
    Cell(CellId),
    Dummy(DummyId),
}

impl LocRef {
    /// Only buildings and cells exist on the road network.
    #[inline]
    pub fn is_real(self) -> bool {
        !matches!(self, LocRef::Dummy(_))
    }
}

// ── LocationArena ─────────────────────────────────────────────────────────────

/// Flat storage for all locations plus tag-dispatched accessors.
#[derive(Default)]
pub struct LocationArena {
    pub buildings: Vec<Building>,
    pub cells: Vec<Cell>,
    pub dummies: Vec<DummyZone>,
}

impl LocationArena {
    pub fn building(&self, id: BuildingId) -> &Building {
        &self.buildings[id.index()]
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    pub fn dummy(&self, id: DummyId) -> &DummyZone {
        &self.dummies[id.index()]
    }

    /// Projected coordinate of any location.
    pub fn coord(&self, r: LocRef) -> ProjPoint {
        match r {
            LocRef::Building(id) => self.building(id).coord,
            LocRef::Cell(id)     => self.cell(id).centroid,
            LocRef::Dummy(id)    => self.dummy(id).coord,
        }
    }

    /// Geographic coordinate of any location.
    pub fn latlon(&self, r: LocRef) -> LatLon {
        match r {
            LocRef::Building(id) => self.building(id).latlon,
            LocRef::Cell(id)     => self.cell(id).latlon,
            LocRef::Dummy(id)    => self.dummy(id).latlon,
        }
    }

    /// Attraction of `r` for activity `t`.
    ///
    /// Dummy locations weigh 1 for transfer activities and 0 otherwise.
    pub fn attraction(&self, r: LocRef, t: ActivityType) -> f64 {
        match r {
            LocRef::Building(id) => self.building(id).attraction[t.index()],
            LocRef::Cell(id)     => self.cell(id).attraction[t.index()],
            LocRef::Dummy(id) => {
                if self.dummy(id).transfers(t) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn od_zone(&self, r: LocRef) -> Option<ZoneId> {
        match r {
            LocRef::Building(id) => self.building(id).od_zone,
            LocRef::Cell(id)     => self.cell(id).od_zone,
            LocRef::Dummy(id)    => Some(self.dummy(id).zone),
        }
    }

    pub fn in_focus(&self, r: LocRef) -> bool {
        match r {
            LocRef::Building(id) => self.building(id).in_focus,
            LocRef::Cell(id)     => self.cell(id).in_focus,
            LocRef::Dummy(_)     => false,
        }
    }

    /// Distance substituted when origin and destination coincide.
    pub fn avg_distance_to_self(&self, r: LocRef) -> f64 {
        match r {
            LocRef::Building(id) => {
                // A building inherits its cell's spread.
                let cell = self.building(id).cell;
                if cell == CellId::INVALID {
                    DUMMY_SELF_DISTANCE_M
                } else {
                    self.cell(cell).avg_distance_to_self
                }
            }
            LocRef::Cell(id)  => self.cell(id).avg_distance_to_self,
            LocRef::Dummy(_)  => DUMMY_SELF_DISTANCE_M,
        }
    }

    /// Region type governing the distance deterrence at `r`.
    ///
    /// Dummy zones sit outside the settlement model and use the most rural
    /// class.
    pub fn region_type(&self, r: LocRef) -> u8 {
        match r {
            LocRef::Building(id) => {
                let cell = self.building(id).cell;
                if cell == CellId::INVALID {
                    7
                } else {
                    self.cell(cell).region_type
                }
            }
            LocRef::Cell(id) => self.cell(id).region_type,
            LocRef::Dummy(_) => 7,
        }
    }

    /// Stable integer key for the routing cache.  `None` for locations that
    /// cannot be routed (dummies).  Cells occupy `[0, n_cells)`, buildings
    /// `[n_cells, n_cells + n_buildings)`.
    pub fn route_key(&self, r: LocRef) -> Option<u32> {
        match r {
            LocRef::Cell(id)     => Some(id.0),
            LocRef::Building(id) => Some(self.cells.len() as u32 + id.0),
            LocRef::Dummy(_)     => None,
        }
    }

    /// Every routable location in `route_key` order (cells, then buildings).
    pub fn routable_refs(&self) -> Vec<LocRef> {
        let mut refs = Vec::with_capacity(self.cells.len() + self.buildings.len());
        refs.extend((0..self.cells.len()).map(|i| LocRef::Cell(CellId(i as u32))));
        refs.extend((0..self.buildings.len()).map(|i| LocRef::Building(BuildingId(i as u32))));
        refs
    }

    /// All cell references, the coarse candidate set of two-stage sampling.
    pub fn cell_refs(&self) -> Vec<LocRef> {
        (0..self.cells.len())
            .map(|i| LocRef::Cell(CellId(i as u32)))
            .collect()
    }

    /// Recompute every cell's aggregate fields from its members.
    ///
    /// Call after building attractions or populations change; keeps the
    /// cell-sum invariant exact.
    pub fn rebuild_cell_aggregates(&mut self) {
        for cell in &mut self.cells {
            let mut attraction = [0.0; ActivityType::COUNT];
            let mut population = 0.0;
            let mut in_focus = false;
            for &b in &cell.members {
                let bld = &self.buildings[b.index()];
                for (a, v) in attraction.iter_mut().zip(bld.attraction.iter()) {
                    *a += v;
                }
                population += bld.population;
                in_focus |= bld.in_focus;
            }
            cell.attraction = attraction;
            cell.population = population;
            cell.in_focus = in_focus;
        }
    }
}
