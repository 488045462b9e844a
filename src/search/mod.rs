//! Event-time search: hitpattern filling, pattern matching and road
//! building for one projection.

mod compare;
mod hit_pair;
mod hitpattern;
mod road;

pub use compare::{ComparePattern, Consumption, LayerCombos, MatchRecord};
pub use hit_pair::{HitPair, HitPairIter};
pub use hitpattern::Hitpattern;
pub use road::Road;

use serde::{Deserialize, Serialize};

use crate::core::types::{sort_hits, WireHit};
use crate::error::{RekhaError, Result};
use crate::tree::PatternTree;

/// Configuration of one projection (wire-angle view).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Effective detector layers, equal to the pattern bit count.
    pub n_layers: usize,
    /// Physical wire planes; companion planes of a layer are numbered
    /// consecutively, so `n_planes` is a multiple of `n_layers`.
    pub n_planes: usize,
    /// Width of the tracking region (m).
    pub width: f64,
    /// Neighbor bins additionally set per hit, against cluster spill-over.
    pub cluster_max_dist: u16,
    /// Search distance (bins) when clustering patterns into roads.
    pub pattern_max_dist: u16,
    /// Layers a pattern match may miss.
    pub max_missing_layers: u32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            n_layers: 4,
            n_planes: 8,
            width: 2.0,
            cluster_max_dist: 1,
            pattern_max_dist: 2,
            max_missing_layers: 1,
        }
    }
}

/// Per-event reconstruction context of one projection.
///
/// Owns the event state: the sorted hit buffer, the hitpattern, the
/// matches found by tree search and the finished roads. The pattern tree
/// itself stays outside and read-only, shared by all projections.
#[derive(Debug)]
pub struct Projection {
    config: ProjectionConfig,
    nlevels: u16,
    hitpattern: Hitpattern,
    combos: LayerCombos,
    hits: Vec<WireHit>,
    matches: Vec<MatchRecord>,
    roads: Vec<Road>,
}

impl Projection {
    /// Create a projection context for trees with `nlevels` levels.
    pub fn new(config: ProjectionConfig, nlevels: u16) -> Result<Self> {
        if config.n_layers == 0 || config.n_planes < config.n_layers {
            return Err(RekhaError::Param(format!(
                "projection needs n_planes >= n_layers >= 1, got {}/{}",
                config.n_planes, config.n_layers
            )));
        }
        if config.n_planes % config.n_layers != 0 {
            return Err(RekhaError::Param(format!(
                "{} planes do not group evenly into {} layers",
                config.n_planes, config.n_layers
            )));
        }
        if !(config.width > 0.0) {
            return Err(RekhaError::Param(format!(
                "width {} not positive",
                config.width
            )));
        }
        let hitpattern = Hitpattern::new(
            config.n_layers,
            nlevels,
            config.width,
            config.cluster_max_dist,
        );
        let combos = LayerCombos::with_max_missing(config.n_layers, config.max_missing_layers);
        Ok(Self {
            config,
            nlevels,
            hitpattern,
            combos,
            hits: Vec::new(),
            matches: Vec::new(),
            roads: Vec::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    #[inline]
    pub fn n_layers(&self) -> usize {
        self.config.n_layers
    }

    #[inline]
    pub fn n_planes(&self) -> usize {
        self.config.n_planes
    }

    #[inline]
    pub fn hitpattern(&self) -> &Hitpattern {
        &self.hitpattern
    }

    #[inline]
    pub fn hits(&self) -> &[WireHit] {
        &self.hits
    }

    #[inline]
    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    #[inline]
    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    /// Layer a wire plane belongs to.
    #[inline]
    pub fn layer_of(&self, plane_num: u16) -> usize {
        plane_num as usize / (self.config.n_planes / self.config.n_layers)
    }

    /// Reset all event state.
    pub fn clear(&mut self) {
        self.hitpattern.clear();
        self.hits.clear();
        self.matches.clear();
        self.roads.clear();
    }

    /// Take over this event's hits. The buffer is sorted into wire order,
    /// which all later set operations rely on.
    pub fn set_hits(&mut self, mut hits: Vec<WireHit>) {
        sort_hits(&mut hits);
        self.hits = hits;
    }

    /// Mark every hit's bin in the hitpattern. Returns the number of hits
    /// inside the tracking region.
    pub fn fill_hitpattern(&mut self) -> usize {
        let mut n_inside = 0;
        for (index, hit) in self.hits.iter().enumerate() {
            let layer = hit.plane_num as usize / (self.config.n_planes / self.config.n_layers);
            if self.hitpattern.set_hit(layer, index, hit.wire_pos) {
                n_inside += 1;
            }
        }
        log::debug!(
            "hitpattern filled: {}/{} hits inside, {} bits set",
            n_inside,
            self.hits.len(),
            self.hitpattern.n_set_bits()
        );
        n_inside
    }

    /// Search the pattern tree against the current hitpattern.
    ///
    /// Matches are sorted by front bin, back bin and depth so that road
    /// clustering sweeps the detector deterministically.
    pub fn search(&mut self, tree: &PatternTree) -> Result<usize> {
        if tree.n_planes() != self.config.n_layers {
            return Err(RekhaError::Param(format!(
                "tree spans {} planes but projection has {} layers",
                tree.n_planes(),
                self.config.n_layers
            )));
        }
        if tree.n_levels() != self.nlevels {
            return Err(RekhaError::Param(format!(
                "tree has {} levels but projection was set up for {}",
                tree.n_levels(),
                self.nlevels
            )));
        }

        self.matches.clear();
        let mut compare = ComparePattern::new(
            &self.hitpattern,
            &self.combos,
            self.nlevels,
            &mut self.matches,
        );
        tree.walk(&mut compare)?;

        self.matches.sort_by(|a, b| {
            let back = a.bins.len() - 1;
            a.bins[0]
                .cmp(&b.bins[0])
                .then(a.bins[back].cmp(&b.bins[back]))
                .then(a.node.depth.cmp(&b.node.depth))
        });

        log::debug!("tree search found {} matching patterns", self.matches.len());
        Ok(self.matches.len())
    }

    /// Cluster the matches into roads.
    ///
    /// Every match not yet consumed seeds a road; all later unconsumed
    /// matches within the pattern search distance of the road's bounds are
    /// offered to it. Each road is finished, and thereby marks its
    /// patterns, before the next seed is considered.
    pub fn make_roads(&mut self) -> usize {
        self.roads.clear();
        for seed in 0..self.matches.len() {
            if self.matches[seed].used != Consumption::Unused {
                continue;
            }
            let mut road = Road::new(&self.config);
            if !road.add(seed, &self.matches, &self.hits) {
                continue;
            }
            for index in seed + 1..self.matches.len() {
                if self.matches[index].used == Consumption::Full {
                    continue;
                }
                if !road.is_adjacent(&self.matches[index], self.config.pattern_max_dist) {
                    continue;
                }
                road.add(index, &self.matches, &self.hits);
            }
            road.finish(&mut self.matches);
            self.roads.push(road);
        }
        log::debug!("built {} roads", self.roads.len());
        self.roads.len()
    }
}
