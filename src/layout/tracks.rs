//! Per-lane track occupancy.
//!
//! Each lane owns two occupancy stores, one per orientation: for every track
//! a sorted vector of non-overlapping intervals. Conflict tests are a
//! partition-point search over the interval starts; insertion keeps the
//! order. Tracks are numbered 1..=tracks_total with the center track fixed;
//! expansion adds one track on each side and never moves existing segments.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::ir::Lane;

/// One reserved interval on a track, owned by an edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub edge_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone)]
pub struct LaneTracks {
    pub id: String,
    pub tracks_total: u32,
    pub center_track: u32,
    pub track_gap: f64,
    pub expansion_factor: f64,
    /// Index 0 holds track 1.
    h: Vec<Vec<Segment>>,
    v: Vec<Vec<Segment>>,
}

impl LaneTracks {
    fn new(id: &str, lane: &Lane) -> Self {
        Self {
            id: id.to_string(),
            tracks_total: lane.tracks_total,
            center_track: lane.center_track,
            track_gap: lane.track_gap,
            expansion_factor: lane.expansion_factor,
            h: vec![Vec::new(); lane.tracks_total as usize],
            v: vec![Vec::new(); lane.tracks_total as usize],
        }
    }

    fn store(&self, orientation: Orientation) -> &Vec<Vec<Segment>> {
        match orientation {
            Orientation::Horizontal => &self.h,
            Orientation::Vertical => &self.v,
        }
    }

    /// Tracks touched by at least one segment in either orientation.
    pub fn used_tracks(&self) -> usize {
        (0..self.tracks_total as usize)
            .filter(|&i| !self.h[i].is_empty() || !self.v[i].is_empty())
            .count()
    }

    /// Tracks on which `edge_id` reserved a segment of the given orientation.
    pub fn tracks_of_edge(&self, edge_id: &str, orientation: Orientation) -> Vec<u32> {
        self.store(orientation)
            .iter()
            .enumerate()
            .filter(|(_, segments)| segments.iter().any(|s| s.edge_id == edge_id))
            .map(|(i, _)| i as u32 + 1)
            .collect()
    }
}

/// Occupancy maps for every lane, keyed by lane index for the router and by
/// id at the boundary.
#[derive(Debug, Clone)]
pub struct TrackSystem {
    lanes: Vec<LaneTracks>,
    index: HashMap<String, usize>,
}

impl TrackSystem {
    pub fn new(lanes: &BTreeMap<String, Lane>) -> Self {
        let mut tracks = Vec::with_capacity(lanes.len());
        let mut index = HashMap::with_capacity(lanes.len());
        for (lane_id, lane) in lanes {
            index.insert(lane_id.clone(), tracks.len());
            tracks.push(LaneTracks::new(lane_id, lane));
        }
        Self {
            lanes: tracks,
            index,
        }
    }

    pub fn lane_index(&self, lane_id: &str) -> Option<usize> {
        self.index.get(lane_id).copied()
    }

    pub fn lane(&self, lane: usize) -> &LaneTracks {
        &self.lanes[lane]
    }

    pub fn lanes(&self) -> impl Iterator<Item = &LaneTracks> {
        self.lanes.iter()
    }

    /// True iff an existing segment on the track overlaps
    /// `[lo - min_sep, hi + min_sep]`.
    pub fn check_h_conflict(
        &self,
        lane: usize,
        track: u32,
        a: f64,
        b: f64,
        min_sep: f64,
    ) -> bool {
        self.check_conflict(lane, Orientation::Horizontal, track, a, b, min_sep)
    }

    pub fn check_v_conflict(
        &self,
        lane: usize,
        track: u32,
        a: f64,
        b: f64,
        min_sep: f64,
    ) -> bool {
        self.check_conflict(lane, Orientation::Vertical, track, a, b, min_sep)
    }

    fn check_conflict(
        &self,
        lane: usize,
        orientation: Orientation,
        track: u32,
        a: f64,
        b: f64,
        min_sep: f64,
    ) -> bool {
        let segments = match self.track_segments(lane, orientation, track) {
            Some(s) => s,
            None => return true,
        };
        let lo = a.min(b) - min_sep;
        let hi = a.max(b) + min_sep;

        // Segments are sorted by start and non-overlapping; the only
        // candidates are the one starting before `hi` closest to it and
        // anything after `lo`.
        let first_after = segments.partition_point(|s| s.start < lo);
        if let Some(prev) = first_after.checked_sub(1) {
            if segments[prev].end >= lo {
                return true;
            }
        }
        segments.get(first_after).is_some_and(|s| s.start <= hi)
    }

    /// Reserve a horizontal interval. The caller must have checked for
    /// conflicts.
    pub fn occupy_h_segment(&mut self, lane: usize, track: u32, a: f64, b: f64, edge_id: &str) {
        self.occupy(lane, Orientation::Horizontal, track, a, b, edge_id);
    }

    pub fn occupy_v_segment(&mut self, lane: usize, track: u32, a: f64, b: f64, edge_id: &str) {
        self.occupy(lane, Orientation::Vertical, track, a, b, edge_id);
    }

    fn occupy(
        &mut self,
        lane: usize,
        orientation: Orientation,
        track: u32,
        a: f64,
        b: f64,
        edge_id: &str,
    ) {
        let lane_tracks = &mut self.lanes[lane];
        if track < 1 || track > lane_tracks.tracks_total {
            return;
        }
        let store = match orientation {
            Orientation::Horizontal => &mut lane_tracks.h,
            Orientation::Vertical => &mut lane_tracks.v,
        };
        let segments = &mut store[(track - 1) as usize];
        let segment = Segment {
            start: a.min(b),
            end: a.max(b),
            edge_id: edge_id.to_string(),
        };
        let pos = segments.partition_point(|s| s.start < segment.start);
        segments.insert(pos, segment);
    }

    /// Pixel offset of a track from its lane center.
    pub fn get_track_offset(&self, lane: usize, track: u32) -> f64 {
        let lane_tracks = &self.lanes[lane];
        (track as f64 - lane_tracks.center_track as f64) * lane_tracks.track_gap
    }

    /// Grow one lane by two tracks, one on each side of the center.
    /// Existing occupancy is untouched.
    pub fn expand_lane(&mut self, lane: usize) {
        let lane_tracks = &mut self.lanes[lane];
        lane_tracks.tracks_total += 2;
        lane_tracks.h.push(Vec::new());
        lane_tracks.h.push(Vec::new());
        lane_tracks.v.push(Vec::new());
        lane_tracks.v.push(Vec::new());
    }

    fn track_segments(
        &self,
        lane: usize,
        orientation: Orientation,
        track: u32,
    ) -> Option<&[Segment]> {
        let lane_tracks = self.lanes.get(lane)?;
        if track < 1 || track > lane_tracks.tracks_total {
            return None;
        }
        Some(&lane_tracks.store(orientation)[(track - 1) as usize])
    }

    /// Snapshot for the occupancy debug dump: lane id -> orientation ->
    /// track -> segments.
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<&'static str, BTreeMap<u32, Vec<Segment>>>> {
        let mut out = BTreeMap::new();
        for lane in &self.lanes {
            let mut orientations = BTreeMap::new();
            for (key, store) in [("H", &lane.h), ("V", &lane.v)] {
                let mut tracks = BTreeMap::new();
                for (i, segments) in store.iter().enumerate() {
                    if !segments.is_empty() {
                        tracks.insert(i as u32 + 1, segments.clone());
                    }
                }
                orientations.insert(key, tracks);
            }
            out.insert(lane.id.clone(), orientations);
        }
        out
    }
}
