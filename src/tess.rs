// Copyright 2025 Lars Brubaker
// License: SGI Free Software License B (MIT-compatible)
//
// The tessellation driver: public facade + full sweep computation.
//
// The sweep walks top to bottom (increasing y, ties by x). The status
// tree holds bundles of collinear edges ordered left to right at the
// sweep position, bracketed by two sentinel bundles. Each event pops,
// discovers its incident neighborhood, retires the region structure
// above the point, rebuilds the slot below it, and probes the two new
// neighbor pairs for intersections.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::bundle::{BundleIdx, Edge, EdgeBundle, EdgeIdx, RegionIdx};
use crate::event::{point_delta, CrossEntry, EventIdx, RationalPoint, SweepEvent};
use crate::pool::{Pool, INVALID};
use crate::predicates::{perp_dot_sign, EPSILON};
use crate::region::{MonotoneRegion, Point};
use crate::splay::{Locate, NodeIdx, SplayTree, NIL};

/// Largest double whose double is still finite; the sentinel edges sit
/// at x = ±LIMIT.
const LIMIT: f64 = f64::MAX / 2.0;

#[derive(Copy, Clone, Debug)]
struct StartPoint {
    x: f64,
    y: f64,
    ring: u32,
    pos: u32,
}

/// Converging walls at an event, with the pending-merge diagonal
/// spliced in where one is open.
#[derive(Copy, Clone)]
enum SeqWall {
    Real(BundleIdx),
    Virt,
}

/// What the pre-event phase saw; the post-event phase needs it to tell
/// splits from continuations.
struct BeforeInfo {
    inside_left: bool,
    k_walls: usize,
    had_virtual: bool,
}

/// Inside-ness and open region on one flank of the event, plus the
/// transition wall that bounds it (INVALID at a sentinel).
#[derive(Copy, Clone)]
struct Flank {
    inside: bool,
    region: RegionIdx,
    wall: BundleIdx,
}

pub struct Tessellation {
    rings: Vec<Vec<Point>>,
    edges: Vec<Edge>,
    bundles: Pool<EdgeBundle>,
    status: SplayTree<BundleIdx>,
    events: Pool<SweepEvent>,
    queue: SplayTree<EventIdx>,
    regions: Vec<MonotoneRegion>,
    intersections: Vec<Point>,
    emitted: HashSet<(u64, u64)>,
    /// Memo of queued bundle-pair crossings, keyed (min id << 26) | max.
    crossings: HashSet<u64>,
    starts: Vec<StartPoint>,
    next_start: usize,
    start_event: EventIdx,
    bundle_ids: u32,
    done: bool,

    // Per-step scratch, capacity kept across steps.
    run: Vec<NodeIdx>,
    walls: Vec<BundleIdx>,
    incident: Vec<BundleIdx>,
    new_edges: Vec<EdgeIdx>,
    merged: Vec<BundleIdx>,
}

impl Tessellation {
    pub fn new(input: &[Vec<Point>]) -> Tessellation {
        let mut t = Tessellation {
            rings: input.to_vec(),
            edges: Vec::new(),
            bundles: Pool::new(),
            status: SplayTree::new(),
            events: Pool::new(),
            queue: SplayTree::new(),
            regions: Vec::new(),
            intersections: Vec::new(),
            emitted: HashSet::new(),
            crossings: HashSet::new(),
            starts: Vec::new(),
            next_start: 0,
            start_event: INVALID,
            bundle_ids: 0,
            done: false,
            run: Vec::new(),
            walls: Vec::new(),
            incident: Vec::new(),
            new_edges: Vec::new(),
            merged: Vec::new(),
        };

        let lb = t
            .bundles
            .alloc(EdgeBundle::new_sentinel(-LIMIT, LIMIT, false, 0));
        let rb = t.bundles.alloc(EdgeBundle::new_sentinel(LIMIT, LIMIT, true, 1));
        t.bundle_ids = 2;
        let ln = t.status.insert_at(Locate::Empty, lb);
        t.bundles[lb].node = ln;
        let rn = t.status.insert_after(ln, rb);
        t.bundles[rb].node = rn;

        let mut starts = Vec::new();
        for (ri, ring) in t.rings.iter().enumerate() {
            collect_starts(ri as u32, ring, &mut starts);
        }
        starts.sort_by(|a: &StartPoint, b: &StartPoint| {
            a.y.total_cmp(&b.y)
                .then(a.x.total_cmp(&b.x))
                .then(a.pos.cmp(&b.pos))
        });
        t.starts = starts;
        if !t.starts.is_empty() {
            let s = t.starts[0];
            t.start_event = t.event_at(RationalPoint::literal(s.x, s.y));
        } else {
            t.done = true;
        }
        log::debug!(
            "tessellation: {} rings, {} start points",
            t.rings.len(),
            t.starts.len()
        );
        t
    }

    // ─────── Public surface ──────────────────────────────────────────────

    /// Advance the sweep by one event. Returns false once drained.
    pub fn step(&mut self) -> bool {
        let node = self.queue.first();
        if node == NIL {
            self.finish();
            return false;
        }
        let ev_idx = self.queue.item(node);
        self.queue.remove(node);
        self.process_event(ev_idx);
        self.events.free(ev_idx);
        #[cfg(debug_assertions)]
        self.audit_status();
        true
    }

    /// Run the sweep to completion.
    pub fn run(&mut self) {
        while self.step() {}
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn monotone_regions(&self) -> &[MonotoneRegion] {
        &self.regions
    }

    pub fn intersection_points(&self) -> &[Point] {
        &self.intersections
    }

    /// True if any region hit a numeric degeneracy.
    pub fn has_error(&self) -> bool {
        self.regions.iter().any(|r| r.has_error)
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            for r in &mut self.regions {
                if !r.closed {
                    r.abandon();
                }
            }
            log::debug!(
                "tessellation done: {} regions, {} intersections",
                self.regions.len(),
                self.intersections.len()
            );
        }
    }

    // ─────── Event processing ────────────────────────────────────────────

    fn process_event(&mut self, ev_idx: EventIdx) {
        let (ex, ey) = self.events[ev_idx].point.rounded();
        let point_w = self.events[ev_idx].point.w;
        log::trace!("event at ({}, {})", ex, ey);

        let bends = std::mem::take(&mut self.events[ev_idx].bends);
        let cross = std::mem::take(&mut self.events[ev_idx].cross);

        // Mark incident bundles; consume the crossing keys.
        self.incident.clear();
        let mut any_proper = false;
        for &e in &bends {
            let b = self.edges[e as usize].bundle;
            if b != INVALID && !self.bundles[b].seen {
                self.bundles[b].seen = true;
                self.incident.push(b);
            }
        }
        for ce in &cross {
            any_proper |= ce.proper;
            self.crossings.remove(&ce.key);
            for (bi, bid) in [(ce.a, ce.a_id), (ce.b, ce.b_id)] {
                if bi == INVALID {
                    continue;
                }
                let alive = self
                    .bundles
                    .get(bi)
                    .map(|bd| bd.id == bid && bd.count > 0 && !bd.sentinel)
                    .unwrap_or(false);
                if alive && !self.bundles[bi].seen {
                    self.bundles[bi].seen = true;
                    self.incident.push(bi);
                }
            }
        }

        if point_w > 0.0 || any_proper {
            let bits = (ex.to_bits(), ey.to_bits());
            if self.emitted.insert(bits) {
                self.intersections.push(Point::new(ex, ey));
            }
        }

        // Neighborhood discovery: before / run / after.
        self.run.clear();
        self.walls.clear();
        let mut before_node = NIL;
        let mut after_node = NIL;
        if !self.incident.is_empty() {
            let mut n = self.bundles[self.incident[0]].node;
            loop {
                let p = self.status.prev(n);
                if p == NIL || !self.bundles[self.status.item(p)].seen {
                    break;
                }
                n = p;
            }
            before_node = self.status.prev(n);
            let mut walk = n;
            while walk != NIL && self.bundles[self.status.item(walk)].seen {
                self.run.push(walk);
                walk = self.status.next(walk);
            }
            after_node = walk;
            for i in 0..self.incident.len() {
                let b = self.incident[i];
                self.bundles[b].seen = false;
            }
            for i in 0..self.run.len() {
                let b = self.status.item(self.run[i]);
                if self.bundles[b].count % 2 == 1 {
                    self.walls.push(b);
                }
            }
            debug_assert_eq!(
                self.run.len(),
                self.incident.len(),
                "incident bundles not contiguous in the status order"
            );
        }

        let mut flank_l = Flank {
            inside: false,
            region: INVALID,
            wall: INVALID,
        };
        let mut flank_r = flank_l;
        let mut info: Option<BeforeInfo> = None;
        if !self.run.is_empty() {
            flank_l = self.flank_left(before_node);
            flank_r = self.flank_right(after_node);
            info = Some(self.update_status_before(ex, ey, flank_l, flank_r));
        }

        // Continuations of ending edges.
        self.new_edges.clear();
        for &e in &bends {
            let ei = e as usize;
            let b = self.edges[ei].bundle;
            if b != INVALID {
                self.bundles[b].remove(e);
                self.edges[ei].bundle = INVALID;
            }
            let (ring, pos2, dir, x2, y2) = {
                let ed = &self.edges[ei];
                (ed.ring, ed.pos2, ed.dir, ed.x2, ed.y2)
            };
            if let Some((fpos, fx, fy)) = self.ring_follower(ring, pos2, dir) {
                if fy > y2 || (fy == y2 && fx > x2) {
                    if let Some(ne) = self.spawn_edge(ring, pos2, fpos, dir, x2, y2, fx, fy) {
                        self.new_edges.push(ne);
                    }
                }
            }
        }

        // Ring entries opening at this point.
        if ev_idx == self.start_event {
            let sx = self.starts[self.next_start].x;
            let sy = self.starts[self.next_start].y;
            while self.next_start < self.starts.len() {
                let s = self.starts[self.next_start];
                if s.x != sx || s.y != sy {
                    break;
                }
                self.activate_start(s);
                self.next_start += 1;
            }
            self.start_event = INVALID;
            if self.next_start < self.starts.len() {
                let s = self.starts[self.next_start];
                self.start_event = self.event_at(RationalPoint::literal(s.x, s.y));
            }
        }

        // Counterclockwise order of the new edges around the point.
        if self.new_edges.len() > 1 {
            let mut ne = std::mem::take(&mut self.new_edges);
            {
                let edges = &self.edges;
                ne.sort_by(|&a, &b| {
                    let ea = &edges[a as usize];
                    let eb = &edges[b as usize];
                    let c = perp_dot_sign(ea.x, ea.y, ea.x2, ea.y2, eb.x, eb.y, eb.x2, eb.y2);
                    if c < 0.0 {
                        Ordering::Less
                    } else if c > 0.0 {
                        Ordering::Greater
                    } else {
                        Ordering::Equal
                    }
                });
            }
            self.new_edges = ne;
        }

        // No pre-existing bundles involved: place the first new edge.
        let mut first_placed = false;
        if self.run.is_empty() {
            if self.new_edges.is_empty() {
                return;
            }
            let first = self.new_edges[0];
            let (px, py) = (self.edges[first as usize].x, self.edges[first as usize].y);
            let loc = {
                let bundles = &self.bundles;
                self.status.locate(|b| bundles[b].delta_from_point(px, py))
            };
            match loc {
                Locate::Found(n) => {
                    // Collinear with an existing bundle: the bend case,
                    // discovered late.
                    before_node = self.status.prev(n);
                    after_node = self.status.next(n);
                    self.run.push(n);
                    let b = self.status.item(n);
                    if self.bundles[b].count % 2 == 1 {
                        self.walls.push(b);
                    }
                    flank_l = self.flank_left(before_node);
                    flank_r = self.flank_right(after_node);
                    info = Some(self.update_status_before(ex, ey, flank_l, flank_r));
                }
                Locate::Vacant { parent, left_side } => {
                    let (bn, an) = if left_side {
                        (self.status.prev(parent), parent)
                    } else {
                        (parent, self.status.next(parent))
                    };
                    before_node = bn;
                    after_node = an;
                    flank_l = self.flank_left(before_node);
                    flank_r = self.flank_right(after_node);
                    info = Some(self.update_status_before(ex, ey, flank_l, flank_r));
                    let nb = self.new_bundle_from_edge(first);
                    let n = self.status.insert_at(loc, nb);
                    self.bundles[nb].node = n;
                    self.status.splay(n);
                    self.run.push(n);
                    first_placed = true;
                }
                Locate::Empty => return,
            }
        }
        self.events[ev_idx].before = if before_node != NIL {
            self.status.item(before_node)
        } else {
            INVALID
        };
        self.events[ev_idx].after = if after_node != NIL {
            self.status.item(after_node)
        } else {
            INVALID
        };

        // Merge surviving bundles (reversed below the point) with the
        // new edges, by angle.
        let dead: Vec<BundleIdx> = self
            .run
            .iter()
            .map(|&n| self.status.item(n))
            .filter(|&b| self.bundles[b].count == 0)
            .collect();
        let old: Vec<BundleIdx> = self
            .run
            .iter()
            .rev()
            .map(|&n| self.status.item(n))
            .filter(|&b| self.bundles[b].count > 0)
            .collect();
        let new_from = if first_placed { 1 } else { 0 };
        self.merge_edges_into_bundles(&old, new_from);

        // Rewrite the slot between before and after.
        let k = self.run.len();
        let m = self.merged.len();
        for i in 0..k.min(m) {
            let n = self.run[i];
            let b = self.merged[i];
            self.status.set_item(n, b);
            self.bundles[b].node = n;
        }
        for i in m..k {
            self.status.remove(self.run[i]);
        }
        if m > k {
            let mut anchor = if k > 0 { self.run[k - 1] } else { before_node };
            let mut last = NIL;
            for i in k..m {
                let b = self.merged[i];
                let n = self.status.insert_after(anchor, b);
                self.bundles[b].node = n;
                anchor = n;
                last = n;
            }
            self.status.splay(last);
        }
        for b in dead {
            if !self.bundles[b].sentinel {
                self.bundles.free(b);
            }
        }

        if let Some(info) = info {
            self.update_status_after(ex, ey, &info, flank_l, flank_r);
        }

        // Probe the two fresh neighbor pairs.
        let bn_next = self.status.next(before_node);
        if bn_next == after_node {
            self.check_pair(before_node, after_node);
        } else {
            self.check_pair(before_node, bn_next);
            let an_prev = self.status.prev(after_node);
            self.check_pair(an_prev, after_node);
        }
    }

    // ─────── Flank discovery ─────────────────────────────────────────────

    /// Inside-ness and open region immediately left of the event slot:
    /// walk left to the nearest transition wall.
    fn flank_left(&self, before_node: NodeIdx) -> Flank {
        let mut n = before_node;
        loop {
            if n == NIL {
                return Flank {
                    inside: false,
                    region: INVALID,
                    wall: INVALID,
                };
            }
            let b = self.status.item(n);
            let bd = &self.bundles[b];
            if bd.sentinel {
                return Flank {
                    inside: bd.after_is_inside,
                    region: INVALID,
                    wall: INVALID,
                };
            }
            if bd.count % 2 == 1 {
                return if bd.after_is_inside {
                    Flank {
                        inside: true,
                        region: bd.region,
                        wall: b,
                    }
                } else {
                    Flank {
                        inside: false,
                        region: INVALID,
                        wall: b,
                    }
                };
            }
            n = self.status.prev(n);
        }
    }

    /// Mirror of `flank_left` on the right side of the slot.
    fn flank_right(&self, after_node: NodeIdx) -> Flank {
        let mut n = after_node;
        loop {
            if n == NIL {
                return Flank {
                    inside: false,
                    region: INVALID,
                    wall: INVALID,
                };
            }
            let b = self.status.item(n);
            let bd = &self.bundles[b];
            if bd.sentinel {
                return Flank {
                    inside: false,
                    region: INVALID,
                    wall: INVALID,
                };
            }
            if bd.count % 2 == 1 {
                return if bd.after_is_inside {
                    Flank {
                        inside: false,
                        region: INVALID,
                        wall: b,
                    }
                } else {
                    Flank {
                        inside: true,
                        region: bd.region,
                        wall: b,
                    }
                };
            }
            n = self.status.next(n);
        }
    }

    // ─────── Region phases ───────────────────────────────────────────────

    /// Retire the region structure above the event: close every inside
    /// region pinched between consecutive converging walls (a pending
    /// merge diagonal converges too), and give the flanking regions
    /// their chain vertices.
    fn update_status_before(
        &mut self,
        ex: f64,
        ey: f64,
        flank_l: Flank,
        flank_r: Flank,
    ) -> BeforeInfo {
        let inside_left = flank_l.inside;
        let mut seq: Vec<SeqWall> = Vec::with_capacity(self.walls.len() + 2);
        let mut had_virtual = false;
        if inside_left
            && flank_l.region != INVALID
            && self.regions[flank_l.region as usize].latest_is_merge
        {
            self.regions[flank_l.region as usize].latest_is_merge = false;
            seq.push(SeqWall::Virt);
            had_virtual = true;
        }
        for i in 0..self.walls.len() {
            let t = self.walls[i];
            seq.push(SeqWall::Real(t));
            let (after, r) = {
                let bd = &self.bundles[t];
                (bd.after_is_inside, bd.region)
            };
            if after && r != INVALID && self.regions[r as usize].latest_is_merge {
                self.regions[r as usize].latest_is_merge = false;
                seq.push(SeqWall::Virt);
            }
        }
        let k_walls = self.walls.len();
        if seq.is_empty() {
            return BeforeInfo {
                inside_left,
                k_walls,
                had_virtual,
            };
        }
        debug_assert_eq!(
            inside_left ^ (k_walls % 2 == 1),
            flank_r.inside,
            "flank parity"
        );

        let mut inside = inside_left;
        for i in 0..seq.len() - 1 {
            if matches!(seq[i], SeqWall::Real(_)) {
                inside = !inside;
            }
            if !inside {
                continue;
            }
            let r = match (seq[i], seq[i + 1]) {
                (_, SeqWall::Real(t)) if !self.bundles[t].after_is_inside => {
                    self.bundles[t].region
                }
                (SeqWall::Real(t), _) if self.bundles[t].after_is_inside => self.bundles[t].region,
                _ => INVALID,
            };
            if r != INVALID {
                self.close_region(r, ex, ey);
            }
        }

        if inside_left && flank_l.region != INVALID {
            self.append_region(flank_l.region, ex, ey, false);
        }
        if flank_r.inside && flank_r.region != INVALID {
            self.append_region(flank_r.region, ex, ey, true);
        }
        BeforeInfo {
            inside_left,
            k_walls,
            had_virtual,
        }
    }

    /// Rebuild the region structure below the event: reassign flank
    /// regions to the outer sub-intervals, spawn regions for interior
    /// ones, and stamp every slot bundle with its side and region.
    fn update_status_after(
        &mut self,
        ex: f64,
        ey: f64,
        info: &BeforeInfo,
        flank_l: Flank,
        flank_r: Flank,
    ) {
        let inside_left = flank_l.inside;
        let a_reg = flank_l.region;
        let b_reg = flank_r.region;

        let mut m = 0usize;
        for i in 0..self.merged.len() {
            if self.bundles[self.merged[i]].count % 2 == 1 {
                m += 1;
            }
        }

        if m == 0 {
            for i in 0..self.merged.len() {
                let b = self.merged[i];
                let bd = &mut self.bundles[b];
                bd.after_is_inside = inside_left;
                bd.region = INVALID;
            }
            if inside_left && a_reg != INVALID && b_reg != INVALID && a_reg != b_reg {
                // Two open regions now bound one interval: a merge.
                // Closure waits for the vertex that reconnects them.
                self.regions[a_reg as usize].latest_is_merge = true;
            }
            return;
        }
        debug_assert_eq!(inside_left ^ (m % 2 == 1), flank_r.inside, "slot parity");

        let mut interval_regions: Vec<RegionIdx> = vec![INVALID; m + 1];
        let pure_split = info.k_walls == 0
            && !info.had_virtual
            && inside_left
            && a_reg != INVALID
            && a_reg == b_reg;
        if pure_split {
            // The event splits one enclosing region; the new region is
            // seeded with the helper vertex and takes the helper's side.
            let helper = self.regions[a_reg as usize].latest();
            if self.regions[a_reg as usize].latest_is_left {
                let nr = self.begin_region_at(helper.x, helper.y);
                self.append_region(nr, ex, ey, false);
                interval_regions[0] = nr;
                self.append_region(a_reg, ex, ey, true);
                interval_regions[m] = a_reg;
                if flank_l.wall != INVALID {
                    self.bundles[flank_l.wall].region = nr;
                }
            } else {
                let nr = self.begin_region_at(helper.x, helper.y);
                self.append_region(nr, ex, ey, true);
                interval_regions[m] = nr;
                self.append_region(a_reg, ex, ey, false);
                interval_regions[0] = a_reg;
                if flank_r.wall != INVALID {
                    self.bundles[flank_r.wall].region = nr;
                }
            }
            for j in 1..m {
                if j % 2 == 0 {
                    interval_regions[j] = self.begin_region_at(ex, ey);
                }
            }
        } else {
            for j in 0..=m {
                let inside_j = inside_left ^ (j % 2 == 1);
                if !inside_j {
                    continue;
                }
                interval_regions[j] = if j == 0 {
                    a_reg
                } else if j == m {
                    b_reg
                } else {
                    self.begin_region_at(ex, ey)
                };
            }
        }

        let mut inside = inside_left;
        let mut j = 0usize;
        for i in 0..self.merged.len() {
            let b = self.merged[i];
            if self.bundles[b].count % 2 == 1 {
                let left_r = interval_regions[j];
                j += 1;
                let right_r = interval_regions[j];
                inside = !inside;
                let bd = &mut self.bundles[b];
                bd.after_is_inside = inside;
                bd.region = if inside { right_r } else { left_r };
            } else {
                let bd = &mut self.bundles[b];
                bd.after_is_inside = inside;
                bd.region = INVALID;
            }
        }
    }

    fn begin_region_at(&mut self, x: f64, y: f64) -> RegionIdx {
        self.regions.push(MonotoneRegion::begin(x, y));
        (self.regions.len() - 1) as RegionIdx
    }

    fn append_region(&mut self, r: RegionIdx, x: f64, y: f64, is_left: bool) {
        let reg = &mut self.regions[r as usize];
        if reg.closed {
            reg.has_error = true;
            return;
        }
        reg.append(x, y, is_left);
    }

    fn close_region(&mut self, r: RegionIdx, x: f64, y: f64) {
        let reg = &mut self.regions[r as usize];
        if reg.closed {
            reg.has_error = true;
            return;
        }
        reg.close(x, y);
    }

    // ─────── Slot merging ────────────────────────────────────────────────

    /// Merge the angularly sorted new edges with the surviving old
    /// bundles (already reversed into below-event order) into the
    /// ordered bundle list for the slot.
    fn merge_edges_into_bundles(&mut self, old: &[BundleIdx], new_from: usize) {
        self.merged.clear();
        let mut oi = 0usize;
        let mut ni = new_from;
        while oi < old.len() || ni < self.new_edges.len() {
            if oi >= old.len() {
                let b = self.new_bundle_from_edge(self.new_edges[ni]);
                ni += 1;
                ni = self.absorb_collinear(b, ni);
                self.merged.push(b);
            } else if ni >= self.new_edges.len() {
                self.merged.push(old[oi]);
                oi += 1;
            } else {
                let ob = old[oi];
                let e = self.new_edges[ni];
                let c = {
                    let bd = &self.bundles[ob];
                    let ed = &self.edges[e as usize];
                    perp_dot_sign(bd.x, bd.y, bd.x2, bd.y2, ed.x, ed.y, ed.x2, ed.y2)
                };
                if c == 0.0 {
                    let ed = self.edges[e as usize].clone();
                    self.bundles[ob].insert(e, &ed);
                    self.edges[e as usize].bundle = ob;
                    ni += 1;
                } else if c < 0.0 {
                    self.merged.push(ob);
                    oi += 1;
                } else {
                    let b = self.new_bundle_from_edge(e);
                    ni += 1;
                    ni = self.absorb_collinear(b, ni);
                    self.merged.push(b);
                }
            }
        }
    }

    /// Pull following new edges collinear with `b` into it.
    fn absorb_collinear(&mut self, b: BundleIdx, mut ni: usize) -> usize {
        while ni < self.new_edges.len() {
            let e = self.new_edges[ni];
            let c = {
                let bd = &self.bundles[b];
                let ed = &self.edges[e as usize];
                perp_dot_sign(bd.x, bd.y, bd.x2, bd.y2, ed.x, ed.y, ed.x2, ed.y2)
            };
            if c != 0.0 {
                break;
            }
            let ed = self.edges[e as usize].clone();
            self.bundles[b].insert(e, &ed);
            self.edges[e as usize].bundle = b;
            ni += 1;
        }
        ni
    }

    fn new_bundle_from_edge(&mut self, e: EdgeIdx) -> BundleIdx {
        let id = self.bundle_ids;
        self.bundle_ids += 1;
        let b = self
            .bundles
            .alloc(EdgeBundle::from_edge(e, &self.edges[e as usize], id));
        self.edges[e as usize].bundle = b;
        b
    }

    // ─────── Edge spawning ───────────────────────────────────────────────

    /// The next ring vertex from `pos` in direction `dir`, skipping
    /// exact duplicates of the vertex at `pos`.
    fn ring_follower(&self, ring: u32, pos: u32, dir: i8) -> Option<(u32, f64, f64)> {
        let pts = &self.rings[ring as usize];
        let n = pts.len() as u32;
        let base = pts[pos as usize];
        let mut p = pos;
        for _ in 0..n {
            p = if dir > 0 { (p + 1) % n } else { (p + n - 1) % n };
            let q = pts[p as usize];
            if q.x != base.x || q.y != base.y {
                return Some((p, q.x, q.y));
            }
        }
        None
    }

    /// Create a downward edge and queue a bend event at its lower
    /// endpoint.
    #[allow(clippy::too_many_arguments)]
    fn spawn_edge(
        &mut self,
        ring: u32,
        pos: u32,
        pos2: u32,
        dir: i8,
        ax: f64,
        ay: f64,
        bx: f64,
        by: f64,
    ) -> Option<EdgeIdx> {
        let e = Edge::new(ring, pos, pos2, dir, ax, ay, bx, by, 0.0)?;
        let (lx, ly) = (e.x2, e.y2);
        let idx = self.edges.len() as EdgeIdx;
        self.edges.push(e);
        let ev = self.event_at(RationalPoint::literal(lx, ly));
        self.events[ev].bends.push(idx);
        Some(idx)
    }

    fn activate_start(&mut self, s: StartPoint) {
        for dir in [1i8, -1] {
            if let Some((fpos, fx, fy)) = self.ring_follower(s.ring, s.pos, dir) {
                if fy > s.y || (fy == s.y && fx > s.x) {
                    if let Some(e) = self.spawn_edge(s.ring, s.pos, fpos, dir, s.x, s.y, fx, fy) {
                        self.new_edges.push(e);
                    }
                }
            }
        }
    }

    // ─────── Event queue ─────────────────────────────────────────────────

    /// The event holding this point, created if absent. Duplicate
    /// points land on the existing event.
    fn event_at(&mut self, point: RationalPoint) -> EventIdx {
        let mut key = point;
        let loc = {
            let events = &mut self.events;
            self.queue
                .locate(|ev| point_delta(&mut key, &mut events[ev].point))
        };
        match loc {
            Locate::Found(n) => self.queue.item(n),
            at => {
                let ev = self.events.alloc(SweepEvent::new(key));
                let n = self.queue.insert_at(at, ev);
                self.queue.splay(n);
                ev
            }
        }
    }

    // ─────── Intersections ───────────────────────────────────────────────

    fn check_pair(&mut self, n1: NodeIdx, n2: NodeIdx) {
        if n1 == NIL || n2 == NIL {
            return;
        }
        let a = self.status.item(n1);
        let b = self.status.item(n2);
        self.check_intersection(a, b);
    }

    /// Probe two status-adjacent bundles (a left of b) for a crossing
    /// below the sweep line.
    fn check_intersection(&mut self, a_b: BundleIdx, b_b: BundleIdx) {
        let (a_sent, ax, ay, ax2, ay2, a_adx, a_xerr, a_id) = {
            let a = &self.bundles[a_b];
            (a.sentinel, a.x, a.y, a.x2, a.y2, a.adx, a.x_err, a.id)
        };
        let (b_sent, bx, by, bx2, by2, b_adx, b_xerr, b_id) = {
            let b = &self.bundles[b_b];
            (b.sentinel, b.x, b.y, b.x2, b.y2, b.adx, b.x_err, b.id)
        };
        if a_sent || b_sent {
            return;
        }

        // x-interval prefilter on doubled midpoints.
        let mid_gap = ((ax + ax2) - (bx + bx2)).abs();
        if mid_gap > (a_adx + b_adx) * (1.0 + 2.0 * EPSILON) + 2.0 * (a_xerr + b_xerr) {
            return;
        }

        let key = pair_key(a_id, b_id);
        if self.crossings.contains(&key) {
            return;
        }

        let det = perp_dot_sign(ax, ay, ax2, ay2, bx, by, bx2, by2);
        if det <= 0.0 {
            // Parallel, collinear, or diverging below the sweep line.
            return;
        }
        let a2 = perp_dot_sign(ax2, ay2, bx, by, ax2, ay2, bx2, by2);
        if a2 > 0.0 {
            return;
        }
        let b2 = perp_dot_sign(bx2, by2, ax, ay, bx2, by2, ax2, ay2);
        if b2 < 0.0 {
            return;
        }

        self.crossings.insert(key);

        if a2 == 0.0 && b2 == 0.0 {
            // Shared endpoint; the bend events already meet there.
            return;
        }
        if a2 == 0.0 {
            // Intersection at a's endpoint, interior to b.
            let ev = self.event_at(RationalPoint::literal_on(ax2, ay2, b_b));
            self.events[ev].cross.push(CrossEntry {
                a: INVALID,
                a_id: 0,
                b: b_b,
                b_id,
                key,
                proper: false,
            });
            return;
        }
        if b2 == 0.0 {
            let ev = self.event_at(RationalPoint::literal_on(bx2, by2, a_b));
            self.events[ev].cross.push(CrossEntry {
                a: a_b,
                a_id,
                b: INVALID,
                b_id: 0,
                key,
                proper: false,
            });
            return;
        }

        // Proper crossing: rational point with error bounds.
        let dax = ax2 - ax;
        let day = ay2 - ay;
        let dbx = bx2 - bx;
        let dby = by2 - by;
        let w = det;
        let w_err = 8.0 * EPSILON * ((dax * dby).abs() + (day * dbx).abs());
        let ux = bx - ax2;
        let uy = by - ay2;
        let vx = bx2 - ax2;
        let vy = by2 - ay2;
        let a2_err = 8.0 * EPSILON * ((ux * vy).abs() + (uy * vx).abs());
        let x = ax2 * w + dax * a2;
        let y = ay2 * w + day * a2;
        let x_err = ax2.abs() * w_err
            + dax.abs() * a2_err
            + 4.0 * EPSILON * ((ax2 * w).abs() + (dax * a2).abs());
        let y_err = ay2.abs() * w_err
            + day.abs() * a2_err
            + 4.0 * EPSILON * ((ay2 * w).abs() + (day * a2).abs());
        let p = RationalPoint::intersection(
            x,
            y,
            w,
            x_err,
            y_err,
            w_err,
            a_b,
            b_b,
            [ax, ay, ax2, ay2],
            [bx, by, bx2, by2],
        );
        log::trace!(
            "crossing of bundles {} and {} at ({}, {})",
            a_id,
            b_id,
            x / w,
            y / w
        );
        let ev = self.event_at(p);
        self.events[ev].cross.push(CrossEntry {
            a: a_b,
            a_id,
            b: b_b,
            b_id,
            key,
            proper: true,
        });
    }

    // ─────── Audit ───────────────────────────────────────────────────────

    /// Transition bundles must alternate inside/outside along the
    /// status order, opening from the outside.
    #[cfg(debug_assertions)]
    fn audit_status(&self) {
        let mut expect_inside = false;
        let mut n = self.status.first();
        while n != NIL {
            let b = self.status.item(n);
            let bd = &self.bundles[b];
            if !bd.sentinel && bd.count % 2 == 1 {
                expect_inside = !expect_inside;
                debug_assert_eq!(
                    bd.after_is_inside, expect_inside,
                    "status parity broken at bundle {}",
                    bd.id
                );
            }
            n = self.status.next(n);
        }
        debug_assert!(!expect_inside, "status parity does not close");
    }
}

fn pair_key(id1: u32, id2: u32) -> u64 {
    let (lo, hi) = if id1 < id2 { (id1, id2) } else { (id2, id1) };
    ((lo as u64) << 26) | hi as u64
}

/// Local topmost vertices of one ring: positions where the scan turns
/// from a strictly upward stride to any other stride. Consecutive
/// duplicate points are skipped; rings with fewer than three distinct
/// points contribute nothing.
fn collect_starts(ring_idx: u32, pts: &[Point], out: &mut Vec<StartPoint>) {
    if pts.len() < 3 {
        return;
    }
    let mut idx: Vec<u32> = Vec::with_capacity(pts.len());
    for (i, p) in pts.iter().enumerate() {
        if let Some(&last) = idx.last() {
            let q = pts[last as usize];
            if q.x == p.x && q.y == p.y {
                continue;
            }
        }
        idx.push(i as u32);
    }
    while idx.len() > 1 {
        let first = pts[idx[0] as usize];
        let last = pts[*idx.last().unwrap() as usize];
        if first.x == last.x && first.y == last.y {
            idx.pop();
        } else {
            break;
        }
    }
    let m = idx.len();
    if m < 3 {
        return;
    }
    let upward = |from: u32, to: u32| {
        let a = pts[from as usize];
        let b = pts[to as usize];
        b.y < a.y || (b.y == a.y && b.x < a.x)
    };
    for k in 0..m {
        let prev = idx[(k + m - 1) % m];
        let cur = idx[k];
        let next = idx[(k + 1) % m];
        if upward(prev, cur) && !upward(cur, next) {
            let p = pts[cur as usize];
            out.push(StartPoint {
                x: p.x,
                y: p.y,
                ring: ring_idx,
                pos: cur,
            });
        }
    }
}
