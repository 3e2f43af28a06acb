// Copyright 2025 Lars Brubaker
// License: SGI Free Software License B (MIT-compatible)
//
// Monotone output regions.
//
// A region grows two chains while the sweep runs: the left chain
// (is_left vertices, top to bottom) and the right chain. Closing seals
// the region and lays the vertices out left chain first, so the
// is_left prefix followed by the reversed suffix walks the closed
// boundary.

/// A plain 2-D point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }
}

/// One output vertex with its chain tag.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub is_left: bool,
}

#[derive(Clone, Debug, Default)]
pub struct MonotoneRegion {
    /// Valid once `closed`; left-chain vertices in sweep order, then
    /// right-chain vertices in sweep order.
    pub vertices: Vec<Vertex>,
    pub closed: bool,
    pub has_error: bool,
    left: Vec<Point>,
    right: Vec<Point>,
    latest_x: f64,
    latest_y: f64,
    pub(crate) latest_is_left: bool,
    pub(crate) latest_is_merge: bool,
}

impl MonotoneRegion {
    /// Open a region at its top vertex.
    pub fn begin(x: f64, y: f64) -> MonotoneRegion {
        MonotoneRegion {
            vertices: Vec::new(),
            closed: false,
            has_error: false,
            left: vec![Point::new(x, y)],
            right: Vec::new(),
            latest_x: x,
            latest_y: y,
            latest_is_left: true,
            latest_is_merge: false,
        }
    }

    pub fn latest(&self) -> Point {
        Point::new(self.latest_x, self.latest_y)
    }

    /// Append a chain vertex. An exact repeat of the previous vertex is
    /// a numeric degeneracy: it is skipped and flagged.
    pub fn append(&mut self, x: f64, y: f64, is_left: bool) {
        debug_assert!(!self.closed);
        if x == self.latest_x && y == self.latest_y {
            self.has_error = true;
            self.latest_is_merge = false;
            return;
        }
        if is_left {
            self.left.push(Point::new(x, y));
        } else {
            self.right.push(Point::new(x, y));
        }
        self.latest_x = x;
        self.latest_y = y;
        self.latest_is_left = is_left;
        self.latest_is_merge = false;
    }

    /// Append the closing vertex and seal the region.
    pub fn close(&mut self, x: f64, y: f64) {
        self.append(x, y, false);
        self.closed = true;
        self.latest_is_merge = false;
        self.vertices.clear();
        self.vertices.reserve(self.left.len() + self.right.len());
        for p in &self.left {
            self.vertices.push(Vertex {
                x: p.x,
                y: p.y,
                is_left: true,
            });
        }
        for p in &self.right {
            self.vertices.push(Vertex {
                x: p.x,
                y: p.y,
                is_left: false,
            });
        }
    }

    /// Seal without further vertices (sweep aborted or degenerate).
    pub fn abandon(&mut self) {
        if !self.closed {
            self.has_error = true;
            self.closed = true;
            self.vertices.clear();
            for p in &self.left {
                self.vertices.push(Vertex {
                    x: p.x,
                    y: p.y,
                    is_left: true,
                });
            }
            for p in &self.right {
                self.vertices.push(Vertex {
                    x: p.x,
                    y: p.y,
                    is_left: false,
                });
            }
        }
    }

    /// The closed boundary: left chain top to bottom, right chain
    /// bottom to top.
    pub fn boundary(&self) -> Vec<Point> {
        let mut out = Vec::with_capacity(self.vertices.len());
        for v in &self.vertices {
            if v.is_left {
                out.push(Point::new(v.x, v.y));
            }
        }
        for v in self.vertices.iter().rev() {
            if !v.is_left {
                out.push(Point::new(v.x, v.y));
            }
        }
        out
    }
}
