// Copyright 2025 Lars Brubaker
// Shared helpers for the integration tests.

use monotess::{MonotoneRegion, Point, Tessellation};

pub fn ring(pts: &[(f64, f64)]) -> Vec<Point> {
    pts.iter().map(|&(x, y)| Point::new(x, y)).collect()
}

/// Build and run a tessellation to completion.
pub fn tessellate(rings: &[Vec<Point>]) -> Tessellation {
    let mut t = Tessellation::new(rings);
    let mut steps = 0usize;
    while t.step() {
        steps += 1;
        assert!(steps < 1_000_000, "sweep failed to terminate");
    }
    t
}

pub fn signed_area(boundary: &[Point]) -> f64 {
    let mut acc = 0.0;
    for i in 0..boundary.len() {
        let a = boundary[i];
        let b = boundary[(i + 1) % boundary.len()];
        acc += a.x * b.y - b.x * a.y;
    }
    acc * 0.5
}

pub fn region_area(r: &MonotoneRegion) -> f64 {
    signed_area(&r.boundary()).abs()
}

pub fn total_area(t: &Tessellation) -> f64 {
    t.monotone_regions().iter().map(region_area).sum()
}

/// Every region must be closed and its two chains must march down the
/// sweep order; the reconstructed boundary must not repeat consecutive
/// vertices.
pub fn verify_regions(t: &Tessellation, label: &str) {
    for (i, r) in t.monotone_regions().iter().enumerate() {
        assert!(r.closed, "{}: region {} left open", label, i);
        assert!(!r.has_error, "{}: region {} flagged an error", label, i);
        assert!(
            r.vertices.len() >= 3,
            "{}: region {} has only {} vertices",
            label,
            i,
            r.vertices.len()
        );
        // is_left prefix, then the rest.
        let first_right = r
            .vertices
            .iter()
            .position(|v| !v.is_left)
            .unwrap_or(r.vertices.len());
        for v in &r.vertices[first_right..] {
            assert!(
                !v.is_left,
                "{}: region {} interleaves chain tags",
                label,
                i
            );
        }
        for chain in [
            &r.vertices[..first_right],
            &r.vertices[first_right..],
        ] {
            for w in chain.windows(2) {
                let before = (w[0].y, w[0].x);
                let after = (w[1].y, w[1].x);
                assert!(
                    before < after,
                    "{}: region {} chain not monotone: {:?} then {:?}",
                    label,
                    i,
                    before,
                    after
                );
            }
        }
        let b = r.boundary();
        for k in 0..b.len() {
            let p = b[k];
            let q = b[(k + 1) % b.len()];
            assert!(
                p != q,
                "{}: region {} boundary repeats vertex ({}, {})",
                label,
                i,
                p.x,
                p.y
            );
        }
    }
}
