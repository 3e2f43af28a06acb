// Copyright 2025 Lars Brubaker
// Property checks: the predicate against an exact rational oracle, and
// structural invariants of the sweep on generated inputs.

mod helpers;

use helpers::{ring, signed_area, tessellate, total_area, verify_regions};
use monotess::predicates::{big_sum, estimate, perp_dot_exact, perp_dot_sign, small_prod};
use num::BigRational;
use rand::Rng;
use rand_pcg::Pcg64Mcg;

fn oracle_sign(v: [f64; 8]) -> i32 {
    let r = |x: f64| BigRational::from_float(x).expect("finite input");
    let det = (r(v[2]) - r(v[0])) * (r(v[7]) - r(v[5])) - (r(v[3]) - r(v[1])) * (r(v[6]) - r(v[4]));
    let zero = BigRational::from_float(0.0).unwrap();
    if det > zero {
        1
    } else if det < zero {
        -1
    } else {
        0
    }
}

fn sign_of(x: f64) -> i32 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

#[test]
fn perp_dot_sign_matches_oracle_on_random_grid() {
    let mut rng = Pcg64Mcg::new(0xcafe_f00d);
    for _ in 0..2000 {
        let mut v = [0.0f64; 8];
        for slot in &mut v {
            // Coarse grid coordinates collide often, forcing exact ties.
            *slot = rng.gen_range(-8i32..=8) as f64 * 0.25;
        }
        let got = sign_of(perp_dot_sign(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]));
        assert_eq!(got, oracle_sign(v), "inputs {:?}", v);
    }
}

#[test]
fn perp_dot_sign_matches_oracle_near_collinear() {
    let mut rng = Pcg64Mcg::new(0xdead_beef);
    for _ in 0..2000 {
        // Exactly collinear integer segments, then an ulp-scale nudge
        // of one endpoint.
        let k1 = rng.gen_range(-50i64..=50) as f64;
        let k2 = rng.gen_range(-50i64..=50) as f64;
        let sx = rng.gen_range(1i64..=5) as f64;
        let sy = rng.gen_range(-5i64..=5) as f64;
        let nudge = (rng.gen_range(-2i32..=2) as f64) * f64::EPSILON;
        let v = [
            k1 * sx,
            k1 * sy,
            (k1 + 1.0) * sx,
            (k1 + 1.0) * sy,
            k2 * sx,
            k2 * sy,
            (k2 + 3.0) * sx,
            (k2 + 3.0) * sy + nudge,
        ];
        let got = sign_of(perp_dot_sign(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]));
        assert_eq!(got, oracle_sign(v), "inputs {:?}", v);
    }
}

#[test]
fn perp_dot_sign_matches_oracle_across_scales() {
    let mut rng = Pcg64Mcg::new(0x5eed);
    for _ in 0..500 {
        let e = rng.gen_range(-40i32..=40);
        let s = (2.0f64).powi(e);
        let mut v = [0.0f64; 8];
        for slot in &mut v {
            *slot = rng.gen_range(-6i32..=6) as f64 * s;
        }
        let got = sign_of(perp_dot_sign(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]));
        assert_eq!(got, oracle_sign(v), "inputs {:?}", v);
    }
}

#[test]
fn exact_expansion_agrees_with_filtered_sign() {
    let mut rng = Pcg64Mcg::new(0x0ddba11);
    let mut out = Vec::new();
    for _ in 0..500 {
        let mut v = [0.0f64; 8];
        for slot in &mut v {
            *slot = rng.gen_range(-4.0..4.0);
        }
        perp_dot_exact(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], &mut out);
        let exact = sign_of(estimate(&out));
        let filtered = sign_of(perp_dot_sign(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]));
        assert_eq!(exact, filtered, "inputs {:?}", v);
    }
}

#[test]
fn expansion_sum_is_exact() {
    let mut rng = Pcg64Mcg::new(7);
    let mut out = Vec::new();
    for _ in 0..200 {
        let a = rng.gen_range(-1e20..1e20);
        let b = rng.gen_range(-1.0..1.0);
        let c = rng.gen_range(-1e-20..1e-20);
        let hi = a + b;
        let lo = monotess::predicates::two_sum_lo(a, b, hi);
        big_sum(&[lo, hi], &[c], &mut out);
        // The expansion must carry the full sum; compare against the
        // rational truth.
        let r = |x: f64| BigRational::from_float(x).unwrap();
        let want = r(a) + r(b) + r(c);
        let mut got = BigRational::from_float(0.0).unwrap();
        for &term in &out {
            got += r(term);
        }
        assert_eq!(got, want);
    }
}

#[test]
fn expansion_scale_is_exact() {
    let mut rng = Pcg64Mcg::new(8);
    let mut out = Vec::new();
    for _ in 0..200 {
        let a = rng.gen_range(-1e8..1e8);
        let b = rng.gen_range(-1.0..1.0);
        let s = rng.gen_range(-1e3..1e3);
        let hi = a + b;
        let lo = monotess::predicates::two_sum_lo(a, b, hi);
        small_prod(&[lo, hi], s, &mut out);
        let r = |x: f64| BigRational::from_float(x).unwrap();
        let want = (r(a) + r(b)) * r(s);
        let mut got = BigRational::from_float(0.0).unwrap();
        for &term in &out {
            got += r(term);
        }
        assert_eq!(got, want);
    }
}

/// Radial polygon with jittered radii: simple by construction, with
/// several local tops and bottoms.
fn star(rng: &mut Pcg64Mcg, n: usize, cx: f64, cy: f64) -> Vec<monotess::Point> {
    let mut pts = Vec::with_capacity(n);
    for i in 0..n {
        let jitter: f64 = rng.gen_range(0.0..0.8);
        let angle = (i as f64 + jitter) * std::f64::consts::TAU / n as f64;
        let radius: f64 = rng.gen_range(1.0..3.0);
        pts.push(monotess::Point::new(
            cx + radius * angle.cos(),
            cy + radius * angle.sin(),
        ));
    }
    pts
}

#[test]
fn random_stars_cover_their_own_area() {
    let mut rng = Pcg64Mcg::new(0x57a7);
    for round in 0..40 {
        let n = rng.gen_range(5..24);
        let pts = star(&mut rng, n, 0.0, 0.0);
        let want = signed_area(&pts).abs();
        let t = tessellate(&[pts]);
        assert!(
            t.intersection_points().is_empty(),
            "round {}: a simple polygon reported crossings",
            round
        );
        verify_regions(&t, "star");
        let got = total_area(&t);
        assert!(
            (got - want).abs() <= 1e-9 * want.max(1.0),
            "round {}: area {} != {}",
            round,
            got,
            want
        );
    }
}

#[test]
fn random_quads_terminate_and_close() {
    let mut rng = Pcg64Mcg::new(0x9a4d);
    for round in 0..200 {
        let pts: Vec<(f64, f64)> = (0..4)
            .map(|_| (rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0)))
            .collect();
        let t = tessellate(&[ring(&pts)]);
        assert!(
            t.intersection_points().len() <= 1,
            "round {}: a quad has at most one proper self-crossing",
            round
        );
        for (i, r) in t.monotone_regions().iter().enumerate() {
            assert!(r.closed, "round {}: region {} open", round, i);
        }
    }
}
