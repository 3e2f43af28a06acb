// Copyright 2025 Lars Brubaker
// License: SGI Free Software License B (MIT-compatible)
//
// Adaptive-precision arithmetic kernel.
//
// Error-free transformations (two-sum, two-product), expansion
// arithmetic, and the filtered orientation predicate used everywhere a
// sign decision matters. Expansions are slices of nonoverlapping
// doubles stored least-significant first; the sign of an expansion is
// the sign of its most significant nonzero component.

/// Half an ulp of 1.0.
pub const EPSILON: f64 = f64::EPSILON / 2.0;

/// 2^27 + 1, splits a double into two 26-bit halves.
pub const SPLITTER: f64 = 134_217_729.0;

/// First-stage filter bound for the perp-dot determinant.
pub const PERP_ERR_BOUND_1: f64 = (16.0 * EPSILON + 3.0) * EPSILON;

/// Second-stage (refined) filter bound.
pub const PERP_ERR_BOUND_2: f64 = (12.0 * EPSILON + 2.0) * EPSILON;

/// Roundoff of `a + b` given the rounded sum `hi`.
#[inline]
pub fn two_sum_lo(a: f64, b: f64, hi: f64) -> f64 {
    let b_virt = hi - a;
    let a_virt = hi - b_virt;
    let b_round = b - b_virt;
    let a_round = a - a_virt;
    a_round + b_round
}

/// Roundoff of `a - b` given the rounded difference `hi`.
#[inline]
pub fn two_diff_lo(a: f64, b: f64, hi: f64) -> f64 {
    let b_virt = a - hi;
    let a_virt = hi + b_virt;
    let b_round = b_virt - b;
    let a_round = a - a_virt;
    a_round + b_round
}

#[inline]
fn split(a: f64) -> (f64, f64) {
    let c = SPLITTER * a;
    let a_big = c - a;
    let hi = c - a_big;
    (hi, a - hi)
}

/// Roundoff of `a * b` given the rounded product `hi`.
#[inline]
pub fn two_product_lo(a: f64, b: f64, hi: f64) -> f64 {
    let (a_hi, a_lo) = split(a);
    let (b_hi, b_lo) = split(b);
    let err = hi - a_hi * b_hi;
    let err = err - a_lo * b_hi;
    let err = err - a_hi * b_lo;
    a_lo * b_lo - err
}

/// Sum of two two-component expansions as a four-component expansion,
/// least significant first.
#[inline]
pub fn two_two_sum(a1: f64, a0: f64, b1: f64, b0: f64) -> [f64; 4] {
    // (a1, a0) + b0
    let i = a0 + b0;
    let x0 = two_sum_lo(a0, b0, i);
    let j = a1 + i;
    let t0 = two_sum_lo(a1, i, j);
    // (j, t0) + b1
    let i2 = t0 + b1;
    let x1 = two_sum_lo(t0, b1, i2);
    let x3 = j + i2;
    let x2 = two_sum_lo(j, i2, x3);
    [x0, x1, x2, x3]
}

/// Difference of two two-component expansions.
#[inline]
pub fn two_two_diff(a1: f64, a0: f64, b1: f64, b0: f64) -> [f64; 4] {
    two_two_sum(a1, a0, -b1, -b0)
}

/// Sum of two expansions, zero components stripped.
/// Output length is at most `e.len() + f.len()`.
pub fn big_sum(e: &[f64], f: &[f64], out: &mut Vec<f64>) {
    out.clear();
    if e.is_empty() {
        out.extend_from_slice(f);
        return;
    }
    if f.is_empty() {
        out.extend_from_slice(e);
        return;
    }

    let mut e_idx = 0usize;
    let mut f_idx = 0usize;
    let mut e_now = e[0];
    let mut f_now = f[0];
    let mut q;
    if (f_now > e_now) == (f_now > -e_now) {
        q = e_now;
        e_idx += 1;
    } else {
        q = f_now;
        f_idx += 1;
    }

    if e_idx < e.len() && f_idx < f.len() {
        e_now = e[e_idx];
        f_now = f[f_idx];
        // First pair merged with fast-two-sum (|q| dominated by the next term).
        let (sum, lo) = if (f_now > e_now) == (f_now > -e_now) {
            e_idx += 1;
            let s = e_now + q;
            (s, q - (s - e_now))
        } else {
            f_idx += 1;
            let s = f_now + q;
            (s, q - (s - f_now))
        };
        q = sum;
        if lo != 0.0 {
            out.push(lo);
        }
        while e_idx < e.len() && f_idx < f.len() {
            e_now = e[e_idx];
            f_now = f[f_idx];
            let next = if (f_now > e_now) == (f_now > -e_now) {
                e_idx += 1;
                e_now
            } else {
                f_idx += 1;
                f_now
            };
            let s = q + next;
            let lo = two_sum_lo(q, next, s);
            q = s;
            if lo != 0.0 {
                out.push(lo);
            }
        }
    }
    while e_idx < e.len() {
        let s = q + e[e_idx];
        let lo = two_sum_lo(q, e[e_idx], s);
        e_idx += 1;
        q = s;
        if lo != 0.0 {
            out.push(lo);
        }
    }
    while f_idx < f.len() {
        let s = q + f[f_idx];
        let lo = two_sum_lo(q, f[f_idx], s);
        f_idx += 1;
        q = s;
        if lo != 0.0 {
            out.push(lo);
        }
    }
    if q != 0.0 || out.is_empty() {
        out.push(q);
    }
}

/// Expansion times scalar, zero components stripped.
/// Output length is at most `2 * e.len()`.
pub fn small_prod(e: &[f64], b: f64, out: &mut Vec<f64>) {
    out.clear();
    if e.is_empty() {
        return;
    }
    let mut q = e[0] * b;
    let lo = two_product_lo(e[0], b, q);
    if lo != 0.0 {
        out.push(lo);
    }
    for &term in &e[1..] {
        let p = term * b;
        let p_lo = two_product_lo(term, b, p);
        let s = q + p_lo;
        let s_lo = two_sum_lo(q, p_lo, s);
        if s_lo != 0.0 {
            out.push(s_lo);
        }
        // fast-two-sum: |p| >= |s|
        q = p + s;
        let lo2 = s - (q - p);
        if lo2 != 0.0 {
            out.push(lo2);
        }
    }
    if q != 0.0 || out.is_empty() {
        out.push(q);
    }
}

/// Expansion times expansion, accumulated one scaled row at a time.
/// Output length is at most `2 * e.len() * f.len()`.
pub fn big_prod(e: &[f64], f: &[f64], out: &mut Vec<f64>) {
    out.clear();
    let mut row = Vec::new();
    let mut acc = Vec::new();
    for &term in f {
        small_prod(e, term, &mut row);
        let mut merged = Vec::new();
        big_sum(&acc, &row, &mut merged);
        acc = merged;
    }
    out.extend_from_slice(&acc);
}

/// Signed estimate of an expansion; zero only if the expansion is zero.
#[inline]
pub fn estimate(e: &[f64]) -> f64 {
    let mut q = 0.0;
    for &term in e {
        q += term;
    }
    q
}

/// Sign of `(ax2-ax1, ay2-ay1) × (bx2-bx1, by2-by1)`, exact for all
/// finite inputs. The magnitude is only meaningful on the fast paths.
#[allow(clippy::too_many_arguments)]
pub fn perp_dot_sign(
    ax1: f64,
    ay1: f64,
    ax2: f64,
    ay2: f64,
    bx1: f64,
    by1: f64,
    bx2: f64,
    by2: f64,
) -> f64 {
    let adx = ax2 - ax1;
    let ady = ay2 - ay1;
    let bdx = bx2 - bx1;
    let bdy = by2 - by1;

    let t1 = adx * bdy;
    let t2 = ady * bdx;
    let det = t1 - t2;

    // Opposite (or zero) operand signs make the subtraction exact.
    if t1 > 0.0 {
        if t2 <= 0.0 {
            return det;
        }
    } else if t1 < 0.0 {
        if t2 >= 0.0 {
            return det;
        }
    } else {
        return det;
    }

    let det_sum = t1.abs() + t2.abs();
    if det.abs() >= det_sum * PERP_ERR_BOUND_1 {
        return det;
    }

    // Refine with the exact products of the rounded differences.
    let t1_lo = two_product_lo(adx, bdy, t1);
    let t2_lo = two_product_lo(ady, bdx, t2);
    let x = two_two_diff(t1, t1_lo, t2, t2_lo);
    let refined = estimate(&x);
    let diffs_exact = two_diff_lo(ax2, ax1, adx) == 0.0
        && two_diff_lo(ay2, ay1, ady) == 0.0
        && two_diff_lo(bx2, bx1, bdx) == 0.0
        && two_diff_lo(by2, by1, bdy) == 0.0;
    if diffs_exact || refined.abs() >= det_sum * PERP_ERR_BOUND_2 {
        return refined;
    }

    let mut exact = Vec::new();
    perp_dot_exact(ax1, ay1, ax2, ay2, bx1, by1, bx2, by2, &mut exact);
    estimate(&exact)
}

/// Exact perp-dot as an expansion (at most 16 components).
#[allow(clippy::too_many_arguments)]
pub fn perp_dot_exact(
    ax1: f64,
    ay1: f64,
    ax2: f64,
    ay2: f64,
    bx1: f64,
    by1: f64,
    bx2: f64,
    by2: f64,
    out: &mut Vec<f64>,
) {
    let adx = ax2 - ax1;
    let adx_lo = two_diff_lo(ax2, ax1, adx);
    let ady = ay2 - ay1;
    let ady_lo = two_diff_lo(ay2, ay1, ady);
    let bdx = bx2 - bx1;
    let bdx_lo = two_diff_lo(bx2, bx1, bdx);
    let bdy = by2 - by1;
    let bdy_lo = two_diff_lo(by2, by1, bdy);

    let mut left = Vec::new();
    big_prod(&[adx_lo, adx], &[bdy_lo, bdy], &mut left);
    let mut right = Vec::new();
    big_prod(&[ady_lo, ady], &[bdx_lo, bdx], &mut right);
    for term in &mut right {
        *term = -*term;
    }
    big_sum(&left, &right, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_sum_recovers_roundoff() {
        let a = 1.0;
        let b = 1e-30;
        let hi = a + b;
        let lo = two_sum_lo(a, b, hi);
        assert_eq!(hi, 1.0);
        assert_eq!(lo, 1e-30);
    }

    #[test]
    fn two_product_recovers_roundoff() {
        let a = 1.0 + f64::EPSILON;
        let b = 1.0 + f64::EPSILON;
        let hi = a * b;
        let lo = two_product_lo(a, b, hi);
        // a*b = 1 + 2eps + eps^2; the eps^2 term is the roundoff.
        assert_eq!(lo, f64::EPSILON * f64::EPSILON);
    }

    #[test]
    fn big_sum_merges_and_strips_zeros() {
        let mut out = Vec::new();
        big_sum(&[1e-30, 1.0], &[-1.0], &mut out);
        assert_eq!(out, vec![1e-30]);
        big_sum(&[1.0], &[-1.0], &mut out);
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn small_prod_exact_value() {
        let mut out = Vec::new();
        small_prod(&[1e-30, 1.0], 3.0, &mut out);
        let total = estimate(&out);
        assert_eq!(total, 3.0 + 3e-30);
    }

    #[test]
    fn perp_dot_sign_simple_orientations() {
        // Left turn.
        assert!(perp_dot_sign(0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0) > 0.0);
        // Right turn.
        assert!(perp_dot_sign(0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0) < 0.0);
        // Collinear.
        assert_eq!(perp_dot_sign(0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 2.0, 2.0), 0.0);
    }

    #[test]
    fn perp_dot_sign_near_collinear() {
        // Points on the line y = x, with one nudged by a single ulp.
        let base = perp_dot_sign(0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 3.0, 3.0);
        assert_eq!(base, 0.0);
        let nudged_up = 3.0 + f64::EPSILON * 4.0;
        let s = perp_dot_sign(0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 3.0, nudged_up);
        assert!(s > 0.0, "expected positive, got {}", s);
        let nudged_down = 3.0 - f64::EPSILON * 4.0;
        let s = perp_dot_sign(0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 3.0, nudged_down);
        assert!(s < 0.0, "expected negative, got {}", s);
    }

    #[test]
    fn perp_dot_exact_matches_sign() {
        let mut out = Vec::new();
        perp_dot_exact(0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 2.0, 2.0, &mut out);
        assert_eq!(estimate(&out), 0.0);
        perp_dot_exact(0.5, 0.5, 1.5, 1.0, 0.25, 0.0, 0.75, 2.0, &mut out);
        let exact = estimate(&out);
        let plain = (1.5 - 0.5) * (2.0 - 0.0) - (1.0 - 0.5) * (0.75 - 0.25);
        assert_eq!(exact, plain);
    }

    #[test]
    fn exact_expansion_idempotent() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        perp_dot_exact(0.1, 0.2, 0.3, 0.7, 0.1, 0.2, 1e-9, 0.4, &mut a);
        perp_dot_exact(0.1, 0.2, 0.3, 0.7, 0.1, 0.2, 1e-9, 0.4, &mut b);
        assert_eq!(a, b);
    }
}
