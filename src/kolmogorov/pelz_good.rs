//! Pelz-Good asymptotic expansion
//!
//! `P(D_n <= x) ~ K0(z) + K1(z)/n^(1/2) + K2(z)/n + K3(z)/n^(3/2)` with
//! `z = sqrt(n) x` (Pelz & Good, 1976).

use std::f64::consts::PI;

use super::Tail;

const PI_SQUARED: f64 = PI * PI;
const PI_FOUR: f64 = PI_SQUARED * PI_SQUARED;
const PI_SIX: f64 = PI_FOUR * PI_SQUARED;
const MIN_LOG: f64 = -708.0;

pub(crate) fn pelz_good(n: u64, x: f64, tail: Tail) -> f64 {
    let (below, above) = match tail {
        Tail::Lower => (0.0, 1.0),
        Tail::Upper => (1.0, 0.0),
    };
    if x <= 0.0 {
        return below;
    }
    if x >= 1.0 {
        return above;
    }

    let sqrt_2pi = (2.0 * PI).sqrt();
    let nf = n as f64;
    let z = nf.sqrt() * x;
    let z2 = z * z;
    let z3 = z2 * z;
    let z4 = z2 * z2;
    let z6 = z4 * z2;

    let q_log = -PI_SQUARED / 8.0 / z2;
    if q_log < MIN_LOG {
        return below;
    }
    let q = q_log.exp();

    let k1a = -z2;
    let k1b = PI_SQUARED / 4.0;

    let k2a = 6.0 * z6 + 2.0 * z4;
    let k2b = (2.0 * z4 - 5.0 * z2) * PI_SQUARED / 4.0;
    let k2c = PI_FOUR * (1.0 - 2.0 * z2) / 16.0;

    let k3d = PI_SIX * (5.0 - 30.0 * z2) / 64.0;
    let k3c = PI_FOUR * (-60.0 * z2 + 212.0 * z4) / 16.0;
    let k3b = PI_SQUARED * (135.0 * z4 - 96.0 * z6) / 4.0;
    let k3a = -30.0 * z6 - 90.0 * z4 * z4;

    // Horner over odd m = 2k - 1: q^(m^2) steps by q^(8k)
    let max_k = (16.0 * z / PI).ceil() as u32;
    let mut terms = [0.0_f64; 4];
    for k in (1..=max_k).rev() {
        let m = f64::from(2 * k - 1);
        let m2 = m * m;
        let m4 = m2 * m2;
        let m6 = m4 * m2;
        let q_power = q.powi(8 * k as i32);
        let coeffs = [
            1.0,
            k1a + k1b * m2,
            k2a + k2b * m2 + k2c * m4,
            k3a + k3b * m2 + k3c * m4 + k3d * m6,
        ];
        for (term, c) in terms.iter_mut().zip(coeffs) {
            *term = *term * q_power + c;
        }
    }
    let denominators = [z, 6.0 * z4, 72.0 * z6 * z, 6480.0 * z6 * z4];
    for (term, den) in terms.iter_mut().zip(denominators) {
        *term *= q * sqrt_2pi / den;
    }

    // Extra sums over all k for K2 and K3
    let q = (-PI_SQUARED / 2.0 / z2).exp();
    let sqrt3_z = 3f64.sqrt() * z;
    let mut k2_extra = 0.0;
    let mut k3_extra = 0.0;
    for k in (1..=max_k).rev() {
        let kf = f64::from(k);
        let k_squared = kf * kf;
        let q_power = q.powf(k_squared);
        let k_pi = PI * kf;
        k2_extra += k_squared * q_power;
        k3_extra += (sqrt3_z + k_pi) * (sqrt3_z - k_pi) * k_squared * q_power;
    }
    terms[2] += k2_extra * PI_SQUARED * sqrt_2pi / (-36.0 * z3);
    terms[3] += k3_extra * PI_SQUARED * sqrt_2pi / (216.0 * z6);

    for (i, term) in terms.iter_mut().enumerate() {
        *term /= nf.powf(i as f64 / 2.0);
    }

    if tail == Tail::Upper {
        for term in terms.iter_mut() {
            *term = -*term;
        }
        terms[0] += 1.0;
    }

    terms.iter().sum()
}
