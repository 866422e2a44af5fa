//! Pomeranz recursion
//!
//! Each of the `2n + 1` rows is the previous row convolved with one of three
//! truncated Poisson weight sequences; `P(D_n <= d) = n! * V[2n+1][n]`.
//! Only a short contiguous window of each row can be non-zero, so two
//! windowed rows are kept and swapped.

use super::{scale_by_pow2, SCALE_DOWN, SCALE_EXPONENT, SCALE_UP};

/// Shape of the non-zero window shared by every row
#[derive(Debug, Clone, Copy)]
struct Window {
    n: i64,
    floor_t: i64,
    ceil_frac: i64,
    round_frac: i64,
}

impl Window {
    /// Inclusive column bounds `[j1, j2]` of row `i`
    fn bounds(&self, i: i64) -> (i64, i64) {
        let Window {
            n,
            floor_t: ll,
            ceil_frac,
            round_frac,
        } = *self;

        let (j1, j2) = if i == 0 {
            (-ll - ceil_frac - 1, ll + ceil_frac - 1)
        } else {
            let half = (i + 1) / 2;
            if (i + 1) % 2 == 0 {
                if half == n + 1 {
                    (n - ll - ceil_frac - 1, n + ll + ceil_frac - 1)
                } else {
                    (half - 2 - ll - round_frac, half + ll + ceil_frac - 2)
                }
            } else {
                (half - 2 - ll, half + ll + round_frac - 1)
            }
        };

        ((j1 + 2).max(0), j2.min(n))
    }
}

/// `P(D_n <= d)` by the Pomeranz recursion
pub(crate) fn pomeranz_cdf(n: u64, d: f64) -> f64 {
    let nf = n as f64;
    let t = nf * d;
    let floor_t = t.floor();
    let frac = t - floor_t;
    let g = frac.min(1.0 - frac);

    let window = Window {
        n: n as i64,
        floor_t: floor_t as i64,
        ceil_frac: i64::from(frac > 0.0),
        round_frac: i64::from(frac > 0.5),
    };

    // (g/n)^m/m!, (2g/n)^m/m! and ((1-2g)/n)^m/m!
    let powers = 2 * (window.floor_t as usize + 1);
    let mut g_power = vec![1.0; powers];
    let mut two_g_power = vec![1.0; powers];
    let mut one_minus_two_g_power = vec![1.0; powers];
    let (g_n, two_g_n, one_minus_two_g_n) = (g / nf, 2.0 * g / nf, (1.0 - 2.0 * g) / nf);
    for m in 1..powers {
        let mf = m as f64;
        g_power[m] = g_power[m - 1] * g_n / mf;
        two_g_power[m] = two_g_power[m - 1] * two_g_n / mf;
        one_minus_two_g_power[m] = one_minus_two_g_power[m - 1] * one_minus_two_g_n / mf;
    }

    let mut previous = vec![0.0; powers];
    let mut current = vec![0.0; powers];
    current[0] = 1.0;
    let mut previous_start: i64 = 0;
    let mut current_start: i64 = 0;
    let mut exponent: i64 = 0;

    let last_row = 2 * window.n + 1;
    let (mut j1, _) = window.bounds(0);
    for i in 1..=last_row {
        let k1 = j1;
        std::mem::swap(&mut previous, &mut current);
        std::mem::swap(&mut previous_start, &mut current_start);
        current.fill(0.0);

        let (next_j1, j2) = window.bounds(i);
        j1 = next_j1;

        let weights = if i == 1 || i == last_row {
            &g_power
        } else if i % 2 == 1 {
            &two_g_power
        } else {
            &one_minus_two_g_power
        };

        let span = j2 - k1 + 1;
        if span <= 0 {
            continue;
        }
        let span = span as usize;
        let source = (k1 - previous_start) as usize;
        let skip = (j1 - k1) as usize;
        let len = (j2 - j1 + 1) as usize;

        // Entries skip..skip+len of the full convolution of the previous
        // window with the first `span` weights.
        for (idx, slot) in current.iter_mut().take(len).enumerate() {
            let c = skip + idx;
            let lo = c.saturating_sub(span - 1);
            let hi = c.min(span - 1);
            *slot = (lo..=hi)
                .map(|a| previous[source + a] * weights[c - a])
                .sum();
        }

        let max = current.iter().copied().fold(0.0_f64, f64::max);
        if max > 0.0 && max < SCALE_DOWN {
            for v in current.iter_mut() {
                *v *= SCALE_UP;
            }
            exponent -= SCALE_EXPONENT;
        }
        current_start = previous_start + j1 - k1;
    }

    let mut answer = current[(window.n - current_start) as usize];
    for m in 1..=n {
        if answer.abs() > SCALE_UP {
            answer *= SCALE_DOWN;
            exponent += SCALE_EXPONENT;
        }
        answer *= m as f64;
    }

    scale_by_pow2(answer, exponent).clamp(0.0, 1.0)
}
