//! Search algorithms for finding events and extrema in time-dependent functions
//!
//! Provides:
//! - [`find_discrete`]: find times when a discrete function changes value
//! - [`bisect_transition`]: refine a single bracketed transition
//! - [`refine_maximum`]: locate the maximum of a unimodal function in a bracket
//!
//! All times are Julian dates. The refinement routines accept fallible
//! closures so that propagation errors surface instead of being guessed away.

use crate::constants::DAY_S;

/// Default epsilon for discrete event finding (0.01 seconds in days)
pub const EPSILON_DISCRETE: f64 = 0.01 / DAY_S;

/// Golden ratio conjugate used by the section search
const INV_PHI: f64 = 0.618_033_988_749_894_8;

/// Sample times from `jd_start` to `jd_end` inclusive at a fixed step.
///
/// The final interval is shortened so the end time is always sampled.
pub fn sample_times(jd_start: f64, jd_end: f64, step_days: f64) -> Vec<f64> {
    if jd_end <= jd_start || step_days <= 0.0 {
        return vec![jd_start];
    }
    let count = ((jd_end - jd_start) / step_days).ceil() as usize;
    let mut times: Vec<f64> = (0..count)
        .map(|i| jd_start + step_days * i as f64)
        .collect();
    times.push(jd_end);
    times
}

/// Find times at which a discrete function of time changes value.
///
/// The function is sampled every `step_days`; every bracket whose endpoints
/// disagree is bisected until narrower than `epsilon`. Changes that happen
/// and revert within one step are missed, so the step must be shorter than
/// the briefest state of interest.
///
/// # Returns
/// Vector of `(jd, new_value)` pairs, one per transition, in time order
pub fn find_discrete<F>(
    jd_start: f64,
    jd_end: f64,
    step_days: f64,
    epsilon: f64,
    mut f: F,
) -> Vec<(f64, i64)>
where
    F: FnMut(f64) -> i64,
{
    let times = sample_times(jd_start, jd_end, step_days);
    let values: Vec<i64> = times.iter().map(|&jd| f(jd)).collect();

    let mut transitions = Vec::new();
    for i in 0..values.len().saturating_sub(1) {
        if values[i] == values[i + 1] {
            continue;
        }
        let (mut lo, mut hi) = (times[i], times[i + 1]);
        let before = values[i];
        while hi - lo > epsilon {
            let mid = 0.5 * (lo + hi);
            if f(mid) == before {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        transitions.push((hi, f(hi)));
    }
    transitions
}

/// Bisect a bracket `[lo, hi]` across which a predicate flips.
///
/// `f(lo)` is assumed to differ from `f(hi)`. Returns the narrowed bracket
/// `(lo, hi)` where `hi - lo <= epsilon` and the endpoints still disagree.
pub fn bisect_transition<F, E>(
    mut lo: f64,
    mut hi: f64,
    epsilon: f64,
    mut f: F,
) -> Result<(f64, f64), E>
where
    F: FnMut(f64) -> Result<bool, E>,
{
    let at_lo = f(lo)?;
    while hi - lo > epsilon {
        let mid = 0.5 * (lo + hi);
        if f(mid)? == at_lo {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok((lo, hi))
}

/// Locate the maximum of a unimodal function within `[lo, hi]` by golden
/// section search.
///
/// Returns `(jd, value)` of the best point seen, which is never worse than
/// either endpoint.
pub fn refine_maximum<F, E>(lo: f64, hi: f64, epsilon: f64, mut f: F) -> Result<(f64, f64), E>
where
    F: FnMut(f64) -> Result<f64, E>,
{
    let (mut a, mut b) = (lo, hi);
    let mut best = (a, f(a)?);
    let at_b = f(b)?;
    if at_b > best.1 {
        best = (b, at_b);
    }

    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = f(c)?;
    let mut fd = f(d)?;

    while b - a > epsilon {
        if fc >= fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = f(c)?;
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = f(d)?;
        }
    }

    for candidate in [(c, fc), (d, fd)] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::convert::Infallible;
    use std::f64::consts::PI;

    #[test]
    fn test_sample_times_includes_end() {
        let v = sample_times(0.0, 1.0, 0.3);
        assert_eq!(v.len(), 5);
        assert_relative_eq!(v[0], 0.0);
        assert_relative_eq!(v[3], 0.9, epsilon = 1e-12);
        assert_relative_eq!(v[4], 1.0);
    }

    #[test]
    fn test_sample_times_degenerate() {
        assert_eq!(sample_times(5.0, 5.0, 1.0), vec![5.0]);
    }

    #[test]
    fn test_find_discrete_step_function() {
        // sign(sin(x)) transitions at multiples of pi
        let results = find_discrete(0.1, 4.0 * PI, 0.1, 1e-9, |x| {
            if x.sin() > 0.0 {
                1
            } else {
                0
            }
        });

        assert_eq!(results.len(), 3);
        for (i, (x, value)) in results.iter().enumerate() {
            assert_relative_eq!(*x, (i + 1) as f64 * PI, epsilon = 1e-6);
            assert_eq!(*value, if i % 2 == 0 { 0 } else { 1 });
        }
    }

    #[test]
    fn test_find_discrete_no_transitions() {
        let results = find_discrete(0.0, 10.0, 1.0, EPSILON_DISCRETE, |_| 1);
        assert!(results.is_empty());
    }

    #[test]
    fn test_bisect_transition_brackets_root() {
        let (lo, hi) =
            bisect_transition(0.0, 2.0, 1e-10, |x| Ok::<_, Infallible>(x * x >= 2.0)).unwrap();
        assert!(lo * lo < 2.0);
        assert!(hi * hi >= 2.0);
        assert_relative_eq!(hi, 2.0_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_bisect_transition_propagates_errors() {
        let result = bisect_transition(0.0, 1.0, 1e-6, |x| {
            if x > 0.25 {
                Err("boom")
            } else {
                Ok(false)
            }
        });
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn test_refine_maximum_sin() {
        let (x, y) =
            refine_maximum(0.0, PI, 1e-9, |x: f64| Ok::<_, Infallible>(x.sin())).unwrap();
        assert_relative_eq!(x, PI / 2.0, epsilon = 1e-6);
        assert_relative_eq!(y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_refine_maximum_at_edge() {
        // Monotonic function peaks at the right-hand bracket edge
        let (x, y) = refine_maximum(0.0, 1.0, 1e-9, |x: f64| Ok::<_, Infallible>(x)).unwrap();
        assert_relative_eq!(x, 1.0);
        assert_relative_eq!(y, 1.0);
    }
}
