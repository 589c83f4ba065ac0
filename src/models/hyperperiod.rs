//! Hyperperiod arithmetic.
//!
//! The hyperperiod of a scheduling group is the least common multiple of
//! its task periods: the interval after which the cyclic schedule repeats.
//!
//! # Reference
//! Buttazzo (2011), "Hard Real-Time Computing Systems", Ch. 4.2

/// Greatest common divisor (Euclid).
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Least common multiple, `None` on overflow.
///
/// `lcm(a, 0)` and `lcm(0, b)` are 0 by convention.
pub fn lcm(a: u64, b: u64) -> Option<u64> {
    if a == 0 || b == 0 {
        return Some(0);
    }
    (a / gcd(a, b)).checked_mul(b)
}

/// Hyperperiod of a set of periods.
///
/// Pairwise LCM folded left to right. LCM is associative and commutative,
/// so the result does not depend on input order.
///
/// Returns `None` when `periods` is empty, contains a zero period, or the
/// result does not fit in a `u64`.
pub fn hyperperiod(periods: &[u64]) -> Option<u64> {
    let (&first, rest) = periods.split_first()?;
    if first == 0 {
        return None;
    }
    rest.iter().try_fold(first, |acc, &p| {
        if p == 0 {
            None
        } else {
            lcm(acc, p)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(7, 5), 1);
        assert_eq!(gcd(0, 9), 9);
        assert_eq!(gcd(9, 0), 9);
    }

    #[test]
    fn test_lcm() {
        assert_eq!(lcm(4, 6), Some(12));
        assert_eq!(lcm(5, 7), Some(35));
        assert_eq!(lcm(u64::MAX, u64::MAX - 1), None);
    }

    #[test]
    fn test_hyperperiod_basic() {
        assert_eq!(hyperperiod(&[5, 7]), Some(35));
        assert_eq!(hyperperiod(&[100]), Some(100));
        assert_eq!(hyperperiod(&[10, 20, 40]), Some(40));
        assert_eq!(hyperperiod(&[2, 3, 4, 5, 6]), Some(60));
    }

    #[test]
    fn test_hyperperiod_order_independent() {
        assert_eq!(hyperperiod(&[6, 4, 10]), hyperperiod(&[10, 6, 4]));
        assert_eq!(hyperperiod(&[6, 4, 10]), Some(60));
    }

    #[test]
    fn test_hyperperiod_degenerate() {
        assert_eq!(hyperperiod(&[]), None);
        assert_eq!(hyperperiod(&[0, 5]), None);
        assert_eq!(hyperperiod(&[5, 0]), None);
    }

    #[test]
    fn test_hyperperiod_overflow() {
        let primes = [
            1_000_000_007u64,
            998_244_353,
            1_000_000_009,
        ];
        assert_eq!(hyperperiod(&primes), None);
    }
}
