//! Special functions and the distribution tails used by the study
//!
//! - log-gamma (Lanczos)
//! - regularized incomplete beta (Lentz continued fraction)
//! - Student-t two-sided tail, binomial upper tail, beta quantile

/// Natural log of the gamma function, x > 0
pub fn ln_gamma(x: f64) -> f64 {
    const COEF: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.001_208_650_973_866_179,
        -0.000_005_395_239_384_953,
    ];

    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000_000_000_190_015;
    for c in COEF {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

/// Regularized incomplete beta I_x(a, b)
pub fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fast for x < (a+1)/(a+b+2)
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-14;
    const FPMIN: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// P(|T| >= |t|) for Student's t with `df` degrees of freedom
pub fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return if t.is_nan() { f64::NAN } else { 0.0 };
    }
    incomplete_beta(0.5 * df, 0.5, df / (df + t * t)).clamp(0.0, 1.0)
}

/// P(X >= k) for X ~ Binomial(n, p)
pub fn binomial_upper_tail(k: usize, n: usize, p: f64) -> f64 {
    if k == 0 {
        return 1.0;
    }
    if k > n {
        return 0.0;
    }
    incomplete_beta(k as f64, (n - k + 1) as f64, p).clamp(0.0, 1.0)
}

/// Quantile of Beta(a, b) by bisection on the incomplete beta
pub fn beta_quantile(p: f64, a: f64, b: f64) -> f64 {
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }
    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if incomplete_beta(a, b, mid) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Exact (Clopper–Pearson) confidence interval for `successes` out of `n`
pub fn clopper_pearson(successes: usize, n: usize, confidence: f64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 1.0);
    }
    let alpha = 1.0 - confidence;
    let k = successes as f64;
    let n_f = n as f64;

    let lower = if successes == 0 {
        0.0
    } else {
        beta_quantile(alpha / 2.0, k, n_f - k + 1.0)
    };
    let upper = if successes >= n {
        1.0
    } else {
        beta_quantile(1.0 - alpha / 2.0, k + 1.0, n_f - k)
    };
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_ln_gamma() {
        assert!(close(ln_gamma(1.0), 0.0, 1e-9));
        assert!(close(ln_gamma(5.0), 24.0f64.ln(), 1e-9));
        assert!(close(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), 1e-9));
    }

    #[test]
    fn test_incomplete_beta() {
        // I_x(1, 1) = x
        assert!(close(incomplete_beta(1.0, 1.0, 0.3), 0.3, 1e-8));
        // I_x(2, 1) = x^2
        assert!(close(incomplete_beta(2.0, 1.0, 0.6), 0.36, 1e-8));
        // symmetry
        let v = incomplete_beta(2.5, 4.0, 0.35);
        assert!(close(v, 1.0 - incomplete_beta(4.0, 2.5, 0.65), 1e-8));
    }

    #[test]
    fn test_student_t() {
        assert!(close(student_t_two_sided(0.0, 10.0), 1.0, 1e-12));
        // t_{0.975, 10} = 2.228139
        assert!(close(student_t_two_sided(2.228139, 10.0), 0.05, 1e-5));
        // t_{0.975, 30} = 2.042272
        assert!(close(student_t_two_sided(-2.042272, 30.0), 0.05, 1e-5));
        assert_eq!(student_t_two_sided(f64::INFINITY, 5.0), 0.0);
    }

    #[test]
    fn test_binomial_upper_tail() {
        // P(X >= 1) for Bin(3, 0.5) = 7/8
        assert!(close(binomial_upper_tail(1, 3, 0.5), 0.875, 1e-8));
        // P(X >= 3) = 1/8
        assert!(close(binomial_upper_tail(3, 3, 0.5), 0.125, 1e-8));
        assert_eq!(binomial_upper_tail(0, 3, 0.5), 1.0);
        assert_eq!(binomial_upper_tail(4, 3, 0.5), 0.0);
    }

    #[test]
    fn test_clopper_pearson() {
        let (lo, hi) = clopper_pearson(50, 100, 0.95);
        // binom.test(50, 100): 0.3983, 0.6017
        assert!(close(lo, 0.3983, 1e-3));
        assert!(close(hi, 0.6017, 1e-3));

        let (lo, hi) = clopper_pearson(10, 10, 0.95);
        assert!(close(lo, 0.6915, 1e-3));
        assert_eq!(hi, 1.0);
    }
}
