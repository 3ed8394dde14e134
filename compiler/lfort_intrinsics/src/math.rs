//! Special functions used when folding calls with constant arguments.
//!
//! The standard library has no gamma or error function, so they are
//! computed here to double precision.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Lanczos series sum and the shifted base `t = x + g + 0.5` for `x >= 0.5`
/// (already decremented by one).
fn lanczos(x: f64) -> (f64, f64) {
    let x = x - 1.0;
    let mut sum = LANCZOS[0];
    for (i, c) in LANCZOS.iter().enumerate().skip(1) {
        #[allow(clippy::cast_precision_loss)]
        let i = i as f64;
        sum += c / (x + i);
    }
    (sum, x + LANCZOS_G + 0.5)
}

/// Gamma function.
pub fn gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection: Γ(x)Γ(1-x) = π / sin(πx)
        return PI / ((PI * x).sin() * gamma(1.0 - x));
    }
    let (sum, t) = lanczos(x);
    (2.0 * PI).sqrt() * t.powf(x - 0.5) * (-t).exp() * sum
}

/// Natural log of |Γ(x)|.
pub fn log_gamma(x: f64) -> f64 {
    if x < 0.5 {
        return (PI / (PI * x).sin().abs()).ln() - log_gamma(1.0 - x);
    }
    let (sum, t) = lanczos(x);
    0.5 * (2.0 * PI).ln() + (x - 0.5) * t.ln() - t + sum.ln()
}

/// Error function.
pub fn erf(x: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    if x.abs() >= 3.0 {
        return x.signum() * (1.0 - erfc_continued_fraction(x.abs()));
    }
    // (2/√π) e^{-x²} Σ 2ⁿ x^{2n+1} / (1·3·…·(2n+1))
    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    let mut n = 0.0;
    while term.abs() > 1e-17 * sum.abs() {
        n += 1.0;
        term *= 2.0 * x2 / (2.0 * n + 1.0);
        sum += term;
    }
    2.0 / PI.sqrt() * (-x2).exp() * sum
}

/// Complementary error function.
pub fn erfc(x: f64) -> f64 {
    if x >= 3.0 {
        erfc_continued_fraction(x)
    } else {
        1.0 - erf(x)
    }
}

/// `erfc(x)` for `x >= 3` via the Laplace continued fraction, evaluated
/// from the tail.
fn erfc_continued_fraction(x: f64) -> f64 {
    let mut f = x;
    for k in (1..=60).rev() {
        f = x + f64::from(k) / 2.0 / f;
    }
    (-x * x).exp() / (PI.sqrt() * f)
}

/// Complex number arithmetic for folding complex-valued intrinsics.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const fn new(re: f64, im: f64) -> Self {
        Complex { re, im }
    }

    pub fn abs(self) -> f64 {
        self.re.hypot(self.im)
    }

    pub fn conj(self) -> Self {
        Complex::new(self.re, -self.im)
    }

    fn mul(self, o: Self) -> Self {
        Complex::new(
            self.re * o.re - self.im * o.im,
            self.re * o.im + self.im * o.re,
        )
    }

    fn div(self, o: Self) -> Self {
        let d = o.re * o.re + o.im * o.im;
        Complex::new(
            (self.re * o.re + self.im * o.im) / d,
            (self.im * o.re - self.re * o.im) / d,
        )
    }

    pub fn exp(self) -> Self {
        let m = self.re.exp();
        Complex::new(m * self.im.cos(), m * self.im.sin())
    }

    pub fn ln(self) -> Self {
        Complex::new(self.abs().ln(), self.im.atan2(self.re))
    }

    pub fn sqrt(self) -> Self {
        let r = self.abs();
        let re = ((r + self.re) / 2.0).sqrt();
        let im = ((r - self.re) / 2.0).sqrt().copysign(self.im);
        Complex::new(re, im)
    }

    pub fn sin(self) -> Self {
        Complex::new(
            self.re.sin() * self.im.cosh(),
            self.re.cos() * self.im.sinh(),
        )
    }

    pub fn cos(self) -> Self {
        Complex::new(
            self.re.cos() * self.im.cosh(),
            -self.re.sin() * self.im.sinh(),
        )
    }

    pub fn tan(self) -> Self {
        self.sin().div(self.cos())
    }

    pub fn sinh(self) -> Self {
        Complex::new(
            self.re.sinh() * self.im.cos(),
            self.re.cosh() * self.im.sin(),
        )
    }

    pub fn cosh(self) -> Self {
        Complex::new(
            self.re.cosh() * self.im.cos(),
            self.re.sinh() * self.im.sin(),
        )
    }

    pub fn tanh(self) -> Self {
        self.sinh().div(self.cosh())
    }

    /// `z * z`.
    pub fn square(self) -> Self {
        self.mul(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * b.abs().max(1.0)
    }

    #[test]
    fn gamma_matches_factorials() {
        let mut fact = 1.0;
        for n in 1..15 {
            assert!(close(gamma(f64::from(n)), fact), "gamma({n})");
            fact *= f64::from(n);
        }
        assert!(close(gamma(0.5), PI.sqrt()));
        assert!(close(gamma(-0.5), -2.0 * PI.sqrt()));
    }

    #[test]
    fn log_gamma_of_large_argument() {
        assert!(close(log_gamma(10.0), 362_880.0_f64.ln()));
        assert!(close(log_gamma(1.0), 0.0));
    }

    #[test]
    fn erf_known_values() {
        assert!(close(erf(0.0), 0.0));
        assert!(close(erf(1.0), 0.842_700_792_949_714_9));
        assert!(close(erf(-1.0), -0.842_700_792_949_714_9));
        assert!(close(erf(3.5), 0.999_999_256_901_627_7));
        assert!(close(erfc(0.5), 0.479_500_122_186_953_5));
        assert!((erfc(5.0) - 1.537_459_794_428_035e-12).abs() < 1e-24);
    }

    #[test]
    fn complex_identities() {
        let z = Complex::new(0.3, -1.2);
        let back = z.ln().exp();
        assert!(close(back.re, z.re) && close(back.im, z.im));
        let s = z.sqrt().square();
        assert!(close(s.re, z.re) && close(s.im, z.im));
        let one = z.sin().square().re + z.cos().square().re;
        assert!(close(one, 1.0));
    }
}
