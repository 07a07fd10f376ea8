//! Number representations the recursion can run in.
//!
//! The subset recursion only needs a ring: products of Boltzmann factors,
//! accumulated sums and differences, and a final scaling. Each strategy below
//! supplies those operations for one value type, so the same recursion yields a
//! plain `f64` sum, an extended-precision sum, a truncated polynomial in a
//! channel variable, or a vector of temperature derivatives.

use std::f64::consts::LOG2_10;
use std::fmt;

use astro_float::{BigFloat, RoundingMode, Sign};

use crate::bonds::{ChannelBond, PairBond};
use crate::subset::pair_count;

/// Ring operations on the values stored in the recursion workspace.
pub trait Arithmetic {
    /// Bond type this strategy reads from a configuration.
    type Bond: PairBond;
    type Value: Clone + fmt::Debug;

    fn zero(&self) -> Self::Value;

    fn one(&self) -> Self::Value;

    /// Boltzmann factor `q = f + 1` of a pair.
    fn boltzmann(&self, bond: &Self::Bond) -> Self::Value;

    /// Value of a plain Boltzmann factor `q`, used for non-additive corrections.
    fn boltzmann_factor(&self, q: f64) -> Self::Value;

    fn is_zero(&self, x: &Self::Value) -> bool;

    fn is_finite(&self, x: &Self::Value) -> bool;

    fn mul_assign(&self, acc: &mut Self::Value, x: &Self::Value);

    fn add_assign(&self, acc: &mut Self::Value, x: &Self::Value);

    fn sub_assign(&self, acc: &mut Self::Value, x: &Self::Value);

    /// `acc += a * b`
    fn add_product(&self, acc: &mut Self::Value, a: &Self::Value, b: &Self::Value);

    /// `acc -= a * b`
    fn sub_product(&self, acc: &mut Self::Value, a: &Self::Value, b: &Self::Value);

    fn scale(&self, x: &Self::Value, factor: f64) -> Self::Value;
}

/// Double-precision arithmetic on Mayer bonds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Plain;

impl Arithmetic for Plain {
    type Bond = f64;
    type Value = f64;

    fn zero(&self) -> f64 {
        0.0
    }

    fn one(&self) -> f64 {
        1.0
    }

    fn boltzmann(&self, bond: &f64) -> f64 {
        bond + 1.0
    }

    fn boltzmann_factor(&self, q: f64) -> f64 {
        q
    }

    fn is_zero(&self, x: &f64) -> bool {
        *x == 0.0
    }

    fn is_finite(&self, x: &f64) -> bool {
        x.is_finite()
    }

    fn mul_assign(&self, acc: &mut f64, x: &f64) {
        *acc *= x;
    }

    fn add_assign(&self, acc: &mut f64, x: &f64) {
        *acc += x;
    }

    fn sub_assign(&self, acc: &mut f64, x: &f64) {
        *acc -= x;
    }

    fn add_product(&self, acc: &mut f64, a: &f64, b: &f64) {
        *acc += a * b;
    }

    fn sub_product(&self, acc: &mut f64, a: &f64, b: &f64) {
        *acc -= a * b;
    }

    fn scale(&self, x: &f64, factor: f64) -> f64 {
        x * factor
    }
}

/// Extended-precision arithmetic for sums that cancel badly in `f64`.
///
/// Bonds are still read as `f64`; the Boltzmann factor `1 + f` is formed in
/// extended precision so small Mayer functions are not rounded away.
#[derive(Debug, Clone, PartialEq)]
pub struct Precise {
    precision: usize,
    rounding: RoundingMode,
}

impl Precise {
    /// Precision holding at least `digits` significant decimal digits.
    pub fn with_digits(digits: usize) -> Self {
        let bits = (digits.max(1) as f64 * LOG2_10).ceil() as usize;
        Self::with_bits(bits)
    }

    pub fn with_bits(bits: usize) -> Self {
        Precise {
            precision: bits.max(64),
            rounding: RoundingMode::ToEven,
        }
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn from_f64(&self, x: f64) -> BigFloat {
        BigFloat::from_f64(x, self.precision)
    }

    /// Nearest `f64` to `x`; overflow goes to infinity and underflow to zero.
    pub fn to_f64(&self, x: &BigFloat) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let negative = matches!(x.sign(), Some(Sign::Neg));
        if x.is_inf() {
            return if negative { f64::NEG_INFINITY } else { f64::INFINITY };
        }
        if x.is_zero() {
            return 0.0;
        }
        let mut rounded = x.clone();
        if rounded.set_precision(64, self.rounding).is_err() {
            return f64::NAN;
        }
        let (Some(words), Some(exponent)) = (rounded.mantissa_digits(), rounded.exponent()) else {
            return f64::NAN;
        };
        let Some(&top) = words.last() else {
            return 0.0;
        };
        // value is 0.m * 2^e with m the top mantissa word
        let fraction = top as f64 / 2f64.powi(Word::BITS as i32);
        let e = exponent as i32;
        let half = e / 2;
        let magnitude = fraction * 2f64.powi(half) * 2f64.powi(e - half);
        if negative {
            -magnitude
        } else {
            magnitude
        }
    }
}

type Word = astro_float::Word;

impl Arithmetic for Precise {
    type Bond = f64;
    type Value = BigFloat;

    fn zero(&self) -> BigFloat {
        self.from_f64(0.0)
    }

    fn one(&self) -> BigFloat {
        self.from_f64(1.0)
    }

    fn boltzmann(&self, bond: &f64) -> BigFloat {
        self.from_f64(*bond).add(&self.one(), self.precision, self.rounding)
    }

    fn boltzmann_factor(&self, q: f64) -> BigFloat {
        self.from_f64(q)
    }

    fn is_zero(&self, x: &BigFloat) -> bool {
        x.is_zero()
    }

    fn is_finite(&self, x: &BigFloat) -> bool {
        !x.is_nan() && !x.is_inf()
    }

    fn mul_assign(&self, acc: &mut BigFloat, x: &BigFloat) {
        *acc = acc.mul(x, self.precision, self.rounding);
    }

    fn add_assign(&self, acc: &mut BigFloat, x: &BigFloat) {
        *acc = acc.add(x, self.precision, self.rounding);
    }

    fn sub_assign(&self, acc: &mut BigFloat, x: &BigFloat) {
        *acc = acc.sub(x, self.precision, self.rounding);
    }

    fn add_product(&self, acc: &mut BigFloat, a: &BigFloat, b: &BigFloat) {
        let product = a.mul(b, self.precision, self.rounding);
        *acc = acc.add(&product, self.precision, self.rounding);
    }

    fn sub_product(&self, acc: &mut BigFloat, a: &BigFloat, b: &BigFloat) {
        let product = a.mul(b, self.precision, self.rounding);
        *acc = acc.sub(&product, self.precision, self.rounding);
    }

    fn scale(&self, x: &BigFloat, factor: f64) -> BigFloat {
        x.mul(&self.from_f64(factor), self.precision, self.rounding)
    }
}

/// Truncated polynomials in a channel variable `Y`.
///
/// Values are coefficient vectors of fixed length; products are convolutions
/// that drop every power at or beyond `len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channels {
    len: usize,
}

impl Channels {
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "at least one channel is required");
        Channels { len }
    }

    /// Enough channels that no power is truncated for `n` points (one per pair, plus `Y^0`).
    pub fn for_points(n: usize) -> Self {
        Self::new(1 + pair_count(n))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Evaluates a channel polynomial at `y`.
    pub fn evaluate(coefficients: &[f64], y: f64) -> f64 {
        coefficients.iter().rev().fold(0.0, |acc, &c| acc * y + c)
    }

    fn convolve_into(&self, acc: &mut [f64], a: &[f64], b: &[f64], sign: f64) {
        for k in 0..self.len {
            let mut sum = 0.0;
            for i in 0..=k {
                sum += a[i] * b[k - i];
            }
            acc[k] += sign * sum;
        }
    }
}

impl Arithmetic for Channels {
    type Bond = ChannelBond;
    type Value = Vec<f64>;

    fn zero(&self) -> Vec<f64> {
        vec![0.0; self.len]
    }

    fn one(&self) -> Vec<f64> {
        self.boltzmann_factor(1.0)
    }

    fn boltzmann(&self, bond: &ChannelBond) -> Vec<f64> {
        let mut q = bond.channels().to_vec();
        q.resize(self.len, 0.0);
        q
    }

    fn boltzmann_factor(&self, q: f64) -> Vec<f64> {
        let mut value = self.zero();
        value[0] = q;
        value
    }

    fn is_zero(&self, x: &Vec<f64>) -> bool {
        x.iter().all(|&c| c == 0.0)
    }

    fn is_finite(&self, x: &Vec<f64>) -> bool {
        x.iter().all(|c| c.is_finite())
    }

    fn mul_assign(&self, acc: &mut Vec<f64>, x: &Vec<f64>) {
        // highest power first so lower coefficients are still unmodified
        for k in (0..self.len).rev() {
            let mut sum = 0.0;
            for i in 0..=k {
                sum += acc[i] * x[k - i];
            }
            acc[k] = sum;
        }
    }

    fn add_assign(&self, acc: &mut Vec<f64>, x: &Vec<f64>) {
        acc.iter_mut().zip(x).for_each(|(a, b)| *a += b);
    }

    fn sub_assign(&self, acc: &mut Vec<f64>, x: &Vec<f64>) {
        acc.iter_mut().zip(x).for_each(|(a, b)| *a -= b);
    }

    fn add_product(&self, acc: &mut Vec<f64>, a: &Vec<f64>, b: &Vec<f64>) {
        self.convolve_into(acc, a, b, 1.0);
    }

    fn sub_product(&self, acc: &mut Vec<f64>, a: &Vec<f64>, b: &Vec<f64>) {
        self.convolve_into(acc, a, b, -1.0);
    }

    fn scale(&self, x: &Vec<f64>, factor: f64) -> Vec<f64> {
        x.iter().map(|c| c * factor).collect()
    }
}

/// Value and derivatives with respect to inverse temperature, up to `order`.
///
/// Entry `m` holds `d^m/dβ^m` of the quantity. A pair Boltzmann factor
/// `q = exp(-βu)` has derivatives `q (-u)^m` with `-u = ln(q) / β`; products
/// follow the Leibniz rule.
#[derive(Debug, Clone, PartialEq)]
pub struct BetaDerivatives {
    order: usize,
    beta: f64,
    binomial: Vec<Vec<f64>>,
}

impl BetaDerivatives {
    pub fn new(order: usize, beta: f64) -> Self {
        assert!(beta > 0.0, "inverse temperature must be positive, got {}", beta);
        BetaDerivatives {
            order,
            beta,
            binomial: binomial_rows(order),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    fn leibniz_into(&self, acc: &mut [f64], a: &[f64], b: &[f64], sign: f64) {
        for m in 0..=self.order {
            let row = &self.binomial[m];
            let mut sum = 0.0;
            for l in 0..=m {
                sum += row[l] * a[l] * b[m - l];
            }
            acc[m] += sign * sum;
        }
    }
}

impl Arithmetic for BetaDerivatives {
    type Bond = f64;
    type Value = Vec<f64>;

    fn zero(&self) -> Vec<f64> {
        vec![0.0; self.order + 1]
    }

    fn one(&self) -> Vec<f64> {
        let mut value = self.zero();
        value[0] = 1.0;
        value
    }

    fn boltzmann(&self, bond: &f64) -> Vec<f64> {
        self.boltzmann_factor(bond + 1.0)
    }

    fn boltzmann_factor(&self, q: f64) -> Vec<f64> {
        let mut value = self.zero();
        if q == 0.0 {
            return value;
        }
        let minus_u = q.ln() / self.beta;
        value[0] = q;
        for m in 1..=self.order {
            value[m] = value[m - 1] * minus_u;
        }
        value
    }

    fn is_zero(&self, x: &Vec<f64>) -> bool {
        x.iter().all(|&c| c == 0.0)
    }

    fn is_finite(&self, x: &Vec<f64>) -> bool {
        x.iter().all(|c| c.is_finite())
    }

    fn mul_assign(&self, acc: &mut Vec<f64>, x: &Vec<f64>) {
        for m in (0..=self.order).rev() {
            let row = &self.binomial[m];
            let mut sum = 0.0;
            for l in 0..=m {
                sum += row[l] * acc[l] * x[m - l];
            }
            acc[m] = sum;
        }
    }

    fn add_assign(&self, acc: &mut Vec<f64>, x: &Vec<f64>) {
        acc.iter_mut().zip(x).for_each(|(a, b)| *a += b);
    }

    fn sub_assign(&self, acc: &mut Vec<f64>, x: &Vec<f64>) {
        acc.iter_mut().zip(x).for_each(|(a, b)| *a -= b);
    }

    fn add_product(&self, acc: &mut Vec<f64>, a: &Vec<f64>, b: &Vec<f64>) {
        self.leibniz_into(acc, a, b, 1.0);
    }

    fn sub_product(&self, acc: &mut Vec<f64>, a: &Vec<f64>, b: &Vec<f64>) {
        self.leibniz_into(acc, a, b, -1.0);
    }

    fn scale(&self, x: &Vec<f64>, factor: f64) -> Vec<f64> {
        x.iter().map(|c| c * factor).collect()
    }
}

/// Pascal's triangle up to row `order`.
fn binomial_rows(order: usize) -> Vec<Vec<f64>> {
    let mut rows = vec![vec![1.0]];
    for m in 1..=order {
        let previous = &rows[m - 1];
        let mut row = vec![1.0; m + 1];
        for l in 1..m {
            row[l] = previous[l - 1] + previous[l];
        }
        rows.push(row);
    }
    rows
}

/// [`BetaDerivatives`] carried in extended precision.
///
/// Entries share the precision and rounding of the wrapped [`Precise`]. Pair
/// Boltzmann factors are formed as `1 + f` in extended precision; the
/// logarithm that sets their derivatives is taken in `f64` with `ln_1p`, so
/// the precision gained is in the sums of the recursion rather than in the
/// single-pair derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct PreciseDerivatives {
    precise: Precise,
    order: usize,
    beta: f64,
    binomial: Vec<Vec<BigFloat>>,
}

impl PreciseDerivatives {
    pub fn new(order: usize, beta: f64, precise: Precise) -> Self {
        assert!(beta > 0.0, "inverse temperature must be positive, got {}", beta);
        let binomial = binomial_rows(order)
            .into_iter()
            .map(|row| row.into_iter().map(|c| precise.from_f64(c)).collect())
            .collect();
        PreciseDerivatives {
            precise,
            order,
            beta,
            binomial,
        }
    }

    pub fn with_digits(order: usize, beta: f64, digits: usize) -> Self {
        Self::new(order, beta, Precise::with_digits(digits))
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn precise(&self) -> &Precise {
        &self.precise
    }

    /// Nearest `f64` of every entry.
    pub fn to_f64(&self, x: &[BigFloat]) -> Vec<f64> {
        x.iter().map(|c| self.precise.to_f64(c)).collect()
    }

    fn mul(&self, a: &BigFloat, b: &BigFloat) -> BigFloat {
        a.mul(b, self.precise.precision, self.precise.rounding)
    }

    fn add(&self, a: &BigFloat, b: &BigFloat) -> BigFloat {
        a.add(b, self.precise.precision, self.precise.rounding)
    }

    /// Derivatives of a factor `q` whose logarithm is `log_q`.
    fn factor(&self, q: BigFloat, log_q: f64) -> Vec<BigFloat> {
        let mut value = self.zero();
        if q.is_zero() {
            return value;
        }
        let minus_u = self.precise.from_f64(log_q / self.beta);
        value[0] = q;
        for m in 1..=self.order {
            value[m] = self.mul(&value[m - 1], &minus_u);
        }
        value
    }

    fn leibniz(&self, a: &[BigFloat], b: &[BigFloat], m: usize) -> BigFloat {
        let mut sum = self.precise.zero();
        for l in 0..=m {
            let term = self.mul(&self.binomial[m][l], &self.mul(&a[l], &b[m - l]));
            sum = self.add(&sum, &term);
        }
        sum
    }
}

impl Arithmetic for PreciseDerivatives {
    type Bond = f64;
    type Value = Vec<BigFloat>;

    fn zero(&self) -> Vec<BigFloat> {
        vec![self.precise.zero(); self.order + 1]
    }

    fn one(&self) -> Vec<BigFloat> {
        let mut value = self.zero();
        value[0] = self.precise.one();
        value
    }

    fn boltzmann(&self, bond: &f64) -> Vec<BigFloat> {
        self.factor(self.precise.boltzmann(bond), bond.ln_1p())
    }

    fn boltzmann_factor(&self, q: f64) -> Vec<BigFloat> {
        if q == 0.0 {
            return self.zero();
        }
        self.factor(self.precise.from_f64(q), q.ln())
    }

    fn is_zero(&self, x: &Vec<BigFloat>) -> bool {
        x.iter().all(|c| c.is_zero())
    }

    fn is_finite(&self, x: &Vec<BigFloat>) -> bool {
        x.iter().all(|c| self.precise.is_finite(c))
    }

    fn mul_assign(&self, acc: &mut Vec<BigFloat>, x: &Vec<BigFloat>) {
        // highest order first, so lower entries of `acc` are still unchanged
        for m in (0..=self.order).rev() {
            let value = self.leibniz(acc, x, m);
            acc[m] = value;
        }
    }

    fn add_assign(&self, acc: &mut Vec<BigFloat>, x: &Vec<BigFloat>) {
        for (a, b) in acc.iter_mut().zip(x) {
            *a = self.add(a, b);
        }
    }

    fn sub_assign(&self, acc: &mut Vec<BigFloat>, x: &Vec<BigFloat>) {
        for (a, b) in acc.iter_mut().zip(x) {
            *a = a.sub(b, self.precise.precision, self.precise.rounding);
        }
    }

    fn add_product(&self, acc: &mut Vec<BigFloat>, a: &Vec<BigFloat>, b: &Vec<BigFloat>) {
        for m in 0..=self.order {
            let sum = self.add(&acc[m], &self.leibniz(a, b, m));
            acc[m] = sum;
        }
    }

    fn sub_product(&self, acc: &mut Vec<BigFloat>, a: &Vec<BigFloat>, b: &Vec<BigFloat>) {
        for m in 0..=self.order {
            let difference = acc[m].sub(&self.leibniz(a, b, m), self.precise.precision, self.precise.rounding);
            acc[m] = difference;
        }
    }

    fn scale(&self, x: &Vec<BigFloat>, factor: f64) -> Vec<BigFloat> {
        let factor = self.precise.from_f64(factor);
        x.iter().map(|c| self.mul(c, &factor)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;

    #[test]
    fn test_precise_round_trip_to_f64() {
        let precise = Precise::with_digits(40);
        assert!(precise.precision() >= 133);
        for x in [1.0, -2.5, 0.1, 1.0e-300, -7.25e200, 3.0e-12] {
            assert_eq!(precise.to_f64(&precise.from_f64(x)), x);
        }
        assert_eq!(precise.to_f64(&precise.zero()), 0.0);
    }

    #[test]
    fn test_precise_keeps_small_mayer_function() {
        let precise = Precise::with_digits(40);
        let mut q = precise.boltzmann(&1.0e-20);
        precise.sub_assign(&mut q, &precise.one());
        assert_relative_eq!(precise.to_f64(&q), 1.0e-20, max_relative = 1e-15);
        // plain arithmetic loses the same difference entirely
        assert_eq!(Plain.boltzmann(&1.0e-20) - 1.0, 0.0);
    }

    #[test]
    fn test_channel_products_truncate() {
        let channels = Channels::new(3);
        let mut acc = vec![1.0, 2.0, 0.0];
        channels.mul_assign(&mut acc, &vec![1.0, 1.0, 0.0]);
        // (1 + 2Y)(1 + Y) = 1 + 3Y + 2Y^2
        assert_eq!(acc, vec![1.0, 3.0, 2.0]);
        channels.mul_assign(&mut acc, &vec![0.0, 1.0, 0.0]);
        // shifted by one power, Y^3 dropped
        assert_eq!(acc, vec![0.0, 1.0, 3.0]);

        let mut sum = channels.zero();
        channels.sub_product(&mut sum, &vec![1.0, 1.0, 0.0], &vec![1.0, -1.0, 0.0]);
        assert_eq!(sum, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_channel_bond_padding() {
        let channels = Channels::for_points(3);
        assert_eq!(channels.len(), 4);
        let q = channels.boltzmann(&ChannelBond::well(2));
        assert_eq!(q, vec![1.0, 1.0, 0.0, 0.0]);
        assert_eq!(Channels::evaluate(&q, 0.5), 1.5);
    }

    #[test]
    fn test_pair_derivatives() {
        let beta: f64 = 0.8;
        let u: f64 = 0.3;
        let derivatives = BetaDerivatives::new(3, beta);
        let q = derivatives.boltzmann(&((-beta * u).exp() - 1.0));
        for m in 0..=3 {
            let expected = (-beta * u).exp() * (-u).powi(m as i32);
            assert_relative_eq!(q[m], expected, max_relative = 1e-12);
        }
        assert!(derivatives.is_zero(&derivatives.boltzmann(&-1.0)));
    }

    #[test]
    fn test_leibniz_product() {
        let derivatives = BetaDerivatives::new(2, 1.0);
        // e^{aβ} e^{bβ} at β = 1, derivatives of the product are (a + b)^m e^{a + b}
        let (a, b): (f64, f64) = (-0.4, 0.7);
        let mut x = derivatives.boltzmann_factor(a.exp());
        derivatives.mul_assign(&mut x, &derivatives.boltzmann_factor(b.exp()));
        for m in 0..=2 {
            assert_relative_eq!(x[m], (a + b).powi(m as i32) * (a + b).exp(), max_relative = 1e-12);
        }
    }

    #[test]
    fn test_precise_derivatives_match_double_precision() {
        let (beta, order) = (0.8, 3);
        let plain = BetaDerivatives::new(order, beta);
        let precise = PreciseDerivatives::with_digits(order, beta, 40);
        for f in [-1.0, -0.35, 0.0, 0.6, 2.0] {
            let expected = plain.boltzmann(&f);
            let q = precise.to_f64(&precise.boltzmann(&f));
            for m in 0..=order {
                assert_relative_eq!(q[m], expected[m], max_relative = 1e-14);
            }
        }

        let (a, b): (f64, f64) = (-0.4, 0.7);
        let mut x = precise.boltzmann_factor(a.exp());
        precise.mul_assign(&mut x, &precise.boltzmann_factor(b.exp()));
        let mut y = plain.boltzmann_factor(a.exp());
        plain.mul_assign(&mut y, &plain.boltzmann_factor(b.exp()));
        for (p, d) in precise.to_f64(&x).iter().zip(&y) {
            assert_relative_eq!(*p, *d, max_relative = 1e-13);
        }
    }

    #[test]
    fn test_precise_derivatives_keep_small_differences() {
        let precise = PreciseDerivatives::with_digits(1, 1.0, 40);
        let mut q = precise.boltzmann(&1.0e-20);
        precise.sub_assign(&mut q, &precise.one());
        let q = precise.to_f64(&q);
        assert_relative_eq!(q[0], 1.0e-20, max_relative = 1e-15);
        // d/dβ of exp(-βu) at β = 1 is (1 + f) ln(1 + f)
        assert_relative_eq!(q[1], 1.0e-20, max_relative = 1e-12);
    }
}
