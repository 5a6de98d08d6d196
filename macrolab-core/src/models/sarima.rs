//! Seasonal ARIMA `(p,d,q)(P,D,Q,s)` fitted by conditional sum of squares.
//!
//! The series is differenced with `(1-B)^d (1-B^s)^D`, then the ARMA part
//!
//! ```text
//! φ(B) Φ(B^s) w_t = θ(B) Θ(B^s) e_t
//! ```
//!
//! is fitted by minimising the sum of squared one-step residuals, with
//! pre-sample residuals set to zero. No constant term is estimated.
//!
//! Forecasts run the full (differencing included) AR recursion in the level
//! domain with future shocks set to zero. Interval widths come from the
//! psi-weights of the same representation: `Var(h) = σ² Σ_{j<h} ψ_j²`.

use super::optimize::{nelder_mead, NelderMeadOptions};
use super::ModelError;
use serde::{Deserialize, Serialize};

/// Two-sided 95% normal quantile.
const Z_95: f64 = 1.959_963_984_540_054;
const MIN_SIGMA2: f64 = 1e-12;
/// Observations required beyond differencing and AR start-up.
const EXTRA_OBS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl SarimaOrder {
    pub fn new(order: [usize; 3], seasonal: [usize; 4]) -> Self {
        Self {
            p: order[0],
            d: order[1],
            q: order[2],
            seasonal_p: seasonal[0],
            seasonal_d: seasonal[1],
            seasonal_q: seasonal[2],
            period: seasonal[3],
        }
    }

    fn n_params(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    fn has_seasonal_terms(&self) -> bool {
        self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }

    /// Observations lost to differencing.
    fn diff_len(&self) -> usize {
        self.d + self.seasonal_d * self.period
    }

    /// Minimum series length accepted by `fit`.
    pub fn min_observations(&self) -> usize {
        self.diff_len() + self.p + self.seasonal_p * self.period + EXTRA_OBS
    }
}

impl Default for SarimaOrder {
    fn default() -> Self {
        Self::new([1, 1, 1], [1, 1, 1, 12])
    }
}

impl std::fmt::Display for SarimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{},{})({},{},{},{})",
            self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
        )
    }
}

/// Point forecasts with 95% intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarimaForecast {
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl SarimaForecast {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// Estimated coefficients, in the sign convention of the model equation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarimaParams {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
    pub sigma2: f64,
}

#[derive(Debug, Clone)]
struct Fitted {
    params: SarimaParams,
    /// Level-domain history.
    history: Vec<f64>,
    /// One-step residuals aligned with `history`, zero where undefined.
    residuals: Vec<f64>,
    llf: f64,
    aic: f64,
    converged: bool,
}

#[derive(Debug, Clone)]
pub struct Sarima {
    order: SarimaOrder,
    enforce_stationarity: bool,
    enforce_invertibility: bool,
    fitted: Option<Fitted>,
}

impl Sarima {
    pub fn new(order: SarimaOrder) -> Result<Self, ModelError> {
        if order.has_seasonal_terms() && order.period < 2 {
            return Err(ModelError::InvalidParameter {
                name: "seasonal_order".into(),
                reason: format!("seasonal period must be >= 2, got {}", order.period),
            });
        }
        if order.d > 2 || order.seasonal_d > 1 {
            return Err(ModelError::InvalidParameter {
                name: "order".into(),
                reason: "supports d <= 2 and D <= 1".into(),
            });
        }
        Ok(Self {
            order,
            enforce_stationarity: false,
            enforce_invertibility: false,
            fitted: None,
        })
    }

    /// Constrain AR coefficients to (-1, 1) during estimation.
    pub fn with_enforce_stationarity(mut self, enforce: bool) -> Self {
        self.enforce_stationarity = enforce;
        self
    }

    /// Constrain MA coefficients to (-1, 1) during estimation.
    pub fn with_enforce_invertibility(mut self, enforce: bool) -> Self {
        self.enforce_invertibility = enforce;
        self
    }

    pub fn order(&self) -> SarimaOrder {
        self.order
    }

    pub fn params(&self) -> Option<&SarimaParams> {
        self.fitted.as_ref().map(|f| &f.params)
    }

    pub fn aic(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.aic)
    }

    pub fn log_likelihood(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.llf)
    }

    /// Whether the optimiser met its tolerance.
    pub fn converged(&self) -> Option<bool> {
        self.fitted.as_ref().map(|f| f.converged)
    }

    pub fn residuals(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.residuals.as_slice())
    }

    /// Fit on `series`; NaN entries are dropped first.
    pub fn fit(&mut self, series: &[f64]) -> Result<(), ModelError> {
        let y: Vec<f64> = series.iter().copied().filter(|v| !v.is_nan()).collect();
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidParameter {
                name: "series".into(),
                reason: "contains infinite values".into(),
            });
        }
        let needed = self.order.min_observations();
        if y.len() < needed {
            return Err(ModelError::InsufficientData { needed, got: y.len() });
        }

        let w = difference(&y, self.order.d, self.order.seasonal_d, self.order.period);
        let order = self.order;
        let (enforce_ar, enforce_ma) = (self.enforce_stationarity, self.enforce_invertibility);

        let objective = |raw: &[f64]| {
            let params = unpack(order, raw, enforce_ar, enforce_ma);
            let ar = ar_polynomial(&params, order);
            let (sse, _) = css_residuals(&w, &ar, &ma_polynomial(&params, order));
            if sse.is_finite() {
                sse
            } else {
                f64::INFINITY
            }
        };

        let x0 = vec![0.0; order.n_params()];
        let opt = nelder_mead(objective, &x0, NelderMeadOptions::default());
        if !opt.fun.is_finite() {
            return Err(ModelError::FitFailed("conditional sum of squares diverged".into()));
        }

        let mut params = unpack(order, &opt.x, enforce_ar, enforce_ma);
        let ar_poly = ar_polynomial(&params, order);
        let ma_poly = ma_polynomial(&params, order);
        let (sse, e) = css_residuals(&w, &ar_poly, &ma_poly);

        let start = ar_poly.len() - 1;
        let n_eff = (w.len() - start) as f64;
        let sigma2 = (sse / n_eff).max(MIN_SIGMA2);
        params.sigma2 = sigma2;

        let llf = -n_eff / 2.0 * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
        let k = (order.n_params() + 1) as f64;
        let aic = 2.0 * k - 2.0 * llf;

        // Re-index residuals onto the level series
        let offset = order.diff_len();
        let mut residuals = vec![0.0; y.len()];
        residuals[offset..].copy_from_slice(&e);

        if !opt.converged {
            tracing::debug!(order = %order, iterations = opt.iterations, "sarima optimiser hit iteration cap");
        }

        self.fitted = Some(Fitted {
            params,
            history: y,
            residuals,
            llf,
            aic,
            converged: opt.converged,
        });
        Ok(())
    }

    /// Forecast `steps` periods beyond the end of the fitted series.
    pub fn forecast(&self, steps: usize) -> Result<SarimaForecast, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let order = self.order;

        let phi_star = poly_mul(&ar_polynomial(&fitted.params, order), &diff_polynomial(order));
        let ma = ma_polynomial(&fitted.params, order);

        let n = fitted.history.len();
        let mut ext = fitted.history.clone();
        let mut mean = Vec::with_capacity(steps);
        for h in 0..steps {
            let t = n + h;
            let mut value = 0.0;
            for (i, a) in phi_star.iter().enumerate().skip(1) {
                if i <= t {
                    value -= a * ext[t - i];
                }
            }
            for (j, m) in ma.iter().enumerate().skip(1) {
                if j <= t && t - j < n {
                    value += m * fitted.residuals[t - j];
                }
            }
            ext.push(value);
            mean.push(value);
        }

        let psi = psi_weights(&phi_star, &ma, steps);
        let mut cumulative = 0.0;
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        for (h, m) in mean.iter().enumerate() {
            cumulative += psi[h] * psi[h];
            let half_width = Z_95 * (fitted.params.sigma2 * cumulative).sqrt();
            lower.push(m - half_width);
            upper.push(m + half_width);
        }

        Ok(SarimaForecast { mean, lower, upper })
    }
}

/// Map raw optimiser coordinates to model coefficients.
fn unpack(order: SarimaOrder, raw: &[f64], enforce_ar: bool, enforce_ma: bool) -> SarimaParams {
    let squash = |v: f64, on: bool| if on { v.tanh() } else { v };
    let mut it = raw.iter().copied();
    let mut take = |n: usize, on: bool| -> Vec<f64> {
        (0..n)
            .filter_map(|_| it.next())
            .map(|v| squash(v, on))
            .collect()
    };

    let ar = take(order.p, enforce_ar);
    let seasonal_ar = take(order.seasonal_p, enforce_ar);
    let ma = take(order.q, enforce_ma);
    let seasonal_ma = take(order.seasonal_q, enforce_ma);
    SarimaParams {
        ar,
        ma,
        seasonal_ar,
        seasonal_ma,
        sigma2: 0.0,
    }
}

/// `φ(B) Φ(B^s)` as coefficients of `1 + a_1 B + a_2 B^2 + ...`.
fn ar_polynomial(params: &SarimaParams, order: SarimaOrder) -> Vec<f64> {
    let mut short = vec![1.0];
    short.extend(params.ar.iter().map(|c| -c));
    let mut seasonal = vec![0.0; order.seasonal_p * order.period + 1];
    seasonal[0] = 1.0;
    for (i, c) in params.seasonal_ar.iter().enumerate() {
        seasonal[(i + 1) * order.period] = -c;
    }
    poly_mul(&short, &seasonal)
}

/// `θ(B) Θ(B^s)` as coefficients of `1 + m_1 B + m_2 B^2 + ...`.
fn ma_polynomial(params: &SarimaParams, order: SarimaOrder) -> Vec<f64> {
    let mut short = vec![1.0];
    short.extend(params.ma.iter().copied());
    let mut seasonal = vec![0.0; order.seasonal_q * order.period + 1];
    seasonal[0] = 1.0;
    for (i, c) in params.seasonal_ma.iter().enumerate() {
        seasonal[(i + 1) * order.period] = *c;
    }
    poly_mul(&short, &seasonal)
}

/// `(1 - B)^d (1 - B^s)^D`.
fn diff_polynomial(order: SarimaOrder) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..order.d {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    for _ in 0..order.seasonal_d {
        let mut seasonal = vec![0.0; order.period + 1];
        seasonal[0] = 1.0;
        seasonal[order.period] = -1.0;
        poly = poly_mul(&poly, &seasonal);
    }
    poly
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Apply regular then seasonal differencing.
pub fn difference(y: &[f64], d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut w = y.to_vec();
    for _ in 0..d {
        w = w.windows(2).map(|p| p[1] - p[0]).collect();
    }
    for _ in 0..seasonal_d {
        if w.len() <= period {
            return Vec::new();
        }
        w = (period..w.len()).map(|t| w[t] - w[t - period]).collect();
    }
    w
}

/// One-step residuals of the ARMA recursion and their sum of squares.
///
/// Residuals before the first full AR window are zero and excluded from
/// the sum. The returned vector is aligned with `w`.
fn css_residuals(w: &[f64], ar: &[f64], ma: &[f64]) -> (f64, Vec<f64>) {
    let start = ar.len() - 1;
    let mut e = vec![0.0; w.len()];
    let mut sse = 0.0;
    for t in start..w.len() {
        let mut v: f64 = ar.iter().enumerate().map(|(i, a)| a * w[t - i]).sum();
        for (j, m) in ma.iter().enumerate().skip(1) {
            if j <= t {
                v -= m * e[t - j];
            }
        }
        e[t] = v;
        sse += v * v;
    }
    (sse, e)
}

/// MA(∞) weights of `m(B) / φ*(B)`, first `n` of them.
fn psi_weights(phi_star: &[f64], ma: &[f64], n: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(n);
    for j in 0..n {
        let mut v = if j < ma.len() { ma[j] } else { 0.0 };
        for i in 1..=j.min(phi_star.len() - 1) {
            v -= phi_star[i] * psi[j - i];
        }
        psi.push(v);
    }
    psi
}
