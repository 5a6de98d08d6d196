//! Derivative-free minimisation (Nelder-Mead simplex).
//!
//! Used to fit SARIMA coefficients by conditional sum of squares. The
//! objective may return `f64::INFINITY` to reject a point.

#[derive(Debug, Clone, Copy)]
pub struct NelderMeadOptions {
    pub max_iter: usize,
    /// Stop once every vertex is within this distance of the best one.
    pub xatol: f64,
    /// ...and every objective value is within this of the best one.
    pub fatol: f64,
    /// Initial simplex step for each coordinate.
    pub initial_step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            xatol: 1e-6,
            fatol: 1e-8,
            initial_step: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub fun: f64,
    pub iterations: usize,
    pub converged: bool,
}

const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

pub fn nelder_mead<F>(f: F, x0: &[f64], opts: NelderMeadOptions) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    };

    if n == 0 {
        return Minimum {
            x: Vec::new(),
            fun: eval(x0),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for i in 0..n {
        let mut v = x0.to_vec();
        v[i] += if v[i] != 0.0 { opts.initial_step * v[i].abs().max(0.5) } else { opts.initial_step };
        simplex.push(v);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < opts.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        let f_spread = values[1..]
            .iter()
            .map(|v| (v - values[0]).abs())
            .fold(0.0, f64::max);
        if x_spread <= opts.xatol && f_spread <= opts.fatol {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let towards = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n])
                .map(|(c, w)| c + coef * (w - c))
                .collect()
        };

        let reflected = towards(-ALPHA);
        let f_r = eval(&reflected);

        if f_r < values[0] {
            let expanded = towards(-ALPHA * GAMMA);
            let f_e = eval(&expanded);
            if f_e < f_r {
                simplex[n] = expanded;
                values[n] = f_e;
            } else {
                simplex[n] = reflected;
                values[n] = f_r;
            }
            continue;
        }

        if f_r < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_r;
            continue;
        }

        let (contracted, f_c) = if f_r < values[n] {
            let c = towards(-ALPHA * RHO);
            let fc = eval(&c);
            (c, fc)
        } else {
            let c = towards(RHO);
            let fc = eval(&c);
            (c, fc)
        };
        if f_c < values[n].min(f_r) {
            simplex[n] = contracted;
            values[n] = f_c;
            continue;
        }

        // Shrink towards the best vertex
        let best = simplex[0].clone();
        for i in 1..=n {
            simplex[i] = best
                .iter()
                .zip(&simplex[i])
                .map(|(b, v)| b + SIGMA * (v - b))
                .collect();
            values[i] = eval(&simplex[i]);
        }
    }

    let best = (0..=n)
        .min_by(|&a, &b| values[a].total_cmp(&values[b]))
        .unwrap_or(0);
    Minimum {
        x: simplex[best].clone(),
        fun: values[best],
        iterations,
        converged,
    }
}
