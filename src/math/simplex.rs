//! Derivative-free local minimization (Nelder–Mead simplex).
//!
//! The likelihoods we maximize are cheap to evaluate but have kinks (the noise
//! parameter is clamped), so we avoid gradients entirely. Parameter dimension is
//! tiny (2–3), where the simplex method is robust and fast.
//!
//! Convergence requires *both*:
//! - the spread of function values across the simplex `<= f_tol`
//! - the simplex diameter (max-norm distance of every vertex to the best) `<= x_tol`
//!
//! Running out of `max_iter` without meeting both is reported as non-converged;
//! the caller decides what that means.

use std::cmp::Ordering;

use nalgebra::DVector;

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Nelder–Mead settings.
#[derive(Debug, Clone, Copy)]
pub struct NelderMead {
    pub max_iter: usize,
    pub f_tol: f64,
    pub x_tol: f64,
    /// Offset along each axis used to build the initial simplex around `x0`.
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            f_tol: 1e-9,
            x_tol: 1e-7,
            initial_step: 0.5,
        }
    }
}

/// Best point found by a run.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: DVector<f64>,
    pub f: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone)]
struct Vertex {
    x: DVector<f64>,
    f: f64,
}

impl NelderMead {
    /// Minimize `f` starting from `x0`.
    ///
    /// Non-finite objective values are treated as `+inf` so the simplex moves away
    /// from them.
    pub fn minimize<F>(&self, f: F, x0: &DVector<f64>) -> Minimum
    where
        F: Fn(&DVector<f64>) -> f64,
    {
        let eval = |x: &DVector<f64>| {
            let v = f(x);
            if v.is_finite() { v } else { f64::INFINITY }
        };

        let dim = x0.len();
        let mut simplex: Vec<Vertex> = Vec::with_capacity(dim + 1);
        simplex.push(Vertex {
            x: x0.clone(),
            f: eval(x0),
        });
        for i in 0..dim {
            let mut x = x0.clone();
            x[i] += self.initial_step;
            let fx = eval(&x);
            simplex.push(Vertex { x, f: fx });
        }

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iter {
            sort_vertices(&mut simplex);
            if self.has_converged(&simplex) {
                converged = true;
                break;
            }
            iterations += 1;

            let worst = dim;
            let centroid = centroid(&simplex[..worst]);

            let xr = &centroid + (&centroid - &simplex[worst].x) * REFLECT;
            let fr = eval(&xr);

            if fr < simplex[0].f {
                let xe = &centroid + (&xr - &centroid) * EXPAND;
                let fe = eval(&xe);
                simplex[worst] = if fe < fr {
                    Vertex { x: xe, f: fe }
                } else {
                    Vertex { x: xr, f: fr }
                };
                continue;
            }

            if fr < simplex[worst - 1].f {
                simplex[worst] = Vertex { x: xr, f: fr };
                continue;
            }

            // Contraction: outside if the reflected point beats the worst vertex,
            // inside otherwise.
            let accepted = if fr < simplex[worst].f {
                let xc = &centroid + (&xr - &centroid) * CONTRACT;
                let fc = eval(&xc);
                (fc <= fr).then_some(Vertex { x: xc, f: fc })
            } else {
                let xc = &centroid + (&simplex[worst].x - &centroid) * CONTRACT;
                let fc = eval(&xc);
                (fc < simplex[worst].f).then_some(Vertex { x: xc, f: fc })
            };
            if let Some(v) = accepted {
                simplex[worst] = v;
                continue;
            }

            // Shrink everything toward the best vertex.
            let best = simplex[0].x.clone();
            for v in simplex.iter_mut().skip(1) {
                v.x = &best + (&v.x - &best) * SHRINK;
                v.f = eval(&v.x);
            }
        }

        sort_vertices(&mut simplex);
        if !converged {
            converged = self.has_converged(&simplex);
        }

        let best = simplex.swap_remove(0);
        Minimum {
            x: best.x,
            f: best.f,
            iterations,
            converged,
        }
    }

    fn has_converged(&self, simplex: &[Vertex]) -> bool {
        let best = &simplex[0];
        if !best.f.is_finite() {
            return false;
        }
        let f_spread = simplex
            .iter()
            .map(|v| (v.f - best.f).abs())
            .fold(0.0_f64, f64::max);
        let x_spread = simplex
            .iter()
            .map(|v| (&v.x - &best.x).amax())
            .fold(0.0_f64, f64::max);
        f_spread <= self.f_tol && x_spread <= self.x_tol
    }
}

fn sort_vertices(simplex: &mut [Vertex]) {
    // Stable sort keeps the earlier vertex first on exact ties (deterministic).
    simplex.sort_by(|a, b| a.f.partial_cmp(&b.f).unwrap_or(Ordering::Equal));
}

fn centroid(vertices: &[Vertex]) -> DVector<f64> {
    let mut c = DVector::zeros(vertices[0].x.len());
    for v in vertices {
        c += &v.x;
    }
    c / vertices.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn finds_minimum_of_shifted_quadratic() {
        let nm = NelderMead::default();
        let f = |x: &DVector<f64>| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.5).powi(2) + 0.25;
        let m = nm.minimize(f, &DVector::from_vec(vec![0.0, 0.0]));

        assert!(m.converged);
        assert_abs_diff_eq!(m.x[0], 3.0, epsilon = 1e-4);
        assert_abs_diff_eq!(m.x[1], -1.5, epsilon = 1e-4);
        assert_abs_diff_eq!(m.f, 0.25, epsilon = 1e-8);
    }

    #[test]
    fn solves_rosenbrock() {
        let nm = NelderMead {
            max_iter: 10_000,
            ..NelderMead::default()
        };
        let f = |x: &DVector<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let m = nm.minimize(f, &DVector::from_vec(vec![-1.2, 1.0]));

        assert!(m.converged);
        assert_abs_diff_eq!(m.x[0], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(m.x[1], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn reports_non_convergence_when_budget_is_exhausted() {
        let nm = NelderMead {
            max_iter: 3,
            ..NelderMead::default()
        };
        let f = |x: &DVector<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let m = nm.minimize(f, &DVector::from_vec(vec![-1.2, 1.0]));

        assert!(!m.converged);
        assert_eq!(m.iterations, 3);
        assert!(m.f.is_finite());
    }

    #[test]
    fn steps_away_from_non_finite_regions() {
        let nm = NelderMead::default();
        let f = |x: &DVector<f64>| {
            if x[0] < 0.0 { f64::NAN } else { (x[0] - 1.0).powi(2) }
        };
        let m = nm.minimize(f, &DVector::from_vec(vec![0.1]));

        assert!(m.converged);
        assert_abs_diff_eq!(m.x[0], 1.0, epsilon = 1e-4);
    }
}
