//! Downhill-simplex maximizer (Nelder-Mead with whole-simplex contraction).
//!
//! One routine serves both nested searches of the pipeline: the chi-square fit driver
//! and the evolutionary-track age/mass match. The routine maximizes, so minimization
//! callers negate or invert their objective.

/// Outcome of a simplex search.
#[derive(Debug, Clone)]
pub struct SimplexResult {
    /// Variables at the best vertex found.
    pub position: Vec<f64>,
    /// Objective value at that vertex.
    pub value: f64,
    /// Iterations used. Convergence before the cap means `iterations < itmax`.
    pub iterations: usize,
}

/// Maximize `objective` starting from `start`, with an initial simplex offset of
/// `scale[i]` along each variable.
///
/// Arguments
/// -----------------
/// * `ftolerance`: relative spread of the vertex objective values at convergence;
///   non-positive disables this criterion.
/// * `xtolerance`: scaled simplex extent at convergence; non-positive disables.
/// * `itmax`: iteration cap; 0 runs until convergence.
///
/// At least one tolerance must be active, otherwise the search exits immediately.
pub fn maximize<F: FnMut(&[f64]) -> f64>(
    start: &[f64],
    scale: &[f64],
    ftolerance: f64,
    xtolerance: f64,
    itmax: usize,
    mut objective: F,
) -> SimplexResult {
    let nvar = start.len();
    let nsimplex = nvar + 1;

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(nsimplex);
    simplex.push(start.to_vec());
    for i in 0..nvar {
        let mut vertex = start.to_vec();
        vertex[i] += scale[i];
        simplex.push(vertex);
    }
    let mut fvalue: Vec<f64> = simplex.iter().map(|v| objective(v)).collect();

    let mut iteration = 0usize;
    loop {
        let mut best = 0usize;
        let mut worst = 0usize;
        for i in 0..nsimplex {
            if fvalue[i] > fvalue[best] {
                best = i;
            }
            if fvalue[i] < fvalue[worst] {
                worst = i;
            }
        }

        // Centroid of every vertex but the worst.
        let mut pavg = vec![0.0; nvar];
        for (i, vertex) in simplex.iter().enumerate() {
            if i != worst {
                for j in 0..nvar {
                    pavg[j] += vertex[j];
                }
            }
        }
        for v in &mut pavg {
            *v /= nvar as f64;
        }

        let mut simscale = 0.0;
        for i in 0..nvar {
            simscale += (pavg[i] - simplex[worst][i]).abs() / scale[i];
        }
        simscale /= nvar as f64;

        let fscale = (fvalue[best].abs() + fvalue[worst].abs()) / 2.0;
        let frange = if fscale != 0.0 {
            (fvalue[best] - fvalue[worst]).abs() / fscale
        } else {
            0.0
        };

        let converged = (ftolerance <= 0.0 || frange < ftolerance)
            && (xtolerance <= 0.0 || simscale < xtolerance);
        if converged || (itmax != 0 && iteration >= itmax) {
            return SimplexResult {
                position: simplex[best].clone(),
                value: fvalue[best],
                iterations: iteration,
            };
        }

        // Reflect the worst vertex through the centroid.
        let mut pnew: Vec<f64> = (0..nvar)
            .map(|i| 2.0 * pavg[i] - simplex[worst][i])
            .collect();
        let mut fnew = objective(&pnew);

        if fnew <= fvalue[worst] {
            // Worse than the worst: contract the whole simplex toward the best vertex.
            for i in 0..nsimplex {
                if i != best && i != worst {
                    for j in 0..nvar {
                        simplex[i][j] = 0.5 * simplex[best][j] + 0.5 * simplex[i][j];
                    }
                    fvalue[i] = objective(&simplex[i]);
                }
            }
            for j in 0..nvar {
                pnew[j] = 0.5 * simplex[best][j] + 0.5 * simplex[worst][j];
            }
            fnew = objective(&pnew);
        } else if fnew >= fvalue[best] {
            // Better than the best: try expanding further along the same direction.
            let pnew2: Vec<f64> = (0..nvar)
                .map(|i| 3.0 * pavg[i] - 2.0 * simplex[worst][i])
                .collect();
            let fnew2 = objective(&pnew2);
            if fnew2 > fnew {
                pnew = pnew2;
                fnew = fnew2;
            }
        }

        simplex[worst] = pnew;
        fvalue[worst] = fnew;
        iteration += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn finds_the_maximum_of_a_paraboloid() {
        let result = maximize(&[0.25, 0.25], &[0.5, 0.5], 1e-8, 1e-8, 500, |p| {
            1.0 - (p[0] - 1.0).powi(2) - (p[1] - 2.0).powi(2)
        });
        assert!(result.iterations < 500);
        assert_relative_eq!(result.position[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(result.position[1], 2.0, epsilon = 1e-3);
        assert_relative_eq!(result.value, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn iteration_cap_is_honored() {
        let result = maximize(&[10.0], &[0.1], 0.0, 1e-12, 3, |p| -p[0].powi(2));
        assert_eq!(result.iterations, 3);
    }
}
