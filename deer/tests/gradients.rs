use deer::{
    arch::{
        Readout, StepFunction,
        activations::ActFn,
        cells::{Cell, Elman, Gru, Linear},
        layers::Dense,
        loss::{CrossEntropy, LossFn, one_hot},
    },
    rollout::rollout_batch,
    solver::{self, SolverConfig, SolverMethod},
};
use ndarray::{Array1, Array2, Array3};
use rand::{Rng, SeedableRng, rngs::StdRng};

const H: f64 = 1e-6;

fn tight_config(method: SolverMethod) -> SolverConfig {
    SolverConfig {
        method,
        tol: 1e-12,
        max_iter: 100,
    }
}

/// A fixed linear functional of the trajectory.
fn objective(trajectory: &Array2<f64>, weights: &Array2<f64>) -> f64 {
    (trajectory * weights).sum()
}

fn assert_close(got: f64, expected: f64, what: &str) {
    let tol = 1e-5 * (1. + expected.abs());
    assert!(
        (got - expected).abs() < tol,
        "{what}: got {got}, expected {expected}"
    );
}

fn check_solver_gradients(cell: &Cell, method: SolverMethod, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let (nseq, nstates, ninputs) = (4, cell.nstates(), cell.ninputs());
    let config = tight_config(method);

    let params: Vec<f64> = cell
        .init(seed)
        .unwrap()
        .into_iter()
        .map(|p| p + 0.1 * rng.random_range(-1.0..1.0))
        .collect();
    let y0 = Array1::from_shape_fn(nstates, |_| rng.random_range(-0.5..0.5));
    let inputs = Array2::from_shape_fn((nseq, ninputs), |_| rng.random_range(-1.0..1.0));
    let weights = Array2::from_shape_fn((nseq, nstates), |_| rng.random_range(-1.0..1.0));
    let guess = Array2::zeros((nseq, nstates));

    let eval = |params: &[f64], y0: &Array1<f64>, inputs: &Array2<f64>| -> f64 {
        let solution =
            solver::solve(cell, params, y0.view(), inputs.view(), guess.view(), &config).unwrap();
        assert!(solution.stats().converged);
        objective(&solution.into_trajectory(), &weights)
    };

    let solution =
        solver::solve(cell, &params, y0.view(), inputs.view(), guess.view(), &config).unwrap();
    let grad = solution.backward(weights.view()).unwrap();

    for k in 0..params.len() {
        let mut plus = params.clone();
        let mut minus = params.clone();
        plus[k] += H;
        minus[k] -= H;
        let expected = (eval(&plus, &y0, &inputs) - eval(&minus, &y0, &inputs)) / (2. * H);
        assert_close(grad.params[k], expected, &format!("{cell:?} param {k}"));
    }

    for j in 0..nstates {
        let mut plus = y0.clone();
        let mut minus = y0.clone();
        plus[j] += H;
        minus[j] -= H;
        let expected = (eval(&params, &plus, &inputs) - eval(&params, &minus, &inputs)) / (2. * H);
        assert_close(grad.initial_state[j], expected, &format!("{cell:?} y0 {j}"));
    }

    for ((i, j), &got) in grad.inputs.indexed_iter() {
        let mut plus = inputs.clone();
        let mut minus = inputs.clone();
        plus[[i, j]] += H;
        minus[[i, j]] -= H;
        let expected = (eval(&params, &y0, &plus) - eval(&params, &y0, &minus)) / (2. * H);
        assert_close(got, expected, &format!("{cell:?} input ({i}, {j})"));
    }
}

fn cells() -> Vec<Cell> {
    vec![
        Cell::Linear(Linear::new(2, 1)),
        Cell::Elman(Elman::new(2, 1, ActFn::tanh())),
        Cell::Elman(Elman::new(2, 3, ActFn::sigmoid(1.))),
        Cell::Gru(Gru::new(2, 1)),
        Cell::Gru(Gru::new(2, 3)),
    ]
}

#[test]
fn implicit_gradients_match_finite_differences() {
    for (seed, cell) in cells().iter().enumerate() {
        check_solver_gradients(cell, SolverMethod::Deer, seed as u64);
    }
}

#[test]
fn sequential_solutions_share_the_implicit_backward() {
    for (seed, cell) in cells().iter().enumerate() {
        check_solver_gradients(cell, SolverMethod::Sequential, 10 + seed as u64);
    }
}

#[test]
fn gradients_do_not_depend_on_the_iteration_count() {
    let mut rng = StdRng::seed_from_u64(7);
    let cell = Gru::new(3, 2);
    let params = cell.init(7).unwrap();
    let y0 = Array1::zeros(3);
    let inputs = Array2::from_shape_fn((16, 2), |_| rng.random_range(-1.0..1.0));
    let weights = Array2::from_shape_fn((16, 3), |_| rng.random_range(-1.0..1.0));
    let config = tight_config(SolverMethod::Deer);

    let cold = Array2::zeros((16, 3));
    let cold_solution =
        solver::solve(&cell, &params, y0.view(), inputs.view(), cold.view(), &config).unwrap();
    let warm = cold_solution.trajectory().to_owned();
    let warm_solution =
        solver::solve(&cell, &params, y0.view(), inputs.view(), warm.view(), &config).unwrap();

    assert!(warm_solution.stats().iterations < cold_solution.stats().iterations);

    let cold_grad = cold_solution.backward(weights.view()).unwrap();
    let warm_grad = warm_solution.backward(weights.view()).unwrap();
    for (a, b) in cold_grad.params.iter().zip(&warm_grad.params) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn backward_rejects_a_misshapen_gradient() {
    let cell = Gru::new(2, 1);
    let params = cell.init(0).unwrap();
    let y0 = Array1::zeros(2);
    let inputs = Array2::zeros((4, 1));
    let guess = Array2::zeros((4, 2));

    let solution = solver::solve(
        &cell,
        &params,
        y0.view(),
        inputs.view(),
        guess.view(),
        &SolverConfig::default(),
    )
    .unwrap();

    assert!(solution.backward(Array2::zeros((3, 2)).view()).is_err());
}

#[test]
fn rollout_gradients_match_finite_differences() {
    let mut rng = StdRng::seed_from_u64(11);
    let cell = Gru::new(2, 1);
    let readout = Dense::new((2, 3), None);
    let config = tight_config(SolverMethod::Deer);

    let params = cell.init(11).unwrap();
    let readout_params = readout.init(12).unwrap();
    let inputs = Array3::from_shape_fn((3, 4, 1), |_| rng.random_range(-1.0..1.0));
    let initial_states = Array2::from_shape_fn((3, 2), |_| rng.random_range(-0.5..0.5));
    let guesses = Array3::zeros((3, 4, 2));
    let targets = one_hot(&[0, 2, 1], 3).unwrap();

    let eval = |params: &[f64], readout_params: &[f64], initial_states: &Array2<f64>| -> f64 {
        let rollout = rollout_batch(
            &cell,
            params,
            &readout,
            readout_params,
            initial_states.view(),
            inputs.view(),
            guesses.view(),
            &config,
        )
        .unwrap();
        CrossEntropy.loss(rollout.outputs(), targets.view())
    };

    let rollout = rollout_batch(
        &cell,
        &params,
        &readout,
        &readout_params,
        initial_states.view(),
        inputs.view(),
        guesses.view(),
        &config,
    )
    .unwrap();
    let d_outputs = CrossEntropy.loss_prime(rollout.outputs(), targets.view());
    let grad = rollout.backward(d_outputs.view()).unwrap();

    for k in 0..params.len() {
        let mut plus = params.clone();
        let mut minus = params.clone();
        plus[k] += H;
        minus[k] -= H;
        let expected = (eval(&plus, &readout_params, &initial_states)
            - eval(&minus, &readout_params, &initial_states))
            / (2. * H);
        assert_close(grad.step[k], expected, &format!("step param {k}"));
    }

    for k in 0..readout_params.len() {
        let mut plus = readout_params.clone();
        let mut minus = readout_params.clone();
        plus[k] += H;
        minus[k] -= H;
        let expected = (eval(&params, &plus, &initial_states)
            - eval(&params, &minus, &initial_states))
            / (2. * H);
        assert_close(grad.readout[k], expected, &format!("readout param {k}"));
    }

    for ((b, j), &got) in grad.initial_states.indexed_iter() {
        let mut plus = initial_states.clone();
        let mut minus = initial_states.clone();
        plus[[b, j]] += H;
        minus[[b, j]] -= H;
        let expected = (eval(&params, &readout_params, &plus)
            - eval(&params, &readout_params, &minus))
            / (2. * H);
        assert_close(got, expected, &format!("initial state ({b}, {j})"));
    }
}
