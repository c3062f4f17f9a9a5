use deer::{
    MlErr,
    arch::{
        Readout, StepFunction,
        activations::ActFn,
        cells::{Cell, Elman, Gru, Linear},
        layers::Dense,
    },
    rollout::rollout_batch,
    solver::{self, SolverConfig, SolverMethod},
};
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis, array, s};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_array2(rng: &mut StdRng, dim: (usize, usize)) -> Array2<f64> {
    Array2::from_shape_fn(dim, |_| rng.random_range(-1.0..1.0))
}

fn max_abs_diff(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
    (&a - &b).fold(0., |m: f64, x| m.max(x.abs()))
}

fn sequential_config() -> SolverConfig {
    SolverConfig {
        method: SolverMethod::Sequential,
        ..Default::default()
    }
}

#[test]
fn leaky_integrator_converges_from_any_guess() {
    init_logger();

    let cell = Linear::new(1, 1);
    let params = cell.leaky_params(0.5).unwrap();
    let inputs = Array2::ones((4, 1));
    let y0 = array![0.];
    let expected = array![[0.5], [0.75], [0.875], [0.9375]];

    let mut rng = StdRng::seed_from_u64(0);
    let guesses = [
        Array2::zeros((4, 1)),
        Array2::from_elem((4, 1), 100.),
        Array2::from_elem((4, 1), -1e6),
        random_array2(&mut rng, (4, 1)) * 10.,
    ];

    for guess in guesses {
        let solution = solver::solve(
            &cell,
            &params,
            y0.view(),
            inputs.view(),
            guess.view(),
            &SolverConfig::default(),
        )
        .unwrap();

        let stats = solution.stats();
        assert!(stats.converged);
        assert!(stats.iterations < 10, "{} iterations", stats.iterations);
        assert!(max_abs_diff(solution.trajectory(), expected.view()) < 1e-6);
    }
}

#[test]
fn converged_trajectory_satisfies_the_recurrence() {
    let mut rng = StdRng::seed_from_u64(1);
    let cell = Gru::new(3, 2);
    let params = cell.init(1).unwrap();
    let inputs = random_array2(&mut rng, (50, 2));
    let y0 = array![0.2, -0.1, 0.4];
    let guess = Array2::zeros((50, 3));

    let solution = solver::solve(
        &cell,
        &params,
        y0.view(),
        inputs.view(),
        guess.view(),
        &SolverConfig::default(),
    )
    .unwrap();
    assert!(solution.stats().converged);

    let trajectory = solution.trajectory();
    let mut prev = y0.clone();
    for (i, row) in trajectory.outer_iter().enumerate() {
        let next = cell.apply(&params, prev.view(), inputs.row(i)).unwrap();
        let err = (&next - &row).fold(0., |m: f64, x| m.max(x.abs()));
        assert!(err < 1e-6, "position {i}: {err}");
        prev = row.to_owned();
    }
}

#[test]
fn matches_sequential_evaluation() {
    let mut rng = StdRng::seed_from_u64(2);
    let cells = [
        Cell::Elman(Elman::new(4, 3, ActFn::tanh())),
        Cell::Gru(Gru::new(4, 3)),
        Cell::Linear(Linear::new(4, 3)),
    ];

    for cell in cells {
        let params = cell.init(2).unwrap();
        let inputs = random_array2(&mut rng, (33, 3));
        let y0 = Array1::zeros(4);
        let guess = Array2::zeros((33, 4));

        let parallel = solver::solve(
            &cell,
            &params,
            y0.view(),
            inputs.view(),
            guess.view(),
            &SolverConfig::default(),
        )
        .unwrap();
        let sequential = solver::solve(
            &cell,
            &params,
            y0.view(),
            inputs.view(),
            guess.view(),
            &sequential_config(),
        )
        .unwrap();

        let err = max_abs_diff(parallel.trajectory(), sequential.trajectory());
        assert!(err < 1e-6, "{cell:?}: {err}");
        assert!(sequential.stats().converged);
    }
}

#[test]
fn warm_start_needs_no_more_iterations() {
    let mut rng = StdRng::seed_from_u64(3);
    let cell = Gru::new(4, 2);
    let params = cell.init(3).unwrap();
    let inputs = random_array2(&mut rng, (64, 2));
    let y0 = Array1::zeros(4);
    let cold = Array2::zeros((64, 4));
    let config = SolverConfig::default();

    let previous = solver::solve(&cell, &params, y0.view(), inputs.view(), cold.view(), &config)
        .unwrap()
        .into_trajectory();

    let perturbed: Vec<f64> = params
        .iter()
        .map(|p| p + 1e-4 * rng.random_range(-1.0..1.0))
        .collect();

    let cold_stats = solver::solve(&cell, &perturbed, y0.view(), inputs.view(), cold.view(), &config)
        .unwrap()
        .stats();
    let warm_stats = solver::solve(
        &cell,
        &perturbed,
        y0.view(),
        inputs.view(),
        previous.view(),
        &config,
    )
    .unwrap()
    .stats();

    assert!(cold_stats.converged && warm_stats.converged);
    assert!(
        warm_stats.iterations <= cold_stats.iterations,
        "warm {} > cold {}",
        warm_stats.iterations,
        cold_stats.iterations
    );
}

#[test]
fn zero_iterations_return_the_guess() {
    init_logger();

    let cell = Linear::new(1, 1);
    let params = cell.leaky_params(0.5).unwrap();
    let inputs = Array2::ones((4, 1));
    let guess = Array2::from_elem((4, 1), 3.);
    let config = SolverConfig {
        max_iter: 0,
        ..Default::default()
    };

    let y0 = array![0.];

    let solution =
        solver::solve(&cell, &params, y0.view(), inputs.view(), guess.view(), &config).unwrap();

    assert_eq!(solution.trajectory(), guess);
    assert_eq!(solution.stats().iterations, 0);
    assert!(!solution.stats().converged);
}

#[test]
fn empty_sequence() {
    let cell = Gru::new(2, 1);
    let params = cell.init(0).unwrap();
    let inputs = Array2::zeros((0, 1));
    let guess = Array2::zeros((0, 2));
    let y0 = array![0.5, -0.5];

    let solution = solver::solve(
        &cell,
        &params,
        y0.view(),
        inputs.view(),
        guess.view(),
        &SolverConfig::default(),
    )
    .unwrap();

    assert_eq!(solution.trajectory().dim(), (0, 2));
    assert_eq!(solution.final_state(), y0);
    assert!(solution.stats().converged);
    assert_eq!(solution.stats().iterations, 0);
}

#[test]
fn shape_mismatches_fail_fast() {
    let cell = Gru::new(2, 1);
    let params = cell.init(0).unwrap();
    let inputs = Array2::zeros((5, 1));
    let y0 = array![0., 0.];
    let config = SolverConfig::default();

    let short_guess = Array2::zeros((4, 2));
    let err = solver::solve(&cell, &params, y0.view(), inputs.view(), short_guess.view(), &config)
        .err()
        .unwrap();
    assert!(matches!(err, MlErr::SizeMismatch { got: 4, expected: 5, .. }));

    let guess = Array2::zeros((5, 2));
    assert!(solver::solve(&cell, &params[1..], y0.view(), inputs.view(), guess.view(), &config).is_err());
    assert!(solver::solve(&cell, &params, array![0.].view(), inputs.view(), guess.view(), &config).is_err());

    let wide_inputs = Array2::zeros((5, 2));
    assert!(solver::solve(&cell, &params, y0.view(), wide_inputs.view(), guess.view(), &config).is_err());
}

#[test]
fn non_finite_values_propagate() {
    init_logger();

    let cell = Linear::new(1, 1);
    let params = vec![f64::NAN, 1., 0.];
    let inputs = Array2::ones((4, 1));
    let guess = Array2::zeros((4, 1));
    let y0 = array![0.];

    let solution = solver::solve(
        &cell,
        &params,
        y0.view(),
        inputs.view(),
        guess.view(),
        &SolverConfig::default(),
    )
    .unwrap();

    let stats = solution.stats();
    assert!(!stats.converged);
    assert_eq!(stats.iterations, 1);
    assert!(stats.residual.is_nan());
    assert!(solution.trajectory().iter().all(|x| x.is_nan()));
}

#[test]
fn batched_rollout_equals_separate_solves() {
    init_logger();

    let mut rng = StdRng::seed_from_u64(4);
    let cell = Gru::new(3, 2);
    let params = cell.init(4).unwrap();
    let readout = Dense::new((3, 5), None);
    let readout_params = readout.init(5).unwrap();

    let inputs = Array3::from_shape_fn((4, 12, 2), |_| rng.random_range(-1.0..1.0));
    let initial_states = random_array2(&mut rng, (4, 3));
    let guesses = Array3::zeros((4, 12, 3));
    let config = SolverConfig::default();

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
    let trajectories = rollout.trajectories();

    for b in 0..4 {
        let solution = solver::solve(
            &cell,
            &params,
            initial_states.row(b),
            inputs.index_axis(Axis(0), b),
            guesses.index_axis(Axis(0), b),
            &config,
        )
        .unwrap();

        let err = max_abs_diff(trajectories.index_axis(Axis(0), b), solution.trajectory());
        assert!(err < 1e-12, "example {b}: {err}");

        let final_state = solution.final_state().insert_axis(Axis(0));
        let output = readout.apply(&readout_params, final_state).unwrap();
        let err = max_abs_diff(rollout.outputs().slice(s![b..b + 1, ..]), output.view());
        assert!(err < 1e-12, "example {b}: {err}");
    }
}

#[test]
fn rollout_rejects_mismatched_batches() {
    let cell = Gru::new(3, 2);
    let params = cell.init(0).unwrap();
    let readout = Dense::new((3, 2), None);
    let readout_params = readout.init(0).unwrap();

    let inputs = Array3::zeros((4, 6, 2));
    let initial_states = Array2::zeros((3, 3));
    let guesses = Array3::zeros((4, 6, 3));

    let result = rollout_batch(
        &cell,
        &params,
        &readout,
        &readout_params,
        initial_states.view(),
        inputs.view(),
        guesses.view(),
        &SolverConfig::default(),
    );

    assert!(result.is_err());
}
