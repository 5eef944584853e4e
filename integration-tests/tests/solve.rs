use approx::assert_relative_eq;
use colloc_core::{Bounds, Problem};
use colloc_observers::ProgressLogger;
use colloc_solvers::{
    direct_collocation::{Solution, Solver, SparsityDetection, Status},
    nlp::Options,
};
use integration_tests::problems::{ConstantRate, Integrator, PointMass};

fn solve<P: Problem>(solver: &Solver<'_, P>) -> Solution {
    let guess = solver.create_initial_guess_from_bounds().unwrap();
    solver.solve(&guess).unwrap()
}

fn trapezoidal<P: Problem>(problem: &P, mesh_points: usize) -> Solver<'_, P> {
    let mut solver = Solver::new(problem);
    solver.set_transcription_scheme("trapezoidal");
    solver.set_num_mesh_points(mesh_points).unwrap();
    solver
}

#[test]
fn free_endpoint_needs_no_effort() {
    let problem = Integrator::new();
    let solver = trapezoidal(&problem, 3);

    let solution = solve(&solver);

    assert_eq!(solution.status, Status::Converged);
    assert_relative_eq!(solution.objective, 0.0, epsilon = 1e-8);
    assert_eq!(solution.iterate.num_points(), 3);
}

#[test]
fn reaching_the_control_limit_costs_one() {
    let problem = Integrator::reaching(1.0);
    let solver = trapezoidal(&problem, 3);

    let solution = solve(&solver);

    assert!(solution.is_success());
    assert_relative_eq!(solution.objective, 1.0, epsilon = 1e-4);
    for u in solution.iterate.control("u").unwrap() {
        assert_relative_eq!(u, 1.0, epsilon = 1e-4);
    }
    let x = solution.iterate.state("x").unwrap();
    assert_relative_eq!(x[1], 0.5, epsilon = 1e-4);
    assert_eq!(x[2], 1.0);
}

#[test]
fn mesh_can_change_between_solves() {
    let problem = Integrator::reaching(1.0);
    let mut solver = trapezoidal(&problem, 3);
    let coarse = solve(&solver);

    solver.set_num_mesh_points(6).unwrap();
    assert_eq!(solver.mesh().unwrap().num_points(), 6);

    let guess = solver.resample_iterate(&coarse.iterate).unwrap();
    assert_eq!(guess.num_points(), 6);
    let fine = solver.solve(&guess).unwrap();

    assert!(fine.is_success());
    assert_eq!(fine.iterate.num_points(), 6);
    assert_relative_eq!(fine.iterate.times[1], 0.2, epsilon = 1e-15);
    assert_relative_eq!(fine.objective, 1.0, epsilon = 1e-4);

    // The coarse iterate no longer fits the grid.
    assert!(solver.solve(&coarse.iterate).is_err());
}

#[test]
fn hermite_simpson_interpolates_midpoint_controls() {
    let problem = Integrator::reaching(0.5);
    let mut solver = Solver::new(&problem);
    solver.set_num_mesh_points(4).unwrap();
    assert_eq!(solver.transcription_scheme(), "hermite-simpson");

    let solution = solve(&solver);

    assert!(solution.is_success());
    assert_eq!(solution.iterate.num_points(), 7);
    assert_relative_eq!(solution.objective, 0.25, epsilon = 1e-5);

    let u = solution.iterate.control("u").unwrap();
    for i in 0..3 {
        let mid = 2 * i + 1;
        assert_relative_eq!(u[mid], 0.5 * (u[mid - 1] + u[mid + 1]), epsilon = 1e-7);
        assert_relative_eq!(u[mid], 0.5, epsilon = 1e-4);
    }
}

#[test]
fn implicit_point_mass_matches_minimum_effort() {
    let problem = PointMass::new();
    let mut solver = Solver::new(&problem);
    solver.set_num_mesh_points(5).unwrap();
    solver.set_implicit_mode_acceleration_bounds(Bounds::new(-100.0, 100.0).unwrap());
    assert!(solver.is_dynamics_mode_implicit());

    let solution = solve(&solver);

    assert!(solution.is_success());
    assert_relative_eq!(solution.objective, 12.0, max_relative = 0.05);

    let iterate = &solution.iterate;
    assert_eq!(iterate.derivative_names, vec!["a"]);
    let a = iterate.derivative("a").unwrap();
    let u = iterate.control("u").unwrap();
    for (a, u) in a.iter().zip(&u) {
        assert_relative_eq!(*a, *u, epsilon = 1e-6);
    }
    assert_relative_eq!(u[0], 6.0, max_relative = 0.1);
}

#[test]
fn free_final_time_is_minimized() {
    let problem = Integrator::minimum_time(1.0, Bounds::new(0.1, 5.0).unwrap());
    let solver = trapezoidal(&problem, 5);

    let solution = solve(&solver);

    assert!(solution.is_success());
    assert_relative_eq!(solution.iterate.final_time, 1.0, epsilon = 1e-4);
    assert_relative_eq!(solution.objective, 1.0, epsilon = 1e-4);
    assert_relative_eq!(*solution.iterate.times.last().unwrap(), 1.0, epsilon = 1e-4);
}

#[test]
fn parameters_are_optimized() {
    let problem = ConstantRate::new();
    let solver = trapezoidal(&problem, 4);

    let solution = solve(&solver);

    assert!(solution.is_success());
    assert_relative_eq!(solution.iterate.parameter("rate").unwrap(), 2.0, epsilon = 1e-5);
    assert_relative_eq!(solution.objective, 1.0, epsilon = 1e-4);
}

#[test]
fn detected_sparsity_is_reported() {
    let problem = Integrator::reaching(1.0);
    let mut solver = trapezoidal(&problem, 5);
    let block = solve(&solver).sparsity;
    assert_eq!(block.detection, SparsityDetection::None);
    assert_eq!(block.samples, 0);

    solver.set_sparsity_detection("initial-guess").unwrap();
    let from_guess = solve(&solver);
    assert!(from_guess.is_success());
    assert_eq!(from_guess.sparsity.samples, 1);
    assert!(from_guess.sparsity.jacobian_nonzeros <= block.jacobian_nonzeros);

    solver.set_sparsity_detection("random").unwrap();
    solver.set_sparsity_detection_random_count(2).unwrap();
    let random = solve(&solver);
    assert!(random.is_success());
    assert_eq!(random.sparsity.detection, SparsityDetection::Random);
    assert_eq!(random.sparsity.samples, 2);
    assert_relative_eq!(random.objective, 1.0, epsilon = 1e-4);
}

#[test]
fn thread_pool_matches_serial_evaluation() {
    let problem = Integrator::reaching(1.0);
    let mut solver = trapezoidal(&problem, 8);
    let serial = solve(&solver);

    solver.set_parallelism("thread", 3).unwrap();
    let threaded = solve(&solver);

    assert_eq!(threaded.status, serial.status);
    assert_eq!(threaded.iterations, serial.iterations);
    assert_relative_eq!(threaded.objective, serial.objective, epsilon = 1e-12);
}

#[test]
fn progress_logger_sees_every_iteration() {
    let problem = Integrator::reaching(1.0);
    let mut solver = trapezoidal(&problem, 4);
    solver.set_callback_interval(1);
    solver.set_plugin_options(Options::new().with("verbose", true).with("print_time", true));
    let guess = solver.create_initial_guess_from_bounds().unwrap();

    let mut logger = ProgressLogger::new();
    let solution = solver.solve_observed(&guess, &mut logger).unwrap();

    assert!(solution.is_success());
    assert_eq!(logger.events(), solution.iterations);
    assert!(logger.best_objective().is_some());
}

#[test]
fn limited_memory_backend_option() {
    let problem = Integrator::reaching(1.0);
    let mut solver = trapezoidal(&problem, 4);
    solver.set_solver_options(
        Options::new()
            .with("hessian_approximation", "limited-memory")
            .with("max_iterations", 200),
    );

    let solution = solve(&solver);

    assert!(solution.is_success());
    assert_relative_eq!(solution.objective, 1.0, epsilon = 1e-4);
}
