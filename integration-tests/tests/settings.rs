use approx::assert_relative_eq;
use colloc_core::Bounds;
use colloc_solvers::{
    direct_collocation::{ConfigError, Parallelism, Settings, Solver, SparsityDetection},
    nlp::{FiniteDifference, OptionValue},
};
use integration_tests::problems::Integrator;
use serde::Deserialize;

const FIXTURE: &str = include_str!("fixtures/settings.toml");

#[test]
fn loads_settings_from_toml() {
    let settings: Settings = toml::from_str(FIXTURE).unwrap();

    assert_eq!(settings.mesh.as_ref().unwrap().num_points(), 5);
    assert_eq!(settings.transcription_scheme, "trapezoidal");
    assert_eq!(settings.finite_difference_scheme, FiniteDifference::Forward);
    assert_eq!(settings.sparsity_detection, SparsityDetection::Random);
    assert_eq!(settings.sparsity_detection_random_count, 2);
    assert_eq!(
        settings.implicit_mode_acceleration_bounds,
        Bounds::new(-50.0, 50.0).unwrap()
    );
    assert_eq!(settings.parallelism, Parallelism::Thread { num_threads: 2 });
    assert_eq!(
        settings.solver_options.get("max_iterations"),
        Some(&OptionValue::Int(200))
    );

    // Unlisted fields keep their defaults.
    assert!(settings.interpolate_control_midpoints);
    assert!(settings.write_sparsity.is_empty());
}

#[test]
fn solves_with_loaded_settings() {
    let settings: Settings = toml::from_str(FIXTURE).unwrap();
    let problem = Integrator::reaching(1.0);
    let solver = Solver::with_settings(&problem, settings).unwrap();
    assert_eq!(solver.random_seed(), 42);

    let guess = solver.create_initial_guess_from_bounds().unwrap();
    let solution = solver.solve(&guess).unwrap();

    assert!(solution.is_success());
    assert_eq!(solution.iterate.num_points(), 5);
    assert_eq!(solution.sparsity.samples, 2);
    assert_relative_eq!(solution.objective, 1.0, epsilon = 1e-4);
}

#[test]
fn rejects_invalid_settings() {
    let unknown_field = "mesh = [0.0, 1.0]\ncolor = \"blue\"\n";
    assert!(toml::from_str::<Settings>(unknown_field).is_err());

    let bad_mesh = "mesh = [0.0, 0.7, 0.5, 1.0]\n";
    assert!(toml::from_str::<Settings>(bad_mesh).is_err());

    let inverted = "implicit_component_derivative_bounds = [1.0, -1.0]\n";
    assert!(toml::from_str::<Settings>(inverted).is_err());

    let zero_count: Settings = toml::from_str("sparsity_detection_random_count = 0\n").unwrap();
    let problem = Integrator::new();
    assert_eq!(
        Solver::with_settings(&problem, zero_count).err(),
        Some(ConfigError::ZeroRandomCount)
    );
}

#[test]
fn openmp_is_an_alias_for_threads() {
    let settings: Settings =
        toml::from_str("[parallelism]\nmode = \"openmp\"\nnum_threads = 4\n").unwrap();
    assert_eq!(settings.parallelism, Parallelism::Thread { num_threads: 4 });
}

#[test]
fn settings_round_trip_through_json() {
    let settings: Settings = toml::from_str(FIXTURE).unwrap();

    let json = serde_json::to_string(&settings).unwrap();
    let back: Settings = serde_json::from_str(&json).unwrap();

    assert_eq!(back, settings);
}

/// A driver file that keeps several named settings bundles.
#[derive(Debug, Deserialize)]
struct Study {
    name: String,
    runs: Vec<Settings>,
}

#[test]
fn settings_nest_inside_driver_files() {
    let study: Study = toml::from_str(
        r#"
        name = "refinement"

        [[runs]]
        mesh = [0.0, 0.5, 1.0]
        transcription_scheme = "trapezoidal"

        [[runs]]
        mesh = [0.0, 0.25, 0.5, 0.75, 1.0]
        "#,
    )
    .unwrap();

    assert_eq!(study.name, "refinement");
    assert_eq!(study.runs.len(), 2);
    assert_eq!(study.runs[1].transcription_scheme, "hermite-simpson");

    let problem = Integrator::reaching(1.0);
    let objectives: Vec<f64> = study
        .runs
        .into_iter()
        .map(|settings| {
            let solver = Solver::with_settings(&problem, settings).unwrap();
            let guess = solver.create_initial_guess_from_bounds().unwrap();
            solver.solve(&guess).unwrap().objective
        })
        .collect();

    for objective in objectives {
        assert_relative_eq!(objective, 1.0, epsilon = 1e-4);
    }
}
