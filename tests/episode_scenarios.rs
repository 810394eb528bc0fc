use car_nn_learning::{
    Action, Car, CarParams, Episode, FixedPolicy, ObstacleField, Observation, Point, SENSOR_COUNT,
    SENSOR_SWEEP, SensorParams, SimConfig, StartPolicy, StepStatus, Termination,
};

fn small_car_config() -> SimConfig {
    SimConfig {
        car: CarParams {
            body_size: 20.0,
            margin: 2.0,
            ..CarParams::default()
        },
        start: StartPolicy::Fixed { x: 90.0, y: 90.0 },
        ..SimConfig::default()
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn always_left_on_open_field_follows_the_heading() {
    let field = ObstacleField::open(200, 200);
    let config = small_car_config();
    let mut episode = Episode::new(&field, &config, 1, [FixedPolicy(Action::SteerLeft)]);
    assert_eq!(episode.cars().next().unwrap().center(), Point::new(100.0, 100.0));

    // pos after each step for heading 10, 20, ... 90
    let expected = [
        (99.84807753012208, 88.26351822333069),
        (109.24500373798116, 84.843316790074),
        (117.90525777582555, 79.843316790074),
        (125.56570220701533, 73.41544069320861),
        (131.99357830388072, 65.75499626201884),
        (136.99357830388072, 57.09474222417445),
        (140.41377973713742, 47.69781601631537),
        (142.15026151380673, 37.84973848619329),
        (142.15026151380673, 27.84973848619329),
    ];
    let mut previous = episode.cars().next().unwrap().pos();
    for (step, &(x, y)) in expected.iter().enumerate() {
        assert!(matches!(episode.step().unwrap(), StepStatus::Running { alive: 1 }));
        let car = episode.cars().next().unwrap();
        assert_close(car.heading(), 10.0 * (step as f64 + 1.0));
        assert_close(car.pos().x, x);
        assert_close(car.pos().y, y);
        // turning left from heading 0 only ever moves right and up
        assert!(car.pos().x >= previous.x - 1e-9);
        assert!(car.pos().y < previous.y);
        previous = car.pos();
    }

    let car = episode.cars().next().unwrap();
    assert_close(car.heading(), 90.0);
    assert!(car.is_alive());
    assert_eq!(car.steps(), 9);
    assert_close(car.reward(), 10.0 * 9.0 / 50.0);
}

#[test]
fn obstacle_free_path_keeps_reward_linear() {
    let field = ObstacleField::open(200, 200);
    let config = SimConfig {
        max_steps: Some(40),
        ..small_car_config()
    };
    let mut episode = Episode::new(&field, &config, 1, [FixedPolicy(Action::SteerRight)]);
    let report = episode.run().unwrap();
    assert_eq!(report.termination, Termination::StepLimit);

    let car = episode.cars().next().unwrap();
    assert!(car.is_alive());
    assert_eq!(car.steps(), 40);
    assert_close(car.reward(), config.car.speed * 40.0 / 50.0);
    // fitness is the running sum of per-step rewards
    let expected: f64 = (1..=40).map(|k| f64::from(k) * 10.0 / 50.0).sum();
    assert!((report.fitness[0] - expected).abs() < 1e-9);
}

#[test]
fn all_blocked_population_scores_one_step() {
    let field = ObstacleField::from_fn(300, 300, |_, _| true);
    let config = SimConfig {
        start: StartPolicy::Fixed { x: 100.0, y: 100.0 },
        ..SimConfig::default()
    };
    let policies = vec![FixedPolicy(Action::SteerLeft), FixedPolicy(Action::SteerRight)];
    let mut episode = Episode::new(&field, &config, 7, policies);
    let report = episode.run().unwrap();

    assert_eq!(report.steps, 1);
    assert_eq!(report.termination, Termination::AllDead);
    assert!(report.fitness.iter().all(|&f| f > 0.0 && (f - 0.2).abs() < 1e-12));
}

#[test]
fn car_dies_on_wall_and_stays_frozen() {
    // the first car's left-hand loop reaches past x = 420, the second stays clear
    let field = ObstacleField::from_fn(1200, 600, |x, _| x >= 420);
    let config = SimConfig::default();
    let cars = vec![
        Car::new(Point::new(300.0, 200.0), config.car, config.sensors),
        Car::new(Point::new(100.0, 400.0), config.car, config.sensors).with_heading(180.0),
    ];
    // tied scores resolve to steer-left
    let tied = |_: &Observation| vec![1.0_f32, 1.0];
    let policies = vec![car_nn_learning::FnPolicy(tied), car_nn_learning::FnPolicy(tied)];
    let config = SimConfig {
        max_steps: Some(30),
        ..config
    };
    let mut episode = Episode::with_cars(&field, &config, 0, cars, policies).unwrap();

    let mut death_step = None;
    let mut frozen = None;
    while let StepStatus::Running { .. } = episode.step().unwrap() {
        let first = episode.cars().next().unwrap();
        match (first.is_alive(), frozen) {
            (false, None) => {
                death_step = Some(episode.steps());
                frozen = Some((first.pos(), first.reward()));
            }
            (false, Some(state)) => assert_eq!((first.pos(), first.reward()), state),
            _ => {}
        }
    }
    assert!(death_step.is_some(), "the first car must crash");
    assert!(episode.cars().nth(1).unwrap().is_alive());
    let first = episode.cars().next().unwrap();
    assert!(!first.is_alive());
    assert_eq!(first.steps(), death_step.unwrap());
}

#[test]
fn readings_cover_the_sweep_within_range() {
    let field = ObstacleField::from_fn(900, 900, |x, y| (x + y) % 97 == 0);
    let sensors = SensorParams::default();
    for heading in (0..360).step_by(15) {
        let mut car = Car::new(Point::new(400.0, 400.0), CarParams::default(), sensors)
            .with_heading(f64::from(heading));
        car.scan(&field);
        assert_eq!(car.readings().len(), SENSOR_COUNT);
        let observation = car.normalized_observation();
        for ((reading, angle), value) in car.readings().iter().zip(SENSOR_SWEEP).zip(observation) {
            assert_eq!(reading.angle, angle);
            assert!((0.0..=300.0).contains(&reading.distance));
            if reading.distance == 300.0 {
                assert!(!reading.hit);
            }
            assert_eq!(value, (reading.distance / 5.0).floor() as u32);
        }
    }
}

#[test]
fn random_starts_differ_between_generations() {
    let field = ObstacleField::open(1500, 800);
    let config = SimConfig {
        start: StartPolicy::Random {
            seed: 42,
            x: (100.0, 1300.0),
            y: (100.0, 600.0),
        },
        ..SimConfig::default()
    };
    let policies = || vec![FixedPolicy(Action::SteerLeft); 3];
    let first: Vec<Point> = Episode::new(&field, &config, 1, policies()).cars().map(Car::pos).collect();
    let again: Vec<Point> = Episode::new(&field, &config, 1, policies()).cars().map(Car::pos).collect();
    let next: Vec<Point> = Episode::new(&field, &config, 2, policies()).cars().map(Car::pos).collect();
    assert_eq!(first, again);
    assert_ne!(first, next);
}
