use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use biochip::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sample(id: u64, volume: f64, temperature: f64) -> Sample {
    Sample::new(SampleId::new(id), volume, temperature)
}

fn below(rng: &mut StdRng, n: usize) -> usize {
    (rng.next_u64() % n as u64) as usize
}

fn assert_bijective(device: &Device) {
    let snapshot = device.snapshot();
    let mut seen = 0;
    for cell in snapshot.occupied() {
        let occupant = cell.occupant.expect("occupied cell");
        let at = device.position_of(occupant.id).expect("sample is placed");
        assert_eq!(device.coords(at).unwrap(), (cell.row, cell.col));
        seen += 1;
    }
    assert_eq!(seen, device.sample_count());
}

#[test]
fn merge_on_collapsed_three_by_three_grid() {
    let config = DeviceConfig::default()
        .with_shape(3, 3)
        .with_zones(ZoneLayout::new(0, 1, 2, 3));
    let device = Device::with_config(config).expect("valid config");

    device.introduce(sample(1, 0.5, 295.0)).unwrap();
    device.introduce(sample(2, 0.3, 295.0)).unwrap();
    let at = device
        .merge(sample(3, 0.0, 295.0), &[SampleId::new(1), SampleId::new(2)])
        .unwrap();

    let snapshot = device.snapshot();
    let occupied: Vec<_> = snapshot.occupied().collect();
    assert_eq!(occupied.len(), 1);
    let merged = occupied[0].occupant.expect("occupied");
    assert_eq!(merged.id, SampleId::new(3));
    assert!((merged.volume - 0.8).abs() < 1e-12);
    assert!(device.is_at(SampleId::new(3), at));
    assert!(!device.is_placed(SampleId::new(1)));
    assert!(!device.is_placed(SampleId::new(2)));
}

#[test]
fn blocked_route_stops_on_last_reached_pad() {
    let device = Device::start(0, 0).unwrap();
    let origin = device.pad(0, 0);
    device.place(sample(1, 0.5, 295.0), origin).unwrap();
    device.place(sample(2, 0.5, 295.0), device.pad(0, 2)).unwrap();

    let route = device.path(origin, device.pad(0, 3), true).unwrap();
    assert_eq!(route.hops(), 3);
    let err = device.follow_route(&route, 0).unwrap_err();

    assert!(matches!(
        err,
        Error::Blocked {
            from: (0, 1),
            to: (0, 2)
        }
    ));
    assert!(device.is_at(SampleId::new(1), device.pad(0, 1)));
    assert!(device.is_at(SampleId::new(2), device.pad(0, 2)));
}

#[test]
fn equilibrate_returns_to_the_original_pad() {
    let device = Device::start(0, 0).unwrap();
    let home = device.introduce(sample(1, 0.5, 300.0)).unwrap();

    let incubation = device
        .start_equilibrate(&[SampleId::new(1)], Duration::from_secs(60))
        .unwrap();
    assert_ne!(device.position_of(SampleId::new(1)), Some(home));

    device
        .end_equilibrate(incubation, &[SampleId::new(1)], &[sample(2, 0.5, 301.0)])
        .unwrap();
    assert!(device.is_at(SampleId::new(2), home));
    assert_eq!(device.tint(), Tint::Normal);
}

#[test]
fn merge_then_split_conserves_volume() {
    let mut rng = StdRng::seed_from_u64(7);
    let device = Device::start(0, 0).unwrap();

    let volumes: Vec<f64> = (0..3).map(|_| (1 + below(&mut rng, 8)) as f64 / 8.0).collect();
    let total: f64 = volumes.iter().sum();
    for (i, volume) in volumes.iter().enumerate() {
        device.introduce(sample(i as u64 + 1, *volume, 295.0)).unwrap();
    }
    let ins: Vec<_> = (1..=3).map(SampleId::new).collect();
    device.merge(sample(10, 0.0, 295.0), &ins).unwrap();
    let merged = device
        .position_of(SampleId::new(10))
        .and_then(|at| device.occupant(at))
        .expect("merged sample");
    assert!((merged.volume - total).abs() < 1e-12);

    let outs = [
        sample(20, 0.0, 295.0),
        sample(21, total / 4.0, 295.0),
        sample(22, total / 4.0, 295.0),
    ];
    let targets = device.split(SampleId::new(10), &outs).unwrap();
    let split_total: f64 = targets
        .iter()
        .map(|at| device.occupant(*at).expect("output placed").volume)
        .sum();
    assert!((split_total - total).abs() < 1e-12);
    assert!(!device.is_placed(SampleId::new(10)));
    assert_bijective(&device);
}

#[test]
fn batch_finishes_within_total_route_length() {
    let mut rng = StdRng::seed_from_u64(11);
    let sink = Arc::new(Mutex::new(VecSink::new()));
    let device = Device::launch(DeviceConfig::default(), Arc::clone(&sink)).unwrap();

    let mut routes = Vec::new();
    for lane in 0..5 {
        let row = 2 * lane;
        let from = device.pad(row, below(&mut rng, 4));
        let to = device.pad(row, 6 + below(&mut rng, 10));
        device.place(sample(lane as u64 + 1, 0.5, 295.0), from).unwrap();
        routes.push(device.path(from, to, true).unwrap());
    }
    let total: usize = routes.iter().map(Route::hops).sum();
    let longest = routes.iter().map(Route::hops).max().unwrap_or(0);

    device.follow_routes(&routes, 1).unwrap();

    let rounds = sink.lock().unwrap().count(DeviceEventKind::RoundCompleted);
    assert!(rounds <= total);
    assert_eq!(rounds, longest);
    for (lane, route) in routes.iter().enumerate() {
        assert!(device.is_at(SampleId::new(lane as u64 + 1), route.destination()));
    }
}

#[test]
fn head_on_batch_reports_deadlock() {
    let device = Device::start(0, 0).unwrap();
    let left = device.pad(4, 4);
    let right = device.pad(4, 8);
    device.place(sample(1, 0.5, 295.0), left).unwrap();
    device.place(sample(2, 0.5, 295.0), right).unwrap();

    let routes = vec![
        device.path(left, right, true).unwrap(),
        device.path(right, left, true).unwrap(),
    ];
    assert!(matches!(
        device.follow_routes(&routes, 1),
        Err(Error::Deadlock { remaining: 2 })
    ));
    assert_bijective(&device);
}

#[test]
fn random_mutations_keep_placement_bijective() {
    let mut rng = StdRng::seed_from_u64(42);
    let device = Device::with_config(DeviceConfig::default().with_shape(6, 6)).unwrap();
    let mut next_id = 1u64;

    for _ in 0..400 {
        let at = device.pad(below(&mut rng, 6), below(&mut rng, 6));
        match below(&mut rng, 4) {
            0 => {
                let result = device.place(sample(next_id, 0.1, 295.0), at);
                assert_eq!(result.is_ok(), device.is_at(SampleId::new(next_id), at));
                next_id += 1;
            }
            1 => {
                let occupied = device.is_occupied(at);
                assert_eq!(device.extract(at).is_ok(), occupied);
            }
            2 => {
                if let Some(old) = device.occupant(at) {
                    device.replace(old.id, sample(next_id, 0.1, 295.0)).unwrap();
                    next_id += 1;
                }
            }
            _ => {
                let id = SampleId::new(1 + rng.next_u64() % next_id);
                let placed = device.is_placed(id);
                assert_eq!(device.remove(id).is_ok(), placed);
            }
        }
        assert_bijective(&device);
    }
}

#[test]
fn double_placement_is_rejected() {
    let device = Device::start(0, 0).unwrap();
    let a = device.pad(1, 1);
    device.place(sample(1, 0.5, 295.0), a).unwrap();
    assert!(matches!(
        device.place(sample(2, 0.5, 295.0), a),
        Err(Error::InvariantViolation(_))
    ));
    assert!(matches!(
        device.place(sample(1, 0.5, 295.0), device.pad(2, 2)),
        Err(Error::InvariantViolation(_))
    ));
    assert!(device.is_at(SampleId::new(1), a));
}

#[test]
fn stop_cancels_a_running_route() {
    let config = DeviceConfig::default().with_phase_delay(Duration::from_millis(5));
    let device = Arc::new(Device::with_config(config).unwrap());
    let origin = device.pad(0, 0);
    device.place(sample(1, 0.5, 295.0), origin).unwrap();
    let route = device.path(origin, device.pad(0, 20), true).unwrap();

    let stopper = {
        let device = Arc::clone(&device);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            device.stop();
        })
    };
    let result = device.follow_route(&route, 1);
    stopper.join().unwrap();

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(!device.is_executing());
    let at = device.position_of(SampleId::new(1)).expect("still placed");
    assert!(route.places().contains(&at));
    assert_ne!(at, route.destination());
}

#[test]
fn growth_preserves_pad_identity() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut grid = Grid::new(2, 3);
    for _ in 0..20 {
        let before: Vec<_> = grid.iter().map(|p| (p.id(), p.coords())).collect();
        let rows = grid.rows() + below(&mut rng, 3);
        let cols = grid.cols() + below(&mut rng, 3);
        grid.grow_to(rows, cols);
        assert_eq!(grid.dimensions(), (rows, cols));
        for (id, (row, col)) in before {
            assert_eq!(grid.id_at(row, col), Some(id));
            assert_eq!(grid.coords(id).unwrap(), (row, col));
        }
    }
}

#[test]
fn clearance_matches_window_definition() {
    let mut rng = StdRng::seed_from_u64(99);
    let (rows, cols) = (7, 7);
    for round in 0..50 {
        let grid = Grid::new(rows, cols);
        let mut placement = Placement::new();
        for i in 0..6 {
            let at = grid
                .id_at(below(&mut rng, rows), below(&mut rng, cols))
                .expect("in range");
            if !placement.is_occupied(at) {
                placement
                    .insert(sample(round * 10 + i, 0.1, 295.0), at)
                    .unwrap();
            }
        }
        let from = grid.id_at(below(&mut rng, rows), below(&mut rng, cols)).unwrap();
        let to = grid.id_at(below(&mut rng, rows), below(&mut rng, cols)).unwrap();
        let k = below(&mut rng, 3);

        let (tr, tc) = grid.coords(to).unwrap();
        let expected = !placement.iter().any(|(at, _)| {
            let (r, c) = grid.coords(at).unwrap();
            at != from && r.abs_diff(tr) <= k && c.abs_diff(tc) <= k
        });
        assert_eq!(
            can_step_to(&grid, &placement, from, to, k).unwrap(),
            expected,
            "from {from} to {to} with clearance {k}"
        );
    }
}

#[test]
fn pathfinder_routes_are_adjacent_and_anchored() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut grid = Grid::new(4, 4);
    for _ in 0..100 {
        let from = grid.ensure(below(&mut rng, 12), below(&mut rng, 12));
        let to = grid.ensure(below(&mut rng, 12), below(&mut rng, 12));
        let horizontal_first = rng.next_u32() % 2 == 0;
        let route = path_axis_first(&mut grid, from, to, horizontal_first).unwrap();

        assert_eq!(route.origin(), from);
        assert_eq!(route.destination(), to);
        for pair in route.coords().windows(2) {
            let step = pair[0].0.abs_diff(pair[1].0) + pair[0].1.abs_diff(pair[1].1);
            assert_eq!(step, 1);
        }
    }
}
