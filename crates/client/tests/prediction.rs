//! End-to-end prediction and reconciliation scenarios, driving the
//! predictor exactly the way the client facade does.

use aster::command::controls;
use aster::{PlayerCommand, Point, Ship, WorldSnapshot};
use aster_client::Predictor;
use uuid::Uuid;

fn world_at(player: Uuid, tick: u64, position: Point, velocity: Point) -> WorldSnapshot {
    let mut world = WorldSnapshot::new("Sol");
    world.set_tick(tick);
    let mut ship = Ship::new(Uuid::new_v4());
    ship.owner = Some(player);
    ship.position = position;
    ship.velocity = velocity;
    world.add_ship(ship);
    world
}

#[test]
fn prediction_round_trip_matches_server() {
    let player = Uuid::new_v4();
    let client_world = world_at(player, 100, Point::ZERO, Point::new(1.0, 0.0));
    let mut server_world = client_world.clone();

    let command = PlayerCommand::new(player, 100, controls::THRUST, 1);

    // Client predicts immediately.
    let mut predictor = Predictor::new();
    let predicted = predictor.predict_next(&client_world, &command);
    predictor.record_command(command.clone());

    assert_eq!(predicted.tick(), 101);
    assert_eq!(
        predicted.player_ship(&player).unwrap().position,
        Point::new(1.0, 0.0)
    );

    // Server applies the same command and steps.
    server_world.apply_command(&command);
    server_world.step();
    assert_eq!(server_world.tick(), 101);
    assert_eq!(
        server_world.player_ship(&player).unwrap().position,
        Point::new(1.0, 0.0)
    );

    // Reconciliation confirms everything; no replay, no error.
    let reconciled = predictor.reconcile_with_server(&server_world, 101);
    assert_eq!(
        reconciled.player_ship(&player).unwrap().position,
        Point::new(1.0, 0.0)
    );
    assert_eq!(predictor.unconfirmed_count(), 0);
    assert_eq!(predictor.prediction_errors(), 0);
}

#[test]
fn replay_after_partial_confirmation() {
    let player = Uuid::new_v4();
    let mut predictor = Predictor::new();

    // Three commands sent while the server stalls.
    for (tick, sequence) in [(100u64, 1u32), (101, 2), (102, 3)] {
        predictor.record_command(PlayerCommand::new(player, tick, controls::THRUST, sequence));
    }

    // The server has only reached tick 100.
    let server_world = world_at(player, 100, Point::ZERO, Point::new(1.0, 0.0));
    let reconciled = predictor.reconcile_with_server(&server_world, 100);

    // Commands for ticks 101 and 102 remain and were replayed: two steps.
    assert_eq!(predictor.unconfirmed_count(), 2);
    assert_eq!(reconciled.tick(), 102);

    // Two steps of motion from the server basis, plus thrust from the
    // first replayed command feeding the second step.
    let ship = reconciled.player_ship(&player).unwrap();
    assert!(ship.position.x > 1.9);
}

#[test]
fn reconcile_applies_commands_in_tick_then_sequence_order() {
    let player = Uuid::new_v4();
    let mut predictor = Predictor::new();

    // Recorded out of order on purpose.
    predictor.record_command(PlayerCommand::new(player, 102, controls::TURN_LEFT, 3));
    predictor.record_command(PlayerCommand::new(player, 101, controls::TURN_RIGHT, 2));

    let server_world = world_at(player, 100, Point::ZERO, Point::ZERO);
    let reconciled = predictor.reconcile_with_server(&server_world, 100);

    // Both commands replayed; net turn cancels out.
    assert_eq!(reconciled.tick(), 102);
    let facing = reconciled.player_ship(&player).unwrap().facing;
    assert!(facing.degrees().abs() < 1e-9);
}

#[test]
fn stale_commands_are_dropped_without_replay() {
    let player = Uuid::new_v4();
    let mut predictor = Predictor::new();
    for tick in 90..95u64 {
        predictor.record_command(PlayerCommand::new(player, tick, controls::THRUST, tick as u32));
    }

    let server_world = world_at(player, 100, Point::new(5.0, 5.0), Point::ZERO);
    let reconciled = predictor.reconcile_with_server(&server_world, 100);

    assert_eq!(predictor.unconfirmed_count(), 0);
    assert_eq!(reconciled.tick(), 100);
    assert_eq!(
        reconciled.player_ship(&player).unwrap().position,
        Point::new(5.0, 5.0)
    );
}
