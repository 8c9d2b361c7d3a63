//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! End-to-end park/unpark cycle on a mount without firmware parking,
//! driven by the real poll worker.
//!

use eqdriver::mount::{Capabilities, SimulatorMount, SystemStatus};
use eqdriver::{Location, MotionState, MountDriver, Telescope};

fn set_up_logging() {
    let _ = simplelog::SimpleLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::ConfigBuilder::new()
            .set_target_level(simplelog::LevelFilter::Error)
            .set_time_offset(time::UtcOffset::UTC)
            .build()
    );
}

#[test]
fn manual_park_cycle_over_the_poll_worker() {
    set_up_logging();

    let mut sim = SimulatorMount::new(Capabilities{
        native_park: false, native_home: false, guide_rate_adjustable: false
    });
    // one report for the slew confirmation, then what the poll worker sees;
    // the final report repeats once the script runs out
    for system in [
        SystemStatus::Slewing, SystemStatus::Slewing,
        SystemStatus::TrackingPecOff
    ] {
        sim.push_system(system);
    }
    let log = sim.log();

    let telescope = Telescope::new(
        Box::new(sim), Location{ latitude: 52.2, longitude: 21.0 }, None, false
    );
    let mut driver = MountDriver::new(telescope, std::time::Duration::from_millis(20));

    driver.telescope().lock().unwrap().park().unwrap();
    assert_eq!(MotionState::Parking, driver.telescope().lock().unwrap().state());

    // enough polls for arrival plus all motor-stop phases
    std::thread::sleep(std::time::Duration::from_millis(300));
    assert_eq!(MotionState::Parked, driver.telescope().lock().unwrap().state());
    {
        let commands = log.lock().unwrap();
        assert!(commands.contains(&"set_slew_rate S1x".to_string()));
        assert!(commands.contains(&"start_motion East".to_string()));
    }

    driver.telescope().lock().unwrap().unpark().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(100));
    assert_eq!(MotionState::Idle, driver.telescope().lock().unwrap().state());
    assert!(log.lock().unwrap().contains(&"sync".to_string()));

    driver.stop();
}
