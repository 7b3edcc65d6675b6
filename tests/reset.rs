mod common;

use fritz_provision::{
    services::reset::ResetService,
    simulation::{SimEvent, SimulatedDevice, SimulatedRouter},
};
use tempfile::tempdir;

fn retries(router: &SimulatedRouter) -> usize {
    router
        .events()
        .iter()
        .filter(|event| **event == SimEvent::ResetRetried)
        .count()
}

#[test]
fn retry_prompt_rearms_the_confirmation_wait() {
    let dir = tempdir().expect("should create temp dir");
    // the retry shows up late in the first wait, the button press comes
    // late in the second one
    let router = SimulatedRouter::new(SimulatedDevice {
        reset_confirm_checks: 17,
        reset_retry_prompts: 1,
        ..Default::default()
    });
    let mut controller = common::controller(&router, Some("secret"), dir.path());
    controller.login().expect("should log in");

    ResetService::factory_reset(&mut controller).expect("should reset");

    let events = router.events();
    let retried = events
        .iter()
        .position(|e| *e == SimEvent::ResetRetried)
        .expect("should retry");
    let reset = events
        .iter()
        .position(|e| *e == SimEvent::FactoryReset)
        .expect("should reset");
    assert!(retried < reset);
    assert!(controller.session().was_reset);
}

#[test]
fn retries_use_up_the_confirmation_cycles() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice {
        reset_retry_prompts: 10,
        ..Default::default()
    });
    let mut controller = common::controller(&router, Some("secret"), dir.path());
    controller.login().expect("should log in");

    let err = ResetService::factory_reset(&mut controller).unwrap_err();

    assert!(format!("{err:#}").contains("failed to confirm factory reset"));
    // one initial wait plus three re-armed ones
    assert_eq!(retries(&router), 3);
    assert!(!router.events().contains(&SimEvent::FactoryReset));
    assert!(!controller.session().was_reset);
}

#[test]
fn missing_button_press_fails_the_reset() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice {
        reset_confirm_checks: u32::MAX,
        ..Default::default()
    });
    let mut controller = common::controller(&router, Some("secret"), dir.path());
    controller.login().expect("should log in");

    let err = ResetService::factory_reset(&mut controller).unwrap_err();

    assert!(format!("{err:#}").contains("no button press"));
    assert_eq!(retries(&router), 0);
    assert!(!router.events().contains(&SimEvent::FactoryReset));
}
