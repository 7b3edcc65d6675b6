mod common;

use common::ScriptedOperator;
use fritz_provision::{
    operator::StepChoice,
    orchestrator::{RunOutcome, Step, StepKind},
    services::wlan::SignalQuality,
    simulation::{ResetUi, SimDialog, SimEvent, SimulatedDevice, SimulatedRouter, WlanUi},
};
use std::collections::VecDeque;
use tempfile::tempdir;

fn flashed(router: &SimulatedRouter) -> Vec<String> {
    router
        .events()
        .into_iter()
        .filter_map(|event| match event {
            SimEvent::Flashed(version) => Some(version),
            _ => None,
        })
        .collect()
}

#[test]
fn provisions_an_old_device_end_to_end() {
    let dir = tempdir().expect("should create temp dir");
    let device = SimulatedDevice::default();
    let networks = device.networks.clone();
    let router = SimulatedRouter::new(device);

    let mut orchestrator =
        common::orchestrator(&router, ScriptedOperator::confirming(), dir.path());

    assert_eq!(orchestrator.run(), RunOutcome::Completed);

    let session = orchestrator.controller().session();
    assert_eq!(session.base_url, "http://192.168.178.1");
    assert_eq!(session.model.as_deref(), Some("7590"));
    assert!(session.was_reset);

    // bridge first, then the final image
    assert_eq!(flashed(&router), vec!["07.59", "08.03"]);
    assert_eq!(router.firmware(), "08.03");
    assert_eq!(session.firmware_version.as_deref(), Some("FRITZ!OS: 08.03"));

    let events = router.events();
    assert_eq!(
        events
            .iter()
            .filter_map(|event| match event {
                SimEvent::DialogResolved(dialog) => Some(*dialog),
                _ => None,
            })
            .take(2)
            .collect::<Vec<_>>(),
        vec![SimDialog::FirmwareNotice, SimDialog::Diagnostics]
    );
    assert!(events.contains(&SimEvent::AdvancedViewEnabled));
    assert_eq!(events.last(), Some(&SimEvent::FactoryReset));

    // the summary reports the scan unchanged
    assert_eq!(session.wlan_entries, networks);
    assert_eq!(
        session
            .wlan_entries
            .iter()
            .map(|entry| entry.quality())
            .collect::<Vec<_>>(),
        vec![
            Some(SignalQuality::Strong),
            Some(SignalQuality::Fair),
            Some(SignalQuality::Weak)
        ]
    );
}

#[test]
fn current_firmware_is_left_alone() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice {
        firmware: "08.03".to_string(),
        ..Default::default()
    });

    let mut orchestrator =
        common::orchestrator(&router, ScriptedOperator::confirming(), dir.path());

    assert_eq!(orchestrator.run(), RunOutcome::Completed);
    assert!(flashed(&router).is_empty());
    assert!(!router.events().contains(&SimEvent::AdvancedViewEnabled));
}

#[test]
fn other_console_layouts_are_handled() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice {
        firmware: "07.29".to_string(),
        reset_ui: ResetUi::Tile,
        wlan_ui: WlanUi::Table,
        wlan_enabled: false,
        ..Default::default()
    });

    let mut orchestrator =
        common::orchestrator(&router, ScriptedOperator::confirming(), dir.path());

    assert_eq!(orchestrator.run(), RunOutcome::Completed);

    let events = router.events();
    assert!(events.contains(&SimEvent::WlanSwitchedOn));
    assert!(events.contains(&SimEvent::FactoryReset));
    assert_eq!(flashed(&router), vec!["08.03"]);

    let entries = &orchestrator.controller().session().wlan_entries;
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].name, "Nachbar");
    assert_eq!(entries[1].channel, "36");
    assert_eq!(entries[2].signal, "<10%");
}

#[test]
fn unknown_model_falls_back_to_manual_selection() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice {
        model_title: "FRITZ!Box 4040".to_string(),
        firmware: "07.29".to_string(),
        ..Default::default()
    });

    let image = dir.path().join("FRITZ.Box_4040-07.57.image");
    std::fs::write(&image, b"image").expect("should write image");

    let operator = ScriptedOperator {
        images: VecDeque::from([image]),
        ..Default::default()
    };
    let mut orchestrator = common::orchestrator(&router, operator, dir.path()).with_steps(vec![
        Step::new("login", StepKind::Login),
        Step::new("model detection", StepKind::DetectModel),
        Step::new("version detection", StepKind::DetectVersion),
        Step::new("firmware update", StepKind::FirmwareUpdate),
    ]);

    assert_eq!(orchestrator.run(), RunOutcome::Completed);
    assert_eq!(flashed(&router), vec!["07.57"]);
}

#[test]
fn declined_picker_skips_the_update() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice {
        model_title: "FRITZ!Box 4040".to_string(),
        ..Default::default()
    });

    let mut orchestrator =
        common::orchestrator(&router, ScriptedOperator::default(), dir.path()).with_steps(vec![
            Step::new("login", StepKind::Login),
            Step::new("model detection", StepKind::DetectModel),
            Step::new("firmware update", StepKind::FirmwareUpdate),
        ]);

    assert_eq!(orchestrator.run(), RunOutcome::Completed);
    assert!(flashed(&router).is_empty());
}

#[test]
fn declined_reset_leaves_device_configured() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice::default());

    let mut orchestrator =
        common::orchestrator(&router, ScriptedOperator::default(), dir.path()).with_steps(vec![
            Step::new("login", StepKind::Login),
            Step::new("factory reset", StepKind::FactoryReset),
        ]);

    assert_eq!(orchestrator.run(), RunOutcome::Completed);
    assert!(!router.events().contains(&SimEvent::FactoryReset));
    assert!(!orchestrator.controller().session().was_reset);
}

#[test]
fn abort_ends_the_run() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice {
        networks: vec![],
        ..Default::default()
    });

    let operator = ScriptedOperator {
        choices: VecDeque::from([StepChoice::Retry, StepChoice::Abort]),
        confirmations: VecDeque::from([true]),
        ..Default::default()
    };
    let mut orchestrator = common::orchestrator(&router, operator, dir.path()).with_steps(vec![
        Step::new("login", StepKind::Login),
        Step::new("wlan scan", StepKind::WlanScan),
        Step::new("factory reset", StepKind::FactoryReset),
    ]);

    assert_eq!(orchestrator.run(), RunOutcome::Aborted);
    assert!(!router.events().contains(&SimEvent::FactoryReset));
}

#[test]
fn unknown_credential_without_reset_link_asks_operator() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice {
        credential: Some("from the sticker".to_string()),
        forgot_password: false,
        ..Default::default()
    });

    let operator = ScriptedOperator {
        credentials: VecDeque::from(["from the sticker".to_string()]),
        ..Default::default()
    };
    let mut orchestrator = common::orchestrator(&router, operator, dir.path())
        .with_steps(vec![Step::new("login", StepKind::Login)]);

    assert_eq!(orchestrator.run(), RunOutcome::Completed);
    assert!(router.events().contains(&SimEvent::LoginAccepted));
}

#[test]
fn operator_giving_up_on_credentials_aborts() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice {
        credential: Some("from the sticker".to_string()),
        forgot_password: false,
        ..Default::default()
    });

    let mut orchestrator = common::orchestrator(&router, ScriptedOperator::default(), dir.path())
        .with_steps(vec![
            Step::new("login", StepKind::Login),
            Step::new("wlan scan", StepKind::WlanScan),
        ]);

    assert_eq!(orchestrator.run(), RunOutcome::Aborted);
    assert!(!router.events().contains(&SimEvent::LoginAccepted));
}

#[test]
fn unreadable_version_asks_for_the_image_instead_of_jumping() {
    let dir = tempdir().expect("should create temp dir");
    let router = SimulatedRouter::new(SimulatedDevice {
        firmware: "unbekannt".to_string(),
        ..Default::default()
    });

    let image = dir.path().join("FRITZ.Box_7590-07.59.image");
    std::fs::write(&image, b"image").expect("should write image");

    let operator = ScriptedOperator {
        choices: VecDeque::from([StepChoice::Skip]),
        images: VecDeque::from([image]),
        ..Default::default()
    };
    let mut orchestrator = common::orchestrator(&router, operator, dir.path()).with_steps(vec![
        Step::new("login", StepKind::Login),
        Step::new("model detection", StepKind::DetectModel),
        Step::new("version detection", StepKind::DetectVersion),
        Step::new("firmware update", StepKind::FirmwareUpdate),
    ]);

    assert_eq!(orchestrator.run(), RunOutcome::Completed);
    // the operator's image, never the final one straight away
    assert_eq!(flashed(&router), vec!["07.59"]);
}
