#![allow(dead_code)]

use fritz_provision::{
    browser::{BrowserLauncher, Console},
    clock::{Clock, VirtualClock},
    config::{DEFAULT_CANDIDATE_URLS, Timings},
    operator::{Operator, StepChoice},
    orchestrator::Orchestrator,
    reachability::ReachabilityProber,
    services::{
        credential::CredentialStore,
        firmware::{FirmwareTable, ImageStore},
    },
    session::{DeviceSession, SessionController},
    simulation::SimulatedRouter,
};
use std::{collections::VecDeque, path::Path, path::PathBuf, rc::Rc};

pub fn candidates() -> Vec<String> {
    DEFAULT_CANDIDATE_URLS.iter().map(|s| s.to_string()).collect()
}

/// Controller on a fresh browser of the simulated router, starting at the
/// first candidate address.
pub fn controller(
    router: &SimulatedRouter,
    credential: Option<&str>,
    dir: &Path,
) -> SessionController {
    let clock: Rc<dyn Clock> = Rc::new(VirtualClock::new());
    let browser = router.launcher().launch().expect("should launch");
    let console = Console::new(browser, clock.clone());
    let prober = ReachabilityProber::new(candidates(), Box::new(router.probe()), clock);

    let mut session = DeviceSession::new(candidates()[0].clone());
    session.credential = credential.map(str::to_string);

    SessionController::new(
        console,
        prober,
        CredentialStore::new(dir.join("credentials.txt")),
        Timings::default(),
        session,
    )
}

/// Orchestrator for the simulated router with the planned images on disk.
pub fn orchestrator(
    router: &SimulatedRouter,
    operator: ScriptedOperator,
    dir: &Path,
) -> Orchestrator {
    let table = FirmwareTable::embedded().expect("should load table");
    let firmware_dir = dir.join("firmware");
    std::fs::create_dir_all(&firmware_dir).expect("should create firmware dir");
    // models without a plan get no images
    let _ = router.stage_images(&firmware_dir, &table);

    Orchestrator::new(
        controller(router, Some("secret"), dir),
        Box::new(router.launcher()),
        Box::new(operator),
        table,
        ImageStore::new(firmware_dir),
    )
}

/// Operator answering from prepared queues; an empty queue aborts or declines.
#[derive(Default)]
pub struct ScriptedOperator {
    pub choices: VecDeque<StepChoice>,
    pub credentials: VecDeque<String>,
    pub confirmations: VecDeque<bool>,
    pub images: VecDeque<PathBuf>,
}

impl ScriptedOperator {
    pub fn confirming() -> Self {
        Self {
            confirmations: VecDeque::from([true]),
            ..Default::default()
        }
    }
}

impl Operator for ScriptedOperator {
    fn ask_step_failure(&mut self, _step: &str, _attempts: u32) -> StepChoice {
        self.choices.pop_front().unwrap_or(StepChoice::Abort)
    }

    fn ask_credential(&mut self, _reason: &str) -> Option<String> {
        self.credentials.pop_front()
    }

    fn confirm(&mut self, _question: &str) -> bool {
        self.confirmations.pop_front().unwrap_or(false)
    }

    fn pick_firmware_image(&mut self, _hint: &str) -> Option<PathBuf> {
        self.images.pop_front()
    }

    fn notify(&mut self, _message: &str) {}
}
