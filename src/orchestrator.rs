//! Workflow of one device run
//!
//! Steps run strictly in sequence through a retry wrapper. Exhausted steps
//! are escalated: the login step gets a factory reset from the login page and
//! then a credential prompt, every other step is handed to the operator.

use crate::{
    browser::BrowserLauncher,
    error::{self, ConsoleError},
    operator::{Operator, StepChoice},
    services::{
        device_info::DeviceInfoService,
        firmware::{FirmwareTable, FirmwareTarget, FirmwareVersion, ImageStore, UpgradePlan},
        reset::ResetService,
        update::UpdateService,
        wlan::WlanService,
    },
    session::SessionController,
};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    Reachability,
    Login,
    DetectModel,
    DetectVersion,
    AdvancedView,
    FirmwareUpdate,
    WlanScan,
    FactoryReset,
    WlanSummary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub name: &'static str,
    pub kind: StepKind,
}

impl Step {
    pub const fn new(name: &'static str, kind: StepKind) -> Self {
        Self { name, kind }
    }

    /// The complete provisioning workflow, in order.
    pub fn workflow() -> Vec<Step> {
        vec![
            Step::new("reachability", StepKind::Reachability),
            Step::new("login", StepKind::Login),
            Step::new("model detection", StepKind::DetectModel),
            Step::new("version detection", StepKind::DetectVersion),
            Step::new("advanced view", StepKind::AdvancedView),
            Step::new("firmware update", StepKind::FirmwareUpdate),
            Step::new("wlan scan", StepKind::WlanScan),
            Step::new("factory reset", StepKind::FactoryReset),
            Step::new("wlan summary", StepKind::WlanSummary),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// All steps done or skipped.
    Completed,
    Aborted,
    /// The operator wants to start over with another device.
    Restart,
}

enum Flow {
    Continue,
    Abort,
    Restart,
}

pub struct Orchestrator {
    controller: SessionController,
    launcher: Box<dyn BrowserLauncher>,
    operator: Box<dyn Operator>,
    table: FirmwareTable,
    store: ImageStore,
    steps: Vec<Step>,
}

impl Orchestrator {
    pub fn new(
        controller: SessionController,
        launcher: Box<dyn BrowserLauncher>,
        operator: Box<dyn Operator>,
        table: FirmwareTable,
        store: ImageStore,
    ) -> Self {
        Self {
            controller,
            launcher,
            operator,
            table,
            store,
            steps: Step::workflow(),
        }
    }

    /// Replace the step list.
    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Hand the operator back once the run is over.
    pub fn into_operator(self) -> Box<dyn Operator> {
        self.operator
    }

    /// Run all steps for the current device
    ///
    /// The browser is quit on every exit path.
    ///
    /// # Returns
    /// How the run ended
    pub fn run(&mut self) -> RunOutcome {
        debug!("run() called");

        let outcome = self.run_steps();

        if let Err(e) = self.controller.quit() {
            warn!("{e:#}");
        }

        info!("device run finished: {outcome:?}");
        outcome
    }

    fn run_steps(&mut self) -> RunOutcome {
        let steps = self.steps.clone();

        for (number, step) in steps.iter().enumerate() {
            info!("[{}/{}] {}", number + 1, steps.len(), step.name);

            match self.run_step(*step) {
                Flow::Continue => {}
                Flow::Abort => {
                    error!("run aborted at step '{}'", step.name);
                    return RunOutcome::Aborted;
                }
                Flow::Restart => {
                    info!("restarting with a new device at step '{}'", step.name);
                    return RunOutcome::Restart;
                }
            }
        }

        RunOutcome::Completed
    }

    fn run_step(&mut self, step: Step) -> Flow {
        loop {
            let Err(e) = self.with_retries(step) else {
                return Flow::Continue;
            };

            let attempts = self.attempts();
            let failure = ConsoleError::CriticalStepFailure {
                step: step.name.to_string(),
                attempts,
            };
            error!("{failure}: {e:#}");

            if step.kind == StepKind::Login {
                return self.escalate_login(step);
            }

            match self.operator.ask_step_failure(step.name, attempts) {
                StepChoice::Retry => info!("retrying step '{}'", step.name),
                StepChoice::Skip => {
                    warn!("skipping step '{}', continuing with the device as it is", step.name);
                    return Flow::Continue;
                }
                StepChoice::Abort => return Flow::Abort,
                StepChoice::Restart => return Flow::Restart,
            }
        }
    }

    fn attempts(&self) -> u32 {
        self.controller.timings().step_attempts.max(1)
    }

    /// Run a step up to the configured number of attempts, replacing a dead
    /// browser before every attempt.
    fn with_retries(&mut self, step: Step) -> Result<()> {
        let attempts = self.attempts();
        let pause = self.controller.timings().step_retry_pause;
        let mut attempt = 1;

        loop {
            let result = self.ensure_transport().and_then(|_| self.execute(step));

            let Err(e) = result else {
                return Ok(());
            };

            warn!(
                "step '{}' attempt {attempt}/{attempts} failed: {e:#}",
                step.name
            );

            if attempt >= attempts {
                return Err(e);
            }

            attempt += 1;
            self.controller.console().sleep(pause);
        }
    }

    fn ensure_transport(&mut self) -> Result<()> {
        if self.controller.is_transport_alive() {
            return Ok(());
        }

        warn!("browser session lost");
        let browser = self
            .launcher
            .launch()
            .context("failed to launch replacement browser")?;
        self.controller.reconnect(browser);
        Ok(())
    }

    fn execute(&mut self, step: Step) -> Result<()> {
        match step.kind {
            StepKind::Reachability => {
                let timings = self.controller.timings();
                let (rounds, delay) = (timings.probe_rounds, timings.probe_delay);
                self.controller.wait_for_device(rounds, delay).map(|_| ())
            }
            StepKind::Login => self.controller.login(),
            StepKind::DetectModel => DeviceInfoService::detect_model(&mut self.controller).map(|_| ()),
            StepKind::DetectVersion => {
                DeviceInfoService::detect_version(&mut self.controller).map(|_| ())
            }
            StepKind::AdvancedView => self.advanced_view(),
            StepKind::FirmwareUpdate => self.firmware_update(),
            StepKind::WlanScan => WlanService::scan(&mut self.controller).map(|_| ()),
            StepKind::FactoryReset => self.factory_reset(),
            StepKind::WlanSummary => {
                let entries = WlanService::summary(&self.controller);
                self.operator
                    .notify(&format!("{} wlan networks recorded", entries.len()));
                Ok(())
            }
        }
    }

    fn advanced_view(&mut self) -> Result<()> {
        let version = self
            .controller
            .session()
            .firmware_version
            .as_deref()
            .and_then(FirmwareVersion::parse);

        match version {
            Some(version) if version.needs_advanced_view() => {
                UpdateService::activate_advanced_view(&mut self.controller)
            }
            Some(version) => {
                debug!("firmware {version} needs no advanced view");
                Ok(())
            }
            None => {
                info!("firmware version unknown, not switching to the advanced view");
                Ok(())
            }
        }
    }

    fn firmware_update(&mut self) -> Result<()> {
        let session = self.controller.session();
        let model = session.model.clone();
        let current = session.firmware_version.clone().unwrap_or_default();

        let plan = match &model {
            Some(model) => self.table.resolve(model, &current),
            None => Err(ConsoleError::UnknownModelOrPlan {
                model: "unknown".to_string(),
                reason: "model not detected".to_string(),
            }
            .into()),
        };

        let images = match plan {
            Ok(UpgradePlan::NoOp) => {
                info!("firmware {current} is up to date");
                return Ok(());
            }
            Ok(plan) => {
                let versions: Vec<String> =
                    plan.images().iter().map(|t| t.version.to_string()).collect();
                info!("upgrade plan: {current} -> {}", versions.join(" -> "));

                plan.images()
                    .into_iter()
                    .map(|target| self.image_for(target))
                    .collect::<Option<Vec<_>>>()
            }
            Err(e) if matches!(error::category(&e), Some(ConsoleError::UnknownModelOrPlan { .. })) => {
                warn!("{e:#}, asking for the image");
                self.operator
                    .pick_firmware_image(&format!("{e}, select the image manually"))
                    .map(|path| vec![path])
            }
            Err(e) => return Err(e),
        };

        let Some(images) = images else {
            warn!("no firmware image selected, skipping update");
            return Ok(());
        };

        for image in images {
            UpdateService::perform_update(&mut self.controller, &image)?;

            self.controller
                .relogin()
                .context("failed to log in after firmware update")?;

            // bookkeeping only, the flashed version is not compared with the plan
            match DeviceInfoService::detect_version(&mut self.controller) {
                Ok(version) => info!("device reports firmware {version}"),
                Err(e) => warn!("{e:#}"),
            }
        }

        Ok(())
    }

    fn image_for(&mut self, target: &FirmwareTarget) -> Option<PathBuf> {
        if let Some(path) = self.store.locate(target) {
            return Some(path);
        }

        self.operator.pick_firmware_image(&format!(
            "firmware image {} not found in {}",
            target.image,
            self.store.dir().display()
        ))
    }

    fn factory_reset(&mut self) -> Result<()> {
        if !self
            .operator
            .confirm("reset the device to factory settings?")
        {
            info!("factory reset declined");
            return Ok(());
        }

        match self.controller.require_session("factory reset") {
            Ok(()) => ResetService::factory_reset(&mut self.controller),
            Err(e) => {
                warn!("{e:#}, resetting from the login page instead");

                if ResetService::forgot_password_reset(&mut self.controller)? {
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Escalation of an exhausted login step
    ///
    /// A rejected credential usually means somebody reset the device before,
    /// so the first escalation resets it from the login page. After that the
    /// operator is asked for credentials until one works.
    fn escalate_login(&mut self, step: Step) -> Flow {
        warn!("login failed, resetting the device from the login page");

        match ResetService::forgot_password_reset(&mut self.controller) {
            Ok(true) => match self.with_retries(step) {
                Ok(()) => return Flow::Continue,
                Err(e) => error!("login after reset failed: {e:#}"),
            },
            Ok(false) => warn!("device offers no reset on the login page"),
            Err(e) => error!("{e:#}"),
        }

        let mut rejected = self.controller.session().credential.clone();

        loop {
            let Some(credential) = self
                .operator
                .ask_credential("login failed, enter the device password")
            else {
                return Flow::Abort;
            };

            if rejected.as_deref() == Some(credential.as_str()) {
                self.operator
                    .notify("this password was already rejected, enter a different one");
                continue;
            }

            self.controller.set_credential(Some(credential.clone()));

            match self.with_retries(step) {
                Ok(()) => return Flow::Continue,
                Err(e) => {
                    error!("{}: {e:#}", ConsoleError::CriticalStepFailure {
                        step: step.name.to_string(),
                        attempts: self.attempts(),
                    });
                    rejected = Some(credential);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        browser::Console,
        clock::{Clock, VirtualClock},
        config::{DEFAULT_CANDIDATE_URLS, Timings},
        operator::MockOperator,
        reachability::ReachabilityProber,
        services::credential::CredentialStore,
        session::DeviceSession,
        simulation::{SimEvent, SimulatedDevice, SimulatedRouter},
    };
    use std::{path::Path, rc::Rc};
    use tempfile::tempdir;

    fn orchestrator(router: &SimulatedRouter, operator: MockOperator, dir: &Path) -> Orchestrator {
        let clock: Rc<dyn Clock> = Rc::new(VirtualClock::new());
        let launcher = router.launcher();
        let console = Console::new(launcher.launch().expect("should launch"), clock.clone());
        let candidates: Vec<String> = DEFAULT_CANDIDATE_URLS.iter().map(|s| s.to_string()).collect();
        let prober = ReachabilityProber::new(candidates.clone(), Box::new(router.probe()), clock);

        let mut session = DeviceSession::new(candidates[0].clone());
        session.credential = Some("secret".to_string());

        let controller = SessionController::new(
            console,
            prober,
            CredentialStore::new(dir.join("credentials.txt")),
            Timings::default(),
            session,
        );

        let table = FirmwareTable::embedded().expect("should load table");
        let firmware_dir = dir.join("firmware");
        router
            .stage_images(&firmware_dir, &table)
            .expect("should stage images");

        Orchestrator::new(
            controller,
            Box::new(launcher),
            Box::new(operator),
            table,
            ImageStore::new(firmware_dir),
        )
    }

    mod escalation {
        use super::*;

        #[test]
        fn skip_continues_and_run_completes() {
            let dir = tempdir().expect("should create temp dir");
            let router = SimulatedRouter::new(SimulatedDevice {
                networks: vec![],
                ..Default::default()
            });

            let mut operator = MockOperator::new();
            operator
                .expect_ask_step_failure()
                .withf(|step, attempts| step == "wlan scan" && *attempts == 2)
                .times(1)
                .returning(|_, _| StepChoice::Skip);
            operator.expect_confirm().times(1).returning(|_| true);
            operator.expect_notify().returning(|_| ());

            let mut orchestrator = orchestrator(&router, operator, dir.path());

            assert_eq!(orchestrator.run(), RunOutcome::Completed);
            assert!(router.events().contains(&SimEvent::FactoryReset));
        }

        #[test]
        fn restart_stops_remaining_steps() {
            let dir = tempdir().expect("should create temp dir");
            let router = SimulatedRouter::new(SimulatedDevice {
                networks: vec![],
                ..Default::default()
            });

            let mut operator = MockOperator::new();
            operator
                .expect_ask_step_failure()
                .times(1)
                .returning(|_, _| StepChoice::Restart);
            operator.expect_confirm().never();

            let mut orchestrator = orchestrator(&router, operator, dir.path());

            assert_eq!(orchestrator.run(), RunOutcome::Restart);
            assert!(!router.events().contains(&SimEvent::FactoryReset));
        }

        #[test]
        fn stale_credential_triggers_reset_from_login_page() {
            let dir = tempdir().expect("should create temp dir");
            let router = SimulatedRouter::new(SimulatedDevice {
                credential: Some("set by somebody else".to_string()),
                ..Default::default()
            });

            let mut operator = MockOperator::new();
            operator.expect_ask_credential().never();

            let mut orchestrator = orchestrator(&router, operator, dir.path()).with_steps(vec![
                Step::new("reachability", StepKind::Reachability),
                Step::new("login", StepKind::Login),
            ]);

            assert_eq!(orchestrator.run(), RunOutcome::Completed);
            assert!(router.events().contains(&SimEvent::FactoryReset));
            assert_eq!(router.credential().as_deref(), Some("secret"));
        }

        #[test]
        fn credential_prompt_rejects_unchanged_password() {
            let dir = tempdir().expect("should create temp dir");
            let router = SimulatedRouter::new(SimulatedDevice {
                credential: Some("correct".to_string()),
                forgot_password: false,
                ..Default::default()
            });

            let mut answers = vec!["secret", "correct"].into_iter();
            let mut operator = MockOperator::new();
            operator
                .expect_ask_credential()
                .times(2)
                .returning(move |_| answers.next().map(str::to_string));
            operator
                .expect_notify()
                .withf(|message| message.contains("already rejected"))
                .times(1)
                .returning(|_| ());

            let mut orchestrator = orchestrator(&router, operator, dir.path()).with_steps(vec![
                Step::new("login", StepKind::Login),
            ]);

            assert_eq!(orchestrator.run(), RunOutcome::Completed);
            // two automatic attempts with the stale password, one with the new one
            assert_eq!(router.login_submissions(), 3);
            assert_eq!(
                orchestrator.controller().session().credential.as_deref(),
                Some("correct")
            );
        }
    }

    mod transport {
        use super::*;

        #[test]
        fn dead_browser_is_replaced_between_attempts() {
            let dir = tempdir().expect("should create temp dir");
            let router = SimulatedRouter::new(SimulatedDevice {
                kill_transport_on_click: Some(crate::selectors::WLAN_MENU),
                ..Default::default()
            });

            let mut operator = MockOperator::new();
            operator.expect_ask_step_failure().never();

            let mut orchestrator = orchestrator(&router, operator, dir.path()).with_steps(vec![
                Step::new("login", StepKind::Login),
                Step::new("wlan scan", StepKind::WlanScan),
            ]);

            assert_eq!(orchestrator.run(), RunOutcome::Completed);
            assert_eq!(orchestrator.controller().session().wlan_entries.len(), 3);

            let launches = router
                .events()
                .iter()
                .filter(|event| **event == SimEvent::BrowserLaunched)
                .count();
            assert_eq!(launches, 2);
        }
    }
}
