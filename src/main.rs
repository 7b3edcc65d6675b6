use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use fritz_provision::{
    browser::{BrowserLauncher, Console, chromium::ChromiumLauncher},
    clock::{Clock, SystemClock, VirtualClock},
    config::AppConfig,
    operator::{Operator, TerminalOperator},
    orchestrator::{Orchestrator, RunOutcome},
    reachability::{HttpProbe, Probe, ReachabilityProber},
    services::{
        credential::CredentialStore,
        firmware::{FirmwareTable, ImageStore},
    },
    session::{DeviceSession, SessionController},
    simulation::{SimulatedDevice, SimulatedRouter},
};
use log::{error, info, warn};
use std::{io::Write, rc::Rc};

fn main() {
    initialize();

    if let Err(e) = run() {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

fn run() -> Result<()> {
    let config = AppConfig::get();

    if config.dry_run {
        warn!("dry run: provisioning a simulated device");
    }

    let table = FirmwareTable::load(config.paths.firmware_table.as_deref())?;
    let mut operator: Box<dyn Operator> = Box::new(TerminalOperator::stdio());

    loop {
        let Some(credential) = operator.ask_credential("connect the next device") else {
            info!("no password given, exiting");
            return Ok(());
        };

        let mut orchestrator = device_run(config, &table, credential, operator)?;
        let outcome = orchestrator.run();

        let summary = &orchestrator.controller().session().wlan_entries;
        info!("{} wlan networks recorded for this device", summary.len());

        operator = orchestrator.into_operator();

        if outcome != RunOutcome::Restart && !operator.confirm("provision another device?") {
            return Ok(());
        }
    }
}

/// Wire up one device run, against hardware or the simulated router.
fn device_run(
    config: &AppConfig,
    table: &FirmwareTable,
    credential: String,
    operator: Box<dyn Operator>,
) -> Result<Orchestrator> {
    let candidates = config.device.candidate_urls.clone();
    let first = candidates
        .first()
        .cloned()
        .context("failed to get candidate address")?;

    let (clock, launcher, probe, firmware_dir): (
        Rc<dyn Clock>,
        Box<dyn BrowserLauncher>,
        Box<dyn Probe>,
        _,
    ) = if config.dry_run {
        let router = SimulatedRouter::new(SimulatedDevice {
            address: candidates.get(1).cloned().unwrap_or_else(|| first.clone()),
            credential: Some(credential.clone()),
            ..Default::default()
        });

        let firmware_dir = std::env::temp_dir().join("fritz-provision-dry-run");
        router.stage_images(&firmware_dir, table)?;

        (
            Rc::new(VirtualClock::new()),
            Box::new(router.launcher()),
            Box::new(router.probe()),
            firmware_dir,
        )
    } else {
        (
            Rc::new(SystemClock),
            Box::new(ChromiumLauncher::new(config.browser.clone())),
            Box::new(HttpProbe::new(config.timings.probe_timeout)?),
            config.paths.firmware_dir.clone(),
        )
    };

    let browser = launcher.launch().context("failed to launch browser")?;
    let console = Console::new(browser, clock.clone());
    let prober = ReachabilityProber::new(candidates, probe, clock);

    let mut session = DeviceSession::new(first);
    session.credential = Some(credential);
    session.language = config.device.language.clone();

    let controller = SessionController::new(
        console,
        prober,
        CredentialStore::new(&config.paths.credential_file),
        config.timings.clone(),
        session,
    );

    Ok(Orchestrator::new(
        controller,
        launcher,
        operator,
        table.clone(),
        ImageStore::new(firmware_dir),
    ))
}
