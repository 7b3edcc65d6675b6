//! Device session and the login state machine
//!
//! The console interposes dialogs in an order and number that depend on
//! firmware, language and device history. Instead of scripting one fixed
//! sequence, the controller re-evaluates "is the main menu ready" after every
//! single action and resolves whatever dialog is in the way.

use crate::{
    browser::{Browser, Console},
    config::Timings,
    dialogs::{DialogKind, DialogRegistry},
    error::ConsoleError,
    reachability::ReachabilityProber,
    selectors,
    services::{credential::CredentialStore, wlan::WlanEntry},
};
use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const PRE_LOGIN_ROUNDS: u32 = 4;

/// State of the device currently being provisioned.
#[derive(Clone, Debug, Default)]
pub struct DeviceSession {
    pub base_url: String,
    pub credential: Option<String>,
    pub language: String,
    pub authenticated: bool,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub was_reset: bool,
    pub wlan_entries: Vec<WlanEntry>,
}

impl DeviceSession {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            language: "en".to_string(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    CredentialSubmission,
    DialogSweep,
    Authenticated,
    Failed,
}

pub struct SessionController {
    console: Console,
    prober: ReachabilityProber,
    registry: DialogRegistry,
    credentials: CredentialStore,
    timings: Timings,
    session: DeviceSession,
    state: SessionState,
}

impl SessionController {
    pub fn new(
        console: Console,
        prober: ReachabilityProber,
        credentials: CredentialStore,
        timings: Timings,
        session: DeviceSession,
    ) -> Self {
        let registry = DialogRegistry::standard(timings.dialog_timeout);

        Self {
            console,
            prober,
            registry,
            credentials,
            timings,
            session,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut Console {
        &mut self.console
    }

    pub fn set_credential(&mut self, credential: Option<String>) {
        self.session.credential = credential;
    }

    /// Wait for the device to answer on one of its candidate addresses
    ///
    /// # Arguments
    /// * `rounds` - Number of passes over the candidate list
    /// * `delay` - Pause between passes
    pub fn wait_for_device(&mut self, rounds: u32, delay: Duration) -> Result<String> {
        self.prober.find_device(&mut self.session, rounds, delay)
    }

    /// Mark the session as lost, e.g. after the device rebooted.
    pub fn invalidate(&mut self) {
        self.session.authenticated = false;
        self.state = SessionState::Unauthenticated;
    }

    pub fn is_transport_alive(&self) -> bool {
        self.console.is_alive()
    }

    /// Replace a dead browser session; the credential is kept.
    pub fn reconnect(&mut self, browser: Box<dyn Browser>) {
        info!("reconnecting with a fresh browser session");
        self.console.replace_browser(browser);
        self.invalidate();
    }

    pub fn quit(&mut self) -> Result<()> {
        self.invalidate();
        self.console.quit()
    }

    /// Whether no credential prompt is shown and a main-menu entry is interactive
    ///
    /// Polls up to `timeout` for a menu entry; a visible credential prompt ends
    /// the check at once. Updates the session's `authenticated` flag.
    pub fn menu_ready(&mut self, timeout: Duration) -> bool {
        let deadline = self.console.clock().now() + timeout;

        let ready = loop {
            if self.console.is_visible(selectors::CREDENTIAL_PROMPT) {
                break false;
            }

            if selectors::MENU_MARKERS
                .iter()
                .any(|marker| self.console.is_interactive(marker))
            {
                break true;
            }

            if self.console.clock().now() >= deadline {
                break false;
            }

            self.console.sleep(POLL_INTERVAL);
        };

        self.session.authenticated = ready;
        ready
    }

    /// Log in and sweep dialogs until the main menu is ready
    ///
    /// Re-entry with a ready menu returns at once without submitting the
    /// credential again.
    ///
    /// # Returns
    /// `Ok` in state `Authenticated`; otherwise the session is `Failed` and the
    /// error carries [`ConsoleError::SessionRejected`],
    /// [`ConsoleError::DialogSweepExhausted`] or the underlying failure
    pub fn login(&mut self) -> Result<()> {
        debug!("login() called");

        if self.session.credential.is_some() && self.menu_ready(self.timings.menu_ready_timeout) {
            debug!("session already authenticated");
            self.state = SessionState::Authenticated;
            return Ok(());
        }

        self.establish_fresh()
    }

    /// Log in from a freshly loaded start page, ignoring a menu that may still
    /// be shown from before a reboot
    ///
    /// # Returns
    /// Same as [`SessionController::login`]
    pub fn relogin(&mut self) -> Result<()> {
        debug!("relogin() called");

        self.session.authenticated = false;
        self.establish_fresh()
    }

    fn establish_fresh(&mut self) -> Result<()> {
        self.state = SessionState::Unauthenticated;

        let result = self.establish();
        if result.is_err() {
            self.state = SessionState::Failed;
            self.session.authenticated = false;
        }

        result
    }

    fn establish(&mut self) -> Result<()> {
        self.wait_for_device(self.timings.probe_rounds, self.timings.probe_delay)?;

        let base_url = self.session.base_url.clone();
        self.console.reload(&base_url, true, true)?;

        self.pass_first_run_screens()?;

        if self
            .console
            .locate(selectors::CREDENTIAL_PROMPT, self.timings.dialog_timeout, true)
            .is_ok()
        {
            self.state = SessionState::CredentialSubmission;
            self.submit_credential()?;
            self.console.sleep(self.timings.sweep_backoff);
        } else {
            info!("no credential prompt shown, checking for dialogs");
        }

        self.sweep_dialogs()
    }

    /// Handle physical-button authorization, language selection and initial
    /// password setup, in whatever order the console presents them.
    fn pass_first_run_screens(&mut self) -> Result<()> {
        for _ in 0..PRE_LOGIN_ROUNDS {
            if self.console.is_visible(selectors::BUTTON_AUTH_HINT) {
                self.await_button_authorization()?;
            } else if self.console.is_visible(selectors::LANGUAGE_SCREEN) {
                self.select_language()?;
            } else if self.console.is_visible(selectors::NEW_PASSWORD_INPUT) {
                self.set_initial_password()?;
            } else {
                break;
            }
        }

        Ok(())
    }

    fn await_button_authorization(&mut self) -> Result<()> {
        info!(
            "press a button on the device to confirm the login (waiting up to {}s)",
            self.timings.button_auth_timeout.as_secs()
        );

        let deadline = self.console.clock().now() + self.timings.button_auth_timeout;

        while self.console.is_visible(selectors::BUTTON_AUTH_HINT) {
            if self.console.clock().now() >= deadline {
                bail!("failed to authorize login: no button press on the device");
            }
            self.console.sleep(Duration::from_secs(1));
        }

        info!("login confirmed on the device");
        Ok(())
    }

    /// Pick the session language on the language screen, if it is shown.
    pub fn select_language(&mut self) -> Result<()> {
        let language = self.session.language.clone();
        let handler = self
            .registry
            .handlers()
            .iter()
            .find(|handler| handler.kind == DialogKind::LanguageSelection)
            .context("failed to find language handler")?;

        if handler.handle(&mut self.console, &language, self.timings.dialog_timeout) {
            info!("console language set to {language}");
            Ok(())
        } else {
            bail!("failed to select console language {language}")
        }
    }

    fn set_initial_password(&mut self) -> Result<()> {
        let credential = match &self.session.credential {
            Some(credential) => credential.clone(),
            None => CredentialStore::generate(),
        };

        info!("console asks for an initial password, setting it");

        // record first: a password only the device knows locks us out
        self.credentials
            .persist(&self.session.base_url, &credential)
            .context("failed to persist initial password")?;

        let timeout = self.timings.dialog_timeout;
        self.console
            .type_text(selectors::NEW_PASSWORD_INPUT, &credential, timeout)?;
        if self.console.exists(selectors::NEW_PASSWORD_REPEAT) {
            self.console
                .type_text(selectors::NEW_PASSWORD_REPEAT, &credential, timeout)?;
        }

        if !self.console.click(selectors::NEW_PASSWORD_SUBMIT, timeout, 2) {
            bail!("failed to submit initial password");
        }

        self.session.credential = Some(credential);
        Ok(())
    }

    fn submit_credential(&mut self) -> Result<()> {
        let credential = self
            .session
            .credential
            .clone()
            .ok_or(ConsoleError::MissingCredential)?;

        let timeout = self.timings.dialog_timeout;
        let input = if self.console.exists(selectors::PASSWORD_INPUT) {
            selectors::PASSWORD_INPUT
        } else {
            selectors::CREDENTIAL_PROMPT
        };

        self.console.type_text(input, &credential, timeout)?;

        if !self.console.click(selectors::LOGIN_SUBMIT, timeout, 3) {
            bail!("failed to submit login form");
        }

        debug!("credential submitted");
        Ok(())
    }

    fn sweep_dialogs(&mut self) -> Result<()> {
        self.state = SessionState::DialogSweep;
        let rounds = self.timings.sweep_rounds;

        for round in 1..=rounds {
            if self.menu_ready(self.timings.dialog_timeout) {
                info!("login successful");
                self.state = SessionState::Authenticated;
                return Ok(());
            }

            if self.console.is_visible(selectors::CREDENTIAL_PROMPT) {
                error!("credential prompt is back after submission");
                return Err(ConsoleError::SessionRejected.into());
            }

            let language = self.session.language.clone();
            match self.registry.resolve_one(&mut self.console, &language) {
                Some(kind) => debug!("round {round}: resolved {kind:?}"),
                None => match self.registry.positive_fallback(&mut self.console) {
                    Some(selector) => debug!("round {round}: fallback clicked {selector}"),
                    None => debug!("round {round}: nothing to resolve"),
                },
            }

            self.console.sleep(self.timings.sweep_backoff);
        }

        Err(ConsoleError::DialogSweepExhausted { rounds }.into())
    }

    /// Precondition of every session-dependent operation
    ///
    /// Succeeds if the menu is ready, otherwise tries exactly one re-login.
    ///
    /// # Returns
    /// [`ConsoleError::SessionRequired`] if no session could be restored
    pub fn require_session(&mut self, operation: &'static str) -> Result<()> {
        if self.menu_ready(self.timings.menu_ready_timeout) {
            return Ok(());
        }

        warn!("{operation} needs a session, logging in again");

        self.login().map_err(|e| {
            anyhow::Error::from(ConsoleError::SessionRequired { operation })
                .context(format!("re-login failed: {e:#}"))
        })
    }

    /// Back to the overview page.
    pub fn go_home(&mut self) -> bool {
        self.console
            .click_first(selectors::HOME, self.timings.dialog_timeout)
            .is_some()
    }

    /// Close an overlay covering the page, if there is one.
    pub fn close_overlay(&mut self) {
        if let Some(selector) = selectors::CLOSE_OVERLAY
            .iter()
            .copied()
            .find(|selector| self.console.is_visible(selector))
        {
            debug!("closing overlay");
            self.console.click(selector, self.timings.dialog_timeout, 1);
        }
    }
}
