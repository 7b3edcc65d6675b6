//! Simulated FRITZ!Box console
//!
//! Models the console screens closely enough to run the whole provisioning
//! workflow without hardware: used by dry runs and by the integration tests.
//! Elements are matched by exact selector text against the [`selectors`]
//! constants.

use crate::{
    browser::{Browser, BrowserLauncher, Element},
    reachability::Probe,
    selectors,
    services::{
        firmware::{FirmwareTable, FirmwareVersion},
        wlan::WlanEntry,
    },
};
use anyhow::{Context, Result, bail};
use log::debug;
use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

const STATUS_OK: u16 = 200;
const UNMODELED_CONTINUE: &str = r#"//*[@id="submit_button"]"#;
const WLAN_ROW_FIELDS: [&str; 5] = ["name", "band", "channel", "mac", "rssi"];
const LEGACY_WLAN_COLUMNS: usize = 5;

/// Post-login dialogs the simulated console can stack up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimDialog {
    ContinueSetup,
    ProviderWizard,
    FirmwareNotice,
    StayInformed,
    Diagnostics,
    NumberedConfirmation,
    /// A dialog only the positive-button fallback can dismiss.
    Unmodeled,
}

const CONTINUE_SETUP_CONTROLS: &[&str] = &[
    selectors::CONTINUE_SETUP_HEADING,
    selectors::CONTINUE_SETUP_DECLINE[0],
];
const PROVIDER_WIZARD_CONTROLS: &[&str] = &[selectors::PROVIDER_SELECT, selectors::WIZARD_FORWARD];
const FIRMWARE_NOTICE_CONTROLS: &[&str] = &[
    selectors::FIRMWARE_NOTICE_HEADING,
    selectors::FIRMWARE_NOTICE_DISMISS[0],
];
const STAY_INFORMED_CONTROLS: &[&str] = &[
    selectors::STAY_INFORMED_HEADING,
    selectors::STAY_INFORMED_DISMISS[0],
];
const DIAGNOSTICS_CONTROLS: &[&str] = &[selectors::DIAGNOSTICS_TOGGLE, selectors::APPLY];
const NUMBERED_CONFIRMATION_CONTROLS: &[&str] = &[selectors::NUMBERED_CONFIRMATION];
const UNMODELED_CONTROLS: &[&str] = &[UNMODELED_CONTINUE];

impl SimDialog {
    fn controls(self) -> &'static [&'static str] {
        match self {
            SimDialog::ContinueSetup => CONTINUE_SETUP_CONTROLS,
            SimDialog::ProviderWizard => PROVIDER_WIZARD_CONTROLS,
            SimDialog::FirmwareNotice => FIRMWARE_NOTICE_CONTROLS,
            SimDialog::StayInformed => STAY_INFORMED_CONTROLS,
            SimDialog::Diagnostics => DIAGNOSTICS_CONTROLS,
            SimDialog::NumberedConfirmation => NUMBERED_CONFIRMATION_CONTROLS,
            SimDialog::Unmodeled => UNMODELED_CONTROLS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetUi {
    /// Factory settings tab with a reset button.
    Linear,
    /// Factory settings tile opening a dialog.
    Tile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WlanUi {
    Rows,
    Table,
}

/// What the simulated device looks like when the run starts.
#[derive(Clone, Debug)]
pub struct SimulatedDevice {
    pub address: String,
    pub model_title: String,
    pub firmware: String,
    /// `None` puts the console in first-run state.
    pub credential: Option<String>,
    /// Visibility checks of the button hint before the button counts as pressed.
    pub button_auth_checks: u32,
    pub dialogs: Vec<SimDialog>,
    pub reset_ui: ResetUi,
    /// Checks of the final reset confirmation before it shows up.
    pub reset_confirm_checks: u32,
    /// Times the console offers a retry instead of the final confirmation;
    /// each retry restarts the confirmation checks.
    pub reset_retry_prompts: u32,
    pub forgot_password: bool,
    pub wlan_ui: WlanUi,
    pub wlan_enabled: bool,
    pub networks: Vec<WlanEntry>,
    /// Probes that go unanswered after every reboot.
    pub reboot_outage_probes: u32,
    /// The first click on this selector kills the browser transport.
    pub kill_transport_on_click: Option<&'static str>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        let network = |name: &str, band: &str, channel: &str, mac: &str, signal: &str| WlanEntry {
            name: name.to_string(),
            band: band.to_string(),
            channel: channel.to_string(),
            mac: mac.to_string(),
            signal: signal.to_string(),
        };

        Self {
            address: "http://192.168.178.1".to_string(),
            model_title: "FRITZ!Box 7590".to_string(),
            firmware: "06.83".to_string(),
            credential: Some("secret".to_string()),
            button_auth_checks: 0,
            dialogs: vec![SimDialog::FirmwareNotice, SimDialog::Diagnostics],
            reset_ui: ResetUi::Linear,
            reset_confirm_checks: 3,
            reset_retry_prompts: 0,
            forgot_password: true,
            wlan_ui: WlanUi::Rows,
            wlan_enabled: true,
            networks: vec![
                network("FRITZ!Box 7490", "2,4 GHz", "1", "3C:A6:2F:11:22:33", "75%"),
                network("Nachbar", "5 GHz", "36", "44:4E:6D:44:55:66", "40%"),
                network("Guest", "2,4 GHz", "11", "C8:0E:14:77:88:99", "<10%"),
            ],
            reboot_outage_probes: 3,
            kill_transport_on_click: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimEvent {
    BrowserLaunched,
    ButtonAuthorized,
    LanguageSelected(String),
    PasswordSet(String),
    LoginAccepted,
    LoginRejected,
    DialogResolved(SimDialog),
    AdvancedViewEnabled,
    Flashed(String),
    ResetRetried,
    FactoryReset,
    WlanSwitchedOn,
    TransportLost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Screen {
    Blank,
    Language,
    NewPassword,
    ButtonAuth,
    Login,
    ForgotPassword,
    Console,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Page {
    Overview,
    Update,
    UpdateFile,
    Backup,
    Factory,
    TileDialog,
    ResetConfirm,
    AwaitButton,
    Wlan,
    WlanChannel,
}

struct SimState {
    device: SimulatedDevice,
    screen: Screen,
    page: Page,
    logged_in: bool,
    language_done: bool,
    system_expanded: bool,
    user_menu_expanded: bool,
    advanced_view: bool,
    export_settings: bool,
    diagnostics: bool,
    provider: Option<String>,
    typed: HashMap<String, String>,
    uploaded: Option<PathBuf>,
    button_auth_left: u32,
    confirm_left: u32,
    retry_left: u32,
    outage: u32,
    generation: u64,
    transport_lost: bool,
    login_submissions: u32,
    events: Vec<SimEvent>,
}

impl SimState {
    fn new(device: SimulatedDevice) -> Self {
        Self {
            button_auth_left: device.button_auth_checks,
            device,
            screen: Screen::Blank,
            page: Page::Overview,
            logged_in: false,
            language_done: false,
            system_expanded: false,
            user_menu_expanded: false,
            advanced_view: false,
            export_settings: true,
            diagnostics: true,
            provider: None,
            typed: HashMap::new(),
            uploaded: None,
            confirm_left: 0,
            retry_left: 0,
            outage: 0,
            generation: 0,
            transport_lost: false,
            login_submissions: 0,
            events: vec![],
        }
    }

    fn record(&mut self, event: SimEvent) {
        debug!("simulated device: {event:?}");
        self.events.push(event);
    }

    fn land(&mut self) {
        self.page = Page::Overview;
        self.system_expanded = false;
        self.user_menu_expanded = false;

        let first_run = self.device.credential.is_none();
        self.screen = if self.logged_in {
            Screen::Console
        } else if first_run && !self.language_done {
            Screen::Language
        } else if first_run {
            Screen::NewPassword
        } else if self.button_auth_left > 0 {
            Screen::ButtonAuth
        } else {
            Screen::Login
        };
    }

    fn reboot(&mut self) {
        self.outage = self.device.reboot_outage_probes;
        self.logged_in = false;
        self.screen = Screen::Blank;
        self.page = Page::Overview;
        self.system_expanded = false;
        self.user_menu_expanded = false;
    }

    fn factory_reset(&mut self) {
        self.device.credential = None;
        self.device.dialogs = vec![SimDialog::ProviderWizard];
        self.language_done = false;
        self.advanced_view = false;
        self.export_settings = true;
        self.diagnostics = true;
        self.provider = None;
        self.record(SimEvent::FactoryReset);
        self.reboot();
    }

    fn upload_available(&self) -> bool {
        self.advanced_view
            || FirmwareVersion::parse(&self.device.firmware)
                .is_none_or(|version| !version.needs_advanced_view())
    }

    /// Number of elements currently matching `selector`.
    fn count(&mut self, selector: &str) -> usize {
        let matches = |candidates: &[&str]| usize::from(candidates.iter().any(|c| *c == selector));

        match self.screen {
            Screen::Blank => 0,
            Screen::Language => {
                let options = [selectors::language_option("en"), selectors::language_option("de")];
                usize::from(
                    selector == selectors::LANGUAGE_SCREEN
                        || selector == selectors::LANGUAGE_SUBMIT
                        || options.iter().any(|option| option == selector),
                )
            }
            Screen::NewPassword => matches(&[
                selectors::NEW_PASSWORD_INPUT,
                selectors::NEW_PASSWORD_REPEAT,
                selectors::NEW_PASSWORD_SUBMIT,
            ]),
            Screen::ButtonAuth => {
                if selector != selectors::BUTTON_AUTH_HINT {
                    return 0;
                }
                if self.button_auth_left > 0 {
                    self.button_auth_left -= 1;
                    return 1;
                }
                self.record(SimEvent::ButtonAuthorized);
                self.screen = Screen::Login;
                0
            }
            Screen::Login => {
                let forgot = self.device.forgot_password && selector == selectors::FORGOT_PASSWORD[0];
                usize::from(
                    forgot
                        || matches(&[
                            selectors::CREDENTIAL_PROMPT,
                            selectors::PASSWORD_INPUT,
                            selectors::LOGIN_SUBMIT,
                        ]) == 1,
                )
            }
            Screen::ForgotPassword => matches(&[selectors::SEND_FACTORY_RESET]),
            Screen::Console => self.console_count(selector),
        }
    }

    fn console_count(&mut self, selector: &str) -> usize {
        if let Some(dialog) = self.device.dialogs.first() {
            return usize::from(dialog.controls().iter().any(|c| *c == selector));
        }

        let mut shown: Vec<&str> = selectors::MENU_MARKERS.to_vec();
        shown.extend([selectors::HOME[0], selectors::USER_MENU_ICON, selectors::MODEL_TEXT[0]]);

        if self.system_expanded {
            shown.extend([selectors::UPDATE_MENU, selectors::BACKUP_MENU]);
        }
        if self.user_menu_expanded {
            shown.extend([selectors::USER_MENU_EXPANDED, selectors::ADVANCED_VIEW_LINK]);
        }

        match self.page {
            Page::Overview => {}
            Page::Update => {
                shown.push(selectors::VERSION_TEXT[0]);
                if self.upload_available() {
                    shown.push(selectors::UPDATE_FILE_TAB[0]);
                }
            }
            Page::UpdateFile => shown.extend([
                selectors::VERSION_TEXT[0],
                selectors::EXPORT_SETTINGS_TOGGLE,
                selectors::FIRMWARE_FILE_INPUT,
                selectors::START_UPDATE,
            ]),
            Page::Backup => shown.push(match self.device.reset_ui {
                ResetUi::Linear => selectors::FACTORY_TAB,
                ResetUi::Tile => selectors::FACTORY_TILE,
            }),
            Page::Factory => shown.push(selectors::RESET_START[0]),
            Page::TileDialog => shown.push(selectors::TILE_DIALOG_START),
            Page::ResetConfirm => shown.push(selectors::RESET_CONFIRM_DIALOG),
            Page::AwaitButton => {
                if selector == selectors::RESET_FINAL_OK {
                    if self.confirm_left > 0 {
                        self.confirm_left -= 1;
                        return 0;
                    }
                    return usize::from(self.retry_left == 0);
                }
                if selector == selectors::RESET_RETRY {
                    return usize::from(self.confirm_left == 0 && self.retry_left > 0);
                }
            }
            Page::Wlan => shown.push(selectors::WLAN_CHANNEL),
            Page::WlanChannel => {
                shown.push(selectors::WLAN_CHANNEL);
                if !self.device.wlan_enabled {
                    shown.push(selectors::SWITCH_ON_WLAN);
                } else if let Some(count) = self.wlan_count(selector) {
                    return count;
                }
            }
        }

        usize::from(shown.iter().any(|s| *s == selector))
    }

    fn wlan_count(&self, selector: &str) -> Option<usize> {
        let networks = self.device.networks.len();

        match self.device.wlan_ui {
            WlanUi::Rows if selector == selectors::WLAN_ROWS => Some(networks),
            WlanUi::Table if selector == selectors::LEGACY_WLAN_ROWS => Some(networks),
            _ => self.wlan_field(selector).map(|_| 1),
        }
    }

    /// Network entry and field addressed by a row selector.
    fn wlan_field(&self, selector: &str) -> Option<String> {
        for (row, network) in self.device.networks.iter().enumerate() {
            let row = row + 1;
            match self.device.wlan_ui {
                WlanUi::Rows => {
                    let values = [
                        &network.name,
                        &network.band,
                        &network.channel,
                        &network.mac,
                        &network.signal,
                    ];
                    for (prefid, value) in WLAN_ROW_FIELDS.iter().zip(values) {
                        if selectors::wlan_row_field(row, prefid) == selector {
                            return Some(value.clone());
                        }
                    }
                }
                WlanUi::Table => {
                    let values = [
                        &network.signal,
                        &network.name,
                        &network.band,
                        &network.mac,
                        &network.channel,
                    ];
                    for (column, value) in (1..=LEGACY_WLAN_COLUMNS).zip(values) {
                        if selectors::legacy_wlan_cell(row, column) == selector {
                            return Some(value.clone());
                        }
                    }
                }
            }
        }

        None
    }

    fn text(&self, selector: &str) -> String {
        if selector == selectors::MODEL_TEXT[0] {
            self.device.model_title.clone()
        } else if selector == selectors::VERSION_TEXT[0] {
            format!("FRITZ!OS: {}", self.device.firmware)
        } else {
            self.wlan_field(selector).unwrap_or_default()
        }
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        if self
            .device
            .kill_transport_on_click
            .is_some_and(|target| target == selector)
        {
            self.device.kill_transport_on_click = None;
            self.transport_lost = true;
            self.record(SimEvent::TransportLost);
            bail!("browser connection closed");
        }

        match self.screen {
            Screen::Blank | Screen::ButtonAuth => {}
            Screen::Language => {
                for language in ["en", "de"] {
                    if selectors::language_option(language) == selector {
                        self.record(SimEvent::LanguageSelected(language.to_string()));
                    }
                }
                if selector == selectors::LANGUAGE_SUBMIT {
                    self.language_done = true;
                    self.land();
                }
            }
            Screen::NewPassword => {
                if selector == selectors::NEW_PASSWORD_SUBMIT {
                    let password = self
                        .typed
                        .get(selectors::NEW_PASSWORD_INPUT)
                        .cloned()
                        .context("no password entered")?;
                    self.record(SimEvent::PasswordSet(password.clone()));
                    self.device.credential = Some(password);
                    self.logged_in = true;
                    self.land();
                }
            }
            Screen::Login => {
                if selector == selectors::LOGIN_SUBMIT {
                    self.login_submissions += 1;
                    let typed = self.typed.remove(selectors::PASSWORD_INPUT);
                    if typed.is_some() && typed == self.device.credential {
                        self.record(SimEvent::LoginAccepted);
                        self.logged_in = true;
                        self.land();
                    } else {
                        self.record(SimEvent::LoginRejected);
                    }
                } else if selector == selectors::FORGOT_PASSWORD[0] {
                    self.screen = Screen::ForgotPassword;
                }
            }
            Screen::ForgotPassword => {
                if selector == selectors::SEND_FACTORY_RESET {
                    self.factory_reset();
                }
            }
            Screen::Console => self.console_click(selector)?,
        }

        Ok(())
    }

    fn console_click(&mut self, selector: &str) -> Result<()> {
        if let Some(dialog) = self.device.dialogs.first().copied() {
            let resolved = match dialog {
                SimDialog::ContinueSetup => selector == selectors::CONTINUE_SETUP_DECLINE[0],
                SimDialog::ProviderWizard => {
                    selector == selectors::WIZARD_FORWARD && self.provider.is_some()
                }
                SimDialog::FirmwareNotice => selector == selectors::FIRMWARE_NOTICE_DISMISS[0],
                SimDialog::StayInformed => selector == selectors::STAY_INFORMED_DISMISS[0],
                SimDialog::Diagnostics => {
                    if selector == selectors::DIAGNOSTICS_TOGGLE {
                        self.diagnostics = !self.diagnostics;
                    }
                    selector == selectors::APPLY
                }
                SimDialog::NumberedConfirmation => selector == selectors::NUMBERED_CONFIRMATION,
                SimDialog::Unmodeled => selector == UNMODELED_CONTINUE,
            };

            if resolved {
                self.device.dialogs.remove(0);
                self.record(SimEvent::DialogResolved(dialog));
            }
            return Ok(());
        }

        if selector == selectors::HOME[0] {
            self.page = Page::Overview;
            self.system_expanded = false;
            self.user_menu_expanded = false;
        } else if selector == selectors::SYSTEM {
            self.system_expanded = true;
        } else if selector == selectors::UPDATE_MENU {
            self.page = Page::Update;
        } else if selector == selectors::BACKUP_MENU {
            self.page = Page::Backup;
        } else if selector == selectors::UPDATE_FILE_TAB[0] {
            self.page = Page::UpdateFile;
        } else if selector == selectors::EXPORT_SETTINGS_TOGGLE {
            self.export_settings = !self.export_settings;
        } else if selector == selectors::START_UPDATE {
            self.flash()?;
        } else if selector == selectors::USER_MENU_ICON {
            self.user_menu_expanded = true;
        } else if selector == selectors::ADVANCED_VIEW_LINK {
            self.advanced_view = true;
            self.user_menu_expanded = false;
            self.record(SimEvent::AdvancedViewEnabled);
        } else if selector == selectors::FACTORY_TAB {
            self.page = Page::Factory;
        } else if selector == selectors::RESET_START[0] || selector == selectors::TILE_DIALOG_START {
            self.page = Page::ResetConfirm;
        } else if selector == selectors::FACTORY_TILE {
            self.page = Page::TileDialog;
        } else if selector == selectors::RESET_CONFIRM_DIALOG && self.page == Page::ResetConfirm {
            self.page = Page::AwaitButton;
            self.confirm_left = self.device.reset_confirm_checks;
            self.retry_left = self.device.reset_retry_prompts;
        } else if selector == selectors::RESET_RETRY && self.page == Page::AwaitButton {
            self.retry_left = self.retry_left.saturating_sub(1);
            self.confirm_left = self.device.reset_confirm_checks;
            self.record(SimEvent::ResetRetried);
        } else if selector == selectors::RESET_FINAL_OK && self.page == Page::AwaitButton {
            self.factory_reset();
        } else if selector == selectors::WLAN_MENU {
            self.page = Page::Wlan;
        } else if selector == selectors::WLAN_CHANNEL {
            self.page = Page::WlanChannel;
        } else if selector == selectors::SWITCH_ON_WLAN {
            self.device.wlan_enabled = true;
            self.record(SimEvent::WlanSwitchedOn);
        }

        Ok(())
    }

    fn flash(&mut self) -> Result<()> {
        let image = self.uploaded.take().context("no firmware file selected")?;
        let name = image
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .context("firmware file has no name")?;
        let version = FirmwareVersion::parse(&name)
            .with_context(|| format!("unsupported firmware file {name}"))?;

        self.device.firmware = version.to_string();
        self.device.dialogs.push(SimDialog::FirmwareNotice);
        self.record(SimEvent::Flashed(version.to_string()));
        self.reboot();
        Ok(())
    }
}

/// Handle on a simulated device; all views share its state.
#[derive(Clone)]
pub struct SimulatedRouter {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedRouter {
    pub fn new(device: SimulatedDevice) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState::new(device))),
        }
    }

    pub fn launcher(&self) -> SimulatedLauncher {
        SimulatedLauncher {
            state: self.state.clone(),
        }
    }

    pub fn probe(&self) -> SimulatedProbe {
        SimulatedProbe {
            state: self.state.clone(),
        }
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.state.borrow().events.clone()
    }

    pub fn firmware(&self) -> String {
        self.state.borrow().device.firmware.clone()
    }

    pub fn credential(&self) -> Option<String> {
        self.state.borrow().device.credential.clone()
    }

    pub fn login_submissions(&self) -> u32 {
        self.state.borrow().login_submissions
    }

    /// Cut the connection of the current browser session.
    pub fn kill_transport(&self) {
        let mut state = self.state.borrow_mut();
        state.transport_lost = true;
        state.record(SimEvent::TransportLost);
    }

    /// Write placeholder images for every version the table plans for this
    /// device's model.
    pub fn stage_images(&self, dir: &Path, table: &FirmwareTable) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).context("failed to create firmware directory")?;

        let model_title = self.state.borrow().device.model_title.clone();
        let model = crate::services::device_info::model_id(&model_title)
            .context("failed to derive simulated model")?;

        let plan = table
            .resolve(&model, "00.00")
            .context("failed to plan simulated images")?;

        plan.images()
            .into_iter()
            .map(|target| {
                let path = dir.join(&target.image);
                fs::write(&path, b"simulated firmware image")
                    .with_context(|| format!("failed to write {}", path.display()))?;
                Ok(path)
            })
            .collect()
    }
}

pub struct SimulatedLauncher {
    state: Rc<RefCell<SimState>>,
}

impl BrowserLauncher for SimulatedLauncher {
    fn launch(&self) -> Result<Box<dyn Browser>> {
        let mut state = self.state.borrow_mut();
        state.generation += 1;
        state.transport_lost = false;
        state.logged_in = false;
        state.screen = Screen::Blank;
        state.record(SimEvent::BrowserLaunched);

        Ok(Box::new(SimulatedBrowser {
            state: self.state.clone(),
            generation: state.generation,
        }))
    }
}

pub struct SimulatedProbe {
    state: Rc<RefCell<SimState>>,
}

impl Probe for SimulatedProbe {
    fn status(&self, url: &str) -> Result<u16> {
        let mut state = self.state.borrow_mut();

        if state.outage > 0 {
            state.outage -= 1;
            bail!("connection refused: {url}");
        }

        if url.trim_end_matches('/') == state.device.address {
            Ok(STATUS_OK)
        } else {
            bail!("connection timed out: {url}")
        }
    }
}

pub struct SimulatedBrowser {
    state: Rc<RefCell<SimState>>,
    generation: u64,
}

impl SimulatedBrowser {
    fn connected(&self) -> Result<std::cell::RefMut<'_, SimState>> {
        let state = self.state.borrow_mut();
        if state.transport_lost || state.generation != self.generation {
            bail!("browser connection closed");
        }
        Ok(state)
    }
}

impl Browser for SimulatedBrowser {
    fn find_all(&self, selector: &str) -> Result<Vec<Element>> {
        let count = self.connected()?.count(selector);
        Ok((0..count).map(|index| Element::new(selector, index)).collect())
    }

    fn is_displayed(&self, _element: &Element) -> Result<bool> {
        self.connected().map(|_| true)
    }

    fn is_enabled(&self, _element: &Element) -> Result<bool> {
        self.connected().map(|_| true)
    }

    fn is_selected(&self, element: &Element) -> Result<bool> {
        let state = self.connected()?;

        Ok(if element.selector == selectors::EXPORT_SETTINGS_TOGGLE {
            state.export_settings
        } else if element.selector == selectors::DIAGNOSTICS_TOGGLE {
            state.diagnostics
        } else {
            false
        })
    }

    fn text(&self, element: &Element) -> Result<String> {
        Ok(self.connected()?.text(&element.selector))
    }

    fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        let state = self.connected()?;

        if name != "title" {
            return Ok(None);
        }

        let is_signal = (1..=state.device.networks.len()).any(|row| {
            selectors::wlan_row_field(row, "rssi") == element.selector
                || selectors::legacy_wlan_cell(row, 1) == element.selector
        });

        Ok(is_signal.then(|| state.text(&element.selector)))
    }

    fn native_click(&mut self, element: &Element) -> Result<()> {
        self.connected()?.click(&element.selector)
    }

    fn script_click(&mut self, element: &Element) -> Result<()> {
        self.connected()?.click(&element.selector)
    }

    fn send_keys(&mut self, element: &Element, text: &str) -> Result<()> {
        let mut state = self.connected()?;

        // the login form answers to both of its selectors
        let field = if element.selector == selectors::CREDENTIAL_PROMPT {
            selectors::PASSWORD_INPUT.to_string()
        } else {
            element.selector.clone()
        };
        state.typed.insert(field, text.to_string());
        Ok(())
    }

    fn upload_file(&mut self, _element: &Element, path: &Path) -> Result<()> {
        self.connected()?.uploaded = Some(path.to_path_buf());
        Ok(())
    }

    fn select_value(&mut self, element: &Element, value: &str) -> Result<()> {
        let mut state = self.connected()?;

        if element.selector == selectors::PROVIDER_SELECT {
            state.provider = Some(value.to_string());
        }
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<()> {
        let mut state = self.connected()?;

        if state.outage > 0 {
            bail!("net::ERR_CONNECTION_REFUSED at {url}");
        }

        let target = url.split('?').next().unwrap_or(url).trim_end_matches('/');
        if target != state.device.address {
            bail!("net::ERR_NAME_NOT_RESOLVED at {url}");
        }

        state.land();
        Ok(())
    }

    fn clear_cookies(&mut self) -> Result<()> {
        self.connected()?.logged_in = false;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.connected().is_ok()
    }

    fn quit(&mut self) -> Result<()> {
        Ok(())
    }
}
