//! Element identifiers of the FRITZ!Box web console.
//!
//! Every logical target is either a single XPath or an ordered fallback chain
//! of alternatives tried in sequence, covering the differences between
//! firmware generations and console languages.

pub type Selector = &'static str;
pub type SelectorChain = &'static [Selector];

// ============================================================================
// Login
// ============================================================================

pub const CREDENTIAL_PROMPT: Selector = r#"//*[@id="uiPass" or @type="password"]"#;
pub const PASSWORD_INPUT: Selector = r#"//*[@id="uiPass"]"#;
pub const LOGIN_SUBMIT: Selector = r#"//*[@id="submitLoginBtn"]"#;

pub const BUTTON_AUTH_HINT: Selector = r#"//*[contains(text(), "Taste an der FRITZ!Box") or contains(text(), "button on the FRITZ!Box")]"#;

pub const NEW_PASSWORD_INPUT: Selector = r#"//*[@id="uiNewPassword"]"#;
pub const NEW_PASSWORD_REPEAT: Selector = r#"//*[@id="uiNewPasswordRepeat"]"#;
pub const NEW_PASSWORD_SUBMIT: Selector = r#"//*[@id="uiSetPassword"]"#;

pub const LANGUAGE_SCREEN: Selector = r#"//*[@id="uiLanguage-en" or @id="uiLanguage-de"]"#;
pub const LANGUAGE_SUBMIT: Selector = r#"//*[@id="submitLangBtn"]"#;

pub fn language_option(language: &str) -> String {
    format!(r#"//*[@id="uiLanguage-{language}"]"#)
}

// ============================================================================
// Navigation
// ============================================================================

/// Primary navigation entries; any one of them interactive means the menu is ready.
pub const MENU_MARKERS: SelectorChain = &[
    r#"//*[@id="wlan"]"#,
    r#"//*[@id="sys"]"#,
    r#"//*[@id="internet"]"#,
    r#"//*[@id="home"]"#,
];

pub const HOME: SelectorChain = &[r#"//*[@id="mHome"]"#, r#"//*[@id="overview"]"#];
pub const SYSTEM: Selector = r#"//*[@id="sys"]"#;
pub const UPDATE_MENU: Selector = r#"//*[@id="mUp"]"#;
pub const BACKUP_MENU: Selector = r#"//*[@id="mSave"]"#;
pub const WLAN_MENU: Selector = r#"//*[@id="wlan"]"#;
pub const WLAN_CHANNEL: Selector = r#"//*[@id="chan"]"#;

pub const CLOSE_OVERLAY: SelectorChain = &[
    r#"//button[.//div[text()="Schließen"] or text()="Schließen"]"#,
    r#"//button[.//div[text()="Close"] or text()="Close"]"#,
];

// ============================================================================
// Device information
// ============================================================================

pub const MODEL_TEXT: SelectorChain = &[
    r#"//*[@id="blueBarTitel"]"#,
    r#"//span[contains(@class, "version_text")]"#,
    r#"//div[@class="boxInfo"]/span"#,
];

pub const VERSION_TEXT: SelectorChain = &[
    r#"//*[@class="fakeTextInput" or contains(@class, "version_text")]"#,
    r#"//*[@id="content"]/div[1]/div[div[contains(text(), "FRITZ!OS")]]"#,
];

// ============================================================================
// Firmware update
// ============================================================================

pub const UPDATE_FILE_TAB: SelectorChain = &[
    r#"//*[@id="userUp"]"#,
    r#"//a[contains(text(), "FRITZ!OS-Datei")]"#,
    r#"//a[contains(text(), "FRITZ!OS file")]"#,
];
pub const EXPORT_SETTINGS_TOGGLE: Selector = r#"//*[@id="uiExportCheck"]"#;
pub const FIRMWARE_FILE_INPUT: Selector = r#"//*[@id="uiFile"]"#;
pub const START_UPDATE: Selector = r#"//*[@id="uiUpdate"]"#;

pub const USER_MENU_ICON: Selector = r#"//*[@id="blueBarUserMenuIcon"]"#;
pub const USER_MENU_EXPANDED: Selector =
    r#"//*[@id="blueBarUserMenuIcon" and @aria-expanded="true"]"#;
pub const ADVANCED_VIEW_LINK: Selector = r#"//a[@id="expert"]"#;

// ============================================================================
// Factory reset
// ============================================================================

pub const FACTORY_TAB: Selector = r#"//*[@id="default"]"#;
pub const RESET_START: SelectorChain = &[
    r#"//*[@id="uiDefaults"]"#,
    r#"//*[@id="content"]/div/button"#,
];

pub const FACTORY_TILE: Selector = r#"//div[contains(@class, "tile") and .//*[contains(text(), "Werkseinstellungen") or contains(text(), "Factory Settings")]]"#;
pub const TILE_DIALOG_START: Selector =
    r#"//div[@role="dialog"]//button[contains(@class, "primary")]"#;

pub const RESET_CONFIRM_DIALOG: Selector = r#"//*[@id="Button1"]"#;
pub const RESET_FINAL_OK: Selector = r#"//button[contains(text(), "OK")]"#;
pub const RESET_RETRY: Selector =
    r#"//button[contains(text(), "Wiederholen") or contains(text(), "Retry")]"#;

pub const FORGOT_PASSWORD: SelectorChain = &[
    r#"//*[@id="dialogFoot"]/a"#,
    r#"//a[contains(translate(text(), "PASSWORTVERGESN", "passwortvergesn"), "passwort vergessen")]"#,
    r#"//a[contains(translate(text(), "KENWORTVERGESN", "kenwortvergesn"), "kennwort vergessen")]"#,
    r#"//a[contains(translate(text(), "FORGTPASWD", "forgtpaswd"), "forgot password")]"#,
];
pub const SEND_FACTORY_RESET: Selector = r#"//*[@id="sendFacReset"]"#;

// ============================================================================
// WLAN
// ============================================================================

pub const SWITCH_ON_WLAN: Selector =
    r#"//button[contains(text(), "WLAN einschalten") or contains(text(), "Switch on Wi-Fi")]"#;

pub const WLAN_ROWS: Selector = r#"//div[@class="flexRow" and .//div[@prefid="rssi"]]"#;
pub const LEGACY_WLAN_ROWS: Selector = r#"//tbody[@id="uiScanResultBody"]/tr"#;

/// Field `prefid` of the `row`-th (1-based) modern scan row.
pub fn wlan_row_field(row: usize, prefid: &str) -> String {
    format!(r#"({WLAN_ROWS})[{row}]//div[@prefid="{prefid}"]"#)
}

/// Cell `column` (1-based) of the `row`-th (1-based) legacy scan table row.
pub fn legacy_wlan_cell(row: usize, column: usize) -> String {
    format!("({LEGACY_WLAN_ROWS})[{row}]/td[{column}]")
}

// ============================================================================
// Dialogs
// ============================================================================

pub const CONTINUE_SETUP_HEADING: Selector = r#"//h1[contains(text(), "Einrichtung fortsetzen") or contains(text(), "Continue setup")]"#;
pub const CONTINUE_SETUP_DECLINE: SelectorChain =
    &[r#"//*[@id="uiCancel"]"#, r#"//*[@id="uiAbort"]"#];

pub const PROVIDER_SELECT: Selector = r#"//*[@id="uiSuperprovider"]"#;
pub const WIZARD_SKIP: SelectorChain = &[r#"//*[@id="dlg_welcome"]/p[3]/a"#, r#"//*[@id="uiSkip"]"#];
pub const WIZARD_FORWARD: Selector = r#"//*[@id="uiForward"]"#;
pub const PROVIDER_OTHER: &str = "more";

pub const FIRMWARE_NOTICE_HEADING: Selector = r#"//h1[contains(text(), "FRITZ!OS wurde aktualisiert") or contains(text(), "FRITZ!OS has been updated")]"#;
pub const FIRMWARE_NOTICE_DISMISS: SelectorChain = &[
    r#"//button[contains(text(), "OK")]"#,
    r#"//a[contains(text(), "Weiter")]"#,
    r#"//a[contains(text(), "Continue")]"#,
];

pub const STAY_INFORMED_HEADING: Selector = r#"//h1[contains(text(), "Informiert bleiben") or contains(text(), "Stay informed")]"#;
pub const STAY_INFORMED_DISMISS: SelectorChain = &[r#"//*[@id="content"]/div[2]/button[1]"#];

pub const DIAGNOSTICS_TOGGLE: Selector = r#"//*[@id="uiTr069diag"]"#;
pub const APPLY: Selector = r#"//*[@id="uiApply"]"#;

pub const NUMBERED_CONFIRMATION: Selector = r#"//*[@id="Button1"]"#;

/// Affirmative controls tried by the fallback resolver, most specific first.
pub const POSITIVE_BUTTONS: SelectorChain = &[
    r#"//*[@id="uiApply"]"#,
    r#"//button[@name="apply"]"#,
    r#"//*[@id="uiForward"]"#,
    r#"//button[contains(translate(text(), "WEITR", "weitr"), "weiter")] | //a[contains(translate(text(), "WEITR", "weitr"), "weiter")]"#,
    r#"//button[contains(translate(text(), "CONTINUE", "continue"), "continue")]"#,
    r#"//button[translate(normalize-space(text()), "ok", "OK")="OK"] | //a[translate(normalize-space(text()), "ok", "OK")="OK"]"#,
    r#"//button[contains(translate(text(), "ÜBERNHM", "übernhm"), "übernehmen")]"#,
    r#"//button[contains(translate(text(), "FERTIGSL", "fertigsl"), "fertigstellen")]"#,
    r#"//button[contains(translate(text(), "FINSH", "finsh"), "finish")]"#,
    r#"//*[@id="submit_button"]"#,
];
