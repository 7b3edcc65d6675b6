//! Model and firmware version detection

use crate::{selectors, services::firmware::FirmwareVersion, session::SessionController};
use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use regex::Regex;
use std::{sync::LazyLock, time::Duration};

const PAGE_SETTLE: Duration = Duration::from_secs(2);

static MODEL_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4,})").expect("model pattern is valid"));

/// Normalize a console title such as `"FRITZ!Box 6890 LTE"` to a model id.
pub fn model_id(raw: &str) -> Option<String> {
    let number = MODEL_NUMBER.captures(raw)?.get(1)?.as_str();

    if number == "6890" || raw.to_uppercase().contains("LTE") {
        Some(format!("{number}_LTE"))
    } else {
        Some(number.to_string())
    }
}

/// Service reading device identity from the console
pub struct DeviceInfoService;

impl DeviceInfoService {
    /// Detect the device model and store it in the session
    ///
    /// Looks at the current page first and at the overview page second.
    ///
    /// # Returns
    /// The normalized model id
    pub fn detect_model(controller: &mut SessionController) -> Result<String> {
        debug!("detect_model() called");

        controller.require_session("model detection")?;
        controller.close_overlay();

        let raw = match Self::read_model_text(controller) {
            Some(raw) => raw,
            None => {
                debug!("no model text on current page, trying overview");
                controller.go_home();
                controller.console().sleep(PAGE_SETTLE);
                Self::read_model_text(controller).context("failed to read model text")?
            }
        };

        let model = model_id(&raw)
            .with_context(|| format!("failed to detect model from \"{raw}\""))?;

        info!("detected model {model}");
        controller.session_mut().model = Some(model.clone());
        Ok(model)
    }

    /// Detect the installed firmware version and store the raw text in the session
    ///
    /// # Returns
    /// The normalized version
    pub fn detect_version(controller: &mut SessionController) -> Result<FirmwareVersion> {
        debug!("detect_version() called");

        controller.require_session("version detection")?;
        controller.close_overlay();

        let timeout = controller.timings().dialog_timeout;
        controller.go_home();
        {
            let console = controller.console_mut();
            if !console.click(selectors::SYSTEM, timeout, 2) {
                warn!("failed to open system menu");
            }
            if !console.click(selectors::UPDATE_MENU, timeout, 2) {
                warn!("failed to open update menu");
            }
            console.sleep(PAGE_SETTLE);
        }

        let console = controller.console();
        let raw = selectors::VERSION_TEXT
            .iter()
            .filter_map(|selector| console.text_of(selector))
            .map(|text| text.trim().to_string())
            .find(|text| !text.is_empty())
            .context("failed to read firmware version text")?;

        controller.session_mut().firmware_version = Some(raw.clone());

        let Some(version) = FirmwareVersion::parse(&raw) else {
            bail!("failed to normalize firmware version \"{raw}\"");
        };

        info!("detected firmware version {version}");
        Ok(version)
    }

    fn read_model_text(controller: &SessionController) -> Option<String> {
        let console = controller.console();

        selectors::MODEL_TEXT
            .iter()
            .filter_map(|selector| console.text_of(selector))
            .find(|text| MODEL_NUMBER.is_match(text))
    }
}
