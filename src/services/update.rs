//! Firmware flashing through the console's update page

use crate::{selectors, session::SessionController};
use anyhow::{Context, Result, bail, ensure};
use log::{debug, info, warn};
use std::{path::Path, time::Duration};

const PAGE_SETTLE: Duration = Duration::from_secs(2);
const MENU_EXPAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Service for firmware updates
pub struct UpdateService;

impl UpdateService {
    /// Flash a firmware image
    ///
    /// Success means the device answered again within the reboot probe bound.
    /// The resulting firmware version is not checked here.
    ///
    /// # Arguments
    /// * `controller` - Session of the device to flash
    /// * `image` - Path of the firmware image file
    ///
    /// # Returns
    /// Result indicating success or failure
    pub fn perform_update(controller: &mut SessionController, image: &Path) -> Result<()> {
        debug!("perform_update() called: {}", image.display());

        ensure!(
            image.is_file(),
            "failed to update firmware: image {} not found",
            image.display()
        );

        controller.require_session("firmware update")?;
        controller.close_overlay();

        Self::open_update_file_tab(controller)?;

        let timeout = controller.timings().dialog_timeout;
        let console = controller.console_mut();

        if console
            .is_selected(selectors::EXPORT_SETTINGS_TOGGLE, timeout)
            .unwrap_or(false)
        {
            debug!("switching off settings export");
            if !console.click(selectors::EXPORT_SETTINGS_TOGGLE, timeout, 2) {
                warn!("failed to switch off settings export");
            }
        }

        console
            .upload(selectors::FIRMWARE_FILE_INPUT, image, timeout)
            .context("failed to submit firmware image")?;

        if !console.click(selectors::START_UPDATE, timeout, 3) {
            bail!("failed to start firmware update");
        }

        let dwell = controller.timings().update_dwell;
        info!(
            "flashing {}, waiting {}s for the device to reboot",
            image.display(),
            dwell.as_secs()
        );
        controller.console().sleep(dwell);
        controller.invalidate();

        let rounds = controller.timings().reboot_probe_rounds;
        let delay = controller.timings().reboot_probe_delay;
        controller
            .wait_for_device(rounds, delay)
            .context("failed to reach device after firmware update")?;

        info!("device is back after firmware update");
        Ok(())
    }

    /// Switch the console to the advanced view
    ///
    /// Old firmware only offers the update file upload in the advanced view.
    /// Nothing is changed when the upload tab is already available.
    pub fn activate_advanced_view(controller: &mut SessionController) -> Result<()> {
        debug!("activate_advanced_view() called");

        controller.require_session("advanced view activation")?;
        controller.close_overlay();

        let timeout = controller.timings().dialog_timeout;
        controller.go_home();
        {
            let console = controller.console_mut();
            console.click(selectors::SYSTEM, timeout, 2);
            console.click(selectors::UPDATE_MENU, timeout, 2);
            console.sleep(PAGE_SETTLE);
        }

        if controller.console().first_existing(selectors::UPDATE_FILE_TAB).is_some() {
            info!("advanced view already active");
            controller.go_home();
            return Ok(());
        }

        let console = controller.console_mut();
        if !console.script_click(selectors::USER_MENU_ICON, timeout) {
            bail!("failed to open user menu");
        }

        console
            .locate(selectors::USER_MENU_EXPANDED, MENU_EXPAND_TIMEOUT, false)
            .context("failed to expand user menu")?;

        if !console.script_click(selectors::ADVANCED_VIEW_LINK, timeout) {
            bail!("failed to select advanced view");
        }
        console.sleep(PAGE_SETTLE);

        info!("advanced view activated");
        controller.go_home();
        Ok(())
    }

    fn open_update_file_tab(controller: &mut SessionController) -> Result<()> {
        let timeout = controller.timings().dialog_timeout;

        controller.go_home();
        let console = controller.console_mut();

        // the system menu is already expanded when the update entry is shown
        if !console.is_visible(selectors::UPDATE_MENU) && !console.click(selectors::SYSTEM, timeout, 2)
        {
            warn!("failed to open system menu");
        }

        if !console.click(selectors::UPDATE_MENU, timeout, 2) {
            bail!("failed to open update menu");
        }
        console.sleep(PAGE_SETTLE);

        console
            .click_first(selectors::UPDATE_FILE_TAB, timeout)
            .context("failed to open firmware file tab")?;
        console.sleep(PAGE_SETTLE);

        Ok(())
    }
}
