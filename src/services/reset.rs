//! Factory reset, through the console menus or the login page's
//! "forgot password" link

use crate::{selectors, session::SessionController};
use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::time::Duration;

const PAGE_SETTLE: Duration = Duration::from_secs(2);
const CONFIRM_POLL: Duration = Duration::from_secs(10);
const FORGOT_LINK_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_RESET_ATTEMPTS: u32 = 3;

/// Ways to reach the reset control, tried in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResetLayout {
    /// system, backup, factory settings tab, reset button
    Linear,
    /// system, backup, factory settings tile, dialog button
    Tile,
}

/// Service for factory resets
pub struct ResetService;

impl ResetService {
    /// Reset the device to factory settings through the console menus
    ///
    /// The device only proceeds after a button on it has been pressed, so the
    /// final confirmation is awaited for a bounded time, re-arming the wait
    /// when the console offers a retry.
    ///
    /// # Returns
    /// Result indicating success or failure
    pub fn factory_reset(controller: &mut SessionController) -> Result<()> {
        debug!("factory_reset() called");

        controller.require_session("factory reset")?;
        controller.close_overlay();

        let layout = [ResetLayout::Linear, ResetLayout::Tile]
            .into_iter()
            .find(|layout| Self::start(controller, *layout))
            .context("failed to find factory reset control")?;
        debug!("reset started through {layout:?} layout");

        let timeout = controller.timings().dialog_timeout;
        if !controller
            .console_mut()
            .click(selectors::RESET_CONFIRM_DIALOG, timeout, 2)
        {
            warn!("no reset confirmation dialog shown");
        }

        info!("confirm the factory reset by pressing a button on the device");
        Self::await_physical_confirmation(controller)?;

        let dwell = controller.timings().reset_dwell;
        info!("factory reset running, waiting {}s", dwell.as_secs());
        controller.console().sleep(dwell);

        controller.invalidate();
        controller.session_mut().was_reset = true;

        let rounds = controller.timings().reboot_probe_rounds;
        let delay = controller.timings().reboot_probe_delay;
        let base_url = controller
            .wait_for_device(rounds, delay)
            .context("failed to reach device after factory reset")?;

        let console = controller.console_mut();
        console.reload(&base_url, true, true)?;
        if console
            .locate(selectors::LANGUAGE_SCREEN, timeout, true)
            .is_ok()
        {
            info!("device shows the first-run language selection");
        } else {
            warn!("device is back but shows no first-run language selection");
        }

        Ok(())
    }

    /// Trigger a factory reset from the login page
    ///
    /// Works without a session, for devices whose credential is unknown.
    ///
    /// # Returns
    /// `false` if the console offers no such reset
    pub fn forgot_password_reset(controller: &mut SessionController) -> Result<bool> {
        debug!("forgot_password_reset() called");

        let probe_rounds = controller.timings().probe_rounds;
        let probe_delay = controller.timings().probe_delay;
        let base_url = controller.wait_for_device(probe_rounds, probe_delay)?;

        let timeout = controller.timings().dialog_timeout;
        let console = controller.console_mut();
        console.navigate(&base_url)?;

        let mut sent = false;
        for attempt in 1..=SEND_RESET_ATTEMPTS {
            if console
                .click_first(selectors::FORGOT_PASSWORD, FORGOT_LINK_TIMEOUT)
                .is_none()
            {
                debug!("attempt {attempt}: no forgot password link");
            } else if console.click(selectors::SEND_FACTORY_RESET, timeout, 1) {
                sent = true;
                break;
            }

            if attempt < SEND_RESET_ATTEMPTS {
                console.reload(&base_url, false, false)?;
                console.sleep(PAGE_SETTLE);
            }
        }

        if !sent {
            info!("console offers no factory reset on the login page");
            return Ok(false);
        }

        let dwell = controller.timings().forgot_password_dwell;
        info!("factory reset requested, waiting {}s", dwell.as_secs());
        controller.console().sleep(dwell);

        controller.invalidate();
        controller.session_mut().was_reset = true;
        Ok(true)
    }

    fn start(controller: &mut SessionController, layout: ResetLayout) -> bool {
        let timeout = controller.timings().dialog_timeout;

        controller.go_home();
        let console = controller.console_mut();
        console.click(selectors::SYSTEM, timeout, 2);
        if !console.click(selectors::BACKUP_MENU, timeout, 2) {
            debug!("{layout:?}: no backup menu");
            return false;
        }
        console.sleep(PAGE_SETTLE);

        match layout {
            ResetLayout::Linear => {
                console.click(selectors::FACTORY_TAB, timeout, 1)
                    && console.click_first(selectors::RESET_START, timeout).is_some()
            }
            ResetLayout::Tile => {
                console.click(selectors::FACTORY_TILE, timeout, 1)
                    && console.click(selectors::TILE_DIALOG_START, timeout, 2)
            }
        }
    }

    /// Every armed wait, the first one and each one re-armed by a retry,
    /// uses up one of the confirmation cycles.
    fn await_physical_confirmation(controller: &mut SessionController) -> Result<()> {
        let bound = controller.timings().reset_confirm_timeout;
        let cycles = 1 + controller.timings().reset_confirm_cycles;
        let timeout = controller.timings().dialog_timeout;
        let console = controller.console_mut();

        let mut cycle = 1;
        let mut deadline = console.clock().now() + bound;

        loop {
            if console.is_visible(selectors::RESET_FINAL_OK) {
                if console.click(selectors::RESET_FINAL_OK, timeout, 2) {
                    info!("factory reset confirmed on the device");
                    return Ok(());
                }
            } else if cycle < cycles
                && console.is_visible(selectors::RESET_RETRY)
                && console.click(selectors::RESET_RETRY, timeout, 1)
            {
                cycle += 1;
                deadline = console.clock().now() + bound;
                debug!("console asked to retry, confirmation wait re-armed ({cycle}/{cycles})");
                continue;
            }

            if console.clock().now() >= deadline {
                warn!("no confirmation on the device within cycle {cycle}/{cycles}");
                if cycle == cycles {
                    break;
                }
                cycle += 1;
                deadline = console.clock().now() + bound;
            }

            console.sleep(CONFIRM_POLL);
        }

        bail!("failed to confirm factory reset: no button press on the device within {cycles} cycles")
    }
}
