//! WLAN neighborhood scan
//!
//! Reads the channel page's list of foreign networks in both console
//! layouts: the row layout of current firmware and the result table of older
//! generations.

use crate::{selectors, session::SessionController};
use anyhow::{Result, bail};
use log::{debug, info, warn};
use std::{fmt, time::Duration};

const SCAN_ATTEMPTS: u32 = 2;
const SCAN_RETRY_PAUSE: Duration = Duration::from_secs(5);
const MENU_SETTLE: Duration = Duration::from_secs(1);
const SCAN_SETTLE: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalQuality {
    Weak,
    Fair,
    Strong,
}

impl SignalQuality {
    /// Classify a console signal label such as `"75%"` or `"<10%"`.
    pub fn from_label(label: &str) -> Option<Self> {
        let percent = label
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('%')
            .trim()
            .parse::<u32>()
            .ok()?;

        Some(match percent {
            0..=30 => SignalQuality::Weak,
            31..=60 => SignalQuality::Fair,
            _ => SignalQuality::Strong,
        })
    }
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalQuality::Weak => write!(f, "weak"),
            SignalQuality::Fair => write!(f, "fair"),
            SignalQuality::Strong => write!(f, "strong"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WlanEntry {
    pub name: String,
    pub band: String,
    pub channel: String,
    pub mac: String,
    pub signal: String,
}

impl WlanEntry {
    pub fn quality(&self) -> Option<SignalQuality> {
        SignalQuality::from_label(&self.signal)
    }
}

/// Service for the WLAN environment scan
pub struct WlanService;

impl WlanService {
    /// Scan for networks around the device
    ///
    /// Clears the session's entry list first and fills it with the rows the
    /// console reports.
    ///
    /// # Returns
    /// Number of networks found; an empty scan after all attempts is an error
    pub fn scan(controller: &mut SessionController) -> Result<usize> {
        debug!("scan() called");

        controller.require_session("wlan scan")?;
        controller.close_overlay();
        controller.session_mut().wlan_entries.clear();

        for attempt in 1..=SCAN_ATTEMPTS {
            Self::open_channel_page(controller);

            let entries = Self::read_rows(controller);
            if !entries.is_empty() {
                info!("found {} wlan networks", entries.len());
                controller.session_mut().wlan_entries = entries;
                return Ok(controller.session().wlan_entries.len());
            }

            warn!("wlan scan attempt {attempt}/{SCAN_ATTEMPTS} found no networks");
            if attempt < SCAN_ATTEMPTS {
                controller.console().sleep(SCAN_RETRY_PAUSE);
            }
        }

        bail!("failed to scan wlan: no networks found")
    }

    /// Log the scan result and return it unchanged.
    pub fn summary(controller: &SessionController) -> &[WlanEntry] {
        let entries = &controller.session().wlan_entries;

        if entries.is_empty() {
            info!("wlan summary: no networks recorded");
        }

        for (number, entry) in entries.iter().enumerate() {
            let quality = entry
                .quality()
                .map(|q| q.to_string())
                .unwrap_or_else(|| "unknown".to_string());

            info!(
                "{:>2}. {} | {} | channel {} | {} | signal {} ({quality})",
                number + 1,
                entry.name,
                entry.band,
                entry.channel,
                entry.mac,
                entry.signal
            );
        }

        entries
    }

    fn open_channel_page(controller: &mut SessionController) {
        let timeout = controller.timings().dialog_timeout;
        let console = controller.console_mut();

        if !console.click(selectors::WLAN_MENU, timeout, 2) {
            warn!("failed to open wlan menu");
        }
        console.sleep(MENU_SETTLE);

        if !console.click(selectors::WLAN_CHANNEL, timeout, 2) {
            warn!("failed to open wlan channel page");
        }
        console.sleep(SCAN_SETTLE);

        if console.is_visible(selectors::SWITCH_ON_WLAN) {
            info!("wlan is switched off, switching it on");
            console.click(selectors::SWITCH_ON_WLAN, timeout, 1);
            console.sleep(SCAN_SETTLE);
        }
    }

    fn read_rows(controller: &SessionController) -> Vec<WlanEntry> {
        let console = controller.console();

        let rows = console
            .locate_all(selectors::WLAN_ROWS, Duration::ZERO)
            .map(|rows| rows.len())
            .unwrap_or(0);

        if rows > 0 {
            return (1..=rows)
                .map(|row| {
                    let field = |prefid: &str| {
                        console
                            .text_of(&selectors::wlan_row_field(row, prefid))
                            .map(|text| text.trim().to_string())
                            .unwrap_or_default()
                    };

                    WlanEntry {
                        name: field("name"),
                        band: field("band"),
                        channel: field("channel"),
                        mac: field("mac"),
                        signal: console
                            .attribute_of(&selectors::wlan_row_field(row, "rssi"), "title")
                            .unwrap_or_default(),
                    }
                })
                .collect();
        }

        let rows = console
            .locate_all(selectors::LEGACY_WLAN_ROWS, Duration::ZERO)
            .map(|rows| rows.len())
            .unwrap_or(0);

        (1..=rows)
            .map(|row| {
                let cell = |column: usize| {
                    console
                        .text_of(&selectors::legacy_wlan_cell(row, column))
                        .map(|text| text.trim().to_string())
                        .unwrap_or_default()
                };

                WlanEntry {
                    signal: console
                        .attribute_of(&selectors::legacy_wlan_cell(row, 1), "title")
                        .unwrap_or_default(),
                    name: cell(2),
                    band: cell(3),
                    mac: cell(4),
                    channel: cell(5),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_labels_map_to_quality() {
        assert_eq!(SignalQuality::from_label("30%"), Some(SignalQuality::Weak));
        assert_eq!(SignalQuality::from_label("<10 %"), Some(SignalQuality::Weak));
        assert_eq!(SignalQuality::from_label("31%"), Some(SignalQuality::Fair));
        assert_eq!(SignalQuality::from_label("60%"), Some(SignalQuality::Fair));
        assert_eq!(SignalQuality::from_label("61%"), Some(SignalQuality::Strong));
        assert_eq!(SignalQuality::from_label("n/a"), None);
    }

    #[test]
    fn entry_quality_uses_its_signal_label() {
        let entry = WlanEntry {
            signal: "85%".to_string(),
            ..Default::default()
        };
        assert_eq!(entry.quality(), Some(SignalQuality::Strong));
    }
}
