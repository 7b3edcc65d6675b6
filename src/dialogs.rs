//! Detectors and resolvers for the transient dialogs the console interposes
//!
//! Every handler is identified by a marker that only its own dialog shows.
//! The registry tries specific handlers in rank order and resolves at most
//! one dialog per call; the positive-button fallback is a separate last
//! resort for dialogs nobody modeled.

use crate::{
    browser::Console,
    selectors::{self, Selector, SelectorChain},
};
use log::{debug, info};
use std::time::Duration;

const FALLBACK_CLICK_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogKind {
    LanguageSelection,
    ContinueSetup,
    ProviderWizard,
    FirmwareNotice,
    StayInformed,
    DiagnosticsOptOut,
    NumberedConfirmation,
}

/// What identifies a dialog on screen.
#[derive(Clone, Debug)]
pub enum Marker {
    Present(Selector),
    AllOf(&'static [Selector]),
}

impl Marker {
    fn is_shown(&self, console: &Console) -> bool {
        match self {
            Marker::Present(selector) => console.is_visible(selector),
            Marker::AllOf(selectors) => selectors.iter().all(|s| console.is_visible(s)),
        }
    }
}

/// How a detected dialog is taken out of the way.
#[derive(Clone, Debug)]
pub enum Resolution {
    /// Click the first control of the chain that responds.
    ClickFirst(SelectorChain),
    /// Untick `toggle` if it is ticked, then click `submit`.
    ToggleOffThenSubmit { toggle: Selector, submit: Selector },
    /// Pick the session language, then submit.
    SelectLanguage { submit: Selector },
    /// Skip the wizard if possible, else pick `value` in `select` and advance.
    SkipOrSelect {
        skip: SelectorChain,
        select: Selector,
        value: &'static str,
        advance: Selector,
    },
}

#[derive(Clone, Debug)]
pub struct DialogHandler {
    pub kind: DialogKind,
    pub rank: u8,
    pub marker: Marker,
    pub resolution: Resolution,
}

impl DialogHandler {
    /// Short existence check, no waiting and no side effects.
    pub fn detect(&self, console: &Console) -> bool {
        self.marker.is_shown(console)
    }

    /// Resolve the dialog if it is present.
    ///
    /// # Returns
    /// `true` if the dialog was present and its resolution went through
    pub fn handle(&self, console: &mut Console, language: &str, timeout: Duration) -> bool {
        if !self.detect(console) {
            return false;
        }

        debug!("resolving dialog {:?}", self.kind);

        match &self.resolution {
            Resolution::ClickFirst(chain) => console.click_first(chain, timeout).is_some(),
            Resolution::ToggleOffThenSubmit { toggle, submit } => {
                if console.is_selected(toggle, timeout).unwrap_or(false)
                    && !console.click(toggle, timeout, 1)
                {
                    return false;
                }
                console.click(submit, timeout, 1)
            }
            Resolution::SelectLanguage { submit } => {
                let option = selectors::language_option(language);
                if !console.click(&option, timeout, 1) {
                    debug!("language {language} not offered, using english");
                    if !console.click(&selectors::language_option("en"), timeout, 1) {
                        return false;
                    }
                }
                console.click(submit, timeout, 2)
            }
            Resolution::SkipOrSelect {
                skip,
                select,
                value,
                advance,
            } => {
                if let Some(selector) = console.first_existing(skip) {
                    return console.click(selector, timeout, 1);
                }
                if let Err(e) = console.select(select, value, timeout) {
                    debug!("{e:#}");
                }
                console.click(advance, timeout, 1)
            }
        }
    }
}

pub struct DialogRegistry {
    handlers: Vec<DialogHandler>,
    timeout: Duration,
}

impl DialogRegistry {
    /// Registry with the given handlers, ordered by rank; equal ranks keep
    /// their given order.
    pub fn new(mut handlers: Vec<DialogHandler>, timeout: Duration) -> Self {
        handlers.sort_by_key(|handler| handler.rank);
        Self { handlers, timeout }
    }

    /// All dialogs known from the supported console generations.
    pub fn standard(timeout: Duration) -> Self {
        Self::new(
            vec![
                DialogHandler {
                    kind: DialogKind::LanguageSelection,
                    rank: 10,
                    marker: Marker::Present(selectors::LANGUAGE_SCREEN),
                    resolution: Resolution::SelectLanguage {
                        submit: selectors::LANGUAGE_SUBMIT,
                    },
                },
                DialogHandler {
                    kind: DialogKind::ContinueSetup,
                    rank: 20,
                    marker: Marker::Present(selectors::CONTINUE_SETUP_HEADING),
                    resolution: Resolution::ClickFirst(selectors::CONTINUE_SETUP_DECLINE),
                },
                DialogHandler {
                    kind: DialogKind::ProviderWizard,
                    rank: 30,
                    marker: Marker::AllOf(&[selectors::PROVIDER_SELECT, selectors::WIZARD_FORWARD]),
                    resolution: Resolution::SkipOrSelect {
                        skip: selectors::WIZARD_SKIP,
                        select: selectors::PROVIDER_SELECT,
                        value: selectors::PROVIDER_OTHER,
                        advance: selectors::WIZARD_FORWARD,
                    },
                },
                DialogHandler {
                    kind: DialogKind::FirmwareNotice,
                    rank: 40,
                    marker: Marker::Present(selectors::FIRMWARE_NOTICE_HEADING),
                    resolution: Resolution::ClickFirst(selectors::FIRMWARE_NOTICE_DISMISS),
                },
                DialogHandler {
                    kind: DialogKind::StayInformed,
                    rank: 50,
                    marker: Marker::Present(selectors::STAY_INFORMED_HEADING),
                    resolution: Resolution::ClickFirst(selectors::STAY_INFORMED_DISMISS),
                },
                DialogHandler {
                    kind: DialogKind::DiagnosticsOptOut,
                    rank: 60,
                    marker: Marker::Present(selectors::DIAGNOSTICS_TOGGLE),
                    resolution: Resolution::ToggleOffThenSubmit {
                        toggle: selectors::DIAGNOSTICS_TOGGLE,
                        submit: selectors::APPLY,
                    },
                },
                DialogHandler {
                    kind: DialogKind::NumberedConfirmation,
                    rank: 70,
                    marker: Marker::Present(selectors::NUMBERED_CONFIRMATION),
                    resolution: Resolution::ClickFirst(&[selectors::NUMBERED_CONFIRMATION]),
                },
            ],
            timeout,
        )
    }

    pub fn handlers(&self) -> &[DialogHandler] {
        &self.handlers
    }

    /// Resolve the first dialog, in rank order, that is currently shown.
    pub fn resolve_one(&self, console: &mut Console, language: &str) -> Option<DialogKind> {
        let handler = self
            .handlers
            .iter()
            .find(|handler| handler.handle(console, language, self.timeout))?;

        info!("dismissed dialog: {:?}", handler.kind);
        Some(handler.kind)
    }

    /// Click the first affirmative control on screen.
    pub fn positive_fallback(&self, console: &mut Console) -> Option<&'static str> {
        let clicked = selectors::POSITIVE_BUTTONS
            .iter()
            .copied()
            .find(|selector| {
                console.exists(selector) && console.click(selector, FALLBACK_CLICK_TIMEOUT, 1)
            })?;

        debug!("positive-button fallback clicked {clicked}");
        Some(clicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        browser::{Element, MockBrowser},
        clock::VirtualClock,
    };
    use std::{collections::HashSet, rc::Rc};

    fn console_showing(shown: &[&'static str]) -> Console {
        let shown: HashSet<String> = shown.iter().map(|s| s.to_string()).collect();
        let mut browser = MockBrowser::new();
        browser.expect_find_all().returning(move |s| {
            Ok(if shown.contains(s) {
                vec![Element::new(s, 0)]
            } else {
                vec![]
            })
        });
        browser.expect_is_displayed().returning(|_| Ok(true));
        browser.expect_is_enabled().returning(|_| Ok(true));
        browser.expect_is_selected().returning(|_| Ok(true));
        browser.expect_native_click().returning(|_| Ok(()));

        Console::new(Box::new(browser), Rc::new(VirtualClock::new()))
    }

    mod ordering {
        use super::*;

        #[test]
        fn standard_registry_is_specific_before_generic() {
            let registry = DialogRegistry::standard(Duration::from_secs(1));
            let kinds: Vec<_> = registry.handlers().iter().map(|h| h.kind).collect();

            assert_eq!(
                kinds,
                vec![
                    DialogKind::LanguageSelection,
                    DialogKind::ContinueSetup,
                    DialogKind::ProviderWizard,
                    DialogKind::FirmwareNotice,
                    DialogKind::StayInformed,
                    DialogKind::DiagnosticsOptOut,
                    DialogKind::NumberedConfirmation,
                ]
            );
        }

        #[test]
        fn equal_ranks_keep_registration_order() {
            let handler = |kind| DialogHandler {
                kind,
                rank: 1,
                marker: Marker::Present(selectors::APPLY),
                resolution: Resolution::ClickFirst(&[selectors::APPLY]),
            };
            let mut late = handler(DialogKind::StayInformed);
            late.rank = 0;

            let registry = DialogRegistry::new(
                vec![
                    handler(DialogKind::FirmwareNotice),
                    handler(DialogKind::DiagnosticsOptOut),
                    late,
                ],
                Duration::ZERO,
            );
            let kinds: Vec<_> = registry.handlers().iter().map(|h| h.kind).collect();

            assert_eq!(
                kinds,
                vec![
                    DialogKind::StayInformed,
                    DialogKind::FirmwareNotice,
                    DialogKind::DiagnosticsOptOut
                ]
            );
        }

        #[test]
        fn first_matching_handler_wins() {
            let registry = DialogRegistry::standard(Duration::ZERO);
            let mut console = console_showing(&[
                selectors::NUMBERED_CONFIRMATION,
                selectors::FIRMWARE_NOTICE_HEADING,
                selectors::FIRMWARE_NOTICE_DISMISS[0],
            ]);

            assert_eq!(
                registry.resolve_one(&mut console, "en"),
                Some(DialogKind::FirmwareNotice)
            );
        }
    }

    mod handlers {
        use super::*;

        #[test]
        fn absent_dialog_is_not_handled() {
            let registry = DialogRegistry::standard(Duration::ZERO);
            let mut console = console_showing(&[]);

            assert_eq!(registry.resolve_one(&mut console, "en"), None);
            assert_eq!(registry.positive_fallback(&mut console), None);
        }

        #[test]
        fn wizard_needs_its_full_marker() {
            let registry = DialogRegistry::standard(Duration::ZERO);
            // a lone forward button belongs to the fallback, not to the wizard
            let mut console = console_showing(&[selectors::WIZARD_FORWARD]);

            assert_eq!(registry.resolve_one(&mut console, "en"), None);
            assert_eq!(
                registry.positive_fallback(&mut console),
                Some(selectors::WIZARD_FORWARD)
            );
        }

        #[test]
        fn diagnostics_toggle_is_cleared_then_applied() {
            let registry = DialogRegistry::standard(Duration::ZERO);
            let mut console =
                console_showing(&[selectors::DIAGNOSTICS_TOGGLE, selectors::APPLY]);

            assert_eq!(
                registry.resolve_one(&mut console, "en"),
                Some(DialogKind::DiagnosticsOptOut)
            );
        }
    }
}
