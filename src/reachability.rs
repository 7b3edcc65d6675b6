//! Reachability probing of the device console
//!
//! After a reboot the device may first answer on a link-local fallback
//! address before its host name resolves again. The prober walks the
//! candidate list in order every round and adopts the first address that
//! answers.

use crate::{clock::Clock, error::ConsoleError, http_client::probe_client, session::DeviceSession};
use anyhow::{Context, Result};
use log::{debug, info};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use reqwest::blocking::Client;
use std::{rc::Rc, time::Duration};

const STATUS_OK: u16 = 200;

#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait Probe {
    /// HTTP status of a single GET against `url`.
    fn status(&self, url: &str) -> Result<u16>;
}

pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: probe_client(timeout)?,
        })
    }
}

impl Probe for HttpProbe {
    fn status(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("failed to probe {url}"))?;

        Ok(response.status().as_u16())
    }
}

pub struct ReachabilityProber {
    candidates: Vec<String>,
    probe: Box<dyn Probe>,
    clock: Rc<dyn Clock>,
}

impl ReachabilityProber {
    pub fn new(candidates: Vec<String>, probe: Box<dyn Probe>, clock: Rc<dyn Clock>) -> Self {
        Self {
            candidates,
            probe,
            clock,
        }
    }

    /// Probe the candidates until one answers and make it the session's base address
    ///
    /// # Arguments
    /// * `session` - Session whose base address is replaced on success
    /// * `rounds` - Number of passes over the candidate list
    /// * `delay` - Pause between two unsuccessful passes
    ///
    /// # Returns
    /// The adopted address, or [`ConsoleError::DeviceUnreachable`]
    pub fn find_device(
        &self,
        session: &mut DeviceSession,
        rounds: u32,
        delay: Duration,
    ) -> Result<String> {
        debug!("find_device() called");

        for round in 1..=rounds {
            if let Some(url) = self.probe_round() {
                if session.base_url != url {
                    info!("device answers at {url}");
                }
                session.base_url = url.clone();
                return Ok(url);
            }

            debug!("no candidate answered in round {round}/{rounds}");

            if round < rounds {
                self.clock.sleep(delay);
            }
        }

        Err(ConsoleError::DeviceUnreachable { rounds }.into())
    }

    fn probe_round(&self) -> Option<String> {
        self.candidates
            .iter()
            .find(|url| match self.probe.status(url) {
                Ok(status) => status == STATUS_OK,
                Err(e) => {
                    debug!("{e:#}");
                    false
                }
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use mockall::{Sequence, predicate::eq};

    const FIRST: &str = "http://fritz.box";
    const SECOND: &str = "http://192.168.178.1";
    const THIRD: &str = "http://169.254.1.1";

    fn prober(probe: MockProbe) -> (ReachabilityProber, Rc<VirtualClock>) {
        let clock = Rc::new(VirtualClock::new());
        let candidates = [FIRST, SECOND, THIRD].map(String::from).to_vec();
        (
            ReachabilityProber::new(candidates, Box::new(probe), clock.clone()),
            clock,
        )
    }

    #[test]
    fn adopts_first_answering_candidate_without_probing_later_peers() {
        let mut probe = MockProbe::new();
        let mut seq = Sequence::new();
        probe
            .expect_status()
            .with(eq(FIRST))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow::anyhow!("failed to resolve fritz.box")));
        probe
            .expect_status()
            .with(eq(SECOND))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(200));
        probe.expect_status().with(eq(THIRD)).never();

        let (prober, clock) = prober(probe);
        let mut session = DeviceSession::new(FIRST);

        let url = prober
            .find_device(&mut session, 3, Duration::from_secs(5))
            .unwrap();

        assert_eq!(url, SECOND);
        assert_eq!(session.base_url, SECOND);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn redirects_do_not_count_as_reachable() {
        let mut probe = MockProbe::new();
        let mut calls = 0;
        probe.expect_status().returning(move |url| {
            calls += 1;
            match (calls, url) {
                (_, FIRST) => Ok(303),
                (6, THIRD) => Ok(200),
                _ => Ok(404),
            }
        });

        let (prober, clock) = prober(probe);
        let mut session = DeviceSession::new(FIRST);

        let url = prober
            .find_device(&mut session, 4, Duration::from_secs(5))
            .unwrap();

        // round one probes three candidates, round two finds the third one
        assert_eq!(url, THIRD);
        assert_eq!(clock.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn reports_unreachable_after_all_rounds() {
        let mut probe = MockProbe::new();
        probe.expect_status().times(6).returning(|_| Ok(500));

        let (prober, clock) = prober(probe);
        let mut session = DeviceSession::new(FIRST);

        let err = prober
            .find_device(&mut session, 2, Duration::from_secs(10))
            .unwrap_err();

        assert!(matches!(
            crate::error::category(&err),
            Some(ConsoleError::DeviceUnreachable { rounds: 2 })
        ));
        assert_eq!(session.base_url, FIRST);
        assert_eq!(clock.elapsed(), Duration::from_secs(10));
    }
}
