//! Resilient element resolution.
//!
//! Every UI interaction in the flows is expressed as an ordered list of
//! locator candidates for one logical target, tried strictly in order. This
//! is the single mechanism by which the system tolerates the portal varying
//! its markup between sessions.

use std::time::Duration;

use crate::error::ExtractError;
use crate::portal::{ElementHandle, Locator, Portal, Wait};

const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Try each candidate in order, polling up to `timeout` per candidate for
/// the readiness condition. The first hit wins and no further candidates
/// are probed; exhausting the list fails with [`ExtractError::ElementNotFound`]
/// carrying every candidate for diagnostics.
pub async fn resolve<P: Portal + ?Sized>(
    portal: &P,
    target: &str,
    candidates: &[Locator],
    wait: Wait,
    timeout: Duration,
) -> Result<ElementHandle, ExtractError> {
    debug_assert!(!candidates.is_empty(), "locator candidate list must be non-empty");

    for locator in candidates {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match portal.try_find(locator, wait).await {
                Ok(Some(element)) => {
                    tracing::debug!(target_element = target, %locator, "Located element");
                    return Ok(element);
                }
                Ok(None) => {}
                // Probe failures (mid-navigation, torn frame) count the same
                // as "not there yet".
                Err(err) => {
                    tracing::debug!(target_element = target, %locator, error = %err, "Probe failed");
                }
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
        tracing::warn!(target_element = target, %locator, "Locator candidate timed out, trying next");
    }

    Err(ExtractError::ElementNotFound {
        target: target.to_string(),
        candidates: candidates.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    /// Fake portal that answers `try_find` from a script of candidate
    /// locators that exist, recording every probe it serves.
    struct ProbePortal {
        present: Vec<Locator>,
        probes: Mutex<Vec<Locator>>,
    }

    impl ProbePortal {
        fn new(present: Vec<Locator>) -> Self {
            Self {
                present,
                probes: Mutex::new(Vec::new()),
            }
        }

        fn probes(&self) -> Vec<Locator> {
            self.probes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Portal for ProbePortal {
        async fn goto(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn try_find(&self, locator: &Locator, _wait: Wait) -> Result<Option<ElementHandle>> {
            self.probes.lock().unwrap().push(locator.clone());
            if self.present.contains(locator) {
                Ok(Some(ElementHandle::new(1)))
            } else {
                Ok(None)
            }
        }

        async fn click(&self, _element: &ElementHandle) -> Result<()> {
            Ok(())
        }

        async fn click_unchecked(&self, _element: &ElementHandle) -> Result<()> {
            Ok(())
        }

        async fn type_text(&self, _element: &ElementHandle, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn text(&self, _element: &ElementHandle) -> Result<String> {
            Ok(String::new())
        }

        async fn attribute(
            &self,
            _element: &ElementHandle,
            _name: &str,
        ) -> Result<Option<String>> {
            Ok(None)
        }

        async fn find_all(
            &self,
            _scope: Option<&ElementHandle>,
            _locator: &Locator,
        ) -> Result<Vec<ElementHandle>> {
            Ok(Vec::new())
        }

        async fn select_options(&self, _element: &ElementHandle) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn select_value(&self, _element: &ElementHandle, _value: &str) -> Result<()> {
            Ok(())
        }

        async fn eval_bool(&self, _expression: &str) -> Result<bool> {
            Ok(true)
        }

        async fn enter_frame(&self, _locator: &Locator) -> Result<()> {
            Ok(())
        }

        async fn exit_frame(&self) -> Result<()> {
            Ok(())
        }

        async fn set_download_dir(&self, _dir: &Path) -> Result<()> {
            Ok(())
        }

        async fn page_title(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn current_url(&self) -> Result<String> {
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_matching_candidate_wins_without_further_probes() {
        let portal = ProbePortal::new(vec![Locator::id("second")]);
        let candidates = vec![
            Locator::id("second"),
            Locator::css(".never-probed"),
            Locator::xpath("//div"),
        ];

        let found = resolve(
            &portal,
            "target",
            &candidates,
            Wait::Present,
            Duration::from_secs(1),
        )
        .await;

        assert!(found.is_ok());
        assert_eq!(portal.probes(), vec![Locator::id("second")]);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_through_to_later_candidate() {
        let portal = ProbePortal::new(vec![Locator::xpath("//div")]);
        let candidates = vec![Locator::id("missing"), Locator::xpath("//div")];

        let found = resolve(
            &portal,
            "target",
            &candidates,
            Wait::Present,
            Duration::from_millis(300),
        )
        .await;

        assert!(found.is_ok());
        // The first candidate was retried until its timeout before the
        // second was tried at all.
        let probes = portal.probes();
        assert!(probes.iter().any(|l| *l == Locator::id("missing")));
        assert_eq!(probes.last(), Some(&Locator::xpath("//div")));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_every_candidate() {
        let portal = ProbePortal::new(Vec::new());
        let candidates = vec![Locator::id("a"), Locator::css(".b")];

        let err = resolve(
            &portal,
            "confirm button",
            &candidates,
            Wait::Clickable,
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();

        match err {
            ExtractError::ElementNotFound { target, candidates: tried } => {
                assert_eq!(target, "confirm button");
                assert_eq!(tried, candidates);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
