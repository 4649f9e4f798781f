//! Revealing hidden replies by repeatedly triggering "show more" controls.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::HarvestConfig;
use crate::document::{ControlScope, ThreadDocument};
use crate::patterns::PatternSet;

/// Outcome of expanding one sub-page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    /// Controls that were triggered successfully.
    pub triggered: usize,
    /// Rounds started, including the final round that found nothing.
    pub rounds: u32,
}

/// Fixed-point loop over the disclosure controls of a live document.
///
/// Every round scrolls, re-enumerates the controls currently present and
/// triggers the ones whose label reads like "show more replies". Triggering
/// replaces and detaches elements, so nothing is carried from one round to
/// the next.
pub struct ReplyExpander<'a> {
    patterns: &'a PatternSet,
    config: &'a HarvestConfig,
}

impl<'a> ReplyExpander<'a> {
    pub fn new(patterns: &'a PatternSet, config: &'a HarvestConfig) -> Self {
        Self { patterns, config }
    }

    pub async fn expand<D: ThreadDocument>(&self, doc: &mut D) -> ExpansionReport {
        let started = Instant::now();
        let budget = self.config.expansion_budget();
        let scope = if self.config.scope_controls_to_comments {
            ControlScope::CommentContainers
        } else {
            ControlScope::WholePage
        };
        let mut report = ExpansionReport::default();

        while report.rounds < self.config.max_rounds {
            if started.elapsed() >= budget {
                warn!("Expansion budget of {:?} used up after {} rounds", budget, report.rounds);
                break;
            }
            report.rounds += 1;

            self.scroll_through(doc).await;

            let remaining = budget.saturating_sub(started.elapsed());
            let controls = match tokio::time::timeout(remaining, doc.disclosure_controls(scope)).await {
                Ok(Ok(controls)) => controls,
                Ok(Err(e)) => {
                    warn!("Could not enumerate controls: {}", e);
                    break;
                }
                Err(_) => {
                    warn!("Expansion budget of {:?} used up while enumerating controls", budget);
                    break;
                }
            };
            let matching: Vec<_> = controls
                .into_iter()
                .filter(|c| self.patterns.is_expansion_label(&c.label))
                .take(self.config.max_controls_per_round)
                .collect();

            let mut triggered = 0;
            for control in &matching {
                if started.elapsed() >= budget {
                    break;
                }
                match tokio::time::timeout(self.config.control_timeout(), doc.trigger(&control.handle)).await {
                    Ok(Ok(())) => {
                        triggered += 1;
                        pause(self.config.trigger_pause_ms).await;
                    }
                    Ok(Err(e)) => debug!("Control '{}' had no effect: {}", control.label, e),
                    Err(_) => debug!("Control '{}' timed out", control.label),
                }
            }

            debug!(
                "Round {}: {} of {} controls triggered",
                report.rounds,
                triggered,
                matching.len()
            );
            report.triggered += triggered;
            if triggered == 0 {
                break;
            }
            pause(self.config.round_pause_ms).await;
        }

        report
    }

    async fn scroll_through<D: ThreadDocument>(&self, doc: &mut D) {
        for _ in 0..self.config.scroll_steps {
            if let Err(e) = doc.scroll_by(self.config.scroll_delta_px).await {
                debug!("Scroll failed: {}", e);
                return;
            }
            pause(self.config.scroll_pause_ms).await;
        }
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
