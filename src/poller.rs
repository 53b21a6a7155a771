//! Order item polling.
//!
//! Every item of an order moves `Submitted -> Pending -> Complete -> Downloaded`.
//! Each poll cycle fetches the order's item status list once; complete items
//! are downloaded and leave the working set, everything else still awaited is
//! checked again after `PollSchedule::interval`. An awaited item missing from
//! a cycle's response is `Resolved` and not queried again. Items still pending
//! when the poll budget runs out end as `Abandoned`.
use crate::error::ApiError;
use crate::espa::{EspaOps, OrderItem};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemState {
    Submitted,
    Pending,
    Complete,
    Downloaded,
    /// Dropped out of the status response while still awaited.
    Resolved,
    Abandoned,
}

impl ItemState {
    pub fn after_status(item: &OrderItem) -> Self {
        if item.is_complete() {
            Self::Complete
        } else {
            Self::Pending
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_polls: 288,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Abandoned,
}

#[derive(Debug, Default)]
pub struct PollReport {
    pub order_id: String,
    pub polls: u32,
    pub states: BTreeMap<String, ItemState>,
    pub downloaded: Vec<PathBuf>,
}

impl PollReport {
    pub fn abandoned(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, state)| **state == ItemState::Abandoned)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn outcome(&self) -> PollOutcome {
        if self.abandoned().is_empty() {
            PollOutcome::Completed
        } else {
            PollOutcome::Abandoned
        }
    }

    fn awaiting(&self) -> usize {
        self.states
            .values()
            .filter(|state| matches!(state, ItemState::Submitted | ItemState::Pending))
            .count()
    }
}

/// Poll `order_id` until every item has been downloaded into `target_dir` or
/// the schedule's poll budget is spent.
pub async fn poll_order(
    api: &impl EspaOps,
    order_id: &str,
    target_dir: &Path,
    schedule: &PollSchedule,
) -> Result<PollReport> {
    info!("Processing order: {order_id}");
    let mut report = PollReport {
        order_id: order_id.to_string(),
        ..Default::default()
    };

    while report.polls < schedule.max_polls.max(1) {
        if report.polls > 0 {
            info!("Check status again in {}s", schedule.interval.as_secs());
            tokio::time::sleep(schedule.interval).await;
        }

        let items = api
            .item_status(order_id)
            .await
            .with_context(|| format!("Status query for order {order_id} failed"))?;

        // The first response defines the items this run waits for
        if report.polls == 0 {
            info!("Initial size of order: {}", items.len());
            for item in &items {
                report.states.insert(item.name.clone(), ItemState::Submitted);
            }
        }
        report.polls += 1;
        info!("Items to check: {}", report.awaiting());

        for item in &items {
            let Some(state) = report.states.get_mut(&item.name) else {
                continue;
            };
            if !matches!(state, ItemState::Submitted | ItemState::Pending) {
                continue;
            }
            *state = ItemState::after_status(item);
            if *state != ItemState::Complete {
                continue;
            }

            let url = item
                .product_dload_url
                .as_deref()
                .ok_or_else(|| ApiError::MissingDownloadUrl(item.name.clone()))?;
            let path = api
                .download(url, target_dir)
                .await
                .with_context(|| format!("Download of {} failed", item.name))?;
            report.downloaded.push(path);
            report.states.insert(item.name.clone(), ItemState::Downloaded);
        }

        let reported: BTreeSet<&str> = items.iter().map(|item| item.name.as_str()).collect();
        for (name, state) in report.states.iter_mut() {
            if matches!(state, ItemState::Submitted | ItemState::Pending)
                && !reported.contains(name.as_str())
            {
                info!("{name} no longer reported for order {order_id}, not checking it again");
                *state = ItemState::Resolved;
            }
        }

        let pending = report.awaiting();
        info!("Items still pending: {pending}");
        if pending == 0 {
            return Ok(report);
        }
    }

    for state in report.states.values_mut() {
        if matches!(state, ItemState::Submitted | ItemState::Pending) {
            *state = ItemState::Abandoned;
        }
    }
    warn!(
        "Giving up on order {order_id} after {} polls, {} item(s) abandoned",
        report.polls,
        report.abandoned().len()
    );
    Ok(report)
}
