use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{watch, Mutex},
    time,
};
use tokio_util::sync::CancellationToken;

use crate::{
    api::SessionClient,
    events::{DashboardEvent, EventBus, NotificationLevel},
};

use super::{report_route, PollState, PollTransition, Visibility};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Sequential status polling for one stopped session.
///
/// The next check is only scheduled after the previous response has been
/// handled, so at most one `/status` request is in flight. A hidden page
/// cancels the pending check but not a request already sent; the state still
/// turns Suspended at once and the late answer is recorded when it lands.
/// Cancellation of `cancel_token` abandons everything and leaves `state`
/// untouched.
pub(super) async fn poll_loop<C: SessionClient>(
    child_id: String,
    client: Arc<C>,
    state: Arc<Mutex<PollState>>,
    events: EventBus,
    poll_interval: Duration,
    mut visibility: watch::Receiver<Visibility>,
    cancel_token: CancellationToken,
) {
    log_info!("result polling started for child {child_id}");

    loop {
        if *visibility.borrow_and_update() == Visibility::Hidden {
            if !mark_suspended(&state, &events, &cancel_token, true).await {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                changed = visibility.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }

        if !mark_suspended(&state, &events, &cancel_token, false).await {
            break;
        }

        // A visibility change restarts the cadence from the top.
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            changed = visibility.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = time::sleep(poll_interval) => {}
        }

        log_debug!("checking processing status for child {child_id}");
        let request = client.get_status();
        tokio::pin!(request);
        let mut watching = true;
        let response = loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break None,
                response = &mut request => break Some(response),
                changed = visibility.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    let hidden = *visibility.borrow() == Visibility::Hidden;
                    if !mark_suspended(&state, &events, &cancel_token, hidden).await {
                        break None;
                    }
                }
            }
        };
        let Some(response) = response else {
            break;
        };

        let mut guard = state.lock().await;
        if cancel_token.is_cancelled() {
            break;
        }

        match response {
            Ok(status) => match guard.record_status(status) {
                PollTransition::Continue => {
                    log_debug!(
                        "child {child_id} still processing after {} checks",
                        guard.attempts_made
                    );
                }
                PollTransition::Completed { navigate } => {
                    log_info!(
                        "processing finished for child {child_id} after {} checks",
                        guard.attempts_made
                    );
                    events.emit(DashboardEvent::PollStateChanged {
                        status: guard.status,
                        attempts: guard.attempts_made,
                    });
                    if navigate {
                        events.emit(DashboardEvent::Navigate {
                            route: report_route(&child_id),
                        });
                    }
                    break;
                }
            },
            Err(err) => {
                guard.record_failure();
                log_warn!("status check failed for child {child_id}: {err}");
                events.notify(
                    NotificationLevel::Error,
                    format!("Could not check processing status: {err}"),
                );
            }
        }
    }

    log_debug!("result polling loop for child {child_id} exited");
}

/// Returns `false` once the loop has been cancelled.
async fn mark_suspended(
    state: &Mutex<PollState>,
    events: &EventBus,
    cancel_token: &CancellationToken,
    suspended: bool,
) -> bool {
    let mut guard = state.lock().await;
    if cancel_token.is_cancelled() {
        return false;
    }
    if guard.set_suspended(suspended) {
        events.emit(DashboardEvent::PollStateChanged {
            status: guard.status,
            attempts: guard.attempts_made,
        });
    }
    true
}
