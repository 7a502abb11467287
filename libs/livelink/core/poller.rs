//! Fallback polling
//!
//! While push delivery is unavailable the manager keeps data fresh by
//! invoking a caller-supplied refresh on a fixed cadence. Polling is
//! best-effort: a failing or panicking refresh is logged and the loop keeps
//! its schedule.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;

/// One scheduled poll: a refresh future to run, or `None` to stop the loop
pub type PollTicket = Option<BoxFuture<'static, Result<()>>>;

/// Poll immediately, then on every `interval`, until `next_poll` returns None
pub async fn run_poll_loop<F>(interval: Duration, mut next_poll: F)
where
    F: FnMut() -> PollTicket,
{
    debug!("fallback polling started with interval {:?}", interval);
    loop {
        match next_poll() {
            None => {
                debug!("fallback polling stopped");
                return;
            }
            Some(poll) => match AssertUnwindSafe(poll).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("fallback poll failed: {}", e),
                Err(_) => warn!("fallback poll panicked; keeping schedule"),
            },
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_ticket(polls: &Arc<AtomicU32>) -> PollTicket {
        let polls = Arc::clone(polls);
        Some(
            async move {
                polls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn polls_immediately_then_on_interval() {
        let polls = Arc::new(AtomicU32::new(0));
        let tickets = Arc::new(AtomicU32::new(0));

        let poll_counter = Arc::clone(&polls);
        let ticket_counter = Arc::clone(&tickets);
        let task = tokio::spawn(run_poll_loop(Duration::from_millis(50), move || {
            if ticket_counter.fetch_add(1, Ordering::SeqCst) >= 3 {
                None
            } else {
                counting_ticket(&poll_counter)
            }
        }));

        // The first poll happens before any interval elapses
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        task.await.unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_polls_keep_the_schedule() {
        let tickets = Arc::new(AtomicU32::new(0));
        let ticket_counter = Arc::clone(&tickets);

        run_poll_loop(Duration::from_millis(20), move || {
            if ticket_counter.fetch_add(1, Ordering::SeqCst) >= 4 {
                None
            } else {
                Some(
                    async { Err(crate::LinkError::Refresh("api unreachable".to_string())) }
                        .boxed(),
                )
            }
        })
        .await;

        // Four failed polls ran before the loop was asked to stop
        assert_eq!(tickets.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_polls_are_contained() {
        let tickets = Arc::new(AtomicU32::new(0));
        let ticket_counter = Arc::clone(&tickets);

        run_poll_loop(Duration::from_millis(20), move || {
            if ticket_counter.fetch_add(1, Ordering::SeqCst) >= 2 {
                None
            } else {
                Some(async { panic!("refresh blew up") }.boxed())
            }
        })
        .await;

        assert_eq!(tickets.load(Ordering::SeqCst), 3);
    }
}
