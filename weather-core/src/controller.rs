//! Search screen state and the fetch-attempt workflow around it.

use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error};

use crate::{
    ConnectivityProvider, DisplayState, FetchError, Outcome, Phase, SearchState, WeatherProvider,
};

/// Owns the search state and runs fetch attempts against a [`WeatherProvider`].
///
/// Every `submit` starts a new attempt. If a newer attempt starts while an older
/// one is still fetching, the older outcome is discarded.
#[derive(Debug, Clone)]
pub struct SearchController {
    provider: Arc<dyn WeatherProvider>,
    connectivity: Arc<dyn ConnectivityProvider>,
    state: Arc<watch::Sender<SearchState>>,
}

impl SearchController {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        connectivity: Arc<dyn ConnectivityProvider>,
    ) -> Self {
        let (state, _rx) = watch::channel(SearchState::default());
        Self {
            provider,
            connectivity,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    /// Record an edit of the query text without searching.
    pub fn set_query(&self, text: &str) {
        self.state.send_if_modified(|state| {
            if state.query == text {
                return false;
            }
            state.query = text.to_string();
            true
        });
    }

    /// Check connectivity now, then submit.
    pub async fn search(&self, city: &str) -> Outcome {
        let connected = self.connectivity.is_connected().await;
        self.submit(city, connected).await
    }

    pub async fn submit(&self, city: &str, connected: bool) -> Outcome {
        let rejection = if !connected {
            Some(FetchError::NoConnection)
        } else if city.is_empty() {
            Some(FetchError::Empty)
        } else {
            None
        };

        let mut attempt = 0;
        self.state.send_modify(|state| {
            state.attempt += 1;
            attempt = state.attempt;
            state.query = city.to_string();
            match &rejection {
                Some(err) => {
                    state.display = DisplayState::Error(err.clone());
                    state.phase = Phase::Idle;
                }
                None => state.phase = Phase::Fetching,
            }
        });

        if let Some(err) = rejection {
            debug!(attempt, city, %err, "search rejected");
            return Outcome::Rejected(err);
        }

        debug!(attempt, city, "fetching weather");
        let fetched = self.provider.fetch(city).await;

        if let Err(FetchError::Unknown(detail)) = &fetched {
            error!(attempt, city, detail = %detail, "weather fetch failed");
        }

        let applied = self.state.send_if_modified(|state| {
            if state.attempt != attempt {
                return false;
            }
            state.display = match &fetched {
                Ok(result) => DisplayState::Showing(result.clone()),
                Err(err) => DisplayState::Error(err.clone()),
            };
            state.phase = Phase::Idle;
            true
        });

        if !applied {
            debug!(attempt, city, "discarding outcome of superseded search");
            return Outcome::Superseded;
        }

        match fetched {
            Ok(result) => Outcome::Succeeded(result),
            Err(err) => Outcome::Failed(err),
        }
    }

    /// Mirror connectivity changes into the state until the guard is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(&self) -> ConnectivityGuard {
        let mut rx = self.connectivity.subscribe();
        let state = Arc::clone(&self.state);

        apply_connectivity(&state, *rx.borrow_and_update());

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let connected = *rx.borrow_and_update();
                apply_connectivity(&state, connected);
            }
            debug!("connectivity source closed");
        });

        ConnectivityGuard { task: Some(task) }
    }
}

/// Going offline shows the no-connection error; coming back clears only that error.
fn apply_connectivity(state: &watch::Sender<SearchState>, connected: bool) {
    state.send_if_modified(|state| {
        let before = (state.connected, state.display.clone());

        state.connected = connected;
        if !connected {
            state.display = DisplayState::Error(FetchError::NoConnection);
        } else if state.display.error() == Some(&FetchError::NoConnection) {
            state.display = DisplayState::Idle;
        }

        let changed = before != (state.connected, state.display.clone());
        if changed {
            debug!(connected, "connectivity changed");
        }
        changed
    });
}

/// Live connectivity subscription of a [`SearchController`].
///
/// Released exactly once, by [`ConnectivityGuard::detach`] or on drop.
#[derive(Debug)]
pub struct ConnectivityGuard {
    task: Option<JoinHandle<()>>,
}

impl ConnectivityGuard {
    pub fn is_attached(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Unsubscribe and wait until the listener has stopped.
    pub async fn detach(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for ConnectivityGuard {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManualConnectivity, WeatherResult};
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::sync::Notify;

    fn sample(location: &str) -> WeatherResult {
        WeatherResult {
            location: location.to_string(),
            temperature: 284.2,
            temp_min: 283.1,
            temp_max: 285.9,
            description: "light rain".to_string(),
            icon_code: "10n".to_string(),
            observed_at: None,
        }
    }

    /// Answers from a fixed table; unknown cities are not found.
    #[derive(Debug, Default)]
    struct StubProvider {
        answers: HashMap<String, Result<WeatherResult, FetchError>>,
        calls: AtomicUsize,
        gate: Option<(String, Arc<Notify>)>,
    }

    impl StubProvider {
        fn with(mut self, city: &str, answer: Result<WeatherResult, FetchError>) -> Self {
            self.answers.insert(city.to_string(), answer);
            self
        }

        /// Hold fetches for `city` until `gate` is notified.
        fn gated(mut self, city: &str, gate: Arc<Notify>) -> Self {
            self.gate = Some((city.to_string(), gate));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherProvider for StubProvider {
        async fn fetch(&self, city: &str) -> Result<WeatherResult, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((gated_city, gate)) = &self.gate {
                if gated_city == city {
                    gate.notified().await;
                }
            }
            self.answers.get(city).cloned().unwrap_or(Err(FetchError::NotFound))
        }
    }

    fn controller(provider: Arc<StubProvider>) -> (SearchController, ManualConnectivity) {
        let connectivity = ManualConnectivity::new(true);
        let controller = SearchController::new(provider, Arc::new(connectivity.clone()));
        (controller, connectivity)
    }

    fn assert_exclusive(state: &SearchState) {
        assert!(!(state.display.result().is_some() && state.display.error().is_some()));
    }

    #[tokio::test]
    async fn empty_city_is_rejected_without_fetching() {
        let provider = Arc::new(StubProvider::default());
        let (controller, _) = controller(Arc::clone(&provider));

        let outcome = controller.submit("", true).await;

        assert_eq!(outcome, Outcome::Rejected(FetchError::Empty));
        assert_eq!(controller.state().display, DisplayState::Error(FetchError::Empty));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn whitespace_city_is_not_trimmed() {
        let provider = Arc::new(StubProvider::default());
        let (controller, _) = controller(Arc::clone(&provider));

        let outcome = controller.submit("   ", true).await;

        assert_eq!(outcome, Outcome::Failed(FetchError::NotFound));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn offline_is_rejected_for_any_input() {
        let provider = Arc::new(StubProvider::default().with("Paris", Ok(sample("Paris"))));
        let (controller, _) = controller(Arc::clone(&provider));

        for city in ["", "Paris", "New York", "Nowhereville"] {
            let outcome = controller.submit(city, false).await;
            assert_eq!(outcome, Outcome::Rejected(FetchError::NoConnection));

            assert_eq!(
                controller.state().display,
                DisplayState::Error(FetchError::NoConnection)
            );
        }
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn success_clears_previous_error() {
        let provider = Arc::new(StubProvider::default().with("Paris", Ok(sample("Paris"))));
        let (controller, _) = controller(provider);

        controller.submit("", true).await;
        let outcome = controller.submit("Paris", true).await;

        assert_eq!(outcome, Outcome::Succeeded(sample("Paris")));
        let state = controller.state();
        assert_eq!(state.display.result().map(|r| r.location.as_str()), Some("Paris"));
        assert!(state.display.error().is_none());
        assert_eq!(state.query, "Paris");
        assert_eq!(state.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn not_found_clears_previous_result() {
        let provider = Arc::new(
            StubProvider::default()
                .with("Paris", Ok(sample("Paris")))
                .with("Nowhereville", Err(FetchError::NotFound)),
        );
        let (controller, _) = controller(provider);

        controller.submit("Paris", true).await;
        let outcome = controller.submit("Nowhereville", true).await;

        assert_eq!(outcome, Outcome::Failed(FetchError::NotFound));
        let state = controller.state();
        assert!(state.display.result().is_none());
        assert_eq!(state.display.error(), Some(&FetchError::NotFound));
    }

    #[tokio::test]
    async fn unknown_failure_is_mapped_through() {
        let provider = Arc::new(
            StubProvider::default().with("Lima", Err(FetchError::unknown("status 500"))),
        );
        let (controller, _) = controller(provider);

        let outcome = controller.submit("Lima", true).await;

        assert_eq!(outcome, Outcome::Failed(FetchError::unknown("status 500")));
        assert_eq!(
            controller.state().display.error().map(ToString::to_string),
            Some("An error occurred while fetching data".to_string())
        );
    }

    #[tokio::test]
    async fn states_stay_exclusive_across_submits() {
        let provider = Arc::new(
            StubProvider::default()
                .with("Paris", Ok(sample("Paris")))
                .with("Oslo", Ok(sample("Oslo"))),
        );
        let (controller, _) = controller(provider);

        for (city, connected) in [
            ("Paris", true),
            ("", true),
            ("Oslo", true),
            ("Oslo", false),
            ("Atlantis", true),
            ("Paris", true),
        ] {
            controller.submit(city, connected).await;
            assert_exclusive(&controller.state());
        }
    }

    #[tokio::test]
    async fn search_uses_point_in_time_connectivity() {
        let provider = Arc::new(StubProvider::default().with("Paris", Ok(sample("Paris"))));
        let (controller, connectivity) = controller(Arc::clone(&provider));

        connectivity.set(false);
        assert_eq!(controller.search("Paris").await, Outcome::Rejected(FetchError::NoConnection));

        connectivity.set(true);
        assert_eq!(controller.search("Paris").await, Outcome::Succeeded(sample("Paris")));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn newer_submit_wins_over_slow_one() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(
            StubProvider::default()
                .with("Slowtown", Ok(sample("Slowtown")))
                .with("Paris", Ok(sample("Paris")))
                .gated("Slowtown", Arc::clone(&gate)),
        );
        let (controller, _) = controller(Arc::clone(&provider));

        let slow = tokio::spawn({
            let controller = controller.clone();
            async move { controller.submit("Slowtown", true).await }
        });

        let mut rx = controller.subscribe();
        rx.wait_for(|state| state.phase == Phase::Fetching).await.expect("controller alive");

        let fast = controller.submit("Paris", true).await;
        gate.notify_one();
        let slow = slow.await.expect("task completes");

        assert_eq!(fast, Outcome::Succeeded(sample("Paris")));
        assert_eq!(slow, Outcome::Superseded);
        assert_eq!(
            controller.state().display.result().map(|r| r.location.clone()),
            Some("Paris".to_string())
        );
    }

    #[tokio::test]
    async fn set_query_records_edits() {
        let (controller, _) = controller(Arc::new(StubProvider::default()));
        let mut rx = controller.subscribe();

        controller.set_query("Par");
        assert!(rx.has_changed().expect("controller alive"));
        assert_eq!(rx.borrow_and_update().query, "Par");

        controller.set_query("Par");
        assert!(!rx.has_changed().expect("controller alive"));
    }

    #[tokio::test]
    async fn attached_listener_tracks_connectivity() {
        let provider = Arc::new(StubProvider::default().with("Paris", Ok(sample("Paris"))));
        let (controller, connectivity) = controller(provider);
        let _guard = controller.attach();
        let mut rx = controller.subscribe();

        controller.submit("Paris", true).await;

        connectivity.set(false);
        let state = rx.wait_for(|s| !s.connected).await.expect("controller alive").clone();
        assert_eq!(state.display, DisplayState::Error(FetchError::NoConnection));

        connectivity.set(true);
        let state = rx.wait_for(|s| s.connected).await.expect("controller alive").clone();
        assert_eq!(state.display, DisplayState::Idle);
    }

    #[tokio::test]
    async fn submit_leaves_connectivity_flag_to_listener() {
        let provider = Arc::new(StubProvider::default().with("Paris", Ok(sample("Paris"))));
        let (controller, connectivity) = controller(provider);
        let _guard = controller.attach();
        let mut rx = controller.subscribe();

        connectivity.set(false);
        rx.wait_for(|s| !s.connected).await.expect("controller alive");

        let outcome = controller.submit("Paris", true).await;

        assert_eq!(outcome, Outcome::Succeeded(sample("Paris")));
        assert!(!controller.state().connected);
    }

    #[tokio::test]
    async fn reconnect_keeps_other_errors() {
        let (controller, connectivity) = controller(Arc::new(StubProvider::default()));
        let _guard = controller.attach();
        let mut rx = controller.subscribe();

        controller.submit("", true).await;
        connectivity.set(false);
        rx.wait_for(|s| !s.connected).await.expect("controller alive");

        controller.submit("", true).await;
        connectivity.set(true);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(controller.state().display, DisplayState::Error(FetchError::Empty));
    }

    #[tokio::test]
    async fn attach_while_offline_shows_error_immediately() {
        let (controller, connectivity) = controller(Arc::new(StubProvider::default()));
        connectivity.set(false);

        let _guard = controller.attach();

        let state = controller.state();
        assert!(!state.connected);
        assert_eq!(state.display, DisplayState::Error(FetchError::NoConnection));
    }

    #[tokio::test]
    async fn detach_releases_subscription() {
        let (controller, connectivity) = controller(Arc::new(StubProvider::default()));

        let guard = controller.attach();
        assert!(guard.is_attached());
        assert_eq!(connectivity.subscriber_count(), 1);

        guard.detach().await;
        assert_eq!(connectivity.subscriber_count(), 0);

        connectivity.set(false);
        tokio::task::yield_now().await;
        assert!(controller.state().connected);
    }

    #[tokio::test]
    async fn dropping_guard_releases_subscription() {
        let (controller, connectivity) = controller(Arc::new(StubProvider::default()));

        {
            let _guard = controller.attach();
            assert_eq!(connectivity.subscriber_count(), 1);
        }

        for _ in 0..10 {
            if connectivity.subscriber_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(connectivity.subscriber_count(), 0);
    }
}
