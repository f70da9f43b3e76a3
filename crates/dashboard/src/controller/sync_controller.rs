use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::error::SyncError;
use common::models::{BufferPolicy, Market, Query, TradeKind, TradeOrder, TradeParams};
use signal_api::SignalApi;

use super::poller::PollHandle;
use super::state::{SignalState, UiState};

const NO_SYMBOL: &str = "Please enter a symbol";

/// What happened to the response of a fetch that reached the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response belonged to the current query and is now in the state.
    Applied,
    /// The query changed (or the controller was disposed) while in flight.
    Discarded,
}

struct Inner {
    id: Uuid,
    api: Arc<dyn SignalApi>,
    state: watch::Sender<UiState>,
    poller: Mutex<Option<PollHandle>>,
}

/// Owns the request lifecycle for one dashboard: the current query, the
/// chart buffer, the poll timer and the derived loading/error/data state.
///
/// Cloning is cheap and every clone drives the same state. State mutations
/// happen inside `watch` modify closures, so the generation check and the
/// write it guards are one atomic step and nothing is locked across an await.
#[derive(Clone)]
pub struct SignalSyncController {
    inner: Arc<Inner>,
}

impl SignalSyncController {
    pub fn new(api: Arc<dyn SignalApi>, policy: BufferPolicy) -> Self {
        let (state, _) = watch::channel(UiState::new(policy));
        let id = Uuid::new_v4();
        debug!("[{}] Signal controller created ({:?})", id, policy);

        Self {
            inner: Arc::new(Inner {
                id,
                api,
                state,
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> UiState {
        self.inner.state.borrow().clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }

    fn ensure_live(&self) -> Result<(), SyncError> {
        if self.is_disposed() {
            return Err(SyncError::Disposed);
        }
        Ok(())
    }

    /// Makes `query` the authoritative target. A different target starts a new
    /// generation: the chart and the last result are cleared, responses still in
    /// flight for the old target will be discarded, and a running poll timer is
    /// replaced by one for the new target.
    pub fn set_query(&self, query: Query) -> Result<(), SyncError> {
        let mut outcome = Ok(false);

        self.inner.state.send_if_modified(|s| {
            if s.disposed {
                outcome = Err(SyncError::Disposed);
                return false;
            }
            if s.query.as_ref() == Some(&query) {
                return false;
            }
            s.query = Some(query.clone());
            s.generation += 1;
            s.buffer.clear();
            s.latest = SignalState::Empty;
            s.notice = None;
            outcome = Ok(true);
            true
        });

        if !outcome? {
            debug!("[{}] Query {} unchanged", self.inner.id, query);
            return Ok(());
        }

        info!(
            "[{}] Query switched to {} ({})",
            self.inner.id,
            query,
            query.market()
        );

        if let Some(period) = self.stop_polling() {
            self.start_polling(period)?;
        }
        Ok(())
    }

    /// Parses raw user input. Invalid input changes nothing except the notice.
    /// Without a market the input shape decides (`EUR/USD`, `BTCUSDT`, `AAPL`).
    pub fn set_query_input(&self, market: Option<Market>, raw: &str) -> Result<(), SyncError> {
        self.ensure_live()?;

        let parsed = match market {
            Some(market) => Query::single(market, raw),
            None => Query::infer(raw),
        };

        match parsed {
            Ok(query) => self.set_query(query),
            Err(err) => {
                warn!("[{}] Rejected symbol input {:?}: {}", self.inner.id, raw, err);
                self.set_notice(err.to_string());
                Err(err)
            }
        }
    }

    /// Trade inputs used by the next `execute_action`. They are not part of the
    /// query target and never reset the chart.
    pub fn set_trade_params(&self, params: TradeParams) -> Result<(), SyncError> {
        let mut outcome = Ok(());
        self.inner.state.send_if_modified(|s| {
            if s.disposed {
                outcome = Err(SyncError::Disposed);
                return false;
            }
            if s.trade_params == params {
                return false;
            }
            s.trade_params = params;
            true
        });
        outcome
    }

    /// Clears the notice. Returns whether there was one.
    pub fn dismiss_notice(&self) -> bool {
        self.inner.state.send_if_modified(|s| s.notice.take().is_some())
    }

    fn set_notice(&self, notice: String) {
        self.inner.state.send_if_modified(|s| {
            if s.disposed {
                return false;
            }
            s.notice = Some(notice);
            true
        });
    }

    fn begin_fetch(&self) -> Result<(Query, u64, InFlightGuard), SyncError> {
        let mut issued = Err(SyncError::Disposed);

        self.inner.state.send_if_modified(|s| {
            if s.disposed {
                return false;
            }
            match &s.query {
                None => {
                    let err = SyncError::Validation(NO_SYMBOL.to_string());
                    s.notice = Some(err.to_string());
                    issued = Err(err);
                }
                Some(query) => {
                    issued = Ok((query.clone(), s.generation));
                    s.in_flight += 1;
                    if s.latest == SignalState::Empty {
                        s.latest = SignalState::Pending;
                    }
                }
            }
            true
        });

        let (query, generation) = issued?;
        let guard = InFlightGuard {
            inner: self.inner.clone(),
        };
        Ok((query, generation, guard))
    }

    /// Issues one request for the current query.
    ///
    /// `Err` means either nothing was issued (no query, disposed) or the
    /// request failed and the failure is now `latest`. A response for a stale
    /// generation, failed or not, is dropped and reported as `Discarded`.
    pub async fn fetch_once(&self) -> Result<FetchOutcome, SyncError> {
        let (query, generation, _in_flight) = match self.begin_fetch() {
            Ok(issued) => issued,
            Err(err) => {
                debug!("[{}] Fetch not issued: {}", self.inner.id, err);
                return Err(err);
            }
        };

        debug!(
            "[{}] Fetching {} {} (generation {})",
            self.inner.id,
            query.market(),
            query,
            generation
        );

        let result = self.inner.api.market_signal(&query).await;
        let received_at = Utc::now();

        let applied = self.inner.state.send_if_modified(|s| {
            if s.disposed || s.generation != generation {
                return false;
            }
            match &result {
                Ok(report) => {
                    s.buffer.absorb(report, received_at);
                    s.latest = SignalState::Ready(report.clone());
                }
                Err(err) => {
                    s.latest = SignalState::Failed(err.clone());
                }
            }
            true
        });

        match (applied, result) {
            (false, _) => {
                debug!(
                    "[{}] Discarded stale response for {} (generation {})",
                    self.inner.id, query, generation
                );
                Ok(FetchOutcome::Discarded)
            }
            (true, Ok(report)) => {
                info!(
                    "[{}] {} -> {} @ {}",
                    self.inner.id,
                    query,
                    report
                        .action
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "-".to_string()),
                    report
                        .price
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                );
                Ok(FetchOutcome::Applied)
            }
            (true, Err(err)) => {
                warn!(
                    "[{}] {} fetch for {} failed: {}",
                    self.inner.id,
                    err.kind(),
                    query,
                    err
                );
                Err(err)
            }
        }
    }

    /// Fetches now and then every `period` until stopped, replacing any running
    /// timer. Every tick fetches in its own task, so slow responses may overlap;
    /// the generation guard decides which ones land. Each tick also refreshes
    /// the portfolio. Failed ticks never stop the timer.
    pub fn start_polling(&self, period: Duration) -> Result<(), SyncError> {
        self.ensure_live()?;
        if period.is_zero() {
            return Err(SyncError::Validation(
                "Polling interval must be positive".to_string(),
            ));
        }

        let owner = Arc::downgrade(&self.inner);
        let handle = PollHandle::spawn(period, move || Self::poll_tick(&owner));
        let previous = self.lock_poller().replace(handle);
        drop(previous);

        self.inner.state.send_if_modified(|s| !std::mem::replace(&mut s.polling, true));
        info!("[{}] Polling every {:?}", self.inner.id, period);
        Ok(())
    }

    /// Cancels the poll timer and returns its period if one was running.
    /// Requests already in flight are left to settle.
    pub fn stop_polling(&self) -> Option<Duration> {
        let stopped = self.lock_poller().take();
        let period = stopped.as_ref().map(PollHandle::period);
        drop(stopped);

        self.inner.state.send_if_modified(|s| std::mem::replace(&mut s.polling, false));
        if let Some(period) = period {
            info!("[{}] Polling stopped (was every {:?})", self.inner.id, period);
        }
        period
    }

    fn poll_tick(owner: &Weak<Inner>) -> bool {
        let Some(inner) = owner.upgrade() else {
            return false;
        };
        let controller = SignalSyncController { inner };
        if controller.is_disposed() {
            return false;
        }

        let fetcher = controller.clone();
        tokio::spawn(async move {
            // Failures are already in the state; the next tick tries again.
            let _ = fetcher.fetch_once().await;
        });
        tokio::spawn(async move {
            if let Err(err) = controller.refresh_portfolio().await {
                debug!("[{}] Portfolio refresh failed: {}", controller.id(), err);
            }
        });
        true
    }

    fn lock_poller(&self) -> MutexGuard<'_, Option<PollHandle>> {
        self.inner
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire-and-forget trade for the current symbol with the stored trade
    /// params. Whatever the outcome, the acknowledgement or error lands in the
    /// notice and the portfolio is refreshed once afterwards. The returned
    /// handle may be ignored.
    pub fn execute_action(&self, kind: TradeKind) -> Result<JoinHandle<()>, SyncError> {
        self.ensure_live()?;

        let (symbol, params) = {
            let state = self.inner.state.borrow();
            (state.query.as_ref().map(Query::symbol), state.trade_params)
        };
        let Some(symbol) = symbol else {
            let err = SyncError::Validation(NO_SYMBOL.to_string());
            self.set_notice(err.to_string());
            return Err(err);
        };

        let order = TradeOrder::new(symbol, kind, params);
        info!(
            "[{}] Executing {} {} {}",
            self.inner.id, order.action, order.amount, order.symbol
        );

        let controller = self.clone();
        Ok(tokio::spawn(async move {
            let notice = match controller.inner.api.execute_trade(&order).await {
                Ok(ack) => {
                    info!("[{}] Trade acknowledged: {}", controller.id(), ack);
                    format!("{} {} {}: {}", order.action, order.amount, order.symbol, ack)
                }
                Err(err) => {
                    error!(
                        "[{}] Trade {} {} failed: {}",
                        controller.id(),
                        order.action,
                        order.symbol,
                        err
                    );
                    format!("{} {} failed: {}", order.action, order.symbol, err)
                }
            };
            controller.set_notice(notice);

            if let Err(err) = controller.refresh_portfolio().await {
                warn!(
                    "[{}] Portfolio refresh after trade failed: {}",
                    controller.id(),
                    err
                );
            }
        }))
    }

    /// Replaces the portfolio snapshot. On failure the previous one stays.
    pub async fn refresh_portfolio(&self) -> Result<(), SyncError> {
        self.ensure_live()?;
        let snapshot = self.inner.api.portfolio().await?;

        self.inner.state.send_if_modified(move |s| {
            if s.disposed || s.portfolio.as_ref() == Some(&snapshot) {
                return false;
            }
            s.portfolio = Some(snapshot);
            true
        });
        Ok(())
    }

    /// Stops the timer and invalidates everything in flight. Later calls
    /// return `SyncError::Disposed`. Idempotent.
    pub fn dispose(&self) {
        self.stop_polling();
        let first = self.inner.state.send_if_modified(|s| {
            if s.disposed {
                return false;
            }
            s.disposed = true;
            s.generation += 1;
            s.polling = false;
            true
        });
        if first {
            info!("[{}] Controller disposed", self.inner.id);
        }
    }
}

/// Counts a fetch as in flight until dropped: on success, on error, on panic
/// and when the fetching future itself is cancelled.
struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.state.send_modify(|s| {
            s.in_flight = s.in_flight.saturating_sub(1);
            if s.in_flight == 0 && s.latest == SignalState::Pending {
                s.latest = SignalState::Empty;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio::sync::oneshot;

    use common::models::{
        Analysis, Candle, ChatReply, JournalEntry, QuickSignal, SignalAction, SignalReport,
    };
    use signal_api::{AnalysisRequest, ChatRequest, MockSignalApi, SignalRequest};

    type Reply = Result<SignalReport, SyncError>;

    fn report(action: SignalAction, price: f64, rsi: Option<f64>) -> SignalReport {
        SignalReport {
            action: Some(action),
            price: Some(price),
            stop_loss: None,
            take_profit: None,
            risk_percent: None,
            greed_percent: None,
            reason: None,
            rsi: None,
            risk_reward: None,
            chart: vec![Candle {
                close: Some(price),
                rsi,
                ..Default::default()
            }],
        }
    }

    fn btc() -> Query {
        Query::single(Market::Crypto, "BTCUSDT").unwrap()
    }

    fn eth() -> Query {
        Query::single(Market::Crypto, "ETHUSDT").unwrap()
    }

    fn rolling() -> BufferPolicy {
        BufferPolicy::Rolling { capacity: 30 }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn prices(controller: &SignalSyncController) -> Vec<f64> {
        controller.snapshot().buffer.iter().map(|s| s.price).collect()
    }

    /// Answers each market request with whatever the test pushes through the
    /// matching gate, in issue order per symbol.
    #[derive(Default)]
    struct GatedApi {
        gates: std::sync::Mutex<HashMap<String, VecDeque<oneshot::Receiver<Reply>>>>,
        calls: AtomicUsize,
    }

    impl GatedApi {
        fn gate(&self, symbol: &str) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.gates
                .lock()
                .unwrap()
                .entry(symbol.to_string())
                .or_default()
                .push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl SignalApi for GatedApi {
        async fn market_signal(&self, query: &Query) -> Reply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self
                .gates
                .lock()
                .unwrap()
                .get_mut(&query.symbol())
                .and_then(VecDeque::pop_front);
            match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(SyncError::transport("connection reset"))),
                None => Err(SyncError::transport("no gate")),
            }
        }

        async fn portfolio(&self) -> Result<Value, SyncError> {
            Ok(json!({}))
        }

        async fn execute_trade(&self, _order: &TradeOrder) -> Result<Value, SyncError> {
            Ok(json!({}))
        }

        async fn post_signal(&self, _request: &SignalRequest) -> Result<QuickSignal, SyncError> {
            Err(SyncError::transport("not scripted"))
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> Result<Analysis, SyncError> {
            Err(SyncError::transport("not scripted"))
        }

        async fn ask(&self, _request: &ChatRequest) -> Result<ChatReply, SyncError> {
            Err(SyncError::transport("not scripted"))
        }

        async fn journal(&self) -> Result<Vec<JournalEntry>, SyncError> {
            Ok(Vec::new())
        }
    }

    fn gated() -> (Arc<GatedApi>, SignalSyncController) {
        let api = Arc::new(GatedApi::default());
        let controller = SignalSyncController::new(api.clone(), rolling());
        (api, controller)
    }

    fn counting_mock(calls: Arc<AtomicUsize>) -> MockSignalApi {
        let mut api = MockSignalApi::new();
        api.expect_market_signal().returning(move |q| {
            calls.fetch_add(1, Ordering::SeqCst);
            let price = if q.symbol() == "ETHUSDT" { 3000.0 } else { 50000.0 };
            Ok(report(SignalAction::Buy, price, None))
        });
        api.expect_portfolio().returning(|| Ok(json!({"cash": 100})));
        api
    }

    #[tokio::test]
    async fn test_fetch_applies_report_and_sample() {
        let mut api = MockSignalApi::new();
        api.expect_market_signal()
            .withf(|q| q.symbol() == "BTCUSDT" && q.market() == Market::Crypto)
            .times(1)
            .returning(|_| Ok(report(SignalAction::Buy, 50000.0, Some(55.0))));

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        controller.set_query(btc()).unwrap();

        assert_eq!(controller.fetch_once().await, Ok(FetchOutcome::Applied));

        let state = controller.snapshot();
        let latest = state.latest.report().unwrap();
        assert_eq!(latest.action, Some(SignalAction::Buy));
        assert_eq!(latest.price, Some(50000.0));

        let samples = state.buffer.to_vec();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].sequence_index, 0);
        assert_eq!(samples[0].price, 50000.0);
        assert_eq!(
            samples[0].indicators,
            BTreeMap::from([("rsi".to_string(), 55.0)])
        );
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_service_error_keeps_buffer() {
        let mut api = MockSignalApi::new();
        let mut calls = 0;
        api.expect_market_signal().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(report(SignalAction::Buy, 50000.0, None))
            } else {
                Err(SyncError::Service("symbol not found".to_string()))
            }
        });

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        controller.set_query(btc()).unwrap();
        controller.fetch_once().await.unwrap();
        let before = controller.snapshot().buffer;

        let err = controller.fetch_once().await.unwrap_err();
        assert_eq!(err, SyncError::Service("symbol not found".to_string()));

        let state = controller.snapshot();
        assert_eq!(
            state.latest,
            SignalState::Failed(SyncError::Service("symbol not found".to_string()))
        );
        assert_eq!(state.buffer, before);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_fetch_without_query_issues_nothing() {
        let mut api = MockSignalApi::new();
        api.expect_market_signal().never();

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        let err = controller.fetch_once().await.unwrap_err();

        assert!(matches!(err, SyncError::Validation(_)));
        let state = controller.snapshot();
        assert_eq!(state.notice.as_deref(), Some(NO_SYMBOL));
        assert_eq!(state.latest, SignalState::Empty);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_invalid_input_is_a_noop_with_notice() {
        let mut api = MockSignalApi::new();
        api.expect_market_signal().never();

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        controller.set_query(btc()).unwrap();
        let generation = controller.snapshot().generation;

        let err = controller
            .set_query_input(Some(Market::Stocks), "  ")
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        let state = controller.snapshot();
        assert_eq!(state.query, Some(btc()));
        assert_eq!(state.generation, generation);
        assert_eq!(state.notice, Some(err.to_string()));
    }

    #[tokio::test]
    async fn test_stale_response_does_not_overwrite_new_query() {
        let (api, controller) = gated();
        let btc_gate = api.gate("BTCUSDT");
        let eth_gate = api.gate("ETHUSDT");

        controller.set_query(btc()).unwrap();
        let c = controller.clone();
        let btc_fetch = tokio::spawn(async move { c.fetch_once().await });
        settle().await;
        assert!(controller.snapshot().is_loading());

        controller.set_query(eth()).unwrap();
        let c = controller.clone();
        let eth_fetch = tokio::spawn(async move { c.fetch_once().await });
        settle().await;

        eth_gate
            .send(Ok(report(SignalAction::Sell, 3000.0, None)))
            .unwrap();
        assert_eq!(eth_fetch.await.unwrap(), Ok(FetchOutcome::Applied));

        btc_gate
            .send(Ok(report(SignalAction::Buy, 50000.0, None)))
            .unwrap();
        assert_eq!(btc_fetch.await.unwrap(), Ok(FetchOutcome::Discarded));

        let state = controller.snapshot();
        assert_eq!(state.latest.report().and_then(|r| r.price), Some(3000.0));
        assert_eq!(prices(&controller), vec![3000.0]);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_stale_failure_is_discarded_too() {
        let (api, controller) = gated();
        let btc_gate = api.gate("BTCUSDT");

        controller.set_query(btc()).unwrap();
        let c = controller.clone();
        let btc_fetch = tokio::spawn(async move { c.fetch_once().await });
        settle().await;

        controller.set_query(eth()).unwrap();
        btc_gate
            .send(Err(SyncError::Service("symbol not found".to_string())))
            .unwrap();

        assert_eq!(btc_fetch.await.unwrap(), Ok(FetchOutcome::Discarded));
        let state = controller.snapshot();
        assert_eq!(state.latest, SignalState::Empty);
        assert_eq!(state.query, Some(eth()));
    }

    #[tokio::test]
    async fn test_last_settling_response_wins() {
        let (api, controller) = gated();
        let first = api.gate("BTCUSDT");
        let second = api.gate("BTCUSDT");
        controller.set_query(btc()).unwrap();

        let c = controller.clone();
        let a = tokio::spawn(async move { c.fetch_once().await });
        settle().await;
        let c = controller.clone();
        let b = tokio::spawn(async move { c.fetch_once().await });
        settle().await;
        assert_eq!(controller.snapshot().in_flight, 2);

        second
            .send(Ok(report(SignalAction::Sell, 2.0, None)))
            .unwrap();
        assert_eq!(b.await.unwrap(), Ok(FetchOutcome::Applied));
        assert!(controller.snapshot().is_loading());

        first.send(Ok(report(SignalAction::Buy, 1.0, None))).unwrap();
        assert_eq!(a.await.unwrap(), Ok(FetchOutcome::Applied));

        let state = controller.snapshot();
        assert_eq!(state.latest.report().and_then(|r| r.price), Some(1.0));
        assert_eq!(prices(&controller), vec![2.0, 1.0]);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_loading_released_on_transport_error() {
        let (api, controller) = gated();
        let gate = api.gate("BTCUSDT");
        controller.set_query(btc()).unwrap();

        let c = controller.clone();
        let fetch = tokio::spawn(async move { c.fetch_once().await });
        settle().await;
        assert_eq!(controller.snapshot().latest, SignalState::Pending);

        drop(gate);
        let err = fetch.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), "transport");

        let state = controller.snapshot();
        assert!(!state.is_loading());
        assert_eq!(state.latest, SignalState::Failed(err));
    }

    #[tokio::test]
    async fn test_loading_released_when_fetch_is_cancelled() {
        let (api, controller) = gated();
        let _gate = api.gate("BTCUSDT");
        controller.set_query(btc()).unwrap();

        let c = controller.clone();
        let fetch = tokio::spawn(async move { c.fetch_once().await });
        settle().await;
        assert!(controller.snapshot().is_loading());

        fetch.abort();
        assert!(fetch.await.unwrap_err().is_cancelled());

        let state = controller.snapshot();
        assert!(!state.is_loading());
        assert_eq!(state.latest, SignalState::Empty);
    }

    #[tokio::test]
    async fn test_same_target_and_trade_params_keep_chart() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller =
            SignalSyncController::new(Arc::new(counting_mock(calls.clone())), rolling());
        controller.set_query(btc()).unwrap();
        controller.fetch_once().await.unwrap();
        let generation = controller.snapshot().generation;

        controller
            .set_query(Query::single(Market::Crypto, "btcusdt").unwrap())
            .unwrap();
        controller
            .set_trade_params(TradeParams::new(1.0, 5.0, 2.5).unwrap())
            .unwrap();

        let state = controller.snapshot();
        assert_eq!(state.generation, generation);
        assert_eq!(state.buffer.len(), 1);
        assert_eq!(state.trade_params.tp_pct, 5.0);
    }

    #[tokio::test]
    async fn test_target_change_resets_chart() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller =
            SignalSyncController::new(Arc::new(counting_mock(calls.clone())), rolling());
        controller.set_query(btc()).unwrap();
        controller.fetch_once().await.unwrap();
        controller.fetch_once().await.unwrap();
        assert_eq!(controller.snapshot().buffer.len(), 2);

        controller.set_query(eth()).unwrap();
        let state = controller.snapshot();
        assert!(state.buffer.is_empty());
        assert_eq!(state.latest, SignalState::Empty);

        controller.fetch_once().await.unwrap();
        assert_eq!(
            controller.snapshot().buffer.latest().map(|s| s.sequence_index),
            Some(0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_fetches_now_and_every_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller =
            SignalSyncController::new(Arc::new(counting_mock(calls.clone())), rolling());
        controller.set_query(btc()).unwrap();
        controller.start_polling(Duration::from_secs(5)).unwrap();
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(controller.snapshot().polling);

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let state = controller.snapshot();
        assert_eq!(state.buffer.len(), 3);
        assert_eq!(state.portfolio, Some(json!({"cash": 100})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_polling_issues_no_further_requests() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller =
            SignalSyncController::new(Arc::new(counting_mock(calls.clone())), rolling());
        controller.set_query(btc()).unwrap();
        controller.start_polling(Duration::from_secs(5)).unwrap();
        settle().await;

        assert_eq!(controller.stop_polling(), Some(Duration::from_secs(5)));
        let issued = calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), issued);
        assert!(!controller.snapshot().polling);
        assert_eq!(controller.stop_polling(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_survives_failures() {
        let mut api = MockSignalApi::new();
        let mut calls = 0;
        api.expect_market_signal().returning(move |_| {
            calls += 1;
            if calls < 3 {
                Err(SyncError::transport("connection refused"))
            } else {
                Ok(report(SignalAction::Hold, 10.0, None))
            }
        });
        api.expect_portfolio()
            .returning(|| Err(SyncError::transport("connection refused")));

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        controller.set_query(btc()).unwrap();
        controller.start_polling(Duration::from_secs(1)).unwrap();
        settle().await;
        assert!(controller.snapshot().latest.error().is_some());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        settle().await;

        let state = controller.snapshot();
        assert!(state.polling);
        assert_eq!(state.latest.report().and_then(|r| r.price), Some(10.0));
        assert_eq!(state.portfolio, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_switch_moves_the_timer_to_the_new_symbol() {
        let mut api = MockSignalApi::new();
        let btc_calls = Arc::new(AtomicUsize::new(0));
        let eth_calls = Arc::new(AtomicUsize::new(0));
        let (b, e) = (btc_calls.clone(), eth_calls.clone());
        api.expect_market_signal().returning(move |q| {
            if q.symbol() == "BTCUSDT" {
                b.fetch_add(1, Ordering::SeqCst);
            } else {
                e.fetch_add(1, Ordering::SeqCst);
            }
            Ok(report(SignalAction::Buy, 1.0, None))
        });
        api.expect_portfolio().returning(|| Ok(json!({})));

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        controller.set_query(btc()).unwrap();
        controller.start_polling(Duration::from_secs(5)).unwrap();
        settle().await;

        controller.set_query(eth()).unwrap();
        settle().await;
        assert!(controller.snapshot().polling);
        assert_eq!(eth_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(btc_calls.load(Ordering::SeqCst), 1);
        assert_eq!(eth_calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_last_handle_stops_timer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller =
            SignalSyncController::new(Arc::new(counting_mock(calls.clone())), rolling());
        controller.set_query(btc()).unwrap();
        controller.start_polling(Duration::from_secs(1)).unwrap();
        settle().await;
        drop(controller);
        settle().await;

        let issued = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), issued);
    }

    #[tokio::test]
    async fn test_trade_refreshes_portfolio_on_success() {
        let mut api = MockSignalApi::new();
        api.expect_execute_trade()
            .withf(|o| o.symbol == "BTCUSDT" && o.action == TradeKind::Buy && o.amount == 0.5)
            .times(1)
            .returning(|_| Ok(json!({"status": "filled"})));
        api.expect_portfolio()
            .times(1)
            .returning(|| Ok(json!({"BTCUSDT": 0.5})));

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        controller.set_query(btc()).unwrap();
        controller
            .set_trade_params(TradeParams::new(0.5, 2.0, 1.0).unwrap())
            .unwrap();
        controller
            .execute_action(TradeKind::Buy)
            .unwrap()
            .await
            .unwrap();

        let state = controller.snapshot();
        assert_eq!(state.portfolio, Some(json!({"BTCUSDT": 0.5})));
        assert!(state.notice.unwrap().contains("filled"));
    }

    #[tokio::test]
    async fn test_trade_refreshes_portfolio_on_failure() {
        let mut api = MockSignalApi::new();
        api.expect_execute_trade()
            .times(1)
            .returning(|_| Err(SyncError::Service("insufficient balance".to_string())));
        api.expect_portfolio()
            .times(1)
            .returning(|| Ok(json!({"cash": 5})));

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        controller.set_query(eth()).unwrap();
        controller
            .execute_action(TradeKind::Sell)
            .unwrap()
            .await
            .unwrap();

        let state = controller.snapshot();
        assert_eq!(state.portfolio, Some(json!({"cash": 5})));
        let notice = state.notice.unwrap();
        assert!(notice.contains("failed") && notice.contains("insufficient balance"));
    }

    #[tokio::test]
    async fn test_trade_without_symbol_is_rejected() {
        let mut api = MockSignalApi::new();
        api.expect_execute_trade().never();
        api.expect_portfolio().never();

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        let err = controller
            .execute_action(TradeKind::Buy)
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn test_dispose_discards_in_flight_and_blocks_further_use() {
        let (api, controller) = gated();
        let gate = api.gate("BTCUSDT");
        controller.set_query(btc()).unwrap();

        let c = controller.clone();
        let fetch = tokio::spawn(async move { c.fetch_once().await });
        settle().await;

        controller.dispose();
        gate.send(Ok(report(SignalAction::Buy, 1.0, None))).unwrap();
        assert_eq!(fetch.await.unwrap(), Ok(FetchOutcome::Discarded));

        let state = controller.snapshot();
        assert!(state.disposed);
        assert!(state.buffer.is_empty());
        assert!(!state.is_loading());

        assert_eq!(controller.fetch_once().await, Err(SyncError::Disposed));
        assert_eq!(controller.set_query(eth()), Err(SyncError::Disposed));
        assert_eq!(
            controller.start_polling(Duration::from_secs(1)),
            Err(SyncError::Disposed)
        );
        controller.dispose();
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let controller =
            SignalSyncController::new(Arc::new(counting_mock(calls)), rolling());
        let mut rx = controller.subscribe();

        controller.set_query(btc()).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().query, Some(btc()));

        controller.fetch_once().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().latest.report().is_some());
    }

    #[tokio::test]
    async fn test_trade_uses_stored_params() {
        let mut api = MockSignalApi::new();
        api.expect_execute_trade()
            .withf(|o| {
                o.symbol == "ETHUSDT"
                    && o.action == TradeKind::Sell
                    && o.amount == 2.5
                    && o.tp_pct == 4.0
                    && o.sl_pct == 1.5
            })
            .times(1)
            .returning(|_| Ok(json!({"status": "filled"})));
        api.expect_portfolio().returning(|| Ok(json!({})));

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        controller.set_query(eth()).unwrap();
        controller
            .set_trade_params(TradeParams::parse("2.5", "4", "1.5").unwrap())
            .unwrap();
        controller
            .execute_action(TradeKind::Sell)
            .unwrap()
            .await
            .unwrap();

        assert_eq!(controller.snapshot().trade_params.amount, 2.5);
    }

    #[tokio::test]
    async fn test_default_params_without_edits() {
        let mut api = MockSignalApi::new();
        api.expect_execute_trade()
            .withf(|o| o.amount == 0.001 && o.tp_pct == 2.0 && o.sl_pct == 1.0)
            .times(1)
            .returning(|_| Ok(json!({})));
        api.expect_portfolio().returning(|| Ok(json!({})));

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        controller.set_query(btc()).unwrap();
        controller
            .execute_action(TradeKind::Buy)
            .unwrap()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_query_after_dispose_leaves_state_alone() {
        let mut api = MockSignalApi::new();
        api.expect_market_signal().never();

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        controller.set_query(btc()).unwrap();
        let other = controller.clone();
        other.dispose();
        let generation = controller.snapshot().generation;

        assert_eq!(controller.set_query(eth()), Err(SyncError::Disposed));
        assert_eq!(
            controller.set_trade_params(TradeParams::default()),
            Err(SyncError::Disposed)
        );

        let state = controller.snapshot();
        assert_eq!(state.query, Some(btc()));
        assert_eq!(state.generation, generation);
        assert!(!state.polling);
    }

    #[tokio::test]
    async fn test_dismiss_notice_clears_it_once() {
        let mut api = MockSignalApi::new();
        api.expect_market_signal().never();

        let controller = SignalSyncController::new(Arc::new(api), rolling());
        let mut rx = controller.subscribe();
        assert!(controller.fetch_once().await.is_err());
        assert!(rx.borrow_and_update().notice.is_some());

        assert!(controller.dismiss_notice());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().notice, None);

        assert!(!controller.dismiss_notice());
        assert!(!rx.has_changed().unwrap());
    }
}
