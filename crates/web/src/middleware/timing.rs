use crate::body::Body;
use crate::handler::{Handler, HandlerResult};
use crate::middleware::Middleware;
use async_trait::async_trait;
use http::{Method, Request, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// How a timed call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Responded(StatusCode),
    Failed,
    /// The call future was dropped before completing.
    Dropped,
}

/// Receives the elapsed time of every call through a [`Timing`] middleware.
pub trait ElapsedRecorder: Send + Sync {
    fn record(&self, method: &Method, path: &str, elapsed: Duration, outcome: CallOutcome);
}

/// Logs elapsed times with `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl ElapsedRecorder for TracingRecorder {
    fn record(&self, method: &Method, path: &str, elapsed: Duration, outcome: CallOutcome) {
        info!(%method, path, ?elapsed, ?outcome, "request finished");
    }
}

/// Measures the wall-clock time spent in the wrapped handler.
#[derive(Debug)]
pub struct Timing<R = TracingRecorder> {
    recorder: Arc<R>,
}

impl Timing {
    pub fn new() -> Self {
        Self::with_recorder(TracingRecorder)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Timing<R> {
    pub fn with_recorder(recorder: R) -> Self {
        Self { recorder: Arc::new(recorder) }
    }
}

impl<R> Clone for Timing<R> {
    fn clone(&self) -> Self {
        Self { recorder: Arc::clone(&self.recorder) }
    }
}

impl<H, R> Middleware<H> for Timing<R>
where
    H: Handler,
    R: ElapsedRecorder + 'static,
{
    type Out = TimingHandler<H, R>;

    fn wrap(&self, handler: H) -> Self::Out {
        TimingHandler { handler, recorder: Arc::clone(&self.recorder) }
    }
}

#[derive(Debug)]
pub struct TimingHandler<H, R> {
    handler: H,
    recorder: Arc<R>,
}

#[async_trait]
impl<H, R> Handler for TimingHandler<H, R>
where
    H: Handler,
    R: ElapsedRecorder + 'static,
{
    async fn call(&self, req: Request<Body>) -> HandlerResult {
        let mut guard = ElapsedGuard {
            recorder: &*self.recorder,
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            start: Instant::now(),
            outcome: CallOutcome::Dropped,
        };

        let result = self.handler.call(req).await;
        guard.outcome = match &result {
            Ok(response) => CallOutcome::Responded(response.status()),
            Err(_) => CallOutcome::Failed,
        };
        result
    }
}

/// Records on drop, so a cancelled call is measured too.
struct ElapsedGuard<'a, R: ElapsedRecorder> {
    recorder: &'a R,
    method: Method,
    path: String,
    start: Instant,
    outcome: CallOutcome,
}

impl<R: ElapsedRecorder> Drop for ElapsedGuard<'_, R> {
    fn drop(&mut self) {
        self.recorder.record(&self.method, &self.path, self.start.elapsed(), self.outcome);
    }
}
