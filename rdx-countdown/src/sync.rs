//! Clock synchronisation against a remote time authority.
//!
//! One request per cycle, with round-trip-halved latency compensation:
//!
//! ```text
//! latency = (receive - send) / 2
//! offset  = remote - receive + latency
//! ```
//!
//! The offset lives in a [`ClockOffsetCell`] that the sampler reads with a
//! single atomic load per sample, so it can never observe a half-written value.
//! A failed sync leaves the previous offset in place and downgrades the status
//! to [`SyncStatus::Offline`]; the fixed re-sync interval is the only retry.

use crate::common::EpochMillis;
use crate::error::SyncError;
use crate::time::TimeSource;
use chrono::DateTime;
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Authoritative time minus local time, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockOffset(pub i64);

impl ClockOffset {
    pub const ZERO: ClockOffset = ClockOffset(0);

    pub fn millis(self) -> i64 {
        self.0
    }

    /// Applies the offset to a local reading.
    pub fn correct(self, local: EpochMillis) -> EpochMillis {
        local + self.0
    }
}

/// Observable synchronisation state for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Syncing,
    Synced,
    Offline,
}

/// The result of one request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTrip {
    pub estimated_latency: i64,
    pub offset: ClockOffset,
}

impl RoundTrip {
    /// Derives latency and offset from the three timestamps of a round trip.
    pub fn measure(send: EpochMillis, receive: EpochMillis, remote: EpochMillis) -> Self {
        let estimated_latency = (receive - send) / 2;
        Self {
            estimated_latency,
            offset: ClockOffset(remote - receive + estimated_latency),
        }
    }
}

/// Shared, atomically-read clock offset.
///
/// Written only by `ClockSync`; read by the sampler once per sample.
#[derive(Debug, Clone, Default)]
pub struct ClockOffsetCell(Arc<AtomicI64>);

impl ClockOffsetCell {
    pub fn load(&self) -> ClockOffset {
        ClockOffset(self.0.load(Ordering::Acquire))
    }

    fn store(&self, offset: ClockOffset) {
        self.0.store(offset.0, Ordering::Release);
    }
}

/// A remote service that reports the current absolute time.
pub trait TimeAuthority: Send + Sync {
    /// Fetches the authority's current time for the given IANA timezone.
    fn fetch(&self, timezone: &str)
        -> impl Future<Output = Result<EpochMillis, SyncError>> + Send;
}

/// A worldtimeapi-compatible HTTP time authority.
///
/// Requests `{base_url}/api/timezone/{timezone}` and reads the RFC 3339
/// `datetime` field of the JSON body.
#[derive(Debug, Clone)]
pub struct WorldTimeApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WorldTimeResponse {
    datetime: String,
}

impl WorldTimeApi {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Fails only if the HTTP client cannot be built, e.g. when no TLS
    /// backend is available.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, timezone: &str) -> String {
        format!("{}/api/timezone/{}", self.base_url, timezone)
    }
}

impl TimeAuthority for WorldTimeApi {
    async fn fetch(&self, timezone: &str) -> Result<EpochMillis, SyncError> {
        let response = self.client.get(self.endpoint(timezone)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_world_time(&body)
    }
}

/// Extracts the absolute timestamp from a worldtimeapi JSON body.
pub fn parse_world_time(body: &str) -> Result<EpochMillis, SyncError> {
    let parsed: WorldTimeResponse =
        serde_json::from_str(body).map_err(|e| SyncError::Malformed(e.to_string()))?;
    let datetime = DateTime::parse_from_rfc3339(&parsed.datetime)
        .map_err(|e| SyncError::Malformed(format!("{}: {}", parsed.datetime, e)))?;
    Ok(datetime.timestamp_millis())
}

/// Estimates and publishes the offset between local and authoritative time.
pub struct ClockSync<A> {
    authority: A,
    clock: Arc<dyn TimeSource>,
    timezone: String,
    offset: ClockOffsetCell,
}

impl<A: TimeAuthority> ClockSync<A> {
    pub fn new(authority: A, clock: Arc<dyn TimeSource>, timezone: impl Into<String>) -> Self {
        Self {
            authority,
            clock,
            timezone: timezone.into(),
            offset: ClockOffsetCell::default(),
        }
    }

    /// Shares an existing offset cell instead of starting from zero.
    pub fn with_offset_cell(mut self, cell: ClockOffsetCell) -> Self {
        self.offset = cell;
        self
    }

    /// A read handle for the sampler.
    pub fn offset_cell(&self) -> ClockOffsetCell {
        self.offset.clone()
    }

    pub fn offset(&self) -> ClockOffset {
        self.offset.load()
    }

    /// Performs one synchronisation round trip.
    ///
    /// On success the new offset is published. On failure the previous offset
    /// stays in effect and the error is returned for logging only.
    pub async fn sync(&self) -> Result<ClockOffset, SyncError> {
        let send = self.clock.now_millis();
        let result = self.authority.fetch(&self.timezone).await;
        let receive = self.clock.now_millis();

        match result {
            Ok(remote) => {
                let round_trip = RoundTrip::measure(send, receive, remote);
                self.offset.store(round_trip.offset);
                info!(
                    "Clock synced ({}). Offset: {}ms, latency: {}ms",
                    self.timezone, round_trip.offset.0, round_trip.estimated_latency
                );
                Ok(round_trip.offset)
            }
            Err(e) => {
                warn!(
                    "Could not sync with time authority, keeping offset {}ms: {}",
                    self.offset.load().0,
                    e
                );
                Err(e)
            }
        }
    }

    /// Runs `sync` and folds the outcome into a status, never an error.
    pub async fn sync_quietly(&self) -> SyncStatus {
        match self.sync().await {
            Ok(_) => SyncStatus::Synced,
            Err(e) => {
                debug!("Sync failure absorbed: {}", e);
                SyncStatus::Offline
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Answers with a scripted result and advances a fake local clock by the
    /// configured round-trip duration.
    struct ScriptedAuthority {
        clock: Arc<FakeClock>,
        round_trip_ms: i64,
        responses: Mutex<Vec<Result<EpochMillis, SyncError>>>,
        calls: AtomicUsize,
    }

    impl TimeAuthority for ScriptedAuthority {
        async fn fetch(&self, _timezone: &str) -> Result<EpochMillis, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.clock.advance(self.round_trip_ms);
            self.responses.lock().unwrap().remove(0)
        }
    }

    #[derive(Default)]
    struct FakeClock(AtomicI64);

    impl FakeClock {
        fn set(&self, millis: i64) {
            self.0.store(millis, Ordering::SeqCst);
        }

        fn advance(&self, millis: i64) {
            self.0.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl TimeSource for FakeClock {
        fn now_millis(&self) -> EpochMillis {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn scripted(
        responses: Vec<Result<EpochMillis, SyncError>>,
    ) -> (ClockSync<ScriptedAuthority>, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::default());
        let authority = ScriptedAuthority {
            clock: clock.clone(),
            round_trip_ms: 200,
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        };
        (ClockSync::new(authority, clock.clone(), "Europe/Berlin"), clock)
    }

    #[test]
    fn round_trip_halves_latency() {
        let trip = RoundTrip::measure(1_000, 1_200, 1_300);
        assert_eq!(trip.estimated_latency, 100);
        assert_eq!(trip.offset, ClockOffset(200));
    }

    #[test]
    fn negative_offset_when_local_clock_runs_ahead() {
        let trip = RoundTrip::measure(10_000, 10_040, 9_000);
        assert_eq!(trip.offset, ClockOffset(9_000 - 10_040 + 20));
    }

    #[tokio::test]
    async fn successful_sync_publishes_offset() {
        let (sync, clock) = scripted(vec![Ok(1_300)]);
        clock.set(1_000);
        let offset = sync.sync().await.unwrap();
        assert_eq!(offset, ClockOffset(200));
        assert_eq!(sync.offset(), ClockOffset(200));
        assert_eq!(sync.offset_cell().load().correct(5_000), 5_200);
    }

    #[tokio::test]
    async fn failed_sync_keeps_previous_offset() {
        let (sync, clock) = scripted(vec![
            Ok(1_300),
            Err(SyncError::Malformed("no datetime".into())),
            Err(SyncError::Status(502)),
        ]);
        clock.set(1_000);
        sync.sync().await.unwrap();
        let before = sync.offset();

        assert!(sync.sync().await.is_err());
        assert_eq!(sync.offset(), before);
        assert_eq!(sync.sync_quietly().await, SyncStatus::Offline);
        assert_eq!(sync.offset(), before);
    }

    #[tokio::test]
    async fn failure_before_any_sync_leaves_zero() {
        let (sync, _clock) = scripted(vec![Err(SyncError::Status(503))]);
        assert_eq!(sync.sync_quietly().await, SyncStatus::Offline);
        assert_eq!(sync.offset(), ClockOffset::ZERO);
        assert_eq!(sync.authority.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn parses_world_time_body() {
        let body = r#"{"timezone":"Europe/Berlin","datetime":"2025-12-31T23:59:30.250+01:00","unixtime":1767221970}"#;
        assert_eq!(parse_world_time(body).unwrap(), 1_767_221_970_250);
    }

    #[test]
    fn rejects_body_without_datetime() {
        assert!(matches!(
            parse_world_time(r#"{"unixtime":1}"#),
            Err(SyncError::Malformed(_))
        ));
        assert!(matches!(
            parse_world_time(r#"{"datetime":"yesterday"}"#),
            Err(SyncError::Malformed(_))
        ));
    }

    #[test]
    fn endpoint_is_keyed_by_timezone() {
        let api = WorldTimeApi::new("https://worldtimeapi.org/").unwrap();
        assert_eq!(
            api.endpoint("America/New_York"),
            "https://worldtimeapi.org/api/timezone/America/New_York"
        );
    }
}
