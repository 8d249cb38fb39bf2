//! Capture/publish cycle executor.
//!
//! One cycle runs the capture tool, opens a broker session, publishes every
//! normalized field of every parsed reading in report order, and closes the
//! session. Cycles repeat until the cancellation token fires. Nothing inside
//! a cycle is fatal: capture, connect and publish failures are logged and
//! the loop carries on.

use std::{sync::Arc, time::Duration};

use rtl433_bridge_mqtt::{MqttBroker, MqttSession, TransferError};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    capture::CaptureSource, normalizer::normalize, parser::parse, reading::SensorReading,
};

/// Sends one text payload to one topic.
#[async_trait::async_trait]
pub trait Publisher: Send {
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransferError>;
}

/// A connected publisher that lives for a single cycle.
#[async_trait::async_trait]
pub trait Session: Publisher {
    /// Ends the session. Failures are the implementation's to log.
    async fn disconnect(&mut self);
}

/// Opens sessions.
#[async_trait::async_trait]
pub trait Broker: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Session>, TransferError>;
}

/// Counters for a finished cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Lines that decoded into a reading.
    pub readings: usize,
    /// Messages the broker accepted.
    pub published: usize,
    /// Messages that failed to publish.
    pub failed: usize,
    /// The capture tool did not finish successfully.
    pub capture_failed: bool,
    /// No broker session could be opened.
    pub connect_failed: bool,
}

impl CycleSummary {
    /// Nothing worked this cycle; retrying at once would only spin.
    pub fn stalled(&self) -> bool {
        self.capture_failed && self.connect_failed
    }
}

/// Joins the host namespace and a topic leaf.
pub fn topic_for(prefix: &str, leaf: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        leaf.to_string()
    } else {
        format!("{}/{}", prefix, leaf)
    }
}

/// Publishes every measurement of `reading` below `topic_prefix`.
///
/// A failed publish is logged and the remaining fields are still attempted.
/// Returns `(published, failed)`.
pub async fn publish_reading<P>(
    publisher: &mut P,
    topic_prefix: &str,
    reading: &SensorReading,
) -> (usize, usize)
where
    P: Publisher + ?Sized,
{
    let mut published = 0;
    let mut failed = 0;

    for measurement in normalize(reading) {
        let topic = topic_for(topic_prefix, &measurement.topic);
        let payload = measurement.value.to_payload();

        match publisher.publish(&topic, &payload).await {
            Ok(()) => published += 1,
            Err(e) => {
                error!("Publish to '{}' failed: {}", topic, e);
                failed += 1;
            }
        }
    }

    (published, failed)
}

/// Drives capture cycles.
pub struct Executor {
    capture: Arc<dyn CaptureSource>,
    broker: Arc<dyn Broker>,
    topic_prefix: String,
    cycle_pause: Duration,
    failure_pause: Duration,
}

/// Default minimum pause after a stalled cycle.
pub const DEFAULT_FAILURE_PAUSE: Duration = Duration::from_secs(5);

impl Executor {
    /// # Arguments
    /// * `capture` - source of capture reports
    /// * `broker` - opens one session per cycle
    /// * `topic_prefix` - host namespace, e.g. `rtl433/weatherpi`
    /// * `cycle_pause` - idle time between cycles
    pub fn new(
        capture: Arc<dyn CaptureSource>,
        broker: Arc<dyn Broker>,
        topic_prefix: impl Into<String>,
        cycle_pause: Duration,
    ) -> Self {
        Self {
            capture,
            broker,
            topic_prefix: topic_prefix.into(),
            cycle_pause,
            failure_pause: DEFAULT_FAILURE_PAUSE,
        }
    }

    /// Sets the minimum pause after a cycle in which both capture and
    /// connect failed.
    pub fn with_failure_pause(mut self, failure_pause: Duration) -> Self {
        self.failure_pause = failure_pause;
        self
    }

    fn pause_after(&self, summary: &CycleSummary) -> Duration {
        if summary.stalled() {
            self.cycle_pause.max(self.failure_pause)
        } else {
            self.cycle_pause
        }
    }

    /// Runs one capture → connect → publish → disconnect cycle.
    pub async fn run_cycle(&self) -> CycleSummary {
        let mut capture_failed = false;
        let report = match self.capture.run().await {
            Ok(report) => report,
            Err(e) => {
                error!("Capture failed: {}", e);
                capture_failed = true;
                e.into_report()
            }
        };

        let mut session = match self.broker.connect().await {
            Ok(session) => session,
            Err(e) => {
                error!("Broker connection failed, skipping publish for this cycle: {}", e);
                return CycleSummary {
                    readings: parse(&report).count(),
                    capture_failed,
                    connect_failed: true,
                    ..Default::default()
                };
            }
        };

        let mut summary = CycleSummary {
            capture_failed,
            ..Default::default()
        };
        for reading in parse(&report) {
            summary.readings += 1;
            let (published, failed) =
                publish_reading(session.as_mut(), &self.topic_prefix, &reading).await;
            summary.published += published;
            summary.failed += failed;
        }

        session.disconnect().await;

        info!(
            "Cycle complete: {} readings, {} published, {} failed",
            summary.readings, summary.published, summary.failed
        );
        summary
    }

    /// Repeats cycles until `cancel` fires. An in-flight cycle is abandoned
    /// on cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Bridge started, publishing under '{}'", self.topic_prefix);

        while !cancel.is_cancelled() {
            let summary = tokio::select! {
                _ = cancel.cancelled() => break,
                summary = self.run_cycle() => summary,
            };
            debug!("{:?}", summary);

            let pause = self.pause_after(&summary);
            if summary.stalled() {
                warn!("Capture and broker both failed, retrying in {:?}", pause);
            }
            if !pause.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(pause) => {}
                }
            }
        }

        info!("Bridge stopped");
    }
}

/// Network name of this host, `localhost` if it cannot be determined.
pub fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("Could not determine hostname, using 'localhost': {}", e);
            "localhost".to_string()
        }
    }
}

#[async_trait::async_trait]
impl Publisher for MqttSession {
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransferError> {
        MqttSession::publish(self, topic, payload).await
    }
}

#[async_trait::async_trait]
impl Session for MqttSession {
    async fn disconnect(&mut self) {
        MqttSession::disconnect(self).await
    }
}

#[async_trait::async_trait]
impl Broker for MqttBroker {
    async fn connect(&self) -> Result<Box<dyn Session>, TransferError> {
        let session = self.open_session().await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use tracing_test::traced_test;

    use super::*;
    use crate::core::capture::CaptureError;

    type Log = Arc<Mutex<Vec<(String, String)>>>;

    struct StaticCapture {
        result: Box<dyn Fn() -> Result<String, CaptureError> + Send + Sync>,
    }

    #[async_trait::async_trait]
    impl CaptureSource for StaticCapture {
        async fn run(&self) -> Result<String, CaptureError> {
            (self.result)()
        }
    }

    fn capture_of(report: &'static str) -> Arc<StaticCapture> {
        Arc::new(StaticCapture {
            result: Box::new(move || Ok(report.to_string())),
        })
    }

    #[derive(Default)]
    struct MockSession {
        log: Log,
        fail_topics_containing: Option<&'static str>,
        disconnects: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Publisher for MockSession {
        async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransferError> {
            if self
                .fail_topics_containing
                .is_some_and(|needle| topic.contains(needle))
            {
                return Err(TransferError::Timeout {
                    operation: "publish completion",
                    after: Duration::from_secs(1),
                });
            }
            self.log
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl Session for MockSession {
        async fn disconnect(&mut self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct MockBroker {
        log: Log,
        refuse: bool,
        fail_topics_containing: Option<&'static str>,
        connects: Arc<AtomicUsize>,
        disconnects: Arc<AtomicUsize>,
    }

    impl MockBroker {
        fn published(&self) -> Vec<(String, String)> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Broker for MockBroker {
        async fn connect(&self) -> Result<Box<dyn Session>, TransferError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(TransferError::Timeout {
                    operation: "CONNACK",
                    after: Duration::from_secs(30),
                });
            }
            Ok(Box::new(MockSession {
                log: self.log.clone(),
                fail_topics_containing: self.fail_topics_containing,
                disconnects: self.disconnects.clone(),
            }))
        }
    }

    fn executor(capture: Arc<dyn CaptureSource>, broker: Arc<MockBroker>) -> Executor {
        Executor::new(capture, broker, "rtl433/testhost", Duration::ZERO)
    }

    #[test]
    fn test_topic_for() {
        assert_eq!(topic_for("rtl433/pi", "TFA_1_2_temp"), "rtl433/pi/TFA_1_2_temp");
        assert_eq!(topic_for("rtl433/pi/", "x"), "rtl433/pi/x");
        assert_eq!(topic_for("", "x"), "x");
    }

    #[tokio::test]
    async fn test_publish_reading_acurite_scenario() {
        let broker = MockBroker::default();
        let mut session = MockSession {
            log: broker.log.clone(),
            ..Default::default()
        };
        let reading: SensorReading =
            serde_json::from_str::<SensorReading>(
                r#"{"model":"Acurite Rain Gauge","id":136,"rain":1030.5}"#,
            )
            .unwrap()
            .canonicalize();

        let counts = publish_reading(&mut session, "rtl433/pi", &reading).await;

        assert_eq!(counts, (1, 0));
        assert_eq!(
            broker.published(),
            vec![(
                "rtl433/pi/AcuriteRainGauge_136_rain".to_string(),
                "1030.5".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_run_cycle_tfa_scenario() {
        let broker = Arc::new(MockBroker::default());
        let exec = executor(
            capture_of(
                r#"{"model":"TFA sensor","id":9,"channel":2,"temperature_C":19.95,"battery":"OK","humidity":55}"#,
            ),
            broker.clone(),
        );

        let summary = exec.run_cycle().await;

        assert_eq!(
            summary,
            CycleSummary {
                readings: 1,
                published: 3,
                ..Default::default()
            }
        );
        assert_eq!(
            broker.published(),
            vec![
                ("rtl433/testhost/TFAsensor_9_2_temp".into(), "20.0".into()),
                ("rtl433/testhost/TFAsensor_9_2_batt".into(), "OK".into()),
                ("rtl433/testhost/TFAsensor_9_2_humid".into(), "55".into()),
            ]
        );
        assert_eq!(broker.connects.load(Ordering::SeqCst), 1);
        assert_eq!(broker.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_report_connects_and_publishes_nothing() {
        let broker = Arc::new(MockBroker::default());
        let summary = executor(capture_of(""), broker.clone()).run_cycle().await;

        assert_eq!(summary, CycleSummary::default());
        assert!(broker.published().is_empty());
        assert_eq!(broker.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_order_follows_report_and_skips_bad_lines() {
        let broker = Arc::new(MockBroker::default());
        let report = concat!(
            "{\"model\":\"inFactory sensor\",\"id\":147,\"temperature_F\":47.3}\n",
            "{\"model\":\"TFA\", broken\n",
            "{\"model\":\"Nexus-TH\",\"id\":3,\"temperature_C\":1.0}\n",
            "{\"model\":\"Acurite Rain Gauge\",\"id\":136,\"rain\":12.0}\n",
        );
        let summary = executor(capture_of(report), broker.clone()).run_cycle().await;

        assert_eq!(summary.readings, 3);
        assert_eq!(summary.published, 2);
        let topics: Vec<_> = broker.published().into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            topics,
            vec![
                "rtl433/testhost/inFactorysensor_147_temp",
                "rtl433/testhost/AcuriteRainGauge_136_rain"
            ]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_connect_failure_skips_publishing() {
        let broker = Arc::new(MockBroker {
            refuse: true,
            ..Default::default()
        });
        let summary = executor(
            capture_of("{\"model\":\"Acurite Rain Gauge\",\"id\":1,\"rain\":1.0}\n"),
            broker.clone(),
        )
        .run_cycle()
        .await;

        assert_eq!(summary.readings, 1);
        assert_eq!(summary.published, 0);
        assert!(broker.published().is_empty());
        assert_eq!(broker.disconnects.load(Ordering::SeqCst), 0);
        assert!(summary.connect_failed);
        assert!(!summary.stalled());
        assert!(logs_contain("Broker connection failed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_publish_failure_is_logged_and_cycle_continues() {
        let broker = Arc::new(MockBroker {
            fail_topics_containing: Some("_batt"),
            ..Default::default()
        });
        let summary = executor(
            capture_of(
                "{\"model\":\"TFA\",\"id\":1,\"channel\":1,\"battery\":\"OK\",\"humidity\":40}\n",
            ),
            broker.clone(),
        )
        .run_cycle()
        .await;

        assert_eq!(summary.published, 2);
        assert_eq!(summary.failed, 1);
        assert!(logs_contain("Publish to 'rtl433/testhost/TFA_1_1_batt' failed"));
        assert_eq!(broker.disconnects.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    #[traced_test]
    async fn test_capture_failure_uses_partial_report() {
        use std::os::unix::process::ExitStatusExt;

        let broker = Arc::new(MockBroker::default());
        let capture = Arc::new(StaticCapture {
            result: Box::new(|| {
                Err(CaptureError::NonZeroExit {
                    command: "rtl_433".into(),
                    status: std::process::ExitStatus::from_raw(1 << 8),
                    report: "{\"model\":\"AcuriteRainGauge\",\"id\":5,\"rain\":2.5}\n".into(),
                })
            }),
        });
        let summary = executor(capture, broker.clone()).run_cycle().await;

        assert_eq!(summary.published, 1);
        assert!(logs_contain("Capture failed"));
        assert_eq!(
            broker.published(),
            vec![("rtl433/testhost/AcuriteRainGauge_5_rain".into(), "2.5".into())]
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_still_completes_cycle() {
        let broker = Arc::new(MockBroker::default());
        let capture = Arc::new(StaticCapture {
            result: Box::new(|| {
                Err(CaptureError::Spawn {
                    command: "rtl_433".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                })
            }),
        });
        let summary = executor(capture, broker.clone()).run_cycle().await;

        assert_eq!(
            summary,
            CycleSummary {
                capture_failed: true,
                ..Default::default()
            }
        );
        assert!(!summary.stalled());
        assert_eq!(broker.connects.load(Ordering::SeqCst), 1);
    }

    fn missing_tool() -> Arc<StaticCapture> {
        Arc::new(StaticCapture {
            result: Box::new(|| {
                Err(CaptureError::Spawn {
                    command: "rtl_433".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                })
            }),
        })
    }

    #[tokio::test]
    async fn test_capture_and_connect_failure_marks_cycle_stalled() {
        let broker = Arc::new(MockBroker {
            refuse: true,
            ..Default::default()
        });
        let summary = executor(missing_tool(), broker).run_cycle().await;

        assert!(summary.capture_failed);
        assert!(summary.connect_failed);
        assert!(summary.stalled());
    }

    #[test]
    fn test_pause_after_stalled_cycle_uses_failure_pause() {
        let exec = executor(capture_of(""), Arc::new(MockBroker::default()))
            .with_failure_pause(Duration::from_secs(5));
        let stalled = CycleSummary {
            capture_failed: true,
            connect_failed: true,
            ..Default::default()
        };
        let refused = CycleSummary {
            connect_failed: true,
            ..Default::default()
        };

        assert_eq!(exec.pause_after(&stalled), Duration::from_secs(5));
        assert_eq!(exec.pause_after(&refused), Duration::ZERO);
        assert_eq!(exec.pause_after(&CycleSummary::default()), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_run_backs_off_when_nothing_works() {
        let broker = Arc::new(MockBroker {
            refuse: true,
            ..Default::default()
        });
        let exec = Arc::new(
            executor(missing_tool(), broker.clone()).with_failure_pause(Duration::from_secs(60)),
        );
        let cancel = CancellationToken::new();

        let handle = {
            let exec = exec.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { exec.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("executor did not stop")
            .unwrap();

        assert_eq!(broker.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let broker = Arc::new(MockBroker::default());
        let exec = Arc::new(Executor::new(
            capture_of("{\"model\":\"TFA\",\"id\":1}\n"),
            broker.clone(),
            "rtl433/testhost",
            Duration::from_millis(20),
        ));
        let cancel = CancellationToken::new();

        let handle = {
            let exec = exec.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { exec.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("executor did not stop")
            .unwrap();

        assert!(broker.connects.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_run_returns_immediately_if_already_cancelled() {
        let broker = Arc::new(MockBroker::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        executor(capture_of(""), broker.clone()).run(cancel).await;

        assert_eq!(broker.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_local_hostname_not_empty() {
        assert!(!local_hostname().is_empty());
    }
}
