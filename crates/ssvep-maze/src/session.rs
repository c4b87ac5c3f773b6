//! Online classification session
//!
//! Buffers the EEG chunk stream, classifies the latest window on a fixed
//! cadence and publishes every result to subscribers.

use serde::{Deserialize, Serialize};
use ssvep_core::{config_error, Command, Decision, EegSource, EegWindow, SsvepError, SsvepResult};
use ssvep_processing::{ClassifierConfig, FbccaClassifier};
use ssvep_simulation::{StreamSource, WindowBuffer, DEFAULT_BUFFER_SECONDS};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// Commands for controlling the session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Start,
    /// Stop classifying and drop buffered samples and statistics
    Stop,
    Pause,
    Resume,
    /// Drop buffered samples so the next window only holds fresh data
    ClearBuffer,
    UpdateClassifier(ClassifierConfig),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds between classification attempts
    pub classify_interval: f64,
    /// Factor applied to every window before classification
    pub input_scale: f64,
    /// History kept by the sample buffer (s)
    pub buffer_seconds: f64,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            classify_interval: 0.5,
            input_scale: 1.0,
            buffer_seconds: DEFAULT_BUFFER_SECONDS,
            event_capacity: 32,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> SsvepResult<()> {
        if !self.classify_interval.is_finite() || self.classify_interval <= 0.0 {
            return Err(config_error!("classification interval must be positive"));
        }
        if !self.input_scale.is_finite() || self.input_scale == 0.0 {
            return Err(config_error!("input scale must be finite and non-zero"));
        }
        if self.event_capacity == 0 {
            return Err(config_error!("event channel capacity must be greater than 0"));
        }
        Ok(())
    }
}

/// One classification published by the session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub decision: Decision,
    pub command: Command,
    /// Frequency of the selected stimulus
    pub frequency: Option<f64>,
    pub scores: Vec<f64>,
    pub best_score: Option<f64>,
    pub processing_time_us: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub is_running: bool,
    pub classifications: u64,
    /// Classifications that passed the threshold
    pub decisions: u64,
    pub total_processing_time_us: u64,
    pub average_latency_us: u64,
    pub last_command: Option<Command>,
}

impl SessionStats {
    /// Share of classifications that produced a target
    pub fn decision_rate(&self) -> f64 {
        if self.classifications == 0 {
            0.0
        } else {
            self.decisions as f64 / self.classifications as f64
        }
    }

    fn record(&mut self, event: &SessionEvent) {
        self.classifications += 1;
        if event.decision.is_decided() {
            self.decisions += 1;
        }
        self.total_processing_time_us += event.processing_time_us;
        self.average_latency_us = self.total_processing_time_us / self.classifications;
        self.last_command = Some(event.command);
    }
}

/// Real-time classification over a buffered EEG stream
pub struct OnlineSession {
    config: SessionConfig,
    classifier: FbccaClassifier,
    source: StreamSource,
    event_sender: broadcast::Sender<SessionEvent>,
    command_receiver: mpsc::Receiver<SessionCommand>,
    command_sender: mpsc::Sender<SessionCommand>,
    is_running: bool,
    stats: Arc<Mutex<SessionStats>>,
}

impl OnlineSession {
    pub fn new(
        classifier: FbccaClassifier,
        data_receiver: broadcast::Receiver<EegWindow>,
        channel_count: usize,
        config: SessionConfig,
    ) -> SsvepResult<Self> {
        config.validate()?;

        let window_seconds = classifier.config().window_seconds;
        if config.buffer_seconds < window_seconds {
            return Err(config_error!(
                "buffer of {}s cannot hold a {}s window",
                config.buffer_seconds,
                window_seconds
            ));
        }

        let buffer = WindowBuffer::new(
            channel_count,
            classifier.config().sampling_rate,
            config.buffer_seconds,
        )?;
        let (event_sender, _) = broadcast::channel(config.event_capacity);
        let (command_sender, command_receiver) = mpsc::channel(32);

        Ok(OnlineSession {
            config,
            classifier,
            source: StreamSource::new(data_receiver, buffer),
            event_sender,
            command_receiver,
            command_sender,
            is_running: false,
            stats: Arc::new(Mutex::new(SessionStats::default())),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_sender.subscribe()
    }

    pub fn command_handle(&self) -> mpsc::Sender<SessionCommand> {
        self.command_sender.clone()
    }

    pub fn stats_handle(&self) -> Arc<Mutex<SessionStats>> {
        Arc::clone(&self.stats)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn classifier(&self) -> &FbccaClassifier {
        &self.classifier
    }

    /// Classify the latest window, or `None` while the buffer is still filling
    pub async fn classify_once(&mut self) -> SsvepResult<Option<SessionEvent>> {
        self.source.drain()?;

        let required = self.source.samples_for(self.classifier.config().window_seconds);
        if self.source.buffer().len() < required {
            debug!(
                "Waiting for samples: {}/{}",
                self.source.buffer().len(),
                required
            );
            return Ok(None);
        }

        let mut window = self.source.buffer().latest(required)?;
        if self.config.input_scale != 1.0 {
            window = window.scaled(self.config.input_scale);
        }

        let classification = self.classifier.classify_window(&window)?;
        let layout = &self.classifier.config().layout;
        let event = SessionEvent {
            decision: classification.decision,
            command: layout.command_for(classification.decision),
            frequency: layout.frequency_for(classification.decision),
            best_score: classification.best_score(),
            scores: classification.scores,
            processing_time_us: classification.metrics.processing_time_us,
        };

        self.stats.lock().await.record(&event);

        // Send to subscribers (ignore if no receivers)
        let _ = self.event_sender.send(event.clone());
        Ok(Some(event))
    }

    /// Run until `Shutdown`, a closed command channel or a closed EEG stream
    pub async fn run(mut self) -> SsvepResult<()> {
        let mut ticker = interval(Duration::from_secs_f64(self.config.classify_interval));

        info!(
            "Online session ready - window {:.1}s, every {:.0}ms",
            self.classifier.config().window_seconds,
            self.config.classify_interval * 1000.0
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.is_running {
                        continue;
                    }
                    match self.classify_once().await {
                        Ok(_) => {}
                        Err(SsvepError::SourceError { reason }) => {
                            warn!("Stopping online session: {}", reason);
                            break;
                        }
                        Err(e) => error!("Classification failed: {}", e),
                    }
                }

                command = self.command_receiver.recv() => {
                    match command {
                        Some(SessionCommand::Shutdown) | None => {
                            info!("Online session shut down");
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start | SessionCommand::Resume => {
                self.set_running(true).await;
                info!("Online session running");
            }
            SessionCommand::Pause => {
                self.set_running(false).await;
                info!("Online session paused");
            }
            SessionCommand::Stop => {
                self.set_running(false).await;
                self.source.clear();
                *self.stats.lock().await = SessionStats::default();
                info!("Online session stopped");
            }
            SessionCommand::ClearBuffer => {
                if let Err(e) = self.source.drain() {
                    warn!("Failed to drain EEG stream: {}", e);
                }
                self.source.clear();
                debug!("Sample buffer cleared");
            }
            SessionCommand::UpdateClassifier(config) => {
                if let Err(e) = self.update_classifier(config) {
                    error!("Failed to update classifier: {}", e);
                }
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn update_classifier(&mut self, config: ClassifierConfig) -> SsvepResult<()> {
        if config.sampling_rate != self.source.sampling_rate() {
            return Err(SsvepError::InvalidSamplingRate {
                rate: config.sampling_rate,
                reason: format!("EEG stream runs at {}Hz", self.source.sampling_rate()),
            });
        }
        if self.source.buffer().capacity() < self.source.samples_for(config.window_seconds) {
            return Err(config_error!(
                "buffer cannot hold a {}s window",
                config.window_seconds
            ));
        }

        self.classifier = FbccaClassifier::new(config)?;
        info!("Classifier updated: {}", self.classifier.config().name);
        Ok(())
    }

    async fn set_running(&mut self, running: bool) {
        self.is_running = running;
        self.stats.lock().await.is_running = running;
    }
}

/// Handles to a session running in the background
pub struct SessionHandle {
    pub events: broadcast::Receiver<SessionEvent>,
    pub control: mpsc::Sender<SessionCommand>,
    pub stats: Arc<Mutex<SessionStats>>,
}

/// Create a session and run it on a background task
pub fn start_online_session(
    classifier: FbccaClassifier,
    data_receiver: broadcast::Receiver<EegWindow>,
    channel_count: usize,
    config: SessionConfig,
) -> SsvepResult<SessionHandle> {
    let session = OnlineSession::new(classifier, data_receiver, channel_count, config)?;
    let handle = SessionHandle {
        events: session.subscribe(),
        control: session.command_handle(),
        stats: session.stats_handle(),
    };

    tokio::spawn(async move {
        if let Err(e) = session.run().await {
            error!("Online session error: {}", e);
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssvep_simulation::{EegSimConfig, EegSimulator, GazePattern, NoiseConfig};
    use tokio::time::timeout;

    const CHANNELS: usize = 4;

    fn simulator(frequency: f64) -> EegSimulator {
        EegSimulator::new(EegSimConfig {
            channel_count: CHANNELS,
            gaze: GazePattern::Fixed { frequency },
            noise: NoiseConfig {
                gaussian_std: 1.0,
                ..Default::default()
            },
            seed: Some(11),
            ..Default::default()
        })
        .unwrap()
    }

    fn send_seconds(sender: &broadcast::Sender<EegWindow>, sim: &mut EegSimulator, seconds: f64) {
        let chunks = (seconds / 0.2).round() as usize;
        for _ in 0..chunks {
            sender.send(sim.generate_chunk(0.2).unwrap()).unwrap();
        }
    }

    fn session(receiver: broadcast::Receiver<EegWindow>, config: SessionConfig) -> OnlineSession {
        let classifier = FbccaClassifier::new(ClassifierConfig::online()).unwrap();
        OnlineSession::new(classifier, receiver, CHANNELS, config).unwrap()
    }

    #[tokio::test]
    async fn test_classify_once_waits_for_full_window() {
        let (sender, receiver) = broadcast::channel(64);
        let mut session = session(receiver, SessionConfig::default());
        let mut sim = simulator(9.0);

        send_seconds(&sender, &mut sim, 1.0);
        assert_eq!(session.classify_once().await.unwrap(), None);

        send_seconds(&sender, &mut sim, 1.2);
        let event = session.classify_once().await.unwrap().unwrap();
        assert_eq!(event.decision, Decision::Target(1));
        assert_eq!(event.command, Command::Down);
        assert_eq!(event.frequency, Some(9.0));
        assert!(event.best_score.unwrap() >= ClassifierConfig::online().threshold);

        let stats = session.stats_handle().lock().await.clone();
        assert_eq!(stats.classifications, 1);
        assert_eq!(stats.decisions, 1);
        assert_eq!(stats.last_command, Some(Command::Down));
    }

    #[tokio::test]
    async fn test_input_scale_keeps_decision() {
        let (sender, receiver) = broadcast::channel(64);
        let config = SessionConfig {
            input_scale: 1e-6,
            ..Default::default()
        };
        let mut session = session(receiver, config);
        let mut sim = simulator(13.0);

        send_seconds(&sender, &mut sim, 2.0);
        let event = session.classify_once().await.unwrap().unwrap();
        assert_eq!(event.command, Command::Right);
    }

    #[tokio::test]
    async fn test_running_session_publishes_events() {
        let (sender, receiver) = broadcast::channel(64);
        let classifier = FbccaClassifier::new(ClassifierConfig::online()).unwrap();
        let config = SessionConfig {
            classify_interval: 0.02,
            ..Default::default()
        };
        let mut handle = start_online_session(classifier, receiver, CHANNELS, config).unwrap();

        let mut sim = simulator(7.0);
        send_seconds(&sender, &mut sim, 2.0);
        handle.control.send(SessionCommand::Start).await.unwrap();

        let event = timeout(Duration::from_secs(10), handle.events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.command, Command::Up);
        assert!(handle.stats.lock().await.is_running);

        handle.control.send(SessionCommand::Stop).await.unwrap();
        handle.control.send(SessionCommand::Shutdown).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_ends_when_stream_closes() {
        let (sender, receiver) = broadcast::channel::<EegWindow>(4);
        let session = session(
            receiver,
            SessionConfig {
                classify_interval: 0.01,
                ..Default::default()
            },
        );
        let control = session.command_handle();
        let task = tokio::spawn(session.run());

        control.send(SessionCommand::Start).await.unwrap();
        drop(sender);

        assert!(timeout(Duration::from_secs(5), task).await.unwrap().unwrap().is_ok());
    }

    #[test]
    fn test_invalid_session_config() {
        let (_sender, receiver) = broadcast::channel::<EegWindow>(4);
        let classifier = FbccaClassifier::new(ClassifierConfig::online()).unwrap();
        let config = SessionConfig {
            buffer_seconds: 1.0,
            ..Default::default()
        };
        assert!(OnlineSession::new(classifier, receiver, CHANNELS, config).is_err());

        assert!(SessionConfig {
            classify_interval: 0.0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_stats_decision_rate() {
        let mut stats = SessionStats::default();
        assert_eq!(stats.decision_rate(), 0.0);

        let event = SessionEvent {
            decision: Decision::NoDecision,
            command: Command::Hold,
            frequency: None,
            scores: vec![1.0; 4],
            best_score: Some(1.0),
            processing_time_us: 100,
        };
        stats.record(&event);
        stats.record(&SessionEvent {
            decision: Decision::Target(0),
            command: Command::Up,
            processing_time_us: 300,
            ..event
        });

        assert_eq!(stats.decision_rate(), 0.5);
        assert_eq!(stats.average_latency_us, 200);
        assert_eq!(stats.last_command, Some(Command::Up));
    }
}
