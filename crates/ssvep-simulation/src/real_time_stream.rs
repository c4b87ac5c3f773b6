//! Real-time EEG chunk streaming

use crate::eeg_simulator::{EegSimConfig, EegSimulator};
use crate::signal_patterns::GazePattern;
use serde::{Deserialize, Serialize};
use ssvep_core::{config_error, EegWindow, SsvepResult};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, error, info, warn};

/// Configuration for real-time streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// EEG simulation configuration
    pub sim_config: EegSimConfig,
    /// Chunk duration in seconds (e.g., 0.1 for 100ms chunks)
    pub chunk_duration: f64,
    /// Capacity of the broadcast channel (chunks)
    pub buffer_size: usize,
    /// Update rate in Hz (how often to send new data)
    pub update_rate: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sim_config: EegSimConfig::default(),
            chunk_duration: 0.1, // 100ms chunks
            buffer_size: 50,     // 5 seconds of history at 100ms chunks
            update_rate: 10.0,   // 10 Hz updates
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> SsvepResult<()> {
        self.sim_config.validate()?;
        if !self.chunk_duration.is_finite() || self.chunk_duration <= 0.0 {
            return Err(config_error!("chunk duration must be positive"));
        }
        if self.chunk_duration * self.sim_config.sampling_rate < 1.0 {
            return Err(config_error!(
                "chunk of {}s holds no samples at {}Hz",
                self.chunk_duration,
                self.sim_config.sampling_rate
            ));
        }
        if !self.update_rate.is_finite() || self.update_rate <= 0.0 {
            return Err(config_error!("update rate must be positive"));
        }
        if self.buffer_size == 0 {
            return Err(config_error!("stream buffer size must be greater than 0"));
        }
        Ok(())
    }

    fn update_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.update_rate)
    }
}

/// Commands for controlling the stream
#[derive(Debug, Clone)]
pub enum StreamCommand {
    Start,
    Stop,
    Pause,
    Resume,
    UpdateConfig(StreamConfig),
    /// Change what the simulated user looks at
    SetGaze(GazePattern),
    /// Close the stream task
    Shutdown,
}

/// Stream statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_running: bool,
    pub chunks_generated: u64,
    /// Seconds of signal produced
    pub total_duration: f64,
    /// Gazed frequency of the current pattern, if fixed
    pub current_gaze: Option<f64>,
    /// Generation time of the last chunk (s)
    pub last_chunk_time: f64,
}

/// Real-time EEG signal stream
pub struct RealTimeEegStream {
    config: StreamConfig,
    simulator: EegSimulator,
    data_sender: broadcast::Sender<EegWindow>,
    control_receiver: mpsc::Receiver<StreamCommand>,
    control_sender: mpsc::Sender<StreamCommand>,
    is_running: bool,
    stats: Arc<Mutex<StreamStats>>,
}

impl RealTimeEegStream {
    /// Create new real-time EEG stream
    pub fn new(config: StreamConfig) -> SsvepResult<Self> {
        config.validate()?;
        let simulator = EegSimulator::new(config.sim_config.clone())?;
        let (data_sender, _) = broadcast::channel(config.buffer_size);
        let (control_sender, control_receiver) = mpsc::channel(32);

        Ok(RealTimeEegStream {
            config,
            simulator,
            data_sender,
            control_receiver,
            control_sender,
            is_running: false,
            stats: Arc::new(Mutex::new(StreamStats::default())),
        })
    }

    /// Get a receiver for data updates
    pub fn subscribe(&self) -> broadcast::Receiver<EegWindow> {
        self.data_sender.subscribe()
    }

    /// Get control sender for sending commands
    pub fn control_handle(&self) -> mpsc::Sender<StreamCommand> {
        self.control_sender.clone()
    }

    /// Shared statistics, readable while the stream runs
    pub fn stats_handle(&self) -> Arc<Mutex<StreamStats>> {
        Arc::clone(&self.stats)
    }

    /// Run until `Shutdown` arrives or every control sender is dropped
    pub async fn run(mut self) -> SsvepResult<()> {
        let mut interval_timer = interval(self.config.update_interval());

        info!(
            "EEG stream ready - update rate: {:.1}Hz, chunk duration: {:.0}ms",
            self.config.update_rate,
            self.config.chunk_duration * 1000.0
        );

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    if self.is_running {
                        self.emit_chunk().await?;
                    }
                }

                command = self.control_receiver.recv() => {
                    match command {
                        Some(StreamCommand::Shutdown) | None => {
                            info!("EEG stream control channel closed");
                            break;
                        }
                        Some(command) => self.handle_command(command, &mut interval_timer).await,
                    }
                }
            }
        }

        Ok(())
    }

    async fn emit_chunk(&mut self) -> SsvepResult<()> {
        let start_time = Instant::now();
        let chunk = self.simulator.generate_chunk(self.config.chunk_duration)?;
        let generation_time = start_time.elapsed();

        {
            let mut stats = self.stats.lock().await;
            stats.chunks_generated += 1;
            stats.total_duration += chunk.duration();
            stats.last_chunk_time = generation_time.as_secs_f64();
        }

        // Send to subscribers (ignore if no receivers)
        let _ = self.data_sender.send(chunk);

        if generation_time.as_secs_f64() > self.config.chunk_duration {
            warn!(
                "Chunk generation took {:.1}ms, longer than chunk duration {:.0}ms",
                generation_time.as_secs_f64() * 1000.0,
                self.config.chunk_duration * 1000.0
            );
        }
        Ok(())
    }

    async fn handle_command(&mut self, command: StreamCommand, interval_timer: &mut tokio::time::Interval) {
        match command {
            StreamCommand::Start | StreamCommand::Resume => {
                self.set_running(true).await;
                info!("EEG stream running");
            }
            StreamCommand::Pause => {
                self.set_running(false).await;
                info!("EEG stream paused");
            }
            StreamCommand::Stop => {
                self.set_running(false).await;
                self.simulator.reset_time();
                {
                    let mut stats = self.stats.lock().await;
                    stats.chunks_generated = 0;
                    stats.total_duration = 0.0;
                }
                info!("EEG stream stopped");
            }
            StreamCommand::UpdateConfig(new_config) => {
                if let Err(e) = self.update_config(new_config, interval_timer).await {
                    error!("Rejected EEG stream configuration: {}", e);
                }
            }
            StreamCommand::SetGaze(gaze) => {
                self.simulator.set_gaze(gaze);
                self.config.sim_config.gaze = gaze;
                self.record_gaze().await;
                debug!("EEG stream gaze set: {}", gaze.description());
            }
            StreamCommand::Shutdown => {}
        }
    }

    /// Switch to `new_config`; nothing changes unless it is valid
    async fn update_config(
        &mut self,
        new_config: StreamConfig,
        interval_timer: &mut tokio::time::Interval,
    ) -> SsvepResult<()> {
        new_config.validate()?;
        self.simulator.update_config(new_config.sim_config.clone())?;
        *interval_timer = interval(new_config.update_interval());
        self.config = new_config;
        self.record_gaze().await;
        info!("EEG stream configuration updated");
        Ok(())
    }

    async fn set_running(&mut self, running: bool) {
        self.is_running = running;
        self.stats.lock().await.is_running = running;
    }

    async fn record_gaze(&self) {
        let gaze = match self.simulator.gaze() {
            GazePattern::Fixed { frequency } => Some(frequency),
            _ => None,
        };
        self.stats.lock().await.current_gaze = gaze;
    }

    /// Get current configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

/// Handles to a stream running in the background
pub struct StreamHandle {
    pub data: broadcast::Receiver<EegWindow>,
    pub control: mpsc::Sender<StreamCommand>,
    pub stats: Arc<Mutex<StreamStats>>,
}

/// Helper function to create and start a stream in the background
pub fn start_eeg_stream(config: StreamConfig) -> SsvepResult<StreamHandle> {
    let stream = RealTimeEegStream::new(config)?;
    let handle = StreamHandle {
        data: stream.subscribe(),
        control: stream.control_handle(),
        stats: stream.stats_handle(),
    };

    tokio::spawn(async move {
        if let Err(e) = stream.run().await {
            error!("EEG stream error: {}", e);
        }
    });

    Ok(handle)
}
