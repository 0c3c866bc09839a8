use crate::client::SimulatedClient;
use crate::config::RunConfig;
use crate::connector::Connector;
use crate::stats::Metrics;
use crate::timer::PeriodicTask;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant};

pub const RAMP_TICK: Duration = Duration::from_secs(1);

/// Number of clients to open on the next tick.
pub fn wave_size(created: usize, total: usize, per_tick: usize) -> usize {
    per_tick.min(total.saturating_sub(created))
}

/// Opens the swarm a wave at a time and owns every client it creates.
pub struct RampScheduler<C: Connector> {
    config: Arc<RunConfig>,
    connector: Arc<C>,
    metrics: Arc<Metrics>,
    clients: Arc<Mutex<Vec<SimulatedClient<C::Handle>>>>,
}

impl<C: Connector> RampScheduler<C> {
    pub fn new(config: Arc<RunConfig>, connector: Arc<C>, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            connector,
            metrics,
            clients: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Spawns the ramp timer. The task finishes, and stops ticking, on the
    /// tick that creates the last client; its output is the size of each wave.
    pub fn start(&self) -> PeriodicTask<Vec<usize>> {
        let config = self.config.clone();
        let connector = self.connector.clone();
        let metrics = self.metrics.clone();
        let clients = self.clients.clone();

        PeriodicTask::new(tokio::spawn(async move {
            let total = config.clients;
            let mut waves = Vec::new();
            let mut created = 0;
            let mut ticker = interval_at(Instant::now() + RAMP_TICK, RAMP_TICK);

            while created < total {
                ticker.tick().await;
                let wave = wave_size(created, total, config.ramp_per_sec);
                if wave == 0 {
                    break;
                }

                let mut arena = clients.lock().await;
                arena.reserve(wave);
                for index in created..created + wave {
                    arena.push(SimulatedClient::spawn(
                        index,
                        &config,
                        connector.as_ref(),
                        metrics.clone(),
                    ));
                }
                drop(arena);

                created += wave;
                waves.push(wave);
                debug!("ramp wave of {} ({}/{})", wave, created, total);
            }

            info!("📈 Ramp complete: {} clients in {} waves", created, waves.len());
            waves
        }))
    }

    pub async fn created(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Tears down every client created so far. Returns how many were closed
    /// by this call.
    pub async fn shutdown_all(&self) -> usize {
        let mut arena = self.clients.lock().await;
        let mut closed = 0;
        for client in arena.iter_mut() {
            if client.shutdown().await {
                closed += 1;
            }
        }
        closed
    }
}
