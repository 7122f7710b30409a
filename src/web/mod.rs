mod assets;

use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc},
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info};

use crate::{
    config::SimConfig,
    engine::Simulation,
    flock::Bounds,
    io::{InputSample, InputSource, Key, Renderer, Sprite},
    vector::Vec2,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UiFrame {
    pub round: u64,
    pub sprites: Vec<Sprite>,
    pub bounds: Bounds,
    pub completed: bool,
}

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub total_rounds: Option<u64>,
    pub frame: Option<UiFrame>,
    pub completed: bool,
}

/// Publishes every frame to SSE subscribers and keeps the latest for polling.
pub struct BroadcastRenderer {
    sender: broadcast::Sender<String>,
    latest: Arc<Mutex<Option<UiFrame>>>,
    bounds: Bounds,
}

impl BroadcastRenderer {
    pub fn new(
        sender: broadcast::Sender<String>,
        latest: Arc<Mutex<Option<UiFrame>>>,
        bounds: Bounds,
    ) -> Self {
        Self {
            sender,
            latest,
            bounds,
        }
    }

    fn publish(&self, frame: UiFrame) -> Result<()> {
        let payload = serde_json::to_string(&frame).context("Failed to encode frame")?;
        *self.latest.lock().expect("latest frame lock poisoned") = Some(frame);
        // No subscribers is not an error.
        let _ = self.sender.send(payload);
        Ok(())
    }

    /// Re-send the last frame marked as completed.
    pub fn complete(&self) -> Result<()> {
        let last = self
            .latest
            .lock()
            .expect("latest frame lock poisoned")
            .clone();
        match last {
            Some(mut frame) => {
                frame.completed = true;
                self.publish(frame)
            }
            None => Ok(()),
        }
    }
}

impl Renderer for BroadcastRenderer {
    fn draw(&mut self, round: u64, sprites: &[Sprite]) -> Result<()> {
        self.publish(UiFrame {
            round,
            sprites: sprites.to_vec(),
            bounds: self.bounds,
            completed: false,
        })
    }
}

/// Input posted over HTTP. Everything queued since the last round is merged,
/// later posts winning.
pub struct QueuedInput {
    receiver: mpsc::UnboundedReceiver<InputSample>,
}

impl QueuedInput {
    pub fn new(receiver: mpsc::UnboundedReceiver<InputSample>) -> Self {
        Self { receiver }
    }
}

impl InputSource for QueuedInput {
    fn sample(&mut self, _round: u64) -> InputSample {
        let mut sample = InputSample::default();
        while let Ok(next) = self.receiver.try_recv() {
            sample = sample.merge(next);
        }
        sample
    }
}

/// Body of `POST /api/input`. Keys arrive as single characters.
#[derive(Debug, Default, Deserialize)]
pub struct InputRequest {
    #[serde(default)]
    pub click: Option<Vec2>,
    #[serde(default)]
    pub cursor: Option<Vec2>,
    #[serde(default)]
    pub key: Option<char>,
}

impl From<InputRequest> for InputSample {
    fn from(request: InputRequest) -> Self {
        InputSample {
            click: request.click,
            cursor: request.cursor,
            key: request.key.map(Key::from_char),
        }
    }
}

#[derive(Clone)]
struct AppState {
    broadcaster: broadcast::Sender<String>,
    latest_frame: Arc<Mutex<Option<UiFrame>>>,
    input: mpsc::UnboundedSender<InputSample>,
    total_rounds: Option<u64>,
    scenario_name: String,
    simulation_done: Arc<AtomicBool>,
}

pub struct WebServerConfig {
    pub config: SimConfig,
    pub rounds: Option<u64>,
    pub host: String,
    pub port: u16,
    pub frame_interval: Duration,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        config,
        rounds,
        host,
        port,
        frame_interval,
    } = config;

    let scenario_name = config.name.clone();
    let mut simulation = Simulation::new(&config)?;

    let (tx, _) = broadcast::channel::<String>(512);
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let latest_frame: Arc<Mutex<Option<UiFrame>>> = Arc::new(Mutex::new(None));
    let simulation_done = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));

    let mut renderer = BroadcastRenderer::new(tx.clone(), latest_frame.clone(), config.bounds);
    let mut input = QueuedInput::new(input_rx);
    let done_for_sim = simulation_done.clone();
    let stop_for_sim = stop.clone();

    let sim_handle = tokio::task::spawn_blocking(move || -> Result<u64> {
        loop {
            if stop_for_sim.load(Ordering::SeqCst) {
                break;
            }
            if rounds.is_some_and(|limit| simulation.round() >= limit) {
                break;
            }
            let summary = simulation.step(&mut input, &mut renderer)?;
            if summary.quit_requested {
                break;
            }
            std::thread::sleep(frame_interval);
        }
        renderer.finish()?;
        done_for_sim.store(true, Ordering::SeqCst);
        renderer.complete()?;
        Ok(simulation.round())
    });

    let state = Arc::new(AppState {
        broadcaster: tx,
        latest_frame,
        input: input_tx,
        total_rounds: rounds,
        scenario_name: scenario_name.clone(),
        simulation_done,
    });

    tokio::spawn(async move {
        match sim_handle.await {
            Ok(Ok(rounds)) => {
                info!(scenario = %scenario_name, rounds, "web simulation completed");
            }
            Ok(Err(err)) => {
                error!("web simulation error: {err:?}");
            }
            Err(err) => {
                error!("web simulation task failed: {err:?}");
            }
        }
    });

    let router = Router::new()
        .route("/", get(index))
        .route("/styles.css", get(styles))
        .route("/app.js", get(script))
        .route("/api/state", get(latest_state))
        .route("/api/events", get(stream_events))
        .route("/api/input", post(submit_input))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;

    info!("flock viewer live at http://{}:{} (Ctrl+C to stop)", host, port);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(stop))
        .await?;

    Ok(())
}

async fn shutdown_signal(stop: Arc<AtomicBool>) {
    let _ = tokio::signal::ctrl_c().await;
    stop.store(true, Ordering::SeqCst);
    info!("shutting down web UI");
}

async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}

async fn styles() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        assets::STYLES_CSS,
    )
}

async fn script() -> Response {
    (
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        assets::APP_JS,
    )
        .into_response()
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    let frame = state
        .latest_frame
        .lock()
        .expect("latest frame lock poisoned")
        .clone();
    Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        total_rounds: state.total_rounds,
        frame,
        completed: state.simulation_done.load(Ordering::SeqCst),
    })
}

async fn submit_input(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InputRequest>,
) -> StatusCode {
    match state.input.send(request.into()) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::GONE,
    }
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
