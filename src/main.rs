use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fieldmap::client::HttpGeoDataClient;
use fieldmap::config::FieldConfig;
use fieldmap::error::ErrorCode;
use fieldmap::geolocation::{NmeaPositionSource, PositionSource, UnavailablePositionSource};
use fieldmap::submission::CoordinateInput;
use fieldmap::{MapSession, SessionEvent};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match FieldConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let client = match HttpGeoDataClient::new(&config.api_base_url, config.http) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "backend client unavailable");
            return ExitCode::FAILURE;
        }
    };

    // A missing or unreadable receiver leaves the map usable without location.
    let source: Arc<dyn PositionSource> = match &config.gps_device {
        Some(path) => match NmeaPositionSource::open(path).await {
            Ok(source) => Arc::new(source),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "GPS device unavailable; location disabled");
                Arc::new(UnavailablePositionSource)
            }
        },
        None => Arc::new(UnavailablePositionSource),
    };

    let session = MapSession::new(Arc::new(client), source, &config);
    let mut events = session.subscribe();
    session.start();
    info!(backend = %config.api_base_url, "fieldmap running; type `lat,lng` to submit a point or `locate` to find yourself");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line.eq_ignore_ascii_case("locate") {
                        if let Err(e) = session.locate() {
                            warn!(error = %e, "locate refused");
                        }
                        continue;
                    }
                    let input = CoordinateInput::from_line(line).unwrap_or_else(|| CoordinateInput::new(line, ""));
                    if let Err(e) = session.submit_coordinates(input.lat, input.lng) {
                        warn!(error = %e, "submission refused");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => log_event(&session, &event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event log fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    session.dispose();
    ExitCode::SUCCESS
}

fn log_event(session: &MapSession, event: &SessionEvent) {
    match event {
        SessionEvent::LayersSynced { zones, points } => {
            let markers = session.snapshot().markers.len();
            info!(zones, points, markers, "layers synced");
        }
        SessionEvent::SyncFailed(e) => warn!(code = e.error_code(), "sync cycle skipped"),
        SessionEvent::Located(position) => {
            info!(lat = position.position.lat, lng = position.position.lng, accuracy_m = ?position.accuracy_m, "located");
        }
        SessionEvent::SelfMoved(position) => {
            info!(lat = position.position.lat, lng = position.position.lng, "moved");
        }
        SessionEvent::LocationError(e) => warn!(code = e.error_code(), "{}", e.user_message()),
        SessionEvent::PointClassified { id, position, classification } => {
            let info = session.reserve_info();
            info!(
                submission = %id,
                %position,
                inside = classification.is_inside,
                reserve = info.as_ref().map_or("-", |i| i.name.as_str()),
                level = info.as_ref().map_or("-", |i| i.protection_level.as_str()),
                "point classified"
            );
        }
        SessionEvent::SubmissionFailed { id, code, message } => {
            warn!(submission = %id, code, "{message}");
        }
    }
}
