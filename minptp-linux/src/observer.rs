use std::{
    fs::Permissions,
    io,
    os::unix::fs::{FileTypeExt, PermissionsExt},
    path::Path,
    time::Instant,
};

use minptp::{observability::ClientStatus, Callback, Measurement, MeasurementKind};
use serde::Serialize;
use tokio::{io::AsyncWriteExt, net::UnixListener, sync::watch, task::JoinHandle};

use crate::config::ObservabilityConfig;

/// What a connection to the observation socket receives
#[derive(Debug, Serialize)]
pub struct ObservableState {
    pub version: &'static str,
    pub uptime_seconds: f64,
    pub status: ClientStatus,
}

/// Serve the latest client status on the observation socket, if configured
pub fn spawn(
    config: &ObservabilityConfig,
    status: watch::Receiver<ClientStatus>,
) -> JoinHandle<io::Result<()>> {
    let config = config.clone();
    tokio::spawn(async move {
        let result = observer(config, status).await;
        if let Err(ref e) = result {
            log::warn!("Abnormal termination of the state observer: {e}");
            log::warn!("The state observer will not be available");
        }
        result
    })
}

async fn observer(
    config: ObservabilityConfig,
    status: watch::Receiver<ClientStatus>,
) -> io::Result<()> {
    let start_time = Instant::now();

    let Some(path) = config.observation_path else {
        return Ok(());
    };

    let listener = bind_socket(&path, config.observation_permissions)?;
    log::info!("Serving client status on {}", path.display());

    loop {
        let (mut stream, _) = listener.accept().await?;

        let state = ObservableState {
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: start_time.elapsed().as_secs_f64(),
            status: *status.borrow(),
        };

        let bytes = serde_json::to_vec(&state)?;
        // readers may hang up before reading everything
        if let Err(error) = stream.write_all(&bytes).await {
            log::debug!("Could not write status to observer: {error}");
        }
    }
}

/// Bind a unix socket at `path` with `mode` as its permissions, replacing a
/// stale socket left behind by an earlier run
fn bind_socket(path: &Path, mode: u32) -> io::Result<UnixListener> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => std::fs::remove_file(path)?,
        Ok(_) => {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a socket", path.display()),
            ))
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(error),
    }

    let listener = UnixListener::bind(path).map_err(|error| {
        io::Error::new(
            error.kind(),
            format!("could not create socket at {}: {error}", path.display()),
        )
    })?;

    // the daemon usually runs as root, readers of the socket should not have to
    std::fs::set_permissions(path, Permissions::from_mode(mode))?;

    Ok(listener)
}

/// Logs every completed measurement
#[derive(Debug, Default)]
pub struct MeasurementLogger;

impl Callback for MeasurementLogger {
    fn ptp_ready(&self, measurement: &Measurement) {
        match measurement.kind {
            MeasurementKind::Sync => tracing::info!(
                sequence_id = measurement.reference.sequence_id(),
                offset_ns = measurement.offset_from_master().delta_nsec(),
                path_delay_ns = measurement.mean_path_delay().delta_nsec(),
                "sync measurement"
            ),
            MeasurementKind::PeerDelay => tracing::info!(
                sequence_id = measurement.reference.sequence_id(),
                link_delay_ns = measurement.mean_link_delay().delta_nsec(),
                "peer delay measurement"
            ),
        }
        tracing::debug!("{measurement}");
    }
}
