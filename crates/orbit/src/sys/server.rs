use crate::events::AppEvent;
use crate::input::RawEvent;
use crate::menu::{ConfigId, ProviderId};
use async_channel::Sender;
use orbitctl::ipc::{Request, SOCKET_PATH};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;

/// Maps one control-socket line to the event it asks for.
pub fn event_for_line(line: &str) -> Option<AppEvent> {
    let request = match line.parse::<Request>() {
        Ok(request) => request,
        Err(e) => {
            log::warn!("Ignoring request '{}': {}", line.trim(), e);
            return None;
        }
    };
    Some(match request {
        Request::Show { expand } => AppEvent::Show {
            expand: expand.map(ProviderId::new),
        },
        Request::ShowConfig(id) => AppEvent::ShowConfig(ConfigId::new(id)),
        Request::Hide => AppEvent::Hide,
        Request::Execute => AppEvent::ExecuteSelected,
        Request::DragFinished { success } => AppEvent::DragFinished { success },
        Request::Input(raw) => match raw.parse::<RawEvent>() {
            Ok(event) => AppEvent::Input(event),
            Err(e) => {
                log::warn!("Ignoring input '{}': {}", raw, e);
                return None;
            }
        },
    })
}

pub async fn run_server(tx: Sender<AppEvent>) {
    // Cleanup old socket if it exists
    if fs_err::metadata(SOCKET_PATH).is_ok() {
        let _ = fs_err::remove_file(SOCKET_PATH);
    }

    let listener = match UnixListener::bind(SOCKET_PATH) {
        Ok(l) => l,
        Err(e) => {
            log::error!("Failed to bind unix socket: {}", e);
            return;
        }
    };
    log::info!("Listening on {}", SOCKET_PATH);

    loop {
        match listener.accept().await {
            Ok((mut stream, _)) => {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let reader = BufReader::new(&mut stream);
                    let mut lines = reader.lines();

                    while let Ok(Some(line)) = lines.next_line().await {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if let Some(event) = event_for_line(&line)
                            && tx.send(event).await.is_err()
                        {
                            break;
                        }
                    }
                });
            }
            Err(e) => {
                log::error!("Failed to accept connection: {}", e);
            }
        }
    }
}
