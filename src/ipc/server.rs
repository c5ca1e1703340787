use std::rc::Rc;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{UnixListener, UnixStream};

use super::{IpcError, IpcRequest, IpcResponse};

pub fn drop_socket() {
    let _ = std::fs::remove_file(super::get_socket_path());
}

/// Accepts clients on the IPC socket, answering each request with `handler`.
///
/// Runs on the local task set so handlers can touch the popup store directly.
pub fn start<F>(handler: F) -> std::io::Result<()>
where
    F: Fn(IpcRequest) -> IpcResponse + 'static,
{
    let socket_path = super::get_socket_path();

    // Ensure the socket is removed before starting
    drop_socket();

    let listener = UnixListener::bind(&socket_path)?;
    info!(path = %socket_path, "IPC server listening");

    serve(listener, handler);
    Ok(())
}

pub fn serve<F>(listener: UnixListener, handler: F)
where
    F: Fn(IpcRequest) -> IpcResponse + 'static,
{
    let handler = Rc::new(handler);

    tokio::task::spawn_local(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let handler = handler.clone();
                    tokio::task::spawn_local(async move {
                        if let Err(err) = handle_client(stream, handler.as_ref()).await {
                            warn!(%err, "Failed to handle IPC client");
                        }
                    });
                },

                Err(err) => error!(%err, "Error accepting IPC connection"),
            }
        }
    });
}

async fn handle_client<F>(mut stream: UnixStream, handler: &F) -> Result<(), IpcError>
where
    F: Fn(IpcRequest) -> IpcResponse + ?Sized,
{
    let mut message = Vec::new();
    stream.read_to_end(&mut message).await?;

    let response = match serde_json::from_slice::<IpcRequest>(&message) {
        Ok(request) => {
            debug!(?request, "Received IPC request");
            handler(request)
        },

        Err(err) => IpcResponse::error(format!("invalid request: {}", err)),
    };

    stream.write_all(&serde_json::to_vec(&response)?).await?;
    stream.shutdown().await?;

    Ok(())
}
