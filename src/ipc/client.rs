use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use super::{IpcError, IpcRequest, IpcResponse};

const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

pub fn get_stream() -> std::io::Result<UnixStream> {
    let stream = UnixStream::connect(super::get_socket_path())?;
    stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
    stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;

    Ok(stream)
}

/// Sends one request to the running instance and waits for its answer.
pub fn send_request(request: &IpcRequest) -> Result<IpcResponse, IpcError> {
    let mut stream = get_stream()?;
    let mut response = String::new();

    stream.write_all(&serde_json::to_vec(request)?)?;
    stream.flush()?;
    stream.shutdown(std::net::Shutdown::Write)?;
    stream.read_to_string(&mut response)?;

    Ok(serde_json::from_str(&response)?)
}
