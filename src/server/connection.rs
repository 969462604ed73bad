//! Per-connection worker
//!
//! Each accepted connection is read once, answered with the fixed success
//! page and closed. Only then is the payload framed, decoded and handed to
//! the flush coordinator. Failures never reach the client.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::{ErrorKind, IngestResult};
use crate::flush::FlushCoordinator;

use super::framing;

const READ_CHUNK: usize = 4096;

/// Shared state handed to every connection worker
#[derive(Clone)]
pub struct ConnectionContext {
    pub codec: Codec,
    pub coordinator: Arc<FlushCoordinator>,
    pub read_timeout: Duration,
    pub max_request_bytes: usize,
}

/// Serve one connection to completion
pub fn handle_connection(mut stream: TcpStream, ctx: &ConnectionContext) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let request = match read_request(&mut stream, ctx.read_timeout, ctx.max_request_bytes) {
        Ok(request) => request,
        Err(e) => {
            debug!(peer = %peer, error = %e, "Read failed, treating request as empty");
            Vec::new()
        }
    };

    if let Err(e) = respond(&mut stream) {
        debug!(peer = %peer, error = %e, "Failed to send response");
    }
    drop(stream);

    if request.is_empty() {
        debug!(peer = %peer, "Empty request");
        return;
    }

    match ingest_request(&request, ctx.codec, &ctx.coordinator) {
        Ok(0) => debug!(peer = %peer, "Request carried no events"),
        Ok(events) => debug!(peer = %peer, events, "Accepted events"),
        Err(e) if e.kind() == ErrorKind::MalformedRequest => {
            debug!(peer = %peer, error = %e, "Discarded malformed request");
        }
        Err(e) => warn!(peer = %peer, error = %e, "Discarded request"),
    }
}

/// Frame, decode and buffer a raw request
///
/// Returns the number of events handed to the coordinator. Malformed
/// framing and decode failures leave the buffer untouched. Flush failures
/// triggered by the append are logged by the coordinator and do not fail
/// the request.
pub fn ingest_request(
    request: &[u8],
    codec: Codec,
    coordinator: &FlushCoordinator,
) -> IngestResult<usize> {
    let body = framing::extract_post_body(request)?;
    let events = codec.decode(body)?;
    let count = events.len();

    if count == 0 {
        return Ok(0);
    }

    if let Err(e) = coordinator.append(events) {
        debug!(error = %e, "Flush triggered by request failed");
    }
    Ok(count)
}

/// Read until EOF, timeout, a complete request, or the size cap
fn read_request(stream: &mut TcpStream, timeout: Duration, max_bytes: usize) -> io::Result<Vec<u8>> {
    stream.set_read_timeout(Some(timeout))?;

    let mut request = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    while request.len() < max_bytes {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                request.extend_from_slice(&chunk[..n]);
                if framing::is_complete(&request) {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                break
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    request.truncate(max_bytes);
    Ok(request)
}

fn respond(stream: &mut TcpStream) -> io::Result<()> {
    stream.write_all(framing::success_response().as_bytes())?;
    stream.flush()?;
    stream.shutdown(Shutdown::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::EventStore;
    use crate::types::Event;
    use tempfile::TempDir;

    fn create_test_coordinator(codec: Codec, threshold: usize) -> (FlushCoordinator, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(EventStore::new(temp_dir.path().join("events"), codec));
        store.initialize_if_absent().unwrap();
        (FlushCoordinator::with_threshold(store, threshold), temp_dir)
    }

    fn post(body: &str) -> Vec<u8> {
        format!(
            "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    #[test]
    fn test_ingest_buffers_decoded_events() {
        let (coordinator, _temp_dir) = create_test_coordinator(Codec::Delimited, 4);

        let accepted = ingest_request(&post("1,a:b\n2"), Codec::Delimited, &coordinator).unwrap();

        assert_eq!(accepted, 2);
        assert_eq!(coordinator.buffered(), 2);
    }

    #[test]
    fn test_ingest_json_body() {
        let (coordinator, _temp_dir) = create_test_coordinator(Codec::Json, 1);
        let body = serde_json::to_string(&vec![Event::new(5).with_parameter("k", "v")]).unwrap();

        ingest_request(&post(&body), Codec::Json, &coordinator).unwrap();

        assert_eq!(
            coordinator.store().load().unwrap(),
            vec![Event::new(5).with_parameter("k", "v")]
        );
    }

    #[test]
    fn test_malformed_request_changes_nothing() {
        let (coordinator, _temp_dir) = create_test_coordinator(Codec::Delimited, 1);

        let err = ingest_request(b"GET / HTTP/1.1\r\n\r\n1", Codec::Delimited, &coordinator)
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedRequest);
        assert_eq!(coordinator.buffered(), 0);
        assert!(coordinator.store().load().unwrap().is_empty());
    }

    #[test]
    fn test_decode_failure_changes_nothing() {
        let (coordinator, _temp_dir) = create_test_coordinator(Codec::Delimited, 1);

        let err = ingest_request(&post("x,level"), Codec::Delimited, &coordinator).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
        assert_eq!(coordinator.buffered(), 0);
        assert!(coordinator.store().load().unwrap().is_empty());
    }

    #[test]
    fn test_empty_body_is_discarded() {
        let (coordinator, _temp_dir) = create_test_coordinator(Codec::Delimited, 1);

        assert_eq!(ingest_request(&post(""), Codec::Delimited, &coordinator).unwrap(), 0);
        assert_eq!(coordinator.stats().flushes, 0);
    }
}
