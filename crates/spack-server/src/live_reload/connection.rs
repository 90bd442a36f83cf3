//! Message loop of one upgraded live-reload socket.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::frame::{self, Frame, OP_PING};
use super::sessions::{SessionId, SessionRegistry};

const NOT_SUPPORTED: &str = "Not Support.";
const NOT_FOUND: &str = "404";

/// What the loop does after handling a frame.
enum Flow {
    Continue,
    Close,
}

/// Serve one socket until the client closes it or the stream ends.
pub(crate) async fn serve_socket<S>(mut stream: S, sessions: Arc<SessionRegistry>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (outbox, mut pushes) = mpsc::unbounded_channel();
    let id = sessions.connect(outbox);
    tracing::info!(session = id, open = sessions.len(), "Live reload socket connected");

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        tokio::select! {
            read = stream.read(&mut chunk) => {
                let n = match read {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        tracing::debug!(session = id, error = %e, "Socket read failed");
                        break;
                    }
                };
                buf.extend_from_slice(&chunk[..n]);

                let (replies, flow) = drain_frames(&mut buf, id, &sessions);
                if write_all(&mut stream, &replies).await.is_err() {
                    break;
                }
                if matches!(flow, Flow::Close) {
                    tracing::info!(session = id, "Live reload socket closed by client");
                    break;
                }
            }
            Some(push) = pushes.recv() => {
                if write_all(&mut stream, &[push]).await.is_err() {
                    break;
                }
            }
        }
    }

    sessions.disconnect(id);
    let _ = stream.shutdown().await;
}

/// Handle every complete frame in `buf`, returning the reply frames.
fn drain_frames(
    buf: &mut Vec<u8>,
    id: SessionId,
    sessions: &SessionRegistry,
) -> (Vec<Vec<u8>>, Flow) {
    let mut replies = Vec::new();

    loop {
        let (frame, used) = match frame::decode(buf) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return (replies, Flow::Continue),
            Err(e) => {
                tracing::debug!(session = id, error = %e, "Dropping undecodable frame");
                buf.clear();
                replies.extend(frame::text(NOT_SUPPORTED).ok());
                return (replies, Flow::Continue);
            }
        };
        buf.drain(..used);

        match handle_frame(frame, id, sessions) {
            Some(Reply::Frame(reply)) => replies.push(reply),
            Some(Reply::Close) => {
                tracing::debug!(session = id, entry = ?sessions.watched(id), "Dropping watch");
                sessions.disconnect(id);
                return (replies, Flow::Close);
            }
            None => {}
        }
    }
}

enum Reply {
    Frame(Vec<u8>),
    Close,
}

fn handle_frame(frame: Frame, id: SessionId, sessions: &SessionRegistry) -> Option<Reply> {
    let reply = match frame {
        Frame::Close => return Some(Reply::Close),
        Frame::Unsupported(opcode) => {
            tracing::debug!(session = id, opcode, "Unsupported opcode");
            frame::text(NOT_SUPPORTED)
        }
        Frame::Ping(payload) => {
            tracing::debug!(session = id, "Ping");
            frame::encode(&payload, OP_PING)
        }
        Frame::Text(message) => match message.split_once(':') {
            Some(("watch", entry)) => {
                sessions.watch(id, entry);
                tracing::info!(session = id, entry, "Client watching entry");
                frame::text(&format!("watch {entry}"))
            }
            _ => frame::text(NOT_FOUND),
        },
    };

    match reply {
        Ok(reply) => Some(Reply::Frame(reply)),
        Err(e) => {
            tracing::warn!(session = id, error = %e, "Reply does not fit in one frame");
            None
        }
    }
}

async fn write_all<S>(stream: &mut S, frames: &[Vec<u8>]) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    for frame in frames {
        stream.write_all(frame).await?;
    }
    stream.flush().await
}
