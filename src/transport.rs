//! Length-prefixed framing over any byte stream.
//!
//! Each frame is a `u32` little-endian payload length followed by one
//! encoded message.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatcher::ProxyDispatcher;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), TransportError> {
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::FrameTooLarge {
        size: payload.len(),
        limit: u32::MAX as usize,
    })?;
    writer.write_u32_le(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame. `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<Vec<u8>>, TransportError> {
    let len = match reader.read_u32_le().await {
        Ok(len) => len as usize,
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if len > max_frame_bytes {
        return Err(TransportError::FrameTooLarge {
            size: len,
            limit: max_frame_bytes,
        });
    }
    let mut payload = vec![0; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Serves one library connection until it closes.
///
/// Inbound frames are dispatched on their own tasks so a slow workflow
/// operation never holds up a heartbeat. Every reply and every proxy
/// request is written from `outbound`, which outlives the connection.
pub async fn serve<S>(
    stream: S,
    dispatcher: &ProxyDispatcher,
    outbound: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    max_frame_bytes: usize,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let inbound = dispatcher.clone();
    let mut read_loop = tokio::spawn(async move {
        let replies = inbound.outbound();
        while let Some(frame) = read_frame(&mut reader, max_frame_bytes).await? {
            let dispatcher = inbound.clone();
            let replies = replies.clone();
            tokio::spawn(async move {
                if let Some(reply) = dispatcher.dispatch(&frame).await {
                    if replies.send(reply).is_err() {
                        debug!("outbound queue closed, reply dropped");
                    }
                }
            });
        }
        Ok::<_, TransportError>(())
    });

    let result = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(err) = write_frame(&mut writer, &frame).await {
                        read_loop.abort();
                        break Err(err);
                    }
                }
                None => {
                    read_loop.abort();
                    break Ok(());
                }
            },
            finished = &mut read_loop => {
                break match finished {
                    Ok(result) => result,
                    Err(join) if join.is_cancelled() => Ok(()),
                    Err(join) => Err(io::Error::other(join).into()),
                };
            }
        }
    };

    match &result {
        Ok(()) => info!("library connection closed"),
        Err(err) => warn!(%err, "library connection dropped"),
    }
    result
}
