use std::io::ErrorKind;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec::{decode_envelope, decode_frame, FrameConfig};
use crate::envelope::Envelope;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads complete envelopes from any `AsyncRead` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: AsyncRead + Unpin> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame body.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub async fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(body) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(body);
            }

            let read = match self.inner.read_buf(&mut self.buf).await {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// Read and decode the next envelope.
    ///
    /// A body that fails to decode is consumed from the stream before the
    /// error is returned, so the next call starts on a frame boundary.
    pub async fn read_envelope(&mut self) -> Result<Envelope> {
        let body = self.read_frame().await?;
        decode_envelope(&body)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use bytes::BufMut;
    use tokio::io::ReadBuf;

    use super::*;
    use crate::codec::encode_frame;

    fn wire(envelopes: &[Envelope]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for env in envelopes {
            encode_frame(env, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[tokio::test]
    async fn read_single_envelope() {
        let env = Envelope::text("receiver-0", "sender-0", "ns", r#"{"type":"PING"}"#);
        let mut reader = FrameReader::new(Cursor::new(wire(&[env.clone()])));

        assert_eq!(reader.read_envelope().await.unwrap(), env);
    }

    #[tokio::test]
    async fn read_multiple_envelopes() {
        let envs: Vec<_> = (0..3)
            .map(|i| Envelope::text("s", "d", "n", format!("msg-{i}")))
            .collect();
        let mut reader = FrameReader::new(Cursor::new(wire(&envs)));

        for expected in &envs {
            assert_eq!(&reader.read_envelope().await.unwrap(), expected);
        }
        assert!(matches!(
            reader.read_envelope().await,
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn partial_read_handling() {
        let env = Envelope::text("s", "d", "n", "slow");
        let byte_reader = ByteByByteReader {
            bytes: wire(&[env.clone()]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_envelope().await.unwrap(), env);
    }

    #[tokio::test]
    async fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_u32(16);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn empty_packet_in_stream() {
        let mut reader = FrameReader::new(Cursor::new(vec![0u8, 0, 0, 0]));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::EmptyFrame));
    }

    #[tokio::test]
    async fn oversized_frame_in_stream() {
        let mut bytes = BytesMut::new();
        bytes.put_u32(1024);

        let cfg = FrameConfig {
            max_payload_size: 16,
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes.to_vec()), cfg);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn undecodable_body_is_skipped_cleanly() {
        let good = Envelope::text("s", "d", "n", "after");
        let mut bytes = BytesMut::new();
        bytes.put_u32(2);
        bytes.put_slice(&[0xff, 0xff]);
        encode_frame(&good, &mut bytes).unwrap();

        let mut reader = FrameReader::new(Cursor::new(bytes.to_vec()));
        let err = reader.read_envelope().await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(reader.read_envelope().await.unwrap(), good);
    }

    #[tokio::test]
    async fn roundtrip_over_duplex() {
        let (left, right) = tokio::io::duplex(64);
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let env = Envelope::text("sender-0", "receiver-0", "ns", r#"{"type":"CONNECT"}"#);
        let expected = env.clone();
        let send = tokio::spawn(async move { writer.send(&env).await });

        assert_eq!(reader.read_envelope().await.unwrap(), expected);
        send.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn accessors_and_into_inner() {
        let reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(
            reader.config().max_payload_size,
            crate::codec::DEFAULT_MAX_PAYLOAD
        );
        let _ = reader.get_ref();
        let _inner = reader.into_inner();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl AsyncRead for ByteByByteReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.pos < self.bytes.len() && buf.remaining() > 0 {
                let byte = self.bytes[self.pos];
                buf.put_slice(&[byte]);
                self.pos += 1;
            }
            Poll::Ready(Ok(()))
        }
    }
}
