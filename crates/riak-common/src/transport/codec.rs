use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::error::{Result, RiakError};
use crate::protocol::messages::{ErrorResp, Message, MessageCode};

/// Size of the big-endian length field.
pub const LENGTH_SIZE: usize = 4;

/// Length field plus the message code byte.
pub const HEADER_SIZE: usize = LENGTH_SIZE + 1;

/// Largest length field accepted from a peer (100 MB).
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Encodes a message into one complete frame.
///
/// Wire format: `[4-byte length as u32 big-endian][1-byte code][payload]`,
/// where the length counts the code byte and the payload.
///
/// # Example
///
/// ```
/// use riak_common::transport::codec;
/// use riak_common::PingReq;
///
/// let frame = codec::encode(&PingReq).unwrap();
/// assert_eq!(frame, vec![0, 0, 0, 1, 1]);
/// ```
pub fn encode<T: Message>(message: &T) -> Result<Vec<u8>> {
    let payload =
        postcard::to_allocvec(message).map_err(|e| RiakError::Encoding(e.to_string()))?;
    encode_raw(T::CODE, &payload)
}

/// Frames an already serialized payload.
pub fn encode_raw(code: MessageCode, payload: &[u8]) -> Result<Vec<u8>> {
    let length = payload
        .len()
        .checked_add(1)
        .and_then(|len| u32::try_from(len).ok())
        .ok_or_else(|| {
            RiakError::Encoding(format!(
                "payload of {} bytes does not fit in a frame",
                payload.len()
            ))
        })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.push(code.as_u8());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Encodes `message` and writes the whole frame.
pub async fn write_frame<T, W>(writer: &mut W, message: &T) -> Result<()>
where
    T: Message,
    W: AsyncWrite + Unpin,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame and decodes it as `T`.
///
/// A frame carrying the error code is decoded as [`ErrorResp`] and surfaced
/// as [`RiakError::Server`] whatever `T` is. Codes outside the table fail
/// with [`RiakError::UnknownCode`]; a registered code other than `T::CODE`
/// fails with [`RiakError::TypeMismatch`].
pub async fn decode<T, R>(reader: &mut R) -> Result<T>
where
    T: Message,
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let code = header[LENGTH_SIZE];

    if length == 0 {
        return Err(RiakError::InvalidResponse(
            "frame length 0 does not cover the message code".to_string(),
        ));
    }
    if length as usize > MAX_FRAME_SIZE {
        return Err(RiakError::InvalidResponse(format!(
            "Message too large: {} bytes (max {} bytes)",
            length, MAX_FRAME_SIZE
        )));
    }

    if code == MessageCode::ErrorResp.as_u8() {
        let error: ErrorResp = read_payload(reader, length).await?;
        return Err(RiakError::Server {
            code: error.errcode,
            message: error.errmsg,
        });
    }

    let actual = MessageCode::try_from(code)?;
    if actual != T::CODE {
        return Err(RiakError::TypeMismatch {
            expected: T::CODE,
            actual,
        });
    }

    read_payload(reader, length).await
}

/// Deserializes a payload; an empty one is the type's default value.
pub fn decode_payload<T: Message>(payload: &[u8]) -> Result<T> {
    if payload.is_empty() {
        return Ok(T::default());
    }
    postcard::from_bytes(payload).map_err(|e| RiakError::Decoding(e.to_string()))
}

async fn read_payload<T, R>(reader: &mut R, length: u32) -> Result<T>
where
    T: Message,
    R: AsyncRead + Unpin,
{
    if length <= 1 {
        return Ok(T::default());
    }

    let mut payload = vec![0u8; length as usize - 1];
    reader.read_exact(&mut payload).await?;
    decode_payload(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{GetServerInfoResp, ListKeysResp, PingReq, PingResp};

    #[test]
    fn test_empty_payload_frame_layout() {
        let frame = encode(&PingResp).unwrap();
        assert_eq!(frame, vec![0, 0, 0, 1, MessageCode::PingResp.as_u8()]);
    }

    #[test]
    fn test_length_field_counts_code_byte() {
        let message = ListKeysResp {
            keys: vec!["alpha".into(), "beta".into()],
            done: false,
        };
        let payload = postcard::to_allocvec(&message).unwrap();
        let frame = encode(&message).unwrap();

        let length = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
        assert_eq!(length as usize, payload.len() + 1);
        assert_eq!(frame.len(), LENGTH_SIZE + length as usize);
        assert_eq!(frame[LENGTH_SIZE], MessageCode::ListKeysResp.as_u8());
        assert_eq!(&frame[HEADER_SIZE..], payload.as_slice());
    }

    #[test]
    fn test_encode_raw_uses_big_endian_length() {
        let payload = vec![7u8; 0x0102];
        let frame = encode_raw(MessageCode::GetResp, &payload).unwrap();
        assert_eq!(&frame[..LENGTH_SIZE], &[0x00, 0x00, 0x01, 0x03]);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let message = GetServerInfoResp {
            node: Some("riak@127.0.0.1".into()),
            server_version: Some("3.0.16".into()),
        };
        let frame = encode(&message).unwrap();

        let mut reader = frame.as_slice();
        let decoded: GetServerInfoResp = decode(&mut reader).await.unwrap();
        assert_eq!(decoded, message);
        assert!(reader.is_empty());
    }

    #[tokio::test]
    async fn test_decode_consumes_exactly_one_frame() {
        let first = encode(&ListKeysResp {
            keys: vec!["k1".into()],
            done: false,
        })
        .unwrap();
        let second = encode(&ListKeysResp {
            keys: vec![],
            done: true,
        })
        .unwrap();
        let mut stream = first.clone();
        stream.extend_from_slice(&second);

        let mut reader = stream.as_slice();
        let _: ListKeysResp = decode(&mut reader).await.unwrap();
        assert_eq!(reader, second.as_slice());

        let last: ListKeysResp = decode(&mut reader).await.unwrap();
        assert!(last.done);
        assert!(reader.is_empty());
    }

    #[tokio::test]
    async fn test_error_code_short_circuits_expected_type() {
        let frame = encode(&ErrorResp {
            errmsg: "no such bucket".into(),
            errcode: 17,
        })
        .unwrap();

        let mut reader = frame.as_slice();
        match decode::<PingResp, _>(&mut reader).await {
            Err(RiakError::Server { code, message }) => {
                assert_eq!(code, 17);
                assert_eq!(message, "no such bucket");
            }
            other => panic!("expected server error, got {other:?}"),
        }

        let mut reader = frame.as_slice();
        assert!(matches!(
            decode::<ListKeysResp, _>(&mut reader).await,
            Err(RiakError::Server { code: 17, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_error_frame_is_server_error() {
        let frame = [0u8, 0, 0, 1, 0];
        let mut reader = &frame[..];
        match decode::<PingResp, _>(&mut reader).await {
            Err(RiakError::Server { code, message }) => {
                assert_eq!(code, 0);
                assert!(message.is_empty());
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let frame = [0u8, 0, 0, 1, 42];
        let mut reader = &frame[..];
        assert!(matches!(
            decode::<PingResp, _>(&mut reader).await,
            Err(RiakError::UnknownCode(42))
        ));
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let frame = encode(&PingReq).unwrap();
        let mut reader = frame.as_slice();
        match decode::<PingResp, _>(&mut reader).await {
            Err(RiakError::TypeMismatch { expected, actual }) => {
                assert_eq!(expected, MessageCode::PingResp);
                assert_eq!(actual, MessageCode::PingReq);
            }
            other => panic!("expected type mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_payload_decodes_to_default() {
        let frame = [0u8, 0, 0, 1, MessageCode::GetServerInfoResp.as_u8()];
        let mut reader = &frame[..];
        let decoded: GetServerInfoResp = decode(&mut reader).await.unwrap();
        assert_eq!(decoded, GetServerInfoResp::default());
    }

    #[tokio::test]
    async fn test_truncated_payload_is_io_error() {
        let mut frame = encode(&ListKeysResp {
            keys: vec!["abcdef".into()],
            done: true,
        })
        .unwrap();
        frame.truncate(frame.len() - 2);

        let mut reader = frame.as_slice();
        match decode::<ListKeysResp, _>(&mut reader).await {
            Err(RiakError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_length_field_is_rejected() {
        let frame = [0u8, 0, 0, 0, MessageCode::PingResp.as_u8()];
        let mut reader = &frame[..];
        assert!(matches!(
            decode::<PingResp, _>(&mut reader).await,
            Err(RiakError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected_before_reading() {
        let length = (MAX_FRAME_SIZE as u32 + 1).to_be_bytes();
        let frame = [length[0], length[1], length[2], length[3], MessageCode::GetResp.as_u8()];
        let mut reader = &frame[..];
        assert!(matches!(
            decode::<PingResp, _>(&mut reader).await,
            Err(RiakError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_write_frame_writes_encoded_bytes() {
        let mut out: Vec<u8> = Vec::new();
        write_frame(&mut out, &PingReq).await.unwrap();
        assert_eq!(out, encode(&PingReq).unwrap());
    }
}
