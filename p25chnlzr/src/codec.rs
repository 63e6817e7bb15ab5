//! Length-prefixed framing of channelizer messages.
//!
//! ```text
//! u32 length (tag + payload) | u8 tag | payload
//! ```
//!
//! Every integer and float is big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Frames above this size are rejected instead of buffered.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const TAG_CAPABILITIES: u8 = 1;
const TAG_CHANNEL_REQUEST: u8 = 2;
const TAG_CHANNEL_STATE: u8 = 3;
const TAG_SAMPLES: u8 = 4;
const TAG_ERROR: u8 = 5;
const TAG_HEARTBEAT: u8 = 6;

const CAPABILITIES_LEN: usize = 44;
const CHANNEL_REQUEST_LEN: usize = 60;
const CHANNEL_STATE_LEN: usize = 16;
const ERROR_LEN: usize = 4;
const SAMPLE_PAIR_LEN: usize = 8;

/// Error code sent by a host. Unknown values are carried through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const UNKNOWN: ErrorCode = ErrorCode(0);
    pub const INCAPABLE: ErrorCode = ErrorCode(1);
    pub const BANDWIDTH_UNAVAILABLE: ErrorCode = ErrorCode(2);
    pub const PROCESSING_UNAVAILABLE: ErrorCode = ErrorCode(3);
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ErrorCode::UNKNOWN => write!(f, "UNKNOWN"),
            ErrorCode::INCAPABLE => write!(f, "INCAPABLE"),
            ErrorCode::BANDWIDTH_UNAVAILABLE => write!(f, "BANDWIDTH_UNAVAILABLE"),
            ErrorCode::PROCESSING_UNAVAILABLE => write!(f, "PROCESSING_UNAVAILABLE"),
            ErrorCode(other) => write!(f, "{}", other),
        }
    }
}

/// What a host can serve, sent once at the start of a connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capabilities {
    pub latitude: f64,
    pub longitude: f64,
    pub polarization: i32,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub max_channel_rate: u64,
}

/// The channel a client wants carved out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub max_location_diff: f64,
    pub polarization: i32,
    pub center_frequency: f64,
    pub bandwidth: f64,
    pub sample_rate: u64,
    pub max_rate_diff: u64,
}

/// Current tuning of a leased channel. The host may push a new one at any time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelState {
    pub sample_rate: u64,
    pub center_frequency: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Capabilities(Capabilities),
    ChannelRequest(ChannelRequest),
    ChannelState(ChannelState),
    /// Interleaved I/Q `f32` pairs.
    Samples(Bytes),
    Error(ErrorCode),
    Heartbeat,
}

/// Message type without its payload, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Capabilities,
    ChannelRequest,
    ChannelState,
    Samples,
    Error,
    Heartbeat,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Capabilities => "CAPABILITIES",
            MessageKind::ChannelRequest => "CHANNEL_REQUEST",
            MessageKind::ChannelState => "CHANNEL_STATE",
            MessageKind::Samples => "SAMPLES",
            MessageKind::Error => "ERROR",
            MessageKind::Heartbeat => "HEARTBEAT",
        };
        f.write_str(name)
    }
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Capabilities(_) => MessageKind::Capabilities,
            Message::ChannelRequest(_) => MessageKind::ChannelRequest,
            Message::ChannelState(_) => MessageKind::ChannelState,
            Message::Samples(_) => MessageKind::Samples,
            Message::Error(_) => MessageKind::Error,
            Message::Heartbeat => MessageKind::Heartbeat,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Message::Capabilities(_) => TAG_CAPABILITIES,
            Message::ChannelRequest(_) => TAG_CHANNEL_REQUEST,
            Message::ChannelState(_) => TAG_CHANNEL_STATE,
            Message::Samples(_) => TAG_SAMPLES,
            Message::Error(_) => TAG_ERROR,
            Message::Heartbeat => TAG_HEARTBEAT,
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            Message::Capabilities(_) => CAPABILITIES_LEN,
            Message::ChannelRequest(_) => CHANNEL_REQUEST_LEN,
            Message::ChannelState(_) => CHANNEL_STATE_LEN,
            Message::Samples(payload) => payload.len(),
            Message::Error(_) => ERROR_LEN,
            Message::Heartbeat => 0,
        }
    }

    fn decode_body(tag: u8, mut body: Bytes) -> Result<Message, CodecError> {
        let require = |kind: MessageKind, len: usize, body: &Bytes| {
            if body.len() < len {
                Err(CodecError::Truncated {
                    kind,
                    expected: len,
                    actual: body.len(),
                })
            } else {
                Ok(())
            }
        };

        match tag {
            TAG_CAPABILITIES => {
                require(MessageKind::Capabilities, CAPABILITIES_LEN, &body)?;
                Ok(Message::Capabilities(Capabilities {
                    latitude: body.get_f64(),
                    longitude: body.get_f64(),
                    polarization: body.get_i32(),
                    min_frequency: body.get_f64(),
                    max_frequency: body.get_f64(),
                    max_channel_rate: body.get_u64(),
                }))
            }
            TAG_CHANNEL_REQUEST => {
                require(MessageKind::ChannelRequest, CHANNEL_REQUEST_LEN, &body)?;
                Ok(Message::ChannelRequest(ChannelRequest {
                    latitude: body.get_f64(),
                    longitude: body.get_f64(),
                    max_location_diff: body.get_f64(),
                    polarization: body.get_i32(),
                    center_frequency: body.get_f64(),
                    bandwidth: body.get_f64(),
                    sample_rate: body.get_u64(),
                    max_rate_diff: body.get_u64(),
                }))
            }
            TAG_CHANNEL_STATE => {
                require(MessageKind::ChannelState, CHANNEL_STATE_LEN, &body)?;
                Ok(Message::ChannelState(ChannelState {
                    sample_rate: body.get_u64(),
                    center_frequency: body.get_f64(),
                }))
            }
            TAG_SAMPLES => {
                if body.len() % SAMPLE_PAIR_LEN != 0 {
                    return Err(CodecError::OddSamples(body.len()));
                }
                Ok(Message::Samples(body))
            }
            TAG_ERROR => {
                require(MessageKind::Error, ERROR_LEN, &body)?;
                Ok(Message::Error(ErrorCode(body.get_i32())))
            }
            TAG_HEARTBEAT => Ok(Message::Heartbeat),
            other => Err(CodecError::UnknownTag(other)),
        }
    }

    fn encode_body(&self, dst: &mut BytesMut) {
        match self {
            Message::Capabilities(c) => {
                dst.put_f64(c.latitude);
                dst.put_f64(c.longitude);
                dst.put_i32(c.polarization);
                dst.put_f64(c.min_frequency);
                dst.put_f64(c.max_frequency);
                dst.put_u64(c.max_channel_rate);
            }
            Message::ChannelRequest(r) => {
                dst.put_f64(r.latitude);
                dst.put_f64(r.longitude);
                dst.put_f64(r.max_location_diff);
                dst.put_i32(r.polarization);
                dst.put_f64(r.center_frequency);
                dst.put_f64(r.bandwidth);
                dst.put_u64(r.sample_rate);
                dst.put_u64(r.max_rate_diff);
            }
            Message::ChannelState(s) => {
                dst.put_u64(s.sample_rate);
                dst.put_f64(s.center_frequency);
            }
            Message::Samples(payload) => dst.put_slice(payload),
            Message::Error(code) => dst.put_i32(code.0),
            Message::Heartbeat => {}
        }
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} bytes limit")]
    FrameTooLarge(usize),
    #[error("empty frame")]
    EmptyFrame,
    #[error("unknown message tag {0}")]
    UnknownTag(u8),
    #[error("{kind} payload too short: expected {expected} bytes, got {actual}")]
    Truncated {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },
    #[error("samples payload of {0} bytes is not made of I/Q pairs")]
    OddSamples(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// [`Decoder`]/[`Encoder`] pair for [`Message`], meant for `Framed`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChnlzrCodec;

impl Decoder for ChnlzrCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        if src.len() < 4 {
            return Ok(None);
        }

        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len == 0 {
            return Err(CodecError::EmptyFrame);
        }
        if len > MAX_FRAME_LEN {
            return Err(CodecError::FrameTooLarge(len));
        }
        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let mut frame = src.split_to(len);
        let tag = frame.get_u8();
        Message::decode_body(tag, frame.freeze()).map(Some)
    }
}

impl Encoder<Message> for ChnlzrCodec {
    type Error = CodecError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        let len = 1 + message.payload_len();
        if len > MAX_FRAME_LEN {
            return Err(CodecError::FrameTooLarge(len));
        }
        dst.reserve(4 + len);
        dst.put_u32(len as u32);
        dst.put_u8(message.tag());
        message.encode_body(dst);
        Ok(())
    }
}
