// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Wire frames exchanged on a call connection
//!
//! Each frame is bincode encoded and prefixed with its length by
//! [`LengthDelimitedCodec`].

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{self, Decoder as _, Encoder as _, LengthDelimitedCodec};

use crate::common::{DEFAULT_MAX_FRAME_SIZE, Metadata};
use crate::error::RpcError;
use crate::status::Status;

#[derive(Debug, Clone, PartialEq, bincode::Encode, bincode::Decode)]
pub enum Frame {
    /// First frame sent by the caller
    Open { method: String, metadata: Metadata },
    /// One encoded request or response
    Message(Vec<u8>),
    /// The sender will not send more messages
    HalfClose,
    /// Terminal outcome, sent once by the callee
    Status { code: i32, message: Option<String> },
    /// The caller abandoned the call
    Cancel,
}

impl Frame {
    pub fn status(status: &Status) -> Self {
        Frame::Status {
            code: status.code().as_i32(),
            message: status.message().map(str::to_string),
        }
    }

    /// Turn a `Status` frame back into a [`Status`]
    pub fn into_status(self) -> Option<Status> {
        match self {
            Frame::Status { code, message } => Some(Status::from_wire(code, message)),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Open { .. } => "open",
            Frame::Message(_) => "message",
            Frame::HalfClose => "half-close",
            Frame::Status { .. } => "status",
            Frame::Cancel => "cancel",
        }
    }
}

/// Length-delimited bincode codec for [`Frame`]s
#[derive(Debug)]
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .max_frame_length(max_frame_size)
                .new_codec(),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl codec::Decoder for FrameCodec {
    type Item = Frame;
    type Error = RpcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, RpcError> {
        let Some(buf) = self.inner.decode(src)? else {
            return Ok(None);
        };
        let (frame, _len) = bincode::decode_from_slice(&buf, bincode::config::standard())?;
        Ok(Some(frame))
    }
}

impl codec::Encoder<Frame> for FrameCodec {
    type Error = RpcError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), RpcError> {
        let buf = bincode::encode_to_vec(frame, bincode::config::standard())?;
        self.inner.encode(Bytes::from(buf), dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Code;
    use tokio_util::codec::{Decoder, Encoder};

    #[test]
    fn test_frames_decode_in_order() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();

        let mut metadata = Metadata::new();
        metadata.insert("callwire-timeout-ms".to_string(), "250".to_string());
        let open = Frame::Open {
            method: "GreetService/Greet".to_string(),
            metadata,
        };

        codec.encode(open.clone(), &mut buf).unwrap();
        codec.encode(Frame::Message(vec![7, 8, 9]), &mut buf).unwrap();
        codec.encode(Frame::HalfClose, &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(open));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Message(vec![7, 8, 9]))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::HalfClose));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_partial_frame_waits_for_more_bytes() {
        let mut codec = FrameCodec::default();
        let mut full = BytesMut::new();
        codec.encode(Frame::Message(vec![1; 32]), &mut full).unwrap();

        let mut partial = full.split_to(10);
        assert_eq!(codec.decode(&mut partial).unwrap(), None);

        partial.unsplit(full);
        assert_eq!(
            codec.decode(&mut partial).unwrap(),
            Some(Frame::Message(vec![1; 32]))
        );
    }

    #[test]
    fn test_oversize_frame_is_rejected() {
        let mut codec = FrameCodec::new(16);
        let mut buf = BytesMut::new();
        let err = codec.encode(Frame::Message(vec![0; 64]), &mut buf).unwrap_err();
        assert!(matches!(err, RpcError::Io(_)));
    }

    #[test]
    fn test_status_frame_conversion() {
        let frame = Frame::status(&Status::not_found("Cannot find blog"));
        assert_eq!(frame.kind(), "status");

        let status = frame.into_status().unwrap();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), Some("Cannot find blog"));

        assert!(Frame::Cancel.into_status().is_none());
    }
}
