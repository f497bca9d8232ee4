use std::convert::Infallible;
use std::error::Error as StdError;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::body::Body;

use crate::error::Error;
use crate::util::error_chain;

type BoxBodyError = Box<dyn StdError + Send + Sync>;
pub(crate) type ReqBody = BoxBody<Bytes, BoxBodyError>;

fn map_infallible_to_box_error(never: Infallible) -> BoxBodyError {
    match never {}
}

pub(crate) fn empty_req_body() -> ReqBody {
    Empty::<Bytes>::new()
        .map_err(map_infallible_to_box_error)
        .boxed()
}

/// Bounded response buffer.
///
/// `size` counts every byte offered, including bytes dropped past the cap, so
/// metrics stay exact while memory stays bounded.
#[derive(Debug)]
pub struct CappedSink {
    cap: u64,
    no_discard: bool,
    size: u64,
    buffer: Vec<u8>,
}

impl CappedSink {
    pub fn new(cap: u64, no_discard: bool) -> Self {
        Self {
            cap,
            no_discard,
            size: 0,
            buffer: Vec::new(),
        }
    }

    /// Accepts one body chunk. With `no_discard` set, crossing the cap is an
    /// error; otherwise only the part of the chunk that still fits is kept.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.size = self.size.saturating_add(chunk.len() as u64);
        if self.size > self.cap && self.no_discard {
            return Err(Error::BodyBufferFull {
                limit_bytes: self.cap,
            });
        }
        self.retain(chunk);
        Ok(())
    }

    /// Like [`CappedSink::write`] but never fails; used for the trailing
    /// status line and header text once the body has been accepted.
    pub fn absorb(&mut self, bytes: &[u8]) {
        self.size = self.size.saturating_add(bytes.len() as u64);
        self.retain(bytes);
    }

    fn retain(&mut self, chunk: &[u8]) {
        let room = self.cap.saturating_sub(self.buffer.len() as u64);
        let take = usize::try_from(room)
            .unwrap_or(usize::MAX)
            .min(chunk.len());
        self.buffer.extend_from_slice(&chunk[..take]);
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn cap(&self) -> u64 {
        self.cap
    }
}

pub(crate) async fn read_body_capped<B>(mut body: B, sink: &mut CappedSink) -> Result<(), Error>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxBodyError>,
{
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|error| {
            let source: BoxBodyError = error.into();
            Error::ReadBody {
                detail: error_chain(&*source),
                source,
            }
        })?;
        if let Some(data) = frame.data_ref() {
            sink.write(data)?;
        }
    }
    Ok(())
}
