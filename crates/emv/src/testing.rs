//! Card emulator shared by the unit and scanner integration tests

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use crossbeam_channel::{Receiver, Sender};
use emvscan_apdu_core::command::INS_READ_RECORD;
use emvscan_apdu_core::transport::TransportError;
use emvscan_apdu_core::{CardTransport, Protocol};

type ReadHook = Box<dyn FnMut(u8) + Send>;

/// Answers READ RECORD from a fixed list and everything else with 6D 00
pub(crate) struct CardEmulator {
    pub(crate) records: Vec<Bytes>,
    pub(crate) reads: Vec<(u8, u8)>,
    pub(crate) connected: bool,
    on_read: Option<ReadHook>,
}

impl CardEmulator {
    pub(crate) fn new(records: Vec<Bytes>) -> Self {
        Self {
            records,
            reads: Vec::new(),
            connected: true,
            on_read: None,
        }
    }

    /// Run `hook` with the record number after every READ RECORD is answered
    pub(crate) fn on_read(mut self, hook: impl FnMut(u8) + Send + 'static) -> Self {
        self.on_read = Some(Box::new(hook));
        self
    }

    /// Signal `reading` after record 1 is answered, then block until `resume` yields
    pub(crate) fn paused(self, reading: Sender<()>, resume: Receiver<()>) -> Self {
        self.on_read(move |index| {
            if index == 1 {
                let _ = reading.send(());
                let _ = resume.recv();
            }
        })
    }
}

impl fmt::Debug for CardEmulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardEmulator")
            .field("records", &self.records.len())
            .field("reads", &self.reads)
            .finish_non_exhaustive()
    }
}

impl CardTransport for CardEmulator {
    type Error = TransportError;

    fn connect(&mut self) -> Result<(), Self::Error> {
        self.connected = true;
        Ok(())
    }

    fn do_transmit_raw(
        &mut self,
        command: &[u8],
        _protocol: Option<Protocol>,
    ) -> Result<Bytes, Self::Error> {
        if !self.connected {
            return Err(TransportError::NoCard);
        }
        if command.len() < 4 || command[1] != INS_READ_RECORD {
            return Ok(Bytes::from_static(&[0x6D, 0x00]));
        }

        let (index, p2) = (command[2], command[3]);
        self.reads.push((index, p2));
        let response = match self.records.get(usize::from(index).wrapping_sub(1)) {
            Some(record) => {
                let mut buf = BytesMut::with_capacity(record.len() + 2);
                buf.put_slice(record);
                buf.put_slice(&[0x90, 0x00]);
                buf.freeze()
            }
            None => Bytes::from_static(&[0x6A, 0x83]),
        };
        if let Some(hook) = self.on_read.as_mut() {
            hook(index);
        }
        Ok(response)
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        Ok(())
    }

    fn identifier(&self) -> Option<Bytes> {
        None
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Payment system directory record listing a single AID
pub(crate) fn aid_record(aid: &[u8]) -> Bytes {
    let n = aid.len() as u8;
    let mut buf = BytesMut::new();
    buf.put_slice(&[0x70, n + 7, 0x61, n + 5, 0x4F, n]);
    buf.put_slice(aid);
    buf.put_slice(&[0x87, 0x01, 0x01]);
    buf.freeze()
}
