/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*
 * Test-only scripted transport.  Tests keep a MockTransportHandle to play the broker: push
 * inbound bytes or packets, throttle or block writes, and decode whatever the client wrote.
 */

use crate::decode::testing::decode_bytes_for_test;
use crate::encode::encode_packet_to_bytes;
use crate::error::SchistResult;
use crate::mqtt::*;
use crate::transport::*;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

struct MockTransportState {
    inbound: VecDeque<u8>,
    read_chunk_size: usize,
    interleave_read_would_block: bool,
    block_next_read: bool,
    peer_closed: bool,
    read_error: Option<io::ErrorKind>,

    written: Vec<u8>,
    write_chunk_size: usize,
    interleave_write_would_block: bool,
    block_next_write: bool,
    write_blocked: bool,

    closed: bool,
    select_calls: Vec<(Interest, Duration)>,
}

impl Default for MockTransportState {
    fn default() -> Self {
        MockTransportState {
            inbound: VecDeque::new(),
            read_chunk_size: usize::MAX,
            interleave_read_would_block: false,
            block_next_read: false,
            peer_closed: false,
            read_error: None,
            written: Vec::new(),
            write_chunk_size: usize::MAX,
            interleave_write_would_block: false,
            block_next_write: false,
            write_blocked: false,
            closed: false,
            select_calls: Vec::new(),
        }
    }
}

pub(crate) struct MockTransport {
    state: Rc<RefCell<MockTransportState>>,
}

#[derive(Clone)]
pub(crate) struct MockTransportHandle {
    state: Rc<RefCell<MockTransportState>>,
}

impl MockTransport {
    pub(crate) fn new() -> MockTransport {
        MockTransport {
            state: Rc::new(RefCell::new(MockTransportState::default())),
        }
    }

    pub(crate) fn handle(&self) -> MockTransportHandle {
        MockTransportHandle {
            state: self.state.clone(),
        }
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }

        if let Some(kind) = state.read_error.take() {
            return Err(io::Error::from(kind));
        }

        if state.inbound.is_empty() {
            if state.peer_closed {
                return Ok(0);
            }

            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }

        if state.interleave_read_would_block {
            let block = state.block_next_read;
            state.block_next_read = !block;
            if block {
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
        }

        let amount = buffer.len().min(state.read_chunk_size).min(state.inbound.len());
        for (i, byte) in state.inbound.drain(..amount).enumerate() {
            buffer[i] = byte;
        }

        Ok(amount)
    }

    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }

        if state.write_blocked {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }

        if state.interleave_write_would_block {
            let block = state.block_next_write;
            state.block_next_write = !block;
            if block {
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
        }

        let amount = buffer.len().min(state.write_chunk_size);
        state.written.extend_from_slice(&buffer[..amount]);

        Ok(amount)
    }

    fn select(&mut self, interest: Interest, timeout: Duration) -> io::Result<Readiness> {
        let mut state = self.state.borrow_mut();
        state.select_calls.push((interest, timeout));

        let has_input = !state.inbound.is_empty() || state.peer_closed || state.read_error.is_some();

        Ok(Readiness {
            readable: interest.readable && has_input,
            writable: interest.writable && !state.write_blocked && !state.closed,
        })
    }

    fn close(&mut self) -> io::Result<()> {
        self.state.borrow_mut().closed = true;
        Ok(())
    }
}

impl MockTransportHandle {
    pub(crate) fn push_bytes(&self, bytes: &[u8]) {
        self.state.borrow_mut().inbound.extend(bytes.iter().copied());
    }

    pub(crate) fn push_packet(&self, packet: &MqttPacket) {
        let bytes = encode_packet_to_bytes(packet).unwrap();
        self.push_bytes(&bytes);
    }

    pub(crate) fn unread_byte_count(&self) -> usize {
        self.state.borrow().inbound.len()
    }

    pub(crate) fn set_read_chunk_size(&self, size: usize) {
        self.state.borrow_mut().read_chunk_size = size.max(1);
    }

    pub(crate) fn set_interleave_read_would_block(&self, interleave: bool) {
        self.state.borrow_mut().interleave_read_would_block = interleave;
    }

    pub(crate) fn close_from_peer(&self) {
        self.state.borrow_mut().peer_closed = true;
    }

    pub(crate) fn inject_read_error(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().read_error = Some(kind);
    }

    pub(crate) fn set_write_chunk_size(&self, size: usize) {
        self.state.borrow_mut().write_chunk_size = size.max(1);
    }

    pub(crate) fn set_interleave_write_would_block(&self, interleave: bool) {
        self.state.borrow_mut().interleave_write_would_block = interleave;
    }

    pub(crate) fn set_write_blocked(&self, blocked: bool) {
        self.state.borrow_mut().write_blocked = blocked;
    }

    pub(crate) fn written_bytes(&self) -> Vec<u8> {
        self.state.borrow().written.clone()
    }

    /// Decodes and removes everything the client has written so far.  Fails the test if the
    /// written bytes do not form whole packets.
    pub(crate) fn take_written_packets(&self) -> Vec<MqttPacket> {
        let bytes = std::mem::take(&mut self.state.borrow_mut().written);
        let packets = decode_bytes_for_test(&bytes, usize::MAX).unwrap();

        let mut reencoded = Vec::new();
        for packet in &packets {
            reencoded.extend_from_slice(&encode_packet_to_bytes(packet).unwrap());
        }
        assert_eq!(bytes, reencoded, "written bytes contain a partial packet");

        packets
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    pub(crate) fn select_calls(&self) -> Vec<(Interest, Duration)> {
        self.state.borrow().select_calls.clone()
    }
}

/// Transport factory handing out mock transports.  Every transport it creates is recorded so a
/// test can reach the one the client is currently using.
#[derive(Clone, Default)]
pub(crate) struct MockTransportFactory {
    handles: Rc<RefCell<Vec<MockTransportHandle>>>,
}

impl MockTransportFactory {
    pub(crate) fn new() -> MockTransportFactory {
        MockTransportFactory::default()
    }

    pub(crate) fn create_factory(&self) -> TransportFactory {
        let handles = self.handles.clone();
        Box::new(move |_host: &str, _port: u16| -> SchistResult<Box<dyn Transport>> {
            let transport = MockTransport::new();
            handles.borrow_mut().push(transport.handle());
            Ok(Box::new(transport))
        })
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.handles.borrow().len()
    }

    pub(crate) fn latest(&self) -> MockTransportHandle {
        self.handles.borrow().last().cloned().unwrap()
    }
}

/*
 * Packets a scripted broker answers with
 */

pub(crate) fn connack(session_present: bool, return_code: ConnectReturnCode) -> MqttPacket {
    MqttPacket::Connack(ConnackPacket { session_present, return_code })
}

pub(crate) fn puback(packet_id: u16) -> MqttPacket {
    MqttPacket::Puback(PubackPacket { packet_id })
}

pub(crate) fn pubrec(packet_id: u16) -> MqttPacket {
    MqttPacket::Pubrec(PubrecPacket { packet_id })
}

pub(crate) fn pubrel(packet_id: u16) -> MqttPacket {
    MqttPacket::Pubrel(PubrelPacket { packet_id })
}

pub(crate) fn pubcomp(packet_id: u16) -> MqttPacket {
    MqttPacket::Pubcomp(PubcompPacket { packet_id })
}

pub(crate) fn suback(packet_id: u16, return_codes: Vec<SubackReturnCode>) -> MqttPacket {
    MqttPacket::Suback(SubackPacket { packet_id, return_codes })
}

pub(crate) fn unsuback(packet_id: u16) -> MqttPacket {
    MqttPacket::Unsuback(UnsubackPacket { packet_id })
}

pub(crate) fn inbound_publish(packet_id: u16, topic: &str, qos: QualityOfService, duplicate: bool, payload: &[u8]) -> MqttPacket {
    MqttPacket::Publish(PublishPacket {
        packet_id,
        topic: topic.to_string(),
        qos,
        duplicate,
        retain: false,
        payload: payload.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_transport_reads_in_chunks() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();
        handle.push_bytes(&[1, 2, 3, 4, 5]);
        handle.set_read_chunk_size(2);

        let mut buffer = [0u8; 8];
        assert_eq!(2, transport.read(&mut buffer).unwrap());
        assert_eq!([1, 2], buffer[..2]);
        assert_eq!(3, handle.unread_byte_count());

        assert_eq!(2, transport.read(&mut buffer).unwrap());
        assert_eq!(1, transport.read(&mut buffer).unwrap());
        assert_eq!(io::ErrorKind::WouldBlock, transport.read(&mut buffer).unwrap_err().kind());

        handle.close_from_peer();
        assert_eq!(0, transport.read(&mut buffer).unwrap());
    }

    #[test]
    fn mock_transport_select_reflects_state() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();
        let both = Interest { readable: true, writable: true };

        assert_eq!(Readiness { readable: false, writable: true }, transport.select(both, Duration::from_secs(1)).unwrap());

        handle.push_bytes(&[0xD0, 0]);
        handle.set_write_blocked(true);
        assert_eq!(Readiness { readable: true, writable: false }, transport.select(both, Duration::from_secs(2)).unwrap());

        let calls = handle.select_calls();
        assert_eq!(2, calls.len());
        assert_eq!(Duration::from_secs(2), calls[1].1);
    }

    #[test]
    fn mock_transport_captures_written_packets() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();

        let bytes = encode_packet_to_bytes(&puback(9)).unwrap();
        assert_eq!(bytes.len(), transport.write(&bytes).unwrap());
        assert_eq!(vec![puback(9)], handle.take_written_packets());
        assert!(handle.written_bytes().is_empty());

        transport.close().unwrap();
        assert!(handle.is_closed());
        assert!(transport.write(&bytes).is_err());
    }
}
