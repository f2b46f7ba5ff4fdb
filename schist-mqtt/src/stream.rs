/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Resumable packet framing on top of a non-blocking [`Transport`].

Both directions move exactly one packet at a time through a small state machine.  A short
read or write, or a `WouldBlock`, leaves the machine where it was; the next call picks up
from the same byte.
 */

use crate::decode::decode_packet;
use crate::decode::utils::*;
use crate::encode::*;
use crate::encode::utils::*;
use crate::error::{SchistError, SchistResult};
use crate::message::MessageDirection;
use crate::mqtt::*;
use crate::mqtt::utils::*;
use crate::transport::Transport;

use log::*;

use std::io;

/// A packet serialized and waiting in the send queue.
pub(crate) struct OutboundPacket {
    pub(crate) packet_type: PacketType,
    pub(crate) first_byte: u8,
    pub(crate) body: Vec<u8>,

    /// set when the packet is part of a QoS 1/2 handshake
    pub(crate) owner: Option<(MessageDirection, u16)>,
}

impl OutboundPacket {
    pub(crate) fn new(packet: &MqttPacket, owner: Option<(MessageDirection, u16)>) -> SchistResult<OutboundPacket> {
        Ok(OutboundPacket {
            packet_type: mqtt_packet_to_packet_type(packet),
            first_byte: compute_fixed_header_first_byte(packet),
            body: encode_packet_body(packet)?,
            owner,
        })
    }
}

// payload bytes are buffered at most this many per read, so a claimed remaining length is
// never allocated before the bytes arrive
const READ_CHUNK_SIZE : usize = 4096;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReadState {
    ReadType,
    ReadRemainingLength,
    ReadPayload,
    ReadComplete,
}

/// Outcome of a single transport read
enum ReadProgress {
    Bytes(usize),
    WouldBlock,
}

fn read_from_transport(transport: &mut dyn Transport, buffer: &mut [u8]) -> SchistResult<ReadProgress> {
    loop {
        match transport.read(buffer) {
            Ok(0) => {
                info!("read_from_transport - connection closed by peer");
                return Err(SchistError::new_connection_closed("transport returned end of stream"));
            }
            Ok(bytes_read) => { return Ok(ReadProgress::Bytes(bytes_read)); }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => { return Ok(ReadProgress::WouldBlock); }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => {
                error!("read_from_transport - transport read failed: {}", error);
                return Err(SchistError::from(error));
            }
        }
    }
}

pub(crate) struct PacketReader {
    state: ReadState,
    first_byte: u8,
    remaining_length_bytes: Vec<u8>,
    body: Vec<u8>,
    body_length: usize,
}

impl PacketReader {
    pub(crate) fn new() -> PacketReader {
        PacketReader {
            state: ReadState::ReadType,
            first_byte: 0,
            remaining_length_bytes: Vec::with_capacity(4),
            body: Vec::new(),
            body_length: 0,
        }
    }

    /// Discards any partially read packet.
    pub(crate) fn reset(&mut self) {
        self.state = ReadState::ReadType;
        self.first_byte = 0;
        self.remaining_length_bytes.clear();
        self.body = Vec::new();
        self.body_length = 0;
    }

    /// Pulls bytes from the transport until one packet has been read and decoded.  Returns
    /// `Ok(None)` when the transport would block first; the partial packet is kept.  Reserved
    /// packet types are skipped without being returned.
    pub(crate) fn read_packet(&mut self, transport: &mut dyn Transport) -> SchistResult<Option<MqttPacket>> {
        loop {
            match self.state {
                ReadState::ReadType => {
                    let mut first_byte = [0u8; 1];
                    match read_from_transport(transport, &mut first_byte)? {
                        ReadProgress::WouldBlock => { return Ok(None); }
                        ReadProgress::Bytes(_) => {
                            self.first_byte = first_byte[0];
                            self.state = ReadState::ReadRemainingLength;
                        }
                    }
                }
                ReadState::ReadRemainingLength => {
                    let mut length_byte = [0u8; 1];
                    match read_from_transport(transport, &mut length_byte)? {
                        ReadProgress::WouldBlock => { return Ok(None); }
                        ReadProgress::Bytes(_) => {
                            self.remaining_length_bytes.push(length_byte[0]);
                            if let DecodeVliResult::Value(remaining_length, _) = decode_vli(&self.remaining_length_bytes)? {
                                self.body_length = remaining_length as usize;
                                self.body = Vec::with_capacity(self.body_length.min(READ_CHUNK_SIZE));
                                self.state = if remaining_length == 0 { ReadState::ReadComplete } else { ReadState::ReadPayload };
                            }
                        }
                    }
                }
                ReadState::ReadPayload => {
                    let mut chunk = [0u8; READ_CHUNK_SIZE];
                    let wanted = (self.body_length - self.body.len()).min(READ_CHUNK_SIZE);
                    match read_from_transport(transport, &mut chunk[..wanted])? {
                        ReadProgress::WouldBlock => { return Ok(None); }
                        ReadProgress::Bytes(bytes_read) => {
                            self.body.extend_from_slice(&chunk[..bytes_read]);
                            if self.body.len() == self.body_length {
                                self.state = ReadState::ReadComplete;
                            }
                        }
                    }
                }
                ReadState::ReadComplete => {
                    let result = decode_packet(self.first_byte, &self.body);
                    self.reset();

                    if let Some(packet) = result? {
                        log_packet_read(&packet);
                        return Ok(Some(packet));
                    }
                }
            }
        }
    }
}

fn log_packet_read(packet: &MqttPacket) {
    trace!("PacketReader - read {}", mqtt_packet_to_packet_type(packet));
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum WriteState {
    WriteType,
    WriteRemainingLength,
    WritePayload,
    WriteComplete,
}

/// Outcome of a single transport write
enum WriteProgress {
    Bytes(usize),
    WouldBlock,
}

fn write_to_transport(transport: &mut dyn Transport, buffer: &[u8]) -> SchistResult<WriteProgress> {
    loop {
        match transport.write(buffer) {
            Ok(0) => {
                error!("write_to_transport - transport accepted zero bytes");
                return Err(SchistError::from(io::Error::from(io::ErrorKind::WriteZero)));
            }
            Ok(bytes_written) => { return Ok(WriteProgress::Bytes(bytes_written)); }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => { return Ok(WriteProgress::WouldBlock); }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => {
                error!("write_to_transport - transport write failed: {}", error);
                return Err(SchistError::from(error));
            }
        }
    }
}

pub(crate) struct PacketWriter {
    state: WriteState,
    remaining_length_bytes: Vec<u8>,
    offset: usize,
}

impl PacketWriter {
    pub(crate) fn new() -> PacketWriter {
        PacketWriter {
            state: WriteState::WriteType,
            remaining_length_bytes: Vec::with_capacity(4),
            offset: 0,
        }
    }

    /// Abandons any partially written packet.
    pub(crate) fn reset(&mut self) {
        self.state = WriteState::WriteType;
        self.remaining_length_bytes.clear();
        self.offset = 0;
    }

    /// Pushes as much of the packet as the transport accepts.  Returns `Ok(true)` once the final
    /// byte has been written, after which the writer is ready for the next packet.  The same
    /// packet must be supplied on every call until then.
    pub(crate) fn write_packet(&mut self, packet: &OutboundPacket, transport: &mut dyn Transport) -> SchistResult<bool> {
        loop {
            match self.state {
                WriteState::WriteType => {
                    match write_to_transport(transport, &[packet.first_byte])? {
                        WriteProgress::WouldBlock => { return Ok(false); }
                        WriteProgress::Bytes(_) => {
                            let body_length = packet.body.len();
                            self.remaining_length_bytes.clear();
                            self.remaining_length_bytes.reserve(compute_variable_length_integer_encode_size(body_length)?);
                            encode_vli(body_length as u32, &mut self.remaining_length_bytes)?;
                            self.offset = 0;
                            self.state = WriteState::WriteRemainingLength;
                        }
                    }
                }
                WriteState::WriteRemainingLength => {
                    match write_to_transport(transport, &self.remaining_length_bytes[self.offset..])? {
                        WriteProgress::WouldBlock => { return Ok(false); }
                        WriteProgress::Bytes(bytes_written) => {
                            self.offset += bytes_written;
                            if self.offset == self.remaining_length_bytes.len() {
                                self.offset = 0;
                                self.state = if packet.body.is_empty() { WriteState::WriteComplete } else { WriteState::WritePayload };
                            }
                        }
                    }
                }
                WriteState::WritePayload => {
                    match write_to_transport(transport, &packet.body[self.offset..])? {
                        WriteProgress::WouldBlock => { return Ok(false); }
                        WriteProgress::Bytes(bytes_written) => {
                            self.offset += bytes_written;
                            if self.offset == packet.body.len() {
                                self.state = WriteState::WriteComplete;
                            }
                        }
                    }
                }
                WriteState::WriteComplete => {
                    debug!("PacketWriter - finished writing {} ({} body bytes)", packet.packet_type, packet.body.len());
                    self.reset();
                    return Ok(true);
                }
            }
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.state == WriteState::WriteType
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    use assert_matches::assert_matches;

    fn create_publish() -> MqttPacket {
        MqttPacket::Publish(PublishPacket {
            packet_id: 1,
            topic: "t".to_string(),
            qos: QualityOfService::AtLeastOnce,
            payload: "hello".as_bytes().to_vec(),
            ..Default::default()
        })
    }

    #[test]
    fn write_packet_in_one_pass() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();

        let packet = OutboundPacket::new(&create_publish(), Some((MessageDirection::Outbound, 1))).unwrap();
        assert_eq!(PacketType::Publish, packet.packet_type);

        let mut writer = PacketWriter::new();
        assert!(writer.write_packet(&packet, &mut transport).unwrap());
        assert!(writer.is_idle());

        assert_eq!(vec![0x32u8, 10, 0, 1, b't', 0, 1, b'h', b'e', b'l', b'l', b'o'], handle.written_bytes());
    }

    #[test]
    fn write_packet_resumes_after_would_block() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();
        handle.set_write_chunk_size(3);
        handle.set_interleave_write_would_block(true);

        let packet = OutboundPacket::new(&create_publish(), None).unwrap();
        let mut writer = PacketWriter::new();

        let mut passes = 0;
        while !writer.write_packet(&packet, &mut transport).unwrap() {
            passes += 1;
            assert!(passes < 100);
        }

        assert!(passes > 1);
        assert_eq!(vec![create_publish()], handle.take_written_packets());
    }

    #[test]
    fn write_packet_blocked_transport_keeps_state() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();
        handle.set_write_chunk_size(1);

        let packet = OutboundPacket::new(&MqttPacket::Pingreq(PingreqPacket {}), None).unwrap();
        let mut writer = PacketWriter::new();

        handle.set_write_blocked(true);
        assert!(!writer.write_packet(&packet, &mut transport).unwrap());
        assert!(handle.written_bytes().is_empty());

        handle.set_write_blocked(false);
        assert!(writer.write_packet(&packet, &mut transport).unwrap());
        assert_eq!(vec![0xC0u8, 0], handle.written_bytes());
    }

    #[test]
    fn write_packet_to_closed_transport_fails() {
        let mut transport = MockTransport::new();
        transport.close().unwrap();

        let packet = OutboundPacket::new(&MqttPacket::Disconnect(DisconnectPacket {}), None).unwrap();
        let mut writer = PacketWriter::new();
        assert_matches!(writer.write_packet(&packet, &mut transport), Err(SchistError::StdIoError(_)));
    }

    #[test]
    fn read_packet_across_would_blocks() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();
        handle.set_read_chunk_size(1);
        handle.set_interleave_read_would_block(true);
        handle.push_packet(&create_publish());

        let mut reader = PacketReader::new();
        let mut result = None;
        for _ in 0..100 {
            if let Some(packet) = reader.read_packet(&mut transport).unwrap() {
                result = Some(packet);
                break;
            }
        }

        assert_eq!(Some(create_publish()), result);
        assert_eq!(0, handle.unread_byte_count());
    }

    #[test]
    fn read_packet_buffers_only_received_bytes() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();

        // PUBLISH claiming the maximum remaining length, followed by a handful of body bytes
        handle.push_bytes(&[0x30, 0xFF, 0xFF, 0xFF, 0x7F, 0, 1, b't', 1, 2]);

        let mut reader = PacketReader::new();
        assert_matches!(reader.read_packet(&mut transport), Ok(None));
        assert_eq!(ReadState::ReadPayload, reader.state);
        assert_eq!(268_435_455, reader.body_length);
        assert_eq!(5, reader.body.len());
        assert!(reader.body.capacity() <= READ_CHUNK_SIZE);

        handle.close_from_peer();
        assert_matches!(reader.read_packet(&mut transport), Err(SchistError::ConnectionClosed(_)));
    }

    #[test]
    fn read_packet_large_body_spans_chunks() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();

        let packet = MqttPacket::Publish(PublishPacket {
            topic: "bulk".to_string(),
            payload: vec![7u8; 3 * READ_CHUNK_SIZE + 17],
            ..Default::default()
        });
        handle.push_packet(&packet);

        let mut reader = PacketReader::new();
        assert_eq!(Some(packet), reader.read_packet(&mut transport).unwrap());
        assert_eq!(0, handle.unread_byte_count());
    }

    #[test]
    fn read_packet_peer_close_is_connection_closed() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();
        handle.push_bytes(&[0x32, 10, 0, 1]);
        handle.close_from_peer();

        let mut reader = PacketReader::new();
        assert_matches!(reader.read_packet(&mut transport), Err(SchistError::ConnectionClosed(_)));
    }

    #[test]
    fn read_packet_io_error() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();
        handle.inject_read_error(io::ErrorKind::ConnectionReset);

        let mut reader = PacketReader::new();
        assert_matches!(reader.read_packet(&mut transport), Err(SchistError::StdIoError(_)));
    }

    #[test]
    fn read_packet_reset_discards_partial_packet() {
        let mut transport = MockTransport::new();
        let handle = transport.handle();
        handle.push_bytes(&[0x32, 10, 0, 1]);

        let mut reader = PacketReader::new();
        assert_matches!(reader.read_packet(&mut transport), Ok(None));

        reader.reset();
        handle.push_bytes(&[0xD0, 0]);
        assert_eq!(Some(MqttPacket::Pingresp(PingrespPacket {})), reader.read_packet(&mut transport).unwrap());
    }
}
