/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
A module containing the core crate error enumeration, context structures, and conversion
definitions.
 */

use crate::mqtt::{ConnectReturnCode, PacketType};

use std::error::Error;
use std::fmt;

/// Additional details about an EncodingFailure error variant
#[derive(Debug)]
pub struct EncodingFailureContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a DecodingFailure error variant
#[derive(Debug)]
pub struct DecodingFailureContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a ProtocolError error variant
#[derive(Debug)]
pub struct ProtocolErrorContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about an InternalStateError error variant
#[derive(Debug)]
pub struct InternalStateErrorContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a ConnectionClosed error variant
#[derive(Debug)]
pub struct ConnectionClosedContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a ConnectionRejected error variant
#[derive(Debug)]
pub struct ConnectionRejectedContext {

    /// return code the broker sent in its CONNACK
    pub return_code: ConnectReturnCode,
}

/// Additional details about a PingTimeout error variant
#[derive(Debug)]
pub struct PingTimeoutContext {
}

/// Additional details about a ConnackTimeout error variant
#[derive(Debug)]
pub struct ConnackTimeoutContext {
}

/// Additional details about a QueueFull error variant
#[derive(Debug)]
pub struct QueueFullContext {

    /// the queued-message bound that was hit
    pub max_queued: usize,
}

/// Additional details about a NotConnected error variant
#[derive(Debug)]
pub struct NotConnectedContext {
}

/// Additional details about an InvalidArgument error variant
#[derive(Debug)]
pub struct InvalidArgumentContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a PacketValidation error variant
#[derive(Debug)]
pub struct PacketValidationContext {

    /// type of packet that failed validation
    pub packet_type: PacketType,

    source: Box<dyn Error + Send + Sync + 'static>
}

/// Additional details about a StdIoError error variant
#[derive(Debug)]
pub struct StdIoErrorContext {
    source: Box<dyn Error + Send + Sync + 'static>
}

/// Basic error type for the entire schist-mqtt crate.
#[derive(Debug)]
#[non_exhaustive]
pub enum SchistError {

    /// Error encountered while attempting to encode an MQTT packet
    EncodingFailure(EncodingFailureContext),

    /// Error encountered while attempting to decode an MQTT packet: bad fixed header flags,
    /// an over-long remaining length, a body that does not match its declared length, etc...
    /// The connection is unusable afterwards.
    DecodingFailure(DecodingFailureContext),

    /// The broker did something that is inconsistent with the client's view of the session, for
    /// example acknowledging a packet id the client never used.
    ProtocolError(ProtocolErrorContext),

    /// Something happened that should never happen.  Always indicates a bug in the client or
    /// exhaustion of the packet id space.
    InternalStateError(InternalStateErrorContext),

    /// The transport was closed by the peer.
    ConnectionClosed(ConnectionClosedContext),

    /// The broker answered the CONNECT with a non-zero return code.
    ConnectionRejected(ConnectionRejectedContext),

    /// A PINGREQ went unanswered for a full keep alive interval.
    PingTimeout(PingTimeoutContext),

    /// The broker did not answer CONNECT with a CONNACK within a keep alive interval.
    ConnackTimeout(ConnackTimeoutContext),

    /// A QoS 1 or 2 publish was rejected because the configured number of queued messages
    /// has been reached.  Session state is unaffected.
    QueueFull(QueueFullContext),

    /// The operation requires an active session (a `connect` that has not yet been torn down).
    NotConnected(NotConnectedContext),

    /// An API call received an argument it cannot use.
    InvalidArgument(InvalidArgumentContext),

    /// An outbound packet violates the MQTT specification.
    PacketValidation(PacketValidationContext),

    /// Generic error wrapping std::io::Error
    StdIoError(StdIoErrorContext),
}

impl SchistError {

    pub(crate) fn new_decoding_failure(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::DecodingFailure(
            DecodingFailureContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_encoding_failure(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::EncodingFailure(
            EncodingFailureContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_protocol_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::ProtocolError(
            ProtocolErrorContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_internal_state_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::InternalStateError(
            InternalStateErrorContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_connection_closed(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::ConnectionClosed(
            ConnectionClosedContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_connection_rejected(return_code: ConnectReturnCode) -> Self {
        SchistError::ConnectionRejected(
            ConnectionRejectedContext {
                return_code
            }
        )
    }

    pub(crate) fn new_ping_timeout() -> Self {
        SchistError::PingTimeout(
            PingTimeoutContext {
            }
        )
    }

    pub(crate) fn new_connack_timeout() -> Self {
        SchistError::ConnackTimeout(
            ConnackTimeoutContext {
            }
        )
    }

    pub(crate) fn new_queue_full(max_queued: usize) -> Self {
        SchistError::QueueFull(
            QueueFullContext {
                max_queued
            }
        )
    }

    pub(crate) fn new_not_connected() -> Self {
        SchistError::NotConnected(
            NotConnectedContext {
            }
        )
    }

    pub(crate) fn new_invalid_argument(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::InvalidArgument(
            InvalidArgumentContext {
                source : source.into()
            }
        )
    }

    pub(crate) fn new_packet_validation(packet_type: PacketType, source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::PacketValidation(
            PacketValidationContext {
                packet_type,
                source : source.into()
            }
        )
    }

    /// Constructs a StdIoError variant from an existing error.  Typically this should be a
    /// std::io::Error surfaced by a custom transport.
    pub fn new_std_io_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        SchistError::StdIoError(
            StdIoErrorContext {
                source : source.into()
            }
        )
    }
}

impl Error for SchistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SchistError::DecodingFailure(context) => {
                Some(context.source.as_ref())
            }
            SchistError::EncodingFailure(context) => {
                Some(context.source.as_ref())
            }
            SchistError::ProtocolError(context) => {
                Some(context.source.as_ref())
            }
            SchistError::InternalStateError(context) => {
                Some(context.source.as_ref())
            }
            SchistError::ConnectionClosed(context) => {
                Some(context.source.as_ref())
            }
            SchistError::InvalidArgument(context) => {
                Some(context.source.as_ref())
            }
            SchistError::PacketValidation(context) => {
                Some(context.source.as_ref())
            }
            SchistError::StdIoError(context) => {
                Some(context.source.as_ref())
            }
            _ => { None }
        }
    }
}

impl fmt::Display for SchistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchistError::DecodingFailure(_) => {
                write!(f, "failure encountered while decoding an incoming MQTT packet")
            }
            SchistError::EncodingFailure(_) => {
                write!(f, "failure encountered while encoding an outbound MQTT packet")
            }
            SchistError::ProtocolError(_) => {
                write!(f, "broker behavior disallowed by the mqtt spec or inconsistent with session state")
            }
            SchistError::InternalStateError(_) => {
                write!(f, "client reached an invalid internal state")
            }
            SchistError::ConnectionClosed(_) => {
                write!(f, "client connection was closed; source contains further details")
            }
            SchistError::ConnectionRejected(context) => {
                write!(f, "broker rejected the connection attempt with return code {}", context.return_code)
            }
            SchistError::PingTimeout(_) => {
                write!(f, "no PINGRESP received within the keep alive interval")
            }
            SchistError::ConnackTimeout(_) => {
                write!(f, "no CONNACK received in response to CONNECT")
            }
            SchistError::QueueFull(context) => {
                write!(f, "publish rejected because {} messages are already queued", context.max_queued)
            }
            SchistError::NotConnected(_) => {
                write!(f, "operation requires an active session")
            }
            SchistError::InvalidArgument(_) => {
                write!(f, "invalid argument; source contains further details")
            }
            SchistError::PacketValidation(context) => {
                write!(f, "{} contains a field that violates the mqtt spec", context.packet_type)
            }
            SchistError::StdIoError(_) => {
                write!(f, "generic error wrapper for std::io::Error; source contains further details")
            }
        }
    }
}

impl From<std::io::Error> for SchistError {
    fn from(error: std::io::Error) -> Self {
        SchistError::new_std_io_error(error)
    }
}

impl From<core::str::Utf8Error> for SchistError {
    fn from(err: core::str::Utf8Error) -> Self {
        SchistError::new_decoding_failure(err)
    }
}

/// Crate-wide result type for functions that can fail
pub type SchistResult<T> = Result<T, SchistError>;
