/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::decode::*;
use crate::encode::utils::*;
use crate::error::{SchistError, SchistResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;

use log::*;

use std::collections::VecDeque;
use std::fmt;

define_empty_packet_encoding_impl!(write_pingreq_encoding_steps, PingreqPacket);

define_empty_packet_decode_function!(decode_pingreq_packet, Pingreq, PingreqPacket, "Pingreq", PINGREQ_FIRST_BYTE);

define_empty_packet_display_trait!(PingreqPacket, "PingreqPacket");
