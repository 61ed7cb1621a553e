// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Fixed 8-byte frame header shared by every message on the wire:
// `{ opcode: u8, reserved: u8, pipe_data_size: u16, sm_data_size: u32 }`,
// encoded in the host's native byte order (this transport never crosses
// machine boundaries, so there is no wire-endianness concern).

use crate::error::{Result, SmipcError};

/// Size in bytes of an encoded [`Header`]. Fixed by the wire format; never
/// changes independent of the field widths below.
pub const HEADER_SIZE: usize = 8;

/// Opcode values carried in [`Header::opcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Payload follows inline in the pipe.
    PipeDirect = 0,
    /// Payload lives in a shared-memory segment named by the pipe payload.
    SmOverPipe = 1,
    /// Sender is returning a previously-received segment to the pool.
    SmRestore = 2,
}

impl Opcode {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Opcode::PipeDirect),
            1 => Ok(Opcode::SmOverPipe),
            2 => Ok(Opcode::SmRestore),
            other => Err(SmipcError::Protocol(format!("unknown opcode {other}"))),
        }
    }
}

/// The fixed 8-byte header prefixing every frame.
///
/// `pipe_data_size` is the length of the payload carried inline in the
/// pipe (the direct payload for [`Opcode::PipeDirect`], or the length of
/// the segment-name string for [`Opcode::SmOverPipe`]/[`Opcode::SmRestore`]).
/// `sm_data_size` is the length of the payload stored in the referenced
/// shared-memory segment, or 0 when the opcode carries no segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub opcode: Opcode,
    pub pipe_data_size: u16,
    pub sm_data_size: u32,
}

impl Header {
    pub fn pipe_direct(len: u16) -> Self {
        Self {
            opcode: Opcode::PipeDirect,
            pipe_data_size: len,
            sm_data_size: 0,
        }
    }

    pub fn sm_over_pipe(name_len: u16, sm_len: u32) -> Self {
        Self {
            opcode: Opcode::SmOverPipe,
            pipe_data_size: name_len,
            sm_data_size: sm_len,
        }
    }

    pub fn sm_restore(name_len: u16) -> Self {
        Self {
            opcode: Opcode::SmRestore,
            pipe_data_size: name_len,
            sm_data_size: 0,
        }
    }

    /// Encode into an 8-byte native-endian frame.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.opcode as u8;
        buf[1] = 0; // reserved
        buf[2..4].copy_from_slice(&self.pipe_data_size.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.sm_data_size.to_ne_bytes());
        buf
    }

    /// Decode an 8-byte native-endian frame.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        let opcode = Opcode::from_u8(buf[0])?;
        let pipe_data_size = u16::from_ne_bytes([buf[2], buf[3]]);
        let sm_data_size = u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Ok(Self {
            opcode,
            pipe_data_size,
            sm_data_size,
        })
    }
}
