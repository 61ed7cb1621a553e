// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Portable byte layout for a CUDA IPC memory handle. This module only
// serializes and deserializes the packet; acquiring/opening the actual
// CUDA IPC handles (`cudaIpcGetMemHandle`, `cudaIpcOpenMemHandle`, ...) is
// an external collaborator this crate never calls into.

use crate::error::{Result, SmipcError};

/// One CUDA tensor's IPC handle and shape metadata, ready to cross a
/// [`crate::channel::Channel`] as an opaque payload.
///
/// Field widths follow the wire layout fixed by this format: every scalar
/// is `u32`, including `shape`'s dimensions, matching the original
/// `device_index/memory_size/stride/dtype_id` header fields and the
/// length-prefixed `event_handle`/`memory_handle`/`shape` tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CudaIpcPacket {
    pub device_index: u32,
    pub memory_size: u32,
    pub stride: u32,
    pub dtype_id: u32,
    pub event_handle: Vec<u8>,
    pub memory_handle: Vec<u8>,
    pub shape: Vec<u32>,
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_ne_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    put_u32(buf, data.len() as u32);
    buf.extend_from_slice(data);
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(SmipcError::Protocol(
                "CUDA IPC packet truncated".to_string(),
            ));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_u32(&mut self) -> Result<u32> {
        Ok(u32::from_ne_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn take_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.take_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

impl CudaIpcPacket {
    /// Encode into a flat byte buffer: every variable-length field
    /// (`event_handle`, `memory_handle`, `shape`) is prefixed by a `u32`
    /// element count, every scalar field is in native byte order.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            4 + 4 + 4 + 4
                + 4 + self.event_handle.len()
                + 4 + self.memory_handle.len()
                + 4 + self.shape.len() * 4,
        );
        put_u32(&mut buf, self.device_index);
        put_u32(&mut buf, self.memory_size);
        put_u32(&mut buf, self.stride);
        put_u32(&mut buf, self.dtype_id);
        put_bytes(&mut buf, &self.event_handle);
        put_bytes(&mut buf, &self.memory_handle);

        put_u32(&mut buf, self.shape.len() as u32);
        for dim in &self.shape {
            put_u32(&mut buf, *dim);
        }

        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(data);
        let device_index = cur.take_u32()?;
        let memory_size = cur.take_u32()?;
        let stride = cur.take_u32()?;
        let dtype_id = cur.take_u32()?;
        let event_handle = cur.take_bytes()?;
        let memory_handle = cur.take_bytes()?;

        let shape_len = cur.take_u32()? as usize;
        let mut shape = Vec::with_capacity(shape_len);
        for _ in 0..shape_len {
            shape.push(cur.take_u32()?);
        }

        Ok(Self {
            device_index,
            memory_size,
            stride,
            dtype_id,
            event_handle,
            memory_handle,
            shape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CudaIpcPacket {
        CudaIpcPacket {
            device_index: 0,
            memory_size: 1 << 20,
            stride: 4096,
            dtype_id: 1,
            event_handle: vec![0xAB; 64],
            memory_handle: vec![0xCD; 64],
            shape: vec![1, 3, 224, 224],
        }
    }

    #[test]
    fn round_trips_full_packet() {
        let packet = sample();
        let decoded = CudaIpcPacket::decode(&packet.encode()).unwrap();
        assert_eq!(packet, decoded);
    }

    #[test]
    fn round_trips_empty_shape_and_handles() {
        let packet = CudaIpcPacket {
            device_index: 0,
            memory_size: 0,
            stride: 0,
            dtype_id: 0,
            event_handle: Vec::new(),
            memory_handle: Vec::new(),
            shape: Vec::new(),
        };
        let decoded = CudaIpcPacket::decode(&packet.encode()).unwrap();
        assert_eq!(packet, decoded);
    }

    #[test]
    fn decode_rejects_truncated_buffer() {
        let packet = sample();
        let mut buf = packet.encode();
        buf.truncate(buf.len() - 10);
        assert!(CudaIpcPacket::decode(&buf).is_err());
    }

    /// Scenario from the invariant suite: device 2, uint8 dtype, a small
    /// event/memory handle pair, and a 3-dimensional shape.
    #[test]
    fn matches_the_literal_round_trip_scenario() {
        let packet = CudaIpcPacket {
            device_index: 2,
            memory_size: 100,
            stride: 4,
            dtype_id: 0, // uint8
            event_handle: b"ABCD".to_vec(),
            memory_handle: b"abcdefg".to_vec(),
            shape: vec![10, 11, 12],
        };
        let decoded = CudaIpcPacket::decode(&packet.encode()).unwrap();
        assert_eq!(packet, decoded);
        assert_eq!(decoded.shape, vec![10, 11, 12]);
    }
}
