//! Binary command decoder.
//!
//! Wire format (little-endian):
//! ```text
//! ┌────────┬──────────────────────────────────────────────┐
//! │ opcode │ payload (fixed layout per opcode)            │
//! │ 1 byte │ variable                                     │
//! └────────┴──────────────────────────────────────────────┘
//! ```
//!
//! Commands are applied strictly in buffer order; a single `TEXT_UPSERT`
//! replaces an entity's content and runs atomically. Malformed UTF-8 in
//! payloads is sanitized with lossy conversion — a bad paste degrades, it
//! never aborts.

use thiserror::Error;

use crate::event::EngineEvent;
use crate::runs::{StyleFlags, StyleRun};
use crate::store::{BoxMode, TextAlign, TextHeader, TextStore};

/// Command opcodes accepted by [`apply_commands`].
pub mod opcode {
    pub const TEXT_UPSERT: u8 = 0x20;
    pub const TEXT_DELETE: u8 = 0x21;
    pub const TEXT_SET_CARET: u8 = 0x22;
    pub const TEXT_SET_SELECTION: u8 = 0x23;
    pub const TEXT_INSERT: u8 = 0x24;
    pub const TEXT_DELETE_RANGE: u8 = 0x25;
}

/// Decode failures. Commands already applied before the failure stay
/// applied; the offset names the first undecodable byte.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unexpected end of command buffer at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn eof(&self) -> CommandError {
        CommandError::UnexpectedEof { offset: self.pos }
    }

    fn read_u8(&mut self) -> Result<u8, CommandError> {
        let b = *self.buf.get(self.pos).ok_or_else(|| self.eof())?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u32(&mut self) -> Result<u32, CommandError> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| self.eof())?;
        self.pos += 4;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f32(&mut self) -> Result<f32, CommandError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CommandError> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + len)
            .ok_or_else(|| self.eof())?;
        self.pos += len;
        Ok(bytes)
    }
}

/// Apply a batch of commands to the store. Returns the number applied.
///
/// A `DocChanged` event is pushed once when at least one command mutated
/// the store.
pub fn apply_commands(store: &mut TextStore, buf: &[u8]) -> Result<usize, CommandError> {
    let mut reader = Reader::new(buf);
    let mut applied = 0usize;

    while reader.remaining() > 0 {
        let at = reader.pos;
        let op = reader.read_u8()?;
        match op {
            opcode::TEXT_UPSERT => decode_upsert(store, &mut reader)?,
            opcode::TEXT_DELETE => {
                let id = reader.read_u32()?;
                store.delete_text(id);
            }
            opcode::TEXT_SET_CARET => {
                let id = reader.read_u32()?;
                let byte = reader.read_u32()?;
                store.set_caret(id, byte as usize);
            }
            opcode::TEXT_SET_SELECTION => {
                let id = reader.read_u32()?;
                let anchor = reader.read_u32()?;
                let focus = reader.read_u32()?;
                store.set_selection(id, anchor as usize, focus as usize);
            }
            opcode::TEXT_INSERT => {
                let id = reader.read_u32()?;
                let byte_index = reader.read_u32()?;
                let len = reader.read_u32()? as usize;
                let bytes = reader.read_bytes(len)?;
                let text = String::from_utf8_lossy(bytes);
                store.insert_content(id, byte_index as usize, &text);
            }
            opcode::TEXT_DELETE_RANGE => {
                let id = reader.read_u32()?;
                let start = reader.read_u32()?;
                let end = reader.read_u32()?;
                store.delete_content(id, start as usize, end as usize);
            }
            other => {
                log::warn!("unknown text opcode 0x{other:02X} at offset {at}");
                return Err(CommandError::UnknownOpcode { opcode: other, offset: at });
            }
        }
        applied += 1;
    }

    if applied > 0 {
        store.push_event(EngineEvent::DocChanged);
    }
    Ok(applied)
}

fn decode_upsert(store: &mut TextStore, reader: &mut Reader) -> Result<(), CommandError> {
    let id = reader.read_u32()?;
    let x = reader.read_f32()?;
    let y = reader.read_f32()?;
    let rotation = reader.read_f32()?;
    let box_mode = match reader.read_u8()? {
        1 => BoxMode::FixedWidth,
        _ => BoxMode::AutoWidth,
    };
    let align = match reader.read_u8()? {
        1 => TextAlign::Center,
        2 => TextAlign::Right,
        _ => TextAlign::Left,
    };
    let constraint_width = reader.read_f32()?;

    let run_count = reader.read_u32()? as usize;
    // 21 bytes per run payload; reject counts the buffer cannot hold.
    if run_count > reader.remaining() / 21 {
        return Err(reader.eof());
    }
    let mut runs = Vec::with_capacity(run_count);
    for _ in 0..run_count {
        let start = reader.read_u32()? as usize;
        let len = reader.read_u32()? as usize;
        let font_id = reader.read_u32()?;
        let font_size = reader.read_f32()?;
        let color = reader.read_u32()?;
        let flags = StyleFlags::from_bits_truncate(reader.read_u8()?);
        runs.push(StyleRun {
            start,
            len,
            font_id,
            font_size,
            color,
            flags,
        });
    }

    let content_len = reader.read_u32()? as usize;
    let bytes = reader.read_bytes(content_len)?;
    let content = String::from_utf8_lossy(bytes).into_owned();

    store.upsert_text(
        id,
        TextHeader {
            x,
            y,
            rotation,
            box_mode,
            align,
            constraint_width,
        },
        runs,
        content,
    );
    Ok(())
}

// ===================================================================
// Tests
// ===================================================================
