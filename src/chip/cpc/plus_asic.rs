/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The CPC Plus / GX4000 custom chip: hardware sprites, a 32-colour palette, three
//! DMA channels feeding the PSG, soft-scroll and split-screen registers, and the
//! programmable raster interrupt.
//!
//! The whole register file, sprite bitmap and sprite attribute table live in a single
//! contiguous 16K buffer, the same way they share one physical RAM bank on real Plus
//! hardware — mirroring how the source keeps one arena with named views rather than
//! separate allocations per register group.
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// Size of the ASIC's register/sprite RAM bank.
pub const ASIC_BANK_SIZE: usize = 0x4000;

const SPRITE_COUNT: usize = 16;
const SPRITE_PIXEL_BYTES: usize = 256; // 16x16 nibbles, one nibble per byte, 2 bytes wasted/pixel row pair folded
const SPRITE_BITMAP_BASE: usize = 0x2000;
const SPRITE_ATTR_BASE: usize = 0x2C00;
const SPRITE_ATTR_STRIDE: usize = 8;
const PALETTE_BASE: usize = 0x2400;
const RASTER_BASE: usize = 0x2800;
const PRI_OFFSET: usize = RASTER_BASE;
const SSSL_OFFSET: usize = RASTER_BASE + 2;
const SSSS_OFFSET: usize = RASTER_BASE + 4;
const SSCR_OFFSET: usize = RASTER_BASE + 6;
const DMA_BASE: usize = RASTER_BASE + 8;
const DMA_CHANNEL_STRIDE: usize = 4; // pointer-lo, pointer-hi, ctrl-lo, ctrl-hi
const DCSR_OFFSET: usize = DMA_BASE + 3 * DMA_CHANNEL_STRIDE;
const IVR_OFFSET: usize = DCSR_OFFSET + 1;

/// A single hardware sprite's position and scaling, decoded from its 8-byte attribute
/// record in the sprite attribute table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpriteAttr {
    pub x: i16,
    pub y: i16,
    pub mag_x: u8,
    pub mag_y: u8,
}

/// One of the three DMA channels that feed command streams into the PSG (or raise
/// interrupts) once per CRTC HSYNC.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
struct DmaChannel {
    enabled: bool,
    pc: u16,
    base_pc: u16,
    pause: u16,
}

/// An action a DMA channel requested the owning chip perform after executing one command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaAction {
    WritePsgReg(u8, u8),
    RaiseInterrupt,
}

/// The Plus ASIC's 16K register/sprite/DMA bank plus the lock sequence state machine
/// that gates access to it.
#[derive(Clone)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct AsicBank {
    #[cfg_attr(feature = "snapshot", serde(with = "asic_bank_serde"))]
    mem: Box<[u8; ASIC_BANK_SIZE]>,
    dma: [DmaChannel; 3],
    lock_progress: u8,
    unlocked: bool,
}

const LOCK_SEQUENCE: [u8; 14] = [
    0x00, 0xFF, 0x77, 0xB3, 0x51, 0xA8, 0xD4, 0x62, 0x39, 0x9C, 0x46, 0x2B, 0x15, 0x8A,
];

impl Default for AsicBank {
    fn default() -> Self {
        AsicBank {
            mem: Box::new([0; ASIC_BANK_SIZE]),
            dma: [DmaChannel::default(); 3],
            lock_progress: 0,
            unlocked: false,
        }
    }
}

impl core::fmt::Debug for AsicBank {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsicBank")
            .field("unlocked", &self.unlocked)
            .field("dma", &self.dma)
            .finish()
    }
}

impl AsicBank {
    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Feeds one byte written to the lock sequence port (`0x6C..0x6Fxx`, decoded by the
    /// caller). Matching the full 14-byte sequence followed by `0xCD` unlocks the ASIC's
    /// extended registers; any other byte at the 15th position, or any mismatch earlier
    /// in the sequence, locks it again and restarts matching from the top.
    pub fn feed_lock_sequence(&mut self, byte: u8) {
        if (self.lock_progress as usize) < LOCK_SEQUENCE.len() {
            if byte == LOCK_SEQUENCE[self.lock_progress as usize] {
                self.lock_progress += 1;
            } else if byte == LOCK_SEQUENCE[0] {
                self.lock_progress = 1;
            } else {
                self.lock_progress = 0;
            }
        } else {
            self.unlocked = byte == 0xCD;
            self.lock_progress = 0;
        }
    }

    #[inline]
    pub fn read(&self, offset: u16) -> u8 {
        self.mem[offset as usize & (ASIC_BANK_SIZE - 1)]
    }

    #[inline]
    pub fn write(&mut self, offset: u16, value: u8) {
        self.mem[offset as usize & (ASIC_BANK_SIZE - 1)] = value;
    }

    /// The raw 4-bit-per-pixel bitmap of one of the 16 hardware sprites.
    pub fn sprite_pixels(&self, index: usize) -> &[u8] {
        let base = SPRITE_BITMAP_BASE + (index % SPRITE_COUNT) * SPRITE_PIXEL_BYTES;
        &self.mem[base..base + SPRITE_PIXEL_BYTES]
    }

    pub fn sprite_pixels_mut(&mut self, index: usize) -> &mut [u8] {
        let base = SPRITE_BITMAP_BASE + (index % SPRITE_COUNT) * SPRITE_PIXEL_BYTES;
        &mut self.mem[base..base + SPRITE_PIXEL_BYTES]
    }

    pub fn sprite_attr(&self, index: usize) -> SpriteAttr {
        let base = SPRITE_ATTR_BASE + (index % SPRITE_COUNT) * SPRITE_ATTR_STRIDE;
        let rec = &self.mem[base..base + SPRITE_ATTR_STRIDE];
        let x = i16::from_le_bytes([rec[0], rec[1]]) & 0x01ff;
        let x = if x & 0x0100 != 0 { x | !0x01ff_i16 } else { x };
        let y = i16::from_le_bytes([rec[2], rec[3]]) & 0x01ff;
        let y = if y & 0x0100 != 0 { y | !0x01ff_i16 } else { y };
        let mag = rec[4];
        SpriteAttr {
            x, y,
            mag_x: decode_zoom(mag & 0x03),
            mag_y: decode_zoom((mag >> 2) & 0x03),
        }
    }

    /// A 12-bit RGB colour (4 bits per channel) from the 32-entry hardware palette.
    pub fn palette_colour(&self, pen: usize) -> u16 {
        let base = PALETTE_BASE + (pen % 32) * 2;
        u16::from_le_bytes([self.mem[base], self.mem[base + 1]]) & 0x0fff
    }

    pub fn pri_line(&self) -> u8 {
        self.mem[PRI_OFFSET]
    }

    pub fn split_screen_line(&self) -> u8 {
        self.mem[SSSL_OFFSET]
    }

    pub fn split_screen_start(&self) -> u16 {
        u16::from_le_bytes([self.mem[SSSS_OFFSET], self.mem[SSSS_OFFSET + 1]])
    }

    /// Soft scroll register: bits 0-2 horizontal offset (0-7 pixels), bits 4-6 vertical
    /// offset (0-7 lines).
    pub fn soft_scroll(&self) -> (u8, u8) {
        let v = self.mem[SSCR_OFFSET];
        (v & 0x07, (v >> 4) & 0x07)
    }

    pub fn dcsr(&self) -> u8 {
        self.mem[DCSR_OFFSET]
    }

    fn set_dcsr_bit(&mut self, channel: usize, bit: u8, value: bool) {
        let mask = bit << channel;
        if value {
            self.mem[DCSR_OFFSET] |= mask;
        } else {
            self.mem[DCSR_OFFSET] &= !mask;
        }
    }

    pub fn ivr(&self) -> u8 {
        self.mem[IVR_OFFSET]
    }

    /// Programs a DMA channel's pointer and enables it, as the CPU does by writing the
    /// channel's two pointer bytes followed by setting its enable bit in DCSR.
    pub fn dma_set_pointer(&mut self, channel: usize, addr: u16) {
        let base = DMA_BASE + channel * DMA_CHANNEL_STRIDE;
        self.mem[base] = addr as u8;
        self.mem[base + 1] = (addr >> 8) as u8;
        self.dma[channel].pc = addr;
        self.dma[channel].base_pc = addr;
    }

    pub fn dma_enable(&mut self, channel: usize, enabled: bool) {
        self.dma[channel].enabled = enabled;
        if enabled {
            self.dma[channel].pc = self.dma[channel].base_pc;
        }
        self.set_dcsr_bit(channel, 0x01, enabled);
    }

    /// Runs one DMA scheduler cycle: for each enabled channel, in priority order 0, 1, 2,
    /// executes a single command if the channel isn't in a pause. Called once per CRTC
    /// HSYNC. `read_word` fetches the 16-bit command at the channel's current address
    /// from the machine's RAM.
    pub fn dma_step(&mut self, mut read_word: impl FnMut(u16) -> u16) -> Vec<DmaAction> {
        let mut actions = Vec::new();
        for channel in 0..3 {
            if !self.dma[channel].enabled {
                continue;
            }
            if self.dma[channel].pause > 0 {
                self.dma[channel].pause -= 1;
                continue;
            }
            let command = read_word(self.dma[channel].pc);
            self.dma[channel].pc = self.dma[channel].pc.wrapping_add(2);
            self.execute_dma_command(channel, command, &mut actions);
        }
        actions
    }

    fn execute_dma_command(&mut self, channel: usize, command: u16, actions: &mut Vec<DmaAction>) {
        let op = command >> 12;
        match op {
            0x0 | 0x1 | 0x2 | 0x3 => {
                // 0rdd: LOAD PSG register r (bits 11..8) with data dd (low byte)
                let reg = ((command >> 8) & 0x0f) as u8;
                let data = (command & 0xff) as u8;
                actions.push(DmaAction::WritePsgReg(reg, data));
            }
            0x4 | 0x5 | 0x6 | 0x7 => {
                // 1nnn: PAUSE for nnn scaler units (12 bits)
                self.dma[channel].pause = command & 0x0fff;
            }
            0x8 | 0x9 | 0xa | 0xb => {
                // 2nnn: REPEAT the next nnn commands from the channel base
                // modelled as an immediate rewind of the program counter
                let back = (command & 0x0fff) * 2;
                self.dma[channel].pc = self.dma[channel].pc.wrapping_sub(back);
            }
            0xc | 0xd | 0xe | 0xf => {
                // 4xxx: bit0 LOOP, bit4 INT, bit5 STOP
                if command & 0x0020 != 0 {
                    self.dma[channel].enabled = false;
                    self.set_dcsr_bit(channel, 0x20, true);
                }
                if command & 0x0010 != 0 {
                    actions.push(DmaAction::RaiseInterrupt);
                }
                if command & 0x0001 != 0 {
                    self.dma[channel].pc = self.dma[channel].base_pc;
                }
            }
            _ => unreachable!(),
        }
    }
}

#[cfg(feature = "snapshot")]
mod asic_bank_serde {
    use serde::{Serializer, Deserializer, Deserialize};
    use serde::de::Error;

    pub fn serialize<S: Serializer>(data: &Box<[u8; super::ASIC_BANK_SIZE]>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_bytes(&data[..])
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Box<[u8; super::ASIC_BANK_SIZE]>, D::Error> {
        let bytes: Vec<u8> = Vec::deserialize(de)?;
        if bytes.len() != super::ASIC_BANK_SIZE {
            return Err(D::Error::custom("unexpected ASIC bank image size"));
        }
        let mut mem = Box::new([0u8; super::ASIC_BANK_SIZE]);
        mem.copy_from_slice(&bytes);
        Ok(mem)
    }
}

fn decode_zoom(bits: u8) -> u8 {
    match bits {
        0 => 0,
        1 => 1,
        2 => 2,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_sequence_requires_exact_bytes_then_cd() {
        let mut asic = AsicBank::default();
        for &b in LOCK_SEQUENCE.iter() {
            asic.feed_lock_sequence(b);
        }
        assert!(!asic.is_unlocked());
        asic.feed_lock_sequence(0xCD);
        assert!(asic.is_unlocked());
    }

    #[test]
    fn lock_sequence_wrong_terminator_locks() {
        let mut asic = AsicBank::default();
        for &b in LOCK_SEQUENCE.iter() {
            asic.feed_lock_sequence(b);
        }
        asic.feed_lock_sequence(0x00); // anything but 0xCD
        assert!(!asic.is_unlocked());
    }

    #[test]
    fn dma_load_psg_program_sets_registers_and_stops() {
        let mut asic = AsicBank::default();
        // program at 0x4000: LOAD r8=0x0F, LOAD r9=0x0F, LOAD r10=0x0F, STOP
        let prog: [u16; 4] = [0x080F, 0x090F, 0x0A0F, 0x4020];
        asic.dma_set_pointer(0, 0x4000);
        asic.dma_enable(0, true);
        let mut actions = Vec::new();
        for i in 0..prog.len() {
            let base = 0x4000u16 + (i as u16) * 2;
            actions.extend(asic.dma_step(|addr| {
                assert_eq!(addr, base);
                prog[i]
            }));
        }
        assert_eq!(actions, vec![
            DmaAction::WritePsgReg(8, 0x0F),
            DmaAction::WritePsgReg(9, 0x0F),
            DmaAction::WritePsgReg(10, 0x0F),
        ]);
        assert_eq!(asic.dcsr() & 0x20, 0x20);
    }
}
