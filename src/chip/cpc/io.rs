/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! [Io]/[Memory] host wiring for [Cpc464] and [CpcPlus], plus the lazy CRTC catch-up that
//! keeps the Gate Array's interrupt counter and (on the Plus) the DMA scheduler in step
//! with the CPU without ticking the CRTC on every single memory access.
//!
//! CPC I/O decoding is coarser than the Spectrum's: each device only looks at a handful
//! of upper address bits and ignores the rest, so several addresses alias the same
//! register. The high-bit decode below follows the well known CPC hardware map:
//!
//! - `A15=0, A14=1` (`0x4000..0x8000`): Gate Array function register (`0x7Fxx` by
//!   convention). On the Plus, the sub-range with `A12=0` (e.g. `0x6Cxx`) instead feeds
//!   the ASIC lock sequence, mirroring how the Plus repurposes part of that chip-select
//!   window for its own unlocking handshake without stealing the canonical `0x7Fxx` Gate
//!   Array address.
//! - `A15=1, A14=0` (`0x8000..0xc000`): CRTC, sub-selected by `A9:A8` into select
//!   (`0xBCxx`), write data (`0xBDxx`), and read data (`0xBFxx`).
//! - `A15=1, A14=1, A13=0` (`0xC000..0xE000`): upper ROM bank select (`0xDFxx`).
//! - `A15=1, A14=1, A13=1, A11=0` (`0xF4xx..0xF8xx`): the 8255 PPI, sub-selected by
//!   `A9:A8` into port A (PSG data bus), port B (status inputs), port C (PSG
//!   function/keyboard line select) and the mode control register.
//!
//! The PSG itself isn't addressed directly: the Z80 only ever talks to the 8255, which
//! drives the AY's BDIR/BC1 lines from port C's top two bits. [CpcPpi] reproduces that
//! indirection and forwards the resulting select/write/read onto `self.bus`, the same
//! generic [BusDevice] chain the ULA attaches its peripherals to, using [CpcPsgPortDecode]
//! to translate the PPI's three-wire protocol into the bus's address based dispatch.
use core::num::NonZeroU16;

use crate::z80emu::{Io, Memory};
use crate::bus::BusDevice;
use crate::clock::{VideoTs, VFrameTs};
use crate::memory::{ZxMemory, MemoryExtension, CpcMemoryControl};
use crate::peripherals::ay::AyPortDecode;
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};
use crate::video::VideoFrame;

use super::crtc::CrtcStatus;
use super::plus_asic::DmaAction;
use super::video::CpcVideoFrame;
use super::{Cpc464, CpcPlus};

/// A synthetic [AyPortDecode] used to dispatch the PSG's select/write/read functions,
/// decoded from the 8255 PPI's port C rather than from a real Z80 address bus access.
/// The three constants are dispatch tags, not addresses real software ever issues.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpcPsgPortDecode;

impl AyPortDecode for CpcPsgPortDecode {
    const PORT_MASK: u16 = 0xffc0;
    const PORT_SELECT: u16 = 0xf640;
    const PORT_DATA_READ: u16 = 0xf600;
    const PORT_DATA_WRITE: u16 = 0xf680;
}

const PSG_SELECT_PORT: u16 = 0xf640;
const PSG_READ_PORT: u16 = 0xf600;
const PSG_WRITE_PORT: u16 = 0xf680;

/// The 8255 Programmable Peripheral Interface wiring the Z80 to the PSG's data bus,
/// the keyboard matrix's line select, and a handful of status inputs on port B.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct CpcPpi {
    port_a: u8,
    port_c: u8,
}

impl CpcPpi {
    fn psg_function(&self) -> u8 {
        self.port_c >> 6 & 0x03
    }
}

macro_rules! impl_cpc_io {
    ($ty:ident) => {
        impl<M, B, X> $ty<M, B, X>
            where M: ZxMemory,
                  B: BusDevice,
                  B::Timestamp: From<VFrameTs<CpcVideoFrame>>
        {
            /// Ticks the CRTC, one character at a time, from the last synced position up
            /// to `target`, feeding every HSYNC/VSYNC edge to the Gate Array (and, on the
            /// Plus, the DMA scheduler and PRI check). Called from [Io::is_irq], which
            /// z80emu polls after (nearly) every instruction, so interrupt timing stays
            /// accurate without a per-access tick.
            fn sync_crtc_to(&mut self, target: VideoTs) {
                let target_ts = CpcVideoFrame::vc_hc_to_tstates(target.vc, target.hc);
                while self.crtc_synced_tstates + 4 <= target_ts {
                    let status = self.crtc.tick();
                    self.crtc_synced_tstates += 4;
                    self.on_crtc_status(status);
                }
            }

            #[inline]
            fn ppi_write(&mut self, port: u16, data: u8, ts: VideoTs) -> Option<NonZeroU16> {
                match port >> 8 & 0x03 {
                    0 => {
                        self.ppi.port_a = data;
                        None
                    }
                    2 => {
                        let was_select = self.ppi.psg_function() == 0b11;
                        self.ppi.port_c = data;
                        self.keyboard.select_line(data & 0x0f);
                        let ws = match self.ppi.psg_function() {
                            0b11 if !was_select => {
                                self.bus.write_io(PSG_SELECT_PORT, self.ppi.port_a, VFrameTs::<CpcVideoFrame>::from(ts).into())
                            }
                            0b10 => {
                                self.bus.write_io(PSG_WRITE_PORT, self.ppi.port_a, VFrameTs::<CpcVideoFrame>::from(ts).into())
                            }
                            _ => None,
                        };
                        ws.and_then(|ws| NonZeroU16::new(ws))
                    }
                    _ => None, // port B is read-only, control register not modelled bit-wise
                }
            }

            #[inline]
            fn ppi_read(&mut self, port: u16, ts: VideoTs) -> u8 {
                match port >> 8 & 0x03 {
                    0 => {
                        if self.ppi.psg_function() == 0b01 {
                            if let Some((data, _)) = self.bus.read_io(PSG_READ_PORT, VFrameTs::<CpcVideoFrame>::from(ts).into()) {
                                return data;
                            }
                            return self.keyboard.read_line();
                        }
                        self.ppi.port_a
                    }
                    1 => 0b0100_0000 | u8::from(self.crtc.vsync()),
                    2 => self.ppi.port_c,
                    _ => 0xff,
                }
            }

            fn crtc_port_read(&self, port: u16) -> u8 {
                match port >> 8 & 0x03 {
                    0b11 => self.crtc.read(),
                    _ => 0,
                }
            }

            fn crtc_port_write(&mut self, port: u16, data: u8) {
                match port >> 8 & 0x03 {
                    0b00 => self.crtc.select(data),
                    0b01 => self.crtc.write(data),
                    _ => {}
                }
            }
        }
    }
}

impl_cpc_io!(Cpc464);
impl_cpc_io!(CpcPlus);

impl<M, B, X> Cpc464<M, B, X> {
    fn on_crtc_status(&mut self, status: CrtcStatus) {
        if status.hsync_rising {
            self.gate_array.on_hsync();
        }
        if status.vsync_rising {
            self.gate_array.on_vsync();
        }
    }

    /// Consumes the interrupt line if asserted, acknowledging the Gate Array's counter in
    /// the same step. See [Io::is_irq][crate::z80emu::Io::is_irq] for why acknowledge is
    /// folded into the query rather than a separate callback.
    fn take_irq(&mut self) -> bool {
        if self.gate_array.irq_pending() {
            self.gate_array.acknowledge_interrupt();
            true
        } else {
            false
        }
    }
}

impl<M, B, X> CpcPlus<M, B, X>
    where M: ZxMemory,
          B: BusDevice,
          B::Timestamp: From<VFrameTs<CpcVideoFrame>>
{
    fn on_crtc_status(&mut self, status: CrtcStatus) {
        if status.hsync_rising {
            self.gate_array.on_hsync();
            let memory = &self.memory;
            for action in self.asic.dma_step(|addr| memory.read16(addr)) {
                match action {
                    DmaAction::WritePsgReg(reg, data) => {
                        let ts = self.tsc.into();
                        self.bus.write_io(PSG_SELECT_PORT, reg, ts);
                        self.bus.write_io(PSG_WRITE_PORT, data, ts);
                    }
                    DmaAction::RaiseInterrupt => {
                        self.pri_irq_armed = true;
                    }
                }
            }
        }
        if status.vsync_rising {
            self.gate_array.on_vsync();
        }
    }

    /// Consumes the interrupt line if asserted: the Plus ASIC's programmable raster
    /// interrupt takes priority over the Gate Array's counter, matching how the real
    /// ASIC's PRI output overrides the legacy interrupt path while armed.
    fn take_irq(&mut self) -> bool {
        if self.pri_irq_armed {
            self.pri_irq_armed = false;
            true
        } else if self.gate_array.irq_pending() {
            self.gate_array.acknowledge_interrupt();
            true
        } else {
            false
        }
    }
}

macro_rules! impl_cpc_bus_io {
    ($ty:ident) => {
        impl<M, B, X> Io for $ty<M, B, X>
            where M: ZxMemory + CpcMemoryControl,
                  B: BusDevice,
                  B::Timestamp: From<VFrameTs<CpcVideoFrame>>
        {
            type Timestamp = VideoTs;
            type WrIoBreak = ();
            type RetiBreak = ();

            #[inline]
            fn is_irq(&mut self, ts: VideoTs) -> bool {
                self.sync_crtc_to(ts);
                // z80emu only calls is_irq when it's about to actually service the
                // interrupt, so take_irq's acknowledge doubles as the response to that
                // (there's no separate M1/IORQ callback to hook it onto).
                self.take_irq()
            }

            fn read_io(&mut self, port: u16, ts: VideoTs) -> (u8, Option<NonZeroU16>) {
                self.sync_crtc_to(ts);
                if port & 0xc000 == 0x8000 {
                    return (self.crtc_port_read(port), None);
                }
                if port & 0xf800 == 0xf000 {
                    return (self.ppi_read(port, ts), None);
                }
                self.bus.read_io(port, VFrameTs::<CpcVideoFrame>::from(ts).into())
                    .unwrap_or((0xff, None))
            }

            fn write_io(&mut self, port: u16, data: u8, ts: VideoTs) -> (Option<()>, Option<NonZeroU16>) {
                self.sync_crtc_to(ts);

                if port & 0xc000 == 0x4000 {
                    self.gate_array_or_lock_write(port, data);
                    return (None, None);
                }
                if port & 0xc000 == 0x8000 {
                    self.crtc_port_write(port, data);
                    return (None, None);
                }
                if port & 0xe000 == 0xc000 {
                    self.memory.select_rom(data);
                    return (None, None);
                }
                if port & 0xf800 == 0xf000 {
                    let ws = self.ppi_write(port, data, ts);
                    return (None, ws);
                }
                if let Some(ws) = self.bus.write_io(port, data, VFrameTs::<CpcVideoFrame>::from(ts).into()) {
                    return (None, NonZeroU16::new(ws));
                }
                (None, None)
            }
        }

        impl<M, B, X> Memory for $ty<M, B, X>
            where M: ZxMemory,
                  X: MemoryExtension
        {
            type Timestamp = VideoTs;

            #[inline(always)]
            fn read_debug(&self, addr: u16) -> u8 {
                self.memory.read(addr)
            }

            #[inline(always)]
            fn read_mem(&self, addr: u16, _ts: VideoTs) -> u8 {
                self.memory.read(addr)
            }

            #[inline(always)]
            fn read_mem16(&self, addr: u16, _ts: VideoTs) -> u16 {
                self.memory.read16(addr)
            }

            #[inline(always)]
            fn read_opcode(&mut self, pc: u16, _ir: u16, _ts: VideoTs) -> u8 {
                self.memext.read_opcode(pc, &mut self.memory)
            }

            #[inline(always)]
            fn write_mem(&mut self, addr: u16, val: u8, _ts: VideoTs) {
                self.memory.write(addr, val);
            }
        }
    }
}

impl_cpc_bus_io!(Cpc464);
impl_cpc_bus_io!(CpcPlus);

impl<M, B, X> Cpc464<M, B, X>
    where M: ZxMemory + CpcMemoryControl
{
    fn gate_array_or_lock_write(&mut self, _port: u16, data: u8) {
        if let Some(change) = self.gate_array.write(data) {
            self.memory.set_rom_enable(change.lower, change.upper);
        } else if data >> 6 == 0b11 {
            self.memory.select_ram(data);
        }
    }
}

impl<M, B, X> CpcPlus<M, B, X>
    where M: ZxMemory + CpcMemoryControl
{
    fn gate_array_or_lock_write(&mut self, port: u16, data: u8) {
        if port & 0x1000 == 0 {
            self.asic.feed_lock_sequence(data);
            return;
        }
        if let Some(change) = self.gate_array.write(data) {
            self.memory.set_rom_enable(change.lower, change.upper);
        } else if data >> 6 == 0b11 {
            self.memory.select_ram(data);
        }
    }
}
