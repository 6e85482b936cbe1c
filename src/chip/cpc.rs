/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! An emulator of the Amstrad CPC's chipset: CRTC 6845 + Gate Array (CPC464/664/6128),
//! and additionally the Plus ASIC (CPC Plus/GX4000).
//!
//! Structurally this mirrors [crate::chip::ula]: a concrete chip struct owning the
//! memory, the first bus device and a memory extension, implementing [ControlUnit] and
//! [MemoryAccess], with the actual per-frame execution loop borrowed unchanged from the
//! ULA's [crate::chip::ula::UlaCpuExt] — the CPU doesn't care whether the device driving
//! its wait states is a ULA or a Gate Array, only that [UlaTimestamp] tells it where in
//! the frame it is.
#![macro_use]
use core::fmt;
use core::num::Wrapping;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use crate::z80emu::{host::Result, Cpu};
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use crate::bus::{BusDevice, VFNullDevice};
use crate::chip::{FrameState, ControlUnit, MemoryAccess};
use crate::memory::{ZxMemory, MemoryExtension, NoMemoryExtension};
use crate::clock::{FTs, VFrameTs, VFrameTsCounter, VideoTs};

pub mod crtc;
pub mod gate_array;
pub mod plus_asic;
pub mod video;
pub mod keyboard;
mod io;

use crate::chip::ula::{UlaCpuExt, UlaTimestamp};
pub use crtc::{Crtc, CrtcType, CrtcStatus};
pub use gate_array::{GateArray, ScreenMode, RomEnableChange};
pub use plus_asic::{AsicBank, DmaAction, SpriteAttr};
pub use video::{CpcVideoFrame, CpcMemoryContention};
pub use keyboard::CpcKeyboard;

/// A CPC464/664/6128: CRTC 6845 + Gate Array, no Plus ASIC.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone)]
pub struct Cpc464<M, B=VFNullDevice<CpcVideoFrame>, X=NoMemoryExtension> {
    pub(super) frames: Wrapping<u64>,
    pub(super) tsc: VFrameTs<CpcVideoFrame>,
    pub(super) memory: M,
    pub(super) bus: B,
    pub(super) memext: X,
    pub(super) crtc: Crtc,
    pub(super) gate_array: GateArray,
    #[cfg_attr(feature = "snapshot", serde(skip))]
    pub(super) keyboard: CpcKeyboard,
    /// How many T-states of the current frame the CRTC has already been ticked through;
    /// `io.rs`'s `sync_crtc_to` catches it up to the CPU's current timestamp lazily,
    /// character by character, rather than ticking eagerly on every memory access.
    pub(super) crtc_synced_tstates: FTs,
    pub(super) ppi: io::CpcPpi,
}

/// A CPC Plus / GX4000: the same CRTC + Gate Array plus the Plus ASIC (sprites, DMA,
/// 32-colour palette, soft scroll, programmable raster interrupt).
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone)]
pub struct CpcPlus<M, B=VFNullDevice<CpcVideoFrame>, X=NoMemoryExtension> {
    pub(super) frames: Wrapping<u64>,
    pub(super) tsc: VFrameTs<CpcVideoFrame>,
    pub(super) memory: M,
    pub(super) bus: B,
    pub(super) memext: X,
    pub(super) crtc: Crtc,
    pub(super) gate_array: GateArray,
    #[cfg_attr(feature = "snapshot", serde(skip))]
    pub(super) keyboard: CpcKeyboard,
    pub(super) asic: AsicBank,
    pub(super) pri_irq_armed: bool,
    /// How many T-states of the current frame the CRTC has already been ticked through;
    /// `io.rs`'s `sync_crtc_to` catches it up to the CPU's current timestamp lazily,
    /// character by character, rather than ticking eagerly on every memory access.
    pub(super) crtc_synced_tstates: FTs,
    pub(super) ppi: io::CpcPpi,
}

macro_rules! impl_common_cpc_chip {
    ($ty:ident) => {
        impl<M, B, X> Default for $ty<M, B, X>
            where M: Default, B: Default, X: Default
        {
            fn default() -> Self {
                Self::extra_default()
            }
        }

        impl<M, B, X> fmt::Debug for $ty<M, B, X>
            where M: ZxMemory, B: BusDevice, X: MemoryExtension
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("frames", &self.frames.0)
                    .field("tsc", &self.tsc)
                    .field("memory", &self.memory.mem_ref().len())
                    .field("bus", &self.bus)
                    .field("crtc", &self.crtc)
                    .field("gate_array", &self.gate_array)
                    .finish()
            }
        }

        impl<M, B, X> FrameState for $ty<M, B, X> {
            fn current_frame(&self) -> u64 { self.frames.0 }
            fn set_frame_counter(&mut self, fc: u64) { self.frames = Wrapping(fc); }
            fn frame_tstate(&self) -> (u64, FTs) { self.tsc.into_frame_tstates(self.frames.0) }
            fn current_tstate(&self) -> FTs { self.tsc.into_tstates() }
            fn set_frame_tstate(&mut self, ts: FTs) {
                let ts = ts.rem_euclid(CpcVideoFrame::FRAME_TSTATES_COUNT);
                self.tsc = VFrameTs::from_tstates(ts);
            }
            fn is_frame_over(&self) -> bool { self.tsc.is_eof() }
        }

        impl<M, B, X> MemoryAccess for $ty<M, B, X>
            where M: ZxMemory, X: MemoryExtension
        {
            type Memory = M;
            type MemoryExt = X;
            #[inline(always)]
            fn memory_ext_ref(&self) -> &Self::MemoryExt { &self.memext }
            #[inline(always)]
            fn memory_ext_mut(&mut self) -> &mut Self::MemoryExt { &mut self.memext }
            #[inline(always)]
            fn memory_mut(&mut self) -> &mut Self::Memory { &mut self.memory }
            #[inline(always)]
            fn memory_ref(&self) -> &Self::Memory { &self.memory }
            fn memory_with_ext_mut(&mut self) -> (&mut Self::Memory, &mut Self::MemoryExt) {
                (&mut self.memory, &mut self.memext)
            }
        }

        impl<M, B, X> ControlUnit for $ty<M, B, X>
            where M: ZxMemory,
                  B: BusDevice,
                  B::Timestamp: From<VFrameTs<CpcVideoFrame>>,
                  X: MemoryExtension
        {
            type BusDevice = B;
            fn bus_device_mut(&mut self) -> &mut Self::BusDevice { &mut self.bus }
            fn bus_device_ref(&self) -> &Self::BusDevice { &self.bus }
            fn into_bus_device(self) -> Self::BusDevice { self.bus }

            fn reset<C: Cpu>(&mut self, cpu: &mut C, hard: bool) {
                if hard {
                    cpu.reset();
                    self.bus.reset(self.tsc.into());
                    self.memory.reset();
                    self.crtc = Crtc::default();
                    self.gate_array = GateArray::default();
                } else {
                    const DEBUG: Option<crate::z80emu::CpuDebugFn> = None;
                    let mut vtsc = VFrameTsCounter::from_vframe_ts(
                        VFrameTs::<CpcVideoFrame>::default(), CpcMemoryContention);
                    let _ = cpu.execute_instruction(self, &mut vtsc, DEBUG,
                        crate::z80emu::opconsts::RST_00H_OPCODE);
                }
            }

            fn nmi<C: Cpu>(&mut self, cpu: &mut C) -> bool {
                self.ula_nmi::<CpcMemoryContention, C>(cpu)
            }

            fn execute_next_frame<C: Cpu>(&mut self, cpu: &mut C) {
                while !self.ula_execute_next_frame_with_breaks::<CpcMemoryContention, C>(cpu) {}
            }

            fn ensure_next_frame(&mut self) {
                let _ = self.ensure_next_frame_vtsc::<CpcMemoryContention>();
            }

            fn execute_single_step<C: Cpu, F: FnOnce(crate::z80emu::CpuDebug)>(
                    &mut self, cpu: &mut C, debug: Option<F>
                ) -> Result<(),()>
            {
                self.ula_execute_single_step::<CpcMemoryContention, C, F>(cpu, debug)
            }
        }

        impl<M, B, X> UlaTimestamp for $ty<M, B, X> {
            type VideoFrame = CpcVideoFrame;
            #[inline(always)]
            fn video_ts(&self) -> VideoTs { self.tsc.into() }
            #[inline(always)]
            fn set_video_ts(&mut self, vts: VideoTs) { self.tsc = vts.into(); }
            fn ensure_next_frame_vtsc<T: crate::clock::MemoryContention>(&mut self)
                -> VFrameTsCounter<CpcVideoFrame, T>
            {
                let mut vtsc = VFrameTsCounter::from_vframe_ts(self.tsc, T::default());
                if vtsc.is_eof() {
                    self.bus.next_frame(VFrameTs::<CpcVideoFrame>::EOF.into());
                    self.frames += Wrapping(1);
                    vtsc.wrap_frame();
                    self.tsc = vtsc.into();
                }
                vtsc
            }
        }
    }
}

impl_common_cpc_chip!(Cpc464);
impl_common_cpc_chip!(CpcPlus);

impl<M, B, X> Cpc464<M, B, X> {
    fn extra_default() -> Self where M: Default, B: Default, X: Default {
        Cpc464 {
            frames: Wrapping(0), tsc: VFrameTs::default(),
            memory: M::default(), bus: B::default(), memext: X::default(),
            crtc: Crtc::default(), gate_array: GateArray::default(),
            keyboard: CpcKeyboard::default(),
            crtc_synced_tstates: 0,
            ppi: io::CpcPpi::default(),
        }
    }

    pub fn crtc(&self) -> &Crtc { &self.crtc }
    pub fn crtc_mut(&mut self) -> &mut Crtc { &mut self.crtc }
    pub fn gate_array(&self) -> &GateArray { &self.gate_array }
    pub fn keyboard_mut(&mut self) -> &mut CpcKeyboard { &mut self.keyboard }
}

impl<M, B, X> CpcPlus<M, B, X> {
    fn extra_default() -> Self where M: Default, B: Default, X: Default {
        CpcPlus {
            frames: Wrapping(0), tsc: VFrameTs::default(),
            memory: M::default(), bus: B::default(), memext: X::default(),
            crtc: Crtc::default(), gate_array: GateArray::default(),
            keyboard: CpcKeyboard::default(),
            asic: AsicBank::default(), pri_irq_armed: false,
            crtc_synced_tstates: 0,
            ppi: io::CpcPpi::default(),
        }
    }

    pub fn crtc(&self) -> &Crtc { &self.crtc }
    pub fn crtc_mut(&mut self) -> &mut Crtc { &mut self.crtc }
    pub fn gate_array(&self) -> &GateArray { &self.gate_array }
    pub fn keyboard_mut(&mut self) -> &mut CpcKeyboard { &mut self.keyboard }
    pub fn asic(&self) -> &AsicBank { &self.asic }
    pub fn asic_mut(&mut self) -> &mut AsicBank { &mut self.asic }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::CpcMemory;

    type TestCpc = Cpc464<CpcMemory>;

    #[test]
    fn default_frame_is_not_over() {
        let cpc = TestCpc::default();
        assert!(!cpc.is_frame_over());
        assert_eq!(cpc.current_frame(), 0);
    }
}
