/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! [VideoFrame] timing constants for the CPC's CRTC-driven raster.
//!
//! Unlike the Spectrum ULA, the CPC's Z80 isn't contended by address range: the Gate
//! Array instead stretches *every* memory and I/O access uniformly so the CPU stays in
//! lock-step with the 16MHz dot clock, regardless of what the CRTC is currently
//! displaying. [CpcMemoryContention] therefore never reports a contended address, and
//! [CpcVideoFrame::contention] is the identity function; the even, frame-wide wait state
//! is folded into the per-opcode timing table instead of per-address contention, a
//! simplification over cycle-exact hardware noted in `DESIGN.md`.
use core::iter::StepBy;
use core::ops::Range;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use crate::clock::{Ts, MemoryContention};
use crate::video::{BorderSize, VideoFrame, MAX_BORDER_SIZE};

/// A CPC video frame: 64 characters/line (256 T-states at 4 T-states/character) times
/// 312 lines, the standard 50.08Hz CRTC program used by the CPC firmware.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct CpcVideoFrame;

/// The CPC applies no address-dependent memory contention: the Gate Array stretches
/// every CPU cycle uniformly to stay in sync with the video bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct CpcMemoryContention;

impl MemoryContention for CpcMemoryContention {
    #[inline(always)]
    fn is_contended_address(self, _address: u16) -> bool {
        false
    }
}

impl VideoFrame for CpcVideoFrame {
    const HTS_RANGE: Range<Ts> = 0..256;
    const VSL_BORDER_TOP: Ts = 0;
    const VSL_PIXELS: Range<Ts> = 64..264;
    const VSL_BORDER_BOT: Ts = 311;
    const VSL_COUNT: Ts = 312;

    type BorderHtsIter = StepBy<Range<Ts>>;

    fn border_whole_line_hts_iter(border_size: BorderSize) -> Self::BorderHtsIter {
        let inv = ((MAX_BORDER_SIZE - Self::border_size_pixels(border_size)) / 2) as Ts;
        (inv..256 - inv).step_by(4)
    }

    fn border_left_hts_iter(border_size: BorderSize) -> Self::BorderHtsIter {
        let inv = ((MAX_BORDER_SIZE - Self::border_size_pixels(border_size)) / 2) as Ts;
        (inv..64).step_by(4)
    }

    fn border_right_hts_iter(border_size: BorderSize) -> Self::BorderHtsIter {
        let inv = ((MAX_BORDER_SIZE - Self::border_size_pixels(border_size)) / 2) as Ts;
        (224..256 - inv).step_by(4)
    }

    #[inline(always)]
    fn contention(hc: Ts) -> Ts {
        hc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_tstates_match_known_cpc_timing() {
        assert_eq!(CpcVideoFrame::FRAME_TSTATES_COUNT, 79872);
    }
}
