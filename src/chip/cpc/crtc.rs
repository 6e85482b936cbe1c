/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A Motorola 6845 (and compatible HD6845S/UM6845R) CRT controller, wired the way the
//! Amstrad CPC's Gate Array drives it: clocked once per character (16 pixel-clocks),
//! with only the registers the CPC firmware actually programs exposed for reading.
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// Which flavour of 6845 clone is installed. The three variants disagree on a handful of
/// edge cases around register 0 and the syncwidth registers (3, 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum CrtcType {
    /// Type 0: found in the CPC464/664. Rejects `R0 == 0`, keeping the previous value.
    Type0,
    /// Type 1: found in some CPC6128s. No special casing of `R0`.
    Type1,
    /// Type 3/4 (HD6845S, used in the CPC+/GX4000 and some 6128 Plus boards). Sync width
    /// registers (R3 low/high) compare with `>=` rather than `==`.
    Type3,
}

impl Default for CrtcType {
    fn default() -> Self { CrtcType::Type1 }
}

/// Register bit masks, one per CRTC register, `0xff` meaning "all bits significant".
const REG_MASKS: [u8; 18] = [
    0xff, 0xff, 0xff, 0xff, // R0 HTotal, R1 HDisplayed, R2 HSyncPos, R3 SyncWidths
    0x7f, 0x1f, 0x7f, 0x7f, // R4 VTotal,  R5 VTotalAdj, R6 VDisplayed, R7 VSyncPos
    0x03, 0x1f, 0x7f, 0x1f, // R8 Interlace, R9 MaxRasterAddr, R10 CursorStart, R11 CursorEnd
    0x3f, 0xff, 0x3f, 0xff, // R12 StartAddrHi, R13 StartAddrLo, R14 CursorHi, R15 CursorLo
    0x3f, 0xff,             // R16 LightPenHi (read-only), R17 LightPenLo (read-only)
];

/// Status bits reported by [Crtc::status], mirroring the composite signals the Gate Array
/// and the Plus ASIC both probe on every CRTC tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrtcStatus {
    pub hsync: bool,
    pub vsync: bool,
    /// `true` exactly on the character where HSYNC first asserts.
    pub hsync_rising: bool,
    /// `true` exactly on the character where VSYNC first asserts.
    pub vsync_rising: bool,
    pub h_off: bool,
    pub v_off: bool,
    pub invis: bool,
    pub reg8_skew: bool,
    pub vta_active: bool,
    pub r0_ok: bool,
    pub r4_ok: bool,
    pub r9_ok: bool,
}

/// A Motorola 6845 CRT controller with 18 internal registers, ticked once per displayed
/// character (every 16 pixel-clocks on the CPC's 1MHz character clock).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct Crtc {
    kind: CrtcType,
    address: u8,
    regs: [u8; 18],
    // character (horizontal) counter, 0..=R0
    hc: u8,
    // character row (vertical) counter, 0..=R4
    vc: u8,
    // raster line within a character row, 0..=R9
    ra: u8,
    // vertical total adjust counter, used while finishing the frame past R4/R9
    vta: u8,
    in_vta: bool,
    hsync_width_count: u8,
    in_hsync: bool,
    vsync_line_count: u8,
    in_vsync: bool,
    // memory address latched at the start of the current character row
    row_start_addr: u16,
    // running memory address, advanced once per character
    ma: u16,
}

impl Default for Crtc {
    fn default() -> Self {
        Crtc {
            kind: CrtcType::default(),
            address: 0,
            regs: [0; 18],
            hc: 0,
            vc: 0,
            ra: 0,
            vta: 0,
            in_vta: false,
            hsync_width_count: 0,
            in_hsync: false,
            vsync_line_count: 0,
            in_vsync: false,
            row_start_addr: 0,
            ma: 0,
        }
    }
}

impl Crtc {
    pub fn new(kind: CrtcType) -> Self {
        Crtc { kind, ..Default::default() }
    }

    pub fn kind(&self) -> CrtcType {
        self.kind
    }

    /// Writes the register select (address) latch, I/O port `0xBCxx`.
    #[inline]
    pub fn select(&mut self, reg: u8) {
        self.address = reg & 0x1f;
    }

    pub fn selected(&self) -> u8 {
        self.address
    }

    /// Writes a value into the currently selected register, I/O port `0xBDxx`.
    pub fn write(&mut self, value: u8) {
        let index = self.address;
        if index >= 18 {
            return; // registers 18..31 don't exist, writes are ignored
        }
        let mut value = value & REG_MASKS[index as usize];
        if index == 0 {
            // R0 == 0 is physically impossible; type 0 keeps the previous value
            if value == 0 && matches!(self.kind, CrtcType::Type0) {
                value = self.regs[0];
            }
        }
        self.regs[index as usize] = value;
    }

    /// Reads the currently selected register. Only registers 12-17 are readable on real
    /// hardware; everything else returns the last value latched on the data bus.
    pub fn read(&self) -> u8 {
        match self.address {
            12..=17 => self.regs[self.address as usize],
            _ => 0,
        }
    }

    pub fn reg(&self, index: usize) -> u8 {
        self.regs[index]
    }

    /// The 14-bit start address (R12:R13), used by the Gate Array to compute the base
    /// of the visible screen.
    #[inline]
    pub fn start_address(&self) -> u16 {
        (u16::from(self.regs[12] & 0x3f) << 8) | u16::from(self.regs[13])
    }

    /// The current running memory address as seen on the CRTC's MA0-MA13 pins.
    #[inline]
    pub fn memory_address(&self) -> u16 {
        self.ma
    }

    /// The current raster line within the character row, on the CRTC's RA0-RA4 pins.
    #[inline]
    pub fn raster_address(&self) -> u8 {
        self.ra
    }

    /// Whether VSYNC is currently asserted, as wired to the CPC's `/50HZ` status line.
    #[inline]
    pub fn vsync(&self) -> bool {
        self.in_vsync
    }

    fn r0(&self) -> u8 { self.regs[0] }
    fn r1(&self) -> u8 { self.regs[1] }
    fn r2(&self) -> u8 { self.regs[2] }
    fn r3_hwidth(&self) -> u8 {
        let w = self.regs[3] & 0x0f;
        if w == 0 { 16 } else { w }
    }
    fn r3_vwidth(&self) -> u8 {
        let w = (self.regs[3] >> 4) & 0x0f;
        if w == 0 { 16 } else { w }
    }
    fn r4(&self) -> u8 { self.regs[4] }
    fn r5(&self) -> u8 { self.regs[5] }
    fn r6(&self) -> u8 { self.regs[6] }
    fn r7(&self) -> u8 { self.regs[7] }
    fn r9(&self) -> u8 { self.regs[9] }

    fn hwidth_done(&self, count: u8) -> bool {
        match self.kind {
            CrtcType::Type3 => count >= self.r3_hwidth(),
            _ => count == self.r3_hwidth(),
        }
    }

    fn vwidth_done(&self, count: u8) -> bool {
        match self.kind {
            CrtcType::Type3 => count >= self.r3_vwidth(),
            _ => count == self.r3_vwidth(),
        }
    }

    /// Advances the CRTC by exactly one character (16 pixel-clocks on the CPC). Returns the
    /// composite status word the Gate Array reads to drive its interrupt counter and mode
    /// decoder.
    pub fn tick(&mut self) -> CrtcStatus {
        let mut status = CrtcStatus::default();

        status.h_off = self.hc >= self.r1();
        status.hsync = self.in_hsync;
        status.vsync = self.in_vsync;
        status.r0_ok = self.hc == self.r0();
        status.r4_ok = self.vc == self.r4();
        status.r9_ok = self.ra == self.r9();
        status.reg8_skew = self.regs[8] != 0;
        status.vta_active = self.in_vta;
        status.v_off = self.vc >= self.r6();
        status.invis = status.h_off || status.v_off;

        if !status.h_off {
            self.ma = self.ma.wrapping_add(1);
        }

        if self.hc == self.r2() && !self.in_hsync {
            self.in_hsync = true;
            self.hsync_width_count = 0;
            status.hsync_rising = true;
        }
        if self.in_hsync {
            self.hsync_width_count += 1;
            if self.hwidth_done(self.hsync_width_count) {
                self.in_hsync = false;
            }
        }

        let was_vsync = self.in_vsync;
        let at_line_end = self.hc == self.r0();
        if at_line_end {
            self.hc = 0;
            self.advance_line();
        } else {
            self.hc += 1;
        }
        status.vsync_rising = !was_vsync && self.in_vsync;

        status
    }

    fn advance_line(&mut self) {
        if self.in_vta {
            self.vta += 1;
            if self.vta > self.r5() {
                self.in_vta = false;
                self.vta = 0;
                self.start_new_frame();
            }
            return;
        }

        if self.ra == self.r9() {
            self.ra = 0;
            self.vc = self.vc.wrapping_add(1);
            self.row_start_addr = self.ma;
            if self.vc == self.r7() && !self.in_vsync {
                self.in_vsync = true;
                self.vsync_line_count = 0;
            }
            if self.vc > self.r4() {
                self.vc = 0;
                if self.r5() == 0 {
                    self.start_new_frame();
                } else {
                    self.in_vta = true;
                    self.vta = 0;
                }
            }
        } else {
            self.ra += 1;
            self.ma = self.row_start_addr;
        }

        if self.in_vsync {
            self.vsync_line_count += 1;
            if self.vwidth_done(self.vsync_line_count) {
                self.in_vsync = false;
            }
        }
    }

    fn start_new_frame(&mut self) {
        self.ma = self.start_address();
        self.row_start_addr = self.ma;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn programmed_crtc() -> Crtc {
        let mut crtc = Crtc::new(CrtcType::Type1);
        let prog: [(u8, u8); 12] = [
            (0, 63), (1, 40), (2, 46), (3, 0x8e),
            (4, 38), (5, 0), (6, 25), (7, 30),
            (8, 0), (9, 7), (12, 0x30), (13, 0),
        ];
        for (r, v) in prog {
            crtc.select(r);
            crtc.write(v);
        }
        crtc
    }

    #[test]
    fn start_address_combines_hi_lo() {
        let crtc = programmed_crtc();
        assert_eq!(crtc.start_address(), 0x3000);
    }

    #[test]
    fn r0_zero_is_rejected_on_type0() {
        let mut crtc = Crtc::new(CrtcType::Type0);
        crtc.select(0);
        crtc.write(63);
        crtc.write(0);
        assert_eq!(crtc.reg(0), 63);
    }

    #[test]
    fn ticking_one_full_line_advances_memory_address() {
        let mut crtc = programmed_crtc();
        let start = crtc.memory_address();
        for _ in 0..=crtc.reg(0) {
            crtc.tick();
        }
        assert_eq!(crtc.raster_address(), 1);
        assert_ne!(crtc.memory_address(), start);
    }
}
