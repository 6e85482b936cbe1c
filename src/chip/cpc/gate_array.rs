/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The CPC Gate Array: pen/ink palette selection, screen mode and ROM mapping, and the
//! interrupt counter it drives off the CRTC's HSYNC pulses.
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// One of the four CPC screen modes, selected through the Gate Array's function `10`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum ScreenMode {
    /// 160x200, 16 colours.
    Mode0,
    /// 320x200, 4 colours.
    Mode1,
    /// 640x200, 2 colours.
    Mode2,
    /// 160x200, 4 colours (undocumented, same pixel layout as mode 0).
    Mode3,
}

impl ScreenMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => ScreenMode::Mode0,
            1 => ScreenMode::Mode1,
            3 => ScreenMode::Mode3,
            _ => ScreenMode::Mode2,
        }
    }
}

/// How many HSYNC pulses occur between two interrupt requests.
const HSYNC_PER_INTERRUPT: u8 = 52;
/// The bit of the HSYNC counter the CPU's interrupt acknowledge cycle clears.
const INT_ACK_CLEAR_BIT: u8 = 0x20;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct GateArray {
    pen: u8,
    inks: [u8; 16],
    border: u8,
    mode: ScreenMode,
    rom_lower_enabled: bool,
    rom_upper_enabled: bool,
    hsync_counter: u8,
    irq_pending: bool,
    vsync_reset_pending: Option<u8>,
}

impl Default for GateArray {
    fn default() -> Self {
        GateArray {
            pen: 0,
            inks: [0; 16],
            border: 0,
            mode: ScreenMode::Mode1,
            rom_lower_enabled: true,
            rom_upper_enabled: true,
            hsync_counter: 0,
            irq_pending: false,
            vsync_reset_pending: None,
        }
    }
}

/// Effect a Gate Array port write has on the rest of the machine, reported back to the
/// caller so it can re-wire the memory controller's ROM enable flags without the
/// Gate Array needing a reference to the memory itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RomEnableChange {
    pub lower: bool,
    pub upper: bool,
}

impl GateArray {
    pub fn mode(&self) -> ScreenMode {
        self.mode
    }

    pub fn border_colour(&self) -> u8 {
        self.border.min(26)
    }

    pub fn ink(&self, pen: usize) -> u8 {
        self.inks[pen & 0x0f]
    }

    pub fn rom_enable(&self) -> RomEnableChange {
        RomEnableChange { lower: self.rom_lower_enabled, upper: self.rom_upper_enabled }
    }

    /// Writes a byte to the Gate Array function register, I/O port `0x7Fxx`.
    ///
    /// Returns `Some` when the write changed ROM bank mapping and the memory controller
    /// needs to be told about it.
    pub fn write(&mut self, value: u8) -> Option<RomEnableChange> {
        match value >> 6 {
            0b00 => {
                self.pen = value & 0x1f;
                None
            }
            0b01 => {
                let colour = value & 0x1f;
                if self.pen & 0x10 != 0 {
                    self.border = colour;
                } else {
                    self.inks[(self.pen & 0x0f) as usize] = colour;
                }
                None
            }
            0b10 => {
                self.mode = ScreenMode::from_bits(value);
                self.rom_lower_enabled = value & 0x04 == 0;
                self.rom_upper_enabled = value & 0x08 == 0;
                if value & 0x10 != 0 {
                    self.reset_interrupt_counter();
                }
                Some(self.rom_enable())
            }
            _ => None, // 0b11: RAM configuration, handled directly via CpcMemoryControl::select_ram
        }
    }

    fn reset_interrupt_counter(&mut self) {
        self.hsync_counter = 0;
        self.vsync_reset_pending = None;
    }

    /// Call once per HSYNC pulse (as reported by [crate::chip::cpc::crtc::Crtc::tick]'s
    /// status, on its rising edge). Returns `true` exactly on the tick the counter reaches
    /// its terminal count and an interrupt request is raised.
    pub fn on_hsync(&mut self) -> bool {
        self.hsync_counter += 1;
        if self.hsync_counter == HSYNC_PER_INTERRUPT {
            self.hsync_counter = 0;
            self.irq_pending = true;
        }
        if let Some(remaining) = self.vsync_reset_pending {
            if remaining == 0 {
                self.hsync_counter = 0;
                self.vsync_reset_pending = None;
            } else {
                self.vsync_reset_pending = Some(remaining - 1);
            }
        }
        self.irq_pending
    }

    /// Call on the rising edge of VSYNC. If the HSYNC counter has already reached at least
    /// half its terminal count the real Gate Array schedules a reset two HSYNCs later,
    /// which keeps successive frames' interrupts evenly spaced.
    pub fn on_vsync(&mut self) {
        if self.hsync_counter >= HSYNC_PER_INTERRUPT / 2 {
            self.vsync_reset_pending = Some(2);
        }
    }

    /// Returns `true` if an interrupt request is currently pending.
    pub fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    /// Called when the CPU acknowledges the interrupt (on the M1 cycle of the IM1
    /// response). Clears the request and the top bit of the HSYNC counter.
    pub fn acknowledge_interrupt(&mut self) {
        self.irq_pending = false;
        self.hsync_counter &= !INT_ACK_CLEAR_BIT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_select_and_rom_enable_decode() {
        let mut ga = GateArray::default();
        let change = ga.write(0b1000_1101).unwrap(); // mode 1, disable both ROMs
        assert_eq!(ga.mode(), ScreenMode::Mode1);
        assert_eq!(change, RomEnableChange { lower: false, upper: false });
    }

    #[test]
    fn ink_and_border_selection() {
        let mut ga = GateArray::default();
        ga.write(0b0000_0011); // select pen 3
        ga.write(0b0100_1010); // set colour 10 for pen 3
        assert_eq!(ga.ink(3), 10);
        ga.write(0b0001_0000); // select border (bit 4 set)
        ga.write(0b0100_0101); // colour 5 for border
        assert_eq!(ga.border_colour(), 5);
    }

    #[test]
    fn interrupt_fires_every_52_hsyncs() {
        let mut ga = GateArray::default();
        let mut fired_at = None;
        for i in 1..=52u32 {
            if ga.on_hsync() {
                fired_at = Some(i);
                break;
            }
        }
        assert_eq!(fired_at, Some(52));
        assert!(ga.irq_pending());
        ga.acknowledge_interrupt();
        assert!(!ga.irq_pending());
    }
}
