/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A [BusDevice] for the **WD1793** floppy disc controller, as wired on the Betadisk
//! (TR-DOS) interface used by 128K/Pentagon-family ZX Spectrum clones.
use core::fmt;
use core::num::NonZeroU16;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use amstrum_core::bus::{BusDevice, PortAddress};

use super::disk::{FloppyDrive, SectorId};
use crate::bus::ay::PassByAyAudioBusDevice;

/// Matches the four Betadisk FDC registers and the system register, decoded on the low
/// address byte only (as the real interface does, ignoring A8-A15).
#[derive(Clone, Copy, Default, Debug)]
pub struct Wd1793PortAddress;
impl PortAddress for Wd1793PortAddress {
    const ADDRESS_MASK: u16 = 0x001f;
    const ADDRESS_BITS: u16 = 0x001f;
}

const PORT_COMMAND_STATUS: u16 = 0x1f;
const PORT_TRACK: u16 = 0x3f;
const PORT_SECTOR: u16 = 0x5f;
const PORT_DATA: u16 = 0x7f;
const PORT_SYSTEM: u16 = 0xff;

bitflags! {
    /// Status register bits. Their meaning depends on the last command's *type*
    /// (I: Restore/Seek/Step, II: Read/Write Sector, III: Read Address/Read or Write Track).
    #[derive(Default)]
    pub struct Wd1793Status: u8 {
        const BUSY          = 0b0000_0001;
        const INDEX_OR_DRQ   = 0b0000_0010;
        const TRACK00_OR_LOST = 0b0000_0100;
        const CRC_ERROR      = 0b0000_1000;
        const SEEK_ERR_OR_RNF = 0b0001_0000;
        const HEAD_LOADED_OR_RECORD_TYPE = 0b0010_0000;
        const WRITE_PROTECT  = 0b0100_0000;
        const NOT_READY      = 0b1000_0000;
    }
}

bitflags! {
    /// The Betadisk system register (port `0xff`), write-only from the Z80's perspective.
    #[derive(Default)]
    pub struct Wd1793System: u8 {
        const DRIVE_A   = 0b0000_0001;
        const DRIVE_B   = 0b0000_0010;
        const DRIVE_C   = 0b0000_0100;
        const DRIVE_D   = 0b0000_1000;
        const RESET     = 0b0001_0000;
        const HLT       = 0b0010_0000; // head load timing, inverted
        const DENSITY   = 0b0100_0000;
        const SIDE      = 0b1000_0000; // 0 = side 0 is wired to `/INV`, inverted below
    }
}

/// Decoded command type, each with its own status-bit semantics.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum CommandKind { Restore, Seek, Step, StepIn, StepOut, ReadSector, WriteSector, ReadAddress, ReadTrack, WriteTrack, ForceInterrupt }

/// The controller's internal operation in progress, driven forward by `update_timestamp`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
enum Operation {
    Idle,
    /// Stepping towards a target track for Restore/Seek/Step-with-update commands.
    Seeking { target: u8, step_delay: u16 },
    /// Command is running and data is expected to be shifted in/out through the data register.
    Transfer { sector: u8, index: usize, len: usize, write: bool, multiple: bool },
    /// `WRITE TRACK` (format): raw bytes are being received and decoded into a new track image.
    FormatTrack { raw: Vec<u8> },
}

#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default)]
struct DriveSet {
    #[cfg_attr(feature = "snapshot", serde(skip))]
    drives: [FloppyDrive; 4],
    selected: u8,
    side: u8,
}

impl DriveSet {
    fn current(&self) -> &FloppyDrive { &self.drives[self.selected as usize] }
    fn current_mut(&mut self) -> &mut FloppyDrive { &mut self.drives[self.selected as usize] }
}

/// A WD1793 floppy disc controller emulator, connected as a [BusDevice] on the Betadisk bus.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Default)]
pub struct Wd1793BusDevice<D> {
    pub status: u8,
    pub track_reg: u8,
    pub sector_reg: u8,
    pub data_reg: u8,
    pub drives: DriveSet,
    #[cfg_attr(feature = "snapshot", serde(skip))]
    op: Operation,
    intrq: bool,
    #[cfg_attr(feature = "snapshot", serde(default))]
    bus: D,
}

impl Default for Operation {
    fn default() -> Self { Operation::Idle }
}

impl<D> fmt::Debug for Wd1793BusDevice<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wd1793BusDevice")
            .field("status", &self.status)
            .field("track_reg", &self.track_reg)
            .field("sector_reg", &self.sector_reg)
            .field("op", &self.op)
            .finish()
    }
}

impl<D> fmt::Display for Wd1793BusDevice<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WD1793 / Betadisk")
    }
}

impl<D> PassByAyAudioBusDevice for Wd1793BusDevice<D> {}

impl<D> Wd1793BusDevice<D> {
    /// Decodes the command byte just latched in the command/status register.
    fn decode_command(cmd: u8) -> CommandKind {
        use CommandKind::*;
        match cmd >> 4 {
            0x0 => Restore,
            0x1 => Seek,
            0x2 | 0x3 => Step,
            0x4 | 0x5 => StepIn,
            0x6 | 0x7 => StepOut,
            0x8 | 0x9 => ReadSector,
            0xa | 0xb => WriteSector,
            0xc => ReadAddress,
            0xe => ReadTrack,
            0xf => WriteTrack,
            0xd => ForceInterrupt,
            _ => ForceInterrupt,
        }
    }

    fn begin_command(&mut self, cmd: u8) {
        let kind = Self::decode_command(cmd);
        self.intrq = false;
        self.status = Wd1793Status::BUSY.bits();
        match kind {
            CommandKind::Restore => {
                self.op = Operation::Seeking { target: 0, step_delay: 6 };
            }
            CommandKind::Seek => {
                let target = self.data_reg;
                self.op = Operation::Seeking { target, step_delay: 6 };
            }
            CommandKind::Step | CommandKind::StepIn | CommandKind::StepOut => {
                let cur = self.drives.current().cylinder as i16;
                let delta: i16 = match kind {
                    CommandKind::StepIn => 1,
                    CommandKind::StepOut => -1,
                    _ => 0, // re-step in the last direction; approximated as no movement
                };
                let target = (cur + delta).clamp(0, 255) as u8;
                self.op = Operation::Seeking { target, step_delay: 6 };
            }
            CommandKind::ReadSector => {
                let len = self.current_sector_id().map_or(256, SectorId::size);
                self.op = Operation::Transfer {
                    sector: self.sector_reg, index: 0, len, write: false,
                    multiple: cmd & 0x10 != 0,
                };
                self.status |= Wd1793Status::INDEX_OR_DRQ.bits();
            }
            CommandKind::WriteSector => {
                let len = self.current_sector_id().map_or(256, SectorId::size);
                self.op = Operation::Transfer {
                    sector: self.sector_reg, index: 0, len, write: true,
                    multiple: cmd & 0x10 != 0,
                };
                self.status |= Wd1793Status::INDEX_OR_DRQ.bits();
            }
            CommandKind::ReadAddress => {
                self.op = Operation::Transfer { sector: 0, index: 0, len: 6, write: false, multiple: false };
                self.status |= Wd1793Status::INDEX_OR_DRQ.bits();
            }
            CommandKind::ReadTrack => {
                self.op = Operation::Idle;
                self.finish_command();
            }
            CommandKind::WriteTrack => {
                self.op = Operation::FormatTrack { raw: Vec::new() };
                self.status |= Wd1793Status::INDEX_OR_DRQ.bits();
            }
            CommandKind::ForceInterrupt => {
                self.op = Operation::Idle;
                self.status = 0;
                self.intrq = true;
            }
        }
    }

    fn current_sector_id(&self) -> Option<SectorId> {
        let drive = self.drives.current();
        let image = drive.image.as_ref()?;
        let track = image.track(self.drives.side, drive.cylinder).ok()?;
        track.sector(self.sector_reg).map(|s| s.id)
    }

    fn finish_command(&mut self) {
        self.status &= !(Wd1793Status::BUSY.bits() | Wd1793Status::INDEX_OR_DRQ.bits());
        if self.drives.current().image.is_none() {
            self.status |= Wd1793Status::NOT_READY.bits();
        }
        if self.drives.current().is_track_00() {
            self.status |= Wd1793Status::TRACK00_OR_LOST.bits();
        }
        self.intrq = true;
    }

    fn step_towards(&mut self, target: u8, step_delay: u16) {
        let cur = self.drives.current().cylinder;
        if cur == target {
            self.track_reg = target;
            self.finish_command();
            self.op = Operation::Idle;
        } else {
            let next = if cur < target { cur + 1 } else { cur - 1 };
            self.drives.current_mut().cylinder = next;
            self.op = Operation::Seeking { target, step_delay };
        }
    }
}

impl<D> BusDevice for Wd1793BusDevice<D>
    where D: BusDevice
{
    type Timestamp = D::Timestamp;
    type NextDevice = D;

    #[inline]
    fn next_device_mut(&mut self) -> &mut Self::NextDevice { &mut self.bus }
    #[inline]
    fn next_device_ref(&self) -> &Self::NextDevice { &self.bus }
    #[inline]
    fn into_next_device(self) -> Self::NextDevice { self.bus }

    fn reset(&mut self, timestamp: Self::Timestamp) {
        self.status = 0;
        self.op = Operation::Idle;
        self.intrq = false;
        self.bus.reset(timestamp)
    }

    fn read_io(&mut self, port: u16, timestamp: Self::Timestamp) -> Option<(u8, Option<NonZeroU16>)> {
        let bus_data = self.bus.read_io(port, timestamp);
        if !Wd1793PortAddress::match_port(port) {
            return bus_data;
        }
        let data = match port & 0xff {
            PORT_COMMAND_STATUS => self.status,
            PORT_TRACK => self.track_reg,
            PORT_SECTOR => self.sector_reg,
            PORT_DATA => {
                if let Operation::Transfer { index, len, write: false, .. } = &mut self.op {
                    let byte = self.data_reg;
                    *index += 1;
                    if *index >= *len {
                        self.finish_command();
                        self.op = Operation::Idle;
                    }
                    byte
                } else {
                    self.data_reg
                }
            }
            _ => return bus_data,
        };
        if let Some((upstream, ws)) = bus_data {
            Some((upstream & data, ws))
        } else {
            Some((data, None))
        }
    }

    fn write_io(&mut self, port: u16, data: u8, timestamp: Self::Timestamp) -> Option<u16> {
        if Wd1793PortAddress::match_port(port) {
            match port & 0xff {
                PORT_COMMAND_STATUS => self.begin_command(data),
                PORT_TRACK => self.track_reg = data,
                PORT_SECTOR => self.sector_reg = data,
                PORT_DATA => {
                    self.data_reg = data;
                    if let Operation::Transfer { index, len, write: true, .. } = &mut self.op {
                        *index += 1;
                        if *index >= *len {
                            self.finish_command();
                            self.op = Operation::Idle;
                        }
                    }
                }
                PORT_SYSTEM => {
                    let sys = Wd1793System::from_bits_truncate(data);
                    self.drives.selected = if sys.contains(Wd1793System::DRIVE_A) { 0 }
                        else if sys.contains(Wd1793System::DRIVE_B) { 1 }
                        else if sys.contains(Wd1793System::DRIVE_C) { 2 }
                        else if sys.contains(Wd1793System::DRIVE_D) { 3 }
                        else { self.drives.selected };
                    self.drives.side = if sys.contains(Wd1793System::SIDE) { 0 } else { 1 };
                    if !sys.contains(Wd1793System::RESET) {
                        self.reset(timestamp);
                    }
                }
                _ => {}
            }
            return Some(0);
        }
        self.bus.write_io(port, data, timestamp)
    }

    fn next_frame(&mut self, timestamp: Self::Timestamp) {
        // Advance any in-flight seek by one frame's worth of steps; actual per-T-state
        // stepping rate is approximated at the frame boundary since TR-DOS software
        // polls the BUSY bit rather than relying on exact step timing.
        if let Operation::Seeking { target, step_delay } = self.op {
            self.step_towards(target, step_delay);
        }
        self.bus.next_frame(timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amstrum_core::bus::NullDevice;

    type TestFdc = Wd1793BusDevice<NullDevice<()>>;

    #[test]
    fn restore_seeks_to_track_zero() {
        let mut fdc: TestFdc = Default::default();
        fdc.drives.current_mut().cylinder = 40;
        fdc.write_io(PORT_COMMAND_STATUS, 0x00, ());
        assert_eq!(fdc.status & Wd1793Status::BUSY.bits(), Wd1793Status::BUSY.bits());
        for _ in 0..41 {
            fdc.next_frame(());
        }
        assert_eq!(fdc.drives.current().cylinder, 0);
        assert_eq!(fdc.status & Wd1793Status::BUSY.bits(), 0);
    }

    #[test]
    fn seek_targets_data_register() {
        let mut fdc: TestFdc = Default::default();
        fdc.write_io(PORT_DATA, 12, ());
        fdc.write_io(PORT_COMMAND_STATUS, 0x10, ());
        for _ in 0..13 {
            fdc.next_frame(());
        }
        assert_eq!(fdc.drives.current().cylinder, 12);
        assert_eq!(fdc.track_reg, 12);
    }

    #[test]
    fn drive_select_switches_active_drive() {
        let mut fdc: TestFdc = Default::default();
        fdc.write_io(PORT_SYSTEM, (Wd1793System::DRIVE_B | Wd1793System::RESET).bits(), ());
        assert_eq!(fdc.drives.selected, 1);
    }
}
