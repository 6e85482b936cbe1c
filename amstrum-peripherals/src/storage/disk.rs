/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A minimal in-memory floppy disk image shared by the [WD1793][super::wd1793] and
//! [NEC765][super::nec765] floppy disc controller emulators.
//!
//! File-format specific readers (`DSK`/`EXTENDED DSK`, `TRD`, `SCL`) live in the
//! `amstrum-formats` crate and produce a [FloppyImage] from the bytes they parse;
//! this module only describes the shape a controller needs to see.
use core::fmt;

/// A single physical sector identifier as presented on the ID field read by a controller.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SectorId {
    pub cylinder: u8,
    pub head: u8,
    pub sector: u8,
    /// `size = 128 << size_code`.
    pub size_code: u8,
}

impl SectorId {
    #[inline]
    pub fn size(self) -> usize {
        128usize << self.size_code
    }
}

/// A single sector's identifier and data, as stored in a [Track].
#[derive(Clone, Debug)]
pub struct SectorData {
    pub id: SectorId,
    pub data: Vec<u8>,
    pub deleted: bool,
    pub crc_error: bool,
}

/// A single physical track: the ordered sequence of sectors as they pass under the head.
#[derive(Clone, Debug, Default)]
pub struct Track {
    pub sectors: Vec<SectorData>,
}

impl Track {
    pub fn sector(&self, sector: u8) -> Option<&SectorData> {
        self.sectors.iter().find(|s| s.id.sector == sector)
    }
    pub fn sector_mut(&mut self, sector: u8) -> Option<&mut SectorData> {
        self.sectors.iter_mut().find(|s| s.id.sector == sector)
    }
}

/// An error indicating an operation on a [FloppyImage] addressed a cylinder, head or sector
/// that doesn't exist on the loaded medium.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GeometryError;

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("addressed cylinder, head or sector is out of the disk image geometry")
    }
}

impl std::error::Error for GeometryError {}

/// A single-sided or double-sided floppy disk image kept entirely in memory.
///
/// Both controller emulators only ever need "give me the track under the head" and
/// "tell me if the medium changed", so this is deliberately not a trait: every loaded
/// image, regardless of its original file format, is normalized into this shape by the
/// format reader that produced it.
#[derive(Clone, Debug, Default)]
pub struct FloppyImage {
    pub heads: u8,
    /// `tracks[head][cylinder]`.
    tracks: Vec<Vec<Track>>,
    pub write_protect: bool,
}

impl FloppyImage {
    pub fn new(heads: u8, cylinders: usize) -> Self {
        FloppyImage {
            heads,
            tracks: vec![vec![Track::default(); cylinders]; heads as usize],
            write_protect: false,
        }
    }

    pub fn cylinders(&self) -> usize {
        self.tracks.get(0).map_or(0, Vec::len)
    }

    pub fn track(&self, head: u8, cylinder: u8) -> Result<&Track, GeometryError> {
        self.tracks.get(head as usize)
            .and_then(|ts| ts.get(cylinder as usize))
            .ok_or(GeometryError)
    }

    pub fn track_mut(&mut self, head: u8, cylinder: u8) -> Result<&mut Track, GeometryError> {
        self.tracks.get_mut(head as usize)
            .and_then(|ts| ts.get_mut(cylinder as usize))
            .ok_or(GeometryError)
    }

    pub fn set_track(&mut self, head: u8, cylinder: u8, track: Track) -> Result<(), GeometryError> {
        *self.track_mut(head, cylinder)? = track;
        Ok(())
    }
}

/// A single floppy drive: the currently inserted medium (if any), the head position and the
/// motor state. Shared shape for both controller families; each controller only drives the
/// subset of fields relevant to its own command set.
#[derive(Clone, Debug, Default)]
pub struct FloppyDrive {
    pub image: Option<FloppyImage>,
    pub cylinder: u8,
    pub motor_on: bool,
    /// Set by the emulated controller when the medium is swapped, cleared on the next seek.
    pub disk_changed: bool,
}

impl FloppyDrive {
    pub fn is_track_00(&self) -> bool {
        self.cylinder == 0
    }
    pub fn insert(&mut self, image: FloppyImage) {
        self.image = Some(image);
        self.disk_changed = true;
    }
    pub fn eject(&mut self) {
        self.image = None;
        self.disk_changed = true;
    }
}
