//! T.001 Message Decoder
//!
//! Interprets a demodulated bit frame into a structured [`BeaconRecord`]:
//! validates the bit-sync and frame-sync fields, checks the PDF-1/PDF-2
//! cyclic codes, then dispatches on (frame kind, protocol flag, protocol
//! code) to the protocol-specific field decoders.
//!
//! Integrity failures never abort a decode: the record is produced with its
//! integrity flags set and the caller decides what to trust. Only a frame
//! whose length is neither 112 nor 144 bits is refused.
//!
//! ## Example
//!
//! ```rust
//! use sarsat406_core::decoder::MessageDecoder;
//! use sarsat406_core::generator::FrameBuilder;
//!
//! let bits = FrameBuilder::long()
//!     .country_code(227)
//!     .protocol_code(3)
//!     .identification_field(0x3C6589)
//!     .position_quarter_deg(48.5, 2.25)
//!     .build();
//!
//! let mut decoder = MessageDecoder::new(false);
//! let record = decoder.decode_bits(&bits).unwrap();
//! assert_eq!(record.country_code, 227);
//! assert!(record.integrity.ok());
//! ```

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::crc::{PDF1, PDF2};
use crate::frame::{bit_field, hex_id, DemodulatedFrame, FrameQuality, FrameSyncKind};
use crate::protocols;
use crate::types::{BurstClass, FrameKind, SarsatResult};

/// Protocol family of a decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeaconProtocol {
    StandardLocation,
    NationalLocation,
    UserProtocol,
    EltDt,
    RlsLocation,
    ShipSecurity,
    Test,
    Unknown,
}

/// A decoded latitude/longitude in degrees (north/east positive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// Signed PDF-2 position refinement, in minutes and seconds per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionOffsets {
    pub lat_sign: i8,
    pub lat_minutes: u8,
    pub lat_seconds: u8,
    pub lon_sign: i8,
    pub lon_minutes: u8,
    pub lon_seconds: u8,
}

impl PositionOffsets {
    pub fn lat_degrees(&self) -> f64 {
        self.lat_sign as f64 * (self.lat_minutes as f64 / 60.0 + self.lat_seconds as f64 / 3600.0)
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon_sign as f64 * (self.lon_minutes as f64 / 60.0 + self.lon_seconds as f64 / 3600.0)
    }
}

/// Auxiliary flags carried by various protocols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconFlags {
    /// Position from an internal navigation device (true) or external (false).
    pub position_source_internal: Option<bool>,
    /// 121.5 MHz homing transmitter present.
    pub homing_121_5: Option<bool>,
    /// ELT-DT activation method (0 = manual .. 3 = spare).
    pub activation_method: Option<u8>,
    /// ELT-DT altitude band code (0-15).
    pub altitude_band: Option<u8>,
    /// ELT-DT location freshness (0 = rotating field .. 3 = under 2 s old).
    pub location_freshness: Option<u8>,
    /// Frame carried a self-test sync pattern or test protocol.
    pub self_test: bool,
    /// Ship security alert.
    pub ship_security: bool,
}

/// Outcome of the frame integrity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrity {
    pub crc1_ok: bool,
    /// True for short frames, which carry no PDF-2.
    pub crc2_ok: bool,
    /// Reserved for the SGB 48-bit BCH; true for first-generation frames.
    pub bch_ok: bool,
}

impl Default for Integrity {
    fn default() -> Self {
        Self {
            crc1_ok: true,
            crc2_ok: true,
            bch_ok: true,
        }
    }
}

impl Integrity {
    pub fn ok(&self) -> bool {
        self.crc1_ok && self.crc2_ok && self.bch_ok
    }
}

/// A fully decoded beacon message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconRecord {
    pub frame_kind: FrameKind,
    /// Bit 26: distinguishes user (1) from location (0) protocols.
    pub protocol_flag: u8,
    /// The protocol code driving dispatch: 3 bits for short (user) frames,
    /// 4 bits for long frames.
    pub protocol_code: u8,
    pub protocol: BeaconProtocol,
    /// 10-bit country code (Maritime Identification Digits).
    pub country_code: u16,
    /// Human-readable identification derived from the protocol.
    pub identification: String,
    /// PDF-1 coarse position, when the protocol carries one.
    pub base_position: Option<Position>,
    /// Base position plus PDF-2 refinement; equals the base when no offsets
    /// are present.
    pub composite_position: Option<Position>,
    pub offsets: Option<PositionOffsets>,
    pub flags: BeaconFlags,
    /// Uppercase hex of bits 25..end.
    pub hex_id: String,
    pub integrity: Integrity,
}

/// Decoder counters shared with observer threads.
#[derive(Debug, Clone, Default)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub integrity_failures: u64,
    pub sync_warnings: u64,
    pub malformed_frames: u64,
}

#[derive(Debug)]
struct Shared {
    stats: DecoderStats,
    debug_mode: bool,
}

/// Frame-to-record decoder.
#[derive(Debug)]
pub struct MessageDecoder {
    shared: Arc<Mutex<Shared>>,
}

impl MessageDecoder {
    pub fn new(debug_mode: bool) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                stats: DecoderStats::default(),
                debug_mode,
            })),
        }
    }

    /// Decode a demodulated frame into a beacon record.
    pub fn decode(&mut self, frame: &DemodulatedFrame) -> SarsatResult<BeaconRecord> {
        let kind = match frame.kind() {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(bits = frame.bits.len(), "refusing malformed frame");
                if let Ok(mut shared) = self.shared.lock() {
                    shared.stats.malformed_frames += 1;
                }
                return Err(e);
            }
        };

        if kind == FrameKind::Sgb {
            return Ok(self.decode_sgb(frame));
        }

        if !frame.bit_sync_ok() {
            tracing::warn!("bit sync pattern mismatch");
            self.count_sync_warning();
        }
        let sync_kind = frame.frame_sync_kind();
        match sync_kind {
            FrameSyncKind::Normal | FrameSyncKind::National => {}
            FrameSyncKind::SelfTest => {
                if frame.frame_sync_pattern() == crate::frame::FRAME_SYNC_SELF_TEST_ALT {
                    tracing::warn!("undocumented self-test frame sync variant");
                    self.count_sync_warning();
                } else {
                    tracing::debug!("self-test frame sync");
                }
            }
            FrameSyncKind::Unknown => {
                tracing::warn!(
                    pattern = format!("{:09b}", frame.frame_sync_pattern()),
                    "unknown frame sync pattern"
                );
                self.count_sync_warning();
            }
        }

        let mut record = self.decode_frame_bits(&frame.bits, kind)?;
        record.flags.self_test |= sync_kind == FrameSyncKind::SelfTest;

        if let Ok(mut shared) = self.shared.lock() {
            shared.stats.frames_decoded += 1;
            if !record.integrity.ok() {
                shared.stats.integrity_failures += 1;
            }
            if shared.debug_mode {
                tracing::debug!(
                    protocol = ?record.protocol,
                    country = record.country_code,
                    hex_id = %record.hex_id,
                    integrity_ok = record.integrity.ok(),
                    "frame decoded"
                );
            }
        }
        Ok(record)
    }

    /// Decode a raw first-generation bit frame (112 or 144 bits).
    pub fn decode_bits(&mut self, bits: &[u8]) -> SarsatResult<BeaconRecord> {
        let frame = DemodulatedFrame {
            bits: bits.to_vec(),
            class: BurstClass::Fgb,
            quality: FrameQuality {
                samples_per_bit: 0.0,
                freq_offset_hz: 0.0,
                ambiguous_bits: 0,
            },
        };
        self.decode(&frame)
    }

    fn decode_frame_bits(&mut self, bits: &[u8], kind: FrameKind) -> SarsatResult<BeaconRecord> {
        let integrity = Integrity {
            crc1_ok: PDF1.check(bits),
            crc2_ok: kind != FrameKind::Long || PDF2.check(bits),
            bch_ok: true,
        };
        if !integrity.ok() {
            tracing::warn!(
                crc1_ok = integrity.crc1_ok,
                crc2_ok = integrity.crc2_ok,
                "frame integrity check failed"
            );
        }

        let protocol_flag = bits[25];
        let country_code = bit_field(bits, 26, 10) as u16;
        let protocol_code = if kind == FrameKind::Short {
            bit_field(bits, 36, 3) as u8
        } else {
            bit_field(bits, 36, 4) as u8
        };

        let protocol = dispatch(kind, protocol_flag, protocol_code);

        let mut record = BeaconRecord {
            frame_kind: kind,
            protocol_flag,
            protocol_code,
            protocol,
            country_code,
            identification: String::new(),
            base_position: None,
            composite_position: None,
            offsets: None,
            flags: BeaconFlags::default(),
            hex_id: hex_id(bits),
            integrity,
        };

        match protocol {
            BeaconProtocol::StandardLocation => {
                protocols::decode_standard_location(bits, &mut record)
            }
            BeaconProtocol::ShipSecurity => {
                protocols::decode_standard_location(bits, &mut record);
                record.flags.ship_security = true;
            }
            BeaconProtocol::NationalLocation => {
                protocols::decode_national_location(bits, &mut record)
            }
            BeaconProtocol::EltDt => protocols::decode_elt_dt_location(bits, &mut record),
            BeaconProtocol::RlsLocation => protocols::decode_rls_location(bits, &mut record),
            BeaconProtocol::UserProtocol => {
                protocols::decode_user_identification(bits, &mut record);
                if kind == FrameKind::Long && protocol_flag == 1 {
                    protocols::decode_user_location_position(bits, &mut record);
                }
            }
            BeaconProtocol::Test => {
                record.flags.self_test = true;
                match (kind, protocol_code) {
                    (FrameKind::Long, 14) => protocols::decode_standard_test(bits, &mut record),
                    (FrameKind::Long, 15) => protocols::decode_national_use(bits, &mut record),
                    _ => protocols::decode_user_identification(bits, &mut record),
                }
            }
            BeaconProtocol::Unknown => {
                record.identification = "Unknown Protocol".to_string();
            }
        }

        Ok(record)
    }

    /// Second-generation frames: the T.018 field catalogue lives in the SGB
    /// demodulator collaborator; the core records the payload untyped.
    fn decode_sgb(&mut self, frame: &DemodulatedFrame) -> BeaconRecord {
        if let Ok(mut shared) = self.shared.lock() {
            shared.stats.frames_decoded += 1;
        }
        BeaconRecord {
            frame_kind: FrameKind::Sgb,
            protocol_flag: 0,
            protocol_code: 0,
            protocol: BeaconProtocol::Unknown,
            country_code: 0,
            identification: format!("SGB message ({} bits)", frame.bits.len()),
            base_position: None,
            composite_position: None,
            offsets: None,
            flags: BeaconFlags::default(),
            hex_id: hex_id(&frame.bits),
            integrity: Integrity::default(),
        }
    }

    fn count_sync_warning(&self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.stats.sync_warnings += 1;
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.shared
            .lock()
            .map(|s| s.stats.clone())
            .unwrap_or_default()
    }

    pub fn frames_decoded(&self) -> u64 {
        self.shared
            .lock()
            .map(|s| s.stats.frames_decoded)
            .unwrap_or(0)
    }

    pub fn reset_statistics(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.stats = DecoderStats::default();
        }
    }

    pub fn set_debug_mode(&mut self, enable: bool) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.debug_mode = enable;
        }
    }
}

/// Protocol dispatch per T.001: (frame kind, P flag, protocol code).
fn dispatch(kind: FrameKind, protocol_flag: u8, protocol_code: u8) -> BeaconProtocol {
    match kind {
        FrameKind::Short => {
            if protocol_flag != 1 {
                return BeaconProtocol::Unknown;
            }
            match protocol_code {
                0..=4 | 6 => BeaconProtocol::UserProtocol,
                7 => BeaconProtocol::Test,
                _ => BeaconProtocol::Unknown, // 5 reserved for 2G
            }
        }
        FrameKind::Long => {
            if protocol_flag == 1 {
                return BeaconProtocol::UserProtocol;
            }
            match protocol_code {
                2..=7 => BeaconProtocol::StandardLocation,
                8 | 10 | 11 => BeaconProtocol::NationalLocation,
                9 => BeaconProtocol::EltDt,
                12 => BeaconProtocol::ShipSecurity,
                13 => BeaconProtocol::RlsLocation,
                14 | 15 => BeaconProtocol::Test,
                _ => BeaconProtocol::Unknown, // 0, 1 spare
            }
        }
        FrameKind::Sgb => BeaconProtocol::Unknown,
    }
}
