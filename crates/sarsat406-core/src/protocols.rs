//! T.001 Protocol Field Extraction
//!
//! One function per protocol family, each filling in the identification,
//! position and flag fields of a [`BeaconRecord`](crate::decoder::BeaconRecord)
//! from the raw frame bits. Bit indices follow C/S T.001; the documentation
//! numbers bits from 1, the code indexes from 0.

use crate::baudot::decode_string;
use crate::decoder::{BeaconRecord, Position, PositionOffsets};
use crate::frame::bit_field;
use crate::types::FrameKind;

/// Reject coordinates outside the valid lat/lon ranges.
fn validate_position(record: &mut BeaconRecord) {
    let Some(pos) = record.composite_position else {
        return;
    };
    if pos.lat.abs() > 90.0 || pos.lon.abs() > 180.0 {
        tracing::warn!(lat = pos.lat, lon = pos.lon, "invalid coordinates, clearing position");
        record.base_position = None;
        record.composite_position = None;
        record.offsets = None;
    }
}

fn apply_offsets(base: Position, offsets: &PositionOffsets) -> Position {
    Position {
        lat: base.lat + offsets.lat_degrees(),
        lon: base.lon + offsets.lon_degrees(),
    }
}

/// Standard Location protocols (long frame, P=0, codes 2-7) and Ship
/// Security (code 12), which reuses the same layout.
pub(crate) fn decode_standard_location(bits: &[u8], record: &mut BeaconRecord) {
    let id_data = bit_field(bits, 40, 24);

    record.identification = match record.protocol_code {
        2 => {
            // MMSI (last 6 digits) plus a 4-bit beacon number
            let mmsi = (id_data >> 4) & 0xFFFFF;
            let beacon = id_data & 0xF;
            format!("MMSI: {mmsi:09}, Beacon: {beacon}")
        }
        3 => format!("Aircraft Address: {:06X}", id_data),
        4 | 6 | 7 => {
            let ta_number = (id_data >> 14) & 0x3FF;
            let serial = id_data & 0x3FFF;
            format!("Type Approval: {ta_number}, Serial: {serial}")
        }
        5 => {
            let operator = (id_data >> 9) & 0x7FFF;
            let serial = id_data & 0x1FF;
            format!("Operator: {operator:05X}, Serial: {serial}")
        }
        12 => {
            let mmsi = (id_data >> 4) & 0xFFFFF;
            format!("MMSI: {mmsi:09} [SECURITY]")
        }
        _ => format!("Unknown ID Format: {:06X}", id_data),
    };

    // PDF-1 base position in quarter-degree increments.
    let lat = bit_field(bits, 65, 9) as f64 * 0.25;
    let lat = if bits[64] == 1 { -lat } else { lat };
    let lon = bit_field(bits, 75, 10) as f64 * 0.25;
    let lon = if bits[74] == 1 { -lon } else { lon };
    let base = Position { lat, lon };

    record.base_position = Some(base);
    record.composite_position = Some(base);

    if record.frame_kind == FrameKind::Long {
        let fixed = bit_field(bits, 106, 4);
        if fixed != 0b1101 {
            tracing::warn!(fixed = format!("{fixed:04b}"), "unexpected fixed bits in PDF-2");
        }
        record.flags.position_source_internal = Some(bits[110] == 1);
        record.flags.homing_121_5 = Some(bits[111] == 1);

        let offsets = PositionOffsets {
            lat_sign: if bits[112] == 1 { 1 } else { -1 },
            lat_minutes: bit_field(bits, 113, 5) as u8,
            lat_seconds: (bit_field(bits, 118, 4) * 4) as u8,
            lon_sign: if bits[122] == 1 { 1 } else { -1 },
            lon_minutes: bit_field(bits, 123, 5) as u8,
            lon_seconds: (bit_field(bits, 128, 4) * 4) as u8,
        };
        record.composite_position = Some(apply_offsets(base, &offsets));
        record.offsets = Some(offsets);
    }

    validate_position(record);
}

/// National Location protocols (long frame, P=0, codes 8/10/11, and the
/// national test code 15 position layout).
pub(crate) fn decode_national_location(bits: &[u8], record: &mut BeaconRecord) {
    let national_id = bit_field(bits, 40, 18);
    let beacon_type = match record.protocol_code {
        8 => "ELT",
        10 => "EPIRB",
        11 => "PLB",
        15 => "TEST",
        _ => "Unknown",
    };
    record.identification = format!("{beacon_type} National ID: {national_id}");

    // PDF-1 base position: degrees plus 2-minute increments.
    let lat_deg = bit_field(bits, 59, 7) as f64;
    let lat_min = (bit_field(bits, 66, 5) * 2) as f64;
    let lat = lat_deg + lat_min / 60.0;
    let lat = if bits[58] == 1 { -lat } else { lat };

    let lon_deg = bit_field(bits, 72, 8) as f64;
    let lon_min = (bit_field(bits, 80, 5) * 2) as f64;
    let lon = lon_deg + lon_min / 60.0;
    let lon = if bits[71] == 1 { -lon } else { lon };

    let base = Position { lat, lon };
    record.base_position = Some(base);
    record.composite_position = Some(base);

    // PDF-2 offsets are present only when bit 110 says so.
    if record.frame_kind == FrameKind::Long && bits[109] == 1 {
        record.flags.position_source_internal = Some(bits[110] == 1);
        record.flags.homing_121_5 = Some(bits[111] == 1);

        let offsets = PositionOffsets {
            lat_sign: if bits[112] == 1 { 1 } else { -1 },
            lat_minutes: bit_field(bits, 113, 2) as u8,
            lat_seconds: (bit_field(bits, 115, 4) * 4) as u8,
            lon_sign: if bits[119] == 1 { 1 } else { -1 },
            lon_minutes: bit_field(bits, 120, 2) as u8,
            lon_seconds: (bit_field(bits, 122, 4) * 4) as u8,
        };
        record.composite_position = Some(apply_offsets(base, &offsets));
        record.offsets = Some(offsets);
    }

    validate_position(record);
}

/// ELT-DT Location protocol (long frame, P=0, code 9).
pub(crate) fn decode_elt_dt_location(bits: &[u8], record: &mut BeaconRecord) {
    // Identification: 2-bit id type; type 0 carries a 24-bit aircraft address.
    let id_type = bit_field(bits, 40, 2);
    record.identification = if id_type == 0 {
        format!("Aircraft {:06X}", bit_field(bits, 42, 24))
    } else {
        "ID-NOT-AVAIL".to_string()
    };

    // PDF-1 base position in half-degree increments.
    let lat = bit_field(bits, 67, 8) as f64 * 0.5;
    let lat = if bits[66] == 1 { -lat } else { lat };
    let lon = bit_field(bits, 76, 9) as f64 * 0.5;
    let lon = if bits[75] == 1 { -lon } else { lon };
    let base = Position { lat, lon };
    record.base_position = Some(base);
    record.composite_position = Some(base);

    if record.frame_kind == FrameKind::Long {
        record.flags.activation_method = Some(bit_field(bits, 106, 2) as u8);
        record.flags.altitude_band = Some(bit_field(bits, 108, 4) as u8);
        let freshness = bit_field(bits, 112, 2) as u8;
        record.flags.location_freshness = Some(freshness);

        // Offsets are meaningful only once the rotating field carries a fix.
        if freshness > 0 {
            let offsets = PositionOffsets {
                lat_sign: if bits[114] == 1 { 1 } else { -1 },
                lat_minutes: bit_field(bits, 115, 4) as u8,
                lat_seconds: (bit_field(bits, 119, 4) * 4) as u8,
                lon_sign: if bits[123] == 1 { 1 } else { -1 },
                lon_minutes: bit_field(bits, 124, 4) as u8,
                lon_seconds: (bit_field(bits, 128, 4) * 4) as u8,
            };
            record.composite_position = Some(apply_offsets(base, &offsets));
            record.offsets = Some(offsets);
        }
    }

    validate_position(record);
}

/// RLS Location protocol (long frame, P=0, code 13).
pub(crate) fn decode_rls_location(bits: &[u8], record: &mut BeaconRecord) {
    let beacon_type = bit_field(bits, 40, 2);
    let type_str = ["ELT", "EPIRB", "PLB", "TEST"][beacon_type as usize];

    if bit_field(bits, 42, 4) == 0xF {
        let mmsi_last6 = bit_field(bits, 46, 20);
        record.identification = format!("RLS MMSI: {mmsi_last6:06}");
    } else {
        let tac = bit_field(bits, 42, 10);
        let serial = bit_field(bits, 52, 14);
        let tac_base = match beacon_type {
            0 => 2000,
            1 => 1000,
            _ => 3000,
        };
        record.identification = format!("RLS {type_str} TAC:{} Serial:{serial}", tac + tac_base);
    }

    // Base position in half-degree increments.
    let lat = bit_field(bits, 67, 8) as f64 * 0.5;
    let lat = if bits[66] == 1 { -lat } else { lat };
    let lon = bit_field(bits, 76, 9) as f64 * 0.5;
    let lon = if bits[75] == 1 { -lon } else { lon };
    let base = Position { lat, lon };
    record.base_position = Some(base);
    record.composite_position = Some(base);

    validate_position(record);
}

/// User-Location position data (long frame, P=1): PDF-2 carries the fix in
/// 4-minute increments.
pub(crate) fn decode_user_location_position(bits: &[u8], record: &mut BeaconRecord) {
    if record.frame_kind != FrameKind::Long {
        return;
    }
    record.flags.position_source_internal = Some(bits[106] == 1);

    let lat_sign = if bits[107] == 0 { 1.0 } else { -1.0 };
    let lat_deg = bit_field(bits, 108, 7) as f64;
    let lat_min = (bit_field(bits, 115, 4) * 4) as f64;
    let lat = lat_sign * (lat_deg + lat_min / 60.0);

    let lon_sign = if bits[119] == 0 { 1.0 } else { -1.0 };
    let lon_deg = bit_field(bits, 120, 8) as f64;
    let lon_min = (bit_field(bits, 128, 4) * 4) as f64;
    let lon = lon_sign * (lon_deg + lon_min / 60.0);

    let pos = Position { lat, lon };
    record.base_position = Some(pos);
    record.composite_position = Some(pos);

    validate_position(record);
}

/// User-protocol identification (short frame, or the PDF-1 of a long
/// user-location frame). Dispatches on the 3-bit user protocol code.
pub(crate) fn decode_user_identification(bits: &[u8], record: &mut BeaconRecord) {
    let user_code = bit_field(bits, 36, 3);
    record.identification = match user_code {
        0 => format!("Orbitography: {}", orbitography_digest(bits)),
        1 => format!("Aviation Call Sign: {}", decode_string(bits, 39, 7).trim_end()),
        2 => {
            let call_sign = decode_string(bits, 39, 6);
            let specific = crate::baudot::baudot_char(bit_field(bits, 75, 6) as u8);
            format!("Maritime Call Sign: {}, Beacon: {specific}", call_sign.trim_end())
        }
        3 => serial_user_identification(bits),
        4 => format!("National User: {}", national_use_digest(bits)),
        6 => format!("Radio Call Sign: {}", decode_string(bits, 39, 7).trim_end()),
        7 => format!("Test User: {}", byte_digest(bits, 39, 5)),
        _ => "Unknown User Protocol".to_string(),
    };
}

/// Serial User protocol: beacon type, 20-bit serial, optional C/S type
/// approval certificate and national-use extensions.
fn serial_user_identification(bits: &[u8]) -> String {
    let beacon_type = bit_field(bits, 39, 3);
    let cs_flag = bits[42] == 1;
    let serial = bit_field(bits, 43, 20);
    let national_use = bit_field(bits, 63, 10);
    let cert_number = bit_field(bits, 73, 10);

    let type_str = match beacon_type {
        0b000 => "ELT",
        0b001 => "ELT (operator)",
        0b010 => "Float free EPIRB",
        0b011 => "ELT (24-bit addr)",
        0b100 => "Non-float free EPIRB",
        0b110 => "PLB",
        _ => "Unknown beacon type",
    };

    let mut id = format!("{type_str} - Serial: {serial}");
    if cs_flag && cert_number > 0 {
        id.push_str(&format!(", C/S Cert: {cert_number}"));
    }
    if national_use > 0 {
        id.push_str(&format!(", National: {national_use}"));
    }
    id
}

/// Standard test protocol payload (long frame, P=0, code 14).
pub(crate) fn decode_standard_test(bits: &[u8], record: &mut BeaconRecord) {
    record.identification = format!("Test Data: {}", byte_digest(bits, 40, 3));
}

/// National use / national test payload.
pub(crate) fn decode_national_use(bits: &[u8], record: &mut BeaconRecord) {
    record.identification = format!("National Test: {}", national_use_digest(bits));
}

/// Five data bytes plus the trailing 6-bit counter of an orbitography frame.
fn orbitography_digest(bits: &[u8]) -> String {
    format!("{}{:02}", byte_digest(bits, 39, 5), bit_field(bits, 79, 6))
}

fn national_use_digest(bits: &[u8]) -> String {
    let tail1 = bit_field(bits, 79, 6);
    let tail2 = if bits.len() > 111 {
        bit_field(bits, 106, 6)
    } else {
        0
    };
    format!("{}{tail1:02}{tail2:02}", byte_digest(bits, 39, 5))
}

/// Hex digest of `count` bytes starting at bit index `start`.
fn byte_digest(bits: &[u8], start: usize, count: usize) -> String {
    (0..count)
        .map(|i| format!("{:02X}", bit_field(bits, start + i * 8, 8)))
        .collect()
}
