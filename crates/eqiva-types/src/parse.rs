//! Decoders for thermostat notifications.
//!
//! The device answers on a single notification characteristic without any
//! request tag, so each decoder only checks the length its layout needs and
//! reads fields at fixed offsets.

use bytes::Buf;

use crate::error::{ParseError, ParseResult};
use crate::types::{
    Breakpoint, END_OF_DAY_SLOT, ExtendedConfig, ModeFlags, Offset, SerialInfo, StatusSnapshot,
    Temperature, TimeOfDay, TimerSchedule, VacationEnd, Weekday,
};

/// Minimum length of a status notification.
pub const MIN_STATUS_BYTES: usize = 6;

/// A status notification longer than this carries the vacation end.
const VACATION_THRESHOLD: usize = 10;

/// A status notification longer than this carries the extended settings.
const EXTENDED_THRESHOLD: usize = 14;

/// Minimum length of a timer notification.
pub const MIN_TIMER_BYTES: usize = 16;

/// Minimum length of a serial notification.
pub const MIN_SERIAL_BYTES: usize = 15;

/// Exact length of a write-timer or factory-reset acknowledgement.
pub const ACK_BYTES: usize = 3;

/// Every serial character is sent offset by this value.
const SERIAL_CHAR_OFFSET: u8 = 0x30;

/// Length of a device serial.
const SERIAL_LEN: usize = 10;

fn require(data: &[u8], expected: usize) -> ParseResult<()> {
    if data.len() < expected {
        return Err(ParseError::InsufficientBytes {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn require_exact(data: &[u8], expected: usize) -> ParseResult<()> {
    if data.len() != expected {
        return Err(ParseError::UnexpectedLength {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Decode a status notification.
///
/// Layout:
/// - byte 2: mode bitfield (see [`ModeFlags`])
/// - byte 3: valve position in percent
/// - byte 5: target temperature in half degrees
/// - bytes 6–9 (vacation active, length > 10): day, year − 2000,
///   half-hour counter, month
/// - bytes 10–14 (length > 14): window-open temperature, window-open
///   minutes / 5, comfort, eco, offset + 7
///
/// # Errors
///
/// Returns [`ParseError::InsufficientBytes`] if `data` is shorter than
/// [`MIN_STATUS_BYTES`].
pub fn parse_status(data: &[u8]) -> ParseResult<StatusSnapshot> {
    require(data, MIN_STATUS_BYTES)?;

    let mut buf = &data[2..];
    let modes = ModeFlags::from_byte(buf.get_u8());
    let valve = buf.get_u8();
    let _unused = buf.get_u8();
    let temperature = Temperature::from_half_degrees(buf.get_u8());

    let vacation = if modes.contains(crate::types::Mode::Vacation) && data.len() > VACATION_THRESHOLD
    {
        let day = buf.get_u8();
        let year_offset = buf.get_u8();
        let half_hours = buf.get_u8();
        let month = buf.get_u8();
        Some(VacationEnd::from_decoded(day, month, year_offset, half_hours))
    } else {
        None
    };

    let extended = if data.len() > EXTENDED_THRESHOLD {
        let mut buf = &data[10..];
        Some(ExtendedConfig {
            window_open_temp: Temperature::from_half_degrees(buf.get_u8()),
            window_open_minutes: u16::from(buf.get_u8()) * 5,
            comfort: Temperature::from_half_degrees(buf.get_u8()),
            eco: Temperature::from_half_degrees(buf.get_u8()),
            offset: Offset::from_wire(buf.get_u8()),
        })
    } else {
        None
    };

    Ok(StatusSnapshot {
        modes,
        temperature,
        valve,
        vacation,
        extended,
    })
}

/// Decode a timer notification.
///
/// Byte 2 is the midnight temperature; up to seven `(time, temperature)`
/// pairs follow from byte 3. Decoding stops at a `(0, 0)` pair, at the
/// 24:00 sentinel, or at the end of the payload.
///
/// # Errors
///
/// Returns [`ParseError::InsufficientBytes`] if `data` is shorter than
/// [`MIN_TIMER_BYTES`].
pub fn parse_timer(data: &[u8]) -> ParseResult<TimerSchedule> {
    require(data, MIN_TIMER_BYTES)?;

    let mut breakpoints = vec![Breakpoint::initial(Temperature::from_half_degrees(data[2]))];
    for pair in data[3..].chunks_exact(2).take(crate::types::MAX_BREAKPOINTS) {
        let (slot, temp) = (pair[0], pair[1]);
        if (slot == 0 && temp == 0) || slot >= END_OF_DAY_SLOT {
            break;
        }
        breakpoints.push(Breakpoint::at(
            TimeOfDay::from_ten_minute_slot(slot),
            Temperature::from_half_degrees(temp),
        ));
    }

    Ok(TimerSchedule::from_decoded(breakpoints))
}

/// Decode a serial notification.
///
/// Byte 1 is the firmware version in hundredths; bytes 4–13 are the serial
/// characters, each offset by `0x30`.
///
/// # Errors
///
/// Returns [`ParseError::InsufficientBytes`] if `data` is shorter than
/// [`MIN_SERIAL_BYTES`], or [`ParseError::InvalidData`] if a serial byte
/// does not decode to a printable ASCII character.
pub fn parse_serial(data: &[u8]) -> ParseResult<SerialInfo> {
    require(data, MIN_SERIAL_BYTES)?;

    let firmware = data[1];
    let serial = data[4..4 + SERIAL_LEN]
        .iter()
        .map(|&b| {
            b.checked_sub(SERIAL_CHAR_OFFSET)
                .filter(u8::is_ascii_graphic)
                .map(char::from)
                .ok_or_else(|| ParseError::InvalidData(format!("serial byte 0x{b:02X}")))
        })
        .collect::<ParseResult<String>>()?;
    let pin = derive_pin(serial.as_bytes());

    Ok(SerialInfo {
        serial,
        firmware,
        pin,
    })
}

/// Compute the pairing PIN from a 10-character serial.
///
/// The formula is fixed by the device firmware:
///
/// ```text
/// d0 = (s[3] ^ s[7]) % 10
/// d1 = (s[4] ^ s[8]) % 10
/// d2 = (s[5] ^ s[9]) % 10
/// d3 = ((s[6] - '0') ^ (s[0] - 'A')) % 10
/// ```
///
/// The last digit mixes signed differences; the remainder is taken as the
/// non-negative Euclidean remainder.
///
/// # Panics
///
/// Panics if `serial` is shorter than 10 bytes.
#[must_use]
pub fn derive_pin(serial: &[u8]) -> String {
    let s = |i: usize| i32::from(serial[i]);
    let digits = [
        (s(3) ^ s(7)).rem_euclid(10),
        (s(4) ^ s(8)).rem_euclid(10),
        (s(5) ^ s(9)).rem_euclid(10),
        ((s(6) - i32::from(b'0')) ^ (s(0) - i32::from(b'A'))).rem_euclid(10),
    ];
    digits.iter().map(|d| d.to_string()).collect()
}

/// Decode a write-timer acknowledgement and return the acknowledged day.
///
/// # Errors
///
/// Returns [`ParseError::UnexpectedLength`] unless `data` is exactly
/// [`ACK_BYTES`] long, or [`ParseError::InvalidData`] for an unknown day.
pub fn parse_timer_ack(data: &[u8]) -> ParseResult<Weekday> {
    require_exact(data, ACK_BYTES)?;
    Weekday::from_index(data[2])
        .ok_or_else(|| ParseError::InvalidData(format!("day index {}", data[2])))
}

/// Decode a factory-reset acknowledgement and return its result code.
///
/// A code of `0` means the device accepted the reset.
///
/// # Errors
///
/// Returns [`ParseError::UnexpectedLength`] unless `data` is exactly
/// [`ACK_BYTES`] long.
pub fn parse_reset_ack(data: &[u8]) -> ParseResult<u8> {
    require_exact(data, ACK_BYTES)?;
    Ok(data[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mode;

    fn modes(byte: u8) -> Vec<Mode> {
        parse_status(&[0x02, 0x01, byte, 0, 0, 40])
            .unwrap()
            .modes
            .iter()
            .collect()
    }

    // --- Status ---

    #[test]
    fn test_status_too_short() {
        let err = parse_status(&[0x02, 0x01, 0x00, 0x00, 0x04]).unwrap_err();
        assert_eq!(
            err,
            ParseError::InsufficientBytes {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn test_status_mode_bits() {
        assert_eq!(modes(0x00), vec![Mode::Auto]);
        assert_eq!(modes(0x01), vec![Mode::Manual]);
        assert_eq!(modes(0x05), vec![Mode::Manual, Mode::Boost]);
        assert_eq!(modes(0x08), vec![Mode::Auto, Mode::Dst]);
        assert_eq!(modes(0x30), vec![Mode::Auto, Mode::OpenWindow, Mode::Locked]);
        assert_eq!(modes(0xC1), vec![Mode::Manual, Mode::Unknown, Mode::BatteryLow]);
    }

    #[test]
    fn test_status_valve_and_temperature() {
        let status = parse_status(&[0x02, 0x01, 0x00, 50, 0x04, 40]).unwrap();
        assert_eq!(status.valve, 50);
        assert_eq!(status.temperature.celsius(), 20.0);
        assert!(status.vacation.is_none());
        assert!(status.extended.is_none());
    }

    #[test]
    fn test_status_vacation() {
        let data = [0x02, 0x01, 0x02, 0, 0x04, 40, 18, 25, 37, 1, 24];
        let status = parse_status(&data).unwrap();
        let vacation = status.vacation.unwrap();
        assert_eq!(vacation.day(), 18);
        assert_eq!(vacation.month(), 1);
        assert_eq!(vacation.year(), 2025);
        assert_eq!((vacation.time().hour(), vacation.time().minute()), (18, 30));
    }

    #[test]
    fn test_status_vacation_needs_flag_and_length() {
        // Long enough, but the vacation bit is clear.
        let data = [0x02, 0x01, 0x00, 0, 0x04, 40, 18, 25, 37, 1, 24];
        assert!(parse_status(&data).unwrap().vacation.is_none());

        // Flag set, but only 10 bytes.
        let data = [0x02, 0x01, 0x02, 0, 0x04, 40, 18, 25, 37, 1];
        assert!(parse_status(&data).unwrap().vacation.is_none());
    }

    #[test]
    fn test_status_extended_block() {
        let data = [
            0x02, 0x01, 0x09, 0x00, 0x04, 0x2C, 0x00, 0x00, 0x00, 0x00, 0x18, 0x03, 0x2A, 0x22,
            0x02,
        ];
        let status = parse_status(&data).unwrap();
        let ext = status.extended.unwrap();
        assert_eq!(ext.window_open_temp.celsius(), 12.0);
        assert_eq!(ext.window_open_minutes, 15);
        assert_eq!(ext.comfort.celsius(), 21.0);
        assert_eq!(ext.eco.celsius(), 17.0);
        assert_eq!(ext.offset.celsius(), -2.5);
        assert_eq!(status.temperature.celsius(), 22.0);
        assert!(status.has_mode(Mode::Manual));
        assert!(status.has_mode(Mode::Dst));
    }

    // --- Timer ---

    #[test]
    fn test_timer_too_short() {
        assert!(matches!(
            parse_timer(&[0x21, 0x01, 20, 57, 40]),
            Err(ParseError::InsufficientBytes { expected: 16, .. })
        ));
    }

    #[test]
    fn test_timer_decode() {
        let data = [0x21, 1, 20, 57, 40, 60, 20, 144, 0, 0, 0, 0, 0, 0, 0, 0];
        let schedule = parse_timer(&data).unwrap();
        let entries = schedule.breakpoints();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].temperature().celsius(), 10.0);
        assert_eq!(entries[0].time(), None);
        assert_eq!(entries[1].time().unwrap().to_string(), "09:30");
        assert_eq!(entries[1].temperature().celsius(), 20.0);
        assert_eq!(entries[2].time().unwrap().to_string(), "10:00");
        assert_eq!(entries[2].temperature().celsius(), 10.0);
    }

    #[test]
    fn test_timer_stops_at_zero_pair() {
        let data = [0x21, 1, 34, 36, 42, 0, 0, 60, 42, 66, 34, 0, 0, 0, 0, 0];
        let schedule = parse_timer(&data).unwrap();
        assert_eq!(schedule.breakpoints().len(), 2);
    }

    #[test]
    fn test_timer_full_payload_stays_in_bounds() {
        let mut data = vec![0x21, 2, 34];
        for i in 1..=7u8 {
            data.push(i * 18);
            data.push(40);
        }
        assert_eq!(data.len(), 17);
        let schedule = parse_timer(&data).unwrap();
        assert_eq!(schedule.breakpoints().len(), 8);

        data.truncate(16);
        let schedule = parse_timer(&data).unwrap();
        assert_eq!(schedule.breakpoints().len(), 7);
    }

    // --- Serial ---

    fn serial_payload(serial: &str, firmware: u8) -> Vec<u8> {
        let mut data = vec![0x01, firmware, 0x00, 0x00];
        data.extend(serial.bytes().map(|b| b + 0x30));
        data.push(0x00);
        data
    }

    #[test]
    fn test_serial_decode() {
        let info = parse_serial(&serial_payload("OEQ1234567", 120)).unwrap();
        assert_eq!(info.serial, "OEQ1234567");
        assert_eq!(info.firmware, 120);
        assert_eq!(info.firmware_version(), 1.2);
        assert_eq!(info.pin.len(), 4);
        assert!(info.pin.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_serial_too_short() {
        assert!(parse_serial(&[0x01, 120, 0, 0, 0x7F]).is_err());
    }

    #[test]
    fn test_pin_formula() {
        // '1'^'5' = 4, '2'^'6' = 4, '3'^'7' = 4, ('4'-'0') ^ ('O'-'A') = 4 ^ 14 = 10 -> 0
        assert_eq!(derive_pin(b"OEQ1234567"), "4440");
        // s[0] below 'A' makes the last term negative: (1 ^ -17) = -18 -> 2
        assert_eq!(derive_pin(b"0000001000"), "0002");
    }

    #[test]
    fn test_serial_rejects_unprintable() {
        let mut data = serial_payload("OEQ1234567", 120);
        data[5] = 0x10;
        assert!(matches!(parse_serial(&data), Err(ParseError::InvalidData(_))));
    }

    // --- Acknowledgements ---

    #[test]
    fn test_acks() {
        assert_eq!(parse_timer_ack(&[0x02, 0x02, 6]).unwrap(), Weekday::Friday);
        assert!(parse_timer_ack(&[0x02, 0x02, 6, 0]).is_err());
        assert!(parse_timer_ack(&[0x02, 0x02, 9]).is_err());
        assert_eq!(parse_reset_ack(&[0x02, 0x00, 0x00]).unwrap(), 0);
        assert!(parse_reset_ack(&[0x02, 0x00]).is_err());
    }
}
