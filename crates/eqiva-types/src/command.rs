//! Command frames for Eqiva thermostats.
//!
//! Every encoder validates its inputs first and only then builds the frame,
//! so an `Err` means no bytes exist that could reach the device.
//!
//! | Opcode | Frame |
//! |--------|-------|
//! | `0x00` | `[0x00]` read serial, firmware and PIN |
//! | `0x03` | `[0x03, year-2000, month, day, hour, minute, second]` status request |
//! | `0x10` | `[0x10, day, temp0, (time, temp)*, 144, 0...]` write timer (16 bytes) |
//! | `0x11` | `[0x11, comfort, eco]` comfort/eco temperatures |
//! | `0x13` | `[0x13, offset+7]` calibration offset |
//! | `0x14` | `[0x14, temp, minutes/5]` window-open setpoint |
//! | `0x20` | `[0x20, day]` read timer |
//! | `0x40` | `[0x40, mode]` or `[0x40, temp\|0x80, day, year-2000, time/30, month]` |
//! | `0x41` | `[0x41, temp]` manual setpoint |
//! | `0x45` | `[0x45, preset]` comfort/eco/boost |
//! | `0x80` | `[0x80, 0\|1]` child lock |
//! | `0xF0` | `[0xF0]` factory reset |
//!
//! Temperatures are half degrees; timer times are ten-minute slots.

use bytes::Bytes;
use time::PrimitiveDateTime;

use crate::error::{ValidationError, ValidationResult};
use crate::types::{
    END_OF_DAY_SLOT, ModeCommand, Offset, Preset, Temperature, TimerSchedule, VacationEnd, Weekday,
};

/// Read serial number, firmware version and PIN.
pub const READ_SERIAL: u8 = 0x00;
/// Request a status notification, stamped with the current local time.
pub const STATUS_REQUEST: u8 = 0x03;
/// Write the timer program of one day.
pub const WRITE_TIMER: u8 = 0x10;
/// Configure comfort and eco temperatures.
pub const SET_COMFORT_ECO: u8 = 0x11;
/// Configure the calibration offset.
pub const SET_OFFSET: u8 = 0x13;
/// Configure the window-open setpoint and duration.
pub const SET_WINDOW_OPEN: u8 = 0x14;
/// Read the timer program of one day.
pub const READ_TIMER: u8 = 0x20;
/// Switch mode (auto, manual, vacation).
pub const SET_MODE: u8 = 0x40;
/// Set the manual setpoint.
pub const SET_TEMPERATURE: u8 = 0x41;
/// Select a preset (comfort, eco, boost on/off).
pub const SET_PRESET: u8 = 0x45;
/// Lock or unlock the controls.
pub const SET_LOCK: u8 = 0x80;
/// Reset the device to factory defaults.
pub const FACTORY_RESET: u8 = 0xF0;

/// Length of a write-timer frame.
pub const TIMER_FRAME_LEN: usize = 16;

/// Bit marking the temperature byte of a vacation frame.
const VACATION_FLAG: u8 = 0x80;

/// Longest window-open hold in minutes.
pub const MAX_WINDOW_OPEN_MINUTES: u16 = 150;

/// An encoded command frame. The first byte is the opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(Bytes);

impl Command {
    fn new(frame: Vec<u8>) -> Self {
        Self(Bytes::from(frame))
    }

    /// Opcode of the frame.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.0[0]
    }

    /// Frame bytes as written to the command characteristic.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Frame length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Frames are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Switch to the mode selected by a raw mode byte.
#[must_use]
pub fn encode_mode(mode_byte: u8) -> Command {
    Command::new(vec![SET_MODE, mode_byte])
}

/// Hold `celsius` until `until`.
///
/// # Errors
///
/// Returns a [`ValidationError`] if `celsius` is outside 4.5–30.0°C.
pub fn encode_vacation(celsius: f32, until: &VacationEnd) -> ValidationResult<Command> {
    let temperature = Temperature::from_celsius(celsius)?;
    Ok(vacation_frame(temperature, until))
}

fn vacation_frame(temperature: Temperature, until: &VacationEnd) -> Command {
    Command::new(vec![
        SET_MODE,
        temperature.half_degrees() | VACATION_FLAG,
        until.day(),
        until.year_offset(),
        until.time().to_half_hour_slot(),
        until.month(),
    ])
}

/// Encode a typed mode switch.
///
/// # Errors
///
/// Returns a [`ValidationError`] if a vacation temperature is outside
/// 4.5–30.0°C, which can happen when it was taken from a status read.
pub fn encode_mode_command(mode: &ModeCommand) -> ValidationResult<Command> {
    Ok(match mode {
        ModeCommand::Auto => encode_mode(ModeCommand::AUTO_BYTE),
        ModeCommand::Manual => encode_mode(ModeCommand::MANUAL_BYTE),
        ModeCommand::Vacation { temperature, until } => {
            vacation_frame(temperature.settable("temperature")?, until)
        }
    })
}

/// Set the manual setpoint.
///
/// # Errors
///
/// Returns a [`ValidationError`] if `celsius` is outside 4.5–30.0°C.
pub fn encode_manual_temp(celsius: f32) -> ValidationResult<Command> {
    let temperature = Temperature::from_celsius(celsius)?;
    Ok(Command::new(vec![SET_TEMPERATURE, temperature.half_degrees()]))
}

/// Select a preset.
#[must_use]
pub fn encode_preset(preset: Preset) -> Command {
    Command::new(vec![SET_PRESET, preset.byte()])
}

/// Configure the comfort and eco temperatures.
///
/// # Errors
///
/// Returns a [`ValidationError`] if either value is outside 5.0–30.0°C.
pub fn encode_comfort_eco(comfort: f32, eco: f32) -> ValidationResult<Command> {
    let comfort = Temperature::preset_from_celsius("comfort", comfort)?;
    let eco = Temperature::preset_from_celsius("eco", eco)?;
    Ok(Command::new(vec![
        SET_COMFORT_ECO,
        comfort.half_degrees(),
        eco.half_degrees(),
    ]))
}

/// Configure the window-open setpoint and how long it is held.
///
/// # Errors
///
/// Returns a [`ValidationError`] if `celsius` is outside 5.0–30.0°C or
/// `minutes` is not a multiple of 5 within 0–150.
pub fn encode_window_open(celsius: f32, minutes: u16) -> ValidationResult<Command> {
    let temperature = Temperature::preset_from_celsius("temperature", celsius)?;
    check_window_open_minutes(minutes)?;
    Ok(Command::new(vec![
        SET_WINDOW_OPEN,
        temperature.half_degrees(),
        (minutes / 5) as u8,
    ]))
}

/// Check a window-open hold: a multiple of 5 minutes, at most
/// [`MAX_WINDOW_OPEN_MINUTES`].
///
/// # Errors
///
/// Returns a [`ValidationError`] for any other duration.
pub fn check_window_open_minutes(minutes: u16) -> ValidationResult<u16> {
    if minutes % 5 != 0 {
        return Err(ValidationError::new(
            "duration",
            format!("{minutes} min is not a multiple of 5 minutes"),
        ));
    }
    if minutes > MAX_WINDOW_OPEN_MINUTES {
        return Err(ValidationError::new(
            "duration",
            format!("{minutes} min is outside 0..{MAX_WINDOW_OPEN_MINUTES} minutes"),
        ));
    }
    Ok(minutes)
}

/// Configure the calibration offset.
///
/// # Errors
///
/// Returns a [`ValidationError`] if `offset` is outside −3.5…+3.5°C or not a
/// multiple of 0.5°C.
pub fn encode_offset(offset: f32) -> ValidationResult<Command> {
    let offset = Offset::from_celsius(offset)?;
    Ok(Command::new(vec![SET_OFFSET, offset.to_wire()]))
}

/// Lock (`true`) or unlock the on-device controls.
#[must_use]
pub fn encode_lock(locked: bool) -> Command {
    Command::new(vec![SET_LOCK, u8::from(locked)])
}

/// Write the program of `day`.
///
/// The frame holds the midnight temperature followed by `(time, temperature)`
/// pairs. A 24:00 sentinel closes the day and the frame is zero-padded to
/// [`TIMER_FRAME_LEN`] bytes.
///
/// Only six pairs fit in front of the sentinel. With seven switch points the
/// sentinel overwrites the time of the seventh and its temperature is cut
/// off, so the seventh switch point is dropped and the sixth setpoint runs
/// until 24:00.
///
/// # Errors
///
/// Returns a [`ValidationError`] if `schedule` fails the checks of
/// [`TimerSchedule::new`], which can happen for a schedule read back from a
/// device.
pub fn encode_timer(day: Weekday, schedule: &TimerSchedule) -> ValidationResult<Command> {
    schedule.validate()?;

    let mut frame = Vec::with_capacity(TIMER_FRAME_LEN + 1);
    frame.extend_from_slice(&[
        WRITE_TIMER,
        day.index(),
        schedule.initial_temperature().half_degrees(),
    ]);

    for breakpoint in &schedule.breakpoints()[1..] {
        let slot = breakpoint.time().map_or(0, |t| t.to_ten_minute_slot());
        frame.push(slot);
        frame.push(breakpoint.temperature().half_degrees());
    }

    if frame.len() < TIMER_FRAME_LEN {
        frame.push(END_OF_DAY_SLOT);
    } else {
        frame[TIMER_FRAME_LEN - 1] = END_OF_DAY_SLOT;
    }
    frame.resize(TIMER_FRAME_LEN, 0);

    Ok(Command::new(frame))
}

/// Read the program of `day`.
#[must_use]
pub fn encode_timer_request(day: Weekday) -> Command {
    Command::new(vec![READ_TIMER, day.index()])
}

/// Request a status notification, stamped with local time `now`.
///
/// # Errors
///
/// Returns a [`ValidationError`] if `now` is outside the years 2000–2255.
pub fn encode_status_request(now: PrimitiveDateTime) -> ValidationResult<Command> {
    let year = now.year();
    if !(2000..=2255).contains(&year) {
        return Err(ValidationError::new(
            "now",
            format!("year {year} is outside 2000..2255"),
        ));
    }
    Ok(Command::new(vec![
        STATUS_REQUEST,
        (year - 2000) as u8,
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
    ]))
}

/// Read serial number, firmware version and PIN.
#[must_use]
pub fn encode_serial_request() -> Command {
    Command::new(vec![READ_SERIAL])
}

/// Reset the device to factory defaults.
#[must_use]
pub fn encode_factory_reset() -> Command {
    Command::new(vec![FACTORY_RESET])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Breakpoint, TimeOfDay};
    use time::macros::datetime;

    fn temp(c: f32) -> Temperature {
        Temperature::from_celsius(c).unwrap()
    }

    #[test]
    fn test_mode_frames() {
        assert_eq!(
            encode_mode_command(&ModeCommand::Auto).unwrap().as_bytes(),
            &[0x40, 0x00]
        );
        assert_eq!(
            encode_mode_command(&ModeCommand::Manual).unwrap().as_bytes(),
            &[0x40, 0x40]
        );
    }

    #[test]
    fn test_vacation_frame() {
        let until = VacationEnd::new(18, 1, 2025, 18, 30).unwrap();
        let cmd = encode_vacation(20.0, &until).unwrap();
        assert_eq!(cmd.as_bytes(), &[0x40, 40 + 0x80, 18, 25, 37, 1]);
        assert_eq!(cmd.opcode(), SET_MODE);

        let typed = encode_mode_command(&ModeCommand::Vacation {
            temperature: temp(20.0),
            until,
        })
        .unwrap();
        assert_eq!(typed, cmd);
    }

    #[test]
    fn test_vacation_with_unsettable_temperature_is_rejected() {
        let until = VacationEnd::new(1, 1, 2026, 0, 0).unwrap();
        let err = encode_mode_command(&ModeCommand::Vacation {
            temperature: Temperature::from_half_degrees(200),
            until,
        })
        .unwrap_err();
        assert_eq!(err.field, "temperature");
    }

    #[test]
    fn test_vacation_frame_latest_year() {
        let until = VacationEnd::new(31, 12, 2255, 23, 30).unwrap();
        let cmd = encode_vacation(20.0, &until).unwrap();
        assert_eq!(cmd.as_bytes(), &[0x40, 40 + 0x80, 31, 255, 47, 12]);
    }

    #[test]
    fn test_manual_temp_frame() {
        assert_eq!(encode_manual_temp(22.5).unwrap().as_bytes(), &[0x41, 45]);
        assert_eq!(encode_manual_temp(4.5).unwrap().as_bytes(), &[0x41, 9]);
        assert_eq!(encode_manual_temp(30.0).unwrap().as_bytes(), &[0x41, 60]);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(encode_manual_temp(31.0).is_err());
        assert!(encode_manual_temp(4.0).is_err());
        assert!(encode_offset(4.0).is_err());
        assert!(encode_offset(0.3).is_err());
        assert!(encode_window_open(12.0, 7).is_err());
        assert!(encode_window_open(12.0, 155).is_err());
        assert!(encode_window_open(4.5, 30).is_err());
        assert_eq!(check_window_open_minutes(150).unwrap(), 150);
        assert!(encode_comfort_eco(4.5, 17.0).is_err());
        assert!(encode_comfort_eco(21.0, 30.5).is_err());
        let until = VacationEnd::new(1, 1, 2026, 0, 0).unwrap();
        assert!(encode_vacation(3.0, &until).is_err());
    }

    #[test]
    fn test_preset_frames() {
        assert_eq!(encode_preset(Preset::Comfort).as_bytes(), &[0x45, 0x43]);
        assert_eq!(encode_preset(Preset::Eco).as_bytes(), &[0x45, 0x44]);
        assert_eq!(encode_preset(Preset::BoostOn).as_bytes(), &[0x45, 0xFF]);
        assert_eq!(encode_preset(Preset::BoostOff).as_bytes(), &[0x45, 0x00]);
    }

    #[test]
    fn test_config_frames() {
        assert_eq!(encode_comfort_eco(20.0, 10.0).unwrap().as_bytes(), &[0x11, 40, 20]);
        assert_eq!(encode_window_open(15.0, 30).unwrap().as_bytes(), &[0x14, 30, 6]);
        assert_eq!(encode_window_open(12.0, 0).unwrap().as_bytes(), &[0x14, 24, 0]);
        assert_eq!(encode_offset(-2.5).unwrap().as_bytes(), &[0x13, 2]);
        assert_eq!(encode_offset(3.5).unwrap().as_bytes(), &[0x13, 14]);
    }

    #[test]
    fn test_simple_frames() {
        assert_eq!(encode_lock(true).as_bytes(), &[0x80, 0x01]);
        assert_eq!(encode_lock(false).as_bytes(), &[0x80, 0x00]);
        assert_eq!(encode_serial_request().as_bytes(), &[0x00]);
        assert_eq!(encode_factory_reset().as_bytes(), &[0xF0]);
        assert_eq!(encode_timer_request(Weekday::Friday).as_bytes(), &[0x20, 6]);
    }

    #[test]
    fn test_status_request_frame() {
        let cmd = encode_status_request(datetime!(2025-01-18 19:05:42)).unwrap();
        assert_eq!(cmd.as_bytes(), &[0x03, 25, 1, 18, 19, 5, 42]);
        assert!(encode_status_request(datetime!(1999-12-31 23:59:59)).is_err());
    }

    #[test]
    fn test_timer_frame() {
        let schedule = TimerSchedule::new(vec![
            Breakpoint::initial(temp(10.0)),
            Breakpoint::at(TimeOfDay::new(9, 30).unwrap(), temp(20.0)),
            Breakpoint::at(TimeOfDay::new(10, 0).unwrap(), temp(10.0)),
        ])
        .unwrap();

        let cmd = encode_timer(Weekday::Sunday, &schedule).unwrap();
        assert_eq!(cmd.len(), TIMER_FRAME_LEN);
        assert_eq!(
            cmd.as_bytes(),
            &[0x10, 1, 20, 57, 40, 60, 20, 144, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_timer_frame_single_entry() {
        let schedule = TimerSchedule::new(vec![Breakpoint::initial(temp(17.0))]).unwrap();
        let cmd = encode_timer(Weekday::Saturday, &schedule).unwrap();
        assert_eq!(&cmd.as_bytes()[..4], &[0x10, 0, 34, 144]);
        assert_eq!(cmd.len(), TIMER_FRAME_LEN);
    }

    #[test]
    fn test_timer_frame_rejects_decoded_out_of_range_schedule() {
        let schedule = TimerSchedule::from_decoded(vec![
            Breakpoint::initial(temp(17.0)),
            Breakpoint::at(
                TimeOfDay::new(6, 0).unwrap(),
                Temperature::from_half_degrees(200),
            ),
        ]);
        assert!(encode_timer(Weekday::Monday, &schedule).is_err());
    }

    #[test]
    fn test_timer_frame_full_day_forces_end_of_day() {
        let mut entries = vec![Breakpoint::initial(temp(17.0))];
        for hour in 1..=7 {
            entries.push(Breakpoint::at(TimeOfDay::new(hour * 3, 0).unwrap(), temp(20.0)));
        }
        let schedule = TimerSchedule::new(entries).unwrap();

        let cmd = encode_timer(Weekday::Monday, &schedule).unwrap();
        assert_eq!(cmd.len(), TIMER_FRAME_LEN);
        assert_eq!(cmd.as_bytes()[13], 18 * 6);
        // The seventh switch point (21:00) is replaced by the end marker.
        assert_eq!(cmd.as_bytes()[15], END_OF_DAY_SLOT);
        assert!(!cmd.as_bytes().contains(&(21 * 6)));
    }
}
