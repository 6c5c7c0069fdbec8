//! Core types for Eqiva thermostat data.
//!
//! Every fixed-point quantity the device speaks is wrapped in a newtype that
//! stores the raw wire unit (half degrees, ten-minute slots, ...). Values
//! built from caller input go through a validating constructor; values
//! decoded from notifications use the raw constructors and are taken as the
//! device reports them.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeStruct};

use crate::error::{ValidationError, ValidationResult};
use crate::uuid::VENDOR_PREFIX;

// --- Device address ---

/// A 6-byte Bluetooth device address.
///
/// The canonical string form is colon-separated uppercase hex
/// (`00:1A:22:0C:3B:7F`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Create an address from its raw bytes (most significant first).
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Whether the address lies under the eQ-3 vendor prefix.
    ///
    /// ```
    /// use eqiva_types::DeviceAddress;
    ///
    /// let addr: DeviceAddress = "00:1a:22:0c:3b:7f".parse().unwrap();
    /// assert!(addr.is_eq3());
    /// assert_eq!(addr.to_string(), "00:1A:22:0C:3B:7F");
    /// ```
    #[must_use]
    pub fn is_eq3(&self) -> bool {
        self.0[..3] == VENDOR_PREFIX
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for DeviceAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ValidationError::new(
                "address",
                format!("'{s}' is not a colon-separated 6-byte address"),
            )
        };

        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split(':');
        for byte in &mut bytes {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

#[cfg(feature = "serde")]
impl Serialize for DeviceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// --- Temperatures ---

/// A temperature in half-degree units, exactly as it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temperature(u8);

impl Temperature {
    /// Lowest setpoint the device accepts (4.5°C, shown as "OFF").
    pub const MIN: Temperature = Temperature(9);
    /// Highest setpoint the device accepts (30.0°C, shown as "ON").
    pub const MAX: Temperature = Temperature(60);
    /// Lowest comfort, eco and window-open setpoint (5.0°C).
    pub const PRESET_MIN: Temperature = Temperature(10);

    /// Validate a setpoint in degrees Celsius and round it to half degrees.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the value is not finite or lies
    /// outside 4.5–30.0°C.
    pub fn from_celsius(celsius: f32) -> ValidationResult<Self> {
        Self::in_range("temperature", celsius, Self::MIN, Self::MAX)
    }

    /// Validate a comfort, eco or window-open setpoint (5.0–30.0°C).
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming `field` if the value is not
    /// finite or lies outside that range.
    pub fn preset_from_celsius(field: &'static str, celsius: f32) -> ValidationResult<Self> {
        Self::in_range(field, celsius, Self::PRESET_MIN, Self::MAX)
    }

    /// Validate `celsius` against an arbitrary half-degree range.
    fn in_range(
        field: &'static str,
        celsius: f32,
        min: Temperature,
        max: Temperature,
    ) -> ValidationResult<Self> {
        if !celsius.is_finite() || celsius < min.celsius() || celsius > max.celsius() {
            return Err(ValidationError::new(
                field,
                format!("{celsius}°C is outside {min}..{max}"),
            ));
        }
        Ok(Self((celsius * 2.0).round() as u8))
    }

    /// Wrap a raw half-degree value as reported by the device.
    pub(crate) const fn from_half_degrees(raw: u8) -> Self {
        Self(raw)
    }

    /// Fail unless the value is a setpoint the device accepts.
    ///
    /// Decoded temperatures are not range-checked, so anything read back
    /// from a device passes through here before it is written again.
    pub(crate) fn settable(self, field: &'static str) -> ValidationResult<Self> {
        if self < Self::MIN || self > Self::MAX {
            return Err(ValidationError::new(
                field,
                format!("{self} is outside {}..{}", Self::MIN, Self::MAX),
            ));
        }
        Ok(self)
    }

    /// Raw half-degree value.
    #[must_use]
    pub const fn half_degrees(&self) -> u8 {
        self.0
    }

    /// Value in degrees Celsius.
    #[must_use]
    pub fn celsius(&self) -> f32 {
        f32::from(self.0) * 0.5
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°C", self.celsius())
    }
}

#[cfg(feature = "serde")]
impl Serialize for Temperature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f32(self.celsius())
    }
}

/// Temperature calibration offset in half-degree steps (−3.5…+3.5°C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Offset(i8);

impl Offset {
    /// Largest offset magnitude in half-degree steps.
    pub const MAX_STEPS: i8 = 7;

    /// Validate an offset in degrees Celsius.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the offset lies outside −3.5…+3.5°C
    /// or is not a multiple of 0.5°C.
    pub fn from_celsius(celsius: f32) -> ValidationResult<Self> {
        if !celsius.is_finite() || !(-3.5..=3.5).contains(&celsius) {
            return Err(ValidationError::new(
                "offset",
                format!("{celsius}°C is outside -3.5..3.5°C"),
            ));
        }
        let steps = celsius * 2.0;
        if steps.fract() != 0.0 {
            return Err(ValidationError::new(
                "offset",
                format!("{celsius}°C is not a multiple of 0.5°C"),
            ));
        }
        Ok(Self(steps as i8))
    }

    /// Decode the wire byte (`steps + 7`).
    #[must_use]
    pub const fn from_wire(raw: u8) -> Self {
        Self((raw as i8).wrapping_sub(Self::MAX_STEPS))
    }

    /// Encode as the wire byte, `(offset + 3.5) * 2`.
    #[must_use]
    pub const fn to_wire(&self) -> u8 {
        self.0.wrapping_add(Self::MAX_STEPS) as u8
    }

    /// Value in degrees Celsius.
    #[must_use]
    pub fn celsius(&self) -> f32 {
        f32::from(self.0) * 0.5
    }
}

#[cfg(feature = "serde")]
impl Serialize for Offset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f32(self.celsius())
    }
}

// --- Time of day ---

/// End-of-day marker in ten-minute units (24:00).
pub const END_OF_DAY_SLOT: u8 = 24 * 6;

/// A time of day with minute resolution.
///
/// `24:00` is representable and marks the end of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Validate an hour/minute pair.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] unless `hour < 24` and `minute < 60`.
    pub fn new(hour: u8, minute: u8) -> ValidationResult<Self> {
        if hour >= 24 || minute >= 60 {
            return Err(ValidationError::new(
                "time",
                format!("{hour:02}:{minute:02} is not a valid time of day"),
            ));
        }
        Ok(Self { hour, minute })
    }

    /// Hour component.
    #[must_use]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute component.
    #[must_use]
    pub const fn minute(&self) -> u8 {
        self.minute
    }

    /// Minutes since midnight.
    #[must_use]
    pub const fn minutes_since_midnight(&self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }

    /// Decode a ten-minute slot counter (`hours = v / 6`, `minutes = (v % 6) * 10`).
    #[must_use]
    pub const fn from_ten_minute_slot(slot: u8) -> Self {
        Self {
            hour: slot / 6,
            minute: (slot % 6) * 10,
        }
    }

    /// Encode as a ten-minute slot counter, `hour * 6 + minute / 10`.
    #[must_use]
    pub const fn to_ten_minute_slot(&self) -> u8 {
        self.hour * 6 + self.minute / 10
    }

    /// Decode a half-hour counter.
    #[must_use]
    pub const fn from_half_hour_slot(slot: u8) -> Self {
        let minutes = slot as u16 * 30;
        Self {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }

    /// Encode as a half-hour counter, `(hour * 60 + minute) / 30`.
    #[must_use]
    pub const fn to_half_hour_slot(&self) -> u8 {
        (self.minutes_since_midnight() / 30) as u8
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[cfg(feature = "serde")]
impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// --- Weekdays ---

/// Day of the week, in the device's own ordering (index 0 is Saturday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum Weekday {
    Saturday = 0,
    Sunday = 1,
    Monday = 2,
    Tuesday = 3,
    Wednesday = 4,
    Thursday = 5,
    Friday = 6,
}

impl Weekday {
    /// All days in wire order.
    pub const ALL: [Weekday; 7] = [
        Weekday::Saturday,
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    /// Wire index of the day.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Day for a wire index, if in range.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// Three-letter uppercase abbreviation (`SAT`, `SUN`, ...).
    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Weekday::Saturday => "SAT",
            Weekday::Sunday => "SUN",
            Weekday::Monday => "MON",
            Weekday::Tuesday => "TUE",
            Weekday::Wednesday => "WED",
            Weekday::Thursday => "THU",
            Weekday::Friday => "FRI",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

impl FromStr for Weekday {
    type Err = ValidationError;

    /// Parse a day name (`fri`, `FRI`, `friday`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| {
                let abbr = day.abbreviation().to_ascii_lowercase();
                lower == abbr || format!("{day:?}").to_ascii_lowercase() == lower
            })
            .ok_or_else(|| ValidationError::new("day", format!("'{s}' is not a valid day")))
    }
}

// --- Modes ---

/// A single flag of the status mode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Mode {
    Auto,
    Manual,
    Vacation,
    Boost,
    Dst,
    OpenWindow,
    Locked,
    Unknown,
    BatteryLow,
}

impl Mode {
    /// Modes carried by bits 1–7 of the mode byte, in bit order.
    const BIT_FLAGS: [(u8, Mode); 7] = [
        (0x02, Mode::Vacation),
        (0x04, Mode::Boost),
        (0x08, Mode::Dst),
        (0x10, Mode::OpenWindow),
        (0x20, Mode::Locked),
        (0x40, Mode::Unknown),
        (0x80, Mode::BatteryLow),
    ];

    /// Label used in JSON output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Manual => "manual",
            Mode::Vacation => "vacation",
            Mode::Boost => "boost",
            Mode::Dst => "dst",
            Mode::OpenWindow => "open_window",
            Mode::Locked => "locked",
            Mode::Unknown => "unknown",
            Mode::BatteryLow => "battery_low",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The set of modes encoded by a status mode byte.
///
/// Bit 0 selects manual (set) or auto (clear); bits 1–7 are independent
/// flags. Iteration yields auto/manual first, then the flags in bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeFlags(u8);

impl ModeFlags {
    /// Wrap a raw mode byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Raw mode byte.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Whether `mode` is part of the set.
    #[must_use]
    pub fn contains(&self, mode: Mode) -> bool {
        match mode {
            Mode::Auto => self.0 & 0x01 == 0,
            Mode::Manual => self.0 & 0x01 != 0,
            other => Mode::BIT_FLAGS
                .iter()
                .any(|&(bit, m)| m == other && self.0 & bit != 0),
        }
    }

    /// Iterate over the modes in the set.
    pub fn iter(&self) -> impl Iterator<Item = Mode> + '_ {
        let base = if self.0 & 0x01 == 0 {
            Mode::Auto
        } else {
            Mode::Manual
        };
        std::iter::once(base).chain(
            Mode::BIT_FLAGS
                .iter()
                .filter(|&&(bit, _)| self.0 & bit != 0)
                .map(|&(_, m)| m),
        )
    }

    /// Number of modes in the set (never zero).
    #[must_use]
    pub fn len(&self) -> usize {
        1 + (self.0 & 0xFE).count_ones() as usize
    }

    /// Always false: auto or manual is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(feature = "serde")]
impl Serialize for ModeFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Operating mode to switch the thermostat into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCommand {
    /// Follow the weekly timer.
    Auto,
    /// Hold the current setpoint.
    Manual,
    /// Hold `temperature` until `until`, then return to the previous mode.
    Vacation {
        temperature: Temperature,
        until: VacationEnd,
    },
}

impl ModeCommand {
    /// Mode byte for the auto program.
    pub const AUTO_BYTE: u8 = 0x00;
    /// Mode byte for manual control.
    pub const MANUAL_BYTE: u8 = 0x40;
}

/// A predefined temperature mode or boost override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Preset {
    /// Switch to the configured comfort temperature.
    Comfort = 0x43,
    /// Switch to the configured eco temperature.
    Eco = 0x44,
    /// Start a boost period.
    BoostOn = 0xFF,
    /// Cancel a running boost.
    BoostOff = 0x00,
}

impl Preset {
    /// Wire byte of the preset.
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }
}

impl FromStr for Preset {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comfort" => Ok(Preset::Comfort),
            "eco" => Ok(Preset::Eco),
            "boost_on" => Ok(Preset::BoostOn),
            "boost_off" => Ok(Preset::BoostOff),
            _ => Err(ValidationError::new(
                "preset",
                format!("'{s}' is not one of comfort, eco, boost_on, boost_off"),
            )),
        }
    }
}

// --- Vacation ---

/// End of a vacation hold, at 30-minute resolution.
///
/// The year always lies in 2000–2255, the range the wire's one-byte year
/// offset can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VacationEnd {
    day: u8,
    month: u8,
    year: u16,
    time: TimeOfDay,
}

impl VacationEnd {
    /// Validate a vacation end date and time.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the date does not exist, the year is
    /// outside 2000–2255, or the time is not on a half-hour boundary.
    pub fn new(day: u8, month: u8, year: u16, hour: u8, minute: u8) -> ValidationResult<Self> {
        if !(2000..=2255).contains(&year) {
            return Err(ValidationError::new(
                "year",
                format!("{year} is outside 2000..2255"),
            ));
        }
        let month_enum = time::Month::try_from(month)
            .map_err(|_| ValidationError::new("month", format!("{month} is not a month")))?;
        time::Date::from_calendar_date(i32::from(year), month_enum, day).map_err(|_| {
            ValidationError::new("day", format!("{day:02}.{month:02}.{year} does not exist"))
        })?;
        let time = TimeOfDay::new(hour, minute)?;
        if minute % 30 != 0 {
            return Err(ValidationError::new(
                "time",
                format!("{time} is not on a 30-minute boundary"),
            ));
        }
        Ok(Self {
            day,
            month,
            year,
            time,
        })
    }

    /// Build from the fields of a status notification.
    pub(crate) fn from_decoded(day: u8, month: u8, year_offset: u8, half_hours: u8) -> Self {
        Self {
            day,
            month,
            year: 2000 + u16::from(year_offset),
            time: TimeOfDay::from_half_hour_slot(half_hours),
        }
    }

    /// Day of month.
    #[must_use]
    pub const fn day(&self) -> u8 {
        self.day
    }

    /// Month (1–12).
    #[must_use]
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// Full year.
    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// Offset from 2000 as sent on the wire.
    #[must_use]
    pub const fn year_offset(&self) -> u8 {
        (self.year - 2000) as u8
    }

    /// Time of day.
    #[must_use]
    pub const fn time(&self) -> TimeOfDay {
        self.time
    }
}

#[cfg(feature = "serde")]
impl Serialize for VacationEnd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("VacationEnd", 4)?;
        state.serialize_field("day", &self.day)?;
        state.serialize_field("month", &self.month)?;
        state.serialize_field("year", &self.year)?;
        state.serialize_field("time", &[self.time.hour(), self.time.minute()])?;
        state.end()
    }
}

// --- Status ---

/// Window-open, comfort/eco and offset settings reported with a long status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ExtendedConfig {
    /// Setpoint applied while an open window is detected.
    pub window_open_temp: Temperature,
    /// How long the window-open setpoint is held, in minutes.
    #[cfg_attr(feature = "serde", serde(rename = "window_open_time"))]
    pub window_open_minutes: u16,
    /// Comfort preset temperature.
    #[cfg_attr(feature = "serde", serde(rename = "comfort_temp"))]
    pub comfort: Temperature,
    /// Eco preset temperature.
    #[cfg_attr(feature = "serde", serde(rename = "eco_temp"))]
    pub eco: Temperature,
    /// Calibration offset.
    #[cfg_attr(feature = "serde", serde(rename = "temp_offset"))]
    pub offset: Offset,
}

/// Decoded thermostat status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StatusSnapshot {
    /// Active modes.
    pub modes: ModeFlags,
    /// Current target temperature.
    pub temperature: Temperature,
    /// Valve opening in percent.
    pub valve: u8,
    /// End of the running vacation hold, if any.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub vacation: Option<VacationEnd>,
    /// Extended settings, present in long status notifications.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub extended: Option<ExtendedConfig>,
}

impl StatusSnapshot {
    /// Whether `mode` is active.
    #[must_use]
    pub fn has_mode(&self, mode: Mode) -> bool {
        self.modes.contains(mode)
    }
}

// --- Serial ---

/// Serial number, firmware version and pairing PIN of a thermostat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialInfo {
    /// Ten-character device serial.
    pub serial: String,
    /// Firmware version in hundredths (e.g. `120` is 1.20).
    pub firmware: u8,
    /// Four-digit PIN derived from the serial.
    pub pin: String,
}

impl SerialInfo {
    /// Firmware version as a decimal number.
    #[must_use]
    pub fn firmware_version(&self) -> f32 {
        f32::from(self.firmware) / 100.0
    }
}

#[cfg(feature = "serde")]
impl Serialize for SerialInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SerialInfo", 3)?;
        state.serialize_field("serial", &self.serial)?;
        state.serialize_field("firmware", &self.firmware_version())?;
        state.serialize_field("pin", &self.pin)?;
        state.end()
    }
}

// --- Timer ---

/// Maximum number of breakpoints after the midnight entry.
pub const MAX_BREAKPOINTS: usize = 7;

/// One schedule entry: `temperature` applies from `time` (midnight if `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    temperature: Temperature,
    time: Option<TimeOfDay>,
}

impl Breakpoint {
    /// The midnight entry of a schedule.
    #[must_use]
    pub const fn initial(temperature: Temperature) -> Self {
        Self {
            temperature,
            time: None,
        }
    }

    /// An entry switching to `temperature` at `time`.
    #[must_use]
    pub const fn at(time: TimeOfDay, temperature: Temperature) -> Self {
        Self {
            temperature,
            time: Some(time),
        }
    }

    /// Setpoint from this entry on.
    #[must_use]
    pub const fn temperature(&self) -> Temperature {
        self.temperature
    }

    /// Switch time, `None` for the midnight entry.
    #[must_use]
    pub const fn time(&self) -> Option<TimeOfDay> {
        self.time
    }
}

#[cfg(feature = "serde")]
impl Serialize for Breakpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeTuple;

        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.temperature)?;
        tuple.serialize_element(&self.time)?;
        tuple.end()
    }
}

/// The program of one weekday.
///
/// The first breakpoint applies from midnight; each further breakpoint
/// switches the setpoint at its time; the day ends at 24:00.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TimerSchedule {
    breakpoints: Vec<Breakpoint>,
}

impl TimerSchedule {
    /// Validate a schedule.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the schedule is empty, the first
    /// entry carries a time, a later entry lacks one, times are not strictly
    /// increasing or not on a 10-minute boundary, a temperature is outside
    /// 4.5–30.0°C, or more than [`MAX_BREAKPOINTS`] entries follow the first.
    ///
    /// A write frame only has room for six switch points before the 24:00
    /// end marker. A seventh one is accepted here but does not reach the
    /// device; see [`crate::command::encode_timer`].
    pub fn new(breakpoints: Vec<Breakpoint>) -> ValidationResult<Self> {
        Self::check(&breakpoints)?;
        Ok(Self { breakpoints })
    }

    /// Re-run the checks of [`TimerSchedule::new`], for schedules read back
    /// from a device.
    pub(crate) fn validate(&self) -> ValidationResult<()> {
        Self::check(&self.breakpoints)
    }

    fn check(breakpoints: &[Breakpoint]) -> ValidationResult<()> {
        let Some((first, rest)) = breakpoints.split_first() else {
            return Err(ValidationError::new("schedule", "schedule is empty"));
        };
        if first.time.is_some() {
            return Err(ValidationError::new(
                "schedule",
                "the first entry applies from midnight and cannot have a time",
            ));
        }
        if rest.len() > MAX_BREAKPOINTS {
            return Err(ValidationError::new(
                "schedule",
                format!(
                    "{} breakpoints after midnight, at most {MAX_BREAKPOINTS} allowed",
                    rest.len()
                ),
            ));
        }

        first.temperature.settable("schedule")?;
        let mut previous: Option<TimeOfDay> = None;
        for entry in rest {
            entry.temperature.settable("schedule")?;
            let time = entry
                .time
                .ok_or_else(|| ValidationError::new("schedule", "breakpoint without a time"))?;
            if time.minute() % 10 != 0 {
                return Err(ValidationError::new(
                    "schedule",
                    format!("{time} is not on a 10-minute boundary"),
                ));
            }
            if previous.is_some_and(|p| p >= time) {
                return Err(ValidationError::new(
                    "schedule",
                    format!("{time} does not come after the previous breakpoint"),
                ));
            }
            previous = Some(time);
        }

        Ok(())
    }

    /// Build a schedule from decoded device data without validation.
    pub(crate) fn from_decoded(breakpoints: Vec<Breakpoint>) -> Self {
        Self { breakpoints }
    }

    /// All breakpoints, midnight entry first.
    #[must_use]
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Temperature applying from midnight.
    #[must_use]
    pub fn initial_temperature(&self) -> Temperature {
        self.breakpoints[0].temperature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp(c: f32) -> Temperature {
        Temperature::from_celsius(c).unwrap()
    }

    // --- Address tests ---

    #[test]
    fn test_address_parse_and_display() {
        let addr: DeviceAddress = "00:1a:22:0C:3B:7f".parse().unwrap();
        assert_eq!(addr.bytes(), [0x00, 0x1A, 0x22, 0x0C, 0x3B, 0x7F]);
        assert_eq!(addr.to_string(), "00:1A:22:0C:3B:7F");
        assert!(addr.is_eq3());
    }

    #[test]
    fn test_address_parse_rejects_malformed() {
        assert!("00:1A:22:0C:3B".parse::<DeviceAddress>().is_err());
        assert!("00:1A:22:0C:3B:7F:00".parse::<DeviceAddress>().is_err());
        assert!("001A220C3B7F".parse::<DeviceAddress>().is_err());
        assert!("00:1A:22:0C:3B:GG".parse::<DeviceAddress>().is_err());
        assert!("0:1A:22:0C:3B:7F".parse::<DeviceAddress>().is_err());
    }

    #[test]
    fn test_address_vendor_prefix() {
        let other = DeviceAddress::new([0xAA, 0x1A, 0x22, 0, 0, 1]);
        assert!(!other.is_eq3());
    }

    // --- Temperature tests ---

    #[test]
    fn test_temperature_range() {
        assert_eq!(temp(4.5).half_degrees(), 9);
        assert_eq!(temp(30.0).half_degrees(), 60);
        assert!(Temperature::from_celsius(4.0).is_err());
        assert!(Temperature::from_celsius(31.0).is_err());
        assert!(Temperature::from_celsius(f32::NAN).is_err());
    }

    #[test]
    fn test_temperature_rounds_to_half_degrees() {
        assert_eq!(temp(22.4).celsius(), 22.5);
        assert_eq!(temp(22.2).celsius(), 22.0);
    }

    #[test]
    fn test_preset_temperature_range() {
        assert_eq!(
            Temperature::preset_from_celsius("eco", 5.0).unwrap(),
            Temperature::PRESET_MIN
        );
        let err = Temperature::preset_from_celsius("eco", 4.5).unwrap_err();
        assert_eq!(err.field, "eco");
    }

    #[test]
    fn test_decoded_temperature_not_settable() {
        assert!(Temperature::from_half_degrees(200).settable("temperature").is_err());
        assert!(Temperature::from_half_degrees(8).settable("temperature").is_err());
        assert!(Temperature::from_half_degrees(9).settable("temperature").is_ok());
    }

    #[test]
    fn test_temperature_display() {
        assert_eq!(temp(21.5).to_string(), "21.5°C");
    }

    // --- Offset tests ---

    #[test]
    fn test_offset_encoding() {
        assert_eq!(Offset::from_celsius(-3.5).unwrap().to_wire(), 0);
        assert_eq!(Offset::from_celsius(0.0).unwrap().to_wire(), 7);
        assert_eq!(Offset::from_celsius(3.5).unwrap().to_wire(), 14);
        assert_eq!(Offset::from_wire(2).celsius(), -2.5);
    }

    #[test]
    fn test_offset_validation() {
        assert!(Offset::from_celsius(4.0).is_err());
        assert!(Offset::from_celsius(-3.6).is_err());
        assert!(Offset::from_celsius(1.2).is_err());
    }

    // --- Time tests ---

    #[test]
    fn test_time_slots() {
        let t = TimeOfDay::new(9, 30).unwrap();
        assert_eq!(t.to_ten_minute_slot(), 57);
        assert_eq!(TimeOfDay::from_ten_minute_slot(57), t);
        assert_eq!(TimeOfDay::new(18, 30).unwrap().to_half_hour_slot(), 37);
        assert_eq!(TimeOfDay::from_half_hour_slot(37).to_string(), "18:30");
        assert_eq!(TimeOfDay::from_ten_minute_slot(END_OF_DAY_SLOT).to_string(), "24:00");
    }

    #[test]
    fn test_time_validation() {
        assert!(TimeOfDay::new(24, 0).is_err());
        assert!(TimeOfDay::new(12, 60).is_err());
    }

    // --- Weekday tests ---

    #[test]
    fn test_weekday_order_starts_at_saturday() {
        assert_eq!(Weekday::Saturday.index(), 0);
        assert_eq!(Weekday::Friday.index(), 6);
        assert_eq!(Weekday::from_index(2), Some(Weekday::Monday));
        assert_eq!(Weekday::from_index(7), None);
    }

    #[test]
    fn test_weekday_parse() {
        assert_eq!("fri".parse::<Weekday>().unwrap(), Weekday::Friday);
        assert_eq!("SUN".parse::<Weekday>().unwrap(), Weekday::Sunday);
        assert_eq!("Wednesday".parse::<Weekday>().unwrap(), Weekday::Wednesday);
        let err = "funday".parse::<Weekday>().unwrap_err();
        assert_eq!(err.field, "day");
    }

    // --- Mode tests ---

    #[test]
    fn test_mode_flags_auto_manual() {
        let auto: Vec<_> = ModeFlags::from_byte(0x00).iter().collect();
        assert_eq!(auto, vec![Mode::Auto]);

        let manual: Vec<_> = ModeFlags::from_byte(0x01).iter().collect();
        assert_eq!(manual, vec![Mode::Manual]);
    }

    #[test]
    fn test_mode_flags_all_bits() {
        let flags = ModeFlags::from_byte(0xFF);
        assert_eq!(flags.len(), 8);
        assert!(flags.contains(Mode::BatteryLow));
        assert!(flags.contains(Mode::OpenWindow));
        assert!(!flags.contains(Mode::Auto));
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!("Boost_On".parse::<Preset>().unwrap(), Preset::BoostOn);
        assert_eq!(Preset::Comfort.byte(), 0x43);
        assert!("turbo".parse::<Preset>().is_err());
    }

    // --- Vacation tests ---

    #[test]
    fn test_vacation_end_validation() {
        assert!(VacationEnd::new(18, 1, 2025, 18, 30).is_ok());
        assert!(VacationEnd::new(30, 2, 2025, 18, 30).is_err());
        assert!(VacationEnd::new(18, 13, 2025, 18, 30).is_err());
        assert!(VacationEnd::new(18, 1, 1999, 18, 30).is_err());
        assert!(VacationEnd::new(18, 1, 2025, 18, 15).is_err());
        assert!(VacationEnd::new(1, 1, 2256, 0, 0).is_err());
    }

    #[test]
    fn test_vacation_end_accessors() {
        let until = VacationEnd::new(18, 1, 2025, 18, 30).unwrap();
        assert_eq!((until.day(), until.month(), until.year()), (18, 1, 2025));
        assert_eq!(until.year_offset(), 25);
        assert_eq!(until.time().to_string(), "18:30");

        let latest = VacationEnd::from_decoded(31, 12, 255, 47);
        assert_eq!(latest.year(), 2255);
        assert_eq!(latest.year_offset(), 255);
        assert_eq!(latest.time().to_string(), "23:30");
    }

    // --- Schedule tests ---

    #[test]
    fn test_schedule_validation() {
        let ok = TimerSchedule::new(vec![
            Breakpoint::initial(temp(10.0)),
            Breakpoint::at(TimeOfDay::new(9, 30).unwrap(), temp(20.0)),
            Breakpoint::at(TimeOfDay::new(10, 0).unwrap(), temp(10.0)),
        ]);
        assert!(ok.is_ok());

        assert!(TimerSchedule::new(vec![]).is_err());
        assert!(
            TimerSchedule::new(vec![Breakpoint::at(
                TimeOfDay::new(1, 0).unwrap(),
                temp(10.0)
            )])
            .is_err()
        );
        let unordered = TimerSchedule::new(vec![
            Breakpoint::initial(temp(10.0)),
            Breakpoint::at(TimeOfDay::new(10, 0).unwrap(), temp(20.0)),
            Breakpoint::at(TimeOfDay::new(9, 0).unwrap(), temp(10.0)),
        ]);
        assert!(unordered.is_err());
        let odd_minute = TimerSchedule::new(vec![
            Breakpoint::initial(temp(10.0)),
            Breakpoint::at(TimeOfDay::new(9, 35).unwrap(), temp(20.0)),
        ]);
        assert!(odd_minute.is_err());
    }

    #[test]
    fn test_schedule_rejects_unsettable_temperatures() {
        let too_hot = TimerSchedule::new(vec![
            Breakpoint::initial(temp(17.0)),
            Breakpoint::at(TimeOfDay::new(6, 0).unwrap(), Temperature::from_half_degrees(200)),
        ]);
        assert!(too_hot.is_err());

        let decoded = TimerSchedule::from_decoded(vec![Breakpoint::initial(
            Temperature::from_half_degrees(0),
        )]);
        assert!(decoded.validate().is_err());
    }

    #[test]
    fn test_schedule_too_many_breakpoints() {
        let mut entries = vec![Breakpoint::initial(temp(10.0))];
        for hour in 1..=8 {
            entries.push(Breakpoint::at(TimeOfDay::new(hour, 0).unwrap(), temp(20.0)));
        }
        assert!(TimerSchedule::new(entries).is_err());
    }
}
