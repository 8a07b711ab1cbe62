//! Conversion of raw channel levels to dimming percentage and output voltage.

pub const VOLTAGE_MIN: f32 = 70.0;
pub const VOLTS_PER_PERCENT: f32 = 1.4;

/// Dimming percentage of a channel level.
///
/// The level is used as a percentage as is, there is no rescaling or
/// clamping. Levels above 100 therefore give percentages above 100.
pub fn percentage(level: u8) -> f32 {
    if level == 0x00 {
        return 0.0;
    }
    f32::from(level)
}

pub fn voltage(percentage: f32) -> f32 {
    VOLTAGE_MIN + percentage * VOLTS_PER_PERCENT
}
