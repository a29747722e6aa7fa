//! Fixed-width hexadecimal encodings used by the splice program formats.
//!
//! Floats are written as the big-endian IEEE-754 bit pattern of the `f32`
//! value, always 8 lowercase digits. Signed 16-bit values use their two's
//! complement pattern.

/// Encode an `f32` as its 8-digit big-endian bit pattern
pub fn float_to_hex(value: f32) -> String {
    format!("{:08x}", value.to_bits())
}

/// Encode an `i16` as a 4-digit two's complement pattern
pub fn int16_to_hex(value: i16) -> String {
    format!("{:04x}", value as u16)
}

/// Encode an unsigned value zero-padded to `digits` hex digits
pub fn uint_to_hex(value: u32, digits: usize) -> String {
    format!("{:0width$x}", value, width = digits)
}

/// Decode an 8-digit float bit pattern
pub fn hex_to_float(text: &str) -> Option<f32> {
    if text.len() != 8 {
        return None;
    }
    u32::from_str_radix(text, 16).ok().map(f32::from_bits)
}

/// Decode a 4-digit two's complement pattern
pub fn hex_to_int16(text: &str) -> Option<i16> {
    u16::from_str_radix(text, 16).ok().map(|v| v as i16)
}
