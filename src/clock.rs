//! Baud rate and line format arithmetic.

/// Peripheral clock for a two-bit clock selection value.
///
/// `0b01` runs the peripheral at the core clock, `0b10` at half of it, `0b11`
/// at an eighth. Anything else, including the reset value `0b00`, selects a
/// quarter.
pub const fn peripheral_clock(core_clock_hz: u32, select: u8) -> u32 {
    match select & 0x03 {
        0b01 => core_clock_hz,
        0b10 => core_clock_hz / 2,
        0b11 => core_clock_hz / 8,
        _ => core_clock_hz / 4,
    }
}

/// Baud rate generator divisor for 16x oversampling, truncated toward zero.
///
/// Returns `None` for a zero baud rate.
pub const fn divisor(pclk_hz: u32, baud_rate: u32) -> Option<u32> {
    if baud_rate == 0 {
        return None;
    }
    Some(pclk_hz / 16 / baud_rate)
}

/// Number of data bits per character.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    /// 5 bits.
    Five,
    /// 6 bits.
    Six,
    /// 7 bits.
    Seven,
    /// 8 bits.
    #[default]
    Eight,
}

/// Parity generation and checking.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
    /// Parity bit forced to 1.
    Mark,
    /// Parity bit forced to 0.
    Space,
}

/// Number of stop bits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// One stop bit.
    #[default]
    One,
    /// Two stop bits (1.5 with five data bits).
    Two,
}

/// Character framing, programmed into the Line Control Register.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineFormat {
    /// Data bits per character.
    pub data_bits: DataBits,
    /// Parity mode.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: StopBits,
}

impl LineFormat {
    /// 8 data bits, no parity, 1 stop bit.
    pub const EIGHT_N_1: Self = Self {
        data_bits: DataBits::Eight,
        parity: Parity::None,
        stop_bits: StopBits::One,
    };

    /// Line Control Register value, with the divisor latch bit clear.
    pub const fn bits(&self) -> u8 {
        let word = match self.data_bits {
            DataBits::Five => 0b00,
            DataBits::Six => 0b01,
            DataBits::Seven => 0b10,
            DataBits::Eight => 0b11,
        };
        let stop = match self.stop_bits {
            StopBits::One => 0,
            StopBits::Two => 1 << 2,
        };
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Odd => 0b001 << 3,
            Parity::Even => 0b011 << 3,
            Parity::Mark => 0b101 << 3,
            Parity::Space => 0b111 << 3,
        };
        word | stop | parity
    }

    /// Decodes raw Line Control Register mode bits. The divisor latch and
    /// break control bits are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        let data_bits = match bits & 0b11 {
            0b00 => DataBits::Five,
            0b01 => DataBits::Six,
            0b10 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        let stop_bits = if bits & (1 << 2) != 0 {
            StopBits::Two
        } else {
            StopBits::One
        };
        let parity = if bits & (1 << 3) == 0 {
            Parity::None
        } else {
            match (bits >> 4) & 0b11 {
                0b00 => Parity::Odd,
                0b01 => Parity::Even,
                0b10 => Parity::Mark,
                _ => Parity::Space,
            }
        };
        Self {
            data_bits,
            parity,
            stop_bits,
        }
    }
}
