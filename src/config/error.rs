//! Configuration error types

/// Startup configuration error. Always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// C01: A period is zero
    ZeroPeriod,
    /// C02: Producer budget does not fit in the period
    BudgetExceedsPeriod,
    /// C03: Stationary duty outside [0, 100]
    StationaryOutOfRange,
    /// C04: Tachometer resolution, interval or limit invalid
    InvalidTachometer,
    /// C05: PWM frequency is zero
    InvalidPwmFrequency,
    /// C06: Speed of sound not positive
    InvalidSpeedOfSound,
    /// C07: Capture timer clock is zero
    ZeroCaptureClock,
}

impl ConfigError {
    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ZeroPeriod => "C01",
            Self::BudgetExceedsPeriod => "C02",
            Self::StationaryOutOfRange => "C03",
            Self::InvalidTachometer => "C04",
            Self::InvalidPwmFrequency => "C05",
            Self::InvalidSpeedOfSound => "C06",
            Self::ZeroCaptureClock => "C07",
        }
    }

    /// Get error message
    pub fn message(&self) -> &'static str {
        match self {
            Self::ZeroPeriod => "period must be non-zero",
            Self::BudgetExceedsPeriod => "producer budget exceeds period",
            Self::StationaryOutOfRange => "stationary duty out of range",
            Self::InvalidTachometer => "invalid tachometer settings",
            Self::InvalidPwmFrequency => "invalid PWM frequency",
            Self::InvalidSpeedOfSound => "invalid speed of sound",
            Self::ZeroCaptureClock => "capture clock is zero",
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_has_code_and_message() {
        assert_eq!(
            std::format!("{}", ConfigError::BudgetExceedsPeriod),
            "C02: producer budget exceeds period"
        );
    }
}
