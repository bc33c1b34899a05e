/// Driver error. `E` is the serial bus error.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The registers read back differ from the local configuration.
    SettingsOutOfSync,
    /// The ready line did not assert before the settings write timed out.
    NotReadyToWriteSettings,
    /// The ready line did not assert before the settings read timed out.
    NotReadyToReadSettings,
    /// Neither a control pin nor a clock pin is available for resetting.
    ResetMethodNotValid,
    TimeoutWhileResetting,
    TimeoutWhileWritingSettings,
    /// The ready line did not assert before the capture start timed out.
    NotReadyToBeginCapture,
    CannotEndWhenNotCapturing,
    CanOnlyWriteSettingsWhenIdle,
    CanOnlyReadSettingsWhenIdle,
    CanOnlyBeginCaptureWhenIdle,
    /// A register access would run past the end of the register map.
    RegisterRangeInvalid,
    SpiError(E),
}

impl<E> Error<E> {
    /// The device did not respond in time, as opposed to the driver being
    /// used out of order.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::NotReadyToWriteSettings
                | Self::NotReadyToReadSettings
                | Self::TimeoutWhileResetting
                | Self::TimeoutWhileWritingSettings
                | Self::NotReadyToBeginCapture
        )
    }
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::SpiError(e)
    }
}
