/// Controls the decoding of transmitted and received data at the application, frame, and physical layer
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeLevel {
    /// Controls decoding of the S7 PDUs (header, function, items)
    pub app: AppDecodeLevel,
    /// Controls decoding of the TPKT/COTP framing
    pub frame: FrameDecodeLevel,
    /// Controls the logging of physical layer read/write
    pub physical: PhysDecodeLevel,
}

/// Controls how transmitted and received S7 PDUs are decoded at the INFO log level
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AppDecodeLevel {
    /// Decode nothing
    #[default]
    Nothing,
    /// Decode the ROSCTR, PDU reference and function only
    Header,
    /// Decode the header and a description of each item
    ItemHeaders,
    /// Decode the header, the item descriptions and the decoded values
    ItemValues,
}

/// Controls how the TPKT/COTP framing is decoded at the INFO log level
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FrameDecodeLevel {
    /// Decode nothing
    #[default]
    Nothing,
    /// Decode the TPKT length and COTP TPDU code
    Header,
    /// Decode the header and the raw payload as hexadecimal
    Payload,
}

/// Controls how data transmitted at the physical layer (TCP) is logged
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PhysDecodeLevel {
    /// Log nothing
    #[default]
    Nothing,
    /// Log only the length of data that is sent and received
    Length,
    /// Log the length and the actual data that is sent and received
    Data,
}

impl DecodeLevel {
    /// construct a `DecodeLevel` with nothing enabled
    pub fn nothing() -> Self {
        Self::default()
    }

    /// construct a `DecodeLevel` from its fields
    pub fn new(app: AppDecodeLevel, frame: FrameDecodeLevel, physical: PhysDecodeLevel) -> Self {
        DecodeLevel {
            app,
            frame,
            physical,
        }
    }

    /// change the application decode level
    pub fn application(mut self, app: AppDecodeLevel) -> Self {
        self.app = app;
        self
    }

    /// change the frame decode level
    pub fn frame(mut self, frame: FrameDecodeLevel) -> Self {
        self.frame = frame;
        self
    }

    /// change the physical decode level
    pub fn physical(mut self, physical: PhysDecodeLevel) -> Self {
        self.physical = physical;
        self
    }
}

impl From<AppDecodeLevel> for DecodeLevel {
    fn from(app: AppDecodeLevel) -> Self {
        Self {
            app,
            frame: FrameDecodeLevel::Nothing,
            physical: PhysDecodeLevel::Nothing,
        }
    }
}

impl AppDecodeLevel {
    pub(crate) fn enabled(&self) -> bool {
        self.header()
    }

    pub(crate) fn header(&self) -> bool {
        match self {
            AppDecodeLevel::Nothing => false,
            AppDecodeLevel::Header => true,
            AppDecodeLevel::ItemHeaders => true,
            AppDecodeLevel::ItemValues => true,
        }
    }

    pub(crate) fn item_headers(&self) -> bool {
        match self {
            AppDecodeLevel::Nothing => false,
            AppDecodeLevel::Header => false,
            AppDecodeLevel::ItemHeaders => true,
            AppDecodeLevel::ItemValues => true,
        }
    }

    pub(crate) fn item_values(&self) -> bool {
        match self {
            AppDecodeLevel::Nothing => false,
            AppDecodeLevel::Header => false,
            AppDecodeLevel::ItemHeaders => false,
            AppDecodeLevel::ItemValues => true,
        }
    }
}

impl FrameDecodeLevel {
    pub(crate) fn enabled(&self) -> bool {
        self.header_enabled()
    }

    pub(crate) fn header_enabled(&self) -> bool {
        match self {
            FrameDecodeLevel::Nothing => false,
            FrameDecodeLevel::Header => true,
            FrameDecodeLevel::Payload => true,
        }
    }

    pub(crate) fn payload_enabled(&self) -> bool {
        match self {
            FrameDecodeLevel::Nothing => false,
            FrameDecodeLevel::Header => false,
            FrameDecodeLevel::Payload => true,
        }
    }
}

impl PhysDecodeLevel {
    pub(crate) fn enabled(&self) -> bool {
        self.length_enabled()
    }

    pub(crate) fn length_enabled(&self) -> bool {
        match self {
            PhysDecodeLevel::Nothing => false,
            PhysDecodeLevel::Length => true,
            PhysDecodeLevel::Data => true,
        }
    }

    pub(crate) fn data_enabled(&self) -> bool {
        match self {
            PhysDecodeLevel::Nothing => false,
            PhysDecodeLevel::Length => false,
            PhysDecodeLevel::Data => true,
        }
    }
}

impl std::str::FromStr for AppDecodeLevel {
    type Err = UnknownDecodeLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nothing" => Ok(AppDecodeLevel::Nothing),
            "header" => Ok(AppDecodeLevel::Header),
            "item-headers" => Ok(AppDecodeLevel::ItemHeaders),
            "item-values" => Ok(AppDecodeLevel::ItemValues),
            _ => Err(UnknownDecodeLevel(s.to_string())),
        }
    }
}

impl std::str::FromStr for FrameDecodeLevel {
    type Err = UnknownDecodeLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nothing" => Ok(FrameDecodeLevel::Nothing),
            "header" => Ok(FrameDecodeLevel::Header),
            "payload" => Ok(FrameDecodeLevel::Payload),
            _ => Err(UnknownDecodeLevel(s.to_string())),
        }
    }
}

impl std::str::FromStr for PhysDecodeLevel {
    type Err = UnknownDecodeLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nothing" => Ok(PhysDecodeLevel::Nothing),
            "length" => Ok(PhysDecodeLevel::Length),
            "data" => Ok(PhysDecodeLevel::Data),
            _ => Err(UnknownDecodeLevel(s.to_string())),
        }
    }
}

/// Returned when a decode level name is not recognized
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown decode level: '{0}'")]
pub struct UnknownDecodeLevel(pub String);
