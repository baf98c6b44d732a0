/// default TCP port for ISO-on-TCP
pub const DEFAULT_PORT: u16 = 102;

pub(crate) mod tpkt {
    pub(crate) const VERSION: u8 = 0x03;
    pub(crate) const HEADER_LENGTH: usize = 4;
}

pub(crate) mod cotp {
    /// TPDU codes (upper nibble of the second byte)
    pub(crate) const CONNECTION_REQUEST: u8 = 0xE0;
    pub(crate) const CONNECTION_CONFIRM: u8 = 0xD0;
    pub(crate) const DATA: u8 = 0xF0;

    /// last data unit flag in a DT TPDU
    pub(crate) const EOT: u8 = 0x80;

    /// parameter codes in a CR TPDU
    pub(crate) const PARAM_TPDU_SIZE: u8 = 0xC0;
    pub(crate) const PARAM_SRC_TSAP: u8 = 0xC1;
    pub(crate) const PARAM_DST_TSAP: u8 = 0xC2;

    /// 2^10 = 1024 byte TPDUs
    pub(crate) const TPDU_SIZE_1024: u8 = 0x0A;

    pub(crate) const LOCAL_TSAP: u16 = 0x0100;
    /// connection type PG in the high byte of the remote TSAP
    pub(crate) const REMOTE_TSAP_PG: u16 = 0x0100;

    pub(crate) const DATA_HEADER_LENGTH: usize = 3;
}

pub(crate) mod header {
    pub(crate) const PROTOCOL_ID: u8 = 0x32;
    pub(crate) const JOB_LENGTH: usize = 10;
    pub(crate) const ACK_DATA_LENGTH: usize = 12;
}

pub(crate) mod rosctr {
    pub(crate) const JOB: u8 = 0x01;
    pub(crate) const ACK: u8 = 0x02;
    pub(crate) const ACK_DATA: u8 = 0x03;
}

pub(crate) mod function {
    pub(crate) const READ_VAR: u8 = 0x04;
    pub(crate) const SETUP_COMMUNICATION: u8 = 0xF0;
}

pub(crate) mod item {
    pub(crate) const VARIABLE_SPECIFICATION: u8 = 0x12;
    pub(crate) const ANY_LENGTH: u8 = 0x0A;
    pub(crate) const SYNTAX_ID_S7ANY: u8 = 0x10;
    pub(crate) const REQUEST_ITEM_LENGTH: usize = 12;
}

pub(crate) mod area {
    pub(crate) const INPUTS: u8 = 0x81;
    pub(crate) const OUTPUTS: u8 = 0x82;
    pub(crate) const MEMORY: u8 = 0x83;
    pub(crate) const DATA_BLOCKS: u8 = 0x84;
}

pub(crate) mod transport_size {
    pub(crate) mod request {
        pub(crate) const BIT: u8 = 0x01;
        pub(crate) const BYTE: u8 = 0x02;
        pub(crate) const WORD: u8 = 0x04;
        pub(crate) const INT: u8 = 0x05;
        pub(crate) const DWORD: u8 = 0x06;
        pub(crate) const DINT: u8 = 0x07;
        pub(crate) const REAL: u8 = 0x08;
    }

    pub(crate) mod response {
        /// length field counts bits
        pub(crate) const BIT: u8 = 0x03;
        /// length field counts bits
        pub(crate) const BYTE: u8 = 0x04;
        /// length field counts bits
        pub(crate) const INTEGER: u8 = 0x05;
        /// length field counts bytes
        pub(crate) const REAL: u8 = 0x07;
        /// length field counts bytes
        pub(crate) const OCTET_STRING: u8 = 0x09;
    }
}

pub(crate) mod return_code {
    pub(crate) const HARDWARE_FAULT: u8 = 0x01;
    pub(crate) const ACCESS_DENIED: u8 = 0x03;
    pub(crate) const ADDRESS_OUT_OF_RANGE: u8 = 0x05;
    pub(crate) const DATA_TYPE_NOT_SUPPORTED: u8 = 0x06;
    pub(crate) const DATA_TYPE_INCONSISTENT: u8 = 0x07;
    pub(crate) const OBJECT_DOES_NOT_EXIST: u8 = 0x0A;
    pub(crate) const SUCCESS: u8 = 0xFF;
}

pub(crate) mod limits {
    /// rack is packed into 3 bits of the remote TSAP
    pub(crate) const MAX_RACK: u32 = 7;
    /// slot is packed into 5 bits of the remote TSAP
    pub(crate) const MAX_SLOT: u32 = 31;
    /// item addresses are `byte * 8 + bit` in a 24-bit field
    pub(crate) const MAX_BYTE_OFFSET: u32 = 0x001F_FFFF;
    pub(crate) const MAX_BIT: u8 = 7;
    /// receive buffer size; the largest TPKT frame the client accepts
    pub(crate) const MAX_FRAME_LENGTH: usize = 4096;
}
