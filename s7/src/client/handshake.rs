use crate::client::config::ConnectionConfig;
use crate::common::frame::{FrameWriter, FramedReader};
use crate::common::phys::PhysLayer;
use crate::common::traits::LoggableDisplay;
use crate::constants::cotp;
use crate::error::{ConnectionErrorCause, FrameError, RejectReason};
use crate::protocol::header::PduRef;
use crate::protocol::setup::{Negotiated, SetupCommunication};
use crate::protocol::{Job, Response};
use crate::url::ConnectionDescriptor;

/// transport and framing state handed to the session task after setup
pub(crate) struct Established {
    pub(crate) io: PhysLayer,
    pub(crate) reader: FramedReader,
    pub(crate) negotiated: Negotiated,
    pub(crate) pdu_ref: PduRef,
}

/// COTP connection request/confirm followed by S7 setup communication
pub(crate) async fn establish(
    mut io: PhysLayer,
    descriptor: &ConnectionDescriptor,
    config: &ConnectionConfig,
) -> Result<Established, ConnectionErrorCause> {
    let decode = config.decode;
    let mut reader = FramedReader::new();
    let mut writer = FrameWriter::new();

    let bytes = writer.format_connection_request(
        cotp::LOCAL_TSAP,
        descriptor.remote_tsap(),
        decode.frame,
    )?;
    io.write(bytes, decode.physical).await?;

    let frame = reader.next_frame(&mut io, decode).await?;
    if frame.code != cotp::CONNECTION_CONFIRM {
        return Err(RejectReason::NoConnectionConfirm(frame.code).into());
    }

    let mut pdu_ref = PduRef::default();
    let setup = SetupCommunication::new(config.max_amq, config.pdu_length);
    let job = Job::new(pdu_ref.next(), &setup);
    if decode.app.enabled() {
        tracing::info!("S7 TX - {}", LoggableDisplay::new(&job, decode.app));
    }
    let bytes = writer.format_data(&job, decode.frame)?;
    io.write(bytes, decode.physical).await?;

    let frame = reader.next_frame(&mut io, decode).await?;
    if frame.code != cotp::DATA {
        return Err(FrameError::UnexpectedTpdu(frame.code).into());
    }
    let response = Response::parse(&frame.payload)?;
    if decode.app.enabled() {
        tracing::info!("S7 RX - {}", response);
    }

    let negotiated = setup.parse_response(&response)?;
    tracing::info!(
        "session established (PDU length: {}, max parallel jobs: {})",
        negotiated.pdu_length,
        negotiated.max_amq
    );

    Ok(Established {
        io,
        reader,
        negotiated,
        pdu_ref,
    })
}
