use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use s7::client::*;
use s7::*;

/// a job received by the simulated PLC
#[derive(Copy, Clone, Debug)]
struct Job {
    pdu_ref: [u8; 2],
    area: u8,
    offset: u32,
}

/// PLC end of an in-memory transport, speaking raw TPKT/COTP/S7 bytes
struct Plc {
    io: DuplexStream,
}

impl Plc {
    async fn read_frame(&mut self) -> Vec<u8> {
        let mut header = [0u8; 4];
        self.io.read_exact(&mut header).await.unwrap();
        assert_eq!(header[0], 0x03);
        let length = u16::from_be_bytes([header[2], header[3]]) as usize;
        let mut body = vec![0u8; length - 4];
        self.io.read_exact(&mut body).await.unwrap();
        body
    }

    async fn write_data(&mut self, pdu: &[u8]) {
        let length = (pdu.len() + 7) as u16;
        let mut frame = vec![0x03, 0x00];
        frame.extend_from_slice(&length.to_be_bytes());
        frame.extend_from_slice(&[0x02, 0xF0, 0x80]);
        frame.extend_from_slice(pdu);
        self.io.write_all(&frame).await.unwrap();
    }

    async fn ack_data(&mut self, pdu_ref: [u8; 2], params: &[u8], data: &[u8]) {
        let mut pdu = vec![0x32, 0x03, 0x00, 0x00, pdu_ref[0], pdu_ref[1]];
        pdu.extend_from_slice(&(params.len() as u16).to_be_bytes());
        pdu.extend_from_slice(&(data.len() as u16).to_be_bytes());
        pdu.extend_from_slice(&[0x00, 0x00]);
        pdu.extend_from_slice(params);
        pdu.extend_from_slice(data);
        self.write_data(&pdu).await;
    }

    /// answer the connection request and the setup communication
    async fn accept(&mut self, max_amq: u16) {
        let request = self.read_frame().await;
        // LI, CR code
        assert_eq!(request[1], 0xE0);
        self.io
            .write_all(&[
                0x03, 0x00, 0x00, 0x0B, 0x06, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00,
            ])
            .await
            .unwrap();

        let setup = self.read_frame().await;
        let s7 = &setup[3..];
        assert_eq!(s7[0], 0x32);
        assert_eq!(s7[10], 0xF0);
        let amq = max_amq.to_be_bytes();
        self.ack_data(
            [s7[4], s7[5]],
            &[0xF0, 0x00, amq[0], amq[1], amq[0], amq[1], 0x01, 0xE0],
            &[],
        )
        .await;
    }

    async fn next_job(&mut self) -> Job {
        let frame = self.read_frame().await;
        let s7 = &frame[3..];
        assert_eq!(s7[1], 0x01);
        assert_eq!(s7[10], 0x04);
        assert_eq!(s7[11], 0x01);
        let item = &s7[12..24];
        let address = u32::from_be_bytes([0, item[9], item[10], item[11]]);
        Job {
            pdu_ref: [s7[4], s7[5]],
            area: item[8],
            offset: address >> 3,
        }
    }

    async fn reply(&mut self, job: Job, item: &[u8]) {
        self.ack_data(job.pdu_ref, &[0x04, 0x01], item).await;
    }

    async fn reply_byte(&mut self, job: Job, value: u8) {
        self.reply(job, &[0xFF, 0x04, 0x00, 0x08, value]).await;
    }

    async fn reply_int(&mut self, job: Job, value: i16) {
        let bytes = value.to_be_bytes();
        self.reply(job, &[0xFF, 0x05, 0x00, 0x10, bytes[0], bytes[1]])
            .await;
    }

    async fn reply_error(&mut self, job: Job, code: u8) {
        self.reply(job, &[code, 0x00, 0x00, 0x00]).await;
    }
}

/// hands out pre-created transports, one per connection attempt
#[derive(Clone, Default)]
struct Transports {
    streams: Arc<Mutex<Vec<DuplexStream>>>,
    attempts: Arc<AtomicUsize>,
}

impl Transports {
    fn add(&self) -> Plc {
        self.add_with_capacity(4096)
    }

    /// a transport that buffers at most `capacity` bytes in each direction
    fn add_with_capacity(&self, capacity: usize) -> Plc {
        let (client, server) = tokio::io::duplex(capacity);
        self.streams.lock().unwrap().push(client);
        Plc { io: server }
    }

    fn connector(&self) -> impl Connector {
        let transports = self.clone();
        move |_: &ConnectionDescriptor, _: u16| {
            transports.attempts.fetch_add(1, Ordering::SeqCst);
            let stream = transports.streams.lock().unwrap().pop();
            MaybeAsync::ready(
                stream
                    .map(PhysLayer::new_stream)
                    .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::ConnectionRefused)),
            )
        }
    }
}

fn connection(transports: &Transports, config: ConnectionConfig) -> Connection {
    Connection::with_connector(
        ConnectionDescriptor::parse("s7://plc.local/0/2").unwrap(),
        config,
        transports.connector(),
    )
}

/// connect over a transport with room for only one read job and start four reads
///
/// The simulated PLC stops reading after the setup, so the second job cannot be
/// written completely.
async fn stalled(response_timeout: Duration) -> (Connection, Plc, Vec<PendingRead>) {
    let transports = Transports::default();
    let mut plc = transports.add_with_capacity(40);
    let connection = connection(
        &transports,
        ConnectionConfig::default().with_response_timeout(response_timeout),
    );
    let (result, _) = tokio::join!(connection.connect(), plc.accept(4));
    result.unwrap();

    let reads = (0..4)
        .map(|offset| {
            let address = connection
                .parse_address(&format!("INPUTS/{offset}"))
                .unwrap();
            connection
                .read(ReadRequest::new().add::<u8>(address))
                .unwrap()
        })
        .collect();

    (connection, plc, reads)
}

async fn connected(max_amq: u16) -> (Connection, Plc) {
    let transports = Transports::default();
    let mut plc = transports.add();
    let connection = connection(&transports, ConnectionConfig::default());
    let (result, _) = tokio::join!(connection.connect(), plc.accept(max_amq));
    result.unwrap();
    (connection, plc)
}

#[tokio::test]
async fn connects_and_reads_values() {
    let (connection, mut plc) = connected(4).await;
    assert_eq!(connection.state(), ConnectionState::Connected);
    assert_eq!(connection.host(), "plc.local");
    assert_eq!(connection.slot(), 2);

    let input = connection.parse_address("INPUTS/3").unwrap();
    let counter = connection.parse_address("DATA_BLOCKS/1/4").unwrap();
    let read = connection
        .read(ReadRequest::new().add::<u8>(input).add::<i16>(counter))
        .unwrap();

    let first = plc.next_job().await;
    let second = plc.next_job().await;
    assert_eq!((first.area, first.offset), (0x81, 3));
    assert_eq!((second.area, second.offset), (0x84, 4));
    plc.reply_int(second, -2).await;
    plc.reply_byte(first, 0x5A).await;

    let response = read.response().await.unwrap();
    assert_eq!(response.len(), 2);
    assert_eq!(response.get::<u8>(&input), Ok(0x5A));
    assert_eq!(response.get::<i16>(&counter), Ok(-2));
    assert_eq!(
        response.get::<u16>(&counter),
        Err(ValueError::TypeMismatch {
            requested: DataType::Word,
            actual: DataType::Int
        })
    );
}

#[tokio::test]
async fn rejects_invalid_requests_synchronously() {
    let (connection, _plc) = connected(1).await;
    let address = connection.parse_address("MEMORY/0").unwrap();

    assert_eq!(
        connection.read(ReadRequest::new()).unwrap_err(),
        ReadError::EmptyRequest
    );
    assert!(matches!(
        connection.read(ReadRequest::new().add::<u8>(address).add::<u16>(address)),
        Err(ReadError::DuplicateAddress(_))
    ));
}

#[tokio::test]
async fn reports_item_failures_alongside_values() {
    let (connection, mut plc) = connected(2).await;
    let good = connection.parse_address("OUTPUTS/0").unwrap();
    let bad = connection.parse_address("OUTPUTS/9999").unwrap();
    let read = connection
        .read(ReadRequest::new().add::<u8>(good).add::<u8>(bad))
        .unwrap();

    let first = plc.next_job().await;
    let second = plc.next_job().await;
    plc.reply_byte(first, 1).await;
    plc.reply_error(second, 0x05).await;

    let response = read.response().await.unwrap();
    assert_eq!(response.value(&good), Ok(Value::Byte(1)));
    assert_eq!(
        response.result(&bad),
        Some(Err(ItemError::Access(ReturnCode::AddressOutOfRange)))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_wait_and_callbacks_observe_the_same_outcome() {
    let (connection, mut plc) = connected(1).await;
    let address = connection.parse_address("INPUTS/0").unwrap();
    let read = connection
        .read(ReadRequest::new().add::<u8>(address))
        .unwrap();

    let (callback_tx, callback_rx) = tokio::sync::oneshot::channel();
    read.on_complete(move |result| {
        let _ = callback_tx.send(result);
    });

    let blocking = {
        let read = read.clone();
        tokio::task::spawn_blocking(move || read.wait())
    };

    let job = plc.next_job().await;
    plc.reply_byte(job, 0x42).await;

    let expected = read.response().await;
    assert_eq!(
        expected.as_ref().unwrap().get::<u8>(&address),
        Ok(0x42)
    );
    assert_eq!(blocking.await.unwrap(), expected);
    assert_eq!(callback_rx.await.unwrap(), expected);
    assert!(read.is_done());
}

#[tokio::test(start_paused = true)]
async fn read_times_out_when_the_plc_is_silent() {
    let (connection, mut plc) = connected(1).await;
    let address = connection.parse_address("INPUTS/0").unwrap();
    let read = connection
        .read_with_timeout(
            ReadRequest::new().add::<u8>(address),
            Duration::from_millis(100),
        )
        .unwrap();

    let job = plc.next_job().await;
    assert_eq!(read.response().await, Err(RequestError::Timeout));

    // the late answer is discarded and the session keeps working
    plc.reply_byte(job, 0).await;
    let read = connection
        .read(ReadRequest::new().add::<u8>(address))
        .unwrap();
    let job = plc.next_job().await;
    plc.reply_byte(job, 7).await;
    assert_eq!(
        read.response().await.unwrap().get::<u8>(&address),
        Ok(7)
    );
}

#[tokio::test]
async fn disconnect_cancels_outstanding_reads() {
    let (connection, mut plc) = connected(1).await;
    let reads: Vec<PendingRead> = (0..3)
        .map(|offset| {
            let address = connection
                .parse_address(&format!("INPUTS/{offset}"))
                .unwrap();
            connection
                .read(ReadRequest::new().add::<u8>(address))
                .unwrap()
        })
        .collect();

    // one frame in flight, the rest queued
    let _ = plc.next_job().await;
    connection.disconnect().await;
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    for read in &reads {
        assert_eq!(read.try_get(), Some(Err(RequestError::Cancelled)));
    }

    let address = connection.parse_address("INPUTS/0").unwrap();
    assert_eq!(
        connection
            .read(ReadRequest::new().add::<u8>(address))
            .unwrap_err(),
        ReadError::NotConnected
    );
}

#[tokio::test(start_paused = true)]
async fn reads_time_out_when_the_plc_stops_reading() {
    let (connection, _plc, reads) = stalled(Duration::from_millis(200)).await;

    for read in &reads {
        assert_eq!(read.response().await, Err(RequestError::Timeout));
    }

    // the partially written job leaves the session unusable
    for _ in 0..100 {
        if connection.state() == ConnectionState::Disconnected {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn disconnect_completes_when_the_plc_stops_reading() {
    let (connection, _plc, reads) = stalled(Duration::from_secs(60)).await;

    // let the session fill the transport
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(reads.iter().all(|read| !read.is_done()));

    tokio::time::timeout(Duration::from_secs(2), connection.disconnect())
        .await
        .expect("disconnect did not complete");
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    for read in &reads {
        assert_eq!(read.try_get(), Some(Err(RequestError::Cancelled)));
    }
}

#[tokio::test]
async fn connect_is_rejected_while_in_progress() {
    let transports = Transports::default();
    let mut plc = transports.add();
    let connection = connection(&transports, ConnectionConfig::default());

    let first = connection.connect();
    tokio::pin!(first);
    // drive the first attempt until it waits for the connection confirm
    assert!(poll_once(first.as_mut()).await.is_none());
    assert_eq!(connection.state(), ConnectionState::Connecting);
    assert_eq!(
        connection.connect().await,
        Err(ConnectError::ConnectionInProgress)
    );

    let (result, _) = tokio::join!(first, plc.accept(1));
    assert_eq!(result, Ok(()));
    assert_eq!(connection.connect().await, Ok(()));
    assert_eq!(transports.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disconnect_aborts_connect_in_progress() {
    let transports = Transports::default();
    let mut plc = transports.add();
    let connection = connection(&transports, ConnectionConfig::default());

    let attempt = connection.connect();
    tokio::pin!(attempt);
    assert!(poll_once(attempt.as_mut()).await.is_none());

    connection.disconnect().await;
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    // the handshake completes but the session is discarded
    let (result, _) = tokio::join!(attempt, plc.accept(1));
    assert_eq!(result, Err(ConnectError::Aborted));
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn failed_connect_is_sticky_until_disconnect() {
    let transports = Transports::default();
    let connection = connection(&transports, ConnectionConfig::default());

    assert_eq!(
        connection.connect().await,
        Err(ConnectError::Connection(ConnectionErrorCause::Io(
            std::io::ErrorKind::ConnectionRefused
        )))
    );
    assert_eq!(connection.state(), ConnectionState::Failed);
    assert_eq!(connection.connect().await, Err(ConnectError::Failed));

    connection.disconnect().await;
    let mut plc = transports.add();
    let (result, _) = tokio::join!(connection.connect(), plc.accept(1));
    assert_eq!(result, Ok(()));
    assert_eq!(transports.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_setup_fails_the_connection() {
    let transports = Transports::default();
    let mut plc = transports.add();
    let connection = connection(&transports, ConnectionConfig::default());

    let reject = async {
        let _ = plc.read_frame().await;
        // answer the connection request with a DT instead of a CC
        plc.write_data(&[0x32, 0x03, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
            .await;
    };
    let (result, _) = tokio::join!(connection.connect(), reject);
    assert_eq!(
        result,
        Err(ConnectError::Connection(ConnectionErrorCause::Rejected(
            RejectReason::NoConnectionConfirm(0xF0)
        )))
    );
    assert_eq!(connection.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn transport_loss_returns_to_disconnected() {
    let (connection, plc) = connected(1).await;
    let address = connection.parse_address("INPUTS/0").unwrap();
    let read = connection
        .read(ReadRequest::new().add::<u8>(address))
        .unwrap();

    drop(plc);
    assert!(matches!(read.response().await, Err(RequestError::Io(_))));

    // the session task records the loss after failing the reads
    for _ in 0..100 {
        if connection.state() == ConnectionState::Disconnected {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn cancel_completes_read_without_running_callbacks() {
    let (connection, mut plc) = connected(1).await;
    let address = connection.parse_address("INPUTS/0").unwrap();
    let read = connection
        .read(ReadRequest::new().add::<u8>(address))
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = calls.clone();
        read.on_complete(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
    }

    let job = plc.next_job().await;
    assert!(read.cancel());
    assert!(!read.cancel());
    assert_eq!(read.response().await, Err(RequestError::Cancelled));

    // the answer for the cancelled read is ignored and the session keeps working
    plc.reply_byte(job, 1).await;
    let read = connection
        .read(ReadRequest::new().add::<u8>(address))
        .unwrap();
    let job = plc.next_job().await;
    plc.reply_byte(job, 2).await;
    assert_eq!(read.response().await.unwrap().get::<u8>(&address), Ok(2));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dropping_the_connection_cancels_reads() {
    let (connection, _plc) = connected(1).await;
    let address = connection.parse_address("INPUTS/0").unwrap();
    let read = connection
        .read(ReadRequest::new().add::<u8>(address))
        .unwrap();

    drop(connection);
    assert_eq!(read.response().await, Err(RequestError::Cancelled));
}

/// poll a future exactly once, returning its output if it completed
async fn poll_once<F: Future>(mut future: Pin<&mut F>) -> Option<F::Output> {
    std::future::poll_fn(|cx| match future.as_mut().poll(cx) {
        Poll::Ready(x) => Poll::Ready(Some(x)),
        Poll::Pending => Poll::Ready(None),
    })
    .await
}
