use std::collections::{HashMap, VecDeque};

use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};

use crate::channel::{Receiver, Shutdown};
use crate::client::message::Request;
use crate::client::pending::Promise;
use crate::client::request::ReadResponse;
use crate::common::frame::{Frame, FrameWriter, FramedReader, LinkError};
use crate::common::phys::PhysLayer;
use crate::common::traits::LoggableDisplay;
use crate::constants::{cotp, rosctr};
use crate::decode::DecodeLevel;
use crate::error::{DecodeError, FrameError, ItemError, RequestError};
use crate::protocol::header::PduRef;
use crate::protocol::read_var::{ItemResult, ReadItem, ReadVar};
use crate::protocol::{Job, Response};

/// deadline used when a timeout is too large to represent
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/**
* We execute requests in a session until one of the following occurs
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// the connection closed the session or was dropped
    Closed,
    /// the stream errored or the PLC sent a frame that could not be parsed
    Link(LinkError),
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SessionEnd::Closed => f.write_str("session closed"),
            SessionEnd::Link(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct TxId(u64);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// one job frame of a transaction, identified by the item index
#[derive(Copy, Clone, Debug)]
struct FrameRef {
    tx: TxId,
    index: usize,
}

struct Transaction {
    items: Vec<ReadItem>,
    results: Vec<Option<ItemResult>>,
    remaining: usize,
    deadline: Instant,
    promise: Promise,
}

impl Transaction {
    fn record(&mut self, index: usize, result: ItemResult) {
        if let Some(slot) = self.results.get_mut(index) {
            if slot.is_none() {
                self.remaining = self.remaining.saturating_sub(1);
            }
            *slot = Some(result);
        }
    }

    fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    fn complete(self) {
        let results: Option<Vec<ItemResult>> = self.results.into_iter().collect();
        match results {
            Some(results) => {
                let items = self.items.iter().map(|x| x.address).zip(results).collect();
                self.promise.success(ReadResponse::new(items));
            }
            None => self.promise.failure(RequestError::Shutdown),
        }
    }
}

/// Owns the transport of a connected session and processes reads
///
/// Every item of a read is sent as its own read-var job with a fresh PDU
/// reference. At most `max_amq` jobs are unacknowledged at any time; the rest
/// wait in order.
pub(crate) struct SessionTask {
    io: PhysLayer,
    rx: Receiver<Request>,
    close: oneshot::Receiver<()>,
    reader: FramedReader,
    writer: FrameWriter,
    decode: DecodeLevel,
    max_amq: usize,
    pdu_ref: PduRef,
    next_tx: u64,
    transactions: HashMap<TxId, Transaction>,
    queued: VecDeque<FrameRef>,
    in_flight: HashMap<PduRef, FrameRef>,
}

impl SessionTask {
    pub(crate) fn new(
        io: PhysLayer,
        reader: FramedReader,
        rx: Receiver<Request>,
        close: oneshot::Receiver<()>,
        decode: DecodeLevel,
        max_amq: u16,
        pdu_ref: PduRef,
    ) -> Self {
        Self {
            io,
            rx,
            close,
            reader,
            writer: FrameWriter::new(),
            decode,
            max_amq: usize::from(max_amq.max(1)),
            pdu_ref,
            next_tx: 0,
            transactions: HashMap::new(),
            queued: VecDeque::new(),
            in_flight: HashMap::new(),
        }
    }

    /// run until closed or the link fails, completing every outstanding read before returning
    pub(crate) async fn run(mut self) -> SessionEnd {
        let end = self.run_until_end().await;
        match end {
            SessionEnd::Closed => {
                tracing::info!("session closed");
                self.fail_all(RequestError::Cancelled);
            }
            SessionEnd::Link(err) => {
                tracing::warn!("ending session: {}", err);
                self.fail_all(err.into());
            }
        }
        self.io.shutdown().await;
        end
    }

    async fn run_until_end(&mut self) -> SessionEnd {
        loop {
            if let Err(end) = self.transmit().await {
                return end;
            }

            let deadline = self.next_deadline();

            tokio::select! {
                biased;
                _ = &mut self.close => {
                    return SessionEnd::Closed;
                }
                frame = self.reader.next_frame(&mut self.io, self.decode) => {
                    let result = frame.and_then(|frame| self.handle_frame(frame).map_err(LinkError::from));
                    if let Err(err) = result {
                        return SessionEnd::Link(err);
                    }
                }
                request = self.rx.recv() => {
                    match request {
                        Ok(request) => self.enqueue(request),
                        Err(Shutdown) => return SessionEnd::Closed,
                    }
                }
                _ = sleep_until(deadline) => {
                    self.expire(Instant::now());
                }
            }
        }
    }

    fn enqueue(&mut self, request: Request) {
        let Request {
            request,
            timeout,
            created,
            promise,
        } = request;

        // cancelled while waiting in the request queue
        if promise.is_complete() {
            return;
        }

        let id = TxId(self.next_tx);
        self.next_tx = self.next_tx.wrapping_add(1);

        // time spent in the request queue counts against the timeout
        let deadline = created
            .checked_add(timeout)
            .unwrap_or_else(|| created + FAR_FUTURE);

        let items = request.items().to_vec();
        for index in 0..items.len() {
            self.queued.push_back(FrameRef { tx: id, index });
        }

        tracing::debug!("transaction {} queued with {} item(s)", id, items.len());

        self.transactions.insert(
            id,
            Transaction {
                results: vec![None; items.len()],
                remaining: items.len(),
                items,
                deadline,
                promise,
            },
        );
    }

    /// send queued jobs while fewer than `max_amq` are unacknowledged
    ///
    /// A write that cannot make progress still yields to the close signal and to
    /// response deadlines. A deadline during a write ends the session because the
    /// stream may hold a partial frame.
    async fn transmit(&mut self) -> Result<(), SessionEnd> {
        while self.in_flight.len() < self.max_amq {
            let Some(frame) = self.queued.pop_front() else {
                break;
            };

            let (item, cancelled) = match self.transactions.get(&frame.tx) {
                // timed out or failed
                None => continue,
                Some(tx) => (tx.items.get(frame.index).copied(), tx.promise.is_complete()),
            };

            if cancelled {
                tracing::debug!("skipping frames of cancelled transaction {}", frame.tx);
                self.transactions.remove(&frame.tx);
                continue;
            }

            let Some(item) = item else {
                continue;
            };

            let pdu_ref = self.next_pdu_ref();
            let items = [item];
            let params = ReadVar::new(&items);
            let job = Job::new(pdu_ref, &params);

            if self.decode.app.enabled() {
                tracing::info!("S7 TX - {}", LoggableDisplay::new(&job, self.decode.app));
            }

            let deadline = self.next_deadline();
            let bytes = match self.writer.format_data(&job, self.decode.frame) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::error!("unable to format read-var job: {}", err);
                    if let Some(tx) = self.transactions.remove(&frame.tx) {
                        tx.promise.failure(err.into());
                    }
                    continue;
                }
            };

            tokio::select! {
                biased;
                _ = &mut self.close => {
                    return Err(SessionEnd::Closed);
                }
                result = self.io.write(bytes, self.decode.physical) => {
                    if let Err(err) = result {
                        return Err(SessionEnd::Link(err.into()));
                    }
                }
                _ = sleep_until(deadline) => {
                    self.expire(Instant::now());
                    tracing::warn!("write of job {} stalled past a response deadline", pdu_ref);
                    return Err(SessionEnd::Link(LinkError::Io(std::io::ErrorKind::TimedOut)));
                }
            }

            self.in_flight.insert(pdu_ref, frame);
        }

        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame) -> Result<(), FrameError> {
        if frame.code != cotp::DATA {
            return Err(FrameError::UnexpectedTpdu(frame.code));
        }

        let response = Response::parse(&frame.payload)?;

        if self.decode.app.enabled() {
            tracing::info!("S7 RX - {}", response);
        }

        let pdu_ref = response.header.pdu_ref;

        if response.header.rosctr != rosctr::ACK_DATA {
            tracing::warn!(
                "dropping PDU with unexpected ROSCTR 0x{:02X} and reference {}",
                response.header.rosctr,
                pdu_ref
            );
            return Ok(());
        }

        let Some(frame_ref) = self.in_flight.remove(&pdu_ref) else {
            tracing::warn!("dropping response with unknown PDU reference: {}", pdu_ref);
            return Ok(());
        };

        let Some(tx) = self.transactions.get_mut(&frame_ref.tx) else {
            return Ok(());
        };

        if tx.promise.is_complete() {
            tracing::debug!("dropping frames of cancelled transaction {}", frame_ref.tx);
            self.transactions.remove(&frame_ref.tx);
            self.forget(frame_ref.tx);
            return Ok(());
        }

        let Some(item) = tx.items.get(frame_ref.index).copied() else {
            return Ok(());
        };

        let result = match ReadVar::new(std::slice::from_ref(&item)).parse_response(&response) {
            Ok(results) => results
                .into_iter()
                .next()
                .unwrap_or(Err(ItemError::Decode(DecodeError::UnexpectedItemCount(0)))),
            Err(err) => Err(ItemError::Decode(err)),
        };

        if self.decode.app.item_values() {
            match &result {
                Ok(value) => tracing::info!("{} : {}", item.address, value),
                Err(err) => tracing::info!("{} : {}", item.address, err),
            }
        }

        tx.record(frame_ref.index, result);

        if tx.is_finished() {
            if let Some(tx) = self.transactions.remove(&frame_ref.tx) {
                tracing::debug!("transaction {} complete", frame_ref.tx);
                tx.complete();
            }
        }

        Ok(())
    }

    fn expire(&mut self, now: Instant) {
        let expired: Vec<TxId> = self
            .transactions
            .iter()
            .filter(|(_, tx)| tx.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            if let Some(tx) = self.transactions.remove(&id) {
                tracing::warn!("transaction {} timed out", id);
                tx.promise.failure(RequestError::Timeout);
            }
        }

        // late responses to these frames are dropped as unknown references
        let transactions = &self.transactions;
        self.in_flight
            .retain(|_, x| transactions.contains_key(&x.tx));
        self.queued.retain(|x| transactions.contains_key(&x.tx));
    }

    /// release the parallel job slots and queued frames of a transaction
    fn forget(&mut self, id: TxId) {
        self.in_flight.retain(|_, x| x.tx != id);
        self.queued.retain(|x| x.tx != id);
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.transactions.values().map(|x| x.deadline).min()
    }

    fn next_pdu_ref(&mut self) -> PduRef {
        loop {
            let pdu_ref = self.pdu_ref.next();
            if !self.in_flight.contains_key(&pdu_ref) {
                return pdu_ref;
            }
        }
    }

    fn fail_all(&mut self, err: RequestError) {
        self.in_flight.clear();
        self.queued.clear();
        for (_, tx) in self.transactions.drain() {
            tx.promise.failure(err);
        }
        for request in self.rx.close_and_drain() {
            request.fail(err);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
