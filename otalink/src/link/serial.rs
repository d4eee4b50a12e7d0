//! Serial bridge link using the `serialport` crate.
//!
//! For devices reached through a UART bridge (a USB-serial adapter wired to
//! the OTA receiver, or a BLE-to-UART dongle). Writes are raw bytes;
//! status notifications come back as newline-terminated JSON records.
//!
//! `serialport` is blocking, so two worker threads own the port: a writer
//! that acknowledges each write over a oneshot channel, and a reader that
//! frames incoming records and forwards them to the current subscriber.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc as std_mpsc};
use std::thread::{self, JoinHandle};

use log::{debug, trace, warn};
use tokio::sync::{mpsc, oneshot};

use crate::error::LinkError;
use crate::link::framing::LineFramer;
use crate::link::{Link, LinkFuture, SerialLinkConfig};

type Subscriber = Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>;

struct WriteRequest {
    bytes: Vec<u8>,
    done: oneshot::Sender<Result<(), LinkError>>,
}

/// Serial-port backed [`Link`].
pub struct SerialLink {
    name: String,
    notify_buffer: usize,
    requests: Option<std_mpsc::Sender<WriteRequest>>,
    subscriber: Subscriber,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl SerialLink {
    /// Open the port and start the worker threads.
    pub fn open(config: &SerialLinkConfig) -> Result<Self, LinkError> {
        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.read_timeout)
            .open()?;
        let reader_port = port.try_clone()?;

        let (requests, request_rx) = std_mpsc::channel::<WriteRequest>();
        let subscriber: Subscriber = Arc::default();
        let shutdown = Arc::new(AtomicBool::new(false));

        let pace = config.pace;
        let writer = thread::Builder::new()
            .name("otalink-serial-writer".into())
            .spawn(move || run_writer(port, &request_rx, pace))?;

        let reader = {
            let subscriber = Arc::clone(&subscriber);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("otalink-serial-reader".into())
                .spawn(move || run_reader(reader_port, &subscriber, &shutdown))?
        };

        debug!(
            "Opened serial link {} at {} baud",
            config.port_name, config.baud_rate
        );

        Ok(Self {
            name: config.port_name.clone(),
            notify_buffer: config.notify_buffer,
            requests: Some(requests),
            subscriber,
            shutdown,
            workers: vec![writer, reader],
        })
    }
}

fn run_writer(
    mut port: Box<dyn serialport::SerialPort>,
    requests: &std_mpsc::Receiver<WriteRequest>,
    pace: Option<std::time::Duration>,
) {
    while let Ok(request) = requests.recv() {
        let result = port
            .write_all(&request.bytes)
            .and_then(|()| port.flush())
            .map_err(LinkError::from);
        if result.is_ok() {
            if let Some(pace) = pace {
                thread::sleep(pace);
            }
        }
        // The engine may have stopped waiting; nothing to do then.
        let _ = request.done.send(result);
    }
    trace!("Serial writer stopped");
}

fn run_reader(
    mut port: Box<dyn serialport::SerialPort>,
    subscriber: &Subscriber,
    shutdown: &AtomicBool,
) {
    let mut framer = LineFramer::new();
    let mut buf = [0u8; 256];

    while !shutdown.load(Ordering::Relaxed) {
        match port.read(&mut buf) {
            Ok(0) => {},
            Ok(n) => {
                trace!("Serial reader got {n} bytes");
                for record in framer.push(&buf[..n]) {
                    let guard = subscriber.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Some(tx) = guard.as_ref() {
                        if tx.try_send(record).is_err() {
                            trace!("Status channel full or closed, dropping record");
                        }
                    }
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {},
            Err(e) => {
                warn!("Serial reader stopped: {e}");
                break;
            },
        }
    }
    trace!("Serial reader stopped");
}

impl Link for SerialLink {
    fn write_value<'a>(&'a mut self, bytes: &'a [u8]) -> LinkFuture<'a, Result<(), LinkError>> {
        Box::pin(async move {
            let requests = self.requests.as_ref().ok_or(LinkError::Closed)?;
            let (done, ack) = oneshot::channel();
            requests
                .send(WriteRequest {
                    bytes: bytes.to_vec(),
                    done,
                })
                .map_err(|_| LinkError::Closed)?;
            ack.await.map_err(|_| LinkError::Closed)?
        })
    }

    fn subscribe(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, LinkError> {
        let (tx, rx) = mpsc::channel(self.notify_buffer);
        *self
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        Ok(rx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Closing the request channel ends the writer loop.
        self.requests.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
