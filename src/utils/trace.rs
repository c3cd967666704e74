
//! Optional per-tick trace: lock-free queue on the loop side, CSV file on a
//! background exporter thread.
//!
//! `record()` never blocks the tick; events are dropped when the queue is full.

use crossbeam_queue::ArrayQueue;
use csv::Writer;
use log::{error, info};
use serde::Serialize;
use std::{
    fs::File,
    io::BufWriter,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

const TRACE_CAPACITY: usize = 4_096;
const EXPORTER_POLL_MS: u64 = 10;
const FLUSH_EVERY: usize = 64;

/// One row per control-loop tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickEvent {
    pub tick: u64,
    pub ts_us: u64,
    pub x: f64,
    pub y: f64,
    pub left: u16,
    pub right: u16,
    pub head_h: u16,
    pub head_v: u16,
    pub waist: u16,
    pub failures: u64,
    pub exec_us: u64,
}

#[derive(Clone)]
pub struct TickRecorder {
    queue: Arc<ArrayQueue<TickEvent>>,
    dropped: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    run_start: Instant,
}

impl Default for TickRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TickRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(TRACE_CAPACITY)),
            dropped: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(true)),
            run_start: Instant::now(),
        }
    }

    /// Microseconds since the recorder was created.
    #[inline]
    pub fn now_us(&self) -> u64 {
        self.run_start.elapsed().as_micros() as u64
    }

    #[inline]
    pub fn record(&self, event: TickEvent) {
        if self.queue.push(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Spawns the exporter. It drains until [`TickRecorder::stop`] is called
    /// and the queue is empty.
    pub fn start_exporter(&self, output_csv: PathBuf) -> thread::JoinHandle<()> {
        let queue = self.queue.clone();
        let running = self.running.clone();

        thread::spawn(move || {
            let file = match File::create(&output_csv) {
                Ok(f) => f,
                Err(e) => {
                    error!("failed to create tick trace {:?}: {}", output_csv, e);
                    return;
                }
            };
            let mut wtr = Writer::from_writer(BufWriter::new(file));
            let mut since_flush = 0usize;
            info!("tick trace -> {:?}", output_csv);

            loop {
                match queue.pop() {
                    Some(event) => {
                        if let Err(e) = wtr.serialize(event) {
                            error!("tick trace write failed: {}", e);
                            break;
                        }
                        since_flush += 1;
                        if since_flush >= FLUSH_EVERY {
                            if let Err(e) = wtr.flush() {
                                error!("tick trace flush failed: {}", e);
                            }
                            since_flush = 0;
                        }
                    }
                    None => {
                        if !running.load(Ordering::Acquire) {
                            break;
                        }
                        thread::sleep(Duration::from_millis(EXPORTER_POLL_MS));
                    }
                }
            }

            if let Err(e) = wtr.flush() {
                error!("tick trace flush failed: {}", e);
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}
