//! Cancellation and bounded teardown for session workers.
//!
//! After [`SessionSupervisor::request_cancel`], the supervisor re-issues the
//! cancellation signal every poll interval while any worker is alive. Once the
//! termination deadline has elapsed since the first request, every remaining
//! device is disposed out from under its worker. Forced disposal therefore
//! happens no earlier than the deadline and no later than one poll interval
//! after it.

use std::time::{Duration, Instant};

use fprint_protocol::{SessionEvent, SessionReport, TerminationKind};
use fprint_runtime::{Device, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::events::EventSink;
use crate::worker::{SessionWorker, WorkerHandle};

pub struct SessionSupervisor {
	config: SessionConfig,
	events: EventSink,
	workers: Vec<WorkerHandle>,
	reports: Vec<SessionReport>,
	cancel_requested_at: Option<Instant>,
}

impl SessionSupervisor {
	pub fn new(config: SessionConfig, events: EventSink) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			config,
			events,
			workers: Vec::new(),
			reports: Vec::new(),
			cancel_requested_at: None,
		})
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Starts one worker for `device`.
	///
	/// A worker started after a cancel request is signalled immediately.
	pub fn start(&mut self, device: Device) -> Result<()> {
		let name = device.name().to_string();
		let mut handle = SessionWorker::new(device, self.config.clone(), self.events.clone()).spawn()?;
		debug!(target = "fprint.supervisor", device = %name, "worker started");
		if self.cancel_requested_at.is_some() {
			handle.signal_cancel();
		}
		self.workers.push(handle);
		Ok(())
	}

	/// Workers whose thread is still running.
	pub fn active(&self) -> usize {
		self.workers.iter().filter(|worker| !worker.is_finished()).count()
	}

	pub fn is_cancel_requested(&self) -> bool {
		self.cancel_requested_at.is_some()
	}

	/// One-shot trigger: records the request time and signals every worker.
	///
	/// Repeated calls re-signal but keep the original request time, so the
	/// deadline is never extended.
	///
	/// This only signals. Re-signalling every poll interval and forced disposal
	/// at the deadline run inside [`cancel_and_wait`](Self::cancel_and_wait);
	/// without it, a worker ignoring the signal keeps its device until the
	/// supervisor is dropped.
	pub fn request_cancel(&mut self) {
		if self.cancel_requested_at.is_none() {
			info!(target = "fprint.supervisor", workers = self.workers.len(), "cancellation requested");
			self.cancel_requested_at = Some(Instant::now());
		}
		for worker in &mut self.workers {
			worker.signal_cancel();
		}
	}

	/// Resolves once every worker has ended on its own. Does not cancel anything.
	pub async fn wait_idle(&self) {
		let finished: Vec<CancellationToken> = self.workers.iter().map(WorkerHandle::finished).collect();
		all_finished(finished).await;
	}

	/// Cancels every session and waits for all of them to terminate, forcing
	/// disposal once the deadline passes. Returns one report per worker, in the
	/// order the workers ended.
	pub async fn cancel_and_wait(&mut self) -> Vec<SessionReport> {
		self.request_cancel();
		let requested_at = self.cancel_requested_at.unwrap_or_else(Instant::now);
		let deadline = self.config.termination_deadline;

		loop {
			self.reap_finished();
			if self.workers.is_empty() {
				break;
			}

			let elapsed = requested_at.elapsed();
			if elapsed >= deadline {
				self.force_remaining(elapsed);
				break;
			}

			let remaining = deadline - elapsed;
			for worker in &mut self.workers {
				worker.signal_cancel();
				self.events.emit(SessionEvent::WaitingForTermination {
					device: worker.device().to_string(),
					remaining_ms: millis(remaining),
				});
			}
			debug!(target = "fprint.supervisor", remaining_ms = millis(remaining), alive = self.workers.len(), "waiting for workers");

			let finished: Vec<CancellationToken> = self.workers.iter().map(WorkerHandle::finished).collect();
			tokio::select! {
				_ = tokio::time::sleep(self.config.poll_interval.min(remaining)) => {}
				_ = all_finished(finished) => {}
			}
		}

		std::mem::take(&mut self.reports)
	}

	fn reap_finished(&mut self) {
		let mut index = 0;
		while index < self.workers.len() {
			if !self.workers[index].is_finished() {
				index += 1;
				continue;
			}
			let mut worker = self.workers.swap_remove(index);
			let termination = worker.join().map_or(TerminationKind::Failed, |exit| exit.termination());
			self.record(&worker, termination);
		}
	}

	fn force_remaining(&mut self, elapsed: Duration) {
		for mut worker in std::mem::take(&mut self.workers) {
			if !worker.force_dispose() {
				// Ended on its own between the last poll and now.
				let termination = worker.join().map_or(TerminationKind::Failed, |exit| exit.termination());
				self.record(&worker, termination);
				continue;
			}

			warn!(
				target = "fprint.supervisor",
				device = %worker.device(),
				elapsed_ms = millis(elapsed),
				"termination deadline reached; device disposed forcefully"
			);
			self.events.emit(SessionEvent::ForcedTermination {
				device: worker.device().to_string(),
				elapsed_ms: millis(elapsed),
			});
			self.events.emit(SessionEvent::SessionEnded {
				device: worker.device().to_string(),
				termination: TerminationKind::ForcedTimeout,
			});
			worker.detach();
			self.record(&worker, TerminationKind::ForcedTimeout);
		}
	}

	fn record(&mut self, worker: &WorkerHandle, termination: TerminationKind) {
		let report = SessionReport {
			device: worker.device().to_string(),
			termination,
			gallery_size: worker.gallery_size(),
			shutdown_ms: worker.cancel_requested_at().map(|at| millis(at.elapsed())),
		};
		debug!(target = "fprint.supervisor", ?report, "session report");
		self.reports.push(report);
	}
}

impl Drop for SessionSupervisor {
	fn drop(&mut self) {
		for worker in &mut self.workers {
			if worker.is_finished() {
				continue;
			}
			worker.signal_cancel();
			if worker.force_dispose() {
				warn!(target = "fprint.supervisor", device = %worker.device(), "supervisor dropped with a live session; device disposed");
			}
		}
	}
}

async fn all_finished(tokens: Vec<CancellationToken>) {
	for token in tokens {
		token.cancelled().await;
	}
}

fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
