//! Request pacing and rate-limit cooldown for one upstream.

use std::time::Duration;

use tokio::{sync::Mutex, time::Instant};

/// Serialises requests to one upstream: consecutive requests are at least
/// `interval` apart, and after a rate-limit signal nothing is sent until the
/// cooldown window has passed.
#[derive(Debug)]
pub struct Pacer {
  next_slot: Mutex<Instant>,
  interval:  Duration,
  cooldown:  Duration,
}

impl Pacer {
  pub fn new(interval: Duration, cooldown: Duration) -> Self {
    Self { next_slot: Mutex::new(Instant::now()), interval, cooldown }
  }

  pub fn cooldown(&self) -> Duration { self.cooldown }

  /// Wait for the next free slot and claim it.
  ///
  /// The lock is not held while sleeping, so a [`back_off`](Self::back_off)
  /// issued meanwhile is seen when the caller wakes.
  pub async fn acquire(&self) {
    loop {
      let wake = {
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        if *next <= now {
          *next = now + self.interval;
          return;
        }
        *next
      };
      tokio::time::sleep_until(wake).await;
    }
  }

  /// Push the next free slot out by the fixed cooldown window.
  pub async fn back_off(&self) {
    let mut next = self.next_slot.lock().await;
    let until = Instant::now() + self.cooldown;
    if until > *next {
      *next = until;
    }
  }
}
