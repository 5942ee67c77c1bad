//! Long-running mode: one [`Message`] per input line, one reply per message.
//!
//! Replies are `Ok`, `Err: <reason>` or `Stop`. Reaching the end of input is
//! treated like `Stop`.

use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::device::DeviceResolver;
use crate::ipc::Message;
use crate::shell::Shell;
use crate::{BandwidthLimiter, Result};

pub struct Session<S, R> {
    limiter: BandwidthLimiter<S, R>,
    cleanup: bool,
    installed: BTreeSet<IpAddr>,
}

impl<S: Shell, R: DeviceResolver> Session<S, R> {
    /// With `cleanup`, limits set during the session are removed when it ends.
    pub fn new(limiter: BandwidthLimiter<S, R>, cleanup: bool) -> Self {
        Self {
            limiter,
            cleanup,
            installed: BTreeSet::new(),
        }
    }

    /// Returns true once the session should stop.
    pub fn handle(&mut self, msg: Message) -> Result<bool> {
        match msg {
            Message::Set {
                address,
                rate,
                burst,
            } => {
                self.limiter.set_limit(address, &rate, &burst)?;
                self.installed.insert(address);
                Ok(false)
            }
            Message::Delete(address) => {
                self.limiter.delete_limit(address)?;
                self.installed.remove(&address);
                Ok(false)
            }
            Message::Stop => {
                self.finish();
                Ok(true)
            }
        }
    }

    pub fn finish(&mut self) {
        if !self.cleanup {
            return;
        }
        log::info!("Cleaning up {} limits", self.installed.len());
        for address in std::mem::take(&mut self.installed) {
            if let Err(e) = self.limiter.delete_limit(address) {
                log::error!("failed to remove limit for {address}: {e}");
            }
        }
    }
}

pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn serve<S: Shell, R: DeviceResolver>(
    session: &Mutex<Session<S, R>>,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        log::trace!("received message: {}", line.trim());

        let handled = Message::try_from(line)
            .and_then(|msg| lock(session).handle(msg).map_err(|e| e.to_string()));

        match handled {
            Ok(true) => {
                writeln!(output, "Stop")?;
                output.flush()?;
                return Ok(());
            }
            Ok(false) => writeln!(output, "Ok")?,
            Err(e) => {
                log::warn!("{e}");
                writeln!(output, "Err: {e}")?;
            }
        }
        output.flush()?;
    }

    lock(session).finish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Fixed;
    use crate::fake::FakeTc;
    use crate::filter::FilterStore;
    use crate::{AddressFamily, Config};
    use std::io::Cursor;

    fn run(fake: &FakeTc, cleanup: bool, input: &str) -> String {
        let limiter = BandwidthLimiter::new(fake, Fixed("eth0".into()), &Config::default());
        let session = Mutex::new(Session::new(limiter, cleanup));
        let mut out = Vec::new();
        serve(&session, Cursor::new(input.to_string()), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn count(fake: &FakeTc) -> usize {
        let limiter = BandwidthLimiter::new(fake, Fixed("eth0".into()), &Config::default());
        FilterStore::new(limiter.tc())
            .list("eth0", AddressFamily::Ipv4)
            .unwrap()
            .len()
    }

    #[test]
    fn replies_per_message() {
        let fake = FakeTc::new();
        let out = run(
            &fake,
            false,
            "Set: 10.0.0.1 1mbit 32kbit\n\nBogus\nSet: 10.0.0.2 1mbit;x 32kbit\nDelete: 10.0.0.3\nStop\nSet: 10.0.0.4 1mbit 32kbit\n",
        );
        let replies: Vec<_> = out.lines().collect();
        assert_eq!(replies.len(), 5);
        assert_eq!(replies[0], "Ok");
        assert!(replies[1].starts_with("Err: failed to parse message"));
        assert!(replies[2].starts_with("Err: invalid argument"));
        assert_eq!(replies[3], "Ok");
        assert_eq!(replies[4], "Stop");
        assert_eq!(count(&fake), 1);
    }

    #[test]
    fn cleanup_removes_session_limits() {
        let fake = FakeTc::new();
        fake.install("eth0", "10.9.9.9".parse().unwrap(), "1mbit", "32kbit");
        run(
            &fake,
            true,
            "Set: 10.0.0.1 1mbit 32kbit\nSet: 10.0.0.2 1mbit 32kbit\nDelete: 10.0.0.2\n",
        );
        assert_eq!(count(&fake), 1);
    }
}
