/* src/device/command.rs */

use super::error::DeviceError;
use super::netconf::{NetReconfig, NetconfTarget};
use super::queue::{DrainSchedule, Enqueued, JobQueue};
use log::{debug, info};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DRAIN_DELAY: Duration = Duration::from_millis(10);

// Longest payload prefix echoed into the debug log.
const PREVIEW_LEN: usize = 64;

/// Device commands, keyed by the upload's base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Boot,
    Brand,
    FileNames,
    ArtnetMode,
    RgbMode,
    Crop,
    Ip,
    Mac,
    Stop,
    Reboot,
    Test,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Command::Boot,
        Command::Brand,
        Command::FileNames,
        Command::ArtnetMode,
        Command::RgbMode,
        Command::Crop,
        Command::Ip,
        Command::Mac,
        Command::Stop,
        Command::Reboot,
        Command::Test,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Command::Boot => "boot.bin",
            Command::Brand => "brand.txt",
            Command::FileNames => "filnames.txt",
            Command::ArtnetMode => "artnmod.txt",
            Command::RgbMode => "rgbwmode.txt",
            Command::Crop => "crop.txt",
            Command::Ip => "ip.txt",
            Command::Mac => "mac.txt",
            Command::Stop => "stop.txt",
            Command::Reboot => "reboot.txt",
            Command::Test => "dummy.txt",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Command::Boot => "BOOT",
            Command::Brand => "BRAND",
            Command::FileNames => "FILE NAMES",
            Command::ArtnetMode => "ARTNET MODE",
            Command::RgbMode => "RGB MODE",
            Command::Crop => "CROP",
            Command::Ip => "IP CHANGE",
            Command::Mac => "MAC",
            Command::Stop => "STOP",
            Command::Reboot => "REBOOT",
            Command::Test => "TEST",
        }
    }
}

// Exact match only. Callers lower-case the base name first.
impl TryFrom<&str> for Command {
    type Error = DeviceError;

    fn try_from(token: &str) -> Result<Self, Self::Error> {
        Command::ALL
            .into_iter()
            .find(|c| c.token() == token)
            .ok_or_else(|| DeviceError::UnrecognizedCommand(token.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// What a successfully handled command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Acknowledged(Command),
    Queued { request: NetReconfig, queued: usize },
    Discarded { request: NetReconfig, queued: usize },
    DrainScheduled(DrainSchedule),
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Acknowledged(cmd) => write!(f, "{} acknowledged", cmd),
            CommandOutcome::Queued { request, queued } => {
                write!(f, "IP/MASK {} scheduled till reboot ({} queued)", request, queued)
            }
            CommandOutcome::Discarded { request, queued } => {
                write!(f, "IP/MASK {} discarded, buffer full ({} queued)", request, queued)
            }
            CommandOutcome::DrainScheduled(DrainSchedule::Scheduled { pending }) => {
                write!(f, "reboot scheduled, {} job(s) pending", pending)
            }
            CommandOutcome::DrainScheduled(DrainSchedule::Coalesced { pending }) => {
                write!(f, "reboot already pending, {} job(s) pending", pending)
            }
        }
    }
}

/// Maps a command token to its action. The queue is owned by the caller
/// and shared with whoever else needs to observe it.
pub struct CommandProcessor {
    queue: Arc<JobQueue>,
    target: NetconfTarget,
    drain_delay: Duration,
}

impl CommandProcessor {
    pub fn new(queue: Arc<JobQueue>, target: NetconfTarget, drain_delay: Duration) -> Self {
        CommandProcessor {
            queue,
            target,
            drain_delay,
        }
    }

    /// Handles one uploaded command. `reboot.txt` needs a running Tokio runtime.
    pub fn process(&self, token: &str, payload: &[u8]) -> Result<CommandOutcome, DeviceError> {
        info!("Proceed command {}, with {} byte(s) of data", token, payload.len());
        debug!("Command {} data: {}", token, payload_preview(payload));

        let command = Command::try_from(token)?;
        info!("Command '{}' found", command.label());

        match command {
            Command::Ip => {
                let request = NetReconfig::parse(payload)?;
                info!("Scheduling IP/MASK {} till 'REBOOT' command", request);
                let job = request.into_job(self.target.clone());
                Ok(match self.queue.enqueue(job) {
                    Enqueued::Queued(queued) => CommandOutcome::Queued { request, queued },
                    Enqueued::Discarded(queued) => CommandOutcome::Discarded { request, queued },
                })
            }
            Command::Reboot => Ok(CommandOutcome::DrainScheduled(
                self.queue.schedule_drain(self.drain_delay),
            )),
            other => Ok(CommandOutcome::Acknowledged(other)),
        }
    }
}

fn payload_preview(payload: &[u8]) -> String {
    let shown = &payload[..payload.len().min(PREVIEW_LEN)];
    let mut preview = format!("{:?}", String::from_utf8_lossy(shown));
    if payload.len() > PREVIEW_LEN {
        preview.push_str(&format!(" (+{} more)", payload.len() - PREVIEW_LEN));
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::queue::{Job, DEFAULT_CAPACITY};
    use std::sync::Mutex;

    fn processor(capacity: usize) -> (CommandProcessor, Arc<JobQueue>) {
        let queue = Arc::new(JobQueue::new(capacity));
        let p = CommandProcessor::new(
            Arc::clone(&queue),
            NetconfTarget::default(),
            DEFAULT_DRAIN_DELAY,
        );
        (p, queue)
    }

    #[test]
    fn token_lookup_is_exact() {
        for cmd in Command::ALL {
            assert_eq!(Command::try_from(cmd.token()).unwrap(), cmd);
        }
        assert!(Command::try_from("IP.TXT").is_err());
        assert!(Command::try_from("ip.txt.bak").is_err());
        assert!(Command::try_from("ip").is_err());
    }

    #[test]
    fn plain_commands_only_acknowledge() {
        let (p, queue) = processor(DEFAULT_CAPACITY);
        for token in [
            "stop.txt",
            "boot.bin",
            "brand.txt",
            "filnames.txt",
            "artnmod.txt",
            "rgbwmode.txt",
            "crop.txt",
            "mac.txt",
            "dummy.txt",
        ] {
            let outcome = p.process(token, b"anything").unwrap();
            assert!(matches!(outcome, CommandOutcome::Acknowledged(_)));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn ip_command_queues_a_job() {
        let (p, queue) = processor(DEFAULT_CAPACITY);
        let outcome = p
            .process("ip.txt", b"IP: 192.168.1.5 NETMASK: 255.255.255.0")
            .unwrap();
        match outcome {
            CommandOutcome::Queued { request, queued } => {
                assert_eq!(request.to_string(), "192.168.1.5/255.255.255.0");
                assert_eq!(queued, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(queue.labels(), vec!["netconf 192.168.1.5/255.255.255.0"]);
    }

    #[test]
    fn ip_command_on_full_queue_is_discarded_not_failed() {
        let (p, queue) = processor(1);
        p.process("ip.txt", b"IP: 10.0.0.1 NETMASK: 255.0.0.0").unwrap();
        let outcome = p.process("ip.txt", b"IP: 10.0.0.2 NETMASK: 255.0.0.0").unwrap();
        assert!(matches!(outcome, CommandOutcome::Discarded { queued: 1, .. }));
        assert_eq!(queue.discarded(), 1);
    }

    #[test]
    fn ip_parse_errors_surface() {
        let (p, queue) = processor(DEFAULT_CAPACITY);
        assert!(matches!(
            p.process("ip.txt", b"NETMASK: 255.255.255.0"),
            Err(DeviceError::AddressMissing)
        ));
        assert!(matches!(p.process("ip.txt", b""), Err(DeviceError::Format)));
        assert!(queue.is_empty());
    }

    #[test]
    fn unknown_token_names_itself() {
        let (p, _) = processor(DEFAULT_CAPACITY);
        match p.process("unknown.dat", b"") {
            Err(DeviceError::UnrecognizedCommand(token)) => assert_eq!(token, "unknown.dat"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn payload_preview_is_bounded() {
        assert_eq!(payload_preview(b"IP: 1.2.3.4"), "\"IP: 1.2.3.4\"");
        let big = vec![b'x'; 1024 * 1024];
        let preview = payload_preview(&big);
        assert!(preview.len() < 100);
        assert!(preview.ends_with(&format!("(+{} more)", 1024 * 1024 - PREVIEW_LEN)));
    }

    #[tokio::test]
    async fn reboot_drains_queued_jobs() {
        let (p, queue) = processor(DEFAULT_CAPACITY);
        let ran = Arc::new(Mutex::new(Vec::new()));
        for name in ["A", "B", "C"] {
            let ran = Arc::clone(&ran);
            queue.enqueue(Job::new(name, move || {
                ran.lock().unwrap().push(name);
                Ok(())
            }));
        }

        let outcome = p.process("reboot.txt", b"").unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::DrainScheduled(DrainSchedule::Scheduled { pending: 3 })
        );

        for _ in 0..200 {
            if queue.is_empty() && ran.lock().unwrap().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*ran.lock().unwrap(), vec!["A", "B", "C"]);
    }
}
