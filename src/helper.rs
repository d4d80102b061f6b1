//! Privileged helper - auto-elevated actions used by opt-in automation
//!
//! The helper lives on its own worker thread. The connection is acquired
//! there, and every command runs there too; outcomes come back to the owner
//! thread over a calloop channel. Gesture handling never waits for it: until
//! the connection lands every request fails with `ServiceUnavailable`.

use std::fmt;
use std::sync::mpsc;

use calloop::channel::Sender;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Action as the user (or automation) names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrivilegedAction {
    SleepDisplay,
    /// Kill the process behind a recents task
    ForceStopTask(u32),
}

impl fmt::Display for PrivilegedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivilegedAction::SleepDisplay => write!(f, "sleep display"),
            PrivilegedAction::ForceStopTask(id) => write!(f, "force stop task {}", id),
        }
    }
}

/// Action resolved to what the helper actually runs. Task ids never get
/// here; only the process the host reported for the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperCommand {
    LockSessions,
    KillProcess { pid: u32 },
}

pub trait PrivilegedHelper {
    fn run(&mut self, command: HelperCommand) -> Result<()>;
}

/// Work item for the helper thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelperJob {
    pub action: PrivilegedAction,
    pub command: HelperCommand,
    pub user_invoked: bool,
}

/// Posted by the helper thread to the owner thread
#[derive(Debug)]
pub enum HelperMessage {
    Connected,
    Failed(String),
    Done {
        job: HelperJob,
        result: std::result::Result<(), String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HelperStatus {
    /// Never asked for
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Unavailable(String),
}

/// Owner-thread end of the helper: connection status plus the job queue
#[derive(Debug, Default)]
pub struct HelperClient {
    status: HelperStatus,
    jobs: Option<mpsc::Sender<HelperJob>>,
}

impl HelperClient {
    pub fn status(&self) -> &HelperStatus {
        &self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == HelperStatus::Connected
    }

    /// Start the helper thread. `connector` runs there; the outcome and
    /// every job result are posted to `events`.
    pub fn connect<F>(&mut self, connector: F, events: Sender<HelperMessage>) -> Result<()>
    where
        F: FnOnce() -> Result<Box<dyn PrivilegedHelper>> + Send + 'static,
    {
        let jobs = spawn_worker(connector, events)?;
        self.jobs = Some(jobs);
        self.status = HelperStatus::Connecting;
        Ok(())
    }

    /// Update the status from a helper thread message. Finished jobs are
    /// handed back to the caller.
    pub fn on_message(&mut self, message: HelperMessage) -> Option<(HelperJob, std::result::Result<(), String>)> {
        match message {
            HelperMessage::Connected => {
                tracing::info!("Privileged helper connected");
                self.status = HelperStatus::Connected;
                None
            }
            HelperMessage::Failed(reason) => {
                tracing::warn!("Privileged helper unavailable: {}", reason);
                self.status = HelperStatus::Unavailable(reason);
                self.jobs = None;
                None
            }
            HelperMessage::Done { job, result } => Some((job, result)),
        }
    }

    /// Queue `job` on the helper thread. Never blocks.
    pub fn submit(&mut self, job: HelperJob) -> Result<()> {
        match &self.status {
            HelperStatus::Connected => {}
            HelperStatus::Connecting => return Err(Error::ServiceUnavailable("still connecting".into())),
            HelperStatus::Disconnected => return Err(Error::ServiceUnavailable("not connected".into())),
            HelperStatus::Unavailable(reason) => return Err(Error::ServiceUnavailable(reason.clone())),
        }
        let sent = self.jobs.as_ref().is_some_and(|jobs| jobs.send(job).is_ok());
        if !sent {
            let reason = "helper thread exited".to_string();
            tracing::warn!("{}", reason);
            self.status = HelperStatus::Unavailable(reason.clone());
            self.jobs = None;
            return Err(Error::ServiceUnavailable(reason));
        }
        Ok(())
    }
}

/// Run `connector` and then every queued job on the "flick-helper" thread.
/// The thread ends when the returned sender is dropped.
pub fn spawn_worker<F>(connector: F, events: Sender<HelperMessage>) -> Result<mpsc::Sender<HelperJob>>
where
    F: FnOnce() -> Result<Box<dyn PrivilegedHelper>> + Send + 'static,
{
    let (jobs, queue) = mpsc::channel::<HelperJob>();
    std::thread::Builder::new()
        .name("flick-helper".into())
        .spawn(move || {
            let mut helper = match connector() {
                Ok(helper) => helper,
                Err(e) => {
                    // Owner loop gone means nobody is waiting
                    let _ = events.send(HelperMessage::Failed(e.to_string()));
                    return;
                }
            };
            if events.send(HelperMessage::Connected).is_err() {
                return;
            }
            for job in queue {
                let result = helper.run(job.command).map_err(|e| e.to_string());
                if events.send(HelperMessage::Done { job, result }).is_err() {
                    break;
                }
            }
            tracing::debug!("Privileged helper thread exiting");
        })?;
    Ok(jobs)
}

/// Runs commands through `pkexec`, the way the shell elevates system tweaks
pub struct PkexecHelper;

impl PkexecHelper {
    /// Fails if `pkexec` is not installed
    pub fn connect() -> Result<Box<dyn PrivilegedHelper>> {
        let found = std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join("pkexec").is_file()))
            .unwrap_or(false);
        if !found {
            return Err(Error::ServiceUnavailable("pkexec not found".into()));
        }
        Ok(Box::new(PkexecHelper))
    }
}

/// pid 0 and 1 would signal the process group or init; our own pid is the shell
fn check_kill_target(pid: u32) -> Result<()> {
    if pid <= 1 || pid == std::process::id() {
        return Err(Error::ServiceUnavailable(format!("refusing to kill pid {}", pid)));
    }
    Ok(())
}

impl PrivilegedHelper for PkexecHelper {
    fn run(&mut self, command: HelperCommand) -> Result<()> {
        let args: Vec<String> = match command {
            HelperCommand::LockSessions => vec!["loginctl".into(), "lock-sessions".into()],
            HelperCommand::KillProcess { pid } => {
                check_kill_target(pid)?;
                vec!["kill".into(), "-KILL".into(), pid.to_string()]
            }
        };
        let status = std::process::Command::new("pkexec").args(&args).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::ServiceUnavailable(format!("{:?} exited with {}", command, status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct RecordingHelper(Arc<Mutex<Vec<HelperCommand>>>);

    impl PrivilegedHelper for RecordingHelper {
        fn run(&mut self, command: HelperCommand) -> Result<()> {
            self.0.lock().unwrap().push(command);
            Ok(())
        }
    }

    fn job(action: PrivilegedAction, command: HelperCommand) -> HelperJob {
        HelperJob {
            action,
            command,
            user_invoked: true,
        }
    }

    fn client_loop() -> (calloop::EventLoop<'static, (HelperClient, Vec<HelperJob>)>, Sender<HelperMessage>) {
        let event_loop: calloop::EventLoop<(HelperClient, Vec<HelperJob>)> = calloop::EventLoop::try_new().unwrap();
        let (sender, channel) = calloop::channel::channel();
        event_loop
            .handle()
            .insert_source(channel, |event, _, (client, done): &mut (HelperClient, Vec<HelperJob>)| {
                if let calloop::channel::Event::Msg(message) = event {
                    if let Some((job, _)) = client.on_message(message) {
                        done.push(job);
                    }
                }
            })
            .unwrap();
        (event_loop, sender)
    }

    #[test]
    fn test_requests_fail_until_connected() {
        let mut client = HelperClient::default();
        let sleep = job(PrivilegedAction::SleepDisplay, HelperCommand::LockSessions);
        assert!(matches!(client.submit(sleep), Err(Error::ServiceUnavailable(_))));
    }

    #[test]
    fn test_jobs_run_on_the_helper_thread() {
        let (mut event_loop, sender) = client_loop();
        let ran = Arc::new(Mutex::new(Vec::new()));
        let recorder = ran.clone();
        let mut data = (HelperClient::default(), Vec::new());
        data.0
            .connect(
                move || {
                    let helper: Box<dyn PrivilegedHelper> = Box::new(RecordingHelper(recorder));
                    Ok(helper)
                },
                sender,
            )
            .unwrap();
        assert!(matches!(data.0.submit(job(PrivilegedAction::SleepDisplay, HelperCommand::LockSessions)), Err(_)));

        for _ in 0..50 {
            event_loop.dispatch(Some(Duration::from_millis(20)), &mut data).unwrap();
            if data.0.is_connected() {
                break;
            }
        }
        assert!(data.0.is_connected());

        let kill = job(PrivilegedAction::ForceStopTask(3), HelperCommand::KillProcess { pid: 4242 });
        data.0.submit(kill).unwrap();
        for _ in 0..50 {
            event_loop.dispatch(Some(Duration::from_millis(20)), &mut data).unwrap();
            if !data.1.is_empty() {
                break;
            }
        }
        assert_eq!(data.1, vec![kill]);
        assert_eq!(*ran.lock().unwrap(), vec![HelperCommand::KillProcess { pid: 4242 }]);
    }

    #[test]
    fn test_connection_failure_arrives_through_the_loop() {
        let (mut event_loop, sender) = client_loop();
        let mut data = (HelperClient::default(), Vec::new());
        data.0
            .connect(|| Err(Error::ServiceUnavailable("no socket".into())), sender)
            .unwrap();

        for _ in 0..50 {
            event_loop.dispatch(Some(Duration::from_millis(20)), &mut data).unwrap();
            if *data.0.status() != HelperStatus::Connecting {
                break;
            }
        }
        assert!(matches!(data.0.status(), HelperStatus::Unavailable(r) if r.contains("no socket")));
    }

    #[test]
    fn test_kill_refuses_init_and_self() {
        assert!(check_kill_target(0).is_err());
        assert!(check_kill_target(1).is_err());
        assert!(check_kill_target(std::process::id()).is_err());
        assert!(check_kill_target(4242).is_ok());
    }
}
