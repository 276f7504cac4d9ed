//! OS side effects performed during startup
//!
//! Every call that touches process identity, the filesystem root, signal
//! disposition or the PID file goes through [`Platform`], so the startup
//! sequence can be exercised without privileges.

use nix::unistd::{Gid, Group, Pid, Uid, User};
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::path::Path;

use crate::constants::{PID_DIR, SMTP_MAX_ADDRESSES, SMTP_PORT};
use crate::daemon::pidfile::{InstanceGuard, PidFile, PidFileError};
use crate::daemon::signals::{self, SignalState};
use crate::error::Result;

pub trait Platform {
    /// Look up a user in the identity database
    fn lookup_user(&mut self, name: &str) -> Option<Uid>;

    /// Look up a group in the identity database
    fn lookup_group(&mut self, name: &str) -> Option<Gid>;

    /// Resolve a mail host to at most `SMTP_MAX_ADDRESSES` addresses
    fn resolve_host(&mut self, host: &str) -> io::Result<Vec<IpAddr>>;

    /// Detach from the controlling terminal
    fn daemonize(&mut self) -> nix::Result<()>;

    fn set_group(&mut self, gid: Gid) -> nix::Result<()>;

    /// Confine the filesystem root to `dir`
    fn chroot(&mut self, dir: &Path) -> nix::Result<()>;

    fn set_user(&mut self, uid: Uid) -> nix::Result<()>;

    fn install_signals(&mut self, label: &str) -> Result<SignalState>;

    fn register_pid(
        &mut self,
        label: &str,
        pid: Pid,
    ) -> std::result::Result<InstanceGuard, PidFileError>;
}

/// The real host
#[derive(Debug, Default)]
pub struct UnixPlatform;

impl Platform for UnixPlatform {
    fn lookup_user(&mut self, name: &str) -> Option<Uid> {
        User::from_name(name).ok().flatten().map(|user| user.uid)
    }

    fn lookup_group(&mut self, name: &str) -> Option<Gid> {
        Group::from_name(name).ok().flatten().map(|group| group.gid)
    }

    fn resolve_host(&mut self, host: &str) -> io::Result<Vec<IpAddr>> {
        resolve_smtp_host(host)
    }

    fn daemonize(&mut self) -> nix::Result<()> {
        detach()
    }

    fn set_group(&mut self, gid: Gid) -> nix::Result<()> {
        #[cfg(not(any(target_os = "macos", target_os = "ios")))]
        nix::unistd::setgroups(&[gid])?;
        nix::unistd::setgid(gid)
    }

    fn chroot(&mut self, dir: &Path) -> nix::Result<()> {
        nix::unistd::chroot(dir)?;
        nix::unistd::chdir("/")
    }

    fn set_user(&mut self, uid: Uid) -> nix::Result<()> {
        nix::unistd::setuid(uid)
    }

    fn install_signals(&mut self, label: &str) -> Result<SignalState> {
        signals::install(label)
    }

    fn register_pid(
        &mut self,
        label: &str,
        pid: Pid,
    ) -> std::result::Result<InstanceGuard, PidFileError> {
        PidFile::new(Path::new(PID_DIR), label).register(pid)
    }
}

/// Resolve `host` through the system resolver, keeping distinct addresses.
pub fn resolve_smtp_host(host: &str) -> io::Result<Vec<IpAddr>> {
    let mut addresses: Vec<IpAddr> = Vec::new();
    for addr in (host, SMTP_PORT).to_socket_addrs()? {
        if !addresses.contains(&addr.ip()) {
            addresses.push(addr.ip());
        }
        if addresses.len() == SMTP_MAX_ADDRESSES {
            break;
        }
    }
    Ok(addresses)
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
))]
fn detach() -> nix::Result<()> {
    // fork, setsid, chdir("/"), stdio to /dev/null
    nix::unistd::daemon(false, false)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
fn detach() -> nix::Result<()> {
    // Run with -f under the platform's service manager instead
    Err(nix::errno::Errno::ENOTSUP)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording fake used by the startup tests

    use super::*;
    use nix::errno::Errno;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        LookupUser(String),
        LookupGroup(String),
        ResolveHost(String),
        Daemonize,
        SetGroup(u32),
        Chroot(PathBuf),
        SetUser(u32),
        InstallSignals(String),
        RegisterPid(String),
    }

    #[derive(Debug)]
    pub struct RecordingPlatform {
        pub calls: Vec<Call>,
        pub users: HashMap<String, u32>,
        pub groups: HashMap<String, u32>,
        pub hosts: HashMap<String, Vec<IpAddr>>,
        pub fail_set_group: Option<Errno>,
        pub fail_chroot: Option<Errno>,
        pub fail_set_user: Option<Errno>,
        /// Directory PID files are written to; `None` makes registration fail
        pub pid_dir: Option<PathBuf>,
    }

    impl Default for RecordingPlatform {
        fn default() -> Self {
            Self {
                calls: Vec::new(),
                users: HashMap::from([("monitord".to_string(), 1001)]),
                groups: HashMap::from([("monitord".to_string(), 1002)]),
                hosts: HashMap::from([(
                    "mail.example.com".to_string(),
                    vec!["192.0.2.25".parse().unwrap()],
                )]),
                fail_set_group: None,
                fail_chroot: None,
                fail_set_user: None,
                pid_dir: None,
            }
        }
    }

    impl RecordingPlatform {
        /// Calls that change process identity or root
        pub fn privilege_calls(&self) -> Vec<Call> {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::SetGroup(_) | Call::Chroot(_) | Call::SetUser(_)))
                .cloned()
                .collect()
        }
    }

    fn outcome(failure: Option<Errno>) -> nix::Result<()> {
        match failure {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }

    impl Platform for RecordingPlatform {
        fn lookup_user(&mut self, name: &str) -> Option<Uid> {
            self.calls.push(Call::LookupUser(name.to_string()));
            self.users.get(name).copied().map(Uid::from_raw)
        }

        fn lookup_group(&mut self, name: &str) -> Option<Gid> {
            self.calls.push(Call::LookupGroup(name.to_string()));
            self.groups.get(name).copied().map(Gid::from_raw)
        }

        fn resolve_host(&mut self, host: &str) -> io::Result<Vec<IpAddr>> {
            self.calls.push(Call::ResolveHost(host.to_string()));
            self.hosts.get(host).cloned().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "failed to lookup address information")
            })
        }

        fn daemonize(&mut self) -> nix::Result<()> {
            self.calls.push(Call::Daemonize);
            Ok(())
        }

        fn set_group(&mut self, gid: Gid) -> nix::Result<()> {
            self.calls.push(Call::SetGroup(gid.as_raw()));
            outcome(self.fail_set_group)
        }

        fn chroot(&mut self, dir: &Path) -> nix::Result<()> {
            self.calls.push(Call::Chroot(dir.to_path_buf()));
            outcome(self.fail_chroot)
        }

        fn set_user(&mut self, uid: Uid) -> nix::Result<()> {
            self.calls.push(Call::SetUser(uid.as_raw()));
            outcome(self.fail_set_user)
        }

        fn install_signals(&mut self, label: &str) -> Result<SignalState> {
            self.calls.push(Call::InstallSignals(label.to_string()));
            Ok(SignalState::default())
        }

        fn register_pid(
        &mut self,
        label: &str,
        pid: Pid,
    ) -> std::result::Result<InstanceGuard, PidFileError> {
            self.calls.push(Call::RegisterPid(label.to_string()));
            let dir = self
                .pid_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("/nonexistent/monitord-run"));
            PidFile::new(&dir, label).register(pid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localhost_resolves() {
        let addresses = resolve_smtp_host("localhost").unwrap();
        assert!(!addresses.is_empty());
        assert!(addresses.len() <= SMTP_MAX_ADDRESSES);
        assert!(addresses.iter().all(|a| a.is_loopback()));
    }

    #[test]
    fn test_root_user_lookup() {
        let mut platform = UnixPlatform;
        assert_eq!(platform.lookup_user("root"), Some(Uid::from_raw(0)));
        assert!(platform.lookup_user("no-such-user-monitord-test").is_none());
        assert!(platform.lookup_group("no-such-group-monitord-test").is_none());
    }
}
