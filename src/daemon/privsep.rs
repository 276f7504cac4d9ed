//! Privilege separation
//!
//! Group, then filesystem root, then user. Each step is fatal on failure and
//! nothing is rolled back.

use std::path::Path;

use crate::daemon::logging;
use crate::error::{BootstrapError, Result};
use crate::identity::ResolvedIdentity;
use crate::platform::Platform;

/// Drop to `identity` inside `dir`.
///
/// The user switch comes last: after it the process may no longer be allowed
/// to change group or root.
pub fn drop_privileges<P: Platform>(
    platform: &mut P,
    identity: &ResolvedIdentity,
    user: &str,
    group: &str,
    dir: &Path,
) -> Result<()> {
    platform
        .set_group(identity.gid)
        .map_err(|source| BootstrapError::SetGid {
            group: group.to_string(),
            source,
        })?;

    platform
        .chroot(dir)
        .map_err(|source| BootstrapError::Chroot {
            dir: dir.to_path_buf(),
            source,
        })?;

    logging::set_chrooted();

    platform
        .set_user(identity.uid)
        .map_err(|source| BootstrapError::SetUid {
            user: user.to_string(),
            source,
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{Call, RecordingPlatform};
    use nix::errno::Errno;
    use nix::unistd::{Gid, Uid};

    fn identity() -> ResolvedIdentity {
        ResolvedIdentity {
            uid: Uid::from_raw(1001),
            gid: Gid::from_raw(1002),
        }
    }

    #[test]
    fn test_order_is_group_chroot_user() {
        let mut platform = RecordingPlatform::default();
        drop_privileges(&mut platform, &identity(), "monitord", "monitord", Path::new("/jail"))
            .unwrap();

        assert_eq!(
            platform.privilege_calls(),
            vec![
                Call::SetGroup(1002),
                Call::Chroot("/jail".into()),
                Call::SetUser(1001),
            ]
        );
    }

    #[test]
    fn test_setgid_failure_stops_sequence() {
        let mut platform = RecordingPlatform {
            fail_set_group: Some(Errno::EPERM),
            ..Default::default()
        };

        let jail = Path::new("/jail");
        let err = drop_privileges(&mut platform, &identity(), "monitord", "staff", jail)
            .unwrap_err();

        assert!(matches!(err, BootstrapError::SetGid { ref group, .. } if group == "staff"));
        assert!(err.to_string().contains("Operation not permitted"));
        assert_eq!(platform.privilege_calls(), vec![Call::SetGroup(1002)]);
    }

    #[test]
    fn test_chroot_failure_prevents_user_change() {
        let mut platform = RecordingPlatform {
            fail_chroot: Some(Errno::ENOENT),
            ..Default::default()
        };

        let jail = Path::new("/missing");
        let err = drop_privileges(&mut platform, &identity(), "monitord", "monitord", jail)
            .unwrap_err();

        assert!(matches!(err, BootstrapError::Chroot { .. }));
        assert!(!platform.calls.contains(&Call::SetUser(1001)));
        assert_eq!(
            platform.privilege_calls(),
            vec![Call::SetGroup(1002), Call::Chroot("/missing".into())]
        );
    }

    #[test]
    fn test_setuid_failure_reports_user() {
        let mut platform = RecordingPlatform {
            fail_set_user: Some(Errno::EPERM),
            ..Default::default()
        };

        let jail = Path::new("/jail");
        let err = drop_privileges(&mut platform, &identity(), "alerts", "monitord", jail)
            .unwrap_err();

        assert!(err.to_string().contains("Unable to switch to user 'alerts'"));
        assert!(err.to_string().contains("(1)"));
    }
}
