//! User and group resolution

use nix::unistd::{Gid, Uid};

use crate::error::{BootstrapError, Result};
use crate::platform::Platform;

/// Numeric identity the daemon drops to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub uid: Uid,
    pub gid: Gid,
}

/// Resolve `user` and `group`; either failing is an invalid identity.
pub fn resolve<P: Platform>(
    platform: &mut P,
    user: &str,
    group: &str,
) -> Result<ResolvedIdentity> {
    let uid = platform.lookup_user(user);
    let gid = platform.lookup_group(group);

    match (uid, gid) {
        (Some(uid), Some(gid)) => Ok(ResolvedIdentity { uid, gid }),
        _ => Err(BootstrapError::InvalidIdentity {
            user: user.to_string(),
            group: group.to_string(),
        }),
    }
}
