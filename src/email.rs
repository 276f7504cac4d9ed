//! Email alert validation
//!
//! Alerting is optional. A missing or unresolvable SMTP setup disables it
//! with a warning; it never stops the daemon from starting.

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::path::Path;

use crate::config::document::{ConfigDocument, EMAIL_FROM, EMAIL_IDSNAME, SMTP_SERVER};
use crate::config::{ConfigError, MonitorSettings, SmtpServer};
use crate::constants::SMTP_MAX_ADDRESSES;
use crate::daemon::logging::DaemonLogger;
use crate::platform::Platform;

/// Why email alerting ended up disabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisabledReason {
    MissingHost,
    MissingFrom,
    MissingBoth,
    Unresolvable { host: String, error: String },
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHost => write!(f, "SMTP server missing ('email from' is set)"),
            Self::MissingFrom => write!(f, "'email from' missing (SMTP server is set)"),
            Self::MissingBoth => write!(f, "SMTP server and 'email from' missing"),
            Self::Unresolvable { host, error } => {
                write!(f, "Invalid SMTP server '{}': {}", host, error)
            }
        }
    }
}

/// Outcome of the email alert check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailAlertState {
    Enabled { server: SmtpServer, from: String },
    Disabled { reason: DisabledReason },
}

impl EmailAlertState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

/// Decide whether alerting is enabled.
///
/// `resolve` is only called when both values are present.
pub fn evaluate<F>(host: Option<String>, from: Option<String>, resolve: F) -> EmailAlertState
where
    F: FnOnce(&str) -> io::Result<Vec<IpAddr>>,
{
    let reason = match (host, from) {
        (Some(host), Some(from)) => match resolve(&host) {
            Ok(addresses) if !addresses.is_empty() => {
                let addresses = addresses.into_iter().take(SMTP_MAX_ADDRESSES).collect();
                return EmailAlertState::Enabled {
                    server: SmtpServer { host, addresses },
                    from,
                };
            }
            Ok(_) => DisabledReason::Unresolvable {
                host,
                error: "no addresses found".to_string(),
            },
            Err(e) => DisabledReason::Unresolvable {
                host,
                error: e.to_string(),
            },
        },
        (Some(_), None) => DisabledReason::MissingFrom,
        (None, Some(_)) => DisabledReason::MissingHost,
        (None, None) => DisabledReason::MissingBoth,
    };

    EmailAlertState::Disabled { reason }
}

/// Reopen the configuration, evaluate the SMTP settings and record the
/// result in `settings`.
pub fn apply<P: Platform>(
    platform: &mut P,
    config_path: &Path,
    settings: &mut MonitorSettings,
    logger: &DaemonLogger,
) -> Result<EmailAlertState, ConfigError> {
    let (host, from, idsname) = {
        let document = ConfigDocument::open(config_path)?;
        (
            document.get_one(SMTP_SERVER),
            document.get_one(EMAIL_FROM),
            document.get_one(EMAIL_IDSNAME),
        )
    };

    let state = evaluate(host, from, |h| platform.resolve_host(h));

    settings.email_idsname = idsname;
    match &state {
        EmailAlertState::Enabled { server, from } => {
            settings.smtp_server = Some(server.clone());
            settings.email_from = Some(from.clone());
        }
        EmailAlertState::Disabled { reason } => {
            settings.smtp_server = None;
            settings.email_from = None;
            logger.log_alerting_disabled(&reason.to_string());
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{Call, RecordingPlatform};
    use std::cell::Cell;
    use std::fs;
    use tempfile::tempdir;

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_enabled_when_host_resolves() {
        let state = evaluate(
            Some("mail.example.com".to_string()),
            Some("alerts@example.com".to_string()),
            |host| {
                assert_eq!(host, "mail.example.com");
                Ok(vec![addr("192.0.2.25")])
            },
        );

        match state {
            EmailAlertState::Enabled { server, from } => {
                assert_eq!(server.host, "mail.example.com");
                assert_eq!(server.addresses, vec![addr("192.0.2.25")]);
                assert_eq!(from, "alerts@example.com");
            }
            other => panic!("expected enabled, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_from_skips_resolution() {
        let resolved = Cell::new(false);
        let state = evaluate(Some("mail.example.com".to_string()), None, |_| {
            resolved.set(true);
            Ok(vec![addr("192.0.2.25")])
        });

        assert_eq!(
            state,
            EmailAlertState::Disabled {
                reason: DisabledReason::MissingFrom
            }
        );
        assert!(!resolved.get());
    }

    #[test]
    fn test_missing_host_and_both() {
        let never = |_: &str| -> io::Result<Vec<IpAddr>> { panic!("resolver must not run") };

        assert_eq!(
            evaluate(None, Some("alerts@example.com".to_string()), never),
            EmailAlertState::Disabled {
                reason: DisabledReason::MissingHost
            }
        );
        assert_eq!(
            evaluate(None, None, never),
            EmailAlertState::Disabled {
                reason: DisabledReason::MissingBoth
            }
        );
    }

    #[test]
    fn test_unresolvable_host_disables() {
        let state = evaluate(
            Some("bad host..name".to_string()),
            Some("alerts@example.com".to_string()),
            |_| Err(io::Error::new(io::ErrorKind::Other, "invalid hostname")),
        );

        match state {
            EmailAlertState::Disabled {
                reason: DisabledReason::Unresolvable { host, error },
            } => {
                assert_eq!(host, "bad host..name");
                assert!(error.contains("invalid hostname"));
            }
            other => panic!("expected unresolvable, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_resolution_disables() {
        let state = evaluate(
            Some("mail.example.com".to_string()),
            Some("alerts@example.com".to_string()),
            |_| Ok(Vec::new()),
        );
        assert!(!state.is_enabled());
    }

    #[test]
    fn test_address_count_is_bounded() {
        let many: Vec<IpAddr> = (1..=8).map(|i| addr(&format!("192.0.2.{}", i))).collect();
        let state = evaluate(
            Some("mail.example.com".to_string()),
            Some("alerts@example.com".to_string()),
            move |_| Ok(many),
        );

        match state {
            EmailAlertState::Enabled { server, .. } => {
                assert_eq!(server.addresses.len(), SMTP_MAX_ADDRESSES)
            }
            other => panic!("expected enabled, got {other:?}"),
        }
    }

    #[test]
    fn test_apply_enables_and_keeps_values() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("monitord.toml");
        fs::write(
            &path,
            r#"
[global]
smtp_server = "mail.example.com"
email_from = "alerts@example.com"
email_idsname = "edge-01"
"#,
        )
        .unwrap();

        let mut platform = RecordingPlatform::default();
        let mut settings = MonitorSettings::default();
        let state = apply(&mut platform, &path, &mut settings, &DaemonLogger::new()).unwrap();

        assert!(state.is_enabled());
        assert!(settings.email_enabled());
        assert_eq!(settings.email_from.as_deref(), Some("alerts@example.com"));
        assert_eq!(settings.smtp_server.unwrap().host, "mail.example.com");
        assert_eq!(settings.email_idsname.as_deref(), Some("edge-01"));
        assert_eq!(platform.calls, vec![Call::ResolveHost("mail.example.com".to_string())]);
    }

    #[test]
    fn test_apply_unresolvable_releases_from() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("monitord.toml");
        fs::write(
            &path,
            "[global]\nsmtp_server = \"unknown.invalid\"\nemail_from = \"alerts@example.com\"\n",
        )
        .unwrap();

        let mut platform = RecordingPlatform::default();
        let mut settings = MonitorSettings::default();
        let state = apply(&mut platform, &path, &mut settings, &DaemonLogger::new()).unwrap();

        assert!(!state.is_enabled());
        assert!(settings.email_from.is_none());
        assert!(settings.smtp_server.is_none());
    }

    #[test]
    fn test_apply_missing_document_is_fatal() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("gone.toml");

        let mut platform = RecordingPlatform::default();
        let mut settings = MonitorSettings::default();
        let err = apply(&mut platform, &path, &mut settings, &DaemonLogger::new()).unwrap_err();

        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(platform.calls.is_empty());
    }
}
