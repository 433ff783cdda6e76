use crate::config::PrinterProfile;

/// Vendor-specific rewrite of a raw job's bytes to carry accounting identity.
///
/// Implementations must be pure: no I/O, no shared state, identical output
/// for identical inputs. That keeps them testable in isolation and swappable
/// per device without touching the relay.
pub trait Injector: Send + Sync {
    fn transform(&self, job: &[u8], user: &str, password: &str, profile: &PrinterProfile)
        -> Vec<u8>;
}

/// Selects an injector by its configured name.
///
/// Unknown names (and the explicit `none`) resolve to the identity transform:
/// forwarding an unmodified job beats refusing to print.
pub fn select(name: &str) -> &'static dyn Injector {
    match name {
        "pjl" => &Pjl,
        _ => &Identity,
    }
}

/// Baseline for devices that need no accounting injection.
pub struct Identity;

impl Injector for Identity {
    fn transform(
        &self,
        job: &[u8],
        _user: &str,
        _password: &str,
        _profile: &PrinterProfile,
    ) -> Vec<u8> {
        job.to_vec()
    }
}

/// Universal exit language sequence, doubling as the trailing reset.
const UEL: &[u8] = b"\x1B%-12345X";

/// Wraps the job in a PJL preamble carrying the account identity.
///
/// Directive key names come from the profile (`pjlUserKey`/`pjlPassKey`,
/// defaulting to `USER`/`PASS`); extra directive lines are taken verbatim
/// from the profile. Identity directives are emitted only for non-empty
/// values.
pub struct Pjl;

impl Injector for Pjl {
    fn transform(&self, job: &[u8], user: &str, password: &str, profile: &PrinterProfile)
        -> Vec<u8> {
        let mut out = Vec::with_capacity(job.len() + 128);
        out.extend_from_slice(UEL);
        out.extend_from_slice(b"@PJL JOB\r\n");

        if !user.is_empty() {
            let key = profile.pjl_user_key.as_deref().unwrap_or("USER").to_uppercase();
            push_directive(&mut out, &key, user);
        }
        if !password.is_empty() {
            let key = profile.pjl_pass_key.as_deref().unwrap_or("PASS").to_uppercase();
            push_directive(&mut out, &key, password);
        }
        for extra in &profile.pjl_extra {
            // Extra lines are operator-authored and pass through verbatim;
            // only non-ASCII bytes are dropped.
            out.extend(extra.bytes().filter(u8::is_ascii));
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"@PJL ENTER LANGUAGE = PCL\r\n");
        out.extend_from_slice(job);
        out.extend_from_slice(UEL);
        out
    }
}

fn push_directive(out: &mut Vec<u8>, key: &str, value: &str) {
    out.extend_from_slice(b"@PJL SET ");
    push_ascii(out, key);
    out.push(b'=');
    push_ascii(out, value);
    out.extend_from_slice(b"\r\n");
}

/// PJL directives are printable-ASCII only; anything else is dropped rather
/// than failing the job.
fn push_ascii(out: &mut Vec<u8>, s: &str) {
    out.extend(s.bytes().filter(|b| b.is_ascii_graphic() || *b == b' '));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pjl_profile() -> PrinterProfile {
        PrinterProfile {
            injector: "pjl".to_string(),
            ..PrinterProfile::default()
        }
    }

    #[test]
    fn identity_returns_input_unchanged() {
        let profile = PrinterProfile::default();
        assert_eq!(Identity.transform(b"rawdata", "alice", "pw", &profile), b"rawdata");
        assert!(Identity.transform(b"", "alice", "pw", &profile).is_empty());
    }

    #[test]
    fn unknown_injector_falls_open_to_identity() {
        let profile = PrinterProfile::default();
        let via_unknown = select("kyocera-next").transform(b"job", "alice", "", &profile);
        let via_identity = Identity.transform(b"job", "alice", "", &profile);
        assert_eq!(via_unknown, via_identity);
    }

    #[test]
    fn pjl_wraps_the_job_with_preamble_and_reset() {
        let out = Pjl.transform(b"\x1B%-12345Xtestdata", "alice", "", &pjl_profile());
        let expected_head = b"\x1B%-12345X@PJL JOB\r\n@PJL SET USER=alice\r\n@PJL ENTER LANGUAGE = PCL\r\n";

        assert!(out.starts_with(expected_head));
        assert!(out.ends_with(b"testdata\x1B%-12345X"));
    }

    #[test]
    fn pjl_is_deterministic() {
        let profile = pjl_profile();
        let first = Pjl.transform(b"job", "alice", "hunter2", &profile);
        let second = Pjl.transform(b"job", "alice", "hunter2", &profile);
        assert_eq!(first, second);
    }

    #[test]
    fn pjl_omits_directives_for_empty_identity() {
        let out = Pjl.transform(b"job", "", "", &pjl_profile());
        assert!(!out.windows(9).any(|w| w == b"@PJL SET "));
    }

    #[test]
    fn pjl_uses_configured_key_names_uppercased() {
        let profile = PrinterProfile {
            injector: "pjl".to_string(),
            pjl_user_key: Some("userid".to_string()),
            pjl_pass_key: Some("acct".to_string()),
            ..PrinterProfile::default()
        };
        let out = Pjl.transform(b"", "alice", "hunter2", &profile);
        let text = String::from_utf8_lossy(&out);

        assert!(text.contains("@PJL SET USERID=alice\r\n"));
        assert!(text.contains("@PJL SET ACCT=hunter2\r\n"));
    }

    #[test]
    fn pjl_appends_extra_lines_verbatim() {
        let profile = PrinterProfile {
            injector: "pjl".to_string(),
            pjl_extra: vec![
                "@PJL SET DEPT=42".to_string(),
                "@PJL COMMENT\tTAB caf\u{00e9}".to_string(),
            ],
            ..PrinterProfile::default()
        };
        let out = Pjl.transform(b"", "", "", &profile);
        let text = String::from_utf8_lossy(&out);

        assert!(text.contains("@PJL SET DEPT=42\r\n"));
        // ASCII control bytes like the tab survive; only non-ASCII is dropped.
        assert!(text.contains("@PJL COMMENT\tTAB caf\r\n"));
    }

    #[test]
    fn pjl_drops_non_ascii_instead_of_failing() {
        let out = Pjl.transform(b"", "ali\u{00e7}e\r\n", "", &pjl_profile());
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("@PJL SET USER=alie\r\n"));
    }
}
