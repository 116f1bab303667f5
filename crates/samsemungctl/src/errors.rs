//! Exit codes for samsemungctl

use samsemung_common::EmungError;

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Bad arguments or invalid values (EX_USAGE)
pub const EXIT_USAGE: i32 = 64;

/// A file, VM or binary does not exist (EX_NOINPUT)
pub const EXIT_NOT_FOUND: i32 = 66;

/// qemu-img or the emulator reported a failure (EX_UNAVAILABLE)
pub const EXIT_QEMU_FAILED: i32 = 69;

/// Map an error chain to the process exit code
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let domain = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<EmungError>());

    match domain {
        Some(e) if e.is_not_found() => EXIT_NOT_FOUND,
        Some(EmungError::QemuFailed { .. }) => EXIT_QEMU_FAILED,
        Some(EmungError::InvalidProfile(_)) | Some(EmungError::UnsupportedArchitecture(_)) => {
            EXIT_USAGE
        }
        _ => EXIT_GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes_follow_domain_error() {
        let err = anyhow::Error::from(EmungError::not_found("gone"));
        assert_eq!(exit_code(&err), EXIT_NOT_FOUND);

        let err: anyhow::Error = Err::<(), _>(EmungError::QemuFailed {
            tool: "qemu-img".into(),
            stderr: "boom".into(),
        })
        .context("Failed to create disk")
        .unwrap_err();
        assert_eq!(exit_code(&err), EXIT_QEMU_FAILED);

        let err = anyhow::Error::from(EmungError::UnsupportedArchitecture("mips".into()));
        assert_eq!(exit_code(&err), EXIT_USAGE);

        assert_eq!(exit_code(&anyhow::anyhow!("plain")), EXIT_GENERAL_ERROR);
    }
}
