//! Built-in producers.

use std::ffi::OsString;
use std::sync::Arc;

use gmx_core::protocol::{ARGS_KEY, KEYS_KEY};

use crate::registry::Registry;

/// Key reporting total CPU seconds (user + system) used by this process.
pub const CPU_TIME_KEY: &str = "runtime.cpu.time";

/// Publish `keys` and `os.args`.
///
/// `keys` holds a weak reference so a dropped registry is not kept alive by
/// its own entry.
pub fn publish_reserved(registry: &Arc<Registry>) {
    let weak = Arc::downgrade(registry);
    registry.register(KEYS_KEY, move || weak.upgrade().map(|r| r.snapshot_keys()));

    let args = lossy_args(std::env::args_os());
    registry.register(ARGS_KEY, move || args.clone());
}

/// Arguments as strings; invalid UTF-8 becomes U+FFFD instead of failing.
pub fn lossy_args(args: impl IntoIterator<Item = OsString>) -> Vec<String> {
    args.into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

pub fn publish_cpu_time(registry: &Registry) {
    registry.register(CPU_TIME_KEY, cpu_time_seconds);
}

/// CPU seconds used so far, or `-1.0` if the platform cannot tell.
#[cfg(unix)]
pub fn cpu_time_seconds() -> f64 {
    // SAFETY: `rusage` is plain old data; all-zero is a valid value.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    // SAFETY: getrusage only writes into the struct we pass.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return -1.0;
    }
    let secs = usage.ru_utime.tv_sec as f64 + usage.ru_stime.tv_sec as f64;
    let micros = usage.ru_utime.tv_usec as f64 + usage.ru_stime.tv_usec as f64;
    secs + micros / 1_000_000.0
}

#[cfg(not(unix))]
pub fn cpu_time_seconds() -> f64 {
    -1.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gmx_core::Value;

    #[test]
    fn keys_lists_itself() {
        let reg = Arc::new(Registry::new());
        reg.register("answer", || 42);
        publish_reserved(&reg);
        let keys = reg.lookup(KEYS_KEY).unwrap()().to_string_list().unwrap();
        assert_eq!(keys, vec!["answer", "keys", "os.args"]);
    }

    #[test]
    fn args_are_a_string_list() {
        let reg = Arc::new(Registry::new());
        publish_reserved(&reg);
        let args = reg.lookup(ARGS_KEY).unwrap()();
        assert!(!args.to_string_list().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_arguments_are_replaced_not_fatal() {
        use std::os::unix::ffi::OsStringExt;

        let args = vec![
            OsString::from("/bin/worker"),
            OsString::from_vec(b"a\xffb".to_vec()),
        ];
        assert_eq!(lossy_args(args), vec!["/bin/worker", "a\u{FFFD}b"]);
    }

    #[cfg(unix)]
    #[test]
    fn cpu_time_is_non_negative() {
        let reg = Registry::new();
        publish_cpu_time(&reg);
        let v = reg.lookup(CPU_TIME_KEY).unwrap()();
        let Value::Float(secs) = v else {
            panic!("cpu time must be a float, got {v}");
        };
        assert!(secs >= 0.0);
    }
}
